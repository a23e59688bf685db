//! Tree assembly: repeated split search until a stopping condition.

use crate::data::ColumnarDataset;
use crate::repr::Tree;

use super::node::{GrowthArena, NodeState};
use super::params::GrowerParams;
use super::registry::LeafRegistry;
use super::splitter::Splitter;

/// Grows one regression tree from per-instance gradients and hessians.
///
/// The grower owns the build loop: initialize the root over all instances,
/// then, while the leaf budget allows, run a split search and commit the
/// winning split. Growth stops when the budget is reached or no open leaf
/// has a beneficial split.
pub struct TreeGrower {
    params: GrowerParams,
}

impl TreeGrower {
    pub fn new(params: GrowerParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &GrowerParams {
        &self.params
    }

    /// Grow a tree and fill `predictions` with each row's leaf weight.
    ///
    /// Returns `None` — with `predictions` untouched — when `max_leaves < 2`
    /// or the root never splits. A `None` round is a valid "no model this
    /// round" outcome for the caller's boosting loop, not a failure.
    ///
    /// # Panics
    ///
    /// Panics if `grads`, `hess` and `predictions` do not all cover
    /// `data.n_rows()` instances.
    pub fn grow(
        &self,
        data: &ColumnarDataset,
        grads: &[f64],
        hess: &[f64],
        predictions: &mut [f64],
    ) -> Option<Tree> {
        let n_rows = data.n_rows();
        assert_eq!(grads.len(), n_rows);
        assert_eq!(hess.len(), n_rows);
        assert_eq!(predictions.len(), n_rows);

        if self.params.max_leaves < 2 {
            return None;
        }

        let mut arena = GrowthArena::with_capacity(2 * self.params.max_leaves);
        let root = arena.init_root(grads, hess, &self.params);
        let mut registry = LeafRegistry::new(self.params.max_leaves, n_rows, root);
        let splitter = Splitter::new(&self.params);

        while !registry.is_full() {
            let Some(slot) = splitter.search(&mut arena, &registry, data, grads, hess) else {
                break;
            };
            Self::commit(slot, &mut arena, &mut registry, data);
        }

        if arena.node(root).state != NodeState::Internal {
            // Degenerate growth: the working set is dropped wholesale.
            return None;
        }

        // Remaining open leaves are final.
        for slot in 0..registry.n_leaves() {
            arena.node_mut(registry.node_at(slot)).state = NodeState::Leaf;
        }

        for (row, pred) in predictions.iter_mut().enumerate() {
            let leaf = registry.node_at(registry.slot_of_row(row as u32));
            *pred = arena.node(leaf).weight;
        }

        Some(arena.freeze(root))
    }

    /// Materialize the winning split: re-route instances through the
    /// registry and mark the leaf internal. Its children are already open
    /// leaves and enter the next iteration fresh.
    fn commit(
        slot: usize,
        arena: &mut GrowthArena,
        registry: &mut LeafRegistry,
        data: &ColumnarDataset,
    ) {
        let node = arena.node(registry.node_at(slot));
        let rule = node.split.expect("winning leaf carries a split");
        let (left, right) = node.children.expect("winning leaf owns two children");

        let parent = registry.node_at(slot);
        registry.commit_split(slot, left, right, data, &rule);
        arena.node_mut(parent).state = NodeState::Internal;
    }
}
