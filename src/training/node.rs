//! Growth-time node entity, lifecycle states, and the node arena.
//!
//! Nodes live in a [`GrowthArena`] and are addressed by [`NodeId`]; child
//! links are index pairs. The arena owns every node allocated during a
//! build, including candidate children that are never committed, and
//! releases them all when it is dropped. Committed nodes are copied out into
//! an immutable [`Tree`] by [`GrowthArena::freeze`].

use crate::repr::{NodeId, NodeSplit, SplitRule, Tree, TreeNode};

use super::params::GrowerParams;

/// Lifecycle of a node during growth.
///
/// An open leaf advances at most one state per growth iteration and never
/// regresses. `Computed` persists across iterations: a leaf's best split
/// stays valid until the leaf itself is split, because committing some other
/// leaf never changes this leaf's instance set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Open leaf, no split candidate allocated yet.
    Open,
    /// Candidate children allocated; the left-child accumulator is live.
    Computing,
    /// Candidate statistics complete; the split decision is frozen.
    Computed,
    /// Committed as an internal node.
    Internal,
    /// Finalized leaf of a completed tree.
    Leaf,
}

/// One tree vertex during growth.
///
/// For a node in `Computing` state, the left child doubles as the running
/// accumulator of the candidate left partition, and `last_value` on that
/// child tracks the most recent explicit value folded in the current column
/// sweep.
#[derive(Debug, Clone)]
pub struct GrowthNode {
    pub n_instances: u32,
    pub depth: u32,
    pub sum_grad: f64,
    pub sum_hess: f64,
    /// Materialized when the node's statistics finalize.
    pub weight: f64,
    /// Materialized when the node's statistics finalize.
    pub loss: f64,
    /// Best split gain recorded so far; candidates must strictly beat it.
    pub gain: f64,
    /// Best split recorded so far.
    pub split: Option<SplitRule>,
    /// Candidate (later committed) children, created together or not at all.
    pub children: Option<(NodeId, NodeId)>,
    pub state: NodeState,
    /// Column-sweep scratch, see struct docs.
    pub last_value: f32,
}

impl GrowthNode {
    fn new(depth: u32) -> Self {
        Self {
            n_instances: 0,
            depth,
            sum_grad: 0.0,
            sum_hess: 0.0,
            weight: 0.0,
            loss: 0.0,
            gain: 0.0,
            split: None,
            children: None,
            state: NodeState::Open,
            last_value: 0.0,
        }
    }
}

/// Contiguous node storage for one tree build.
#[derive(Debug)]
pub struct GrowthArena {
    nodes: Vec<GrowthNode>,
}

impl GrowthArena {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
        }
    }

    /// Create the root as a single open leaf over all instances, aggregating
    /// gradient and hessian sums directly from the full vectors.
    pub fn init_root(&mut self, grads: &[f64], hess: &[f64], params: &GrowerParams) -> NodeId {
        debug_assert!(self.nodes.is_empty());
        let mut root = GrowthNode::new(0);
        root.n_instances = grads.len() as u32;
        root.sum_grad = grads.iter().sum();
        root.sum_hess = hess.iter().sum();
        root.weight = params.leaf_weight(root.sum_grad, root.sum_hess);
        root.loss = params.leaf_loss(root.sum_grad, root.sum_hess);
        self.push(root)
    }

    /// Allocate candidate children for an open leaf and move it to
    /// `Computing`. The children start as empty open leaves one level down.
    pub fn alloc_children(&mut self, parent: NodeId) -> (NodeId, NodeId) {
        debug_assert_eq!(self.node(parent).state, NodeState::Open);
        let depth = self.node(parent).depth + 1;
        let left = self.push(GrowthNode::new(depth));
        let right = self.push(GrowthNode::new(depth));
        let node = self.node_mut(parent);
        node.children = Some((left, right));
        node.state = NodeState::Computing;
        (left, right)
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &GrowthNode {
        &self.nodes[id as usize]
    }

    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> &mut GrowthNode {
        &mut self.nodes[id as usize]
    }

    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    fn push(&mut self, node: GrowthNode) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.nodes.push(node);
        id
    }

    /// Copy the committed subtree under `root` into an immutable [`Tree`].
    ///
    /// Only internal nodes and their children are kept; candidate children
    /// of still-open leaves are discarded (those leaves finalize as `Leaf`).
    /// Traversal is an explicit worklist, and ids are remapped to the
    /// compact output arena in visit order.
    pub fn freeze(&self, root: NodeId) -> Tree {
        const UNMAPPED: u32 = u32::MAX;

        let mut order = vec![root];
        let mut new_id = vec![UNMAPPED; self.nodes.len()];
        new_id[root as usize] = 0;

        let mut i = 0;
        while i < order.len() {
            let node = self.node(order[i]);
            i += 1;
            if node.state == NodeState::Internal {
                let (left, right) = node
                    .children
                    .expect("internal node owns two children");
                new_id[left as usize] = order.len() as u32;
                order.push(left);
                new_id[right as usize] = order.len() as u32;
                order.push(right);
            }
        }

        let nodes = order
            .iter()
            .map(|&id| {
                let node = self.node(id);
                let split = if node.state == NodeState::Internal {
                    let rule = node.split.expect("internal node carries a split");
                    let (left, right) = node.children.expect("internal node owns two children");
                    Some(NodeSplit {
                        rule,
                        gain: node.gain,
                        left: new_id[left as usize],
                        right: new_id[right as usize],
                    })
                } else {
                    None
                };
                TreeNode {
                    n_instances: node.n_instances,
                    depth: node.depth,
                    sum_grad: node.sum_grad,
                    sum_hess: node.sum_hess,
                    weight: node.weight,
                    loss: node.loss,
                    split,
                }
            })
            .collect();

        Tree::from_nodes(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn root_aggregates_full_vectors() {
        let params = GrowerParams {
            reg_node: 0.0,
            reg_weight: 0.0,
            ..Default::default()
        };
        let mut arena = GrowthArena::with_capacity(8);
        let root = arena.init_root(&[1.0, -1.0, 1.0, -1.0], &[1.0; 4], &params);

        let node = arena.node(root);
        assert_eq!(node.n_instances, 4);
        assert_abs_diff_eq!(node.sum_grad, 0.0);
        assert_abs_diff_eq!(node.sum_hess, 4.0);
        assert_abs_diff_eq!(node.weight, 0.0);
        assert_abs_diff_eq!(node.loss, 0.0);
        assert_eq!(node.state, NodeState::Open);
    }

    #[test]
    fn alloc_children_advances_state() {
        let params = GrowerParams::default();
        let mut arena = GrowthArena::with_capacity(8);
        let root = arena.init_root(&[1.0, -1.0], &[1.0; 2], &params);

        let (left, right) = arena.alloc_children(root);

        assert_eq!(arena.node(root).state, NodeState::Computing);
        assert_eq!(arena.node(root).children, Some((left, right)));
        assert_eq!(arena.node(left).depth, 1);
        assert_eq!(arena.node(right).depth, 1);
        assert_eq!(arena.node(left).state, NodeState::Open);
        assert_eq!(arena.node(left).n_instances, 0);
    }

    #[test]
    fn freeze_keeps_committed_nodes_only() {
        let params = GrowerParams::default();
        let mut arena = GrowthArena::with_capacity(8);
        let root = arena.init_root(&[1.0, -1.0], &[1.0; 2], &params);
        let (left, right) = arena.alloc_children(root);

        // Commit the root split, then give the left child an uncommitted
        // candidate of its own.
        arena.node_mut(root).split = Some(SplitRule {
            feature: 0,
            threshold: 0.5,
        });
        arena.node_mut(root).gain = 1.0;
        arena.node_mut(root).state = NodeState::Internal;
        arena.node_mut(left).weight = 1.0;
        arena.node_mut(right).weight = -1.0;
        arena.alloc_children(left);

        let tree = arena.freeze(root);

        // Root plus two children; the left child's candidates are dropped.
        assert_eq!(tree.n_nodes(), 3);
        assert!(tree.validate().is_ok());
        let split = tree.root().split.as_ref().unwrap();
        assert_eq!((split.left, split.right), (1, 2));
        assert!(tree.node(1).is_leaf());
        assert_abs_diff_eq!(tree.node(1).weight, 1.0);
        assert_abs_diff_eq!(tree.node(2).weight, -1.0);
    }

    #[test]
    fn freeze_of_unsplit_root_is_single_leaf() {
        let params = GrowerParams::default();
        let mut arena = GrowthArena::with_capacity(4);
        let root = arena.init_root(&[1.0, 1.0], &[1.0; 2], &params);
        arena.alloc_children(root);

        let tree = arena.freeze(root);
        assert_eq!(tree.n_nodes(), 1);
        assert!(tree.root().is_leaf());
    }
}
