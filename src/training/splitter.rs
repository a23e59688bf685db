//! Greedy split search over all open leaves.
//!
//! One [`Splitter::search`] call performs a single pass over every dataset
//! column and returns the registry slot of the open leaf whose best split
//! has the strictly largest positive gain, or `None` when no beneficial
//! split exists. The cost of a call is proportional to the total number of
//! non-default column entries, independent of how many leaves are open.
//!
//! Per leaf, the candidate left partition is accumulated on the leaf's
//! tentative left child while the column's entries are folded in list
//! order. Before a row is folded, the split "explicit values so far vs
//! everything else" is scored against the leaf's best gain; the accepted
//! threshold is the midpoint between the accepted value and the default
//! threshold [`BINARY_PRESENT`], which is re-armed on every visited row
//! (each explicit value is compared against the fixed default, not against
//! its predecessor in the sweep). After a column is exhausted, leaves still
//! computing are scored once more against an all-default right side and
//! their accumulators reset for the next column.
//!
//! Leaves whose decision was frozen in an earlier growth iteration are
//! skipped wholesale; their instance sets cannot have changed. Fold order
//! within a leaf is part of the contract: it decides which candidate
//! becomes "best so far".

use crate::data::{ColumnarDataset, FeatureMode, BINARY_PRESENT};
use crate::repr::SplitRule;

use super::node::{GrowthArena, NodeState};
use super::params::GrowerParams;
use super::registry::LeafRegistry;

/// Value representing the implicit right side of the synthetic end-of-column
/// candidate: every unlisted row holds the column default.
const COLUMN_DEFAULT: f32 = 0.0;

/// One-iteration split search over the open-leaf registry.
pub struct Splitter<'a> {
    params: &'a GrowerParams,
}

impl<'a> Splitter<'a> {
    pub fn new(params: &'a GrowerParams) -> Self {
        Self { params }
    }

    /// Scan all columns once and pick the best leaf to split.
    ///
    /// Returns the slot of the winning leaf, or `None` when no open leaf
    /// has a positive-gain split (the assembler's stop signal).
    pub fn search(
        &self,
        arena: &mut GrowthArena,
        registry: &LeafRegistry,
        data: &ColumnarDataset,
        grads: &[f64],
        hess: &[f64],
    ) -> Option<usize> {
        for feature in 0..data.n_columns() {
            self.scan_column(feature, arena, registry, data, grads, hess);
            self.close_column(feature, arena, registry);
        }
        self.finish(arena, registry)
    }

    /// Fold one column's non-default entries into the per-leaf accumulators,
    /// scoring explicit-value candidates along the way.
    fn scan_column(
        &self,
        feature: usize,
        arena: &mut GrowthArena,
        registry: &LeafRegistry,
        data: &ColumnarDataset,
        grads: &[f64],
        hess: &[f64],
    ) {
        let mode = data.mode();
        for (row, value) in data.column(feature).entries() {
            let parent = registry.node_at(registry.slot_of_row(row));
            if arena.node(parent).state == NodeState::Open {
                arena.alloc_children(parent);
            }

            let node = arena.node(parent);
            if node.state != NodeState::Computing
                || node.depth >= self.params.max_depth
                || node.n_instances < 2 * self.params.min_samples_leaf
            {
                continue;
            }
            let Some((left, _)) = node.children else {
                continue;
            };

            // Re-arm the default threshold for this row.
            arena.node_mut(left).last_value = BINARY_PRESENT;
            if mode == FeatureMode::Continuous {
                if value < BINARY_PRESENT
                    && arena.node(left).n_instances >= self.params.min_samples_leaf
                {
                    self.try_candidate(arena, parent, feature as u32, value);
                }
                arena.node_mut(left).last_value = value;
            }

            let accum = arena.node_mut(left);
            accum.n_instances += 1;
            accum.sum_grad += grads[row as usize];
            accum.sum_hess += hess[row as usize];
        }
    }

    /// Score the all-default candidate for leaves still computing, then
    /// reset their accumulators for the next column.
    fn close_column(&self, feature: usize, arena: &mut GrowthArena, registry: &LeafRegistry) {
        for slot in 0..registry.n_leaves() {
            let parent = registry.node_at(slot);
            if arena.node(parent).state != NodeState::Computing {
                continue;
            }
            self.try_candidate(arena, parent, feature as u32, COLUMN_DEFAULT);

            let Some((left, _)) = arena.node(parent).children else {
                continue;
            };
            let accum = arena.node_mut(left);
            accum.n_instances = 0;
            accum.sum_grad = 0.0;
            accum.sum_hess = 0.0;
        }
    }

    /// Score splitting `parent` at `value` against its current best.
    ///
    /// The candidate left side is the live accumulator; the right side is
    /// derived from the parent by subtraction. Gain is recomputed from the
    /// current accumulator state every time. On a win the parent records the
    /// rule and the right child snapshots the complementary statistics; the
    /// accumulator keeps running, so the snapshot is what the later
    /// complementary derivation subtracts.
    fn try_candidate(&self, arena: &mut GrowthArena, parent: u32, feature: u32, value: f32) {
        let node = arena.node(parent);
        let Some((left_id, right_id)) = node.children else {
            return;
        };
        let (parent_n, parent_grad, parent_hess) =
            (node.n_instances, node.sum_grad, node.sum_hess);
        let (parent_loss, parent_gain) = (node.loss, node.gain);

        let left = arena.node(left_id);
        let left_loss = self.params.leaf_loss(left.sum_grad, left.sum_hess);
        let right_n = parent_n - left.n_instances;
        let right_grad = parent_grad - left.sum_grad;
        let right_hess = parent_hess - left.sum_hess;
        let right_loss = self.params.leaf_loss(right_grad, right_hess);

        let gain = parent_loss - left_loss - right_loss;
        if gain > parent_gain {
            let threshold = (value + left.last_value) / 2.0;

            let node = arena.node_mut(parent);
            node.gain = gain;
            node.split = Some(SplitRule { feature, threshold });

            let right = arena.node_mut(right_id);
            right.n_instances = right_n;
            right.sum_grad = right_grad;
            right.sum_hess = right_hess;
            right.loss = right_loss;
            right.weight = self.params.leaf_weight(right_grad, right_hess);
        }
    }

    /// Finalize every leaf still computing by complementary derivation and
    /// select the winner.
    fn finish(&self, arena: &mut GrowthArena, registry: &LeafRegistry) -> Option<usize> {
        let mut best: Option<usize> = None;
        let mut best_gain = 0.0;

        for slot in 0..registry.n_leaves() {
            let parent = registry.node_at(slot);
            if arena.node(parent).state == NodeState::Computing {
                self.derive_left(arena, parent);
            }
            // Strict comparison: ties keep the earlier slot.
            let gain = arena.node(parent).gain;
            if gain > best_gain {
                best_gain = gain;
                best = Some(slot);
            }
        }

        best
    }

    /// Complementary derivation: the left child's statistics are the parent
    /// minus the right-side snapshot, enforcing the conservation law even
    /// when no explicit update ever ran. Freezes the leaf's decision.
    fn derive_left(&self, arena: &mut GrowthArena, parent: u32) {
        let node = arena.node(parent);
        let Some((left_id, right_id)) = node.children else {
            return;
        };
        let (parent_n, parent_grad, parent_hess) =
            (node.n_instances, node.sum_grad, node.sum_hess);

        let right = arena.node(right_id);
        let n = parent_n - right.n_instances;
        let sum_grad = parent_grad - right.sum_grad;
        let sum_hess = parent_hess - right.sum_hess;

        let left = arena.node_mut(left_id);
        left.n_instances = n;
        left.sum_grad = sum_grad;
        left.sum_hess = sum_hess;
        left.weight = self.params.leaf_weight(sum_grad, sum_hess);
        left.loss = self.params.leaf_loss(sum_grad, sum_hess);

        arena.node_mut(parent).state = NodeState::Computed;
    }
}
