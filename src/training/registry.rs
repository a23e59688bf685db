//! Open-leaf registry and per-instance routing.
//!
//! The registry is the live working set of growth: an indexed, capacity-
//! bounded collection of the currently-open leaves, plus a per-row index of
//! the slot owning that row. Row lookup and re-routing are O(1).
//!
//! Committing a split replaces slots in place: the new left child takes the
//! next free slot and the right child overwrites the slot of the leaf that
//! was split. Rows moving left are found by scanning only the split
//! column's non-default list; every other row keeps its slot index and is
//! thereby implicitly routed to the right child.

use crate::data::ColumnarDataset;
use crate::repr::{NodeId, SplitRule};

/// Open-leaf slots plus the instance router.
#[derive(Debug)]
pub struct LeafRegistry {
    /// Slot -> node id of the open leaf occupying it.
    leaves: Vec<NodeId>,
    /// Row -> slot index.
    row_slot: Vec<u32>,
    max_leaves: usize,
}

impl LeafRegistry {
    /// Registry with all rows routed to `root` in slot 0.
    pub fn new(max_leaves: usize, n_rows: usize, root: NodeId) -> Self {
        let mut leaves = Vec::with_capacity(max_leaves);
        leaves.push(root);
        Self {
            leaves,
            row_slot: vec![0; n_rows],
            max_leaves,
        }
    }

    /// Slot currently owning `row`.
    #[inline]
    pub fn slot_of_row(&self, row: u32) -> usize {
        self.row_slot[row as usize] as usize
    }

    /// Node occupying `slot`.
    #[inline]
    pub fn node_at(&self, slot: usize) -> NodeId {
        self.leaves[slot]
    }

    /// Number of open leaves.
    #[inline]
    pub fn n_leaves(&self) -> usize {
        self.leaves.len()
    }

    /// Whether the leaf budget is exhausted.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.leaves.len() >= self.max_leaves
    }

    /// Materialize a committed split.
    ///
    /// Rows owned by `slot` that satisfy `rule` on the split column move to
    /// a fresh slot holding `left`; `right` overwrites `slot` and inherits
    /// the remaining rows without being visited. Returns the new left slot.
    pub fn commit_split(
        &mut self,
        slot: usize,
        left: NodeId,
        right: NodeId,
        data: &ColumnarDataset,
        rule: &SplitRule,
    ) -> usize {
        debug_assert!(!self.is_full());

        let new_slot = self.leaves.len() as u32;
        let old_slot = slot as u32;
        for (row, value) in data.column(rule.feature as usize).entries() {
            if self.row_slot[row as usize] == old_slot && rule.goes_left(data.mode(), value) {
                self.row_slot[row as usize] = new_slot;
            }
        }

        self.leaves.push(left);
        self.leaves[slot] = right;
        new_slot as usize
    }
}
