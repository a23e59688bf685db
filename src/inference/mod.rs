//! Batch tree evaluation over a columnar dataset.
//!
//! Scoring reuses the column-scan routing technique of training-time
//! instance re-routing rather than a per-row root-to-leaf descent: for each
//! internal node on the frontier, one pass over its split column moves the
//! listed rows that satisfy the predicate to the left child, then a sweep
//! over the remaining frontier moves everything else right. The router
//! cannot know which rows hold a column's default value, so the default
//! direction is resolved by elimination.

use crate::data::ColumnarDataset;
use crate::repr::{NodeId, Tree, ROOT};

impl Tree {
    /// Route every row of `data` to a leaf and write the leaf weight into
    /// `out`.
    ///
    /// The dataset must follow the same columnar contract as training but
    /// may differ in row count and content. Does nothing when the tree is a
    /// single leaf or `out` is empty.
    ///
    /// # Panics
    ///
    /// Panics if `out.len()` differs from `data.n_rows()`.
    pub fn predict_into(&self, data: &ColumnarDataset, out: &mut [f64]) {
        if self.root().is_leaf() || out.is_empty() {
            return;
        }
        let n_rows = out.len();
        assert_eq!(n_rows, data.n_rows());

        let mut routed: Vec<NodeId> = vec![ROOT; n_rows];
        // Worklist of (internal node, rows currently routed to it).
        let mut frontier: Vec<(NodeId, usize)> = vec![(ROOT, n_rows)];

        while let Some((id, live)) = frontier.pop() {
            let split = self.node(id).split.as_ref().expect("frontier is internal");

            let mut left_count = 0;
            for (row, value) in data.column(split.rule.feature as usize).entries() {
                let row = row as usize;
                if routed[row] == id && split.rule.goes_left(data.mode(), value) {
                    routed[row] = split.left;
                    left_count += 1;
                }
            }
            // Rows still here hold the column default: route them right.
            for node in routed.iter_mut() {
                if *node == id {
                    *node = split.right;
                }
            }
            let right_count = live - left_count;

            if left_count > 0 && !self.node(split.left).is_leaf() {
                frontier.push((split.left, left_count));
            }
            if right_count > 0 && !self.node(split.right).is_leaf() {
                frontier.push((split.right, right_count));
            }
        }

        for (row, node) in routed.iter().enumerate() {
            out[row] = self.node(*node).weight;
        }
    }
}
