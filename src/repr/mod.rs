//! Finalized regression tree representation.

/// Node identifier: an index into a tree's contiguous node storage.
pub type NodeId = u32;

/// Index of the root node in every tree.
pub const ROOT: NodeId = 0;

pub mod tree;

pub use tree::{NodeSplit, SplitRule, Tree, TreeNode, TreeValidationError};
