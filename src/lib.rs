//! sapling: leaf-wise regression tree growing for gradient boosting.
//!
//! Grows one regression tree per call from per-instance gradients and
//! hessians, the way a boosting round consumes it: the training set is
//! partitioned into leaves minimizing a regularized loss, yielding a
//! per-instance prediction vector and a [`Tree`] that can score unseen data
//! and be persisted as tab-separated text.
//!
//! # Key Types
//!
//! - [`TreeGrower`] / [`GrowerParams`] - one-tree training
//! - [`ColumnarDataset`] - sparse columnar view of the training features
//! - [`Tree`] - finalized tree with batch scoring via
//!   [`Tree::predict_into`]
//! - [`persist`] - tabular text serialization
//!
//! # Example
//!
//! ```
//! use sapling::{ColumnarDataset, GrowerParams, TreeGrower};
//!
//! // Four instances, one continuous feature, entries in descending
//! // value order.
//! let data = ColumnarDataset::continuous(
//!     4,
//!     vec![(vec![1, 3, 2, 0], vec![0.9, 0.8, 0.2, 0.1])],
//! )
//! .unwrap();
//! let grads = [1.0, -1.0, 1.0, -1.0];
//! let hess = [1.0; 4];
//! let mut predictions = [0.0; 4];
//!
//! let grower = TreeGrower::new(GrowerParams {
//!     reg_weight: 0.0,
//!     max_leaves: 2,
//!     ..Default::default()
//! });
//! let tree = grower
//!     .grow(&data, &grads, &hess, &mut predictions)
//!     .expect("a beneficial split exists");
//!
//! assert_eq!(predictions, [-1.0, 1.0, -1.0, 1.0]);
//!
//! // Scoring the training view reproduces the training-time vector.
//! let mut scores = [0.0; 4];
//! tree.predict_into(&data, &mut scores);
//! assert_eq!(scores, predictions);
//! ```
//!
//! A round with no beneficial split (or a leaf budget below 2) returns
//! `None` and leaves the prediction buffer untouched; the caller treats it
//! as "no model this round", not as a failure.

pub mod data;
pub mod inference;
pub mod persist;
pub mod repr;
pub mod training;

pub use data::{ColumnarDataset, ColumnView, DatasetError, FeatureMode};
pub use persist::PersistError;
pub use repr::{NodeId, NodeSplit, SplitRule, Tree, TreeNode, TreeValidationError};
pub use training::{GrowerParams, ParamError, TreeGrower};
