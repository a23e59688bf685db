//! Leaf-wise tree growth.
//!
//! The [`TreeGrower`] drives the build: a [`GrowthArena`](node::GrowthArena)
//! holds the working nodes, the [`LeafRegistry`](registry::LeafRegistry)
//! tracks open leaves and instance routing, and the
//! [`Splitter`](splitter::Splitter) performs the per-iteration column scan.

pub mod grower;
pub mod node;
pub mod params;
pub mod registry;
pub mod splitter;

pub use grower::TreeGrower;
pub use node::{GrowthArena, GrowthNode, NodeState};
pub use params::{GrowerParams, ParamError};
pub use registry::LeafRegistry;
pub use splitter::Splitter;
