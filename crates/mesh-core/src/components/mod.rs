//! ECS Components
//!
//! Node components (identity, radio, inventory) and the world resources.

pub mod inventory;
pub mod node;
pub mod world;

pub use inventory::*;
pub use node::*;
pub use world::*;
