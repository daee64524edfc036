//! World Setup
//!
//! Node placement and spawning.

pub mod nodes;

pub use nodes::*;
