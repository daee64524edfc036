//! Node Components
//!
//! Identity, placement and radio settings of a mesh node.

use bevy_ecs::prelude::*;
use mesh_events::{GeoPoint, NodeId};
use serde::{Deserialize, Serialize};

/// Component identifying an entity as a mesh node
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Node(pub NodeId);

/// Human-readable name for a node
#[derive(Component, Debug, Clone, Serialize, Deserialize)]
pub struct NodeName(pub String);

impl NodeName {
    pub fn for_id(id: NodeId) -> Self {
        Self(format!("Node {}", id))
    }
}

/// A node's current location
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position(pub GeoPoint);

/// Radio settings
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Radio {
    /// Broadcast radius in metres
    pub range_m: f64,
    /// Cooperation flag. A node with auto-relay off forwards nothing.
    pub auto_relay: bool,
}

impl Radio {
    pub fn new(range_m: f64) -> Self {
        Self {
            range_m,
            auto_relay: true,
        }
    }

    pub fn covers(&self, distance_m: f64) -> bool {
        distance_m <= self.range_m
    }
}
