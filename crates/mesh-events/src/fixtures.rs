//! Sample data fixtures for testing.
//!
//! This module provides ready-made packets for other crates to use.
//! Enable the `test-fixtures` feature to access these helpers.
//!
//! # Example
//!
//! ```ignore
//! // In your Cargo.toml:
//! // [dev-dependencies]
//! // mesh-events = { path = "../mesh-events", features = ["test-fixtures"] }
//!
//! use mesh_events::fixtures;
//!
//! let batch = fixtures::packet_batch(8);
//! ```

use crate::{MessageId, NodeId, Packet, PacketBody};

/// A Safe packet published by `publisher` at simulated time `created_at_ms`.
pub fn safe_packet(id: &str, publisher: u32, created_at_ms: u64) -> Packet {
    Packet::originate(
        MessageId::from(id),
        NodeId(publisher),
        vec![NodeId(publisher)],
        created_at_ms,
        PacketBody::Anonymous {
            text: format!("safe report {}", id),
            proof: "fixture-proof".to_string(),
        },
    )
}

/// A Help packet with a placeholder signature.
pub fn help_packet(id: &str, publisher: u32, targets: &[u32]) -> Packet {
    Packet::originate(
        MessageId::from(id),
        NodeId(publisher),
        targets.iter().copied().map(NodeId).collect(),
        0,
        PacketBody::Signed {
            text: format!("need help {}", id),
            signature: vec![7; 64],
        },
    )
}

/// `count` distinct Safe packets held by node 1.
pub fn packet_batch(count: usize) -> Vec<Packet> {
    (0..count)
        .map(|i| safe_packet(&format!("batch_{:03}", i), 1, 0))
        .collect()
}
