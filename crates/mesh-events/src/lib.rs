//! Shared packet types and serialization for the mesh simulation.
//!
//! This crate contains pure data structures with no simulation logic.
//! It is a dependency for all other crates in the workspace.

pub mod event;
pub mod ids;
pub mod location;
pub mod packet;
pub mod stats;
pub mod views;

#[cfg(feature = "test-fixtures")]
pub mod fixtures;

// Re-export identifier types
pub use ids::{MessageId, NodeId, PacketId};

// Re-export location types
pub use location::GeoPoint;

// Re-export packet types
pub use packet::{
    MessageClass, NetworkKind, Packet, PacketBody, ParseClassError, SealedEnvelope,
};

// Re-export event types
pub use event::DeliveryEvent;

// Re-export stats types
pub use stats::{
    ContentionStats, EconomyStats, HealthStatus, InventoryAge, MessageStats, NodeBalance,
    PeerStats, ReputationStats, TickSummary, WalletStats,
};

// Re-export view types
pub use views::{
    ConnectivityChange, CryptoInfo, InventoryView, LinkedPeer, NetworkView, NodeSummary,
    PacketView, PeerDistance, ProofCheck, PublishReceipt, SignatureCheck,
};
