//! View Types
//!
//! Records returned to the transport layer: inventories, node listings,
//! connectivity and verification results.

use serde::{Deserialize, Serialize};

use crate::ids::{MessageId, NodeId, PacketId};
use crate::location::GeoPoint;
use crate::packet::{MessageClass, NetworkKind};

/// Public description of a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSummary {
    pub node_id: NodeId,
    pub name: String,
    pub position: GeoPoint,
    pub range_m: f64,
    pub auto_relay: bool,
}

/// One inventory entry as seen by the holding node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacketView {
    pub packet_id: PacketId,
    pub original_message_id: MessageId,
    pub publisher_id: NodeId,
    pub target_ids: Vec<NodeId>,
    pub history: Vec<NodeId>,
    pub path_string: String,
    pub class: MessageClass,
    /// Holder is one of the targets
    pub can_decrypt: bool,
    /// Plain text for targets, an opaque digest for everyone else
    pub content: String,
}

/// A node's inventory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryView {
    pub node_id: NodeId,
    pub node_name: String,
    pub location: GeoPoint,
    pub range_m: f64,
    pub packets: Vec<PacketView>,
    pub packet_count: usize,
}

/// A peer and its distance in metres
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerDistance {
    pub node_id: NodeId,
    pub distance_m: f64,
    pub range_m: f64,
}

/// A peer reachable over an explicit link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedPeer {
    pub node_id: NodeId,
    pub position: GeoPoint,
}

/// Connectivity of one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkView {
    pub node_id: NodeId,
    pub position: GeoPoint,
    pub broadcast_range_m: f64,
    /// Peers inside this node's broadcast range
    pub nodes_in_my_range: Vec<PeerDistance>,
    /// Peers whose own range covers this node
    pub nodes_that_can_reach_me: Vec<PeerDistance>,
    pub nodes_connected: Vec<LinkedPeer>,
}

/// Range-only connectivity change caused by a move
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectivityChange {
    pub node_id: NodeId,
    pub old_position: GeoPoint,
    pub new_position: GeoPoint,
    pub lost_connections: Vec<NodeId>,
    pub new_connections: Vec<NodeId>,
}

/// Result of a successful publish
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishReceipt {
    pub message_id: MessageId,
    pub packet_id: PacketId,
    pub publisher_node_id: NodeId,
    pub class: MessageClass,
    pub network: NetworkKind,
    pub send_cost: i64,
    pub remaining_balance: i64,
    pub created_at_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof: Option<String>,
}

/// Result of checking a Help message signature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureCheck {
    pub message_id: MessageId,
    pub publisher_id: NodeId,
    pub signature_valid: bool,
    pub message_text: String,
}

/// A node's cryptographic identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoInfo {
    pub node_id: NodeId,
    /// Short id derived from the signing public key
    pub public_key_id: String,
    pub known_messages_count: usize,
    /// Peers whose public keys this node holds
    pub peer_count: usize,
}

/// Result of checking a Safe message proof
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofCheck {
    pub message_id: MessageId,
    pub proof_valid: bool,
    pub publisher: String,
    pub message_text: String,
}
