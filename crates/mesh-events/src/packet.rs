//! Packet Types
//!
//! The packet envelope carried through the mesh and its per-class body.
//!
//! A packet is never edited in place by the propagation engine: relaying a
//! packet produces a new copy with a fresh [`PacketId`] and one more entry in
//! its hop history. Two copies are the "same copy" when they share both the
//! original message id and the full history.
//!
//! # Example
//!
//! ```
//! use mesh_events::{MessageId, NodeId, Packet, PacketBody};
//!
//! let packet = Packet::originate(
//!     MessageId::from("m1"),
//!     NodeId(1),
//!     vec![NodeId(3)],
//!     0,
//!     PacketBody::Anonymous {
//!         text: "water at the gym".into(),
//!         proof: "proof".into(),
//!     },
//! );
//! assert_eq!(packet.text(), Some("water at the gym"));
//! let copy = packet.relay_to(NodeId(2)).unwrap();
//! assert_eq!(copy.history, vec![NodeId(1), NodeId(2)]);
//! assert!(copy.relay_to(NodeId(1)).is_none());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::ids::{MessageId, NodeId, PacketId};

/// Message class. Drives send cost, relay reward and the packet body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MessageClass {
    /// Encrypted point-to-point logistics traffic.
    Logistics,
    /// Public, signed request for help.
    Help,
    /// Anonymous "I am safe" broadcast. Free to send, highly rewarded to relay.
    Safe,
}

impl MessageClass {
    pub const ALL: [MessageClass; 3] = [
        MessageClass::Logistics,
        MessageClass::Help,
        MessageClass::Safe,
    ];

    /// Safety traffic earns the high relay reward.
    pub fn is_safety(self) -> bool {
        matches!(self, MessageClass::Safe)
    }

    /// Network a class travels on.
    pub fn network(self) -> NetworkKind {
        match self {
            MessageClass::Safe => NetworkKind::LoRa,
            MessageClass::Logistics | MessageClass::Help => NetworkKind::WiFi,
        }
    }
}

impl fmt::Display for MessageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageClass::Logistics => write!(f, "Logistics"),
            MessageClass::Help => write!(f, "Help"),
            MessageClass::Safe => write!(f, "Safe"),
        }
    }
}

/// Error returned when parsing an unknown message class.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("message class must be one of: Logistics, Help, Safe. Got: {0}")]
pub struct ParseClassError(pub String);

impl FromStr for MessageClass {
    type Err = ParseClassError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Logistics" => Ok(MessageClass::Logistics),
            "Help" => Ok(MessageClass::Help),
            "Safe" => Ok(MessageClass::Safe),
            other => Err(ParseClassError(other.to_string())),
        }
    }
}

/// Network tag attached to every packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NetworkKind {
    WiFi,
    LoRa,
}

impl fmt::Display for NetworkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkKind::WiFi => write!(f, "WiFi"),
            NetworkKind::LoRa => write!(f, "LoRa"),
        }
    }
}

/// Ciphertext of one logistics message for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedEnvelope {
    pub recipient: NodeId,
    pub ciphertext: Vec<u8>,
    pub nonce: [u8; 12],
}

/// Per-class packet body. Only the fields relevant to a class exist: a
/// sealed body carries no plain text at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PacketBody {
    /// Logistics: one envelope per target.
    Sealed { envelopes: Vec<SealedEnvelope> },
    /// Help: public text plus the publisher signature over it.
    Signed { text: String, signature: Vec<u8> },
    /// Safe: public text with an anonymity proof in place of an identity.
    Anonymous { text: String, proof: String },
}

impl PacketBody {
    pub fn class(&self) -> MessageClass {
        match self {
            PacketBody::Sealed { .. } => MessageClass::Logistics,
            PacketBody::Signed { .. } => MessageClass::Help,
            PacketBody::Anonymous { .. } => MessageClass::Safe,
        }
    }

    /// Readable text. `None` for sealed bodies.
    pub fn text(&self) -> Option<&str> {
        match self {
            PacketBody::Sealed { .. } => None,
            PacketBody::Signed { text, .. } | PacketBody::Anonymous { text, .. } => {
                Some(text.as_str())
            }
        }
    }

    /// Bytes a non-target can see: the text, or every ciphertext in order.
    pub fn payload_bytes(&self) -> Vec<u8> {
        match self {
            PacketBody::Sealed { envelopes } => envelopes
                .iter()
                .flat_map(|e| e.ciphertext.iter().copied())
                .collect(),
            PacketBody::Signed { text, .. } | PacketBody::Anonymous { text, .. } => {
                text.as_bytes().to_vec()
            }
        }
    }

    /// Envelope addressed to `node`, if this is a sealed body.
    pub fn envelope_for(&self, node: NodeId) -> Option<&SealedEnvelope> {
        match self {
            PacketBody::Sealed { envelopes } => envelopes.iter().find(|e| e.recipient == node),
            _ => None,
        }
    }
}

/// A packet copy held in some node's inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    pub packet_id: PacketId,
    pub original_message_id: MessageId,
    pub publisher_id: NodeId,
    pub target_ids: Vec<NodeId>,
    /// Nodes visited so far, publisher first.
    pub history: Vec<NodeId>,
    /// Simulated milliseconds at publication. Preserved across copies.
    pub created_at_ms: u64,
    pub network: NetworkKind,
    pub body: PacketBody,
}

impl Packet {
    /// Create the first copy of a message, held by its publisher.
    pub fn originate(
        original_message_id: MessageId,
        publisher_id: NodeId,
        target_ids: Vec<NodeId>,
        created_at_ms: u64,
        body: PacketBody,
    ) -> Self {
        let network = body.class().network();
        Self {
            packet_id: PacketId::new(),
            original_message_id,
            publisher_id,
            target_ids,
            history: vec![publisher_id],
            created_at_ms,
            network,
            body,
        }
    }

    pub fn class(&self) -> MessageClass {
        self.body.class()
    }

    pub fn text(&self) -> Option<&str> {
        self.body.text()
    }

    /// Node currently holding this copy (last entry of the history).
    pub fn holder(&self) -> Option<NodeId> {
        self.history.last().copied()
    }

    /// Node that handed this copy to its holder.
    pub fn previous_hop(&self) -> Option<NodeId> {
        let len = self.history.len();
        if len < 2 {
            return None;
        }
        self.history.get(len - 2).copied()
    }

    pub fn has_visited(&self, node: NodeId) -> bool {
        self.history.contains(&node)
    }

    pub fn is_target(&self, node: NodeId) -> bool {
        self.target_ids.contains(&node)
    }

    /// Number of hops travelled so far.
    pub fn hop_count(&self) -> usize {
        self.history.len().saturating_sub(1)
    }

    /// Build the copy handed to `next`. `None` when `next` was already visited.
    pub fn relay_to(&self, next: NodeId) -> Option<Packet> {
        if self.has_visited(next) {
            return None;
        }
        let mut history = Vec::with_capacity(self.history.len() + 1);
        history.extend_from_slice(&self.history);
        history.push(next);
        Some(Packet {
            packet_id: PacketId::new(),
            history,
            ..self.clone()
        })
    }

    /// Whether `other` has the same deduplication identity.
    pub fn same_copy(&self, other: &Packet) -> bool {
        self.original_message_id == other.original_message_id && self.history == other.history
    }

    /// Whether `relay_to(next)` would produce the same copy as `other`.
    pub fn would_duplicate(&self, next: NodeId, other: &Packet) -> bool {
        if self.original_message_id != other.original_message_id
            || other.history.len() != self.history.len() + 1
        {
            return false;
        }
        other.history[..self.history.len()] == self.history[..] && other.history.last() == Some(&next)
    }

    /// A well-formed history is non-empty, starts at the publisher and never
    /// repeats a node.
    pub fn is_well_formed(&self) -> bool {
        if self.history.first() != Some(&self.publisher_id) {
            return false;
        }
        self.history
            .iter()
            .enumerate()
            .all(|(i, id)| !self.history[..i].contains(id))
    }

    /// Age of this packet at simulated time `now_ms`.
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.created_at_ms)
    }

    /// History rendered as `1->2->3`.
    pub fn path_string(&self) -> String {
        self.history
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join("->")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn safe_packet() -> Packet {
        Packet::originate(
            MessageId::from("msg_1"),
            NodeId(1),
            vec![NodeId(2), NodeId(3)],
            1_000,
            PacketBody::Anonymous {
                text: "all clear at the library".to_string(),
                proof: "p".to_string(),
            },
        )
    }

    #[test]
    fn test_originate_sets_history_and_network() {
        let p = safe_packet();
        assert_eq!(p.history, vec![NodeId(1)]);
        assert_eq!(p.class(), MessageClass::Safe);
        assert_eq!(p.network, NetworkKind::LoRa);
        assert_eq!(p.holder(), Some(NodeId(1)));
        assert_eq!(p.previous_hop(), None);
    }

    #[test]
    fn test_relay_extends_history_and_preserves_creation_time() {
        let p = safe_packet();
        let copy = p.relay_to(NodeId(4)).unwrap();
        assert_eq!(copy.history, vec![NodeId(1), NodeId(4)]);
        assert_eq!(copy.created_at_ms, p.created_at_ms);
        assert_eq!(copy.original_message_id, p.original_message_id);
        assert_ne!(copy.packet_id, p.packet_id);
        assert_eq!(copy.previous_hop(), Some(NodeId(1)));
        assert_eq!(copy.hop_count(), 1);
    }

    #[test]
    fn test_relay_refuses_visited_node() {
        let p = safe_packet().relay_to(NodeId(2)).unwrap();
        assert!(p.relay_to(NodeId(1)).is_none());
        assert!(p.relay_to(NodeId(2)).is_none());
        assert!(p.relay_to(NodeId(3)).is_some());
    }

    #[test]
    fn test_dedup_identity_ignores_packet_id() {
        let p = safe_packet();
        let a = p.relay_to(NodeId(2)).unwrap();
        let b = p.relay_to(NodeId(2)).unwrap();
        assert!(a.same_copy(&b));
        assert!(p.would_duplicate(NodeId(2), &a));
        assert!(!p.would_duplicate(NodeId(3), &a));
        assert!(!a.same_copy(&p));
    }

    #[test]
    fn test_well_formed_history() {
        let mut p = safe_packet().relay_to(NodeId(2)).unwrap();
        assert!(p.is_well_formed());
        p.history.push(NodeId(1));
        assert!(!p.is_well_formed());
        p.history.clear();
        assert!(!p.is_well_formed());
    }

    #[test]
    fn test_class_parsing() {
        assert_eq!("Safe".parse::<MessageClass>(), Ok(MessageClass::Safe));
        assert_eq!("Help".parse::<MessageClass>(), Ok(MessageClass::Help));
        let err = "Urgent".parse::<MessageClass>().unwrap_err();
        assert!(err.to_string().contains("Urgent"));
    }

    #[test]
    fn test_body_serializes_with_kind_tag() {
        let body = PacketBody::Signed {
            text: "need help".to_string(),
            signature: vec![1, 2, 3],
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"kind\":\"signed\""));
    }

    #[test]
    fn test_sealed_body_has_no_text() {
        let body = PacketBody::Sealed {
            envelopes: vec![SealedEnvelope {
                recipient: NodeId(3),
                ciphertext: vec![9, 8, 7],
                nonce: [0; 12],
            }],
        };
        assert_eq!(body.text(), None);
        assert_eq!(body.payload_bytes(), vec![9, 8, 7]);
        assert!(body.envelope_for(NodeId(3)).is_some());
        assert!(body.envelope_for(NodeId(2)).is_none());

        let json = serde_json::to_string(&body).unwrap();
        assert!(!json.contains("text"));
    }

    #[test]
    fn test_path_string() {
        let p = safe_packet()
            .relay_to(NodeId(5))
            .and_then(|p| p.relay_to(NodeId(9)))
            .unwrap();
        assert_eq!(p.path_string(), "1->5->9");
    }
}
