//! Delivery Events
//!
//! One record per packet copy accepted into a destination inventory.
//! Serialized one per line (JSONL) by the event logger.

use serde::{Deserialize, Serialize};

use crate::ids::{MessageId, NodeId, PacketId};
use crate::packet::{MessageClass, Packet};

/// A packet copy delivered from one node to another
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryEvent {
    pub tick: u64,
    pub message_id: MessageId,
    pub packet_id: PacketId,
    pub class: MessageClass,
    pub from: NodeId,
    pub to: NodeId,
    pub hops: usize,
    pub reward: i64,
}

impl DeliveryEvent {
    /// Describe the delivery of `copy`, whose last two history entries are
    /// the sender and the receiver.
    pub fn for_copy(tick: u64, copy: &Packet, reward: i64) -> Option<Self> {
        Some(Self {
            tick,
            message_id: copy.original_message_id.clone(),
            packet_id: copy.packet_id,
            class: copy.class(),
            from: copy.previous_hop()?,
            to: copy.holder()?,
            hops: copy.hop_count(),
            reward,
        })
    }

    /// Serializes the event to a JSON line (for JSONL format).
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes an event from a JSON line.
    pub fn from_jsonl(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}
