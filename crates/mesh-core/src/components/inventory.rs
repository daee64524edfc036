//! Packet Store
//!
//! Each node owns an ordered inventory of packet copies, oldest arrival first,
//! plus the set of message ids it has ever accepted.

use bevy_ecs::prelude::*;
use mesh_events::{MessageId, NodeId, Packet, PacketId};
use std::collections::BTreeSet;

/// Component: a node's packets
#[derive(Component, Debug, Clone, Default)]
pub struct Inventory {
    packets: Vec<Packet>,
    known_messages: BTreeSet<MessageId>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn packets(&self) -> &[Packet] {
        &self.packets
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub fn known_messages(&self) -> &BTreeSet<MessageId> {
        &self.known_messages
    }

    pub fn knows(&self, message_id: &MessageId) -> bool {
        self.known_messages.contains(message_id)
    }

    /// Whether an entry with the same message id and history is present.
    pub fn holds_copy(&self, packet: &Packet) -> bool {
        self.packets.iter().any(|p| p.same_copy(packet))
    }

    /// Whether `source.relay_to(next)` would duplicate a held entry.
    pub fn holds_relay_of(&self, source: &Packet, next: NodeId) -> bool {
        self.packets.iter().any(|p| source.would_duplicate(next, p))
    }

    /// Append `packet` unless an identical copy is already held.
    pub fn insert(&mut self, packet: Packet) -> bool {
        if self.holds_copy(&packet) {
            return false;
        }
        self.known_messages.insert(packet.original_message_id.clone());
        self.packets.push(packet);
        true
    }

    pub fn get(&self, packet_id: PacketId) -> Option<&Packet> {
        self.packets.iter().find(|p| p.packet_id == packet_id)
    }

    pub fn get_mut(&mut self, packet_id: PacketId) -> Option<&mut Packet> {
        self.packets.iter_mut().find(|p| p.packet_id == packet_id)
    }

    /// Drop packets whose age at `now_ms` has reached `ttl_ms`. Returns the number removed.
    pub fn expire(&mut self, now_ms: u64, ttl_ms: u64) -> usize {
        let before = self.packets.len();
        self.packets.retain(|p| p.age_ms(now_ms) < ttl_ms);
        before - self.packets.len()
    }

    /// Evict oldest arrivals until at most `max_size` remain. Returns the number removed.
    pub fn enforce_cap(&mut self, max_size: usize) -> usize {
        let excess = self.packets.len().saturating_sub(max_size);
        self.packets.drain(..excess);
        excess
    }

    /// Remove every packet. Known message ids are kept.
    pub fn clear(&mut self) -> usize {
        let removed = self.packets.len();
        self.packets.clear();
        removed
    }

    /// Forget everything, including known message ids.
    pub fn reset(&mut self) {
        self.packets.clear();
        self.known_messages.clear();
    }
}

/// Component: packets that won contention this tick and may be forwarded
#[derive(Component, Debug, Clone, Default)]
pub struct Outbound(pub Vec<Packet>);
