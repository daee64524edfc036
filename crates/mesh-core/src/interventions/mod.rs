//! Intervention System
//!
//! Attack and test hooks that modify a running simulation: tampering with
//! packets, wiping inventories, draining wallets, switching nodes to
//! non-cooperative mode and reshaping the topology.
//!
//! Interventions are plain serde values, so the CLI can load a JSON schedule
//! of them and apply each one when its tick comes up.

use mesh_events::{ConnectivityChange, GeoPoint, MessageId, NodeId, PacketBody, PacketId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use crate::components::inventory::Inventory;
use crate::components::world::NodeIndex;
use crate::error::MeshError;
use crate::ledger::{EconomyTracker, TransactionKind, Wallet};
use crate::setup::jittered_position;
use crate::simulation::{opaque_digest, MeshSimulation};
use crate::SimRng;

/// Marker appended by a whole-message tamper
pub const TAMPER_MARKER: &str = " [TAMPERED]";

/// A modification to apply to the simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Intervention {
    /// Corrupt the last character (or ciphertext byte) of one packet copy
    TamperPacket { packet_id: PacketId },
    /// Append a marker to every copy of a message
    TamperMessage { message_id: MessageId },
    ClearInventories,
    DrainWallet { node_id: NodeId },
    SetAutoRelay { node_id: NodeId, auto_relay: bool },
    MoveNode {
        node_id: NodeId,
        latitude: f64,
        longitude: f64,
    },
    SetRange { node_id: NodeId, range_m: f64 },
    /// Move two groups of nodes to distant regions
    PartitionNetwork {
        group_a: Vec<NodeId>,
        group_b: Vec<NodeId>,
    },
    AddLink { a: NodeId, b: NodeId },
    RemoveLink { a: NodeId, b: NodeId },
}

/// An intervention bound to the tick it should run on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledIntervention {
    pub at_tick: u64,
    /// Why this intervention is being made
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub intervention: Intervention,
}

/// What an applied intervention did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InterventionOutcome {
    /// `original` and `tampered` are the text, or the `[HASH]` digest for
    /// sealed packets.
    PacketTampered {
        node_id: NodeId,
        original: String,
        tampered: String,
    },
    MessageTampered { copies: usize },
    InventoriesCleared { packets: usize },
    WalletDrained { node_id: NodeId, amount: i64 },
    Moved(ConnectivityChange),
    Partitioned { group_a: usize, group_b: usize },
    LinkAdded { new: bool },
    Applied,
}

/// Interventions waiting for their tick, ordered by tick
#[derive(Debug, Clone, Default)]
pub struct PendingInterventions {
    queue: Vec<ScheduledIntervention>,
}

impl PendingInterventions {
    pub fn new(mut queue: Vec<ScheduledIntervention>) -> Self {
        queue.sort_by_key(|s| s.at_tick);
        Self { queue }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Remove and return everything scheduled at or before `tick`, in order.
    pub fn take_due(&mut self, tick: u64) -> Vec<ScheduledIntervention> {
        let split = self.queue.partition_point(|s| s.at_tick <= tick);
        self.queue.drain(..split).collect()
    }
}

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("failed to read intervention schedule: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse intervention schedule: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Parse a JSON array of scheduled interventions.
pub fn parse_schedule(content: &str) -> Result<PendingInterventions, ScheduleError> {
    let items: Vec<ScheduledIntervention> = serde_json::from_str(content)?;
    Ok(PendingInterventions::new(items))
}

pub fn load_schedule(path: impl AsRef<Path>) -> Result<PendingInterventions, ScheduleError> {
    parse_schedule(&fs::read_to_string(path)?)
}

/// Corrupt the final character, or mark an empty text.
fn tamper_text(text: &str) -> String {
    let mut chars: Vec<char> = text.chars().collect();
    match chars.last_mut() {
        Some(last) => {
            *last = if *last == 'X' { 'Y' } else { 'X' };
            chars.into_iter().collect()
        }
        None => "TAMPERED".to_string(),
    }
}

/// Flip the low bit of the final byte.
fn tamper_bytes(bytes: &mut Vec<u8>) {
    match bytes.last_mut() {
        Some(last) => *last ^= 0x01,
        None => bytes.push(0),
    }
}

/// Corrupt a body in place and return its visible payload before and after.
fn tamper_body(body: &mut PacketBody) -> (String, String) {
    if let PacketBody::Signed { text, .. } | PacketBody::Anonymous { text, .. } = body {
        let tampered = tamper_text(text);
        let original = std::mem::replace(text, tampered.clone());
        return (original, tampered);
    }
    let original = opaque_digest(&body.payload_bytes());
    if let PacketBody::Sealed { envelopes } = body {
        for envelope in envelopes.iter_mut() {
            tamper_bytes(&mut envelope.ciphertext);
        }
    }
    (original, opaque_digest(&body.payload_bytes()))
}

/// Append the tamper marker to the text or to every ciphertext.
fn mark_body(body: &mut PacketBody) {
    match body {
        PacketBody::Signed { text, .. } | PacketBody::Anonymous { text, .. } => {
            text.push_str(TAMPER_MARKER)
        }
        PacketBody::Sealed { envelopes } => {
            for envelope in envelopes.iter_mut() {
                envelope.ciphertext.extend_from_slice(TAMPER_MARKER.as_bytes());
            }
        }
    }
}

impl MeshSimulation {
    /// Single entry point for every intervention.
    pub fn apply(&mut self, intervention: &Intervention) -> Result<InterventionOutcome, MeshError> {
        match intervention {
            Intervention::TamperPacket { packet_id } => self.tamper_packet(*packet_id),
            Intervention::TamperMessage { message_id } => self
                .tamper_message(message_id)
                .map(|copies| InterventionOutcome::MessageTampered { copies }),
            Intervention::ClearInventories => Ok(InterventionOutcome::InventoriesCleared {
                packets: self.clear_inventories(),
            }),
            Intervention::DrainWallet { node_id } => {
                self.drain_wallet(*node_id)
                    .map(|amount| InterventionOutcome::WalletDrained {
                        node_id: *node_id,
                        amount,
                    })
            }
            Intervention::SetAutoRelay {
                node_id,
                auto_relay,
            } => self
                .set_auto_relay(*node_id, *auto_relay)
                .map(|_| InterventionOutcome::Applied),
            Intervention::MoveNode {
                node_id,
                latitude,
                longitude,
            } => self
                .set_position(*node_id, GeoPoint::new(*latitude, *longitude))
                .map(InterventionOutcome::Moved),
            Intervention::SetRange { node_id, range_m } => self
                .set_range(*node_id, *range_m)
                .map(|_| InterventionOutcome::Applied),
            Intervention::PartitionNetwork { group_a, group_b } => self
                .partition_network(group_a, group_b)
                .map(|(a, b)| InterventionOutcome::Partitioned {
                    group_a: a,
                    group_b: b,
                }),
            Intervention::AddLink { a, b } => self
                .add_link(*a, *b)
                .map(|new| InterventionOutcome::LinkAdded { new }),
            Intervention::RemoveLink { a, b } => self
                .remove_link(*a, *b)
                .map(|_| InterventionOutcome::Applied),
        }
    }

    /// Apply every intervention due at the current tick. Failures are logged
    /// and skipped. Returns the number applied.
    pub fn apply_due(&mut self, pending: &mut PendingInterventions) -> usize {
        let tick = self.tick();
        let mut applied = 0;
        for scheduled in pending.take_due(tick) {
            let reason = scheduled.reason.as_deref().unwrap_or("-");
            match self.apply(&scheduled.intervention) {
                Ok(outcome) => {
                    applied += 1;
                    info!(tick, reason, ?outcome, "intervention applied");
                }
                Err(e) => {
                    warn!(tick, reason, error = %e, "intervention rejected");
                }
            }
        }
        applied
    }

    /// Corrupt one packet copy in whichever inventory holds it. Sealed copies
    /// have every envelope's ciphertext altered, so targets can no longer
    /// decrypt them.
    pub fn tamper_packet(&mut self, packet_id: PacketId) -> Result<InterventionOutcome, MeshError> {
        let (node_id, _) = self
            .find_packet(packet_id)
            .ok_or(MeshError::UnknownPacket(packet_id))?;
        let mut inventory = self.component_mut::<Inventory>(node_id)?;
        let packet = inventory
            .get_mut(packet_id)
            .ok_or(MeshError::UnknownPacket(packet_id))?;

        let (original, tampered) = tamper_body(&mut packet.body);
        Ok(InterventionOutcome::PacketTampered {
            node_id,
            original,
            tampered,
        })
    }

    /// Append the tamper marker to every copy of a message. Returns the
    /// number of copies changed.
    pub fn tamper_message(&mut self, message_id: &MessageId) -> Result<usize, MeshError> {
        let mut copies = 0;
        let mut query = self.world_mut().query::<&mut Inventory>();
        for mut inventory in query.iter_mut(self.world_mut()) {
            let ids: Vec<PacketId> = inventory
                .packets()
                .iter()
                .filter(|p| &p.original_message_id == message_id)
                .map(|p| p.packet_id)
                .collect();
            for id in ids {
                if let Some(packet) = inventory.get_mut(id) {
                    mark_body(&mut packet.body);
                    copies += 1;
                }
            }
        }
        if copies == 0 {
            return Err(MeshError::UnknownMessage(message_id.clone()));
        }
        Ok(copies)
    }

    /// Empty every inventory. Known message ids survive. Returns the number
    /// of packets removed.
    pub fn clear_inventories(&mut self) -> usize {
        let mut query = self.world_mut().query::<&mut Inventory>();
        query
            .iter_mut(self.world_mut())
            .map(|mut inventory| inventory.clear())
            .sum()
    }

    /// Zero a wallet, as if its credits had been exhausted. Returns the
    /// amount removed.
    pub fn drain_wallet(&mut self, node: NodeId) -> Result<i64, MeshError> {
        let amount = self.component_mut::<Wallet>(node)?.drain();
        if amount > 0 {
            self.world_mut()
                .resource_mut::<EconomyTracker>()
                .record(TransactionKind::Drain, amount);
        }
        Ok(amount)
    }

    /// Scatter `group_a` around one distant region and `group_b` around
    /// another, far beyond any radio range. Explicit links are untouched.
    pub fn partition_network(
        &mut self,
        group_a: &[NodeId],
        group_b: &[NodeId],
    ) -> Result<(usize, usize), MeshError> {
        let mut seen = BTreeSet::new();
        {
            let index = self.world().resource::<NodeIndex>();
            for &id in group_a.iter().chain(group_b) {
                if !index.contains(id) {
                    return Err(MeshError::UnknownNode(id));
                }
                if !seen.insert(id) {
                    return Err(MeshError::invalid(format!(
                        "node {} appears more than once in the partition",
                        id
                    )));
                }
            }
        }

        let placement = self.config().placement.clone();
        let moves: Vec<(NodeId, GeoPoint)> = {
            let mut rng = self.world_mut().resource_mut::<SimRng>();
            group_a
                .iter()
                .map(|&id| (id, placement.partition_a))
                .chain(group_b.iter().map(|&id| (id, placement.partition_b)))
                .map(|(id, center)| {
                    (
                        id,
                        jittered_position(center, placement.partition_jitter_deg, &mut rng.0),
                    )
                })
                .collect()
        };
        for (id, position) in moves {
            self.set_position(id, position)?;
        }

        info!(
            group_a = group_a.len(),
            group_b = group_b.len(),
            "network partitioned"
        );
        Ok((group_a.len(), group_b.len()))
    }
}
