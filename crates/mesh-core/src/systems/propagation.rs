//! Propagation System
//!
//! Flooding with loop prevention and ledger settlement.
//!
//! For every ordered pair of nodes (A, B) in contact, a cooperative A offers
//! each of its outbound packets to B. A copy is delivered when B is not in the
//! packet's history and B does not already hold that exact copy. Each
//! delivered copy pays A the relay reward for its class, credits the hop
//! before A with a successful relay by A, and records a send from A to B.
//!
//! Contact is decided from positions and ranges snapshotted at the start of
//! the phase, and each sender's outbound set is taken before it is offered,
//! so copies delivered during this tick are only forwarded on the next one.

use bevy_ecs::prelude::*;
use mesh_events::{DeliveryEvent, GeoPoint, NodeId, Packet};
use tracing::{debug, trace, warn};

use crate::components::inventory::{Inventory, Outbound};
use crate::components::node::{Position, Radio};
use crate::components::world::{DeliveryLog, LinkSet, NodeIndex, SimClock, TickReport};
use crate::config::MeshConfig;
use crate::geo::great_circle_distance;
use crate::ledger::{EconomyTracker, TransactionKind, Wallet};
use crate::reputation::ReputationRecord;

/// Snapshot of one node's placement for contact evaluation
#[derive(Debug, Clone, Copy)]
struct Station {
    id: NodeId,
    entity: Entity,
    position: GeoPoint,
    radio: Radio,
}

/// Whether `from` can deliver to `to` this tick.
fn in_contact(from: &Station, to: &Station, links: &LinkSet) -> bool {
    from.radio.covers(great_circle_distance(from.position, to.position))
        || links.contains(from.id, to.id)
}

/// A packet may only be forwarded by the node its history says holds it.
fn forwardable(packet: &Packet, holder: NodeId) -> bool {
    packet.is_well_formed() && packet.holder() == Some(holder)
}

fn relay_kind(packet: &Packet) -> TransactionKind {
    if packet.class().is_safety() {
        TransactionKind::SafetyRelay
    } else {
        TransactionKind::LogisticsRelay
    }
}

/// System: flood outbound packets across every contact
#[allow(clippy::too_many_arguments)]
pub fn propagate_packets(
    config: Res<MeshConfig>,
    clock: Res<SimClock>,
    index: Res<NodeIndex>,
    links: Res<LinkSet>,
    mut economy: ResMut<EconomyTracker>,
    mut report: ResMut<TickReport>,
    mut deliveries: ResMut<DeliveryLog>,
    placements: Query<(&Position, &Radio)>,
    mut nodes: Query<(&mut Inventory, &mut Outbound, &mut Wallet, &mut ReputationRecord)>,
) {
    let stations: Vec<Station> = index
        .iter()
        .filter_map(|(id, entity)| {
            placements.get(entity).ok().map(|(position, radio)| Station {
                id,
                entity,
                position: position.0,
                radio: *radio,
            })
        })
        .collect();

    for sender in &stations {
        let outbound = match nodes.get_mut(sender.entity) {
            Ok((_, mut outbound, _, _)) => std::mem::take(&mut outbound.0),
            Err(_) => continue,
        };
        if !sender.radio.auto_relay || outbound.is_empty() {
            continue;
        }

        let packets: Vec<Packet> = outbound
            .into_iter()
            .filter(|p| {
                let ok = forwardable(p, sender.id);
                if !ok {
                    warn!(node = %sender.id, packet = %p.packet_id, "skipping malformed packet");
                }
                ok
            })
            .collect();

        for receiver in &stations {
            if receiver.id == sender.id || !in_contact(sender, receiver, &links) {
                continue;
            }
            for packet in &packets {
                deliver(
                    &config,
                    clock.tick,
                    &index,
                    sender,
                    receiver,
                    packet,
                    &mut nodes,
                    &mut economy,
                    &mut report,
                    &mut deliveries,
                );
            }
        }
    }

    // Deliveries can push an inventory past the cap within the tick
    for (mut inventory, _, _, _) in nodes.iter_mut() {
        report.0.evicted += inventory.enforce_cap(config.inventory.max_size);
    }

    let summary = &report.0;
    debug!(
        tick = summary.tick,
        delivered = summary.delivered,
        duplicates = summary.duplicates_skipped,
        lost = summary.contention_lost,
        expired = summary.expired,
        rewards = summary.relay_rewards,
        "tick complete"
    );
}

/// Offer one packet from `sender` to `receiver`, settling on delivery.
#[allow(clippy::too_many_arguments)]
fn deliver(
    config: &MeshConfig,
    tick: u64,
    index: &NodeIndex,
    sender: &Station,
    receiver: &Station,
    packet: &Packet,
    nodes: &mut Query<(&mut Inventory, &mut Outbound, &mut Wallet, &mut ReputationRecord)>,
    economy: &mut EconomyTracker,
    report: &mut TickReport,
    deliveries: &mut DeliveryLog,
) {
    if packet.has_visited(receiver.id) {
        return;
    }
    let Ok((mut inventory, _, _, _)) = nodes.get_mut(receiver.entity) else {
        return;
    };
    if inventory.holds_relay_of(packet, receiver.id) {
        report.0.duplicates_skipped += 1;
        return;
    }
    let Some(copy) = packet.relay_to(receiver.id) else {
        return;
    };

    let reward = config.economy.relay_reward(packet.class());
    let event = DeliveryEvent::for_copy(tick, &copy, reward);
    inventory.insert(copy);

    if let Ok((_, _, mut wallet, mut reputation)) = nodes.get_mut(sender.entity) {
        wallet.add(reward);
        reputation.record_sent(receiver.id);
    }
    if reward > 0 {
        economy.record(relay_kind(packet), reward);
    }

    // The hop that handed this packet to the sender sees it relayed onward
    if let Some(previous) = packet.previous_hop() {
        if previous != packet.publisher_id {
            if let Some(entity) = index.get(previous) {
                if let Ok((_, _, _, mut reputation)) = nodes.get_mut(entity) {
                    reputation.record_relayed(sender.id);
                }
            }
        }
    }

    report.0.delivered += 1;
    report.0.relay_rewards += reward;
    if let Some(event) = event {
        trace!(
            message = %event.message_id,
            from = %event.from,
            to = %event.to,
            hops = event.hops,
            "delivered"
        );
        deliveries.push(event);
    }
}
