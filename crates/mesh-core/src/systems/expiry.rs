//! Expiry System
//!
//! Drops packets past their TTL and enforces the inventory size cap.

use bevy_ecs::prelude::*;
use tracing::debug;

use crate::components::inventory::Inventory;
use crate::components::node::Node;
use crate::components::world::{SimClock, TickReport};
use crate::config::MeshConfig;

/// System: TTL cleanup, then truncate each inventory to the cap
pub fn expire_packets(
    config: Res<MeshConfig>,
    clock: Res<SimClock>,
    mut report: ResMut<TickReport>,
    mut inventories: Query<(&Node, &mut Inventory)>,
) {
    let ttl_ms = config.inventory.ttl_ms();
    for (node, mut inventory) in inventories.iter_mut() {
        let expired = inventory.expire(clock.now_ms, ttl_ms);
        let evicted = inventory.enforce_cap(config.inventory.max_size);
        if expired > 0 || evicted > 0 {
            debug!(node = %node.0, expired, evicted, "inventory cleanup");
        }
        report.0.expired += expired;
        report.0.evicted += evicted;
    }
}
