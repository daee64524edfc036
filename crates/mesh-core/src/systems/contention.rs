//! Contention System
//!
//! Runs the CRDSA/SIC resolver over every node's inventory and stores the
//! survivors as that node's outbound set for this tick.
//!
//! A collision never deletes a packet: losers stay in the inventory, skip
//! this tick's transmission and compete again on the next one.

use bevy_ecs::prelude::*;
use tracing::debug;

use crate::components::inventory::{Inventory, Outbound};
use crate::components::world::{ContentionCounters, NodeIndex, TickReport};
use crate::config::MeshConfig;
use crate::contention;
use crate::SimRng;

/// System: pick each node's outbound packets for this tick
pub fn resolve_contention(
    config: Res<MeshConfig>,
    index: Res<NodeIndex>,
    mut rng: ResMut<SimRng>,
    mut counters: ResMut<ContentionCounters>,
    mut report: ResMut<TickReport>,
    mut nodes: Query<(&Inventory, &mut Outbound)>,
) {
    // Id order keeps RNG consumption reproducible
    for (id, entity) in index.iter() {
        let Ok((inventory, mut outbound)) = nodes.get_mut(entity) else {
            continue;
        };
        let resolution = contention::resolve(&config.contention, inventory.len(), &mut rng.0);
        outbound.0 = resolution.select(inventory.packets());

        let attempted = resolution.attempted();
        let lost = resolution.lost();
        counters.attempted += attempted as u64;
        counters.lost += lost as u64;
        report.0.contention_attempted += attempted;
        report.0.contention_lost += lost;
        if lost > 0 {
            debug!(node = %id, lost, attempted, rounds = resolution.rounds, "contention losses");
        }
    }
}
