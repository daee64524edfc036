//! Simulation Context
//!
//! [`MeshSimulation`] owns the ECS world and the tick schedule. Every external
//! operation is a method on it: ticking, publishing, inspection, network
//! changes and the attack hooks. Operations validate their input before
//! touching any state and report failures as [`MeshError`].
//!
//! The context itself is not synchronised. Wrap it in
//! [`SharedSimulation`](crate::runtime::SharedSimulation) to share it between
//! the tick driver and request handlers.

mod network;
mod publish;
mod stats;

pub(crate) use publish::opaque_digest;
pub use publish::PublishRequest;

use bevy_ecs::prelude::*;
use mesh_events::{DeliveryEvent, NodeId, Packet, PacketId, TickSummary};
use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};
use tracing::{info, warn};

use crate::components::inventory::Inventory;
use crate::components::world::{
    ContentionCounters, DeliveryLog, LinkSet, NodeIndex, SimClock, TickReport,
};
use crate::config::MeshConfig;
use crate::contention;
use crate::error::MeshError;
use crate::events::EventLogger;
use crate::ledger::{EconomyTracker, Wallet};
use crate::setup;
use crate::systems::tick_schedule;
use crate::SimRng;

pub struct MeshSimulation {
    world: World,
    schedule: Schedule,
    event_logger: EventLogger,
    last_deliveries: Vec<DeliveryEvent>,
}

impl MeshSimulation {
    /// Build a world of `simulation.node_count` nodes seeded from `simulation.seed`.
    pub fn new(config: MeshConfig) -> Self {
        let seed = config.simulation.seed;
        Self {
            world: build_world(config, seed),
            schedule: tick_schedule(),
            event_logger: EventLogger::null(),
            last_deliveries: Vec::new(),
        }
    }

    pub fn with_event_logger(mut self, logger: EventLogger) -> Self {
        self.event_logger = logger;
        self
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn config(&self) -> &MeshConfig {
        self.world.resource::<MeshConfig>()
    }

    pub fn clock(&self) -> &SimClock {
        self.world.resource::<SimClock>()
    }

    pub fn tick(&self) -> u64 {
        self.clock().tick
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.world.resource::<NodeIndex>().ids().collect()
    }

    /// Run one tick of the engine and return what happened.
    pub fn advance_tick(&mut self) -> TickSummary {
        self.schedule.run(&mut self.world);

        let deliveries = self.world.resource_mut::<DeliveryLog>().drain();
        if let Err(e) = self.event_logger.log_batch(&deliveries) {
            warn!("Could not write delivery events: {}", e);
        }
        self.last_deliveries = deliveries;
        self.world.resource::<TickReport>().0.clone()
    }

    /// Run `ticks` ticks, returning the last summary.
    pub fn run(&mut self, ticks: u64) -> Option<TickSummary> {
        let mut last = None;
        for _ in 0..ticks {
            last = Some(self.advance_tick());
        }
        last
    }

    /// Copies delivered during the most recent tick.
    pub fn last_deliveries(&self) -> &[DeliveryEvent] {
        &self.last_deliveries
    }

    pub fn flush_events(&mut self) -> std::io::Result<()> {
        self.event_logger.flush()
    }

    /// Resolve an arbitrary packet set as if `node` were transmitting it.
    pub fn resolve_contention(
        &mut self,
        node: NodeId,
        packets: &[Packet],
    ) -> Result<Vec<Packet>, MeshError> {
        self.entity(node)?;
        Ok(self.world.resource_scope(|world, mut rng: Mut<SimRng>| {
            let config = world.resource::<MeshConfig>();
            contention::resolve_packets(&config.contention, packets, &mut rng.0)
        }))
    }

    /// Rebuild every node from the next seed in the stream. Inventories,
    /// links, wallets, reputation and the ledger all start over.
    pub fn regenerate(&mut self) {
        let config = self.config().clone();
        let seed = self.world.resource_mut::<SimRng>().0.next_u64();
        self.world = build_world(config, seed);
        self.last_deliveries.clear();
        info!(seed, "regenerated mesh");
    }

    /// Every packet in every inventory, tagged with its holder.
    pub fn all_packets(&self) -> Vec<(NodeId, Packet)> {
        let index = self.world.resource::<NodeIndex>();
        index
            .iter()
            .filter_map(|(id, entity)| self.world.get::<Inventory>(entity).map(|inv| (id, inv)))
            .flat_map(|(id, inv)| inv.packets().iter().cloned().map(move |p| (id, p)))
            .collect()
    }

    pub(crate) fn find_packet(&self, packet_id: PacketId) -> Option<(NodeId, &Packet)> {
        let index = self.world.resource::<NodeIndex>();
        index.iter().find_map(|(id, entity)| {
            self.world
                .get::<Inventory>(entity)
                .and_then(|inv| inv.get(packet_id))
                .map(|p| (id, p))
        })
    }

    /// Sum of all wallet balances.
    pub fn total_balance(&self) -> i64 {
        let index = self.world.resource::<NodeIndex>();
        index
            .iter()
            .filter_map(|(_, entity)| self.world.get::<Wallet>(entity))
            .map(|w| w.balance)
            .sum()
    }

    /// Whether balances match issuance plus minted minus burned credits.
    pub fn ledger_balanced(&self) -> bool {
        self.total_balance() == self.world.resource::<EconomyTracker>().expected_circulation()
    }

    pub(crate) fn entity(&self, id: NodeId) -> Result<Entity, MeshError> {
        self.world
            .resource::<NodeIndex>()
            .get(id)
            .ok_or(MeshError::UnknownNode(id))
    }

    pub(crate) fn component<T: Component>(&self, id: NodeId) -> Result<&T, MeshError> {
        let entity = self.entity(id)?;
        self.world.get::<T>(entity).ok_or(MeshError::UnknownNode(id))
    }

    pub(crate) fn component_mut<T: Component>(&mut self, id: NodeId) -> Result<Mut<'_, T>, MeshError> {
        let entity = self.entity(id)?;
        self.world.get_mut::<T>(entity).ok_or(MeshError::UnknownNode(id))
    }

    pub(crate) fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }
}

fn build_world(config: MeshConfig, seed: u64) -> World {
    let mut world = World::new();
    world.insert_resource(SimClock::new(config.simulation.tick_interval_ms));
    world.insert_resource(NodeIndex::new());
    world.insert_resource(LinkSet::new());
    world.insert_resource(EconomyTracker::new());
    world.insert_resource(TickReport::default());
    world.insert_resource(ContentionCounters::default());
    world.insert_resource(DeliveryLog::new());

    let mut rng = SmallRng::seed_from_u64(seed);
    setup::spawn_all_nodes(&mut world, &config, &mut rng);
    world.insert_resource(SimRng(rng));

    info!(
        nodes = config.simulation.node_count,
        seed,
        contention = config.contention.enabled,
        "mesh world built"
    );
    world.insert_resource(config);
    world
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_world_is_balanced() {
        let sim = MeshSimulation::new(MeshConfig::default());
        assert_eq!(sim.node_ids().len(), 10);
        assert_eq!(sim.total_balance(), 1_000);
        assert!(sim.ledger_balanced());
        assert_eq!(sim.tick(), 0);
    }

    #[test]
    fn test_idle_ticks_only_pay_ubi() {
        let mut sim = MeshSimulation::new(MeshConfig::default());
        let summary = sim.run(10).unwrap();
        assert_eq!(summary.tick, 10);
        assert!(summary.ubi_paid);
        assert_eq!(summary.delivered, 0);
        assert_eq!(sim.total_balance(), 1_050);
        assert!(sim.ledger_balanced());
    }

    #[test]
    fn test_regenerate_resets_state() {
        let mut sim = MeshSimulation::new(MeshConfig::default());
        let before: Vec<_> = sim.nodes().into_iter().map(|n| n.position).collect();
        sim.run(10);
        sim.regenerate();
        let after: Vec<_> = sim.nodes().into_iter().map(|n| n.position).collect();
        assert_ne!(before, after);
        assert_eq!(sim.tick(), 0);
        assert_eq!(sim.total_balance(), 1_000);
        assert!(sim.links().is_empty());
    }

    #[test]
    fn test_resolve_contention_for_unknown_node() {
        let mut sim = MeshSimulation::new(MeshConfig::default());
        let err = sim.resolve_contention(NodeId(99), &[]).unwrap_err();
        assert_eq!(err, MeshError::UnknownNode(NodeId(99)));
        assert!(sim.resolve_contention(NodeId(1), &[]).unwrap().is_empty());
    }
}
