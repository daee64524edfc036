//! Node Spawning
//!
//! Places nodes uniformly inside the configured bounding box and gives each
//! one a wallet, keys, an empty inventory and an empty reputation table.

use bevy_ecs::prelude::*;
use mesh_events::{GeoPoint, NodeId};
use rand::Rng;
use tracing::info;

use crate::components::inventory::{Inventory, Outbound};
use crate::components::node::{Node, NodeName, Position, Radio};
use crate::components::world::NodeIndex;
use crate::config::{MeshConfig, PlacementConfig};
use crate::crypto::NodeKeys;
use crate::ledger::{EconomyTracker, Wallet};
use crate::reputation::ReputationRecord;

/// Uniform point inside the placement bounding box.
pub fn random_position<R: Rng + ?Sized>(placement: &PlacementConfig, rng: &mut R) -> GeoPoint {
    GeoPoint::new(
        rng.gen_range(placement.lat_min..=placement.lat_max),
        rng.gen_range(placement.lon_min..=placement.lon_max),
    )
}

/// Point within `jitter_deg` of `center` on both axes, clamped to valid coordinates.
pub fn jittered_position<R: Rng + ?Sized>(center: GeoPoint, jitter_deg: f64, rng: &mut R) -> GeoPoint {
    let jitter = jitter_deg.abs();
    let (dlat, dlon) = if jitter > 0.0 {
        (rng.gen_range(-jitter..=jitter), rng.gen_range(-jitter..=jitter))
    } else {
        (0.0, 0.0)
    };
    GeoPoint::new(
        (center.latitude + dlat).clamp(-90.0, 90.0),
        (center.longitude + dlon).clamp(-180.0, 180.0),
    )
}

/// Spawn one node and register it in the index.
pub fn spawn_node<R: Rng + ?Sized>(
    world: &mut World,
    id: NodeId,
    position: GeoPoint,
    config: &MeshConfig,
    rng: &mut R,
) -> Entity {
    let initial = config.economy.initial_credits;
    let entity = world
        .spawn((
            Node(id),
            NodeName::for_id(id),
            Position(position),
            Radio::new(config.placement.default_range_m),
            Inventory::new(),
            Outbound::default(),
            Wallet::new(initial),
            ReputationRecord::new(),
            NodeKeys::from_rng(rng),
        ))
        .id();
    world.resource_mut::<NodeIndex>().register(id, entity);
    world.resource_mut::<EconomyTracker>().record_issuance(initial);
    entity
}

/// Spawn `simulation.node_count` nodes with ids `1..=N` at random positions.
pub fn spawn_all_nodes<R: Rng + ?Sized>(world: &mut World, config: &MeshConfig, rng: &mut R) -> usize {
    let count = config.simulation.node_count;
    for i in 1..=count {
        let position = random_position(&config.placement, rng);
        spawn_node(world, NodeId(i as u32), position, config, rng);
    }
    info!(nodes = count, "spawned mesh nodes");
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn test_random_positions_stay_in_box() {
        let placement = PlacementConfig::default();
        let mut rng = SmallRng::seed_from_u64(1);
        for _ in 0..200 {
            let p = random_position(&placement, &mut rng);
            assert!(p.latitude >= placement.lat_min && p.latitude <= placement.lat_max);
            assert!(p.longitude >= placement.lon_min && p.longitude <= placement.lon_max);
        }
    }

    #[test]
    fn test_jitter_bounds() {
        let mut rng = SmallRng::seed_from_u64(2);
        let center = GeoPoint::new(47.6, -122.3);
        for _ in 0..100 {
            let p = jittered_position(center, 0.5, &mut rng);
            assert!((p.latitude - 47.6).abs() <= 0.5 + 1e-9);
            assert!((p.longitude + 122.3).abs() <= 0.5 + 1e-9);
        }
        assert_eq!(jittered_position(center, 0.0, &mut rng), center);
    }

    #[test]
    fn test_spawn_all_nodes_registers_and_funds() {
        let config = MeshConfig::default();
        let mut world = World::new();
        world.insert_resource(NodeIndex::new());
        world.insert_resource(EconomyTracker::new());
        let mut rng = SmallRng::seed_from_u64(3);

        assert_eq!(spawn_all_nodes(&mut world, &config, &mut rng), 10);
        let index = world.resource::<NodeIndex>();
        assert_eq!(index.len(), 10);
        assert_eq!(index.ids().next(), Some(NodeId(1)));
        assert_eq!(world.resource::<EconomyTracker>().initial_issuance, 1_000);
    }
}
