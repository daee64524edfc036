//! World Resources
//!
//! Global state shared by the systems: simulated clock, node index, explicit
//! links, tick reports and the delivery queue.

use bevy_ecs::prelude::*;
use mesh_events::{DeliveryEvent, NodeId, TickSummary};
use std::collections::{BTreeMap, BTreeSet};

/// Resource: simulated time
#[derive(Resource, Debug, Clone, PartialEq, Eq)]
pub struct SimClock {
    pub tick: u64,
    pub now_ms: u64,
    pub tick_interval_ms: u64,
}

impl SimClock {
    pub fn new(tick_interval_ms: u64) -> Self {
        Self {
            tick: 0,
            now_ms: 0,
            tick_interval_ms,
        }
    }

    pub fn advance(&mut self) {
        self.tick += 1;
        self.now_ms = self.tick.saturating_mul(self.tick_interval_ms);
    }
}

/// Resource: node id to entity, iterated in id order
#[derive(Resource, Debug, Clone, Default)]
pub struct NodeIndex {
    entities: BTreeMap<NodeId, Entity>,
}

impl NodeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: NodeId, entity: Entity) {
        self.entities.insert(id, entity);
    }

    pub fn get(&self, id: NodeId) -> Option<Entity> {
        self.entities.get(&id).copied()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.entities.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, Entity)> + '_ {
        self.entities.iter().map(|(id, e)| (*id, *e))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn clear(&mut self) {
        self.entities.clear();
    }
}

/// Resource: explicit undirected links, independent of geometry
#[derive(Resource, Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkSet {
    links: BTreeSet<(NodeId, NodeId)>,
}

impl LinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    /// Returns false when the link already existed.
    pub fn add(&mut self, a: NodeId, b: NodeId) -> bool {
        self.links.insert(Self::key(a, b))
    }

    /// Returns false when there was no such link.
    pub fn remove(&mut self, a: NodeId, b: NodeId) -> bool {
        self.links.remove(&Self::key(a, b))
    }

    pub fn contains(&self, a: NodeId, b: NodeId) -> bool {
        self.links.contains(&Self::key(a, b))
    }

    pub fn peers_of(&self, node: NodeId) -> Vec<NodeId> {
        self.links
            .iter()
            .filter_map(|&(a, b)| {
                if a == node {
                    Some(b)
                } else if b == node {
                    Some(a)
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.links.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn clear(&mut self) {
        self.links.clear();
    }
}

/// Resource: summary of the tick in progress (or last completed)
#[derive(Resource, Debug, Clone, Default)]
pub struct TickReport(pub TickSummary);

/// Resource: cumulative contention counters
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContentionCounters {
    pub attempted: u64,
    pub lost: u64,
}

impl ContentionCounters {
    pub fn loss_rate(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.lost as f64 / self.attempted as f64
        }
    }
}

/// Resource: deliveries awaiting the event logger
#[derive(Resource, Debug, Default)]
pub struct DeliveryLog {
    events: Vec<DeliveryEvent>,
}

impl DeliveryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: DeliveryEvent) {
        self.events.push(event);
    }

    pub fn drain(&mut self) -> Vec<DeliveryEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_tracks_simulated_time() {
        let mut clock = SimClock::new(3_000);
        clock.advance();
        clock.advance();
        assert_eq!(clock.tick, 2);
        assert_eq!(clock.now_ms, 6_000);
    }

    #[test]
    fn test_links_are_symmetric_and_idempotent() {
        let mut links = LinkSet::new();
        assert!(links.add(NodeId(3), NodeId(1)));
        assert!(!links.add(NodeId(1), NodeId(3)));
        assert!(links.contains(NodeId(1), NodeId(3)));
        assert!(links.contains(NodeId(3), NodeId(1)));
        assert_eq!(links.len(), 1);
        assert_eq!(links.peers_of(NodeId(3)), vec![NodeId(1)]);

        assert!(links.remove(NodeId(3), NodeId(1)));
        assert!(!links.remove(NodeId(1), NodeId(3)));
        assert!(links.is_empty());
    }

    #[test]
    fn test_loss_rate() {
        let counters = ContentionCounters {
            attempted: 8,
            lost: 2,
        };
        assert_eq!(counters.loss_rate(), 0.25);
        assert_eq!(ContentionCounters::default().loss_rate(), 0.0);
    }
}
