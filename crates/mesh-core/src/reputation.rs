//! Reputation Tracker
//!
//! Each node keeps its own view of its peers: how many packets it handed to a
//! peer and how many of those the peer was later seen relaying. The score is
//! the relayed/sent ratio, optimistic for peers never sent to.

use bevy_ecs::prelude::*;
use mesh_events::{NodeId, PeerStats, ReputationStats};
use std::collections::BTreeMap;

/// Score reported for a peer with no sends recorded
pub const DEFAULT_SCORE: f64 = 1.0;

/// Component: per-peer relay counters held by one node
#[derive(Component, Debug, Clone, Default, PartialEq)]
pub struct ReputationRecord {
    peers: BTreeMap<NodeId, PeerStats>,
}

impl ReputationRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sent(&mut self, peer: NodeId) {
        self.peers.entry(peer).or_default().sent += 1;
    }

    pub fn record_relayed(&mut self, peer: NodeId) {
        self.peers.entry(peer).or_default().relayed += 1;
    }

    pub fn peer(&self, peer: NodeId) -> Option<PeerStats> {
        self.peers.get(&peer).copied()
    }

    /// Relayed/sent, capped at 1.0.
    pub fn score(&self, peer: NodeId) -> f64 {
        match self.peers.get(&peer) {
            Some(stats) if stats.sent > 0 => {
                (stats.relayed as f64 / stats.sent as f64).min(DEFAULT_SCORE)
            }
            _ => DEFAULT_SCORE,
        }
    }

    pub fn is_trusted(&self, peer: NodeId, threshold: f64) -> bool {
        self.score(peer) >= threshold
    }

    pub fn reputations(&self) -> BTreeMap<NodeId, f64> {
        self.peers.keys().map(|&p| (p, self.score(p))).collect()
    }

    pub fn stats(&self, node_id: NodeId) -> ReputationStats {
        ReputationStats {
            node_id,
            peer_count: self.peers.len(),
            reputations: self.reputations(),
            detailed_stats: self.peers.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unseen_peer_is_fully_trusted() {
        let record = ReputationRecord::new();
        assert_eq!(record.score(NodeId(9)), 1.0);
        assert!(record.is_trusted(NodeId(9), 0.7));
    }

    #[test]
    fn test_relayed_only_peer_keeps_default() {
        let mut record = ReputationRecord::new();
        record.record_relayed(NodeId(2));
        assert_eq!(record.score(NodeId(2)), 1.0);
    }

    #[test]
    fn test_ratio_and_threshold() {
        let mut record = ReputationRecord::new();
        for _ in 0..4 {
            record.record_sent(NodeId(2));
        }
        record.record_relayed(NodeId(2));
        assert_eq!(record.score(NodeId(2)), 0.25);
        assert!(!record.is_trusted(NodeId(2), 0.7));

        for _ in 0..10 {
            record.record_relayed(NodeId(2));
        }
        assert_eq!(record.score(NodeId(2)), 1.0);
    }

    #[test]
    fn test_stats() {
        let mut record = ReputationRecord::new();
        record.record_sent(NodeId(3));
        record.record_sent(NodeId(3));
        record.record_relayed(NodeId(3));
        let stats = record.stats(NodeId(1));
        assert_eq!(stats.peer_count, 1);
        assert_eq!(stats.reputations[&NodeId(3)], 0.5);
        assert_eq!(stats.detailed_stats[&NodeId(3)], PeerStats { sent: 2, relayed: 1 });
    }
}
