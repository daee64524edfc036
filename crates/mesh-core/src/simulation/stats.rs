//! Inspection and accounting operations.

use mesh_events::{
    ContentionStats, CryptoInfo, EconomyStats, InventoryAge, InventoryView, MessageClass, MessageId,
    MessageStats, NetworkKind, NodeId, PacketView, ReputationStats, WalletStats,
};
use std::collections::BTreeMap;

use super::publish::opaque_digest;
use super::MeshSimulation;
use crate::components::inventory::Inventory;
use crate::components::node::{NodeName, Position, Radio};
use crate::components::world::ContentionCounters;
use crate::config::MeshConfig;
use crate::crypto::NodeKeys;
use crate::error::MeshError;
use crate::ledger::{EconomyTracker, TransactionKind, Wallet};
use crate::reputation::ReputationRecord;

impl MeshSimulation {
    /// A node's inventory as the node itself sees it. Targets see plain text,
    /// everyone else an opaque digest.
    pub fn inventory(&self, node: NodeId) -> Result<InventoryView, MeshError> {
        let inventory = self.component::<Inventory>(node)?;
        let packets: Vec<PacketView> = inventory
            .packets()
            .iter()
            .map(|p| {
                let can_decrypt = p.is_target(node);
                let content = if can_decrypt {
                    self.open_packet(node, p.packet_id)
                        .unwrap_or_else(|_| opaque_digest(&p.body.payload_bytes()))
                } else {
                    opaque_digest(&p.body.payload_bytes())
                };
                PacketView {
                    packet_id: p.packet_id,
                    original_message_id: p.original_message_id.clone(),
                    publisher_id: p.publisher_id,
                    target_ids: p.target_ids.clone(),
                    history: p.history.clone(),
                    path_string: p.path_string(),
                    class: p.class(),
                    can_decrypt,
                    content,
                }
            })
            .collect();

        Ok(InventoryView {
            node_id: node,
            node_name: self.component::<NodeName>(node)?.0.clone(),
            location: self.component::<Position>(node)?.0,
            range_m: self.component::<Radio>(node)?.range_m,
            packet_count: packets.len(),
            packets,
        })
    }

    /// Public identity of a node. Every node holds every other node's public
    /// keys from construction, so the peer count is the rest of the mesh.
    pub fn crypto_info(&self, node: NodeId) -> Result<CryptoInfo, MeshError> {
        let keys = self.component::<NodeKeys>(node)?;
        Ok(CryptoInfo {
            node_id: node,
            public_key_id: keys.public_key_id(),
            known_messages_count: self.component::<Inventory>(node)?.known_messages().len(),
            peer_count: self.node_ids().len().saturating_sub(1),
        })
    }

    pub fn wallet(&self, node: NodeId) -> Result<WalletStats, MeshError> {
        Ok(self.component::<Wallet>(node)?.stats(node))
    }

    /// Manually credit a wallet. The amount must be positive.
    pub fn wallet_add(&mut self, node: NodeId, amount: i64) -> Result<WalletStats, MeshError> {
        if amount <= 0 {
            return Err(MeshError::invalid("credit amount must be positive"));
        }
        let stats = {
            let mut wallet = self.component_mut::<Wallet>(node)?;
            wallet.add(amount);
            wallet.stats(node)
        };
        self.world
            .resource_mut::<EconomyTracker>()
            .record(TransactionKind::ManualCredit, amount);
        Ok(stats)
    }

    /// Manually debit a wallet. Fails without change when the balance is short.
    pub fn wallet_spend(&mut self, node: NodeId, amount: i64) -> Result<WalletStats, MeshError> {
        if amount <= 0 {
            return Err(MeshError::invalid("debit amount must be positive"));
        }
        let stats = {
            let mut wallet = self.component_mut::<Wallet>(node)?;
            wallet.spend(amount)?;
            wallet.stats(node)
        };
        self.world
            .resource_mut::<EconomyTracker>()
            .record(TransactionKind::ManualDebit, amount);
        Ok(stats)
    }

    pub fn reputation(&self, node: NodeId) -> Result<ReputationStats, MeshError> {
        Ok(self.component::<ReputationRecord>(node)?.stats(node))
    }

    /// Score `node` holds for `peer`.
    pub fn reputation_score(&self, node: NodeId, peer: NodeId) -> Result<f64, MeshError> {
        Ok(self.component::<ReputationRecord>(node)?.score(peer))
    }

    /// Whether `node` trusts `peer` at the configured threshold.
    pub fn is_trusted(&self, node: NodeId, peer: NodeId) -> Result<bool, MeshError> {
        let threshold = self.config().reputation.trust_threshold;
        Ok(self
            .component::<ReputationRecord>(node)?
            .is_trusted(peer, threshold))
    }

    pub fn economy_stats(&self) -> EconomyStats {
        let balances: Vec<(NodeId, i64)> = self
            .node_ids()
            .into_iter()
            .filter_map(|id| self.component::<Wallet>(id).ok().map(|w| (id, w.balance)))
            .collect();
        self.world
            .resource::<EconomyTracker>()
            .stats(&balances, &self.config().economy.health)
    }

    /// Packet counts across every inventory, by class and network tag.
    pub fn message_stats(&self) -> MessageStats {
        let mut by_message_type: BTreeMap<String, usize> = MessageClass::ALL
            .iter()
            .map(|c| (c.to_string(), 0))
            .collect();
        let mut by_network_type: BTreeMap<String, usize> = [NetworkKind::WiFi, NetworkKind::LoRa]
            .iter()
            .map(|n| (n.to_string(), 0))
            .collect();

        let packets = self.all_packets();
        for (_, packet) in &packets {
            *by_message_type.entry(packet.class().to_string()).or_insert(0) += 1;
            *by_network_type.entry(packet.network.to_string()).or_insert(0) += 1;
        }

        let node_count = self.node_ids().len();
        let average = if node_count == 0 {
            0.0
        } else {
            packets.len() as f64 / node_count as f64
        };

        MessageStats {
            total_packets_in_network: packets.len(),
            by_message_type,
            by_network_type,
            average_packets_per_node: (average * 100.0).round() / 100.0,
        }
    }

    pub fn contention_stats(&self) -> ContentionStats {
        let config = &self.config().contention;
        let counters = self.world.resource::<ContentionCounters>();
        ContentionStats {
            enabled: config.enabled,
            slots_per_tick: config.slots_per_tick,
            replicas_per_packet: config.replicas,
            max_sic_iterations: config.max_sic_iterations,
            packets_attempted: counters.attempted,
            packets_lost: counters.lost,
            loss_rate: counters.loss_rate(),
        }
    }

    /// Turn the collision model on or off. Takes effect from the next tick.
    pub fn set_contention_enabled(&mut self, enabled: bool) {
        self.world.resource_mut::<MeshConfig>().contention.enabled = enabled;
    }

    /// Inventory size and oldest/newest packet age for every node, in seconds.
    pub fn inventory_ages(&self) -> Vec<InventoryAge> {
        let now_ms = self.clock().now_ms;
        let to_secs = |ms: u64| (ms as f64 / 100.0).round() / 10.0;
        self.node_ids()
            .into_iter()
            .filter_map(|id| {
                let inventory = self.component::<Inventory>(id).ok()?;
                let ages = inventory.packets().iter().map(|p| p.age_ms(now_ms));
                Some(InventoryAge {
                    node_id: id,
                    count: inventory.len(),
                    oldest_packet_age_secs: ages.clone().max().map(to_secs),
                    newest_packet_age_secs: ages.min().map(to_secs),
                })
            })
            .collect()
    }

    /// Every message id `node` has ever held, even after the copy expired.
    pub fn known_messages(&self, node: NodeId) -> Result<Vec<MessageId>, MeshError> {
        Ok(self
            .component::<Inventory>(node)?
            .known_messages()
            .iter()
            .cloned()
            .collect())
    }

    /// The ids from `candidates` that `node` has never held.
    pub fn missing_messages(
        &self,
        node: NodeId,
        candidates: &[MessageId],
    ) -> Result<Vec<MessageId>, MeshError> {
        let inventory = self.component::<Inventory>(node)?;
        Ok(candidates
            .iter()
            .filter(|id| !inventory.knows(id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::PublishRequest;

    fn sim() -> MeshSimulation {
        MeshSimulation::new(MeshConfig::default())
    }

    fn publish(sim: &mut MeshSimulation, from: u32, to: u32, class: MessageClass) -> MessageId {
        sim.publish(PublishRequest::new(
            NodeId(from),
            "supplies at the gym",
            vec![NodeId(to)],
            class,
        ))
        .unwrap()
        .message_id
    }

    #[test]
    fn test_inventory_hides_text_from_non_targets() {
        let mut sim = sim();
        publish(&mut sim, 1, 2, MessageClass::Help);
        let view = sim.inventory(NodeId(1)).unwrap();
        assert_eq!(view.packet_count, 1);
        assert!(!view.packets[0].can_decrypt);
        assert!(view.packets[0].content.starts_with("[HASH] "));
        assert_eq!(view.packets[0].path_string, "1");
        assert_eq!(view.node_name, "Node 1");
    }

    #[test]
    fn test_crypto_info_tracks_known_messages() {
        let mut sim = sim();
        let before = sim.crypto_info(NodeId(3)).unwrap();
        assert_eq!(before.known_messages_count, 0);
        assert_eq!(before.peer_count, 9);
        assert_eq!(before.public_key_id.len(), 16);
        assert_ne!(
            before.public_key_id,
            sim.crypto_info(NodeId(4)).unwrap().public_key_id
        );

        publish(&mut sim, 3, 1, MessageClass::Safe);
        publish(&mut sim, 3, 2, MessageClass::Help);
        let after = sim.crypto_info(NodeId(3)).unwrap();
        assert_eq!(after.known_messages_count, 2);
        assert_eq!(after.public_key_id, before.public_key_id);
        assert!(matches!(
            sim.crypto_info(NodeId(99)),
            Err(MeshError::UnknownNode(_))
        ));
    }

    #[test]
    fn test_manual_wallet_moves_keep_ledger_balanced() {
        let mut sim = sim();
        assert_eq!(sim.wallet_add(NodeId(1), 25).unwrap().balance, 125);
        assert_eq!(sim.wallet_spend(NodeId(2), 40).unwrap().balance, 60);
        assert!(sim.wallet_spend(NodeId(2), 500).is_err());
        assert!(sim.wallet_add(NodeId(2), 0).is_err());
        assert_eq!(sim.wallet(NodeId(2)).unwrap().balance, 60);
        assert!(sim.ledger_balanced());

        let stats = sim.economy_stats();
        assert_eq!(stats.total_minted, 25);
        assert_eq!(stats.total_burned, 40);
        assert_eq!(stats.node_balances[0].node_id, NodeId(1));
    }

    #[test]
    fn test_message_stats_counts_by_class_and_network() {
        let mut sim = sim();
        publish(&mut sim, 1, 2, MessageClass::Safe);
        publish(&mut sim, 1, 2, MessageClass::Help);
        publish(&mut sim, 3, 2, MessageClass::Logistics);

        let stats = sim.message_stats();
        assert_eq!(stats.total_packets_in_network, 3);
        assert_eq!(stats.by_message_type["Safe"], 1);
        assert_eq!(stats.by_message_type["Help"], 1);
        assert_eq!(stats.by_network_type["LoRa"], 1);
        assert_eq!(stats.by_network_type["WiFi"], 2);
        assert_eq!(stats.average_packets_per_node, 0.3);
    }

    #[test]
    fn test_contention_toggle() {
        let mut sim = sim();
        assert!(sim.contention_stats().enabled);
        sim.set_contention_enabled(false);
        let stats = sim.contention_stats();
        assert!(!stats.enabled);
        assert_eq!(stats.slots_per_tick, 5);
        assert_eq!(stats.loss_rate, 0.0);
    }

    #[test]
    fn test_known_and_missing_messages() {
        let mut sim = sim();
        let held = publish(&mut sim, 1, 2, MessageClass::Safe);
        let other = MessageId::from("elsewhere");
        assert_eq!(sim.known_messages(NodeId(1)).unwrap(), vec![held.clone()]);
        assert_eq!(
            sim.missing_messages(NodeId(1), &[held, other.clone()]).unwrap(),
            vec![other]
        );
        assert!(sim.known_messages(NodeId(77)).is_err());
    }

    #[test]
    fn test_inventory_ages_follow_simulated_time() {
        let mut sim = sim();
        sim.set_contention_enabled(false);
        publish(&mut sim, 1, 2, MessageClass::Safe);
        sim.run(2);
        let ages = sim.inventory_ages();
        let first = ages.iter().find(|a| a.node_id == NodeId(1)).unwrap();
        assert_eq!(first.count, 1);
        assert_eq!(first.oldest_packet_age_secs, Some(6.0));
        let empty = ages.iter().find(|a| a.count == 0);
        if let Some(empty) = empty {
            assert!(empty.oldest_packet_age_secs.is_none());
        }
    }
}
