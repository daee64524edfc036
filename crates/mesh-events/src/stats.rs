//! Stats Types
//!
//! Serialization structs for wallet, reputation, economy and engine statistics.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ids::NodeId;

/// Wallet statistics for one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletStats {
    pub node_id: NodeId,
    pub balance: i64,
    pub total_earned: i64,
    pub total_spent: i64,
    pub transaction_count: u64,
    pub net_profit: i64,
}

/// Raw counters a node keeps about one peer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerStats {
    pub sent: u64,
    pub relayed: u64,
}

/// Reputation table of one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReputationStats {
    pub node_id: NodeId,
    pub peer_count: usize,
    pub reputations: BTreeMap<NodeId, f64>,
    pub detailed_stats: BTreeMap<NodeId, PeerStats>,
}

/// Economy health classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

impl HealthStatus {
    pub fn description(self) -> &'static str {
        match self {
            HealthStatus::Healthy => "HEALTHY - Well distributed",
            HealthStatus::Warning => "WARNING - Moderate inequality",
            HealthStatus::Critical => "CRITICAL - High centralization risk",
        }
    }
}

/// Balance entry used in the economy breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeBalance {
    pub node_id: NodeId,
    pub balance: i64,
}

/// Network-wide economy statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomyStats {
    pub tick_count: u64,
    pub total_transactions: u64,
    pub transactions_by_kind: BTreeMap<String, u64>,
    pub total_fee_revenue: i64,
    pub total_safety_subsidies: i64,
    pub total_minted: i64,
    pub total_burned: i64,
    pub total_credits_in_circulation: i64,
    pub average_balance: f64,
    pub gini_coefficient: f64,
    pub nakamoto_coefficient: usize,
    pub health_status: HealthStatus,
    /// Sorted richest first
    pub node_balances: Vec<NodeBalance>,
}

/// Packet counts across all inventories
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageStats {
    pub total_packets_in_network: usize,
    pub by_message_type: BTreeMap<String, usize>,
    pub by_network_type: BTreeMap<String, usize>,
    pub average_packets_per_node: f64,
}

/// Contention resolver configuration and cumulative loss
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentionStats {
    pub enabled: bool,
    pub slots_per_tick: usize,
    pub replicas_per_packet: usize,
    pub max_sic_iterations: usize,
    pub packets_attempted: u64,
    pub packets_lost: u64,
    pub loss_rate: f64,
}

/// Inventory size and packet ages for one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryAge {
    pub node_id: NodeId,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_packet_age_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_packet_age_secs: Option<f64>,
}

/// What happened during one tick
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickSummary {
    pub tick: u64,
    pub now_ms: u64,
    pub ubi_paid: bool,
    pub expired: usize,
    pub evicted: usize,
    pub contention_attempted: usize,
    pub contention_lost: usize,
    pub delivered: usize,
    pub duplicates_skipped: usize,
    pub relay_rewards: i64,
}
