//! Ledger
//!
//! Per-node wallets and the network-wide economy tracker.
//!
//! Balances only move through [`Wallet::add`] and [`Wallet::spend`], so no
//! balance can go negative. The tracker records every credit minted and every
//! credit burned, which makes the total in circulation checkable at any time:
//! `sum(balances) == initial_issuance + minted - burned`.

use bevy_ecs::prelude::*;
use mesh_events::{EconomyStats, HealthStatus, NodeBalance, NodeId, WalletStats};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::config::HealthThresholds;

/// Economic failure. The wallet is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Insufficient credits. Need {needed}, have {available}")]
    InsufficientBalance { needed: i64, available: i64 },
}

/// Component: a node's credit balance and lifetime counters
#[derive(Component, Debug, Clone, PartialEq, Eq)]
pub struct Wallet {
    pub balance: i64,
    pub total_earned: i64,
    pub total_spent: i64,
    pub transaction_count: u64,
}

impl Wallet {
    pub fn new(initial_credits: i64) -> Self {
        Self {
            balance: initial_credits.max(0),
            total_earned: 0,
            total_spent: 0,
            transaction_count: 0,
        }
    }

    /// Credit the wallet. Non-positive amounts are ignored.
    pub fn add(&mut self, amount: i64) {
        if amount > 0 {
            self.balance += amount;
            self.total_earned += amount;
            self.transaction_count += 1;
        }
    }

    /// Debit the wallet if the balance covers `amount`. Non-positive amounts
    /// always succeed without touching the wallet.
    pub fn spend(&mut self, amount: i64) -> Result<(), LedgerError> {
        if amount <= 0 {
            return Ok(());
        }
        if self.balance < amount {
            return Err(LedgerError::InsufficientBalance {
                needed: amount,
                available: self.balance,
            });
        }
        self.balance -= amount;
        self.total_spent += amount;
        self.transaction_count += 1;
        Ok(())
    }

    /// Zero the balance, returning what was removed.
    pub fn drain(&mut self) -> i64 {
        std::mem::take(&mut self.balance)
    }

    pub fn stats(&self, node_id: NodeId) -> WalletStats {
        WalletStats {
            node_id,
            balance: self.balance,
            total_earned: self.total_earned,
            total_spent: self.total_spent,
            transaction_count: self.transaction_count,
            net_profit: self.total_earned - self.total_spent,
        }
    }
}

/// Category of a ledger movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TransactionKind {
    /// Send fee for Logistics and Help traffic
    LogisticsSend,
    /// Send fee for Safe traffic (zero unless reconfigured)
    SafetySend,
    LogisticsRelay,
    SafetyRelay,
    Ubi,
    ManualCredit,
    ManualDebit,
    /// Balance zeroed by an intervention
    Drain,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionKind::LogisticsSend => "logistics_send",
            TransactionKind::SafetySend => "safety_send",
            TransactionKind::LogisticsRelay => "logistics_relay",
            TransactionKind::SafetyRelay => "safety_relay",
            TransactionKind::Ubi => "ubi",
            TransactionKind::ManualCredit => "manual_credit",
            TransactionKind::ManualDebit => "manual_debit",
            TransactionKind::Drain => "drain",
        }
    }

    /// Whether this movement creates credits (otherwise it destroys them).
    pub fn is_issuance(self) -> bool {
        matches!(
            self,
            TransactionKind::LogisticsRelay
                | TransactionKind::SafetyRelay
                | TransactionKind::Ubi
                | TransactionKind::ManualCredit
        )
    }
}

/// Resource: network-wide economic counters
#[derive(Resource, Debug, Clone, Default, PartialEq)]
pub struct EconomyTracker {
    pub tick_count: u64,
    pub total_transactions: u64,
    pub by_kind: BTreeMap<TransactionKind, u64>,
    pub total_fee_revenue: i64,
    pub total_safety_subsidies: i64,
    pub total_minted: i64,
    pub total_burned: i64,
    /// Credits handed out when wallets were created
    pub initial_issuance: i64,
}

impl EconomyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_issuance(&mut self, amount: i64) {
        self.initial_issuance += amount.max(0);
    }

    pub fn increment_tick(&mut self) {
        self.tick_count += 1;
    }

    pub fn record(&mut self, kind: TransactionKind, amount: i64) {
        self.total_transactions += 1;
        *self.by_kind.entry(kind).or_insert(0) += 1;
        match kind {
            TransactionKind::LogisticsSend | TransactionKind::SafetySend => {
                self.total_fee_revenue += amount;
            }
            TransactionKind::SafetyRelay => {
                self.total_safety_subsidies += amount;
            }
            _ => {}
        }
        if kind.is_issuance() {
            self.total_minted += amount;
        } else {
            self.total_burned += amount;
        }
    }

    /// Credits that should be in circulation given everything recorded.
    pub fn expected_circulation(&self) -> i64 {
        self.initial_issuance + self.total_minted - self.total_burned
    }

    pub fn stats(&self, balances: &[(NodeId, i64)], thresholds: &HealthThresholds) -> EconomyStats {
        let values: Vec<i64> = balances.iter().map(|(_, b)| *b).collect();
        let total: i64 = values.iter().sum();
        let average = if values.is_empty() {
            0.0
        } else {
            total as f64 / values.len() as f64
        };
        let gini = round4(gini_coefficient(&values));
        let nakamoto = nakamoto_coefficient(&values);

        let mut node_balances: Vec<NodeBalance> = balances
            .iter()
            .map(|&(node_id, balance)| NodeBalance { node_id, balance })
            .collect();
        node_balances.sort_by(|a, b| b.balance.cmp(&a.balance).then(a.node_id.cmp(&b.node_id)));

        EconomyStats {
            tick_count: self.tick_count,
            total_transactions: self.total_transactions,
            transactions_by_kind: self
                .by_kind
                .iter()
                .map(|(k, v)| (k.as_str().to_string(), *v))
                .collect(),
            total_fee_revenue: self.total_fee_revenue,
            total_safety_subsidies: self.total_safety_subsidies,
            total_minted: self.total_minted,
            total_burned: self.total_burned,
            total_credits_in_circulation: total,
            average_balance: (average * 100.0).round() / 100.0,
            gini_coefficient: gini,
            nakamoto_coefficient: nakamoto,
            health_status: assess_health(gini, nakamoto, thresholds),
            node_balances,
        }
    }
}

/// Rank-weighted Gini coefficient. 0 for an empty or all-zero distribution.
pub fn gini_coefficient(balances: &[i64]) -> f64 {
    let n = balances.len();
    let sum: i64 = balances.iter().sum();
    if n == 0 || sum == 0 {
        return 0.0;
    }
    let mut sorted = balances.to_vec();
    sorted.sort_unstable();
    let weighted: f64 = sorted
        .iter()
        .enumerate()
        .map(|(i, b)| (i + 1) as f64 * *b as f64)
        .sum();
    let n = n as f64;
    (2.0 * weighted) / (n * sum as f64) - (n + 1.0) / n
}

/// Fewest richest nodes holding strictly more than half of all credits.
pub fn nakamoto_coefficient(balances: &[i64]) -> usize {
    if balances.is_empty() {
        return 0;
    }
    let total: i64 = balances.iter().sum();
    if total == 0 {
        return balances.len();
    }
    let mut sorted = balances.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    let mut cumulative = 0i64;
    for (i, balance) in sorted.iter().enumerate() {
        cumulative += balance;
        // cumulative > total / 2, in integers
        if cumulative * 2 > total {
            return i + 1;
        }
    }
    balances.len()
}

pub fn assess_health(gini: f64, nakamoto: usize, t: &HealthThresholds) -> HealthStatus {
    if gini > t.gini_critical || nakamoto < t.nakamoto_critical {
        HealthStatus::Critical
    } else if gini > t.gini_warning || nakamoto < t.nakamoto_warning {
        HealthStatus::Warning
    } else {
        HealthStatus::Healthy
    }
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}
