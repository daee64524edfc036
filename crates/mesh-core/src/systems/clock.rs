//! Clock System
//!
//! Advances simulated time and pays universal basic income.

use bevy_ecs::prelude::*;
use mesh_events::TickSummary;

use crate::components::world::{SimClock, TickReport};
use crate::config::MeshConfig;
use crate::ledger::{EconomyTracker, TransactionKind, Wallet};

/// System: advance the tick counter, reset the tick report, pay UBI on schedule
pub fn advance_clock(
    config: Res<MeshConfig>,
    mut clock: ResMut<SimClock>,
    mut economy: ResMut<EconomyTracker>,
    mut report: ResMut<TickReport>,
    mut wallets: Query<&mut Wallet>,
) {
    clock.advance();
    economy.increment_tick();
    report.0 = TickSummary {
        tick: clock.tick,
        now_ms: clock.now_ms,
        ..Default::default()
    };

    let amount = config.economy.ubi_amount;
    if amount > 0 && config.economy.is_ubi_tick(clock.tick) {
        for mut wallet in wallets.iter_mut() {
            wallet.add(amount);
            economy.record(TransactionKind::Ubi, amount);
        }
        report.0.ubi_paid = true;
    }
}
