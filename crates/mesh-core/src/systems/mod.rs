//! ECS Systems
//!
//! The per-tick pipeline: clock and UBI, inventory expiry, contention, propagation.

pub mod clock;
pub mod contention;
pub mod expiry;
pub mod propagation;

use bevy_ecs::prelude::*;
use bevy_ecs::schedule::ExecutorKind;

pub use clock::advance_clock;
pub use contention::resolve_contention;
pub use expiry::expire_packets;
pub use propagation::propagate_packets;

/// One tick of the engine. Systems run serially, in order.
pub fn tick_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.set_executor_kind(ExecutorKind::SingleThreaded);
    schedule.add_systems(
        (
            advance_clock,
            expire_packets,
            resolve_contention,
            propagate_packets,
        )
            .chain(),
    );
    schedule
}
