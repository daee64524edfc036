//! Mesh network simulation core: propagation engine, contention resolver,
//! ledger, reputation and the simulation context that owns them.

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;

pub mod components;
pub mod config;
pub mod contention;
pub mod crypto;
pub mod error;
pub mod events;
pub mod geo;
pub mod interventions;
pub mod ledger;
pub mod reputation;
pub mod runtime;
pub mod setup;
pub mod simulation;
pub mod systems;

pub use config::{ConfigError, MeshConfig};
pub use error::MeshError;
pub use interventions::{Intervention, ScheduledIntervention};
pub use ledger::{EconomyTracker, LedgerError, Wallet};
pub use reputation::ReputationRecord;
pub use runtime::{SharedSimulation, TickDriver};
pub use simulation::{MeshSimulation, PublishRequest};

/// Seeded random number generator resource
#[derive(Resource)]
pub struct SimRng(pub SmallRng);
