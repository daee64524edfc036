//! Configuration System
//!
//! Loads tuning parameters from mesh.toml for easy adjustment without recompiling.
//! Every section falls back to its defaults, so a file only needs the keys it changes.

use bevy_ecs::prelude::*;
use mesh_events::{GeoPoint, MessageClass};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Default tuning file path
pub const DEFAULT_CONFIG_PATH: &str = "mesh.toml";

/// Top-level configuration structure
#[derive(Resource, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    pub simulation: SimulationConfig,
    pub inventory: InventoryConfig,
    pub contention: ContentionConfig,
    pub economy: EconomyConfig,
    pub reputation: ReputationConfig,
    pub messages: MessageConfig,
    pub placement: PlacementConfig,
}

/// Simulation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub node_count: usize,
    /// Wall-clock period of the tick driver, also the simulated time per tick
    pub tick_interval_ms: u64,
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            node_count: 10,
            tick_interval_ms: 3_000,
            seed: 42,
        }
    }
}

/// Per-node packet store limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    pub max_size: usize,
    pub packet_ttl_secs: u64,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            max_size: 100,
            packet_ttl_secs: 300,
        }
    }
}

impl InventoryConfig {
    pub fn ttl_ms(&self) -> u64 {
        self.packet_ttl_secs.saturating_mul(1_000)
    }
}

/// CRDSA/SIC collision model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentionConfig {
    pub enabled: bool,
    pub slots_per_tick: usize,
    pub replicas: usize,
    pub max_sic_iterations: usize,
}

impl Default for ContentionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            slots_per_tick: 5,
            replicas: 2,
            max_sic_iterations: 10,
        }
    }
}

/// Thresholds mapping (Gini, Nakamoto) to a health status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthThresholds {
    pub gini_critical: f64,
    pub gini_warning: f64,
    pub nakamoto_critical: usize,
    pub nakamoto_warning: usize,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            gini_critical: 0.8,
            gini_warning: 0.6,
            nakamoto_critical: 3,
            nakamoto_warning: 5,
        }
    }
}

/// Credit economy parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    pub initial_credits: i64,
    pub ubi_amount: i64,
    /// Zero disables UBI
    pub ubi_interval_ticks: u64,
    pub logistics_send_cost: i64,
    pub logistics_relay_reward: i64,
    pub safety_send_cost: i64,
    pub safety_relay_reward: i64,
    pub health: HealthThresholds,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            initial_credits: 100,
            ubi_amount: 5,
            ubi_interval_ticks: 10,
            logistics_send_cost: 2,
            logistics_relay_reward: 1,
            safety_send_cost: 0,
            safety_relay_reward: 10,
            health: HealthThresholds::default(),
        }
    }
}

impl EconomyConfig {
    /// Cost charged to the publisher. Help traffic pays the logistics rate.
    pub fn send_cost(&self, class: MessageClass) -> i64 {
        if class.is_safety() {
            self.safety_send_cost
        } else {
            self.logistics_send_cost
        }
    }

    /// Reward paid to a node for forwarding one copy.
    pub fn relay_reward(&self, class: MessageClass) -> i64 {
        if class.is_safety() {
            self.safety_relay_reward
        } else {
            self.logistics_relay_reward
        }
    }

    pub fn is_ubi_tick(&self, tick: u64) -> bool {
        self.ubi_interval_ticks > 0 && tick % self.ubi_interval_ticks == 0
    }
}

/// Reputation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReputationConfig {
    pub trust_threshold: f64,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            trust_threshold: 0.7,
        }
    }
}

/// Publish request limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageConfig {
    pub max_length: usize,
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self { max_length: 1_000 }
    }
}

/// Node placement and partition geography
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
    pub default_range_m: f64,
    pub min_range_m: f64,
    pub max_range_m: f64,
    pub partition_a: GeoPoint,
    pub partition_b: GeoPoint,
    pub partition_jitter_deg: f64,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            lat_min: 41.480,
            lat_max: 41.492,
            lon_min: -71.537,
            lon_max: -71.516,
            default_range_m: 100.0,
            min_range_m: 10.0,
            max_range_m: 500.0,
            partition_a: GeoPoint::new(47.6, -122.3),
            partition_b: GeoPoint::new(40.7, -74.0),
            partition_jitter_deg: 0.5,
        }
    }
}

impl MeshConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: MeshConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default path, or use defaults if not found
    pub fn load_or_default() -> Self {
        Self::load(DEFAULT_CONFIG_PATH).unwrap_or_else(|e| {
            tracing::warn!("Could not load {}: {}. Using defaults.", DEFAULT_CONFIG_PATH, e);
            Self::default()
        })
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.simulation.node_count == 0 {
            return Err(ConfigError::Invalid("simulation.node_count must be at least 1".into()));
        }
        if self.simulation.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "simulation.tick_interval_ms must be positive".into(),
            ));
        }
        if self.economy.initial_credits < 0 {
            return Err(ConfigError::Invalid(
                "economy.initial_credits cannot be negative".into(),
            ));
        }
        let p = &self.placement;
        if p.lat_min > p.lat_max || p.lon_min > p.lon_max {
            return Err(ConfigError::Invalid("placement bounding box is inverted".into()));
        }
        if p.min_range_m > p.max_range_m {
            return Err(ConfigError::Invalid("placement.min_range_m exceeds max_range_m".into()));
        }
        Ok(())
    }
}

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = MeshConfig::default();
        assert_eq!(config.simulation.node_count, 10);
        assert_eq!(config.inventory.max_size, 100);
        assert_eq!(config.inventory.ttl_ms(), 300_000);
        assert_eq!(config.contention.slots_per_tick, 5);
        assert_eq!(config.economy.send_cost(MessageClass::Safe), 0);
        assert_eq!(config.economy.send_cost(MessageClass::Help), 2);
        assert_eq!(config.economy.relay_reward(MessageClass::Safe), 10);
        assert_eq!(config.economy.relay_reward(MessageClass::Logistics), 1);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = MeshConfig::from_toml(
            r#"
            [contention]
            enabled = false

            [economy]
            ubi_amount = 7
            "#,
        )
        .unwrap();
        assert!(!config.contention.enabled);
        assert_eq!(config.contention.replicas, 2);
        assert_eq!(config.economy.ubi_amount, 7);
        assert_eq!(config.economy.ubi_interval_ticks, 10);
        assert_eq!(config.simulation.node_count, 10);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = MeshConfig::from_toml("[simulation]\nnode_count = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = MeshConfig::from_toml("[simulation\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_ubi_schedule() {
        let mut economy = EconomyConfig::default();
        assert!(economy.is_ubi_tick(10));
        assert!(!economy.is_ubi_tick(11));
        economy.ubi_interval_ticks = 0;
        assert!(!economy.is_ubi_tick(10));
    }

    #[test]
    fn test_load_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[inventory]\nmax_size = 12").unwrap();
        let config = MeshConfig::load(file.path()).unwrap();
        assert_eq!(config.inventory.max_size, 12);
        assert_eq!(config.inventory.packet_ttl_secs, 300);
    }

    #[test]
    fn test_round_trip_through_toml() {
        let config = MeshConfig::default();
        let text = config.to_toml().unwrap();
        assert_eq!(MeshConfig::from_toml(&text).unwrap(), config);
    }
}
