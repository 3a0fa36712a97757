//! Simulation configuration.

use crate::error::ArenaError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub world: WorldConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub virus: VirusConfig,
}

impl Config {
    /// Load configuration from `path`, writing a default file if it is missing.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str(&contents)?
        } else {
            info!("No {} found, creating default config", path.display());
            let default_config = Self::default();
            std::fs::write(path, toml::to_string_pretty(&default_config)?)?;
            default_config
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values the simulation cannot run with.
    pub fn validate(&self) -> Result<(), ArenaError> {
        let invalid = |reason: &str| Err(ArenaError::InvalidConfig(reason.to_string()));

        if self.server.tick_interval_ms == 0 {
            return invalid("server.tick_interval_ms must be positive");
        }
        if self.server.decay_interval_ticks == 0 || self.server.leaderboard_interval_ticks == 0 {
            return invalid("server tick intervals must be positive");
        }
        if !(self.world.width > 0.0 && self.world.height > 0.0) {
            return invalid("world size must be positive");
        }
        if !(self.player.default_mass > 0.0) {
            return invalid("player.default_mass must be positive");
        }
        if self.player.max_cells == 0 {
            return invalid("player.max_cells must be at least 1");
        }
        if !(self.player.slow_base > 1.0) {
            return invalid("player.slow_base must be greater than 1");
        }
        if !(0.0..1000.0).contains(&self.player.mass_loss_rate) {
            return invalid("player.mass_loss_rate must be in [0, 1000)");
        }
        Ok(())
    }
}

/// Tick cadence and housekeeping.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Tick interval in milliseconds.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// RNG seed; entropy is used when unset.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Number of bots to spawn.
    #[serde(default)]
    pub bots: usize,
    /// Players silent for longer than this are evicted.
    #[serde(default = "default_max_heartbeat_interval")]
    pub max_heartbeat_interval_ms: u64,
    /// Mass decay runs once every this many ticks.
    #[serde(default = "default_decay_interval")]
    pub decay_interval_ticks: u64,
    /// Leaderboard is recomputed once every this many ticks.
    #[serde(default = "default_leaderboard_interval")]
    pub leaderboard_interval_ticks: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval(),
            seed: None,
            bots: 0,
            max_heartbeat_interval_ms: default_max_heartbeat_interval(),
            decay_interval_ticks: default_decay_interval(),
            leaderboard_interval_ticks: default_leaderboard_interval(),
        }
    }
}

fn default_tick_interval() -> u64 {
    16
}
fn default_max_heartbeat_interval() -> u64 {
    5000
}
fn default_decay_interval() -> u64 {
    60
}
fn default_leaderboard_interval() -> u64 {
    60
}

/// World size. The world spans `[0, width] x [0, height]`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorldConfig {
    #[serde(default = "default_world_size")]
    pub width: f64,
    #[serde(default = "default_world_size")]
    pub height: f64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: default_world_size(),
            height: default_world_size(),
        }
    }
}

fn default_world_size() -> f64 {
    5000.0
}

/// Player physics.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlayerConfig {
    /// Spawn mass; also the smallest piece a split may produce.
    #[serde(default = "default_player_mass")]
    pub default_mass: f64,
    /// Maximum number of cells per player.
    #[serde(default = "default_max_cells")]
    pub max_cells: usize,
    /// Decay per run, in thousandths of a cell's mass.
    #[serde(default = "default_mass_loss_rate")]
    pub mass_loss_rate: f64,
    /// Players at or below this total mass do not decay.
    #[serde(default = "default_min_mass_loss")]
    pub min_mass_loss: f64,
    /// Logarithm base of the mass slowdown curve.
    #[serde(default = "default_slow_base")]
    pub slow_base: f64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            default_mass: default_player_mass(),
            max_cells: default_max_cells(),
            mass_loss_rate: default_mass_loss_rate(),
            min_mass_loss: default_min_mass_loss(),
            slow_base: default_slow_base(),
        }
    }
}

fn default_player_mass() -> f64 {
    10.0
}
fn default_max_cells() -> usize {
    16
}
fn default_mass_loss_rate() -> f64 {
    1.0
}
fn default_min_mass_loss() -> f64 {
    50.0
}
fn default_slow_base() -> f64 {
    4.5
}

/// Virus field kept up by the world store around the simulation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VirusConfig {
    #[serde(default = "default_virus_amount")]
    pub amount: usize,
    #[serde(default = "default_virus_mass")]
    pub mass: f64,
}

impl Default for VirusConfig {
    fn default() -> Self {
        Self {
            amount: default_virus_amount(),
            mass: default_virus_mass(),
        }
    }
}

fn default_virus_amount() -> usize {
    50
}
fn default_virus_mass() -> f64 {
    100.0
}
