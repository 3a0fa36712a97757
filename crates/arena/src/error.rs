//! Simulation error types.

use thiserror::Error;

/// Errors returned by id-addressed simulation operations and config checks.
#[derive(Debug, Error, PartialEq)]
pub enum ArenaError {
    #[error("Player not found: {0}")]
    PlayerNotFound(u32),

    #[error("Player {0} is already spawned")]
    AlreadySpawned(u32),

    #[error("Player {0} has not spawned yet")]
    NotSpawned(u32),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
