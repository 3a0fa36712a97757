//! Authoritative player and cell physics for a blob-eats-blob arena.

pub mod ai;
pub mod config;
pub mod entity;
pub mod error;
pub mod geometry;
pub mod player;
pub mod player_manager;
pub mod simulation;

// Re-export commonly used types
pub use config::Config;
pub use entity::{Cell, Virus, WhoAteWho};
pub use error::ArenaError;
pub use geometry::{Circle, CircleTest, Geometry, StandardGeometry};
pub use player::{CellRef, ClientData, Player};
pub use player_manager::{EatOutcome, LeaderboardEntry, PlayerManager};
pub use simulation::{Simulation, TickReport};
