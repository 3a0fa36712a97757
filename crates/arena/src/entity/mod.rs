//! Simulation entities.
//!
//! Player cells are owned by the simulation; viruses are read-only snapshots
//! handed in by the world store every tick.

mod cell;
mod virus;

pub use cell::{
    Cell, MoveParams, WhoAteWho, MIN_DISTANCE, MIN_SPEED, PUSHING_AWAY_SPEED, SPEED_DECREMENT,
    SPLIT_CELL_SPEED, VIRUS_EAT_MASS,
};
pub use virus::Virus;
