//! Virus snapshot.

use glam::DVec2;

/// Read-only view of a virus for one tick.
///
/// Viruses are owned by the external world store; the simulation only reads
/// their position and size to block small cells and detect consumption.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Virus {
    /// Centre in world coordinates.
    pub position: DVec2,
    pub radius: f64,
    /// A cell must outweigh the virus to consume it.
    pub mass: f64,
}

impl Virus {
    /// Create a new virus snapshot.
    pub fn new(position: DVec2, radius: f64, mass: f64) -> Self {
        Self {
            position,
            radius,
            mass,
        }
    }
}
