//! Demo virus field owned by the runner.

use arena::{Geometry, Virus};
use glam::DVec2;
use rand::Rng;

/// Fixed-size set of viruses, topped up after cells eat some.
#[derive(Debug)]
pub struct VirusField {
    viruses: Vec<Virus>,
    amount: usize,
    mass: f64,
    width: f64,
    height: f64,
}

impl VirusField {
    pub fn new(amount: usize, mass: f64, width: f64, height: f64) -> Self {
        Self {
            viruses: Vec::with_capacity(amount),
            amount,
            mass,
            width,
            height,
        }
    }

    pub fn viruses(&self) -> &[Virus] {
        &self.viruses
    }

    /// Drop consumed viruses. Indexes refer to the slice handed to the last tick.
    pub fn remove(&mut self, consumed: &[usize]) {
        let mut indexes = consumed.to_vec();
        indexes.sort_unstable_by(|a, b| b.cmp(a));
        indexes.dedup();
        for index in indexes {
            if index < self.viruses.len() {
                self.viruses.swap_remove(index);
            }
        }
    }

    /// Spawn viruses at random positions until the field is full again.
    /// Returns how many were added.
    pub fn refill<R: Rng + ?Sized>(&mut self, geometry: &dyn Geometry, rng: &mut R) -> usize {
        let radius = geometry.mass_to_radius(self.mass);
        let missing = self.amount.saturating_sub(self.viruses.len());
        for _ in 0..missing {
            let position = DVec2::new(
                rng.random_range(0.0..self.width),
                rng.random_range(0.0..self.height),
            );
            self.viruses.push(Virus::new(position, radius, self.mass));
        }
        missing
    }
}
