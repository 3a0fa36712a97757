//! Player-owned cell and its per-tick movement.

use super::virus::Virus;
use crate::geometry::{Circle, Geometry};
use glam::DVec2;
use rand::Rng;
use std::f64::consts::TAU;

/// Cruise speed floor every cell decays back to.
pub const MIN_SPEED: f64 = 6.25;
/// Burst speed given to freshly split cells.
pub const SPLIT_CELL_SPEED: f64 = 20.0;
/// Burst speed lost per tick.
pub const SPEED_DECREMENT: f64 = 0.5;
/// Distance (added to the radius) under which a cell brakes toward its target.
pub const MIN_DISTANCE: f64 = 50.0;
/// Per-tick separation applied to same-owner cells that may not merge yet.
pub const PUSHING_AWAY_SPEED: f64 = 1.1;
/// Cells at or above this mass pass over viruses instead of being blocked.
pub const VIRUS_EAT_MASS: f64 = 132.0;

/// Damping applied to the tangential slide along a virus.
const VIRUS_SLIDE_DAMPING: f64 = 0.5;
/// Speed multiplier applied when a cell is pushed out of a virus.
const VIRUS_BOUNCE_SPEED_MULT: f64 = 0.5;

/// Outcome of an eat check between two cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhoAteWho {
    /// Neither cell contains the other.
    None,
    /// The first cell swallowed the second.
    AAteB,
    /// The second cell swallowed the first.
    BAteA,
}

/// Per-tick movement inputs shared by every cell of every player.
#[derive(Debug, Clone, Copy)]
pub struct MoveParams<'a> {
    /// Logarithm base of the mass slowdown curve.
    pub slow_base: f64,
    /// `log(default_mass, slow_base)`; a spawn-sized cell gets no slowdown.
    pub init_mass_log: f64,
    pub game_width: f64,
    pub game_height: f64,
    /// Virus snapshot for this tick.
    pub viruses: &'a [Virus],
}

/// One circular mass unit owned by a player.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    /// Identifier unique within the owning player.
    pub id: u32,
    /// Position in world coordinates.
    pub position: DVec2,
    mass: f64,
    radius: f64,
    /// Current scalar speed.
    pub speed: f64,
}

impl Cell {
    /// Create a new cell; the radius is derived from `mass`.
    pub fn new(id: u32, position: DVec2, mass: f64, speed: f64, geometry: &dyn Geometry) -> Self {
        Self {
            id,
            position,
            mass,
            radius: geometry.mass_to_radius(mass),
            speed,
        }
    }

    #[inline]
    pub fn mass(&self) -> f64 {
        self.mass
    }

    #[inline]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Replace the mass and recompute the radius.
    #[inline]
    pub fn set_mass(&mut self, mass: f64, geometry: &dyn Geometry) {
        self.mass = mass;
        self.radius = geometry.mass_to_radius(mass);
    }

    #[inline]
    pub fn add_mass(&mut self, delta: f64, geometry: &dyn Geometry) {
        self.set_mass(self.mass + delta, geometry);
    }

    #[inline]
    pub fn to_circle(&self) -> Circle {
        Circle::new(self.position, self.radius)
    }

    /// Advance this cell by one tick toward `owner_position + owner_target`.
    ///
    /// The owner's target is an offset relative to the owner's centroid, so it
    /// is translated into this cell's frame first. Burst speed decays by
    /// [`SPEED_DECREMENT`] per tick; at cruise speed heavier cells are slowed
    /// logarithmically. Viruses either block the inward part of the motion or,
    /// when the cell already overlaps one, eject it and end the tick.
    pub fn move_toward<R: Rng + ?Sized>(
        &mut self,
        owner_position: DVec2,
        owner_target: DVec2,
        params: &MoveParams<'_>,
        geometry: &dyn Geometry,
        rng: &mut R,
    ) {
        let target = owner_position - self.position + owner_target;
        let dist = target.length();
        let angle = target.y.atan2(target.x);

        let slow_down = if self.speed <= MIN_SPEED {
            geometry.log(self.mass, params.slow_base) - params.init_mass_log + 1.0
        } else {
            1.0
        };

        let mut delta = DVec2::new(angle.cos(), angle.sin()) * self.speed / slow_down;

        if self.speed > MIN_SPEED {
            self.speed = (self.speed - SPEED_DECREMENT).max(MIN_SPEED);
        }

        let brake_distance = MIN_DISTANCE + self.radius;
        if dist < brake_distance {
            delta *= dist / brake_distance;
        }

        for virus in params.viruses {
            let combined = self.radius + virus.radius;
            let intended = self.position + delta;
            if intended.distance(virus.position) >= combined {
                continue;
            }
            if self.mass >= VIRUS_EAT_MASS {
                continue;
            }

            let separation = self.position - virus.position;
            let current = separation.length();

            if current < combined {
                self.position = if current > 0.0 {
                    virus.position + separation * ((combined + 1.0) / current)
                } else {
                    let angle = rng.random::<f64>() * TAU;
                    virus.position + DVec2::new(angle.cos(), angle.sin()) * combined
                };
                self.speed = MIN_SPEED.max(self.speed * VIRUS_BOUNCE_SPEED_MULT);
                return;
            }

            if current > 0.0 {
                let normal = separation / current;
                let inward = delta.dot(-normal);
                if inward > 0.0 {
                    delta += normal * inward;
                    delta *= VIRUS_SLIDE_DAMPING;
                }
            }
        }

        if !delta.y.is_nan() {
            self.position.y += delta.y;
        }
        if !delta.x.is_nan() {
            self.position.x += delta.x;
        }
    }

    /// Decide whether one of two cells swallowed the other.
    ///
    /// A missing cell never collides. Two identical circles on the same spot
    /// contain each other; that case is ambiguous and reported as
    /// [`WhoAteWho::None`].
    pub fn check_who_ate_who(a: Option<&Cell>, b: Option<&Cell>, geometry: &dyn Geometry) -> WhoAteWho {
        let (Some(a), Some(b)) = (a, b) else {
            return WhoAteWho::None;
        };

        let test = geometry.circle_circle(a.to_circle(), b.to_circle());
        match (test.colliding, test.b_in_a, test.a_in_b) {
            (true, true, false) => WhoAteWho::AAteB,
            (true, false, true) => WhoAteWho::BAteA,
            _ => WhoAteWho::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::StandardGeometry;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const SLOW_BASE: f64 = 4.5;
    const DEFAULT_MASS: f64 = 10.0;

    fn params(viruses: &[Virus]) -> MoveParams<'_> {
        MoveParams {
            slow_base: SLOW_BASE,
            init_mass_log: StandardGeometry.log(DEFAULT_MASS, SLOW_BASE),
            game_width: 5000.0,
            game_height: 5000.0,
            viruses,
        }
    }

    fn cell_at(x: f64, y: f64, mass: f64) -> Cell {
        Cell::new(0, DVec2::new(x, y), mass, MIN_SPEED, &StandardGeometry)
    }

    #[test]
    fn test_set_mass_recomputes_radius() {
        let mut cell = cell_at(0.0, 0.0, 10.0);
        cell.set_mass(100.0, &StandardGeometry);
        assert_eq!(cell.radius(), 64.0);
        cell.add_mass(-75.0, &StandardGeometry);
        assert_eq!(cell.mass(), 25.0);
        assert_eq!(cell.radius(), 34.0);
    }

    #[test]
    fn test_spawn_mass_moves_at_full_speed() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut cell = cell_at(100.0, 100.0, DEFAULT_MASS);
        cell.move_toward(cell.position, DVec2::new(1000.0, 0.0), &params(&[]), &StandardGeometry, &mut rng);

        assert!((cell.position.x - (100.0 + MIN_SPEED)).abs() < 1e-9);
        assert!((cell.position.y - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_heavy_cell_is_slower() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut light = cell_at(0.0, 0.0, 20.0);
        let mut heavy = cell_at(0.0, 0.0, 2000.0);
        let target = DVec2::new(3000.0, 0.0);

        light.move_toward(light.position, target, &params(&[]), &StandardGeometry, &mut rng);
        heavy.move_toward(heavy.position, target, &params(&[]), &StandardGeometry, &mut rng);

        assert!(heavy.position.x > 0.0);
        assert!(heavy.position.x < light.position.x);
    }

    #[test]
    fn test_burst_speed_decays_to_floor() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut cell = Cell::new(0, DVec2::ZERO, 40.0, SPLIT_CELL_SPEED, &StandardGeometry);
        let target = DVec2::new(10_000.0, 0.0);

        cell.move_toward(cell.position, target, &params(&[]), &StandardGeometry, &mut rng);
        assert!((cell.position.x - SPLIT_CELL_SPEED).abs() < 1e-9);
        assert_eq!(cell.speed, SPLIT_CELL_SPEED - SPEED_DECREMENT);

        for _ in 0..100 {
            let owner = cell.position;
            cell.move_toward(owner, target, &params(&[]), &StandardGeometry, &mut rng);
        }
        assert_eq!(cell.speed, MIN_SPEED);
    }

    #[test]
    fn test_no_overshoot_near_target() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut cell = cell_at(0.0, 0.0, DEFAULT_MASS);
        let target = DVec2::new(10.0, 0.0);

        for _ in 0..50 {
            // owner centroid stays at the origin, target stays at (10, 0)
            cell.move_toward(DVec2::ZERO, target, &params(&[]), &StandardGeometry, &mut rng);
            assert!(cell.position.x <= 10.0);
        }
        assert!(cell.position.x > 9.0);
    }

    #[test]
    fn test_zero_offset_does_not_move_or_nan() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut cell = cell_at(42.0, 24.0, DEFAULT_MASS);
        cell.move_toward(cell.position, DVec2::ZERO, &params(&[]), &StandardGeometry, &mut rng);
        assert_eq!(cell.position, DVec2::new(42.0, 24.0));
    }

    #[test]
    fn test_nan_target_leaves_position_untouched() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut cell = cell_at(42.0, 24.0, DEFAULT_MASS);
        let target = DVec2::new(f64::NAN, f64::NAN);
        cell.move_toward(cell.position, target, &params(&[]), &StandardGeometry, &mut rng);
        assert_eq!(cell.position, DVec2::new(42.0, 24.0));
    }

    #[test]
    fn test_small_cell_blocked_by_virus() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut cell = cell_at(0.0, 0.0, 131.0);
        let virus = Virus::new(DVec2::new(cell.radius() + 20.0 + 1.0, 0.0), 20.0, 100.0);
        let combined = cell.radius() + virus.radius;
        let viruses = [virus];

        for _ in 0..20 {
            cell.move_toward(cell.position, DVec2::new(1000.0, 0.0), &params(&viruses), &StandardGeometry, &mut rng);
            assert!(cell.position.distance(virus.position) >= combined - 1e-9);
        }
    }

    #[test]
    fn test_big_cell_passes_over_virus() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut cell = cell_at(0.0, 0.0, VIRUS_EAT_MASS);
        let virus = Virus::new(DVec2::new(cell.radius() + 20.0 + 1.0, 0.0), 20.0, 100.0);
        let combined = cell.radius() + virus.radius;
        let viruses = [virus];

        cell.move_toward(cell.position, DVec2::new(1000.0, 0.0), &params(&viruses), &StandardGeometry, &mut rng);
        assert!(cell.position.x > 0.0);
        assert!(cell.position.distance(virus.position) < combined);
    }

    #[test]
    fn test_slide_keeps_tangential_motion() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut cell = cell_at(0.0, 0.0, 50.0);
        let virus = Virus::new(DVec2::new(cell.radius() + 20.0 + 0.5, 0.0), 20.0, 100.0);
        let viruses = [virus];

        // diagonal toward the virus: the x part is blocked, the y part slides
        cell.move_toward(cell.position, DVec2::new(1000.0, 1000.0), &params(&viruses), &StandardGeometry, &mut rng);
        assert!(cell.position.x.abs() < 1e-9);
        assert!(cell.position.y > 0.0);
    }

    #[test]
    fn test_overlapping_small_cell_is_pushed_out() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut cell = Cell::new(0, DVec2::new(-30.0, 0.0), 40.0, 15.0, &StandardGeometry);
        let virus = Virus::new(DVec2::ZERO, 20.0, 100.0);
        let combined = cell.radius() + virus.radius;
        let viruses = [virus];

        cell.move_toward(cell.position, DVec2::new(100.0, 0.0), &params(&viruses), &StandardGeometry, &mut rng);

        assert!((cell.position.distance(virus.position) - (combined + 1.0)).abs() < 1e-9);
        assert!(cell.position.x < 0.0);
        assert_eq!(cell.speed, 7.25);
    }

    #[test]
    fn test_coincident_push_out_uses_random_direction() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut cell = cell_at(0.0, 0.0, 40.0);
        let virus = Virus::new(DVec2::ZERO, 20.0, 100.0);
        let combined = cell.radius() + virus.radius;
        let viruses = [virus];

        cell.move_toward(cell.position, DVec2::new(5.0, 0.0), &params(&viruses), &StandardGeometry, &mut rng);

        assert!((cell.position.length() - combined).abs() < 1e-9);
        assert_eq!(cell.speed, MIN_SPEED);
    }

    #[test]
    fn test_who_ate_who() {
        let big = cell_at(0.0, 0.0, 100.0);
        let small = cell_at(5.0, 0.0, 50.0);
        let far = cell_at(1000.0, 0.0, 50.0);

        assert_eq!(Cell::check_who_ate_who(Some(&big), Some(&small), &StandardGeometry), WhoAteWho::AAteB);
        assert_eq!(Cell::check_who_ate_who(Some(&small), Some(&big), &StandardGeometry), WhoAteWho::BAteA);
        assert_eq!(Cell::check_who_ate_who(Some(&big), Some(&far), &StandardGeometry), WhoAteWho::None);
        assert_eq!(Cell::check_who_ate_who(None, Some(&small), &StandardGeometry), WhoAteWho::None);
    }

    #[test]
    fn test_identical_coincident_cells_are_ambiguous() {
        let a = cell_at(10.0, 10.0, 30.0);
        let b = cell_at(10.0, 10.0, 30.0);
        assert_eq!(Cell::check_who_ate_who(Some(&a), Some(&b), &StandardGeometry), WhoAteWho::None);
    }
}
