//! Geometry and math helpers used by the simulation.
//!
//! Everything the cell physics needs from the outside world goes through the
//! [`Geometry`] trait: the mass to radius curve, the logarithm used for
//! slowdown, the circle-circle test and the world border clamp. The provided
//! methods are the standard arena geometry; tests can override any of them
//! with a stub.

use glam::DVec2;

/// Base radius every cell has regardless of mass.
pub const BASE_RADIUS: f64 = 4.0;
/// Radius gained per unit of sqrt(mass).
pub const RADIUS_PER_SQRT_MASS: f64 = 6.0;

/// A circle in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub center: DVec2,
    pub radius: f64,
}

impl Circle {
    pub fn new(center: DVec2, radius: f64) -> Self {
        Self { center, radius }
    }
}

/// Result of testing two circles against each other.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CircleTest {
    /// Circles touch or overlap.
    pub colliding: bool,
    /// `a` lies entirely inside `b`.
    pub a_in_b: bool,
    /// `b` lies entirely inside `a`.
    pub b_in_a: bool,
}

/// Pure geometry capability injected into the simulation.
pub trait Geometry: Send + Sync {
    /// Radius of a cell of the given mass. Must be monotonic.
    fn mass_to_radius(&self, mass: f64) -> f64 {
        BASE_RADIUS + mass.sqrt() * RADIUS_PER_SQRT_MASS
    }

    /// Logarithm of `value` in the given `base`.
    fn log(&self, value: f64, base: f64) -> f64 {
        value.ln() / base.ln()
    }

    /// Test two circles for overlap and containment.
    fn circle_circle(&self, a: Circle, b: Circle) -> CircleTest {
        let total = a.radius + b.radius;
        let dist_sq = a.center.distance_squared(b.center);
        if dist_sq > total * total {
            return CircleTest::default();
        }

        let dist = dist_sq.sqrt();
        CircleTest {
            colliding: true,
            a_in_b: a.radius <= b.radius && dist <= b.radius - a.radius,
            b_in_a: b.radius <= a.radius && dist <= a.radius - b.radius,
        }
    }

    /// Clamp `position` so it stays `padding + border_offset` away from every
    /// edge of a `width` x `height` world anchored at the origin.
    fn adjust_for_boundaries(
        &self,
        position: &mut DVec2,
        padding: f64,
        border_offset: f64,
        width: f64,
        height: f64,
    ) {
        let border = padding + border_offset;
        if position.x > width - border {
            position.x = width - border;
        }
        if position.y > height - border {
            position.y = height - border;
        }
        if position.x < border {
            position.x = border;
        }
        if position.y < border {
            position.y = border;
        }
    }
}

/// The standard arena geometry.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardGeometry;

impl Geometry for StandardGeometry {}
