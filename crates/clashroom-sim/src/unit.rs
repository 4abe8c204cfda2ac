//! Units and headings.

use rand::Rng;

/// The eight fixed headings: four axis directions and four diagonals.
/// Scaled by `SimConfig::step` when assigned.
pub const HEADINGS: [(f64, f64); 8] = [
    (1.0, 0.0),
    (-1.0, 0.0),
    (0.0, 1.0),
    (0.0, -1.0),
    (1.0, 1.0),
    (-1.0, 1.0),
    (1.0, -1.0),
    (-1.0, -1.0),
];

/// One simulated token.
///
/// `kind` indexes into the run's `RuleSet`; the display symbol is looked up
/// from there when a frame is built.
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    pub kind: usize,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
}

impl Unit {
    pub fn new(kind: usize, x: f64, y: f64, vx: f64, vy: f64) -> Self {
        Self { kind, x, y, vx, vy }
    }

    /// Euclidean speed.
    pub fn speed(&self) -> f64 {
        self.vx.hypot(self.vy)
    }

    pub(crate) fn distance_sq(&self, other: &Unit) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

/// Picks one of [`HEADINGS`] uniformly and scales it by `step`.
pub(crate) fn random_heading<R: Rng>(rng: &mut R, step: f64) -> (f64, f64) {
    let (dx, dy) = HEADINGS[rng.random_range(0..HEADINGS.len())];
    (dx * step, dy * step)
}

/// Reflects one axis back inside `[0, max]`.
///
/// The velocity component is turned to point inward, so a unit that
/// spawned past the edge doesn't oscillate there.
pub(crate) fn bounce(position: &mut f64, velocity: &mut f64, max: f64) {
    if *position < 0.0 {
        *position = 0.0;
        *velocity = velocity.abs();
    } else if *position > max {
        *position = max;
        *velocity = -velocity.abs();
    }
}
