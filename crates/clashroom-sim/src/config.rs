//! Simulation tuning.

use serde::{Deserialize, Serialize};

/// Arena geometry and movement constants for one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Arena width in arena units.
    pub arena_width: f64,

    /// Arena height in arena units.
    pub arena_height: f64,

    /// Drawn size of a unit. Positions stay within
    /// `[0, arena - unit_size]` on each axis.
    pub unit_size: f64,

    /// Per-axis speed of a freshly chosen heading.
    pub step: f64,

    /// Units closer than this collide.
    pub collision_distance: f64,

    /// Chance per unit per tick of picking a new heading.
    pub perturbation_chance: f64,

    /// Factor applied by a boost.
    pub boost_multiplier: f64,

    /// Ceiling on the absolute value of each velocity component.
    /// Repeated boosts stop compounding once they reach it.
    pub max_speed: f64,

    /// Units spawned for every committed choice.
    pub units_per_choice: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            arena_width: 800.0,
            arena_height: 600.0,
            unit_size: 30.0,
            step: 2.0,
            collision_distance: 30.0,
            perturbation_chance: 0.2,
            boost_multiplier: 2.0,
            max_speed: 16.0,
            units_per_choice: 5,
        }
    }
}

impl SimConfig {
    /// Largest legal x coordinate.
    pub fn max_x(&self) -> f64 {
        (self.arena_width - self.unit_size).max(0.0)
    }

    /// Largest legal y coordinate.
    pub fn max_y(&self) -> f64 {
        (self.arena_height - self.unit_size).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sim_config_default_matches_arena() {
        let config = SimConfig::default();
        assert_eq!(config.max_x(), 770.0);
        assert_eq!(config.max_y(), 570.0);
        assert_eq!(config.units_per_choice, 5);
        assert_eq!(config.max_speed, 8.0 * config.step);
    }
}
