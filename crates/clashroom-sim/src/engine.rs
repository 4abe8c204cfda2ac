//! The per-room simulation engine.

use std::sync::Arc;

use clashroom_protocol::UnitView;
use clashroom_rules::RuleSet;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::unit::{bounce, random_heading};
use crate::{SimConfig, Unit};

/// What happened during one [`SimulationEngine::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutcome {
    /// Tick number after the step (1 for the first step).
    pub tick: u64,
    /// Units converted during this step.
    pub conversions: usize,
    /// Set once a single type remains.
    pub winner: Option<usize>,
}

/// Owns and advances every unit of one running room.
///
/// Unit types are indices into the run's [`RuleSet`]. The number of units
/// is fixed at spawn; losing a collision converts a unit in place.
pub struct SimulationEngine {
    config: SimConfig,
    rules: Arc<RuleSet>,
    units: Vec<Unit>,
    rng: StdRng,
    tick: u64,
    winner: Option<usize>,
}

impl SimulationEngine {
    /// Spawns `units_per_choice` units for every entry of `choices`.
    ///
    /// Choices are rule set indices, one per participant; duplicates spawn
    /// duplicate squads. Indices outside the rule set are ignored.
    pub fn spawn(config: SimConfig, rules: Arc<RuleSet>, choices: &[usize]) -> Self {
        Self::spawn_with_rng(config, rules, choices, StdRng::from_os_rng())
    }

    /// Like [`spawn`](Self::spawn), but reproducible.
    pub fn spawn_seeded(
        config: SimConfig,
        rules: Arc<RuleSet>,
        choices: &[usize],
        seed: u64,
    ) -> Self {
        Self::spawn_with_rng(config, rules, choices, StdRng::seed_from_u64(seed))
    }

    /// Starts from hand-placed units. Randomness after this point comes
    /// from `seed`.
    pub fn from_units(config: SimConfig, rules: Arc<RuleSet>, units: Vec<Unit>, seed: u64) -> Self {
        Self {
            config,
            rules,
            units,
            rng: StdRng::seed_from_u64(seed),
            tick: 0,
            winner: None,
        }
    }

    fn spawn_with_rng(
        config: SimConfig,
        rules: Arc<RuleSet>,
        choices: &[usize],
        mut rng: StdRng,
    ) -> Self {
        let mut units = Vec::with_capacity(choices.len() * config.units_per_choice);
        for &kind in choices.iter().filter(|&&k| k < rules.len()) {
            for _ in 0..config.units_per_choice {
                let x = rng.random::<f64>() * config.max_x();
                let y = rng.random::<f64>() * config.max_y();
                let (vx, vy) = random_heading(&mut rng, config.step);
                units.push(Unit::new(kind, x, y, vx, vy));
            }
        }

        tracing::debug!(
            units = units.len(),
            types = rules.len(),
            "simulation spawned"
        );

        Self {
            config,
            rules,
            units,
            rng,
            tick: 0,
            winner: None,
        }
    }

    /// Advances the simulation by one tick.
    ///
    /// Once a winner exists the engine is frozen: further calls change
    /// nothing and report the same winner.
    pub fn step(&mut self) -> StepOutcome {
        if let Some(winner) = self.winner {
            return StepOutcome {
                tick: self.tick,
                conversions: 0,
                winner: Some(winner),
            };
        }

        self.tick += 1;
        let (max_x, max_y) = (self.config.max_x(), self.config.max_y());
        let (chance, step) = (self.config.perturbation_chance, self.config.step);

        for unit in &mut self.units {
            unit.x += unit.vx;
            unit.y += unit.vy;
            bounce(&mut unit.x, &mut unit.vx, max_x);
            bounce(&mut unit.y, &mut unit.vy, max_y);
            if self.rng.random::<f64>() < chance {
                (unit.vx, unit.vy) = random_heading(&mut self.rng, step);
            }
        }

        let conversions = self.resolve_collisions();
        self.winner = sole_kind(&self.units);

        if let Some(winner) = self.winner {
            tracing::debug!(
                tick = self.tick,
                winner = self.rules.option(winner),
                "one type left"
            );
        }

        StepOutcome {
            tick: self.tick,
            conversions,
            winner: self.winner,
        }
    }

    /// Converts every unit that is within range of a unit it loses to.
    ///
    /// Decisions are made against the types as they stood before the pass,
    /// so the result doesn't depend on iteration order. If several
    /// dominating units are in range, the nearest one wins the unit.
    fn resolve_collisions(&mut self) -> usize {
        let threshold_sq = self.config.collision_distance * self.config.collision_distance;
        let rules = &self.rules;

        let conversions: Vec<(usize, usize)> = self
            .units
            .iter()
            .enumerate()
            .filter_map(|(i, unit)| {
                self.units
                    .iter()
                    .filter(|other| other.kind != unit.kind && rules.loses_to(unit.kind, other.kind))
                    .map(|other| (unit.distance_sq(other), other.kind))
                    .filter(|(dist_sq, _)| *dist_sq < threshold_sq)
                    .min_by(|a, b| a.0.total_cmp(&b.0))
                    .map(|(_, kind)| (i, kind))
            })
            .collect();

        for &(i, kind) in &conversions {
            self.units[i].kind = kind;
        }
        conversions.len()
    }

    /// Multiplies the velocity of every unit of `kind` by the boost factor,
    /// capped per component at `max_speed`. Returns the number of units
    /// affected.
    pub fn boost(&mut self, kind: usize) -> usize {
        let factor = self.config.boost_multiplier;
        let cap = self.config.max_speed.abs();
        let mut affected = 0;
        for unit in self.units.iter_mut().filter(|u| u.kind == kind) {
            unit.vx = cap_component(unit.vx * factor, cap);
            unit.vy = cap_component(unit.vy * factor, cap);
            affected += 1;
        }
        tracing::trace!(kind, affected, "boost applied");
        affected
    }

    /// Snapshot of every unit for the wire.
    pub fn frame(&self) -> Vec<UnitView> {
        self.units
            .iter()
            .map(|u| UnitView {
                kind: self.rules.option(u.kind).to_string(),
                symbol: self.rules.symbol(u.kind).to_string(),
                x: u.x,
                y: u.y,
            })
            .collect()
    }

    /// Distinct types still present, ascending.
    pub fn remaining_kinds(&self) -> Vec<usize> {
        let mut kinds: Vec<usize> = self.units.iter().map(|u| u.kind).collect();
        kinds.sort_unstable();
        kinds.dedup();
        kinds
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Ticks executed so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn winner(&self) -> Option<usize> {
        self.winner
    }
}

fn sole_kind(units: &[Unit]) -> Option<usize> {
    let first = units.first()?.kind;
    units.iter().all(|u| u.kind == first).then_some(first)
}

fn cap_component(value: f64, cap: f64) -> f64 {
    value.max(-cap).min(cap)
}

#[cfg(test)]
mod tests {
    use clashroom_rules::RuleEntry;

    use super::*;

    const ROCK: usize = 0;
    const PAPER: usize = 1;
    const SCISSORS: usize = 2;

    /// No random heading changes, so hand-placed units stay put.
    fn still_config() -> SimConfig {
        SimConfig {
            perturbation_chance: 0.0,
            ..SimConfig::default()
        }
    }

    fn builtin() -> Arc<RuleSet> {
        Arc::new(RuleSet::builtin())
    }

    fn parked(kind: usize, x: f64, y: f64) -> Unit {
        Unit::new(kind, x, y, 0.0, 0.0)
    }

    #[test]
    fn test_builtin_indices_match_constants() {
        let rules = RuleSet::builtin();
        assert_eq!(rules.index_of("rock"), Some(ROCK));
        assert_eq!(rules.index_of("paper"), Some(PAPER));
        assert_eq!(rules.index_of("scissors"), Some(SCISSORS));
    }

    #[test]
    fn test_spawn_creates_five_units_per_choice() {
        let engine = SimulationEngine::spawn_seeded(
            SimConfig::default(),
            builtin(),
            &[ROCK, PAPER, PAPER],
            1,
        );
        assert_eq!(engine.units().len(), 15);
        assert_eq!(engine.units().iter().filter(|u| u.kind == PAPER).count(), 10);
    }

    #[test]
    fn test_spawn_places_units_in_arena_with_fixed_headings() {
        let config = SimConfig::default();
        let engine = SimulationEngine::spawn_seeded(config.clone(), builtin(), &[ROCK, PAPER], 9);
        for unit in engine.units() {
            assert!((0.0..=config.max_x()).contains(&unit.x));
            assert!((0.0..=config.max_y()).contains(&unit.y));
            assert!(crate::HEADINGS
                .iter()
                .any(|&(dx, dy)| dx * config.step == unit.vx && dy * config.step == unit.vy));
        }
    }

    #[test]
    fn test_spawn_ignores_unknown_kind() {
        let engine = SimulationEngine::spawn_seeded(SimConfig::default(), builtin(), &[ROCK, 99], 1);
        assert_eq!(engine.units().len(), 5);
    }

    #[test]
    fn test_step_moves_by_velocity() {
        let units = vec![Unit::new(ROCK, 100.0, 100.0, 2.0, -2.0), parked(PAPER, 500.0, 500.0)];
        let mut engine = SimulationEngine::from_units(still_config(), builtin(), units, 0);
        engine.step();
        assert_eq!((engine.units()[0].x, engine.units()[0].y), (102.0, 98.0));
    }

    #[test]
    fn test_step_converts_loser_in_range() {
        let units = vec![parked(ROCK, 100.0, 100.0), parked(PAPER, 120.0, 100.0)];
        let mut engine = SimulationEngine::from_units(still_config(), builtin(), units, 0);

        let outcome = engine.step();

        assert_eq!(outcome.conversions, 1);
        assert_eq!(engine.units()[0].kind, PAPER);
        assert_eq!(engine.units()[1].kind, PAPER);
    }

    #[test]
    fn test_step_ignores_pairs_at_threshold() {
        let units = vec![parked(ROCK, 100.0, 100.0), parked(PAPER, 130.0, 100.0)];
        let mut engine = SimulationEngine::from_units(still_config(), builtin(), units, 0);
        let outcome = engine.step();
        assert_eq!(outcome.conversions, 0);
        assert_eq!(engine.remaining_kinds(), vec![ROCK, PAPER]);
    }

    #[test]
    fn test_step_conversion_is_order_independent() {
        // rock→paper, paper→scissors, scissors→rock all in range at once.
        // Against the pre-pass snapshot each unit takes its dominator's
        // type, so the three types rotate instead of collapsing.
        let units = vec![
            parked(ROCK, 100.0, 100.0),
            parked(PAPER, 110.0, 100.0),
            parked(SCISSORS, 105.0, 108.0),
        ];
        let mut engine = SimulationEngine::from_units(still_config(), builtin(), units, 0);
        let outcome = engine.step();

        assert_eq!(outcome.conversions, 3);
        let kinds: Vec<usize> = engine.units().iter().map(|u| u.kind).collect();
        assert_eq!(kinds, vec![PAPER, SCISSORS, ROCK]);
        assert_eq!(outcome.winner, None);
    }

    #[test]
    fn test_step_nearest_dominator_decides() {
        // Rock-paper-scissors-lizard-spock: scissors loses to rock and spock.
        let rules = Arc::new(
            RuleSet::from_entries(vec![
                RuleEntry::new("scissors", "✂️", &["rock", "spock"]),
                RuleEntry::new("paper", "📄", &["scissors", "lizard"]),
                RuleEntry::new("rock", "🪨", &["paper", "spock"]),
                RuleEntry::new("lizard", "🦎", &["rock", "scissors"]),
                RuleEntry::new("spock", "🖖", &["paper", "lizard"]),
            ])
            .unwrap(),
        );
        let scissors = rules.index_of("scissors").unwrap();
        let rock = rules.index_of("rock").unwrap();
        let spock = rules.index_of("spock").unwrap();

        let units = vec![
            parked(scissors, 100.0, 100.0),
            parked(rock, 100.0, 125.0),
            parked(spock, 105.0, 100.0),
        ];
        let mut engine = SimulationEngine::from_units(still_config(), rules, units, 0);
        engine.step();

        assert_eq!(engine.units()[0].kind, spock);
    }

    #[test]
    fn test_step_reports_winner_and_freezes() {
        let units = vec![
            Unit::new(ROCK, 100.0, 100.0, 1.0, 0.0),
            parked(PAPER, 120.0, 100.0),
        ];
        let mut engine = SimulationEngine::from_units(still_config(), builtin(), units, 0);

        let outcome = engine.step();
        assert_eq!(outcome.winner, Some(PAPER));
        assert_eq!(outcome.tick, 1);

        let positions: Vec<(f64, f64)> = engine.units().iter().map(|u| (u.x, u.y)).collect();
        let again = engine.step();
        assert_eq!(again.tick, 1);
        assert_eq!(again.winner, Some(PAPER));
        let after: Vec<(f64, f64)> = engine.units().iter().map(|u| (u.x, u.y)).collect();
        assert_eq!(positions, after);
    }

    #[test]
    fn test_boost_scales_only_target_kind() {
        let units = vec![
            Unit::new(ROCK, 100.0, 100.0, 2.0, -2.0),
            Unit::new(PAPER, 400.0, 400.0, 0.0, 2.0),
        ];
        let mut engine = SimulationEngine::from_units(still_config(), builtin(), units, 0);

        let (rock_speed, paper_speed) = (engine.units()[0].speed(), engine.units()[1].speed());

        let affected = engine.boost(ROCK);

        assert_eq!(affected, 1);
        assert_eq!((engine.units()[0].vx, engine.units()[0].vy), (4.0, -4.0));
        assert!((engine.units()[0].speed() - rock_speed * 2.0).abs() < 1e-9);
        assert_eq!((engine.units()[1].vx, engine.units()[1].vy), (0.0, 2.0));
        assert_eq!(engine.units()[1].speed(), paper_speed);
    }

    #[test]
    fn test_boost_is_capped() {
        let units = vec![Unit::new(ROCK, 100.0, 100.0, 2.0, -2.0), parked(PAPER, 400.0, 400.0)];
        let mut engine = SimulationEngine::from_units(still_config(), builtin(), units, 0);
        for _ in 0..10 {
            engine.boost(ROCK);
        }
        let cap = engine.config().max_speed;
        assert_eq!((engine.units()[0].vx, engine.units()[0].vy), (cap, -cap));
    }

    #[test]
    fn test_frame_carries_type_and_symbol() {
        let units = vec![parked(SCISSORS, 1.0, 2.0)];
        let engine = SimulationEngine::from_units(still_config(), builtin(), units, 0);
        let frame = engine.frame();
        assert_eq!(frame[0].kind, "scissors");
        assert_eq!(frame[0].symbol, "✂️");
        assert_eq!((frame[0].x, frame[0].y), (1.0, 2.0));
    }
}
