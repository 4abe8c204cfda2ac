//! Stepped unit simulation for Clashroom.
//!
//! A [`SimulationEngine`] owns every unit of one running room. Each call to
//! [`SimulationEngine::step`] advances the arena by one tick:
//!
//! 1. movement
//! 2. boundary bounce
//! 3. random heading changes
//! 4. collision-driven type conversion
//! 5. win check
//!
//! The engine is a plain value with no clock and no I/O. The room actor
//! decides when to step it.

mod config;
mod engine;
mod unit;

pub use config::SimConfig;
pub use engine::{SimulationEngine, StepOutcome};
pub use unit::{Unit, HEADINGS};
