//! Room lifecycle management for Clashroom.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns its
//! state machine, simulation, tick loop and any in-flight rule generation.
//!
//! # Key types
//!
//! - [`RoomRegistry`]: creates and tears down rooms, routes participants
//! - [`RoomSession`]: the per-room state machine, usable without a runtime
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`Choice`]: a validated participant option
//! - [`RoomConfig`]: room settings (participant limits, tick interval, etc.)

mod choice;
mod code;
mod config;
mod error;
mod registry;
mod room;
mod session;

pub use choice::{Choice, MAX_CUSTOM_LEN};
pub use code::{CODE_LEN, generate_code};
pub use config::RoomConfig;
pub use error::RoomError;
pub use registry::RoomRegistry;
pub use room::{ParticipantSender, RoomAction, RoomHandle, RoomInfo};
pub use session::{
    LeaveOutcome, Resolution, ResolutionRequest, RoomSession, RulesOutcome, TickReport,
};
