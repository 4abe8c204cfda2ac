//! # Clashroom
//!
//! A multiplayer room server for a dominance game. Participants gather in a
//! room, each picks an option type (rock, paper, scissors, or anything
//! they like when a rule generator is configured), and the server runs a
//! shared simulation in which units of every chosen type roam an arena and
//! convert the units they beat until one type is left.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use clashroom::prelude::*;
//!
//! # async fn run() -> Result<(), ClashroomError> {
//! let config = ServerConfig::from_env()?;
//! let server = ClashroomServerBuilder::from_config(&config)
//!     .build(config.rule_generator())
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod gateway;
mod handler;
mod server;

pub use config::{DEFAULT_BIND, DEFAULT_RULES_MODEL, ServerConfig};
pub use error::ClashroomError;
pub use gateway::SessionGateway;
pub use server::{ClashroomServer, ClashroomServerBuilder};

/// Convenience re-exports for running and talking to a server.
pub mod prelude {
    pub use crate::{ClashroomError, ClashroomServer, ClashroomServerBuilder, ServerConfig};
    pub use clashroom_protocol::{
        ClientEvent, ErrorKind, GameFrame, ParticipantId, RoomCode, RoomState, RoomSummary,
        ServerEvent, UnitView, WinnerView,
    };
    pub use clashroom_room::{RoomConfig, RoomRegistry};
    pub use clashroom_rules::{RuleGenerator, RuleProvider, RuleSet};
}
