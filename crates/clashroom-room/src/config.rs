//! Room configuration.

use std::time::Duration;

use clashroom_sim::SimConfig;
use clashroom_tick::TickPolicy;
use serde::{Deserialize, Serialize};

/// Settings shared by every room a registry creates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Participants needed before `start` is accepted.
    pub min_participants: usize,

    /// Roster cap. Joins beyond it fail with `RoomFull`.
    pub max_participants: usize,

    /// Time between simulation ticks while running.
    pub tick_interval: Duration,

    /// How the tick loop catches up after waking up late.
    pub tick_policy: TickPolicy,

    /// Upper bound on one custom rule generation call. Hitting it counts
    /// as a generation failure.
    pub rules_timeout: Duration,

    /// Capacity of each room actor's command channel.
    pub channel_size: usize,

    /// Upper bound on one round trip to a room actor. A request that
    /// doesn't get a reply in time fails with `RoomError::Timeout`.
    pub command_timeout: Duration,

    /// Arena and movement constants for the simulation.
    pub sim: SimConfig,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            min_participants: 2,
            max_participants: 8,
            tick_interval: Duration::from_millis(20),
            tick_policy: TickPolicy::Skip,
            rules_timeout: Duration::from_secs(15),
            channel_size: 64,
            command_timeout: Duration::from_secs(1),
            sim: SimConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_config_default() {
        let config = RoomConfig::default();
        assert_eq!(config.min_participants, 2);
        assert_eq!(config.max_participants, 8);
        assert_eq!(config.tick_interval, Duration::from_millis(20));
        assert_eq!(config.rules_timeout, Duration::from_secs(15));
        assert_eq!(config.tick_policy, TickPolicy::Skip);
        assert_eq!(config.channel_size, 64);
        assert_eq!(config.command_timeout, Duration::from_secs(1));
        assert_eq!(config.sim.units_per_choice, 5);
    }
}
