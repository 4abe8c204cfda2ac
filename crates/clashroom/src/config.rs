//! Server configuration read from the environment.

use std::time::Duration;

use clashroom_room::RoomConfig;
use clashroom_rules::{HttpRuleConfig, HttpRuleProvider, RuleGenerator};
use clashroom_tick::TickPolicy;
use clashroom_transport::DEFAULT_HANDSHAKE_TIMEOUT;

use crate::ClashroomError;

pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub const DEFAULT_RULES_MODEL: &str = "gpt-4o-mini";

/// Everything the binary needs to start a server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind: String,
    pub room: RoomConfig,
    /// Time a new socket gets to finish the WebSocket upgrade.
    pub handshake_timeout: Duration,
    /// Rule generator endpoint. `None` disables custom options.
    pub rules: Option<HttpRuleConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            room: RoomConfig::default(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            rules: None,
        }
    }
}

impl ServerConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `CLASHROOM_BIND` | `127.0.0.1:3000` |
    /// | `CLASHROOM_TICK_MS` | `20` |
    /// | `CLASHROOM_TICK_POLICY` | `skip` (or `drop`) |
    /// | `CLASHROOM_RULES_TIMEOUT_MS` | `15000` |
    /// | `CLASHROOM_MAX_PARTICIPANTS` | `8` |
    /// | `CLASHROOM_HANDSHAKE_TIMEOUT_MS` | `10000` |
    /// | `RULES_API_URL` | unset |
    /// | `RULES_API_KEY` | unset |
    /// | `RULES_MODEL` | `gpt-4o-mini` |
    ///
    /// # Errors
    /// Returns `ClashroomError::Config` when a numeric variable doesn't
    /// parse or is out of range.
    pub fn from_env() -> Result<Self, ClashroomError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ClashroomError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(bind) = var("CLASHROOM_BIND") {
            config.bind = bind.trim().to_string();
        }
        if let Some(ms) = parse_number(&var, "CLASHROOM_TICK_MS")? {
            if ms == 0 {
                return Err(ClashroomError::Config(
                    "CLASHROOM_TICK_MS must be greater than 0".into(),
                ));
            }
            config.room.tick_interval = Duration::from_millis(ms);
        }
        if let Some(policy) = var("CLASHROOM_TICK_POLICY") {
            config.room.tick_policy = match policy.trim().to_ascii_lowercase().as_str() {
                "skip" => TickPolicy::Skip,
                "drop" => TickPolicy::Drop,
                other => {
                    return Err(ClashroomError::Config(format!(
                        "CLASHROOM_TICK_POLICY must be `skip` or `drop`, got {other:?}"
                    )));
                }
            };
        }
        if let Some(ms) = parse_number(&var, "CLASHROOM_RULES_TIMEOUT_MS")? {
            config.room.rules_timeout = Duration::from_millis(ms);
        }
        if let Some(max) = parse_number(&var, "CLASHROOM_MAX_PARTICIPANTS")? {
            let max = usize::try_from(max).map_err(|_| {
                ClashroomError::Config(format!("CLASHROOM_MAX_PARTICIPANTS is too large: {max}"))
            })?;
            if max < config.room.min_participants {
                return Err(ClashroomError::Config(format!(
                    "CLASHROOM_MAX_PARTICIPANTS must be at least {}, got {max}",
                    config.room.min_participants
                )));
            }
            config.room.max_participants = max;
        }
        if let Some(ms) = parse_number(&var, "CLASHROOM_HANDSHAKE_TIMEOUT_MS")? {
            config.handshake_timeout = Duration::from_millis(ms);
        }

        // Both halves are needed; a URL without a key is as good as nothing.
        config.rules = match (var("RULES_API_URL"), var("RULES_API_KEY")) {
            (Some(api_url), Some(api_key)) => Some(HttpRuleConfig {
                api_url: api_url.trim().to_string(),
                api_key: api_key.trim().to_string(),
                model: var("RULES_MODEL")
                    .map(|m| m.trim().to_string())
                    .unwrap_or_else(|| DEFAULT_RULES_MODEL.to_string()),
            }),
            _ => None,
        };

        Ok(config)
    }

    /// The rule provider this configuration asks for.
    pub fn rule_generator(&self) -> RuleGenerator {
        match &self.rules {
            Some(rules) => RuleGenerator::Http(HttpRuleProvider::new(rules.clone())),
            None => RuleGenerator::Disabled,
        }
    }
}

fn parse_number(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<u64>, ClashroomError> {
    var(key)
        .map(|raw| {
            raw.trim().parse::<u64>().map_err(|_| {
                ClashroomError::Config(format!("{key} must be a non-negative integer, got {raw:?}"))
            })
        })
        .transpose()
}
