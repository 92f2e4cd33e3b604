//! Server configuration.

use std::time::Duration;

use encore_match::MatchConfig;
use encore_session::SessionConfig;

/// A configuration value that couldn't be parsed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key}={value:?} is invalid: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Top-level server configuration.
///
/// All fields have defaults suitable for local development. In
/// production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub session: SessionConfig,
    pub matches: MatchConfig,
    /// Chat messages starting with this are commands (default `!`).
    pub command_prefix: String,
    /// Name the server's bot speaks as (default `Encore`).
    pub bot_name: String,
    /// Public domain used in links (default `localhost`).
    pub domain: String,
    /// How often the sweeper looks for timed-out sessions (default 10s).
    pub sweep_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            matches: MatchConfig::default(),
            command_prefix: "!".into(),
            bot_name: "Encore".into(),
            domain: "localhost".into(),
            sweep_interval_secs: 10,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default     |
    /// |-------------------------------|-------------|
    /// | `ENCORE_PING_TIMEOUT_SECS`    | `80`        |
    /// | `ENCORE_MATCH_SLOTS`          | `8`         |
    /// | `ENCORE_MATCH_NAME_LEN`       | `50`        |
    /// | `ENCORE_COMMAND_PREFIX`       | `!`         |
    /// | `ENCORE_BOT_NAME`             | `Encore`    |
    /// | `ENCORE_DOMAIN`               | `localhost` |
    /// | `ENCORE_SWEEP_INTERVAL_SECS`  | `10`        |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading values through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config = Self {
            session: SessionConfig {
                ping_timeout_secs: parse(
                    &lookup,
                    "ENCORE_PING_TIMEOUT_SECS",
                    defaults.session.ping_timeout_secs,
                )?,
            },
            matches: MatchConfig {
                slot_count: parse(&lookup, "ENCORE_MATCH_SLOTS", defaults.matches.slot_count)?,
                max_name_len: parse(
                    &lookup,
                    "ENCORE_MATCH_NAME_LEN",
                    defaults.matches.max_name_len,
                )?,
            },
            command_prefix: lookup("ENCORE_COMMAND_PREFIX").unwrap_or(defaults.command_prefix),
            bot_name: lookup("ENCORE_BOT_NAME").unwrap_or(defaults.bot_name),
            domain: lookup("ENCORE_DOMAIN").unwrap_or(defaults.domain),
            sweep_interval_secs: parse(
                &lookup,
                "ENCORE_SWEEP_INTERVAL_SECS",
                defaults.sweep_interval_secs,
            )?,
        };
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<(), ConfigError> {
        let invalid = |key, value: String, reason: &str| ConfigError::Invalid {
            key,
            value,
            reason: reason.into(),
        };
        if self.command_prefix.is_empty() {
            return Err(invalid("ENCORE_COMMAND_PREFIX", String::new(), "must not be empty"));
        }
        if self.matches.slot_count == 0 {
            return Err(invalid("ENCORE_MATCH_SLOTS", "0".into(), "must be at least 1"));
        }
        if self.sweep_interval_secs == 0 {
            return Err(invalid("ENCORE_SWEEP_INTERVAL_SECS", "0".into(), "must be at least 1"));
        }
        Ok(())
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn parse<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}
