use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Attempt ceiling used when no configuration is supplied.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// First exponential backoff step.
pub const DEFAULT_MIN_BACKOFF: Duration = Duration::from_secs(60);
/// Upper bound for exponential backoff.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(8 * 60);
/// Per-attempt timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Retry ceiling and backoff bounds. Fixed for the lifetime of a client.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry on the exponential path.
    #[serde(rename = "min_backoff_secs", with = "duration_secs")]
    pub min_backoff: Duration,
    /// Cap for the exponential path. Server-directed waits may exceed it.
    #[serde(rename = "max_backoff_secs", with = "duration_secs")]
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            min_backoff: DEFAULT_MIN_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}

impl RetryConfig {
    /// Reads overrides from the environment, keeping defaults for unset variables.
    ///
    /// Reads:
    /// - `GH_RETRY_MAX_ATTEMPTS`
    /// - `GH_RETRY_MIN_BACKOFF_SECS`
    /// - `GH_RETRY_MAX_BACKOFF_SECS`
    ///
    /// A variable that is set but does not parse is an error.
    pub fn from_env() -> std::result::Result<Self, String> {
        let mut config = Self::default();
        if let Some(value) = env_number("GH_RETRY_MAX_ATTEMPTS")? {
            config.max_attempts = u32::try_from(value)
                .map_err(|_| format!("GH_RETRY_MAX_ATTEMPTS is out of range: {value}"))?;
        }
        if let Some(secs) = env_number("GH_RETRY_MIN_BACKOFF_SECS")? {
            config.min_backoff = Duration::from_secs(secs);
        }
        if let Some(secs) = env_number("GH_RETRY_MAX_BACKOFF_SECS")? {
            config.max_backoff = Duration::from_secs(secs);
        }
        Ok(config)
    }

    /// Attempt ceiling, never below one.
    pub(crate) fn attempt_limit(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Configures the underlying transport and the retry behavior.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    /// `User-Agent` sent with every request. GitHub rejects requests without one.
    pub user_agent: String,
    pub retry: RetryConfig,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            user_agent: default_user_agent().to_owned(),
            retry: RetryConfig::default(),
        }
    }
}

impl ClientOptions {
    /// Like [`RetryConfig::from_env`], additionally reading `GH_HTTP_TIMEOUT_MS`.
    pub fn from_env() -> std::result::Result<Self, String> {
        let mut options = Self {
            retry: RetryConfig::from_env()?,
            ..Self::default()
        };
        if let Some(ms) = env_number("GH_HTTP_TIMEOUT_MS")? {
            options.timeout_ms = ms;
        }
        Ok(options)
    }
}

pub(crate) fn default_user_agent() -> &'static str {
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"))
}

fn env_number(name: &str) -> std::result::Result<Option<u64>, String> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|err| format!("{name} must be a non-negative integer: {err}")),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(format!("{name} is not valid unicode")),
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.min_backoff, Duration::from_secs(60));
        assert_eq!(config.max_backoff, Duration::from_secs(480));
    }

    #[test]
    fn attempt_limit_is_at_least_one() {
        let config = RetryConfig {
            max_attempts: 0,
            ..RetryConfig::default()
        };
        assert_eq!(config.attempt_limit(), 1);
    }

    #[test]
    fn default_user_agent_names_the_crate() {
        assert!(ClientOptions::default()
            .user_agent
            .starts_with("github-retry-http/"));
    }
}
