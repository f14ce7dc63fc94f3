//! Tunables of the reconciliation core.
//!
//! Defaults match Okta's documented limits. Every field can be overridden
//! through an `OKTAFORM_*` environment variable.

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Largest `limit` accepted by the policy rule and user list endpoints.
pub const MAX_PAGE_SIZE: u32 = 200;

/// Configuration errors raised while loading or validating [`CoreConfig`].
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },
}

/// Options recognised by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Retry deadline of a single remote call, in seconds (default: 90).
    #[serde(default = "default_api_deadline_seconds")]
    pub api_deadline_seconds: u64,

    /// Total polling budget while a user status transition drains (default: 120).
    #[serde(default = "default_status_transition_deadline_seconds")]
    pub status_transition_deadline_seconds: u64,

    /// Pause between two status polls (default: 5).
    #[serde(default = "default_status_poll_interval_seconds")]
    pub status_poll_interval_seconds: u64,

    /// Page size of list calls (default: 200, clamped to [`MAX_PAGE_SIZE`]).
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,

    /// First backoff interval in milliseconds (default: 500).
    #[serde(default = "default_retry_initial_interval_ms")]
    pub retry_initial_interval_ms: u64,

    /// Backoff growth factor (default: 1.5).
    #[serde(default = "default_retry_multiplier")]
    pub retry_multiplier: f64,

    /// Backoff interval cap in milliseconds (default: 30000).
    #[serde(default = "default_retry_max_interval_ms")]
    pub retry_max_interval_ms: u64,
}

fn default_api_deadline_seconds() -> u64 {
    90
}

fn default_status_transition_deadline_seconds() -> u64 {
    120
}

fn default_status_poll_interval_seconds() -> u64 {
    5
}

fn default_page_size() -> u32 {
    MAX_PAGE_SIZE
}

fn default_retry_initial_interval_ms() -> u64 {
    500
}

fn default_retry_multiplier() -> f64 {
    1.5
}

fn default_retry_max_interval_ms() -> u64 {
    30_000
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            api_deadline_seconds: default_api_deadline_seconds(),
            status_transition_deadline_seconds: default_status_transition_deadline_seconds(),
            status_poll_interval_seconds: default_status_poll_interval_seconds(),
            default_page_size: default_page_size(),
            retry_initial_interval_ms: default_retry_initial_interval_ms(),
            retry_multiplier: default_retry_multiplier(),
            retry_max_interval_ms: default_retry_max_interval_ms(),
        }
    }
}

impl CoreConfig {
    /// Defaults overlaid with `OKTAFORM_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but does not parse, or if
    /// the resulting configuration fails [`CoreConfig::validate`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Same as [`CoreConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            api_deadline_seconds: parse_var(
                &lookup,
                "OKTAFORM_API_DEADLINE_SECONDS",
                defaults.api_deadline_seconds,
            )?,
            status_transition_deadline_seconds: parse_var(
                &lookup,
                "OKTAFORM_STATUS_TRANSITION_DEADLINE_SECONDS",
                defaults.status_transition_deadline_seconds,
            )?,
            status_poll_interval_seconds: parse_var(
                &lookup,
                "OKTAFORM_STATUS_POLL_INTERVAL_SECONDS",
                defaults.status_poll_interval_seconds,
            )?,
            default_page_size: parse_var(
                &lookup,
                "OKTAFORM_DEFAULT_PAGE_SIZE",
                defaults.default_page_size,
            )?,
            retry_initial_interval_ms: parse_var(
                &lookup,
                "OKTAFORM_RETRY_INITIAL_INTERVAL_MS",
                defaults.retry_initial_interval_ms,
            )?,
            retry_multiplier: parse_var(
                &lookup,
                "OKTAFORM_RETRY_MULTIPLIER",
                defaults.retry_multiplier,
            )?,
            retry_max_interval_ms: parse_var(
                &lookup,
                "OKTAFORM_RETRY_MAX_INTERVAL_MS",
                defaults.retry_max_interval_ms,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values the core cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("api_deadline_seconds", self.api_deadline_seconds),
            (
                "status_transition_deadline_seconds",
                self.status_transition_deadline_seconds,
            ),
            (
                "status_poll_interval_seconds",
                self.status_poll_interval_seconds,
            ),
            ("retry_initial_interval_ms", self.retry_initial_interval_ms),
            ("retry_max_interval_ms", self.retry_max_interval_ms),
        ];
        for (var, value) in positive {
            if value == 0 {
                return Err(invalid(var, "must be greater than zero"));
            }
        }
        if self.default_page_size == 0 {
            return Err(invalid("default_page_size", "must be greater than zero"));
        }
        if !(self.retry_multiplier.is_finite() && self.retry_multiplier >= 1.0) {
            return Err(invalid("retry_multiplier", "must be a finite number >= 1.0"));
        }
        if self.retry_initial_interval_ms > self.retry_max_interval_ms {
            return Err(invalid(
                "retry_initial_interval_ms",
                "must not exceed retry_max_interval_ms",
            ));
        }
        Ok(())
    }

    /// Page size actually sent to list endpoints.
    #[must_use]
    pub fn page_size(&self) -> u32 {
        self.default_page_size.clamp(1, MAX_PAGE_SIZE)
    }

    #[must_use]
    pub fn api_deadline(&self) -> Duration {
        Duration::from_secs(self.api_deadline_seconds)
    }

    #[must_use]
    pub fn status_transition_deadline(&self) -> Duration {
        Duration::from_secs(self.status_transition_deadline_seconds)
    }

    #[must_use]
    pub fn status_poll_interval(&self) -> Duration {
        Duration::from_secs(self.status_poll_interval_seconds)
    }
}

fn parse_var<F, T>(lookup: &F, var: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(var, &e.to_string())),
        None => Ok(default),
    }
}

fn invalid(var: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        var: var.to_string(),
        message: message.to_string(),
    }
}
