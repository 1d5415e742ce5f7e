//! Layered runtime configuration
//!
//! Settings are resolved defaults → optional file → `ORCHESTRATOR_`-prefixed
//! environment variables, using the same `config` crate this workspace
//! already depends on.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The underlying `config` crate failed to build or deserialize settings
    #[error("configuration error: {0}")]
    Load(#[from] config::ConfigError),
}

/// Tunables for the remote agent client (SPEC §4.5)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RemoteAgentSettings {
    /// Base URL of the session service
    #[serde(default = "default_session_base_url")]
    pub session_base_url: String,

    /// Interval between `session_status` polls, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Wall-clock budget for the whole poll loop, in milliseconds
    #[serde(default = "default_max_poll_duration_ms")]
    pub max_poll_duration_ms: u64,

    /// Maximum number of `session_status` polls before aborting, independent
    /// of the wall-clock budget above
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,

    /// Maximum consecutive poll failures tolerated before aborting
    #[serde(default = "default_max_consecutive_poll_failures")]
    pub max_consecutive_poll_failures: u32,

    /// Maximum retries for `session_delete` cleanup
    #[serde(default = "default_session_cleanup_max_retries")]
    pub session_cleanup_max_retries: u32,

    /// Base delay between cleanup retries, in milliseconds (doubles per attempt)
    #[serde(default = "default_session_cleanup_retry_delay_ms")]
    pub session_cleanup_retry_delay_ms: u64,
}

impl RemoteAgentSettings {
    /// Poll interval as a [`Duration`]
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Total poll budget as a [`Duration`]
    #[must_use]
    pub fn max_poll_duration(&self) -> Duration {
        Duration::from_millis(self.max_poll_duration_ms)
    }
}

impl Default for RemoteAgentSettings {
    fn default() -> Self {
        Self {
            session_base_url: default_session_base_url(),
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_duration_ms: default_max_poll_duration_ms(),
            max_poll_attempts: default_max_poll_attempts(),
            max_consecutive_poll_failures: default_max_consecutive_poll_failures(),
            session_cleanup_max_retries: default_session_cleanup_max_retries(),
            session_cleanup_retry_delay_ms: default_session_cleanup_retry_delay_ms(),
        }
    }
}

fn default_session_base_url() -> String {
    "http://localhost:4096".to_string()
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_max_poll_duration_ms() -> u64 {
    120_000
}

fn default_max_poll_attempts() -> u32 {
    120
}

fn default_max_consecutive_poll_failures() -> u32 {
    3
}

fn default_session_cleanup_max_retries() -> u32 {
    3
}

fn default_session_cleanup_retry_delay_ms() -> u64 {
    500
}

/// Top-level settings for the orchestrator process
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Settings {
    /// Remote agent client tunables
    #[serde(default)]
    pub remote_agent: RemoteAgentSettings,
}

/// Load settings from defaults, an optional config file, then environment
/// variables prefixed `ORCHESTRATOR_` (double-underscore separated, e.g.
/// `ORCHESTRATOR_REMOTE_AGENT__POLL_INTERVAL_MS`).
pub fn load_settings(config_path: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = config::Config::builder();

    if let Some(path) = config_path {
        builder = builder.add_source(config::File::with_name(path).required(false));
    }

    let built = builder
        .add_source(
            config::Environment::with_prefix("ORCHESTRATOR")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(built.try_deserialize().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_nothing_configured() {
        let settings = load_settings(None).expect("defaults must always load");
        assert_eq!(settings.remote_agent.poll_interval_ms, 1_000);
        assert_eq!(settings.remote_agent.session_cleanup_max_retries, 3);
    }

    #[test]
    fn env_override_takes_precedence() {
        std::env::set_var("ORCHESTRATOR_REMOTE_AGENT__POLL_INTERVAL_MS", "250");
        let settings = load_settings(None).expect("env-backed config must load");
        assert_eq!(settings.remote_agent.poll_interval_ms, 250);
        std::env::remove_var("ORCHESTRATOR_REMOTE_AGENT__POLL_INTERVAL_MS");
    }
}
