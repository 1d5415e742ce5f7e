//! Common utilities for Orbit
//!
//! Provides shared configuration, error handling, and telemetry.

pub mod config;
pub mod telemetry;

pub use config::{load_settings, ConfigError, RemoteAgentSettings, Settings};
pub use telemetry::init_tracing;
