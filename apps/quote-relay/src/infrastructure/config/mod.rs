//! Configuration Module
//!
//! Environment-driven configuration for the relay service.

mod settings;

pub use settings::{
    CacheSettings, ConfigError, DEFAULT_UPSTREAM_BASE_URL, DEFAULT_UPSTREAM_SESSION_URL,
    MAX_DURATION_SECS, PollSettings, RelayConfig, ServerSettings, UpstreamSettings,
};
