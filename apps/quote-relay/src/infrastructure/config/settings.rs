//! Relay Configuration Settings
//!
//! Configuration types for the quote relay, loaded from environment variables
//! once at startup.

use std::time::Duration;

use crate::application::services::{
    BroadcasterConfig, DEFAULT_CACHE_CAPACITY, QuoteCacheConfig,
};
use crate::domain::advice::UserId;
use crate::domain::quote::CacheKeyPolicy;

/// Default provider base URL.
pub const DEFAULT_UPSTREAM_BASE_URL: &str = "https://query1.finance.yahoo.com";

/// Default URL visited to obtain the provider's session cookie.
pub const DEFAULT_UPSTREAM_SESSION_URL: &str = "https://fc.yahoo.com";

/// Longest accepted poll interval, cache TTL or upstream timeout.
pub const MAX_DURATION_SECS: u64 = 86_400;

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Listen port for the API, push stream, health and metrics routes.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { port: 3001 }
    }
}

/// Push and cache timing settings.
#[derive(Debug, Clone)]
pub struct PollSettings {
    /// Interval between push ticks.
    pub poll_interval: Duration,
    /// Per-subscription event buffer.
    pub channel_capacity: usize,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            channel_capacity: 16,
        }
    }
}

/// Quote cache settings.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Entry lifetime.
    pub ttl: Duration,
    /// Maximum cached symbol sets (0 = unbounded).
    pub capacity: usize,
    /// How symbol lists map to cache keys.
    pub key_policy: CacheKeyPolicy,
}

impl CacheSettings {
    /// TTL derived from the poll interval: two seconds shorter, at least one.
    #[must_use]
    pub fn ttl_for_poll_interval(poll_interval: Duration) -> Duration {
        poll_interval
            .saturating_sub(Duration::from_secs(2))
            .max(Duration::from_secs(1))
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: Self::ttl_for_poll_interval(PollSettings::default().poll_interval),
            capacity: DEFAULT_CACHE_CAPACITY,
            key_policy: CacheKeyPolicy::default(),
        }
    }
}

/// Quote provider settings.
#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    /// Provider base URL, without trailing slash.
    pub base_url: String,
    /// Optional per-request timeout.
    pub timeout: Option<Duration>,
    /// Cookie source for the session handshake; `None` sends plain requests.
    pub session_url: Option<String>,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_UPSTREAM_BASE_URL.to_string(),
            timeout: None,
            session_url: Some(DEFAULT_UPSTREAM_SESSION_URL.to_string()),
        }
    }
}

/// Complete relay configuration.
#[derive(Debug, Clone, Default)]
pub struct RelayConfig {
    /// Server settings.
    pub server: ServerSettings,
    /// Poll settings.
    pub poll: PollSettings,
    /// Cache settings.
    pub cache: CacheSettings,
    /// Provider settings.
    pub upstream: UpstreamSettings,
    /// Identity used when a request does not name one.
    pub default_user_id: UserId,
}

impl RelayConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the poll interval is zero or any duration exceeds
    /// [`MAX_DURATION_SECS`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// Unparseable values fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the poll interval is zero or any duration exceeds
    /// [`MAX_DURATION_SECS`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let server = ServerSettings {
            port: parse_env_u16(&lookup, "PORT", defaults.server.port),
        };

        let poll_interval = parse_env_duration_secs(
            &lookup,
            "POLL_INTERVAL_SECONDS",
            defaults.poll.poll_interval,
        )?;
        if poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "POLL_INTERVAL_SECONDS".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        let poll = PollSettings {
            poll_interval,
            channel_capacity: parse_env_usize(
                &lookup,
                "SSE_CHANNEL_CAPACITY",
                defaults.poll.channel_capacity,
            )
            .max(1),
        };

        let cache = CacheSettings {
            ttl: parse_env_duration_secs(
                &lookup,
                "QUOTE_CACHE_TTL_SECONDS",
                CacheSettings::ttl_for_poll_interval(poll_interval),
            )?
            .max(Duration::from_secs(1)),
            capacity: parse_env_usize(&lookup, "QUOTE_CACHE_CAPACITY", defaults.cache.capacity),
            key_policy: lookup("QUOTE_CACHE_KEY_POLICY")
                .map(|s| CacheKeyPolicy::from_str_case_insensitive(&s))
                .unwrap_or_default(),
        };

        let upstream = UpstreamSettings {
            base_url: lookup("UPSTREAM_BASE_URL")
                .map(|s| s.trim().trim_end_matches('/').to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.upstream.base_url),
            timeout: Some(parse_env_duration_secs(
                &lookup,
                "UPSTREAM_TIMEOUT_SECONDS",
                Duration::ZERO,
            )?)
            .filter(|t| !t.is_zero()),
            session_url: lookup("UPSTREAM_SESSION_URL").map_or(
                defaults.upstream.session_url,
                |v| parse_session_url(&v),
            ),
        };

        let default_user_id = lookup("DEFAULT_USER_ID")
            .and_then(|v| v.trim().parse::<i64>().ok())
            .map_or(defaults.default_user_id, UserId);

        Ok(Self {
            server,
            poll,
            cache,
            upstream,
            default_user_id,
        })
    }

    /// Cache configuration derived from these settings.
    #[must_use]
    pub const fn cache_config(&self) -> QuoteCacheConfig {
        QuoteCacheConfig {
            ttl: self.cache.ttl,
            capacity: self.cache.capacity,
            key_policy: self.cache.key_policy,
        }
    }

    /// Broadcaster configuration derived from these settings.
    #[must_use]
    pub const fn broadcaster_config(&self) -> BroadcasterConfig {
        BroadcasterConfig {
            poll_interval: self.poll.poll_interval,
            channel_capacity: self.poll.channel_capacity,
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable holds a value that cannot be used.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Why it was rejected.
        reason: String,
    },
}

fn parse_env_u16(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u16) -> u16 {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_env_usize(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: usize) -> usize {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let Some(secs) = lookup(key).and_then(|v| v.trim().parse::<u64>().ok()) else {
        return Ok(default);
    };
    if secs > MAX_DURATION_SECS {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("must be at most {MAX_DURATION_SECS} seconds"),
        });
    }
    Ok(Duration::from_secs(secs))
}

/// `off`, `none` or an empty value disables the session handshake.
fn parse_session_url(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("off") || value.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(value.to_string())
    }
}
