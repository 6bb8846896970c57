use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// Top-level engine configuration, deserializable from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub core: CoreConfig,
    pub poll: PollConfig,
    pub bucket: BucketConfig,
    pub admission: AdmissionConfig,
    /// Provider-scoped limiters keyed by provider name.
    pub providers: HashMap<String, ProviderConfig>,
}

/// Core thread configuration (channel capacity, idle timeout).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub command_channel_capacity: usize,
    pub idle_timeout_ms: u64,
}

/// Poll-cycle defaults. All of these are per-call inputs; the values here
/// are only the documented fallbacks, not hidden process-wide state.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub order_weight: f64,
    pub other_weight: f64,
    /// Share of each class's slots reserved for its retry queue (0..=1).
    pub retry_ratio: f64,
    /// Minimum age of a retry entry before it becomes poll-eligible.
    pub retry_window_ms: u64,
}

/// Shared leaky-bucket configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BucketConfig {
    pub capacity: f64,
    /// Initial leak rate (tokens/sec) for the dynamic controller.
    pub initial_rate: i64,
    pub min_rate: i64,
    pub max_rate: i64,
    /// Bucket records idle longer than this are treated as absent.
    pub state_ttl_ms: u64,
}

/// Verdict-service configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Requests beyond this per-queue depth are rejected instead of queued.
    pub max_queue_depth: u64,
    /// Path prefix routed to the ORDER class.
    pub order_path_prefix: String,
    /// Provider assumed when a request names none.
    pub default_provider: String,
}

/// One provider-scoped limiter (fixed capacity, own rate bounds).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub capacity: f64,
    pub rate: i64,
    pub min_rate: i64,
    pub max_rate: i64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            command_channel_capacity: 10_000,
            idle_timeout_ms: 100,
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            order_weight: 7.0,
            other_weight: 3.0,
            retry_ratio: 0.7,
            retry_window_ms: 4_000,
        }
    }
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            capacity: 15.0,
            initial_rate: 15,
            min_rate: 10,
            max_rate: 100,
            state_ttl_ms: 60_000,
        }
    }
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            max_queue_depth: 1_000,
            order_path_prefix: "/api/v1/orders".to_string(),
            default_provider: "TOSS".to_string(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            capacity: 10.0,
            rate: 10,
            min_rate: 1,
            max_rate: 100,
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document, filling unset fields with defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Default configuration plus the default TOSS provider, matching the
    /// deployment this engine was built for.
    pub fn with_default_providers() -> Self {
        let mut config = Self::default();
        config
            .providers
            .insert("TOSS".to_string(), ProviderConfig::default());
        config
    }
}
