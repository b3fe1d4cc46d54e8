// src/config.rs

use log::info;
use std::time::Duration;
use url::Url;

// Defaults used when the corresponding variable is unset
pub const DEFAULT_BATCH_DELAY_MS: u64 = 25;
pub const DEFAULT_BATCH_SIZE: usize = 500;
pub const DEFAULT_MAX_DISTANCE_KM: f64 = 3000.0;
// Single-request row cap for the existing-pairs snapshot
pub const DEFAULT_EXISTING_PAIRS_LIMIT: usize = 1_000_000;

pub const ENV_STORE_URL: &str = "SUPABASE_URL";
pub const ENV_STORE_KEY: &str = "SUPABASE_SERVICE_KEY";
pub const ENV_BATCH_DELAY_MS: &str = "BATCH_DELAY_MS";
pub const ENV_BATCH_SIZE: &str = "BATCH_SIZE";
pub const ENV_MAX_KM: &str = "MAX_KM";
pub const ENV_EXISTING_PAIRS_LIMIT: &str = "EXISTING_PAIRS_LIMIT";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value:?} ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Everything one pipeline run needs. Built once at startup and passed in.
#[derive(Clone)]
pub struct PipelineConfig {
    pub store_url: Url,
    pub store_key: String,
    pub batch_delay_ms: u64,
    pub batch_size: usize,
    pub max_distance_km: f64,
    pub existing_pairs_limit: usize,
}

// Hand-written so the service key never reaches a log line
impl std::fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("store_url", &self.store_url.as_str())
            .field("store_key", &"[hidden]")
            .field("batch_delay_ms", &self.batch_delay_ms)
            .field("batch_size", &self.batch_size)
            .field("max_distance_km", &self.max_distance_km)
            .field("existing_pairs_limit", &self.existing_pairs_limit)
            .finish()
    }
}

impl PipelineConfig {
    /// Config with default tuning for the given endpoint and key.
    pub fn new(store_url: &str, store_key: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            store_url: parse_store_url(store_url)?,
            store_key: store_key.to_string(),
            batch_delay_ms: DEFAULT_BATCH_DELAY_MS,
            batch_size: DEFAULT_BATCH_SIZE,
            max_distance_km: DEFAULT_MAX_DISTANCE_KM,
            existing_pairs_limit: DEFAULT_EXISTING_PAIRS_LIMIT,
        })
    }

    /// Reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable lookup. Empty values are
    /// treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let store_url = get(ENV_STORE_URL).ok_or(ConfigError::Missing(ENV_STORE_URL))?;
        let store_key = get(ENV_STORE_KEY).ok_or(ConfigError::Missing(ENV_STORE_KEY))?;
        let mut config = Self::new(&store_url, &store_key)?;

        if let Some(v) = get(ENV_BATCH_DELAY_MS) {
            config.batch_delay_ms = parse_number(ENV_BATCH_DELAY_MS, &v)?;
        }
        if let Some(v) = get(ENV_BATCH_SIZE) {
            config.batch_size = parse_number(ENV_BATCH_SIZE, &v)?;
        }
        if let Some(v) = get(ENV_MAX_KM) {
            config.max_distance_km = parse_number(ENV_MAX_KM, &v)?;
        }
        if let Some(v) = get(ENV_EXISTING_PAIRS_LIMIT) {
            config.existing_pairs_limit = parse_number(ENV_EXISTING_PAIRS_LIMIT, &v)?;
        }

        config.validate()?;
        info!(
            "Config: store={}, batch_size={}, batch_delay_ms={}, max_km={}",
            config.store_url, config.batch_size, config.batch_delay_ms, config.max_distance_km
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid {
                name: ENV_BATCH_SIZE,
                value: self.batch_size.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if !self.max_distance_km.is_finite() || self.max_distance_km <= 0.0 {
            return Err(ConfigError::Invalid {
                name: ENV_MAX_KM,
                value: self.max_distance_km.to_string(),
                reason: "must be a positive number".to_string(),
            });
        }
        Ok(())
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

/// Parses the endpoint and guarantees a trailing slash so `Url::join` keeps
/// any path prefix.
fn parse_store_url(raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };
    Url::parse(&with_slash).map_err(|e| ConfigError::Invalid {
        name: ENV_STORE_URL,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn parse_number<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: e.to_string(),
    })
}
