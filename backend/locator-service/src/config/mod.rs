//! Configuration for the locator service
use crate::error::{LocatorError, Result};
use crate::services::category::CuisineAliases;
use crate::services::fanout::FanOutConfig;
use crate::services::geo::{EtaPolicy, GeohashCodec, MAX_PRECISION};
use serde::Deserialize;
use std::time::Duration;

/// Main configuration struct, loaded from environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Geohash length used for partition keys. Must match the write side.
    #[serde(default = "default_geohash_precision")]
    pub geohash_precision: usize,

    /// Result count when a request does not ask for one
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Upper bound callers clamp requested limits to
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,

    #[serde(default = "default_eta_prep_minutes")]
    pub eta_prep_minutes: f64,

    #[serde(default = "default_eta_fast_meters_per_minute")]
    pub eta_fast_meters_per_minute: f64,

    #[serde(default = "default_eta_slow_meters_per_minute")]
    pub eta_slow_meters_per_minute: f64,

    /// Provider calls in flight per query
    #[serde(default = "default_fanout_concurrency")]
    pub fanout_concurrency: usize,

    /// Timeout for a single provider call
    #[serde(default = "default_provider_timeout_ms")]
    pub provider_timeout_ms: u64,

    /// Extra cuisine aliases, `alias=canonical` pairs separated by commas
    #[serde(default)]
    pub cuisine_aliases: Option<String>,

    /// JSON file of restaurant records to seed the in-memory store with
    #[serde(default)]
    pub seed_path: Option<String>,

    /// `text` or `json`
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_geohash_precision() -> usize {
    6 // ~1.2km x 0.6km cells
}

fn default_limit() -> usize {
    20
}

fn default_max_limit() -> usize {
    100
}

fn default_eta_prep_minutes() -> f64 {
    10.0
}

fn default_eta_fast_meters_per_minute() -> f64 {
    280.0
}

fn default_eta_slow_meters_per_minute() -> f64 {
    190.0
}

fn default_fanout_concurrency() -> usize {
    9
}

fn default_provider_timeout_ms() -> u64 {
    2000
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            geohash_precision: default_geohash_precision(),
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            eta_prep_minutes: default_eta_prep_minutes(),
            eta_fast_meters_per_minute: default_eta_fast_meters_per_minute(),
            eta_slow_meters_per_minute: default_eta_slow_meters_per_minute(),
            fanout_concurrency: default_fanout_concurrency(),
            provider_timeout_ms: default_provider_timeout_ms(),
            cuisine_aliases: None,
            seed_path: None,
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables (and `.env`, if present)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config: Config =
            envy::from_env().map_err(|e| LocatorError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.geohash_precision == 0 || self.geohash_precision > MAX_PRECISION {
            return Err(LocatorError::InvalidPrecision(self.geohash_precision));
        }
        if self.max_limit == 0 {
            return Err(LocatorError::Config("MAX_LIMIT must be at least 1".into()));
        }
        if self.default_limit == 0 || self.default_limit > self.max_limit {
            return Err(LocatorError::Config(format!(
                "DEFAULT_LIMIT must be within 1..={}, got {}",
                self.max_limit, self.default_limit
            )));
        }
        if self.fanout_concurrency == 0 {
            return Err(LocatorError::Config(
                "FANOUT_CONCURRENCY must be at least 1".into(),
            ));
        }
        if self.provider_timeout_ms == 0 {
            return Err(LocatorError::Config(
                "PROVIDER_TIMEOUT_MS must be at least 1".into(),
            ));
        }
        if !matches!(self.log_format.as_str(), "text" | "json") {
            return Err(LocatorError::Config(format!(
                "LOG_FORMAT must be text or json, got {:?}",
                self.log_format
            )));
        }
        self.eta_policy().validate()?;
        self.aliases()?;
        Ok(())
    }

    /// Limit the core should be called with for a requested `limit`.
    pub fn clamp_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit)
    }

    pub fn eta_policy(&self) -> EtaPolicy {
        EtaPolicy {
            prep_minutes: self.eta_prep_minutes,
            fast_meters_per_minute: self.eta_fast_meters_per_minute,
            slow_meters_per_minute: self.eta_slow_meters_per_minute,
        }
    }

    pub fn fanout(&self) -> FanOutConfig {
        FanOutConfig {
            concurrency: self.fanout_concurrency,
            timeout: Duration::from_millis(self.provider_timeout_ms),
        }
    }

    /// Built-in alias table with `CUISINE_ALIASES` entries layered on top.
    pub fn aliases(&self) -> Result<CuisineAliases> {
        let mut aliases = CuisineAliases::default();
        if let Some(extra) = self.cuisine_aliases.as_deref() {
            aliases.extend_from_list(extra)?;
        }
        Ok(aliases)
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            codec: GeohashCodec::new(),
            precision: self.geohash_precision,
            eta: self.eta_policy(),
            fanout: self.fanout(),
        }
    }
}

/// Immutable engine constants shared by the query orchestrators.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub codec: GeohashCodec,
    pub precision: usize,
    pub eta: EtaPolicy,
    pub fanout: FanOutConfig,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Config::default().engine_settings()
    }
}
