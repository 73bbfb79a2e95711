//! Adapter configuration.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.nanodlp-adapter/config.toml` (user)
//! 3. `/etc/nanodlp-adapter/config.toml` (system)
//!
//! Every field has a default, so an empty file (or [`AdapterConfig::default`])
//! gives the stock cache lifetimes and retry policy.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::RetryConfig;
use crate::{AdapterError, Result};

/// Adapter configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AdapterConfig {
    /// Device base URL (default: http://127.0.0.1).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in milliseconds (default: 5000).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub status: StatusSettings,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
            cache: CacheSettings::default(),
            status: StatusSettings::default(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1".to_string()
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

/// Cache lifetimes and bounds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CacheSettings {
    /// Plate list TTL in milliseconds (default: 120000).
    #[serde(default = "default_plate_list_ttl_ms")]
    pub plate_list_ttl_ms: u64,
    /// Downloaded thumbnail TTL in milliseconds (default: 30000).
    #[serde(default = "default_thumbnail_ttl_ms")]
    pub thumbnail_ttl_ms: u64,
    /// Placeholder thumbnail TTL in milliseconds (default: 5000).
    #[serde(default = "default_placeholder_ttl_ms")]
    pub placeholder_ttl_ms: u64,
    /// Maximum cached thumbnails (default: 256).
    #[serde(default = "default_thumbnail_max_entries")]
    pub thumbnail_max_entries: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            plate_list_ttl_ms: default_plate_list_ttl_ms(),
            thumbnail_ttl_ms: default_thumbnail_ttl_ms(),
            placeholder_ttl_ms: default_placeholder_ttl_ms(),
            thumbnail_max_entries: default_thumbnail_max_entries(),
        }
    }
}

fn default_plate_list_ttl_ms() -> u64 {
    120_000
}

fn default_thumbnail_ttl_ms() -> u64 {
    30_000
}

fn default_placeholder_ttl_ms() -> u64 {
    5_000
}

fn default_thumbnail_max_entries() -> u64 {
    256
}

impl CacheSettings {
    pub fn plate_list_ttl(mut self, ttl: Duration) -> Self {
        self.plate_list_ttl_ms = ttl.as_millis() as u64;
        self
    }

    pub fn thumbnail_ttl(mut self, ttl: Duration) -> Self {
        self.thumbnail_ttl_ms = ttl.as_millis() as u64;
        self
    }

    pub fn placeholder_ttl(mut self, ttl: Duration) -> Self {
        self.placeholder_ttl_ms = ttl.as_millis() as u64;
        self
    }

    pub fn thumbnail_max_entries(mut self, max: u64) -> Self {
        self.thumbnail_max_entries = max;
        self
    }

    pub fn plate_list_ttl_duration(&self) -> Duration {
        Duration::from_millis(self.plate_list_ttl_ms)
    }

    pub fn thumbnail_ttl_duration(&self) -> Duration {
        Duration::from_millis(self.thumbnail_ttl_ms)
    }

    pub fn placeholder_ttl_duration(&self) -> Duration {
        Duration::from_millis(self.placeholder_ttl_ms)
    }
}

/// Status polling behaviour.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatusSettings {
    /// Total `GET /status` attempts per poll (default: 2).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay between attempts in milliseconds (default: 200).
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Window after startup during which plate resolution is skipped
    /// (default: 2000).
    #[serde(default = "default_startup_guard_ms")]
    pub startup_guard_ms: u64,
    /// Interval between polls in `nanoctl watch` (default: 2000).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for StatusSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            startup_guard_ms: default_startup_guard_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    200
}

fn default_startup_guard_ms() -> u64 {
    2_000
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

impl StatusSettings {
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn startup_guard(mut self, guard: Duration) -> Self {
        self.startup_guard_ms = guard.as_millis() as u64;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig::new()
            .max_attempts(self.max_attempts)
            .delay(Duration::from_millis(self.retry_delay_ms))
    }

    pub fn startup_guard_duration(&self) -> Duration {
        Duration::from_millis(self.startup_guard_ms)
    }

    pub fn poll_interval_duration(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl AdapterConfig {
    /// Config for `base_url` with every other setting defaulted.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn cache(mut self, cache: CacheSettings) -> Self {
        self.cache = cache;
        self
    }

    pub fn status(mut self, status: StatusSettings) -> Self {
        self.status = status;
        self
    }

    pub fn request_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided)
    /// 2. `~/.nanodlp-adapter/config.toml`
    /// 3. `/etc/nanodlp-adapter/config.toml`
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        Self::load_from_file(&path)
    }

    /// Load and validate a specific config file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            AdapterError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            AdapterError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would disable the adapter outright.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(AdapterError::Configuration("base_url must not be empty".into()));
        }
        if self.request_timeout_ms == 0 {
            return Err(AdapterError::Configuration(
                "request_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.status.max_attempts == 0 {
            return Err(AdapterError::Configuration(
                "status.max_attempts must be at least 1".into(),
            ));
        }
        let cache = &self.cache;
        for (name, value) in [
            ("cache.plate_list_ttl_ms", cache.plate_list_ttl_ms),
            ("cache.thumbnail_ttl_ms", cache.thumbnail_ttl_ms),
            ("cache.placeholder_ttl_ms", cache.placeholder_ttl_ms),
            ("cache.thumbnail_max_entries", cache.thumbnail_max_entries),
        ] {
            if value == 0 {
                return Err(AdapterError::Configuration(format!(
                    "{name} must be greater than zero"
                )));
            }
        }
        Ok(())
    }

    /// Standard config locations, in lookup order.
    fn candidate_paths() -> Vec<PathBuf> {
        let mut candidates = Vec::with_capacity(2);
        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join(".nanodlp-adapter").join("config.toml"));
        }
        candidates.push(PathBuf::from("/etc/nanodlp-adapter/config.toml"));
        candidates
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return if path.exists() {
                Ok(path.to_path_buf())
            } else {
                Err(AdapterError::Configuration(format!(
                    "Config file not found: {}",
                    path.display()
                )))
            };
        }

        let candidates = Self::candidate_paths();
        if let Some(found) = candidates.iter().find(|p| p.exists()) {
            return Ok(found.clone());
        }

        let searched: Vec<String> = candidates.iter().map(|p| p.display().to_string()).collect();
        Err(AdapterError::Configuration(format!(
            "No config file found (searched: {})",
            searched.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = AdapterConfig::default();
        assert_eq!(config.request_timeout_ms, 5_000);
        assert_eq!(config.cache.plate_list_ttl_ms, 120_000);
        assert_eq!(config.cache.thumbnail_ttl_ms, 30_000);
        assert_eq!(config.cache.placeholder_ttl_ms, 5_000);
        assert_eq!(config.cache.thumbnail_max_entries, 256);
        assert_eq!(config.status.max_attempts, 2);
        assert_eq!(config.status.retry_delay_ms, 200);
        assert_eq!(config.status.startup_guard_ms, 2_000);
    }

    #[test]
    fn parse_minimal_config() {
        let toml = r#"
            base_url = "http://printer.local"
        "#;
        let config: AdapterConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.base_url, "http://printer.local");
        // Defaults preserved
        assert_eq!(config.cache, CacheSettings::default());
        assert_eq!(config.status, StatusSettings::default());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
            base_url = "http://10.0.0.5"
            request_timeout_ms = 3000

            [cache]
            plate_list_ttl_ms = 60000
            thumbnail_ttl_ms = 10000
            placeholder_ttl_ms = 250
            thumbnail_max_entries = 32

            [status]
            max_attempts = 3
            retry_delay_ms = 50
            startup_guard_ms = 0
            poll_interval_ms = 500
        "#;
        let config: AdapterConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.request_timeout_duration(), Duration::from_secs(3));
        assert_eq!(config.cache.plate_list_ttl_duration(), Duration::from_secs(60));
        assert_eq!(config.cache.placeholder_ttl_duration(), Duration::from_millis(250));
        assert_eq!(config.cache.thumbnail_max_entries, 32);
        assert_eq!(config.status.max_attempts, 3);
        assert_eq!(config.status.startup_guard_duration(), Duration::ZERO);
        assert_eq!(config.status.poll_interval_duration(), Duration::from_millis(500));
    }

    #[test]
    fn builder_setters() {
        let config = AdapterConfig::new("http://printer")
            .request_timeout(Duration::from_secs(2))
            .cache(CacheSettings::default().thumbnail_ttl(Duration::from_secs(60)))
            .status(StatusSettings::default().retry_delay(Duration::from_millis(10)));
        assert_eq!(config.request_timeout_ms, 2_000);
        assert_eq!(config.cache.thumbnail_ttl_ms, 60_000);
        assert_eq!(config.status.retry_delay_ms, 10);
    }

    #[test]
    fn validate_rejects_zero_attempts() {
        let config =
            AdapterConfig::new("http://printer").status(StatusSettings::default().max_attempts(0));
        assert!(matches!(config.validate(), Err(AdapterError::Configuration(_))));
    }

    #[test]
    fn sub_second_ttls_are_kept() {
        let cache = CacheSettings::default()
            .plate_list_ttl(Duration::from_millis(1500))
            .thumbnail_ttl(Duration::from_millis(800))
            .placeholder_ttl(Duration::from_millis(300));
        assert_eq!(cache.plate_list_ttl_duration(), Duration::from_millis(1500));
        assert_eq!(cache.thumbnail_ttl_duration(), Duration::from_millis(800));
        assert_eq!(cache.placeholder_ttl_duration(), Duration::from_millis(300));
    }

    #[test]
    fn validate_rejects_zero_cache_settings() {
        let zero_ttl = AdapterConfig::new("http://printer")
            .cache(CacheSettings::default().placeholder_ttl(Duration::from_micros(500)));
        let err = zero_ttl.validate().unwrap_err();
        assert!(err.to_string().contains("cache.placeholder_ttl_ms"));

        let zero_capacity = AdapterConfig::new("http://printer")
            .cache(CacheSettings::default().thumbnail_max_entries(0));
        let err = zero_capacity.validate().unwrap_err();
        assert!(err.to_string().contains("cache.thumbnail_max_entries"));
    }

    #[test]
    fn validate_rejects_empty_url() {
        assert!(AdapterConfig::new("  ").validate().is_err());
        assert!(AdapterConfig::new("http://printer").validate().is_ok());
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let err = AdapterConfig::load(Some(Path::new("/nonexistent/nanodlp.toml"))).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
