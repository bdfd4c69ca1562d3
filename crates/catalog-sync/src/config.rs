//! # Catalog Configuration
//!
//! Configuration for the product cache and its sync engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     CATALOG_STALE_THRESHOLD_SECS=3600                                  │
//! │     CATALOG_DB_PATH=/var/lib/catalog/cache.db                          │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/catalog/catalog.toml (Linux)                             │
//! │     ~/Library/Application Support/com.catalog.catalog/catalog.toml     │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     stale 1h, delta 5min, upsert-only, coalesced reloads               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # catalog.toml
//! [cache]
//! db_path = "/var/lib/catalog/cache.db"
//! stale_threshold_secs = 3600
//! delta_interval_secs = 300
//! default_country = "Canada"
//!
//! [sync]
//! prune_on_full_sync = false
//! coalesce_in_flight = true
//! live_updates_on_start = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use catalog_core::DEFAULT_COUNTRY;
use catalog_db::DbConfig;

use crate::coordinator::{FreshnessPolicy, SyncOptions};
use crate::error::{SyncError, SyncResult};

// =============================================================================
// Cache Settings
// =============================================================================

/// Where the cache lives and how long its contents stay fresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// SQLite file for the cache. Defaults to the platform data directory.
    #[serde(default)]
    pub db_path: Option<PathBuf>,

    /// Age at which the cache is reloaded in full (seconds).
    #[serde(default = "default_stale_threshold")]
    pub stale_threshold_secs: u64,

    /// Age at which a delta reload is attempted (seconds).
    #[serde(default = "default_delta_interval")]
    pub delta_interval_secs: u64,

    /// Country given to locations that arrive without one.
    #[serde(default = "default_country")]
    pub default_country: String,
}

fn default_stale_threshold() -> u64 {
    3600
}

fn default_delta_interval() -> u64 {
    300
}

fn default_country() -> String {
    DEFAULT_COUNTRY.to_string()
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings {
            db_path: None,
            stale_threshold_secs: default_stale_threshold(),
            delta_interval_secs: default_delta_interval(),
            default_country: default_country(),
        }
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Reload behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Drop cached records missing from a full reload.
    /// Off by default: the cache only ever upserts.
    #[serde(default)]
    pub prune_on_full_sync: bool,

    /// Let concurrent callers share one in-flight reload per kind.
    #[serde(default = "default_true")]
    pub coalesce_in_flight: bool,

    /// Start the live invalidation listener when the catalog is opened.
    #[serde(default)]
    pub live_updates_on_start: bool,
}

fn default_true() -> bool {
    true
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            prune_on_full_sync: false,
            coalesce_in_flight: true,
            live_updates_on_start: false,
        }
    }
}

// =============================================================================
// Main Catalog Configuration
// =============================================================================

/// Complete catalog configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub sync: SyncSettings,
}

impl CatalogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (catalog.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading catalog config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load catalog config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Catalog config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.cache.stale_threshold_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "stale_threshold_secs must be greater than 0".into(),
            ));
        }

        if self.cache.delta_interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "delta_interval_secs must be greater than 0".into(),
            ));
        }

        if self.cache.delta_interval_secs >= self.cache.stale_threshold_secs {
            return Err(SyncError::InvalidConfig(format!(
                "delta_interval_secs ({}) must be less than stale_threshold_secs ({})",
                self.cache.delta_interval_secs, self.cache.stale_threshold_secs
            )));
        }

        if self.cache.default_country.trim().is_empty() {
            return Err(SyncError::InvalidConfig(
                "default_country must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(path) = var("CATALOG_DB_PATH") {
            debug!(path = %path, "Overriding cache path from environment");
            self.cache.db_path = Some(PathBuf::from(path));
        }

        if let Some(secs) = var("CATALOG_STALE_THRESHOLD_SECS") {
            match secs.parse::<u64>() {
                Ok(s) => self.cache.stale_threshold_secs = s,
                Err(_) => warn!(value = %secs, "Ignoring invalid CATALOG_STALE_THRESHOLD_SECS"),
            }
        }

        if let Some(secs) = var("CATALOG_DELTA_INTERVAL_SECS") {
            match secs.parse::<u64>() {
                Ok(s) => self.cache.delta_interval_secs = s,
                Err(_) => warn!(value = %secs, "Ignoring invalid CATALOG_DELTA_INTERVAL_SECS"),
            }
        }

        if let Some(country) = var("CATALOG_DEFAULT_COUNTRY") {
            self.cache.default_country = country;
        }

        if let Some(flag) = var("CATALOG_PRUNE_ON_FULL_SYNC") {
            match parse_flag(&flag) {
                Some(b) => self.sync.prune_on_full_sync = b,
                None => warn!(value = %flag, "Ignoring invalid CATALOG_PRUNE_ON_FULL_SYNC"),
            }
        }

        if let Some(flag) = var("CATALOG_COALESCE_SYNCS") {
            match parse_flag(&flag) {
                Some(b) => self.sync.coalesce_in_flight = b,
                None => warn!(value = %flag, "Ignoring invalid CATALOG_COALESCE_SYNCS"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("catalog.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Freshness thresholds for the coordinator.
    pub fn freshness_policy(&self) -> FreshnessPolicy {
        FreshnessPolicy::new(
            Duration::from_secs(self.cache.stale_threshold_secs),
            Duration::from_secs(self.cache.delta_interval_secs),
        )
    }

    /// Reload options for the coordinator.
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            prune_on_full_sync: self.sync.prune_on_full_sync,
            coalesce_in_flight: self.sync.coalesce_in_flight,
            default_country: self.cache.default_country.clone(),
        }
    }

    /// Cache path, falling back to the platform data directory.
    pub fn db_path(&self) -> PathBuf {
        self.cache.db_path.clone().unwrap_or_else(|| {
            project_dirs()
                .map(|dirs| dirs.data_dir().join("catalog-cache.db"))
                .unwrap_or_else(|| PathBuf::from("catalog-cache.db"))
        })
    }

    /// Store configuration for the cache file.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.db_path())
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "catalog", "catalog")
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = CatalogConfig::default();
        assert_eq!(config.cache.stale_threshold_secs, 3600);
        assert_eq!(config.cache.delta_interval_secs, 300);
        assert_eq!(config.cache.default_country, "Canada");
        assert!(!config.sync.prune_on_full_sync);
        assert!(config.sync.coalesce_in_flight);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = CatalogConfig::default();

        config.cache.delta_interval_secs = 3600;
        assert!(config.validate().is_err());

        config.cache.delta_interval_secs = 0;
        assert!(config.validate().is_err());

        config.cache.delta_interval_secs = 300;
        config.cache.stale_threshold_secs = 0;
        assert!(config.validate().unwrap_err().is_config_error());

        config.cache.stale_threshold_secs = 5000;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = CatalogConfig::default();
        config.apply_overrides(env(&[
            ("CATALOG_STALE_THRESHOLD_SECS", "5000"),
            ("CATALOG_DELTA_INTERVAL_SECS", "120"),
            ("CATALOG_DB_PATH", "/tmp/cache.db"),
            ("CATALOG_PRUNE_ON_FULL_SYNC", "yes"),
            ("CATALOG_COALESCE_SYNCS", "off"),
        ]));

        assert_eq!(config.cache.stale_threshold_secs, 5000);
        assert_eq!(config.cache.delta_interval_secs, 120);
        assert_eq!(config.db_path(), PathBuf::from("/tmp/cache.db"));
        assert!(config.sync.prune_on_full_sync);
        assert!(!config.sync.coalesce_in_flight);
    }

    #[test]
    fn test_invalid_env_values_are_ignored() {
        let mut config = CatalogConfig::default();
        config.apply_overrides(env(&[
            ("CATALOG_STALE_THRESHOLD_SECS", "an hour"),
            ("CATALOG_COALESCE_SYNCS", "maybe"),
        ]));

        assert_eq!(config, CatalogConfig::default());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: CatalogConfig = toml::from_str("[cache]\nstale_threshold_secs = 7200\n").unwrap();
        assert_eq!(config.cache.stale_threshold_secs, 7200);
        assert_eq!(config.cache.delta_interval_secs, 300);
        assert!(config.sync.coalesce_in_flight);
    }

    #[test]
    fn test_toml_serialization() {
        let toml_str = toml::to_string_pretty(&CatalogConfig::default()).unwrap();
        assert!(toml_str.contains("[cache]"));
        assert!(toml_str.contains("[sync]"));
    }

    #[test]
    fn test_freshness_policy_from_config() {
        let policy = CatalogConfig::default().freshness_policy();
        assert_eq!(policy.stale_threshold, Duration::from_secs(3600));
        assert_eq!(policy.delta_interval, Duration::from_secs(300));
    }
}
