//! Configuration loading for the message cache
//!
//! Supports loading the cache mode from (in order of priority):
//! 1. JSON file in the beacon config directory (cache.json)
//! 2. Runtime environment variable (BEACON_CACHE_FILE)
//! 3. Default in-memory cache

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config filename in the beacon config directory
const CONFIG_FILE: &str = "cache.json";

/// Default cache filename in the beacon data directory
const DEFAULT_CACHE_FILE: &str = "cache.db";

/// Environment variable naming the cache file; empty disables caching
const CACHE_FILE_ENV: &str = "BEACON_CACHE_FILE";

/// How messages are cached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum CacheMode {
    /// Durable SQLite file
    File { path: PathBuf },
    /// Shared in-memory database, lost on exit
    Memory,
    /// Discard everything
    Nop,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(flatten)]
    pub mode: CacheMode,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            mode: CacheMode::Memory,
        }
    }
}

impl CacheConfig {
    pub fn new(mode: CacheMode) -> Self {
        Self { mode }
    }

    /// Load the cache configuration using the following priority:
    /// 1. JSON file (~/.config/beacon/cache.json)
    /// 2. Runtime environment variable
    /// 3. In-memory cache
    pub fn load() -> Result<Self> {
        if config::config_exists(CONFIG_FILE) {
            return config::load_json(CONFIG_FILE);
        }

        if let Some(cfg) = Self::from_env() {
            return Ok(cfg);
        }

        Ok(Self::default())
    }

    /// Load the configuration from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        config::load_json_file(path)
    }

    /// Parse the configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse cache config JSON")
    }

    /// Read the configuration from the environment, if set
    pub fn from_env() -> Option<Self> {
        let value = std::env::var(CACHE_FILE_ENV).ok()?;
        Some(Self::from_env_value(&value))
    }

    fn from_env_value(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() {
            return Self::new(CacheMode::Nop);
        }
        Self::new(CacheMode::File {
            path: PathBuf::from(value),
        })
    }

    /// Get the default cache file path (~/.local/share/beacon/cache.db)
    pub fn default_cache_path() -> Option<PathBuf> {
        config::data_path(DEFAULT_CACHE_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_file_mode() {
        let json = r#"{ "mode": "file", "path": "/var/cache/beacon/cache.db" }"#;
        let cfg = CacheConfig::from_json(json).unwrap();
        assert_eq!(
            cfg.mode,
            CacheMode::File {
                path: PathBuf::from("/var/cache/beacon/cache.db")
            }
        );
    }

    #[test]
    fn test_parse_memory_and_nop() {
        assert_eq!(
            CacheConfig::from_json(r#"{ "mode": "memory" }"#).unwrap().mode,
            CacheMode::Memory
        );
        assert_eq!(
            CacheConfig::from_json(r#"{ "mode": "nop" }"#).unwrap().mode,
            CacheMode::Nop
        );
    }

    #[test]
    fn test_invalid_json() {
        assert!(CacheConfig::from_json(r#"{ "mode": "tape" }"#).is_err());
        assert!(CacheConfig::from_json(r#"{ "mode": "file" }"#).is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, r#"{ "mode": "nop" }"#).unwrap();

        assert_eq!(CacheConfig::from_file(&path).unwrap().mode, CacheMode::Nop);
    }

    #[test]
    fn test_env_value() {
        assert_eq!(CacheConfig::from_env_value("  ").mode, CacheMode::Nop);
        assert_eq!(
            CacheConfig::from_env_value("/tmp/cache.db").mode,
            CacheMode::File {
                path: PathBuf::from("/tmp/cache.db")
            }
        );
    }

    #[test]
    fn test_default_is_memory() {
        assert_eq!(CacheConfig::default().mode, CacheMode::Memory);
        assert!(
            CacheConfig::default_cache_path()
                .is_some_and(|p| p.ends_with("beacon/cache.db"))
        );
    }
}
