// Engine and cache configuration
//
// Every field has a default, so partial JSON documents are accepted.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Capacity before LRU eviction kicks in; 0 disables storage
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Absolute lifetime of an entry, measured from insertion
    #[serde(default)]
    pub ttl_millis: Option<u64>,
}

impl CacheConfig {
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_millis.map(Duration::from_millis)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            ttl_millis: None,
        }
    }
}

/// What a failed `${...}` binding turns into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingErrorPolicy {
    /// Substitute the empty string
    #[default]
    Empty,
    /// Leave the `${...}` text in place
    KeepOriginal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub binding_errors: BindingErrorPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_enabled: default_true(),
            cache: CacheConfig::default(),
            binding_errors: BindingErrorPolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}

fn default_max_entries() -> usize {
    256
}

fn default_true() -> bool {
    true
}
