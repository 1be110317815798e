//! Polymer configuration
//!
//! Loaded from TOML when the host asks for it, falls back to defaults if no
//! config file exists or it fails to parse.

use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_SPEC_CACHE_CAPACITY: usize = 64;
pub const DEFAULT_APPSPACE: &str = "app";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolymerConfig {
    /// Maximum number of specs kept in the shared spec cache.
    pub spec_cache_capacity: usize,
    /// Appspace used when `initialize` is called without one.
    pub default_appspace: String,
    /// Extra names hidden from module enumeration, on top of the housekeeping names.
    pub hidden_names: Vec<String>,
}

impl Default for PolymerConfig {
    fn default() -> Self {
        Self {
            spec_cache_capacity: DEFAULT_SPEC_CACHE_CAPACITY,
            default_appspace: DEFAULT_APPSPACE.to_string(),
            hidden_names: Vec::new(),
        }
    }
}

impl PolymerConfig {
    /// Load config from a TOML file, or return defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {} — using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {} — using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Spec cache capacity, never below one.
    pub fn capacity(&self) -> usize {
        self.spec_cache_capacity.max(1)
    }
}
