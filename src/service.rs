//! The Polymer service object
//!
//! Owns one `PolymerIndex` (and through it the registry, spec cache, loader
//! pool and resolver chain). Tests build their own with `Polymer::new()`;
//! everything else shares the process-wide instance from `global()`.

use polymer_core::{PolymerConfig, QualName, Result};
use polymer_loader::{Initialized, PolymerIndex};
use polymer_registry::Module;
use std::path::Path;
use std::sync::{Arc, OnceLock};

pub struct Polymer {
    index: PolymerIndex,
}

impl Default for Polymer {
    fn default() -> Self {
        Self::new()
    }
}

impl Polymer {
    pub fn new() -> Self {
        Self::with_config(PolymerConfig::default())
    }

    pub fn with_config(config: PolymerConfig) -> Self {
        Self {
            index: PolymerIndex::new(config),
        }
    }

    /// Build from a TOML config file, falling back to defaults.
    pub fn from_config_file(path: &Path) -> Self {
        Self::with_config(PolymerConfig::load(path))
    }

    pub fn config(&self) -> &PolymerConfig {
        self.index.config()
    }

    pub fn index(&self) -> &PolymerIndex {
        &self.index
    }

    /// `initialize_in(appname, <default appspace>)`.
    pub fn initialize(&self, appname: &str) -> Result<Initialized> {
        let appspace = self.index.config().default_appspace.clone();
        self.initialize_in(appname, &appspace)
    }

    pub fn initialize_in(&self, appname: &str, appspace: &str) -> Result<Initialized> {
        self.index.initialize(appname, appspace)
    }

    pub fn import(&self, qualname: impl Into<QualName>) -> Result<Arc<Module>> {
        self.index.import(&qualname.into())
    }

    pub fn unregister(&self, appname: &str, qualname: impl Into<QualName>) -> bool {
        self.index.unregister(appname, &qualname.into())
    }

    pub fn reset(&self) {
        self.index.reset();
    }
}

static GLOBAL: OnceLock<Polymer> = OnceLock::new();

/// The process-wide service, created with default config on first use.
pub fn global() -> &'static Polymer {
    GLOBAL.get_or_init(Polymer::new)
}

/// (ModuleType, Finder, Loader) for `appname` in the default appspace.
pub fn initialize(appname: &str) -> Result<Initialized> {
    global().initialize(appname)
}

pub fn initialize_in(appname: &str, appspace: &str) -> Result<Initialized> {
    global().initialize_in(appname, appspace)
}

pub fn import(qualname: impl Into<QualName>) -> Result<Arc<Module>> {
    global().import(qualname)
}

pub fn unregister(appname: &str, qualname: impl Into<QualName>) -> bool {
    global().unregister(appname, qualname)
}
