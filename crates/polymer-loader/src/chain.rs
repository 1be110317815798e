//! Process-wide resolver chain
//!
//! The ordered list of installed Finders. Resolution tries each Finder in
//! install order; a miss from one Finder just moves on to the next.

use crate::finder::Finder;
use polymer_core::{Error, ModuleSpec, QualName, Result};
use polymer_registry::Module;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

#[derive(Default)]
pub struct ResolverChain {
    finders: RwLock<Vec<Arc<Finder>>>,
}

impl ResolverChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a finder unless one for the same appname is installed.
    ///
    /// Returns whether the finder was added.
    pub fn install(&self, finder: Arc<Finder>) -> bool {
        let mut finders = self.finders.write().unwrap_or_else(PoisonError::into_inner);
        if finders.iter().any(|f| f.appname() == finder.appname()) {
            debug!("Finder for {} already installed", finder.appname());
            return false;
        }
        info!("Installed finder for {} at position {}", finder.appname(), finders.len());
        finders.push(finder);
        true
    }

    pub fn uninstall(&self, appname: &str) -> bool {
        let mut finders = self.finders.write().unwrap_or_else(PoisonError::into_inner);
        let before = finders.len();
        finders.retain(|f| f.appname() != appname);
        before != finders.len()
    }

    pub fn is_installed(&self, appname: &str) -> bool {
        self.snapshot().iter().any(|f| f.appname() == appname)
    }

    /// Installed finders in resolution order.
    pub fn finders(&self) -> Vec<Arc<Finder>> {
        self.snapshot()
    }

    pub fn clear(&self) {
        self.finders
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn find_spec(&self, qualname: &QualName) -> Option<ModuleSpec> {
        self.snapshot().iter().find_map(|f| f.find_spec(qualname))
    }

    /// Resolve, construct and execute a module.
    ///
    /// Each finder is asked in order; the first one whose spec its loader
    /// can construct wins. `NotFound` only when every finder missed.
    pub fn import(&self, qualname: &QualName) -> Result<Arc<Module>> {
        for finder in self.snapshot() {
            let Some(spec) = finder.find_spec(qualname) else {
                continue;
            };
            let Some(module) = finder.loader().create_module(&spec) else {
                debug!("{} found {} but could not construct it", finder.appname(), qualname);
                continue;
            };
            finder.loader().exec_module(&module)?;
            return Ok(module);
        }
        Err(Error::not_found(qualname.as_str()))
    }

    // Lock is released before any finder runs, so loaders may import recursively.
    fn snapshot(&self) -> Vec<Arc<Finder>> {
        self.finders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
