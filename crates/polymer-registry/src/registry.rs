//! App registry — registered module classes, partitioned by appname
//!
//! Entries are weak. A class nobody holds any more disappears from lookups
//! and enumeration, and its slot is pruned the next time it is touched.

use crate::class::ModuleClass;
use dashmap::DashMap;
use polymer_core::{Error, QualName, Result};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use tracing::{debug, info};

/// Notified after a qualname is unregistered, so caches can drop it.
pub trait InvalidationHook: Send + Sync {
    fn invalidate(&self, qualname: &QualName);
}

type Partition = BTreeMap<QualName, Weak<ModuleClass>>;

#[derive(Default)]
pub struct AppRegistry {
    apps: DashMap<String, Partition>,
    hooks: RwLock<Vec<Arc<dyn InvalidationHook>>>,
}

impl AppRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure an (empty) partition exists for `appname`.
    pub fn ensure_app(&self, appname: &str) {
        self.apps.entry(appname.to_string()).or_default();
    }

    /// Register a class under its own appname and qualname.
    ///
    /// Registering the same class again is a no-op; a different live class
    /// under the same qualname is a `NameConflict`.
    pub fn register(&self, class: &Arc<ModuleClass>) -> Result<()> {
        let appname = class.appname();
        let qualname = class.qualname();
        let mut partition = self.apps.entry(appname.to_string()).or_default();
        match partition.get(qualname).and_then(Weak::upgrade) {
            Some(existing) if Arc::ptr_eq(&existing, class) => {
                debug!("{} already registered, skipping", qualname);
                return Ok(());
            }
            Some(_) => return Err(Error::name_conflict(appname, qualname.as_str())),
            None => {}
        }
        partition.insert(qualname.clone(), Arc::downgrade(class));
        info!("Registered module class {}", qualname);
        Ok(())
    }

    pub fn lookup(&self, appname: &str, qualname: &QualName) -> Option<Arc<ModuleClass>> {
        let weak = self.apps.get(appname)?.get(qualname).cloned()?;
        match weak.upgrade() {
            Some(class) => Some(class),
            None => {
                self.prune_entry(appname, qualname);
                None
            }
        }
    }

    pub fn contains(&self, appname: &str, qualname: &QualName) -> bool {
        self.lookup(appname, qualname).is_some()
    }

    /// Remove an entry and tell every invalidation hook about it.
    ///
    /// Returns whether a live class was removed.
    pub fn unregister(&self, appname: &str, qualname: &QualName) -> bool {
        let removed = self
            .apps
            .get_mut(appname)
            .and_then(|mut partition| partition.remove(qualname))
            .is_some_and(|weak| weak.strong_count() > 0);

        for hook in self.hooks.read().unwrap_or_else(PoisonError::into_inner).iter() {
            hook.invalidate(qualname);
        }
        if removed {
            info!("Unregistered module class {}", qualname);
        }
        removed
    }

    pub fn add_hook(&self, hook: Arc<dyn InvalidationHook>) {
        self.hooks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(hook);
    }

    /// Every appname with a partition, sorted.
    pub fn all_appnames(&self) -> Vec<String> {
        let mut names: Vec<String> = self.apps.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Live classes of one app, sorted by qualname.
    pub fn all_modules(&self, appname: &str) -> Vec<Arc<ModuleClass>> {
        let Some(mut partition) = self.apps.get_mut(appname) else {
            return Vec::new();
        };
        partition.retain(|_, weak| weak.strong_count() > 0);
        partition.values().filter_map(Weak::upgrade).collect()
    }

    /// Drop every partition. Hooks stay installed.
    pub fn clear(&self) {
        self.apps.clear();
    }

    fn prune_entry(&self, appname: &str, qualname: &QualName) {
        if let Some(mut partition) = self.apps.get_mut(appname) {
            let dead = partition
                .get(qualname)
                .is_some_and(|weak| weak.strong_count() == 0);
            if dead {
                partition.remove(qualname);
                debug!("Pruned collected class {}", qualname);
            }
        }
    }
}
