//! Polymer index — per-application orchestration
//!
//! Each appname gets exactly one Finder/Loader pair for the lifetime of the
//! index, and each (appname, appspace) exactly one `ModuleType`. Asking again
//! returns what already exists; the finder is installed into the resolver
//! chain once.

use crate::cache::SpecCache;
use crate::chain::ResolverChain;
use crate::finder::Finder;
use crate::loader::{forget_in, Loader, LoaderPool};
use crate::scope::AppScope;
use polymer_core::{validate_segment, Error, LoaderKey, PolymerConfig, QualName, Result};
use polymer_registry::{AppRegistry, InvalidationHook, Module, ModuleClass, ModuleClassBuilder};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Base type for module classes in one (appname, appspace).
pub struct ModuleType {
    appname: String,
    appspace: String,
    finder: Arc<Finder>,
    loader: Arc<Loader>,
    registry: Arc<AppRegistry>,
}

impl ModuleType {
    pub fn appname(&self) -> &str {
        &self.appname
    }

    pub fn appspace(&self) -> &str {
        &self.appspace
    }

    /// `appname.appspace`
    pub fn package(&self) -> QualName {
        QualName::package(&self.appname, &self.appspace)
    }

    pub fn qualname(&self, name: &str) -> QualName {
        QualName::join(&self.appname, &self.appspace, name)
    }

    pub fn finder(&self) -> &Arc<Finder> {
        &self.finder
    }

    pub fn loader(&self) -> &Arc<Loader> {
        &self.loader
    }

    /// Start defining a module class of this type; finish with `register()`.
    pub fn define(&self, name: impl Into<String>) -> ModuleClassBuilder {
        ModuleClass::builder(&self.appname, &self.appspace, name).in_registry(self.registry.clone())
    }

    /// Registered classes of this appspace, sorted by qualname.
    pub fn classes(&self) -> Vec<Arc<ModuleClass>> {
        self.registry
            .all_modules(&self.appname)
            .into_iter()
            .filter(|c| c.appspace() == self.appspace)
            .collect()
    }

    /// Find, construct and execute `name` within this appspace, using only
    /// this type's Finder and Loader.
    pub fn resolve(&self, name: &str) -> Result<Arc<Module>> {
        let qualname = self.qualname(name);
        let spec = self
            .finder
            .find_spec(&qualname)
            .ok_or_else(|| Error::not_found(qualname.as_str()))?;
        let module = self
            .loader
            .create_module(&spec)
            .ok_or_else(|| Error::not_found(qualname.as_str()))?;
        self.loader.exec_module(&module)?;
        Ok(module)
    }
}

impl fmt::Debug for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModuleType({}.{})", self.appname, self.appspace)
    }
}

/// What `initialize` hands back.
pub type Initialized = (Arc<ModuleType>, Arc<Finder>, Arc<Loader>);

struct AppEntry {
    finder: Arc<Finder>,
    loader: Arc<Loader>,
    types: BTreeMap<String, Arc<ModuleType>>,
}

pub struct PolymerIndex {
    config: PolymerConfig,
    hidden: Arc<[String]>,
    registry: Arc<AppRegistry>,
    cache: Arc<SpecCache>,
    loaders: Arc<LoaderPool>,
    chain: Arc<ResolverChain>,
    apps: Mutex<BTreeMap<String, AppEntry>>,
}

impl PolymerIndex {
    pub fn new(config: PolymerConfig) -> Self {
        let registry = Arc::new(AppRegistry::new());
        let cache = Arc::new(SpecCache::new(config.capacity()));
        let loaders = Arc::new(LoaderPool::new());
        registry.add_hook(Arc::new(CacheInvalidator {
            cache: cache.clone(),
            loaders: loaders.clone(),
        }));
        Self {
            hidden: config.hidden_names.clone().into(),
            config,
            registry,
            cache,
            loaders,
            chain: Arc::new(ResolverChain::new()),
            apps: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn config(&self) -> &PolymerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<AppRegistry> {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<SpecCache> {
        &self.cache
    }

    pub fn chain(&self) -> &Arc<ResolverChain> {
        &self.chain
    }

    pub fn loaders(&self) -> &Arc<LoaderPool> {
        &self.loaders
    }

    /// The (ModuleType, Finder, Loader) triple for `appname`/`appspace`,
    /// creating whatever does not exist yet.
    pub fn initialize(&self, appname: &str, appspace: &str) -> Result<Initialized> {
        validate_segment("appname", appname)?;
        validate_segment("appspace", appspace)?;
        let mut apps = self.lock_apps();
        let (initialized, _) = self.initialize_locked(&mut apps, appname, appspace);
        Ok(initialized)
    }

    /// Create the ModuleType for a new (appname, appspace).
    ///
    /// Unlike `initialize`, an existing type is a `NameConflict`.
    pub fn define_type(&self, appname: &str, appspace: &str) -> Result<Arc<ModuleType>> {
        validate_segment("appname", appname)?;
        validate_segment("appspace", appspace)?;
        let mut apps = self.lock_apps();
        match self.initialize_locked(&mut apps, appname, appspace) {
            ((module_type, _, _), true) => Ok(module_type),
            (_, false) => Err(Error::name_conflict(
                appname,
                QualName::package(appname, appspace).as_str(),
            )),
        }
    }

    pub fn module_type(&self, appname: &str, appspace: &str) -> Option<Arc<ModuleType>> {
        self.lock_apps()
            .get(appname)
            .and_then(|entry| entry.types.get(appspace).cloned())
    }

    pub fn finder(&self, appname: &str) -> Option<Arc<Finder>> {
        self.lock_apps().get(appname).map(|e| e.finder.clone())
    }

    pub fn loader(&self, appname: &str) -> Option<Arc<Loader>> {
        self.lock_apps().get(appname).map(|e| e.loader.clone())
    }

    pub fn appnames(&self) -> Vec<String> {
        self.lock_apps().keys().cloned().collect()
    }

    pub fn appspaces(&self, appname: &str) -> Vec<String> {
        self.lock_apps()
            .get(appname)
            .map(|e| e.types.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Resolve through the process-wide chain.
    pub fn import(&self, qualname: &QualName) -> Result<Arc<Module>> {
        self.chain.import(qualname)
    }

    /// Remove a class and drop its cached spec and instances.
    pub fn unregister(&self, appname: &str, qualname: &QualName) -> bool {
        self.registry.unregister(appname, qualname)
    }

    /// Forget every app, class, spec and instance. Handles given out earlier
    /// keep working but are no longer reachable through the index.
    pub fn reset(&self) {
        let mut apps = self.lock_apps();
        self.chain.clear();
        self.cache.clear();
        for entry in apps.values() {
            entry.loader.clear();
        }
        self.loaders.clear();
        self.registry.clear();
        apps.clear();
        info!("Polymer index reset");
    }

    /// Shared by `initialize` and `define_type` so the existence check and the
    /// insert happen under one `apps` guard. The flag is true when the
    /// ModuleType was created by this call.
    fn initialize_locked(
        &self,
        apps: &mut BTreeMap<String, AppEntry>,
        appname: &str,
        appspace: &str,
    ) -> (Initialized, bool) {
        let entry = apps
            .entry(appname.to_string())
            .or_insert_with(|| self.create_app(appname));
        let (module_type, created) = match entry.types.get(appspace) {
            Some(existing) => (existing.clone(), false),
            None => (self.create_type(entry, appname, appspace), true),
        };
        (
            (module_type, entry.finder.clone(), entry.loader.clone()),
            created,
        )
    }

    fn create_app(&self, appname: &str) -> AppEntry {
        let scope = Arc::new(AppScope::new(appname));
        let loader = self
            .loaders
            .get_or_create(&scope, &self.registry, &self.hidden, &self.chain);
        let finder = Arc::new(Finder::new(
            scope,
            self.cache.clone(),
            loader.clone(),
            self.registry.clone(),
        ));
        self.registry.ensure_app(appname);
        self.chain.install(finder.clone());
        info!("Initialized app {}", appname);
        AppEntry {
            finder,
            loader,
            types: BTreeMap::new(),
        }
    }

    fn create_type(&self, entry: &mut AppEntry, appname: &str, appspace: &str) -> Arc<ModuleType> {
        entry.finder.add_appspace(appspace);
        let module_type = Arc::new(ModuleType {
            appname: appname.to_string(),
            appspace: appspace.to_string(),
            finder: entry.finder.clone(),
            loader: entry.loader.clone(),
            registry: self.registry.clone(),
        });
        entry.types.insert(appspace.to_string(), module_type.clone());
        debug!("Created module type {}.{}", appname, appspace);
        module_type
    }

    fn lock_apps(&self) -> MutexGuard<'_, BTreeMap<String, AppEntry>> {
        self.apps.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for PolymerIndex {
    fn default() -> Self {
        Self::new(PolymerConfig::default())
    }
}

/// Drops a qualname from the spec cache and its app's loader memo,
/// holding both locks in the global order.
struct CacheInvalidator {
    cache: Arc<SpecCache>,
    loaders: Arc<LoaderPool>,
}

impl InvalidationHook for CacheInvalidator {
    fn invalidate(&self, qualname: &QualName) {
        let loader = self.loaders.get(&LoaderKey::for_app(qualname.appname()));
        let mut cache = self.cache.lock();
        let cached = cache.remove(qualname);
        let memoized = match &loader {
            Some(loader) => forget_in(&mut loader.lock_memo(), qualname),
            None => false,
        };
        drop(cache);
        debug!(
            "Invalidated {} (spec cached: {}, instance memoized: {})",
            qualname, cached, memoized
        );
    }
}
