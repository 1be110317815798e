//! Loader — turns specs into memoized module instances and executes them

use crate::chain::ResolverChain;
use crate::scope::AppScope;
use dashmap::DashMap;
use polymer_core::{Error, LoaderKey, ModuleSpec, QualName, Result};
use polymer_registry::{AppRegistry, Module, Namespace};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, info};

pub(crate) type Memo = HashMap<ModuleSpec, Arc<Module>>;

pub struct Loader {
    key: LoaderKey,
    scope: Arc<AppScope>,
    registry: Arc<AppRegistry>,
    memo: Mutex<Memo>,
    hidden: Arc<[String]>,
    chain: Weak<ResolverChain>,
}

impl Loader {
    pub fn new(
        scope: Arc<AppScope>,
        registry: Arc<AppRegistry>,
        hidden: Arc<[String]>,
        chain: Weak<ResolverChain>,
    ) -> Self {
        Self {
            key: LoaderKey::for_app(scope.appname()),
            scope,
            registry,
            memo: Mutex::new(HashMap::new()),
            hidden,
            chain,
        }
    }

    pub fn key(&self) -> &LoaderKey {
        &self.key
    }

    pub fn appname(&self) -> &str {
        self.scope.appname()
    }

    /// Instance for `spec`, constructed on first request.
    ///
    /// `None` when the spec belongs to another loader, or names neither a
    /// registered class nor a package root.
    pub fn create_module(&self, spec: &ModuleSpec) -> Option<Arc<Module>> {
        if spec.loader() != &self.key {
            return None;
        }
        let mut memo = self.lock_memo();
        if let Some(module) = memo.get(spec) {
            return Some(module.clone());
        }

        let module = match self.registry.lookup(self.appname(), spec.name()) {
            Some(class) => Module::from_class(spec.clone(), class, self.hidden.clone()),
            None if self.scope.is_package_root(spec.name()) => {
                Module::package(spec.clone(), self.hidden.clone())
            }
            None => return None,
        };
        let module = Arc::new(module);
        memo.insert(spec.clone(), module.clone());
        debug!("Created module {}", spec.name());
        Some(module)
    }

    /// Run the module's execute step once. Named targets are resolved
    /// through the resolver chain this loader belongs to.
    pub fn exec_module(&self, module: &Module) -> Result<()> {
        module.execute(|qualname| self.import_target(qualname))
    }

    fn import_target(&self, qualname: &QualName) -> Result<Arc<dyn Namespace>> {
        let chain = self
            .chain
            .upgrade()
            .ok_or_else(|| Error::not_found(qualname.as_str()))?;
        let module: Arc<dyn Namespace> = chain.import(qualname)?;
        Ok(module)
    }

    /// Memoized instance for `spec`, without creating one.
    pub fn cached(&self, spec: &ModuleSpec) -> Option<Arc<Module>> {
        self.lock_memo().get(spec).cloned()
    }

    pub fn memo_len(&self) -> usize {
        self.lock_memo().len()
    }

    /// Drop memoized instances for one qualname.
    pub fn forget(&self, qualname: &QualName) -> bool {
        forget_in(&mut self.lock_memo(), qualname)
    }

    pub fn clear(&self) {
        self.lock_memo().clear();
    }

    /// Second lock in the global order: spec cache, then loader memo.
    pub(crate) fn lock_memo(&self) -> MutexGuard<'_, Memo> {
        self.memo.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub(crate) fn forget_in(memo: &mut Memo, qualname: &QualName) -> bool {
    let before = memo.len();
    memo.retain(|spec, _| spec.name() != qualname);
    before != memo.len()
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("key", &self.key)
            .field("memo", &self.memo_len())
            .finish()
    }
}

/// Loaders memoized by their construction signature.
#[derive(Default)]
pub struct LoaderPool {
    loaders: DashMap<LoaderKey, Arc<Loader>>,
}

impl LoaderPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// The loader for `scope`'s appname, constructing it on first request.
    pub fn get_or_create(
        &self,
        scope: &Arc<AppScope>,
        registry: &Arc<AppRegistry>,
        hidden: &Arc<[String]>,
        chain: &Arc<ResolverChain>,
    ) -> Arc<Loader> {
        let key = LoaderKey::for_app(scope.appname());
        self.loaders
            .entry(key)
            .or_insert_with(|| {
                info!("Created loader for {}", scope.appname());
                Arc::new(Loader::new(
                    scope.clone(),
                    registry.clone(),
                    hidden.clone(),
                    Arc::downgrade(chain),
                ))
            })
            .clone()
    }

    pub fn get(&self, key: &LoaderKey) -> Option<Arc<Loader>> {
        self.loaders.get(key).map(|l| l.clone())
    }

    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }

    pub fn clear(&self) {
        self.loaders.clear();
    }
}
