//! Finder — resolves qualnames to specs through the shared spec cache

use crate::cache::SpecCache;
use crate::loader::Loader;
use crate::scope::AppScope;
use polymer_core::{ModuleSpec, QualName, SpecOrigin};
use polymer_registry::AppRegistry;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

pub struct Finder {
    scope: Arc<AppScope>,
    cache: Arc<SpecCache>,
    loader: Arc<Loader>,
    registry: Arc<AppRegistry>,
}

impl Finder {
    pub fn new(
        scope: Arc<AppScope>,
        cache: Arc<SpecCache>,
        loader: Arc<Loader>,
        registry: Arc<AppRegistry>,
    ) -> Self {
        Self {
            scope,
            cache,
            loader,
            registry,
        }
    }

    pub fn appname(&self) -> &str {
        self.scope.appname()
    }

    pub fn appspaces(&self) -> Vec<String> {
        self.scope.appspaces()
    }

    pub fn add_appspace(&self, appspace: &str) -> bool {
        self.scope.add_appspace(appspace)
    }

    pub fn loader(&self) -> &Arc<Loader> {
        &self.loader
    }

    pub fn cache(&self) -> &Arc<SpecCache> {
        &self.cache
    }

    /// Spec for `qualname`, or `None` so the next finder can be tried.
    ///
    /// Names outside this app (or outside its known appspaces) are never
    /// claimed. Cached specs are returned without re-validation; on a miss a
    /// spec is built only for a registered class or a package root.
    ///
    /// The cache lock is held from the lookup through the insert, so an
    /// unregister racing with this call cannot leave a stale entry behind.
    pub fn find_spec(&self, qualname: &QualName) -> Option<ModuleSpec> {
        if !self.scope.claims(qualname) {
            return None;
        }
        let mut cache = self.cache.lock();
        if let Some(spec) = cache.get(qualname) {
            return Some(spec);
        }

        let origin = if self.registry.contains(self.appname(), qualname) {
            SpecOrigin::Class
        } else if self.scope.is_package_root(qualname) {
            SpecOrigin::Package
        } else {
            debug!("{} has nothing registered for {}", self.appname(), qualname);
            return None;
        };
        let spec = ModuleSpec::new(qualname.clone(), self.loader.key().clone(), origin);
        cache.insert(spec.clone());
        debug!("Cached {} spec for {}", origin, qualname);
        Some(spec)
    }

    /// Clear the shared spec cache and this finder's loader memo together.
    pub fn invalidate(&self) {
        let mut cache = self.cache.lock();
        let mut memo = self.loader.lock_memo();
        cache.clear();
        memo.clear();
        info!("Invalidated spec cache and loader memo for {}", self.appname());
    }
}

impl fmt::Debug for Finder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Finder")
            .field("appname", &self.appname())
            .field("appspaces", &self.appspaces())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polymer_registry::ModuleClass;
    use std::sync::Weak;

    fn setup() -> (Arc<AppRegistry>, Finder) {
        let registry = Arc::new(AppRegistry::new());
        let scope = Arc::new(AppScope::new("demo"));
        scope.add_appspace("app");
        let loader = Arc::new(Loader::new(
            scope.clone(),
            registry.clone(),
            Arc::from(Vec::new()),
            Weak::new(),
        ));
        let finder = Finder::new(scope, Arc::new(SpecCache::new(8)), loader, registry.clone());
        (registry, finder)
    }

    #[test]
    fn foreign_names_not_claimed() {
        let (_registry, finder) = setup();
        assert!(finder.find_spec(&"other.app.Foo".into()).is_none());
        assert!(finder.find_spec(&"demo.elsewhere.Foo".into()).is_none());
        assert!(finder.cache().is_empty());
    }

    #[test]
    fn unregistered_name_not_cached() {
        let (_registry, finder) = setup();
        assert!(finder.find_spec(&"demo.app.Ghost".into()).is_none());
        assert!(!finder.cache().contains(&"demo.app.Ghost".into()));
    }

    #[test]
    fn registered_class_spec() {
        let (registry, finder) = setup();
        let foo = ModuleClass::builder("demo", "app", "Foo").build().unwrap();
        registry.register(&foo).unwrap();
        let spec = finder.find_spec(foo.qualname()).unwrap();
        assert_eq!(spec.origin(), SpecOrigin::Class);
        assert_eq!(spec.loader(), finder.loader().key());
        assert!(finder.cache().contains(foo.qualname()));
    }

    #[test]
    fn cached_spec_returned_without_revalidation() {
        let (registry, finder) = setup();
        let foo = ModuleClass::builder("demo", "app", "Foo").build().unwrap();
        registry.register(&foo).unwrap();
        let first = finder.find_spec(foo.qualname()).unwrap();
        drop(foo);
        let again = finder.find_spec(&"demo.app.Foo".into()).unwrap();
        assert_eq!(first, again);
    }

    #[test]
    fn package_specs() {
        let (_registry, finder) = setup();
        assert!(finder.find_spec(&"demo".into()).unwrap().is_package());
        assert!(finder.find_spec(&"demo.app".into()).unwrap().is_package());
    }

    #[test]
    fn invalidate_clears_cache_and_memo() {
        let (registry, finder) = setup();
        let foo = ModuleClass::builder("demo", "app", "Foo").build().unwrap();
        registry.register(&foo).unwrap();
        let spec = finder.find_spec(foo.qualname()).unwrap();
        finder.loader().create_module(&spec).unwrap();
        finder.invalidate();
        assert!(finder.cache().is_empty());
        assert_eq!(finder.loader().memo_len(), 0);
    }
}
