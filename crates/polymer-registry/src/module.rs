//! Module instances
//!
//! A module is created by a Loader, either from a registered class or as an
//! empty package container. Execution moves it `New → Executing → Executed`
//! exactly once; a failed execution still ends in `Executed`. Threads that
//! ask for a module another thread is executing wait for it to finish.

use crate::class::ModuleClass;
use crate::proxy::{ChainedResolver, Namespace, HOUSEKEEPING};
use polymer_core::{Attrs, Error, ModuleSpec, QualName, Result, Value};
use serde_json::json;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::{
    Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError, RwLock, RwLockReadGuard,
};
use std::thread::{self, ThreadId};
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModuleState {
    New,
    Executing,
    Executed,
}

struct ExecState {
    state: ModuleState,
    runner: Option<ThreadId>,
}

/// Attributes defined directly on a module, without its resolver.
struct OwnNamespace {
    attrs: RwLock<Attrs>,
    hidden: Arc<[String]>,
}

impl OwnNamespace {
    fn read(&self) -> RwLockReadGuard<'_, Attrs> {
        self.attrs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_visible(&self, name: &str) -> bool {
        !HOUSEKEEPING.contains(&name) && !self.hidden.iter().any(|h| h == name)
    }
}

impl Namespace for OwnNamespace {
    fn lookup(&self, key: &str) -> Option<Value> {
        self.read().get(key).cloned()
    }

    fn members(&self) -> Vec<String> {
        self.read()
            .keys()
            .filter(|name| self.is_visible(name))
            .cloned()
            .collect()
    }
}

pub struct Module {
    spec: ModuleSpec,
    class: Option<Arc<ModuleClass>>,
    own: Arc<OwnNamespace>,
    exec: Mutex<ExecState>,
    finished: Condvar,
    proxy: OnceLock<ChainedResolver>,
}

impl Module {
    /// Instance of a registered class: short name, doc and class attributes.
    pub fn from_class(spec: ModuleSpec, class: Arc<ModuleClass>, hidden: Arc<[String]>) -> Self {
        let mut attrs = housekeeping(&spec, class.doc());
        for (key, value) in class.attrs() {
            attrs.insert(key.clone(), value.clone());
        }
        Self::with_attrs(spec, Some(class), attrs, hidden)
    }

    /// Empty placeholder for an appname or appspace root.
    pub fn package(spec: ModuleSpec, hidden: Arc<[String]>) -> Self {
        let attrs = housekeeping(&spec, None);
        Self::with_attrs(spec, None, attrs, hidden)
    }

    fn with_attrs(
        spec: ModuleSpec,
        class: Option<Arc<ModuleClass>>,
        attrs: Attrs,
        hidden: Arc<[String]>,
    ) -> Self {
        Self {
            spec,
            class,
            own: Arc::new(OwnNamespace {
                attrs: RwLock::new(attrs),
                hidden,
            }),
            exec: Mutex::new(ExecState {
                state: ModuleState::New,
                runner: None,
            }),
            finished: Condvar::new(),
            proxy: OnceLock::new(),
        }
    }

    pub fn spec(&self) -> &ModuleSpec {
        &self.spec
    }

    pub fn qualname(&self) -> &QualName {
        self.spec.name()
    }

    /// Unqualified name.
    pub fn name(&self) -> &str {
        self.spec.name().short_name()
    }

    pub fn doc(&self) -> Option<&str> {
        self.class.as_ref().and_then(|c| c.doc())
    }

    pub fn class(&self) -> Option<&Arc<ModuleClass>> {
        self.class.as_ref()
    }

    pub fn is_package(&self) -> bool {
        self.class.is_none()
    }

    pub fn state(&self) -> ModuleState {
        self.lock_exec().state
    }

    pub fn is_executed(&self) -> bool {
        self.state() == ModuleState::Executed
    }

    /// The resolver built from the class targets, once executed.
    pub fn proxy(&self) -> Option<&ChainedResolver> {
        self.proxy.get()
    }

    /// Own namespace first, then the resolver.
    pub fn get(&self, key: &str) -> Result<Value> {
        if let Some(value) = self.own.lookup(key) {
            return Ok(value);
        }
        match self.proxy.get() {
            Some(proxy) => proxy
                .get(key)
                .map_err(|_| Error::attribute_miss(self.owner_name(), key)),
            None => Err(Error::attribute_miss(self.owner_name(), key)),
        }
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.own
            .attrs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.own.read().contains_key(key) || self.proxy.get().is_some_and(|p| p.contains(key))
    }

    /// Enumerable names: resolver members plus own attributes, minus
    /// housekeeping and configured hidden names, sorted.
    pub fn dir(&self) -> Vec<String> {
        let mut names: BTreeSet<String> = self.own.members().into_iter().collect();
        if let Some(proxy) = self.proxy.get() {
            names.extend(proxy.members());
        }
        names.into_iter().filter(|name| self.own.is_visible(name)).collect()
    }

    /// Run the one-time execute step.
    ///
    /// Builds the resolver from the class targets (resolving named targets
    /// through `resolve`), then runs the class hook. A call from another
    /// thread while the step runs blocks until it is done; a re-entrant call
    /// from the executing thread, and every later call, returns `Ok(())`.
    pub fn execute<R>(&self, resolve: R) -> Result<()>
    where
        R: FnMut(&QualName) -> Result<Arc<dyn Namespace>>,
    {
        let me = thread::current().id();
        {
            let mut exec = self
                .finished
                .wait_while(self.lock_exec(), |e| {
                    e.state == ModuleState::Executing && e.runner != Some(me)
                })
                .unwrap_or_else(PoisonError::into_inner);
            if exec.state != ModuleState::New {
                debug!("{} already {:?}, skipping execute", self.qualname(), exec.state);
                return Ok(());
            }
            exec.state = ModuleState::Executing;
            exec.runner = Some(me);
        }

        let _finish = FinishExecute(self);
        let outcome = self.run_execute(resolve);
        match &outcome {
            Ok(()) => debug!("Executed {}", self.qualname()),
            Err(e) => warn!("Execute of {} failed, not retrying: {}", self.qualname(), e),
        }
        outcome
    }

    fn run_execute<R>(&self, resolve: R) -> Result<()>
    where
        R: FnMut(&QualName) -> Result<Arc<dyn Namespace>>,
    {
        let Some(class) = self.class.clone() else {
            return Ok(());
        };

        if !class.targets().is_empty() {
            let resolver = ChainedResolver::builder(class.name())
                .targets(class.targets().iter().cloned())
                .build_with(resolve)?;
            if self.proxy.set(resolver).is_err() {
                return Err(Error::Internal(format!(
                    "resolver for {} was already built",
                    self.qualname()
                )));
            }
        }

        if let Some(hook) = class.hook() {
            hook(self).map_err(|e| Error::execution_failure(self.qualname().as_str(), e))?;
        }
        Ok(())
    }

    fn owner_name(&self) -> &str {
        match &self.class {
            Some(class) => class.name(),
            None => self.name(),
        }
    }

    fn lock_exec(&self) -> MutexGuard<'_, ExecState> {
        self.exec.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Marks the module executed and wakes waiting threads, even if the hook panicked.
struct FinishExecute<'a>(&'a Module);

impl Drop for FinishExecute<'_> {
    fn drop(&mut self) {
        let mut exec = self.0.lock_exec();
        exec.state = ModuleState::Executed;
        exec.runner = None;
        drop(exec);
        self.0.finished.notify_all();
    }
}


fn housekeeping(spec: &ModuleSpec, doc: Option<&str>) -> Attrs {
    let name = spec.name();
    let package = if spec.is_package() {
        Some(name.to_string())
    } else {
        name.parent().map(|p| p.to_string())
    };
    let mut attrs = Attrs::new();
    attrs.insert("__name__".into(), json!(name.short_name()));
    attrs.insert("__qualname__".into(), json!(name.as_str()));
    attrs.insert("__doc__".into(), json!(doc));
    attrs.insert("__package__".into(), json!(package));
    attrs.insert(
        "__spec__".into(),
        serde_json::to_value(spec).unwrap_or(Value::Null),
    );
    attrs
}

thread_local! {
    /// Modules whose lookup is in progress on this thread. Targets that
    /// reach back to a module already being searched are treated as misses.
    static LOOKUPS: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Pops this thread's lookup entry on the way out, including on unwind.
struct LookupGuard;

impl LookupGuard {
    fn enter(id: usize) -> Option<Self> {
        LOOKUPS.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.contains(&id) {
                return None;
            }
            stack.push(id);
            Some(LookupGuard)
        })
    }
}

impl Drop for LookupGuard {
    fn drop(&mut self) {
        LOOKUPS.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

impl Namespace for Module {
    fn lookup(&self, key: &str) -> Option<Value> {
        let _guard = LookupGuard::enter(self as *const Module as usize)?;
        self.get(key).ok()
    }

    fn members(&self) -> Vec<String> {
        self.dir()
    }

    fn layers(&self) -> Option<(Arc<dyn Namespace>, &ChainedResolver)> {
        let proxy = self.proxy.get()?;
        let own: Arc<dyn Namespace> = self.own.clone();
        Some((own, proxy))
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("qualname", self.qualname())
            .field("state", &self.state())
            .field("package", &self.is_package())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::Target;
    use polymer_core::{LoaderKey, SpecOrigin};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn spec(name: &str, origin: SpecOrigin) -> ModuleSpec {
        ModuleSpec::new(name.into(), LoaderKey::for_app("demo"), origin)
    }

    fn no_hidden() -> Arc<[String]> {
        Arc::from(Vec::new())
    }

    fn instance(name: &str, class: Arc<ModuleClass>) -> Module {
        Module::from_class(spec(name, SpecOrigin::Class), class, no_hidden())
    }

    fn no_names(q: &QualName) -> Result<Arc<dyn Namespace>> {
        Err(Error::not_found(q.as_str()))
    }

    #[test]
    fn class_attributes_visible() {
        let class = ModuleClass::builder("demo", "app", "Foo")
            .doc("docs")
            .attr("bar", 1)
            .build()
            .unwrap();
        let module = instance("demo.app.Foo", class);
        assert_eq!(module.name(), "Foo");
        assert_eq!(module.doc(), Some("docs"));
        assert_eq!(module.get("bar").unwrap(), json!(1));
        assert_eq!(module.get("__name__").unwrap(), json!("Foo"));
        assert_eq!(module.get("__package__").unwrap(), json!("demo.app"));
        assert_eq!(module.state(), ModuleState::New);
    }

    #[test]
    fn hook_runs_once_even_on_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let class = ModuleClass::builder("demo", "app", "Flaky")
            .on_exec(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Err("boom".into())
            })
            .build()
            .unwrap();
        let module = instance("demo.app.Flaky", class);
        let err = module.execute(no_names).unwrap_err();
        assert!(matches!(err, Error::ExecutionFailure { .. }));
        assert!(module.is_executed());
        module.execute(no_names).unwrap();
        module.execute(no_names).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn hook_sees_proxy_and_sets_attrs() {
        let class = ModuleClass::builder("demo", "app", "Proxied")
            .target(Target::map([("a", 1)]))
            .on_exec(|m| {
                let a = m.get("a")?;
                m.set("double", a.as_i64().unwrap_or_default() * 2);
                Ok(())
            })
            .build()
            .unwrap();
        let module = instance("demo.app.Proxied", class);
        module.execute(no_names).unwrap();
        assert_eq!(module.get("double").unwrap(), json!(2));
        assert_eq!(module.get("a").unwrap(), json!(1));
        assert!(module.contains("a"));
    }

    #[test]
    fn miss_names_class() {
        let class = ModuleClass::builder("demo", "app", "Foo").build().unwrap();
        let module = instance("demo.app.Foo", class);
        match module.get("nope") {
            Err(Error::AttributeMiss { owner, key }) => {
                assert_eq!(owner, "Foo");
                assert_eq!(key, "nope");
            }
            other => panic!("expected AttributeMiss, got {other:?}"),
        }
    }

    #[test]
    fn dir_merges_and_hides() {
        let class = ModuleClass::builder("demo", "app", "Foo")
            .attr("own", 1)
            .attr("secret", 2)
            .target(Target::map([("from_map", 3)]))
            .build()
            .unwrap();
        let hidden: Arc<[String]> = Arc::from(vec!["secret".to_string()]);
        let module = Module::from_class(spec("demo.app.Foo", SpecOrigin::Class), class, hidden);
        assert_eq!(module.dir(), vec!["own".to_string()]);
        module.execute(no_names).unwrap();
        assert_eq!(module.dir(), vec!["from_map".to_string(), "own".to_string()]);
    }

    #[test]
    fn panicking_fallback_does_not_poison_later_lookups() {
        let class = ModuleClass::builder("demo", "app", "Touchy")
            .target(Target::fallback(|k| {
                if k == "boom" {
                    panic!("fallback exploded");
                }
                Some(json!(k))
            }))
            .build()
            .unwrap();
        let module = instance("demo.app.Touchy", class);
        module.execute(no_names).unwrap();

        let blew_up = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            Namespace::lookup(&module, "boom")
        }));
        assert!(blew_up.is_err());
        assert_eq!(Namespace::lookup(&module, "fine"), Some(json!("fine")));
    }

    #[test]
    fn package_is_empty_container() {
        let module = Module::package(spec("demo.app", SpecOrigin::Package), no_hidden());
        assert!(module.is_package());
        assert!(module.dir().is_empty());
        assert_eq!(module.get("__package__").unwrap(), json!("demo.app"));
        module.execute(no_names).unwrap();
        assert!(module.is_executed());
    }
}
