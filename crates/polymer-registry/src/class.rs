//! Module classes — the registered definitions that Loaders instantiate
//!
//! A class is defined once through `ModuleClassBuilder` and handed out as
//! `Arc<ModuleClass>`. The registry only keeps a weak reference, so the
//! caller's handle (or a live instance) is what keeps the definition around.

use crate::module::Module;
use crate::proxy::Target;
use crate::registry::AppRegistry;
use polymer_core::{validate_segment, Attrs, HookError, QualName, Result, Value};
use std::fmt;
use std::sync::Arc;

/// One-time execute hook, run by the Loader after the module's resolver is built.
pub type ExecHook = Arc<dyn Fn(&Module) -> std::result::Result<(), HookError> + Send + Sync>;

pub struct ModuleClass {
    appname: String,
    appspace: String,
    name: String,
    qualname: QualName,
    doc: Option<String>,
    attrs: Attrs,
    targets: Vec<Target>,
    hook: Option<ExecHook>,
}

impl ModuleClass {
    pub fn builder(
        appname: impl Into<String>,
        appspace: impl Into<String>,
        name: impl Into<String>,
    ) -> ModuleClassBuilder {
        ModuleClassBuilder {
            appname: appname.into(),
            appspace: appspace.into(),
            name: name.into(),
            doc: None,
            attrs: Attrs::new(),
            targets: Vec::new(),
            hook: None,
            registry: None,
        }
    }

    pub fn appname(&self) -> &str {
        &self.appname
    }

    pub fn appspace(&self) -> &str {
        &self.appspace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn qualname(&self) -> &QualName {
        &self.qualname
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    /// Class-level attributes, copied into every instance namespace.
    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn hook(&self) -> Option<&ExecHook> {
        self.hook.as_ref()
    }
}

impl fmt::Debug for ModuleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleClass")
            .field("qualname", &self.qualname)
            .field("attrs", &self.attrs.keys().collect::<Vec<_>>())
            .field("targets", &self.targets)
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

pub struct ModuleClassBuilder {
    appname: String,
    appspace: String,
    name: String,
    doc: Option<String>,
    attrs: Attrs,
    targets: Vec<Target>,
    hook: Option<ExecHook>,
    registry: Option<Arc<AppRegistry>>,
}

impl ModuleClassBuilder {
    /// Bind the builder to a registry so `register` can record the class.
    pub fn in_registry(mut self, registry: Arc<AppRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    pub fn target(mut self, target: impl Into<Target>) -> Self {
        self.targets.push(target.into());
        self
    }

    pub fn targets(mut self, targets: impl IntoIterator<Item = Target>) -> Self {
        self.targets.extend(targets);
        self
    }

    pub fn on_exec<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Module) -> std::result::Result<(), HookError> + Send + Sync + 'static,
    {
        self.hook = Some(Arc::new(hook));
        self
    }

    /// Build the class without registering it.
    pub fn build(self) -> Result<Arc<ModuleClass>> {
        validate_segment("appname", &self.appname)?;
        validate_segment("appspace", &self.appspace)?;
        validate_segment("module name", &self.name)?;
        let qualname = QualName::join(&self.appname, &self.appspace, &self.name);
        Ok(Arc::new(ModuleClass {
            appname: self.appname,
            appspace: self.appspace,
            name: self.name,
            qualname,
            doc: self.doc,
            attrs: self.attrs,
            targets: self.targets,
            hook: self.hook,
        }))
    }

    /// Build the class and record it in the bound registry.
    ///
    /// Keep the returned handle alive: the registry holds the class weakly.
    pub fn register(mut self) -> Result<Arc<ModuleClass>> {
        let registry = self.registry.take().ok_or_else(|| {
            polymer_core::Error::Internal(format!(
                "module class {} has no registry to register into",
                self.name
            ))
        })?;
        let class = self.build()?;
        registry.register(&class)?;
        Ok(class)
    }
}
