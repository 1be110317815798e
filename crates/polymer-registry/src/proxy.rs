//! Chained resolver — one read-through namespace over ordered sources
//!
//! Lookup searches every backing source in declaration order, then every
//! fallback in declaration order, then gives up with `AttributeMiss`.
//! Composing a resolver from another resolver splices the inner lists into
//! the outer ones, so the search order stays flat and deterministic.

use polymer_core::{Attrs, Error, QualName, Result, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Names that never show up when a namespace is enumerated.
pub const HOUSEKEEPING: &[&str] = &[
    "__all__",
    "__builtins__",
    "__doc__",
    "__name__",
    "__package__",
    "__qualname__",
    "__spec__",
    "targets",
];

/// Anything that can answer attribute lookups and list its members.
pub trait Namespace: Send + Sync {
    fn lookup(&self, key: &str) -> Option<Value>;

    /// Names this namespace exports for enumeration.
    fn members(&self) -> Vec<String>;

    /// For a namespace that fronts other sources: its own attributes and the
    /// resolver behind them. A parent resolver splices these instead of
    /// nesting the whole namespace.
    fn layers(&self) -> Option<(Arc<dyn Namespace>, &ChainedResolver)> {
        None
    }
}

impl Namespace for Attrs {
    fn lookup(&self, key: &str) -> Option<Value> {
        self.get(key).cloned()
    }

    fn members(&self) -> Vec<String> {
        self.keys().cloned().collect()
    }
}

/// Last-resort lookup, consulted only after every source missed.
/// Returning `None` passes the key on to the next fallback.
#[derive(Clone)]
pub struct Fallback(Arc<dyn Fn(&str) -> Option<Value> + Send + Sync>);

impl Fallback {
    pub fn new(f: impl Fn(&str) -> Option<Value> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn call(&self, key: &str) -> Option<Value> {
        (self.0)(key)
    }

    pub fn ptr_eq(&self, other: &Fallback) -> bool {
        Arc::as_ptr(&self.0) as *const () == Arc::as_ptr(&other.0) as *const ()
    }
}

impl fmt::Debug for Fallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fallback({:p})", Arc::as_ptr(&self.0) as *const ())
    }
}

/// Identity comparison for shared namespaces.
pub fn same_source(a: &Arc<dyn Namespace>, b: &Arc<dyn Namespace>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

/// One entry of a declared `targets` list.
#[derive(Clone)]
pub enum Target {
    /// A backing map or module.
    Source(Arc<dyn Namespace>),
    /// Another resolver; its lists are spliced in, never nested.
    Proxy(Arc<ChainedResolver>),
    /// A module resolved by qualified name when the resolver is built.
    Named(QualName),
    Fallback(Fallback),
}

impl Target {
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let attrs: Attrs = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::Source(Arc::new(attrs))
    }

    pub fn source(source: Arc<dyn Namespace>) -> Self {
        Self::Source(source)
    }

    pub fn named(qualname: impl Into<QualName>) -> Self {
        Self::Named(qualname.into())
    }

    pub fn fallback(f: impl Fn(&str) -> Option<Value> + Send + Sync + 'static) -> Self {
        Self::Fallback(Fallback::new(f))
    }
}

impl From<Arc<ChainedResolver>> for Target {
    fn from(proxy: Arc<ChainedResolver>) -> Self {
        Self::Proxy(proxy)
    }
}

impl From<Fallback> for Target {
    fn from(f: Fallback) -> Self {
        Self::Fallback(f)
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source(s) => write!(f, "Source({:p})", Arc::as_ptr(s) as *const ()),
            Self::Proxy(p) => write!(f, "Proxy({})", p.owner()),
            Self::Named(q) => write!(f, "Named({q})"),
            Self::Fallback(fb) => write!(f, "{fb:?}"),
        }
    }
}

pub struct ChainedResolver {
    owner: String,
    sources: Vec<Arc<dyn Namespace>>,
    /// Member lists, parallel to `sources`, captured at build time.
    members: Vec<Arc<[String]>>,
    fallbacks: Vec<Fallback>,
}

impl ChainedResolver {
    pub fn builder(owner: impl Into<String>) -> ChainedResolverBuilder {
        ChainedResolverBuilder {
            owner: owner.into(),
            staged: Vec::new(),
        }
    }

    /// Name of the type that owns this resolver, used in miss errors.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn sources(&self) -> &[Arc<dyn Namespace>] {
        &self.sources
    }

    pub fn fallbacks(&self) -> &[Fallback] {
        &self.fallbacks
    }

    pub fn get(&self, key: &str) -> Result<Value> {
        if let Some(value) = self.sources.iter().find_map(|s| s.lookup(key)) {
            return Ok(value);
        }
        self.fallbacks
            .iter()
            .find_map(|f| f.call(key))
            .ok_or_else(|| Error::attribute_miss(&self.owner, key))
    }

    /// True when some source holds `key`. Fallbacks are not consulted.
    pub fn contains(&self, key: &str) -> bool {
        self.sources.iter().any(|s| s.lookup(key).is_some())
    }

    /// Union of every member list, minus housekeeping names, sorted.
    pub fn members(&self) -> Vec<String> {
        self.members
            .iter()
            .flat_map(|list| list.iter())
            .filter(|name| !HOUSEKEEPING.contains(&name.as_str()))
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn push_source(&mut self, source: Arc<dyn Namespace>, members: Arc<[String]>) {
        if self.sources.iter().any(|s| same_source(s, &source)) {
            return;
        }
        self.sources.push(source);
        self.members.push(members);
    }

    /// Add a backing namespace, flattening it if it fronts a resolver.
    fn push_namespace(&mut self, source: Arc<dyn Namespace>) {
        if let Some((own, inner)) = source.layers() {
            let members: Arc<[String]> = own.members().into();
            self.push_source(own, members);
            self.splice(inner);
            return;
        }
        let members: Arc<[String]> = source.members().into();
        self.push_source(source, members);
    }

    fn push_fallback(&mut self, fallback: Fallback) {
        if self.fallbacks.iter().any(|f| f.ptr_eq(&fallback)) {
            return;
        }
        self.fallbacks.push(fallback);
    }

    fn splice(&mut self, inner: &ChainedResolver) {
        for (source, members) in inner.sources.iter().zip(&inner.members) {
            self.push_source(source.clone(), members.clone());
        }
        for fallback in &inner.fallbacks {
            self.push_fallback(fallback.clone());
        }
    }
}

impl fmt::Debug for ChainedResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainedResolver")
            .field("owner", &self.owner)
            .field("sources", &self.sources.len())
            .field("fallbacks", &self.fallbacks.len())
            .finish()
    }
}

/// Staging area for a resolver. Consumed by `build`, so the staged target
/// list cannot be touched once the resolver exists.
pub struct ChainedResolverBuilder {
    owner: String,
    staged: Vec<Target>,
}

impl ChainedResolverBuilder {
    pub fn target(mut self, target: impl Into<Target>) -> Self {
        self.staged.push(target.into());
        self
    }

    pub fn targets(mut self, targets: impl IntoIterator<Item = Target>) -> Self {
        self.staged.extend(targets);
        self
    }

    /// Build without a name resolver; any `Named` target is a miss.
    pub fn build(self) -> Result<ChainedResolver> {
        self.build_with(|q| Err(Error::not_found(q.as_str())))
    }

    /// Build, resolving `Named` targets through `resolve`.
    pub fn build_with<R>(self, mut resolve: R) -> Result<ChainedResolver>
    where
        R: FnMut(&QualName) -> Result<Arc<dyn Namespace>>,
    {
        let mut resolver = ChainedResolver {
            owner: self.owner,
            sources: Vec::new(),
            members: Vec::new(),
            fallbacks: Vec::new(),
        };
        for target in self.staged {
            match target {
                Target::Source(source) => resolver.push_namespace(source),
                Target::Proxy(inner) => resolver.splice(&inner),
                Target::Named(qualname) => resolver.push_namespace(resolve(&qualname)?),
                Target::Fallback(fallback) => resolver.push_fallback(fallback),
            }
        }
        tracing::debug!(
            "Built resolver for {}: {} sources, {} fallbacks",
            resolver.owner,
            resolver.sources.len(),
            resolver.fallbacks.len()
        );
        Ok(resolver)
    }
}
