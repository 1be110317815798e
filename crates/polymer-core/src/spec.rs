//! Module specs - the immutable descriptor a Finder hands to a Loader

use crate::name::QualName;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Identity of a Loader, derived from its construction arguments.
///
/// Two construction requests with the same key get the same Loader.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoaderKey(Arc<str>);

impl LoaderKey {
    pub fn for_app(appname: &str) -> Self {
        Self(Arc::from(appname))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LoaderKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "loader({})", self.0)
    }
}

/// Where a spec's module comes from.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecOrigin {
    /// A registered module class.
    Class,
    /// An appname or appspace root; loads as an empty container.
    Package,
}

impl std::fmt::Display for SpecOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Class => write!(f, "class"),
            Self::Package => write!(f, "package"),
        }
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ModuleSpec {
    name: QualName,
    loader: LoaderKey,
    origin: SpecOrigin,
}

impl ModuleSpec {
    pub fn new(name: QualName, loader: LoaderKey, origin: SpecOrigin) -> Self {
        Self {
            name,
            loader,
            origin,
        }
    }

    pub fn name(&self) -> &QualName {
        &self.name
    }

    pub fn loader(&self) -> &LoaderKey {
        &self.loader
    }

    pub fn origin(&self) -> SpecOrigin {
        self.origin
    }

    pub fn is_package(&self) -> bool {
        self.origin == SpecOrigin::Package
    }
}
