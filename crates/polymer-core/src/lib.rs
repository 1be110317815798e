//! Polymer Core - names, specs, configuration and error handling

pub mod config;
pub mod error;
pub mod name;
pub mod spec;

pub use config::PolymerConfig;
pub use error::{Error, HookError, Result};
pub use name::{validate_segment, QualName};
pub use spec::{LoaderKey, ModuleSpec, SpecOrigin};

/// Attribute value stored in a module namespace.
pub use serde_json::Value;

/// A plain attribute map.
pub type Attrs = std::collections::BTreeMap<String, Value>;
