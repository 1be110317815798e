//! Polymer — class-based module namespaces with an explicit import pipeline
//!
//! ```no_run
//! use serde_json::json;
//!
//! let (module_type, _finder, _loader) = polymer::initialize("demo")?;
//! let _foo = module_type.define("Foo").attr("bar", 1).register()?;
//! let foo = polymer::import("demo.app.Foo")?;
//! assert_eq!(foo.get("bar")?, json!(1));
//! # Ok::<(), polymer::Error>(())
//! ```

pub mod service;

pub use service::{global, import, initialize, initialize_in, unregister, Polymer};

pub use polymer_core::{
    Attrs, Error, HookError, LoaderKey, ModuleSpec, PolymerConfig, QualName, Result, SpecOrigin,
    Value,
};
pub use polymer_loader::{
    AppScope, CacheStats, Finder, Initialized, Loader, LoaderPool, ModuleType, PolymerIndex,
    ResolverChain, SpecCache,
};
pub use polymer_registry::{
    AppRegistry, ChainedResolver, ChainedResolverBuilder, Fallback, Module, ModuleClass,
    ModuleClassBuilder, ModuleState, Namespace, Target,
};
