//! Polymer Registry — module classes, module instances and chained resolvers
//!
//! Classes are defined with `ModuleClass::builder(..)` and recorded in an
//! `AppRegistry`. Loaders turn them into `Module` instances; executing a
//! module assembles its `ChainedResolver` from the declared targets.

pub mod class;
pub mod module;
pub mod proxy;
pub mod registry;

pub use class::{ExecHook, ModuleClass, ModuleClassBuilder};
pub use module::{Module, ModuleState};
pub use proxy::{
    same_source, ChainedResolver, ChainedResolverBuilder, Fallback, Namespace, Target,
    HOUSEKEEPING,
};
pub use registry::{AppRegistry, InvalidationHook};
