//! Polymer Loader — spec cache, Finder/Loader pairs and per-app orchestration
//!
//! Resolution runs in three explicit steps:
//! `Finder::find_spec` → `Loader::create_module` → `Loader::exec_module`.
//! `ResolverChain::import` drives all three across every installed Finder.

pub mod cache;
pub mod chain;
pub mod finder;
pub mod index;
pub mod loader;
pub mod scope;

pub use cache::{CacheStats, SpecCache};
pub use chain::ResolverChain;
pub use finder::Finder;
pub use index::{Initialized, ModuleType, PolymerIndex};
pub use loader::{Loader, LoaderPool};
pub use scope::AppScope;
