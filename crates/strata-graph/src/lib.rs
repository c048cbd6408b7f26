//! Strata module graph builder
//!
//! Turns a tree of declarative `Blueprints.toml` descriptions into a Ninja
//! manifest. The build logic is pluggable: callers register module types and
//! singletons on a [`Context`], and the context handles loading, variant
//! expansion, dependency wiring, validation and deterministic emission.

pub mod context;
pub mod description;
pub mod errors;
pub mod graph;
pub mod module;
pub mod properties;
pub mod variant;

pub use context::{Build, Context, GenerateConfig};
pub use errors::{GraphError, Location};
pub use module::{ModuleContext, ModuleInfo, ModuleType, Singleton, SingletonContext};
pub use properties::{Properties, PropertyError};
pub use variant::Variant;
