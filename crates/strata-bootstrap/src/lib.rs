//! Three-stage bootstrap for strata build directories
//!
//! A build directory is driven through three Ninja manifests, each one
//! producing the next:
//!
//! 1. Bootstrap: `.minibootstrap/build.ninja`, instantiated from the
//!    committed template. Builds `minibp` and regenerates both the template
//!    and the Primary manifest.
//! 2. Primary: `.bootstrap/build.ninja`. Builds the primary builder, which
//!    writes the Main manifest.
//! 3. Main: `build.ninja`, the project's actual build.
//!
//! [`Orchestrator`] runs the stages; [`generator`] holds the command-line
//! contract shared by `minibp` and custom primary builders.

pub mod bindings;
pub mod docs;
pub mod engine;
pub mod generator;
pub mod modules;
pub mod orchestrator;
pub mod stage;

#[cfg(test)]
mod testing;

pub use engine::{EngineError, GraphEngine, NinjaEngine};
pub use generator::{generate, main, minibp_context, run_minibp, GenerateOutcome, GeneratorArgs, GeneratorConfig};
pub use modules::register_builtins;
pub use orchestrator::{Orchestrator, RunReport, StageError, StageReport, MAX_BOOTSTRAP_RESTARTS};
pub use stage::Stage;
