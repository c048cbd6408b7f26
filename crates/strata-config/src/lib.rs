//! Build directory configuration for strata
//!
//! A build directory is initialized once by `strata init`, which records the
//! source directory and the toolchain in `<build_dir>/strata.toml`. Every
//! later stage reads that file back to produce its placeholder bindings.
//!
//! This crate is shared by the bootstrap library and the CLI to avoid
//! circular dependencies.

pub mod config;
pub mod layout;
pub mod toolchain;

pub use config::{Config, ConfigError, CONFIG_ENV_VAR, CONFIG_FILE_NAME};
pub use layout::Layout;
pub use toolchain::Toolchain;
