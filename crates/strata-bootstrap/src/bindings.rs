//! Placeholder bindings for a configured build directory

use std::path::Path;
use strata_config::{Config, ConfigError, Toolchain};
use strata_manifest::{Bindings, Placeholder};

/// Bind every placeholder from the build directory's configuration.
///
/// `bootstrap` is the program that re-runs the bootstrap, normally the
/// running `strata` executable.
pub fn from_config(config: &Config, bootstrap: &Path) -> Result<Bindings, ConfigError> {
    let toolchain = Toolchain::resolve(config)?;
    Ok(Bindings::new()
        .with(Placeholder::SrcDir, display(&config.src_dir()?))
        .with(Placeholder::BuildDir, display(&config.build_dir()?))
        .with(Placeholder::GoRoot, display(&toolchain.go_root))
        .with(Placeholder::GoCompile, display(&toolchain.go_compile))
        .with(Placeholder::GoLink, display(&toolchain.go_link))
        .with(Placeholder::Bootstrap, display(bootstrap))
        .with(
            Placeholder::BootstrapManifest,
            display(&config.bootstrap_manifest_path()?),
        ))
}

fn display(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
