//! `strata init`: configure a build directory and write its Bootstrap manifest

use crate::errors::CliError;
use crate::logger;
use crate::GlobalOpts;
use clap::Args;
use std::fs;
use std::path::{Path, PathBuf};
use strata_bootstrap::{bindings, NinjaEngine, Orchestrator};
use strata_config::{Config, Layout};

#[derive(Args, Debug, Clone, Default)]
pub struct InitCommand {
    /// Build directory to initialize
    #[arg(default_value = ".")]
    pub build_dir: PathBuf,

    /// Source directory holding Blueprints.toml and build.ninja.in
    #[arg(short, long)]
    pub src_dir: Option<PathBuf>,

    /// Root description, relative to the source directory
    #[arg(long)]
    pub blueprints: Option<String>,

    /// Committed bootstrap template, relative to the source directory
    #[arg(long)]
    pub bootstrap_manifest: Option<String>,

    /// Go toolchain root (default: GOROOT or the `go` on PATH)
    #[arg(long)]
    pub go_root: Option<String>,

    /// Go compiler (default: <go-root>/pkg/tool/<os>_<arch>/compile)
    #[arg(long)]
    pub go_compile: Option<String>,

    /// Go linker (default: <go-root>/pkg/tool/<os>_<arch>/link)
    #[arg(long)]
    pub go_link: Option<String>,

    /// Ninja executable (default: `ninja` on PATH)
    #[arg(long)]
    pub ninja: Option<String>,
}

pub fn handle_init(cmd: InitCommand, _opts: GlobalOpts) -> Result<(), CliError> {
    fs::create_dir_all(&cmd.build_dir).map_err(|source| CliError::Io {
        path: cmd.build_dir.clone(),
        source,
    })?;
    let build_dir = canonical(&cmd.build_dir)?;
    let src_dir = canonical(cmd.src_dir.as_deref().unwrap_or_else(|| Path::new(".")))?;

    let config_path = Config::path(&build_dir);
    let mut config = Config::load_from_path(&config_path)?;
    config.src_dir = Some(src_dir.to_string_lossy().into_owned());
    config.build_dir = Some(build_dir.to_string_lossy().into_owned());
    let overrides = [
        ("blueprints", cmd.blueprints),
        ("bootstrap-manifest", cmd.bootstrap_manifest),
        ("go-root", cmd.go_root),
        ("go-compile", cmd.go_compile),
        ("go-link", cmd.go_link),
        ("ninja", cmd.ninja),
    ];
    for (key, value) in overrides
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
    {
        config.set(key, value);
    }

    let template = config.bootstrap_manifest_path()?;
    if !template.exists() {
        return Err(CliError::MissingTemplate(template));
    }
    let bootstrap = current_exe()?;
    let bindings = bindings::from_config(&config, &bootstrap)?;
    config.save_to_path(&config_path)?;
    logger::debug(&format!("Wrote {}", config_path.display()));

    let engine = NinjaEngine::new(config.ninja.as_deref().unwrap_or("ninja"));
    let orchestrator = Orchestrator::new(
        Layout::new(&build_dir),
        &template,
        &config_path,
        bindings,
        engine,
    );
    logger::spinner_start("Writing bootstrap manifest");
    if let Err(e) = orchestrator.prepare_bootstrap(true) {
        logger::spinner_error("Bootstrap manifest not written");
        return Err(e.into());
    }
    logger::spinner_success(&format!(
        "Initialized {} (run `strata build` there)",
        build_dir.display()
    ));
    Ok(())
}

pub(crate) fn current_exe() -> Result<PathBuf, CliError> {
    std::env::current_exe().map_err(|source| CliError::Io {
        path: PathBuf::from("strata"),
        source,
    })
}

fn canonical(path: &Path) -> Result<PathBuf, CliError> {
    fs::canonicalize(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}
