//! Manifest generators: `minibp` and custom primary builders
//!
//! Both share one command-line contract:
//!
//! ```text
//! <generator> [-b BUILD_DIR] [-o OUTPUT] [-d DEPFILE] [--docs DOCS] [--template] ROOT
//! ```
//!
//! `minibp` is a context holding only the built-in module types. With
//! `--template` it writes the bootstrap template, every value left as its
//! placeholder token; otherwise it writes the Primary manifest. A custom
//! primary builder registers its own module types and calls [`main`] to
//! write the Main manifest.

use crate::bindings;
use crate::docs;
use crate::modules::register_builtins;
use crate::stage::Stage;
use anyhow::Context as _;
use clap::Parser;
use std::path::{Path, PathBuf};
use strata_config::{Config, Layout};
use strata_graph::{Context, GenerateConfig};
use strata_manifest::{format_depfile, write_atomic, write_if_changed, Bindings};
use tracing::{debug, error, info};

/// First line of every generated manifest
pub const HEADER: &str = "Generated by strata. Do not edit.";

/// Configuration seen by module types during one generation
#[derive(Debug, Clone)]
pub struct GeneratorConfig<C = ()> {
    /// The stage whose manifest is being generated
    pub stage: Stage,
    /// Values of the manifest's global variables
    pub bindings: Bindings,
    /// Root description, relative to the source directory
    pub top_file: String,
    /// Configuration of the custom build logic
    pub custom: C,
}

impl<C> GeneratorConfig<C> {
    pub fn new(stage: Stage, bindings: Bindings, top_file: impl Into<String>, custom: C) -> Self {
        Self {
            stage,
            bindings,
            top_file: top_file.into(),
            custom,
        }
    }
}

/// Command-line contract shared by every generator
#[derive(Parser, Debug, Clone, Default, PartialEq, Eq)]
#[command(about = "Generate a Ninja manifest from a Blueprints.toml tree")]
pub struct GeneratorArgs {
    /// Root description file
    pub root: PathBuf,

    /// Manifest to write
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Build directory
    #[arg(short = 'b', long = "build-dir", default_value = ".")]
    pub build_dir: PathBuf,

    /// Makefile-style depfile listing every description read
    #[arg(short = 'd', long = "depfile")]
    pub depfile: Option<PathBuf>,

    /// Write module type documentation as JSON
    #[arg(long = "docs")]
    pub docs: Option<PathBuf>,

    /// Write the bootstrap template instead of a manifest
    #[arg(long = "template")]
    pub template: bool,
}

/// What a generator run wrote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateOutcome {
    pub output: PathBuf,
    /// False when the manifest already had this content
    pub written: bool,
    pub inputs: Vec<PathBuf>,
}

/// A context holding only the built-in bootstrap types
pub fn minibp_context() -> anyhow::Result<Context<GeneratorConfig>> {
    let mut ctx = Context::new();
    register_builtins(&mut ctx)?;
    Ok(ctx)
}

/// Run `minibp` with the given arguments
pub fn run_minibp(args: &GeneratorArgs, bootstrap: &Path) -> anyhow::Result<GenerateOutcome> {
    let ctx = minibp_context()?;
    let (stage, bindings) = if args.template {
        (Stage::Bootstrap, Bindings::placeholders())
    } else {
        (Stage::Primary, load_bindings(&args.build_dir, bootstrap)?)
    };
    let config = GeneratorConfig::new(stage, bindings, top_file(&args.root), ());
    generate(&ctx, args, &config)
}

/// Run a generator context and persist its results.
///
/// The manifest is only rewritten when its content changed; the depfile is
/// rewritten on every run and marks when the manifest was last generated.
pub fn generate<C: Sync>(
    ctx: &Context<GeneratorConfig<C>>,
    args: &GeneratorArgs,
    config: &GeneratorConfig<C>,
) -> anyhow::Result<GenerateOutcome> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output(&args.build_dir, config.stage));
    let options = GenerateConfig {
        require_primary_builder: config.stage == Stage::Primary,
        header: vec![HEADER.to_string()],
    };

    debug!("Generating {} for stage {}", output.display(), config.stage);
    let build = ctx
        .build(&args.root, &options, config)
        .with_context(|| format!("failed to generate {}", output.display()))?;

    let written = write_if_changed(&output, &build.manifest.to_ninja())?;
    if written {
        info!("Wrote {}", output.display());
    } else {
        debug!("{} unchanged", output.display());
    }

    let depfile = args
        .depfile
        .clone()
        .unwrap_or_else(|| Layout::depfile_for(&output));
    let target = output.to_string_lossy();
    write_atomic(&depfile, &format_depfile(&target, &build.files))?;

    if let Some(ref docs_path) = args.docs {
        docs::write(docs_path, ctx, &build.modules)?;
    }

    Ok(GenerateOutcome {
        output,
        written,
        inputs: build.files,
    })
}

/// Entry point for custom primary builders: parse the process arguments,
/// register the built-ins, write the Main manifest and exit.
pub fn main<C: Send + Sync>(mut ctx: Context<GeneratorConfig<C>>, custom: C) -> ! {
    let args = GeneratorArgs::parse();
    let result = register_builtins(&mut ctx)
        .map_err(anyhow::Error::from)
        .and_then(|()| {
            let bootstrap = std::env::current_exe().context("cannot locate own executable")?;
            let bindings = load_bindings(&args.build_dir, &bootstrap)?;
            let config = GeneratorConfig::new(Stage::Main, bindings, top_file(&args.root), custom);
            generate(&ctx, &args, &config)
        });

    match result {
        Ok(_) => std::process::exit(0),
        Err(err) => {
            error!("{:#}", err);
            eprintln!("error: {:#}", err);
            std::process::exit(1)
        }
    }
}

fn load_bindings(build_dir: &Path, bootstrap: &Path) -> anyhow::Result<Bindings> {
    let config = Config::load(build_dir)?;
    Ok(bindings::from_config(&config, bootstrap)?)
}

fn top_file(root: &Path) -> String {
    root.file_name()
        .map_or_else(|| "Blueprints.toml".to_string(), |n| n.to_string_lossy().into_owned())
}

fn default_output(build_dir: &Path, stage: Stage) -> PathBuf {
    let layout = Layout::new(build_dir);
    match stage {
        Stage::Bootstrap => layout.template_candidate(),
        stage => stage.manifest_path(&layout),
    }
}
