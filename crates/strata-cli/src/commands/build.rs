//! `strata build`: run the Bootstrap, Primary and Main stages

use crate::commands::init::current_exe;
use crate::errors::CliError;
use crate::logger;
use crate::GlobalOpts;
use clap::Args;
use std::path::PathBuf;
use strata_bootstrap::{bindings, NinjaEngine, Orchestrator, RunReport};
use strata_config::{Config, Layout};

#[derive(Args, Debug, Clone, Default)]
pub struct BuildCommand {
    /// Build directory created by `strata init`
    #[arg(short = 'C', long = "dir", default_value = ".")]
    pub build_dir: PathBuf,

    /// Parallel jobs for the Main stage
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Keep going until N jobs fail in the Main stage
    #[arg(short, long)]
    pub keep_going: Option<usize>,

    /// Targets to build in the Main stage (default: the manifest's defaults)
    pub targets: Vec<String>,
}

impl BuildCommand {
    fn main_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(jobs) = self.jobs {
            args.push(format!("-j{}", jobs));
        }
        if let Some(keep_going) = self.keep_going {
            args.push(format!("-k{}", keep_going));
        }
        args.extend(self.targets.iter().cloned());
        args
    }
}

pub fn handle_build(cmd: BuildCommand, _opts: GlobalOpts) -> Result<RunReport, CliError> {
    let config_path = Config::path(&cmd.build_dir);
    if !config_path.exists() {
        return Err(CliError::NotInitialized(cmd.build_dir));
    }
    let config = Config::load(&cmd.build_dir)?;
    let bindings = bindings::from_config(&config, &current_exe()?)?;
    let engine = NinjaEngine::new(config.ninja_path()?).with_main_args(cmd.main_args());

    let mut orchestrator = Orchestrator::new(
        Layout::new(&cmd.build_dir),
        config.bootstrap_manifest_path()?,
        &config_path,
        bindings,
        engine,
    );

    logger::step(&format!("Building in {}", cmd.build_dir.display()));
    let result = orchestrator.run_observed(|stage| {
        logger::set_current_stage(Some(stage.to_string()));
        logger::step(&format!("Running {} stage", stage));
    });
    logger::set_current_stage(None);
    let report = result?;

    if report.template_outdated {
        logger::warn(&format!(
            "{} differs from the regenerated template at {}",
            config.bootstrap_manifest_path()?.display(),
            Layout::new(&cmd.build_dir).template_candidate().display()
        ));
    }
    for stage in &report.stages {
        logger::debug(&format!(
            "{} stage took {:.2?}",
            stage.stage, stage.duration
        ));
    }
    let total: std::time::Duration = report.stages.iter().map(|s| s.duration).sum();
    logger::success(&format!(
        "Build finished in {:.2?} ({} restart{})",
        total,
        report.restarts,
        if report.restarts == 1 { "" } else { "s" }
    ));
    Ok(report)
}
