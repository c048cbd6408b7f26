//! Stage orchestrator
//!
//! Every run walks Bootstrap -> Primary -> Main. Nothing about earlier runs
//! is persisted: whether a manifest is stale is derived from file times on
//! each run, and the first two stages do nothing when nothing changed.
//!
//! The Bootstrap stage also regenerates its own template. When the
//! regenerated template differs from the one the stage ran from, the stage
//! is restarted once from the new template; a second difference means the
//! bootstrap logic does not converge.

use crate::engine::{EngineError, GraphEngine};
use crate::stage::Stage;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use strata_config::Layout;
use strata_manifest::{
    detect, first_difference, read_depfile, substitute, write_atomic, Bindings, Drift,
    ManifestError, TemplateError,
};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Times the Bootstrap stage may restart after its template changed
pub const MAX_BOOTSTRAP_RESTARTS: usize = 1;

#[derive(Error, Debug)]
pub enum StageError {
    #[error("{stage} stage: template still changing after {restarts} restart(s) (first difference at line {line})")]
    BootstrapConvergence {
        stage: Stage,
        restarts: usize,
        line: usize,
    },

    #[error("{stage} stage: {source}")]
    StageExecution {
        stage: Stage,
        #[source]
        source: EngineError,
    },

    #[error("{stage} stage: {} is stale: {reason}", .manifest.display())]
    StaleManifest {
        stage: Stage,
        manifest: PathBuf,
        reason: String,
    },

    #[error("{stage} stage: {source}")]
    Template {
        stage: Stage,
        #[source]
        source: TemplateError,
    },

    #[error("{stage} stage: {source}")]
    Manifest {
        stage: Stage,
        #[source]
        source: ManifestError,
    },

    #[error("{stage} stage: {}: {source}", .path.display())]
    Io {
        stage: Stage,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StageError {
    pub fn stage(&self) -> Stage {
        match self {
            StageError::BootstrapConvergence { stage, .. }
            | StageError::StageExecution { stage, .. }
            | StageError::StaleManifest { stage, .. }
            | StageError::Template { stage, .. }
            | StageError::Manifest { stage, .. }
            | StageError::Io { stage, .. } => *stage,
        }
    }
}

/// How long one stage took
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageReport {
    pub stage: Stage,
    pub duration: Duration,
}

/// Summary of one pipeline run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub stages: Vec<StageReport>,
    pub restarts: usize,
    /// The Bootstrap manifest was rewritten from the template
    pub bootstrap_regenerated: bool,
    /// The converged template differs from the one in the source tree
    pub template_outdated: bool,
}

/// Drives the three stages of one build directory
pub struct Orchestrator<E> {
    layout: Layout,
    source_template: PathBuf,
    config_file: PathBuf,
    bindings: Bindings,
    engine: E,
}

impl<E: GraphEngine> Orchestrator<E> {
    pub fn new(
        layout: Layout,
        source_template: impl Into<PathBuf>,
        config_file: impl Into<PathBuf>,
        bindings: Bindings,
        engine: E,
    ) -> Self {
        Self {
            layout,
            source_template: source_template.into(),
            config_file: config_file.into(),
            bindings,
            engine,
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Run every stage in order; terminal success is the Main stage executing
    pub fn run(&mut self) -> Result<RunReport, StageError> {
        self.run_observed(|_| {})
    }

    /// Like [`run`](Self::run), calling `on_stage` as each stage starts
    pub fn run_observed<F: FnMut(Stage)>(&mut self, mut on_stage: F) -> Result<RunReport, StageError> {
        let mut report = RunReport::default();

        on_stage(Stage::Bootstrap);
        let started = Instant::now();
        self.run_bootstrap(&mut report)?;
        report.stages.push(StageReport {
            stage: Stage::Bootstrap,
            duration: started.elapsed(),
        });

        for stage in [Stage::Primary, Stage::Main] {
            on_stage(stage);
            let started = Instant::now();
            self.run_generated(stage)?;
            report.stages.push(StageReport {
                stage,
                duration: started.elapsed(),
            });
        }
        Ok(report)
    }

    /// Bring the template copy and the Bootstrap manifest up to date.
    ///
    /// Returns true when the manifest was rewritten. `force` rewrites it even
    /// when it looks fresh.
    pub fn prepare_bootstrap(&self, force: bool) -> Result<bool, StageError> {
        self.refresh_template_copy()?;
        let candidate = self.layout.template_candidate();
        let manifest = self.layout.bootstrap_manifest();
        let inputs = [candidate.clone(), self.config_file.clone()];
        if !force && !needs_regeneration(&manifest, &inputs)? {
            debug!("{} is up to date", manifest.display());
            return Ok(false);
        }

        let template = read(Stage::Bootstrap, &candidate)?;
        self.write_bootstrap_manifest(&template)?;
        Ok(true)
    }

    fn run_bootstrap(&mut self, report: &mut RunReport) -> Result<(), StageError> {
        let stage = Stage::Bootstrap;
        let candidate = self.layout.template_candidate();
        let manifest = self.layout.bootstrap_manifest();

        let mut force = false;
        loop {
            if self.prepare_bootstrap(force)? {
                report.bootstrap_regenerated = true;
            }
            let snapshot = read(stage, &candidate)?;

            info!("Running {} stage", stage);
            self.engine
                .execute(stage, &manifest, self.layout.build_dir())
                .map_err(|source| StageError::StageExecution { stage, source })?;

            let regenerated = read(stage, &candidate)?;
            match detect(&regenerated, &snapshot) {
                Drift::Unchanged => break,
                Drift::Changed if report.restarts < MAX_BOOTSTRAP_RESTARTS => {
                    report.restarts += 1;
                    warn!("Bootstrap template changed, restarting the {} stage", stage);
                    force = true;
                }
                Drift::Changed => {
                    return Err(StageError::BootstrapConvergence {
                        stage,
                        restarts: report.restarts,
                        line: first_difference(&regenerated, &snapshot).unwrap_or(1),
                    });
                }
            }
        }

        if let Ok(committed) = fs::read_to_string(&self.source_template) {
            let converged = read(stage, &candidate)?;
            if detect(&converged, &committed).is_changed() {
                report.template_outdated = true;
                warn!(
                    "{} is out of date; copy {} over it to update",
                    self.source_template.display(),
                    candidate.display()
                );
            }
        }
        Ok(())
    }

    fn run_generated(&mut self, stage: Stage) -> Result<(), StageError> {
        let manifest = stage.manifest_path(&self.layout);
        check_fresh(stage, &manifest)?;
        info!("Running {} stage", stage);
        self.engine
            .execute(stage, &manifest, self.layout.build_dir())
            .map_err(|source| StageError::StageExecution { stage, source })
    }

    /// Copy the source template into the build directory if it is newer
    fn refresh_template_copy(&self) -> Result<(), StageError> {
        let stage = Stage::Bootstrap;
        let candidate = self.layout.template_candidate();
        let source_time = mtime(stage, &self.source_template)?;
        let copy_time = mtime(stage, &candidate)?;

        let stale = match (source_time, copy_time) {
            (None, None) => {
                return Err(StageError::Io {
                    stage,
                    path: self.source_template.clone(),
                    source: io::Error::new(io::ErrorKind::NotFound, "bootstrap template not found"),
                })
            }
            (None, Some(_)) => false,
            (Some(_), None) => true,
            (Some(source), Some(copy)) => source > copy,
        };
        if stale {
            debug!(
                "Copying {} to {}",
                self.source_template.display(),
                candidate.display()
            );
            let template = read(stage, &self.source_template)?;
            write_atomic(&candidate, &template)
                .map_err(|source| StageError::Manifest { stage, source })?;
        }
        Ok(())
    }

    fn write_bootstrap_manifest(&self, template: &str) -> Result<(), StageError> {
        let stage = Stage::Bootstrap;
        let manifest = self.layout.bootstrap_manifest();
        let content = substitute(template, &self.bindings)
            .map_err(|source| StageError::Template { stage, source })?;
        write_atomic(&manifest, &content).map_err(|source| StageError::Manifest { stage, source })?;
        info!("Wrote {}", manifest.display());
        Ok(())
    }
}

fn read(stage: Stage, path: &Path) -> Result<String, StageError> {
    fs::read_to_string(path).map_err(|source| StageError::Io {
        stage,
        path: path.to_path_buf(),
        source,
    })
}

fn mtime(stage: Stage, path: &Path) -> Result<Option<SystemTime>, StageError> {
    match fs::metadata(path).and_then(|m| m.modified()) {
        Ok(time) => Ok(Some(time)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StageError::Io {
            stage,
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// A missing target, or any existing input newer than it, needs regeneration
fn needs_regeneration(target: &Path, inputs: &[PathBuf]) -> Result<bool, StageError> {
    let stage = Stage::Bootstrap;
    let Some(target_time) = mtime(stage, target)? else {
        return Ok(true);
    };
    for input in inputs {
        if mtime(stage, input)?.is_some_and(|t| t > target_time) {
            debug!("{} is newer than {}", input.display(), target.display());
            return Ok(true);
        }
    }
    Ok(false)
}

/// A generated manifest is fresh when it exists and no input listed in its
/// depfile changed after it was last generated.
///
/// Generators rewrite the depfile on every run but leave an unchanged
/// manifest alone, so the later of the two times is the generation time.
fn check_fresh(stage: Stage, manifest: &Path) -> Result<(), StageError> {
    let stale = |reason: String| StageError::StaleManifest {
        stage,
        manifest: manifest.to_path_buf(),
        reason,
    };
    let Some(manifest_time) = mtime(stage, manifest)? else {
        return Err(stale("it was never generated".to_string()));
    };

    let depfile = Layout::depfile_for(manifest);
    let Some(depfile_time) = mtime(stage, &depfile)? else {
        return Ok(());
    };
    let generated_at = manifest_time.max(depfile_time);
    let inputs = read_depfile(&depfile).map_err(|source| StageError::Manifest { stage, source })?;
    for input in inputs {
        match mtime(stage, &input)? {
            None => return Err(stale(format!("input {} no longer exists", input.display()))),
            Some(time) if time > generated_at => {
                return Err(stale(format!("{} changed after it was generated", input.display())))
            }
            Some(_) => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use strata_manifest::{format_depfile, write_if_changed, Placeholder};
    use tempfile::TempDir;

    const TEMPLATE: &str = "srcDir = @@SrcDir@@\nbuildDir = @@BuildDir@@\n";

    /// Stands in for ninja: each stage writes the next stage's manifest
    #[derive(Default)]
    struct FakeEngine {
        calls: Vec<Stage>,
        /// Candidate texts written by successive Bootstrap executions
        candidates: VecDeque<String>,
        description: PathBuf,
        skip_primary_manifest: bool,
        fail_on: Option<Stage>,
    }

    impl FakeEngine {
        fn generate(&self, manifest: &Path, inputs: &[PathBuf]) {
            assert!(write_if_changed(manifest, "# generated\n").is_ok());
            let depfile = Layout::depfile_for(manifest);
            let target = manifest.to_string_lossy();
            assert!(write_atomic(&depfile, &format_depfile(&target, inputs)).is_ok());
        }
    }

    impl GraphEngine for FakeEngine {
        fn execute(&mut self, stage: Stage, _manifest: &Path, build_dir: &Path) -> Result<(), EngineError> {
            self.calls.push(stage);
            if self.fail_on == Some(stage) {
                return Err(EngineError::Failed {
                    program: PathBuf::from("ninja"),
                    code: Some(1),
                });
            }
            let layout = Layout::new(build_dir);
            let inputs = vec![self.description.clone()];
            match stage {
                Stage::Bootstrap => {
                    if let Some(text) = self.candidates.pop_front() {
                        assert!(write_if_changed(&layout.template_candidate(), &text).is_ok());
                    }
                    if !self.skip_primary_manifest {
                        self.generate(&layout.primary_manifest(), &inputs);
                    }
                }
                Stage::Primary => self.generate(&layout.main_manifest(), &inputs),
                Stage::Main => {}
            }
            Ok(())
        }
    }

    struct Fixture {
        _temp_dir: TempDir,
        build_dir: PathBuf,
        source_template: PathBuf,
        description: PathBuf,
    }

    fn fixture(template: &str) -> Option<Fixture> {
        let temp_dir = TempDir::new().ok()?;
        let src_dir = temp_dir.path().join("src");
        let build_dir = temp_dir.path().join("out");
        fs::create_dir_all(&src_dir).ok()?;
        fs::create_dir_all(&build_dir).ok()?;
        let source_template = src_dir.join("build.ninja.in");
        let description = src_dir.join("Blueprints.toml");
        fs::write(&source_template, template).ok()?;
        fs::write(&description, "").ok()?;
        fs::write(build_dir.join("strata.toml"), "").ok()?;
        Some(Fixture {
            _temp_dir: temp_dir,
            build_dir,
            source_template,
            description,
        })
    }

    fn orchestrator(fixture: &Fixture, engine: FakeEngine) -> Orchestrator<FakeEngine> {
        let bindings = Bindings::new()
            .with(Placeholder::SrcDir, "/src")
            .with(Placeholder::BuildDir, "/out");
        Orchestrator::new(
            Layout::new(&fixture.build_dir),
            &fixture.source_template,
            fixture.build_dir.join("strata.toml"),
            bindings,
            FakeEngine {
                description: fixture.description.clone(),
                ..engine
            },
        )
    }

    fn stages(report: &RunReport) -> Vec<Stage> {
        report.stages.iter().map(|s| s.stage).collect()
    }

    #[test]
    fn test_first_run_executes_stages_in_order() {
        let Some(fixture) = fixture(TEMPLATE) else {
            return;
        };
        let mut orchestrator = orchestrator(&fixture, FakeEngine::default());
        let Ok(report) = orchestrator.run() else {
            panic!("pipeline failed");
        };
        assert_eq!(stages(&report), Stage::ALL.to_vec());
        assert_eq!(orchestrator.engine().calls, Stage::ALL.to_vec());
        assert_eq!(report.restarts, 0);
        assert!(report.bootstrap_regenerated);
        assert!(!report.template_outdated);

        let manifest = fs::read_to_string(orchestrator.layout().bootstrap_manifest());
        assert!(manifest.is_ok_and(|m| m == "srcDir = /src\nbuildDir = /out\n"));
    }

    #[test]
    fn test_second_run_regenerates_nothing() {
        let Some(fixture) = fixture(TEMPLATE) else {
            return;
        };
        let mut orchestrator = orchestrator(&fixture, FakeEngine::default());
        assert!(orchestrator.run().is_ok());
        let layout = orchestrator.layout();
        let manifests = [
            layout.bootstrap_manifest(),
            layout.primary_manifest(),
            layout.main_manifest(),
        ];
        let snapshot = |path: &Path| {
            let content = fs::read_to_string(path).ok()?;
            let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
            Some((content, modified))
        };
        let before: Vec<_> = manifests.iter().map(|m| snapshot(m)).collect();
        assert!(before.iter().all(Option::is_some));

        let Ok(report) = orchestrator.run() else {
            panic!("second run failed");
        };
        assert!(!report.bootstrap_regenerated);
        assert_eq!(report.restarts, 0);
        let after: Vec<_> = manifests.iter().map(|m| snapshot(m)).collect();
        assert_eq!(after, before);
    }

    #[test]
    fn test_template_drift_restarts_once() {
        let Some(fixture) = fixture(TEMPLATE) else {
            return;
        };
        let updated = "srcDir = @@SrcDir@@\n";
        let engine = FakeEngine {
            candidates: VecDeque::from([updated.to_string()]),
            ..Default::default()
        };
        let mut orchestrator = orchestrator(&fixture, engine);
        let Ok(report) = orchestrator.run() else {
            panic!("pipeline failed");
        };
        assert_eq!(report.restarts, 1);
        assert!(report.template_outdated);
        assert_eq!(
            orchestrator.engine().calls,
            vec![Stage::Bootstrap, Stage::Bootstrap, Stage::Primary, Stage::Main]
        );
        let manifest = fs::read_to_string(orchestrator.layout().bootstrap_manifest());
        assert!(manifest.is_ok_and(|m| m == "srcDir = /src\n"));
    }

    #[test]
    fn test_persistent_drift_fails() {
        let Some(fixture) = fixture(TEMPLATE) else {
            return;
        };
        let engine = FakeEngine {
            candidates: VecDeque::from(["a\n".to_string(), "b\n".to_string()]),
            ..Default::default()
        };
        let mut orchestrator = orchestrator(&fixture, engine);
        let result = orchestrator.run();
        assert!(matches!(
            result,
            Err(StageError::BootstrapConvergence { restarts: 1, line: 1, .. })
        ));
        assert_eq!(
            orchestrator.engine().calls,
            vec![Stage::Bootstrap, Stage::Bootstrap]
        );
    }

    #[test]
    fn test_bad_template_leaves_no_manifest() {
        let Some(fixture) = fixture("x = @@Nope@@\n") else {
            return;
        };
        let mut orchestrator = orchestrator(&fixture, FakeEngine::default());
        let result = orchestrator.run();
        assert!(matches!(
            result,
            Err(StageError::Template { stage: Stage::Bootstrap, .. })
        ));
        let manifest = orchestrator.layout().bootstrap_manifest();
        assert!(!manifest.exists());
        assert!(!manifest.with_extension("ninja.tmp").exists());
        assert!(orchestrator.engine().calls.is_empty());
    }

    #[test]
    fn test_missing_primary_manifest_is_stale() {
        let Some(fixture) = fixture(TEMPLATE) else {
            return;
        };
        let engine = FakeEngine {
            skip_primary_manifest: true,
            ..Default::default()
        };
        let mut orchestrator = orchestrator(&fixture, engine);
        let result = orchestrator.run();
        assert!(matches!(
            result,
            Err(StageError::StaleManifest { stage: Stage::Primary, .. })
        ));
        assert_eq!(orchestrator.engine().calls, vec![Stage::Bootstrap]);
    }

    #[test]
    fn test_deleted_input_makes_manifest_stale() {
        let Some(fixture) = fixture(TEMPLATE) else {
            return;
        };
        let mut orchestrator = orchestrator(&fixture, FakeEngine::default());
        assert!(orchestrator.run().is_ok());

        assert!(fs::remove_file(&fixture.description).is_ok());
        let main = orchestrator.layout().main_manifest();
        match check_fresh(Stage::Main, &main) {
            Err(err) => assert_eq!(err.stage(), Stage::Main),
            Ok(()) => panic!("manifest with a deleted input is fresh"),
        }
    }

    #[test]
    fn test_observer_sees_stages_as_they_start() {
        let Some(fixture) = fixture(TEMPLATE) else {
            return;
        };
        let engine = FakeEngine {
            fail_on: Some(Stage::Main),
            ..Default::default()
        };
        let mut orchestrator = orchestrator(&fixture, engine);
        let mut started = Vec::new();
        let result = orchestrator.run_observed(|stage| started.push(stage));
        assert!(result.is_err());
        assert_eq!(started, Stage::ALL.to_vec());
    }

    #[test]
    fn test_engine_failure_stops_pipeline() {
        let Some(fixture) = fixture(TEMPLATE) else {
            return;
        };
        let engine = FakeEngine {
            fail_on: Some(Stage::Primary),
            ..Default::default()
        };
        let mut orchestrator = orchestrator(&fixture, engine);
        let result = orchestrator.run();
        assert!(matches!(
            result,
            Err(StageError::StageExecution { stage: Stage::Primary, .. })
        ));
        assert_eq!(
            orchestrator.engine().calls,
            vec![Stage::Bootstrap, Stage::Primary]
        );
    }

    #[test]
    fn test_missing_source_template() {
        let Some(fixture) = fixture(TEMPLATE) else {
            return;
        };
        assert!(fs::remove_file(&fixture.source_template).is_ok());
        let orchestrator = orchestrator(&fixture, FakeEngine::default());
        assert!(matches!(
            orchestrator.prepare_bootstrap(false),
            Err(StageError::Io { stage: Stage::Bootstrap, .. })
        ));
    }
}
