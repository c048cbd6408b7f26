//! Adapter for the external graph-execution engine

use crate::stage::Stage;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{program} exited with {}", .code.map_or_else(|| "a signal".to_string(), |c| format!("status {c}")))]
    Failed { program: PathBuf, code: Option<i32> },
}

/// Executes one stage manifest to completion
pub trait GraphEngine {
    fn execute(&mut self, stage: Stage, manifest: &Path, build_dir: &Path) -> Result<(), EngineError>;
}

/// Runs `ninja -C <build_dir> -f <manifest>`, inheriting the terminal
#[derive(Debug, Clone)]
pub struct NinjaEngine {
    program: PathBuf,
    /// Extra arguments for the Main stage, e.g. targets or `-j`
    main_args: Vec<String>,
}

impl NinjaEngine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            main_args: Vec::new(),
        }
    }

    pub fn with_main_args(mut self, args: Vec<String>) -> Self {
        self.main_args = args;
        self
    }

    fn command(&self, stage: Stage, manifest: &Path, build_dir: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command.arg("-C").arg(build_dir).arg("-f").arg(manifest);
        if stage == Stage::Main {
            command.args(&self.main_args);
        }
        command
    }
}

impl GraphEngine for NinjaEngine {
    fn execute(&mut self, stage: Stage, manifest: &Path, build_dir: &Path) -> Result<(), EngineError> {
        let mut command = self.command(stage, manifest, build_dir);
        debug!("Running {:?}", command);
        let status = command.status().map_err(|source| EngineError::Spawn {
            program: self.program.clone(),
            source,
        })?;
        if status.success() {
            Ok(())
        } else {
            Err(EngineError::Failed {
                program: self.program.clone(),
                code: status.code(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_args_only_for_main_stage() {
        let engine = NinjaEngine::new("ninja").with_main_args(vec!["-j4".to_string()]);
        let args = |stage| -> Vec<String> {
            engine
                .command(stage, Path::new("/out/build.ninja"), Path::new("/out"))
                .get_args()
                .map(|a| a.to_string_lossy().into_owned())
                .collect()
        };
        assert_eq!(args(Stage::Main), vec!["-C", "/out", "-f", "/out/build.ninja", "-j4"]);
        assert_eq!(args(Stage::Primary), vec!["-C", "/out", "-f", "/out/build.ninja"]);
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let mut engine = NinjaEngine::new("/nonexistent/strata-test-ninja");
        let result = engine.execute(Stage::Main, Path::new("build.ninja"), Path::new("."));
        assert!(matches!(result, Err(EngineError::Spawn { .. })));
    }
}
