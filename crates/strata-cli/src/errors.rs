//! Error types for the strata command line

use std::path::PathBuf;
use strata_bootstrap::StageError;
use strata_config::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error("{} is not a strata build directory (run `strata init` first)", .0.display())]
    NotInitialized(PathBuf),

    #[error("Bootstrap template {} not found", .0.display())]
    MissingTemplate(PathBuf),

    #[error("Unknown config key: {0}. Supported keys: {1}")]
    UnknownConfigKey(String, String),

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_initialized_display() {
        let err = CliError::NotInitialized(PathBuf::from("out"));
        assert_eq!(
            err.to_string(),
            "out is not a strata build directory (run `strata init` first)"
        );
    }
}
