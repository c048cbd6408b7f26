use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while assembling or persisting a manifest
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Rule '{0}' is defined twice with different contents")]
    ConflictingRule(String),

    #[error("Build of '{output}' uses undefined rule '{rule}'")]
    UnknownRule { rule: String, output: String },

    #[error("Output '{0}' is produced by more than one build action")]
    DuplicateOutput(String),

    #[error("Build action for rule '{0}' has no outputs")]
    NoOutputs(String),

    #[error("Malformed depfile {path}: {reason}")]
    Depfile { path: PathBuf, reason: String },
}

/// Errors from substituting placeholders into a manifest template
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("No binding for placeholder {token} (line {line})")]
    MissingBinding { token: String, line: usize },

    #[error("Unknown placeholder {token} (line {line})")]
    UnknownToken { token: String, line: usize },

    #[error("Substituted manifest still contains {token} (line {line}); bound values must not form placeholders")]
    ResidualToken { token: String, line: usize },
}

#[cfg(test)]
mod tests {
    use crate::errors::*;

    #[test]
    fn test_template_error_display() {
        let err = TemplateError::MissingBinding {
            token: "@@GoRoot@@".to_string(),
            line: 3,
        };
        assert_eq!(err.to_string(), "No binding for placeholder @@GoRoot@@ (line 3)");
    }
}
