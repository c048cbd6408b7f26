use std::fmt;
use std::io;
use std::path::PathBuf;
use strata_manifest::ManifestError;
use thiserror::Error;

/// Where a declaration came from
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Location {
    pub file: PathBuf,
    /// 1-based line of the declaration's `[[type]]` header, when known
    pub line: Option<usize>,
}

impl Location {
    pub fn new(file: impl Into<PathBuf>, line: Option<usize>) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}", self.file.display(), line),
            None => write!(f, "{}", self.file.display()),
        }
    }
}

/// Errors raised while registering, loading, validating or emitting the module graph
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Module type '{0}' is already registered")]
    DuplicateModuleType(String),

    #[error("Singleton '{0}' is already registered")]
    DuplicateSingleton(String),

    #[error("{location}: module '{name}' is already defined at {previous}")]
    DuplicateModule {
        name: String,
        location: Location,
        previous: Location,
    },

    #[error("{location}: unrecognized module type '{type_name}'")]
    UnknownModuleType { type_name: String, location: Location },

    #[error("{location}: module '{module}' depends on undefined module '{dependency}'")]
    UnknownDependency {
        module: String,
        dependency: String,
        location: Location,
    },

    #[error("{location}: module '{module}' cannot pick a variant of '{dependency}' ({candidates} candidates)")]
    AmbiguousDependency {
        module: String,
        dependency: String,
        candidates: usize,
        location: Location,
    },

    #[error("Multiple primary builders: {}", .modules.join(", "))]
    MultiplePrimaryBuilders { modules: Vec<String> },

    #[error("No module is marked primary_builder = true")]
    NoPrimaryBuilder,

    #[error("Dependency cycle: {path}")]
    DependencyCycle {
        /// Every module of the cycle, sorted
        members: Vec<String>,
        /// One walk around the cycle, e.g. `a -> b -> a`
        path: String,
    },

    #[error("{location}: module '{module}' redefines rule '{rule}' with different contents")]
    ConflictingRule {
        module: String,
        rule: String,
        location: Location,
    },

    #[error("{location}: module '{module}': property '{property}' {reason}")]
    InvalidProperty {
        module: String,
        property: String,
        reason: String,
        location: Location,
    },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{location}: module '{module}': {message}")]
    Module {
        module: String,
        message: String,
        location: Location,
    },

    #[error("Singleton '{name}': {message}")]
    Singleton { name: String, message: String },

    #[error("Invalid manifest: {0}")]
    Manifest(#[from] ManifestError),
}

impl GraphError {
    /// The declaration an error points at, if any
    pub fn location(&self) -> Option<&Location> {
        match self {
            GraphError::DuplicateModule { location, .. }
            | GraphError::UnknownModuleType { location, .. }
            | GraphError::UnknownDependency { location, .. }
            | GraphError::AmbiguousDependency { location, .. }
            | GraphError::ConflictingRule { location, .. }
            | GraphError::InvalidProperty { location, .. }
            | GraphError::Module { location, .. } => Some(location),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_display() {
        let with_line = Location::new("src/Blueprints.toml", Some(12));
        let without_line = Location::new("src/Blueprints.toml", None);
        assert_eq!(with_line.to_string(), "src/Blueprints.toml:12");
        assert_eq!(without_line.to_string(), "src/Blueprints.toml");
    }

    #[test]
    fn test_multiple_primary_builders_lists_modules() {
        let err = GraphError::MultiplePrimaryBuilders {
            modules: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(err.to_string(), "Multiple primary builders: a, b");
        assert!(err.location().is_none());
    }
}
