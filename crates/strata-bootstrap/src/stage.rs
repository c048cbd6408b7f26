use std::fmt;
use std::path::PathBuf;
use strata_config::Layout;

/// One step of the bootstrap pipeline; each builds the next stage's manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Builds core binaries and regenerates the Primary manifest and the template
    Bootstrap,
    /// Builds the primary builder and runs it to produce the Main manifest
    Primary,
    /// The project's own build
    Main,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Bootstrap, Stage::Primary, Stage::Main];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Bootstrap => "bootstrap",
            Stage::Primary => "primary",
            Stage::Main => "main",
        }
    }

    /// The manifest this stage executes
    pub fn manifest_path(self, layout: &Layout) -> PathBuf {
        match self {
            Stage::Bootstrap => layout.bootstrap_manifest(),
            Stage::Primary => layout.primary_manifest(),
            Stage::Main => layout.main_manifest(),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
