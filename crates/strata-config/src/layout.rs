//! Fixed file layout of a build directory
//!
//! ```text
//! <build_dir>/
//!   strata.toml
//!   .minibootstrap/build.ninja      Bootstrap stage manifest
//!   .minibootstrap/build.ninja.in   regenerated template candidate
//!   .minibootstrap/bin/             core binaries (minibp)
//!   .bootstrap/build.ninja          Primary stage manifest
//!   .bootstrap/bin/                 primary builder and tools
//!   .bootstrap/<module>/            per-module packages and objects
//!   build.ninja                     Main stage manifest
//! ```

use std::path::{Path, PathBuf};

pub const MINIBOOTSTRAP_DIR: &str = ".minibootstrap";
pub const BOOTSTRAP_DIR: &str = ".bootstrap";
pub const MANIFEST_NAME: &str = "build.ninja";
pub const TEMPLATE_NAME: &str = "build.ninja.in";
pub const DEPFILE_SUFFIX: &str = ".d";

/// Paths of every stage artifact inside one build directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    build_dir: PathBuf,
}

impl Layout {
    pub fn new(build_dir: impl Into<PathBuf>) -> Self {
        Self {
            build_dir: build_dir.into(),
        }
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    pub fn bootstrap_manifest(&self) -> PathBuf {
        self.build_dir.join(MINIBOOTSTRAP_DIR).join(MANIFEST_NAME)
    }

    pub fn template_candidate(&self) -> PathBuf {
        self.build_dir.join(MINIBOOTSTRAP_DIR).join(TEMPLATE_NAME)
    }

    pub fn primary_manifest(&self) -> PathBuf {
        self.build_dir.join(BOOTSTRAP_DIR).join(MANIFEST_NAME)
    }

    pub fn main_manifest(&self) -> PathBuf {
        self.build_dir.join(MANIFEST_NAME)
    }

    /// Depfile written next to a generated manifest
    pub fn depfile_for(manifest: &Path) -> PathBuf {
        let mut name = manifest.as_os_str().to_owned();
        name.push(DEPFILE_SUFFIX);
        PathBuf::from(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_manifest_paths() {
        let layout = Layout::new("/out");
        assert_eq!(
            layout.bootstrap_manifest(),
            Path::new("/out/.minibootstrap/build.ninja")
        );
        assert_eq!(
            layout.template_candidate(),
            Path::new("/out/.minibootstrap/build.ninja.in")
        );
        assert_eq!(
            layout.primary_manifest(),
            Path::new("/out/.bootstrap/build.ninja")
        );
        assert_eq!(layout.main_manifest(), Path::new("/out/build.ninja"));
    }

    #[test]
    fn test_depfile_for() {
        assert_eq!(
            Layout::depfile_for(Path::new("/out/.bootstrap/build.ninja")),
            Path::new("/out/.bootstrap/build.ninja.d")
        );
    }
}
