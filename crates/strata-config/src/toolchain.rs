//! Go toolchain discovery
//!
//! The bootstrap template needs three toolchain values: the toolchain root,
//! the compiler and the linker. Explicit config values win; otherwise the
//! root comes from `GOROOT` or the location of `go` on PATH, and the tools
//! from `<root>/pkg/tool/<os>_<arch>/`.

use crate::config::{Config, ConfigError};
use std::path::{Path, PathBuf};

/// Resolved toolchain paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub go_root: PathBuf,
    pub go_compile: PathBuf,
    pub go_link: PathBuf,
}

impl Toolchain {
    pub fn resolve(config: &Config) -> Result<Self, ConfigError> {
        let go_root = match config.go_root.as_deref() {
            Some(root) => PathBuf::from(root),
            None => discover_go_root().ok_or(ConfigError::Missing("go-root"))?,
        };
        let tool_dir = tool_dir(&go_root);
        let go_compile = config
            .go_compile
            .as_deref()
            .map_or_else(|| tool_dir.join("compile"), PathBuf::from);
        let go_link = config
            .go_link
            .as_deref()
            .map_or_else(|| tool_dir.join("link"), PathBuf::from);

        Ok(Self {
            go_root,
            go_compile,
            go_link,
        })
    }
}

fn discover_go_root() -> Option<PathBuf> {
    if let Ok(root) = std::env::var("GOROOT") {
        let trimmed = root.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    // <root>/bin/go
    let go = which::which("go").ok()?;
    let go = go.canonicalize().unwrap_or(go);
    go.parent()?.parent().map(Path::to_path_buf)
}

fn tool_dir(go_root: &Path) -> PathBuf {
    go_root
        .join("pkg")
        .join("tool")
        .join(format!("{}_{}", go_os(), go_arch()))
}

fn go_os() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

fn go_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        other => other,
    }
}
