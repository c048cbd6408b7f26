//! Persisting generated manifests
//!
//! Generated files are always written through a temp file and a rename so a
//! failed or interrupted generator never leaves a truncated manifest behind.
//! `write_if_changed` additionally leaves an identical file untouched, which
//! keeps its mtime stable and lets the next run see nothing to do.

use crate::errors::ManifestError;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Write `content` to `path` atomically
pub fn write_atomic(path: &Path, content: &str) -> Result<(), ManifestError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);
    {
        let file = fs::File::create(&temp_path)?;
        let mut writer = std::io::BufWriter::with_capacity(64 * 1024, file);
        writer.write_all(content.as_bytes())?;
        writer.flush()?;
    }

    if let Err(err) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(err.into());
    }
    Ok(())
}

/// Write `content` unless `path` already holds exactly that content.
///
/// Returns true when the file was written.
pub fn write_if_changed(path: &Path, content: &str) -> Result<bool, ManifestError> {
    match fs::read(path) {
        Ok(existing) if existing == content.as_bytes() => {
            debug!("{} is up to date", path.display());
            Ok(false)
        }
        Ok(_) => {
            write_atomic(path, content)?;
            Ok(true)
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            write_atomic(path, content)?;
            Ok(true)
        }
        Err(err) => Err(err.into()),
    }
}

/// Makefile-style depfile text naming every input of `target`
pub fn format_depfile(target: &str, inputs: &[PathBuf]) -> String {
    let mut content = format!("{}:", escape_depfile_path(target));
    for input in inputs {
        content.push_str(" \\\n    ");
        content.push_str(&escape_depfile_path(&input.to_string_lossy()));
    }
    content.push('\n');
    content
}

/// Write a depfile unless it already lists exactly these inputs
pub fn write_depfile(path: &Path, target: &str, inputs: &[PathBuf]) -> Result<bool, ManifestError> {
    write_if_changed(path, &format_depfile(target, inputs))
}

/// Read the inputs listed in a depfile written by `write_depfile` or by Ninja rules
pub fn read_depfile(path: &Path) -> Result<Vec<PathBuf>, ManifestError> {
    let content = fs::read_to_string(path)?;
    let joined = content.replace("\\\r\n", " ").replace("\\\n", " ");

    let Some(colon) = find_target_separator(&joined) else {
        return Err(ManifestError::Depfile {
            path: path.to_path_buf(),
            reason: "missing ':' after target".to_string(),
        });
    };

    Ok(split_depfile_words(&joined[colon + 1..])
        .into_iter()
        .map(PathBuf::from)
        .collect())
}

// Skips escaped colons and drive letters such as `C:\`.
fn find_target_separator(content: &str) -> Option<usize> {
    let bytes = content.as_bytes();
    (0..bytes.len()).find(|&i| {
        bytes[i] == b':'
            && (i == 0 || bytes[i - 1] != b'\\')
            && bytes.get(i + 1).map_or(true, |next| next.is_ascii_whitespace())
    })
}

fn split_depfile_words(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&' ') => {
                current.push(' ');
                chars.next();
            }
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn escape_depfile_path(path: &str) -> String {
    path.replace(' ', "\\ ")
}
