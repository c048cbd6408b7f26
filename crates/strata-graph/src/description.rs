//! Loading declarative build descriptions
//!
//! A description file is TOML. `subdirs` lists directories whose own
//! description file (same file name as the root) is loaded too; every other
//! top-level key names a module type and holds an array of property tables.
//!
//! Files of one directory level are parsed in parallel and merged into a
//! shared index. The index is sorted by (file, position) before anything
//! inspects it, so results never depend on parse scheduling.

use crate::errors::{GraphError, Location};
use crate::properties::Properties;
use ahash::AHashSet;
use parking_lot::Mutex;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use toml::{Table, Value};
use tracing::debug;

/// Key listing subdirectories to load
pub const SUBDIRS_KEY: &str = "subdirs";

/// Default description file name
pub const DEFAULT_FILE_NAME: &str = "Blueprints.toml";

/// One module declaration
#[derive(Debug, Clone)]
pub struct Declaration {
    pub type_name: String,
    pub name: String,
    pub properties: Properties,
    pub location: Location,
    /// Directory of the declaring file, relative to the root description's directory
    pub dir: PathBuf,
    order: (usize, usize),
}

/// Everything read from one description tree
#[derive(Debug, Default)]
pub struct Description {
    /// Every file read, in load order
    pub files: Vec<PathBuf>,
    /// Declarations sorted by (file, position)
    pub declarations: Vec<Declaration>,
}

#[derive(Default)]
struct Index {
    declarations: Vec<Declaration>,
    subdirs: Vec<(usize, PathBuf, Location)>,
}

/// Load `root` and every description reachable through `subdirs`
pub fn load(root: &Path) -> Result<Description, GraphError> {
    let root_dir = root.parent().unwrap_or_else(|| Path::new("")).to_path_buf();
    let file_name = root
        .file_name()
        .map_or_else(|| DEFAULT_FILE_NAME.into(), |n| n.to_os_string());

    let mut description = Description::default();
    let mut visited: AHashSet<PathBuf> = AHashSet::new();
    let mut level: Vec<(PathBuf, Option<Location>)> = vec![(root.to_path_buf(), None)];

    while !level.is_empty() {
        level.retain(|(path, _)| visited.insert(normalize(path)));
        let first_seq = description.files.len();
        description
            .files
            .extend(level.iter().map(|(path, _)| path.clone()));

        let index = Mutex::new(Index::default());
        level
            .par_iter()
            .enumerate()
            .try_for_each(|(offset, (path, included_from))| {
                let seq = first_seq + offset;
                let content = fs::read_to_string(path).map_err(|source| match included_from {
                    Some(location) if source.kind() == std::io::ErrorKind::NotFound => {
                        GraphError::Parse {
                            path: path.clone(),
                            message: format!("missing subdirectory description (listed at {location})"),
                        }
                    }
                    _ => GraphError::Io {
                        path: path.clone(),
                        source,
                    },
                })?;
                let dir = relative_dir(&root_dir, path);
                let parsed = parse_file(path, &content, &dir, seq)?;

                let mut index = index.lock();
                index.declarations.extend(parsed.declarations);
                index.subdirs.extend(parsed.subdirs);
                Ok::<(), GraphError>(())
            })?;

        let Index {
            declarations,
            mut subdirs,
        } = index.into_inner();
        description.declarations.extend(declarations);

        subdirs.sort_by(|a, b| a.0.cmp(&b.0));
        level = subdirs
            .into_iter()
            .map(|(_, dir, location)| (dir.join(&file_name), Some(location)))
            .collect();
    }

    description.declarations.sort_by_key(|d| d.order);
    debug!(
        "Loaded {} declarations from {} files",
        description.declarations.len(),
        description.files.len()
    );
    Ok(description)
}

struct ParsedFile {
    declarations: Vec<Declaration>,
    subdirs: Vec<(usize, PathBuf, Location)>,
}

fn parse_file(path: &Path, content: &str, dir: &Path, seq: usize) -> Result<ParsedFile, GraphError> {
    let table: Table = toml::from_str(content).map_err(|e| GraphError::Parse {
        path: path.to_path_buf(),
        message: e.message().to_string(),
    })?;
    let file_location = Location::new(path, None);
    let base = path.parent().unwrap_or_else(|| Path::new(""));

    let mut parsed = ParsedFile {
        declarations: Vec::new(),
        subdirs: Vec::new(),
    };
    let mut position = 0;

    for (key, value) in table {
        if key == SUBDIRS_KEY {
            let Value::Array(items) = value else {
                return Err(invalid_file(path, SUBDIRS_KEY, "must be a list of strings"));
            };
            for item in items {
                let Value::String(subdir) = item else {
                    return Err(invalid_file(path, SUBDIRS_KEY, "must be a list of strings"));
                };
                parsed
                    .subdirs
                    .push((seq, base.join(subdir), file_location.clone()));
            }
            continue;
        }

        let Value::Array(items) = value else {
            return Err(invalid_file(
                path,
                &key,
                "must be an array of tables (write it as [[...]])",
            ));
        };
        let header_lines = header_lines(content, &key);

        for (i, item) in items.into_iter().enumerate() {
            let location = Location::new(path, header_lines.get(i).copied());
            let Value::Table(table) = item else {
                return Err(GraphError::InvalidProperty {
                    module: key.clone(),
                    property: key.clone(),
                    reason: "entries must be tables".to_string(),
                    location,
                });
            };
            let properties = Properties::new(table);
            let name = properties
                .require_string("name")
                .map_err(|e| GraphError::InvalidProperty {
                    module: format!("<{key}>"),
                    property: e.property,
                    reason: e.reason,
                    location: location.clone(),
                })?
                .to_string();

            parsed.declarations.push(Declaration {
                type_name: key.clone(),
                name,
                properties,
                location,
                dir: dir.to_path_buf(),
                order: (seq, position),
            });
            position += 1;
        }
    }

    Ok(parsed)
}

fn invalid_file(path: &Path, key: &str, reason: &str) -> GraphError {
    GraphError::Parse {
        path: path.to_path_buf(),
        message: format!("'{key}' {reason}"),
    }
}

/// 1-based lines of every `[[key]]` header, in order
fn header_lines(content: &str, key: &str) -> Vec<usize> {
    let header = format!("[[{key}]]");
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            let line = line.split('#').next().unwrap_or(line).trim_end();
            line == header
        })
        .map(|(i, _)| i + 1)
        .collect()
}

fn relative_dir(root_dir: &Path, file: &Path) -> PathBuf {
    let dir = file.parent().unwrap_or_else(|| Path::new(""));
    dir.strip_prefix(root_dir)
        .map_or_else(|_| dir.to_path_buf(), Path::to_path_buf)
}

fn normalize(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) -> PathBuf {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            assert!(fs::create_dir_all(parent).is_ok());
        }
        assert!(fs::write(&path, content).is_ok());
        path
    }

    #[test]
    fn test_load_follows_subdirs() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let root = write(
            temp_dir.path(),
            "Blueprints.toml",
            "subdirs = [\"lib\"]\n\n[[go_binary]]\nname = \"app\"\ndeps = [\"util\"]\n",
        );
        write(
            temp_dir.path(),
            "lib/Blueprints.toml",
            "# library\n\n[[go_package]]\nname = \"util\"\n",
        );

        let Ok(description) = load(&root) else {
            panic!("load failed");
        };
        assert_eq!(description.files.len(), 2);
        let names: Vec<&str> = description
            .declarations
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(names, vec!["app", "util"]);

        let util = &description.declarations[1];
        assert_eq!(util.type_name, "go_package");
        assert_eq!(util.dir, PathBuf::from("lib"));
        assert_eq!(util.location.line, Some(3));
    }

    #[test]
    fn test_missing_subdir_is_error() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let root = write(temp_dir.path(), "Blueprints.toml", "subdirs = [\"nope\"]\n");
        assert!(matches!(load(&root), Err(GraphError::Parse { .. })));
    }

    #[test]
    fn test_subdir_cycle_is_loaded_once() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let root = write(temp_dir.path(), "Blueprints.toml", "subdirs = [\"a\"]\n");
        write(temp_dir.path(), "a/Blueprints.toml", "subdirs = [\"..\"]\n");
        let result = load(&root);
        assert!(result.is_ok_and(|d| d.files.len() == 2));
    }

    #[test]
    fn test_module_without_name() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let root = write(
            temp_dir.path(),
            "Blueprints.toml",
            "[[go_package]]\nsrcs = []\n",
        );
        let result = load(&root);
        assert!(matches!(
            result,
            Err(GraphError::InvalidProperty { property, location, .. })
                if property == "name" && location.line == Some(1)
        ));
    }

    #[test]
    fn test_module_type_must_be_array_of_tables() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let root = write(temp_dir.path(), "Blueprints.toml", "go_package = 3\n");
        assert!(matches!(load(&root), Err(GraphError::Parse { .. })));
    }

    #[test]
    fn test_header_lines_ignore_comments() {
        let content = "[[a]] # first\nname = \"x\"\n\n[[b]]\n[[a]]\n";
        assert_eq!(header_lines(content, "a"), vec![1, 5]);
    }
}
