//! Shared fixtures for unit tests

use std::fs;
use std::path::{Path, PathBuf};

pub const TREE: &str = r#"
subdirs = ["blueprint"]

[[bootstrap_go_binary]]
name = "my_builder"
srcs = ["main.go"]
deps = ["blueprint"]
primary_builder = true

[[bootstrap_go_binary]]
name = "fmt_tool"
srcs = ["fmt.go"]
deps = ["blueprint"]
"#;

pub const BLUEPRINT_TREE: &str = r#"
[[bootstrap_go_package]]
name = "blueprint-parser"
pkg_path = "github.com/google/blueprint/parser"
srcs = ["parser/parser.go"]

[[bootstrap_go_package]]
name = "blueprint"
pkg_path = "github.com/google/blueprint"
srcs = ["context.go"]
deps = ["blueprint-parser"]

[[bootstrap_core_go_binary]]
name = "minibp"
srcs = ["bootstrap/minibp/main.go"]
deps = ["blueprint"]
"#;

pub fn write_tree(dir: &Path) -> PathBuf {
    let root = dir.join("Blueprints.toml");
    assert!(fs::create_dir_all(dir.join("blueprint")).is_ok());
    assert!(fs::write(&root, TREE).is_ok());
    assert!(fs::write(dir.join("blueprint").join("Blueprints.toml"), BLUEPRINT_TREE).is_ok());
    root
}

