//! Ninja syntax serializer
//!
//! Paths may carry `$var` references (`$buildDir/bin/x`), so only spaces and
//! colons are escaped in path lists. Variable values are written verbatim.

use crate::types::{BuildAction, Manifest, Rule};
use std::fmt::Write;

const INDENT: &str = "    ";

impl Manifest {
    /// Render the manifest as Ninja text
    pub fn to_ninja(&self) -> String {
        let mut out = String::new();

        for line in &self.header {
            push_line(&mut out, &format!("# {}", line));
        }
        if !self.header.is_empty() {
            out.push('\n');
        }

        if !self.variables.is_empty() {
            for (name, value) in &self.variables {
                push_line(&mut out, &format!("{} = {}", name, value));
            }
            out.push('\n');
        }

        for rule in &self.rules {
            write_rule(&mut out, rule);
            out.push('\n');
        }

        for build in &self.builds {
            write_build(&mut out, build);
            out.push('\n');
        }

        if !self.defaults.is_empty() {
            let targets: Vec<String> = self.defaults.iter().map(|d| escape_path(d)).collect();
            push_line(&mut out, &format!("default {}", targets.join(" ")));
        }

        for subninja in &self.subninjas {
            push_line(&mut out, &format!("subninja {}", escape_path(subninja)));
        }

        out
    }
}

fn write_rule(out: &mut String, rule: &Rule) {
    push_line(out, &format!("rule {}", rule.name));
    push_line(out, &format!("{}command = {}", INDENT, rule.command));
    if let Some(ref description) = rule.description {
        push_line(out, &format!("{}description = {}", INDENT, description));
    }
    if let Some(ref depfile) = rule.depfile {
        push_line(out, &format!("{}depfile = {}", INDENT, depfile));
    }
    if let Some(ref deps) = rule.deps {
        push_line(out, &format!("{}deps = {}", INDENT, deps));
    }
    if rule.generator {
        push_line(out, &format!("{}generator = 1", INDENT));
    }
    if rule.restat {
        push_line(out, &format!("{}restat = 1", INDENT));
    }
    if let Some(ref pool) = rule.pool {
        push_line(out, &format!("{}pool = {}", INDENT, pool));
    }
}

fn write_build(out: &mut String, build: &BuildAction) {
    if let Some(ref comment) = build.comment {
        push_line(out, &format!("# {}", comment));
    }

    let mut line = String::from("build");
    append_paths(&mut line, "", &build.outputs);
    append_paths(&mut line, " |", &build.implicit_outputs);
    let _ = write!(line, ": {}", build.rule);
    append_paths(&mut line, "", &build.inputs);
    append_paths(&mut line, " |", &build.implicits);
    append_paths(&mut line, " ||", &build.order_only);
    push_line(out, &line);

    for (name, value) in &build.variables {
        push_line(out, &format!("{}{} = {}", INDENT, name, value));
    }
}

fn append_paths(line: &mut String, separator: &str, paths: &[String]) {
    if paths.is_empty() {
        return;
    }
    line.push_str(separator);
    for path in paths {
        line.push(' ');
        line.push_str(&escape_path(path));
    }
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push('\n');
}

/// Escape a path for use in a build or default statement
pub fn escape_path(path: &str) -> String {
    path.replace("$ ", "$$ ")
        .replace(' ', "$ ")
        .replace(':', "$:")
}
