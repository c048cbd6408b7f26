//! Extension points: module types and singletons
//!
//! A module type turns one declared module instance into rules and build
//! actions. A singleton runs once per build, after every module, and sees the
//! whole generated graph. Both are registered on a [`crate::Context`] and must
//! be `Send + Sync`: module instances of one dependency wave are generated in
//! parallel.

use crate::errors::Location;
use crate::properties::Properties;
use crate::variant::Variant;
use std::collections::BTreeSet;
use std::path::Path;
use strata_manifest::{BuildAction, Rule};

/// A module instance as seen by module types and singletons
#[derive(Debug, Clone)]
pub struct ModuleInfo {
    pub type_name: String,
    pub name: String,
    pub variant: Variant,
    pub location: Location,
    /// Directory of the declaring file, relative to the root description
    pub dir: std::path::PathBuf,
    pub properties: Properties,
    pub primary_builder: bool,
    /// Ids of the resolved dependencies, in declaration order
    pub deps: Vec<String>,
    /// Explicit outputs of the module's build actions, filled in after generation
    pub outputs: Vec<String>,
    /// Set by module types whose output is an auxiliary tool
    pub tool: bool,
    /// Dependency depth; every dependency has a smaller one
    pub wave: usize,
}

impl ModuleInfo {
    /// `name`, or `name(axis=value,...)` for non-default variants
    pub fn id(&self) -> String {
        instance_id(&self.name, &self.variant)
    }
}

pub(crate) fn instance_id(name: &str, variant: &Variant) -> String {
    if variant.is_default() {
        name.to_string()
    } else {
        format!("{}({})", name, variant)
    }
}

/// Generates build actions for every module declared with this type
pub trait ModuleType<C>: Send + Sync {
    /// One-line summary, used for generated documentation
    fn description(&self) -> &str {
        ""
    }

    /// Non-reserved properties this type accepts; `None` accepts anything
    fn properties(&self) -> Option<&[&str]> {
        None
    }

    fn generate(&self, ctx: &mut ModuleContext<'_, C>) -> anyhow::Result<()>;
}

/// Runs once per build after every module has been generated
pub trait Singleton<C>: Send + Sync {
    fn generate(&self, ctx: &mut SingletonContext<'_, C>) -> anyhow::Result<()>;
}

/// What one module or singleton contributed
#[derive(Debug, Default)]
pub(crate) struct Generated {
    pub variables: Vec<(String, String)>,
    pub rules: Vec<Rule>,
    pub builds: Vec<BuildAction>,
    pub defaults: Vec<String>,
    pub subninjas: Vec<String>,
    /// Outputs named with `ModuleContext::output`, if any
    pub declared_outputs: Vec<String>,
    pub tool: bool,
}

impl Generated {
    /// Declared outputs, or every explicit build output when none were declared
    pub fn outputs(&self) -> Vec<String> {
        if !self.declared_outputs.is_empty() {
            return self.declared_outputs.clone();
        }
        self.builds
            .iter()
            .flat_map(|b| b.outputs.iter().cloned())
            .collect()
    }
}

/// Per-instance view handed to [`ModuleType::generate`]
pub struct ModuleContext<'a, C> {
    id: usize,
    modules: &'a [ModuleInfo],
    edges: &'a [Vec<usize>],
    deps: Vec<&'a ModuleInfo>,
    config: &'a C,
    pub(crate) generated: Generated,
}

impl<'a, C> ModuleContext<'a, C> {
    pub(crate) fn new(
        id: usize,
        modules: &'a [ModuleInfo],
        edges: &'a [Vec<usize>],
        config: &'a C,
    ) -> Self {
        Self {
            id,
            modules,
            edges,
            deps: edges[id].iter().map(|&d| &modules[d]).collect(),
            config,
            generated: Generated::default(),
        }
    }

    fn module(&self) -> &'a ModuleInfo {
        &self.modules[self.id]
    }

    pub fn name(&self) -> &'a str {
        &self.module().name
    }

    pub fn type_name(&self) -> &'a str {
        &self.module().type_name
    }

    pub fn variant(&self) -> &'a Variant {
        &self.module().variant
    }

    pub fn location(&self) -> &'a Location {
        &self.module().location
    }

    /// Directory of the declaring file, relative to the root description
    pub fn module_dir(&self) -> &'a Path {
        &self.module().dir
    }

    pub fn properties(&self) -> &'a Properties {
        &self.module().properties
    }

    pub fn is_primary_builder(&self) -> bool {
        self.module().primary_builder
    }

    /// Resolved dependencies, already generated
    pub fn dependencies(&self) -> &[&'a ModuleInfo] {
        &self.deps
    }

    /// Every module reachable through dependencies, in emission order
    pub fn transitive_dependencies(&self) -> Vec<&'a ModuleInfo> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<usize> = self.edges[self.id].clone();
        while let Some(id) = stack.pop() {
            if seen.insert(id) {
                stack.extend(self.edges[id].iter().copied());
            }
        }
        let mut deps: Vec<&'a ModuleInfo> = seen.into_iter().map(|id| &self.modules[id]).collect();
        deps.sort_by_key(|m| m.wave);
        deps
    }

    pub fn config(&self) -> &'a C {
        self.config
    }

    pub fn rule(&mut self, rule: Rule) {
        if !self.generated.rules.contains(&rule) {
            self.generated.rules.push(rule);
        }
    }

    pub fn build(&mut self, build: BuildAction) {
        self.generated.builds.push(build);
    }

    /// Name an output for dependents; by default they see every explicit output
    pub fn output(&mut self, path: impl Into<String>) {
        self.generated.declared_outputs.push(path.into());
    }

    /// Tag the module's outputs as an auxiliary tool
    pub fn mark_tool(&mut self) {
        self.generated.tool = true;
    }
}

/// Whole-graph view handed to [`Singleton::generate`]
pub struct SingletonContext<'a, C> {
    modules: &'a [ModuleInfo],
    config: &'a C,
    pub(crate) generated: Generated,
}

impl<'a, C> SingletonContext<'a, C> {
    pub(crate) fn new(modules: &'a [ModuleInfo], config: &'a C) -> Self {
        Self {
            modules,
            config,
            generated: Generated::default(),
        }
    }

    /// Every generated module, in emission order
    pub fn modules(&self) -> &'a [ModuleInfo] {
        self.modules
    }

    pub fn primary_builder(&self) -> Option<&'a ModuleInfo> {
        self.modules.iter().find(|m| m.primary_builder)
    }

    pub fn config(&self) -> &'a C {
        self.config
    }

    /// Set a global manifest variable
    pub fn variable(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.generated.variables.push((name.into(), value.into()));
    }

    pub fn rule(&mut self, rule: Rule) {
        if !self.generated.rules.contains(&rule) {
            self.generated.rules.push(rule);
        }
    }

    pub fn build(&mut self, build: BuildAction) {
        self.generated.builds.push(build);
    }

    pub fn default_target(&mut self, target: impl Into<String>) {
        self.generated.defaults.push(target.into());
    }

    pub fn subninja(&mut self, path: impl Into<String>) {
        self.generated.subninjas.push(path.into());
    }
}
