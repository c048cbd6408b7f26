//! In-memory Ninja manifest
//!
//! A `Manifest` is an ordered list of global variables, rule definitions and
//! build actions. Order is preserved as inserted; callers that need
//! deterministic output insert in a deterministic order.

use crate::errors::ManifestError;
use ahash::{AHashMap, AHashSet};
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// Name of Ninja's built-in rule that only groups its inputs
pub const PHONY: &str = "phony";

/// A Ninja `rule` block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rule {
    pub name: String,
    pub command: String,
    pub description: Option<String>,
    pub depfile: Option<String>,
    /// `gcc` or `msvc` depfile handling
    pub deps: Option<String>,
    /// Marks rules that regenerate a manifest
    pub generator: bool,
    pub restat: bool,
    pub pool: Option<String>,
}

impl Rule {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn depfile(mut self, depfile: impl Into<String>) -> Self {
        self.depfile = Some(depfile.into());
        self
    }

    pub fn generator(mut self) -> Self {
        self.generator = true;
        self
    }

    pub fn restat(mut self) -> Self {
        self.restat = true;
        self
    }
}

/// A Ninja `build` statement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildAction {
    pub rule: String,
    pub outputs: SmallVec<[String; 1]>,
    pub implicit_outputs: Vec<String>,
    pub inputs: Vec<String>,
    pub implicits: Vec<String>,
    pub order_only: Vec<String>,
    pub variables: BTreeMap<String, String>,
    pub comment: Option<String>,
}

impl BuildAction {
    pub fn new(rule: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            ..Default::default()
        }
    }

    /// Phony action grouping `inputs` under `name`
    pub fn phony(name: impl Into<String>, inputs: Vec<String>) -> Self {
        let mut action = Self::new(PHONY);
        action.outputs.push(name.into());
        action.inputs = inputs;
        action
    }

    pub fn output(mut self, output: impl Into<String>) -> Self {
        self.outputs.push(output.into());
        self
    }

    pub fn implicit_output(mut self, output: impl Into<String>) -> Self {
        self.implicit_outputs.push(output.into());
        self
    }

    pub fn input(mut self, input: impl Into<String>) -> Self {
        self.inputs.push(input.into());
        self
    }

    pub fn inputs<I, S>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.extend(inputs.into_iter().map(Into::into));
        self
    }

    pub fn implicit(mut self, input: impl Into<String>) -> Self {
        self.implicits.push(input.into());
        self
    }

    pub fn implicits<I, S>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.implicits.extend(inputs.into_iter().map(Into::into));
        self
    }

    pub fn order_only(mut self, input: impl Into<String>) -> Self {
        self.order_only.push(input.into());
        self
    }

    pub fn variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Explicit and implicit outputs
    pub fn all_outputs(&self) -> impl Iterator<Item = &String> {
        self.outputs.iter().chain(self.implicit_outputs.iter())
    }
}

/// A complete generated manifest
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    /// Comment lines written at the top of the file
    pub header: Vec<String>,
    pub variables: Vec<(String, String)>,
    pub rules: Vec<Rule>,
    pub builds: Vec<BuildAction>,
    pub defaults: Vec<String>,
    pub subninjas: Vec<String>,

    /// Runtime only - rule name to position in `rules`
    rule_index: AHashMap<String, usize>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, line: impl Into<String>) -> Self {
        self.header.push(line.into());
        self
    }

    /// Set a global variable, replacing an earlier value in place
    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self.variables.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.variables.push((name, value));
        }
    }

    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Add a rule. Re-adding an identical rule is a no-op; a different rule
    /// under the same name is an error.
    pub fn add_rule(&mut self, rule: Rule) -> Result<(), ManifestError> {
        if let Some(&idx) = self.rule_index.get(&rule.name) {
            if self.rules[idx] == rule {
                return Ok(());
            }
            return Err(ManifestError::ConflictingRule(rule.name));
        }
        self.rule_index.insert(rule.name.clone(), self.rules.len());
        self.rules.push(rule);
        Ok(())
    }

    #[inline]
    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rule_index.get(name).map(|&idx| &self.rules[idx])
    }

    pub fn add_build(&mut self, build: BuildAction) {
        self.builds.push(build);
    }

    pub fn add_default(&mut self, target: impl Into<String>) {
        self.defaults.push(target.into());
    }

    pub fn add_subninja(&mut self, path: impl Into<String>) {
        self.subninjas.push(path.into());
    }

    /// Find the build action producing `output`
    pub fn build_for(&self, output: &str) -> Option<&BuildAction> {
        self.builds
            .iter()
            .find(|b| b.all_outputs().any(|o| o == output))
    }

    /// Check that every build names a known rule and that outputs are unique
    pub fn validate(&self) -> Result<(), ManifestError> {
        let mut seen: AHashSet<&str> = AHashSet::new();
        for build in &self.builds {
            let first = build
                .outputs
                .first()
                .ok_or_else(|| ManifestError::NoOutputs(build.rule.clone()))?;
            if build.rule != PHONY && self.rule(&build.rule).is_none() {
                return Err(ManifestError::UnknownRule {
                    rule: build.rule.clone(),
                    output: first.clone(),
                });
            }
            for output in build.all_outputs() {
                if !seen.insert(output.as_str()) {
                    return Err(ManifestError::DuplicateOutput(output.clone()));
                }
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.builds.is_empty() && self.subninjas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_rule_readd_is_noop() {
        let mut manifest = Manifest::new();
        let rule = Rule::new("cp", "cp $in $out").description("CP $out");
        assert!(manifest.add_rule(rule.clone()).is_ok());
        assert!(manifest.add_rule(rule).is_ok());
        assert_eq!(manifest.rules.len(), 1);
    }

    #[test]
    fn test_conflicting_rule_rejected() {
        let mut manifest = Manifest::new();
        assert!(manifest.add_rule(Rule::new("cp", "cp $in $out")).is_ok());
        let result = manifest.add_rule(Rule::new("cp", "cp -f $in $out"));
        assert!(matches!(result, Err(ManifestError::ConflictingRule(name)) if name == "cp"));
    }

    #[test]
    fn test_validate_unknown_rule() {
        let mut manifest = Manifest::new();
        manifest.add_build(BuildAction::new("link").output("a.out"));
        assert!(matches!(
            manifest.validate(),
            Err(ManifestError::UnknownRule { rule, .. }) if rule == "link"
        ));
    }

    #[test]
    fn test_validate_duplicate_output() {
        let mut manifest = Manifest::new();
        manifest.add_build(BuildAction::phony("all", vec!["a".to_string()]));
        manifest.add_build(BuildAction::phony("all", vec!["b".to_string()]));
        assert!(matches!(
            manifest.validate(),
            Err(ManifestError::DuplicateOutput(out)) if out == "all"
        ));
    }

    #[test]
    fn test_set_variable_replaces_in_place() {
        let mut manifest = Manifest::new();
        manifest.set_variable("srcDir", "/a");
        manifest.set_variable("buildDir", "/b");
        manifest.set_variable("srcDir", "/c");
        assert_eq!(manifest.variables[0], ("srcDir".to_string(), "/c".to_string()));
        assert_eq!(manifest.variable("buildDir"), Some("/b"));
    }
}
