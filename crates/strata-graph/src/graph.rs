//! Module instances, dependency wiring and graph validation
//!
//! Instances are kept sorted by (name, variant); an instance's position in
//! that order is its id, so every traversal that walks ids in ascending order
//! is deterministic.

use crate::description::Declaration;
use crate::errors::{GraphError, Location};
use crate::module::ModuleInfo;
use crate::properties::PropertyError;
use crate::variant::Variant;
use ahash::AHashMap;
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::BTreeSet;
use tracing::debug;

/// Validated dependency graph of module instances
#[derive(Debug)]
pub struct ModuleGraph {
    pub(crate) modules: Vec<ModuleInfo>,
    /// Resolved dependency ids per instance
    pub(crate) edges: Vec<Vec<usize>>,
}

impl ModuleGraph {
    /// Expand declarations into instances and resolve their dependencies.
    ///
    /// `declarations` must be sorted by (file, position); the first of two
    /// declarations sharing a name is reported as the earlier definition.
    pub fn new(declarations: &[Declaration]) -> Result<Self, GraphError> {
        let mut seen: AHashMap<&str, &Location> = AHashMap::new();
        for decl in declarations {
            if let Some(previous) = seen.insert(&decl.name, &decl.location) {
                return Err(GraphError::DuplicateModule {
                    name: decl.name.clone(),
                    location: decl.location.clone(),
                    previous: previous.clone(),
                });
            }
        }

        let mut modules = Vec::new();
        let mut dep_names = Vec::new();
        for decl in declarations {
            let property_error = |e: PropertyError| GraphError::InvalidProperty {
                module: decl.name.clone(),
                property: e.property,
                reason: e.reason,
                location: decl.location.clone(),
            };
            let deps = decl.properties.string_list("deps").map_err(property_error)?;
            let primary_builder = decl
                .properties
                .bool("primary_builder")
                .map_err(property_error)?
                .unwrap_or(false);
            let axes = decl
                .properties
                .string_list_table("variants")
                .map_err(property_error)?;
            for (axis, values) in &axes {
                let unique: BTreeSet<&String> = values.iter().collect();
                if values.is_empty() || unique.len() != values.len() {
                    return Err(GraphError::InvalidProperty {
                        module: decl.name.clone(),
                        property: "variants".to_string(),
                        reason: format!("axis '{}' must list distinct values", axis),
                        location: decl.location.clone(),
                    });
                }
            }

            for variant in Variant::expand(&axes) {
                modules.push(ModuleInfo {
                    type_name: decl.type_name.clone(),
                    name: decl.name.clone(),
                    variant,
                    location: decl.location.clone(),
                    dir: decl.dir.clone(),
                    properties: decl.properties.clone(),
                    primary_builder,
                    deps: Vec::new(),
                    outputs: Vec::new(),
                    tool: false,
                    wave: 0,
                });
                dep_names.push(deps.clone());
            }
        }

        let mut order: Vec<usize> = (0..modules.len()).collect();
        order.sort_by(|&a, &b| {
            (&modules[a].name, &modules[a].variant).cmp(&(&modules[b].name, &modules[b].variant))
        });
        let mut slots: Vec<Option<(ModuleInfo, Vec<String>)>> = modules
            .into_iter()
            .zip(dep_names)
            .map(Some)
            .collect();
        let (modules, dep_names): (Vec<ModuleInfo>, Vec<Vec<String>>) = order
            .into_iter()
            .filter_map(|i| slots[i].take())
            .unzip();

        let mut graph = Self {
            modules,
            edges: Vec::new(),
        };
        graph.wire(&dep_names)?;
        debug!("Module graph has {} instances", graph.modules.len());
        Ok(graph)
    }

    fn wire(&mut self, dep_names: &[Vec<String>]) -> Result<(), GraphError> {
        let mut by_name: AHashMap<&str, Vec<usize>> = AHashMap::new();
        for (id, module) in self.modules.iter().enumerate() {
            by_name.entry(module.name.as_str()).or_default().push(id);
        }

        let mut edges = Vec::with_capacity(self.modules.len());
        for (id, names) in dep_names.iter().enumerate() {
            let module = &self.modules[id];
            let mut resolved: Vec<usize> = Vec::with_capacity(names.len());
            for dep in names {
                let Some(candidates) = by_name.get(dep.as_str()) else {
                    return Err(GraphError::UnknownDependency {
                        module: module.id(),
                        dependency: dep.clone(),
                        location: module.location.clone(),
                    });
                };
                let target = self.pick_variant(candidates, &module.variant).ok_or_else(|| {
                    GraphError::AmbiguousDependency {
                        module: module.id(),
                        dependency: dep.clone(),
                        candidates: candidates.len(),
                        location: module.location.clone(),
                    }
                })?;
                if !resolved.contains(&target) {
                    resolved.push(target);
                }
            }
            edges.push(resolved);
        }

        for (id, deps) in edges.iter().enumerate() {
            self.modules[id].deps = deps.iter().map(|&d| self.modules[d].id()).collect();
        }
        self.edges = edges;
        Ok(())
    }

    /// The most specific instance whose variant is contained in `wanted`,
    /// falling back to a dependency's only instance
    fn pick_variant(&self, candidates: &[usize], wanted: &Variant) -> Option<usize> {
        let matching: Vec<usize> = candidates
            .iter()
            .copied()
            .filter(|&c| self.modules[c].variant.is_subset_of(wanted))
            .collect();
        let Some(best) = matching.iter().map(|&c| self.modules[c].variant.len()).max() else {
            return (candidates.len() == 1).then(|| candidates[0]);
        };
        let mut most_specific = matching
            .into_iter()
            .filter(|&c| self.modules[c].variant.len() == best);
        match (most_specific.next(), most_specific.next()) {
            (Some(id), None) => Some(id),
            _ => None,
        }
    }

    pub fn modules(&self) -> &[ModuleInfo] {
        &self.modules
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// At most one instance may be the primary builder; with `required`, exactly one
    pub fn check_primary_builder(&self, required: bool) -> Result<(), GraphError> {
        let primaries: Vec<String> = self
            .modules
            .iter()
            .filter(|m| m.primary_builder)
            .map(|m| format!("{} ({})", m.id(), m.location))
            .collect();
        match primaries.len() {
            0 if required => Err(GraphError::NoPrimaryBuilder),
            0 | 1 => Ok(()),
            _ => Err(GraphError::MultiplePrimaryBuilders { modules: primaries }),
        }
    }

    fn petgraph(&self) -> (DiGraph<usize, ()>, Vec<NodeIndex>) {
        let mut graph = DiGraph::<usize, ()>::new();
        let nodes: Vec<NodeIndex> = (0..self.modules.len()).map(|id| graph.add_node(id)).collect();
        for (id, deps) in self.edges.iter().enumerate() {
            for &dep in deps {
                graph.add_edge(nodes[dep], nodes[id], ());
            }
        }
        (graph, nodes)
    }

    /// Fail with the first dependency cycle, by lowest member id
    pub fn check_acyclic(&self) -> Result<(), GraphError> {
        let (graph, nodes) = self.petgraph();
        if toposort(&graph, None).is_ok() {
            return Ok(());
        }

        let cycle = tarjan_scc(&graph)
            .into_iter()
            .map(|component| component.into_iter().map(|n| graph[n]).collect::<BTreeSet<usize>>())
            .filter(|members| {
                members.len() > 1
                    || members
                        .iter()
                        .any(|&id| graph.contains_edge(nodes[id], nodes[id]))
            })
            .min_by_key(|members| members.iter().next().copied());

        let Some(members) = cycle else {
            return Ok(());
        };
        let path = self
            .cycle_path(&members)
            .iter()
            .map(|&id| self.modules[id].id())
            .collect::<Vec<_>>()
            .join(" -> ");
        Err(GraphError::DependencyCycle {
            members: members.iter().map(|&id| self.modules[id].id()).collect(),
            path,
        })
    }

    fn cycle_path(&self, members: &BTreeSet<usize>) -> Vec<usize> {
        let Some(&start) = members.iter().next() else {
            return Vec::new();
        };
        let mut path = vec![start];
        let mut visited = BTreeSet::from([start]);
        self.walk_cycle(start, start, members, &mut visited, &mut path);
        path
    }

    fn walk_cycle(
        &self,
        node: usize,
        start: usize,
        members: &BTreeSet<usize>,
        visited: &mut BTreeSet<usize>,
        path: &mut Vec<usize>,
    ) -> bool {
        for &dep in &self.edges[node] {
            if !members.contains(&dep) {
                continue;
            }
            if dep == start {
                path.push(start);
                return true;
            }
            if visited.insert(dep) {
                path.push(dep);
                if self.walk_cycle(dep, start, members, visited, path) {
                    return true;
                }
                path.pop();
            }
        }
        false
    }

    /// Instance ids grouped by dependency depth; each wave sorted by id.
    ///
    /// Every dependency of an instance lives in an earlier wave. Records each
    /// instance's depth in [`ModuleInfo::wave`].
    pub fn waves(&mut self) -> Result<Vec<Vec<usize>>, GraphError> {
        self.check_acyclic()?;
        let (graph, _) = self.petgraph();
        let sorted = toposort(&graph, None).map_err(|cycle| GraphError::DependencyCycle {
            members: vec![self.modules[graph[cycle.node_id()]].id()],
            path: self.modules[graph[cycle.node_id()]].id(),
        })?;

        let mut depths = vec![0usize; self.modules.len()];
        for node in sorted {
            let id = graph[node];
            depths[id] = self.edges[id]
                .iter()
                .map(|&dep| depths[dep] + 1)
                .max()
                .unwrap_or(0);
        }

        let max_depth = depths.iter().copied().max().unwrap_or(0);
        let mut waves: Vec<Vec<usize>> = vec![Vec::new(); max_depth + 1];
        for (id, &depth) in depths.iter().enumerate() {
            waves[depth].push(id);
            self.modules[id].wave = depth;
        }
        waves.retain(|w| !w.is_empty());
        Ok(waves)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::load;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn graph_from(text: &str) -> Result<ModuleGraph, GraphError> {
        let Ok(temp_dir) = TempDir::new() else {
            return Err(GraphError::NoPrimaryBuilder);
        };
        let root = temp_dir.path().join("Blueprints.toml");
        if let Err(source) = fs::write(&root, text) {
            return Err(GraphError::Io {
                path: root,
                source,
            });
        }
        let description = load(Path::new(&root))?;
        ModuleGraph::new(&description.declarations)
    }

    fn chain(deps: &[(&str, &str)]) -> String {
        deps.iter()
            .map(|(name, dep)| {
                format!("[[t]]\nname = \"{name}\"\ndeps = [{}]\n\n", if dep.is_empty() {
                    String::new()
                } else {
                    format!("\"{dep}\"")
                })
            })
            .collect()
    }

    #[test]
    fn test_cycle_names_all_members() {
        let graph = graph_from(&chain(&[("a", "b"), ("b", "c"), ("c", "a")]));
        let Ok(graph) = graph else {
            panic!("graph construction failed");
        };
        match graph.check_acyclic() {
            Err(GraphError::DependencyCycle { members, path }) => {
                assert_eq!(members, vec!["a", "b", "c"]);
                assert_eq!(path, "a -> b -> c -> a");
            }
            other => panic!("expected a cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_acyclic_chain_orders_dependencies_first() {
        let Ok(mut graph) = graph_from(&chain(&[("a", "b"), ("b", "c"), ("c", "")])) else {
            panic!("graph construction failed");
        };
        assert!(graph.check_acyclic().is_ok());
        let Ok(waves) = graph.waves() else {
            panic!("waves failed");
        };
        let named: Vec<Vec<String>> = waves
            .iter()
            .map(|w| w.iter().map(|&id| graph.modules()[id].id()).collect())
            .collect();
        assert_eq!(named, vec![vec!["c"], vec!["b"], vec!["a"]]);
    }

    #[test]
    fn test_self_dependency_is_cycle() {
        let Ok(graph) = graph_from(&chain(&[("a", "a")])) else {
            panic!("graph construction failed");
        };
        assert!(matches!(
            graph.check_acyclic(),
            Err(GraphError::DependencyCycle { members, .. }) if members == vec!["a"]
        ));
    }

    #[test]
    fn test_duplicate_module_reports_both_locations() {
        let result = graph_from("[[t]]\nname = \"a\"\n\n[[u]]\nname = \"a\"\n");
        assert!(matches!(
            result,
            Err(GraphError::DuplicateModule { name, location, previous })
                if name == "a" && location.line == Some(4) && previous.line == Some(1)
        ));
    }

    #[test]
    fn test_primary_builder_uniqueness() {
        let two = graph_from(
            "[[t]]\nname = \"a\"\nprimary_builder = true\n\n[[t]]\nname = \"b\"\nprimary_builder = true\n",
        );
        let Ok(two) = two else {
            panic!("graph construction failed");
        };
        assert!(matches!(
            two.check_primary_builder(false),
            Err(GraphError::MultiplePrimaryBuilders { modules }) if modules.len() == 2
        ));

        let Ok(none) = graph_from("[[t]]\nname = \"a\"\n") else {
            panic!("graph construction failed");
        };
        assert!(none.check_primary_builder(false).is_ok());
        assert!(matches!(
            none.check_primary_builder(true),
            Err(GraphError::NoPrimaryBuilder)
        ));

        let Ok(one) = graph_from("[[t]]\nname = \"a\"\nprimary_builder = true\n") else {
            panic!("graph construction failed");
        };
        assert!(one.check_primary_builder(true).is_ok());
    }

    #[test]
    fn test_unknown_dependency() {
        let result = graph_from(&chain(&[("a", "missing")]));
        assert!(matches!(
            result,
            Err(GraphError::UnknownDependency { dependency, .. }) if dependency == "missing"
        ));
    }

    #[test]
    fn test_variants_resolve_to_matching_instance() {
        let text = r#"
[[lib]]
name = "core"
variants = { arch = ["arm64", "x86_64"] }

[[bin]]
name = "tool"
deps = ["core", "common"]
variants = { arch = ["arm64", "x86_64"], os = ["linux"] }

[[lib]]
name = "common"
"#;
        let Ok(graph) = graph_from(text) else {
            panic!("graph construction failed");
        };
        let ids: Vec<String> = graph.modules().iter().map(ModuleInfo::id).collect();
        assert_eq!(
            ids,
            vec![
                "common",
                "core(arch=arm64)",
                "core(arch=x86_64)",
                "tool(arch=arm64,os=linux)",
                "tool(arch=x86_64,os=linux)",
            ]
        );
        assert_eq!(graph.modules()[4].deps, vec!["core(arch=x86_64)", "common"]);
    }

    #[test]
    fn test_unmatched_variant_is_ambiguous() {
        let text = r#"
[[lib]]
name = "core"
variants = { arch = ["arm64", "x86_64"] }

[[bin]]
name = "tool"
deps = ["core"]
"#;
        assert!(matches!(
            graph_from(text),
            Err(GraphError::AmbiguousDependency { candidates: 2, .. })
        ));
    }

    #[test]
    fn test_empty_variant_axis_rejected() {
        let text = "[[lib]]\nname = \"core\"\nvariants = { arch = [] }\n";
        assert!(matches!(
            graph_from(text),
            Err(GraphError::InvalidProperty { property, .. }) if property == "variants"
        ));
    }
}
