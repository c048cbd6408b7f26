//! The module graph builder
//!
//! A [`Context`] is created fresh for every generator run. Module types and
//! singletons are registered on it, then [`Context::build`] loads the
//! description tree, validates the graph and emits a manifest.

use crate::description::{self, Declaration};
use crate::errors::GraphError;
use crate::graph::ModuleGraph;
use crate::module::{Generated, ModuleContext, ModuleInfo, ModuleType, Singleton, SingletonContext};
use crate::properties::PropertyError;
use ahash::AHashMap;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use strata_manifest::{Manifest, ManifestError};
use tracing::{debug, info};

/// Options for one [`Context::build`]
#[derive(Debug, Clone, Default)]
pub struct GenerateConfig {
    /// Fail with `NoPrimaryBuilder` unless exactly one module is marked
    pub require_primary_builder: bool,
    /// Comment lines for the top of the manifest
    pub header: Vec<String>,
}

/// Result of a successful build
#[derive(Debug)]
pub struct Build {
    pub manifest: Manifest,
    /// Every description file read, for depfiles
    pub files: Vec<PathBuf>,
    /// Generated modules in emission order
    pub modules: Vec<ModuleInfo>,
}

/// Registry of module types and singletons
pub struct Context<C> {
    module_types: AHashMap<String, Arc<dyn ModuleType<C>>>,
    singletons: Vec<(String, Arc<dyn Singleton<C>>)>,
}

impl<C> Default for Context<C> {
    fn default() -> Self {
        Self {
            module_types: AHashMap::new(),
            singletons: Vec::new(),
        }
    }
}

impl<C: Sync> Context<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_module_type(
        &mut self,
        name: impl Into<String>,
        module_type: impl ModuleType<C> + 'static,
    ) -> Result<(), GraphError> {
        let name = name.into();
        if self.module_types.contains_key(&name) {
            return Err(GraphError::DuplicateModuleType(name));
        }
        debug!("Registered module type {}", name);
        self.module_types.insert(name, Arc::new(module_type));
        Ok(())
    }

    /// Singletons run in registration order
    pub fn register_singleton(
        &mut self,
        name: impl Into<String>,
        singleton: impl Singleton<C> + 'static,
    ) -> Result<(), GraphError> {
        let name = name.into();
        if self.singletons.iter().any(|(n, _)| *n == name) {
            return Err(GraphError::DuplicateSingleton(name));
        }
        debug!("Registered singleton {}", name);
        self.singletons.push((name, Arc::new(singleton)));
        Ok(())
    }

    /// Registered module types sorted by name, with their descriptions
    pub fn module_types(&self) -> Vec<(&str, &str)> {
        let mut types: Vec<(&str, &str)> = self
            .module_types
            .iter()
            .map(|(name, t)| (name.as_str(), t.description()))
            .collect();
        types.sort_unstable();
        types
    }

    pub fn singleton_names(&self) -> impl Iterator<Item = &str> {
        self.singletons.iter().map(|(name, _)| name.as_str())
    }

    /// Load the description rooted at `root` and emit its manifest
    pub fn build(&self, root: &Path, options: &GenerateConfig, config: &C) -> Result<Build, GraphError> {
        let description = description::load(root)?;
        for decl in &description.declarations {
            self.check_declaration(decl)?;
        }

        let mut graph = ModuleGraph::new(&description.declarations)?;
        graph.check_primary_builder(options.require_primary_builder)?;
        let waves = graph.waves()?;

        let mut manifest = Manifest::new();
        manifest.header.clone_from(&options.header);

        for wave in &waves {
            let results: Vec<(usize, Result<Generated, GraphError>)> = wave
                .par_iter()
                .map(|&id| (id, self.generate_module(&graph, id, config)))
                .collect();
            for (id, result) in results {
                let generated = result?;
                let module = &mut graph.modules[id];
                module.outputs = generated.outputs();
                module.tool = generated.tool;
                merge(&mut manifest, generated).map_err(|e| match e {
                    ManifestError::ConflictingRule(rule) => GraphError::ConflictingRule {
                        module: graph.modules[id].id(),
                        rule,
                        location: graph.modules[id].location.clone(),
                    },
                    other => GraphError::Manifest(other),
                })?;
            }
        }

        let modules: Vec<ModuleInfo> = waves
            .iter()
            .flatten()
            .map(|&id| graph.modules[id].clone())
            .collect();

        for (name, singleton) in &self.singletons {
            let mut ctx = SingletonContext::new(&modules, config);
            singleton
                .generate(&mut ctx)
                .map_err(|e| GraphError::Singleton {
                    name: name.clone(),
                    message: format!("{:#}", e),
                })?;
            merge(&mut manifest, ctx.generated).map_err(|e| match e {
                ManifestError::ConflictingRule(rule) => GraphError::Singleton {
                    name: name.clone(),
                    message: format!("redefines rule '{}' with different contents", rule),
                },
                other => GraphError::Manifest(other),
            })?;
        }

        manifest.validate()?;
        info!(
            "Generated {} build actions for {} modules",
            manifest.builds.len(),
            modules.len()
        );
        Ok(Build {
            manifest,
            files: description.files,
            modules,
        })
    }

    fn check_declaration(&self, decl: &Declaration) -> Result<(), GraphError> {
        let Some(module_type) = self.module_types.get(&decl.type_name) else {
            return Err(GraphError::UnknownModuleType {
                type_name: decl.type_name.clone(),
                location: decl.location.clone(),
            });
        };
        if let Some(allowed) = module_type.properties() {
            if let Some(unknown) = decl.properties.custom_keys().find(|k| !allowed.contains(k)) {
                return Err(GraphError::InvalidProperty {
                    module: decl.name.clone(),
                    property: unknown.to_string(),
                    reason: format!("is not a property of {}", decl.type_name),
                    location: decl.location.clone(),
                });
            }
        }
        Ok(())
    }

    fn generate_module(&self, graph: &ModuleGraph, id: usize, config: &C) -> Result<Generated, GraphError> {
        let module = &graph.modules[id];
        let Some(module_type) = self.module_types.get(&module.type_name) else {
            return Err(GraphError::UnknownModuleType {
                type_name: module.type_name.clone(),
                location: module.location.clone(),
            });
        };
        let mut ctx = ModuleContext::new(id, &graph.modules, &graph.edges, config);
        module_type.generate(&mut ctx).map_err(|err| match err.downcast::<PropertyError>() {
            Ok(e) => GraphError::InvalidProperty {
                module: module.id(),
                property: e.property,
                reason: e.reason,
                location: module.location.clone(),
            },
            Err(err) => GraphError::Module {
                module: module.id(),
                message: format!("{:#}", err),
                location: module.location.clone(),
            },
        })?;
        Ok(ctx.generated)
    }
}

fn merge(manifest: &mut Manifest, generated: Generated) -> Result<(), ManifestError> {
    for (name, value) in generated.variables {
        manifest.set_variable(name, value);
    }
    for rule in generated.rules {
        manifest.add_rule(rule)?;
    }
    for build in generated.builds {
        manifest.add_build(build);
    }
    for target in generated.defaults {
        manifest.add_default(target);
    }
    for path in generated.subninjas {
        manifest.add_subninja(path);
    }
    Ok(())
}
