//! Module type documentation written next to the Main manifest

use serde::Serialize;
use std::path::Path;
use strata_graph::{Context, ModuleInfo};
use strata_manifest::write_if_changed;

#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct Docs<'a> {
    pub module_types: Vec<ModuleTypeDoc<'a>>,
}

#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct ModuleTypeDoc<'a> {
    pub name: &'a str,
    pub description: &'a str,
    /// Declared modules of this type, sorted
    pub modules: Vec<String>,
}

/// Collect registered module types and the modules declared with each
pub fn collect<'a, C: Sync>(ctx: &'a Context<C>, modules: &[ModuleInfo]) -> Docs<'a> {
    let module_types = ctx
        .module_types()
        .into_iter()
        .map(|(name, description)| {
            let mut declared: Vec<String> = modules
                .iter()
                .filter(|m| m.type_name == name)
                .map(ModuleInfo::id)
                .collect();
            declared.sort();
            ModuleTypeDoc {
                name,
                description,
                modules: declared,
            }
        })
        .collect();
    Docs { module_types }
}

/// Write the docs as pretty JSON, leaving an identical file untouched
pub fn write<C: Sync>(path: &Path, ctx: &Context<C>, modules: &[ModuleInfo]) -> anyhow::Result<()> {
    let mut json = serde_json::to_string_pretty(&collect(ctx, modules))?;
    json.push('\n');
    write_if_changed(path, &json)?;
    Ok(())
}
