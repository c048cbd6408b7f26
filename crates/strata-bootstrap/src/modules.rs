//! Built-in module types and the `bootstrap` singleton
//!
//! These compile Go packages and link Go binaries with the toolchain bound
//! to the manifest's global variables, and add the generator actions that
//! chain one stage to the next:
//!
//! - Bootstrap: core binaries, then `minibp` regenerates the Primary
//!   manifest and the template candidate
//! - Primary: the primary builder and other binaries, then the primary
//!   builder produces the Main manifest and the docs
//! - Main: a `blueprint_tools` phony over every tool binary

use crate::generator::GeneratorConfig;
use crate::stage::Stage;
use anyhow::{anyhow, bail};
use std::path::Path;
use strata_graph::{Context, GraphError, ModuleContext, ModuleInfo, ModuleType, Singleton, SingletonContext};
use strata_manifest::{BuildAction, Placeholder, Rule};

pub const GO_PACKAGE: &str = "bootstrap_go_package";
pub const CORE_GO_BINARY: &str = "bootstrap_core_go_binary";
pub const GO_BINARY: &str = "bootstrap_go_binary";
pub const BOOTSTRAP_SINGLETON: &str = "bootstrap";

/// Aggregate target over every tool binary in the Main manifest
pub const TOOLS_TARGET: &str = "blueprint_tools";

const COMPILE_RULE: &str = "g.bootstrap.compile";
const LINK_RULE: &str = "g.bootstrap.link";
const MINIBP_RULE: &str = "g.bootstrap.minibp";
const PRIMARY_RULE: &str = "g.bootstrap.primary";

/// Global variables and the placeholder each is bound from
const VARIABLES: [(&str, Placeholder); 7] = [
    ("srcDir", Placeholder::SrcDir),
    ("buildDir", Placeholder::BuildDir),
    ("goRoot", Placeholder::GoRoot),
    ("compileCmd", Placeholder::GoCompile),
    ("linkCmd", Placeholder::GoLink),
    ("bootstrapCmd", Placeholder::Bootstrap),
    ("bootstrapManifest", Placeholder::BootstrapManifest),
];

/// Register the built-in module types and the `bootstrap` singleton
pub fn register_builtins<C: Send + Sync>(
    ctx: &mut Context<GeneratorConfig<C>>,
) -> Result<(), GraphError> {
    ctx.register_module_type(GO_PACKAGE, GoPackage)?;
    ctx.register_module_type(CORE_GO_BINARY, GoBinary { core: true })?;
    ctx.register_module_type(GO_BINARY, GoBinary { core: false })?;
    ctx.register_singleton(BOOTSTRAP_SINGLETON, BootstrapSingleton)?;
    Ok(())
}

fn compile_rule() -> Rule {
    Rule::new(
        COMPILE_RULE,
        "GOROOT='$goRoot' $compileCmd -o $out -p $pkgPath -complete $incFlags -pack $in",
    )
    .description("compile $out")
}

fn link_rule() -> Rule {
    Rule::new(
        LINK_RULE,
        "GOROOT='$goRoot' $linkCmd -o $out $libDirFlags $in",
    )
    .description("link $out")
}

fn src_path(dir: &Path, file: &str) -> String {
    let dir = dir.to_string_lossy().replace('\\', "/");
    if dir.is_empty() {
        format!("$srcDir/{}", file)
    } else {
        format!("$srcDir/{}/{}", dir, file)
    }
}

fn package_dir(name: &str) -> String {
    format!("$buildDir/.bootstrap/{}/pkg", name)
}

/// Include dirs and archives of every package reachable from the module
fn package_inputs<C>(ctx: &ModuleContext<'_, C>) -> anyhow::Result<(Vec<String>, Vec<String>)> {
    if let Some(other) = ctx.dependencies().iter().find(|d| d.type_name != GO_PACKAGE) {
        bail!(
            "dependency '{}' is a {}, only {} modules can be imported",
            other.name,
            other.type_name,
            GO_PACKAGE
        );
    }
    let packages: Vec<&ModuleInfo> = ctx
        .transitive_dependencies()
        .into_iter()
        .filter(|d| d.type_name == GO_PACKAGE)
        .collect();
    let dirs = packages.iter().map(|d| package_dir(&d.name)).collect();
    let archives = packages.iter().flat_map(|d| d.outputs.iter().cloned()).collect();
    Ok((dirs, archives))
}

fn flags(flag: &str, dirs: &[String]) -> String {
    dirs.iter()
        .map(|d| format!("{} {}", flag, d))
        .collect::<Vec<_>>()
        .join(" ")
}

fn sources<C>(ctx: &ModuleContext<'_, C>) -> anyhow::Result<Vec<String>> {
    let srcs = ctx.properties().string_list("srcs")?;
    if srcs.is_empty() {
        bail!("srcs must list at least one file");
    }
    Ok(srcs.iter().map(|s| src_path(ctx.module_dir(), s)).collect())
}

/// Compiles one Go package into an archive; emitted in every stage
pub struct GoPackage;

impl<C: Send + Sync> ModuleType<GeneratorConfig<C>> for GoPackage {
    fn description(&self) -> &str {
        "Go package compiled with the bootstrap toolchain"
    }

    fn properties(&self) -> Option<&[&str]> {
        Some(&["pkg_path", "srcs"])
    }

    fn generate(&self, ctx: &mut ModuleContext<'_, GeneratorConfig<C>>) -> anyhow::Result<()> {
        let pkg_path = ctx.properties().require_string("pkg_path")?;
        let srcs = sources(ctx)?;
        let (include_dirs, archives) = package_inputs(ctx)?;
        let archive = format!("{}/{}.a", package_dir(ctx.name()), pkg_path);

        ctx.rule(compile_rule());
        ctx.build(
            BuildAction::new(COMPILE_RULE)
                .output(archive.clone())
                .inputs(srcs)
                .implicits(archives)
                .variable("pkgPath", pkg_path)
                .variable("incFlags", flags("-I", &include_dirs)),
        );
        ctx.output(archive);
        Ok(())
    }
}

/// Links a Go binary.
///
/// Core binaries exist only in the Bootstrap stage; the others are emitted
/// in the Primary and Main stages, and all but the primary builder are tools.
pub struct GoBinary {
    core: bool,
}

impl GoBinary {
    fn emitted_in(&self, stage: Stage) -> bool {
        if self.core {
            stage == Stage::Bootstrap
        } else {
            stage != Stage::Bootstrap
        }
    }

    fn bin_dir(&self) -> &'static str {
        if self.core {
            "$buildDir/.minibootstrap/bin"
        } else {
            "$buildDir/.bootstrap/bin"
        }
    }
}

impl<C: Send + Sync> ModuleType<GeneratorConfig<C>> for GoBinary {
    fn description(&self) -> &str {
        if self.core {
            "Go binary needed to run the Bootstrap stage"
        } else {
            "Go binary built in the Primary stage; may be the primary builder"
        }
    }

    fn properties(&self) -> Option<&[&str]> {
        Some(&["srcs"])
    }

    fn generate(&self, ctx: &mut ModuleContext<'_, GeneratorConfig<C>>) -> anyhow::Result<()> {
        if self.core && ctx.is_primary_builder() {
            bail!("a {} cannot be the primary builder", CORE_GO_BINARY);
        }
        if !self.emitted_in(ctx.config().stage) {
            return Ok(());
        }

        let name = ctx.name();
        let srcs = sources(ctx)?;
        let (include_dirs, archives) = package_inputs(ctx)?;
        let object = format!("$buildDir/.bootstrap/{}/obj/{}.a", name, name);
        let binary = format!("{}/{}", self.bin_dir(), name);

        ctx.rule(compile_rule());
        ctx.rule(link_rule());
        ctx.build(
            BuildAction::new(COMPILE_RULE)
                .output(object.clone())
                .inputs(srcs)
                .implicits(archives.clone())
                .variable("pkgPath", "main")
                .variable("incFlags", flags("-I", &include_dirs)),
        );
        ctx.build(
            BuildAction::new(LINK_RULE)
                .output(binary.clone())
                .input(object)
                .implicits(archives)
                .variable("libDirFlags", flags("-L", &include_dirs)),
        );
        ctx.output(binary);

        if !self.core && !ctx.is_primary_builder() {
            ctx.mark_tool();
        }
        Ok(())
    }
}

/// Adds the global variables and the actions that produce the next stage
pub struct BootstrapSingleton;

impl<C: Send + Sync> Singleton<GeneratorConfig<C>> for BootstrapSingleton {
    fn generate(&self, ctx: &mut SingletonContext<'_, GeneratorConfig<C>>) -> anyhow::Result<()> {
        let config = ctx.config();
        for (variable, placeholder) in VARIABLES {
            let value = config
                .bindings
                .get(placeholder)
                .ok_or_else(|| anyhow!("no value bound for {}", placeholder.token()))?;
            ctx.variable(variable, value);
        }

        let top = format!("$srcDir/{}", config.top_file);
        match config.stage {
            Stage::Bootstrap => {
                // Generation runs `$bootstrapCmd minibp`, the host strata
                // executable. Core binaries are implicit inputs: rebuilding
                // them regenerates both outputs.
                ctx.variable("builddir", "$buildDir/.minibootstrap");
                let core_binaries: Vec<String> = ctx
                    .modules()
                    .iter()
                    .filter(|m| m.type_name == CORE_GO_BINARY)
                    .flat_map(|m| m.outputs.iter().cloned())
                    .collect();
                ctx.rule(
                    Rule::new(
                        MINIBP_RULE,
                        "$bootstrapCmd minibp -b $buildDir -d $out.d -o $out $generatorFlags $in",
                    )
                    .description("minibp $out")
                    .depfile("$out.d")
                    .generator()
                    .restat(),
                );
                ctx.build(
                    BuildAction::new(MINIBP_RULE)
                        .output("$buildDir/.bootstrap/build.ninja")
                        .input(top.clone())
                        .implicits(core_binaries.clone()),
                );
                ctx.build(
                    BuildAction::new(MINIBP_RULE)
                        .output("$buildDir/.minibootstrap/build.ninja.in")
                        .input(top)
                        .implicits(core_binaries)
                        .variable("generatorFlags", "--template"),
                );
            }
            Stage::Primary => {
                ctx.variable("builddir", "$buildDir/.bootstrap");
                let primary = ctx
                    .primary_builder()
                    .ok_or_else(|| anyhow!("no module is marked primary_builder = true"))?;
                let Some(binary) = primary.outputs.first().cloned() else {
                    bail!("primary builder '{}' produced no binary", primary.name);
                };
                ctx.rule(
                    Rule::new(
                        PRIMARY_RULE,
                        "$primary -b $buildDir -d $out.d -o $out --docs $docs $in",
                    )
                    .description("primary $out")
                    .depfile("$out.d")
                    .generator()
                    .restat(),
                );
                ctx.build(
                    BuildAction::new(PRIMARY_RULE)
                        .output("$buildDir/build.ninja")
                        .implicit_output("$buildDir/.bootstrap/docs/modules.json")
                        .input(top)
                        .implicit(binary.clone())
                        .variable("primary", binary)
                        .variable("docs", "$buildDir/.bootstrap/docs/modules.json"),
                );
            }
            Stage::Main => {
                let tools: Vec<String> = ctx
                    .modules()
                    .iter()
                    .filter(|m| m.tool)
                    .flat_map(|m| m.outputs.iter().cloned())
                    .collect();
                ctx.build(BuildAction::phony(TOOLS_TARGET, tools));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{write_tree, BLUEPRINT_TREE};
    use std::fs;
    use strata_graph::{Build, GenerateConfig};
    use strata_manifest::Bindings;
    use tempfile::TempDir;

    fn generate(root: &Path, stage: Stage) -> Result<Build, GraphError> {
        let mut ctx = Context::new();
        register_builtins(&mut ctx)?;
        let config = GeneratorConfig::new(stage, Bindings::placeholders(), "Blueprints.toml", ());
        let options = GenerateConfig {
            require_primary_builder: stage == Stage::Primary,
            ..Default::default()
        };
        ctx.build(root, &options, &config)
    }

    #[test]
    fn test_bootstrap_stage_builds_core_binaries_and_generators() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let root = write_tree(temp_dir.path());
        let Ok(build) = generate(&root, Stage::Bootstrap) else {
            panic!("bootstrap generation failed");
        };
        let manifest = &build.manifest;
        assert_eq!(manifest.variable("srcDir"), Some("@@SrcDir@@"));
        assert_eq!(manifest.variable("compileCmd"), Some("@@GoCompile@@"));
        assert!(manifest.build_for("$buildDir/.minibootstrap/bin/minibp").is_some());
        assert!(manifest.build_for("$buildDir/.bootstrap/bin/my_builder").is_none());

        let Some(template) = manifest.build_for("$buildDir/.minibootstrap/build.ninja.in") else {
            panic!("template generator missing");
        };
        assert_eq!(template.inputs, vec!["$srcDir/Blueprints.toml"]);
        assert_eq!(template.implicits, vec!["$buildDir/.minibootstrap/bin/minibp"]);
        assert_eq!(
            template.variables.get("generatorFlags").map(String::as_str),
            Some("--template")
        );
        assert!(manifest.rule(MINIBP_RULE).is_some_and(|r| r.generator && r.restat));
        assert!(manifest
            .rule(MINIBP_RULE)
            .is_some_and(|r| r.command.starts_with("$bootstrapCmd minibp ")));
    }

    #[test]
    fn test_package_compile_uses_transitive_includes() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let root = write_tree(temp_dir.path());
        let Ok(build) = generate(&root, Stage::Primary) else {
            panic!("primary generation failed");
        };
        let Some(compile) = build
            .manifest
            .build_for("$buildDir/.bootstrap/my_builder/obj/my_builder.a")
        else {
            panic!("compile action missing");
        };
        assert_eq!(compile.inputs, vec!["$srcDir/main.go"]);
        assert_eq!(
            compile.variables.get("incFlags").map(String::as_str),
            Some("-I $buildDir/.bootstrap/blueprint-parser/pkg -I $buildDir/.bootstrap/blueprint/pkg")
        );

        let Some(parser) = build
            .manifest
            .build_for("$buildDir/.bootstrap/blueprint-parser/pkg/github.com/google/blueprint/parser.a")
        else {
            panic!("package action missing");
        };
        assert_eq!(parser.inputs, vec!["$srcDir/blueprint/parser/parser.go"]);
    }

    #[test]
    fn test_primary_stage_runs_primary_builder() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let root = write_tree(temp_dir.path());
        let Ok(build) = generate(&root, Stage::Primary) else {
            panic!("primary generation failed");
        };
        let manifest = &build.manifest;
        assert!(manifest.build_for("$buildDir/.minibootstrap/bin/minibp").is_none());
        let Some(main) = manifest.build_for("$buildDir/build.ninja") else {
            panic!("main manifest generator missing");
        };
        assert_eq!(main.rule, PRIMARY_RULE);
        assert_eq!(main.implicits, vec!["$buildDir/.bootstrap/bin/my_builder"]);
        assert_eq!(
            main.implicit_outputs,
            vec!["$buildDir/.bootstrap/docs/modules.json"]
        );
    }

    #[test]
    fn test_main_stage_collects_tools() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let root = write_tree(temp_dir.path());
        let Ok(build) = generate(&root, Stage::Main) else {
            panic!("main generation failed");
        };
        let Some(tools) = build.manifest.build_for(TOOLS_TARGET) else {
            panic!("blueprint_tools missing");
        };
        assert_eq!(tools.rule, strata_manifest::types::PHONY);
        assert_eq!(tools.inputs, vec!["$buildDir/.bootstrap/bin/fmt_tool"]);
    }

    #[test]
    fn test_primary_stage_without_primary_builder() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let root = temp_dir.path().join("Blueprints.toml");
        assert!(fs::write(&root, BLUEPRINT_TREE).is_ok());
        assert!(matches!(
            generate(&root, Stage::Primary),
            Err(GraphError::NoPrimaryBuilder)
        ));
    }

    #[test]
    fn test_core_binary_cannot_be_primary() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let root = temp_dir.path().join("Blueprints.toml");
        let text = "[[bootstrap_core_go_binary]]\nname = \"x\"\nsrcs = [\"x.go\"]\nprimary_builder = true\n";
        assert!(fs::write(&root, text).is_ok());
        assert!(matches!(
            generate(&root, Stage::Bootstrap),
            Err(GraphError::Module { module, .. }) if module == "x"
        ));
    }

    #[test]
    fn test_package_requires_pkg_path() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let root = temp_dir.path().join("Blueprints.toml");
        assert!(fs::write(&root, "[[bootstrap_go_package]]\nname = \"p\"\nsrcs = [\"p.go\"]\n").is_ok());
        assert!(matches!(
            generate(&root, Stage::Bootstrap),
            Err(GraphError::InvalidProperty { property, .. }) if property == "pkg_path"
        ));
    }
}
