//! Release declaration parser
//!
//! Evaluates `release.lua` in the declaration sandbox and converts the
//! returned table into a validated `ReleaseDeclaration`. Nothing is executed
//! besides the declaration itself.

use anyhow::{Context, Result, bail};
use mlua::{FromLua, Table, Value};
use regex::Regex;
use slipway_core::domain::image::{BaseImageRef, ImageSpec};
use slipway_core::domain::release::{
    ArtifactConfig, CommandLine, ImagesConfig, IndexConfig, IsolationConfig, LocalRegistryConfig,
    PackageConfig, ReleaseDeclaration, ToolchainConfig,
};
use slipway_core::domain::trigger::TriggerRules;
use slipway_core::filter::PathFilter;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::modules::{ProcessEnv, VarProvider};
use crate::sandbox::create_declaration_sandbox;

/// Declaration file name, relative to the repository root
pub const DEFAULT_DECLARATION_PATH: &str = "release.lua";

pub const DEFAULT_PATHS_IGNORE: &[&str] = &["docs/**", "**.md", "**.rst", ".github/workflows/*"];

pub const DEFAULT_BRANCHES_IGNORE: &[&str] = &["dependabot/**", "pre-commit-ci-update-config"];

const DEFAULT_BASE_ARG: &str = "BASE_IMAGE";

/// Parses a declaration with the process environment behind `env`
pub fn parse_declaration(source: &str) -> Result<ReleaseDeclaration> {
    parse_declaration_with(source, ProcessEnv, DEFAULT_DECLARATION_PATH)
}

/// Parses a declaration
///
/// `definition_path` is the declaration's path relative to the repository
/// root; a change to that file always triggers a run.
///
/// # Errors
/// Returns an error if the Lua source does not evaluate to a table, a field
/// has the wrong type, or the declaration fails validation.
pub fn parse_declaration_with<V: VarProvider + 'static>(
    source: &str,
    provider: V,
    definition_path: &str,
) -> Result<ReleaseDeclaration> {
    let lua = create_declaration_sandbox(provider).context("Failed to create declaration sandbox")?;

    let value: Value = lua
        .load(source)
        .set_name(definition_path)
        .eval()
        .context("Failed to evaluate release declaration")?;

    let Value::Table(root) = value else {
        bail!("Release declaration must return a table");
    };

    let name = get_opt::<String>(Some(&root), "release", "name")?
        .filter(|n| !n.trim().is_empty())
        .context("Release declaration must have a 'name' field")?;

    let trigger = parse_trigger(&root, definition_path)?;
    let package = parse_package(&root, &name)?;
    let images = parse_images(&root)?;

    if package.is_none() && images.is_none() {
        bail!("Release declaration must have a 'package' or an 'images' section");
    }

    Ok(ReleaseDeclaration {
        name,
        trigger,
        package,
        images,
    })
}

/// Reads and parses the declaration at `workdir/declaration`
pub fn load_declaration<V: VarProvider + 'static>(
    workdir: &Path,
    declaration: &Path,
    provider: V,
) -> Result<ReleaseDeclaration> {
    let full_path = workdir.join(declaration);
    let source = std::fs::read_to_string(&full_path)
        .with_context(|| format!("Failed to read declaration {}", full_path.display()))?;

    let relative = declaration.strip_prefix(workdir).unwrap_or(declaration);
    let definition_path = relative.to_string_lossy().replace('\\', "/");

    parse_declaration_with(&source, provider, &definition_path)
        .with_context(|| format!("Invalid declaration {}", full_path.display()))
}

fn get_opt<T: FromLua>(table: Option<&Table>, section: &str, key: &str) -> Result<Option<T>> {
    match table {
        Some(table) => table
            .get::<Option<T>>(key)
            .with_context(|| format!("Invalid field '{}.{}'", section, key)),
        None => Ok(None),
    }
}

fn command(
    table: Option<&Table>,
    section: &str,
    key: &str,
    default: CommandLine,
) -> Result<CommandLine> {
    match get_opt::<Vec<String>>(table, section, key)? {
        Some(argv) => CommandLine::new(argv)
            .with_context(|| format!("'{}.{}' must be a non-empty command", section, key)),
        None => Ok(default),
    }
}

fn parse_trigger(root: &Table, definition_path: &str) -> Result<TriggerRules> {
    let trigger = get_opt::<Table>(Some(root), "release", "trigger")?;
    let trigger = trigger.as_ref();

    let main_branch =
        get_opt::<String>(trigger, "trigger", "main_branch")?.unwrap_or_else(|| "main".to_string());

    let paths_ignore = get_opt::<Vec<String>>(trigger, "trigger", "paths_ignore")?
        .unwrap_or_else(|| DEFAULT_PATHS_IGNORE.iter().map(|p| p.to_string()).collect());
    let branches_ignore = get_opt::<Vec<String>>(trigger, "trigger", "branches_ignore")?
        .unwrap_or_else(|| DEFAULT_BRANCHES_IGNORE.iter().map(|p| p.to_string()).collect());

    Ok(TriggerRules {
        main_branch,
        paths_ignore: PathFilter::new(&paths_ignore)
            .context("Invalid pattern in 'trigger.paths_ignore'")?,
        branches_ignore: PathFilter::new(&branches_ignore)
            .context("Invalid pattern in 'trigger.branches_ignore'")?,
        definition_path: definition_path
            .strip_prefix("./")
            .unwrap_or(definition_path)
            .to_string(),
    })
}

fn parse_package(root: &Table, name: &str) -> Result<Option<PackageConfig>> {
    let Some(package) = get_opt::<Table>(Some(root), "release", "package")? else {
        return Ok(None);
    };
    let table = Some(&package);
    let defaults = PackageConfig::for_project(name);

    let runtimes = get_opt::<Vec<String>>(table, "package", "runtimes")?
        .unwrap_or(defaults.toolchain.runtimes);
    let install = match get_opt::<Vec<Vec<String>>>(table, "package", "toolchain")? {
        Some(commands) => commands
            .into_iter()
            .map(|argv| {
                CommandLine::new(argv).context("'package.toolchain' entries must be non-empty commands")
            })
            .collect::<Result<Vec<_>>>()?,
        None => defaults.toolchain.install,
    };

    let isolation_table = get_opt::<Table>(table, "package", "isolation")?;
    let isolation = IsolationConfig {
        image: get_opt::<String>(isolation_table.as_ref(), "package.isolation", "image")?
            .unwrap_or(defaults.isolation.image),
        install: command(
            isolation_table.as_ref(),
            "package.isolation",
            "install",
            defaults.isolation.install,
        )?,
    };

    let artifact_table = get_opt::<Table>(table, "package", "artifact")?;
    let artifact = ArtifactConfig {
        name: get_opt::<String>(artifact_table.as_ref(), "package.artifact", "name")?
            .unwrap_or(defaults.artifact.name),
        retention_days: get_opt::<u32>(artifact_table.as_ref(), "package.artifact", "retention_days")?
            .unwrap_or(defaults.artifact.retention_days),
    };

    let index_table = get_opt::<Table>(table, "package", "index")?;
    let index = IndexConfig {
        url: get_opt::<String>(index_table.as_ref(), "package.index", "url")?
            .unwrap_or(defaults.index.url),
    };

    let output_dir =
        get_opt::<String>(table, "package", "output_dir")?.unwrap_or(defaults.output_dir);
    if output_dir.trim().is_empty() {
        bail!("'package.output_dir' must not be empty");
    }

    Ok(Some(PackageConfig {
        toolchain: ToolchainConfig { runtimes, install },
        build: command(table, "package", "build", defaults.build)?,
        output_dir,
        verify_sdist: command(table, "package", "verify_sdist", defaults.verify_sdist)?,
        install_wheel: command(table, "package", "install_wheel", defaults.install_wheel)?,
        verify_installed: command(table, "package", "verify_installed", defaults.verify_installed)?,
        isolation,
        artifact,
        index,
    }))
}

fn parse_images(root: &Table) -> Result<Option<ImagesConfig>> {
    let Some(images) = get_opt::<Table>(Some(root), "release", "images")? else {
        return Ok(None);
    };
    let table = Some(&images);
    let defaults = ImagesConfig::default();

    let branch_pattern =
        get_opt::<String>(table, "images", "branch_pattern")?.unwrap_or(defaults.branch_pattern);
    Regex::new(&branch_pattern)
        .with_context(|| format!("Invalid 'images.branch_pattern' regex: {}", branch_pattern))?;

    let registry_table = get_opt::<Table>(table, "images", "local_registry")?;
    let local_registry = LocalRegistryConfig {
        image: get_opt::<String>(registry_table.as_ref(), "images.local_registry", "image")?
            .unwrap_or(defaults.local_registry.image),
        port: get_opt::<u16>(registry_table.as_ref(), "images.local_registry", "port")?
            .unwrap_or(defaults.local_registry.port),
    };

    let build_tables = get_opt::<Vec<Table>>(table, "images", "builds")?
        .context("'images' must have a 'builds' list")?;
    if build_tables.is_empty() {
        bail!("'images.builds' must declare at least one image");
    }

    let mut seen = HashSet::new();
    let mut builds = Vec::with_capacity(build_tables.len());
    for (index, build) in build_tables.iter().enumerate() {
        let image = parse_image(build, index)?;

        if let Some(base) = &image.base {
            if !seen.contains(&base.image) {
                bail!(
                    "Image '{}' depends on '{}', which is not declared before it",
                    image.name,
                    base.image
                );
            }
        }
        if !seen.insert(image.name.clone()) {
            bail!("Image '{}' is declared more than once", image.name);
        }

        builds.push(image);
    }

    Ok(Some(ImagesConfig {
        default_tag: get_opt::<String>(table, "images", "default_tag")?
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(defaults.default_tag),
        branch_pattern,
        local_registry,
        builds,
    }))
}

fn parse_image(build: &Table, index: usize) -> Result<ImageSpec> {
    let section = format!("images.builds[{}]", index + 1);
    let table = Some(build);

    let name = get_opt::<String>(table, &section, "name")?
        .filter(|n| !n.trim().is_empty())
        .with_context(|| format!("'{}' must have a 'name'", section))?;
    let repository = get_opt::<String>(table, &section, "repository")?
        .filter(|r| !r.trim().is_empty())
        .with_context(|| format!("Image '{}' must have a 'repository'", name))?;

    let platforms = get_opt::<Vec<String>>(table, &section, "platforms")?.unwrap_or_default();
    if platforms.is_empty() || platforms.iter().any(|p| p.trim().is_empty()) {
        bail!("Image '{}' must list at least one platform", name);
    }

    let base = match get_opt::<Table>(table, &section, "base")? {
        Some(base) => {
            let base_section = format!("{}.base", section);
            let image = get_opt::<String>(Some(&base), &base_section, "image")?
                .with_context(|| format!("'{}' must name an image", base_section))?;
            let arg = get_opt::<String>(Some(&base), &base_section, "arg")?
                .unwrap_or_else(|| DEFAULT_BASE_ARG.to_string());
            Some(BaseImageRef { image, arg })
        }
        None => None,
    };

    Ok(ImageSpec {
        name,
        repository,
        context: get_opt::<String>(table, &section, "context")?.unwrap_or_else(|| ".".to_string()),
        platforms,
        base,
        build_args: get_opt::<BTreeMap<String, String>>(table, &section, "build_args")?
            .unwrap_or_default(),
    })
}
