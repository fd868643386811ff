//! `compile_commands.json` generation for editors and language servers

use convenient_project::{ArtifactKind, ProjectConfig};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::command::CommandBuilder;
use crate::error::Result;
use crate::fs::{atomic_write, collect_files, collect_test_sources};
use crate::orchestrator::BuildOptions;
use crate::resolver::{DependencyResolver, ProjectSource};

/// One entry of the compilation database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompileCommandEntry {
    /// Source file, relative to `directory` when it lies below it
    pub file: PathBuf,
    pub directory: PathBuf,
    pub arguments: Vec<String>,
}

fn relative_to(path: &Path, base: &Path) -> PathBuf {
    path.strip_prefix(base).unwrap_or(path).to_path_buf()
}

/// Entries for every project source and test source, in file order.
///
/// Nested projects are resolved for their flags but not built.
///
/// # Errors
///
/// Dependency resolution failures and unreadable source trees.
pub fn compile_command_entries(
    config: &ProjectConfig,
    options: &BuildOptions,
    source: &dyn ProjectSource,
) -> Result<Vec<CompileCommandEntry>> {
    let resolution = DependencyResolver::new(source).resolve(config)?;
    let layout = &config.layout;
    let directory = config.project_dir().to_path_buf();
    let commands = CommandBuilder::for_project(config, &options.extra_cflags);
    let pic = config.artifact == Some(ArtifactKind::Shared);

    let mut include_paths = vec![layout.source_dir()];
    include_paths.extend(resolution.flags.include_paths.iter().cloned());

    let mut entries = Vec::new();
    for file in collect_files(&layout.source_dir(), &["c"])? {
        let command = commands.compile_object(
            &file,
            &layout.object_for(&file),
            &include_paths,
            &resolution.flags.cflags,
            pic,
        );
        entries.push(CompileCommandEntry {
            file: relative_to(&file, &directory),
            directory: directory.clone(),
            arguments: command.arguments,
        });
    }

    let mut test_includes = vec![layout.test_dir()];
    test_includes.extend(include_paths);
    for file in collect_test_sources(&layout.test_dir())? {
        let object = layout.test_object_for(&file);
        let command = commands.compile_object(
            &file,
            &object,
            &test_includes,
            &resolution.flags.cflags,
            false,
        );
        entries.push(CompileCommandEntry {
            file: relative_to(&file, &directory),
            directory: directory.clone(),
            arguments: command.arguments,
        });
    }

    Ok(entries)
}

/// Write `<project>/.build/compile_commands.json` and return its path.
///
/// # Errors
///
/// See [`compile_command_entries`]; also fails if the file cannot be written.
pub fn write_compile_commands(
    config: &ProjectConfig,
    options: &BuildOptions,
    source: &dyn ProjectSource,
) -> Result<PathBuf> {
    let entries = compile_command_entries(config, options, source)?;
    let path = config.layout.compile_commands_file();
    let json = serde_json::to_vec_pretty(&entries)?;
    atomic_write(&path, &json)?;

    info!("Wrote {} entries to {}", entries.len(), path.display());
    Ok(path)
}
