//! Standalone shell script that performs a full build
//!
//! The script replays every compile and link a clean build would run, for
//! the nested projects first and then the project itself. Paths below the
//! project directory are written relative to it, and the script changes
//! into its own directory before running anything.

use convenient_project::{ArtifactKind, ProjectConfig};
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::command::CompileCommand;
use crate::error::{BuildError, Result};
use crate::fs::atomic_write;
use crate::orchestrator::{BuildContext, BuildOptions, artifact_kind};
use crate::resolver::{DependencyFlags, DependencyResolver, ProjectSource};

/// Every command of a clean build of one project, in execution order.
fn project_commands(
    config: &ProjectConfig,
    flags: &DependencyFlags,
    options: &BuildOptions,
) -> Result<(ArtifactKind, Vec<CompileCommand>)> {
    let kind = artifact_kind(config)?;
    let ctx = BuildContext::new(config, flags, &options.extra_cflags)?;

    let mut commands: Vec<CompileCommand> = ctx
        .sources
        .iter()
        .map(|source| {
            ctx.commands.compile_object(
                source,
                &config.layout.object_for(source),
                &ctx.include_paths,
                &flags.cflags,
                kind == ArtifactKind::Shared,
            )
        })
        .collect();

    let artifact = config.layout.bin_dir().join(kind.file_name(&config.name));
    commands.push(ctx.link_command(kind, &artifact)?);
    Ok((kind, commands))
}

/// Quote `word` for a POSIX shell when it needs it.
fn shell_quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=+,:@%".contains(c));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

struct ScriptWriter {
    prefix: String,
    body: String,
}

impl ScriptWriter {
    fn new(project_dir: &Path) -> Self {
        Self {
            prefix: format!("{}/", project_dir.display()),
            body: String::new(),
        }
    }

    fn relative(&self, word: &str) -> String {
        shell_quote(&word.replace(&self.prefix, ""))
    }

    fn line<'w>(&mut self, words: impl IntoIterator<Item = &'w str>) {
        let words: Vec<String> = words.into_iter().map(|w| self.relative(w)).collect();
        let _ = writeln!(self.body, "{}", words.join(" "));
    }

    fn comment(&mut self, text: &str) {
        let _ = writeln!(self.body, "\n# {text}");
    }
}

/// Render the build script for `config` and its nested dependencies.
///
/// # Errors
///
/// Dependency resolution failures, a missing entry point for a requested
/// executable, or a project without sources.
pub fn render_build_script(
    config: &ProjectConfig,
    options: &BuildOptions,
    source: &dyn ProjectSource,
) -> Result<String> {
    let resolution = DependencyResolver::new(source).resolve(config)?;

    let mut projects = Vec::with_capacity(resolution.builds.len() + 1);
    for nested in &resolution.builds {
        let (kind, commands) = project_commands(&nested.config, &nested.flags, options)?;
        projects.push((nested.config.name.as_str(), kind, commands));
    }
    let (kind, commands) = project_commands(config, &resolution.flags, options)?;
    projects.push((config.name.as_str(), kind, commands));

    let mut script = ScriptWriter::new(config.project_dir());
    let _ = writeln!(script.body, "#!/bin/sh");
    let _ = writeln!(
        script.body,
        "# Generated by buildc for {} ({} build)",
        config.name, config.mode
    );
    let _ = writeln!(script.body, "set -xe");
    let _ = writeln!(script.body, "cd \"$(dirname \"$0\")\"");

    let directories: BTreeSet<PathBuf> = projects
        .iter()
        .flat_map(|(_, _, commands)| commands)
        .filter_map(|command| command.output.parent().map(Path::to_path_buf))
        .collect();
    script.comment("Output directories");
    for directory in &directories {
        let directory = directory.to_string_lossy();
        script.line(["mkdir", "-p", &*directory]);
    }

    for (name, kind, commands) in &projects {
        script.comment(&format!("{name} ({kind})"));
        let (link, compiles) = commands.split_last().ok_or_else(|| {
            BuildError::NothingToLink(config.layout.bin_dir().join(kind.file_name(name)))
        })?;
        for command in compiles {
            script.line(command.arguments.iter().map(String::as_str));
        }
        if *kind == ArtifactKind::Static {
            let output = link.output.to_string_lossy();
            script.line(["rm", "-f", &*output]);
        }
        script.line(link.arguments.iter().map(String::as_str));
    }

    Ok(script.body)
}

/// Write `<project>/build.sh` and return its path.
///
/// # Errors
///
/// See [`render_build_script`]; also fails if the file cannot be written.
pub fn write_build_script(
    config: &ProjectConfig,
    options: &BuildOptions,
    source: &dyn ProjectSource,
) -> Result<PathBuf> {
    let script = render_build_script(config, options, source)?;
    let path = config.layout.build_script();
    atomic_write(&path, script.as_bytes())?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .map_err(|e| BuildError::io(&path, e))?;
    }

    info!("Wrote {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("-DNAME=1"), "-DNAME=1");
        assert_eq!(shell_quote("src/main.c"), "src/main.c");
        assert_eq!(shell_quote("-DMSG=\"hi there\""), "'-DMSG=\"hi there\"'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn test_paths_below_project_become_relative() {
        let script = ScriptWriter::new(Path::new("/work/app"));
        assert_eq!(script.relative("-I/work/app/src"), "-Isrc");
        assert_eq!(script.relative("/work/app/src/main.c"), "src/main.c");
        assert_eq!(script.relative("/work/lib/include"), "/work/lib/include");
    }
}
