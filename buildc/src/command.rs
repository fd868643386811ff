//! Toolchain command construction
//!
//! Every builder is a pure function of its inputs and returns a complete
//! argument vector; nothing is executed here.

use convenient_project::{BuildMode, ProjectConfig};
use serde::Serialize;
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{BuildError, Result};
use crate::fs::ensure_parent;

/// Code generation flags for debug builds.
pub const DEBUG_FLAGS: &[&str] = &[
    "-ggdb",
    "-fsanitize=address,undefined,leak",
    "-fno-omit-frame-pointer",
];

/// Warnings for debug builds.
pub const DEBUG_WARNINGS: &[&str] = &[
    "-Wall",
    "-Wextra",
    "-Werror",
    "-Wpedantic",
    "-Wshadow",
    "-Wnull-dereference",
    "-Wformat=2",
];

/// Code generation flags for release builds.
pub const RELEASE_FLAGS: &[&str] = &["-O2", "-DNDEBUG"];

/// Warnings for release builds.
pub const RELEASE_WARNINGS: &[&str] = &["-Wall", "-Wpedantic"];

const COMPILER_CANDIDATES: &[&str] = &["cc", "gcc", "clang"];

/// Names of the external programs a build uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub cc: String,
    pub ar: String,
    pub objcopy: String,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            cc: "cc".to_string(),
            ar: "ar".to_string(),
            objcopy: "objcopy".to_string(),
        }
    }
}

impl Toolchain {
    /// Project overrides, falling back to a compiler found on `PATH`.
    pub fn for_project(config: &ProjectConfig) -> Self {
        Self {
            cc: config.cc.clone().unwrap_or_else(detect_compiler),
            ar: config.ar.clone().unwrap_or_else(|| "ar".to_string()),
            objcopy: config.objcopy.clone().unwrap_or_else(|| "objcopy".to_string()),
        }
    }
}

/// First of `cc`, `gcc`, `clang` found on `PATH`, `cc` if none is.
pub fn detect_compiler() -> String {
    let Some(path) = env::var_os("PATH") else {
        return "cc".to_string();
    };
    let dirs: Vec<PathBuf> = env::split_paths(&path).collect();

    COMPILER_CANDIDATES
        .iter()
        .find(|candidate| dirs.iter().any(|dir| dir.join(candidate).is_file()))
        .map_or_else(|| "cc".to_string(), |candidate| (*candidate).to_string())
}

/// A fully formed toolchain invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompileCommand {
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
    /// argv, element 0 is the program
    pub arguments: Vec<String>,
}

impl CompileCommand {
    pub fn program(&self) -> &str {
        self.arguments.first().map_or("", String::as_str)
    }

    /// Space-joined argv for logs and error messages.
    pub fn command_line(&self) -> String {
        self.arguments.join(" ")
    }

    /// Create the directory the output goes to.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be created.
    pub fn prepare_output(&self) -> Result<()> {
        ensure_parent(&self.output)
    }
}

fn arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn include_args(include_paths: &[PathBuf]) -> impl Iterator<Item = String> + '_ {
    include_paths.iter().map(|dir| format!("-I{}", dir.display()))
}

fn link_args<'a>(
    library_paths: &'a [PathBuf],
    link_names: &'a [String],
) -> impl Iterator<Item = String> + 'a {
    library_paths
        .iter()
        .map(|dir| format!("-L{}", dir.display()))
        .chain(link_names.iter().map(|name| format!("-l{name}")))
}

/// Builds compile, link and archive commands for one project.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    toolchain: Toolchain,
    mode: BuildMode,
    cflags: Vec<String>,
}

impl CommandBuilder {
    pub fn new(toolchain: Toolchain, mode: BuildMode, cflags: Vec<String>) -> Self {
        Self {
            toolchain,
            mode,
            cflags,
        }
    }

    /// Builder for `config`, with `extra_cflags` appended to the project's own.
    pub fn for_project(config: &ProjectConfig, extra_cflags: &[String]) -> Self {
        let mut cflags = config.cflags.clone();
        cflags.extend_from_slice(extra_cflags);
        Self::new(Toolchain::for_project(config), config.mode, cflags)
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    fn codegen_flags(&self) -> &'static [&'static str] {
        match self.mode {
            BuildMode::Debug => DEBUG_FLAGS,
            BuildMode::Release => RELEASE_FLAGS,
        }
    }

    fn warning_flags(&self) -> &'static [&'static str] {
        match self.mode {
            BuildMode::Debug => DEBUG_WARNINGS,
            BuildMode::Release => RELEASE_WARNINGS,
        }
    }

    /// `cc -I… <mode flags> <cflags> <flags> [-fPIC] -c <input> -o <output>`
    pub fn compile_object(
        &self,
        input: &Path,
        output: &Path,
        include_paths: &[PathBuf],
        flags: &[String],
        pic: bool,
    ) -> CompileCommand {
        let mut arguments = vec![self.toolchain.cc.clone()];
        arguments.extend(include_args(include_paths));
        arguments.extend(self.codegen_flags().iter().map(ToString::to_string));
        arguments.extend(self.warning_flags().iter().map(ToString::to_string));
        arguments.extend(self.cflags.iter().cloned());
        arguments.extend(flags.iter().cloned());
        if pic {
            arguments.push("-fPIC".to_string());
        }
        arguments.extend(["-c".to_string(), arg(input), "-o".to_string(), arg(output)]);

        CompileCommand {
            inputs: vec![input.to_path_buf()],
            output: output.to_path_buf(),
            arguments,
        }
    }

    /// `cc -I… <mode flags> <cflags> <inputs> -L… -l… -o <output>`
    ///
    /// # Errors
    ///
    /// `BuildError::NothingToLink` when `inputs` is empty.
    pub fn link_executable(
        &self,
        inputs: &[PathBuf],
        include_paths: &[PathBuf],
        library_paths: &[PathBuf],
        link_names: &[String],
        output: &Path,
    ) -> Result<CompileCommand> {
        if inputs.is_empty() {
            return Err(BuildError::NothingToLink(output.to_path_buf()));
        }

        let mut arguments = vec![self.toolchain.cc.clone()];
        arguments.extend(include_args(include_paths));
        arguments.extend(self.codegen_flags().iter().map(ToString::to_string));
        arguments.extend(self.cflags.iter().cloned());
        arguments.extend(inputs.iter().map(|input| arg(input)));
        arguments.extend(link_args(library_paths, link_names));
        arguments.extend(["-o".to_string(), arg(output)]);

        Ok(CompileCommand {
            inputs: inputs.to_vec(),
            output: output.to_path_buf(),
            arguments,
        })
    }

    /// `ar rcs <output> <objects>`
    ///
    /// # Errors
    ///
    /// `BuildError::NothingToLink` when `objects` is empty.
    pub fn link_static(&self, objects: &[PathBuf], output: &Path) -> Result<CompileCommand> {
        if objects.is_empty() {
            return Err(BuildError::NothingToLink(output.to_path_buf()));
        }

        let mut arguments = vec![self.toolchain.ar.clone(), "rcs".to_string(), arg(output)];
        arguments.extend(objects.iter().map(|object| arg(object)));

        Ok(CompileCommand {
            inputs: objects.to_vec(),
            output: output.to_path_buf(),
            arguments,
        })
    }

    /// `cc -shared -I… <mode flags> <cflags> <objects> -L… -l… -o <output>`
    ///
    /// Objects must have been compiled with `pic`.
    ///
    /// # Errors
    ///
    /// `BuildError::NothingToLink` when `objects` is empty.
    pub fn link_shared(
        &self,
        objects: &[PathBuf],
        include_paths: &[PathBuf],
        library_paths: &[PathBuf],
        link_names: &[String],
        output: &Path,
    ) -> Result<CompileCommand> {
        if objects.is_empty() {
            return Err(BuildError::NothingToLink(output.to_path_buf()));
        }

        let mut arguments = vec![self.toolchain.cc.clone(), "-shared".to_string()];
        arguments.extend(include_args(include_paths));
        arguments.extend(self.codegen_flags().iter().map(ToString::to_string));
        arguments.extend(self.cflags.iter().cloned());
        arguments.extend(objects.iter().map(|object| arg(object)));
        arguments.extend(link_args(library_paths, link_names));
        arguments.extend(["-o".to_string(), arg(output)]);

        Ok(CompileCommand {
            inputs: objects.to_vec(),
            output: output.to_path_buf(),
            arguments,
        })
    }

    /// `objcopy --redefine-sym <from>=<to> <archive> <output>`
    pub fn rename_entry(&self, archive: &Path, output: &Path, from: &str, to: &str) -> CompileCommand {
        CompileCommand {
            inputs: vec![archive.to_path_buf()],
            output: output.to_path_buf(),
            arguments: vec![
                self.toolchain.objcopy.clone(),
                "--redefine-sym".to_string(),
                format!("{from}={to}"),
                arg(archive),
                arg(output),
            ],
        }
    }
}
