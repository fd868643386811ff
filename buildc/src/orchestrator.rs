//! Build orchestration
//!
//! Drives one invocation: resolve dependencies, build nested projects,
//! compute the stale set, compile, link and persist the staleness record.
//! The record is written only after everything before it succeeded, so a
//! failed build is retried in full next time.

use convenient_project::{ArtifactKind, ConfigError, ProjectConfig};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::command::{CommandBuilder, CompileCommand};
use crate::error::{BuildError, CommandStatus, Result};
use crate::executor::{CommandRunner, Executor, run_command};
use crate::fs::{collect_files, collect_test_sources, modified_time_if_exists};
use crate::record::StalenessRecord;
use crate::resolver::{DependencyFlags, DependencyResolver, FsProjectSource, ProjectSource, Resolution};
use crate::staleness::{StalenessTracker, is_source};

/// Batches larger than this are compiled on a thread pool.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 10;

/// Where a build currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildPhase {
    Idle,
    ResolvingDependencies,
    ComputingStaleSet,
    CompilingObjects,
    Linking,
    PersistingCache,
    RunningTests,
    Done,
    Failed(String),
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildPhase::Idle => f.write_str("idle"),
            BuildPhase::ResolvingDependencies => f.write_str("resolving dependencies"),
            BuildPhase::ComputingStaleSet => f.write_str("computing stale set"),
            BuildPhase::CompilingObjects => f.write_str("compiling objects"),
            BuildPhase::Linking => f.write_str("linking"),
            BuildPhase::PersistingCache => f.write_str("persisting cache"),
            BuildPhase::RunningTests => f.write_str("running tests"),
            BuildPhase::Done => f.write_str("done"),
            BuildPhase::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Knobs set from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Maximum concurrent compiler processes
    pub jobs: usize,
    pub parallel_threshold: usize,
    /// Appended to every project's compile flags
    pub extra_cflags: Vec<String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            jobs: num_cpus::get(),
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            extra_cflags: Vec::new(),
        }
    }
}

/// Outcome of building one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub project: String,
    pub kind: ArtifactKind,
    pub artifact: PathBuf,
    /// Sources compiled in this invocation
    pub compiled: Vec<PathBuf>,
    /// Whether the artifact was (re)linked
    pub linked: bool,
    /// Nested builds, in build order
    pub dependencies: Vec<BuildReport>,
}

/// Outcome of a test run. Every test binary runs even when some fail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestReport {
    pub passed: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, CommandStatus)>,
    /// Test binaries relinked in this invocation
    pub rebuilt: Vec<PathBuf>,
}

impl TestReport {
    pub fn success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.passed.len() + self.failed.len()
    }
}

/// State for building one project, assembled once and passed by reference.
#[derive(Debug)]
pub struct BuildContext<'a> {
    pub config: &'a ProjectConfig,
    pub flags: &'a DependencyFlags,
    /// `src/` followed by dependency include paths
    pub include_paths: Vec<PathBuf>,
    /// `.c` files below `src/`
    pub sources: Vec<PathBuf>,
    /// Sources and headers whose changes are tracked
    pub tracked: Vec<PathBuf>,
    pub stale: BTreeSet<PathBuf>,
    /// Sources built last time that no longer exist
    pub removed: Vec<PathBuf>,
    pub commands: CommandBuilder,
}

impl<'a> BuildContext<'a> {
    /// Collect the project's files.
    ///
    /// # Errors
    ///
    /// Fails if the source tree cannot be walked.
    pub fn new(
        config: &'a ProjectConfig,
        flags: &'a DependencyFlags,
        extra_cflags: &[String],
    ) -> Result<Self> {
        let source_dir = config.layout.source_dir();

        let mut include_paths = vec![source_dir.clone()];
        include_paths.extend(flags.include_paths.iter().cloned());

        let sources = collect_files(&source_dir, &["c"])?;
        let mut tracked = collect_files(&source_dir, &["c", "h"])?;
        for root in &flags.source_roots {
            tracked.extend(collect_files(root, &["h"])?);
        }

        Ok(Self {
            config,
            flags,
            include_paths,
            sources,
            tracked,
            stale: BTreeSet::new(),
            removed: Vec::new(),
            commands: CommandBuilder::for_project(config, extra_cflags),
        })
    }

    pub fn objects(&self) -> Vec<PathBuf> {
        self.sources
            .iter()
            .map(|source| self.config.layout.object_for(source))
            .collect()
    }

    /// Command producing `artifact` of `kind` from every object.
    ///
    /// # Errors
    ///
    /// `BuildError::NothingToLink` when the project has no sources.
    pub fn link_command(&self, kind: ArtifactKind, artifact: &Path) -> Result<CompileCommand> {
        let objects = self.objects();
        match kind {
            ArtifactKind::Exe => self.commands.link_executable(
                &objects,
                &self.include_paths,
                &self.flags.library_paths,
                &self.flags.link_names,
                artifact,
            ),
            ArtifactKind::Static => self.commands.link_static(&objects, artifact),
            ArtifactKind::Shared => self.commands.link_shared(
                &objects,
                &self.include_paths,
                &self.flags.library_paths,
                &self.flags.link_names,
                artifact,
            ),
        }
    }
}

/// Artifact to produce: an explicit request wins, otherwise an entry point
/// makes an executable and anything else a static library.
///
/// # Errors
///
/// Requesting an executable without `src/main.c`.
pub fn artifact_kind(config: &ProjectConfig) -> Result<ArtifactKind> {
    let has_entry_point = config.layout.entry_point().is_file();
    match config.artifact {
        Some(ArtifactKind::Exe) if !has_entry_point => Err(ConfigError::ArtifactMismatch {
            name: config.name.clone(),
            requested: ArtifactKind::Exe,
            reason: format!("{} does not exist", config.layout.entry_point().display()),
        }
        .into()),
        Some(kind) => Ok(kind),
        None if has_entry_point => Ok(ArtifactKind::Exe),
        None => Ok(ArtifactKind::Static),
    }
}

/// Whether `artifact` must be relinked from `inputs`.
///
/// `forced` covers changes file times cannot show: fresh compiles,
/// dependencies relinked in this invocation, removed sources.
fn needs_link(artifact: &Path, inputs: &[PathBuf], forced: bool) -> Result<bool> {
    if forced {
        return Ok(true);
    }
    let Some(artifact_time) = modified_time_if_exists(artifact)? else {
        return Ok(true);
    };
    for input in inputs {
        match modified_time_if_exists(input)? {
            Some(input_time) if input_time <= artifact_time => {}
            _ => return Ok(true),
        }
    }
    Ok(false)
}

/// Archive the test binaries link against.
fn test_archive(config: &ProjectConfig) -> PathBuf {
    config
        .layout
        .test_build_dir()
        .join(ArtifactKind::Static.file_name(&config.name))
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BuildError::io(path, e)),
    }
}

/// Builds a project and everything it depends on.
pub struct BuildOrchestrator<'a> {
    runner: &'a dyn CommandRunner,
    source: &'a dyn ProjectSource,
    options: BuildOptions,
    phase: BuildPhase,
}

impl<'a> BuildOrchestrator<'a> {
    pub fn new(runner: &'a dyn CommandRunner, options: BuildOptions) -> Self {
        Self {
            runner,
            source: &FsProjectSource,
            options,
            phase: BuildPhase::Idle,
        }
    }

    /// Load nested projects from `source` instead of the filesystem.
    #[must_use]
    pub fn with_source(mut self, source: &'a dyn ProjectSource) -> Self {
        self.source = source;
        self
    }

    pub fn phase(&self) -> &BuildPhase {
        &self.phase
    }

    fn enter(&mut self, project: &str, phase: BuildPhase) {
        debug!("{}: {} -> {}", project, self.phase, phase);
        self.phase = phase;
    }

    fn executor(&self, config: &ProjectConfig) -> Executor<'a> {
        Executor::new(
            self.runner,
            config.project_dir(),
            self.options.jobs,
            self.options.parallel_threshold,
        )
    }

    /// Build `config` and its nested dependencies.
    ///
    /// # Errors
    ///
    /// Configuration, filesystem and toolchain failures abort the build
    /// without touching any staleness record not yet written.
    pub fn build(&mut self, config: &ProjectConfig) -> Result<BuildReport> {
        let result = self.try_build(config);
        if let Err(e) = &result {
            self.enter(&config.name, BuildPhase::Failed(e.to_string()));
        }
        result
    }

    fn try_build(&mut self, config: &ProjectConfig) -> Result<BuildReport> {
        let (resolution, reports, relinked) = self.build_dependencies(config)?;
        let mut report = self.build_project(config, &resolution.flags, &relinked)?;
        report.dependencies = reports;
        self.enter(&config.name, BuildPhase::Done);
        Ok(report)
    }

    /// Resolve the graph and build every nested project in order.
    fn build_dependencies(
        &mut self,
        config: &ProjectConfig,
    ) -> Result<(Resolution, Vec<BuildReport>, HashSet<PathBuf>)> {
        self.enter(&config.name, BuildPhase::ResolvingDependencies);
        let resolution = DependencyResolver::new(self.source).resolve(config)?;

        let mut reports = Vec::with_capacity(resolution.builds.len());
        let mut relinked = HashSet::new();
        for nested in &resolution.builds {
            info!("Building dependency {} ({})", nested.config.name, nested.config.mode);
            let report = self
                .build_project(&nested.config, &nested.flags, &relinked)
                .map_err(|e| BuildError::Dependency {
                    name: nested.name.clone(),
                    source: Box::new(e),
                })?;
            if report.linked {
                let _ = relinked.insert(report.artifact.clone());
            }
            reports.push(report);
        }

        Ok((resolution, reports, relinked))
    }

    fn compute_stale_set(&mut self, ctx: &mut BuildContext<'_>) -> Result<()> {
        self.enter(&ctx.config.name, BuildPhase::ComputingStaleSet);
        let layout = &ctx.config.layout;
        let record = StalenessRecord::load(&layout.cache_file());
        let config_file = layout.config_file();

        let mut stale = StalenessTracker::new(&record, &ctx.include_paths, &config_file)
            .compute_stale_set(&ctx.tracked)?;
        for source in &ctx.sources {
            if !layout.object_for(source).is_file() {
                let _ = stale.insert(source.clone());
            }
        }

        let source_dir = layout.source_dir();
        ctx.removed = record
            .iter()
            .map(|(path, _)| path)
            .filter(|path| is_source(path) && path.starts_with(&source_dir))
            .filter(|path| !ctx.sources.iter().any(|source| *source == **path))
            .map(Path::to_path_buf)
            .collect();
        if !ctx.removed.is_empty() {
            debug!("{}: {} sources removed", ctx.config.name, ctx.removed.len());
        }

        debug!("{}: {} of {} sources stale", ctx.config.name, stale.len(), ctx.sources.len());
        ctx.stale = stale;
        Ok(())
    }

    fn compile(&mut self, ctx: &BuildContext<'_>, pic: bool) -> Result<Vec<PathBuf>> {
        self.enter(&ctx.config.name, BuildPhase::CompilingObjects);
        let commands: Vec<_> = ctx
            .stale
            .iter()
            .map(|source| {
                ctx.commands.compile_object(
                    source,
                    &ctx.config.layout.object_for(source),
                    &ctx.include_paths,
                    &ctx.flags.cflags,
                    pic,
                )
            })
            .collect();

        self.executor(ctx.config).run_all("Compiling", &commands)?;
        Ok(ctx.stale.iter().cloned().collect())
    }

    /// Delete objects of removed sources and every artifact that may still
    /// contain them, so both the build and the test path relink.
    fn discard_removed(ctx: &BuildContext<'_>) -> Result<()> {
        if ctx.removed.is_empty() {
            return Ok(());
        }
        let layout = &ctx.config.layout;
        for source in &ctx.removed {
            remove_if_exists(&layout.object_for(source))?;
        }
        for kind in [ArtifactKind::Exe, ArtifactKind::Static, ArtifactKind::Shared] {
            remove_if_exists(&layout.bin_dir().join(kind.file_name(&ctx.config.name)))?;
        }
        remove_if_exists(&test_archive(ctx.config))
    }

    fn persist(&mut self, ctx: &BuildContext<'_>) -> Result<()> {
        self.enter(&ctx.config.name, BuildPhase::PersistingCache);
        let layout = &ctx.config.layout;
        StalenessRecord::save_current(&ctx.tracked, &layout.config_file(), &layout.cache_file())
    }

    fn build_project(
        &mut self,
        config: &ProjectConfig,
        flags: &DependencyFlags,
        relinked: &HashSet<PathBuf>,
    ) -> Result<BuildReport> {
        let kind = artifact_kind(config)?;
        let mut ctx = BuildContext::new(config, flags, &self.options.extra_cflags)?;

        self.compute_stale_set(&mut ctx)?;
        let compiled = self.compile(&ctx, kind == ArtifactKind::Shared)?;

        self.enter(&config.name, BuildPhase::Linking);
        Self::discard_removed(&ctx)?;
        let artifact = config.layout.bin_dir().join(kind.file_name(&config.name));
        let objects = ctx.objects();

        // An archive does not contain its dependencies
        let dependency_artifacts: &[PathBuf] = match kind {
            ArtifactKind::Static => &[],
            ArtifactKind::Exe | ArtifactKind::Shared => &flags.artifacts,
        };
        let relinked_dependency = dependency_artifacts.iter().any(|a| relinked.contains(a));
        let inputs: Vec<PathBuf> = objects.iter().chain(dependency_artifacts).cloned().collect();

        let forced = !compiled.is_empty() || relinked_dependency || !ctx.removed.is_empty();

        let linked = if needs_link(&artifact, &inputs, forced)? {
            let command = ctx.link_command(kind, &artifact)?;
            if kind == ArtifactKind::Static {
                // ar only adds members, start from an empty archive
                remove_if_exists(&artifact)?;
            }
            info!("Linking {}", artifact.display());
            run_command(self.runner, &command, config.project_dir())?;
            true
        } else {
            debug!("{} is up to date", artifact.display());
            false
        };

        self.persist(&ctx)?;

        Ok(BuildReport {
            project: config.name.clone(),
            kind,
            artifact,
            compiled,
            linked,
            dependencies: Vec::new(),
        })
    }

    /// Build the project as a test archive, link every `tests/**/*-test.c`
    /// against it and run the resulting binaries with `args`.
    ///
    /// Test sources have their own staleness record: editing a test relinks
    /// that test only.
    ///
    /// # Errors
    ///
    /// Build failures abort; failing tests are reported in the [`TestReport`].
    pub fn test(&mut self, config: &ProjectConfig, args: &[String]) -> Result<TestReport> {
        let result = self.try_test(config, args);
        if let Err(e) = &result {
            self.enter(&config.name, BuildPhase::Failed(e.to_string()));
        }
        result
    }

    fn try_test(&mut self, config: &ProjectConfig, args: &[String]) -> Result<TestReport> {
        let (resolution, _, relinked) = self.build_dependencies(config)?;
        let flags = &resolution.flags;
        let layout = &config.layout;
        let config_file = layout.config_file();

        let mut ctx = BuildContext::new(config, flags, &self.options.extra_cflags)?;
        self.compute_stale_set(&mut ctx)?;
        let pic = config.artifact == Some(ArtifactKind::Shared);
        let compiled = self.compile(&ctx, pic)?;

        self.enter(&config.name, BuildPhase::Linking);
        Self::discard_removed(&ctx)?;
        let archive = test_archive(config);
        let objects = ctx.objects();
        let forced = !compiled.is_empty() || !ctx.removed.is_empty();
        if needs_link(&archive, &objects, forced)? {
            let command = ctx.commands.link_static(&objects, &archive)?;
            remove_if_exists(&archive)?;
            info!("Linking {}", archive.display());
            run_command(self.runner, &command, config.project_dir())?;

            if layout.entry_point().is_file() {
                let entry = format!("{}_main", config.name);
                let rename = ctx.commands.rename_entry(&archive, &archive, "main", &entry);
                run_command(self.runner, &rename, config.project_dir())?;
            }
        }
        self.persist(&ctx)?;

        // Test binaries
        self.enter(&config.name, BuildPhase::Linking);
        let test_dir = layout.test_dir();
        let test_sources = collect_test_sources(&test_dir)?;
        let mut test_tracked = collect_files(&test_dir, &["c", "h"])?;
        test_tracked.extend(ctx.tracked.iter().filter(|f| f.extension().is_some_and(|e| e == "h")).cloned());

        let mut test_includes = vec![test_dir.clone()];
        test_includes.extend(ctx.include_paths.iter().cloned());

        let test_record = StalenessRecord::load(&layout.test_cache_file());
        let stale_tests = StalenessTracker::new(&test_record, &test_includes, &config_file)
            .compute_stale_set(&test_tracked)?;
        let relinked_dependency = flags.artifacts.iter().any(|a| relinked.contains(a));

        let mut compile_commands = Vec::new();
        let mut link_commands = Vec::new();
        for test in &test_sources {
            let object = layout.test_object_for(test);
            let binary = layout.test_binary_for(test);

            let recompile = stale_tests.contains(test) || !object.is_file();
            if recompile {
                compile_commands.push(ctx.commands.compile_object(
                    test,
                    &object,
                    &test_includes,
                    &flags.cflags,
                    false,
                ));
            }

            let mut inputs = vec![object.clone(), archive.clone()];
            inputs.extend(flags.artifacts.iter().cloned());
            if needs_link(&binary, &inputs, recompile || relinked_dependency)? {
                link_commands.push(ctx.commands.link_executable(
                    &[object, archive.clone()],
                    &test_includes,
                    &flags.library_paths,
                    &flags.link_names,
                    &binary,
                )?);
            }
        }
        self.enter(&config.name, BuildPhase::CompilingObjects);
        self.executor(config).run_all("Compiling test", &compile_commands)?;
        self.enter(&config.name, BuildPhase::Linking);
        self.executor(config).run_all("Linking test", &link_commands)?;

        self.enter(&config.name, BuildPhase::PersistingCache);
        StalenessRecord::save_current(&test_tracked, &config_file, &layout.test_cache_file())?;

        self.enter(&config.name, BuildPhase::RunningTests);
        let mut report = TestReport {
            rebuilt: link_commands.into_iter().map(|c| c.output).collect(),
            ..TestReport::default()
        };
        for test in &test_sources {
            let binary = layout.test_binary_for(test);
            let mut argv = vec![binary.to_string_lossy().into_owned()];
            argv.extend(args.iter().cloned());

            info!("Running {}", binary.display());
            match self.runner.run(&argv, config.project_dir()) {
                Ok(Some(0)) => report.passed.push(binary),
                Ok(code) => report.failed.push((binary, CommandStatus::from_code(code))),
                Err(e) => return Err(BuildError::io(&binary, e)),
            }
        }

        info!(
            "{}: {} passed, {} failed",
            config.name,
            report.passed.len(),
            report.failed.len()
        );
        self.enter(&config.name, BuildPhase::Done);
        Ok(report)
    }
}
