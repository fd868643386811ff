//! Dependency resolution
//!
//! Expands a project's dependency declarations into include paths, library
//! paths, link names and compile flags, and plans the builds of nested
//! projects. Nested projects are nodes of a [`DAG`]; a declaration that would
//! close a cycle is rejected here, before anything is compiled.

use convenient_graph::{DAG, GraphError, NodeId};
use convenient_project::{
    BuildMode, ConfigError, DependencyDecl, DependencyKind, ProjectConfig,
};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Result;
use crate::fs::normalize;

/// Where project configurations come from.
pub trait ProjectSource {
    /// Load the project rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Fails if the project file is missing or invalid.
    fn load(&self, dir: &Path, mode: BuildMode) -> std::result::Result<ProjectConfig, ConfigError>;
}

/// Reads `buildc.toml` from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsProjectSource;

impl ProjectSource for FsProjectSource {
    fn load(&self, dir: &Path, mode: BuildMode) -> std::result::Result<ProjectConfig, ConfigError> {
        ProjectConfig::load(dir, mode)
    }
}

/// Flags a project needs to compile and link against its dependencies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyFlags {
    pub include_paths: Vec<PathBuf>,
    pub library_paths: Vec<PathBuf>,
    pub link_names: Vec<String>,
    pub cflags: Vec<String>,
    /// Nested artifacts linked by this project, for relink decisions
    pub artifacts: Vec<PathBuf>,
    /// Source directories of nested projects, their headers are tracked
    pub source_roots: Vec<PathBuf>,
}

impl DependencyFlags {
    fn add_static(&mut self, dependency: &StaticDependency) {
        self.include_paths.extend(dependency.include_dirs.iter().cloned());
        self.library_paths.extend(dependency.lib_dir.iter().cloned());
        self.link_names.push(dependency.link_name.clone());
        self.cflags.extend(dependency.cflags.iter().cloned());
    }

    fn add_nested(&mut self, build: &NestedBuild, decl: &DependencyDecl) {
        let source_dir = build.config.layout.source_dir();
        self.include_paths.push(source_dir.clone());
        self.include_paths.extend(
            decl.include
                .iter()
                .map(|dir| normalize(&build.config.project_dir().join(dir))),
        );
        self.include_paths.extend(build.flags.include_paths.iter().cloned());

        self.library_paths.push(build.config.layout.bin_dir());
        self.library_paths.extend(build.flags.library_paths.iter().cloned());

        self.link_names.push(build.config.name.clone());
        self.link_names.extend(build.flags.link_names.iter().cloned());

        self.artifacts.push(build.artifact.clone());
        self.artifacts.extend(build.flags.artifacts.iter().cloned());

        self.source_roots.push(source_dir);
        self.source_roots.extend(build.flags.source_roots.iter().cloned());
    }

    /// Paths keep their first occurrence, link names their last.
    ///
    /// On a single link line a library must follow every library that uses
    /// it, so the last position of a shared dependency is the one that counts.
    fn dedupe(&mut self) {
        dedupe_keep_first(&mut self.include_paths);
        dedupe_keep_first(&mut self.library_paths);
        dedupe_keep_first(&mut self.artifacts);
        dedupe_keep_first(&mut self.source_roots);

        let mut seen = HashSet::new();
        let mut reversed: Vec<String> = self
            .link_names
            .drain(..)
            .rev()
            .filter(|name| seen.insert(name.clone()))
            .collect();
        reversed.reverse();
        self.link_names = reversed;
    }
}

fn dedupe_keep_first(paths: &mut Vec<PathBuf>) {
    let mut seen = HashSet::new();
    paths.retain(|path| seen.insert(path.clone()));
}

/// A resolved prebuilt library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticDependency {
    pub name: String,
    pub include_dirs: Vec<PathBuf>,
    pub lib_dir: Option<PathBuf>,
    pub link_name: String,
    pub cflags: Vec<String>,
}

impl StaticDependency {
    fn resolve(project_dir: &Path, decl: &DependencyDecl) -> Self {
        let root = normalize(&decl.root(project_dir));
        Self {
            name: decl.name.clone(),
            include_dirs: decl.include.iter().map(|dir| normalize(&root.join(dir))).collect(),
            lib_dir: decl.lib_dir.as_ref().map(|dir| normalize(&root.join(dir))),
            link_name: decl.link_name().to_string(),
            cflags: decl.cflags.clone(),
        }
    }
}

/// A resolved dependency declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dependency {
    Static(StaticDependency),
    /// Refers to the build of the nested project at `project_dir` in `mode`
    Nested {
        name: String,
        project_dir: PathBuf,
        mode: BuildMode,
    },
}

/// A nested project to be built before its dependents.
#[derive(Debug, Clone)]
pub struct NestedBuild {
    /// Declared dependency name
    pub name: String,
    /// Configuration with build outputs relocated below the root project
    pub config: ProjectConfig,
    /// The nested project's own resolved flags
    pub flags: DependencyFlags,
    /// The nested project's own resolved declarations
    pub dependencies: Vec<Dependency>,
    /// Library the build produces
    pub artifact: PathBuf,
}

/// Everything needed to build a project and its nested dependencies.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub flags: DependencyFlags,
    pub dependencies: Vec<Dependency>,
    /// Nested builds, dependencies before dependents, each project once
    pub builds: Vec<NestedBuild>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ProjectKey {
    dir: PathBuf,
    mode: BuildMode,
}

impl ProjectKey {
    fn of(config: &ProjectConfig) -> Self {
        Self {
            dir: normalize(config.project_dir()),
            mode: config.mode,
        }
    }
}

/// Resolve `config` with projects loaded from disk.
///
/// # Errors
///
/// See [`DependencyResolver::resolve`].
pub fn resolve(config: &ProjectConfig) -> Result<Resolution> {
    DependencyResolver::new(&FsProjectSource).resolve(config)
}

/// Walks dependency declarations recursively.
pub struct DependencyResolver<'a> {
    source: &'a dyn ProjectSource,
    dag: DAG<String, ()>,
    nodes: HashMap<ProjectKey, NodeId>,
    builds: HashMap<NodeId, NestedBuild>,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(source: &'a dyn ProjectSource) -> Self {
        Self {
            source,
            dag: DAG::new(),
            nodes: HashMap::new(),
            builds: HashMap::new(),
        }
    }

    /// Resolve the root project.
    ///
    /// Nested outputs go to the root's `deps/<name>/<mode>` build directory,
    /// so a project reached through several paths is built once.
    ///
    /// # Errors
    ///
    /// Fails if a nested project cannot be loaded or the nested projects
    /// depend on each other in a cycle.
    pub fn resolve(mut self, root: &ProjectConfig) -> Result<Resolution> {
        let root_node = self.dag.add_node(root.name.clone());
        let _ = self.nodes.insert(ProjectKey::of(root), root_node);

        let deps_dir = root.layout.deps_dir();
        let (flags, dependencies) = self.resolve_declarations(root, root_node, &deps_dir)?;

        let builds: Vec<NestedBuild> = self
            .dag
            .topological_sort()
            .into_iter()
            .filter_map(|node| self.builds.remove(&node))
            .collect();

        debug!(
            "Resolved {}: {} nested builds, {} link names",
            root.name,
            builds.len(),
            flags.link_names.len()
        );

        Ok(Resolution {
            flags,
            dependencies,
            builds,
        })
    }

    fn resolve_declarations(
        &mut self,
        project: &ProjectConfig,
        node: NodeId,
        deps_dir: &Path,
    ) -> Result<(DependencyFlags, Vec<Dependency>)> {
        let mut flags = DependencyFlags::default();
        let mut dependencies = Vec::with_capacity(project.dependencies.len());

        for decl in &project.dependencies {
            match decl.kind {
                DependencyKind::Static => {
                    let dependency = StaticDependency::resolve(project.project_dir(), decl);
                    flags.add_static(&dependency);
                    dependencies.push(Dependency::Static(dependency));
                }
                DependencyKind::Nested => {
                    let nested = self.resolve_nested(project, node, decl, deps_dir)?;
                    if let Some(build) = self.builds.get(&nested) {
                        flags.add_nested(build, decl);
                        dependencies.push(Dependency::Nested {
                            name: decl.name.clone(),
                            project_dir: build.config.project_dir().to_path_buf(),
                            mode: build.config.mode,
                        });
                    }
                }
            }
        }

        flags.dedupe();
        Ok((flags, dependencies))
    }

    fn resolve_nested(
        &mut self,
        parent: &ProjectConfig,
        parent_node: NodeId,
        decl: &DependencyDecl,
        deps_dir: &Path,
    ) -> Result<NodeId> {
        let mode = decl.nested_mode();
        let loaded = self.source.load(&decl.root(parent.project_dir()), mode)?;
        let key = ProjectKey::of(&loaded);

        let node = match self.nodes.get(&key) {
            Some(&node) => node,
            None => {
                let node = self.dag.add_node(loaded.name.clone());
                let _ = self.nodes.insert(key, node);
                node
            }
        };

        self.dag
            .add_edge(node, parent_node, ())
            .map_err(|e| self.cycle_error(&e))?;

        if !self.builds.contains_key(&node) {
            let config = loaded
                .with_build_dir(deps_dir.join(&decl.name).join(mode.as_str()))
                .with_artifact(decl.nested_artifact())
                .with_extra_cflags(&decl.cflags);
            debug!("Planning nested build of {} ({})", config.name, mode);

            let (flags, dependencies) = self.resolve_declarations(&config, node, deps_dir)?;
            let artifact = config
                .layout
                .bin_dir()
                .join(decl.nested_artifact().file_name(&config.name));

            let _ = self.builds.insert(
                node,
                NestedBuild {
                    name: decl.name.clone(),
                    config,
                    flags,
                    dependencies,
                    artifact,
                },
            );
        }

        Ok(node)
    }

    /// Describe a cycle as "a -> b -> a", read as "a depends on b".
    fn cycle_error(&self, error: &GraphError) -> ConfigError {
        match error {
            GraphError::CycleDetected(path) => {
                let names: Vec<&str> = path
                    .iter()
                    .rev()
                    .filter_map(|node| self.dag.node(*node).ok())
                    .map(String::as_str)
                    .collect();
                ConfigError::CyclicDependency(names.join(" -> "))
            }
            other => ConfigError::CyclicDependency(other.to_string()),
        }
    }
}
