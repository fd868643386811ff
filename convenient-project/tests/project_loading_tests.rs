//! Loading buildc.toml files from disk

use convenient_project::{BuildMode, ConfigError, DependencyKind, ProjectConfig};
use std::fs;
use tempfile::TempDir;

fn write_project(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let root = dir.path().join(name);
    fs::create_dir_all(root.join("src")).unwrap();
    fs::write(root.join("buildc.toml"), content).unwrap();
    root
}

#[test]
fn test_load_from_directory() {
    let temp = TempDir::new().unwrap();
    let root = write_project(
        &temp,
        "hello",
        r#"
[project]
name = "hello"
version = "1.2.0"
cc = "clang"

[[dependency]]
name = "m"
"#,
    );

    let config = ProjectConfig::load(&root, BuildMode::Debug).unwrap();
    assert_eq!(config.name, "hello");
    assert_eq!(config.version, "1.2.0");
    assert_eq!(config.cc.as_deref(), Some("clang"));
    assert_eq!(config.mode, BuildMode::Debug);
    assert_eq!(config.dependencies[0].kind, DependencyKind::Static);
    assert_eq!(config.project_dir(), root.canonicalize().unwrap());
    assert!(config.layout.build_dir().ends_with(".build/debug"));
}

#[test]
fn test_relative_paths_compare_equal() {
    let temp = TempDir::new().unwrap();
    let root = write_project(&temp, "util", "[project]\nname = \"util\"\n");
    fs::create_dir_all(temp.path().join("app")).unwrap();

    let direct = ProjectConfig::load(&root, BuildMode::Release).unwrap();
    let roundabout =
        ProjectConfig::load(temp.path().join("app/../util"), BuildMode::Release).unwrap();
    assert_eq!(direct.project_dir(), roundabout.project_dir());
}

#[test]
fn test_missing_project_file() {
    let temp = TempDir::new().unwrap();
    let err = ProjectConfig::load(temp.path(), BuildMode::Debug).unwrap_err();
    assert!(matches!(err, ConfigError::MissingProjectFile(_)));
}

#[test]
fn test_malformed_project_file() {
    let temp = TempDir::new().unwrap();
    let root = write_project(&temp, "broken", "[project\nname = ");
    let err = ProjectConfig::load(&root, BuildMode::Debug).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains("buildc.toml"));
}

#[test]
fn test_nested_build_overrides() {
    let temp = TempDir::new().unwrap();
    let root = write_project(&temp, "util", "[project]\nname = \"util\"\ncflags = [\"-Wall\"]\n");

    let config = ProjectConfig::load(&root, BuildMode::Release)
        .unwrap()
        .with_build_dir(temp.path().join("out/deps/util/release"))
        .with_extra_cflags(&["-DFAST".to_string()]);

    assert_eq!(config.cflags, ["-Wall", "-DFAST"]);
    assert_eq!(
        config.layout.bin_dir(),
        temp.path().join("out/deps/util/release/bin")
    );
}
