//! Builds spanning nested projects

mod common;

use buildc::{BuildError, BuildOrchestrator, ConfigError};
use common::{EDIT_TIME, RecordingRunner, Workspace, options};

fn nested(name: &str, dir: &str) -> String {
    format!("\n[[dependency]]\nname = \"{name}\"\nkind = \"nested\"\ndir = \"{dir}\"\n")
}

/// app -> (b, c), b -> d, c -> d
fn diamond(ws: &Workspace) {
    let _ = ws.project("d", "", &[("src/d.c", ""), ("src/d.h", "int d(void);\n")]);
    let _ = ws.project("b", &nested("d", "../d"), &[("src/b.c", "#include \"d.h\"\n")]);
    let _ = ws.project("c", &nested("d", "../d"), &[("src/c.c", "#include \"d.h\"\n")]);
    let _ = ws.project(
        "app",
        &format!("{}{}", nested("b", "../b"), nested("c", "../c")),
        &[("src/main.c", "int main(void) { return 0; }\n")],
    );
}

#[test]
fn test_diamond_builds_shared_dependency_once() {
    let ws = Workspace::new();
    diamond(&ws);
    let config = ws.config("app");
    let runner = RecordingRunner::new();

    let report = BuildOrchestrator::new(&runner, options()).build(&config).unwrap();

    assert_eq!(runner.compiled(), vec!["d.c", "b.c", "c.c", "main.c"]);
    assert_eq!(runner.archived(), vec!["libd.a", "libb.a", "libc.a"]);
    assert_eq!(runner.linked(), vec!["app"]);

    let names: Vec<&str> = report.dependencies.iter().map(|r| r.project.as_str()).collect();
    assert_eq!(names, vec!["d", "b", "c"]);

    let link = runner.calls().last().unwrap().clone();
    let link_names: Vec<&String> = link.iter().filter(|a| a.starts_with("-l")).collect();
    assert_eq!(link_names, vec!["-lb", "-lc", "-ld"]);
}

#[test]
fn test_nested_outputs_live_under_root_build_dir() {
    let ws = Workspace::new();
    diamond(&ws);
    let config = ws.config("app");
    let runner = RecordingRunner::new();

    let report = BuildOrchestrator::new(&runner, options()).build(&config).unwrap();

    let d = &report.dependencies[0];
    assert_eq!(
        d.artifact,
        config.layout.deps_dir().join("d/release/bin/libd.a")
    );
    assert!(d.artifact.is_file());
    assert!(!ws.path("d/.build").exists());
}

#[test]
fn test_nested_change_relinks_dependents() {
    let ws = Workspace::new();
    diamond(&ws);
    let config = ws.config("app");
    let runner = RecordingRunner::new();
    let _ = BuildOrchestrator::new(&runner, options()).build(&config).unwrap();

    runner.clear();
    ws.touch("d/src/d.c", EDIT_TIME);
    let _ = BuildOrchestrator::new(&runner, options()).build(&config).unwrap();

    assert_eq!(runner.compiled(), vec!["d.c"]);
    assert_eq!(runner.archived(), vec!["libd.a"]);
    assert_eq!(runner.linked(), vec!["app"]);
}

#[test]
fn test_nested_header_change_recompiles_dependents() {
    let ws = Workspace::new();
    diamond(&ws);
    let config = ws.config("app");
    let runner = RecordingRunner::new();
    let _ = BuildOrchestrator::new(&runner, options()).build(&config).unwrap();

    runner.clear();
    ws.touch("d/src/d.h", EDIT_TIME);
    let _ = BuildOrchestrator::new(&runner, options()).build(&config).unwrap();

    assert_eq!(runner.compiled(), vec!["b.c", "c.c"]);
    assert_eq!(runner.archived(), vec!["libb.a", "libc.a"]);
    assert_eq!(runner.linked(), vec!["app"]);
}

#[test]
fn test_cycle_rejected_before_any_process() {
    let ws = Workspace::new();
    let _ = ws.project("a", &nested("b", "../b"), &[("src/a.c", "")]);
    let _ = ws.project("b", &nested("a", "../a"), &[("src/b.c", "")]);
    let _ = ws.project(
        "app",
        &nested("a", "../a"),
        &[("src/main.c", "int main(void) { return 0; }\n")],
    );
    let config = ws.config("app");
    let runner = RecordingRunner::new();

    let err = BuildOrchestrator::new(&runner, options()).build(&config).unwrap_err();

    match err {
        BuildError::Config(ConfigError::CyclicDependency(path)) => {
            assert!(path.contains('a') && path.contains('b'), "{path}");
        }
        other => panic!("expected a cycle, got {other}"),
    }
    assert!(runner.calls().is_empty());
    assert!(!config.layout.build_root().exists());
}

#[test]
fn test_nested_failure_names_the_dependency() {
    let ws = Workspace::new();
    diamond(&ws);
    let config = ws.config("app");
    let runner = RecordingRunner::failing("d.c");

    let err = BuildOrchestrator::new(&runner, options()).build(&config).unwrap_err();

    assert!(matches!(&err, BuildError::Dependency { name, .. } if name == "d"));
    assert!(err.to_string().starts_with("Dependency 'd' failed to build"));
    assert_eq!(runner.compiled(), vec!["d.c"]);
    assert!(!config.layout.cache_file().exists());
}

#[test]
fn test_missing_nested_project() {
    let ws = Workspace::new();
    let _ = ws.project("app", &nested("ghost", "../ghost"), &[("src/main.c", "")]);
    let config = ws.config("app");
    let runner = RecordingRunner::new();

    let err = BuildOrchestrator::new(&runner, options()).build(&config).unwrap_err();

    assert!(matches!(
        err,
        BuildError::Config(ConfigError::MissingProjectFile(_))
    ));
    assert!(runner.calls().is_empty());
}

#[test]
fn test_static_dependency_flags() {
    let ws = Workspace::new();
    ws.write("vendor/zlib/include/zlib.h", "");
    let _ = ws.project(
        "app",
        "\n[[dependency]]\nname = \"z\"\ndir = \"../vendor/zlib\"\ninclude = [\"include\"]\nlib_dir = \"lib\"\ncflags = [\"-DHAVE_ZLIB\"]\n",
        &[("src/main.c", "int main(void) { return 0; }\n")],
    );
    let config = ws.config("app");
    let runner = RecordingRunner::new();

    let _ = BuildOrchestrator::new(&runner, options()).build(&config).unwrap();

    let calls = runner.calls();
    let include = format!("-I{}", ws.path("vendor/zlib/include").display());
    assert!(calls[0].contains(&include));
    assert!(calls[0].contains(&"-DHAVE_ZLIB".to_string()));

    let link = &calls[1];
    assert!(link.contains(&format!("-L{}", ws.path("vendor/zlib/lib").display())));
    assert_eq!(link[link.len() - 3], "-lz");
}
