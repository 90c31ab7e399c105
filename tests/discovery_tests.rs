//! Discovery against real shared libraries: the demo plugins plus a library
//! without the entry point. The libraries are built once per test binary.

use std::env::consts::{DLL_EXTENSION, DLL_PREFIX};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use ember::error::PluginLoadError;
use ember::plugins::PluginRegistry;
use ember::{ExitCode, Host};
use ember_sdk::Role;
use tempfile::{tempdir, TempDir};

/// Build output directory of the fixture libraries.
fn build_libraries() -> &'static Path {
    static BUILT: OnceLock<PathBuf> = OnceLock::new();
    BUILT.get_or_init(|| {
        let target = Path::new(env!("CARGO_TARGET_TMPDIR")).join("plugins");
        let root = Path::new(env!("CARGO_MANIFEST_DIR"));
        for manifest in ["demos/plugins/Cargo.toml", "tests/fixtures/no_entry/Cargo.toml"] {
            let status = Command::new(env!("CARGO"))
                .args(["build", "--quiet", "--offline", "--manifest-path"])
                .arg(root.join(manifest))
                .arg("--target-dir")
                .arg(&target)
                .status()
                .unwrap();
            assert!(status.success(), "building {manifest} failed");
        }
        target.join("debug")
    })
}

/// Plugin directory holding the libraries installed the documented way:
/// `libgreeter.so` becomes `greeter.so`.
fn plugin_dir(crates: &[&str]) -> TempDir {
    let built = build_libraries();
    let dir = tempdir().unwrap();
    for name in crates {
        let from = built.join(format!("{DLL_PREFIX}{name}.{DLL_EXTENSION}"));
        let to = dir.path().join(format!("{name}.{DLL_EXTENSION}"));
        std::fs::copy(&from, &to).unwrap();
    }
    dir
}

fn file(name: &str) -> String {
    format!("{name}.{DLL_EXTENSION}")
}

fn dispatch(host: &mut Host, line: &str) -> (ExitCode, String) {
    let mut out: Vec<u8> = Vec::new();
    let code = host.handle_line(line, &mut out);
    (code, String::from_utf8(out).unwrap())
}

#[test]
fn test_discover_loads_demo_plugins() {
    let dir = plugin_dir(&["greeter", "arith"]);
    let mut registry = PluginRegistry::new();

    let summary = registry.discover(dir.path()).unwrap();
    assert_eq!(summary.loaded, vec![file("arith"), file("greeter")]);
    assert!(summary.skipped.is_empty());

    let mut out: Vec<u8> = Vec::new();
    registry.broadcast_register(&mut out);
    assert!(out.is_empty());

    let roles: Vec<Role> = registry.iter().map(|p| p.role()).collect();
    assert_eq!(roles, vec![Role::CommandContributor, Role::Invokable]);
    assert!(registry.find_invokable("greeter").is_some());
    assert!(registry.find_invokable("libgreeter").is_none());
    assert_eq!(registry.commands_of_contributors().count(), 4);
}

#[test]
fn test_library_without_entry_point_is_skipped() {
    let dir = plugin_dir(&["greeter", "no_entry"]);
    let mut registry = PluginRegistry::new();

    let summary = registry.discover(dir.path()).unwrap();
    assert_eq!(summary.loaded, vec![file("greeter")]);
    assert_eq!(summary.skipped.len(), 1);

    let (path, err) = &summary.skipped[0];
    assert_eq!(path, &dir.path().join(file("no_entry")));
    assert!(matches!(err, PluginLoadError::MissingEntryPoint { .. }), "{err}");
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_rediscover_after_teardown() {
    let dir = plugin_dir(&["greeter", "arith"]);
    let mut registry = PluginRegistry::new();

    let first = registry.discover(dir.path()).unwrap();
    let old_ids: Vec<u32> = registry.iter().map(|p| p.id().get()).collect();

    registry.teardown();
    assert!(registry.is_empty());
    // Second teardown is a no-op
    registry.teardown();

    let second = registry.discover(dir.path()).unwrap();
    let new_ids: Vec<u32> = registry.iter().map(|p| p.id().get()).collect();

    assert_eq!(first.loaded, second.loaded);
    assert_eq!(new_ids.len(), old_ids.len());
    let newest_old = old_ids.iter().max().unwrap();
    assert!(new_ids.iter().all(|id| id > newest_old), "{old_ids:?} -> {new_ids:?}");

    // Fresh plugins register again after reload
    let mut out: Vec<u8> = Vec::new();
    registry.broadcast_register(&mut out);
    assert!(registry.iter().all(|p| p.is_registered()));
}

#[test]
fn test_host_runs_loaded_plugins() {
    let dir = plugin_dir(&["greeter", "arith"]);
    let mut host = Host::new(dir.path()).unwrap();
    host.start_plugins().unwrap();

    let mut out: Vec<u8> = Vec::new();
    host.greet(&mut out);
    assert!(out.is_empty());

    assert_eq!(
        dispatch(&mut host, "run greeter"),
        (ExitCode::SUCCESS, "Hello world!\r\n".to_string())
    );
    assert_eq!(dispatch(&mut host, "addi 40 2"), (ExitCode::SUCCESS, "42\r\n".to_string()));
    assert_eq!(dispatch(&mut host, "ec hi"), (ExitCode::SUCCESS, "hi\r\n".to_string()));
    assert_eq!(
        dispatch(&mut host, "mods show"),
        (ExitCode::SUCCESS, format!("{}\r\n", file("greeter")))
    );

    host.shutdown();
    assert!(host.state().registry().is_empty());
}
