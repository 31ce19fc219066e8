//! The once-per-suite build barrier under contention.
#![cfg(unix)]

use credhub_acceptance::process::BUILD_DIR_NAME;
use credhub_acceptance::{BuildTarget, HarnessError, ProcessRunner, SharedBuild};
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;

/// A build command that appends to `counter` and writes a runnable stub.
fn counting_build(counter: &std::path::Path) -> BuildTarget {
    BuildTarget::Command {
        command: format!(
            r##"sh -c 'sleep 0.2; echo built >> "$0"; printf "#!/bin/sh\necho fake-cli\n" > "$1"; chmod +x "$1"' {} {{output}}"##,
            counter.display()
        ),
        artifact: "credhub".to_string(),
    }
}

#[test]
fn test_concurrent_workers_share_one_build() {
    let dir = TempDir::new().unwrap();
    let counter = dir.path().join("builds.log");
    let shared = Arc::new(SharedBuild::new(counting_build(&counter)));
    let start = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let shared = shared.clone();
            let start = start.clone();
            thread::spawn(move || {
                start.wait();
                shared.get().unwrap().path().to_path_buf()
            })
        })
        .collect();

    let paths: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(paths.windows(2).all(|w| w[0] == w[1]));

    let builds = std::fs::read_to_string(&counter).unwrap();
    assert_eq!(builds.lines().count(), 1);

    let result = ProcessRunner::new(&paths[0]).run(Vec::<String>::new()).unwrap();
    result.assert_success().assert_stdout_matches("fake-cli");
}

#[test]
fn test_teardown_is_idempotent_and_final() {
    let dir = TempDir::new().unwrap();
    let shared = SharedBuild::new(counting_build(&dir.path().join("builds.log")));
    let binary = shared.get().unwrap();
    let artifacts = binary.artifacts_dir().unwrap().to_path_buf();
    assert!(artifacts.is_dir());

    shared.teardown().unwrap();
    shared.teardown().unwrap();
    assert!(!artifacts.exists());

    let err = shared.get().unwrap_err();
    assert!(matches!(err, HarnessError::Build(_)));
}

#[test]
fn test_build_that_produces_nothing_fails() {
    let shared = SharedBuild::new(BuildTarget::Command {
        command: "true {output}".to_string(),
        artifact: "credhub".to_string(),
    });
    let err = shared.get().unwrap_err();
    assert!(err.to_string().contains("was not produced"));
}

#[test]
fn test_failing_build_reports_stderr() {
    let shared = SharedBuild::new(BuildTarget::Command {
        command: "sh -c 'echo compile error >&2; exit 2'".to_string(),
        artifact: "credhub".to_string(),
    });
    let err = shared.get().unwrap_err();
    assert!(err.is_harness_fatal());
    assert!(err.to_string().contains("compile error"));
}

#[test]
fn test_persistent_root_replaces_previous_run() {
    let dir = TempDir::new().unwrap();
    let counter = dir.path().join("builds.log");
    let root = dir.path().join("target-tmp");
    let build_dir = root.join(BUILD_DIR_NAME);
    std::fs::create_dir_all(&build_dir).unwrap();
    std::fs::write(build_dir.join("stale-artifact"), "old").unwrap();

    let target = counting_build(&counter);
    let shared = SharedBuild::new(target.clone()).in_dir(&root);
    assert_eq!(shared.target(), &target);

    let binary = shared.get().unwrap();
    assert_eq!(binary.artifacts_dir(), Some(build_dir.as_path()));
    assert!(binary.path().starts_with(&build_dir));
    assert!(!build_dir.join("stale-artifact").exists());

    let runner = ProcessRunner::for_binary(&binary);
    assert_eq!(runner.program(), binary.path());
    runner
        .run(Vec::<String>::new())
        .unwrap()
        .assert_success()
        .assert_stdout_matches("fake-cli");

    shared.teardown().unwrap();
    assert!(!build_dir.exists());
    assert!(root.is_dir());
}
