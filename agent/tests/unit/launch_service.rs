//! Launch orchestration: self-run, delegation and fallback.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::cell::Cell;
use std::path::{Path, PathBuf};

use fleetwatch::application::services::launch::{LaunchOrchestrator, LaunchOutcome, LaunchState};
use fleetwatch::domain::config::CURRENT_APP_KEY;
use fleetwatch::infra::process::CommandLauncher;

use crate::mocks::{BrokenStore, InstallResult, MemoryStore, RecordingLauncher, StubInstaller};

const INSTALLED: &str = "/opt/fleetwatch/updates/v1.3.0-fleetwatch";

fn handoff() -> Vec<String> {
    ["--workdir", "/w", "--token", "t", "--url", "https://collector.example"]
        .map(String::from)
        .to_vec()
}

fn recorded_store() -> MemoryStore {
    MemoryStore::with(CURRENT_APP_KEY, INSTALLED.as_bytes())
}

#[test]
fn test_empty_store_runs_self() {
    let installer = StubInstaller::new(InstallResult::NoUpdate);
    let store = MemoryStore::default();
    let launcher = RecordingLauncher::exiting(0);
    let orchestrator = LaunchOrchestrator::new(&installer, &store, &launcher);

    assert_eq!(orchestrator.decide("v1.0.0"), LaunchState::SelfRun);

    let ran = Cell::new(0);
    let outcome = orchestrator
        .run("v1.0.0", &handoff(), || {
            ran.set(ran.get() + 1);
            Ok(())
        })
        .unwrap();
    assert!(matches!(outcome, LaunchOutcome::RanSelf));
    assert_eq!(ran.get(), 1);
    assert!(launcher.calls.borrow().is_empty());
}

#[test]
fn test_recorded_app_is_delegated_with_handoff_args() {
    let installer = StubInstaller::new(InstallResult::NoUpdate);
    let store = recorded_store();
    let launcher = RecordingLauncher::exiting(0);
    let orchestrator = LaunchOrchestrator::new(&installer, &store, &launcher);

    let outcome = orchestrator
        .run("v1.0.0", &handoff(), || panic!("must not run self"))
        .unwrap();

    assert!(matches!(outcome, LaunchOutcome::Delegated { ref program, .. } if program == Path::new(INSTALLED)));
    let calls = launcher.calls.borrow();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, PathBuf::from(INSTALLED));
    assert_eq!(calls[0].1, handoff());
}

#[test]
fn test_nonzero_exit_of_delegate_does_not_fall_back() {
    let installer = StubInstaller::new(InstallResult::NoUpdate);
    let store = recorded_store();
    let launcher = RecordingLauncher::exiting(3);
    let orchestrator = LaunchOrchestrator::new(&installer, &store, &launcher);

    let outcome = orchestrator
        .run("v1.0.0", &handoff(), || panic!("must not run self"))
        .unwrap();
    assert!(matches!(outcome, LaunchOutcome::Delegated { status, .. } if status.code() == Some(3)));
}

#[test]
fn test_unstartable_delegate_falls_back_in_same_run() {
    let installer = StubInstaller::new(InstallResult::NoUpdate);
    let store = recorded_store();
    let launcher = RecordingLauncher::unstartable();
    let orchestrator = LaunchOrchestrator::new(&installer, &store, &launcher);

    let ran = Cell::new(false);
    let outcome = orchestrator
        .run("v1.0.0", &handoff(), || {
            ran.set(true);
            Ok(())
        })
        .unwrap();
    assert!(matches!(outcome, LaunchOutcome::FellBack { .. }));
    assert!(ran.get());
}

#[test]
fn test_missing_binary_falls_back_with_real_launcher() {
    let installer = StubInstaller::new(InstallResult::NoUpdate);
    let store = MemoryStore::with(CURRENT_APP_KEY, b"/nonexistent/fleetwatch/v9.9.9-fleetwatch");
    let launcher = CommandLauncher;
    let orchestrator = LaunchOrchestrator::new(&installer, &store, &launcher);

    let ran = Cell::new(false);
    let outcome = orchestrator
        .run("v1.0.0", &handoff(), || {
            ran.set(true);
            Ok(())
        })
        .unwrap();
    assert!(matches!(outcome, LaunchOutcome::FellBack { .. }));
    assert!(ran.get());
}

#[test]
fn test_update_failures_are_advisory() {
    for result in [InstallResult::DownloadFailed, InstallResult::Rejected] {
        let installer = StubInstaller::new(result);
        let store = recorded_store();
        let launcher = RecordingLauncher::exiting(0);
        let orchestrator = LaunchOrchestrator::new(&installer, &store, &launcher);
        assert_eq!(
            orchestrator.decide("v1.0.0"),
            LaunchState::Delegate(PathBuf::from(INSTALLED))
        );
    }
}

#[test]
fn test_record_write_failure_forces_self_run() {
    let installer = StubInstaller::new(InstallResult::RecordFailed);
    let store = recorded_store();
    let launcher = RecordingLauncher::exiting(0);
    let orchestrator = LaunchOrchestrator::new(&installer, &store, &launcher);
    assert_eq!(orchestrator.decide("v1.0.0"), LaunchState::SelfRun);
}

#[test]
fn test_unreadable_record_runs_self() {
    let installer = StubInstaller::new(InstallResult::NoUpdate);
    let launcher = RecordingLauncher::exiting(0);
    let orchestrator = LaunchOrchestrator::new(&installer, &BrokenStore, &launcher);
    assert_eq!(orchestrator.decide("v1.0.0"), LaunchState::SelfRun);
}

#[test]
fn test_fresh_install_is_delegated() {
    let installer = StubInstaller::new(InstallResult::Installed(PathBuf::from(INSTALLED)));
    let store = recorded_store();
    let launcher = RecordingLauncher::exiting(0);
    let orchestrator = LaunchOrchestrator::new(&installer, &store, &launcher);
    assert_eq!(
        orchestrator.decide("v1.0.0"),
        LaunchState::Delegate(PathBuf::from(INSTALLED))
    );
    assert_eq!(installer.calls.get(), 1);
}

#[test]
fn test_record_pointing_at_running_binary_runs_self() {
    let installer = StubInstaller::new(InstallResult::NoUpdate);
    let store = recorded_store();
    let launcher = RecordingLauncher::exiting(0);
    let orchestrator =
        LaunchOrchestrator::new(&installer, &store, &launcher).with_self_exe(INSTALLED);
    assert_eq!(orchestrator.decide("v1.3.0"), LaunchState::SelfRun);
}
