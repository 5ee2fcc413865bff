//! Scenario D: the process crashes mid-workflow. Reopening the WAL and
//! hydrating a fresh coordinator from it reproduces exactly the state the
//! crashed process had, and the workflow can be driven to completion from
//! there.

use std::sync::Arc;
use tempfile::tempdir;
use wfe_core::clock::FakeLogicalClock;
use wfe_core::state::{OverallState, StepState};
use wfe_core::WorkflowId;
use wfe_engine::{AdvanceOutcome, Coordinator};
use wfe_storage::WalService;

#[test]
fn restart_hydrates_the_same_state_a_crashed_process_would_have_had() {
    let dir = tempdir().expect("tmpdir");
    let workflow_id = WorkflowId::new("wf-d");

    let state_before_crash = {
        let wal = Arc::new(parking_lot::Mutex::new(
            WalService::open_default(dir.path()).expect("open wal"),
        ));
        let coordinator =
            Coordinator::new(workflow_id.clone(), wal, FakeLogicalClock::new());
        coordinator
            .create("two_step", serde_json::json!({}), vec!["first".into(), "second".into()])
            .expect("create");
        coordinator.advance().expect("schedule first");
        coordinator
            .step_completed("first", serde_json::json!({}), 5, None)
            .expect("complete first");
        // Crash here: "second" never gets scheduled before the process dies.
        coordinator.get_state()
    };

    // Simulate the restart: a fresh WalService over the same directory,
    // a fresh coordinator, hydrated from what's on disk.
    let wal_after_restart = Arc::new(parking_lot::Mutex::new(
        WalService::open_default(dir.path()).expect("reopen wal"),
    ));
    let recovered = Coordinator::new(workflow_id, wal_after_restart, FakeLogicalClock::new());
    recovered.hydrate().expect("hydrate from wal");

    let state_after_restart = recovered.get_state();
    assert_eq!(state_after_restart.version, state_before_crash.version);
    assert_eq!(state_after_restart.step_states, state_before_crash.step_states);
    assert_eq!(
        state_after_restart.step_states.get("first"),
        Some(&StepState::Completed)
    );
    assert_eq!(state_after_restart.overall, OverallState::Running);

    let outcome = recovered.advance().expect("schedule second after restart");
    assert_eq!(
        outcome,
        AdvanceOutcome::StepScheduled {
            step: "second".into(),
            attempt: 1
        }
    );
    recovered
        .step_completed("second", serde_json::json!({}), 5, None)
        .expect("complete second");
    assert_eq!(
        recovered.advance().expect("finish"),
        AdvanceOutcome::WorkflowCompleted
    );
    assert_eq!(recovered.get_state().overall, OverallState::Completed);
}
