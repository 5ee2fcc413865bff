//! Scenario A: a single-step workflow runs create -> schedule -> complete
//! -> finish and leaves behind exactly the WAL contents and final version
//! the event model predicts.

use std::sync::Arc;
use tempfile::tempdir;
use wfe_core::clock::FakeLogicalClock;
use wfe_core::state::OverallState;
use wfe_core::WorkflowId;
use wfe_engine::{AdvanceOutcome, Coordinator};
use wfe_storage::WalService;

#[test]
fn single_step_workflow_runs_to_completion_with_exact_wal_contents() {
    let dir = tempdir().expect("tmpdir");
    let wal = Arc::new(parking_lot::Mutex::new(
        WalService::open_default(dir.path()).expect("open wal"),
    ));
    let workflow_id = WorkflowId::new("wf-a");
    let coordinator = Coordinator::new(workflow_id.clone(), wal.clone(), FakeLogicalClock::new());

    coordinator
        .create("single_step", serde_json::json!({"x": 1}), vec!["only".into()])
        .expect("create");
    let scheduled = coordinator.advance().expect("schedule only");
    assert_eq!(
        scheduled,
        AdvanceOutcome::StepScheduled {
            step: "only".into(),
            attempt: 1
        }
    );
    coordinator
        .step_completed("only", serde_json::json!({"ok": true}), 42, None)
        .expect("complete only");
    let finished = coordinator.advance().expect("finish workflow");
    assert_eq!(finished, AdvanceOutcome::WorkflowCompleted);

    let state = coordinator.get_state();
    assert_eq!(state.overall, OverallState::Completed);
    assert_eq!(state.version, 4);

    let events = wal.lock().replay(&workflow_id).expect("replay");
    assert_eq!(events.len(), 4);
    assert_eq!(events[0].sequence, 0);
    assert_eq!(events[0].event_type(), "workflow_created");
    assert_eq!(events[1].event_type(), "step_scheduled");
    assert_eq!(events[2].event_type(), "step_completed");
    assert_eq!(events[3].event_type(), "workflow_completed");
    assert!(events[3].payload.is_terminal());
    let sequences: Vec<u64> = events.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, vec![0, 1, 2, 3]);
}
