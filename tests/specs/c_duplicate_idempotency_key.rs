//! Scenario C: two completion reports carrying the same idempotency key
//! must only ever be committed once, and the duplicate must never touch
//! the WAL.

use std::sync::Arc;
use tempfile::tempdir;
use wfe_core::clock::FakeLogicalClock;
use wfe_core::WorkflowId;
use wfe_engine::{Coordinator, CoordinatorError};
use wfe_storage::WalService;

#[test]
fn second_completion_with_the_same_idempotency_key_is_rejected_without_a_wal_write() {
    let dir = tempdir().expect("tmpdir");
    let wal = Arc::new(parking_lot::Mutex::new(
        WalService::open_default(dir.path()).expect("open wal"),
    ));
    let workflow_id = WorkflowId::new("wf-c");
    let coordinator = Coordinator::new(workflow_id.clone(), wal.clone(), FakeLogicalClock::new());

    coordinator
        .create("dupe", serde_json::json!({}), vec!["only".into()])
        .expect("create");
    coordinator.advance().expect("schedule");

    let key = wfe_core::idempotency_key(&workflow_id, "only", 1);
    coordinator
        .step_completed("only", serde_json::json!({"v": 1}), 10, Some(key.clone()))
        .expect("first completion commits");

    let offset_after_first = wal.lock().current_offset();
    let version_after_first = coordinator.get_state().version;

    let err = coordinator
        .step_completed("only", serde_json::json!({"v": 2}), 10, Some(key))
        .expect_err("duplicate must be rejected");
    assert!(matches!(err, CoordinatorError::Duplicate));

    assert_eq!(wal.lock().current_offset(), offset_after_first, "no bytes appended");
    assert_eq!(coordinator.get_state().version, version_after_first);
}
