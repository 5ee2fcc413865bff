//! Scenario E: the tail of the active segment is corrupted (partial write
//! simulating a crash mid-append). Replay drops the corrupted entry and
//! everything after it, but the WAL remains writable and new appends keep
//! working.

use std::sync::Arc;
use tempfile::tempdir;
use wfe_core::clock::FakeLogicalClock;
use wfe_core::WorkflowId;
use wfe_engine::Coordinator;
use wfe_storage::segment::segment_path;
use wfe_storage::WalService;

#[test]
fn corruption_at_the_tail_is_dropped_and_new_appends_continue_cleanly() {
    let dir = tempdir().expect("tmpdir");
    let workflow_id = WorkflowId::new("wf-e");

    {
        let wal = Arc::new(parking_lot::Mutex::new(
            WalService::open_default(dir.path()).expect("open wal"),
        ));
        let coordinator =
            Coordinator::new(workflow_id.clone(), wal, FakeLogicalClock::new());
        coordinator
            .create("flow", serde_json::json!({}), vec!["s1".into()])
            .expect("create");
        coordinator.advance().expect("schedule s1");
    }

    // Flip a byte inside the last entry's payload to simulate a torn write.
    let path = segment_path(dir.path(), 0);
    let mut bytes = std::fs::read(&path).expect("read raw segment");
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    std::fs::write(&path, &bytes).expect("write corrupted tail");

    let wal = Arc::new(parking_lot::Mutex::new(
        WalService::open_default(dir.path()).expect("reopen wal after corruption"),
    ));
    let events = wal.lock().replay(&workflow_id).expect("replay survives corruption");
    assert_eq!(events.len(), 1, "only workflow_created survives, step_scheduled is dropped");
    assert_eq!(events[0].event_type(), "workflow_created");

    let coordinator = Coordinator::new(workflow_id.clone(), wal.clone(), FakeLogicalClock::new());
    coordinator.hydrate().expect("hydrate from the truncated log");
    // The log now looks like only workflow_created ever happened, so the
    // workflow can be driven forward again from that point.
    coordinator.advance().expect("reschedule s1 after recovery");

    let events_after = wal.lock().replay(&workflow_id).expect("replay after recovery");
    assert_eq!(events_after.len(), 2);
    assert_eq!(events_after[1].event_type(), "step_scheduled");

    // Recovery rotates away from the corrupted segment entirely: the
    // rescheduled step_scheduled lands in a brand new segment, not appended
    // back into segment 0 alongside the repaired tail.
    assert!(segment_path(dir.path(), 1).exists());
}
