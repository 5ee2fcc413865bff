//! Scenario B: a worker pulls a step but goes silent past the lease
//! duration. A second worker pulls the requeued task and commits first;
//! the original worker's late report is rejected by fencing, not applied
//! twice.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::tempdir;
use wfe_core::clock::FakeLogicalClock;
use wfe_core::state::StepState;
use wfe_core::WorkflowId;
use wfe_engine::{CoordinatorRegistry, Dispatcher, LeaseManager, RequestTaskOutcome, TaskQueue};
use wfe_storage::WalService;

#[tokio::test]
async fn expired_lease_is_requeued_and_the_stale_worker_loses_the_race() {
    let dir = tempdir().expect("tmpdir");
    let wal = Arc::new(parking_lot::Mutex::new(
        WalService::open_default(dir.path()).expect("open wal"),
    ));
    let registry = Arc::new(CoordinatorRegistry::new(wal, FakeLogicalClock::new()));
    let workflow_id = WorkflowId::new("wf-b");
    let coordinator = registry.get_or_create(&workflow_id);
    coordinator
        .create("flaky", serde_json::json!({}), vec!["only".into()])
        .expect("create");
    coordinator.advance().expect("schedule only");

    let queue = Arc::new(TaskQueue::new());
    queue.enqueue(workflow_id.clone(), "only", 1, 0, 0);
    let leases = Arc::new(LeaseManager::new());
    let dispatcher = Dispatcher::new(
        queue,
        leases,
        registry,
        Duration::from_millis(50),
        Duration::from_secs(60),
    );

    let now = Instant::now();
    let w1 = wfe_core::WorkerId::new("w1");
    dispatcher.register_worker(w1.clone(), now);
    let first = match dispatcher.request_task(&w1, now).expect("request") {
        RequestTaskOutcome::Granted(g) => g,
        RequestTaskOutcome::NoTask => panic!("expected a task for w1"),
    };
    assert_eq!(first.fencing_token, 1);

    // Lease (50ms) expires before w1 reports back.
    let past_expiry = now + Duration::from_millis(60);
    let w2 = wfe_core::WorkerId::new("w2");
    dispatcher.register_worker(w2.clone(), past_expiry);
    let second = match dispatcher.request_task(&w2, past_expiry).expect("request") {
        RequestTaskOutcome::Granted(g) => g,
        RequestTaskOutcome::NoTask => panic!("expected the requeued task for w2"),
    };
    assert_eq!(second.fencing_token, 2, "fencing token must advance on requeue");

    dispatcher
        .report_completed(
            &second.lease_id,
            second.fencing_token,
            serde_json::json!({"from": "w2"}),
            5,
            None,
            past_expiry,
        )
        .await
        .expect("w2's on-time report commits");

    let late_report = dispatcher
        .report_completed(
            &first.lease_id,
            first.fencing_token,
            serde_json::json!({"from": "w1"}),
            5,
            None,
            past_expiry,
        )
        .await;
    assert!(late_report.is_err(), "w1's late report must be rejected");

    assert_eq!(
        coordinator.get_state().step_states.get("only"),
        Some(&StepState::Completed)
    );
}
