//! Scenario F: 1000 interleaved lease acquire/release cycles for the same
//! (workflow, step) pair must yield strictly increasing fencing tokens
//! with no gaps and no repeats.

use std::time::{Duration, Instant};
use wfe_core::WorkflowId;
use wfe_engine::LeaseManager;

#[test]
fn fencing_tokens_are_strictly_monotonic_under_1000_interleaved_acquires() {
    let manager = LeaseManager::new();
    let now = Instant::now();
    let workflow_id = WorkflowId::new("wf-f");

    let mut tokens = Vec::with_capacity(1000);
    for attempt in 1..=1000u32 {
        let lease = manager.acquire(
            workflow_id.clone(),
            "contested_step",
            attempt,
            Duration::from_secs(30),
            now,
        );
        tokens.push(lease.fencing_token);
        // Interleave: every third lease is released immediately, mimicking
        // workers that finish quickly while others are still in flight.
        if attempt % 3 == 0 {
            manager.release(&lease.lease_id);
        }
    }

    let expected: Vec<u64> = (1..=1000).collect();
    assert_eq!(tokens, expected, "tokens must be dense and strictly increasing");
}
