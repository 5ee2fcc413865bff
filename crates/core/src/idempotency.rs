// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deterministic idempotency key derivation.
//!
//! `SHA-256(workflow_id ‖ step ‖ attempt)` — carried in the metadata of
//! commit-class events (`step_completed`, `step_failed`) so a duplicate
//! report of the same logical attempt can be recognized without relying on
//! the caller's own retry bookkeeping.

use crate::id::WorkflowId;
use sha2::{Digest, Sha256};

/// Fingerprint for a specific (workflow, step, attempt) triple.
pub fn idempotency_key(workflow_id: &WorkflowId, step: &str, attempt: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(workflow_id.as_str().as_bytes());
    hasher.update(step.as_bytes());
    hasher.update(attempt.to_be_bytes());
    format!("{:x}", hasher.finalize())
}
