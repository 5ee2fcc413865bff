// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Issues time-bounded leases with monotonically increasing fencing
//! tokens per (workflow, step), and validates commit attempts against
//! them. The fencing discipline — not clock discipline — is what keeps a
//! stalled or superseded worker from double-committing.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use wfe_core::{Lease, LeaseId, WorkflowId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LeaseError {
    #[error("lease expired")]
    LeaseExpired,
    #[error("fencing token stale")]
    FencingTokenStale,
    #[error("lease unknown")]
    LeaseUnknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseCheck {
    Valid,
    Expired,
    Unknown,
}

#[derive(Default)]
struct Inner {
    leases: HashMap<LeaseId, Lease>,
    /// Highest fencing token ever issued per (workflow_id, step).
    tokens: HashMap<(WorkflowId, String), u64>,
    next_lease_seq: u64,
}

/// Single-writer owner of all lease state. Safe to share across tasks via
/// `Arc`; internally synchronized.
#[derive(Default)]
pub struct LeaseManager {
    inner: Mutex<Inner>,
}

impl LeaseManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically increments the (workflow_id, step) token and issues a
    /// lease carrying it. Each call yields a strictly larger token than any
    /// prior call for the same pair, for the lifetime of this manager.
    pub fn acquire(
        &self,
        workflow_id: WorkflowId,
        step: impl Into<String>,
        attempt: u32,
        duration: Duration,
        now: Instant,
    ) -> Lease {
        let step = step.into();
        let mut inner = self.inner.lock();

        let key = (workflow_id.clone(), step.clone());
        let token = inner.tokens.get(&key).copied().unwrap_or(0) + 1;
        inner.tokens.insert(key, token);

        inner.next_lease_seq += 1;
        let lease_id = LeaseId::new(format!("lease-{}", inner.next_lease_seq));

        let lease = Lease {
            lease_id: lease_id.clone(),
            workflow_id,
            step,
            attempt,
            expires_at: now + duration,
            fencing_token: token,
        };
        inner.leases.insert(lease_id, lease.clone());
        lease
    }

    pub fn check(&self, lease_id: &LeaseId, now: Instant) -> LeaseCheck {
        let inner = self.inner.lock();
        match inner.leases.get(lease_id) {
            None => LeaseCheck::Unknown,
            Some(lease) if lease.is_expired(now) => LeaseCheck::Expired,
            Some(_) => LeaseCheck::Valid,
        }
    }

    /// `Ok` only when the lease exists, has not expired, the submitted
    /// token matches the lease's own token, AND that token is still the
    /// current highest for the (workflow_id, step) pair.
    pub fn validate_for_commit(
        &self,
        lease_id: &LeaseId,
        token: u64,
        now: Instant,
    ) -> Result<(), LeaseError> {
        let inner = self.inner.lock();
        let lease = inner.leases.get(lease_id).ok_or(LeaseError::LeaseUnknown)?;
        if lease.is_expired(now) {
            return Err(LeaseError::LeaseExpired);
        }
        if lease.fencing_token != token {
            return Err(LeaseError::FencingTokenStale);
        }
        let key = (lease.workflow_id.clone(), lease.step.clone());
        let current_highest = inner.tokens.get(&key).copied().unwrap_or(0);
        if current_highest != token {
            return Err(LeaseError::FencingTokenStale);
        }
        Ok(())
    }

    pub fn release(&self, lease_id: &LeaseId) {
        self.inner.lock().leases.remove(lease_id);
    }

    /// Remove every lease whose deadline has passed.
    pub fn sweep_expired(&self, now: Instant) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.leases.len();
        inner.leases.retain(|_, lease| !lease.is_expired(now));
        before - inner.leases.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wf(id: &str) -> WorkflowId {
        WorkflowId::new(id)
    }

    #[test]
    fn acquire_issues_strictly_increasing_tokens_for_same_pair() {
        let mgr = LeaseManager::new();
        let now = Instant::now();
        let l1 = mgr.acquire(wf("wf1"), "s1", 1, Duration::from_secs(30), now);
        let l2 = mgr.acquire(wf("wf1"), "s1", 2, Duration::from_secs(30), now);
        assert_eq!(l1.fencing_token, 1);
        assert_eq!(l2.fencing_token, 2);
    }

    #[test]
    fn tokens_are_independent_per_workflow_and_step() {
        let mgr = LeaseManager::new();
        let now = Instant::now();
        let l1 = mgr.acquire(wf("wf1"), "s1", 1, Duration::from_secs(30), now);
        let l2 = mgr.acquire(wf("wf1"), "s2", 1, Duration::from_secs(30), now);
        let l3 = mgr.acquire(wf("wf2"), "s1", 1, Duration::from_secs(30), now);
        assert_eq!(l1.fencing_token, 1);
        assert_eq!(l2.fencing_token, 1);
        assert_eq!(l3.fencing_token, 1);
    }

    #[test]
    fn validate_for_commit_succeeds_for_current_lease() {
        let mgr = LeaseManager::new();
        let now = Instant::now();
        let l = mgr.acquire(wf("wf1"), "s1", 1, Duration::from_secs(30), now);
        assert!(mgr
            .validate_for_commit(&l.lease_id, l.fencing_token, now)
            .is_ok());
    }

    #[test]
    fn validate_for_commit_rejects_unknown_lease() {
        let mgr = LeaseManager::new();
        let now = Instant::now();
        let result = mgr.validate_for_commit(&LeaseId::new("nope"), 1, now);
        assert_eq!(result, Err(LeaseError::LeaseUnknown));
    }

    #[test]
    fn validate_for_commit_rejects_expired_lease() {
        let mgr = LeaseManager::new();
        let now = Instant::now();
        let l = mgr.acquire(wf("wf1"), "s1", 1, Duration::from_millis(0), now);
        let later = now + Duration::from_millis(5);
        let result = mgr.validate_for_commit(&l.lease_id, l.fencing_token, later);
        assert_eq!(result, Err(LeaseError::LeaseExpired));
    }

    #[test]
    fn validate_for_commit_rejects_stale_token_after_newer_acquire() {
        let mgr = LeaseManager::new();
        let now = Instant::now();
        let stale = mgr.acquire(wf("wf1"), "s1", 1, Duration::from_secs(30), now);
        let fresh = mgr.acquire(wf("wf1"), "s1", 2, Duration::from_secs(30), now);
        let result = mgr.validate_for_commit(&stale.lease_id, stale.fencing_token, now);
        assert_eq!(result, Err(LeaseError::FencingTokenStale));
        assert!(mgr
            .validate_for_commit(&fresh.lease_id, fresh.fencing_token, now)
            .is_ok());
    }

    #[test]
    fn release_removes_the_lease() {
        let mgr = LeaseManager::new();
        let now = Instant::now();
        let l = mgr.acquire(wf("wf1"), "s1", 1, Duration::from_secs(30), now);
        mgr.release(&l.lease_id);
        assert_eq!(mgr.check(&l.lease_id, now), LeaseCheck::Unknown);
    }

    #[test]
    fn sweep_expired_removes_only_expired_leases() {
        let mgr = LeaseManager::new();
        let now = Instant::now();
        let expired = mgr.acquire(wf("wf1"), "s1", 1, Duration::from_millis(0), now);
        let fresh = mgr.acquire(wf("wf1"), "s2", 1, Duration::from_secs(30), now);
        let later = now + Duration::from_millis(5);

        let removed = mgr.sweep_expired(later);
        assert_eq!(removed, 1);
        assert_eq!(mgr.check(&expired.lease_id, later), LeaseCheck::Unknown);
        assert_eq!(mgr.check(&fresh.lease_id, later), LeaseCheck::Valid);
    }

    #[test]
    fn fencing_monotonicity_holds_under_interleaved_acquire_and_release() {
        let mgr = LeaseManager::new();
        let now = Instant::now();
        let mut tokens = Vec::new();
        for attempt in 1..=1000u32 {
            let l = mgr.acquire(wf("wf1"), "s1", attempt, Duration::from_secs(30), now);
            tokens.push(l.fencing_token);
            mgr.release(&l.lease_id);
        }
        let expected: Vec<u64> = (1..=1000).collect();
        assert_eq!(tokens, expected);
    }
}
