// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Locates (or lazily creates) the coordinator owning a given workflow.
//! Creation is compare-and-insert safe: two concurrent lookups for the
//! same never-before-seen workflow id only ever construct one coordinator.
//!
//! Also implements [`Committer`], the trait boundary the dispatcher calls
//! through — the dispatcher depends on this trait, not on a concrete
//! coordinator type, so neither subsystem owns the other.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use wfe_core::{LogicalClock, WorkflowId};
use wfe_storage::WalService;

use crate::coordinator::{Coordinator, CoordinatorError};

#[derive(Debug, Error)]
pub enum CommitError {
    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),
    #[error("workflow not found")]
    NotFound,
}

/// The seam the dispatcher reports worker results through, without
/// depending on the coordinator registry's concrete type.
#[async_trait]
pub trait Committer: Send + Sync {
    async fn report_step_completed(
        &self,
        workflow_id: &WorkflowId,
        step: &str,
        result: serde_json::Value,
        duration_ms: u64,
        idempotency_key: Option<String>,
    ) -> Result<(), CommitError>;

    async fn report_step_failed(
        &self,
        workflow_id: &WorkflowId,
        step: &str,
        error: String,
        retryable: bool,
        idempotency_key: Option<String>,
    ) -> Result<(), CommitError>;
}

pub struct CoordinatorRegistry<C: LogicalClock> {
    wal: Arc<Mutex<WalService>>,
    clock: C,
    coordinators: Mutex<HashMap<WorkflowId, Arc<Coordinator<C>>>>,
}

impl<C: LogicalClock> CoordinatorRegistry<C> {
    pub fn new(wal: Arc<Mutex<WalService>>, clock: C) -> Self {
        Self {
            wal,
            clock,
            coordinators: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the existing coordinator for `workflow_id`, or creates and
    /// hydrates one from the WAL. Never constructs two coordinators for the
    /// same id even under concurrent callers.
    pub fn get_or_create(&self, workflow_id: &WorkflowId) -> Arc<Coordinator<C>> {
        let mut coordinators = self.coordinators.lock();
        if let Some(existing) = coordinators.get(workflow_id) {
            return existing.clone();
        }
        let coordinator = Arc::new(Coordinator::new(
            workflow_id.clone(),
            self.wal.clone(),
            self.clock.clone(),
        ));
        // Best-effort: a workflow with no events yet simply hydrates to
        // the uninitialized projection.
        let _ = coordinator.hydrate();
        coordinators.insert(workflow_id.clone(), coordinator.clone());
        coordinator
    }

    pub fn get(&self, workflow_id: &WorkflowId) -> Option<Arc<Coordinator<C>>> {
        self.coordinators.lock().get(workflow_id).cloned()
    }
}

#[async_trait]
impl<C: LogicalClock + 'static> Committer for CoordinatorRegistry<C> {
    async fn report_step_completed(
        &self,
        workflow_id: &WorkflowId,
        step: &str,
        result: serde_json::Value,
        duration_ms: u64,
        idempotency_key: Option<String>,
    ) -> Result<(), CommitError> {
        let coordinator = self.get(workflow_id).ok_or(CommitError::NotFound)?;
        coordinator
            .step_completed(step, result, duration_ms, idempotency_key)
            .map_err(CommitError::from)
    }

    async fn report_step_failed(
        &self,
        workflow_id: &WorkflowId,
        step: &str,
        error: String,
        retryable: bool,
        idempotency_key: Option<String>,
    ) -> Result<(), CommitError> {
        let coordinator = self.get(workflow_id).ok_or(CommitError::NotFound)?;
        coordinator
            .step_failed(step, error, retryable, idempotency_key)
            .map_err(CommitError::from)
    }
}
