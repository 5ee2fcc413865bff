// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bridges the task queue, the lease manager, and workers. Binds a pulled
//! task to a freshly-fenced lease, validates worker-reported results
//! against the current lease and token before ever forwarding them to a
//! [`Committer`], and tracks worker liveness via heartbeats.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};
use wfe_core::{LeaseId, Task, TaskId, WorkerId, WorkflowId};

use crate::lease_manager::{LeaseError, LeaseManager};
use crate::registry::{CommitError, Committer};
use crate::task_queue::TaskQueue;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Lease(#[from] LeaseError),
    #[error(transparent)]
    Commit(#[from] CommitError),
    #[error("worker not registered")]
    WorkerNotRegistered,
    #[error("lease validated but has no in-flight task bound to it")]
    NoInFlightTask,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    Idle,
    Busy,
}

struct WorkerRecord {
    status: WorkerStatus,
    last_heartbeat: Instant,
}

/// A task handed to a worker, paired with the lease fencing its commit.
#[derive(Debug, Clone)]
pub struct GrantedTask {
    pub task_id: TaskId,
    pub workflow_id: WorkflowId,
    pub step: String,
    pub attempt: u32,
    pub lease_id: LeaseId,
    pub fencing_token: u64,
    pub deadline: Instant,
}

#[derive(Debug, Clone)]
pub enum RequestTaskOutcome {
    Granted(GrantedTask),
    NoTask,
}

struct InFlight {
    task_id: TaskId,
    workflow_id: WorkflowId,
    step: String,
    worker_id: WorkerId,
}

struct Inner {
    workers: HashMap<WorkerId, WorkerRecord>,
    in_flight: HashMap<LeaseId, InFlight>,
}

pub struct Dispatcher {
    queue: Arc<TaskQueue>,
    leases: Arc<LeaseManager>,
    committer: Arc<dyn Committer>,
    lease_duration: Duration,
    worker_timeout: Duration,
    inner: Mutex<Inner>,
}

impl Dispatcher {
    pub fn new(
        queue: Arc<TaskQueue>,
        leases: Arc<LeaseManager>,
        committer: Arc<dyn Committer>,
        lease_duration: Duration,
        worker_timeout: Duration,
    ) -> Self {
        Self {
            queue,
            leases,
            committer,
            lease_duration,
            worker_timeout,
            inner: Mutex::new(Inner {
                workers: HashMap::new(),
                in_flight: HashMap::new(),
            }),
        }
    }

    /// Thin wrapper over `queue.enqueue`.
    pub fn schedule_step(
        &self,
        workflow_id: WorkflowId,
        step: impl Into<String>,
        attempt: u32,
        enqueued_at: u64,
    ) -> TaskId {
        self.queue.enqueue(workflow_id, step, attempt, 0, enqueued_at)
    }

    pub fn register_worker(&self, worker_id: WorkerId, now: Instant) {
        self.inner.lock().workers.insert(
            worker_id,
            WorkerRecord {
                status: WorkerStatus::Idle,
                last_heartbeat: now,
            },
        );
    }

    pub fn heartbeat(&self, worker_id: &WorkerId, now: Instant) {
        if let Some(record) = self.inner.lock().workers.get_mut(worker_id) {
            record.last_heartbeat = now;
        }
    }

    /// Remove workers silent for longer than `worker_timeout`. Their
    /// in-flight tasks become orphans: the lease will eventually expire and
    /// [`Self::request_task`] will requeue it then.
    pub fn sweep_stale_workers(&self, now: Instant) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.workers.len();
        let timeout = self.worker_timeout;
        inner
            .workers
            .retain(|_, record| now.duration_since(record.last_heartbeat) <= timeout);
        let removed = before - inner.workers.len();
        if removed > 0 {
            warn!(removed, "pruned stale workers past heartbeat timeout");
        }
        removed
    }

    /// Requeue any in-flight task whose lease has expired. Runs before
    /// every pull so a crashed worker's task becomes available again.
    fn requeue_expired(&self, now: Instant) {
        let expired: Vec<LeaseId> = {
            let inner = self.inner.lock();
            inner
                .in_flight
                .iter()
                .filter(|(lease_id, _)| {
                    matches!(
                        self.leases.check(lease_id, now),
                        crate::lease_manager::LeaseCheck::Expired
                            | crate::lease_manager::LeaseCheck::Unknown
                    )
                })
                .map(|(lease_id, _)| lease_id.clone())
                .collect()
        };
        for lease_id in expired {
            let mut inner = self.inner.lock();
            if let Some(in_flight) = inner.in_flight.remove(&lease_id) {
                self.leases.release(&lease_id);
                drop(inner);
                self.queue.requeue(&in_flight.task_id);
                info!(task_id = %in_flight.task_id, "requeued task after lease expiry");
            }
        }
    }

    /// Heartbeats the worker, pulls a task if one is ready, and acquires a
    /// freshly-fenced lease for it.
    pub fn request_task(
        &self,
        worker_id: &WorkerId,
        now: Instant,
    ) -> Result<RequestTaskOutcome, DispatchError> {
        if !self.inner.lock().workers.contains_key(worker_id) {
            return Err(DispatchError::WorkerNotRegistered);
        }
        self.heartbeat(worker_id, now);
        self.requeue_expired(now);

        let Some(task) = self.queue.pull() else {
            return Ok(RequestTaskOutcome::NoTask);
        };

        let lease = self.leases.acquire(
            task.workflow_id.clone(),
            task.step.clone(),
            task.attempt,
            self.lease_duration,
            now,
        );

        {
            let mut inner = self.inner.lock();
            inner.in_flight.insert(
                lease.lease_id.clone(),
                InFlight {
                    task_id: task.task_id.clone(),
                    workflow_id: task.workflow_id.clone(),
                    step: task.step.clone(),
                    worker_id: worker_id.clone(),
                },
            );
            if let Some(record) = inner.workers.get_mut(worker_id) {
                record.status = WorkerStatus::Busy;
            }
        }

        Ok(RequestTaskOutcome::Granted(GrantedTask {
            task_id: task.task_id,
            workflow_id: task.workflow_id,
            step: task.step,
            attempt: task.attempt,
            lease_id: lease.lease_id,
            fencing_token: lease.fencing_token,
            deadline: lease.expires_at,
        }))
    }

    async fn finish(&self, lease_id: &LeaseId, fencing_token: u64, now: Instant) -> Result<Task, DispatchError> {
        self.leases.validate_for_commit(lease_id, fencing_token, now)?;

        let (task_id, workflow_id, step, worker_id) = {
            let inner = self.inner.lock();
            let in_flight = inner
                .in_flight
                .get(lease_id)
                .ok_or(DispatchError::NoInFlightTask)?;
            (
                in_flight.task_id.clone(),
                in_flight.workflow_id.clone(),
                in_flight.step.clone(),
                in_flight.worker_id.clone(),
            )
        };

        self.leases.release(lease_id);
        self.queue.complete(&task_id);
        {
            let mut inner = self.inner.lock();
            inner.in_flight.remove(lease_id);
            if let Some(record) = inner.workers.get_mut(&worker_id) {
                record.status = WorkerStatus::Idle;
            }
        }

        Ok(Task {
            task_id,
            workflow_id,
            step,
            attempt: 0,
            priority: 0,
            enqueued_at: 0,
        })
    }

    /// Validates the worker's claimed lease/token; on success releases the
    /// lease, marks the worker idle, and forwards the completion to the
    /// owning coordinator. On validation failure the result is discarded —
    /// it is never forwarded.
    pub async fn report_completed(
        &self,
        lease_id: &LeaseId,
        fencing_token: u64,
        result: serde_json::Value,
        duration_ms: u64,
        idempotency_key: Option<String>,
        now: Instant,
    ) -> Result<(), DispatchError> {
        let task = self.finish(lease_id, fencing_token, now).await?;
        self.committer
            .report_step_completed(
                &task.workflow_id,
                &task.step,
                result,
                duration_ms,
                idempotency_key,
            )
            .await?;
        Ok(())
    }

    /// Same validation path as [`Self::report_completed`]; on success
    /// forwards a failure report instead.
    pub async fn report_failed(
        &self,
        lease_id: &LeaseId,
        fencing_token: u64,
        error: String,
        retryable: bool,
        idempotency_key: Option<String>,
        now: Instant,
    ) -> Result<(), DispatchError> {
        let task = self.finish(lease_id, fencing_token, now).await?;
        self.committer
            .report_step_failed(&task.workflow_id, &task.step, error, retryable, idempotency_key)
            .await?;
        Ok(())
    }
}
