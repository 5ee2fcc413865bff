// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The worker runtime: polls the dispatcher for work, hands each step to an
//! embedder-supplied [`StepHandler`], and reports the outcome back. The
//! core never executes step logic itself — the handler is the only place
//! untrusted/application code runs, and it runs outside this crate.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use wfe_core::WorkerId;

use crate::dispatcher::{Dispatcher, RequestTaskOutcome};

/// What a handler was asked to run.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub workflow_id: wfe_core::WorkflowId,
    pub step: String,
    pub attempt: u32,
}

/// What a handler reports back, before fencing validation.
#[derive(Debug, Clone)]
pub enum StepOutcome {
    Completed {
        result: serde_json::Value,
        duration_ms: u64,
    },
    Failed {
        error: String,
        retryable: bool,
    },
}

/// Application-supplied step logic. The engine core treats this as
/// untrusted: it is always run by the embedder's own process, never
/// in-process with the WAL or coordinator state.
#[async_trait]
pub trait StepHandler: Send + Sync {
    async fn execute(&self, ctx: StepContext) -> StepOutcome;
}

pub struct Worker<H: StepHandler> {
    worker_id: WorkerId,
    dispatcher: Arc<Dispatcher>,
    handler: H,
    step_timeout: Duration,
}

impl<H: StepHandler> Worker<H> {
    pub fn new(
        worker_id: WorkerId,
        dispatcher: Arc<Dispatcher>,
        handler: H,
        step_timeout: Duration,
    ) -> Self {
        Self {
            worker_id,
            dispatcher,
            handler,
            step_timeout,
        }
    }

    pub fn register(&self, now: Instant) {
        self.dispatcher.register_worker(self.worker_id.clone(), now);
    }

    /// Pull at most one task and drive it to completion. Returns `false`
    /// when there was nothing to do, so callers can back off before the
    /// next poll.
    pub async fn poll_once(&self, now: Instant) -> bool {
        let granted = match self.dispatcher.request_task(&self.worker_id, now) {
            Ok(RequestTaskOutcome::Granted(g)) => g,
            Ok(RequestTaskOutcome::NoTask) => return false,
            Err(err) => {
                warn!(worker_id = %self.worker_id, %err, "request_task failed");
                return false;
            }
        };

        let ctx = StepContext {
            workflow_id: granted.workflow_id.clone(),
            step: granted.step.clone(),
            attempt: granted.attempt,
        };

        let started = Instant::now();
        let outcome = match tokio::time::timeout(self.step_timeout, self.handler.execute(ctx)).await
        {
            Ok(outcome) => outcome,
            Err(_) => StepOutcome::Failed {
                error: "step execution timed out".to_string(),
                retryable: true,
            },
        };
        let duration_ms = started.elapsed().as_millis() as u64;
        let now = Instant::now();

        let report = match outcome {
            StepOutcome::Completed { result, duration_ms: reported } => {
                self.dispatcher
                    .report_completed(
                        &granted.lease_id,
                        granted.fencing_token,
                        result,
                        if reported > 0 { reported } else { duration_ms },
                        None,
                        now,
                    )
                    .await
            }
            StepOutcome::Failed { error, retryable } => {
                self.dispatcher
                    .report_failed(
                        &granted.lease_id,
                        granted.fencing_token,
                        error,
                        retryable,
                        None,
                        now,
                    )
                    .await
            }
        };

        if let Err(err) = report {
            warn!(worker_id = %self.worker_id, %err, "report rejected, lease lost to fencing");
        } else {
            info!(worker_id = %self.worker_id, step = %granted.step, "step reported");
        }
        true
    }

    /// Poll in a loop at `poll_interval`, sleeping when there's nothing to
    /// do. Runs until cancelled by the caller (e.g. via `tokio::select!`).
    pub async fn run(&self, poll_interval: Duration) {
        self.register(Instant::now());
        loop {
            let did_work = self.poll_once(Instant::now()).await;
            if !did_work {
                tokio::time::sleep(poll_interval).await;
            }
        }
    }
}
