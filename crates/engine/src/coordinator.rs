// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-workflow state owner. A coordinator is the only entity
//! permitted to request WAL appends for its workflow, and the only
//! component that authorizes a commit.
//!
//! Ordering rule: every operation writes to the WAL BEFORE touching
//! in-memory state. If the WAL append fails the in-memory state is left
//! untouched and the error is returned unchanged to the caller.

use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use wfe_core::state::{StepState, WorkflowState};
use wfe_core::{Event, EventId, EventPayload, IdGen, LogicalClock, UuidIdGen, WorkflowId};
use wfe_storage::WalService;

use crate::state_machine::apply;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("disk failure: {0}")]
    DiskFailure(#[from] wfe_storage::WalError),
    #[error("workflow already created")]
    AlreadyCreated,
    #[error("no runnable step")]
    NoRunnableStep,
    #[error("duplicate idempotency key")]
    Duplicate,
    #[error("unexpected step state")]
    UnexpectedStep,
    #[error("workflow already terminal")]
    AlreadyTerminal,
}

/// What `advance()` did, on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    StepScheduled { step: String, attempt: u32 },
    WorkflowCompleted,
}

pub struct Coordinator<C: LogicalClock> {
    workflow_id: WorkflowId,
    wal: Arc<Mutex<WalService>>,
    state: Mutex<WorkflowState>,
    clock: C,
    id_gen: UuidIdGen,
}

impl<C: LogicalClock> Coordinator<C> {
    pub fn new(workflow_id: WorkflowId, wal: Arc<Mutex<WalService>>, clock: C) -> Self {
        let state = WorkflowState::uninitialized(workflow_id.clone());
        Self {
            workflow_id,
            wal,
            state: Mutex::new(state),
            clock,
            id_gen: UuidIdGen,
        }
    }

    pub fn workflow_id(&self) -> &WorkflowId {
        &self.workflow_id
    }

    pub fn get_state(&self) -> WorkflowState {
        self.state.lock().clone()
    }

    /// Replay this workflow's events from the WAL and fold them in. Issues
    /// no writes.
    pub fn hydrate(&self) -> Result<(), CoordinatorError> {
        let events = self.wal.lock().replay(&self.workflow_id)?;
        let mut state = self.state.lock();
        let mut folded = WorkflowState::uninitialized(self.workflow_id.clone());
        let mut sorted = events;
        sorted.sort_by_key(|e| e.sequence);
        for event in &sorted {
            folded = apply(folded, event);
        }
        *state = folded;
        Ok(())
    }

    fn append_and_apply(&self, payload: EventPayload) -> Result<(), CoordinatorError> {
        let mut state = self.state.lock();
        let event = Event {
            event_id: EventId::new(self.id_gen.next()),
            workflow_id: self.workflow_id.clone(),
            sequence: state.version,
            schema_version: 1,
            causation_id: None,
            correlation_id: None,
            timestamp: self.clock.now(),
            payload,
            metadata: Default::default(),
        };
        self.wal.lock().append(&event)?;
        debug!(workflow_id = %self.workflow_id, event_type = event.event_type(), "appended");
        *state = apply(state.clone(), &event);
        Ok(())
    }

    pub fn create(
        &self,
        name: impl Into<String>,
        input: serde_json::Value,
        steps: Vec<String>,
    ) -> Result<(), CoordinatorError> {
        if self.state.lock().is_created() {
            return Err(CoordinatorError::AlreadyCreated);
        }
        self.append_and_apply(EventPayload::WorkflowCreated {
            name: name.into(),
            input,
            steps,
        })
    }

    pub fn advance(&self) -> Result<AdvanceOutcome, CoordinatorError> {
        let (next_step, all_completed) = {
            let state = self.state.lock();
            (
                state.next_runnable_step().map(str::to_string),
                state.all_steps_completed(),
            )
        };

        if let Some(step) = next_step {
            let attempt = {
                let state = self.state.lock();
                state.scheduled_count.get(&step).copied().unwrap_or(0) + 1
            };
            self.append_and_apply(EventPayload::StepScheduled {
                step: step.clone(),
                attempt,
            })?;
            return Ok(AdvanceOutcome::StepScheduled { step, attempt });
        }

        if all_completed {
            let steps: Vec<serde_json::Value> = {
                let state = self.state.lock();
                state.steps.iter().cloned().map(serde_json::Value::String).collect()
            };
            self.append_and_apply(EventPayload::WorkflowCompleted {
                output: serde_json::json!({"completed_steps": steps}),
            })?;
            return Ok(AdvanceOutcome::WorkflowCompleted);
        }

        Err(CoordinatorError::NoRunnableStep)
    }

    /// The commit gate for a successful step report.
    pub fn step_completed(
        &self,
        step: &str,
        result: serde_json::Value,
        duration_ms: u64,
        idempotency_key: Option<String>,
    ) -> Result<(), CoordinatorError> {
        if let Some(key) = &idempotency_key {
            if self.state.lock().idempotency_key_exists(key) {
                return Err(CoordinatorError::Duplicate);
            }
        }

        {
            let state = self.state.lock();
            match state.step_states.get(step) {
                Some(StepState::Scheduled) | Some(StepState::Running) => {}
                _ => return Err(CoordinatorError::UnexpectedStep),
            }
        }

        let mut state = self.state.lock();
        let event = Event {
            event_id: EventId::new(self.id_gen.next()),
            workflow_id: self.workflow_id.clone(),
            sequence: state.version,
            schema_version: 1,
            causation_id: None,
            correlation_id: None,
            timestamp: self.clock.now(),
            payload: EventPayload::StepCompleted {
                step: step.to_string(),
                result,
                duration_ms,
            },
            metadata: idempotency_key
                .map(|key| {
                    let mut map = std::collections::HashMap::new();
                    map.insert(wfe_core::event::IDEMPOTENCY_KEY_META.to_string(), key);
                    map
                })
                .unwrap_or_default(),
        };
        self.wal.lock().append(&event)?;
        *state = apply(state.clone(), &event);
        Ok(())
    }

    pub fn step_failed(
        &self,
        step: &str,
        error: impl Into<String>,
        retryable: bool,
        idempotency_key: Option<String>,
    ) -> Result<(), CoordinatorError> {
        if let Some(key) = &idempotency_key {
            if self.state.lock().idempotency_key_exists(key) {
                return Err(CoordinatorError::Duplicate);
            }
        }

        {
            let state = self.state.lock();
            match state.step_states.get(step) {
                Some(StepState::Scheduled) | Some(StepState::Running) => {}
                _ => return Err(CoordinatorError::UnexpectedStep),
            }
        }

        let mut state = self.state.lock();
        let event = Event {
            event_id: EventId::new(self.id_gen.next()),
            workflow_id: self.workflow_id.clone(),
            sequence: state.version,
            schema_version: 1,
            causation_id: None,
            correlation_id: None,
            timestamp: self.clock.now(),
            payload: EventPayload::StepFailed {
                step: step.to_string(),
                error: error.into(),
                retryable,
            },
            metadata: idempotency_key
                .map(|key| {
                    let mut map = std::collections::HashMap::new();
                    map.insert(wfe_core::event::IDEMPOTENCY_KEY_META.to_string(), key);
                    map
                })
                .unwrap_or_default(),
        };
        self.wal.lock().append(&event)?;
        *state = apply(state.clone(), &event);
        Ok(())
    }

    pub fn cancel(&self) -> Result<(), CoordinatorError> {
        if self.state.lock().terminal() {
            return Err(CoordinatorError::AlreadyTerminal);
        }
        self.append_and_apply(EventPayload::WorkflowCancelled {})
    }
}
