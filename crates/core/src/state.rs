// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The workflow state projection: derived by folding events, never stored
//! directly. See [`crate::event`] for the events it is folded from.

use crate::id::WorkflowId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-step projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepState {
    Pending,
    Scheduled,
    Running,
    Completed,
    Failed,
}

/// Overall workflow projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverallState {
    Pending,
    Running,
    Waiting,
    Completed,
    Failed,
    Cancelled,
}

impl OverallState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OverallState::Completed | OverallState::Failed | OverallState::Cancelled
        )
    }
}

/// The materialized state of one workflow, obtained by folding its events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub workflow_id: WorkflowId,
    pub name: String,
    pub input: serde_json::Value,
    /// Ordered list of step names, as declared at `workflow_created`.
    pub steps: Vec<String>,
    pub step_states: HashMap<String, StepState>,
    /// Count of `step_scheduled` events seen per step — used to derive the
    /// next `attempt` number.
    pub scheduled_count: HashMap<String, u32>,
    pub current_step_index: usize,
    pub overall: OverallState,
    pub output: Option<serde_json::Value>,
    pub error: Option<String>,
    /// Count of events applied. Doubles as the next `sequence` to write.
    pub version: u64,
    /// Idempotency keys of every applied commit-class event, for
    /// `idempotency_key_exists?`.
    pub seen_idempotency_keys: std::collections::HashSet<String>,
}

impl WorkflowState {
    /// An empty, not-yet-created projection (version 0).
    pub fn uninitialized(workflow_id: WorkflowId) -> Self {
        Self {
            workflow_id,
            name: String::new(),
            input: serde_json::Value::Null,
            steps: Vec::new(),
            step_states: HashMap::new(),
            scheduled_count: HashMap::new(),
            current_step_index: 0,
            overall: OverallState::Pending,
            output: None,
            error: None,
            version: 0,
            seen_idempotency_keys: std::collections::HashSet::new(),
        }
    }

    pub fn is_created(&self) -> bool {
        self.version > 0
    }

    pub fn terminal(&self) -> bool {
        self.overall.is_terminal()
    }

    pub fn idempotency_key_exists(&self, key: &str) -> bool {
        self.seen_idempotency_keys.contains(key)
    }

    /// First step whose status is `Pending`, when the workflow itself is
    /// non-terminal. `None` otherwise (nothing runnable, or already done).
    pub fn next_runnable_step(&self) -> Option<&str> {
        if self.terminal() {
            return None;
        }
        self.steps
            .iter()
            .find(|s| matches!(self.step_states.get(s.as_str()), Some(StepState::Pending)))
            .map(String::as_str)
    }

    pub fn all_steps_completed(&self) -> bool {
        !self.steps.is_empty()
            && self
                .steps
                .iter()
                .all(|s| matches!(self.step_states.get(s.as_str()), Some(StepState::Completed)))
    }
}
