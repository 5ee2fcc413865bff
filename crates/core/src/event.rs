// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The event envelope — the universal unit of durable state change.
//!
//! Serializes as `{"event_type": "step_completed", ...}`: the payload
//! variant is internally tagged by `event_type`, flattened into the
//! envelope, so the bytes on disk are self-describing per event.

use crate::id::{EventId, LeaseId, WorkerId, WorkflowId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Key under which the idempotency fingerprint is carried in `metadata`
/// for commit-class events (`step_completed`, `step_failed`).
pub const IDEMPOTENCY_KEY_META: &str = "idempotency_key";

/// An immutable fact about a workflow, durable the moment the WAL syncs it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: EventId,
    pub workflow_id: WorkflowId,
    /// Strictly increasing per-workflow, starting at 0 for `workflow_created`.
    pub sequence: u64,
    /// Monotonic per event type; enables forward-compatible schema evolution.
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub causation_id: Option<EventId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// A [`crate::clock::LogicalClock`] reading. NOT wall-clock time; never
    /// use this for scheduling or lease expiry.
    pub timestamp: u64,
    #[serde(flatten)]
    pub payload: EventPayload,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

/// Closed enumeration of event kinds, tagged by `event_type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum EventPayload {
    WorkflowCreated {
        name: String,
        input: serde_json::Value,
        steps: Vec<String>,
    },
    StepScheduled {
        step: String,
        attempt: u32,
    },
    StepStarted {
        step: String,
        lease_id: LeaseId,
        worker_id: WorkerId,
    },
    StepCompleted {
        step: String,
        result: serde_json::Value,
        duration_ms: u64,
    },
    StepFailed {
        step: String,
        error: String,
        retryable: bool,
    },
    WorkflowCompleted {
        output: serde_json::Value,
    },
    WorkflowFailed {
        reason: String,
        final_step: Option<String>,
    },
    WorkflowCancelled {},
}

impl EventPayload {
    /// The closed `event_type` name this payload serializes under.
    pub fn event_type(&self) -> &'static str {
        match self {
            EventPayload::WorkflowCreated { .. } => "workflow_created",
            EventPayload::StepScheduled { .. } => "step_scheduled",
            EventPayload::StepStarted { .. } => "step_started",
            EventPayload::StepCompleted { .. } => "step_completed",
            EventPayload::StepFailed { .. } => "step_failed",
            EventPayload::WorkflowCompleted { .. } => "workflow_completed",
            EventPayload::WorkflowFailed { .. } => "workflow_failed",
            EventPayload::WorkflowCancelled {} => "workflow_cancelled",
        }
    }

    /// True for the three event kinds that may only ever be the last event
    /// appended for a workflow.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EventPayload::WorkflowCompleted { .. }
                | EventPayload::WorkflowFailed { .. }
                | EventPayload::WorkflowCancelled {}
        )
    }

    /// The step this payload concerns, if any (absent for workflow-level
    /// events).
    pub fn step(&self) -> Option<&str> {
        match self {
            EventPayload::StepScheduled { step, .. }
            | EventPayload::StepStarted { step, .. }
            | EventPayload::StepCompleted { step, .. }
            | EventPayload::StepFailed { step, .. } => Some(step.as_str()),
            _ => None,
        }
    }
}

impl Event {
    pub fn event_type(&self) -> &'static str {
        self.payload.event_type()
    }

    pub fn idempotency_key(&self) -> Option<&str> {
        self.metadata.get(IDEMPOTENCY_KEY_META).map(String::as_str)
    }
}
