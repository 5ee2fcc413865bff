// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pure event-fold: `apply(state, event) -> state`. No I/O, no randomness,
//! no wall-clock reads — given the same event sequence the result is
//! byte-identical. This is the replay contract the whole system's
//! durability rests on.

use wfe_core::state::{OverallState, StepState, WorkflowState};
use wfe_core::{Event, EventPayload, WorkflowId};

/// Fold one event into `state`, returning the new state.
pub fn apply(mut state: WorkflowState, event: &Event) -> WorkflowState {
    match &event.payload {
        EventPayload::WorkflowCreated { name, input, steps } => {
            state.name = name.clone();
            state.input = input.clone();
            state.steps = steps.clone();
            for step in steps {
                state.step_states.insert(step.clone(), StepState::Pending);
            }
            state.overall = OverallState::Pending;
        }
        EventPayload::StepScheduled { step, attempt } => {
            state.step_states.insert(step.clone(), StepState::Scheduled);
            state.scheduled_count.insert(step.clone(), *attempt);
            state.overall = OverallState::Running;
        }
        EventPayload::StepStarted { step, .. } => {
            state.step_states.insert(step.clone(), StepState::Running);
        }
        EventPayload::StepCompleted { step, .. } => {
            state.step_states.insert(step.clone(), StepState::Completed);
            if let Some(idx) = state.steps.iter().position(|s| s == step) {
                state.current_step_index = state.current_step_index.max(idx + 1);
            }
            state.overall = if state.all_steps_completed() {
                OverallState::Waiting
            } else {
                OverallState::Running
            };
        }
        EventPayload::StepFailed {
            step, retryable, ..
        } => {
            state.step_states.insert(step.clone(), StepState::Failed);
            state.overall = if *retryable {
                OverallState::Waiting
            } else {
                OverallState::Failed
            };
        }
        EventPayload::WorkflowCompleted { output } => {
            state.output = Some(output.clone());
            state.overall = OverallState::Completed;
        }
        EventPayload::WorkflowFailed { reason, .. } => {
            state.error = Some(reason.clone());
            state.overall = OverallState::Failed;
        }
        EventPayload::WorkflowCancelled {} => {
            state.overall = OverallState::Cancelled;
        }
    }

    if let Some(key) = event.idempotency_key() {
        state.seen_idempotency_keys.insert(key.to_string());
    }
    state.version += 1;
    state
}

/// Fold-left `apply` over `events` sorted by `sequence`, starting from an
/// uninitialized projection.
pub fn hydrate(workflow_id: WorkflowId, events: &[Event]) -> WorkflowState {
    let mut sorted: Vec<&Event> = events.iter().collect();
    sorted.sort_by_key(|e| e.sequence);
    let initial = WorkflowState::uninitialized(workflow_id);
    sorted.into_iter().fold(initial, apply)
}
