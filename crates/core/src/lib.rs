// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! wfe-core: shared types for the durable workflow engine — the event
//! envelope, lease and task records, idempotency keys, ids, and the
//! logical clock. No I/O lives here; everything is plain data plus the
//! pure helpers that operate on it.

pub mod clock;
pub mod event;
pub mod id;
pub mod idempotency;
pub mod lease;
pub mod state;
pub mod task;

pub use clock::{FakeLogicalClock, LogicalClock, SystemLogicalClock};
pub use event::{Event, EventPayload};
pub use id::{
    EventId, IdGen, LeaseId, SequentialIdGen, ShortId, TaskId, UuidIdGen, WorkerId, WorkflowId,
};
pub use idempotency::idempotency_key;
pub use lease::Lease;
pub use state::{OverallState, StepState, WorkflowState};
pub use task::Task;
