// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Logical clock abstraction.
//!
//! Event `timestamp` fields are readings from this clock: a monotonic
//! counter, explicitly NOT wall-clock time. It exists only to order traces
//! and must never be used to derive lease expiry or any other scheduling
//! deadline — those use [`std::time::Instant`] directly.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A source of monotonically increasing logical timestamps.
pub trait LogicalClock: Clone + Send + Sync {
    /// Returns a reading strictly greater than any previous reading from
    /// this clock instance.
    fn now(&self) -> u64;
}

/// Process-wide monotonic counter, shared via `Arc` across clones.
#[derive(Clone, Default)]
pub struct SystemLogicalClock {
    counter: Arc<AtomicU64>,
}

impl SystemLogicalClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LogicalClock for SystemLogicalClock {
    fn now(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst)
    }
}

/// Test double with a settable reading, for deterministic ordering tests.
#[derive(Clone, Default)]
pub struct FakeLogicalClock {
    counter: Arc<AtomicU64>,
}

impl FakeLogicalClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, value: u64) {
        self.counter.store(value, Ordering::SeqCst);
    }
}

impl LogicalClock for FakeLogicalClock {
    fn now(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst)
    }
}
