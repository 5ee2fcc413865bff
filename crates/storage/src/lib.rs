// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Durable write-ahead log for the workflow engine: fixed-size, CRC-framed
//! segments fsync'd on every append, and the single-writer service that
//! owns rotation, replay, and subscriber fan-out on top of them.

pub mod segment;
pub mod wal;

pub use segment::{Segment, SegmentEntry, DEFAULT_MAX_SIZE, HEADER_LEN};
pub use wal::{WalError, WalNotification, WalService};
