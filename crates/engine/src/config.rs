// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The configuration surface enumerated for the engine: everything a
//! deployment can tune without recompiling.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_segment_max_bytes() -> u64 {
    64 * 1024 * 1024
}

fn default_fsync_on_write() -> bool {
    true
}

fn default_lease_duration_ms() -> u64 {
    30_000
}

fn default_worker_timeout_ms() -> u64 {
    60_000
}

fn default_worker_poll_interval_ms() -> u64 {
    1_000
}

fn default_step_execution_timeout_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub data_dir: PathBuf,
    #[serde(default = "default_segment_max_bytes")]
    pub segment_max_bytes: u64,
    #[serde(default = "default_fsync_on_write")]
    pub fsync_on_write: bool,
    #[serde(default = "default_lease_duration_ms")]
    pub lease_duration_ms: u64,
    #[serde(default = "default_worker_timeout_ms")]
    pub worker_timeout_ms: u64,
    #[serde(default = "default_worker_poll_interval_ms")]
    pub worker_poll_interval_ms: u64,
    #[serde(default = "default_step_execution_timeout_ms")]
    pub step_execution_timeout_ms: u64,
}

impl Config {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            segment_max_bytes: default_segment_max_bytes(),
            fsync_on_write: default_fsync_on_write(),
            lease_duration_ms: default_lease_duration_ms(),
            worker_timeout_ms: default_worker_timeout_ms(),
            worker_poll_interval_ms: default_worker_poll_interval_ms(),
            step_execution_timeout_ms: default_step_execution_timeout_ms(),
        }
    }

    pub fn lease_duration(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.lease_duration_ms)
    }

    pub fn worker_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.worker_timeout_ms)
    }

    pub fn worker_poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.worker_poll_interval_ms)
    }

    pub fn step_execution_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.step_execution_timeout_ms)
    }
}
