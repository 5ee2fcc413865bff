// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-writer WAL service: owns the active segment, serializes all
//! appends, rotates segments, and fans out post-sync notifications to
//! subscribers. The sole source of truth for every workflow's event
//! history.

use crate::segment::{Segment, DEFAULT_MAX_SIZE};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::warn;
use wfe_core::{Event, WorkflowId};

#[derive(Debug, Error)]
pub enum WalError {
    #[error("disk failure: {0}")]
    DiskFailure(#[from] std::io::Error),
    #[error("serialization failure: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<crate::segment::WalError> for WalError {
    fn from(e: crate::segment::WalError) -> Self {
        match e {
            crate::segment::WalError::DiskFailure(io) => WalError::DiskFailure(io),
        }
    }
}

/// Delivered to subscribers after an event has been durably synced.
#[derive(Debug, Clone)]
pub struct WalNotification {
    pub event: Event,
    pub offset: u64,
}

/// Owns the active segment and mediates every append. There is exactly one
/// of these per data directory; callers serialize through `&mut self`
/// (e.g. behind a single-owner task or mutex), matching the single-writer
/// model in the design notes.
pub struct WalService {
    dir: PathBuf,
    active: Segment,
    /// Sum of the sizes of every segment strictly older than `active`.
    prior_segments_size: u64,
    max_size: u64,
    subscribers: Vec<Sender<WalNotification>>,
}

fn list_segment_ids(dir: &Path) -> Result<Vec<u64>, WalError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut ids = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if let Some(rest) = name
            .strip_prefix("segment_")
            .and_then(|r| r.strip_suffix(".wal"))
        {
            if let Ok(id) = rest.parse::<u64>() {
                ids.push(id);
            }
        }
    }
    ids.sort_unstable();
    Ok(ids)
}

impl WalService {
    /// Scan `dir` for `segment_*.wal`, pick the highest id as active (else
    /// 0), and compute `current_offset` as the sum of the sizes of all
    /// existing segments.
    pub fn open(dir: impl Into<PathBuf>, max_size: u64) -> Result<Self, WalError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let ids = list_segment_ids(&dir)?;
        let active_id = ids.last().copied().unwrap_or(0);

        let mut prior_segments_size = 0u64;
        for id in &ids {
            if *id != active_id {
                let path = crate::segment::segment_path(&dir, *id);
                prior_segments_size += fs::metadata(&path)?.len();
            }
        }

        let mut active = Segment::open(&dir, active_id, max_size)?;

        // A segment recovered from a corrupted or partial tail is retired:
        // its valid prefix stays on disk untouched, and writing resumes on a
        // fresh segment so a future crash mid-append can never again land in
        // the middle of a segment recovery already had to repair.
        if active.was_truncated() {
            warn!(
                segment_id = active_id,
                "active segment had a corrupted tail, rotating to a fresh segment"
            );
            prior_segments_size += active.current_size();
            active = Segment::open(&dir, active_id + 1, max_size)?;
        }

        Ok(Self {
            dir,
            active,
            prior_segments_size,
            max_size,
            subscribers: Vec::new(),
        })
    }

    pub fn open_default(dir: impl Into<PathBuf>) -> Result<Self, WalError> {
        Self::open(dir, DEFAULT_MAX_SIZE)
    }

    pub fn current_offset(&self) -> u64 {
        self.prior_segments_size + self.active.current_size()
    }

    /// Serialize `event`, rotate the active segment if needed, and
    /// append-with-sync. On failure the event MUST NOT be applied to any
    /// in-memory state by the caller.
    pub fn append(&mut self, event: &Event) -> Result<u64, WalError> {
        let payload = serde_json::to_vec(event)?;

        if self.active.needs_rotation(payload.len()) {
            self.prior_segments_size += self.active.current_size();
            let next_id = self.active.segment_id + 1;
            self.active = Segment::open(&self.dir, next_id, self.max_size)?;
        }

        self.active.append(&payload, event.timestamp)?;
        let offset = self.current_offset();

        self.notify(event, offset);
        Ok(offset)
    }

    /// Scan segments 0..=active in order and return, in `sequence` order,
    /// the events belonging to `workflow_id`.
    pub fn replay(&self, workflow_id: &WorkflowId) -> Result<Vec<Event>, WalError> {
        let mut events = Vec::new();
        let ids = list_segment_ids(&self.dir)?;
        for id in ids {
            for entry in Segment::read_all(&self.dir, id)? {
                let event: Event = serde_json::from_slice(&entry.payload)?;
                if &event.workflow_id == workflow_id {
                    events.push(event);
                }
            }
        }
        events.sort_by_key(|e| e.sequence);
        Ok(events)
    }

    /// Register a subscriber for post-sync notifications. Delivery is
    /// best-effort: a subscriber whose receiver has been dropped is pruned
    /// silently on the next send.
    pub fn subscribe(&mut self, sender: Sender<WalNotification>) {
        self.subscribers.push(sender);
    }

    fn notify(&mut self, event: &Event, offset: u64) {
        self.subscribers.retain(|sub| {
            let notification = WalNotification {
                event: event.clone(),
                offset,
            };
            match sub.send(notification) {
                Ok(()) => true,
                Err(_) => {
                    warn!("pruning dead WAL subscriber");
                    false
                }
            }
        });
    }
}
