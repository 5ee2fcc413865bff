// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A single WAL segment file: a fixed-max-size, append-only sequence of
//! framed entries, fsync'd on every append.
//!
//! Entry framing, bit-exact:
//!
//! ```text
//! offset  size    field
//!  0      4       payload_length          (big-endian u32)
//!  4      4       crc32(payload)          (big-endian u32, IEEE polynomial)
//!  8      8       timestamp               (big-endian u64, logical clock)
//! 16      N       payload                 (opaque bytes)
//! ```
//!
//! Segments are named `segment_NNNNNNNN.wal` (8-digit zero-padded id) and
//! are immutable once rotated away from.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Header size: 4 (length) + 4 (crc) + 8 (timestamp).
pub const HEADER_LEN: usize = 16;

/// Default maximum segment size before rotation.
pub const DEFAULT_MAX_SIZE: u64 = 64 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum WalError {
    #[error("disk failure: {0}")]
    DiskFailure(#[from] io::Error),
}

pub fn segment_path(dir: &Path, segment_id: u64) -> PathBuf {
    dir.join(format!("segment_{:08}.wal", segment_id))
}

/// One decoded entry read back from a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentEntry {
    pub timestamp: u64,
    pub payload: Vec<u8>,
}

/// The currently active, writable segment.
pub struct Segment {
    file: File,
    pub segment_id: u64,
    pub max_size: u64,
    /// Bytes written to this segment so far.
    size: u64,
    /// Set when `open` found and truncated a corrupted or partially-written
    /// trailing frame. The WAL service reacts to this by rotating to a fresh
    /// segment rather than resuming appends on a just-recovered one.
    recovered_truncation: bool,
}

impl Segment {
    /// Open (creating if absent) a segment in append mode. A trailing
    /// corrupted or partially-written frame found on disk is truncated away
    /// so the segment's on-disk bytes exactly match its valid entries — the
    /// bytes are gone, not merely ignored, so a linear scan from the start
    /// never trips over them again. Callers that care whether recovery
    /// happened should check `was_truncated`.
    pub fn open(dir: &Path, segment_id: u64, max_size: u64) -> Result<Self, WalError> {
        std::fs::create_dir_all(dir)?;
        let path = segment_path(dir, segment_id);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;
        let on_disk_size = file.metadata()?.len();

        let mut bytes = Vec::new();
        (&file).read_to_end(&mut bytes)?;
        let valid_len = valid_prefix_len(&bytes) as u64;
        let recovered_truncation = valid_len < on_disk_size;
        if recovered_truncation {
            warn!(
                segment_id,
                on_disk_size,
                valid_len,
                "truncating trailing corruption found on open"
            );
            file.set_len(valid_len)?;
        }

        Ok(Self {
            file,
            segment_id,
            max_size,
            size: valid_len,
            recovered_truncation,
        })
    }

    pub fn current_size(&self) -> u64 {
        self.size
    }

    /// Whether `open` found and truncated a corrupted or incomplete trailing
    /// frame on this segment.
    pub fn was_truncated(&self) -> bool {
        self.recovered_truncation
    }

    /// True when appending an entry carrying `payload_len` bytes of payload
    /// would meet or exceed `max_size`.
    pub fn needs_rotation(&self, payload_len: usize) -> bool {
        self.size + HEADER_LEN as u64 + payload_len as u64 >= self.max_size
    }

    /// Append one framed entry and fsync before returning. On any write or
    /// sync error the caller MUST treat the append as not having happened —
    /// no partial-frame bytes are exposed as a successful append.
    pub fn append(&mut self, payload: &[u8], timestamp: u64) -> Result<u64, WalError> {
        let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
        frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        let crc = crc32fast::hash(payload);
        frame.extend_from_slice(&crc.to_be_bytes());
        frame.extend_from_slice(&timestamp.to_be_bytes());
        frame.extend_from_slice(payload);

        self.file.write_all(&frame)?;
        self.file.sync_all()?;

        self.size += frame.len() as u64;
        Ok(self.size)
    }

    /// Stream every entry out of a (possibly still-active) segment on disk.
    /// Stops cleanly — without error — on a zero-byte tail, an incomplete
    /// trailing frame, or a CRC mismatch; in the CRC-mismatch case the
    /// offending entry and everything after it is dropped.
    pub fn read_all(dir: &Path, segment_id: u64) -> Result<Vec<SegmentEntry>, WalError> {
        let path = segment_path(dir, segment_id);
        let mut file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        Ok(decode_entries(&bytes))
    }
}

/// Decode framed entries from `bytes` up to the first incomplete header,
/// incomplete payload, or CRC mismatch.
fn decode_entries(bytes: &[u8]) -> Vec<SegmentEntry> {
    let mut entries = Vec::new();
    let mut offset = 0usize;
    while offset < bytes.len() {
        if offset + HEADER_LEN > bytes.len() {
            break; // incomplete trailing header
        }
        let payload_len =
            u32::from_be_bytes(bytes[offset..offset + 4].try_into().unwrap_or([0; 4])) as usize;
        let crc = u32::from_be_bytes(bytes[offset + 4..offset + 8].try_into().unwrap_or([0; 4]));
        let timestamp =
            u64::from_be_bytes(bytes[offset + 8..offset + 16].try_into().unwrap_or([0; 8]));
        let payload_start = offset + HEADER_LEN;
        let payload_end = payload_start + payload_len;
        if payload_end > bytes.len() {
            break; // partial write of the payload
        }
        let payload = &bytes[payload_start..payload_end];
        if crc32fast::hash(payload) != crc {
            break; // corruption: this entry and the rest of the segment are dropped
        }
        entries.push(SegmentEntry {
            timestamp,
            payload: payload.to_vec(),
        });
        offset = payload_end;
    }
    entries
}

/// Byte length of the valid framed prefix of `bytes` — everything up to
/// (not including) the first incomplete or corrupted frame.
fn valid_prefix_len(bytes: &[u8]) -> usize {
    decode_entries(bytes)
        .iter()
        .map(|e| HEADER_LEN + e.payload.len())
        .sum()
}
