//! A single transfer job.
//!
//! Exactly one job exists at a time, owned by the controller. The only
//! state shared with the copy workers is the cumulative byte counter,
//! which is incremented atomically after every successful write and
//! never read destructively.

use crate::core::endpoint::Endpoint;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Which way the bytes move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upload,
    Download,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Upload => f.write_str("upload"),
            Direction::Download => f.write_str("download"),
        }
    }
}

/// Everything the copy engine needs to move one file.
///
/// Endpoints and paths are kept (rather than open handles) so parallel
/// workers can reopen their own handles and seek to their own ranges.
pub struct TransferJob {
    pub direction: Direction,
    pub filename: String,
    pub source: Endpoint,
    pub source_path: String,
    pub dest: Endpoint,
    pub dest_path: String,
    pub total_bytes: u64,
    pub buffer_bytes: usize,
    pub streams: usize,
    cumulative: Arc<AtomicU64>,
}

impl TransferJob {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        direction: Direction,
        filename: String,
        source: Endpoint,
        source_path: String,
        dest: Endpoint,
        dest_path: String,
        total_bytes: u64,
        buffer_bytes: usize,
        streams: usize,
    ) -> Self {
        Self {
            direction,
            filename,
            source,
            source_path,
            dest,
            dest_path,
            total_bytes,
            buffer_bytes,
            streams,
            cumulative: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Shared monotonically increasing byte counter.
    pub fn counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.cumulative)
    }

    pub fn transferred(&self) -> u64 {
        self.cumulative.load(Ordering::Relaxed)
    }
}
