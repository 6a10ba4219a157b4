//! Centralized tunables for Skiff.
//!
//! All load-bearing transfer parameters live here so they can be reviewed
//! and adjusted in a single place. Every user-supplied value passes through
//! a clamp before it reaches the session or the copy engine; the clamp
//! ranges are part of the contract with the remote endpoint and must not
//! be widened casually.

use serde::Deserialize;
use std::time::Duration;

// ── Transfer / Chunking ──────────────────────────────────────────────────────

/// Requested SFTP packet payload size, in KiB (1 MiB). Servers that cap
/// payloads at 32 KiB reject this during negotiation; see
/// `TransferParams::fallback`.
pub const DEFAULT_MAX_PACKET_KB: usize = 1024;

/// Packet size used by the one-shot conservative fallback (32 KiB), the
/// floor every SFTP server must accept.
pub const FALLBACK_PACKET_BYTES: usize = 32 * 1024;

/// Requested in-flight request limit per file.
pub const DEFAULT_CONCURRENT_REQUESTS: usize = 128;

/// Fallback never drops the in-flight window below this.
pub const MIN_FALLBACK_REQUESTS: usize = 16;

/// Parallel range-copy streams per transfer.
pub const DEFAULT_PARALLEL_STREAMS: usize = 4;

/// Copy buffer per stream, in MiB.
pub const DEFAULT_BUFFER_MIB: usize = 8;

// ── Progress ─────────────────────────────────────────────────────────────────

/// Progress sampling cadence.
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 75;

/// Smoothing factor for the exponentially weighted throughput average.
pub const RATE_SMOOTHING_ALPHA: f64 = 0.35;

/// Floor for the per-sample elapsed time, so a burst of back-to-back
/// samples can never divide by zero.
pub const MIN_SAMPLE_SECS: f64 = 1e-6;

// ── UI / Misc ────────────────────────────────────────────────────────────────

/// Crossterm event poll timeout in the UI loop.
pub const UI_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Maximum log entries kept in the in-memory ring buffer.
pub const MAX_LOG_ENTRIES: usize = 500;

// ── Performance config ───────────────────────────────────────────────────────

/// The `[performance]` table of the config file.
///
/// Raw values are kept as parsed; consumers go through the clamped
/// accessors. Missing fields fall back to the defaults above.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    pub max_packet_kb: usize,
    pub concurrent_requests: usize,
    pub parallel_streams: usize,
    pub buffer_mib: usize,
    pub progress_interval_ms: u64,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            max_packet_kb: DEFAULT_MAX_PACKET_KB,
            concurrent_requests: DEFAULT_CONCURRENT_REQUESTS,
            parallel_streams: DEFAULT_PARALLEL_STREAMS,
            buffer_mib: DEFAULT_BUFFER_MIB,
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL_MS,
        }
    }
}

impl PerformanceConfig {
    /// Negotiated packet payload request, clamped to [32 KiB, 4 MiB].
    pub fn max_packet_bytes(&self) -> usize {
        self.max_packet_kb.clamp(32, 4096) * 1024
    }

    /// In-flight request limit, clamped to [16, 512].
    pub fn concurrent_requests(&self) -> usize {
        self.concurrent_requests.clamp(16, 512)
    }

    /// Parallel copy streams, clamped to [1, 32].
    pub fn parallel_streams(&self) -> usize {
        self.parallel_streams.clamp(1, 32)
    }

    /// Per-stream copy buffer, clamped to [1 MiB, 64 MiB].
    pub fn buffer_bytes(&self) -> usize {
        self.buffer_mib.clamp(1, 64) * 1024 * 1024
    }

    /// Progress tick interval, clamped to [25 ms, 1000 ms].
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms.clamp(25, 1000))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_within_clamp_ranges() {
        let cfg = PerformanceConfig::default();
        assert_eq!(cfg.max_packet_bytes(), 1024 * 1024);
        assert_eq!(cfg.concurrent_requests(), 128);
        assert_eq!(cfg.parallel_streams(), 4);
        assert_eq!(cfg.buffer_bytes(), 8 * 1024 * 1024);
        assert_eq!(cfg.progress_interval(), Duration::from_millis(75));
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let cfg = PerformanceConfig {
            max_packet_kb: 1,
            concurrent_requests: 10_000,
            parallel_streams: 0,
            buffer_mib: 1024,
            progress_interval_ms: 5,
        };
        assert_eq!(cfg.max_packet_bytes(), 32 * 1024);
        assert_eq!(cfg.concurrent_requests(), 512);
        assert_eq!(cfg.parallel_streams(), 1);
        assert_eq!(cfg.buffer_bytes(), 64 * 1024 * 1024);
        assert_eq!(cfg.progress_interval(), Duration::from_millis(25));
    }

    #[test]
    fn upper_clamps() {
        let cfg = PerformanceConfig {
            max_packet_kb: 100_000,
            concurrent_requests: 1,
            parallel_streams: 99,
            buffer_mib: 0,
            progress_interval_ms: 60_000,
        };
        assert_eq!(cfg.max_packet_bytes(), 4096 * 1024);
        assert_eq!(cfg.concurrent_requests(), 16);
        assert_eq!(cfg.parallel_streams(), 32);
        assert_eq!(cfg.buffer_bytes(), 1024 * 1024);
        assert_eq!(cfg.progress_interval(), Duration::from_millis(1000));
    }
}
