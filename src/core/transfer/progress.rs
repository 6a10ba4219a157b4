//! Progress sampling and smoothed throughput estimation.
//!
//! The tracker is driven on a fixed cadence by the controller. Each
//! sample diffs the shared cumulative counter against the previous
//! sample and folds the instantaneous throughput into an exponentially
//! weighted moving average (α = 0.35). A zero-delta sample decays the
//! average instead of zeroing it, so a stalled transfer ramps down
//! without discontinuity.

use crate::core::config::{MIN_SAMPLE_SECS, RATE_SMOOTHING_ALPHA};
use std::time::{Duration, Instant};

/// One sampled view of a running transfer.
///
/// `percent`, `rate` and `eta` are `None` when they cannot be derived
/// (zero-byte file, no throughput estimate yet) — never computed via a
/// division by zero.
#[derive(Debug, Clone, Copy)]
pub struct ProgressSnapshot {
    pub transferred: u64,
    pub total: u64,
    pub percent: Option<f64>,
    pub rate: Option<f64>,
    pub eta: Option<Duration>,
    pub elapsed: Duration,
}

/// Lives and dies with one transfer job.
#[derive(Debug)]
pub struct ProgressTracker {
    total: u64,
    started: Instant,
    prev_bytes: u64,
    last_sample: Instant,
    rate: Option<f64>,
}

impl ProgressTracker {
    pub fn new(total: u64) -> Self {
        let now = Instant::now();
        Self {
            total,
            started: now,
            prev_bytes: 0,
            last_sample: now,
            rate: None,
        }
    }

    /// Fold the current cumulative byte count into the estimate and
    /// return a display snapshot.
    pub fn sample(&mut self, cumulative: u64) -> ProgressSnapshot {
        self.sample_at(cumulative, Instant::now())
    }

    // Separated out so tests can control the clock.
    fn sample_at(&mut self, cumulative: u64, now: Instant) -> ProgressSnapshot {
        let delta = cumulative.saturating_sub(self.prev_bytes);
        let elapsed_secs = now
            .duration_since(self.last_sample)
            .as_secs_f64()
            .max(MIN_SAMPLE_SECS);

        if delta > 0 {
            let instantaneous = delta as f64 / elapsed_secs;
            self.rate = Some(match self.rate {
                Some(prev) => {
                    prev * (1.0 - RATE_SMOOTHING_ALPHA) + instantaneous * RATE_SMOOTHING_ALPHA
                }
                None => instantaneous,
            });
        } else if let Some(prev) = self.rate {
            self.rate = Some(prev * (1.0 - RATE_SMOOTHING_ALPHA));
        }

        self.prev_bytes = cumulative;
        self.last_sample = now;

        self.snapshot(cumulative, now)
    }

    /// Snapshot without folding in a new sample (used for the final
    /// report after the done signal).
    pub fn snapshot(&self, cumulative: u64, now: Instant) -> ProgressSnapshot {
        let percent = if self.total > 0 {
            Some(cumulative as f64 / self.total as f64)
        } else {
            None
        };

        let remaining = self.total.saturating_sub(cumulative);
        let eta = match self.rate {
            Some(rate) if rate > 0.0 && remaining > 0 => {
                Some(Duration::from_secs_f64(remaining as f64 / rate))
            }
            _ => None,
        };

        ProgressSnapshot {
            transferred: cumulative,
            total: self.total,
            percent,
            rate: self.rate,
            eta,
            elapsed: now.duration_since(self.started),
        }
    }

    pub fn rate(&self) -> Option<f64> {
        self.rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker_with_clock(total: u64) -> (ProgressTracker, Instant) {
        let tracker = ProgressTracker::new(total);
        let start = tracker.last_sample;
        (tracker, start)
    }

    #[test]
    fn first_sample_uses_instantaneous_rate() {
        let (mut t, start) = tracker_with_clock(1000);
        let snap = t.sample_at(100, start + Duration::from_secs(1));
        assert_eq!(snap.transferred, 100);
        let rate = snap.rate.unwrap();
        assert!((rate - 100.0).abs() < 1e-6, "rate was {rate}");
    }

    #[test]
    fn subsequent_samples_are_smoothed() {
        let (mut t, start) = tracker_with_clock(10_000);
        t.sample_at(100, start + Duration::from_secs(1));
        let snap = t.sample_at(400, start + Duration::from_secs(2));
        // prev 100 B/s, instantaneous 300 B/s: 100*0.65 + 300*0.35 = 170.
        let rate = snap.rate.unwrap();
        assert!((rate - 170.0).abs() < 1e-6, "rate was {rate}");
    }

    #[test]
    fn zero_delta_decays_monotonically_toward_zero() {
        let (mut t, start) = tracker_with_clock(10_000);
        t.sample_at(1000, start + Duration::from_secs(1));
        let mut prev = t.rate().unwrap();
        for i in 2..20 {
            let snap = t.sample_at(1000, start + Duration::from_secs(i));
            let rate = snap.rate.unwrap();
            assert!(rate.is_finite());
            assert!(rate >= 0.0);
            assert!(rate < prev, "decay not monotone: {rate} >= {prev}");
            prev = rate;
        }
    }

    #[test]
    fn zero_delta_with_no_previous_rate_stays_unknown() {
        let (mut t, start) = tracker_with_clock(500);
        let snap = t.sample_at(0, start + Duration::from_secs(1));
        assert!(snap.rate.is_none());
        assert!(snap.eta.is_none());
    }

    #[test]
    fn back_to_back_samples_never_divide_by_zero() {
        let (mut t, start) = tracker_with_clock(1 << 30);
        let snap = t.sample_at(1 << 20, start);
        let rate = snap.rate.unwrap();
        assert!(rate.is_finite());
        assert!(rate > 0.0);
    }

    #[test]
    fn zero_total_reports_unknown_percent_and_eta() {
        let (mut t, start) = tracker_with_clock(0);
        let snap = t.sample_at(0, start + Duration::from_secs(1));
        assert!(snap.percent.is_none());
        assert!(snap.eta.is_none());
    }

    #[test]
    fn eta_unknown_once_nothing_remains() {
        let (mut t, start) = tracker_with_clock(100);
        let snap = t.sample_at(100, start + Duration::from_secs(1));
        assert!(snap.rate.is_some());
        assert!(snap.eta.is_none());
        assert!((snap.percent.unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn eta_derived_from_smoothed_rate() {
        let (mut t, start) = tracker_with_clock(1000);
        let snap = t.sample_at(500, start + Duration::from_secs(1));
        // 500 B/s with 500 bytes remaining: one second to go.
        let eta = snap.eta.unwrap();
        assert!((eta.as_secs_f64() - 1.0).abs() < 1e-6);
    }
}
