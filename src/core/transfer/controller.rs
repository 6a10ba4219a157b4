//! Transfer orchestration: Idle → Running → (Completed | Failed) → Idle.
//!
//! The controller lives on the UI task and never blocks on transfer
//! I/O. A start request validates the selection, prepares the
//! destination, then spawns two tasks: the copy engine (sends exactly
//! one `Done`) and a ticker (feeds `Tick` messages into the UI loop's
//! event channel until finalization). The controller is the sole writer
//! of the displayed `TransferView`; copy workers only ever touch the
//! shared byte counter.

use crate::core::config::PerformanceConfig;
use crate::core::endpoint::Endpoint;
use crate::core::error::TransferError;
use crate::core::transfer::engine;
use crate::core::transfer::job::{Direction, TransferJob};
use crate::core::transfer::progress::{ProgressSnapshot, ProgressTracker};
use crate::utils::sos::SignalOfStop;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// The two browsing panes. After a successful transfer the pane that
/// received the file must re-enumerate its directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaneSide {
    Local,
    Remote,
}

/// Messages from the transfer domain back into the UI loop.
#[derive(Debug)]
pub enum TransferEvent {
    /// Progress cadence: re-sample and reschedule.
    Tick,
    /// The job finished, carrying its terminal error if any.
    Done(Option<TransferError>),
}

/// The item picked in the source pane.
#[derive(Debug, Clone)]
pub struct SelectedEntry {
    pub name: String,
    pub path: String,
    pub size: u64,
    pub is_dir: bool,
}

/// Everything a start request needs.
pub struct TransferRequest {
    pub direction: Direction,
    pub entry: SelectedEntry,
    pub source: Endpoint,
    pub dest: Endpoint,
    /// Destination directory; the file keeps its name.
    pub dest_dir: String,
    /// Pane to refresh once the transfer completes successfully.
    pub refresh: PaneSide,
}

/// Snapshot of the transfer state for rendering. Unknown quantities
/// stay `None` and are rendered as such, never guessed.
#[derive(Debug, Clone)]
pub struct TransferView {
    pub active: bool,
    pub direction: Direction,
    pub filename: String,
    pub transferred: u64,
    pub total: u64,
    pub percent: Option<f64>,
    pub rate: Option<f64>,
    pub eta: Option<Duration>,
    pub elapsed: Duration,
    pub terminal_error: Option<String>,
}

struct ActiveJob {
    direction: Direction,
    filename: String,
    counter: Arc<AtomicU64>,
    tracker: ProgressTracker,
    refresh: PaneSide,
    ticker_stop: SignalOfStop,
}

pub struct TransferController {
    perf: PerformanceConfig,
    events: mpsc::UnboundedSender<TransferEvent>,
    shutdown: SignalOfStop,
    active: Option<ActiveJob>,
    view: Option<TransferView>,
}

impl TransferController {
    pub fn new(
        perf: PerformanceConfig,
        events: mpsc::UnboundedSender<TransferEvent>,
        shutdown: SignalOfStop,
    ) -> Self {
        Self {
            perf,
            events,
            shutdown,
            active: None,
            view: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Last known transfer state; survives completion so the terminal
    /// status stays visible until the next start.
    pub fn view(&self) -> Option<&TransferView> {
        self.view.as_ref()
    }

    /// Idle → Running. Rejects directories before any handle is opened
    /// and rejects a second start while Running without touching the
    /// active job.
    pub async fn start(&mut self, req: TransferRequest) -> Result<(), TransferError> {
        if self.active.is_some() {
            return Err(TransferError::AlreadyRunning);
        }
        if req.entry.is_dir {
            return Err(TransferError::SourceIsDirectory);
        }

        // The destination parent must exist before the file is created.
        req.dest.ensure_dir(&req.dest_dir).await?;
        let dest_path = req.dest.join(&req.dest_dir, &req.entry.name);

        let job = TransferJob::new(
            req.direction,
            req.entry.name.clone(),
            req.source,
            req.entry.path.clone(),
            req.dest,
            dest_path,
            req.entry.size,
            self.perf.buffer_bytes(),
            self.perf.parallel_streams(),
        );

        info!(
            "starting {}: {} ({} bytes)",
            req.direction, req.entry.name, req.entry.size
        );

        let counter = job.counter();
        let ticker_stop = SignalOfStop::new();

        // Copy task: reports back exactly once, through the channel.
        let events = self.events.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            let result = engine::run(&job, &shutdown).await;
            let _ = events.send(TransferEvent::Done(result.err()));
        });

        // Ticker task: drives progress sampling until finalization.
        let events = self.events.clone();
        let stop = ticker_stop.clone();
        let interval = self.perf.progress_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first interval tick fires immediately; skip it so the
            // first sample lands one interval after the start.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if events.send(TransferEvent::Tick).is_err() {
                            break;
                        }
                    }
                    _ = stop.wait() => break,
                }
            }
        });

        let tracker = ProgressTracker::new(req.entry.size);
        let initial = tracker.snapshot(0, Instant::now());
        self.view = Some(make_view(
            true,
            req.direction,
            &req.entry.name,
            initial,
            None,
        ));
        self.active = Some(ActiveJob {
            direction: req.direction,
            filename: req.entry.name,
            counter,
            tracker,
            refresh: req.refresh,
            ticker_stop,
        });
        Ok(())
    }

    /// Feed a tick/done message through the state machine. Returns the
    /// pane to refresh when a job just completed successfully.
    pub fn handle_event(&mut self, event: TransferEvent) -> Option<PaneSide> {
        match event {
            TransferEvent::Tick => {
                // Ticks can trail the done signal; ignore them once idle.
                if let Some(active) = &mut self.active {
                    let snapshot = active.tracker.sample(active.counter.load(Ordering::Relaxed));
                    self.view = Some(make_view(
                        true,
                        active.direction,
                        &active.filename,
                        snapshot,
                        None,
                    ));
                }
                None
            }
            TransferEvent::Done(error) => self.finish(error),
        }
    }

    /// Running → (Completed | Failed) → Idle. Handles were already
    /// released by the engine; this captures the final byte count,
    /// stops the ticker, and clears the job reference.
    fn finish(&mut self, error: Option<TransferError>) -> Option<PaneSide> {
        let active = self.active.take()?;
        active.ticker_stop.cancel();

        let final_bytes = active.counter.load(Ordering::Relaxed);
        let snapshot = active.tracker.snapshot(final_bytes, Instant::now());

        let refresh = match &error {
            None => {
                info!(
                    "{} complete: {} ({} bytes)",
                    active.direction, active.filename, final_bytes
                );
                Some(active.refresh)
            }
            Some(e) => {
                warn!("{} failed: {}: {}", active.direction, active.filename, e);
                None
            }
        };

        self.view = Some(make_view(
            false,
            active.direction,
            &active.filename,
            snapshot,
            error.map(|e| e.to_string()),
        ));
        refresh
    }
}

fn make_view(
    active: bool,
    direction: Direction,
    filename: &str,
    snapshot: ProgressSnapshot,
    terminal_error: Option<String>,
) -> TransferView {
    TransferView {
        active,
        direction,
        filename: filename.to_string(),
        transferred: snapshot.transferred,
        total: snapshot.total,
        percent: snapshot.percent,
        rate: snapshot.rate,
        eta: snapshot.eta,
        elapsed: snapshot.elapsed,
        terminal_error,
    }
}
