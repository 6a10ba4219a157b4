//! The chunked copy engine.
//!
//! Copies a job's bytes either through a single buffered loop or split
//! across parallel byte ranges, one spawned worker per range. Workers
//! report their terminal result over a channel sized to the worker
//! count, so a failed worker can never block on a receiver that is no
//! longer draining. Every opened handle is closed exactly once on every
//! path.

use crate::core::endpoint::{Endpoint, FileHandle};
use crate::core::error::TransferError;
use crate::core::transfer::chunk::{ChunkRange, partition};
use crate::core::transfer::job::TransferJob;
use crate::utils::sos::SignalOfStop;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// The parallel path needs more than one stream, positioned access on
/// both sides, and a file large enough that splitting pays for itself.
pub(crate) fn parallel_eligible(job: &TransferJob) -> bool {
    job.streams > 1
        && job.source.supports_positioned()
        && job.dest.supports_positioned()
        && job.total_bytes > job.buffer_bytes as u64
}

/// Copy all of the job's bytes. On a failure-free run the cumulative
/// counter ends exactly at `total_bytes`.
pub async fn run(job: &TransferJob, cancel: &SignalOfStop) -> Result<(), TransferError> {
    // Open the main pair up front: validates the source and creates
    // (or truncates) the destination before any worker starts.
    let src = job.source.open_source(&job.source_path).await?;
    let dst = match job.dest.create_dest(&job.dest_path).await {
        Ok(d) => d,
        Err(e) => {
            let _ = src.close().await;
            return Err(e);
        }
    };

    if parallel_eligible(job) {
        // The ranged workers open their own handles; the main pair has
        // done its job and is released before the pass starts.
        let close = close_pair(src, dst).await;
        close?;
        run_parallel(job, cancel).await
    } else {
        run_sequential(job, src, dst, cancel).await
    }
}

// ── Sequential path ──────────────────────────────────────────────────────────

async fn run_sequential(
    job: &TransferJob,
    mut src: FileHandle,
    mut dst: FileHandle,
    cancel: &SignalOfStop,
) -> Result<(), TransferError> {
    debug!(
        "sequential copy: {} ({} bytes)",
        job.filename, job.total_bytes
    );

    let result = copy_stream(
        &mut src,
        &mut dst,
        job.total_bytes,
        job.buffer_bytes,
        &job.counter(),
        cancel,
    )
    .await;

    let close = close_pair(src, dst).await;
    result.and(close)
}

/// One buffered copy loop. The counter is bumped after every successful
/// write; finishing short of `total` is an error, never a silent
/// truncation.
async fn copy_stream(
    src: &mut FileHandle,
    dst: &mut FileHandle,
    total: u64,
    buffer_bytes: usize,
    cumulative: &AtomicU64,
    cancel: &SignalOfStop,
) -> Result<(), TransferError> {
    let mut buf = vec![0u8; buffer_bytes.max(1)];
    let mut copied = 0u64;

    loop {
        if cancel.cancelled() {
            return Err(TransferError::Interrupted);
        }
        let n = src.read(&mut buf).await.map_err(|e| TransferError::Read {
            offset: copied,
            detail: e.to_string(),
        })?;
        if n == 0 {
            break;
        }
        dst.write_all(&buf[..n])
            .await
            .map_err(|e| TransferError::Write {
                offset: copied,
                detail: e.to_string(),
            })?;
        cumulative.fetch_add(n as u64, Ordering::Relaxed);
        copied += n as u64;
    }

    if copied < total {
        return Err(TransferError::ShortRead {
            offset: copied,
            remaining: total - copied,
        });
    }
    Ok(())
}

// ── Parallel path ────────────────────────────────────────────────────────────

async fn run_parallel(job: &TransferJob, cancel: &SignalOfStop) -> Result<(), TransferError> {
    let ranges = partition(job.total_bytes, job.streams);
    info!(
        "parallel copy: {} ({} bytes across {} ranges)",
        job.filename,
        job.total_bytes,
        ranges.len()
    );

    // Sized to hold every worker's result so no worker ever blocks
    // trying to report after the collector has seen a failure.
    let (tx, mut rx) = mpsc::channel::<Result<(), TransferError>>(ranges.len());

    for range in &ranges {
        let worker = RangeWorker {
            source: job.source.clone(),
            source_path: job.source_path.clone(),
            dest: job.dest.clone(),
            dest_path: job.dest_path.clone(),
            range: *range,
            buffer_bytes: job.buffer_bytes,
            cumulative: job.counter(),
            cancel: cancel.clone(),
        };
        let tx = tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(worker.run().await).await;
        });
    }
    drop(tx);

    // Wait for every worker; surface one of the collected errors.
    let mut first_err = None;
    while let Some(result) = rx.recv().await {
        if let Err(e) = result
            && first_err.is_none()
        {
            first_err = Some(e);
        }
    }

    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// One parallel copy worker. Owns a bounded, non-overlapping slice of
/// the offset space; never reads another worker's range.
struct RangeWorker {
    source: Endpoint,
    source_path: String,
    dest: Endpoint,
    dest_path: String,
    range: ChunkRange,
    buffer_bytes: usize,
    cumulative: Arc<AtomicU64>,
    cancel: SignalOfStop,
}

impl RangeWorker {
    async fn run(self) -> Result<(), TransferError> {
        let mut src = self.source.open_source(&self.source_path).await?;
        let mut dst = match self.dest.open_dest_ranged(&self.dest_path).await {
            Ok(d) => d,
            Err(e) => {
                let _ = src.close().await;
                return Err(e);
            }
        };

        let result = self.copy_range(&mut src, &mut dst).await;
        let close = close_pair(src, dst).await;
        result.and(close)
    }

    async fn copy_range(&self, src: &mut FileHandle, dst: &mut FileHandle) -> Result<(), TransferError> {
        src.seek_to(self.range.offset)
            .await
            .map_err(|e| TransferError::Read {
                offset: self.range.offset,
                detail: e.to_string(),
            })?;
        dst.seek_to(self.range.offset)
            .await
            .map_err(|e| TransferError::Write {
                offset: self.range.offset,
                detail: e.to_string(),
            })?;

        let mut buf = vec![0u8; self.buffer_bytes.max(1)];
        let mut offset = self.range.offset;
        let mut remaining = self.range.len;

        while remaining > 0 {
            if self.cancel.cancelled() {
                return Err(TransferError::Interrupted);
            }
            let want = buf.len().min(remaining as usize);
            let n = src
                .read(&mut buf[..want])
                .await
                .map_err(|e| TransferError::Read {
                    offset,
                    detail: e.to_string(),
                })?;
            if n == 0 {
                return Err(TransferError::ShortRead { offset, remaining });
            }
            dst.write_all(&buf[..n])
                .await
                .map_err(|e| TransferError::Write {
                    offset,
                    detail: e.to_string(),
                })?;
            self.cumulative.fetch_add(n as u64, Ordering::Relaxed);
            offset += n as u64;
            remaining -= n as u64;
        }
        Ok(())
    }
}

/// Close both handles, keeping the first close error. Each handle is
/// consumed, so a double close cannot compile.
async fn close_pair(src: FileHandle, dst: FileHandle) -> Result<(), TransferError> {
    let dst_result = dst.close().await;
    let src_result = src.close().await;
    dst_result.and(src_result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transfer::job::Direction;
    use std::path::{Path, PathBuf};

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("skiff_test").join("engine").join(name);
        let _ = std::fs::remove_dir_all(&dir);
        let _ = std::fs::create_dir_all(&dir);
        dir
    }

    fn cleanup(path: &Path) {
        let _ = std::fs::remove_dir_all(path);
    }

    fn local_job(src: &Path, dst: &Path, total: u64, buffer: usize, streams: usize) -> TransferJob {
        TransferJob::new(
            Direction::Upload,
            src.file_name().unwrap().to_string_lossy().into_owned(),
            Endpoint::Local,
            src.to_string_lossy().into_owned(),
            Endpoint::Local,
            dst.to_string_lossy().into_owned(),
            total,
            buffer,
            streams,
        )
    }

    fn patterned(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[tokio::test]
    async fn sequential_copy_moves_every_byte() {
        let dir = test_dir("sequential");
        let src = dir.join("src.bin");
        let dst = dir.join("dst.bin");
        let data = patterned(100_000);
        std::fs::write(&src, &data).unwrap();

        let job = local_job(&src, &dst, data.len() as u64, 64 * 1024, 1);
        run(&job, &SignalOfStop::new()).await.unwrap();

        assert_eq!(job.transferred(), data.len() as u64);
        assert_eq!(std::fs::read(&dst).unwrap(), data);
        cleanup(&dir);
    }

    #[tokio::test]
    async fn zero_byte_file_creates_empty_destination() {
        let dir = test_dir("empty");
        let src = dir.join("src.bin");
        let dst = dir.join("dst.bin");
        std::fs::write(&src, b"").unwrap();

        let job = local_job(&src, &dst, 0, 4096, 4);
        assert!(!parallel_eligible(&job));
        run(&job, &SignalOfStop::new()).await.unwrap();

        assert_eq!(job.transferred(), 0);
        assert_eq!(std::fs::metadata(&dst).unwrap().len(), 0);
        cleanup(&dir);
    }

    #[tokio::test]
    async fn parallel_copy_ten_mib_across_four_streams() {
        let dir = test_dir("parallel");
        let src = dir.join("big.bin");
        let dst = dir.join("big.out");
        let data = patterned(10 * 1024 * 1024);
        std::fs::write(&src, &data).unwrap();

        let job = local_job(&src, &dst, data.len() as u64, 2 * 1024 * 1024, 4);
        assert!(parallel_eligible(&job));
        run(&job, &SignalOfStop::new()).await.unwrap();

        assert_eq!(job.transferred(), 10_485_760);
        assert_eq!(std::fs::read(&dst).unwrap(), data);
        cleanup(&dir);
    }

    #[tokio::test]
    async fn parallel_copy_with_uneven_tail_range() {
        let dir = test_dir("uneven");
        let src = dir.join("odd.bin");
        let dst = dir.join("odd.out");
        let data = patterned(3 * 1024 * 1024 + 12345);
        std::fs::write(&src, &data).unwrap();

        let job = local_job(&src, &dst, data.len() as u64, 256 * 1024, 8);
        run(&job, &SignalOfStop::new()).await.unwrap();

        assert_eq!(job.transferred(), data.len() as u64);
        assert_eq!(std::fs::read(&dst).unwrap(), data);
        cleanup(&dir);
    }

    #[tokio::test]
    async fn declared_size_beyond_source_fails_without_truncation() {
        // The source is shorter than the declared total, so the tail
        // workers hit end-of-data mid-range. The job must fail and every
        // worker must still be able to report.
        let dir = test_dir("short");
        let src = dir.join("short.bin");
        let dst = dir.join("short.out");
        std::fs::write(&src, patterned(1024 * 1024)).unwrap();

        let declared = 4 * 1024 * 1024u64;
        let job = local_job(&src, &dst, declared, 128 * 1024, 4);
        let err = run(&job, &SignalOfStop::new()).await.unwrap_err();
        assert!(matches!(err, TransferError::ShortRead { .. }), "{err:?}");
        assert!(job.transferred() < declared);
        cleanup(&dir);
    }

    #[tokio::test]
    async fn sequential_short_source_is_an_error() {
        let dir = test_dir("short_seq");
        let src = dir.join("src.bin");
        let dst = dir.join("dst.bin");
        std::fs::write(&src, patterned(100)).unwrap();

        let job = local_job(&src, &dst, 500, 4096, 1);
        let err = run(&job, &SignalOfStop::new()).await.unwrap_err();
        assert!(matches!(
            err,
            TransferError::ShortRead {
                offset: 100,
                remaining: 400
            }
        ));
        cleanup(&dir);
    }

    #[tokio::test]
    async fn missing_source_reports_open_error() {
        let dir = test_dir("missing");
        let src = dir.join("nope.bin");
        let dst = dir.join("dst.bin");

        let job = local_job(&src, &dst, 10, 4096, 1);
        let err = run(&job, &SignalOfStop::new()).await.unwrap_err();
        assert!(matches!(err, TransferError::Open { .. }));
        cleanup(&dir);
    }

    #[tokio::test]
    async fn cancelled_job_reports_interrupted() {
        let dir = test_dir("cancelled");
        let src = dir.join("src.bin");
        let dst = dir.join("dst.bin");
        let data = patterned(512 * 1024);
        std::fs::write(&src, &data).unwrap();

        let cancel = SignalOfStop::new();
        cancel.cancel();
        let job = local_job(&src, &dst, data.len() as u64, 64 * 1024, 1);
        let err = run(&job, &cancel).await.unwrap_err();
        assert!(matches!(err, TransferError::Interrupted));
        cleanup(&dir);
    }
}
