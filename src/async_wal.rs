//! Async append-only log writer — same on-disk format as [`crate::wal`],
//! batched through a dedicated writer task.
//!
//! Submissions go over a bounded channel (default capacity 10 000); the
//! writer batches by count (default 1 000) or wall-clock (default 100 ms),
//! flushing durably at each batch boundary. A full queue fails submission
//! fast rather than blocking the caller.

use crate::error::{AxonError, Result};
use crate::wal::{WalEntryType, WalWriter};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;

pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;
pub const DEFAULT_BATCH_SIZE: usize = 1_000;
pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_millis(100);

struct Submission {
    entry_type: WalEntryType,
    payload: Vec<u8>,
    timestamp_us: u64,
}

#[derive(Debug, Default)]
struct AsyncWalCounters {
    submitted: AtomicU64,
    rejected: AtomicU64,
    errors: AtomicU64,
}

/// Handle retained by callers to submit entries; the writer task owns the
/// actual file.
pub struct AsyncWalHandle {
    tx: mpsc::Sender<Submission>,
    counters: Arc<AsyncWalCounters>,
}

impl AsyncWalHandle {
    /// Non-blocking submit. Fails fast with [`AxonError::Backpressure`] if
    /// the queue is full; the caller decides whether to retry or drop.
    pub fn submit(&self, entry_type: WalEntryType, payload: Vec<u8>, timestamp_us: u64) -> Result<()> {
        match self.tx.try_send(Submission {
            entry_type,
            payload,
            timestamp_us,
        }) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                Err(AxonError::Backpressure("async wal queue full".into()))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(AxonError::ShutdownInProgress),
        }
    }

    pub fn error_count(&self) -> u64 {
        self.counters.errors.load(Ordering::Relaxed)
    }

    pub fn rejected_count(&self) -> u64 {
        self.counters.rejected.load(Ordering::Relaxed)
    }
}

pub struct AsyncWalConfig {
    pub path: PathBuf,
    pub queue_capacity: usize,
    pub batch_size: usize,
    pub batch_timeout: Duration,
}

impl AsyncWalConfig {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_timeout: DEFAULT_BATCH_TIMEOUT,
        }
    }
}

/// Spawns the dedicated writer task and returns a handle plus a shutdown
/// sender. Dropping the shutdown sender (or calling it) causes the writer
/// to drain the queue and flush durably before the task exits.
pub fn spawn_async_wal(
    config: AsyncWalConfig,
) -> io::Result<(AsyncWalHandle, tokio::task::JoinHandle<()>, mpsc::Sender<()>)> {
    let mut writer = WalWriter::create(&config.path)?;
    let (tx, mut rx) = mpsc::channel::<Submission>(config.queue_capacity);
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
    let counters = Arc::new(AsyncWalCounters::default());
    let counters_task = counters.clone();
    let batch_size = config.batch_size;
    let batch_timeout = config.batch_timeout;

    let join = tokio::spawn(async move {
        let mut ticker = interval(batch_timeout);
        let mut batch: Vec<Submission> = Vec::with_capacity(batch_size);
        let mut shutting_down = false;

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv(), if !shutting_down => {
                    shutting_down = true;
                    rx.close();
                }
                maybe = rx.recv() => {
                    match maybe {
                        Some(sub) => {
                            batch.push(sub);
                            if batch.len() >= batch_size {
                                flush_batch(&mut writer, &mut batch, &counters_task);
                            }
                        }
                        None => {
                            flush_batch(&mut writer, &mut batch, &counters_task);
                            break;
                        }
                    }
                }
                _ = ticker.tick() => {
                    flush_batch(&mut writer, &mut batch, &counters_task);
                }
            }
        }
        let _ = writer.flush();
    });

    Ok((AsyncWalHandle { tx, counters }, join, shutdown_tx))
}

fn flush_batch(writer: &mut WalWriter, batch: &mut Vec<Submission>, counters: &Arc<AsyncWalCounters>) {
    if batch.is_empty() {
        return;
    }
    for sub in batch.drain(..) {
        if writer
            .append(sub.entry_type, sub.payload, sub.timestamp_us)
            .is_err()
        {
            counters.errors.fetch_add(1, Ordering::Relaxed);
        }
    }
    let _ = writer.flush();
}

use std::io;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wal::WalReader;
    use tempfile::tempdir;

    #[tokio::test]
    async fn batches_and_flushes_on_shutdown() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("async.wal");
        let (handle, join, shutdown) = spawn_async_wal(AsyncWalConfig::new(path.clone())).unwrap();

        for i in 0..5u8 {
            handle
                .submit(WalEntryType::TokenCreated, vec![i], i as u64)
                .unwrap();
        }
        let _ = shutdown.send(()).await;
        join.await.unwrap();

        let mut count = 0;
        WalReader::replay(&path, |_e| count += 1).unwrap();
        assert_eq!(count, 5);
    }

    #[tokio::test]
    async fn full_queue_fails_fast() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("full.wal");
        let mut cfg = AsyncWalConfig::new(path);
        cfg.queue_capacity = 1;
        let (handle, join, shutdown) = spawn_async_wal(cfg).unwrap();
        // Fill the single slot; a near-immediate second submit should fail or
        // succeed depending on scheduler timing, so we only assert the API
        // never blocks (it returns synchronously either way).
        let _ = handle.submit(WalEntryType::TokenCreated, vec![0], 0);
        let _ = handle.submit(WalEntryType::TokenCreated, vec![1], 0);
        let _ = shutdown.send(()).await;
        join.await.unwrap();
    }
}
