//! Running-statistics sink.

use super::Sink;
use crate::batch::Batch;
use crate::cancellation::CancellationToken;
use crate::errors::BatchflowError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Tracks batch and item throughput for one run.
///
/// The wall clock starts on the first batch received and stops when a batch
/// with the terminal flag arrives; before that, elapsed time is measured
/// against "now" so rates stay live during the run.
#[derive(Debug, Default)]
pub struct StatsSink {
    batches_received: AtomicU64,
    items_received: AtomicU64,
    started: Mutex<Option<Instant>>,
    finished: Mutex<Option<Instant>>,
}

impl StatsSink {
    /// Creates a new statistics sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of batches received so far.
    #[must_use]
    pub fn batches_received(&self) -> u64 {
        self.batches_received.load(Ordering::Relaxed)
    }

    /// Number of items received so far.
    #[must_use]
    pub fn items_received(&self) -> u64 {
        self.items_received.load(Ordering::Relaxed)
    }

    /// Wall-clock time between the first batch and the terminal batch (or
    /// now, if the run is still going). `None` before any batch arrived.
    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        let started = (*self.started.lock())?;
        let end = (*self.finished.lock()).unwrap_or_else(Instant::now);
        Some(end.duration_since(started))
    }

    /// Items per second over the elapsed window.
    #[must_use]
    pub fn items_per_second(&self) -> f64 {
        self.rate(self.items_received())
    }

    /// Batches per second over the elapsed window.
    #[must_use]
    pub fn batches_per_second(&self) -> f64 {
        self.rate(self.batches_received())
    }

    fn rate(&self, count: u64) -> f64 {
        match self.elapsed() {
            Some(elapsed) if elapsed.as_secs_f64() > 0.0 => {
                count as f64 / elapsed.as_secs_f64()
            }
            _ => 0.0,
        }
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> Sink<T> for StatsSink {
    async fn receive(
        &self,
        batch: Batch<T>,
        _cancel: &CancellationToken,
    ) -> Result<(), BatchflowError> {
        self.started.lock().get_or_insert_with(Instant::now);

        self.batches_received.fetch_add(1, Ordering::Relaxed);
        self.items_received
            .fetch_add(batch.len() as u64, Ordering::Relaxed);

        if batch.is_last() {
            *self.finished.lock() = Some(Instant::now());
        }
        Ok(())
    }
}
