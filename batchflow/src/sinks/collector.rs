//! In-memory collecting sink.

use super::Sink;
use crate::batch::Batch;
use crate::cancellation::CancellationToken;
use crate::errors::BatchflowError;
use async_trait::async_trait;
use parking_lot::Mutex;

/// Appends every item from every batch into an ordered buffer.
///
/// With a capacity set, `can_receive` turns false once the buffer holds that
/// many items; batches already handed over are still appended in full.
#[derive(Debug, Default)]
pub struct CollectorSink<T> {
    items: Mutex<Vec<T>>,
    capacity: Option<usize>,
}

impl<T> CollectorSink<T> {
    /// Creates an unbounded collector.
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            capacity: None,
        }
    }

    /// Creates a collector whose `can_receive` is bounded by `capacity`.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            capacity: Some(capacity),
        }
    }

    /// Number of items collected so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Whether nothing has been collected yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Consumes the sink, returning the collected items in arrival order.
    #[must_use]
    pub fn into_items(self) -> Vec<T> {
        self.items.into_inner()
    }
}

impl<T: Clone> CollectorSink<T> {
    /// Returns a copy of the collected items in arrival order.
    #[must_use]
    pub fn items(&self) -> Vec<T> {
        self.items.lock().clone()
    }
}

#[async_trait]
impl<T: Send + Sync> Sink<T> for CollectorSink<T> {
    fn can_receive(&self) -> bool {
        self.capacity
            .map_or(true, |cap| self.items.lock().len() < cap)
    }

    async fn receive(
        &self,
        batch: Batch<T>,
        _cancel: &CancellationToken,
    ) -> Result<(), BatchflowError> {
        self.items.lock().extend(batch.into_items());
        Ok(())
    }
}
