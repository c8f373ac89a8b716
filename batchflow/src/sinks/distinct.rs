//! Distinct-set sink.

use super::Sink;
use crate::batch::Batch;
use crate::cancellation::CancellationToken;
use crate::errors::BatchflowError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::hash::Hash;

/// Accumulates unique items, optionally up to a fixed capacity.
///
/// Items within one batch are evaluated strictly in order. Once capacity is
/// reached mid-batch, the remaining items of that batch are silently dropped
/// rather than buffered; this is the one deliberate data drop in the crate.
#[derive(Debug, Default)]
pub struct DistinctSink<T> {
    seen: Mutex<HashSet<T>>,
    capacity: Option<usize>,
}

impl<T: Eq + Hash> DistinctSink<T> {
    /// Creates an unbounded distinct sink.
    #[must_use]
    pub fn new() -> Self {
        Self {
            seen: Mutex::new(HashSet::new()),
            capacity: None,
        }
    }

    /// Creates a distinct sink holding at most `capacity` unique items.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            seen: Mutex::new(HashSet::new()),
            capacity: Some(capacity),
        }
    }

    /// Number of unique items held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    /// Whether no items have been accepted yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.lock().is_empty()
    }

    /// Whether the item has been accepted.
    #[must_use]
    pub fn contains(&self, item: &T) -> bool {
        self.seen.lock().contains(item)
    }

    /// Consumes the sink, returning the unique items.
    #[must_use]
    pub fn into_items(self) -> HashSet<T> {
        self.seen.into_inner()
    }
}

#[async_trait]
impl<T: Eq + Hash + Send + Sync> Sink<T> for DistinctSink<T> {
    fn can_receive(&self) -> bool {
        self.capacity
            .map_or(true, |cap| self.seen.lock().len() < cap)
    }

    async fn receive(
        &self,
        batch: Batch<T>,
        _cancel: &CancellationToken,
    ) -> Result<(), BatchflowError> {
        let mut seen = self.seen.lock();
        for item in batch.into_items() {
            if let Some(cap) = self.capacity {
                if seen.len() >= cap {
                    break;
                }
            }
            seen.insert(item);
        }
        Ok(())
    }
}
