//! Batches and pending batches.
//!
//! A [`Batch`] is an immutable, ordered chunk of items carrying a
//! monotonically increasing sequence number and a terminal flag. A
//! [`PendingBatch`] is a batch whose items are still being produced by an
//! asynchronous fetch; the driver can hold one pending batch while the
//! previous batch is being consumed, giving one batch of prefetch.

use crate::errors::BatchflowError;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;

/// An immutable, sequence-numbered chunk of items.
///
/// Within one pipeline run, sequence numbers strictly increase from 0 and
/// exactly the final pulled batch has `is_last = true` (a source producing
/// zero batches never emits a terminal signal at all). Batches are value
/// objects: never mutated after creation, cloned per sink during fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch<T> {
    items: Vec<T>,
    sequence_number: u64,
    is_last: bool,
}

impl<T> Batch<T> {
    /// Creates a new batch.
    #[must_use]
    pub fn new(sequence_number: u64, is_last: bool, items: Vec<T>) -> Self {
        Self {
            items,
            sequence_number,
            is_last,
        }
    }

    /// The items in this batch, in order.
    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Consumes the batch, returning its items.
    #[must_use]
    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    /// The batch's position in the run, starting at 0.
    #[must_use]
    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    /// Whether this is the final batch of the run.
    #[must_use]
    pub fn is_last(&self) -> bool {
        self.is_last
    }

    /// Number of items in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the batch carries no items.
    ///
    /// Empty batches are legal: a fully filtered batch is still emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// The eventual items of a [`PendingBatch`].
pub type ItemsFuture<T> = BoxFuture<'static, Result<Vec<T>, BatchflowError>>;

/// A batch whose items are the result of an in-flight asynchronous fetch.
///
/// Sequence number and terminal flag are fixed at creation; only the item
/// list is deferred. Resolution may fail, which propagates as a run failure.
pub struct PendingBatch<T> {
    sequence_number: u64,
    is_last: bool,
    items: ItemsFuture<T>,
}

impl<T: Send + 'static> PendingBatch<T> {
    /// Creates a pending batch from an item future.
    pub fn new<F>(sequence_number: u64, is_last: bool, items: F) -> Self
    where
        F: Future<Output = Result<Vec<T>, BatchflowError>> + Send + 'static,
    {
        Self {
            sequence_number,
            is_last,
            items: items.boxed(),
        }
    }

    /// Creates a pending batch whose items are already resolved.
    ///
    /// Used by sources that must fetch eagerly because the terminal flag is
    /// only knowable after the work is done (the crawl source, `limit`).
    #[must_use]
    pub fn ready(sequence_number: u64, is_last: bool, items: Vec<T>) -> Self {
        Self::new(sequence_number, is_last, async move { Ok(items) })
    }

    /// The batch's position in the run, starting at 0.
    #[must_use]
    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    /// Whether this will be the final batch of the run.
    #[must_use]
    pub fn is_last(&self) -> bool {
        self.is_last
    }

    /// Awaits the item fetch and produces the resolved [`Batch`].
    pub async fn resolve(self) -> Result<Batch<T>, BatchflowError> {
        let items = self.items.await?;
        Ok(Batch::new(self.sequence_number, self.is_last, items))
    }

    /// Returns a pending batch whose items are this batch's items run
    /// through `f` at resolution time. Sequence number and terminal flag
    /// carry over unchanged.
    pub(crate) fn map_items<U, F>(self, f: F) -> PendingBatch<U>
    where
        U: Send + 'static,
        F: FnOnce(Vec<T>) -> Result<Vec<U>, BatchflowError> + Send + 'static,
    {
        let items = self.items;
        PendingBatch::new(self.sequence_number, self.is_last, async move {
            f(items.await?)
        })
    }
}

impl<T> std::fmt::Debug for PendingBatch<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingBatch")
            .field("sequence_number", &self.sequence_number)
            .field("is_last", &self.is_last)
            .finish()
    }
}
