//! Batch sources and their composable transform stages.
//!
//! A [`BatchSource`] is a lazy, pull-based generator of pending batches.
//! The pipe driver pulls by index starting at 0 until a batch arrives with
//! the terminal flag set, or until the source returns `None`.
//!
//! Transform stages ([`BatchSourceExt`]) never mutate the source they wrap;
//! each returns a new wrapper value holding the upstream plus a closure, so
//! independent transformed views can be derived from one source definition.
//! A *constructed* source instance is single-shot, however: sources that
//! carry run state (the crawl source, `limit`) are not reusable across runs.

mod combinators;

pub use combinators::{FilterSource, LimitSource, MapSource, SplitSource, TransformSource};

use crate::batch::PendingBatch;
use crate::cancellation::CancellationToken;
use crate::errors::BatchflowError;
use async_trait::async_trait;

/// A lazy, pull-based generator of pending batches.
#[async_trait]
pub trait BatchSource: Send + Sync {
    /// The item type carried by this source's batches.
    type Item: Send + 'static;

    /// Produces the pending batch at `index`, or `None` if the source is
    /// exhausted before emitting a batch at that index.
    ///
    /// The driver invokes this repeatedly with strictly increasing indices.
    /// The cancellation token is advisory here: sources doing long-running
    /// work (the crawl source) should check it between fetches.
    async fn next_pending_batch(
        &self,
        index: u64,
        cancel: &CancellationToken,
    ) -> Result<Option<PendingBatch<Self::Item>>, BatchflowError>;
}

/// Composable, non-mutating transform stages over a [`BatchSource`].
///
/// User-supplied functions that fail propagate out of batch resolution and
/// abort the run; combinators never swallow errors.
pub trait BatchSourceExt: BatchSource + Sized {
    /// Applies `f` to every item, preserving order, sequence numbers, and
    /// terminal flags.
    fn map_item<U, F>(self, f: F) -> MapSource<Self, F, U>
    where
        U: Send + 'static,
        F: Fn(Self::Item) -> Result<U, BatchflowError> + Send + Sync + 'static,
    {
        MapSource::new(self, f)
    }

    /// Flattens each item into zero or more output items. Batch boundaries
    /// are kept but the physical batch size may change; expansion follows
    /// item order.
    fn split_item<U, F>(self, f: F) -> SplitSource<Self, F, U>
    where
        U: Send + 'static,
        F: Fn(Self::Item) -> Result<Vec<U>, BatchflowError> + Send + Sync + 'static,
    {
        SplitSource::new(self, f)
    }

    /// Applies a whole-batch transform, e.g. in-batch de-duplication or
    /// summarization.
    fn transform_batch<U, F>(self, f: F) -> TransformSource<Self, F, U>
    where
        U: Send + 'static,
        F: Fn(Vec<Self::Item>) -> Result<Vec<U>, BatchflowError> + Send + Sync + 'static,
    {
        TransformSource::new(self, f)
    }

    /// Drops items failing the predicate. Batch count and terminal flags
    /// are unchanged; a fully filtered batch is still emitted, empty.
    fn filter<P>(self, predicate: P) -> FilterSource<Self, P>
    where
        P: Fn(&Self::Item) -> bool + Send + Sync + 'static,
    {
        FilterSource::new(self, predicate)
    }

    /// Stops producing once `max_items` items have been emitted in total.
    /// The batch that crosses the boundary is truncated and marked terminal
    /// even if the upstream had more data.
    fn limit(self, max_items: usize) -> LimitSource<Self> {
        LimitSource::new(self, max_items)
    }
}

impl<S: BatchSource> BatchSourceExt for S {}

/// A finite in-memory source that chunks a vector into fixed-size batches.
///
/// For N items and batch size K this yields batches of sizes
/// `[K, K, .., N mod K]` with sequence numbers `0..ceil(N/K)-1`, only the
/// last one terminal. An empty vector yields no batches at all.
#[derive(Debug, Clone)]
pub struct ItemsSource<T> {
    items: Vec<T>,
    batch_size: usize,
}

impl<T: Clone + Send + Sync + 'static> ItemsSource<T> {
    /// Creates a new in-memory source.
    ///
    /// Fails fast on a zero batch size.
    pub fn new(items: Vec<T>, batch_size: usize) -> Result<Self, BatchflowError> {
        if batch_size == 0 {
            return Err(BatchflowError::configuration(
                "batch size must be positive",
            ));
        }
        Ok(Self { items, batch_size })
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> BatchSource for ItemsSource<T> {
    type Item = T;

    async fn next_pending_batch(
        &self,
        index: u64,
        _cancel: &CancellationToken,
    ) -> Result<Option<PendingBatch<T>>, BatchflowError> {
        let start = usize::try_from(index)
            .ok()
            .and_then(|i| i.checked_mul(self.batch_size))
            .ok_or_else(|| BatchflowError::internal("batch index overflow"))?;

        if start >= self.items.len() {
            return Ok(None);
        }

        let end = (start + self.batch_size).min(self.items.len());
        let is_last = end == self.items.len();
        Ok(Some(PendingBatch::ready(
            index,
            is_last,
            self.items[start..end].to_vec(),
        )))
    }
}
