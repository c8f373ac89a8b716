//! Transform-stage wrapper sources.
//!
//! Each combinator is an independent wrapper value holding the upstream
//! source and a shared closure; no inheritance, no upstream mutation. The
//! closure is applied during batch resolution, so map/split/transform/filter
//! preserve the upstream's laziness. `limit` is the exception: it resolves
//! eagerly because the terminal flag is only knowable after resolution.

use super::BatchSource;
use crate::batch::PendingBatch;
use crate::cancellation::CancellationToken;
use crate::errors::BatchflowError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::marker::PhantomData;
use std::sync::Arc;

/// Per-item mapping stage. See [`super::BatchSourceExt::map_item`].
pub struct MapSource<S, F, U> {
    upstream: S,
    f: Arc<F>,
    _out: PhantomData<fn() -> U>,
}

impl<S, F, U> MapSource<S, F, U> {
    pub(crate) fn new(upstream: S, f: F) -> Self {
        Self {
            upstream,
            f: Arc::new(f),
            _out: PhantomData,
        }
    }
}

#[async_trait]
impl<S, F, U> BatchSource for MapSource<S, F, U>
where
    S: BatchSource,
    U: Send + 'static,
    F: Fn(S::Item) -> Result<U, BatchflowError> + Send + Sync + 'static,
{
    type Item = U;

    async fn next_pending_batch(
        &self,
        index: u64,
        cancel: &CancellationToken,
    ) -> Result<Option<PendingBatch<U>>, BatchflowError> {
        let Some(pending) = self.upstream.next_pending_batch(index, cancel).await? else {
            return Ok(None);
        };
        let f = Arc::clone(&self.f);
        Ok(Some(pending.map_items(move |items| {
            items.into_iter().map(|item| f(item)).collect()
        })))
    }
}

/// One-to-many item expansion stage. See [`super::BatchSourceExt::split_item`].
pub struct SplitSource<S, F, U> {
    upstream: S,
    f: Arc<F>,
    _out: PhantomData<fn() -> U>,
}

impl<S, F, U> SplitSource<S, F, U> {
    pub(crate) fn new(upstream: S, f: F) -> Self {
        Self {
            upstream,
            f: Arc::new(f),
            _out: PhantomData,
        }
    }
}

#[async_trait]
impl<S, F, U> BatchSource for SplitSource<S, F, U>
where
    S: BatchSource,
    U: Send + 'static,
    F: Fn(S::Item) -> Result<Vec<U>, BatchflowError> + Send + Sync + 'static,
{
    type Item = U;

    async fn next_pending_batch(
        &self,
        index: u64,
        cancel: &CancellationToken,
    ) -> Result<Option<PendingBatch<U>>, BatchflowError> {
        let Some(pending) = self.upstream.next_pending_batch(index, cancel).await? else {
            return Ok(None);
        };
        let f = Arc::clone(&self.f);
        Ok(Some(pending.map_items(move |items| {
            let mut out = Vec::new();
            for item in items {
                out.extend(f(item)?);
            }
            Ok(out)
        })))
    }
}

/// Whole-batch transform stage. See [`super::BatchSourceExt::transform_batch`].
pub struct TransformSource<S, F, U> {
    upstream: S,
    f: Arc<F>,
    _out: PhantomData<fn() -> U>,
}

impl<S, F, U> TransformSource<S, F, U> {
    pub(crate) fn new(upstream: S, f: F) -> Self {
        Self {
            upstream,
            f: Arc::new(f),
            _out: PhantomData,
        }
    }
}

#[async_trait]
impl<S, F, U> BatchSource for TransformSource<S, F, U>
where
    S: BatchSource,
    U: Send + 'static,
    F: Fn(Vec<S::Item>) -> Result<Vec<U>, BatchflowError> + Send + Sync + 'static,
{
    type Item = U;

    async fn next_pending_batch(
        &self,
        index: u64,
        cancel: &CancellationToken,
    ) -> Result<Option<PendingBatch<U>>, BatchflowError> {
        let Some(pending) = self.upstream.next_pending_batch(index, cancel).await? else {
            return Ok(None);
        };
        let f = Arc::clone(&self.f);
        Ok(Some(pending.map_items(move |items| f(items))))
    }
}

/// Predicate filtering stage. See [`super::BatchSourceExt::filter`].
pub struct FilterSource<S, P> {
    upstream: S,
    predicate: Arc<P>,
}

impl<S, P> FilterSource<S, P> {
    pub(crate) fn new(upstream: S, predicate: P) -> Self {
        Self {
            upstream,
            predicate: Arc::new(predicate),
        }
    }
}

#[async_trait]
impl<S, P> BatchSource for FilterSource<S, P>
where
    S: BatchSource,
    P: Fn(&S::Item) -> bool + Send + Sync + 'static,
{
    type Item = S::Item;

    async fn next_pending_batch(
        &self,
        index: u64,
        cancel: &CancellationToken,
    ) -> Result<Option<PendingBatch<S::Item>>, BatchflowError> {
        let Some(pending) = self.upstream.next_pending_batch(index, cancel).await? else {
            return Ok(None);
        };
        let predicate = Arc::clone(&self.predicate);
        Ok(Some(pending.map_items(move |items| {
            Ok(items.into_iter().filter(|item| predicate(item)).collect())
        })))
    }
}

#[derive(Debug, Default)]
struct LimitState {
    emitted: usize,
    exhausted: bool,
}

/// Cumulative item-count cap. See [`super::BatchSourceExt::limit`].
///
/// Carries run state (the running item count), so a constructed instance is
/// single-shot.
pub struct LimitSource<S> {
    upstream: S,
    max_items: usize,
    state: Mutex<LimitState>,
}

impl<S> LimitSource<S> {
    pub(crate) fn new(upstream: S, max_items: usize) -> Self {
        Self {
            upstream,
            max_items,
            state: Mutex::new(LimitState::default()),
        }
    }
}

#[async_trait]
impl<S: BatchSource> BatchSource for LimitSource<S> {
    type Item = S::Item;

    async fn next_pending_batch(
        &self,
        index: u64,
        cancel: &CancellationToken,
    ) -> Result<Option<PendingBatch<S::Item>>, BatchflowError> {
        {
            let state = self.state.lock();
            if state.exhausted || state.emitted >= self.max_items {
                return Ok(None);
            }
        }

        let Some(pending) = self.upstream.next_pending_batch(index, cancel).await? else {
            return Ok(None);
        };

        // The terminal flag may flip when this batch crosses the cap, so
        // resolution cannot be deferred.
        let batch = pending.resolve().await?;
        let sequence_number = batch.sequence_number();
        let mut is_last = batch.is_last();
        let mut items = batch.into_items();

        let mut state = self.state.lock();
        let remaining = self.max_items - state.emitted;
        if items.len() >= remaining {
            items.truncate(remaining);
            is_last = true;
            state.exhausted = true;
        }
        if is_last {
            state.exhausted = true;
        }
        state.emitted += items.len();

        Ok(Some(PendingBatch::ready(sequence_number, is_last, items)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{BatchSourceExt, ItemsSource};

    async fn collect_all<S: BatchSource>(source: &S) -> Vec<crate::batch::Batch<S::Item>> {
        let cancel = CancellationToken::new();
        let mut batches = Vec::new();
        let mut index = 0;
        while let Some(pending) = source.next_pending_batch(index, &cancel).await.unwrap() {
            let batch = pending.resolve().await.unwrap();
            let last = batch.is_last();
            batches.push(batch);
            if last {
                break;
            }
            index += 1;
        }
        batches
    }

    #[tokio::test]
    async fn test_map_item_preserves_order_and_flags() {
        let source = ItemsSource::new(vec![1, 2, 3, 4, 5], 2)
            .unwrap()
            .map_item(|i| Ok(i * 2));

        let batches = collect_all(&source).await;
        assert_eq!(batches.len(), 3);
        assert!(batches[2].is_last());
        let items: Vec<i32> = batches
            .into_iter()
            .flat_map(crate::batch::Batch::into_items)
            .collect();
        assert_eq!(items, vec![2, 4, 6, 8, 10]);
    }

    #[tokio::test]
    async fn test_map_item_error_aborts_resolution() {
        let source = ItemsSource::new(vec![1, 2, 3], 3).unwrap().map_item(|i| {
            if i == 2 {
                Err(BatchflowError::transform("refused item"))
            } else {
                Ok(i)
            }
        });

        let cancel = CancellationToken::new();
        let pending = source
            .next_pending_batch(0, &cancel)
            .await
            .unwrap()
            .unwrap();
        assert!(pending.resolve().await.is_err());
    }

    #[tokio::test]
    async fn test_split_item_expands_in_order() {
        let source = ItemsSource::new(vec!["a b", "c"], 2)
            .unwrap()
            .split_item(|s| Ok(s.split(' ').map(String::from).collect()));

        let batches = collect_all(&source).await;
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].items(), &["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_transform_batch_dedupes() {
        let source = ItemsSource::new(vec![1, 1, 2, 2, 3, 3], 6)
            .unwrap()
            .transform_batch(|items| {
                let mut out: Vec<i32> = Vec::new();
                for item in items {
                    if out.last() != Some(&item) {
                        out.push(item);
                    }
                }
                Ok(out)
            });

        let batches = collect_all(&source).await;
        assert_eq!(batches[0].items(), &[1, 2, 3]);
    }

    #[tokio::test]
    async fn test_filter_keeps_empty_batches() {
        let source = ItemsSource::new(vec![1, 3, 5, 6], 2)
            .unwrap()
            .filter(|i| i % 2 == 0);

        let batches = collect_all(&source).await;
        // Same batch count as upstream, first is fully filtered but emitted.
        assert_eq!(batches.len(), 2);
        assert!(batches[0].is_empty());
        assert_eq!(batches[1].items(), &[6]);
        assert!(batches[1].is_last());
    }

    #[tokio::test]
    async fn test_limit_truncates_and_terminates() {
        let source = ItemsSource::new((0..10).collect(), 3).unwrap().limit(5);

        let batches = collect_all(&source).await;
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 3);
        assert_eq!(batches[1].len(), 2);
        assert!(batches[1].is_last());

        // Exhausted after the cap: no further batches even if asked.
        let cancel = CancellationToken::new();
        assert!(source
            .next_pending_batch(2, &cancel)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_limit_exact_boundary_is_terminal() {
        let source = ItemsSource::new((0..10).collect(), 2).unwrap().limit(4);

        let batches = collect_all(&source).await;
        assert_eq!(batches.len(), 2);
        assert!(batches[1].is_last());
        assert_eq!(batches[1].len(), 2);
    }

    #[tokio::test]
    async fn test_limit_zero_produces_nothing() {
        let source = ItemsSource::new(vec![1, 2, 3], 2).unwrap().limit(0);
        let cancel = CancellationToken::new();
        assert!(source
            .next_pending_batch(0, &cancel)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_chained_combinators() {
        let source = ItemsSource::new((1..=8).collect(), 4)
            .unwrap()
            .filter(|i| i % 2 == 0)
            .map_item(|i| Ok(i * 10))
            .limit(3);

        let batches = collect_all(&source).await;
        let items: Vec<i32> = batches
            .into_iter()
            .flat_map(crate::batch::Batch::into_items)
            .collect();
        assert_eq!(items, vec![20, 40, 60]);
    }
}
