//! Keyed aggregation sink.

use super::Sink;
use crate::batch::Batch;
use crate::cancellation::CancellationToken;
use crate::errors::BatchflowError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::hash::Hash;

type KeyFn<T, K> = Box<dyn Fn(&T) -> K + Send + Sync>;
type ValueFn<T, V> = Box<dyn Fn(&T) -> V + Send + Sync>;
type CombineFn<V> = Box<dyn Fn(V, V) -> V + Send + Sync>;

/// Merges per-item partial values into a concurrency-safe map, keyed by a
/// caller-supplied selector.
///
/// The combine function must be commutative and associative; the final map
/// is then independent of fan-out and arrival ordering. Always accepts more
/// data.
pub struct AggregatorSink<T, K, V> {
    key_fn: KeyFn<T, K>,
    value_fn: ValueFn<T, V>,
    combine: CombineFn<V>,
    entries: DashMap<K, V>,
}

impl<T, K, V> AggregatorSink<T, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates a new aggregator from a key selector, a value selector, and
    /// a commutative, associative combine function.
    pub fn new<KF, VF, CF>(key_fn: KF, value_fn: VF, combine: CF) -> Self
    where
        KF: Fn(&T) -> K + Send + Sync + 'static,
        VF: Fn(&T) -> V + Send + Sync + 'static,
        CF: Fn(V, V) -> V + Send + Sync + 'static,
    {
        Self {
            key_fn: Box::new(key_fn),
            value_fn: Box::new(value_fn),
            combine: Box::new(combine),
            entries: DashMap::new(),
        }
    }

    /// Number of distinct keys accumulated.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been accumulated yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The accumulated value for a key, if any.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// A snapshot of the accumulation map.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<K, V> {
        self.entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

#[async_trait]
impl<T, K, V> Sink<T> for AggregatorSink<T, K, V>
where
    T: Send + Sync,
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    async fn receive(
        &self,
        batch: Batch<T>,
        _cancel: &CancellationToken,
    ) -> Result<(), BatchflowError> {
        for item in batch.items() {
            let key = (self.key_fn)(item);
            let value = (self.value_fn)(item);
            match self.entries.entry(key) {
                dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                    let merged = (self.combine)(occupied.get().clone(), value);
                    occupied.insert(merged);
                }
                dashmap::mapref::entry::Entry::Vacant(vacant) => {
                    vacant.insert(value);
                }
            }
        }
        Ok(())
    }
}
