//! Sinks: consumers attached to a pipe.
//!
//! A sink owns private, mutable accumulation state and receives every batch
//! the pipe pulls from its source. Backpressure is advisory: `can_receive`
//! is recomputed on each check and the pipe skips delivery to a sink
//! reporting false for that round.

mod aggregator;
mod builder;
mod collector;
mod distinct;
mod stats;

pub use aggregator::AggregatorSink;
pub use builder::{BuilderSink, CorpusSink, IndexSink};
pub use collector::CollectorSink;
pub use distinct::DistinctSink;
pub use stats::StatsSink;

use crate::batch::Batch;
use crate::cancellation::CancellationToken;
use crate::errors::BatchflowError;
use async_trait::async_trait;

/// A consumer of batches.
///
/// Accumulation state is exclusively owned by the sink; no locking is needed
/// between sinks, only inside a sink that spreads state across keys.
#[async_trait]
pub trait Sink<T>: Send + Sync {
    /// Advisory signal that the sink currently accepts more data.
    ///
    /// Recomputed on each check; never shared between sinks.
    fn can_receive(&self) -> bool {
        true
    }

    /// Receives one batch.
    ///
    /// Ownership of the batch transfers to the sink. An error here aborts
    /// the current round and the whole run. Long-running implementations
    /// should check the cancellation token cooperatively.
    async fn receive(
        &self,
        batch: Batch<T>,
        cancel: &CancellationToken,
    ) -> Result<(), BatchflowError>;
}
