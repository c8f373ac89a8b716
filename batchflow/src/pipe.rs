//! The pipe: binds one source to a set of sinks and drives the
//! pull → fan-out → repeat loop.

use crate::batch::Batch;
use crate::cancellation::CancellationToken;
use crate::errors::BatchflowError;
use crate::sinks::Sink;
use crate::source::BatchSource;
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Lifecycle of a pipe run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipeState {
    /// Constructed, not yet run.
    Idle,
    /// A run is in progress.
    Running,
    /// The source was drained to its terminal batch (or produced none).
    Completed,
    /// The run stopped between rounds after a cancellation request.
    Cancelled,
    /// A fetch, transform, or sink error aborted the run.
    Failed,
}

/// Outcome of one pipe run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Unique identity of this run.
    pub run_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Terminal state of the run.
    pub state: PipeState,
    /// Batches delivered to the sinks.
    pub batches_delivered: u64,
    /// Items delivered to the sinks (counted once per batch, not per sink).
    pub items_delivered: u64,
    /// Total run duration in milliseconds.
    pub duration_ms: f64,
    /// Cancellation reason, when the run was cancelled.
    pub cancel_reason: Option<String>,
}

impl RunReport {
    /// Whether the run drained its source completely.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.state == PipeState::Completed
    }
}

/// Binds exactly one source to an append-only set of sinks for one run.
///
/// The pipe holds no data of its own. It is single-shot: a second `run`
/// call fails rather than replaying the (possibly stateful) source.
pub struct Pipe<S: BatchSource> {
    source: S,
    sinks: Vec<Arc<dyn Sink<S::Item>>>,
    state: Mutex<PipeState>,
}

impl<S> Pipe<S>
where
    S: BatchSource,
    S::Item: Clone + Send + Sync,
{
    /// Creates a pipe around a source, with no sinks registered yet.
    #[must_use]
    pub fn new(source: S) -> Self {
        Self {
            source,
            sinks: Vec::new(),
            state: Mutex::new(PipeState::Idle),
        }
    }

    /// Registers a sink. Sinks cannot be removed once registered.
    pub fn register_sink(&mut self, sink: Arc<dyn Sink<S::Item>>) -> &mut Self {
        self.sinks.push(sink);
        self
    }

    /// Number of registered sinks.
    #[must_use]
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> PipeState {
        *self.state.lock()
    }

    /// Drives the source to exhaustion, fanning every batch out to all
    /// registered sinks.
    ///
    /// Each round pulls one pending batch, resolves its items, then invokes
    /// `receive` on every willing sink concurrently and awaits them jointly
    /// before pulling the next batch. All sinks therefore observe batches in
    /// identical sequence-number order; ordering between sinks within one
    /// round is unspecified. Cancellation is checked between rounds only and
    /// yields a `Cancelled` report, never an error and never success.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<RunReport, BatchflowError> {
        {
            let mut state = self.state.lock();
            if *state != PipeState::Idle {
                return Err(BatchflowError::internal(
                    "pipe already ran; pipes are single-shot",
                ));
            }
            *state = PipeState::Running;
        }

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();
        let mut batches_delivered: u64 = 0;
        let mut items_delivered: u64 = 0;

        info!(run_id = %run_id, sinks = self.sinks.len(), "pipe run started");

        let mut index: u64 = 0;
        loop {
            if cancel.is_cancelled() {
                let reason = cancel.reason().unwrap_or_else(|| "cancelled".to_string());
                *self.state.lock() = PipeState::Cancelled;
                warn!(run_id = %run_id, reason = %reason, "pipe run cancelled");
                return Ok(self.report(
                    run_id,
                    started_at,
                    PipeState::Cancelled,
                    batches_delivered,
                    items_delivered,
                    start,
                    Some(reason),
                ));
            }

            let pending = match self.source.next_pending_batch(index, cancel).await {
                Ok(Some(pending)) => pending,
                Ok(None) => break,
                Err(err) => {
                    *self.state.lock() = PipeState::Failed;
                    return Err(err);
                }
            };

            let batch = match pending.resolve().await {
                Ok(batch) => batch,
                Err(err) => {
                    *self.state.lock() = PipeState::Failed;
                    return Err(err);
                }
            };

            let is_last = batch.is_last();
            batches_delivered += 1;
            items_delivered += batch.len() as u64;

            debug!(
                run_id = %run_id,
                sequence_number = batch.sequence_number(),
                items = batch.len(),
                is_last,
                "batch resolved"
            );

            if let Err(err) = self.fan_out(batch, cancel).await {
                *self.state.lock() = PipeState::Failed;
                return Err(err);
            }

            if is_last {
                break;
            }
            index += 1;
        }

        *self.state.lock() = PipeState::Completed;
        info!(
            run_id = %run_id,
            batches = batches_delivered,
            items = items_delivered,
            "pipe run completed"
        );
        Ok(self.report(
            run_id,
            started_at,
            PipeState::Completed,
            batches_delivered,
            items_delivered,
            start,
            None,
        ))
    }

    /// Delivers one batch to every sink whose `can_receive` holds, jointly
    /// awaited. One sink failing fails the round; partial state already
    /// applied inside other sinks is not rolled back.
    async fn fan_out(
        &self,
        batch: Batch<S::Item>,
        cancel: &CancellationToken,
    ) -> Result<(), BatchflowError> {
        let willing: Vec<&Arc<dyn Sink<S::Item>>> = self
            .sinks
            .iter()
            .filter(|sink| {
                let open = sink.can_receive();
                if !open {
                    debug!(
                        sequence_number = batch.sequence_number(),
                        "sink at capacity, skipping delivery"
                    );
                }
                open
            })
            .collect();

        try_join_all(
            willing
                .iter()
                .map(|sink| sink.receive(batch.clone(), cancel)),
        )
        .await?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn report(
        &self,
        run_id: Uuid,
        started_at: DateTime<Utc>,
        state: PipeState,
        batches_delivered: u64,
        items_delivered: u64,
        start: Instant,
        cancel_reason: Option<String>,
    ) -> RunReport {
        RunReport {
            run_id,
            started_at,
            state,
            batches_delivered,
            items_delivered,
            duration_ms: start.elapsed().as_secs_f64() * 1000.0,
            cancel_reason,
        }
    }
}
