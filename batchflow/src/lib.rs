//! # Batchflow
//!
//! An asynchronous batch-streaming pipeline: one lazily evaluated,
//! sequentially numbered source of data batches fans its output out to one
//! or more independent sinks, with cooperative backpressure, cancellation,
//! and run-level statistics.
//!
//! The building blocks:
//!
//! - **Batches**: immutable, ordered chunks of items with a sequence number
//!   and a terminal flag; pending batches defer item resolution to an async
//!   fetch, giving one batch of prefetch.
//! - **Sources and combinators**: pull-based generators with composable,
//!   non-mutating transform stages (map, split, whole-batch transform,
//!   filter, limit).
//! - **Sinks**: consumers with private accumulation state: collectors,
//!   distinct sets, keyed aggregators, running statistics, and builder
//!   sinks that materialize an artifact once the run completes.
//! - **The pipe**: drives pull → concurrent fan-out → repeat until the
//!   source is exhausted or the caller cancels.
//! - **The crawl source**: a breadth-first link-graph walker with a
//!   frontier queue, a concurrent-safe visited map, and a document budget.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use batchflow::prelude::*;
//! use std::sync::Arc;
//!
//! let source = ItemsSource::new(lines, 64)?.filter(|l| !l.is_empty());
//! let collector = Arc::new(CollectorSink::new());
//!
//! let mut pipe = Pipe::new(source);
//! pipe.register_sink(collector.clone());
//!
//! let report = pipe.run(&CancellationToken::new()).await?;
//! assert!(report.is_success());
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, missing_docs, rust_2018_idioms)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod batch;
pub mod cancellation;
pub mod crawl;
pub mod errors;
pub mod pipe;
pub mod sinks;
pub mod source;


/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::batch::{Batch, PendingBatch};
    pub use crate::cancellation::CancellationToken;
    pub use crate::crawl::{
        CrawlConfig, CrawlSource, DocumentFetcher, FetchedDocument, StaticFetcher,
    };
    pub use crate::errors::BatchflowError;
    pub use crate::pipe::{Pipe, PipeState, RunReport};
    pub use crate::sinks::{
        AggregatorSink, BuilderSink, CollectorSink, CorpusSink, DistinctSink, IndexSink, Sink,
        StatsSink,
    };
    pub use crate::source::{BatchSource, BatchSourceExt, ItemsSource};
}
