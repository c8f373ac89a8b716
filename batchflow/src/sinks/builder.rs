//! Builder sinks: sinks that expose a materialized artifact once the pipe
//! has finished.
//!
//! The artifact is only valid after a terminal batch has been observed;
//! requesting it earlier (which includes after a failed or cancelled run,
//! since the terminal batch never arrived) is an error. Partial accumulation
//! remains inspectable through the side accessors.

use super::Sink;
use crate::batch::Batch;
use crate::cancellation::CancellationToken;
use crate::errors::BatchflowError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// A sink that materializes a finished artifact after the run completes.
pub trait BuilderSink<T>: Sink<T> {
    /// The artifact type.
    type Output;

    /// Returns the finished artifact.
    ///
    /// Fails with [`BatchflowError::OutputNotReady`] if no terminal batch
    /// has been received.
    fn build(&self) -> Result<Self::Output, BatchflowError>;
}

type TokensFn<T> = Box<dyn Fn(&T) -> Vec<String> + Send + Sync>;

/// Accumulates one token stream per item into a text corpus.
pub struct CorpusSink<T> {
    tokens_fn: TokensFn<T>,
    documents: Mutex<Vec<Vec<String>>>,
    complete: AtomicBool,
}

impl<T> CorpusSink<T> {
    /// Creates a corpus sink from a tokenising selector.
    ///
    /// The tokeniser itself is an external collaborator; this sink only
    /// appends whatever tokens the selector produces.
    pub fn new<F>(tokens_fn: F) -> Self
    where
        F: Fn(&T) -> Vec<String> + Send + Sync + 'static,
    {
        Self {
            tokens_fn: Box::new(tokens_fn),
            documents: Mutex::new(Vec::new()),
            complete: AtomicBool::new(false),
        }
    }

    /// Number of documents appended so far, valid mid-run.
    #[must_use]
    pub fn documents_appended(&self) -> usize {
        self.documents.lock().len()
    }
}

#[async_trait]
impl<T: Send + Sync> Sink<T> for CorpusSink<T> {
    async fn receive(
        &self,
        batch: Batch<T>,
        _cancel: &CancellationToken,
    ) -> Result<(), BatchflowError> {
        let mut documents = self.documents.lock();
        for item in batch.items() {
            documents.push((self.tokens_fn)(item));
        }
        drop(documents);

        if batch.is_last() {
            self.complete.store(true, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl<T: Send + Sync> BuilderSink<T> for CorpusSink<T> {
    type Output = Vec<Vec<String>>;

    fn build(&self) -> Result<Self::Output, BatchflowError> {
        if !self.complete.load(Ordering::SeqCst) {
            return Err(BatchflowError::output_not_ready(
                "corpus requested before the run delivered a terminal batch",
            ));
        }
        Ok(self.documents.lock().clone())
    }
}

type IdFn<T> = Box<dyn Fn(&T) -> String + Send + Sync>;

/// Builds an inverted term index over the documents flowing through.
pub struct IndexSink<T> {
    id_fn: IdFn<T>,
    terms_fn: TokensFn<T>,
    postings: Mutex<HashMap<String, Vec<String>>>,
    documents_indexed: Mutex<usize>,
    complete: AtomicBool,
}

impl<T> IndexSink<T> {
    /// Creates an index sink from a document-id selector and a term
    /// selector.
    pub fn new<IF, TF>(id_fn: IF, terms_fn: TF) -> Self
    where
        IF: Fn(&T) -> String + Send + Sync + 'static,
        TF: Fn(&T) -> Vec<String> + Send + Sync + 'static,
    {
        Self {
            id_fn: Box::new(id_fn),
            terms_fn: Box::new(terms_fn),
            postings: Mutex::new(HashMap::new()),
            documents_indexed: Mutex::new(0),
            complete: AtomicBool::new(false),
        }
    }

    /// Number of documents indexed so far, valid mid-run.
    #[must_use]
    pub fn documents_indexed(&self) -> usize {
        *self.documents_indexed.lock()
    }
}

#[async_trait]
impl<T: Send + Sync> Sink<T> for IndexSink<T> {
    async fn receive(
        &self,
        batch: Batch<T>,
        _cancel: &CancellationToken,
    ) -> Result<(), BatchflowError> {
        let mut postings = self.postings.lock();
        for item in batch.items() {
            let id = (self.id_fn)(item);
            for term in (self.terms_fn)(item) {
                let entry = postings.entry(term).or_default();
                if !entry.contains(&id) {
                    entry.push(id.clone());
                }
            }
            *self.documents_indexed.lock() += 1;
        }
        drop(postings);

        if batch.is_last() {
            self.complete.store(true, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl<T: Send + Sync> BuilderSink<T> for IndexSink<T> {
    type Output = HashMap<String, Vec<String>>;

    fn build(&self) -> Result<Self::Output, BatchflowError> {
        if !self.complete.load(Ordering::SeqCst) {
            return Err(BatchflowError::output_not_ready(
                "index requested before the run delivered a terminal batch",
            ));
        }
        Ok(self.postings.lock().clone())
    }
}
