//! Crawl configuration.

use super::fetcher::FetchedDocument;
use crate::errors::BatchflowError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Predicate deciding whether a discovered link enters the frontier.
pub type LinkFilter = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Predicate deciding whether a fetched document enters the output batch.
pub type DocumentFilter = Arc<dyn Fn(&FetchedDocument) -> bool + Send + Sync>;

fn default_max_documents() -> usize {
    100
}

fn default_batch_size() -> usize {
    8
}

fn accept_all_links() -> LinkFilter {
    Arc::new(|_| true)
}

fn accept_all_documents() -> DocumentFilter {
    Arc::new(|_| true)
}

/// Configuration for a [`super::CrawlSource`].
///
/// Both filters default to accept-all. Invalid limits are rejected at
/// construction, before any run starts.
#[derive(Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Total document budget for the run. Only documents passing the
    /// document filter consume it.
    #[serde(default = "default_max_documents")]
    pub max_documents: usize,
    /// Maximum number of links fetched per round.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Gate on discovered links before they are enqueued.
    #[serde(skip, default = "accept_all_links")]
    pub link_filter: LinkFilter,
    /// Gate on fetched documents before they enter the output batch.
    #[serde(skip, default = "accept_all_documents")]
    pub document_filter: DocumentFilter,
}

impl CrawlConfig {
    /// Creates a validated configuration with accept-all filters.
    pub fn new(max_documents: usize, batch_size: usize) -> Result<Self, BatchflowError> {
        if max_documents == 0 {
            return Err(BatchflowError::configuration(
                "max_documents must be positive",
            ));
        }
        if batch_size == 0 {
            return Err(BatchflowError::configuration("batch_size must be positive"));
        }
        Ok(Self {
            max_documents,
            batch_size,
            link_filter: accept_all_links(),
            document_filter: accept_all_documents(),
        })
    }

    /// Sets the link filter.
    #[must_use]
    pub fn with_link_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.link_filter = Arc::new(filter);
        self
    }

    /// Sets the document filter.
    #[must_use]
    pub fn with_document_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&FetchedDocument) -> bool + Send + Sync + 'static,
    {
        self.document_filter = Arc::new(filter);
        self
    }
}

impl std::fmt::Debug for CrawlConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrawlConfig")
            .field("max_documents", &self.max_documents)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}
