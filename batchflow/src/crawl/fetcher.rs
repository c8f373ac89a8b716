//! The document-fetch collaborator contract.
//!
//! Transport, decoding, and link extraction are external concerns. The
//! crawl source only requires that, given a link, a fetcher eventually
//! yields the document's content and whatever links it discovered. Retry
//! policy, if any, belongs inside the fetcher.

use crate::cancellation::CancellationToken;
use crate::errors::BatchflowError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A fetched, decoded document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchedDocument {
    /// The link this document was fetched from.
    pub link: String,
    /// Decoded textual content.
    pub content: String,
    /// Links discovered in the document, in document order.
    pub discovered_links: Vec<String>,
    /// Optional transport metadata (status, content type, timings, ...).
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl FetchedDocument {
    /// Creates a document with content and discovered links.
    #[must_use]
    pub fn new(
        link: impl Into<String>,
        content: impl Into<String>,
        discovered_links: Vec<String>,
    ) -> Self {
        Self {
            link: link.into(),
            content: content.into(),
            discovered_links,
            metadata: HashMap::new(),
        }
    }

    /// Attaches a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Protocol for fetching one document by link.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Fetches a link. A failure here aborts the whole crawl round.
    ///
    /// Long-running implementations should check the cancellation token
    /// cooperatively; the framework never aborts an in-flight fetch.
    async fn fetch(
        &self,
        link: &str,
        cancel: &CancellationToken,
    ) -> Result<FetchedDocument, BatchflowError>;
}

/// An in-memory fetcher over a fixed set of pages.
///
/// Backs tests and demos; unknown links fail the fetch. Every served link
/// is recorded in a log so callers can assert on fetch traffic.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    pages: HashMap<String, FetchedDocument>,
    log: Mutex<Vec<String>>,
}

impl StaticFetcher {
    /// Creates an empty fetcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a page with its content and outgoing links.
    #[must_use]
    pub fn with_page(
        mut self,
        link: impl Into<String>,
        content: impl Into<String>,
        discovered_links: &[&str],
    ) -> Self {
        let link = link.into();
        let document = FetchedDocument::new(
            link.clone(),
            content,
            discovered_links.iter().map(ToString::to_string).collect(),
        );
        self.pages.insert(link, document);
        self
    }

    /// Links fetched so far, in request order.
    #[must_use]
    pub fn fetch_log(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    /// Number of fetches served (including failures).
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.log.lock().len()
    }
}

#[async_trait]
impl DocumentFetcher for StaticFetcher {
    async fn fetch(
        &self,
        link: &str,
        cancel: &CancellationToken,
    ) -> Result<FetchedDocument, BatchflowError> {
        cancel.ensure_active()?;
        self.log.lock().push(link.to_string());
        self.pages
            .get(link)
            .cloned()
            .ok_or_else(|| BatchflowError::fetch(link, "no such page"))
    }
}
