//! Breadth-first crawl source.
//!
//! A [`CrawlSource`] expands outward from a root link, one frontier round
//! per batch, de-duplicating links under concurrent fetch pressure and
//! respecting a total document budget. The fetch transport is the
//! [`DocumentFetcher`] collaborator; the source itself only coordinates
//! frontier, visited set, and budget.

mod config;
mod fetcher;

pub use config::{CrawlConfig, DocumentFilter, LinkFilter};
pub use fetcher::{DocumentFetcher, FetchedDocument, StaticFetcher};

use crate::batch::PendingBatch;
use crate::cancellation::CancellationToken;
use crate::errors::BatchflowError;
use crate::source::BatchSource;
use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::try_join_all;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// A [`BatchSource`] that walks the link graph breadth-first.
///
/// Round 0 fetches the root; each later round dequeues up to `batch_size`
/// links from the frontier (capped by the remaining document budget),
/// fetches them concurrently, and enqueues newly discovered links that pass
/// the link filter. A link is claimed in the visited map the moment it is
/// enqueued, so it is fetched at most once per run even when several
/// concurrent fetches discover it in the same round.
///
/// Crawl state grows monotonically for the life of one run; the instance is
/// single-shot.
pub struct CrawlSource {
    fetcher: Arc<dyn DocumentFetcher>,
    config: CrawlConfig,
    root: String,
    frontier: Mutex<VecDeque<String>>,
    /// link -> times fetched; 0 means claimed (enqueued) but not yet fetched.
    visited: DashMap<String, u64>,
    documents_included: AtomicUsize,
    done: AtomicBool,
}

impl CrawlSource {
    /// Creates a crawl source rooted at `root`.
    ///
    /// The configuration was already validated by [`CrawlConfig::new`].
    #[must_use]
    pub fn new(
        root: impl Into<String>,
        fetcher: Arc<dyn DocumentFetcher>,
        config: CrawlConfig,
    ) -> Self {
        let root = root.into();
        let visited = DashMap::new();
        visited.insert(root.clone(), 0);
        Self {
            fetcher,
            config,
            root,
            frontier: Mutex::new(VecDeque::new()),
            visited,
            documents_included: AtomicUsize::new(0),
            done: AtomicBool::new(false),
        }
    }

    /// Documents that passed the document filter so far.
    #[must_use]
    pub fn documents_included(&self) -> usize {
        self.documents_included.load(Ordering::SeqCst)
    }

    /// Discovered-but-not-yet-fetched links.
    #[must_use]
    pub fn frontier_len(&self) -> usize {
        self.frontier.lock().len()
    }

    /// How many times a link has been fetched, if it was ever claimed.
    #[must_use]
    pub fn visit_count(&self, link: &str) -> Option<u64> {
        self.visited.get(link).map(|entry| *entry.value())
    }

    /// Fetches one link, records the visit, and expands the frontier with
    /// its unseen discovered links. Runs concurrently with the rest of the
    /// round, so the claim check-and-insert must be atomic.
    async fn fetch_and_expand(
        &self,
        link: String,
        cancel: &CancellationToken,
    ) -> Result<FetchedDocument, BatchflowError> {
        let document = self.fetcher.fetch(&link, cancel).await?;
        *self.visited.entry(link).or_insert(0) += 1;

        for discovered in &document.discovered_links {
            if !(self.config.link_filter)(discovered) {
                continue;
            }
            let newly_claimed = match self.visited.entry(discovered.clone()) {
                dashmap::mapref::entry::Entry::Vacant(vacant) => {
                    vacant.insert(0);
                    true
                }
                dashmap::mapref::entry::Entry::Occupied(_) => false,
            };
            if newly_claimed {
                self.frontier.lock().push_back(discovered.clone());
            }
        }
        Ok(document)
    }

    /// Selects this round's links: the root for round 0, otherwise up to
    /// `batch_size` frontier links capped by the remaining budget.
    fn round_links(&self, index: u64) -> Vec<String> {
        if index == 0 {
            return vec![self.root.clone()];
        }
        let remaining = self
            .config
            .max_documents
            .saturating_sub(self.documents_included());
        let take = self.config.batch_size.min(remaining);
        let mut frontier = self.frontier.lock();
        (0..take).map_while(|_| frontier.pop_front()).collect()
    }
}

#[async_trait]
impl BatchSource for CrawlSource {
    type Item = FetchedDocument;

    async fn next_pending_batch(
        &self,
        index: u64,
        cancel: &CancellationToken,
    ) -> Result<Option<PendingBatch<FetchedDocument>>, BatchflowError> {
        if self.done.load(Ordering::SeqCst) {
            return Ok(None);
        }

        let links = self.round_links(index);
        if links.is_empty() {
            self.done.store(true, Ordering::SeqCst);
            return Ok(None);
        }

        // Rounds resolve eagerly: the terminal flag depends on what the
        // fetches discover.
        let documents = try_join_all(
            links
                .into_iter()
                .map(|link| self.fetch_and_expand(link, cancel)),
        )
        .await?;

        let mut included = Vec::new();
        for document in documents {
            if (self.config.document_filter)(&document) {
                self.documents_included.fetch_add(1, Ordering::SeqCst);
                included.push(document);
            }
        }

        let budget_reached = self.documents_included() >= self.config.max_documents;
        let frontier_empty = self.frontier.lock().is_empty();
        let is_last = budget_reached || frontier_empty;
        if is_last {
            self.done.store(true, Ordering::SeqCst);
        }

        debug!(
            round = index,
            included = included.len(),
            total_included = self.documents_included(),
            frontier = self.frontier_len(),
            is_last,
            "crawl round finished"
        );

        Ok(Some(PendingBatch::ready(index, is_last, included)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::Batch;

    fn diamond_fetcher() -> Arc<StaticFetcher> {
        // A -> {B, C}, B -> {D}, C and D are leaves.
        Arc::new(
            StaticFetcher::new()
                .with_page("A", "root", &["B", "C"])
                .with_page("B", "left", &["D"])
                .with_page("C", "right", &[])
                .with_page("D", "deep", &[]),
        )
    }

    async fn drain(source: &CrawlSource) -> Vec<Batch<FetchedDocument>> {
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

    fn links_of(batch: &Batch<FetchedDocument>) -> Vec<&str> {
        batch.items().iter().map(|doc| doc.link.as_str()).collect()
    }

    #[tokio::test]
    async fn test_budget_stops_expansion() {
        let fetcher = diamond_fetcher();
        let config = CrawlConfig::new(3, 2).unwrap();
        let source = CrawlSource::new("A", fetcher.clone(), config);

        let batches = drain(&source).await;

        assert_eq!(batches.len(), 2);
        assert_eq!(links_of(&batches[0]), vec!["A"]);
        assert_eq!(links_of(&batches[1]), vec!["B", "C"]);
        assert!(batches[1].is_last());

        // D was discovered but never fetched: the budget was exhausted.
        assert_eq!(fetcher.fetch_log(), vec!["A", "B", "C"]);
        assert_eq!(source.visit_count("D"), Some(0));
        assert_eq!(source.documents_included(), 3);
    }

    #[tokio::test]
    async fn test_exhausts_frontier_under_large_budget() {
        let fetcher = diamond_fetcher();
        let config = CrawlConfig::new(100, 2).unwrap();
        let source = CrawlSource::new("A", fetcher.clone(), config);

        let batches = drain(&source).await;

        assert_eq!(batches.len(), 3);
        assert_eq!(links_of(&batches[2]), vec!["D"]);
        assert!(batches[2].is_last());
        assert_eq!(fetcher.fetch_count(), 4);
    }

    #[tokio::test]
    async fn test_rediscovered_link_not_refetched() {
        // Both B and C link to D; D must be claimed exactly once.
        let fetcher = Arc::new(
            StaticFetcher::new()
                .with_page("A", "root", &["B", "C"])
                .with_page("B", "left", &["D"])
                .with_page("C", "right", &["D"])
                .with_page("D", "deep", &["A"]),
        );
        let config = CrawlConfig::new(100, 2).unwrap();
        let source = CrawlSource::new("A", fetcher.clone(), config);

        drain(&source).await;

        let d_fetches = fetcher.fetch_log().iter().filter(|l| *l == "D").count();
        assert_eq!(d_fetches, 1);
        assert_eq!(source.visit_count("D"), Some(1));
        // A was claimed at the root and never re-enqueued from D.
        assert_eq!(source.visit_count("A"), Some(1));
    }

    #[tokio::test]
    async fn test_link_filter_prunes_frontier() {
        let fetcher = diamond_fetcher();
        let config = CrawlConfig::new(100, 2)
            .unwrap()
            .with_link_filter(|link| link != "B");
        let source = CrawlSource::new("A", fetcher.clone(), config);

        let batches = drain(&source).await;

        assert_eq!(links_of(&batches[1]), vec!["C"]);
        assert!(batches[1].is_last());
        assert!(source.visit_count("B").is_none());
    }

    #[tokio::test]
    async fn test_filtered_documents_do_not_consume_budget() {
        let fetcher = diamond_fetcher();
        // Exclude the root from the output; budget of 3 still admits B, C, D.
        let config = CrawlConfig::new(3, 2)
            .unwrap()
            .with_document_filter(|doc| doc.link != "A");
        let source = CrawlSource::new("A", fetcher.clone(), config);

        let batches = drain(&source).await;

        assert!(batches[0].is_empty());
        assert_eq!(source.documents_included(), 3);
        assert_eq!(fetcher.fetch_count(), 4);
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts_crawl() {
        // B is linked but has no page behind it.
        let fetcher = Arc::new(StaticFetcher::new().with_page("A", "root", &["B"]));
        let config = CrawlConfig::new(10, 2).unwrap();
        let source = CrawlSource::new("A", fetcher, config);

        let cancel = CancellationToken::new();
        let first = source.next_pending_batch(0, &cancel).await.unwrap();
        assert!(first.unwrap().resolve().await.is_ok());

        let err = source.next_pending_batch(1, &cancel).await.unwrap_err();
        assert!(matches!(err, BatchflowError::Fetch { .. }));
    }
}
