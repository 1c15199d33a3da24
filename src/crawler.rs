//! The fetch orchestrator: one crawl cycle from feed document to stored
//! article bodies.
//!
//! A cycle moves through fixed phases: fetch the feed, extract its items,
//! dedup-check and insert each new item synchronously in feed order, then
//! fan out one body fetch per inserted record with an explicit concurrency
//! bound and wait for every task to finish. Per-article failures are
//! isolated; only a feed-level failure aborts the cycle.

use futures::stream::{self, StreamExt};
use thiserror::Error;
use url::Url;

use crate::extract::{self, BodySelector, ExtractError};
use crate::net::{FetchError, Requester};
use crate::storage::{InsertOutcome, Store, StoreError};

pub const DEFAULT_DETAIL_CONCURRENCY: usize = 16;

/// Feed-level failure; nothing downstream of the feed fetch ran.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("feed fetch failed: {0}")]
    Feed(#[from] FetchError),
}

#[derive(Debug, Error)]
enum TaskError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One body-fetch unit of work: the article link and the row awaiting its
/// full text. Lives for a single cycle.
struct FetchTask {
    record_id: i64,
    link: Url,
}

/// Aggregate counts for one finished cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Items extracted from the feed document
    pub discovered: usize,
    pub inserted: usize,
    /// Items already stored (dedup hit)
    pub skipped: usize,
    pub bodies_saved: usize,
    /// Isolated failures: insert errors and body fetches that did not land
    pub failed: usize,
}

pub struct Crawler {
    requester: Requester,
    store: Store,
    feed_url: String,
    body_selector: BodySelector,
    detail_concurrency: usize,
}

impl Crawler {
    pub fn new(
        requester: Requester,
        store: Store,
        feed_url: String,
        body_selector: BodySelector,
        detail_concurrency: usize,
    ) -> Self {
        Self {
            requester,
            store,
            feed_url,
            body_selector,
            detail_concurrency: detail_concurrency.max(1),
        }
    }

    /// Runs one complete crawl cycle. Returns `Err` only for feed-level
    /// failures; per-article problems are folded into the report.
    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        tracing::debug!(feed = %self.feed_url, "fetching feed document");
        let extracted = {
            let document = self.requester.fetch_markup(&self.feed_url).await?;
            extract::extract_items(&document)
        };

        let mut report = CycleReport {
            discovered: extracted.items.len(),
            ..CycleReport::default()
        };

        // Dedup and insert synchronously, in feed order
        let mut tasks = Vec::new();
        for item in &extracted.items {
            let publish_ts = item.published.timestamp();
            match self.store.exists(&item.title, publish_ts).await {
                Ok(true) => {
                    tracing::debug!(title = %item.title, "already stored, skipped");
                    report.skipped += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(title = %item.title, error = %e, "dedup check failed");
                    report.failed += 1;
                    continue;
                }
            }
            match self.store.insert(item).await {
                Ok(InsertOutcome::Inserted(id)) => {
                    tracing::debug!(id, link = %item.link, "stored new item");
                    report.inserted += 1;
                    tasks.push(FetchTask {
                        record_id: id,
                        link: item.link.clone(),
                    });
                }
                Ok(InsertOutcome::AlreadyExists) => {
                    // Lost the check-then-act race; same outcome as the probe
                    tracing::debug!(title = %item.title, "already stored, skipped");
                    report.skipped += 1;
                }
                Err(e) => {
                    tracing::error!(title = %item.title, error = %e, "insert failed");
                    report.failed += 1;
                }
            }
        }

        // Fan out body fetches. Every task runs to completion; a failed task
        // leaves its record without full text and does not disturb siblings.
        let outcomes: Vec<Result<(), TaskError>> = stream::iter(tasks)
            .map(|task| self.fetch_body(task))
            .buffer_unordered(self.detail_concurrency)
            .collect()
            .await;
        for outcome in outcomes {
            match outcome {
                Ok(()) => report.bodies_saved += 1,
                Err(_) => report.failed += 1, // logged where it happened
            }
        }

        tracing::info!(
            discovered = report.discovered,
            inserted = report.inserted,
            skipped = report.skipped,
            bodies_saved = report.bodies_saved,
            failed = report.failed,
            "crawl cycle finished"
        );
        Ok(report)
    }

    async fn fetch_body(&self, task: FetchTask) -> Result<(), TaskError> {
        tracing::debug!(id = task.record_id, link = %task.link, "fetching article body");
        let result = self.try_fetch_body(&task).await;
        if let Err(e) = &result {
            tracing::warn!(
                id = task.record_id,
                link = %task.link,
                error = %e,
                "article body fetch failed; record kept without full text"
            );
        }
        result
    }

    async fn try_fetch_body(&self, task: &FetchTask) -> Result<(), TaskError> {
        // The document tree is dropped before the store write suspends
        let body = {
            let document = self.requester.fetch_markup(task.link.as_str()).await?;
            extract::extract_body(&document, &self.body_selector)?
        };
        self.store.update_body(task.record_id, &body).await?;
        tracing::debug!(id = task.record_id, len = body.len(), "article body saved");
        Ok(())
    }
}
