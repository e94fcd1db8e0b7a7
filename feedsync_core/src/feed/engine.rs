use crate::config::SyncConfig;
use crate::feed::log::FeedLog;
use crate::feed::policy::{ContinuationPolicy, FullSync, IncrementalSync};
use crate::feed::traits::PageFetcher;
use crate::feed::walker::{CursorWalker, StopReason, WalkOutput, WalkSettings};
use crate::models::{FeedItem, SyncMode};
use crate::normalize::normalize;
use crate::Result;
use serde::Serialize;
use std::sync::Arc;

/// What a run did to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    /// The log was replaced by a full rebuild.
    Rewritten,
    /// New items were appended.
    Appended,
    /// The log was left untouched.
    NoOp,
}

/// Summary of one sync run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub requested: SyncMode,
    /// Differs from `requested` when an incremental run fell back to a full rebuild.
    pub executed: SyncMode,
    /// Identifiers found in the log before the run (incremental runs only).
    pub known_ids: usize,
    pub pages_fetched: u32,
    pub items_fetched: usize,
    /// Fetched items the policy left out (the first known item and everything older on its page).
    pub items_skipped: usize,
    /// Log lines the index scan could not use (not a JSON object, or no `opus_id`).
    pub log_lines_skipped: usize,
    pub items_written: usize,
    pub stop_reason: StopReason,
    pub outcome: SyncOutcome,
    pub fetch_error: Option<String>,
}

/// Mirrors a remote newest-first feed into an oldest-first local log.
///
/// One engine drives one run at a time. The fetcher is constructed by the caller and
/// shared for the lifetime of the engine.
pub struct SyncEngine {
    fetcher: Arc<dyn PageFetcher>,
    log: FeedLog,
    settings: WalkSettings,
}

impl SyncEngine {
    #[tracing::instrument(level = "debug", skip(fetcher))]
    pub fn new(fetcher: Arc<dyn PageFetcher>, config: &SyncConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            fetcher,
            log: FeedLog::new(&config.output_path),
            settings: WalkSettings::from(config),
        })
    }

    pub fn log(&self) -> &FeedLog {
        &self.log
    }

    #[tracing::instrument(level = "info", skip(self), fields(path = %self.log.path().display()))]
    pub async fn run(&self, mode: SyncMode) -> Result<SyncReport> {
        let report = match mode {
            SyncMode::Full => {
                tracing::info!("operation: FULL (rewrite output file)");
                self.full_sync(SyncMode::Full).await?
            }
            SyncMode::Incremental => {
                tracing::info!("operation: INCREMENTAL (append new items)");
                self.incremental_sync().await?
            }
        };

        tracing::info!(
            requested = %report.requested,
            executed = %report.executed,
            pages = report.pages_fetched,
            fetched = report.items_fetched,
            skipped = report.items_skipped,
            log_lines_skipped = report.log_lines_skipped,
            written = report.items_written,
            stop_reason = report.stop_reason.as_str(),
            outcome = ?report.outcome,
            "sync finished"
        );
        Ok(report)
    }

    async fn full_sync(&self, requested: SyncMode) -> Result<SyncReport> {
        let walk = self.walk(&FullSync).await;
        let mut report = draft_report(requested, SyncMode::Full, 0, &walk);

        if walk.items.is_empty() {
            tracing::warn!("no items fetched, nothing to save");
            return Ok(report);
        }
        report.items_written = self.rebuild(walk.items).await?;
        report.outcome = SyncOutcome::Rewritten;
        Ok(report)
    }

    async fn incremental_sync(&self) -> Result<SyncReport> {
        let scan = self.log.load_index().await?;
        if scan.index.is_empty() {
            tracing::info!("no existing file or no opus_id found, falling back to FULL fetch");
            return self.full_sync(SyncMode::Incremental).await;
        }

        let known_ids = scan.index.len();
        let log_lines_skipped = scan.skipped_unparseable + scan.skipped_missing_id;
        let policy = IncrementalSync::new(scan.index);
        let walk = self.walk(&policy).await;
        let mut report =
            draft_report(SyncMode::Incremental, SyncMode::Incremental, known_ids, &walk);
        report.log_lines_skipped = log_lines_skipped;

        report.items_written = self.append(walk.items).await?;
        if report.items_written > 0 {
            report.outcome = SyncOutcome::Appended;
        }
        Ok(report)
    }

    async fn walk(&self, policy: &dyn ContinuationPolicy) -> WalkOutput {
        let walk = CursorWalker::new(self.fetcher.as_ref(), policy, &self.settings)
            .collect()
            .await;
        if let Some(err) = &walk.fetch_error {
            tracing::warn!(
                error = %err,
                kept = walk.items.len(),
                "walk ended early on a fetch error; merging what was fetched"
            );
        }
        walk
    }

    /// Replace the log with a full newest-first snapshot.
    ///
    /// An empty snapshot leaves the log as it is.
    #[tracing::instrument(level = "info", skip(self, snapshot), fields(count = snapshot.len()))]
    pub async fn rebuild(&self, snapshot: Vec<FeedItem>) -> Result<usize> {
        if snapshot.is_empty() {
            tracing::warn!("empty snapshot, keeping the existing log");
            return Ok(0);
        }
        let ordered = merge_oldest_first(snapshot);
        let written = self.log.rewrite(&ordered).await?;
        tracing::info!(
            saved = written,
            path = %self.log.path().display(),
            "[FULL] saved items"
        );
        Ok(written)
    }

    /// Append a newest-first batch of items that are not yet in the log.
    #[tracing::instrument(level = "info", skip(self, snapshot), fields(count = snapshot.len()))]
    pub async fn append(&self, snapshot: Vec<FeedItem>) -> Result<usize> {
        if snapshot.is_empty() {
            tracing::info!("no new items to append");
            return Ok(0);
        }
        let ordered = merge_oldest_first(snapshot);
        let written = self.log.append(&ordered).await?;
        tracing::info!(
            appended = written,
            path = %self.log.path().display(),
            "[INCR] appended new items"
        );
        Ok(written)
    }
}

/// Turn a newest-first snapshot into normalized, oldest-first records.
pub fn merge_oldest_first(snapshot: Vec<FeedItem>) -> Vec<FeedItem> {
    snapshot.into_iter().rev().map(normalize).collect()
}

fn draft_report(
    requested: SyncMode,
    executed: SyncMode,
    known_ids: usize,
    walk: &WalkOutput,
) -> SyncReport {
    SyncReport {
        requested,
        executed,
        known_ids,
        pages_fetched: walk.pages_fetched,
        items_fetched: walk.items_fetched,
        items_skipped: walk.items_fetched.saturating_sub(walk.items.len()),
        log_lines_skipped: 0,
        items_written: 0,
        stop_reason: walk.stop_reason,
        outcome: SyncOutcome::NoOp,
        fetch_error: walk.fetch_error.as_ref().map(|e| e.to_string()),
    }
}
