use crate::config::SyncConfig;
use crate::feed::policy::{Continuation, ContinuationPolicy};
use crate::feed::traits::{FetchError, PageFetcher};
use crate::models::{FeedItem, Page, PageRequest};
use serde::Serialize;
use std::time::Duration;

/// Why a walk ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The remote reported `has_more = false`.
    Exhausted,
    /// The policy asked to stop (incremental run met a known item).
    PolicyStop,
    /// A page came back with zero items.
    EmptyPage,
    /// The oldest item of a page had no identifier to continue from.
    MissingIdentifier,
    /// A page request failed.
    FetchFailed,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::Exhausted => "exhausted",
            StopReason::PolicyStop => "policy_stop",
            StopReason::EmptyPage => "empty_page",
            StopReason::MissingIdentifier => "missing_identifier",
            StopReason::FetchFailed => "fetch_failed",
        }
    }
}

/// Static parameters of a walk.
#[derive(Debug, Clone)]
pub struct WalkSettings {
    pub target_id: u64,
    pub locale_tag: String,
    pub delay: Duration,
}

impl From<&SyncConfig> for WalkSettings {
    fn from(cfg: &SyncConfig) -> Self {
        Self {
            target_id: cfg.target_id,
            locale_tag: cfg.locale_tag.clone(),
            delay: cfg.delay,
        }
    }
}

/// Everything one walk produced.
#[derive(Debug, Clone)]
pub struct WalkOutput {
    /// Kept items of every yielded page, newest first.
    pub items: Vec<FeedItem>,
    pub pages_fetched: u32,
    /// Items received from the remote, including ones the policy dropped.
    pub items_fetched: usize,
    pub stop_reason: StopReason,
    pub fetch_error: Option<FetchError>,
}

/// One cursor-paginated traversal of the remote feed, newest first.
///
/// Pages are produced lazily by [`CursorWalker::next_page`]. The walker is single-pass:
/// once it returns `None` it stays exhausted, and a fresh walker starts again at page 1.
pub struct CursorWalker<'a> {
    fetcher: &'a dyn PageFetcher,
    policy: &'a dyn ContinuationPolicy,
    delay: Duration,
    request: PageRequest,
    pending_delay: bool,
    pages_fetched: u32,
    items_fetched: usize,
    stop: Option<StopReason>,
    fetch_error: Option<FetchError>,
}

impl<'a> CursorWalker<'a> {
    pub fn new(
        fetcher: &'a dyn PageFetcher,
        policy: &'a dyn ContinuationPolicy,
        settings: &WalkSettings,
    ) -> Self {
        Self {
            fetcher,
            policy,
            delay: settings.delay,
            request: PageRequest::first(settings.target_id, settings.locale_tag.clone()),
            pending_delay: false,
            pages_fetched: 0,
            items_fetched: 0,
            stop: None,
            fetch_error: None,
        }
    }

    /// Fetch until the next page with items to keep, or `None` once the walk is over.
    pub async fn next_page(&mut self) -> Option<Page> {
        while self.stop.is_none() {
            if self.pending_delay && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.pending_delay = false;

            tracing::info!(
                connector = self.fetcher.id(),
                policy = self.policy.name(),
                page = self.request.page_index,
                offset = self.request.continuation_token.as_ref().map(|t| t.as_str()),
                "fetching page"
            );
            let page = match self.fetcher.fetch_page(&self.request).await {
                Ok(page) => page,
                Err(e) => {
                    tracing::error!(
                        page = self.request.page_index,
                        kind = %e.kind,
                        detail = %e.detail,
                        "page fetch failed, ending walk"
                    );
                    self.stop = Some(StopReason::FetchFailed);
                    self.fetch_error = Some(e);
                    return None;
                }
            };
            self.pages_fetched += 1;

            if page.is_empty() {
                tracing::info!(page = self.request.page_index, "no items in this page, stop");
                self.stop = Some(StopReason::EmptyPage);
                return None;
            }

            let fetched = page.len();
            self.items_fetched += fetched;
            let Continuation {
                keep,
                proceed,
                matched,
            } = self.policy.inspect(&page.items, page.has_more);

            if !proceed {
                let reason = if matched.is_some() || page.has_more {
                    StopReason::PolicyStop
                } else {
                    StopReason::Exhausted
                };
                tracing::info!(
                    page = self.request.page_index,
                    reason = reason.as_str(),
                    "walk finished"
                );
                self.stop = Some(reason);
            } else if let Some(token) = page.continuation_token() {
                self.request.advance(token);
                self.pending_delay = true;
            } else {
                tracing::warn!(
                    page = self.request.page_index,
                    "last item has no opus_id, stop"
                );
                self.stop = Some(StopReason::MissingIdentifier);
            }

            let Page {
                mut items,
                has_more,
            } = page;
            items.truncate(keep);
            tracing::info!(
                fetched,
                kept = items.len(),
                total_fetched = self.items_fetched,
                "got page"
            );
            if items.is_empty() {
                continue;
            }
            return Some(Page::new(items, has_more));
        }
        None
    }

    /// Drain the walk into one newest-first snapshot.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn collect(mut self) -> WalkOutput {
        let mut items = Vec::new();
        while let Some(page) = self.next_page().await {
            items.extend(page.items);
        }
        WalkOutput {
            items,
            pages_fetched: self.pages_fetched,
            items_fetched: self.items_fetched,
            stop_reason: self.stop.unwrap_or(StopReason::Exhausted),
            fetch_error: self.fetch_error,
        }
    }

    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop
    }

    pub fn fetch_error(&self) -> Option<&FetchError> {
        self.fetch_error.as_ref()
    }
}
