#![cfg(test)]

use crate::feed::traits::{FetchError, PageFetcher};
use crate::models::{FeedItem, OpusId, Page, PageRequest};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

pub(crate) fn item(id: &str) -> FeedItem {
    FeedItem::try_from(serde_json::json!({
        "opus_id": id,
        "content": format!("post {id}"),
    }))
    .unwrap()
}

pub(crate) fn item_with_badge(id: &str) -> FeedItem {
    FeedItem::try_from(serde_json::json!({
        "badge": {"text": "charge"},
        "opus_id": id,
        "content": format!("post {id}"),
    }))
    .unwrap()
}

pub(crate) fn page(ids: &[&str], has_more: bool) -> Page {
    Page::new(ids.iter().map(|id| item(id)).collect(), has_more)
}

/// Replays a fixed list of responses; an exhausted script answers with an empty page.
pub(crate) struct ScriptedFetcher {
    responses: Mutex<VecDeque<Result<Page, FetchError>>>,
    requests: Mutex<Vec<PageRequest>>,
}

impl ScriptedFetcher {
    pub(crate) fn new(responses: Vec<Result<Page, FetchError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    fn id(&self) -> &'static str {
        "scripted"
    }

    async fn fetch_page(&self, request: &PageRequest) -> Result<Page, FetchError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Page::default()))
    }
}

/// A newest-first feed served in fixed-size pages, paginated by the oldest id seen.
pub(crate) struct PagedFeed {
    items: Mutex<Vec<FeedItem>>,
    page_size: usize,
    requests: Mutex<Vec<PageRequest>>,
}

impl PagedFeed {
    pub(crate) fn new(items: Vec<FeedItem>, page_size: usize) -> Self {
        Self {
            items: Mutex::new(items),
            page_size,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Newest-first ids `count..=1`, i.e. `["count", ..., "1"]`.
    pub(crate) fn numbered(count: usize, page_size: usize) -> Self {
        let items = (1..=count).rev().map(|n| item(&n.to_string())).collect();
        Self::new(items, page_size)
    }

    /// Publish new items on top of the feed (newest first).
    pub(crate) fn publish(&self, newest_first: Vec<FeedItem>) {
        let mut items = self.items.lock().unwrap();
        let mut next = newest_first;
        next.append(&mut items);
        *items = next;
    }

    pub(crate) fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl PageFetcher for PagedFeed {
    fn id(&self) -> &'static str {
        "paged"
    }

    async fn fetch_page(&self, request: &PageRequest) -> Result<Page, FetchError> {
        self.requests.lock().unwrap().push(request.clone());
        let items = self.items.lock().unwrap();
        let start = match &request.continuation_token {
            None => 0,
            Some(token) => items
                .iter()
                .position(|it| it.opus_id().as_ref() == Some(token))
                .map(|idx| idx + 1)
                .unwrap_or(items.len()),
        };
        let end = (start + self.page_size).min(items.len());
        Ok(Page::new(items[start..end].to_vec(), end < items.len()))
    }
}

pub(crate) fn ids(items: &[FeedItem]) -> Vec<String> {
    items
        .iter()
        .map(|it| it.opus_id().map(|id| id.to_string()).unwrap_or_default())
        .collect()
}

pub(crate) fn opus_id(id: &str) -> OpusId {
    OpusId::new(id).unwrap()
}
