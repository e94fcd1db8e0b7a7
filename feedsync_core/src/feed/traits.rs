use crate::models::{Page, PageRequest};
use async_trait::async_trait;
use std::fmt;

/// Why a page request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// The server answered with a non-2xx status.
    HttpStatus,
    /// The body was not the expected JSON envelope.
    Decode,
    /// The envelope carried a non-zero API error code.
    ApiCode,
    /// No response at all (connect failure, timeout).
    Transport,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FetchErrorKind::HttpStatus => "http_status",
            FetchErrorKind::Decode => "decode",
            FetchErrorKind::ApiCode => "api_code",
            FetchErrorKind::Transport => "transport",
        };
        f.write_str(s)
    }
}

/// A failed page request. Ends the current walk; never retried by the walker.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {detail}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub detail: String,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn http_status(status: u16, body: &str) -> Self {
        let snippet: String = body.chars().take(200).collect();
        Self::new(FetchErrorKind::HttpStatus, format!("HTTP {status}: {snippet}"))
    }

    pub fn decode(detail: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Decode, detail)
    }

    pub fn api_code(code: i64, message: &str) -> Self {
        Self::new(
            FetchErrorKind::ApiCode,
            format!("code={code}, message={message}"),
        )
    }

    pub fn transport(detail: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Transport, detail)
    }
}

/// Performs one network call for one page of the remote feed.
///
/// Implementations live in `feedsync_integrations` (or in tests). Retries and
/// timeouts, if any, belong here rather than in the walker.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Connector identifier, used in logs.
    fn id(&self) -> &'static str;

    async fn fetch_page(&self, request: &PageRequest) -> Result<Page, FetchError>;
}
