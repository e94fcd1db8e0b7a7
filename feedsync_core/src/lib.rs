//! Feedsync core library: feed traversal, sync policies and the local JSONL log.

pub mod config;
pub mod error;
pub mod feed;
pub mod models;
pub mod normalize;

pub use config::SyncConfig;
pub use error::{Error, Result};
pub use feed::engine::{SyncEngine, SyncOutcome, SyncReport, merge_oldest_first};
pub use feed::log::{FeedLog, IdentifierIndex, IndexScan, NormalizeStats, normalize_file};
pub use feed::policy::{Continuation, ContinuationPolicy, FullSync, IncrementalSync};
pub use feed::traits::{FetchError, FetchErrorKind, PageFetcher};
pub use feed::walker::{CursorWalker, StopReason, WalkOutput, WalkSettings};
pub use models::{FeedItem, OpusId, Page, PageRequest, SyncMode};
pub use normalize::normalize;
