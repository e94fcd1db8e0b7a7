//! Connectors that fetch remote feed pages for `feedsync_core`.

pub mod connectors;

#[cfg(feature = "bilibili")]
pub use connectors::bilibili::{BilibiliConfig, BilibiliConnector};
