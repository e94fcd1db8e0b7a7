//! Optional connectors implementing the core `PageFetcher` trait.

#[cfg(feature = "bilibili")]
pub mod bilibili;
