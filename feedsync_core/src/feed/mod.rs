//! Feed traversal and merge.
//!
//! - `traits`: the page-fetch seam implemented by connectors
//! - `policy`: when a walk keeps going (full vs incremental)
//! - `walker`: drives one cursor-paginated traversal, newest first
//! - `log`: the append-only JSON-lines log and its identifier index
//! - `engine`: selects a policy, walks, reverses to oldest-first and persists

pub mod engine;
pub mod log;
pub mod policy;
pub mod traits;
pub mod walker;

#[cfg(test)]
pub(crate) mod test_support;
