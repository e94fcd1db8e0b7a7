use crate::feed::log::IdentifierIndex;
use crate::models::{FeedItem, OpusId};

/// Verdict of a policy on one fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Continuation {
    /// Number of leading (newest) items of the page to keep.
    pub keep: usize,
    /// Whether the walk should request another page.
    pub proceed: bool,
    /// First already-known identifier met on the page, if any.
    pub matched: Option<OpusId>,
}

/// Decides, page by page, how much of the feed a walk consumes.
pub trait ContinuationPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    fn inspect(&self, items: &[FeedItem], has_more: bool) -> Continuation;
}

/// Walk the whole feed: keep every item, stop only when the remote says so.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullSync;

impl ContinuationPolicy for FullSync {
    fn name(&self) -> &'static str {
        "full"
    }

    fn inspect(&self, items: &[FeedItem], has_more: bool) -> Continuation {
        Continuation {
            keep: items.len(),
            proceed: has_more,
            matched: None,
        }
    }
}

/// Walk until the first already-known item.
///
/// The known set is a snapshot taken before the walk starts; items discovered during
/// the walk are never added to it. The feed is assumed to be monotonic: everything
/// older than the first known item is taken to be known as well.
#[derive(Debug, Clone)]
pub struct IncrementalSync {
    known: IdentifierIndex,
}

impl IncrementalSync {
    pub fn new(known: IdentifierIndex) -> Self {
        Self { known }
    }

    pub fn known(&self) -> &IdentifierIndex {
        &self.known
    }
}

impl ContinuationPolicy for IncrementalSync {
    fn name(&self) -> &'static str {
        "incremental"
    }

    fn inspect(&self, items: &[FeedItem], has_more: bool) -> Continuation {
        for (idx, item) in items.iter().enumerate() {
            let Some(id) = item.opus_id() else {
                continue;
            };
            if self.known.contains(&id) {
                tracing::info!(
                    opus_id = %id,
                    kept = idx,
                    "found existing opus_id, stopping incremental fetch"
                );
                return Continuation {
                    keep: idx,
                    proceed: false,
                    matched: Some(id),
                };
            }
        }
        Continuation {
            keep: items.len(),
            proceed: has_more,
            matched: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::test_support::item;

    fn known(ids: &[&str]) -> IdentifierIndex {
        ids.iter().map(|id| OpusId::new(*id).unwrap()).collect()
    }

    #[test]
    fn full_sync_follows_has_more() {
        let items = vec![item("3"), item("2")];
        let c = FullSync.inspect(&items, true);
        assert_eq!((c.keep, c.proceed), (2, true));
        let c = FullSync.inspect(&items, false);
        assert_eq!((c.keep, c.proceed), (2, false));
    }

    #[test]
    fn incremental_truncates_at_first_known_item() {
        let policy = IncrementalSync::new(known(&["7", "5"]));
        let items = vec![item("9"), item("8"), item("7"), item("6"), item("5")];
        let c = policy.inspect(&items, true);
        assert_eq!(c.keep, 2);
        assert!(!c.proceed);
        assert_eq!(c.matched, Some(OpusId::new("7").unwrap()));
    }

    #[test]
    fn incremental_without_match_falls_through_to_has_more() {
        let policy = IncrementalSync::new(known(&["1"]));
        let items = vec![item("9"), item("8")];
        assert!(policy.inspect(&items, true).proceed);
        assert!(!policy.inspect(&items, false).proceed);
        assert_eq!(policy.inspect(&items, false).keep, 2);
    }

    #[test]
    fn first_item_known_means_up_to_date() {
        let policy = IncrementalSync::new(known(&["9"]));
        let c = policy.inspect(&[item("9"), item("8")], true);
        assert_eq!(c.keep, 0);
        assert!(!c.proceed);
    }

    #[test]
    fn items_without_identifier_are_kept() {
        let policy = IncrementalSync::new(known(&["5"]));
        let anonymous = FeedItem::try_from(serde_json::json!({"title": "no id"})).unwrap();
        let c = policy.inspect(&[item("6"), anonymous, item("5")], true);
        assert_eq!(c.keep, 2);
    }
}
