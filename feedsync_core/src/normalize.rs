//! Canonical field order for persisted records.

use crate::models::{BADGE_FIELD, FeedItem};
use serde_json::Map;

/// Move `badge` to the end of the record, keeping every other field in place.
///
/// Records without a badge come back untouched.
pub fn normalize(item: FeedItem) -> FeedItem {
    if !item.has_badge() {
        return item;
    }

    let fields = item.into_fields();
    let mut reordered = Map::with_capacity(fields.len());
    let mut badge = None;
    for (key, value) in fields {
        if key == BADGE_FIELD {
            badge = Some(value);
        } else {
            reordered.insert(key, value);
        }
    }
    if let Some(badge) = badge {
        reordered.insert(BADGE_FIELD.to_string(), badge);
    }
    FeedItem::new(reordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(v: serde_json::Value) -> FeedItem {
        FeedItem::try_from(v).unwrap()
    }

    #[test]
    fn record_without_badge_is_unchanged() {
        let original = item(json!({"opus_id": "1", "z": 1, "a": 2}));
        let out = normalize(original.clone());
        assert_eq!(out, original);
        assert_eq!(out.keys().collect::<Vec<_>>(), vec!["opus_id", "z", "a"]);
    }

    #[test]
    fn badge_moves_to_the_end() {
        let out = normalize(item(json!({
            "badge": {"text": "charge"},
            "opus_id": "1",
            "content": "x",
            "cover": null
        })));
        assert_eq!(
            out.keys().collect::<Vec<_>>(),
            vec!["opus_id", "content", "cover", "badge"]
        );
        assert_eq!(out.fields()["badge"], json!({"text": "charge"}));
    }

    #[test]
    fn normalizing_twice_is_a_no_op() {
        let once = normalize(item(json!({"a": 1, "badge": "b", "c": 3})));
        let twice = normalize(once.clone());
        assert_eq!(
            once.keys().collect::<Vec<_>>(),
            twice.keys().collect::<Vec<_>>()
        );
        assert_eq!(once.to_json_line().unwrap(), twice.to_json_line().unwrap());
    }
}
