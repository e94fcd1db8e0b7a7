use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Field carrying the unique identifier of a feed item.
pub const IDENTIFIER_FIELD: &str = "opus_id";

/// Cosmetic field that is moved to the end of a record before it is persisted.
pub const BADGE_FIELD: &str = "badge";

/// Identifier of a feed item (`opus_id`), in canonical text form.
///
/// The remote service sends identifiers as strings, older payloads as integers. Both
/// map onto the same text so the identifier index does not care which one a log line
/// was written with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpusId(String);

impl OpusId {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(Error::InvalidInput("opus_id is empty".to_string()));
        }
        Ok(Self(value))
    }

    /// Interpret a raw JSON value as an identifier.
    ///
    /// `null`, booleans, empty strings and zero are not identifiers.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            Value::Number(n) if n.as_f64() != Some(0.0) => Some(Self(n.to_string())),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OpusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One unit of remote content: an opaque JSON object.
///
/// Field order is significant for storage and is preserved end to end.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeedItem(Map<String, Value>);

impl FeedItem {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn opus_id(&self) -> Option<OpusId> {
        self.0.get(IDENTIFIER_FIELD).and_then(OpusId::from_value)
    }

    pub fn has_badge(&self) -> bool {
        self.0.contains_key(BADGE_FIELD)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }

    /// Field names in their current order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Compact single-line JSON (no spaces, non-ASCII kept verbatim).
    pub fn to_json_line(&self) -> Result<String> {
        serde_json::to_string(&self.0).map_err(|e| Error::serialize("encode feed item", e))
    }
}

impl From<Map<String, Value>> for FeedItem {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

impl TryFrom<Value> for FeedItem {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(Error::InvalidInput(format!(
                "feed item must be a JSON object, got {other}"
            ))),
        }
    }
}

/// Items returned by one request, newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<FeedItem>,
    pub has_more: bool,
}

impl Page {
    pub fn new(items: Vec<FeedItem>, has_more: bool) -> Self {
        Self { items, has_more }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Cursor for the next request: the identifier of the oldest (last) item.
    pub fn continuation_token(&self) -> Option<OpusId> {
        self.items.last().and_then(FeedItem::opus_id)
    }
}

/// Parameters of one page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Owner of the feed (`host_mid`).
    pub target_id: u64,
    /// 1-based page counter.
    pub page_index: u32,
    /// Identifier of the oldest item seen so far (`offset`); absent on the first page.
    pub continuation_token: Option<OpusId>,
    /// Opaque location tag the remote service expects (`web_location`).
    pub locale_tag: String,
}

impl PageRequest {
    pub fn first(target_id: u64, locale_tag: impl Into<String>) -> Self {
        Self {
            target_id,
            page_index: 1,
            continuation_token: None,
            locale_tag: locale_tag.into(),
        }
    }

    pub fn advance(&mut self, token: OpusId) {
        self.page_index += 1;
        self.continuation_token = Some(token);
    }
}

/// Which kind of sync run to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Walk the whole feed and rewrite the log.
    Full,
    /// Walk until the newest known item and append the gap.
    Incremental,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Full => "full",
            SyncMode::Incremental => "incremental",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(SyncMode::Full),
            "incremental" | "inc" => Ok(SyncMode::Incremental),
            other => Err(Error::InvalidInput(format!(
                "unknown sync mode '{other}' (expected full, incremental or inc)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn opus_id_accepts_strings_and_integers() {
        assert_eq!(
            OpusId::from_value(&json!("1024")).map(|id| id.to_string()),
            Some("1024".to_string())
        );
        assert_eq!(
            OpusId::from_value(&json!(1024)).map(|id| id.to_string()),
            Some("1024".to_string())
        );
    }

    #[test]
    fn opus_id_rejects_falsy_values() {
        for v in [json!(null), json!(""), json!(0), json!(false), json!([])] {
            assert_eq!(OpusId::from_value(&v), None, "{v}");
        }
        assert!(OpusId::new("").is_err());
    }

    #[test]
    fn continuation_token_comes_from_last_item() {
        let page = Page::new(
            vec![
                FeedItem::try_from(json!({"opus_id": "3"})).unwrap(),
                FeedItem::try_from(json!({"opus_id": "2"})).unwrap(),
            ],
            true,
        );
        assert_eq!(page.continuation_token(), Some(OpusId::new("2").unwrap()));
        assert_eq!(Page::default().continuation_token(), None);
    }

    #[test]
    fn json_line_is_compact_and_keeps_unicode() {
        let item = FeedItem::try_from(json!({"opus_id": "1", "title": "动态 ✓"})).unwrap();
        assert_eq!(
            item.to_json_line().unwrap(),
            r#"{"opus_id":"1","title":"动态 ✓"}"#
        );
    }

    #[test]
    fn sync_mode_parses_aliases() {
        assert_eq!("FULL".parse::<SyncMode>().unwrap(), SyncMode::Full);
        assert_eq!("inc".parse::<SyncMode>().unwrap(), SyncMode::Incremental);
        assert_eq!(
            "incremental".parse::<SyncMode>().unwrap(),
            SyncMode::Incremental
        );
        assert!("partial".parse::<SyncMode>().is_err());
    }
}
