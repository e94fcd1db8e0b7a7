//! Bilibili opus connector.
//!
//! Pages through a user's opus space feed (`/x/polymer/web-dynamic/v1/opus/feed/space`).
//! The feed is newest first; each follow-up request passes the oldest `opus_id` seen so
//! far as `offset`.

use async_trait::async_trait;
use feedsync_core::feed::traits::{FetchError, FetchErrorKind, PageFetcher};
use feedsync_core::models::{FeedItem, Page, PageRequest};
use feedsync_core::{Error, Result};
use reqwest::Client;
use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, COOKIE, HeaderMap, HeaderName, HeaderValue, ORIGIN, REFERER,
    USER_AGENT,
};
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;

pub const DEFAULT_BASE_URL: &str =
    "https://api.bilibili.com/x/polymer/web-dynamic/v1/opus/feed/space";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "zh-CN,zh;q=0.9,en-US;q=0.8,en;q=0.7";
pub const DEFAULT_ORIGIN: &str = "https://space.bilibili.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP settings for [`BilibiliConnector`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BilibiliConfig {
    pub base_url: String,
    pub user_agent: String,
    pub accept_language: String,
    pub origin: String,
    /// Defaults to the target's opus page when unset.
    pub referer: Option<String>,
    /// Raw `k=v; k2=v2` cookie string. Empty means anonymous access.
    pub cookie: String,
    pub timeout: Duration,
}

impl Default for BilibiliConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
            origin: DEFAULT_ORIGIN.to_string(),
            referer: None,
            cookie: String::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl BilibiliConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(Error::InvalidConfig(format!(
                "bilibili base_url must be an http(s) url, got {:?}",
                self.base_url
            )));
        }
        if self.user_agent.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "bilibili user_agent must be non-empty".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(Error::InvalidConfig(
                "bilibili timeout must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn referer_for(&self, target_id: u64) -> String {
        match &self.referer {
            Some(referer) => referer.clone(),
            None if target_id == 0 => DEFAULT_ORIGIN.to_string(),
            None => format!("https://space.bilibili.com/{target_id}/upload/opus"),
        }
    }

    /// Cookie description safe to print.
    pub fn redacted_cookie(&self) -> String {
        let pairs = parse_cookie_string(&self.cookie).len();
        if self.cookie.trim().is_empty() {
            "<unset>".to_string()
        } else {
            format!("<redacted: {pairs} pairs>")
        }
    }
}

/// Parse a browser-style cookie string. Parts without `=` are ignored; a repeated key
/// keeps its first position and its last value.
pub fn parse_cookie_string(raw: &str) -> Vec<(String, String)> {
    let mut cookies: Vec<(String, String)> = Vec::new();
    for part in raw.split(';') {
        let Some((k, v)) = part.trim().split_once('=') else {
            continue;
        };
        let (k, v) = (k.trim(), v.trim());
        match cookies.iter_mut().find(|(existing, _)| existing == k) {
            Some(slot) => slot.1 = v.to_string(),
            None => cookies.push((k.to_string(), v.to_string())),
        }
    }
    cookies
}

fn cookie_header(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        tracing::warn!("no cookie provided, some content may be hidden (e.g. charge-only posts)");
        return None;
    }
    let cookies = parse_cookie_string(raw);
    if cookies.is_empty() {
        tracing::warn!("cookie string provided but parsing resulted in no cookies");
        return None;
    }
    Some(
        cookies
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; "),
    )
}

fn header_value(name: &HeaderName, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| Error::InvalidConfig(format!("invalid {name} header: {e}")))
}

fn default_headers(config: &BilibiliConfig, target_id: u64) -> Result<HeaderMap> {
    let mut h = HeaderMap::new();
    h.insert(USER_AGENT, header_value(&USER_AGENT, &config.user_agent)?);
    h.insert(ACCEPT, HeaderValue::from_static("*/*"));
    h.insert(
        ACCEPT_LANGUAGE,
        header_value(&ACCEPT_LANGUAGE, &config.accept_language)?,
    );
    h.insert(ORIGIN, header_value(&ORIGIN, &config.origin)?);
    h.insert(REFERER, header_value(&REFERER, &config.referer_for(target_id))?);
    if let Some(cookie) = cookie_header(&config.cookie) {
        let mut value = header_value(&COOKIE, &cookie)?;
        value.set_sensitive(true);
        h.insert(COOKIE, value);
    }
    Ok(h)
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<EnvelopeData>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeData {
    #[serde(default)]
    items: Option<Vec<FeedItem>>,
    #[serde(default)]
    has_more: Option<bool>,
}

/// Turn one HTTP response into a page, or classify why it is not one.
pub fn decode_page(status: u16, body: &str) -> std::result::Result<Page, FetchError> {
    if !(200..300).contains(&status) {
        return Err(FetchError::http_status(status, body));
    }
    let envelope: Envelope = serde_json::from_str(body)
        .map_err(|e| FetchError::decode(format!("failed to decode JSON: {e}")))?;
    match envelope.code {
        Some(0) => {}
        Some(code) => {
            return Err(FetchError::api_code(
                code,
                envelope.message.as_deref().unwrap_or_default(),
            ));
        }
        None => {
            return Err(FetchError::new(
                FetchErrorKind::ApiCode,
                "response has no code field",
            ));
        }
    }
    let data = envelope.data.unwrap_or(EnvelopeData {
        items: None,
        has_more: None,
    });
    Ok(Page::new(
        data.items.unwrap_or_default(),
        data.has_more.unwrap_or(false),
    ))
}

fn query(request: &PageRequest) -> Vec<(&'static str, String)> {
    let mut q = vec![
        ("host_mid", request.target_id.to_string()),
        ("type", "all".to_string()),
        ("page", request.page_index.to_string()),
        ("web_location", request.locale_tag.clone()),
    ];
    if let Some(token) = &request.continuation_token {
        q.push(("offset", token.to_string()));
    }
    q
}

fn transport_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::transport(format!("request timed out: {e}"))
    } else {
        FetchError::transport(e.to_string())
    }
}

#[derive(Clone)]
pub struct BilibiliConnector {
    client: Client,
    base_url: String,
}

impl BilibiliConnector {
    /// Build a connector bound to one feed owner (`host_mid`).
    #[instrument(level = "debug", skip(config))]
    pub fn new(config: &BilibiliConfig, target_id: u64) -> Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(default_headers(config, target_id)?)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("build http client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }
}

#[async_trait]
impl PageFetcher for BilibiliConnector {
    fn id(&self) -> &'static str {
        "bilibili"
    }

    #[instrument(level = "debug", skip(self, request), fields(page = request.page_index))]
    async fn fetch_page(&self, request: &PageRequest) -> std::result::Result<Page, FetchError> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(&query(request))
            .send()
            .await
            .map_err(transport_error)?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(transport_error)?;
        decode_page(status, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedsync_core::models::OpusId;

    #[test]
    fn cookie_string_parsing() {
        let parsed = parse_cookie_string(" SESSDATA=abc ; broken; bili_jct = x=y ;SESSDATA=def");
        assert_eq!(
            parsed,
            vec![
                ("SESSDATA".to_string(), "def".to_string()),
                ("bili_jct".to_string(), "x=y".to_string()),
            ]
        );
        assert!(parse_cookie_string("no pairs here").is_empty());
        assert_eq!(cookie_header("a=1;b=2").as_deref(), Some("a=1; b=2"));
        assert_eq!(cookie_header("   "), None);
        assert_eq!(cookie_header("junk"), None);
    }

    #[test]
    fn referer_defaults_to_target_page() {
        let cfg = BilibiliConfig::default();
        assert_eq!(
            cfg.referer_for(1234),
            "https://space.bilibili.com/1234/upload/opus"
        );
        let cfg = BilibiliConfig {
            referer: Some("https://example.test".to_string()),
            ..BilibiliConfig::default()
        };
        assert_eq!(cfg.referer_for(1234), "https://example.test");
    }

    #[test]
    fn validate_rejects_bad_settings() {
        assert!(BilibiliConfig::default().validate().is_ok());
        let cfg = BilibiliConfig {
            base_url: "ftp://nope".to_string(),
            ..BilibiliConfig::default()
        };
        assert!(cfg.validate().is_err());
        let cfg = BilibiliConfig {
            timeout: Duration::ZERO,
            ..BilibiliConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn redacted_cookie_hides_values() {
        let cfg = BilibiliConfig {
            cookie: "SESSDATA=secret; bili_jct=token".to_string(),
            ..BilibiliConfig::default()
        };
        let shown = cfg.redacted_cookie();
        assert!(!shown.contains("secret"));
        assert_eq!(shown, "<redacted: 2 pairs>");
        assert_eq!(BilibiliConfig::default().redacted_cookie(), "<unset>");
    }

    #[test]
    fn query_includes_offset_after_first_page() {
        let mut request = PageRequest::first(42, "333.1387");
        let first = query(&request);
        assert!(first.iter().all(|(k, _)| *k != "offset"));
        assert!(first.contains(&("page", "1".to_string())));

        request.advance(OpusId::new("1029384756").unwrap());
        let second = query(&request);
        assert!(second.contains(&("offset", "1029384756".to_string())));
        assert!(second.contains(&("page", "2".to_string())));
        assert!(second.contains(&("host_mid", "42".to_string())));
        assert!(second.contains(&("type", "all".to_string())));
        assert!(second.contains(&("web_location", "333.1387".to_string())));
    }

    #[test]
    fn decode_page_keeps_item_field_order() {
        let body = r#"{"code":0,"message":"0","data":{"has_more":true,"items":[
            {"opus_id":"2","badge":{"text":"x"},"content":"b"},
            {"opus_id":"1","content":"a"}]}}"#;
        let page = decode_page(200, body).unwrap();
        assert!(page.has_more);
        assert_eq!(page.len(), 2);
        assert_eq!(
            page.items[0].keys().collect::<Vec<_>>(),
            vec!["opus_id", "badge", "content"]
        );
        assert_eq!(page.continuation_token(), Some(OpusId::new("1").unwrap()));
    }

    #[test]
    fn decode_page_null_data_is_an_empty_page() {
        let page = decode_page(200, r#"{"code":0,"data":null}"#).unwrap();
        assert!(page.is_empty());
        assert!(!page.has_more);
        let page = decode_page(200, r#"{"code":0,"data":{"items":null,"has_more":true}}"#)
            .unwrap();
        assert!(page.is_empty());
    }

    #[test]
    fn decode_page_classifies_failures() {
        let err = decode_page(412, "request was banned").unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::HttpStatus);
        assert!(err.detail.contains("412"));

        let err = decode_page(200, "<html>").unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::Decode);

        let err = decode_page(200, r#"{"code":-352,"message":"risk control"}"#).unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::ApiCode);
        assert_eq!(err.detail, "code=-352, message=risk control");

        let err = decode_page(200, r#"{"message":"?"}"#).unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::ApiCode);
    }

    #[test]
    fn connector_builds_with_cookie() {
        let cfg = BilibiliConfig {
            cookie: "SESSDATA=abc".to_string(),
            ..BilibiliConfig::default()
        };
        let connector = BilibiliConnector::new(&cfg, 42).unwrap();
        assert_eq!(connector.id(), "bilibili");
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_error() {
        let cfg = BilibiliConfig {
            base_url: "http://127.0.0.1:9/feed".to_string(),
            timeout: Duration::from_secs(2),
            ..BilibiliConfig::default()
        };
        let connector = BilibiliConnector::new(&cfg, 42).unwrap();
        let err = connector
            .fetch_page(&PageRequest::first(42, "333.1387"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::Transport);
    }
}
