use crate::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_OUTPUT_PATH: &str = "opus.jsonl";
pub const DEFAULT_LOCALE_TAG: &str = "333.1387";
pub const DEFAULT_DELAY: Duration = Duration::from_millis(300);

/// Settings for one sync run.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Owner of the feed (`host_mid`). Required; `0` means "not configured".
    pub target_id: u64,
    /// Local JSON-lines log.
    pub output_path: PathBuf,
    /// Pause between successive page requests.
    pub delay: Duration,
    /// Opaque `web_location` tag sent with every request.
    pub locale_tag: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            target_id: 0,
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            delay: DEFAULT_DELAY,
            locale_tag: DEFAULT_LOCALE_TAG.to_string(),
        }
    }
}

impl SyncConfig {
    pub fn new(target_id: u64, output_path: impl Into<PathBuf>) -> Self {
        Self {
            target_id,
            output_path: output_path.into(),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_locale_tag(mut self, locale_tag: impl Into<String>) -> Self {
        self.locale_tag = locale_tag.into();
        self
    }

    #[tracing::instrument(level = "debug")]
    pub fn validate(&self) -> Result<()> {
        if self.target_id == 0 {
            return Err(Error::InvalidConfig(
                "host_mid is required (numeric id of the feed owner)".to_string(),
            ));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("output_path is empty".to_string()));
        }
        if self.locale_tag.trim().is_empty() {
            return Err(Error::InvalidConfig("web_location is empty".to_string()));
        }
        Ok(())
    }
}
