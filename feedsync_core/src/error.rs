/// Common error type for `feedsync_core`.
///
/// Only conditions the sync engine cannot degrade around end up here. Remote fetch
/// failures, items without identifiers and unreadable log lines are handled inside the
/// engine (logged and counted) and never surface as an `Error`.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("io error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {context}")]
    Serialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    #[tracing::instrument(level = "debug", name = "feedsync.error.io", skip(source))]
    pub fn io(context: impl Into<String> + std::fmt::Debug, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn serialize(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialize {
            context: context.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
