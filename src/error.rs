//! Error types shared by the library modules. Binaries wrap these in
//! `anyhow::Error` with extra context.

use std::path::PathBuf;

/// Malformed compact duration string (`PT1H2M3S`).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DurationParseError {
    #[error("duration string is empty")]
    Empty,

    #[error("duration {0:?} does not start with the `P` marker")]
    MissingMarker(String),

    #[error("duration {input:?} has an invalid component near {fragment:?}")]
    InvalidComponent { input: String, fragment: String },

    #[error("duration {input:?} has unexpected trailing input {rest:?}")]
    TrailingInput { input: String, rest: String },

    #[error("duration {0:?} is too large to represent")]
    Overflow(String),
}

/// Failures talking to the upstream API. These abort a fetch run.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("response from {url} is not valid JSON: {message}")]
    Decode { url: String, message: String },

    #[error("invalid request URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Publish-date window that cannot be searched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WindowError {
    #[error("published-after {after} must be earlier than published-before {before}")]
    Empty { after: String, before: String },

    #[error("cannot read timestamp {0:?}; expected RFC 3339 or YYYY-MM-DD")]
    BadTimestamp(String),
}

/// Snapshot combination preconditions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CombineError {
    #[error("no snapshots to combine")]
    NoSnapshots,

    #[error("snapshot for channel {found} cannot be combined with channel {expected}")]
    ChannelMismatch { expected: String, found: String },
}

/// Problems with the declarative column map used during flattening.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("raw columns {first:?} and {second:?} both map to column {column:?}")]
    ColumnCollision {
        column: String,
        first: String,
        second: String,
    },

    #[error("prefix {0:?} must end with '.'")]
    InvalidPrefix(String),
}

/// Reading and writing snapshot documents and exported tables.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("nothing to export for channel {channel_id}: {missing} missing")]
    NothingToExport {
        channel_id: String,
        missing: &'static str,
    },

    #[error("snapshot document {0} is malformed: {1}")]
    Malformed(String, String),

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl ExportError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
