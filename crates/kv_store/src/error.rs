use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KvStoreError {
    #[error("I/O error while {operation} at {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize value for key '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to parse value file {path}: {source}")]
    ValueParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("value stored under key '{key}' does not match the requested type: {source}")]
    Deserialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to format current UTC timestamp as RFC3339: {0}")]
    ClockFormat(#[source] time::error::Format),
}

impl KvStoreError {
    #[must_use]
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn serialize(key: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialize {
            key: key.into(),
            source,
        }
    }

    #[must_use]
    pub fn value_parse(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::ValueParse {
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn deserialize(key: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Deserialize {
            key: key.into(),
            source,
        }
    }
}
