use std::path::PathBuf;

use models::errors::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
    #[error("{0}")]
    InvalidName(#[from] ModelError),
    #[error("protocol error: {0}")]
    Protocol(String),
    /// Reason carried by an `error` reply of the host.
    #[error("{0}")]
    Remote(String),
    #[error("message channel closed")]
    ChannelClosed,
    #[error("no reply for request {0} within the configured timeout")]
    Timeout(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// Text sent back to a proxy in an `error` reply.
    pub fn reason(&self) -> String {
        self.to_string()
    }

    /// Rebuild an error from a reply reason; only `NotFound` keeps its kind.
    pub fn from_reason(reason: String) -> Self {
        match reason.strip_prefix("not found: ") {
            Some(name) => Self::NotFound(name.to_string()),
            None => Self::Remote(reason),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
