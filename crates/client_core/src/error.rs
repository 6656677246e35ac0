use std::{io, path::PathBuf};

use shared::{domain::SessionStatus, error::ServiceException, protocol::MIN_MERGE_FILES};
use thiserror::Error;

pub const VALIDATION_FAILED_MESSAGE: &str =
    "Failed to validate files. Check if the server is running.";
pub const MERGE_FAILED_MESSAGE: &str = "Failed to merge PDFs. Please try again.";
pub const NOT_ENOUGH_VALID_FILES_MESSAGE: &str = "Please select at least 2 valid PDF files";

/// Failure of a single request against the merge service. The session folds
/// every variant into one user-facing message; the variants only matter for logs.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("request to {endpoint} failed: {source}")]
    Network {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("service rejected {endpoint}: {source}")]
    Service {
        endpoint: String,
        #[source]
        source: ServiceException,
    },
    #[error("unexpected response body from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to read selected file '{filename}': {source}")]
    ReadFile {
        filename: String,
        #[source]
        source: io::Error,
    },
    #[error("invalid service base url '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("remote request task did not complete: {source}")]
    Task {
        #[source]
        source: tokio::task::JoinError,
    },
}

impl RemoteError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, RemoteError::Network { source, .. } if source.is_timeout())
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Service { source, .. } => Some(source.status),
            RemoteError::Network { source, .. } => source.status().map(|status| status.as_u16()),
            _ => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("the selected files cannot change while a merge is in flight")]
    MergeInProgress,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MergeError {
    #[error("{} (found {valid}, need {})", NOT_ENOUGH_VALID_FILES_MESSAGE, MIN_MERGE_FILES)]
    NotEnoughValidFiles { valid: usize },
    #[error("merge is unavailable while the session is {0}")]
    Busy(SessionStatus),
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("output path must not be empty")]
    EmptyOutputPath,
    #[error("failed to create output directory '{}': {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("refusing to overwrite existing file '{}'", .path.display())]
    AlreadyExists { path: PathBuf },
    #[error("failed to write merged document to '{}': {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
