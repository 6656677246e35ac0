use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Validation,
    NotFound,
    RateLimited,
    Internal,
    Unknown,
}

impl ErrorCode {
    pub fn from_status(status: u16) -> Self {
        match status {
            400 | 413 | 415 | 422 => ErrorCode::Validation,
            404 => ErrorCode::NotFound,
            429 => ErrorCode::RateLimited,
            500..=599 => ErrorCode::Internal,
            _ => ErrorCode::Unknown,
        }
    }
}

/// JSON error body returned by the merge service on non-2xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceErrorBody {
    pub detail: String,
}

impl ServiceErrorBody {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }

    /// Extracts `detail` from a raw response body; bodies that are not the
    /// service's JSON shape yield `None`.
    pub fn parse(raw: &[u8]) -> Option<String> {
        serde_json::from_slice::<ServiceErrorBody>(raw)
            .ok()
            .map(|body| body.detail)
    }
}

#[derive(Debug, Error)]
#[error("{code:?} ({status}): {detail}")]
pub struct ServiceException {
    pub code: ErrorCode,
    pub status: u16,
    pub detail: String,
}

impl ServiceException {
    pub fn new(status: u16, detail: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::from_status(status),
            status,
            detail: detail.into(),
        }
    }
}

impl From<ServiceException> for ServiceErrorBody {
    fn from(value: ServiceException) -> Self {
        Self {
            detail: value.detail,
        }
    }
}
