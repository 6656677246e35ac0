//! Client for the remote validation/merge service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, Response,
};
use shared::{
    error::{ServiceErrorBody, ServiceException},
    protocol::{
        HealthResponse, ValidationResponse, FILES_FIELD, HEALTH_PATH, MERGE_PDFS_PATH,
        PDF_MIME_TYPE, VALIDATE_FILES_PATH,
    },
};
use tracing::{debug, info};
use url::Url;

use crate::{
    error::RemoteError,
    working_set::{FileHandle, ValidationOutcome},
};

/// The two requests the orchestration core makes. Each call is one atomic
/// request/response exchange carrying the whole given set: no retry, no
/// caching, no batching.
#[async_trait]
pub trait RemoteService: Send + Sync {
    async fn validate_set(
        &self,
        files: &[FileHandle],
    ) -> Result<Vec<ValidationOutcome>, RemoteError>;
    async fn merge_set(&self, files: &[FileHandle]) -> Result<Vec<u8>, RemoteError>;
}

#[derive(Debug, Clone)]
pub struct HttpRemoteService {
    http: Client,
    base_url: Url,
}

impl HttpRemoteService {
    pub fn new(base_url: &str) -> Result<Self, RemoteError> {
        Self::with_timeout(base_url, None)
    }

    /// A timeout surfaces as a network failure like any other transport error.
    pub fn with_timeout(base_url: &str, timeout: Option<Duration>) -> Result<Self, RemoteError> {
        let base_url = Url::parse(base_url).map_err(|source| RemoteError::InvalidBaseUrl {
            url: base_url.to_string(),
            source,
        })?;

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|source| RemoteError::Network {
            endpoint: base_url.to_string(),
            source,
        })?;

        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.as_str().trim_end_matches('/'))
    }

    async fn build_form(files: &[FileHandle]) -> Result<Form, RemoteError> {
        let mut form = Form::new();
        for file in files {
            let bytes = file
                .source
                .read()
                .await
                .map_err(|source| RemoteError::ReadFile {
                    filename: file.name.clone(),
                    source,
                })?;
            let part = Part::bytes(bytes)
                .file_name(file.name.clone())
                .mime_str(PDF_MIME_TYPE)
                .map_err(|source| RemoteError::Network {
                    endpoint: file.name.clone(),
                    source,
                })?;
            form = form.part(FILES_FIELD, part);
        }
        Ok(form)
    }

    async fn post_files(&self, path: &str, files: &[FileHandle]) -> Result<Response, RemoteError> {
        let endpoint = self.endpoint(path);
        let form = Self::build_form(files).await?;

        debug!(%endpoint, file_count = files.len(), "sending multipart request");
        let response = self
            .http
            .post(&endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|source| RemoteError::Network {
                endpoint: endpoint.clone(),
                source,
            })?;

        ensure_success(endpoint, response).await
    }

    /// Probes the service's health endpoint. Not part of the orchestration
    /// contract; front ends use it to tell users whether the service is up.
    pub async fn health(&self) -> Result<HealthResponse, RemoteError> {
        let endpoint = self.endpoint(HEALTH_PATH);
        let response = self
            .http
            .get(&endpoint)
            .send()
            .await
            .map_err(|source| RemoteError::Network {
                endpoint: endpoint.clone(),
                source,
            })?;
        let response = ensure_success(endpoint.clone(), response).await?;
        decode_json(&endpoint, response).await
    }
}

#[async_trait]
impl RemoteService for HttpRemoteService {
    async fn validate_set(
        &self,
        files: &[FileHandle],
    ) -> Result<Vec<ValidationOutcome>, RemoteError> {
        let response = self.post_files(VALIDATE_FILES_PATH, files).await?;
        let body: ValidationResponse =
            decode_json(&self.endpoint(VALIDATE_FILES_PATH), response).await?;

        info!(
            submitted = files.len(),
            returned = body.files.len(),
            "validate-files answered"
        );
        Ok(body.files.into_iter().map(ValidationOutcome::from).collect())
    }

    async fn merge_set(&self, files: &[FileHandle]) -> Result<Vec<u8>, RemoteError> {
        let endpoint = self.endpoint(MERGE_PDFS_PATH);
        let response = self.post_files(MERGE_PDFS_PATH, files).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|source| RemoteError::Network { endpoint, source })?;

        info!(
            merged = files.len(),
            size_bytes = bytes.len(),
            "merge-pdfs answered"
        );
        Ok(bytes.to_vec())
    }
}

async fn ensure_success(endpoint: String, response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let raw = response.bytes().await.unwrap_or_default();
    let detail = ServiceErrorBody::parse(&raw).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("unexpected status")
            .to_string()
    });

    Err(RemoteError::Service {
        endpoint,
        source: ServiceException::new(status.as_u16(), detail),
    })
}

async fn decode_json<T: serde::de::DeserializeOwned>(
    endpoint: &str,
    response: Response,
) -> Result<T, RemoteError> {
    let raw = response
        .bytes()
        .await
        .map_err(|source| RemoteError::Network {
            endpoint: endpoint.to_string(),
            source,
        })?;

    serde_json::from_slice(&raw).map_err(|source| RemoteError::Decode {
        endpoint: endpoint.to_string(),
        source,
    })
}

#[cfg(test)]
#[path = "tests/remote_tests.rs"]
mod tests;
