//! In-process stand-in for the merge service, served by axum on a loopback port.

use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use shared::{
    error::ServiceErrorBody,
    protocol::{
        size_kb, FileValidationResult, HealthResponse, ValidationResponse, HEALTH_PATH,
        MERGE_PDFS_PATH, MIN_MERGE_FILES, VALIDATE_FILES_PATH,
    },
};
use tokio::{net::TcpListener, sync::Mutex};

use crate::intake::CandidateFile;

#[derive(Debug, Clone)]
pub(crate) struct ReceivedPart {
    pub field: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Default)]
pub(crate) struct FakeServiceState {
    pub validate_calls: Arc<Mutex<Vec<Vec<ReceivedPart>>>>,
    pub merge_calls: Arc<Mutex<Vec<Vec<ReceivedPart>>>>,
}

pub(crate) fn pdf(name: &str, body: &str) -> CandidateFile {
    CandidateFile::from_bytes(
        name,
        Some("application/pdf"),
        format!("%PDF-1.4 {body}").into_bytes(),
    )
}

pub(crate) fn corrupt_pdf(name: &str) -> CandidateFile {
    CandidateFile::from_bytes(name, Some("application/pdf"), b"not a pdf".to_vec())
}

fn looks_like_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF")
}

async fn read_parts(mut multipart: Multipart) -> Result<Vec<ReceivedPart>, StatusCode> {
    let mut parts = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?
    {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|_| StatusCode::BAD_REQUEST)?
            .to_vec();
        parts.push(ReceivedPart {
            field: name,
            filename,
            content_type,
            bytes,
        });
    }
    Ok(parts)
}

async fn validate_files(
    State(state): State<FakeServiceState>,
    multipart: Multipart,
) -> Result<Json<ValidationResponse>, StatusCode> {
    let parts = read_parts(multipart).await?;
    let files = parts
        .iter()
        .map(|part| {
            let is_valid = looks_like_pdf(&part.bytes);
            let size = part.bytes.len() as u64;
            FileValidationResult {
                filename: part.filename.clone().unwrap_or_default(),
                is_valid,
                size,
                size_kb: size_kb(size),
                error: (!is_valid).then(|| "Invalid PDF file".to_string()),
            }
        })
        .collect();
    state.validate_calls.lock().await.push(parts);
    Ok(Json(ValidationResponse { files }))
}

async fn merge_pdfs(
    State(state): State<FakeServiceState>,
    multipart: Multipart,
) -> Result<Vec<u8>, (StatusCode, Json<ServiceErrorBody>)> {
    let parts = read_parts(multipart)
        .await
        .map_err(|status| (status, Json(ServiceErrorBody::new("malformed upload"))))?;

    if parts.len() < MIN_MERGE_FILES {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ServiceErrorBody::new("At least 2 PDF files required")),
        ));
    }
    if let Some(bad) = parts.iter().find(|part| !looks_like_pdf(&part.bytes)) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ServiceErrorBody::new(format!(
                "Invalid PDF file: {}",
                bad.filename.clone().unwrap_or_default()
            ))),
        ));
    }

    let merged = parts.iter().flat_map(|part| part.bytes.clone()).collect();
    state.merge_calls.lock().await.push(parts);
    Ok(merged)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

pub(crate) fn fake_service_router(state: FakeServiceState) -> Router {
    Router::new()
        .route(VALIDATE_FILES_PATH, post(validate_files))
        .route(MERGE_PDFS_PATH, post(merge_pdfs))
        .route(HEALTH_PATH, get(health))
        .with_state(state)
}

pub(crate) async fn spawn_server(app: Router) -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

pub(crate) async fn spawn_fake_service() -> (String, FakeServiceState) {
    let state = FakeServiceState::default();
    let url = spawn_server(fake_service_router(state.clone())).await;
    (url, state)
}
