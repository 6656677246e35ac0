use serde::{Deserialize, Serialize};

pub const VALIDATE_FILES_PATH: &str = "/validate-files";
pub const MERGE_PDFS_PATH: &str = "/merge-pdfs";
pub const HEALTH_PATH: &str = "/health";

/// Multipart field every file part is sent under, for both requests.
pub const FILES_FIELD: &str = "files";

pub const PDF_MIME_TYPE: &str = "application/pdf";
pub const PDF_EXTENSION: &str = ".pdf";
pub const DEFAULT_MERGED_FILENAME: &str = "merged.pdf";

/// The service refuses to merge fewer than this many documents.
pub const MIN_MERGE_FILES: usize = 2;

/// One entry of the `validate-files` response, one per submitted part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileValidationResult {
    pub filename: String,
    pub is_valid: bool,
    pub size: u64,
    pub size_kb: f64,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResponse {
    pub files: Vec<FileValidationResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Size in kilobytes rounded to one decimal, the way the service reports `size_kb`.
pub fn size_kb(size_bytes: u64) -> f64 {
    (size_bytes as f64 / 1024.0 * 10.0).round() / 10.0
}
