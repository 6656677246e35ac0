//! Intake filter: turns a raw batch of dropped or chosen files into the subset
//! that looks like PDF documents. Rejection is silent; it is acceptance
//! filtering, not validation.

use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use shared::protocol::{PDF_EXTENSION, PDF_MIME_TYPE};
use tracing::debug;

/// Where the bytes of a selected file come from. Paths are read lazily, once
/// per request that carries the file.
#[derive(Debug, Clone)]
pub enum FileSource {
    Memory(Arc<[u8]>),
    Path(PathBuf),
}

impl FileSource {
    pub async fn read(&self) -> io::Result<Vec<u8>> {
        match self {
            FileSource::Memory(bytes) => Ok(bytes.to_vec()),
            FileSource::Path(path) => tokio::fs::read(path).await,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CandidateFile {
    pub name: String,
    pub mime_type: Option<String>,
    pub size_bytes: u64,
    pub source: FileSource,
}

impl CandidateFile {
    pub fn from_bytes(
        name: impl Into<String>,
        mime_type: Option<&str>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        let bytes: Vec<u8> = bytes.into();
        Self {
            name: name.into(),
            mime_type: mime_type.map(str::to_string),
            size_bytes: bytes.len() as u64,
            source: FileSource::Memory(Arc::from(bytes)),
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("'{}' is not a regular file", path.display()),
            ));
        }

        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime_type = mime_guess::from_path(path)
            .first()
            .map(|mime| mime.essence_str().to_string());

        Ok(Self {
            name,
            mime_type,
            size_bytes: metadata.len(),
            source: FileSource::Path(path.to_path_buf()),
        })
    }
}

pub fn is_accepted(candidate: &CandidateFile) -> bool {
    let mime_matches = candidate
        .mime_type
        .as_deref()
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(PDF_MIME_TYPE));

    mime_matches || candidate.name.to_ascii_lowercase().ends_with(PDF_EXTENSION)
}

/// Keeps accepted candidates in their original relative order.
pub fn filter_accepted(batch: impl IntoIterator<Item = CandidateFile>) -> Vec<CandidateFile> {
    batch
        .into_iter()
        .filter(|candidate| {
            let accepted = is_accepted(candidate);
            if !accepted {
                debug!(
                    filename = %candidate.name,
                    mime_type = ?candidate.mime_type,
                    "dropping non-pdf candidate at intake"
                );
            }
            accepted
        })
        .collect()
}

#[cfg(test)]
#[path = "tests/intake_tests.rs"]
mod tests;
