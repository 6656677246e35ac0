//! Hands the merged bytes to whatever environment drives the session.

use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use shared::protocol::PDF_EXTENSION;
use tokio::{fs::OpenOptions, io::AsyncWriteExt};
use tracing::info;

use crate::error::DeliveryError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedDocument {
    pub suggested_filename: String,
    pub bytes: Vec<u8>,
}

impl MergedDocument {
    pub fn new(suggested_filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            suggested_filename: suggested_filename.into(),
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Returns where the document ended up.
    async fn deliver(&self, document: &MergedDocument) -> Result<PathBuf, DeliveryError>;
}

/// Writes the document into a directory under its suggested name. An existing
/// file is left alone unless `overwrite` was set.
pub struct DirectorySink {
    dir: PathBuf,
    overwrite: bool,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            overwrite: false,
        }
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

#[async_trait]
impl ArtifactSink for DirectorySink {
    async fn deliver(&self, document: &MergedDocument) -> Result<PathBuf, DeliveryError> {
        let path = self.dir.join(&document.suggested_filename);
        write_document(&path, &document.bytes, self.overwrite).await?;
        Ok(path)
    }
}

/// Writes the document to an exact path chosen by the user.
pub struct FileSink {
    path: PathBuf,
    overwrite: bool,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            overwrite: false,
        }
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

#[async_trait]
impl ArtifactSink for FileSink {
    async fn deliver(&self, document: &MergedDocument) -> Result<PathBuf, DeliveryError> {
        write_document(&self.path, &document.bytes, self.overwrite).await?;
        Ok(self.path.clone())
    }
}

async fn write_document(path: &Path, bytes: &[u8], overwrite: bool) -> Result<(), DeliveryError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| DeliveryError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
    }

    let write_err = |source: io::Error| DeliveryError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut file = OpenOptions::new()
        .write(true)
        .create(overwrite)
        .truncate(overwrite)
        .create_new(!overwrite)
        .open(path)
        .await
        .map_err(|source| match source.kind() {
            ErrorKind::AlreadyExists => DeliveryError::AlreadyExists {
                path: path.to_path_buf(),
            },
            _ => write_err(source),
        })?;
    file.write_all(bytes).await.map_err(write_err)?;
    file.flush().await.map_err(write_err)?;

    info!(path = %path.display(), size_bytes = bytes.len(), "merged document delivered");
    Ok(())
}

/// Cleans a user-typed output path: surrounding whitespace and quotes are
/// stripped and a missing `.pdf` extension is appended.
pub fn prepare_output_path(raw: &str) -> Result<PathBuf, DeliveryError> {
    let cleaned = raw.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    if cleaned.is_empty() {
        return Err(DeliveryError::EmptyOutputPath);
    }

    if cleaned.to_ascii_lowercase().ends_with(PDF_EXTENSION) {
        Ok(PathBuf::from(cleaned))
    } else {
        Ok(PathBuf::from(format!("{cleaned}{PDF_EXTENSION}")))
    }
}

#[cfg(test)]
#[path = "tests/delivery_tests.rs"]
mod tests;
