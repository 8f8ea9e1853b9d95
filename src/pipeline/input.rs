//! Upload intake: describe, validate, and read a user-supplied file.
//!
//! Validation only looks at what the upload *declares* (MIME type and size),
//! so it is instant and happens before any state changes. The `%PDF` magic
//! check needs the bytes and therefore runs after the read, as part of the
//! load stage.

use crate::config::PDF_MIME_TYPE;
use crate::error::PdfPagesError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Where the bytes of an upload live.
#[derive(Debug, Clone)]
pub enum FileSource {
    /// On disk; read lazily.
    Path(PathBuf),
    /// Already in memory.
    Memory(Arc<Vec<u8>>),
}

/// A file handed to one of the controllers.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    /// Declared MIME type, e.g. `application/pdf`.
    pub mime_type: String,
    /// Declared size in bytes.
    pub size: u64,
    pub source: FileSource,
}

impl UploadedFile {
    /// Describe a file on disk. The MIME type is derived from its extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PdfPagesError> {
        let path = path.as_ref();
        let meta = std::fs::metadata(path).map_err(|e| map_io_error(path, e))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        debug!("Upload {} ({}, {} bytes)", name, mime_type, meta.len());
        Ok(Self {
            name,
            mime_type,
            size: meta.len(),
            source: FileSource::Path(path.to_path_buf()),
        })
    }

    /// Describe in-memory bytes with an explicit MIME type.
    pub fn from_bytes(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Arc<Vec<u8>>>,
    ) -> Self {
        let bytes = bytes.into();
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size: bytes.len() as u64,
            source: FileSource::Memory(bytes),
        }
    }

    pub fn is_pdf(&self) -> bool {
        self.mime_type == PDF_MIME_TYPE
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    /// Read the full contents.
    pub async fn read(&self) -> Result<Arc<Vec<u8>>, PdfPagesError> {
        match &self.source {
            FileSource::Memory(bytes) => Ok(Arc::clone(bytes)),
            FileSource::Path(path) => tokio::fs::read(path)
                .await
                .map(Arc::new)
                .map_err(|e| map_io_error(path, e)),
        }
    }
}

/// Reject anything that is not a declared PDF within the size ceiling.
pub fn validate_pdf_upload(file: &UploadedFile, max_size: u64) -> Result<(), PdfPagesError> {
    if !file.is_pdf() {
        return Err(PdfPagesError::InvalidFileType {
            name: file.name.clone(),
            mime_type: file.mime_type.clone(),
        });
    }
    validate_size(file, max_size)
}

/// Reject files above the size ceiling.
pub fn validate_size(file: &UploadedFile, max_size: u64) -> Result<(), PdfPagesError> {
    if file.size > max_size {
        return Err(PdfPagesError::FileTooLarge {
            name: file.name.clone(),
            size: file.size,
            limit_mb: max_size / (1024 * 1024),
        });
    }
    Ok(())
}

/// Verify PDF magic bytes (`%PDF`).
pub fn check_pdf_magic(name: &str, bytes: &[u8]) -> Result<(), PdfPagesError> {
    if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(PdfPagesError::NotAPdf {
            name: name.to_string(),
            magic,
        });
    }
    Ok(())
}

fn map_io_error(path: &Path, e: std::io::Error) -> PdfPagesError {
    match e.kind() {
        std::io::ErrorKind::PermissionDenied => PdfPagesError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => PdfPagesError::FileNotFound {
            path: path.to_path_buf(),
        },
    }
}
