//! Attachment validation and local storage.
//!
//! Uploads are limited to PDF, JPEG/PNG images and DOCX documents of at most
//! 5 MiB.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::uuid::uuidv7;

/// Maximum accepted upload size in bytes (5 MiB).
pub const MAX_ATTACHMENT_BYTES: u64 = 5 * 1024 * 1024;

/// Maximum length of the original file name.
pub const MAX_NAME_LEN: usize = 255;

/// Broad category of an accepted upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Pdf,
    Image,
    Document,
}

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("Invalid file type. Only PDF, JPG, JPEG, PNG, and DOCX files are allowed.")]
    UnsupportedType,

    #[error("File size must be greater than 0 bytes.")]
    Empty,

    #[error("File size must be at most {max} bytes.", max = MAX_ATTACHMENT_BYTES)]
    TooLarge,

    #[error("File name must be between 1 and {max} characters.", max = MAX_NAME_LEN)]
    BadName,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Validate an upload by name and size, returning its category.
pub fn validate_attachment(name: &str, size: u64) -> Result<AttachmentKind, AttachmentError> {
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(AttachmentError::BadName);
    }
    let kind = match extension(name).as_deref() {
        Some("pdf") => AttachmentKind::Pdf,
        Some("jpg" | "jpeg" | "png") => AttachmentKind::Image,
        Some("docx") => AttachmentKind::Document,
        _ => return Err(AttachmentError::UnsupportedType),
    };
    if size == 0 {
        return Err(AttachmentError::Empty);
    }
    if size > MAX_ATTACHMENT_BYTES {
        return Err(AttachmentError::TooLarge);
    }
    Ok(kind)
}

fn extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Stores validated uploads as `<root>/<file id>.<ext>`.
#[derive(Debug, Clone)]
pub struct LocalAttachmentStore {
    root: PathBuf,
}

impl LocalAttachmentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Validate and persist an upload, returning the new file id.
    pub async fn save_attachment(&self, name: &str, bytes: &[u8]) -> Result<Uuid, AttachmentError> {
        let kind = validate_attachment(name, bytes.len() as u64)?;
        let ext = extension(name).ok_or(AttachmentError::UnsupportedType)?;
        let id = uuidv7();

        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.path_for(id, &ext), bytes).await?;
        debug!(%id, ?kind, size = bytes.len(), "attachment stored");
        Ok(id)
    }

    pub fn path_for(&self, id: Uuid, ext: &str) -> PathBuf {
        self.root.join(format!("{id}.{ext}"))
    }
}
