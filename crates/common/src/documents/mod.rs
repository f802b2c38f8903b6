//! Uploaded file handling
//!
//! Provides:
//! - Extension allow-list checks
//! - Filename sanitizing and session id derivation
//! - Temporary upload files removed on drop
//! - Text extraction (pdf, txt) and image encoding

mod pdf;

pub use pdf::extract_pdf_text;

use crate::errors::Result;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Fallback name when sanitizing leaves nothing
pub const DEFAULT_UPLOAD_NAME: &str = "upload";

/// Lower-cased final extension of `filename`, if it has one
pub fn extension(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
}

/// True when `filename` has a final extension contained in `allowed`
pub fn allowed_file<S: AsRef<str>>(filename: &str, allowed: &[S]) -> bool {
    match extension(filename) {
        Some(ext) => allowed.iter().any(|a| a.as_ref() == ext),
        None => false,
    }
}

/// Make an uploaded filename safe to place in the upload directory
///
/// Directory components are dropped, characters outside `[A-Za-z0-9._-]`
/// become `_`, and leading dots or underscores are trimmed.
pub fn secure_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = cleaned.trim_start_matches(['.', '_']);
    if trimmed.is_empty() {
        DEFAULT_UPLOAD_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Session id for an uploaded document: the secured name minus its extension
pub fn session_id_for(filename: &str) -> String {
    let secured = secure_filename(filename);
    match secured.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => secured,
    }
}

/// An uploaded file written to disk for the duration of one request
///
/// The file is removed when the guard is dropped.
#[derive(Debug)]
pub struct TempUpload {
    path: PathBuf,
}

impl TempUpload {
    /// Write `bytes` under `upload_dir` with a unique, sanitized name
    pub async fn write(upload_dir: &Path, filename: &str, bytes: &[u8]) -> Result<Self> {
        let name = format!("{}-{}", Uuid::new_v4(), secure_filename(filename));
        let path = upload_dir.join(name);

        tokio::fs::write(&path, bytes).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "Upload written");

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to remove upload");
        }
    }
}

/// Extract text from a document with extension `ext` (`pdf` or `txt`)
///
/// Failures are logged and yield `None`.
pub fn extract_text(path: &Path, ext: &str) -> Option<String> {
    let result = match ext {
        "pdf" => extract_pdf_text(path),
        _ => std::fs::read_to_string(path).map_err(Into::into),
    };

    match result {
        Ok(text) => {
            debug!(path = %path.display(), characters = text.chars().count(), "Text extracted");
            Some(text)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Text extraction failed");
            None
        }
    }
}

/// Base64 (standard alphabet) encoding of the file at `path`
///
/// Failures are logged and yield `None`.
pub async fn encode_image(path: &Path) -> Option<String> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Some(STANDARD.encode(bytes)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read image");
            None
        }
    }
}
