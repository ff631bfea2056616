//! Documents selected for upload and the local checks run before sending them

use std::path::Path;

use tokio::io::AsyncReadExt;

use crate::error::{Result, ValidationError};

/// Upload ceiling: 10 MiB
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Accepted extensions, lowercase with leading dot
pub const ALLOWED_EXTENSIONS: &[&str] = &[".txt", ".pdf"];

/// MIME types the server expects. Only advisory.
pub const ALLOWED_MIME_TYPES: &[&str] = &["text/plain", "application/pdf"];

/// A document held in memory, ready to be validated and uploaded
#[derive(Debug, Clone)]
pub struct DocumentFile {
    pub name: String,
    pub bytes: Vec<u8>,
    /// Declared MIME type; empty or `None` when unknown
    pub mime_type: Option<String>,
}

impl DocumentFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let mime_type = mime_for_name(&name).map(str::to_string);
        Self {
            name,
            bytes,
            mime_type,
        }
    }

    /// Override the declared MIME type
    pub fn with_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = Some(mime.into());
        self
    }

    /// Read a document from disk.
    ///
    /// Files over [`MAX_FILE_SIZE`] fail with `TooLarge` without being buffered.
    /// Reads stop one byte past the ceiling, which also bounds sources whose
    /// metadata reports no length.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path).await?;
        let declared = file.metadata().await?.len();
        if declared > MAX_FILE_SIZE {
            return Err(too_large(declared).into());
        }

        let mut bytes = Vec::with_capacity(declared as usize);
        file.take(MAX_FILE_SIZE + 1).read_to_end(&mut bytes).await?;
        if bytes.len() as u64 > MAX_FILE_SIZE {
            return Err(too_large(bytes.len() as u64).into());
        }
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document")
            .to_string();
        Ok(Self::new(name, bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Lowercased extension including the dot, or `None` when the name has no dot
    pub fn extension(&self) -> Option<String> {
        self.name
            .rfind('.')
            .map(|idx| self.name[idx..].to_lowercase())
    }

    /// MIME type sent with the multipart part
    pub fn content_type(&self) -> &str {
        match self.mime_type.as_deref() {
            Some(m) if !m.is_empty() => m,
            _ => "application/octet-stream",
        }
    }
}

fn too_large(size: u64) -> ValidationError {
    ValidationError::TooLarge {
        size,
        limit: MAX_FILE_SIZE,
    }
}

fn mime_for_name(name: &str) -> Option<&'static str> {
    let lower = name.to_lowercase();
    if lower.ends_with(".txt") {
        Some("text/plain")
    } else if lower.ends_with(".pdf") {
        Some("application/pdf")
    } else {
        None
    }
}

/// Check size and extension. A MIME mismatch only logs a warning, since declared
/// types are unreliable.
pub fn validate(file: &DocumentFile) -> std::result::Result<(), ValidationError> {
    let size = file.size();
    if size > MAX_FILE_SIZE {
        return Err(too_large(size));
    }

    let extension = file.extension().unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ValidationError::UnsupportedType { extension });
    }

    let mime = file.mime_type.as_deref().unwrap_or("");
    if !mime.is_empty() && !ALLOWED_MIME_TYPES.contains(&mime) {
        tracing::warn!(
            file = %file.name,
            mime,
            "MIME type check failed, proceeding based on extension"
        );
    }

    Ok(())
}

/// Human-readable byte count: "0 Bytes", "1.5 KB", "10 MB"
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = format!("{:.2}", value);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[unit])
}
