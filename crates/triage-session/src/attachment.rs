//! The at-most-one document staged for the next diagnosis turn.

use std::path::Path;

use triage_core::config::AttachmentConfig;
use triage_core::error::TriageError;
use triage_core::types::{Attachment, PDF_MIME};

/// Leading bytes of every PDF document.
const PDF_MAGIC: &[u8] = b"%PDF-";

/// Holds the staged attachment and enforces the PDF-only, size-bounded rule.
///
/// A rejected file never replaces the one already staged.
#[derive(Debug, Clone)]
pub struct AttachmentManager {
    current: Option<Attachment>,
    max_size_bytes: u64,
}

impl Default for AttachmentManager {
    fn default() -> Self {
        Self::new(&AttachmentConfig::default())
    }
}

impl AttachmentManager {
    pub fn new(config: &AttachmentConfig) -> Self {
        Self {
            current: None,
            max_size_bytes: config.max_size_bytes,
        }
    }

    pub fn current(&self) -> Option<&Attachment> {
        self.current.as_ref()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.current.as_ref().map(|a| a.file_name.as_str())
    }

    pub fn is_set(&self) -> bool {
        self.current.is_some()
    }

    /// Stage `attachment`, replacing any previous one.
    pub fn set_file(&mut self, attachment: Attachment) -> Result<(), TriageError> {
        if attachment.mime_type != PDF_MIME {
            return Err(TriageError::AttachmentRejected(format!(
                "{} is not a PDF ({})",
                attachment.file_name, attachment.mime_type
            )));
        }
        if attachment.size() as u64 > self.max_size_bytes {
            return Err(TriageError::AttachmentRejected(format!(
                "{} is {} bytes, the limit is {}",
                attachment.file_name,
                attachment.size(),
                self.max_size_bytes
            )));
        }
        tracing::info!(
            file_name = %attachment.file_name,
            size = attachment.size(),
            "Attachment staged"
        );
        self.current = Some(attachment);
        Ok(())
    }

    /// Read a file from disk and stage it.
    pub async fn load(&mut self, path: &Path) -> Result<(), TriageError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let mime_type = infer_mime(path, &bytes);
        self.set_file(Attachment::new(file_name, mime_type, bytes))
    }

    pub fn clear(&mut self) {
        if let Some(previous) = self.current.take() {
            tracing::debug!(file_name = %previous.file_name, "Attachment cleared");
        }
    }

    /// Remove and return the staged attachment.
    pub fn take(&mut self) -> Option<Attachment> {
        self.current.take()
    }
}

/// Mime type of a file on disk. Only a `.pdf` file that starts with the PDF
/// header counts as a PDF.
pub fn infer_mime(path: &Path, bytes: &[u8]) -> &'static str {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "pdf" if bytes.starts_with(PDF_MAGIC) => PDF_MIME,
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "txt" => "text/plain",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}

// =============================================================================
// Tests
// =============================================================================
