use axum::body::Bytes;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Unsupported file type: {0}")]
    Unsupported(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("File contains no text")]
    Empty,
}

/// A file received in a multipart upload
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Outcome of extracting one uploaded file; `text` is `None` on failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileText {
    pub name: String,
    pub text: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
enum FileKind {
    Pdf,
    Text,
    Other(String),
}

const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "markdown", "csv", "json", "html", "htm", "xml"];

fn detect_kind(file: &UploadedFile) -> FileKind {
    let content_type = file
        .content_type
        .as_deref()
        .unwrap_or("")
        .to_ascii_lowercase();
    let extension = Path::new(&file.file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    if content_type == "application/pdf" || extension == "pdf" || file.bytes.starts_with(b"%PDF") {
        FileKind::Pdf
    } else if content_type.starts_with("text/")
        || content_type == "application/json"
        || TEXT_EXTENSIONS.contains(&extension.as_str())
    {
        FileKind::Text
    } else if !content_type.is_empty() {
        FileKind::Other(content_type)
    } else {
        FileKind::Other(format!(".{}", extension))
    }
}

/// Extracts the text content of an uploaded document
pub async fn extract_text(file: &UploadedFile) -> Result<String, ExtractionError> {
    let text = match detect_kind(file) {
        FileKind::Pdf => {
            let bytes = file.bytes.clone();
            // pdf-extract is CPU-bound and may panic on malformed input
            tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
                .await
                .map_err(|e| ExtractionError::Pdf(e.to_string()))?
                .map_err(|e| ExtractionError::Pdf(e.to_string()))?
        }
        FileKind::Text => String::from_utf8_lossy(&file.bytes).into_owned(),
        FileKind::Other(kind) => return Err(ExtractionError::Unsupported(kind)),
    };

    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(ExtractionError::Empty);
    }
    Ok(text)
}

/// Extracts every file, recording failures instead of returning them
pub async fn extract_all(files: &[UploadedFile]) -> Vec<FileText> {
    let mut results = Vec::with_capacity(files.len());
    for file in files {
        let text = match extract_text(file).await {
            Ok(text) => {
                debug!(file = %file.file_name, chars = text.chars().count(), "Extracted file text");
                Some(text)
            }
            Err(e) => {
                warn!(file = %file.file_name, error = %e, "Could not extract file text");
                None
            }
        };
        results.push(FileText {
            name: file.file_name.clone(),
            text,
        });
    }
    results
}
