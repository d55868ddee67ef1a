//! Plain-text extraction from uploaded documents.

use std::path::Path;

/// File extensions accepted for upload
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["txt", "md", "pdf"];

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("unsupported file type: {0}")]
    Unsupported(String),

    #[error("failed to read PDF: {0}")]
    Pdf(String),

    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),
}

pub fn is_supported_extension(extension: &str) -> bool {
    SUPPORTED_EXTENSIONS.contains(&extension)
}

/// Extract text content from a file based on its extension.
///
/// `.txt` and `.md` are read as UTF-8 — markdown markup survives here and is
/// handled by the normalizer. `.pdf` goes through pdf-extract.
pub fn extract_text(path: &Path) -> Result<String, ExtractError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "txt" | "md" => Ok(std::fs::read_to_string(path)?),
        "pdf" => pdf_extract::extract_text(path).map_err(|e| ExtractError::Pdf(e.to_string())),
        other => Err(ExtractError::Unsupported(format!(".{other}"))),
    }
}
