//! Text extraction seam for file-based indexing.
//!
//! The index core only consumes strings; turning file bytes into text is the
//! surrounding application's job. `TextExtractor` is that boundary, and
//! `PlainTextExtractor` covers the plain-text formats this binary handles
//! itself. Binary formats (PDF, DOCX) plug in behind the same trait.

/// Error type for text extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("unsupported content type: {0}")]
    UnsupportedMime(String),

    #[error("file is not valid UTF-8: {0}")]
    InvalidEncoding(#[from] std::str::Utf8Error),
}

/// Produces indexable text from a file's bytes and MIME type.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8], mime: &str) -> Result<String, ExtractError>;
}

/// Extractor for `text/*` content.
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, bytes: &[u8], mime: &str) -> Result<String, ExtractError> {
        if !mime.starts_with("text/") {
            return Err(ExtractError::UnsupportedMime(mime.to_string()));
        }

        let text = std::str::from_utf8(bytes)?;
        Ok(text.to_string())
    }
}
