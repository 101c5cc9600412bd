//! Text extraction for uploaded files.
//!
//! Extraction is a capability the engine does not own: richer extractors
//! (PDF, office formats) plug in through [`TextExtractor`]. The bundled
//! [`PlainTextExtractor`] decodes UTF-8 text.

use crate::error::{DocSearchError, Result};

/// Turns raw file bytes into indexable text.
pub trait TextExtractor: Send + Sync {
    /// Extracts text from `bytes`. `filename` is a hint for format detection.
    ///
    /// # Errors
    ///
    /// `DocSearchError::Extraction` if the file yields no usable text.
    fn extract(&self, filename: &str, bytes: &[u8]) -> Result<String>;
}

/// Decodes bytes as UTF-8 (lossily) and removes line breaks.
///
/// Invalid sequences become U+FFFD rather than failing the upload.
/// Whitespace-only output counts as empty.
///
/// ```rust
/// use docsearch::extract::{PlainTextExtractor, TextExtractor};
///
/// let text = PlainTextExtractor.extract("a.txt", b"hello\nworld\n").unwrap();
/// assert_eq!(text, "helloworld");
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, filename: &str, bytes: &[u8]) -> Result<String> {
        let text = strip_newlines(&String::from_utf8_lossy(bytes));
        if text.trim().is_empty() {
            return Err(DocSearchError::extraction(format!(
                "no text in '{}'",
                filename
            )));
        }
        Ok(text)
    }
}

/// Removes `\n` characters, joining lines without a separator.
///
/// Carriage returns are kept.
pub fn strip_newlines(text: &str) -> String {
    text.replace('\n', "")
}
