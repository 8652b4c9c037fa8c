//! PDF text extraction.
//!
//! Uses `lopdf` to parse the document and pull text page by page. Pages that yield no text
//! (scanned images, blank separators) are left out of the joined text but still count toward
//! the page total, so `page_count` always reflects the real document. Text from the remaining
//! pages is not trimmed; a document whose joined text is only whitespace is rejected by the
//! pipeline, not here.

use crate::pipeline::ExtractedText;
use bytes::Bytes;
use lopdf::Document;
use thiserror::Error;

/// Errors produced while turning PDF bytes into text.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Bytes are not a parseable PDF (corrupt, truncated, or another format).
    #[error("Document is not a readable PDF: {0}")]
    Unparseable(String),
    /// PDF is encrypted and cannot be read without a password.
    #[error("Document is encrypted")]
    Encrypted,
    /// The blocking extraction task did not complete.
    #[error("Extraction task failed: {0}")]
    TaskFailed(String),
}

/// Extract text and page statistics from raw PDF bytes.
pub fn extract_text(bytes: &[u8]) -> Result<ExtractedText, ExtractionError> {
    let document =
        Document::load_mem(bytes).map_err(|error| ExtractionError::Unparseable(error.to_string()))?;
    if document.is_encrypted() {
        return Err(ExtractionError::Encrypted);
    }

    let pages = document.get_pages();
    let page_count = pages.len();
    let page_texts = pages.keys().map(|page_number| {
        document
            .extract_text(&[*page_number])
            .unwrap_or_else(|error| {
                tracing::debug!(page = page_number, error = %error, "Failed to extract page text");
                String::new()
            })
    });
    let text = join_pages(page_texts);
    let char_count = text.chars().count();
    tracing::debug!(page_count, char_count, "Extracted PDF text");
    Ok(ExtractedText {
        text,
        page_count,
        char_count,
    })
}

/// Join page texts with a single space, leaving out pages that produced no text at all.
///
/// Page text is kept exactly as extracted, surrounding whitespace included, so `char_count`
/// measures what the model receives.
fn join_pages(pages: impl IntoIterator<Item = String>) -> String {
    pages
        .into_iter()
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run [`extract_text`] on the blocking pool so parsing never stalls the async runtime.
pub async fn extract_text_blocking(bytes: Bytes) -> Result<ExtractedText, ExtractionError> {
    tokio::task::spawn_blocking(move || extract_text(&bytes))
        .await
        .map_err(|error| ExtractionError::TaskFailed(error.to_string()))?
}

#[cfg(test)]
#[path = "../tests/common/mod.rs"]
pub(crate) mod fixtures;
