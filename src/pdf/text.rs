use lopdf::Document;
use tracing::debug;

use crate::error::{AppError, Result};

/// Extract the text layer of every page, in page order.
///
/// Fails with a client error when the bytes are not a PDF or when no page
/// yields any non-whitespace text (scanned documents, for instance).
pub fn extract_text(pdf: &[u8]) -> Result<String> {
    let doc = Document::load_mem(pdf).map_err(|e| {
        debug!(error = %e, "rejecting unparsable PDF");
        AppError::validation("Invalid PDF file")
    })?;

    let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
    if page_numbers.is_empty() {
        return Err(AppError::validation("No text content found in PDF"));
    }

    let text = doc.extract_text(&page_numbers)?;
    if text.trim().is_empty() {
        return Err(AppError::validation("No text content found in PDF"));
    }
    debug!(pages = page_numbers.len(), chars = text.len(), "extracted PDF text");
    Ok(text)
}

/// Lines worth turning into paragraphs: trimmed, blank ones dropped.
pub fn text_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_is_invalid_pdf() {
        let err = extract_text(b"definitely not a pdf").unwrap_err();
        assert!(err.is_client_error());
        assert_eq!(err.to_string(), "Invalid PDF file");
    }

    #[test]
    fn blank_lines_are_dropped() {
        let lines = text_lines("  Heading \n\n   \nbody text\n");
        assert_eq!(lines, vec!["Heading".to_string(), "body text".to_string()]);
    }
}
