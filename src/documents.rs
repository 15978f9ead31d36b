use tracing::info;

use crate::archive::zip_entries;
use crate::config::PdfiumConfig;
use crate::error::{AppError, Result};
use crate::pdf::{docx, raster, render, text};
use crate::scratch::ScratchDir;
use crate::utils::is_pdf;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// PDF and Word conversions. Each call stages its output in a scratch
/// directory that is removed when the call returns.
#[derive(Debug, Clone, Default)]
pub struct DocumentService {
    pdfium: PdfiumConfig,
}

impl DocumentService {
    pub fn new(pdfium: PdfiumConfig) -> Self {
        Self { pdfium }
    }

    pub async fn pdf_to_word(&self, pdf: Vec<u8>) -> Result<Vec<u8>> {
        tokio::task::spawn_blocking(move || pdf_to_word_blocking(&pdf)).await?
    }

    pub async fn word_to_pdf(&self, document: Vec<u8>) -> Result<Vec<u8>> {
        tokio::task::spawn_blocking(move || word_to_pdf_blocking(&document)).await?
    }

    pub async fn split_pdf(&self, pdf: Vec<u8>) -> Result<Vec<u8>> {
        let pdfium = self.pdfium.clone();
        tokio::task::spawn_blocking(move || split_pdf_blocking(&pdfium, &pdf)).await?
    }
}

pub fn pdf_to_word_blocking(pdf: &[u8]) -> Result<Vec<u8>> {
    let content = text::extract_text(pdf)?;
    let lines = text::text_lines(&content);
    let scratch = ScratchDir::new("pdf-to-word")?;
    scratch.write("document.docx", &docx::write_docx(&lines)?)?;
    let out = scratch.read("document.docx")?;
    info!(paragraphs = lines.len(), size = out.len(), "converted PDF to Word");
    Ok(out)
}

pub fn word_to_pdf_blocking(document: &[u8]) -> Result<Vec<u8>> {
    if !document.starts_with(ZIP_MAGIC) {
        return Err(AppError::validation("Invalid Word document"));
    }
    let parsed = docx::read_docx(document)?;
    let scratch = ScratchDir::new("word-to-pdf")?;
    scratch.write("document.pdf", &render::render_pdf(&parsed)?)?;
    let out = scratch.read("document.pdf")?;
    info!(paragraphs = parsed.paragraphs.len(), size = out.len(), "converted Word to PDF");
    Ok(out)
}

pub fn split_pdf_blocking(pdfium: &PdfiumConfig, pdf: &[u8]) -> Result<Vec<u8>> {
    if !is_pdf(pdf) {
        return Err(AppError::validation("Invalid PDF file"));
    }
    let scratch = ScratchDir::new("split-pdf")?;
    let input = scratch.write("input.pdf", pdf)?;

    let pages = raster::render_pages_to_jpeg(pdfium, &input)?;
    let mut entries = Vec::with_capacity(pages.len());
    for (index, jpeg) in pages.iter().enumerate() {
        let name = format!("page_{}.jpg", index + 1);
        scratch.write(&name, jpeg)?;
        entries.push((name.clone(), scratch.read(&name)?));
    }
    info!(pages = entries.len(), "split PDF into images");
    zip_entries(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::docx::{ParagraphStyle, DocxDocument, Paragraph};

    #[test]
    fn word_round_trip_keeps_text() {
        let doc = DocxDocument {
            paragraphs: vec![Paragraph {
                style: ParagraphStyle::Heading(1),
                text: "Release notes".into(),
            }],
        };
        let pdf = render::render_pdf(&doc).unwrap();
        let word = pdf_to_word_blocking(&pdf).unwrap();
        let back = docx::read_docx(&word).unwrap();
        assert!(back
            .paragraphs
            .iter()
            .any(|p| p.text.contains("Release notes")));
    }

    #[test]
    fn non_zip_upload_is_not_a_word_document() {
        let err = word_to_pdf_blocking(b"%PDF-1.4").unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn split_rejects_non_pdf_before_touching_pdfium() {
        let err = split_pdf_blocking(&PdfiumConfig::default(), b"PK\x03\x04").unwrap_err();
        assert_eq!(err.to_string(), "Invalid PDF file");
    }

    #[test]
    fn word_to_pdf_renders_pages() {
        let word = docx::write_docx(&["one", "two"]).unwrap();
        let pdf = word_to_pdf_blocking(&word).unwrap();
        assert!(is_pdf(&pdf));
    }
}
