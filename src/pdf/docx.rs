//! Minimal WordprocessingML support.
//!
//! Reading keeps only what the PDF renderer lays out: paragraphs with their
//! style, tabs, breaks and table rows. Writing produces the smallest package
//! Word accepts: content types, package relationships and the main part.

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::archive::{read_entry_to_string, zip_entries};
use crate::error::{AppError, Result};

const MAIN_PART: &str = "word/document.xml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParagraphStyle {
    Title,
    Subtitle,
    /// Heading level 1 to 6.
    Heading(u8),
    Normal,
    TableRow,
}

impl ParagraphStyle {
    /// Map a `w:pStyle` value such as `Heading2` or `heading 2`.
    pub fn from_style_id(id: &str) -> Self {
        let normalized: String = id
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "title" => Self::Title,
            "subtitle" => Self::Subtitle,
            other => other
                .strip_prefix("heading")
                .and_then(|level| level.parse::<u8>().ok())
                .filter(|level| (1..=6).contains(level))
                .map(Self::Heading)
                .unwrap_or(Self::Normal),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paragraph {
    pub style: ParagraphStyle,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocxDocument {
    pub paragraphs: Vec<Paragraph>,
}

/// Parse the body of a `.docx` package.
pub fn read_docx(bytes: &[u8]) -> Result<DocxDocument> {
    let xml = read_entry_to_string(bytes, MAIN_PART)?;
    parse_document_xml(&xml)
}

#[derive(Default)]
struct BodyState {
    paragraphs: Vec<Paragraph>,
    style: Option<ParagraphStyle>,
    text: String,
    in_text: bool,
    table_depth: usize,
    cells: Vec<String>,
}

impl BodyState {
    fn end_paragraph(&mut self) {
        let text = std::mem::take(&mut self.text);
        let style = self.style.take().unwrap_or(ParagraphStyle::Normal);
        if self.table_depth > 0 {
            // cell paragraphs are joined when the cell closes
            if let Some(cell) = self.cells.last_mut() {
                if !cell.is_empty() && !text.is_empty() {
                    cell.push(' ');
                }
                cell.push_str(&text);
            }
            return;
        }
        self.paragraphs.push(Paragraph { style, text });
    }

    fn end_row(&mut self) {
        let cells = std::mem::take(&mut self.cells);
        let text = cells
            .iter()
            .map(|c| c.trim())
            .collect::<Vec<_>>()
            .join(" | ");
        if !text.trim_matches(|c| c == ' ' || c == '|').is_empty() {
            self.paragraphs.push(Paragraph {
                style: ParagraphStyle::TableRow,
                text,
            });
        }
    }

    fn start(&mut self, e: &BytesStart<'_>) -> Result<()> {
        match e.local_name().as_ref() {
            b"p" => {
                self.style = None;
                self.text.clear();
            }
            b"t" => self.in_text = true,
            b"tbl" => self.table_depth += 1,
            b"tr" => self.cells.clear(),
            b"tc" => self.cells.push(String::new()),
            _ => self.empty(e)?,
        }
        Ok(())
    }

    fn empty(&mut self, e: &BytesStart<'_>) -> Result<()> {
        match e.local_name().as_ref() {
            b"p" => {
                self.style = None;
                self.text.clear();
                self.end_paragraph();
            }
            b"pStyle" => {
                if let Some(value) = attribute(e, b"val")? {
                    self.style = Some(ParagraphStyle::from_style_id(&value));
                }
            }
            b"tab" => self.text.push('\t'),
            b"br" | b"cr" => self.text.push('\n'),
            _ => {}
        }
        Ok(())
    }

    fn end(&mut self, local_name: &[u8]) {
        match local_name {
            b"t" => self.in_text = false,
            b"p" => self.end_paragraph(),
            b"tr" => self.end_row(),
            b"tbl" => self.table_depth = self.table_depth.saturating_sub(1),
            _ => {}
        }
    }
}

fn attribute(e: &BytesStart<'_>, local: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.local_name().as_ref() == local {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

pub fn parse_document_xml(xml: &str) -> Result<DocxDocument> {
    let mut reader = Reader::from_str(xml);
    let mut state = BodyState::default();
    let mut saw_body = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if e.local_name().as_ref() == b"body" {
                    saw_body = true;
                }
                state.start(&e)?;
            }
            Event::Empty(e) => state.empty(&e)?,
            Event::Text(t) if state.in_text => state.text.push_str(&t.unescape()?),
            Event::CData(t) if state.in_text => {
                state.text.push_str(&String::from_utf8_lossy(&t.into_inner()))
            }
            Event::End(e) => state.end(e.local_name().as_ref()),
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_body {
        return Err(AppError::upstream("docx", "document part has no body"));
    }
    Ok(DocxDocument {
        paragraphs: state.paragraphs,
    })
}

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

// A4 portrait in twentieths of a point, one-inch margins.
const SECTION_PROPERTIES: &str = r#"<w:sectPr><w:pgSz w:w="11906" w:h="16838"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="708" w:footer="708" w:gutter="0"/></w:sectPr>"#;

/// XML 1.0 rejects most C0 controls even when escaped.
fn xml_safe(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || *c == '\t')
        .collect()
}

pub fn document_xml<S: AsRef<str>>(lines: &[S]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#,
    );
    for line in lines {
        let safe = xml_safe(line.as_ref());
        xml.push_str(r#"<w:p><w:r><w:t xml:space="preserve">"#);
        xml.push_str(&escape(safe.as_str()));
        xml.push_str("</w:t></w:r></w:p>");
    }
    xml.push_str(SECTION_PROPERTIES);
    xml.push_str("</w:body></w:document>");
    xml
}

/// Build a `.docx` with one plain paragraph per line.
pub fn write_docx<S: AsRef<str>>(lines: &[S]) -> Result<Vec<u8>> {
    zip_entries(vec![
        ("[Content_Types].xml", CONTENT_TYPES.as_bytes().to_vec()),
        ("_rels/.rels", PACKAGE_RELS.as_bytes().to_vec()),
        (MAIN_PART, document_xml(lines).into_bytes()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:body>
  <w:p><w:pPr><w:pStyle w:val="Title"/></w:pPr><w:r><w:t>Quarterly report</w:t></w:r></w:p>
  <w:p><w:pPr><w:pStyle w:val="Heading2"/></w:pPr><w:r><w:t>Numbers</w:t></w:r></w:p>
  <w:p><w:r><w:t xml:space="preserve">Revenue &amp; costs</w:t><w:tab/><w:t>up</w:t><w:br/><w:t>next line</w:t></w:r></w:p>
  <w:tbl>
    <w:tr><w:tc><w:p><w:r><w:t>Q1</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>10</w:t></w:r></w:p></w:tc></w:tr>
  </w:tbl>
  <w:p/>
</w:body>
</w:document>"#;

    #[test]
    fn style_ids_map_to_headings() {
        assert_eq!(ParagraphStyle::from_style_id("Heading1"), ParagraphStyle::Heading(1));
        assert_eq!(ParagraphStyle::from_style_id("heading 6"), ParagraphStyle::Heading(6));
        assert_eq!(ParagraphStyle::from_style_id("Heading7"), ParagraphStyle::Normal);
        assert_eq!(ParagraphStyle::from_style_id("Subtitle"), ParagraphStyle::Subtitle);
        assert_eq!(ParagraphStyle::from_style_id("ListParagraph"), ParagraphStyle::Normal);
    }

    #[test]
    fn parses_styles_runs_and_tables() {
        let doc = parse_document_xml(SAMPLE).unwrap();
        let paragraphs = &doc.paragraphs;
        assert_eq!(paragraphs[0].style, ParagraphStyle::Title);
        assert_eq!(paragraphs[0].text, "Quarterly report");
        assert_eq!(paragraphs[1].style, ParagraphStyle::Heading(2));
        assert_eq!(paragraphs[2].text, "Revenue & costs\tup\nnext line");
        assert_eq!(paragraphs[3].style, ParagraphStyle::TableRow);
        assert_eq!(paragraphs[3].text, "Q1 | 10");
        // the self-closing <w:p/> is an empty paragraph
        assert_eq!(paragraphs[4].text, "");
        assert_eq!(paragraphs.len(), 5);
    }

    #[test]
    fn missing_body_is_rejected() {
        assert!(parse_document_xml("<root/>").is_err());
    }

    #[test]
    fn written_package_reads_back() {
        let lines = vec!["First <line>".to_string(), "Second & last\u{1}".to_string()];
        let docx = write_docx(&lines).unwrap();
        assert_eq!(&docx[0..2], b"PK");

        let doc = read_docx(&docx).unwrap();
        let texts: Vec<_> = doc.paragraphs.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["First <line>", "Second & last"]);
        assert!(doc
            .paragraphs
            .iter()
            .all(|p| p.style == ParagraphStyle::Normal));
    }
}
