//! Lays a parsed Word document out on A4 pages.
//!
//! Text is set in the standard Helvetica faces, so nothing is embedded.
//! Line widths are estimated from average glyph widths, which is close
//! enough for wrapping body text.

use lopdf::content::Operation;
use lopdf::{dictionary, Dictionary, Object, ObjectId, StringFormat};
use tracing::debug;

use super::docx::{DocxDocument, ParagraphStyle};
use super::{PdfBuilder, A4, MM};
use crate::error::Result;

const MARGIN: f32 = 25.4 * MM;
const BODY_SIZE: f32 = 11.0;
const LINE_SPACING: f32 = 1.2;
const TAB: &str = "    ";

#[derive(Debug, Clone, Copy, PartialEq)]
struct TextStyle {
    size: f32,
    bold: bool,
    centered: bool,
    space_before: f32,
    space_after: f32,
}

fn text_style(style: ParagraphStyle) -> TextStyle {
    let heading = |size: f32, space_before: f32| TextStyle {
        size,
        bold: true,
        centered: false,
        space_before,
        space_after: 4.0,
    };
    match style {
        ParagraphStyle::Title => TextStyle {
            size: 26.0,
            bold: true,
            centered: true,
            space_before: 0.0,
            space_after: 12.0,
        },
        ParagraphStyle::Subtitle => TextStyle {
            size: 18.0,
            bold: false,
            centered: true,
            space_before: 0.0,
            space_after: 10.0,
        },
        ParagraphStyle::Heading(1) => heading(16.0, 12.0),
        ParagraphStyle::Heading(2) => heading(14.0, 10.0),
        ParagraphStyle::Heading(3) => heading(13.0, 8.0),
        ParagraphStyle::Heading(4) => heading(12.0, 8.0),
        ParagraphStyle::Heading(_) => heading(11.0, 6.0),
        ParagraphStyle::Normal | ParagraphStyle::TableRow => TextStyle {
            size: BODY_SIZE,
            bold: false,
            centered: false,
            space_before: 0.0,
            space_after: 6.0,
        },
    }
}

/// Approximate advance width of `text` in points.
fn text_width(text: &str, size: f32, bold: bool) -> f32 {
    let em: f32 = text
        .chars()
        .map(|c| match c {
            ' ' | 'i' | 'j' | 'l' | 'I' | '.' | ',' | ':' | ';' | '\'' | '!' | '|' => 0.278,
            'f' | 't' | 'r' | '(' | ')' | '-' => 0.333,
            'm' | 'w' | 'M' | 'W' => 0.833,
            c if c.is_ascii_uppercase() => 0.667,
            _ => 0.556,
        })
        .sum();
    let em = if bold { em * 1.05 } else { em };
    em * size
}

/// Greedy word wrap. Words wider than the line are broken by character.
fn wrap(text: &str, size: f32, bold: bool, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split(' ') {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if text_width(&candidate, size, bold) <= max_width {
            current = candidate;
            continue;
        }
        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        let mut piece = String::new();
        for c in word.chars() {
            piece.push(c);
            if text_width(&piece, size, bold) > max_width && piece.chars().count() > 1 {
                piece.pop();
                lines.push(std::mem::take(&mut piece));
                piece.push(c);
            }
        }
        current = piece;
    }
    lines.push(current);
    lines
}

/// Encode for the WinAnsi base fonts; unmappable characters become `?`.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\u{20AC}' => 0x80,
            '\u{2026}' => 0x85,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            c if (' '..='~').contains(&c) || ('\u{A0}'..='\u{FF}').contains(&c) => c as u8,
            _ => b'?',
        })
        .collect()
}

struct Layout {
    pages: Vec<Vec<Operation>>,
    current: Vec<Operation>,
    y: f32,
}

impl Layout {
    fn new() -> Self {
        Self {
            pages: Vec::new(),
            current: Vec::new(),
            y: A4.1 - MARGIN,
        }
    }

    fn break_page(&mut self) {
        self.pages.push(std::mem::take(&mut self.current));
        self.y = A4.1 - MARGIN;
    }

    fn at_top(&self) -> bool {
        self.current.is_empty()
    }

    fn advance(&mut self, amount: f32) {
        if self.y - amount < MARGIN {
            self.break_page();
        } else {
            self.y -= amount;
        }
    }

    fn line(&mut self, text: &str, style: &TextStyle) {
        let height = style.size * LINE_SPACING;
        if self.y - height < MARGIN {
            self.break_page();
        }
        self.y -= height;
        if text.trim().is_empty() {
            return;
        }

        let width = text_width(text, style.size, style.bold);
        let x = if style.centered {
            ((A4.0 - width) / 2.0).max(MARGIN)
        } else {
            MARGIN
        };
        let font = if style.bold { "F2" } else { "F1" };
        // baseline sits a little above the bottom of the line box
        let baseline = self.y + style.size * (LINE_SPACING - 1.0);

        self.current.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(font.as_bytes().to_vec()), style.size.into()]),
            Operation::new("Td", vec![x.into(), baseline.into()]),
            Operation::new(
                "Tj",
                vec![Object::String(win_ansi(text), StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
        ]);
    }

    fn finish(mut self) -> Vec<Vec<Operation>> {
        if !self.current.is_empty() || self.pages.is_empty() {
            self.pages.push(self.current);
        }
        self.pages
    }
}

fn font(builder: &mut PdfBuilder, base: &str) -> ObjectId {
    builder.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base,
        "Encoding" => "WinAnsiEncoding",
    })
}

/// Page-by-page content operations for `doc`. Always at least one page.
fn layout(doc: &DocxDocument) -> Vec<Vec<Operation>> {
    let max_width = A4.0 - 2.0 * MARGIN;
    let mut layout = Layout::new();

    for paragraph in &doc.paragraphs {
        let style = text_style(paragraph.style);
        if !layout.at_top() {
            layout.advance(style.space_before);
        }
        for hard_line in paragraph.text.replace('\t', TAB).split('\n') {
            for line in wrap(hard_line, style.size, style.bold, max_width) {
                layout.line(&line, &style);
            }
        }
        layout.advance(style.space_after);
    }
    layout.finish()
}

pub fn render_pdf(doc: &DocxDocument) -> Result<Vec<u8>> {
    let pages = layout(doc);
    let mut builder = PdfBuilder::new();
    let regular = font(&mut builder, "Helvetica");
    let bold = font(&mut builder, "Helvetica-Bold");

    for operations in pages {
        let resources: Dictionary = dictionary! {
            "Font" => dictionary! { "F1" => regular, "F2" => bold },
        };
        builder.add_page(A4.0, A4.1, operations, resources)?;
    }
    debug!(
        paragraphs = doc.paragraphs.len(),
        pages = builder.page_count(),
        "rendered document"
    );
    builder.finish("Converted Document")
}
