//! PDF and Word document handling.
//!
//! - [`assemble`]: images to a paged PDF
//! - [`text`]: text extraction from PDFs
//! - [`docx`]: reading and writing WordprocessingML packages
//! - [`render`]: laying a parsed Word document out as PDF pages
//! - [`raster`]: rasterising PDF pages through pdfium

pub mod assemble;
pub mod docx;
pub mod raster;
pub mod render;
pub mod text;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use crate::error::{AppError, Result};

/// Incrementally builds a PDF with one `Pages` tree.
pub(crate) struct PdfBuilder {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    pub fn add_object(&mut self, object: impl Into<Object>) -> ObjectId {
        self.doc.add_object(object)
    }

    /// Embed baseline JPEG bytes as an image XObject without re-compressing.
    pub fn add_jpeg(&mut self, jpeg: Vec<u8>, width: u32, height: u32) -> ObjectId {
        let dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        };
        self.doc
            .add_object(Stream::new(dict, jpeg).with_compression(false))
    }

    pub fn add_page(
        &mut self,
        width: f32,
        height: f32,
        operations: Vec<Operation>,
        resources: Dictionary,
    ) -> Result<()> {
        let content = Content { operations };
        let encoded = content
            .encode()
            .map_err(|e| AppError::upstream("pdf", format!("failed to encode page content: {e}")))?;
        let content_id = self.doc.add_object(Stream::new(Dictionary::new(), encoded));

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(width),
                Object::Real(height),
            ],
            "Contents" => content_id,
            "Resources" => resources,
        });
        self.kids.push(page_id.into());
        Ok(())
    }

    pub fn finish(mut self, title: &str) -> Result<Vec<u8>> {
        let count = self.kids.len() as i64;
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => self.kids,
            "Count" => count,
        };
        self.doc
            .objects
            .insert(self.pages_id, Object::Dictionary(pages));

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        let info_id = self.doc.add_object(dictionary! {
            "Title" => Object::string_literal(title),
            "Author" => Object::string_literal("PDF Converter Service"),
            "Producer" => Object::string_literal(concat!("media-ops-service ", env!("CARGO_PKG_VERSION"))),
            "CreationDate" => Object::string_literal(pdf_timestamp()),
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.trailer.set("Info", info_id);

        self.doc.compress();

        let mut out = Vec::new();
        self.doc
            .save_to(&mut out)
            .map_err(|e| AppError::upstream("pdf", format!("failed to write document: {e}")))?;
        Ok(out)
    }
}

fn pdf_timestamp() -> String {
    chrono::Utc::now().format("D:%Y%m%d%H%M%SZ").to_string()
}

/// Points per millimetre.
pub const MM: f32 = 72.0 / 25.4;

/// A4 portrait in points.
pub const A4: (f32, f32) = (595.28, 841.89);
