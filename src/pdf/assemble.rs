//! Multi-image to PDF assembly.
//!
//! Each image is shrunk to fit 800x800, re-encoded as JPEG quality 80 and
//! placed on its own page. A failing image is logged and skipped; the
//! document is finalized once every image has been attempted.

use lopdf::content::Operation;
use lopdf::{dictionary, Object};
use tracing::{debug, warn};

use super::PdfBuilder;
use crate::codec::{self, encode_jpeg};
use crate::error::{AppError, Result};
use crate::models::{ImageToPdfOptions, PdfAssembly, UploadedFile};
use crate::ops::fit_within;

pub const MAX_IMAGE_EDGE: u32 = 800;
pub const PAGE_JPEG_QUALITY: u8 = 80;

#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Where an image lands on its page, in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub page_width: f32,
    pub page_height: f32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

pub fn prepare_image(bytes: &[u8]) -> Result<PreparedImage> {
    let img = codec::decode(bytes)?;
    let fitted = fit_within(&img, MAX_IMAGE_EDGE, MAX_IMAGE_EDGE);
    let jpeg = encode_jpeg(&fitted, PAGE_JPEG_QUALITY)?;
    Ok(PreparedImage {
        jpeg,
        width: fitted.width(),
        height: fitted.height(),
    })
}

/// Page size and centered image rectangle for an image of the given size.
pub fn place_image(width: u32, height: u32, options: &ImageToPdfOptions) -> Placement {
    let (img_w, img_h) = (width as f32, height as f32);
    let (page_width, page_height) = options.page_size.dimensions().unwrap_or((img_w, img_h));

    let (final_w, final_h) = if options.maintain_aspect_ratio {
        let scale = (page_width / img_w).min(page_height / img_h);
        (img_w * scale, img_h * scale)
    } else {
        (page_width, page_height)
    };

    Placement {
        page_width,
        page_height,
        x: (page_width - final_w) / 2.0,
        y: (page_height - final_h) / 2.0,
        width: final_w,
        height: final_h,
    }
}

/// Input order for the assembler: by original file name, case-insensitive.
pub fn sort_uploads(files: &mut [UploadedFile]) {
    files.sort_by(|a, b| {
        a.file_name
            .to_lowercase()
            .cmp(&b.file_name.to_lowercase())
            .then_with(|| a.file_name.cmp(&b.file_name))
    });
}

pub fn assemble(files: &[UploadedFile], options: &ImageToPdfOptions) -> Result<PdfAssembly> {
    let (prepared, skipped) = files.iter().fold(
        (Vec::with_capacity(files.len()), Vec::new()),
        |(mut pages, mut skipped), file| {
            match prepare_image(&file.bytes) {
                Ok(image) => pages.push(image),
                Err(e) => {
                    warn!(file = %file.file_name, error = %e, "skipping image that could not be processed");
                    skipped.push(file.file_name.clone());
                }
            }
            (pages, skipped)
        },
    );

    if prepared.is_empty() {
        return Err(AppError::validation(format!(
            "None of the {} uploaded images could be processed",
            files.len()
        )));
    }

    let mut builder = PdfBuilder::new();
    for image in prepared {
        let placement = place_image(image.width, image.height, options);
        let image_id = builder.add_jpeg(image.jpeg, image.width, image.height);

        let operations = vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    placement.width.into(),
                    Object::Integer(0),
                    Object::Integer(0),
                    placement.height.into(),
                    placement.x.into(),
                    placement.y.into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ];
        let resources = dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        };
        builder.add_page(placement.page_width, placement.page_height, operations, resources)?;
        debug!(page = builder.page_count(), ?placement, "placed image");
    }

    let pages = builder.page_count();
    let pdf = builder.finish("Converted Images")?;
    Ok(PdfAssembly {
        pdf,
        pages,
        skipped,
    })
}
