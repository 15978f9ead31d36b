//! PDF page rasterisation through pdfium.
//!
//! pdfium loads from a path, so callers stage the PDF in a scratch directory
//! first. Everything here is blocking.

use std::path::Path;

use pdfium_render::prelude::*;
use tracing::{debug, info};

use crate::codec::encode_jpeg;
use crate::config::PdfiumConfig;
use crate::error::{AppError, Result};

pub const RENDER_WIDTH: i32 = 1600;
pub const RENDER_MAX_HEIGHT: i32 = 2400;
pub const PAGE_JPEG_QUALITY: u8 = 100;

/// Bind to the configured pdfium library, falling back to the system one.
pub fn bind(config: &PdfiumConfig) -> Result<Pdfium> {
    let bindings = match &config.library_path {
        Some(path) if path.is_dir() => {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(path))
        }
        Some(path) => Pdfium::bind_to_library(path),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| AppError::upstream("pdfium", format!("failed to bind library: {e:?}")))?;
    Ok(Pdfium::new(bindings))
}

/// Render every page of the PDF at `pdf_path` as a JPEG, in page order.
pub fn render_pages_to_jpeg(config: &PdfiumConfig, pdf_path: &Path) -> Result<Vec<Vec<u8>>> {
    let pdfium = bind(config)?;
    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| AppError::upstream("pdfium", format!("failed to open PDF: {e:?}")))?;

    let render_config = PdfRenderConfig::new()
        .set_target_width(RENDER_WIDTH)
        .set_maximum_height(RENDER_MAX_HEIGHT);

    let pages = document.pages();
    info!(pages = pages.len(), "rasterising PDF");

    let mut rendered = Vec::with_capacity(pages.len() as usize);
    for (index, page) in pages.iter().enumerate() {
        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            AppError::upstream("pdfium", format!("failed to render page {}: {e:?}", index + 1))
        })?;
        let image = bitmap.as_image();
        debug!(page = index + 1, width = image.width(), height = image.height(), "rendered page");
        rendered.push(encode_jpeg(&image, PAGE_JPEG_QUALITY)?);
    }
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_library_is_an_upstream_error() {
        let config = PdfiumConfig {
            library_path: Some("/nonexistent/libpdfium.so".into()),
        };
        match bind(&config) {
            Err(AppError::UpstreamTool { tool, .. }) => assert_eq!(tool, "pdfium"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("bound to a library that does not exist"),
        }
    }
}
