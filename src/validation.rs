//! Form-field validation with schema-style messages such as
//! `"compressionType" must be one of [low, medium, high]`.

use crate::error::{AppError, Result};
use crate::models::{CompressionTier, ImageKind, ImageToPdfOptions, PageSize};
use crate::multipart::FormData;

pub const MIN_TARGET_MB: f64 = 10.0;
pub const MAX_TARGET_MB: f64 = 25.0;

fn required<'a>(form: &'a FormData, name: &str) -> Result<&'a str> {
    match form.field(name) {
        None => Err(AppError::validation(format!("\"{name}\" is required"))),
        Some("") => Err(AppError::validation(format!(
            "\"{name}\" is not allowed to be empty"
        ))),
        Some(value) => Ok(value),
    }
}

fn one_of<T>(name: &str, value: &str, tokens: &[&str], parse: impl Fn(&str) -> Option<T>) -> Result<T> {
    parse(value).ok_or_else(|| {
        AppError::validation(format!(
            "\"{name}\" must be one of [{}]",
            tokens.join(", ")
        ))
    })
}

pub fn compression_tier(form: &FormData) -> Result<CompressionTier> {
    let value = required(form, "compressionType")?;
    one_of("compressionType", value, &CompressionTier::TOKENS, CompressionTier::parse)
}

pub fn convert_type(form: &FormData) -> Result<ImageKind> {
    let value = required(form, "convertType")?;
    let tokens: Vec<&str> = ImageKind::ALL.iter().map(|k| k.as_str()).collect();
    one_of("convertType", value, &tokens, ImageKind::parse)
}

/// Target size in megabytes, within [10, 25].
pub fn target_megabytes(form: &FormData) -> Result<f64> {
    let value = required(form, "quality")?;
    let megabytes: f64 = value
        .trim()
        .parse()
        .ok()
        .filter(|v: &f64| v.is_finite())
        .ok_or_else(|| AppError::validation("\"quality\" must be a number"))?;
    if megabytes < MIN_TARGET_MB {
        return Err(AppError::validation(format!(
            "\"quality\" must be greater than or equal to {MIN_TARGET_MB}"
        )));
    }
    if megabytes > MAX_TARGET_MB {
        return Err(AppError::validation(format!(
            "\"quality\" must be less than or equal to {MAX_TARGET_MB}"
        )));
    }
    Ok(megabytes)
}

fn boolean(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(AppError::validation(format!("\"{name}\" must be a boolean"))),
    }
}

pub fn image_to_pdf_options(form: &FormData) -> Result<ImageToPdfOptions> {
    let defaults = ImageToPdfOptions::default();
    let page_size = match form.field("pageSize") {
        None => defaults.page_size,
        Some(value) => one_of("pageSize", value, &PageSize::TOKENS, PageSize::parse)?,
    };
    let maintain_aspect_ratio = match form.field("maintainAspectRatio") {
        None => defaults.maintain_aspect_ratio,
        Some(value) => boolean("maintainAspectRatio", value)?,
    };
    Ok(ImageToPdfOptions {
        page_size,
        maintain_aspect_ratio,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> FormData {
        let mut form = FormData::default();
        for (k, v) in pairs {
            form.fields.insert(k.to_string(), v.to_string());
        }
        form
    }

    #[test]
    fn tier_messages() {
        let err = compression_tier(&form(&[("compressionType", "ultra")])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "\"compressionType\" must be one of [low, medium, high]"
        );
        let err = compression_tier(&form(&[])).unwrap_err();
        assert_eq!(err.to_string(), "\"compressionType\" is required");
        assert_eq!(
            compression_tier(&form(&[("compressionType", "high")])).unwrap(),
            CompressionTier::High
        );
    }

    #[test]
    fn convert_type_lists_every_format() {
        let err = convert_type(&form(&[("convertType", "bmp")])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "\"convertType\" must be one of [jpeg, png, webp, avif, tiff, gif]"
        );
    }

    #[test]
    fn target_megabytes_bounds() {
        assert_eq!(target_megabytes(&form(&[("quality", "12.5")])).unwrap(), 12.5);
        assert_eq!(
            target_megabytes(&form(&[("quality", "9")])).unwrap_err().to_string(),
            "\"quality\" must be greater than or equal to 10"
        );
        assert_eq!(
            target_megabytes(&form(&[("quality", "26")])).unwrap_err().to_string(),
            "\"quality\" must be less than or equal to 25"
        );
        assert_eq!(
            target_megabytes(&form(&[("quality", "big")])).unwrap_err().to_string(),
            "\"quality\" must be a number"
        );
    }

    #[test]
    fn pdf_options_default_and_parse() {
        let options = image_to_pdf_options(&form(&[])).unwrap();
        assert_eq!(options.page_size, PageSize::Custom);
        assert!(options.maintain_aspect_ratio);

        let options =
            image_to_pdf_options(&form(&[("pageSize", "A4"), ("maintainAspectRatio", "FALSE")]))
                .unwrap();
        assert_eq!(options.page_size, PageSize::A4);
        assert!(!options.maintain_aspect_ratio);

        assert!(image_to_pdf_options(&form(&[("maintainAspectRatio", "yes")])).is_err());
        assert!(image_to_pdf_options(&form(&[("pageSize", "B5")])).is_err());
    }
}
