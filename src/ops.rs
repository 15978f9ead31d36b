//! Pixel operations applied before encoding.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

/// Mild unsharp mask, the equivalent of a default "sharpen" pass.
pub fn sharpen(img: &DynamicImage) -> DynamicImage {
    img.unsharpen(1.0, 1)
}

/// Multiply every colour channel by `factor`, leaving alpha untouched.
pub fn brighten(img: &DynamicImage, factor: f32) -> DynamicImage {
    let scale = |v: u8| ((v as f32) * factor).round().clamp(0.0, 255.0) as u8;
    match img {
        DynamicImage::ImageRgba8(rgba) => {
            let mut out = rgba.clone();
            for px in out.pixels_mut() {
                px.0 = [scale(px.0[0]), scale(px.0[1]), scale(px.0[2]), px.0[3]];
            }
            DynamicImage::ImageRgba8(out)
        }
        other => {
            let mut out = other.to_rgb8();
            for px in out.pixels_mut() {
                px.0 = [scale(px.0[0]), scale(px.0[1]), scale(px.0[2])];
            }
            DynamicImage::ImageRgb8(out)
        }
    }
}

/// Dimensions after applying `scale`, never below 1x1.
pub fn scaled_dimensions(width: u32, height: u32, scale: f64) -> (u32, u32) {
    let w = (width as f64 * scale).round().max(1.0);
    let h = (height as f64 * scale).round().max(1.0);
    (w.min(u32::MAX as f64) as u32, h.min(u32::MAX as f64) as u32)
}

/// Lanczos3 resize to exact dimensions, ignoring aspect ratio.
pub fn resize_exact(img: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    if img.dimensions() == (width, height) {
        return img.clone();
    }
    img.resize_exact(width, height, FilterType::Lanczos3)
}

/// Shrink to fit inside `max_width` x `max_height`, keeping aspect ratio.
/// Images already inside the box are returned unchanged.
pub fn fit_within(img: &DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
    let (w, h) = img.dimensions();
    if w <= max_width && h <= max_height {
        return img.clone();
    }
    img.resize(max_width, max_height, FilterType::Lanczos3)
}
