use serde::Serialize;
use std::fmt;

use crate::search::{PaddingInfo, SearchStatus};
use crate::utils::detect_format_from_bytes;

/// Image formats accepted as `convertType` and produced by the codec layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    Jpeg,
    Png,
    Webp,
    Avif,
    Tiff,
    Gif,
}

impl ImageKind {
    pub const ALL: [ImageKind; 6] = [
        ImageKind::Jpeg,
        ImageKind::Png,
        ImageKind::Webp,
        ImageKind::Avif,
        ImageKind::Tiff,
        ImageKind::Gif,
    ];

    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::Webp),
            "avif" => Some(Self::Avif),
            "tiff" => Some(Self::Tiff),
            "gif" => Some(Self::Gif),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Avif => "avif",
            Self::Tiff => "tiff",
            Self::Gif => "gif",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Avif => "image/avif",
            Self::Tiff => "image/tiff",
            Self::Gif => "image/gif",
        }
    }

    pub fn from_image_format(format: image::ImageFormat) -> Option<Self> {
        match format {
            image::ImageFormat::Jpeg => Some(Self::Jpeg),
            image::ImageFormat::Png => Some(Self::Png),
            image::ImageFormat::WebP => Some(Self::Webp),
            image::ImageFormat::Avif => Some(Self::Avif),
            image::ImageFormat::Tiff => Some(Self::Tiff),
            image::ImageFormat::Gif => Some(Self::Gif),
            _ => None,
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse compression preset mapped to a fixed JPEG quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionTier {
    Low,
    Medium,
    High,
}

impl CompressionTier {
    pub const TOKENS: [&'static str; 3] = ["low", "medium", "high"];

    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    pub fn quality(self) -> u8 {
        match self {
            Self::Low => 30,
            Self::Medium => 50,
            Self::High => 70,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionMode {
    MatchOriginalSize,
    MatchTargetSize,
    TierPreset,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConversionTarget {
    Tier(CompressionTier),
    /// Target size for the enhancer, in bytes.
    SizeBytes(usize),
    Format(ImageKind),
}

/// One conversion call. Built by the handler, consumed by the service.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub source_bytes: Vec<u8>,
    /// Sniffed from the upload's magic bytes; `None` for containers the
    /// codec layer cannot produce (BMP, ICO, ...).
    pub source_format: Option<ImageKind>,
    pub target: ConversionTarget,
}

impl ConversionRequest {
    pub fn new(source_bytes: Vec<u8>, target: ConversionTarget) -> Self {
        let source_format = ImageKind::parse(detect_format_from_bytes(&source_bytes));
        Self {
            source_bytes,
            source_format,
            target,
        }
    }

    pub fn tier(source_bytes: Vec<u8>, tier: CompressionTier) -> Self {
        Self::new(source_bytes, ConversionTarget::Tier(tier))
    }

    pub fn target_megabytes(source_bytes: Vec<u8>, megabytes: f64) -> Self {
        let bytes = (megabytes * BYTES_PER_MB as f64) as usize;
        Self::new(source_bytes, ConversionTarget::SizeBytes(bytes))
    }

    pub fn format(source_bytes: Vec<u8>, kind: ImageKind) -> Self {
        Self::new(source_bytes, ConversionTarget::Format(kind))
    }

    pub fn mode(&self) -> ConversionMode {
        match self.target {
            ConversionTarget::Tier(_) => ConversionMode::TierPreset,
            ConversionTarget::SizeBytes(_) => ConversionMode::MatchTargetSize,
            ConversionTarget::Format(_) => ConversionMode::MatchOriginalSize,
        }
    }
}

pub const BYTES_PER_MB: usize = 1_048_576;

#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub output_bytes: Vec<u8>,
    pub output_format: ImageKind,
    /// Detected format of the upload, as reported by the decoder.
    pub original_format: String,
    pub original_size: usize,
    pub final_size: usize,
    pub attempts_used: u32,
    pub status: SearchStatus,
    pub padding: Option<PaddingInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSize {
    A4,
    A3,
    Letter,
    Legal,
    Custom,
}

impl PageSize {
    pub const TOKENS: [&'static str; 5] = ["A4", "A3", "letter", "legal", "custom"];

    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "A4" => Some(Self::A4),
            "A3" => Some(Self::A3),
            "letter" => Some(Self::Letter),
            "legal" => Some(Self::Legal),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }

    /// Width and height in points, `None` for custom (page follows the image).
    pub fn dimensions(self) -> Option<(f32, f32)> {
        match self {
            Self::A4 => Some((595.28, 841.89)),
            Self::A3 => Some((841.89, 1190.55)),
            Self::Letter => Some((612.0, 792.0)),
            Self::Legal => Some((612.0, 1008.0)),
            Self::Custom => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ImageToPdfOptions {
    pub page_size: PageSize,
    pub maintain_aspect_ratio: bool,
}

impl Default for ImageToPdfOptions {
    fn default() -> Self {
        Self {
            page_size: PageSize::Custom,
            maintain_aspect_ratio: true,
        }
    }
}

/// A file pulled out of a multipart body.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field_name: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.starts_with("image/"))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone)]
pub struct PdfAssembly {
    pub pdf: Vec<u8>,
    pub pages: usize,
    pub skipped: Vec<String>,
}

#[derive(Serialize, Debug)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}
