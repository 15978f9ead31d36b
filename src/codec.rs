//! Codec layer: decode uploads, encode a `DynamicImage` with per-format
//! parameters, and probe headers without a full decode.

use image::codecs::avif::AvifEncoder;
use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::{DynamicImage, ExtendedColorType, Frame, ImageEncoder, ImageReader};
use oxipng::{optimize_from_memory, Options, StripChunks};
use std::io::Cursor;
use tiff::encoder::compression::{Compression, Deflate, DeflateLevel, Lzw, Uncompressed};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::{CompressionMethod, PhotometricInterpretation, PlanarConfiguration, Tag};
use tiff::TiffResult;

use crate::error::{AppError, Result};
use crate::models::ImageKind;

pub const MAX_PNG_LEVEL: u8 = 9;

const YCBCR_SUBSAMPLING: u16 = 530;

/// TIFF compression schemes in the order the exact-size search walks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TiffScheme {
    None,
    Jpeg,
    Deflate,
    Lzw,
}

impl TiffScheme {
    pub const ORDER: [TiffScheme; 4] = [
        TiffScheme::None,
        TiffScheme::Jpeg,
        TiffScheme::Deflate,
        TiffScheme::Lzw,
    ];

    /// Only JPEG strips respond to the quality knob.
    pub fn is_lossy(self) -> bool {
        self == TiffScheme::Jpeg
    }
}

/// Encoder parameters for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeParams {
    Jpeg { quality: u8 },
    /// 0 stores with the fastest deflate and no filtering, 1..=9 re-compresses
    /// with increasingly aggressive oxipng presets.
    Png { compression_level: u8 },
    Webp { quality: u8, lossless: bool },
    /// Lossless is approximated by quality 100; the AV1 encoder has no true
    /// lossless mode.
    Avif { quality: u8, lossless: bool },
    /// `quality` is ignored by the lossless schemes.
    Tiff { scheme: TiffScheme, quality: u8 },
    Gif,
}

impl EncodeParams {
    pub fn kind(&self) -> ImageKind {
        match self {
            Self::Jpeg { .. } => ImageKind::Jpeg,
            Self::Png { .. } => ImageKind::Png,
            Self::Webp { .. } => ImageKind::Webp,
            Self::Avif { .. } => ImageKind::Avif,
            Self::Tiff { .. } => ImageKind::Tiff,
            Self::Gif => ImageKind::Gif,
        }
    }
}

/// Width, height and container format read from the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub format: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Codec {
    avif_speed: u8,
}

impl Default for Codec {
    fn default() -> Self {
        Self { avif_speed: 8 }
    }
}

impl Codec {
    pub fn new(avif_speed: u8) -> Self {
        Self {
            avif_speed: avif_speed.clamp(1, 10),
        }
    }

    pub fn encode(&self, img: &DynamicImage, params: &EncodeParams) -> Result<Vec<u8>> {
        match *params {
            EncodeParams::Jpeg { quality } => encode_jpeg(img, quality),
            EncodeParams::Png { compression_level } => encode_png(img, compression_level),
            EncodeParams::Webp { quality, lossless } => encode_webp(img, quality, lossless),
            EncodeParams::Avif { quality, lossless } => {
                let quality = if lossless { 100 } else { quality };
                self.encode_avif(img, quality)
            }
            EncodeParams::Tiff { scheme, quality } => encode_tiff(img, scheme, quality),
            EncodeParams::Gif => encode_gif(img),
        }
    }

    fn encode_avif(&self, img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let encoder =
            AvifEncoder::new_with_speed_quality(&mut buffer, self.avif_speed, quality.clamp(1, 100));
        let (raw, width, height, color) = raw_pixels(img);
        encoder
            .write_image(&raw, width, height, color)
            .map_err(|e| AppError::encode("avif", e))?;
        Ok(buffer)
    }
}

/// Decode an upload into 8-bit RGB or RGBA so every encoder accepts it.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
    let img = image::load_from_memory(bytes).map_err(|e| AppError::decode("image", e))?;
    Ok(normalize(img))
}

fn normalize(img: DynamicImage) -> DynamicImage {
    match img {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => img,
        other if other.color().has_alpha() => DynamicImage::ImageRgba8(other.to_rgba8()),
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

pub fn probe(bytes: &[u8]) -> Result<ImageMetadata> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| AppError::decode("image header", e))?;

    let format = reader
        .format()
        .map(|f| match ImageKind::from_image_format(f) {
            Some(kind) => kind.as_str().to_string(),
            None => format!("{:?}", f).to_lowercase(),
        });
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| AppError::decode("image header", e))?;

    Ok(ImageMetadata {
        width,
        height,
        format,
    })
}

fn raw_pixels(img: &DynamicImage) -> (Vec<u8>, u32, u32, ExtendedColorType) {
    if img.color().has_alpha() {
        let rgba = img.to_rgba8();
        let (w, h) = rgba.dimensions();
        (rgba.into_raw(), w, h, ExtendedColorType::Rgba8)
    } else {
        let rgb = img.to_rgb8();
        let (w, h) = rgb.dimensions();
        (rgb.into_raw(), w, h, ExtendedColorType::Rgb8)
    }
}

pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut cursor = Cursor::new(&mut buffer);

    let rgb_img = img.to_rgb8();
    let encoder = JpegEncoder::new_with_quality(&mut cursor, quality.clamp(1, 100));

    encoder
        .write_image(
            rgb_img.as_raw(),
            rgb_img.width(),
            rgb_img.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| AppError::encode("jpeg", e))?;

    Ok(buffer)
}

fn encode_png(img: &DynamicImage, level: u8) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let (raw, width, height, color) = raw_pixels(img);
    PngEncoder::new_with_quality(&mut buffer, CompressionType::Fast, PngFilter::NoFilter)
        .write_image(&raw, width, height, color)
        .map_err(|e| AppError::encode("png", e))?;

    if level == 0 {
        return Ok(buffer);
    }

    let mut options = Options::from_preset(oxipng_preset(level));
    options.optimize_alpha = true;
    options.strip = StripChunks::Safe;

    optimize_from_memory(&buffer, &options).map_err(|e| AppError::encode("png", e))
}

/// Spread compression levels 1..=9 over oxipng presets 0..=6.
fn oxipng_preset(level: u8) -> u8 {
    let level = level.clamp(1, MAX_PNG_LEVEL);
    ((level - 1) * 6 + 4) / 8
}

fn encode_webp(img: &DynamicImage, quality: u8, lossless: bool) -> Result<Vec<u8>> {
    let (raw, width, height, color) = raw_pixels(img);
    let encoder = match color {
        ExtendedColorType::Rgba8 => webp::Encoder::from_rgba(&raw, width, height),
        _ => webp::Encoder::from_rgb(&raw, width, height),
    };
    let memory = encoder
        .encode_simple(lossless, quality.clamp(1, 100) as f32)
        .map_err(|e| AppError::encode("webp", format!("{e:?}")))?;
    Ok(memory.to_vec())
}

fn encode_tiff(img: &DynamicImage, scheme: TiffScheme, quality: u8) -> Result<Vec<u8>> {
    match scheme {
        TiffScheme::None => write_tiff(img, Uncompressed),
        TiffScheme::Jpeg => write_jpeg_tiff(img, quality),
        TiffScheme::Deflate => write_tiff(img, Deflate::with_level(DeflateLevel::Balanced)),
        TiffScheme::Lzw => write_tiff(img, Lzw),
    }
}

fn write_tiff<D: Compression>(img: &DynamicImage, compression: D) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut cursor).map_err(|e| AppError::encode("tiff", e))?;
        let written = if img.color().has_alpha() {
            let rgba = img.to_rgba8();
            encoder.write_image_with_compression::<colortype::RGBA8, D>(
                rgba.width(),
                rgba.height(),
                compression,
                rgba.as_raw(),
            )
        } else {
            let rgb = img.to_rgb8();
            encoder.write_image_with_compression::<colortype::RGB8, D>(
                rgb.width(),
                rgb.height(),
                compression,
                rgb.as_raw(),
            )
        };
        written.map_err(|e| AppError::encode("tiff", e))?;
    }
    Ok(cursor.into_inner())
}

/// Single-strip TIFF holding a baseline JPEG stream (Compression = 7).
/// Alpha is dropped, as for plain JPEG output.
fn write_jpeg_tiff(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let strip = encode_jpeg(img, quality)?;
    jpeg_strip_tiff(&strip, img.width(), img.height()).map_err(|e| AppError::encode("tiff", e))
}

fn jpeg_strip_tiff(strip: &[u8], width: u32, height: u32) -> TiffResult<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut cursor)?;
        let mut dir = encoder.new_directory()?;

        let offset = u32::try_from(dir.write_data(strip)?)?;
        let byte_count = u32::try_from(strip.len())?;

        dir.write_tag(Tag::ImageWidth, width)?;
        dir.write_tag(Tag::ImageLength, height)?;
        dir.write_tag(Tag::BitsPerSample, &[8u16, 8, 8][..])?;
        dir.write_tag(Tag::Compression, CompressionMethod::ModernJPEG.to_u16())?;
        dir.write_tag(
            Tag::PhotometricInterpretation,
            PhotometricInterpretation::YCbCr.to_u16(),
        )?;
        dir.write_tag(Tag::SamplesPerPixel, 3u16)?;
        dir.write_tag(Tag::RowsPerStrip, height)?;
        dir.write_tag(Tag::StripOffsets, offset)?;
        dir.write_tag(Tag::StripByteCounts, byte_count)?;
        dir.write_tag(Tag::PlanarConfiguration, PlanarConfiguration::Chunky.to_u16())?;
        // YCbCrSubSampling: the JPEG encoder keeps full-resolution chroma
        dir.write_tag(Tag::Unknown(YCBCR_SUBSAMPLING), &[1u16, 1][..])?;
        dir.finish()?;
    }
    Ok(cursor.into_inner())
}

fn encode_gif(img: &DynamicImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut buffer);
        encoder
            .encode_frame(Frame::new(img.to_rgba8()))
            .map_err(|e| AppError::encode("gif", e))?;
    }
    Ok(buffer)
}
