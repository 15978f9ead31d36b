use image::DynamicImage;
use tracing::{debug, info, warn};

use crate::codec::{self, Codec};
use crate::error::{AppError, Result};
use crate::models::*;
use crate::ops::{brighten, resize_exact, scaled_dimensions, sharpen};
use crate::pdf::assemble;
use crate::search::{
    adjust_buffer_size, search_exact_size, search_target_size, EnhanceParams, SearchStatus,
    ENHANCE_START_QUALITY,
};
use crate::utils::detect_format_from_bytes;

pub const ENHANCE_BRIGHTNESS: f32 = 1.05;

/// Image conversions. Every public entry point moves the CPU work onto the
/// blocking pool.
#[derive(Debug, Clone, Default)]
pub struct ImageOperationService {
    codec: Codec,
}

impl ImageOperationService {
    pub fn new(codec: Codec) -> Self {
        Self { codec }
    }

    pub async fn process(&self, request: ConversionRequest) -> Result<ConversionResult> {
        let service = self.clone();
        tokio::task::spawn_blocking(move || service.process_blocking(&request)).await?
    }

    pub async fn images_to_pdf(
        &self,
        mut files: Vec<UploadedFile>,
        options: ImageToPdfOptions,
    ) -> Result<PdfAssembly> {
        tokio::task::spawn_blocking(move || {
            assemble::sort_uploads(&mut files);
            assemble::assemble(&files, &options)
        })
        .await?
    }

    pub fn process_blocking(&self, request: &ConversionRequest) -> Result<ConversionResult> {
        if request.source_bytes.is_empty() {
            return Err(AppError::missing_input("No image file uploaded"));
        }
        debug!(
            mode = ?request.mode(),
            source_format = ?request.source_format,
            size = request.source_bytes.len(),
            "processing conversion"
        );
        match request.target {
            ConversionTarget::Tier(tier) => self.compress(request, tier),
            ConversionTarget::SizeBytes(target) => self.enhance(request, target),
            ConversionTarget::Format(kind) => self.convert(&request.source_bytes, kind),
        }
    }

    /// Single JPEG pass at the tier's fixed quality.
    fn compress(&self, request: &ConversionRequest, tier: CompressionTier) -> Result<ConversionResult> {
        let source = &request.source_bytes;
        let img = codec::decode(source)?;
        let output = codec::encode_jpeg(&img, tier.quality())?;
        debug!(
            tier = ?tier,
            original = source.len(),
            compressed = output.len(),
            "compressed image"
        );
        Ok(ConversionResult {
            final_size: output.len(),
            output_bytes: output,
            output_format: ImageKind::Jpeg,
            original_format: source_format_name(request),
            original_size: source.len(),
            attempts_used: 1,
            status: SearchStatus::Converged,
            padding: None,
        })
    }

    fn enhance(&self, request: &ConversionRequest, target: usize) -> Result<ConversionResult> {
        let source = &request.source_bytes;
        let img = codec::decode(source)?;

        let (output, attempts_used, status) = if source.len() >= target {
            let enhanced = brighten(&sharpen(&img), ENHANCE_BRIGHTNESS);
            let output = codec::encode_jpeg(&enhanced, ENHANCE_START_QUALITY)?;
            (output, 0, SearchStatus::Converged)
        } else {
            let outcome = search_target_size(target, |params| enhance_pass(&img, params))?;
            debug!(
                quality = outcome.attempt.params.quality,
                scale = outcome.attempt.params.scale,
                status = ?outcome.status,
                "target-size search finished"
            );
            (outcome.attempt.bytes, outcome.attempts_used, outcome.status)
        };

        info!(
            original = source.len(),
            target,
            final_size = output.len(),
            attempts_used,
            "enhanced image"
        );
        Ok(ConversionResult {
            final_size: output.len(),
            output_bytes: output,
            output_format: ImageKind::Jpeg,
            original_format: source_format_name(request),
            original_size: source.len(),
            attempts_used,
            status,
            padding: None,
        })
    }

    fn convert(&self, source: &[u8], kind: ImageKind) -> Result<ConversionResult> {
        let original_format = codec::probe(source)?
            .format
            .unwrap_or_else(|| detect_format_from_bytes(source).to_string());
        let img = codec::decode(source)?;
        let original_size = source.len();

        let outcome = search_exact_size(kind, original_size, |params| self.codec.encode(&img, params))?;
        let content_size = outcome.attempt.size();
        let (output, padding) = adjust_buffer_size(outcome.attempt.bytes, original_size);

        if output.len() != original_size {
            warn!(
                target = kind.as_str(),
                original_size,
                output_size = output.len(),
                attempts = outcome.attempts_used,
                "could not reach the original size"
            );
        }
        info!(
            "Converted {} ({} bytes) to {} ({} bytes)",
            original_format, original_size, kind, content_size
        );

        Ok(ConversionResult {
            final_size: output.len(),
            output_bytes: output,
            output_format: kind,
            original_format,
            original_size,
            attempts_used: outcome.attempts_used,
            status: outcome.status,
            padding,
        })
    }
}

fn source_format_name(request: &ConversionRequest) -> String {
    request
        .source_format
        .map_or("unknown", ImageKind::as_str)
        .to_string()
}

/// One upscale-branch encode: resize, sharpen, brighten, JPEG.
fn enhance_pass(img: &DynamicImage, params: &EnhanceParams) -> Result<Vec<u8>> {
    let (width, height) = scaled_dimensions(img.width(), img.height(), params.scale);
    let resized = resize_exact(img, width, height);
    let enhanced = brighten(&sharpen(&resized), ENHANCE_BRIGHTNESS);
    codec::encode_jpeg(&enhanced, params.quality)
}
