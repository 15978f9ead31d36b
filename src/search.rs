//! Size-targeting search.
//!
//! Both searches are pure functions over an injected `encode` closure: all
//! loop state (quality, scale, compression level) lives in locals of the
//! search function, and the caller gets back the last attempt plus a status
//! flag. Only the latest attempt is retained.

use std::fmt;

use crate::codec::{EncodeParams, TiffScheme, MAX_PNG_LEVEL};
use crate::error::Result;
use crate::models::ImageKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    Searching,
    /// The last attempt satisfies the size goal.
    Converged,
    /// Parameter bounds or the attempt budget ran out first.
    BoundExhausted,
}

#[derive(Debug, Clone)]
pub struct EncodeAttempt<P> {
    pub params: P,
    pub bytes: Vec<u8>,
}

impl<P> EncodeAttempt<P> {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

#[derive(Debug, Clone)]
pub struct SearchOutcome<P> {
    pub attempt: EncodeAttempt<P>,
    pub attempts_used: u32,
    pub status: SearchStatus,
}

// ---------------------------------------------------------------------------
// Exact-size matcher (format conversion)
// ---------------------------------------------------------------------------

/// First parameters tried for each target format: highest fidelity.
pub fn initial_params(kind: ImageKind) -> EncodeParams {
    match kind {
        ImageKind::Jpeg => EncodeParams::Jpeg { quality: 100 },
        ImageKind::Png => EncodeParams::Png {
            compression_level: 0,
        },
        ImageKind::Webp => EncodeParams::Webp {
            quality: 100,
            lossless: true,
        },
        ImageKind::Avif => EncodeParams::Avif {
            quality: 100,
            lossless: true,
        },
        ImageKind::Tiff => EncodeParams::Tiff {
            scheme: TiffScheme::None,
            quality: 100,
        },
        ImageKind::Gif => EncodeParams::Gif,
    }
}

/// Next, smaller-output parameters after an oversized attempt, or `None`
/// when the format's bound is reached.
pub fn shrink_step(params: EncodeParams) -> Option<EncodeParams> {
    match params {
        EncodeParams::Jpeg { quality } if quality > 1 => Some(EncodeParams::Jpeg {
            quality: quality - 1,
        }),
        EncodeParams::Png { compression_level } if compression_level < MAX_PNG_LEVEL => {
            Some(EncodeParams::Png {
                compression_level: compression_level + 1,
            })
        }
        EncodeParams::Webp { quality, lossless } => {
            lossy_step(quality, lossless).map(|(quality, lossless)| EncodeParams::Webp {
                quality,
                lossless,
            })
        }
        // AVIF "lossless" is quality 100, so the lossy 100 step would repeat it.
        EncodeParams::Avif { quality, .. } if quality > 1 => Some(EncodeParams::Avif {
            quality: quality - 1,
            lossless: false,
        }),
        EncodeParams::Tiff { scheme, quality } if scheme.is_lossy() && quality > 1 => {
            Some(EncodeParams::Tiff {
                scheme,
                quality: quality - 1,
            })
        }
        EncodeParams::Tiff { scheme, .. } => {
            let idx = TiffScheme::ORDER.iter().position(|s| *s == scheme)?;
            TiffScheme::ORDER.get(idx + 1).map(|&scheme| EncodeParams::Tiff {
                scheme,
                quality: 100,
            })
        }
        _ => None,
    }
}

fn lossy_step(quality: u8, lossless: bool) -> Option<(u8, bool)> {
    if lossless {
        Some((quality, false))
    } else if quality > 1 {
        Some((quality - 1, false))
    } else {
        None
    }
}

/// Most encodes the exact-size search can perform for `kind`.
pub fn max_attempts(kind: ImageKind) -> u32 {
    let mut params = initial_params(kind);
    let mut attempts = 1;
    while let Some(next) = shrink_step(params) {
        params = next;
        attempts += 1;
    }
    attempts
}

/// Walk the format's parameter ladder until the output is no larger than
/// `original_size` or the ladder ends. Encoder errors abort the search.
pub fn search_exact_size<F>(
    kind: ImageKind,
    original_size: usize,
    mut encode: F,
) -> Result<SearchOutcome<EncodeParams>>
where
    F: FnMut(&EncodeParams) -> Result<Vec<u8>>,
{
    let mut params = initial_params(kind);
    let mut bytes = encode(&params)?;
    let mut attempts_used = 1;
    let mut status = SearchStatus::Searching;

    while status == SearchStatus::Searching {
        if bytes.len() <= original_size {
            status = SearchStatus::Converged;
            continue;
        }
        match shrink_step(params) {
            Some(next) => {
                params = next;
                bytes = encode(&params)?;
                attempts_used += 1;
            }
            None => status = SearchStatus::BoundExhausted,
        }
    }

    Ok(SearchOutcome {
        attempt: EncodeAttempt { params, bytes },
        attempts_used,
        status,
    })
}

/// Describes the zero padding appended by [`adjust_buffer_size`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaddingInfo {
    pub original_size: usize,
    pub content_size: usize,
    pub padding: usize,
}

impl fmt::Display for PaddingInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Original size: {}, Content size: {}, Padding: {}",
            self.original_size, self.content_size, self.padding
        )
    }
}

/// Force `buffer` to exactly `target` bytes by appending zeros.
///
/// Oversized buffers are returned unchanged; the caller must surface the
/// mismatch.
pub fn adjust_buffer_size(mut buffer: Vec<u8>, target: usize) -> (Vec<u8>, Option<PaddingInfo>) {
    let content_size = buffer.len();
    if content_size >= target {
        return (buffer, None);
    }
    buffer.resize(target, 0);
    let info = PaddingInfo {
        original_size: target,
        content_size,
        padding: target - content_size,
    };
    (buffer, Some(info))
}

// ---------------------------------------------------------------------------
// Target-size enhancer
// ---------------------------------------------------------------------------

pub const ENHANCE_MAX_ATTEMPTS: u32 = 10;
pub const ENHANCE_TOLERANCE: f64 = 0.10;
pub const ENHANCE_START_QUALITY: u8 = 90;
pub const ENHANCE_START_SCALE: f64 = 1.5;
const QUALITY_STEP: u8 = 5;
const QUALITY_FLOOR: u8 = 30;
const QUALITY_CEILING: u8 = 95;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnhanceParams {
    pub quality: u8,
    pub scale: f64,
}

impl Default for EnhanceParams {
    fn default() -> Self {
        Self {
            quality: ENHANCE_START_QUALITY,
            scale: ENHANCE_START_SCALE,
        }
    }
}

pub fn within_tolerance(size: usize, target: usize) -> bool {
    if target == 0 {
        return size == 0;
    }
    (size as f64 - target as f64).abs() / target as f64 <= ENHANCE_TOLERANCE
}

/// One adjustment: quality moves by 5 until it hits its floor/ceiling, only
/// then does the scale change. Never both in the same step.
pub fn enhance_step(params: EnhanceParams, size: usize, target: usize) -> EnhanceParams {
    let EnhanceParams { quality, scale } = params;
    if size > target {
        if quality > QUALITY_FLOOR {
            EnhanceParams {
                quality: quality.saturating_sub(QUALITY_STEP).max(QUALITY_FLOOR),
                scale,
            }
        } else {
            EnhanceParams {
                quality,
                scale: scale * 0.9,
            }
        }
    } else if quality < QUALITY_CEILING {
        EnhanceParams {
            quality: (quality + QUALITY_STEP).min(QUALITY_CEILING),
            scale,
        }
    } else {
        EnhanceParams {
            quality,
            scale: scale * 1.1,
        }
    }
}

/// Upscale-branch search. `attempts_used` counts re-encodes after the
/// initial one and never exceeds [`ENHANCE_MAX_ATTEMPTS`]. The tolerance is
/// not guaranteed: the current buffer is returned whatever its size.
pub fn search_target_size<F>(target: usize, mut encode: F) -> Result<SearchOutcome<EnhanceParams>>
where
    F: FnMut(&EnhanceParams) -> Result<Vec<u8>>,
{
    let mut params = EnhanceParams::default();
    let mut bytes = encode(&params)?;
    let mut attempts_used = 0;

    while !within_tolerance(bytes.len(), target) && attempts_used < ENHANCE_MAX_ATTEMPTS {
        attempts_used += 1;
        params = enhance_step(params, bytes.len(), target);
        bytes = encode(&params)?;
    }

    let status = if within_tolerance(bytes.len(), target) {
        SearchStatus::Converged
    } else {
        SearchStatus::BoundExhausted
    };

    Ok(SearchOutcome {
        attempt: EncodeAttempt { params, bytes },
        attempts_used,
        status,
    })
}
