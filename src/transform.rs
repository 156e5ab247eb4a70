//! The per-frame transform stage.
//!
//! [`transform`] resizes a decoded frame, evens out its local contrast,
//! denoises it and scores the result. The order is fixed: contrast
//! normalization runs before denoising so the denoiser sees the final tonal
//! range, and scoring runs last so the keep/reject decision reflects exactly
//! the pixels that would be written to disk.
//!
//! ```
//! use framesift::transform::transform;
//! use image::{Rgb, RgbImage};
//!
//! let frame = RgbImage::from_pixel(128, 72, Rgb([40, 80, 120]));
//! let (processed, score) = transform(&frame, 64, 36, 0)?;
//! assert_eq!(processed.dimensions(), (64, 36));
//! assert_eq!(score.value(), 0.0);
//! # Ok::<(), framesift::FramesiftError>(())
//! ```

use image::RgbImage;

use crate::{
    clahe,
    color::{lab_to_rgb, luminance, rgb_to_lab},
    denoise::{Windows, denoise_colored},
    error::FramesiftError,
    quality::{QualityScore, score},
    resize::resize_area,
};

/// CLAHE tile grid, per side.
pub const CLAHE_TILE_GRID: u32 = 8;

/// CLAHE clip limit, relative to a flat histogram.
pub const CLAHE_CLIP_LIMIT: f32 = 2.0;

/// Non-local-means patch and search window sides.
pub const DENOISE_WINDOWS: Windows = Windows {
    template: 7,
    search: 21,
};

/// Equalize lightness locally while leaving chroma alone.
pub fn normalize_contrast(image: &RgbImage) -> Result<RgbImage, FramesiftError> {
    let mut lab = rgb_to_lab(image);
    lab.lightness = clahe::equalize(&lab.lightness, CLAHE_TILE_GRID, CLAHE_CLIP_LIMIT)?;
    lab_to_rgb(&lab)
}

/// Non-local-means colour denoising with equal luma and chroma strength.
pub fn denoise(image: &RgbImage, strength: u32) -> Result<RgbImage, FramesiftError> {
    let strength = strength as f32;
    denoise_colored(image, strength, strength, DENOISE_WINDOWS)
}

/// Resize, normalize, denoise and score one frame.
///
/// # Errors
///
/// Returns [`FramesiftError::InvalidConfiguration`] if `width` or `height` is
/// zero or the frame itself is empty.
pub fn transform(
    frame: &RgbImage,
    width: u32,
    height: u32,
    denoise_strength: u32,
) -> Result<(RgbImage, QualityScore), FramesiftError> {
    let resized = resize_area(frame, width, height)?;
    let normalized = normalize_contrast(&resized)?;
    let processed = denoise(&normalized, denoise_strength)?;
    let quality = score(&luminance(&processed));
    Ok((processed, quality))
}
