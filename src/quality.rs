//! Sharpness scoring.
//!
//! The score is the variance of the 4-neighbour Laplacian response over a
//! luminance image. In-focus frames carry high-frequency edge energy that
//! blur suppresses, so a higher score means a sharper frame. The metric has
//! no upper bound and no learned parameters.
//!
//! ```
//! use framesift::quality::{QualityScore, score};
//! use image::GrayImage;
//!
//! let flat = GrayImage::from_pixel(16, 16, image::Luma([90]));
//! assert_eq!(score(&flat), QualityScore::new(0.0));
//! ```

use std::fmt;

use image::GrayImage;

use crate::utilities::reflect_101;

/// Laplacian-variance sharpness of one frame. Never negative.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct QualityScore(f64);

impl QualityScore {
    /// Wrap a raw score.
    pub fn new(value: f64) -> Self {
        Self(value)
    }

    /// The raw score.
    pub fn value(self) -> f64 {
        self.0
    }

    /// Whether this score falls strictly below `threshold`.
    pub fn is_blurry(self, threshold: f64) -> bool {
        is_blurry(self.0, threshold)
    }
}

impl fmt::Display for QualityScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// Lower score means blurrier; a score equal to the threshold is sharp.
pub fn is_blurry(score: f64, threshold: f64) -> bool {
    score < threshold
}

/// Variance of the Laplacian `[0 1 0; 1 -4 1; 0 1 0]` across every pixel of
/// `luminance`, with mirrored (reflect-101) borders.
pub fn score(luminance: &GrayImage) -> QualityScore {
    let (width, height) = luminance.dimensions();
    let (width, height) = (width as usize, height as usize);
    if width == 0 || height == 0 {
        return QualityScore::default();
    }

    let samples = luminance.as_raw();
    let at = |x: isize, y: isize| -> f64 {
        let x = reflect_101(x, width);
        let y = reflect_101(y, height);
        samples[y * width + x] as f64
    };

    // Welford keeps the variance stable for large frames.
    let mut count = 0_f64;
    let mut mean = 0_f64;
    let mut m2 = 0_f64;
    for y in 0..height as isize {
        for x in 0..width as isize {
            let response =
                at(x, y - 1) + at(x, y + 1) + at(x - 1, y) + at(x + 1, y) - 4.0 * at(x, y);
            count += 1.0;
            let delta = response - mean;
            mean += delta / count;
            m2 += delta * (response - mean);
        }
    }

    QualityScore((m2 / count).max(0.0))
}
