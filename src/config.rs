//! Run configuration.
//!
//! [`RunConfiguration`] is a builder carrying every tunable of a
//! preprocessing run. It is validated once, before the output directory is
//! touched, and is never mutated afterwards.
//!
//! # Example
//!
//! ```
//! use framesift::RunConfiguration;
//!
//! let config = RunConfiguration::new()
//!     .with_resolution(1280, 720)
//!     .with_target_fps(2.0)
//!     .with_blur_threshold(80.0);
//! assert!(config.validate().is_ok());
//! ```

use crate::error::FramesiftError;

/// Default frames examined per second of video.
pub const DEFAULT_TARGET_FPS: f64 = 3.0;
/// Default output width.
pub const DEFAULT_WIDTH: u32 = 640;
/// Default output height.
pub const DEFAULT_HEIGHT: u32 = 360;
/// Default minimum sharpness for a frame to be kept.
pub const DEFAULT_BLUR_THRESHOLD: f64 = 120.0;
/// Default non-local-means strength.
pub const DEFAULT_DENOISE_STRENGTH: u32 = 6;
/// Frame rate assumed when the container reports an unusable one.
pub const DEFAULT_FALLBACK_FPS: f64 = 30.0;
/// Default JPEG quality for kept frames.
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// What to do when the decoder fails part-way through a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeErrorPolicy {
    /// Treat the failure as the end of the stream, keep everything written
    /// so far, and report the truncation in the run summary.
    #[default]
    Stop,
    /// Abort the run with [`FramesiftError::VideoDecode`].
    Abort,
}

/// Decimation derived from the source and requested frame rates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingPolicy {
    /// Frames per second requested by the caller.
    pub target_fps: f64,
    /// Frames per second of the source after fallback resolution.
    pub source_fps: f64,
}

impl SamplingPolicy {
    /// Create a policy, rejecting non-positive or non-finite rates.
    pub fn new(source_fps: f64, target_fps: f64) -> Result<Self, FramesiftError> {
        for (name, value) in [("source", source_fps), ("target", target_fps)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(FramesiftError::InvalidConfiguration(format!(
                    "{name} frame rate must be positive, got {value}"
                )));
            }
        }
        Ok(Self {
            target_fps,
            source_fps,
        })
    }

    /// Frames between two examined frames: `max(1, round(source / target))`.
    ///
    /// Rounding rather than truncating keeps the long-run sampling rate close
    /// to the requested one.
    pub fn step(&self) -> u64 {
        let ratio = (self.source_fps / self.target_fps).round();
        if ratio >= u64::MAX as f64 {
            u64::MAX
        } else {
            (ratio as u64).max(1)
        }
    }

    /// Whether the frame at `frame_index` is a sampling instant.
    pub fn is_sampled(&self, frame_index: u64) -> bool {
        frame_index % self.step() == 0
    }
}

/// Every setting of a preprocessing run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfiguration {
    /// Output frame width in pixels.
    pub target_width: u32,
    /// Output frame height in pixels.
    pub target_height: u32,
    /// Frames scoring strictly below this are rejected.
    pub blur_threshold: f64,
    /// Requested sampling rate in frames per second.
    pub target_fps: f64,
    /// Non-local-means strength for luma and chroma; zero disables it.
    pub denoise_strength: u32,
    /// Frame rate used when the source reports none or nonsense.
    pub fallback_fps: f64,
    /// JPEG quality (1-100) for kept frames.
    pub jpeg_quality: u8,
    /// Handling of mid-stream decode failures.
    pub decode_error_policy: DecodeErrorPolicy,
}

impl Default for RunConfiguration {
    fn default() -> Self {
        Self::new()
    }
}

impl RunConfiguration {
    /// Create a configuration with the default settings.
    pub fn new() -> Self {
        Self {
            target_width: DEFAULT_WIDTH,
            target_height: DEFAULT_HEIGHT,
            blur_threshold: DEFAULT_BLUR_THRESHOLD,
            target_fps: DEFAULT_TARGET_FPS,
            denoise_strength: DEFAULT_DENOISE_STRENGTH,
            fallback_fps: DEFAULT_FALLBACK_FPS,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            decode_error_policy: DecodeErrorPolicy::Stop,
        }
    }

    /// Set the output resolution.
    #[must_use]
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.target_width = width;
        self.target_height = height;
        self
    }

    /// Set the minimum sharpness for a frame to be kept.
    #[must_use]
    pub fn with_blur_threshold(mut self, threshold: f64) -> Self {
        self.blur_threshold = threshold;
        self
    }

    /// Set the sampling rate in frames per second.
    #[must_use]
    pub fn with_target_fps(mut self, fps: f64) -> Self {
        self.target_fps = fps;
        self
    }

    /// Set the denoising strength.
    #[must_use]
    pub fn with_denoise_strength(mut self, strength: u32) -> Self {
        self.denoise_strength = strength;
        self
    }

    /// Set the frame rate assumed for sources with unusable metadata.
    #[must_use]
    pub fn with_fallback_fps(mut self, fps: f64) -> Self {
        self.fallback_fps = fps;
        self
    }

    /// Set the JPEG quality of kept frames.
    #[must_use]
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    /// Set the mid-stream decode failure policy.
    #[must_use]
    pub fn with_decode_error_policy(mut self, policy: DecodeErrorPolicy) -> Self {
        self.decode_error_policy = policy;
        self
    }

    /// Check every field.
    ///
    /// # Errors
    ///
    /// Returns [`FramesiftError::InvalidConfiguration`] naming the first bad
    /// field.
    pub fn validate(&self) -> Result<(), FramesiftError> {
        if self.target_width == 0 || self.target_height == 0 {
            return Err(FramesiftError::InvalidConfiguration(format!(
                "output size must be positive, got {}x{}",
                self.target_width, self.target_height
            )));
        }
        if !self.target_fps.is_finite() || self.target_fps <= 0.0 {
            return Err(FramesiftError::InvalidConfiguration(format!(
                "target fps must be positive, got {}",
                self.target_fps
            )));
        }
        if !self.fallback_fps.is_finite() || self.fallback_fps <= 0.0 {
            return Err(FramesiftError::InvalidConfiguration(format!(
                "fallback fps must be positive, got {}",
                self.fallback_fps
            )));
        }
        if !self.blur_threshold.is_finite() {
            return Err(FramesiftError::InvalidConfiguration(format!(
                "blur threshold must be finite, got {}",
                self.blur_threshold
            )));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(FramesiftError::InvalidConfiguration(format!(
                "JPEG quality must be within 1-100, got {}",
                self.jpeg_quality
            )));
        }
        Ok(())
    }

    /// Sampling policy for a source running at `source_fps`.
    pub fn sampling_policy(&self, source_fps: f64) -> Result<SamplingPolicy, FramesiftError> {
        SamplingPolicy::new(source_fps, self.target_fps)
    }
}
