//! Error types for the `framesift` crate.
//!
//! [`FramesiftError`] is the single error type returned by every fallible
//! operation. Every variant is fatal for a preprocessing run: the pipeline is
//! a batch job, so nothing is retried. The only tolerated irregularity, a
//! missing or nonsensical source frame rate, is corrected silently and never
//! surfaces here.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

/// The unified error type for all `framesift` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FramesiftError {
    /// The video could not be opened or decoded (missing file, unreadable,
    /// unsupported codec).
    #[error("Source unavailable at {path}: {reason}")]
    SourceUnavailable {
        /// Path that was passed to [`VideoHandle::open`](crate::VideoHandle::open).
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The container opened but holds no video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// A frame was requested from a source that has already been closed.
    #[error("Frame source has already been closed")]
    SourceClosed,

    /// A frame could not be decoded mid-stream.
    #[error("Failed to decode video frame: {0}")]
    VideoDecode(String),

    /// Configuration values are out of range (non-positive dimensions or
    /// rates, non-finite thresholds, mismatched buffer shapes).
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A kept frame or a ledger row could not be written.
    #[error("Failed to write {path}: {source}")]
    PersistenceFailure {
        /// The file or directory being written.
        path: PathBuf,
        /// The I/O error reported by the operating system.
        #[source]
        source: IoError,
    },

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    Ffmpeg(String),

    /// An error from the `image` crate while encoding or reading an image.
    #[error("Image processing error: {0}")]
    Image(#[from] ImageError),
}

impl From<FfmpegError> for FramesiftError {
    fn from(error: FfmpegError) -> Self {
        FramesiftError::Ffmpeg(error.to_string())
    }
}

impl FramesiftError {
    /// Wrap an I/O error raised while writing `path`.
    pub(crate) fn persistence(path: impl Into<PathBuf>, source: IoError) -> Self {
        FramesiftError::PersistenceFailure {
            path: path.into(),
            source,
        }
    }
}
