//! Video stream metadata.
//!
//! Read once when a [`VideoHandle`](crate::VideoHandle) opens. The frame
//! rate here is exactly what the container reports and may be missing or
//! nonsensical; see [`resolve_frame_rate`](crate::source::resolve_frame_rate)
//! for the value the pipeline actually uses.

use std::time::Duration;

/// Metadata for the video stream selected from a container.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct VideoMetadata {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frame rate reported by the container, if it reported one at all.
    pub reported_fps: Option<f64>,
    /// Estimated frame count (duration x reported rate), zero if unknown.
    pub frame_count: u64,
    /// Container duration.
    pub duration: Duration,
    /// Codec name (e.g. `"h264"`, `"hevc"`).
    pub codec: String,
    /// Container format name (e.g. `"mov,mp4,m4a,3gp,3g2,mj2"`).
    pub format: String,
}
