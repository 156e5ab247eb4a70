//! FFmpeg-backed [`FrameDecoder`].
//!
//! [`VideoHandle`] owns the demuxer, the decoder for the best video stream,
//! and a lazily built RGB scaler. Packets are read strictly in order; there
//! is no seeking. Frames are converted to packed RGB at their native size,
//! and resizing happens later in the transform stage.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    time::Duration,
};

use ffmpeg_next::{
    Error as FfmpegError, Packet,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
    util::error::EAGAIN,
};
use image::RgbImage;

use crate::{
    error::FramesiftError, metadata::VideoMetadata, source::FrameDecoder,
    utilities::frame_to_buffer,
};

/// Live decoder state; dropped as a unit on release.
struct Session {
    input_context: Input,
    decoder: VideoDecoder,
    scaler: Option<ScalingContext>,
    video_stream_index: usize,
    decoded_frame: VideoFrame,
    rgb_frame: VideoFrame,
    eof_sent: bool,
}

/// An opened video file.
///
/// Must be opened before any read and is released exactly once, either via
/// [`FrameDecoder::release`] or on drop.
pub struct VideoHandle {
    session: Option<Session>,
    metadata: VideoMetadata,
    path: PathBuf,
}

impl Debug for VideoHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("VideoHandle")
            .field("path", &self.path)
            .field("metadata", &self.metadata)
            .field("open", &self.session.is_some())
            .finish_non_exhaustive()
    }
}

impl VideoHandle {
    /// Open `path` and prepare a decoder for its best video stream.
    ///
    /// # Errors
    ///
    /// Returns [`FramesiftError::SourceUnavailable`] if FFmpeg cannot open
    /// the file, finds no video stream, or has no decoder for its codec.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FramesiftError> {
        let path = path.as_ref().to_path_buf();
        let unavailable = |reason: String| FramesiftError::SourceUnavailable {
            path: path.clone(),
            reason,
        };

        log::debug!("Opening video: {}", path.display());

        ffmpeg_next::init()
            .map_err(|error| unavailable(format!("FFmpeg initialisation failed: {error}")))?;

        let input_context =
            ffmpeg_next::format::input(&path).map_err(|error| unavailable(error.to_string()))?;

        let stream = input_context
            .streams()
            .best(Type::Video)
            .ok_or_else(|| unavailable(FramesiftError::NoVideoStream.to_string()))?;
        let video_stream_index = stream.index();

        let decoder_context = CodecContext::from_parameters(stream.parameters())
            .map_err(|error| unavailable(format!("unreadable codec parameters: {error}")))?;
        let decoder = decoder_context
            .decoder()
            .video()
            .map_err(|error| unavailable(format!("no usable video decoder: {error}")))?;

        let reported_fps = [stream.avg_frame_rate(), stream.rate()]
            .into_iter()
            .find(|rate| rate.denominator() != 0)
            .map(|rate| rate.numerator() as f64 / rate.denominator() as f64);

        let duration_microseconds = input_context.duration();
        let duration = if duration_microseconds > 0 {
            Duration::from_micros(duration_microseconds as u64)
        } else {
            Duration::ZERO
        };

        let frame_count = match reported_fps {
            Some(fps) if fps.is_finite() && fps > 0.0 => (duration.as_secs_f64() * fps) as u64,
            _ => 0,
        };

        let codec = decoder
            .codec()
            .map(|codec| codec.name().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let metadata = VideoMetadata {
            width: decoder.width(),
            height: decoder.height(),
            reported_fps,
            frame_count,
            duration,
            codec,
            format: input_context.format().name().to_string(),
        };

        log::debug!(
            "Opened {} ({}x{}, codec={}, reported fps={:?})",
            path.display(),
            metadata.width,
            metadata.height,
            metadata.codec,
            metadata.reported_fps,
        );

        Ok(Self {
            session: Some(Session {
                input_context,
                decoder,
                scaler: None,
                video_stream_index,
                decoded_frame: VideoFrame::empty(),
                rgb_frame: VideoFrame::empty(),
                eof_sent: false,
            }),
            metadata,
            path,
        })
    }

    /// Metadata read at open time.
    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    /// Path the handle was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the decoder session is still alive.
    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }
}

impl Session {
    /// Convert `decoded_frame` to packed RGB, rebuilding the scaler if the
    /// stream's geometry or pixel format changed.
    fn convert_current_frame(&mut self) -> Result<RgbImage, FramesiftError> {
        let format = self.decoded_frame.format();
        let width = self.decoded_frame.width();
        let height = self.decoded_frame.height();

        let stale = match &self.scaler {
            Some(scaler) => {
                let input = scaler.input();
                input.format != format || input.width != width || input.height != height
            }
            None => true,
        };
        if stale {
            self.scaler = Some(ScalingContext::get(
                format,
                width,
                height,
                Pixel::RGB24,
                width,
                height,
                ScalingFlags::BILINEAR,
            )?);
        }

        if let Some(scaler) = self.scaler.as_mut() {
            scaler.run(&self.decoded_frame, &mut self.rgb_frame)?;
        }

        let buffer = frame_to_buffer(&self.rgb_frame, width, height, 3);
        RgbImage::from_raw(width, height, buffer).ok_or_else(|| {
            FramesiftError::VideoDecode(
                "Failed to construct RGB image from decoded frame data".to_string(),
            )
        })
    }

    fn decode_next(&mut self) -> Result<Option<RgbImage>, FramesiftError> {
        loop {
            match self.decoder.receive_frame(&mut self.decoded_frame) {
                Ok(()) => return self.convert_current_frame().map(Some),
                Err(FfmpegError::Eof) => return Ok(None),
                Err(error) if needs_input(&error) => {}
                Err(error) => return Err(FramesiftError::VideoDecode(error.to_string())),
            }

            if self.eof_sent {
                return Ok(None);
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.input_context) {
                Ok(()) => {
                    if packet.stream() == self.video_stream_index {
                        self.decoder
                            .send_packet(&packet)
                            .map_err(|error| FramesiftError::VideoDecode(error.to_string()))?;
                    }
                }
                Err(FfmpegError::Eof) => {
                    self.decoder.send_eof()?;
                    self.eof_sent = true;
                }
                Err(error) => return Err(FramesiftError::VideoDecode(error.to_string())),
            }
        }
    }
}

/// Whether `receive_frame` failed only because the decoder wants another
/// packet (`EAGAIN`). Every other errno is a real decode failure.
fn needs_input(error: &FfmpegError) -> bool {
    matches!(error, FfmpegError::Other { errno } if *errno == EAGAIN)
}

impl FrameDecoder for VideoHandle {
    fn reported_frame_rate(&self) -> Option<f64> {
        self.metadata.reported_fps
    }

    fn decode_next(&mut self) -> Result<Option<RgbImage>, FramesiftError> {
        match self.session.as_mut() {
            Some(session) => session.decode_next(),
            None => Err(FramesiftError::SourceClosed),
        }
    }

    fn frame_count_hint(&self) -> Option<u64> {
        (self.metadata.frame_count > 0).then_some(self.metadata.frame_count)
    }

    fn release(&mut self) {
        if self.session.take().is_some() {
            log::debug!("Closed video: {}", self.path.display());
        }
    }
}

impl Drop for VideoHandle {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use ffmpeg_next::{
        Error as FfmpegError,
        util::error::{EAGAIN, ENOMEM},
    };

    use super::needs_input;

    #[test]
    fn only_eagain_asks_for_more_input() {
        assert!(needs_input(&FfmpegError::Other { errno: EAGAIN }));
        assert!(!needs_input(&FfmpegError::Other { errno: ENOMEM }));
        assert!(!needs_input(&FfmpegError::Eof));
        assert!(!needs_input(&FfmpegError::InvalidData));
    }
}
