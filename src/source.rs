//! Sequential, timestamped frame retrieval.
//!
//! [`FrameSource`] wraps any [`FrameDecoder`] and turns its raw pictures into
//! indexed, timestamped [`Frame`]s. It is pull-based and finite: frames come
//! out in increasing index order starting at zero, and once
//! [`FrameRead::EndOfStream`] has been returned every later read returns it
//! again. The end carries a [`StreamEnd`] so a clean end of stream can be told
//! apart from a decoder failure.
//!
//! # Example
//!
//! ```no_run
//! use framesift::{FrameRead, source::open_video};
//!
//! let mut source = open_video("flight.mp4", 30.0)?;
//! while let FrameRead::Frame(frame) = source.next_frame()? {
//!     println!("frame {} at {:.3}s", frame.index, frame.timestamp_seconds);
//! }
//! source.close();
//! # Ok::<(), framesift::FramesiftError>(())
//! ```

use std::path::Path;

use image::RgbImage;

use crate::{decoder::VideoHandle, error::FramesiftError};

/// A raw picture provider. Implemented by the FFmpeg-backed
/// [`VideoHandle`]; tests and embedders can supply their own.
pub trait FrameDecoder {
    /// Frame rate from stream metadata, unvalidated.
    fn reported_frame_rate(&self) -> Option<f64>;

    /// Decode the next picture. `Ok(None)` means the stream is exhausted.
    fn decode_next(&mut self) -> Result<Option<RgbImage>, FramesiftError>;

    /// Release decoder resources. Must tolerate repeated calls.
    fn release(&mut self);

    /// Expected total frame count, when the container states one.
    fn frame_count_hint(&self) -> Option<u64> {
        None
    }
}

/// One decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Zero-based position in the source.
    pub index: u64,
    /// `index / frame_rate`.
    pub timestamp_seconds: f64,
    /// Decoded pixels.
    pub pixels: RgbImage,
}

/// Why a source stopped producing frames.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StreamEnd {
    /// The decoder ran out of input normally.
    #[default]
    Exhausted,
    /// The decoder failed; the message describes the failure.
    DecodeFailure(String),
}

/// Outcome of one [`FrameSource::next_frame`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameRead {
    /// The next frame.
    Frame(Frame),
    /// No more frames will be produced.
    EndOfStream(StreamEnd),
}

/// Return `reported` when it is a usable rate, otherwise `fallback`.
///
/// Consumer and FPV footage regularly reports a rate of zero, a negative
/// value or NaN; none of those is an error worth surfacing.
pub fn resolve_frame_rate(reported: Option<f64>, fallback: f64) -> f64 {
    match reported {
        Some(fps) if fps.is_finite() && fps > 0.0 => fps,
        _ => {
            log::debug!("Unusable source frame rate {reported:?}, using {fallback}");
            fallback
        }
    }
}

/// Indexed, timestamped frames over a [`FrameDecoder`].
///
/// The decoder is released exactly once: by [`close`](FrameSource::close),
/// or on drop if `close` was never called.
pub struct FrameSource<D: FrameDecoder> {
    decoder: D,
    frame_rate: f64,
    next_index: u64,
    finished: Option<StreamEnd>,
    closed: bool,
}

impl<D: FrameDecoder> FrameSource<D> {
    /// Wrap `decoder`, resolving its frame rate against `fallback_fps`.
    pub fn new(decoder: D, fallback_fps: f64) -> Self {
        let frame_rate = resolve_frame_rate(decoder.reported_frame_rate(), fallback_fps);
        Self {
            decoder,
            frame_rate,
            next_index: 0,
            finished: None,
            closed: false,
        }
    }

    /// The resolved frame rate; always positive.
    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    /// Number of frames produced so far.
    pub fn frames_read(&self) -> u64 {
        self.next_index
    }

    /// The underlying decoder.
    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    /// Pull the next frame.
    ///
    /// Decoder failures end the stream with [`StreamEnd::DecodeFailure`]
    /// rather than an `Err`.
    ///
    /// # Errors
    ///
    /// Returns [`FramesiftError::SourceClosed`] after [`close`](FrameSource::close).
    pub fn next_frame(&mut self) -> Result<FrameRead, FramesiftError> {
        if self.closed {
            return Err(FramesiftError::SourceClosed);
        }
        if let Some(end) = &self.finished {
            return Ok(FrameRead::EndOfStream(end.clone()));
        }

        let end = match self.decoder.decode_next() {
            Ok(Some(pixels)) => {
                let index = self.next_index;
                self.next_index += 1;
                return Ok(FrameRead::Frame(Frame {
                    index,
                    timestamp_seconds: index as f64 / self.frame_rate,
                    pixels,
                }));
            }
            Ok(None) => StreamEnd::Exhausted,
            Err(error) => {
                log::debug!("Decoder failed after {} frames: {error}", self.next_index);
                StreamEnd::DecodeFailure(error.to_string())
            }
        };

        self.finished = Some(end.clone());
        Ok(FrameRead::EndOfStream(end))
    }

    /// Release the decoder. Later calls do nothing.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.decoder.release();
        }
    }

    /// Whether [`close`](FrameSource::close) has run.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl<D: FrameDecoder> Drop for FrameSource<D> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Open `path` with FFmpeg and wrap it in a [`FrameSource`].
///
/// # Errors
///
/// Returns [`FramesiftError::SourceUnavailable`] if the file cannot be
/// opened or has no decodable video stream.
pub fn open_video<P: AsRef<Path>>(
    path: P,
    fallback_fps: f64,
) -> Result<FrameSource<VideoHandle>, FramesiftError> {
    let handle = VideoHandle::open(path)?;
    Ok(FrameSource::new(handle, fallback_fps))
}
