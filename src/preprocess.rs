//! The sampling and ledger orchestrator.
//!
//! [`Preprocessor`] drives one run over a [`FrameSource`]:
//!
//! 1. resolve the source frame rate and derive the decimation step;
//! 2. create `frames/` and `metadata.csv` under the output directory;
//! 3. pull frames in order, skipping every frame whose index is not a
//!    multiple of the step (skipped frames never reach the ledger);
//! 4. transform and score each sampled frame, keep it when its score is at
//!    least the blur threshold, and append one ledger row;
//! 5. flush the ledger and close the source.
//!
//! Everything is sequential: one frame is decoded, transformed, written and
//! logged before the next is pulled. The source is closed on every exit
//! path. A failure while writing leaves the ledger and frames written so far
//! in place and is returned to the caller.

use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use image::{ImageError, RgbImage, codecs::jpeg::JpegEncoder};

use crate::{
    config::{DecodeErrorPolicy, RunConfiguration},
    decoder::VideoHandle,
    error::FramesiftError,
    ledger::{LEDGER_FILE_NAME, LedgerRecord, LedgerWriter},
    progress::{NoOpProgress, ProgressCallback, ProgressTracker},
    source::{Frame, FrameDecoder, FrameRead, FrameSource, StreamEnd, open_video},
    transform::transform,
};

/// Directory, under the output directory, that receives kept frames.
pub const FRAMES_DIR_NAME: &str = "frames";

/// File name of a kept frame: the source index zero-padded to 8 digits.
pub fn frame_file_name(frame_index: u64) -> String {
    format!("frame_{frame_index:08}.jpg")
}

/// What a finished run did.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Source frame rate after fallback resolution.
    pub source_fps: f64,
    /// Decimation step that was applied.
    pub step: u64,
    /// Frames pulled from the source, sampled or not.
    pub frames_read: u64,
    /// Frames transformed, scored and logged.
    pub examined: u64,
    /// Frames written to disk.
    pub kept: u64,
    /// Why the source stopped.
    pub stream_end: StreamEnd,
    /// Path of `metadata.csv`.
    pub ledger_path: PathBuf,
    /// Directory holding kept frames.
    pub frames_dir: PathBuf,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

impl RunSummary {
    /// Whether the source ended on a decoder failure rather than cleanly.
    pub fn is_truncated(&self) -> bool {
        matches!(self.stream_end, StreamEnd::DecodeFailure(_))
    }
}

/// Runs the preprocessing pipeline with one validated configuration.
#[derive(Clone)]
pub struct Preprocessor {
    config: RunConfiguration,
    progress: Arc<dyn ProgressCallback>,
}

impl std::fmt::Debug for Preprocessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preprocessor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Preprocessor {
    /// Validate `config` and build a preprocessor around it.
    ///
    /// # Errors
    ///
    /// Returns [`FramesiftError::InvalidConfiguration`] if any setting is out
    /// of range.
    pub fn new(config: RunConfiguration) -> Result<Self, FramesiftError> {
        config.validate()?;
        Ok(Self {
            config,
            progress: Arc::new(NoOpProgress),
        })
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// The configuration this preprocessor runs with.
    pub fn config(&self) -> &RunConfiguration {
        &self.config
    }

    /// Open `video` with FFmpeg and [`run`](Preprocessor::run) over it.
    ///
    /// # Errors
    ///
    /// Returns [`FramesiftError::SourceUnavailable`] before anything is
    /// written if the video cannot be opened, plus every error of `run`.
    pub fn run_file<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        video: P,
        output_dir: Q,
    ) -> Result<RunSummary, FramesiftError> {
        let source: FrameSource<VideoHandle> = open_video(video, self.config.fallback_fps)?;
        self.run(source, output_dir)
    }

    /// Process `source` into `output_dir`, taking ownership of the source and
    /// closing it whether or not the run succeeds.
    ///
    /// # Errors
    ///
    /// - [`FramesiftError::InvalidConfiguration`] if the resolved rates are
    ///   unusable.
    /// - [`FramesiftError::PersistenceFailure`] if the output directory,
    ///   ledger or a kept frame cannot be written.
    /// - [`FramesiftError::VideoDecode`] if the stream ends on a decoder
    ///   failure under [`DecodeErrorPolicy::Abort`].
    pub fn run<D: FrameDecoder, Q: AsRef<Path>>(
        &self,
        mut source: FrameSource<D>,
        output_dir: Q,
    ) -> Result<RunSummary, FramesiftError> {
        let result = self.drive(&mut source, output_dir.as_ref());
        source.close();
        result
    }

    fn drive<D: FrameDecoder>(
        &self,
        source: &mut FrameSource<D>,
        output_dir: &Path,
    ) -> Result<RunSummary, FramesiftError> {
        let source_fps = source.frame_rate();
        let policy = self.config.sampling_policy(source_fps)?;
        let step = policy.step();

        let frames_dir = output_dir.join(FRAMES_DIR_NAME);
        fs::create_dir_all(&frames_dir)
            .map_err(|error| FramesiftError::persistence(&frames_dir, error))?;
        let ledger_path = output_dir.join(LEDGER_FILE_NAME);
        let mut ledger = LedgerWriter::create(&ledger_path)?;

        let expected = source
            .decoder()
            .frame_count_hint()
            .map(|frames| frames.div_ceil(step));
        let mut tracker = ProgressTracker::new(expected);

        log::info!(
            "Sampling every {step} frame(s) (source {source_fps:.3} fps, target {} fps) into {}",
            self.config.target_fps,
            output_dir.display(),
        );

        let stream_end = loop {
            let frame = match source.next_frame()? {
                FrameRead::Frame(frame) => frame,
                FrameRead::EndOfStream(end) => break end,
            };
            if !policy.is_sampled(frame.index) {
                continue;
            }

            let record = self.examine(&frame, &frames_dir)?;
            ledger.append(&record)?;
            let info = tracker.advance(frame.index, frame.timestamp_seconds, record.kept);
            self.progress.on_progress(&info);
        };

        ledger.finish()?;

        if let StreamEnd::DecodeFailure(message) = &stream_end {
            match self.config.decode_error_policy {
                DecodeErrorPolicy::Abort => {
                    return Err(FramesiftError::VideoDecode(message.clone()));
                }
                DecodeErrorPolicy::Stop => log::warn!(
                    "Stream ended early after {} frames: {message}",
                    source.frames_read()
                ),
            }
        }

        let summary = RunSummary {
            source_fps,
            step,
            frames_read: source.frames_read(),
            examined: tracker.examined(),
            kept: tracker.kept(),
            stream_end,
            ledger_path,
            frames_dir,
            elapsed: tracker.elapsed(),
        };

        log::info!(
            "Examined {} of {} frames, kept {} in {:.2?}",
            summary.examined,
            summary.frames_read,
            summary.kept,
            summary.elapsed,
        );

        Ok(summary)
    }

    /// Transform, score and, if sharp enough, persist one sampled frame.
    fn examine(&self, frame: &Frame, frames_dir: &Path) -> Result<LedgerRecord, FramesiftError> {
        let config = &self.config;
        let (processed, quality) = transform(
            &frame.pixels,
            config.target_width,
            config.target_height,
            config.denoise_strength,
        )?;
        let kept = !quality.is_blurry(config.blur_threshold);

        let stored_path = if kept {
            let path = frames_dir.join(frame_file_name(frame.index));
            write_jpeg(&processed, &path, config.jpeg_quality)?;
            Some(path)
        } else {
            None
        };

        log::debug!(
            "frame {} t={:.4}s score={quality} {}",
            frame.index,
            frame.timestamp_seconds,
            if kept { "kept" } else { "rejected" },
        );

        Ok(LedgerRecord {
            frame_index: frame.index,
            time_sec: frame.timestamp_seconds,
            quality_score: quality.value(),
            kept,
            stored_path,
        })
    }
}

fn write_jpeg(image: &RgbImage, path: &Path, quality: u8) -> Result<(), FramesiftError> {
    let file = File::create(path).map_err(|error| FramesiftError::persistence(path, error))?;
    let mut writer = BufWriter::new(file);
    image
        .write_with_encoder(JpegEncoder::new_with_quality(&mut writer, quality))
        .map_err(|error| match error {
            ImageError::IoError(source) => FramesiftError::persistence(path, source),
            other => FramesiftError::Image(other),
        })?;
    writer
        .flush()
        .map_err(|error| FramesiftError::persistence(path, error))
}
