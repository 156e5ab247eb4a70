//! Progress reporting.
//!
//! A [`ProgressCallback`] attached to a
//! [`Preprocessor`](crate::Preprocessor) receives a [`ProgressInfo`]
//! snapshot after every examined frame. Callbacks only observe; they cannot
//! stop the run.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use framesift::{Preprocessor, ProgressCallback, ProgressInfo, RunConfiguration};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("frame {}: {} examined, {} kept", info.frame_index, info.examined, info.kept);
//!     }
//! }
//!
//! let preprocessor = Preprocessor::new(RunConfiguration::new())?
//!     .with_progress(Arc::new(PrintProgress));
//! preprocessor.run_file("flight.mp4", "out")?;
//! # Ok::<(), framesift::FramesiftError>(())
//! ```

use std::time::{Duration, Instant};

/// A snapshot taken right after a frame was examined.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Source index of the frame just examined.
    pub frame_index: u64,
    /// Timestamp of that frame in seconds.
    pub timestamp_seconds: f64,
    /// Frames examined so far.
    pub examined: u64,
    /// Frames kept so far.
    pub kept: u64,
    /// Estimated number of frames that will be examined, if the source
    /// reported a frame count.
    pub expected: Option<u64>,
    /// Wall-clock time since the run started.
    pub elapsed: Duration,
}

/// Receives progress updates during a run.
pub trait ProgressCallback: Send + Sync {
    /// Called once per examined frame.
    fn on_progress(&self, info: &ProgressInfo);
}

/// Discards all notifications; the default.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Running counters for one preprocessing run.
pub(crate) struct ProgressTracker {
    expected: Option<u64>,
    examined: u64,
    kept: u64,
    start_time: Instant,
}

impl ProgressTracker {
    pub(crate) fn new(expected: Option<u64>) -> Self {
        Self {
            expected,
            examined: 0,
            kept: 0,
            start_time: Instant::now(),
        }
    }

    /// Count one examined frame and build the snapshot to report.
    pub(crate) fn advance(
        &mut self,
        frame_index: u64,
        timestamp_seconds: f64,
        kept: bool,
    ) -> ProgressInfo {
        self.examined += 1;
        if kept {
            self.kept += 1;
        }
        ProgressInfo {
            frame_index,
            timestamp_seconds,
            examined: self.examined,
            kept: self.kept,
            expected: self.expected,
            elapsed: self.start_time.elapsed(),
        }
    }

    pub(crate) fn examined(&self) -> u64 {
        self.examined
    }

    pub(crate) fn kept(&self) -> u64 {
        self.kept
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}
