//! # framesift
//!
//! Turn raw video into a curated set of still frames: sample at a target
//! rate, normalize each sample, and keep only the sharp ones.
//!
//! `framesift` decodes a video sequentially with FFmpeg (via
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next)), examines roughly
//! `target_fps` frames per second of footage, and runs every examined frame
//! through a fixed transform: area resize, CLAHE on the Lab lightness
//! channel, non-local-means denoising, and a Laplacian-variance sharpness
//! score. Frames at or above the blur threshold are written as JPEG, and
//! every examined frame gets one row in an audit ledger.
//!
//! ## Quick Start
//!
//! ```no_run
//! use framesift::{Preprocessor, RunConfiguration};
//!
//! let config = RunConfiguration::new()
//!     .with_target_fps(3.0)
//!     .with_resolution(640, 360)
//!     .with_blur_threshold(120.0);
//!
//! let summary = Preprocessor::new(config)?.run_file("flight.mp4", "out")?;
//! println!("kept {} of {} examined frames", summary.kept, summary.examined);
//! # Ok::<(), framesift::FramesiftError>(())
//! ```
//!
//! The output directory then holds:
//!
//! ```text
//! out/
//! ├── frames/
//! │   ├── frame_00000000.jpg
//! │   └── frame_00000020.jpg
//! └── metadata.csv
//! ```
//!
//! ## Pipeline
//!
//! - **Frame source**: [`FrameSource`] yields indexed, timestamped frames
//!   from any [`FrameDecoder`]; [`VideoHandle`] is the FFmpeg one
//! - **Transform**: [`transform::transform`] resizes, equalizes, denoises
//!   and scores one frame
//! - **Scoring**: [`quality::score`] is the variance of the 4-neighbour
//!   Laplacian of the luminance
//! - **Orchestration**: [`Preprocessor`] decimates, keeps or rejects, writes
//!   frames and the [`ledger`]
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `rayon` | Denoise row bands on the rayon thread pool |
//! | `full` | Enables all of the above |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod clahe;
pub mod color;
pub mod config;
pub mod decoder;
pub mod denoise;
pub mod error;
pub mod ffmpeg;
pub mod ledger;
pub mod metadata;
pub mod preprocess;
pub mod progress;
pub mod quality;
pub mod resize;
pub mod source;
pub mod transform;
mod utilities;

pub use config::{DecodeErrorPolicy, RunConfiguration, SamplingPolicy};
pub use decoder::VideoHandle;
pub use error::FramesiftError;
pub use ffmpeg::{FfmpegLogLevel, set_ffmpeg_log_level};
pub use ledger::{LedgerRecord, LedgerWriter};
pub use metadata::VideoMetadata;
pub use preprocess::{Preprocessor, RunSummary};
pub use progress::{ProgressCallback, ProgressInfo};
pub use quality::QualityScore;
pub use source::{Frame, FrameDecoder, FrameRead, FrameSource, StreamEnd};
