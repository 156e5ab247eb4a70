use std::{path::PathBuf, sync::Arc};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use framesift::{
    DecodeErrorPolicy, FfmpegLogLevel, FrameDecoder, Preprocessor, ProgressCallback,
    ProgressInfo, RunConfiguration, RunSummary, VideoHandle, config, source::resolve_frame_rate,
    transform::transform,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use tracing_subscriber::filter::LevelFilter;

const CLI_AFTER_HELP: &str = "Examples:\n  framesift run --video flight.mp4 --out dataset --target-fps 2 --progress\n  framesift probe flight.mp4 --json\n  framesift score frames/*.jpg --blur-threshold 120\n  framesift completions zsh > _framesift";

#[derive(Debug, Parser)]
#[command(
    name = "framesift",
    version,
    about = "Sample, normalize and blur-filter still frames from video",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show per-frame debug logging.
    #[arg(long, global = true)]
    verbose: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long, global = true)]
    log_level: Option<FfmpegLogLevel>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Sample a video into `<out>/frames` and `<out>/metadata.csv`.
    #[command(
        about = "Run the preprocessing pipeline",
        after_help = "Examples:\n  framesift run --video flight.mp4 --out dataset\n  framesift run --video flight.mp4 --out dataset --width 1280 --height 720 --blur-threshold 80"
    )]
    Run {
        /// Input video path.
        #[arg(long)]
        video: PathBuf,
        /// Output directory; created if missing.
        #[arg(long)]
        out: PathBuf,
        /// Frames examined per second of video.
        #[arg(long, default_value_t = config::DEFAULT_TARGET_FPS)]
        target_fps: f64,
        /// Output frame width.
        #[arg(long, default_value_t = config::DEFAULT_WIDTH)]
        width: u32,
        /// Output frame height.
        #[arg(long, default_value_t = config::DEFAULT_HEIGHT)]
        height: u32,
        /// Minimum sharpness score for a frame to be kept.
        #[arg(long, default_value_t = config::DEFAULT_BLUR_THRESHOLD)]
        blur_threshold: f64,
        /// Non-local-means strength; 0 disables denoising.
        #[arg(long, default_value_t = config::DEFAULT_DENOISE_STRENGTH)]
        denoise: u32,
        /// Frame rate assumed when the video reports none.
        #[arg(long, default_value_t = config::DEFAULT_FALLBACK_FPS)]
        fallback_fps: f64,
        /// JPEG quality of kept frames (1-100).
        #[arg(long, default_value_t = config::DEFAULT_JPEG_QUALITY)]
        jpeg_quality: u8,
        /// Fail the run on a mid-stream decode error instead of stopping early.
        #[arg(long)]
        strict: bool,
        /// Show a progress bar.
        #[arg(long)]
        progress: bool,
    },

    /// Inspect a video and report the sampling step a run would use.
    #[command(about = "Display video metadata and sampling step")]
    Probe {
        /// Input video path.
        video: PathBuf,
        /// Frames examined per second of video.
        #[arg(long, default_value_t = config::DEFAULT_TARGET_FPS)]
        target_fps: f64,
        /// Frame rate assumed when the video reports none.
        #[arg(long, default_value_t = config::DEFAULT_FALLBACK_FPS)]
        fallback_fps: f64,
        /// Output as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Transform still images and print their sharpness scores.
    #[command(about = "Score still images for blur threshold calibration")]
    Score {
        /// Images to score.
        #[arg(required = true)]
        images: Vec<PathBuf>,
        /// Width the image is resized to before scoring.
        #[arg(long, default_value_t = config::DEFAULT_WIDTH)]
        width: u32,
        /// Height the image is resized to before scoring.
        #[arg(long, default_value_t = config::DEFAULT_HEIGHT)]
        height: u32,
        /// Non-local-means strength; 0 disables denoising.
        #[arg(long, default_value_t = config::DEFAULT_DENOISE_STRENGTH)]
        denoise: u32,
        /// Threshold used to label each image sharp or blurry.
        #[arg(long, default_value_t = config::DEFAULT_BLUR_THRESHOLD)]
        blur_threshold: f64,
        /// Output as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn log_filter(global: &GlobalOptions) -> LevelFilter {
    if global.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    }
}

fn apply_global_options(global: &GlobalOptions) {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(log_filter(global))
        .init();

    if let Some(level) = global.log_level {
        framesift::set_ffmpeg_log_level(level);
    }
}

/// Drives an `indicatif` bar from pipeline progress callbacks.
struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.green} {bar:40.cyan/blue} {pos}/{len} examined {msg}",
        )?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar })
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if let Some(expected) = info.expected {
            self.bar.set_length(expected.max(info.examined));
        }
        self.bar.set_position(info.examined);
        self.bar
            .set_message(format!("({} kept, t={:.1}s)", info.kept, info.timestamp_seconds));
    }
}

const COMPLETION_MESSAGE: &str = "Preprocessing complete.";

/// Lines printed after a successful run, headline first.
fn summary_report(summary: &RunSummary) -> Vec<String> {
    vec![
        COMPLETION_MESSAGE.to_string(),
        format!(
            "  examined {} of {} frames (every {} at {:.3} fps), kept {}",
            summary.examined, summary.frames_read, summary.step, summary.source_fps, summary.kept
        ),
        format!("  ledger: {}", summary.ledger_path.display()),
        format!("  frames: {}", summary.frames_dir.display()),
    ]
}

fn print_summary(summary: &RunSummary) {
    let mut lines = summary_report(summary).into_iter();
    if let Some(headline) = lines.next() {
        println!("{}", headline.green().bold());
    }
    for line in lines {
        println!("{line}");
    }
    if summary.is_truncated() {
        eprintln!(
            "{} {}",
            "warning:".yellow().bold(),
            "the video ended on a decode error; later frames were not examined".yellow()
        );
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global);

    match cli.command {
        Commands::Run {
            video,
            out,
            target_fps,
            width,
            height,
            blur_threshold,
            denoise,
            fallback_fps,
            jpeg_quality,
            strict,
            progress,
        } => {
            let policy = if strict {
                DecodeErrorPolicy::Abort
            } else {
                DecodeErrorPolicy::Stop
            };
            let config = RunConfiguration::new()
                .with_target_fps(target_fps)
                .with_resolution(width, height)
                .with_blur_threshold(blur_threshold)
                .with_denoise_strength(denoise)
                .with_fallback_fps(fallback_fps)
                .with_jpeg_quality(jpeg_quality)
                .with_decode_error_policy(policy);

            let mut preprocessor = Preprocessor::new(config)?;
            let terminal = if progress {
                let terminal = Arc::new(TerminalProgress::new()?);
                preprocessor = preprocessor.with_progress(terminal.clone());
                Some(terminal)
            } else {
                None
            };

            let result = preprocessor.run_file(&video, &out);
            if let Some(terminal) = terminal {
                terminal.bar.finish_and_clear();
            }
            print_summary(&result?);
        }
        Commands::Probe {
            video,
            target_fps,
            fallback_fps,
            json,
        } => {
            let mut handle = VideoHandle::open(&video)?;
            let metadata = handle.metadata().clone();
            let resolved_fps = resolve_frame_rate(handle.reported_frame_rate(), fallback_fps);
            handle.release();
            let step = RunConfiguration::new()
                .with_target_fps(target_fps)
                .sampling_policy(resolved_fps)?
                .step();

            if json {
                let payload = json!({
                    "format": metadata.format,
                    "codec": metadata.codec,
                    "width": metadata.width,
                    "height": metadata.height,
                    "duration_seconds": metadata.duration.as_secs_f64(),
                    "reported_fps": metadata.reported_fps,
                    "resolved_fps": resolved_fps,
                    "frame_count": metadata.frame_count,
                    "target_fps": target_fps,
                    "step": step,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("Format: {}", metadata.format);
                println!("Codec: {}", metadata.codec);
                println!("Resolution: {}x{}", metadata.width, metadata.height);
                println!("Duration: {:.3}s", metadata.duration.as_secs_f64());
                match metadata.reported_fps {
                    Some(fps) => println!("Reported FPS: {fps:.3}"),
                    None => println!("Reported FPS: none"),
                }
                println!("Resolved FPS: {resolved_fps:.3}");
                println!("Estimated frames: {}", metadata.frame_count);
                println!("Sampling step at {target_fps} fps: every {step} frame(s)");
            }
        }
        Commands::Score {
            images,
            width,
            height,
            denoise,
            blur_threshold,
            json,
        } => {
            let mut scores = Vec::with_capacity(images.len());
            for path in &images {
                let pixels = image::open(path)?.to_rgb8();
                let (_, quality) = transform(&pixels, width, height, denoise)?;
                scores.push((path, quality));
            }

            if json {
                let payload: Vec<_> = scores
                    .iter()
                    .map(|(path, quality)| {
                        json!({
                            "path": path.display().to_string(),
                            "score": quality.value(),
                            "kept": !quality.is_blurry(blur_threshold),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                for (path, quality) in scores {
                    let verdict = if quality.is_blurry(blur_threshold) {
                        "blurry".red()
                    } else {
                        "sharp".green()
                    };
                    println!("{:>10} {verdict} {}", quality.to_string(), path.display());
                }
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "framesift", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}
