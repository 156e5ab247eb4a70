//! Tests against real video files.
//!
//! Tests require fixture files from `tests/fixtures/generate_fixtures.sh`
//! and return early when they are missing.

mod common;

use std::path::Path;

use common::read_ledger;
use framesift::{
    FrameDecoder, FrameRead, Preprocessor, RunConfiguration, VideoHandle, source::open_video,
};

fn sample_video_path() -> &'static str {
    "tests/fixtures/sample_video.mp4"
}

fn blurry_video_path() -> &'static str {
    "tests/fixtures/blurry_video.mp4"
}

#[test]
fn metadata_is_read_at_open() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let handle = VideoHandle::open(path).expect("Failed to open test video");
    let metadata = handle.metadata();
    assert_eq!((metadata.width, metadata.height), (640, 480));
    assert_eq!(metadata.codec, "h264");
    let fps = metadata.reported_fps.expect("fixture reports a frame rate");
    assert!((fps - 30.0).abs() < 0.01, "fps = {fps}");
    assert!(metadata.frame_count >= 140, "frame_count = {}", metadata.frame_count);
    assert_eq!(handle.frame_count_hint(), Some(metadata.frame_count));
}

#[test]
fn frames_come_out_in_order_at_native_size() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let mut source = open_video(path, 30.0).expect("Failed to open test video");
    let mut expected_index = 0;
    while let FrameRead::Frame(frame) = source.next_frame().expect("source is open") {
        assert_eq!(frame.index, expected_index);
        assert_eq!(frame.pixels.dimensions(), (640, 480));
        expected_index += 1;
    }
    assert_eq!(expected_index, 150);
    source.close();
    assert!(!source.decoder().is_open());
}

#[test]
fn sample_video_run_keeps_sharp_frames() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let output = tempfile::tempdir().expect("Failed to create temp dir");
    let summary = Preprocessor::new(RunConfiguration::new())
        .expect("valid configuration")
        .run_file(path, output.path())
        .expect("run should succeed");

    assert_eq!(summary.step, 10);
    assert_eq!(summary.examined, 15);
    assert!(summary.kept > 0);

    let rows = read_ledger(&summary.ledger_path);
    assert_eq!(rows.len(), 15);
    for row in rows.iter().filter(|row| row.saved) {
        let image = image::open(&row.path).expect("kept frame should decode");
        assert_eq!((image.width(), image.height()), (640, 360));
    }
}

#[test]
fn blurry_video_keeps_little() {
    let sharp_path = sample_video_path();
    let blurry_path = blurry_video_path();
    if !Path::new(sharp_path).exists() || !Path::new(blurry_path).exists() {
        return;
    }

    let config = RunConfiguration::new().with_target_fps(1.0);
    let preprocessor = Preprocessor::new(config).expect("valid configuration");

    let sharp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let blurry_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let sharp = preprocessor.run_file(sharp_path, sharp_dir.path()).expect("sharp run");
    let blurry = preprocessor.run_file(blurry_path, blurry_dir.path()).expect("blurry run");

    let mean_score = |path: &Path| {
        let rows = read_ledger(path);
        rows.iter().map(|row| row.blur_score).sum::<f64>() / rows.len() as f64
    };
    assert!(mean_score(&sharp.ledger_path) > mean_score(&blurry.ledger_path));
    assert!(blurry.kept <= sharp.kept);
}
