//! Error handling integration tests.
//!
//! These tests verify that meaningful errors are returned for various
//! failure conditions, and that a failed run leaves no half-built output
//! behind.

mod common;

use std::sync::atomic::Ordering;

use common::{ScriptedDecoder, read_ledger};
use framesift::{
    DecodeErrorPolicy, FrameSource, FramesiftError, Preprocessor, RunConfiguration, VideoHandle,
};

fn small_config() -> RunConfiguration {
    RunConfiguration::new()
        .with_resolution(32, 24)
        .with_denoise_strength(0)
        .with_target_fps(5.0)
}

#[test]
fn open_nonexistent_file() {
    let result = VideoHandle::open("this_file_does_not_exist.mp4");
    match result {
        Err(FramesiftError::SourceUnavailable { path, .. }) => {
            assert!(path.ends_with("this_file_does_not_exist.mp4"));
        }
        other => panic!("expected SourceUnavailable, got {other:?}"),
    }
}

#[test]
fn open_invalid_file() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let invalid_file_path = temporary_directory.path().join("invalid.mp4");
    std::fs::write(&invalid_file_path, b"this is not a media file")
        .expect("Failed to write invalid file");

    let result = VideoHandle::open(&invalid_file_path);
    assert!(
        matches!(result, Err(FramesiftError::SourceUnavailable { .. })),
        "Expected SourceUnavailable for invalid media file"
    );
}

#[test]
fn missing_video_writes_nothing() {
    let output = tempfile::tempdir().expect("Failed to create temp dir");
    let preprocessor = Preprocessor::new(small_config()).expect("valid configuration");

    let result = preprocessor.run_file("this_file_does_not_exist.mp4", output.path());
    assert!(matches!(result, Err(FramesiftError::SourceUnavailable { .. })));
    assert!(!output.path().join("metadata.csv").exists());
    assert!(!output.path().join("frames").exists());
}

#[test]
fn unwritable_output_is_a_persistence_failure() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let blocker = temporary_directory.path().join("not_a_directory");
    std::fs::write(&blocker, b"occupied").expect("Failed to write blocker file");
    let output = blocker.join("out");

    let decoder = ScriptedDecoder::pattern(Some(10.0), 4, |_| true);
    let releases = decoder.release_counter();
    let result = Preprocessor::new(small_config())
        .expect("valid configuration")
        .run(FrameSource::new(decoder, 30.0), &output);

    match result {
        Err(FramesiftError::PersistenceFailure { path, .. }) => {
            assert!(path.starts_with(&blocker), "unexpected path {}", path.display());
        }
        other => panic!("expected PersistenceFailure, got {other:?}"),
    }
    assert!(!output.join("metadata.csv").exists());
    assert_eq!(releases.load(Ordering::SeqCst), 1, "source must be closed");
}

#[test]
fn strict_policy_aborts_on_decode_failure() {
    let output = tempfile::tempdir().expect("Failed to create temp dir");
    let decoder = ScriptedDecoder::pattern(Some(10.0), 5, |_| true).failing_at_end();
    let releases = decoder.release_counter();
    let config = small_config().with_decode_error_policy(DecodeErrorPolicy::Abort);

    let result = Preprocessor::new(config)
        .expect("valid configuration")
        .run(FrameSource::new(decoder, 30.0), output.path());

    assert!(matches!(result, Err(FramesiftError::VideoDecode(_))));
    assert_eq!(releases.load(Ordering::SeqCst), 1);
    // Rows for the frames examined before the failure are already flushed.
    let rows = read_ledger(&output.path().join("metadata.csv"));
    assert_eq!(rows.len(), 3);
}

#[test]
fn invalid_configuration_is_rejected_up_front() {
    let configs = [
        RunConfiguration::new().with_resolution(0, 360),
        RunConfiguration::new().with_target_fps(0.0),
        RunConfiguration::new().with_target_fps(f64::NAN),
        RunConfiguration::new().with_fallback_fps(-1.0),
        RunConfiguration::new().with_blur_threshold(f64::INFINITY),
        RunConfiguration::new().with_jpeg_quality(0),
    ];
    for config in configs {
        let result = Preprocessor::new(config.clone());
        assert!(
            matches!(result, Err(FramesiftError::InvalidConfiguration(_))),
            "{config:?} should be rejected"
        );
    }
}

#[test]
fn error_messages_name_the_problem() {
    let error = RunConfiguration::new()
        .with_target_fps(-2.0)
        .validate()
        .expect_err("negative rate");
    let message = error.to_string();
    assert!(message.contains("target fps"), "{message}");
}
