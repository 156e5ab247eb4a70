//! Progress callback integration tests.

mod common;

use std::sync::{Arc, Mutex};

use common::ScriptedDecoder;
use framesift::{FrameSource, Preprocessor, ProgressCallback, ProgressInfo, RunConfiguration};

#[derive(Default)]
struct Recorder {
    updates: Mutex<Vec<ProgressInfo>>,
}

impl ProgressCallback for Recorder {
    fn on_progress(&self, info: &ProgressInfo) {
        self.updates
            .lock()
            .expect("progress lock poisoned")
            .push(info.clone());
    }
}

#[test]
fn callback_sees_every_examined_frame() {
    let output = tempfile::tempdir().expect("Failed to create temp dir");
    let recorder = Arc::new(Recorder::default());
    let decoder = ScriptedDecoder::pattern(Some(10.0), 9, |index| index % 4 == 0);
    let config = RunConfiguration::new()
        .with_resolution(32, 24)
        .with_denoise_strength(0)
        .with_blur_threshold(100.0)
        .with_target_fps(5.0);

    let summary = Preprocessor::new(config)
        .expect("valid configuration")
        .with_progress(recorder.clone())
        .run(FrameSource::new(decoder, 30.0), output.path())
        .expect("run should succeed");

    let updates = recorder.updates.lock().expect("progress lock poisoned");
    let indices: Vec<u64> = updates.iter().map(|info| info.frame_index).collect();
    assert_eq!(indices, vec![0, 2, 4, 6, 8]);

    let examined: Vec<u64> = updates.iter().map(|info| info.examined).collect();
    assert_eq!(examined, vec![1, 2, 3, 4, 5]);

    let kept: Vec<u64> = updates.iter().map(|info| info.kept).collect();
    assert_eq!(kept, vec![1, 1, 2, 2, 3]);

    // 9 frames at a step of 2.
    assert!(updates.iter().all(|info| info.expected == Some(5)));
    assert_eq!(updates[2].timestamp_seconds, 0.4);

    let last = updates.last().expect("at least one update");
    assert_eq!(last.examined, summary.examined);
    assert_eq!(last.kept, summary.kept);
}

#[test]
fn no_callback_is_fine() {
    let output = tempfile::tempdir().expect("Failed to create temp dir");
    let decoder = ScriptedDecoder::pattern(Some(10.0), 3, |_| true);
    let summary = Preprocessor::new(RunConfiguration::new().with_resolution(32, 24))
        .expect("valid configuration")
        .run(FrameSource::new(decoder, 30.0), output.path())
        .expect("run should succeed");
    assert_eq!(summary.frames_read, 3);
}
