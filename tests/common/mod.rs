//! Shared helpers for integration tests: a scripted in-memory decoder and
//! synthetic frames with known sharpness.

#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use framesift::{FrameDecoder, FramesiftError};
use image::{Rgb, RgbImage};

pub const FRAME_WIDTH: u32 = 64;
pub const FRAME_HEIGHT: u32 = 48;

/// A 4-pixel checkerboard; scores far above any sensible threshold.
pub fn sharp_frame() -> RgbImage {
    RgbImage::from_fn(FRAME_WIDTH, FRAME_HEIGHT, |x, y| {
        if (x / 4 + y / 4) % 2 == 0 {
            Rgb([25, 30, 35])
        } else {
            Rgb([225, 220, 215])
        }
    })
}

/// A uniform frame; scores exactly zero.
pub fn flat_frame() -> RgbImage {
    RgbImage::from_pixel(FRAME_WIDTH, FRAME_HEIGHT, Rgb([120, 128, 136]))
}

/// Feeds a fixed list of frames, optionally failing once they run out.
pub struct ScriptedDecoder {
    reported_fps: Option<f64>,
    frames: VecDeque<RgbImage>,
    fail_at_end: bool,
    count_hint: Option<u64>,
    releases: Arc<AtomicUsize>,
}

impl ScriptedDecoder {
    pub fn new(reported_fps: Option<f64>, frames: Vec<RgbImage>) -> Self {
        Self {
            reported_fps,
            count_hint: Some(frames.len() as u64),
            frames: frames.into(),
            fail_at_end: false,
            releases: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// `count` frames where frame `i` is sharp when `sharp(i)` holds.
    pub fn pattern(reported_fps: Option<f64>, count: u64, sharp: impl Fn(u64) -> bool) -> Self {
        let frames = (0..count)
            .map(|index| if sharp(index) { sharp_frame() } else { flat_frame() })
            .collect();
        Self::new(reported_fps, frames)
    }

    /// End with a decoder error instead of a clean end of stream.
    pub fn failing_at_end(mut self) -> Self {
        self.fail_at_end = true;
        self
    }

    /// Shared counter of `release` calls.
    pub fn release_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.releases)
    }
}

impl FrameDecoder for ScriptedDecoder {
    fn reported_frame_rate(&self) -> Option<f64> {
        self.reported_fps
    }

    fn decode_next(&mut self) -> Result<Option<RgbImage>, FramesiftError> {
        match self.frames.pop_front() {
            Some(frame) => Ok(Some(frame)),
            None if self.fail_at_end => Err(FramesiftError::VideoDecode(
                "invalid NAL unit size".to_string(),
            )),
            None => Ok(None),
        }
    }

    fn release(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }

    fn frame_count_hint(&self) -> Option<u64> {
        self.count_hint
    }
}

/// One parsed ledger row.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub frame_index: u64,
    pub time_sec: String,
    pub blur_score: f64,
    pub saved: bool,
    pub path: String,
}

/// Read `metadata.csv`, check its header and parse every row.
pub fn read_ledger(path: &std::path::Path) -> Vec<Row> {
    let text = std::fs::read_to_string(path).expect("Failed to read ledger");
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("frame_index,time_sec,blur_score,saved,path")
    );
    lines
        .map(|line| {
            let fields: Vec<&str> = line.splitn(5, ',').collect();
            assert_eq!(fields.len(), 5, "malformed row: {line}");
            Row {
                frame_index: fields[0].parse().expect("frame_index"),
                time_sec: fields[1].to_string(),
                blur_score: fields[2].parse().expect("blur_score"),
                saved: match fields[3] {
                    "1" => true,
                    "0" => false,
                    other => panic!("saved must be 0 or 1, got {other}"),
                },
                path: fields[4].to_string(),
            }
        })
        .collect()
}
