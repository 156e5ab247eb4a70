//! Benchmarks for the transform stage, its kernels, and a full run.
//!
//! Run with: cargo bench
//! Run with parallel denoising: cargo bench --features rayon
//!
//! The full-run benchmark requires fixture files from
//! `tests/fixtures/generate_fixtures.sh`.

use std::{hint::black_box, path::Path};

use criterion::Criterion;
use framesift::{
    FfmpegLogLevel, Preprocessor, RunConfiguration, clahe, color, quality, resize,
    transform::{self, CLAHE_CLIP_LIMIT, CLAHE_TILE_GRID},
};
use image::{Rgb, RgbImage};

const SAMPLE_VIDEO: &str = "tests/fixtures/sample_video.mp4";

/// A 1280x720 frame with texture at several scales.
fn synthetic_frame() -> RgbImage {
    RgbImage::from_fn(1280, 720, |x, y| {
        let fine = ((x ^ y) & 0x0f) as u8 * 4;
        let coarse = if (x / 40 + y / 40) % 2 == 0 { 60 } else { 180 };
        Rgb([coarse + fine, coarse, 255 - coarse - fine])
    })
}

fn benchmark_kernels(criterion: &mut Criterion) {
    let frame = synthetic_frame();
    let resized = resize::resize_area(&frame, 640, 360).unwrap();
    let lab = color::rgb_to_lab(&resized);
    let luma = color::luminance(&resized);

    criterion.bench_function("area resize 1280x720 -> 640x360", |bencher| {
        bencher.iter(|| resize::resize_area(black_box(&frame), 640, 360).unwrap());
    });

    criterion.bench_function("rgb -> lab 640x360", |bencher| {
        bencher.iter(|| color::rgb_to_lab(black_box(&resized)));
    });

    criterion.bench_function("clahe 640x360", |bencher| {
        bencher.iter(|| {
            clahe::equalize(black_box(&lab.lightness), CLAHE_TILE_GRID, CLAHE_CLIP_LIMIT).unwrap()
        });
    });

    criterion.bench_function("laplacian variance 640x360", |bencher| {
        bencher.iter(|| quality::score(black_box(&luma)));
    });
}

fn benchmark_denoise(criterion: &mut Criterion) {
    let frame = resize::resize_area(&synthetic_frame(), 640, 360).unwrap();

    let mut group = criterion.benchmark_group("nl-means denoise 640x360");
    group.sample_size(10);
    for strength in [3_u32, 6, 10] {
        group.bench_function(format!("h={strength}"), |bencher| {
            bencher.iter(|| transform::denoise(black_box(&frame), strength).unwrap());
        });
    }
    group.finish();
}

fn benchmark_transform(criterion: &mut Criterion) {
    let frame = synthetic_frame();

    let mut group = criterion.benchmark_group("transform");
    group.sample_size(10);
    group.bench_function("1280x720 -> 640x360, denoise 6", |bencher| {
        bencher.iter(|| transform::transform(black_box(&frame), 640, 360, 6).unwrap());
    });
    group.bench_function("1280x720 -> 640x360, no denoise", |bencher| {
        bencher.iter(|| transform::transform(black_box(&frame), 640, 360, 0).unwrap());
    });
    group.finish();
}

fn benchmark_full_run(criterion: &mut Criterion) {
    framesift::set_ffmpeg_log_level(FfmpegLogLevel::Error);

    if !Path::new(SAMPLE_VIDEO).exists() {
        eprintln!("Skipping benchmark: fixture not found");
        return;
    }

    let preprocessor = Preprocessor::new(RunConfiguration::new()).unwrap();
    let output = tempfile::tempdir().unwrap();

    let mut group = criterion.benchmark_group("pipeline");
    group.sample_size(10);
    group.bench_function("sample_video.mp4 at 3 fps", |bencher| {
        bencher.iter(|| preprocessor.run_file(SAMPLE_VIDEO, output.path()).unwrap());
    });
    group.finish();
}

criterion::criterion_group!(
    benches,
    benchmark_kernels,
    benchmark_denoise,
    benchmark_transform,
    benchmark_full_run,
);

criterion::criterion_main!(benches);
