//! Benchmarks for stepping, motion vector extraction and pixel conversion.
//!
//! Run with: cargo bench
//!
//! Requires fixture files from `tests/fixtures/generate_fixtures.sh`.

use std::path::Path;

use criterion::Criterion;
use mvcapture::{CaptureOptions, CaptureSession, FfmpegLogLevel, PixelFormat};

const WITH_B_FRAMES: &str = "tests/fixtures/with_b_frames.mp4";

fn fixture_available() -> bool {
    mvcapture::set_ffmpeg_log_level(FfmpegLogLevel::Error);
    if Path::new(WITH_B_FRAMES).exists() {
        true
    } else {
        eprintln!("Skipping benchmark: fixture not found");
        false
    }
}

fn benchmark_step_only(criterion: &mut Criterion) {
    if !fixture_available() {
        return;
    }

    criterion.bench_function("step through clip (no extraction)", |bencher| {
        bencher.iter(|| {
            let mut session = CaptureSession::open(WITH_B_FRAMES).unwrap();
            while session.step().unwrap().is_some() {}
        });
    });
}

fn benchmark_motion_vectors(criterion: &mut Criterion) {
    if !fixture_available() {
        return;
    }

    criterion.bench_function("step and extract motion vectors", |bencher| {
        bencher.iter(|| {
            let mut session = CaptureSession::open(WITH_B_FRAMES).unwrap();
            let mut total = 0;
            while let Some(decoded) = session.step().unwrap() {
                total += decoded.motion_vectors().len();
            }
            total
        });
    });
}

fn benchmark_read(criterion: &mut Criterion) {
    if !fixture_available() {
        return;
    }

    let mut group = criterion.benchmark_group("read (vectors + pixels)");
    for format in [PixelFormat::Bgr8, PixelFormat::Rgba8, PixelFormat::Gray8] {
        group.bench_function(format.to_string(), |bencher| {
            bencher.iter(|| {
                let options = CaptureOptions::new().with_pixel_format(format);
                let mut session = CaptureSession::open_with_options(WITH_B_FRAMES, options).unwrap();
                while session.read().unwrap().is_some() {}
            });
        });
    }
    group.finish();
}

#[cfg(feature = "rayon")]
fn benchmark_parallel(criterion: &mut Criterion) {
    if !fixture_available() {
        return;
    }

    let sources = [WITH_B_FRAMES; 4];
    criterion.bench_function("read 4 inputs in parallel", |bencher| {
        bencher.iter(|| mvcapture::parallel::read_all(&sources, &CaptureOptions::new()));
    });
}

#[cfg(not(feature = "rayon"))]
fn benchmark_parallel(_criterion: &mut Criterion) {}

criterion::criterion_group!(
    benches,
    benchmark_step_only,
    benchmark_motion_vectors,
    benchmark_read,
    benchmark_parallel,
);
criterion::criterion_main!(benches);
