//! Benchmarks for the extraction pipeline and frame metrics.
//!
//! Run with: cargo bench
//! Run with all features: cargo bench --all-features
//!
//! The video benchmark requires fixture files from
//! `tests/fixtures/generate_fixtures.sh`; the rest use synthetic frames.

use std::path::Path;

use criterion::{BenchmarkId, Criterion};
use image::Rgb;
use vidcompare::metrics::{mse, psnr, ssim};
use vidcompare::{
    Comparator, CompareError, ExtractOptions, Frame, FrameSource, VideoExtractor, extract_frames,
};

const SAMPLE_VIDEO: &str = "tests/fixtures/sample_video.mp4";

/// Emits `remaining` 640x360 frames of a moving gradient.
struct GradientSource {
    next: u32,
    remaining: u32,
}

impl GradientSource {
    fn new(frames: u32) -> Self {
        Self {
            next: 0,
            remaining: frames,
        }
    }
}

impl FrameSource for GradientSource {
    fn read_frame(&mut self) -> Result<Option<Frame>, CompareError> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        let shift = self.next;
        self.next += 1;
        Ok(Some(Frame::from_fn(640, 360, |x, y| {
            Rgb([(x + shift) as u8, (y + shift) as u8, (x ^ y) as u8])
        })))
    }
}

fn gradient(shift: u32) -> Frame {
    Frame::from_fn(800, 800, |x, y| {
        Rgb([(x + shift) as u8, (y * 2) as u8, (x ^ y) as u8])
    })
}

fn benchmark_pipeline_workers(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("extract 48 frames, resize 800x800");
    group.sample_size(10);
    for workers in [1_usize, 2, 4, 8] {
        group.bench_with_input(
            BenchmarkId::from_parameter(workers),
            &workers,
            |bencher, &workers| {
                let options = ExtractOptions::new()
                    .with_resize(800, 800)
                    .with_workers(workers);
                bencher.iter(|| extract_frames(GradientSource::new(48), &options).unwrap());
            },
        );
    }
    group.finish();
}

fn benchmark_queue_capacity(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("extract 48 frames, 4 workers, capacity");
    group.sample_size(10);
    for capacity in [1_usize, 8, 100] {
        group.bench_with_input(
            BenchmarkId::from_parameter(capacity),
            &capacity,
            |bencher, &capacity| {
                let options = ExtractOptions::new()
                    .with_resize(400, 400)
                    .with_queue_capacity(capacity);
                bencher.iter(|| extract_frames(GradientSource::new(48), &options).unwrap());
            },
        );
    }
    group.finish();
}

fn benchmark_metrics(criterion: &mut Criterion) {
    let first = gradient(0);
    let second = gradient(3);

    criterion.bench_function("mse 800x800", |bencher| {
        bencher.iter(|| mse(&first, &second).unwrap());
    });
    criterion.bench_function("psnr 800x800", |bencher| {
        bencher.iter(|| psnr(&first, &second).unwrap());
    });
    criterion.bench_function("ssim 800x800", |bencher| {
        bencher.iter(|| ssim(&first, &second).unwrap());
    });

    let frames: Vec<Frame> = (0..8).map(gradient).collect();
    let reference: Vec<Frame> = (1..9).map(gradient).collect();
    criterion.bench_function("compare 8 frame pairs", |bencher| {
        let comparator = Comparator::new();
        bencher.iter(|| comparator.compare("bench", &frames, &reference).unwrap());
    });
}

fn benchmark_video_extraction(criterion: &mut Criterion) {
    vidcompare::set_ffmpeg_log_level(log::LevelFilter::Error);

    if !Path::new(SAMPLE_VIDEO).exists() {
        eprintln!("Skipping benchmark: fixture not found");
        return;
    }

    let mut group = criterion.benchmark_group("extract sample video");
    group.sample_size(10);
    group.bench_function("native size", |bencher| {
        let options = ExtractOptions::new();
        bencher.iter(|| VideoExtractor::open(SAMPLE_VIDEO).unwrap().extract(&options).unwrap());
    });
    group.bench_function("resize 800x800", |bencher| {
        let options = ExtractOptions::new().with_resize(800, 800);
        bencher.iter(|| VideoExtractor::open(SAMPLE_VIDEO).unwrap().extract(&options).unwrap());
    });
    group.finish();
}

criterion::criterion_group!(
    benches,
    benchmark_pipeline_workers,
    benchmark_queue_capacity,
    benchmark_metrics,
    benchmark_video_extraction,
);
criterion::criterion_main!(benches);
