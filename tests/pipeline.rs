//! Extraction pipeline tests against in-memory frame sources.
//!
//! No fixtures required: every source here synthesizes its frames.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use image::Rgb;
use vidcompare::{
    CancellationToken, CompareError, ExtractOptions, Frame, FrameSource, OperationType,
    Passthrough, ProgressCallback, ProgressInfo, extract_frames, extract_frames_with,
};

/// Solid-colour frames whose red channel is the frame index.
struct SyntheticSource {
    next: u64,
    total: u64,
    fail_at: Option<u64>,
    width: u32,
    height: u32,
    released: Option<Arc<AtomicBool>>,
    cancel_at: Option<(u64, CancellationToken)>,
}

impl SyntheticSource {
    fn new(total: u64) -> Self {
        Self {
            next: 0,
            total,
            fail_at: None,
            width: 32,
            height: 24,
            released: None,
            cancel_at: None,
        }
    }

    fn failing_at(mut self, index: u64) -> Self {
        self.fail_at = Some(index);
        self
    }

    fn tracking_release(mut self, flag: Arc<AtomicBool>) -> Self {
        self.released = Some(flag);
        self
    }

    fn cancelling_at(mut self, index: u64, token: CancellationToken) -> Self {
        self.cancel_at = Some((index, token));
        self
    }
}

impl FrameSource for SyntheticSource {
    fn read_frame(&mut self) -> Result<Option<Frame>, CompareError> {
        if let Some((index, token)) = &self.cancel_at {
            if self.next == *index {
                token.cancel();
            }
        }
        if self.fail_at == Some(self.next) {
            return Err(CompareError::VideoDecodeError(format!(
                "corrupt packet at frame {}",
                self.next
            )));
        }
        if self.next >= self.total {
            return Ok(None);
        }
        let value = self.next as u8;
        self.next += 1;
        Ok(Some(Frame::from_pixel(
            self.width,
            self.height,
            Rgb([value, 255 - value, 7]),
        )))
    }

    fn frame_count_hint(&self) -> Option<u64> {
        Some(self.total)
    }
}

impl Drop for SyntheticSource {
    fn drop(&mut self) {
        if let Some(flag) = &self.released {
            flag.store(true, Ordering::SeqCst);
        }
    }
}

fn frame_tag(frame: &Frame) -> u8 {
    frame.get_pixel(0, 0).0[0]
}

fn assert_in_decode_order(frames: &[Frame]) {
    for (position, frame) in frames.iter().enumerate() {
        assert_eq!(
            frame_tag(frame) as usize,
            position,
            "frame at position {position} is out of order"
        );
    }
}

// ── Ordering and completeness ────────────────────────────────────

#[test]
fn resize_five_frames_with_small_queue() {
    let options = ExtractOptions::new()
        .with_resize(100, 100)
        .with_workers(4)
        .with_queue_capacity(2);

    let frames = extract_frames(SyntheticSource::new(5), &options).expect("extraction failed");

    assert_eq!(frames.len(), 5);
    for frame in &frames {
        assert_eq!(frame.dimensions(), (100, 100));
    }
    assert_in_decode_order(&frames);
}

#[test]
fn resize_uses_height_then_width() {
    let options = ExtractOptions::new().with_resize(40, 60);
    let frames = extract_frames(SyntheticSource::new(2), &options).expect("extraction failed");
    assert_eq!(frames[0].dimensions(), (60, 40));
}

#[test]
fn no_resize_keeps_source_shape() {
    let frames =
        extract_frames(SyntheticSource::new(3), &ExtractOptions::new()).expect("extraction failed");
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0].dimensions(), (32, 24));
}

#[test]
fn zero_frame_source_yields_empty_sequence() {
    let frames =
        extract_frames(SyntheticSource::new(0), &ExtractOptions::new()).expect("extraction failed");
    assert!(frames.is_empty());
}

#[test]
fn single_worker_preserves_order() {
    let options = ExtractOptions::new().with_workers(1).with_queue_capacity(3);
    let frames = extract_frames(SyntheticSource::new(40), &options).expect("extraction failed");
    assert_eq!(frames.len(), 40);
    assert_in_decode_order(&frames);
}

#[test]
fn worker_count_does_not_change_output() {
    let run = |workers: usize| {
        let options = ExtractOptions::new()
            .with_resize(16, 16)
            .with_workers(workers)
            .with_queue_capacity(4);
        extract_frames(SyntheticSource::new(60), &options).expect("extraction failed")
    };

    let single = run(1);
    assert_eq!(single.len(), 60);
    assert_eq!(run(2), single);
    assert_eq!(run(8), single);
}

#[test]
fn repeated_runs_are_identical() {
    let options = ExtractOptions::new().with_resize(20, 30).with_workers(3);
    let first = extract_frames(SyntheticSource::new(25), &options).expect("extraction failed");
    let second = extract_frames(SyntheticSource::new(25), &options).expect("extraction failed");
    assert_eq!(first, second);
}

#[test]
fn more_workers_than_frames() {
    let options = ExtractOptions::new().with_workers(16).with_queue_capacity(1);
    let frames = extract_frames(SyntheticSource::new(3), &options).expect("extraction failed");
    assert_eq!(frames.len(), 3);
    assert_in_decode_order(&frames);
}

// ── Failure handling ─────────────────────────────────────────────

#[test]
fn decode_failure_truncates_without_error() {
    let options = ExtractOptions::new().with_workers(4).with_queue_capacity(2);
    let source = SyntheticSource::new(10).failing_at(3);

    let frames = extract_frames(source, &options).expect("decode failure must not surface");

    assert_eq!(frames.len(), 3);
    assert_in_decode_order(&frames);
}

#[test]
fn transform_failure_aborts_extraction() {
    let options = ExtractOptions::new().with_workers(4).with_queue_capacity(2);
    let transform = |frame: Frame| {
        if frame_tag(&frame) == 4 {
            Err(CompareError::InvalidConfiguration("bad frame".to_string()))
        } else {
            Ok(frame)
        }
    };

    let result = extract_frames_with(SyntheticSource::new(10), &transform, &options);

    match result {
        Err(CompareError::Transform { index, reason }) => {
            assert_eq!(index, 4);
            assert!(reason.contains("bad frame"), "unexpected reason: {reason}");
        }
        other => panic!("expected Transform error, got {other:?}"),
    }
}

#[test]
fn panicking_transform_is_reported_not_propagated() {
    let options = ExtractOptions::new().with_workers(2).with_queue_capacity(1);
    let transform = |frame: Frame| -> Result<Frame, CompareError> {
        if frame_tag(&frame) == 2 {
            panic!("transform blew up");
        }
        Ok(frame)
    };

    let result = extract_frames_with(SyntheticSource::new(6), &transform, &options);
    assert!(matches!(result, Err(CompareError::Transform { index: 2, .. })));
}

/// Panics on the report for the second frame read.
struct PanickingProgress;

impl ProgressCallback for PanickingProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if info.current == 2 {
            panic!("progress display crashed");
        }
    }
}

#[test]
fn panicking_progress_callback_is_reported_not_propagated() {
    let released = Arc::new(AtomicBool::new(false));
    let options = ExtractOptions::new()
        .with_workers(2)
        .with_queue_capacity(2)
        .with_progress(Arc::new(PanickingProgress));
    let source = SyntheticSource::new(10).tracking_release(released.clone());

    let result = extract_frames(source, &options);

    assert!(matches!(result, Err(CompareError::WorkerPanicked)));
    assert!(released.load(Ordering::SeqCst));
}

#[test]
fn transform_failure_on_every_frame_still_terminates() {
    let options = ExtractOptions::new().with_workers(3).with_queue_capacity(1);
    let transform =
        |_: Frame| -> Result<Frame, CompareError> { Err(CompareError::WorkerPanicked) };

    let result = extract_frames_with(SyntheticSource::new(50), &transform, &options);
    assert!(matches!(result, Err(CompareError::Transform { .. })));
}

#[test]
fn source_is_released_after_extraction() {
    let released = Arc::new(AtomicBool::new(false));
    let source = SyntheticSource::new(4).tracking_release(released.clone());

    extract_frames(source, &ExtractOptions::new()).expect("extraction failed");
    assert!(released.load(Ordering::SeqCst));
}

#[test]
fn source_is_released_after_transform_failure() {
    let released = Arc::new(AtomicBool::new(false));
    let source = SyntheticSource::new(8).tracking_release(released.clone());
    let transform =
        |_: Frame| -> Result<Frame, CompareError> { Err(CompareError::WorkerPanicked) };

    assert!(extract_frames_with(source, &transform, &ExtractOptions::new()).is_err());
    assert!(released.load(Ordering::SeqCst));
}

// ── Backpressure ─────────────────────────────────────────────────

/// Counts frames read and frames transformed, tracking the largest gap.
#[derive(Default)]
struct InFlight {
    read: AtomicU64,
    transformed: AtomicU64,
    peak: AtomicU64,
}

struct CountingSource {
    inner: SyntheticSource,
    in_flight: Arc<InFlight>,
}

impl FrameSource for CountingSource {
    fn read_frame(&mut self) -> Result<Option<Frame>, CompareError> {
        let frame = self.inner.read_frame()?;
        if frame.is_some() {
            let read = self.in_flight.read.fetch_add(1, Ordering::SeqCst) + 1;
            let pending = read - self.in_flight.transformed.load(Ordering::SeqCst);
            self.in_flight.peak.fetch_max(pending, Ordering::SeqCst);
        }
        Ok(frame)
    }
}

#[test]
fn frames_in_flight_are_bounded_by_capacity_and_workers() {
    let (capacity, workers) = (5, 3);
    let in_flight = Arc::new(InFlight::default());
    let source = CountingSource {
        inner: SyntheticSource::new(200),
        in_flight: in_flight.clone(),
    };
    let counter = in_flight.clone();
    let slow_transform = move |frame: Frame| -> Result<Frame, CompareError> {
        thread::sleep(Duration::from_millis(1));
        counter.transformed.fetch_add(1, Ordering::SeqCst);
        Ok(frame)
    };
    let options = ExtractOptions::new()
        .with_workers(workers)
        .with_queue_capacity(capacity);

    let frames =
        extract_frames_with(source, &slow_transform, &options).expect("extraction failed");

    assert_eq!(frames.len(), 200);
    // Queued, held by a worker, or just read and not yet enqueued.
    let bound = (capacity + workers + 1) as u64;
    let peak = in_flight.peak.load(Ordering::SeqCst);
    assert!(peak <= bound, "{peak} frames in flight, bound is {bound}");
    assert!(peak > 1, "the slow transform should have built up a backlog");
}

// ── Configuration validation ─────────────────────────────────────

#[test]
fn zero_workers_rejected() {
    let options = ExtractOptions::new().with_workers(0);
    let result = extract_frames(SyntheticSource::new(3), &options);
    assert!(matches!(result, Err(CompareError::InvalidConfiguration(_))));
}

#[test]
fn zero_queue_capacity_rejected() {
    let options = ExtractOptions::new().with_queue_capacity(0);
    let result = extract_frames(SyntheticSource::new(3), &options);
    assert!(matches!(result, Err(CompareError::InvalidConfiguration(_))));
}

#[test]
fn zero_resize_dimension_rejected() {
    let options = ExtractOptions::new().with_resize(0, 100);
    let result = extract_frames(SyntheticSource::new(3), &options);
    assert!(matches!(result, Err(CompareError::InvalidConfiguration(_))));
}

// ── Cancellation ─────────────────────────────────────────────────

#[test]
fn cancelled_before_start_returns_cancelled() {
    let token = CancellationToken::new();
    token.cancel();
    let options = ExtractOptions::new().with_cancellation(token);

    let result = extract_frames(SyntheticSource::new(10), &options);
    assert!(matches!(result, Err(CompareError::Cancelled)));
}

#[test]
fn cancelled_mid_stream_returns_cancelled() {
    let token = CancellationToken::new();
    let options = ExtractOptions::new()
        .with_cancellation(token.clone())
        .with_workers(2)
        .with_queue_capacity(1);
    let source = SyntheticSource::new(100).cancelling_at(10, token);

    let result = extract_frames(source, &options);
    assert!(matches!(result, Err(CompareError::Cancelled)));
}

// ── Progress ─────────────────────────────────────────────────────

#[derive(Default)]
struct RecordingProgress {
    calls: AtomicU64,
    last: Mutex<Option<ProgressInfo>>,
}

impl ProgressCallback for RecordingProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(info.clone());
    }
}

#[test]
fn progress_reports_every_frame_read() {
    let progress = Arc::new(RecordingProgress::default());
    let options = ExtractOptions::new().with_progress(progress.clone());

    extract_frames(SyntheticSource::new(12), &options).expect("extraction failed");

    // One report per frame plus the final one.
    assert_eq!(progress.calls.load(Ordering::SeqCst), 13);
    let last = progress.last.lock().unwrap().clone().expect("no report");
    assert_eq!(last.operation, OperationType::FrameExtraction);
    assert_eq!(last.current, 12);
    assert_eq!(last.total, Some(12));
    assert_eq!(last.percentage, Some(100.0));
}

#[test]
fn progress_batch_size_limits_reports() {
    let progress = Arc::new(RecordingProgress::default());
    let options = ExtractOptions::new()
        .with_progress(progress.clone())
        .with_batch_size(5);

    extract_frames(SyntheticSource::new(12), &options).expect("extraction failed");

    // Reports at 5 and 10, then the final one.
    assert_eq!(progress.calls.load(Ordering::SeqCst), 3);
}

// ── Boxed sources ────────────────────────────────────────────────

#[test]
fn boxed_source_and_explicit_passthrough() {
    let source: Box<dyn FrameSource> = Box::new(SyntheticSource::new(7));
    let frames = extract_frames_with(source, &Passthrough, &ExtractOptions::new().with_workers(2))
        .expect("extraction failed");
    assert_eq!(frames.len(), 7);
    assert_in_decode_order(&frames);
}
