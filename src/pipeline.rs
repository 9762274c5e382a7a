//! Concurrent frame extraction.
//!
//! [`extract_frames`] decodes a [`FrameSource`] on a dedicated reader
//! thread, fans the frames out to a pool of worker threads through a bounded
//! [`WorkQueue`], and reassembles the transformed frames in decode order:
//!
//! ```text
//! source -> reader -> WorkQueue -> workers (unordered) -> ResultStore -> ordered Vec
//! ```
//!
//! The reader assigns indices `0, 1, 2, ...` in decode order. When the
//! source is exhausted (or fails to decode, or the run is cancelled) it
//! enqueues one [`WorkItem::Stop`] per worker and drops the source. The
//! caller waits until every queued item is acknowledged, joins the workers,
//! and only then reads the store.
//!
//! # Example
//!
//! ```no_run
//! use vidcompare::{CompareError, ExtractOptions, VideoExtractor};
//!
//! let options = ExtractOptions::new().with_resize(800, 800).with_workers(4);
//! let frames = VideoExtractor::open("input.mp4")?.extract(&options)?;
//! println!("{} frames", frames.len());
//! # Ok::<(), CompareError>(())
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread::{self, Scope, ScopedJoinHandle};
use std::time::Instant;

use crate::configuration::ExtractOptions;
use crate::decoder::VideoSource;
use crate::error::CompareError;
use crate::frame::{Frame, FrameSource, IndexedFrame};
use crate::metadata::VideoMetadata;
use crate::progress::{OperationType, ProgressTracker};
use crate::queue::{WorkItem, WorkQueue};
use crate::store::ResultStore;
use crate::transform::FrameTransform;

/// Extract every frame of `source`, transformed as `options` describe.
///
/// Frames are resized to [`ExtractOptions::with_resize`] when set and passed
/// through unchanged otherwise.
///
/// # Errors
///
/// - [`CompareError::InvalidConfiguration`] for zero workers or capacity.
/// - [`CompareError::Transform`] if any frame fails to transform. No partial
///   sequence is returned.
/// - [`CompareError::Cancelled`] if the cancellation token fired.
/// - [`CompareError::WorkerPanicked`] if the source or the progress
///   callback panicked.
/// - [`CompareError::SynchronizationInvariant`] if the store is incomplete
///   after the workers drained.
///
/// A decode failure in the middle of the stream is not an error: reading
/// stops and the frames decoded so far are returned.
pub fn extract_frames<S>(source: S, options: &ExtractOptions) -> Result<Vec<Frame>, CompareError>
where
    S: FrameSource,
{
    let transform = options.transform();
    extract_frames_with(source, transform.as_ref(), options)
}

/// Extract every frame of `source` through a caller-supplied transform.
///
/// The resize setting in `options` is ignored; everything else applies.
///
/// # Errors
///
/// Same as [`extract_frames`].
pub fn extract_frames_with<S, T>(
    source: S,
    transform: &T,
    options: &ExtractOptions,
) -> Result<Vec<Frame>, CompareError>
where
    S: FrameSource,
    T: FrameTransform + ?Sized,
{
    options.validate()?;

    let workers = options.workers;
    let queue: WorkQueue<WorkItem> = WorkQueue::new(options.queue_capacity);
    let store = ResultStore::new();
    let failure = FailureSlot::default();
    let started = Instant::now();

    log::debug!(
        "Starting extraction: {workers} worker(s), queue capacity {}",
        queue.capacity()
    );

    let summary = thread::scope(|scope| -> Result<ReadSummary, CompareError> {
        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let spawned = thread::Builder::new()
                .name(format!("frame-worker-{worker_id}"))
                .spawn_scoped(scope, || run_worker(&queue, transform, &store, &failure));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(error) => {
                    release_workers(&queue, handles.len());
                    return Err(error.into());
                }
            }
        }

        let reader = spawn_reader(scope, source, &queue, &failure, options);
        let reader = match reader {
            Ok(handle) => handle,
            Err(error) => {
                release_workers(&queue, handles.len());
                return Err(error.into());
            }
        };

        queue.join();

        let mut worker_panicked = false;
        for handle in handles {
            worker_panicked |= handle.join().is_err();
        }
        let summary = reader.join().map_err(|_| CompareError::WorkerPanicked)?;
        if worker_panicked {
            return Err(CompareError::WorkerPanicked);
        }
        Ok(summary)
    })?;

    if let Some(error) = failure.take() {
        log::warn!("Extraction failed after {:?}: {error}", started.elapsed());
        return Err(error);
    }
    if summary.cancelled {
        return Err(CompareError::Cancelled);
    }

    let frames = store.into_ordered(summary.frames_read)?;
    log::debug!(
        "Extracted {} frame(s) in {:?}",
        frames.len(),
        started.elapsed()
    );
    Ok(frames)
}

/// What the reader saw before it stopped.
#[derive(Debug, Clone, Copy)]
struct ReadSummary {
    frames_read: u64,
    cancelled: bool,
}

/// First fatal error raised by any pipeline thread.
#[derive(Default)]
struct FailureSlot {
    raised: AtomicBool,
    error: Mutex<Option<CompareError>>,
}

impl FailureSlot {
    fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    fn record(&self, error: CompareError) {
        let mut slot = self.error.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            log::error!("{error}");
            *slot = Some(error);
            self.raised.store(true, Ordering::Release);
        }
    }

    fn take(&self) -> Option<CompareError> {
        self.error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// Unblock `count` workers that will never see the reader's markers.
fn release_workers(queue: &WorkQueue<WorkItem>, count: usize) {
    for _ in 0..count {
        queue.put(WorkItem::Stop);
    }
}

fn spawn_reader<'scope, 'env, S>(
    scope: &'scope Scope<'scope, 'env>,
    source: S,
    queue: &'env WorkQueue<WorkItem>,
    failure: &'env FailureSlot,
    options: &'env ExtractOptions,
) -> std::io::Result<ScopedJoinHandle<'scope, ReadSummary>>
where
    S: FrameSource + 'scope,
{
    thread::Builder::new()
        .name("frame-reader".to_string())
        .spawn_scoped(scope, move || read_frames(source, queue, failure, options))
}

/// Pull frames from `source` in decode order and enqueue them.
///
/// Always finishes by enqueueing one termination marker per worker, then
/// drops the source.
fn read_frames<S: FrameSource>(
    mut source: S,
    queue: &WorkQueue<WorkItem>,
    failure: &FailureSlot,
    options: &ExtractOptions,
) -> ReadSummary {
    let mut tracker = ProgressTracker::new(
        options.progress.clone(),
        OperationType::FrameExtraction,
        source.frame_count_hint(),
        options.batch_size,
    );
    let mut index: u64 = 0;
    let mut cancelled = false;
    let mut reporting = true;

    loop {
        if options.is_cancelled() {
            log::info!("Extraction cancelled after {index} frame(s)");
            cancelled = true;
            break;
        }
        if failure.is_raised() {
            break;
        }

        match panic::catch_unwind(AssertUnwindSafe(|| source.read_frame())) {
            Ok(Ok(Some(frame))) => {
                queue.put(WorkItem::Frame(IndexedFrame { index, frame }));
                reporting = report_progress(failure, || tracker.advance(Some(index)));
                index += 1;
                if !reporting {
                    break;
                }
            }
            Ok(Ok(None)) => break,
            Ok(Err(error)) => {
                log::warn!("Stopping after {index} frame(s): {error}");
                break;
            }
            Err(_) => {
                failure.record(CompareError::WorkerPanicked);
                break;
            }
        }
    }

    if reporting {
        report_progress(failure, || tracker.finish());
    }
    release_workers(queue, options.workers);
    drop(source);

    ReadSummary {
        frames_read: index,
        cancelled,
    }
}

/// Run a progress report; a panicking callback is recorded as a failure.
///
/// Returns `false` if the callback panicked.
fn report_progress(failure: &FailureSlot, report: impl FnOnce()) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(report)) {
        Ok(()) => true,
        Err(_) => {
            failure.record(CompareError::WorkerPanicked);
            false
        }
    }
}

/// Transform frames until a termination marker arrives.
fn run_worker<T: FrameTransform + ?Sized>(
    queue: &WorkQueue<WorkItem>,
    transform: &T,
    store: &ResultStore,
    failure: &FailureSlot,
) {
    loop {
        let IndexedFrame { index, frame } = match queue.get() {
            WorkItem::Frame(indexed) => indexed,
            WorkItem::Stop => {
                queue.task_done();
                return;
            }
        };

        // After a failure the remaining frames are only drained.
        if !failure.is_raised() {
            match panic::catch_unwind(AssertUnwindSafe(|| transform.apply(frame))) {
                Ok(Ok(transformed)) => {
                    if let Err(error) = store.insert(index, transformed) {
                        failure.record(error);
                    }
                }
                Ok(Err(error)) => failure.record(CompareError::Transform {
                    index,
                    reason: error.to_string(),
                }),
                Err(_) => failure.record(CompareError::Transform {
                    index,
                    reason: "transform panicked".to_string(),
                }),
            }
        }

        queue.task_done();
    }
}

/// Extracts frames from a video file.
///
/// Owns an opened [`VideoSource`] and runs it through [`extract_frames`].
/// Extraction consumes the extractor: to extract again, open the file
/// again.
#[derive(Debug)]
pub struct VideoExtractor {
    source: VideoSource,
}

impl VideoExtractor {
    /// Open `path` for extraction.
    ///
    /// # Errors
    ///
    /// [`CompareError::SourceOpen`] or [`CompareError::NoVideoStream`].
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CompareError> {
        Ok(Self {
            source: VideoSource::open(path)?,
        })
    }

    /// Metadata of the opened video stream.
    pub fn metadata(&self) -> &VideoMetadata {
        self.source.metadata()
    }

    /// Decode, transform, and return every frame in decode order.
    ///
    /// # Errors
    ///
    /// See [`extract_frames`].
    pub fn extract(self, options: &ExtractOptions) -> Result<Vec<Frame>, CompareError> {
        let name = self
            .source
            .path()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        log::info!("Extracting frames from {name}");
        extract_frames(self.source, options)
    }
}
