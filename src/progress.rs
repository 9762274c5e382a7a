//! Progress callbacks and cancellation.
//!
//! Extraction, normalization and comparison each report through a
//! [`ProgressCallback`]. The frame reader also polls a [`CancellationToken`]
//! before every read, so a long extraction can be stopped from another
//! thread.
//!
//! # Example
//!
//! A callback that stops the extraction once enough frames were read:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use vidcompare::{
//!     CancellationToken, CompareError, ExtractOptions, ProgressCallback, ProgressInfo,
//!     VideoExtractor,
//! };
//!
//! struct FrameLimit {
//!     token: CancellationToken,
//!     frames: u64,
//! }
//!
//! impl ProgressCallback for FrameLimit {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         if info.current >= self.frames {
//!             self.token.cancel();
//!         }
//!     }
//! }
//!
//! let token = CancellationToken::new();
//! let limit = FrameLimit { token: token.clone(), frames: 50 };
//! let options = ExtractOptions::new()
//!     .with_cancellation(token)
//!     .with_progress(Arc::new(limit));
//! match VideoExtractor::open("input.mp4")?.extract(&options) {
//!     Err(CompareError::Cancelled) => println!("stopped after 50 frames"),
//!     other => println!("{} frames", other?.len()),
//! }
//! # Ok::<(), CompareError>(())
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

/// Which stage is reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OperationType {
    /// Reading frames into the extraction pipeline.
    FrameExtraction,
    /// Rewriting generated videos to the reference frame rate.
    FrameRateNormalization,
    /// Computing per-frame metrics between two sequences.
    Comparison,
}

/// Where a stage stands.
///
/// During extraction one is sent every
/// [`with_batch_size`](crate::ExtractOptions::with_batch_size) frames read,
/// plus a final one when the reader stops. Normalization and comparison
/// report after every video and every frame pair respectively.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// The reporting stage.
    pub operation: OperationType,
    /// Frames read, videos normalized or frame pairs compared so far.
    pub current: u64,
    /// Expected count. For extraction this is the container's frame count,
    /// which can be off for variable-rate files.
    pub total: Option<u64>,
    /// `current / total` in percent, when `total` is known and non-zero.
    pub percentage: Option<f32>,
    /// Time since the stage started.
    pub elapsed: Duration,
    /// Linear extrapolation from `elapsed` and `current`.
    pub estimated_remaining: Option<Duration>,
    /// 0-based index of the frame just read or compared.
    pub current_frame: Option<u64>,
}

/// Receives [`ProgressInfo`] updates.
///
/// Extraction calls it from the `frame-reader` thread, hence `Send + Sync`.
/// A callback that panics during extraction fails that extraction with
/// [`CompareError::WorkerPanicked`](crate::CompareError::WorkerPanicked).
/// To stop work early, cancel a [`CancellationToken`] instead.
pub trait ProgressCallback: Send + Sync {
    /// Handle one update.
    fn on_progress(&self, info: &ProgressInfo);
}

/// Ignores every update.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Shared stop flag for extractions and batch runs.
///
/// Clones share one flag. Once [`cancel`](CancellationToken::cancel) is
/// called the reader stops before its next read, the workers drain what is
/// already queued, and the extraction returns
/// [`CompareError::Cancelled`](crate::CompareError::Cancelled). A
/// [`BatchRunner`](crate::BatchRunner) also checks it between videos.
///
/// # Example
///
/// ```
/// use vidcompare::CancellationToken;
///
/// let token = CancellationToken::new();
/// assert!(!token.is_cancelled());
///
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// A token that is not cancelled.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Set the flag.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether any clone has called [`cancel`](CancellationToken::cancel).
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts items for one stage and forwards throttled [`ProgressInfo`]s.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    operation: OperationType,
    total: Option<u64>,
    done: u64,
    unreported: u64,
    report_every: u64,
    started: Instant,
}

impl ProgressTracker {
    pub(crate) fn new(
        callback: Arc<dyn ProgressCallback>,
        operation: OperationType,
        total: Option<u64>,
        report_every: u64,
    ) -> Self {
        Self {
            callback,
            operation,
            total,
            done: 0,
            unreported: 0,
            report_every: report_every.max(1),
            started: Instant::now(),
        }
    }

    /// Count one item; report once `report_every` items accumulated.
    pub(crate) fn advance(&mut self, frame: Option<u64>) {
        self.done += 1;
        self.unreported += 1;
        if self.unreported >= self.report_every {
            self.unreported = 0;
            self.report(frame);
        }
    }

    /// Report the final count.
    pub(crate) fn finish(&mut self) {
        self.report(None);
    }

    fn report(&self, frame: Option<u64>) {
        let elapsed = self.started.elapsed();
        let known_total = self.total.filter(|&total| total > 0);

        let percentage = known_total.map(|total| self.done as f32 / total as f32 * 100.0);
        let estimated_remaining = known_total.filter(|_| self.done > 0).map(|total| {
            let left = total.saturating_sub(self.done);
            elapsed.mul_f64(left as f64 / self.done as f64)
        });

        self.callback.on_progress(&ProgressInfo {
            operation: self.operation,
            current: self.done,
            total: self.total,
            percentage,
            elapsed,
            estimated_remaining,
            current_frame: frame,
        });
    }
}
