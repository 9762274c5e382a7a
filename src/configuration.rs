//! Extraction options.
//!
//! [`ExtractOptions`] is a builder that threads the resize target, worker
//! count, queue capacity, progress callback, and cancellation token through
//! the extraction pipeline without polluting every function signature.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use vidcompare::{CancellationToken, ExtractOptions, ProgressCallback, ProgressInfo};
//!
//! struct LogProgress;
//! impl ProgressCallback for LogProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("{:?}: {} done", info.operation, info.current);
//!     }
//! }
//!
//! let token = CancellationToken::new();
//! let options = ExtractOptions::new()
//!     .with_resize(800, 800)
//!     .with_workers(8)
//!     .with_queue_capacity(32)
//!     .with_progress(Arc::new(LogProgress))
//!     .with_cancellation(token.clone());
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use image::imageops::FilterType;

use crate::error::CompareError;
use crate::progress::{CancellationToken, NoOpProgress, ProgressCallback};
use crate::transform::{FrameTransform, Passthrough, Resize};

/// Default number of worker threads.
pub const DEFAULT_WORKERS: usize = 4;

/// Default bounded-queue capacity between the reader and the workers.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Target shape of a resized frame, given as `(height, width)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResizeShape {
    /// Output height in pixels.
    pub height: u32,
    /// Output width in pixels.
    pub width: u32,
}

impl ResizeShape {
    /// Create a shape from `(height, width)`.
    pub fn new(height: u32, width: u32) -> Self {
        Self { height, width }
    }
}

impl From<(u32, u32)> for ResizeShape {
    fn from((height, width): (u32, u32)) -> Self {
        Self::new(height, width)
    }
}

/// Settings for one run of the extraction pipeline.
///
/// A default-constructed value resizes nothing, runs
/// [`DEFAULT_WORKERS`] workers over a queue of [`DEFAULT_QUEUE_CAPACITY`]
/// slots, reports progress to nobody, and is never cancelled.
#[derive(Clone)]
pub struct ExtractOptions {
    pub(crate) resize: Option<ResizeShape>,
    pub(crate) filter: FilterType,
    pub(crate) workers: usize,
    pub(crate) queue_capacity: usize,
    pub(crate) progress: Arc<dyn ProgressCallback>,
    pub(crate) cancellation: Option<CancellationToken>,
    /// How often to fire the progress callback (every N frames).
    pub(crate) batch_size: u64,
}

impl Debug for ExtractOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ExtractOptions")
            .field("resize", &self.resize)
            .field("filter", &self.filter)
            .field("workers", &self.workers)
            .field("queue_capacity", &self.queue_capacity)
            .field("has_cancellation", &self.cancellation.is_some())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self {
            resize: None,
            filter: FilterType::Triangle,
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            progress: Arc::new(NoOpProgress),
            cancellation: None,
            batch_size: 1,
        }
    }

    /// Resize every frame to `height` × `width`.
    #[must_use]
    pub fn with_resize(mut self, height: u32, width: u32) -> Self {
        self.resize = Some(ResizeShape::new(height, width));
        self
    }

    /// Set or clear the resize target. `None` passes frames through.
    #[must_use]
    pub fn with_resize_shape(mut self, shape: Option<ResizeShape>) -> Self {
        self.resize = shape;
        self
    }

    /// Set the resampling filter used when resizing. Defaults to bilinear
    /// ([`FilterType::Triangle`]).
    #[must_use]
    pub fn with_resize_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }

    /// Set the number of worker threads. Zero is rejected when the
    /// pipeline starts.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the capacity of the bounded queue between reader and workers.
    /// Zero is rejected when the pipeline starts.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Attach a progress callback, fired from the reader thread.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Set how often the progress callback fires. Clamped to a minimum of 1.
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// The configured resize target, if any.
    pub fn resize_shape(&self) -> Option<ResizeShape> {
        self.resize
    }

    /// The configured worker count.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// The configured queue capacity.
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Reject settings the pipeline cannot run with.
    pub(crate) fn validate(&self) -> Result<(), CompareError> {
        if self.workers == 0 {
            return Err(CompareError::InvalidConfiguration(
                "worker count must be at least 1".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(CompareError::InvalidConfiguration(
                "queue capacity must be at least 1".to_string(),
            ));
        }
        if let Some(shape) = self.resize {
            if shape.width == 0 || shape.height == 0 {
                return Err(CompareError::InvalidConfiguration(format!(
                    "resize shape must be non-zero, got {}x{}",
                    shape.height, shape.width
                )));
            }
        }
        Ok(())
    }

    /// Build the per-frame transform these options describe.
    pub(crate) fn transform(&self) -> Box<dyn FrameTransform> {
        match self.resize {
            Some(shape) => Box::new(Resize::new(shape).with_filter(self.filter)),
            None => Box::new(Passthrough),
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }
}
