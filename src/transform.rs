//! Per-frame transforms applied by the worker pool.
//!
//! A [`FrameTransform`] is invoked concurrently from every worker, so it
//! must be `Send + Sync` and hold no shared mutable state. [`Resize`] and
//! [`Passthrough`] cover the common cases; any
//! `Fn(Frame) -> Result<Frame, CompareError>` closure works as well.

use image::imageops::{self, FilterType};

use crate::configuration::ResizeShape;
use crate::error::CompareError;
use crate::frame::Frame;

/// A pure `Frame -> Frame` function run by the worker pool.
pub trait FrameTransform: Send + Sync {
    /// Transform one frame.
    ///
    /// # Errors
    ///
    /// Any error aborts the extraction the frame belongs to.
    fn apply(&self, frame: Frame) -> Result<Frame, CompareError>;
}

impl<F> FrameTransform for F
where
    F: Fn(Frame) -> Result<Frame, CompareError> + Send + Sync,
{
    fn apply(&self, frame: Frame) -> Result<Frame, CompareError> {
        self(frame)
    }
}

/// Returns frames unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl FrameTransform for Passthrough {
    fn apply(&self, frame: Frame) -> Result<Frame, CompareError> {
        Ok(frame)
    }
}

/// Resizes frames to a fixed `(height, width)`, ignoring aspect ratio.
#[derive(Debug, Clone, Copy)]
pub struct Resize {
    shape: ResizeShape,
    filter: FilterType,
}

impl Resize {
    /// Resize to `shape` with bilinear filtering.
    pub fn new(shape: ResizeShape) -> Self {
        Self {
            shape,
            filter: FilterType::Triangle,
        }
    }

    /// Use a different resampling filter.
    #[must_use]
    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }

    /// The output shape.
    pub fn shape(&self) -> ResizeShape {
        self.shape
    }
}

impl FrameTransform for Resize {
    fn apply(&self, frame: Frame) -> Result<Frame, CompareError> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(CompareError::InvalidConfiguration(
                "cannot resize an empty frame".to_string(),
            ));
        }
        if frame.dimensions() == (self.shape.width, self.shape.height) {
            return Ok(frame);
        }
        Ok(imageops::resize(
            &frame,
            self.shape.width,
            self.shape.height,
            self.filter,
        ))
    }
}
