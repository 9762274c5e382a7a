//! Frame types and the decoder seam.
//!
//! [`FrameSource`] is what the extraction pipeline reads from. The crate
//! ships [`VideoSource`](crate::VideoSource), backed by FFmpeg; tests and
//! callers with frames from elsewhere implement the trait directly.

use image::RgbImage;

use crate::error::CompareError;

/// One decoded image: an 8-bit RGB buffer.
pub type Frame = RgbImage;

/// A frame tagged with its position in decode order.
///
/// The index is assigned once by the frame reader, starting at 0, and never
/// reassigned.
#[derive(Debug, Clone)]
pub struct IndexedFrame {
    /// Position in decode order.
    pub index: u64,
    /// The frame itself.
    pub frame: Frame,
}

/// A sequential source of decoded frames.
///
/// Opening the source is the implementor's constructor, and releasing it is
/// `Drop`. The pipeline moves the source onto the reader thread and drops it
/// there once reading stops.
pub trait FrameSource: Send {
    /// Read the next frame in decode order.
    ///
    /// Returns `Ok(None)` at end of stream.
    ///
    /// # Errors
    ///
    /// A decode failure. The pipeline logs it and stops reading; it does not
    /// retry the same frame.
    fn read_frame(&mut self) -> Result<Option<Frame>, CompareError>;

    /// Expected number of frames, if the container advertises one. Only
    /// used for progress reporting.
    fn frame_count_hint(&self) -> Option<u64> {
        None
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn read_frame(&mut self) -> Result<Option<Frame>, CompareError> {
        (**self).read_frame()
    }

    fn frame_count_hint(&self) -> Option<u64> {
        (**self).frame_count_hint()
    }
}
