//! Frame masking applied before metrics.
//!
//! A [`FrameMask`] blanks out the parts of a frame that should not count
//! towards the comparison, typically the background behind a person. The
//! [`Comparator`](crate::Comparator) applies it to both frames of a pair
//! before computing any metric. Segmentation models live outside this
//! crate; implement the trait around one, or use [`KeyColorMask`] for clips
//! shot against a solid backdrop.

use image::Rgb;

use crate::error::CompareError;
use crate::frame::Frame;

/// Produces a masked copy of a frame.
///
/// Called concurrently when the `rayon` feature is enabled.
pub trait FrameMask: Send + Sync {
    /// Return `frame` with the masked-out pixels replaced.
    ///
    /// The output must keep the input's dimensions.
    ///
    /// # Errors
    ///
    /// Any error fails the comparison of the video the frame belongs to.
    fn mask(&self, frame: &Frame) -> Result<Frame, CompareError>;
}

impl<F> FrameMask for F
where
    F: Fn(&Frame) -> Result<Frame, CompareError> + Send + Sync,
{
    fn mask(&self, frame: &Frame) -> Result<Frame, CompareError> {
        self(frame)
    }
}

/// Blacks out every pixel within `tolerance` of a key colour on each channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyColorMask {
    key: Rgb<u8>,
    tolerance: u8,
}

impl KeyColorMask {
    /// Mask pixels exactly equal to `key`.
    pub fn new(key: Rgb<u8>) -> Self {
        Self { key, tolerance: 0 }
    }

    /// Also mask pixels whose channels differ from the key by at most
    /// `tolerance`.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: u8) -> Self {
        self.tolerance = tolerance;
        self
    }

    fn matches(&self, pixel: &Rgb<u8>) -> bool {
        pixel
            .0
            .iter()
            .zip(self.key.0)
            .all(|(&channel, key)| channel.abs_diff(key) <= self.tolerance)
    }
}

impl FrameMask for KeyColorMask {
    fn mask(&self, frame: &Frame) -> Result<Frame, CompareError> {
        let mut masked = frame.clone();
        for pixel in masked.pixels_mut() {
            if self.matches(pixel) {
                *pixel = Rgb([0, 0, 0]);
            }
        }
        Ok(masked)
    }
}
