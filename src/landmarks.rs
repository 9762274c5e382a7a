//! Face-landmark comparison.
//!
//! Landmark detection itself is delegated to a [`LandmarkDetector`]
//! implementation supplied by the caller (a cloud face-analysis service, a
//! local model, ...). The implementor owns its own credentials and client
//! configuration; nothing here is global.
//!
//! A frame without a detectable face yields `Ok(None)`, and the comparison
//! simply leaves that frame out of the landmark average.

use serde::Serialize;

use crate::error::CompareError;
use crate::frame::Frame;

/// A facial landmark in normalised image coordinates (`0.0..=1.0`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Landmark {
    /// Horizontal position as a fraction of the frame width.
    pub x: f64,
    /// Vertical position as a fraction of the frame height.
    pub y: f64,
}

impl Landmark {
    /// Create a landmark at `(x, y)`.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Landmark) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Detects the landmarks of the first face in a frame.
pub trait LandmarkDetector: Send + Sync {
    /// Landmarks of the first detected face, or `None` if no face was
    /// found.
    ///
    /// # Errors
    ///
    /// [`CompareError::ExternalTool`] when the detection backend fails.
    /// Callers log the failure and treat the frame as having no landmarks.
    fn detect(&self, frame: &Frame) -> Result<Option<Vec<Landmark>>, CompareError>;
}

/// Mean point-to-point distance between two landmark sets.
///
/// Returns `None` when the sets are empty or differ in length, since the
/// points then cannot be paired.
pub fn landmark_distance(first: &[Landmark], second: &[Landmark]) -> Option<f64> {
    if first.is_empty() || first.len() != second.len() {
        return None;
    }
    let total: f64 = first
        .iter()
        .zip(second)
        .map(|(a, b)| a.distance(b))
        .sum();
    Some(total / first.len() as f64)
}

/// Detect landmarks in both frames and return their mean distance.
///
/// `Ok(None)` if either frame has no face or the landmark sets do not pair
/// up.
///
/// # Errors
///
/// Whatever the detector returns.
pub fn compare_face_landmarks(
    detector: &dyn LandmarkDetector,
    frame: &Frame,
    reference: &Frame,
) -> Result<Option<f64>, CompareError> {
    let Some(first) = detector.detect(frame)? else {
        return Ok(None);
    };
    let Some(second) = detector.detect(reference)? else {
        return Ok(None);
    };
    Ok(landmark_distance(&first, &second))
}
