//! Frame-by-frame comparison of two frame sequences.
//!
//! [`Comparator`] pairs frame `i` of a generated video with frame `i` of the
//! reference, over the length of the shorter sequence, and computes MSE,
//! PSNR, SSIM and (when a [`LandmarkDetector`] is attached) the mean
//! face-landmark distance. An attached [`FrameMask`] is applied to both
//! frames of each pair before any metric. Every frame's metrics are logged at `info`
//! level, followed by the per-video averages.
//!
//! # Example
//!
//! ```no_run
//! use vidcompare::{Comparator, CompareError, ExtractOptions, VideoExtractor};
//!
//! let options = ExtractOptions::new().with_resize(800, 800);
//! let generated = VideoExtractor::open("generated.mp4")?.extract(&options)?;
//! let reference = VideoExtractor::open("reference.mp4")?.extract(&options)?;
//!
//! let report = Comparator::new().compare("generated.mp4", &generated, &reference)?;
//! println!("average SSIM: {:?}", report.average_ssim);
//! # Ok::<(), CompareError>(())
//! ```

use std::borrow::Cow;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use serde::Serialize;

use crate::error::CompareError;
use crate::frame::Frame;
use crate::landmarks::{LandmarkDetector, compare_face_landmarks};
use crate::mask::FrameMask;
use crate::metrics;
use crate::progress::{NoOpProgress, OperationType, ProgressCallback, ProgressTracker};

/// Metrics for one pair of frames.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameMetrics {
    /// 1-based frame number.
    pub frame: usize,
    /// See [`metrics::mse`].
    pub mse: f64,
    /// See [`metrics::psnr`].
    pub psnr: f64,
    /// See [`metrics::ssim`].
    pub ssim: f64,
    /// Mean landmark distance, `None` when either frame had no face (or no
    /// detector was attached).
    pub landmark_difference: Option<f64>,
}

/// Comparison result for one generated video.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    /// Display name of the generated video.
    pub video: String,
    /// Number of frame pairs compared.
    pub frames_compared: usize,
    /// Per-frame metrics in frame order.
    pub frames: Vec<FrameMetrics>,
    /// `None` when no frames were compared.
    pub average_mse: Option<f64>,
    /// `None` when no frames were compared.
    pub average_psnr: Option<f64>,
    /// `None` when no frames were compared.
    pub average_ssim: Option<f64>,
    /// Average over the frames that had landmarks; `None` if none had.
    pub average_landmark_difference: Option<f64>,
}

/// Computes per-frame metrics between a generated and a reference sequence.
#[derive(Clone)]
pub struct Comparator {
    detector: Option<Arc<dyn LandmarkDetector>>,
    mask: Option<Arc<dyn FrameMask>>,
    progress: Arc<dyn ProgressCallback>,
}

impl Debug for Comparator {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Comparator")
            .field("has_detector", &self.detector.is_some())
            .field("has_mask", &self.mask.is_some())
            .finish()
    }
}

impl Default for Comparator {
    fn default() -> Self {
        Self::new()
    }
}

impl Comparator {
    /// A comparator with no landmark detector and no progress reporting.
    pub fn new() -> Self {
        Self {
            detector: None,
            mask: None,
            progress: Arc::new(NoOpProgress),
        }
    }

    /// Attach a face-landmark detector.
    #[must_use]
    pub fn with_landmark_detector(mut self, detector: Arc<dyn LandmarkDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    /// Mask both frames of every pair before measuring them.
    #[must_use]
    pub fn with_mask(mut self, mask: Arc<dyn FrameMask>) -> Self {
        self.mask = Some(mask);
        self
    }

    /// Attach a progress callback, fired once per compared frame.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Compare `frames` against `reference` over `min(len, len)` frames.
    ///
    /// # Errors
    ///
    /// [`CompareError::DimensionMismatch`] or
    /// [`CompareError::InvalidConfiguration`] from the metrics, or whatever
    /// the [`FrameMask`] returned. Landmark detector failures are logged and
    /// recorded as "no landmarks".
    pub fn compare(
        &self,
        video: &str,
        frames: &[Frame],
        reference: &[Frame],
    ) -> Result<ComparisonReport, CompareError> {
        let count = frames.len().min(reference.len());
        if frames.len() != reference.len() {
            log::debug!(
                "{video}: {} frame(s) vs {} reference frame(s), comparing {count}",
                frames.len(),
                reference.len()
            );
        }

        let pairs = &frames[..count];
        let references = &reference[..count];

        #[cfg(feature = "rayon")]
        let results = crate::parallel::compute_all(self, pairs, references);
        #[cfg(not(feature = "rayon"))]
        let results: Vec<Result<FrameMetrics, CompareError>> = pairs
            .iter()
            .zip(references)
            .enumerate()
            .map(|(position, (frame, reference))| self.frame_metrics(position, frame, reference))
            .collect();

        let mut tracker = ProgressTracker::new(
            self.progress.clone(),
            OperationType::Comparison,
            Some(count as u64),
            1,
        );
        let mut metrics = Vec::with_capacity(count);
        for result in results {
            let frame_metrics = result?;
            log_frame(video, count, &frame_metrics);
            tracker.advance(Some(frame_metrics.frame as u64 - 1));
            metrics.push(frame_metrics);
        }
        tracker.finish();

        let report = summarize(video, metrics);
        log_summary(&report);
        Ok(report)
    }

    /// Metrics for the frame pair at 0-based `position`.
    pub(crate) fn frame_metrics(
        &self,
        position: usize,
        frame: &Frame,
        reference: &Frame,
    ) -> Result<FrameMetrics, CompareError> {
        let (frame, reference): (Cow<'_, Frame>, Cow<'_, Frame>) = match &self.mask {
            Some(mask) => (
                Cow::Owned(apply_mask(mask.as_ref(), position, frame)?),
                Cow::Owned(apply_mask(mask.as_ref(), position, reference)?),
            ),
            None => (Cow::Borrowed(frame), Cow::Borrowed(reference)),
        };

        let landmark_difference = match &self.detector {
            Some(detector) => match compare_face_landmarks(detector.as_ref(), &frame, &reference) {
                Ok(difference) => difference,
                Err(error) => {
                    log::warn!("Landmark detection failed for frame {}: {error}", position + 1);
                    None
                }
            },
            None => None,
        };

        Ok(FrameMetrics {
            frame: position + 1,
            mse: metrics::mse(&frame, &reference)?,
            psnr: metrics::psnr(&frame, &reference)?,
            ssim: metrics::ssim(&frame, &reference)?,
            landmark_difference,
        })
    }
}

fn apply_mask(
    mask: &dyn FrameMask,
    position: usize,
    frame: &Frame,
) -> Result<Frame, CompareError> {
    mask.mask(frame).inspect_err(|error| {
        log::warn!("Masking failed for frame {}: {error}", position + 1);
    })
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), value| {
        (sum + value, count + 1)
    });
    (count > 0).then(|| sum / count as f64)
}

fn summarize(video: &str, frames: Vec<FrameMetrics>) -> ComparisonReport {
    ComparisonReport {
        video: video.to_string(),
        frames_compared: frames.len(),
        average_mse: mean(frames.iter().map(|m| m.mse)),
        average_psnr: mean(frames.iter().map(|m| m.psnr)),
        average_ssim: mean(frames.iter().map(|m| m.ssim)),
        average_landmark_difference: mean(frames.iter().filter_map(|m| m.landmark_difference)),
        frames,
    }
}

fn log_frame(video: &str, count: usize, metrics: &FrameMetrics) {
    log::info!("Frame {}/{count} of {video}:", metrics.frame);
    log::info!("MSE: {}", metrics.mse);
    log::info!("PSNR: {}", metrics.psnr);
    log::info!("SSIM: {}", metrics.ssim);
    match metrics.landmark_difference {
        Some(difference) => log::info!("Landmark Difference: {difference}"),
        None => log::info!("No landmarks detected in one of the frames."),
    }
}

fn log_summary(report: &ComparisonReport) {
    let show = |value: Option<f64>| value.map_or_else(|| "n/a".to_string(), |v| v.to_string());
    log::info!("Results for {}:", report.video);
    log::info!("Average MSE: {}", show(report.average_mse));
    log::info!("Average PSNR: {}", show(report.average_psnr));
    log::info!("Average SSIM: {}", show(report.average_ssim));
    match report.average_landmark_difference {
        Some(difference) => log::info!("Average Landmark Difference: {difference}"),
        None => log::info!("No landmarks detected in some frames."),
    }
}
