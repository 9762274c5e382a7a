//! Batch comparison of a folder of generated videos against one reference.
//!
//! [`BatchRunner::run`] optionally normalizes frame rates first, extracts
//! the reference once, then extracts and compares every `.mp4` in the
//! generated folder in name order. A video whose frame rate could not be
//! normalized is not compared. A video that fails is recorded in the
//! [`BatchReport`] and the batch moves on.
//!
//! # Example
//!
//! ```no_run
//! use vidcompare::{BatchRunner, CompareError, ComparisonConfig};
//!
//! let config = ComparisonConfig::load("config.toml")?;
//! let report = BatchRunner::new().run(&config)?;
//! println!("{}", report.to_json_pretty()?);
//! # Ok::<(), CompareError>(())
//! ```

use std::collections::HashMap;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::comparison::{Comparator, ComparisonReport};
use crate::configuration::ExtractOptions;
use crate::error::CompareError;
use crate::frame::Frame;
use crate::frame_rate::{FrameRateNormalizer, NormalizationOutcome, list_videos};
use crate::pipeline::VideoExtractor;
use crate::progress::{CancellationToken, ProgressCallback};
use crate::settings::ComparisonConfig;

/// Builds a progress callback for the extraction of one video, given its
/// display name.
pub type ProgressFactory = Arc<dyn Fn(&str) -> Arc<dyn ProgressCallback> + Send + Sync>;

/// Outcome for one generated video.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoEntry {
    /// Path of the generated video.
    pub path: PathBuf,
    /// Comparison result, when extraction and comparison succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ComparisonReport>,
    /// Why the video could not be compared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything a batch run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    /// The reference video.
    pub reference: PathBuf,
    /// Frames extracted from the reference.
    pub reference_frames: usize,
    /// Per-file normalization outcomes; empty when normalization was off
    /// or `ffmpeg` was unavailable.
    pub normalization: Vec<NormalizationOutcome>,
    /// One entry per generated video, in name order.
    pub videos: Vec<VideoEntry>,
}

impl BatchReport {
    /// Videos that were compared successfully.
    pub fn succeeded(&self) -> impl Iterator<Item = &ComparisonReport> {
        self.videos.iter().filter_map(|entry| entry.report.as_ref())
    }

    /// Number of videos that could not be compared.
    pub fn failure_count(&self) -> usize {
        self.videos.iter().filter(|entry| entry.error.is_some()).count()
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// [`CompareError::ReportSerialization`].
    pub fn to_json_pretty(&self) -> Result<String, CompareError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Runs a [`ComparisonConfig`] end to end.
#[derive(Clone, Default)]
pub struct BatchRunner {
    comparator: Comparator,
    progress: Option<ProgressFactory>,
    cancellation: Option<CancellationToken>,
}

impl Debug for BatchRunner {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("BatchRunner")
            .field("comparator", &self.comparator)
            .field("has_progress", &self.progress.is_some())
            .field("has_cancellation", &self.cancellation.is_some())
            .finish()
    }
}

impl BatchRunner {
    /// A runner with a default [`Comparator`] and no progress reporting.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `comparator` for every video (e.g. one with a landmark detector).
    #[must_use]
    pub fn with_comparator(mut self, comparator: Comparator) -> Self {
        self.comparator = comparator;
        self
    }

    /// Report extraction progress through callbacks built by `factory`.
    #[must_use]
    pub fn with_progress_factory(mut self, factory: ProgressFactory) -> Self {
        self.progress = Some(factory);
        self
    }

    /// Stop the batch when `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Normalize, extract and compare as `config` describes.
    ///
    /// # Errors
    ///
    /// Only for failures that affect the whole batch: invalid settings, an
    /// unreadable reference or folder, or cancellation. Per-video failures
    /// are recorded in [`BatchReport::videos`].
    pub fn run(&self, config: &ComparisonConfig) -> Result<BatchReport, CompareError> {
        let started = Instant::now();
        let options = config.extract_options()?;

        let normalization = if config.normalize_frame_rate {
            FrameRateNormalizer::new()
                .ffmpeg_path(&config.ffmpeg_path)
                .normalize_folder(&config.original_video_path, &config.generated_videos_folder)?
        } else {
            Vec::new()
        };
        let unnormalized = normalization_failures(&normalization);

        let reference = self.extract(&config.original_video_path, &options)?;
        let videos = list_videos(&config.generated_videos_folder)?;
        log::info!(
            "Comparing {} video(s) against {} ({} frames)",
            videos.len(),
            config.original_video_path.display(),
            reference.len()
        );

        let mut entries = Vec::with_capacity(videos.len());
        for path in videos {
            if self.is_cancelled() {
                return Err(CompareError::Cancelled);
            }
            if same_file(&path, &config.original_video_path) {
                log::debug!("Skipping the reference itself: {}", path.display());
                continue;
            }
            if let Some(reason) = unnormalized.get(&path) {
                log::warn!(
                    "Skipping {}: frame rate does not match the reference",
                    path.display()
                );
                entries.push(VideoEntry {
                    path,
                    report: None,
                    error: Some(format!("frame-rate normalization failed: {reason}")),
                });
                continue;
            }
            let entry = match self.compare_video(&path, &reference, &options) {
                Ok(report) => VideoEntry {
                    path,
                    report: Some(report),
                    error: None,
                },
                Err(CompareError::Cancelled) => return Err(CompareError::Cancelled),
                Err(error) => {
                    log::error!("Error processing {}: {error}", path.display());
                    VideoEntry {
                        path,
                        report: None,
                        error: Some(error.to_string()),
                    }
                }
            };
            entries.push(entry);
        }

        log::info!(
            "Batch finished in {:?}: {} compared, {} failed",
            started.elapsed(),
            entries.iter().filter(|entry| entry.report.is_some()).count(),
            entries.iter().filter(|entry| entry.error.is_some()).count()
        );

        Ok(BatchReport {
            reference: config.original_video_path.clone(),
            reference_frames: reference.len(),
            normalization,
            videos: entries,
        })
    }

    fn compare_video(
        &self,
        path: &Path,
        reference: &[Frame],
        options: &ExtractOptions,
    ) -> Result<ComparisonReport, CompareError> {
        let frames = self.extract(path, options)?;
        self.comparator
            .compare(&display_name(path), &frames, reference)
    }

    fn extract(&self, path: &Path, options: &ExtractOptions) -> Result<Vec<Frame>, CompareError> {
        let mut options = options.clone();
        if let Some(factory) = &self.progress {
            options = options.with_progress(factory(&display_name(path)));
        }
        if let Some(token) = &self.cancellation {
            options = options.with_cancellation(token.clone());
        }
        VideoExtractor::open(path)?.extract(&options)
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}

/// Failure reasons of the videos left at a mismatching frame rate.
fn normalization_failures(outcomes: &[NormalizationOutcome]) -> HashMap<PathBuf, String> {
    outcomes
        .iter()
        .filter_map(|outcome| match outcome {
            NormalizationOutcome::Failed { path, reason } => Some((path.clone(), reason.clone())),
            _ => None,
        })
        .collect()
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn same_file(first: &Path, second: &Path) -> bool {
    match (first.canonicalize(), second.canonicalize()) {
        (Ok(first), Ok(second)) => first == second,
        _ => first == second,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_is_the_file_name() {
        assert_eq!(display_name(Path::new("videos/out/clip_1.mp4")), "clip_1.mp4");
    }

    #[test]
    fn normalization_failures_keeps_failed_outcomes_only() {
        let outcomes = vec![
            NormalizationOutcome::Unchanged {
                path: PathBuf::from("out/a.mp4"),
            },
            NormalizationOutcome::Failed {
                path: PathBuf::from("out/b.mp4"),
                reason: "encoder missing".to_string(),
            },
            NormalizationOutcome::Converted {
                path: PathBuf::from("out/c.mp4"),
                from_fps: 15.0,
                to_fps: 30.0,
            },
        ];

        let failures = normalization_failures(&outcomes);
        assert_eq!(failures.len(), 1);
        assert_eq!(
            failures.get(Path::new("out/b.mp4")).map(String::as_str),
            Some("encoder missing")
        );
    }

    #[test]
    fn failure_count_counts_errors_only() {
        let report = BatchReport {
            reference: PathBuf::from("reference.mp4"),
            reference_frames: 0,
            normalization: Vec::new(),
            videos: vec![
                VideoEntry {
                    path: PathBuf::from("a.mp4"),
                    report: None,
                    error: Some("broken".to_string()),
                },
                VideoEntry {
                    path: PathBuf::from("b.mp4"),
                    report: None,
                    error: None,
                },
            ],
        };
        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.succeeded().count(), 0);
    }
}
