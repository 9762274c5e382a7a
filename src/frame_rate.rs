//! Frame-rate normalization through the `ffmpeg` command-line tool.
//!
//! Frame-by-frame comparison only lines up when both videos run at the same
//! rate. [`FrameRateNormalizer`] probes the reference and every `.mp4` in a
//! folder of generated videos, and rewrites each mismatching file in place
//! at the reference rate. A file the transcoder fails on is reported and
//! left untouched; it is never retried.
//!
//! # Example
//!
//! ```no_run
//! use vidcompare::{CompareError, FrameRateNormalizer};
//!
//! let outcomes = FrameRateNormalizer::new()
//!     .ffmpeg_path("/usr/local/bin/ffmpeg")
//!     .normalize_folder("reference.mp4", "generated/")?;
//! for outcome in &outcomes {
//!     println!("{outcome:?}");
//! }
//! # Ok::<(), CompareError>(())
//! ```

use std::ffi::OsString;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

use serde::Serialize;

use crate::decoder::VideoSource;
use crate::error::CompareError;
use crate::metadata::VideoMetadata;
use crate::progress::{NoOpProgress, OperationType, ProgressCallback, ProgressTracker};

/// Extension of the generated videos picked up from a folder.
pub const VIDEO_EXTENSION: &str = "mp4";

const TOOL_NAME: &str = "ffmpeg";

/// What happened to one generated video.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NormalizationOutcome {
    /// Already at the reference rate.
    Unchanged {
        /// The video.
        path: PathBuf,
    },
    /// Rewritten at the reference rate.
    Converted {
        /// The video.
        path: PathBuf,
        /// Rate before conversion.
        from_fps: f64,
        /// Rate after conversion.
        to_fps: f64,
    },
    /// Probing or transcoding failed; the file was left as it was.
    Failed {
        /// The video.
        path: PathBuf,
        /// Why.
        reason: String,
    },
}

/// Rewrites generated videos to the frame rate of a reference video.
#[derive(Clone)]
pub struct FrameRateNormalizer {
    ffmpeg_path: PathBuf,
    progress: Arc<dyn ProgressCallback>,
}

impl Debug for FrameRateNormalizer {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("FrameRateNormalizer")
            .field("ffmpeg_path", &self.ffmpeg_path)
            .finish()
    }
}

impl Default for FrameRateNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameRateNormalizer {
    /// Use `ffmpeg` from `PATH`.
    pub fn new() -> Self {
        Self {
            ffmpeg_path: PathBuf::from(TOOL_NAME),
            progress: Arc::new(NoOpProgress),
        }
    }

    /// Use a specific `ffmpeg` binary.
    #[must_use]
    pub fn ffmpeg_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.ffmpeg_path = path.into();
        self
    }

    /// Report one progress step per processed video.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Returns `true` if `ffmpeg -version` runs successfully.
    pub fn is_available(&self) -> bool {
        Command::new(&self.ffmpeg_path)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|status| status.success())
    }

    /// Bring every `.mp4` in `folder` to the frame rate of `reference`.
    ///
    /// If `ffmpeg` is not available, logs a warning and returns an empty
    /// list without touching anything.
    ///
    /// # Errors
    ///
    /// Only when the reference cannot be probed or the folder cannot be
    /// listed. Per-video failures are returned as
    /// [`NormalizationOutcome::Failed`].
    pub fn normalize_folder<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        reference: P,
        folder: Q,
    ) -> Result<Vec<NormalizationOutcome>, CompareError> {
        if !self.is_available() {
            log::warn!(
                "{} is not installed or not found in PATH; skipping frame-rate normalization",
                self.ffmpeg_path.display()
            );
            return Ok(Vec::new());
        }

        let target = VideoSource::probe(reference.as_ref())?;
        let videos = list_videos(folder.as_ref())?;
        log::info!(
            "Normalizing {} video(s) to {} fps",
            videos.len(),
            target.frames_per_second
        );

        let mut tracker = ProgressTracker::new(
            self.progress.clone(),
            OperationType::FrameRateNormalization,
            Some(videos.len() as u64),
            1,
        );
        let mut outcomes = Vec::with_capacity(videos.len());
        for path in videos {
            outcomes.push(self.normalize_video(path, &target));
            tracker.advance(None);
        }
        tracker.finish();
        Ok(outcomes)
    }

    fn normalize_video(&self, path: PathBuf, target: &VideoMetadata) -> NormalizationOutcome {
        let metadata = match VideoSource::probe(&path) {
            Ok(metadata) => metadata,
            Err(error) => {
                log::error!("Error processing {}: {error}", path.display());
                return NormalizationOutcome::Failed {
                    path,
                    reason: error.to_string(),
                };
            }
        };

        if metadata.same_frame_rate(target) {
            return NormalizationOutcome::Unchanged { path };
        }

        match self.rewrite_frame_rate(&path, target.frames_per_second) {
            Ok(()) => NormalizationOutcome::Converted {
                path,
                from_fps: metadata.frames_per_second,
                to_fps: target.frames_per_second,
            },
            Err(error) => {
                log::error!("Error processing {}: {error}", path.display());
                NormalizationOutcome::Failed {
                    path,
                    reason: error.to_string(),
                }
            }
        }
    }

    /// Re-encode `path` at `fps`, replacing the file only on success.
    ///
    /// # Errors
    ///
    /// [`CompareError::ExternalTool`] with the transcoder's stderr, or
    /// [`CompareError::IoError`] if the result cannot be moved into place.
    pub fn rewrite_frame_rate(&self, path: &Path, fps: f64) -> Result<(), CompareError> {
        let temporary = temporary_path(path);
        log::debug!(
            "Rewriting {} at {fps} fps via {}",
            path.display(),
            temporary.display()
        );

        let output = Command::new(&self.ffmpeg_path)
            .arg("-y")
            .arg("-i")
            .arg(path)
            .arg("-r")
            .arg(fps.to_string())
            .arg(&temporary)
            .stdin(Stdio::null())
            .output()
            .map_err(|error| CompareError::ExternalTool {
                tool: TOOL_NAME.to_string(),
                reason: error.to_string(),
            })?;

        if !output.status.success() {
            if temporary.exists() {
                let _ = fs::remove_file(&temporary);
            }
            return Err(CompareError::ExternalTool {
                tool: TOOL_NAME.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        if temporary.exists() {
            fs::rename(&temporary, path)?;
        }
        Ok(())
    }
}

/// `clip.mp4` -> `clip_temp.mp4`, in the same directory.
fn temporary_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.file_stem().unwrap_or_default());
    name.push("_temp");
    if let Some(extension) = path.extension() {
        name.push(".");
        name.push(extension);
    }
    path.with_file_name(name)
}

/// Every `.mp4` file directly inside `folder`, sorted by path.
///
/// # Errors
///
/// [`CompareError::IoError`] if the folder cannot be read.
pub fn list_videos(folder: &Path) -> Result<Vec<PathBuf>, CompareError> {
    let mut videos = Vec::new();
    for entry in fs::read_dir(folder)? {
        let path = entry?.path();
        let is_video = path
            .extension()
            .is_some_and(|extension| extension.eq_ignore_ascii_case(VIDEO_EXTENSION));
        if is_video && path.is_file() {
            videos.push(path);
        }
    }
    videos.sort();
    Ok(videos)
}
