//! Batch comparison settings, loaded from TOML.
//!
//! ```toml
//! original_video_path = "videos/reference.mp4"
//! generated_videos_folder = "videos/generated"
//! resize_shape = [800, 800]   # [height, width]; [] disables resizing
//! num_workers = 4
//! queue_capacity = 100
//! log_file = "logs/app.log"
//! normalize_frame_rate = true
//! ffmpeg_path = "ffmpeg"
//! ```
//!
//! Only the two paths are required.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::configuration::{DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS, ExtractOptions, ResizeShape};
use crate::error::CompareError;

const DEFAULT_RESIZE: [u32; 2] = [800, 800];
const DEFAULT_LOG_FILE: &str = "logs/app.log";
const DEFAULT_FFMPEG: &str = "ffmpeg";

/// Settings for a [`BatchRunner`](crate::BatchRunner) run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComparisonConfig {
    /// The reference video every generated video is compared against.
    pub original_video_path: PathBuf,
    /// Folder holding the generated `.mp4` videos.
    pub generated_videos_folder: PathBuf,
    /// `[height, width]` to resize frames to, or empty to keep source size.
    #[serde(default = "default_resize")]
    pub resize_shape: Vec<u32>,
    /// Worker threads per extraction.
    #[serde(default = "default_workers")]
    pub num_workers: usize,
    /// Capacity of the reader-to-worker queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Where the binary writes its log.
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    /// Rewrite generated videos to the reference frame rate before comparing.
    #[serde(default = "default_true")]
    pub normalize_frame_rate: bool,
    /// `ffmpeg` binary used for frame-rate normalization.
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg_path: PathBuf,
}

fn default_resize() -> Vec<u32> {
    DEFAULT_RESIZE.to_vec()
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_log_file() -> PathBuf {
    PathBuf::from(DEFAULT_LOG_FILE)
}

fn default_true() -> bool {
    true
}

fn default_ffmpeg() -> PathBuf {
    PathBuf::from(DEFAULT_FFMPEG)
}

impl ComparisonConfig {
    /// Settings with every optional field at its default.
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(
        original_video_path: P,
        generated_videos_folder: Q,
    ) -> Self {
        Self {
            original_video_path: original_video_path.into(),
            generated_videos_folder: generated_videos_folder.into(),
            resize_shape: default_resize(),
            num_workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            log_file: default_log_file(),
            normalize_frame_rate: true,
            ffmpeg_path: default_ffmpeg(),
        }
    }

    /// Read and validate a TOML settings file.
    ///
    /// # Errors
    ///
    /// - [`CompareError::IoError`] if the file cannot be read.
    /// - [`CompareError::ConfigParse`] if it is not valid TOML or misses a
    ///   required key.
    /// - [`CompareError::InvalidConfiguration`] if a value is out of range.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CompareError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents).map_err(|error| match error {
            CompareError::ConfigParse { reason, .. } => CompareError::ConfigParse {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })?;
        log::debug!("Loaded settings from {}", path.display());
        Ok(config)
    }

    /// Parse and validate settings from a TOML string.
    ///
    /// # Errors
    ///
    /// Same as [`load`](ComparisonConfig::load), minus I/O.
    pub fn from_toml_str(contents: &str) -> Result<Self, CompareError> {
        let config: Self = toml::from_str(contents).map_err(|error| CompareError::ConfigParse {
            path: PathBuf::new(),
            reason: error.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// The resize target, if resizing is enabled.
    ///
    /// # Errors
    ///
    /// [`CompareError::InvalidConfiguration`] unless `resize_shape` is empty
    /// or holds exactly two non-zero values.
    pub fn resize(&self) -> Result<Option<ResizeShape>, CompareError> {
        match self.resize_shape.as_slice() {
            [] => Ok(None),
            &[height, width] if height > 0 && width > 0 => {
                Ok(Some(ResizeShape::new(height, width)))
            }
            other => Err(CompareError::InvalidConfiguration(format!(
                "resize_shape must be [] or [height, width] with non-zero values, got {other:?}"
            ))),
        }
    }

    /// Extraction options described by these settings.
    ///
    /// # Errors
    ///
    /// See [`resize`](ComparisonConfig::resize).
    pub fn extract_options(&self) -> Result<ExtractOptions, CompareError> {
        Ok(ExtractOptions::new()
            .with_resize_shape(self.resize()?)
            .with_workers(self.num_workers)
            .with_queue_capacity(self.queue_capacity))
    }

    fn validate(&self) -> Result<(), CompareError> {
        self.resize()?;
        self.extract_options()?.validate()
    }
}
