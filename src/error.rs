//! Error types for the `vidcompare` crate.
//!
//! This module defines [`CompareError`], the unified error type returned by
//! all fallible operations in the crate. Errors carry enough context to
//! diagnose a failure without extra logging at the call site: file paths,
//! frame indices, and upstream error messages.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

/// The unified error type for all `vidcompare` operations.
///
/// Decode failures in the middle of a stream are not surfaced through this
/// type: the frame reader treats them as end of stream. Everything else is.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CompareError {
    /// The video source could not be opened.
    #[error("Failed to open video source at {path}: {reason}")]
    SourceOpen {
        /// Path that was passed to [`crate::VideoSource::open`].
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The file does not contain a video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// A video frame could not be decoded.
    #[error("Failed to decode video frame: {0}")]
    VideoDecodeError(String),

    /// The per-frame transform failed. Aborts the whole extraction.
    #[error("Transform failed for frame {index}: {reason}")]
    Transform {
        /// Index of the frame whose transform failed.
        index: u64,
        /// Underlying reason.
        reason: String,
    },

    /// The result store did not hold every frame index after the worker
    /// pool drained. This is an internal bug, never a valid result.
    #[error(
        "Result store is missing frame {missing} of {expected} after the worker pool drained"
    )]
    SynchronizationInvariant {
        /// First index absent from the store.
        missing: u64,
        /// Number of frames the reader enqueued.
        expected: u64,
    },

    /// A frame index was stored twice. The reader hands out each index once,
    /// so this is an internal bug.
    #[error("Result store already holds frame {index}")]
    DuplicateFrame {
        /// The index stored twice.
        index: u64,
    },

    /// An external tool (transcoder, landmark service) failed.
    #[error("External tool `{tool}` failed: {reason}")]
    ExternalTool {
        /// Name of the tool or service.
        tool: String,
        /// Underlying reason, usually the tool's stderr.
        reason: String,
    },

    /// An extraction or comparison setting is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Two frames handed to a metric do not share the same shape.
    #[error("Frame dimensions differ: {left:?} vs {right:?}")]
    DimensionMismatch {
        /// `(width, height)` of the first frame.
        left: (u32, u32),
        /// `(width, height)` of the second frame.
        right: (u32, u32),
    },

    /// A configuration file could not be parsed.
    #[error("Failed to parse config file {path}: {reason}")]
    ConfigParse {
        /// Path to the configuration file.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },

    /// The operation was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,

    /// A reader or worker thread panicked.
    #[error("Extraction thread panicked")]
    WorkerPanicked,

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),

    /// A report could not be serialized.
    #[error("Failed to serialize report: {0}")]
    ReportSerialization(#[from] serde_json::Error),
}

impl From<FfmpegError> for CompareError {
    fn from(error: FfmpegError) -> Self {
        CompareError::FfmpegError(error.to_string())
    }
}
