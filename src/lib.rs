//! # vidcompare
//!
//! Compare generated videos against a reference video, frame by frame.
//!
//! `vidcompare` decodes videos with FFmpeg via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate, extracts
//! every frame through a concurrent reader/worker pipeline that returns
//! frames in decode order, and scores each generated frame against the
//! matching reference frame with MSE, PSNR, SSIM and (optionally) a
//! face-landmark distance.
//!
//! ## Quick Start
//!
//! ### Extract Frames
//!
//! ```no_run
//! use vidcompare::{ExtractOptions, VideoExtractor};
//!
//! let options = ExtractOptions::new().with_resize(800, 800).with_workers(4);
//! let frames = VideoExtractor::open("input.mp4").unwrap().extract(&options).unwrap();
//! frames[0].save("first_frame.png").unwrap();
//! ```
//!
//! ### Extract From Any Source
//!
//! Anything implementing [`FrameSource`] can be fed through the pipeline:
//!
//! ```
//! use vidcompare::{CompareError, ExtractOptions, Frame, FrameSource, extract_frames};
//!
//! struct Solid(u32);
//!
//! impl FrameSource for Solid {
//!     fn read_frame(&mut self) -> Result<Option<Frame>, CompareError> {
//!         if self.0 == 0 {
//!             return Ok(None);
//!         }
//!         self.0 -= 1;
//!         Ok(Some(Frame::new(16, 16)))
//!     }
//! }
//!
//! let frames = extract_frames(Solid(3), &ExtractOptions::new()).unwrap();
//! assert_eq!(frames.len(), 3);
//! ```
//!
//! ### Compare a Folder of Videos
//!
//! ```no_run
//! use vidcompare::{BatchRunner, ComparisonConfig};
//!
//! let config = ComparisonConfig::load("config.toml").unwrap();
//! let report = BatchRunner::new().run(&config).unwrap();
//! for video in report.succeeded() {
//!     println!("{}: SSIM {:?}", video.video, video.average_ssim);
//! }
//! ```
//!
//! ## Features
//!
//! - **Ordered concurrent extraction**: one reader thread, N worker threads,
//!   a bounded queue between them, and reassembly by frame index
//! - **Pluggable transforms**: resize by default, any [`FrameTransform`]
//!   otherwise
//! - **Frame metrics**: MSE, PSNR and SSIM
//! - **Face landmarks**: bring your own [`LandmarkDetector`]
//! - **Masking**: blank out backgrounds with a [`FrameMask`] before
//!   measuring
//! - **Frame-rate normalization**: rewrite generated videos to the reference
//!   rate through the `ffmpeg` command-line tool
//! - **Progress & cancellation**: cooperative callbacks and
//!   [`CancellationToken`]
//! - **JSON reports**: every report type serializes with `serde`
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `rayon` | Per-frame metrics are computed across rayon's thread pool |
//! | `full` | Enables all of the above |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system, and the
//! `ffmpeg` binary must be on `PATH` for frame-rate normalization.

pub mod batch;
pub mod comparison;
pub mod configuration;
pub mod decoder;
pub mod error;
pub mod frame;
pub mod frame_rate;
pub mod landmarks;
pub mod mask;
pub mod metadata;
pub mod metrics;
#[cfg(feature = "rayon")]
mod parallel;
pub mod pipeline;
pub mod progress;
pub mod queue;
pub mod settings;
pub mod store;
pub mod transform;

pub use batch::{BatchReport, BatchRunner, ProgressFactory, VideoEntry};
pub use comparison::{Comparator, ComparisonReport, FrameMetrics};
pub use configuration::{ExtractOptions, ResizeShape};
pub use decoder::{VideoSource, set_ffmpeg_log_level};
pub use error::CompareError;
pub use frame::{Frame, FrameSource, IndexedFrame};
pub use frame_rate::{FrameRateNormalizer, NormalizationOutcome};
pub use landmarks::{Landmark, LandmarkDetector};
pub use mask::{FrameMask, KeyColorMask};
pub use metadata::VideoMetadata;
pub use pipeline::{VideoExtractor, extract_frames, extract_frames_with};
pub use progress::{CancellationToken, OperationType, ProgressCallback, ProgressInfo};
pub use queue::{WorkItem, WorkQueue};
pub use settings::ComparisonConfig;
pub use store::ResultStore;
pub use transform::{FrameTransform, Passthrough, Resize};
