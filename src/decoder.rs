//! FFmpeg-backed frame source.
//!
//! [`VideoSource`] opens a file, picks its best video stream, and decodes
//! frames one at a time in decode order, converting each to packed RGB24.
//! It implements [`FrameSource`] so it can feed the extraction pipeline.
//!
//! This module also exposes [`set_ffmpeg_log_level`], which aligns FFmpeg's
//! own stderr chatter with a [`log::LevelFilter`].

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};

use ffmpeg_next::{
    Error as FfmpegError, Packet, Rational,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
    util::log::Level,
};
use image::RgbImage;

use crate::error::CompareError;
use crate::frame::{Frame, FrameSource};
use crate::metadata::VideoMetadata;

/// Consecutive packet read failures tolerated before giving up.
const MAX_CONSECUTIVE_READ_ERRORS: u32 = 32;

/// Set FFmpeg's internal log verbosity from a `log` level filter.
///
/// This only affects what FFmpeg prints to stderr. Rust-side output is
/// controlled by whatever logger the application installs.
pub fn set_ffmpeg_log_level(filter: log::LevelFilter) {
    let level = match filter {
        log::LevelFilter::Off => Level::Quiet,
        log::LevelFilter::Error => Level::Error,
        log::LevelFilter::Warn => Level::Warning,
        log::LevelFilter::Info => Level::Info,
        log::LevelFilter::Debug => Level::Verbose,
        log::LevelFilter::Trace => Level::Debug,
    };
    ffmpeg_next::util::log::set_level(level);
}

/// Owns the swscale context of one source.
struct Scaler(ScalingContext);

// SAFETY: the swscale context is owned by exactly one `VideoSource` and is
// only touched through `&mut self`, so it is never used from two threads at
// once.
unsafe impl Send for Scaler {}

/// A sequential, FFmpeg-decoded video source.
///
/// Released (demuxer and decoder closed) when dropped.
pub struct VideoSource {
    input_context: Input,
    decoder: VideoDecoder,
    scaler: Scaler,
    video_stream_index: usize,
    metadata: VideoMetadata,
    file_path: PathBuf,
    decoded_frame: VideoFrame,
    rgb_frame: VideoFrame,
    eof_sent: bool,
    done: bool,
}

impl Debug for VideoSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("VideoSource")
            .field("file_path", &self.file_path)
            .field("video_stream_index", &self.video_stream_index)
            .field("metadata", &self.metadata)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl VideoSource {
    /// Open a video file for sequential decoding.
    ///
    /// Initialises FFmpeg (idempotent), opens the file, selects the best
    /// video stream, and caches its metadata.
    ///
    /// # Errors
    ///
    /// - [`CompareError::SourceOpen`] if the file cannot be opened or its
    ///   decoder cannot be created.
    /// - [`CompareError::NoVideoStream`] if the file has no video.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CompareError> {
        let file_path = path.as_ref().to_path_buf();
        let open_error = |reason: String| CompareError::SourceOpen {
            path: file_path.clone(),
            reason,
        };

        log::debug!("Opening video source: {}", file_path.display());

        ffmpeg_next::init()
            .map_err(|error| open_error(format!("FFmpeg initialisation failed: {error}")))?;

        let input_context =
            ffmpeg_next::format::input(&file_path).map_err(|error| open_error(error.to_string()))?;

        let stream = input_context
            .streams()
            .best(Type::Video)
            .ok_or(CompareError::NoVideoStream)?;
        let video_stream_index = stream.index();

        let decoder_context = CodecContext::from_parameters(stream.parameters())
            .map_err(|error| open_error(format!("Failed to read codec parameters: {error}")))?;
        let decoder = decoder_context
            .decoder()
            .video()
            .map_err(|error| open_error(format!("Failed to create video decoder: {error}")))?;

        let frames_per_second = rational_to_f64(stream.avg_frame_rate())
            .or_else(|| rational_to_f64(stream.rate()))
            .unwrap_or(0.0);

        let container_duration = input_context.duration();
        let frame_count = if stream.frames() > 0 {
            stream.frames() as u64
        } else if container_duration > 0 && frames_per_second > 0.0 {
            (container_duration as f64 / 1_000_000.0 * frames_per_second) as u64
        } else {
            0
        };

        let codec = decoder
            .codec()
            .map(|codec| codec.name().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let metadata = VideoMetadata {
            width: decoder.width(),
            height: decoder.height(),
            frames_per_second,
            frame_count,
            codec,
        };

        let scaler = ScalingContext::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ScalingFlags::BILINEAR,
        )
        .map_err(|error| open_error(format!("Failed to create pixel converter: {error}")))?;

        Ok(Self {
            input_context,
            decoder,
            scaler: Scaler(scaler),
            video_stream_index,
            metadata,
            file_path,
            decoded_frame: VideoFrame::empty(),
            rgb_frame: VideoFrame::empty(),
            eof_sent: false,
            done: false,
        })
    }

    /// Read the metadata of a video file without keeping it open.
    ///
    /// # Errors
    ///
    /// Same as [`open`](VideoSource::open).
    pub fn probe<P: AsRef<Path>>(path: P) -> Result<VideoMetadata, CompareError> {
        Ok(Self::open(path)?.metadata)
    }

    /// Metadata of the selected video stream.
    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    /// Path the source was opened from.
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Convert the frame in `decoded_frame` to a packed RGB image.
    fn convert_current_frame(&mut self) -> Result<Frame, CompareError> {
        self.scaler
            .0
            .run(&self.decoded_frame, &mut self.rgb_frame)?;

        let width = self.rgb_frame.width();
        let height = self.rgb_frame.height();
        let buffer = packed_rgb_buffer(&self.rgb_frame, width, height);
        RgbImage::from_raw(width, height, buffer).ok_or_else(|| {
            CompareError::VideoDecodeError(
                "Failed to construct RGB image from decoded frame data".to_string(),
            )
        })
    }

    /// Feed the decoder one more video packet, or the end-of-stream signal.
    fn feed_decoder(&mut self) -> Result<(), CompareError> {
        let mut consecutive_errors = 0;
        loop {
            let mut packet = Packet::empty();
            match packet.read(&mut self.input_context) {
                Ok(()) => {
                    if packet.stream() != self.video_stream_index {
                        continue;
                    }
                    self.decoder
                        .send_packet(&packet)
                        .map_err(|error| CompareError::VideoDecodeError(error.to_string()))?;
                    return Ok(());
                }
                Err(FfmpegError::Eof) => {
                    self.decoder
                        .send_eof()
                        .map_err(|error| CompareError::VideoDecodeError(error.to_string()))?;
                    self.eof_sent = true;
                    return Ok(());
                }
                Err(error) => {
                    consecutive_errors += 1;
                    if consecutive_errors >= MAX_CONSECUTIVE_READ_ERRORS {
                        return Err(CompareError::VideoDecodeError(format!(
                            "Repeated packet read failures: {error}"
                        )));
                    }
                }
            }
        }
    }
}

impl FrameSource for VideoSource {
    fn read_frame(&mut self) -> Result<Option<Frame>, CompareError> {
        if self.done {
            return Ok(None);
        }

        loop {
            if self.decoder.receive_frame(&mut self.decoded_frame).is_ok() {
                return match self.convert_current_frame() {
                    Ok(frame) => Ok(Some(frame)),
                    Err(error) => {
                        self.done = true;
                        Err(error)
                    }
                };
            }

            if self.eof_sent {
                self.done = true;
                return Ok(None);
            }

            if let Err(error) = self.feed_decoder() {
                self.done = true;
                return Err(error);
            }
        }
    }

    fn frame_count_hint(&self) -> Option<u64> {
        (self.metadata.frame_count > 0).then_some(self.metadata.frame_count)
    }
}

fn rational_to_f64(rational: Rational) -> Option<f64> {
    (rational.denominator() != 0 && rational.numerator() > 0)
        .then(|| rational.numerator() as f64 / rational.denominator() as f64)
}

/// Copy an RGB24 frame into a tightly packed buffer, dropping row padding.
fn packed_rgb_buffer(video_frame: &VideoFrame, width: u32, height: u32) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let row_bytes = (width as usize) * 3;
    let data = video_frame.data(0);

    if stride == row_bytes {
        data[..row_bytes * (height as usize)].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(row_bytes * (height as usize));
        for row in 0..(height as usize) {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + row_bytes]);
        }
        buffer
    }
}
