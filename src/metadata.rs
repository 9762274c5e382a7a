//! Video metadata types.
//!
//! [`VideoMetadata`] is read once when a [`VideoSource`](crate::VideoSource)
//! is opened and cached for its lifetime. [`VideoSource::probe`](crate::VideoSource::probe)
//! returns it without keeping the demuxer open.

use serde::Serialize;

/// Metadata for a video stream.
///
/// # Example
///
/// ```no_run
/// use vidcompare::VideoSource;
///
/// let metadata = VideoSource::probe("input.mp4")?;
/// println!("{}x{} @ {:.2} fps", metadata.width, metadata.height, metadata.frames_per_second);
/// # Ok::<(), vidcompare::CompareError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[must_use]
pub struct VideoMetadata {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Average frames per second (approximate for variable-frame-rate
    /// content, `0.0` when the container does not say).
    pub frames_per_second: f64,
    /// Number of frames, as advertised by the container or estimated from
    /// duration and frame rate. `0` when unknown.
    pub frame_count: u64,
    /// Codec name (e.g. `"h264"`, `"vp9"`, `"av1"`).
    pub codec: String,
}

impl VideoMetadata {
    /// Returns `true` if both streams run at the same frame rate.
    ///
    /// Rates are compared after rounding to a thousandth of a frame per
    /// second, so `30000/1001` matches `29.97`.
    pub fn same_frame_rate(&self, other: &VideoMetadata) -> bool {
        (self.frames_per_second * 1000.0).round() == (other.frames_per_second * 1000.0).round()
    }
}
