//! Stream information.
//!
//! [`StreamInfo`] describes the video stream a session decodes. It is
//! gathered once when the input is opened and cached for the lifetime of
//! the session.

use std::time::Duration;

use ffmpeg_next::Rational;

/// Metadata for the selected video stream and its container.
///
/// # Example
///
/// ```no_run
/// use mvcapture::CaptureSession;
///
/// let session = CaptureSession::open("input.mp4").unwrap();
/// let info = session.info();
/// println!("{}x{} {} @ {:.2} fps", info.width, info.height, info.codec, info.frames_per_second);
/// ```
#[derive(Debug, Clone)]
#[must_use]
pub struct StreamInfo {
    /// Coded frame width in pixels.
    pub width: u32,
    /// Coded frame height in pixels.
    pub height: u32,
    /// Average frame rate. Zero when the container does not declare one.
    pub frames_per_second: f64,
    /// Frame count declared by the container, or estimated from duration
    /// and frame rate. Zero when neither is known (e.g. live streams).
    pub frame_count: u64,
    /// Decoder name (e.g. `"h264"`, `"mpeg4"`).
    pub codec: String,
    /// Time base of the stream; presentation timestamps are in these units.
    pub time_base: Rational,
    /// Index of the video stream inside the container.
    pub stream_index: usize,
    /// Container format name (e.g. `"mov,mp4,m4a,3gp,3g2,mj2"`, `"rtsp"`).
    pub format: String,
    /// Container duration, zero when unknown.
    pub duration: Duration,
    /// Whether the input is a live network stream (RTSP).
    pub is_network: bool,
}

impl StreamInfo {
    /// Number of pixels in one frame.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}
