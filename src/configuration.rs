//! Capture configuration.
//!
//! [`CaptureOptions`] is a builder that fixes, for the lifetime of a
//! session, the output pixel layout, how transient decode failures are
//! treated, and how network inputs are opened.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use mvcapture::{CaptureOptions, CaptureSession, ErrorPolicy, PixelFormat, RtspTransport};
//!
//! let options = CaptureOptions::new()
//!     .with_pixel_format(PixelFormat::Rgb8)
//!     .with_error_policy(ErrorPolicy::Strict)
//!     .with_rtsp_transport(RtspTransport::Udp)
//!     .with_socket_timeout(Duration::from_secs(2));
//!
//! let mut session = CaptureSession::open_with_options("rtsp://camera.local/stream", options)?;
//! # Ok::<(), mvcapture::CaptureError>(())
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::time::Duration;

use ffmpeg_next::{Dictionary, format::Pixel};

/// Output pixel layout of converted frames.
///
/// Every format is interleaved with one byte per channel, so a converted
/// frame's stride is always `width * channels()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    /// 8-bit BGR (24 bpp), the channel order OpenCV-style consumers expect.
    /// This is the default.
    #[default]
    Bgr8,
    /// 8-bit RGB (24 bpp).
    Rgb8,
    /// 8-bit RGBA with alpha pre-set to 255 (32 bpp).
    Rgba8,
    /// 8-bit grayscale (8 bpp).
    Gray8,
}

impl PixelFormat {
    /// Number of interleaved channels per pixel.
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Bgr8 | PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
            PixelFormat::Gray8 => 1,
        }
    }

    /// Map to the corresponding FFmpeg pixel format constant.
    pub(crate) fn to_ffmpeg_pixel(self) -> Pixel {
        match self {
            PixelFormat::Bgr8 => Pixel::BGR24,
            PixelFormat::Rgb8 => Pixel::RGB24,
            PixelFormat::Rgba8 => Pixel::RGBA,
            PixelFormat::Gray8 => Pixel::GRAY8,
        }
    }
}

impl Display for PixelFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            PixelFormat::Bgr8 => "bgr8",
            PixelFormat::Rgb8 => "rgb8",
            PixelFormat::Rgba8 => "rgba8",
            PixelFormat::Gray8 => "gray8",
        };
        f.write_str(name)
    }
}

/// How the step decoder reacts to a packet that fails to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Log and count the failure, then continue with the next packet.
    /// Frames depending on the broken packet may be dropped. This is the
    /// default.
    #[default]
    Skip,
    /// Surface the first decode failure as
    /// [`CaptureError::Decode`](crate::CaptureError::Decode) and end the
    /// session.
    Strict,
}

/// Lower transport used for RTSP inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RtspTransport {
    /// Interleave RTP over the RTSP TCP connection. This is the default,
    /// since it survives NAT and does not drop packets under load.
    #[default]
    Tcp,
    /// Plain RTP over UDP.
    Udp,
}

impl RtspTransport {
    fn as_option_value(self) -> &'static str {
        match self {
            RtspTransport::Tcp => "tcp",
            RtspTransport::Udp => "udp",
        }
    }
}

/// Settings applied only when the input is a network URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkOptions {
    /// Transport for `rtsp://` inputs.
    pub rtsp_transport: RtspTransport,
    /// Socket I/O timeout. `None` leaves FFmpeg's default (block forever).
    pub socket_timeout: Option<Duration>,
}

impl Default for NetworkOptions {
    fn default() -> Self {
        Self {
            rtsp_transport: RtspTransport::Tcp,
            socket_timeout: Some(Duration::from_secs(5)),
        }
    }
}

impl NetworkOptions {
    /// Build the demuxer option dictionary for a network open.
    pub(crate) fn to_dictionary(&self) -> Dictionary<'static> {
        let mut dictionary = Dictionary::new();
        dictionary.set("rtsp_transport", self.rtsp_transport.as_option_value());
        if let Some(timeout) = self.socket_timeout {
            // Both spellings: `timeout` on FFmpeg >= 5, `stimeout` before.
            let micros = timeout.as_micros().to_string();
            dictionary.set("timeout", &micros);
            dictionary.set("stimeout", &micros);
        }
        dictionary
    }
}

/// Default number of consecutive failed packets tolerated before a session
/// gives up.
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 512;

/// Configuration fixed at [`CaptureSession`](crate::CaptureSession) open
/// time.
///
/// A default-constructed value converts to BGR, skips transient decode
/// errors, and opens RTSP over TCP with a five second socket timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOptions {
    /// Output pixel layout of converted frames.
    pub pixel_format: PixelFormat,
    /// Reaction to per-packet decode failures.
    pub error_policy: ErrorPolicy,
    /// Consecutive failed packets (read or decode) after which the session
    /// ends with a fatal decode error, even under [`ErrorPolicy::Skip`].
    pub max_consecutive_failures: u32,
    /// Network-only settings.
    pub network: NetworkOptions,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self {
            pixel_format: PixelFormat::default(),
            error_policy: ErrorPolicy::default(),
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
            network: NetworkOptions::default(),
        }
    }

    /// Set the output pixel format.
    #[must_use]
    pub fn with_pixel_format(mut self, format: PixelFormat) -> Self {
        self.pixel_format = format;
        self
    }

    /// Set the decode error policy.
    #[must_use]
    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    /// Set how many consecutive failed packets are tolerated.
    ///
    /// Clamped to a minimum of 1.
    #[must_use]
    pub fn with_max_consecutive_failures(mut self, limit: u32) -> Self {
        self.max_consecutive_failures = limit.max(1);
        self
    }

    /// Set the RTSP lower transport.
    #[must_use]
    pub fn with_rtsp_transport(mut self, transport: RtspTransport) -> Self {
        self.network.rtsp_transport = transport;
        self
    }

    /// Set the socket timeout for network inputs.
    #[must_use]
    pub fn with_socket_timeout(mut self, timeout: Duration) -> Self {
        self.network.socket_timeout = Some(timeout);
        self
    }

    /// Disable the socket timeout for network inputs.
    #[must_use]
    pub fn without_socket_timeout(mut self) -> Self {
        self.network.socket_timeout = None;
        self
    }
}
