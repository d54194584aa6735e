//! Error types for the `mvcapture` crate.
//!
//! [`CaptureError`] is returned by every fallible operation. The first four
//! variants form the capture taxonomy (open, codec, decode, conversion); the
//! rest wrap failures from the ambient stack (file I/O, image encoding, raw
//! FFmpeg calls outside the decode loop).
//!
//! Transient per-packet decode failures never show up here unless the
//! session runs with [`ErrorPolicy::Strict`](crate::ErrorPolicy::Strict);
//! they are counted in [`DecodeStats`](crate::DecodeStats) instead.

use std::io::Error as IoError;

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

/// The unified error type for all `mvcapture` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CaptureError {
    /// The input could not be opened or its container could not be parsed.
    #[error("Failed to open {input}: {reason}")]
    Open {
        /// The path or URL passed to [`crate::CaptureSession::open`].
        input: String,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The input does not contain a video stream.
    #[error("No video stream found in input")]
    NoVideoStream,

    /// No decoder is available for the selected video stream's codec.
    #[error("Unsupported video codec: {codec}")]
    UnsupportedCodec {
        /// Codec name as reported by the container.
        codec: String,
    },

    /// Decoding failed in a way the session cannot recover from.
    ///
    /// The session is left in [`DecoderState::Ended`](crate::DecoderState::Ended).
    #[error("Fatal decode error: {0}")]
    Decode(String),

    /// The pixel conversion context could not be created or run.
    #[error("Pixel conversion failed: {0}")]
    Conversion(String),

    /// An error from an FFmpeg call outside the decode loop.
    #[error("FFmpeg error: {0}")]
    Ffmpeg(String),

    /// An I/O error occurred while writing outputs.
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// An error from the `image` crate while exporting a converted frame.
    #[error("Image processing error: {0}")]
    Image(#[from] ImageError),
}

impl From<FfmpegError> for CaptureError {
    fn from(error: FfmpegError) -> Self {
        CaptureError::Ffmpeg(error.to_string())
    }
}
