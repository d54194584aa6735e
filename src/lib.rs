//! # mvcapture
//!
//! Decode video one frame at a time and get, for every frame, the motion
//! vectors the encoder stored in the bitstream alongside the reconstructed
//! picture.
//!
//! MPEG-4 Part 2 and H.264 encoders already estimate motion for every
//! prediction block. `mvcapture` asks FFmpeg's decoders (via
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next)) to export those
//! vectors, normalises them into a single [`MotionVector`] shape, and pairs
//! them with the frame converted to a packed pixel buffer. This gives
//! compressed-domain motion at decode cost, without a separate optical flow
//! pass.
//!
//! ## Quick Start
//!
//! ### Read frames with their motion vectors
//!
//! ```no_run
//! use mvcapture::CaptureSession;
//!
//! let mut session = CaptureSession::open("input.mp4")?;
//! while let Some(captured) = session.read()? {
//!     for vector in &captured.motion_vectors {
//!         let (dx, dy) = vector.displacement();
//!         println!("block at ({}, {}) moved by ({dx}, {dy})", vector.dst_x, vector.dst_y);
//!     }
//! }
//! # Ok::<(), mvcapture::CaptureError>(())
//! ```
//!
//! ### Step without converting pixels
//!
//! ```no_run
//! use mvcapture::CaptureSession;
//!
//! let mut session = CaptureSession::open("rtsp://camera.local/stream1")?;
//! while let Some(decoded) = session.step()? {
//!     let vectors = decoded.motion_vectors();
//!     println!("{} {}: {} vectors", decoded.frame_number(), decoded.frame_type(), vectors.len());
//! }
//! # Ok::<(), mvcapture::CaptureError>(())
//! ```
//!
//! ### Configure the session
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
//! let session = CaptureSession::open_with_options("input.mp4", options)?;
//! # Ok::<(), mvcapture::CaptureError>(())
//! ```
//!
//! ## Decoding model
//!
//! Each [`CaptureSession::step`] does all of its work on the calling thread:
//! it reads packets of the selected video stream, feeds the decoder, and
//! returns as soon as one picture is available. Pictures come out in
//! presentation order, including those a decoder holds back for B-frame
//! reordering, which are flushed at the end of input. The session moves
//! through [`DecoderState::Ready`], [`DecoderState::Draining`] and finally
//! [`DecoderState::Ended`], after which every step returns `Ok(None)`.
//!
//! Damaged packets are skipped and counted in [`DecodeStats`] unless
//! [`ErrorPolicy::Strict`] is set.
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `rayon` | [`parallel`] runs one session per input across rayon threads |
//! | `full` | Enables all of the above |
//!
//! ## Requirements
//!
//! FFmpeg development libraries (libavformat, libavcodec, libswscale,
//! libavutil) must be installed and discoverable by `ffmpeg-sys-next`.

pub mod configuration;
pub mod conversion;
mod decoder;
pub mod error;
pub mod ffmpeg;
pub mod frame;
pub mod iterator;
pub mod metadata;
pub mod motion;
mod opener;
#[cfg(feature = "rayon")]
pub mod parallel;
pub mod session;

pub use configuration::{
    CaptureOptions, DEFAULT_MAX_CONSECUTIVE_FAILURES, ErrorPolicy, NetworkOptions, PixelFormat,
    RtspTransport,
};
pub use conversion::ConvertedFrame;
pub use decoder::{DecodeStats, DecoderState};
pub use error::CaptureError;
pub use ffmpeg::{FfmpegLogLevel, get_ffmpeg_log_level, set_ffmpeg_log_level};
pub use frame::{CapturedFrame, DecodedFrame, FrameType};
pub use iterator::FrameIterator;
pub use metadata::StreamInfo;
pub use motion::{MOTION_VECTOR_COLUMNS, MotionVector, PredictionDirection};
pub use session::CaptureSession;
