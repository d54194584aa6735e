//! Capture sessions.
//!
//! A [`CaptureSession`] owns one opened input: the demuxer, a decoder that
//! exports motion vectors, and the pixel converter. The caller pulls one
//! picture at a time with [`step`](CaptureSession::step) or
//! [`read`](CaptureSession::read); all work happens inline on the calling
//! thread.
//!
//! # Example
//!
//! ```no_run
//! use mvcapture::CaptureSession;
//!
//! let mut session = CaptureSession::open("input.mp4")?;
//! while let Some(captured) = session.read()? {
//!     println!(
//!         "frame {} ({}) has {} motion vectors",
//!         captured.frame_number,
//!         captured.frame_type,
//!         captured.motion_vectors.len()
//!     );
//! }
//! session.close();
//! # Ok::<(), mvcapture::CaptureError>(())
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::time::SystemTime;

use ffmpeg_next::{decoder::Video as VideoDecoder, format::context::Input, frame::Video as VideoFrame};

use crate::configuration::CaptureOptions;
use crate::conversion::PixelConverter;
use crate::decoder::{DecodeStats, DecoderState, StepDecoder};
use crate::error::CaptureError;
use crate::frame::{CapturedFrame, DecodedFrame};
use crate::iterator::FrameIterator;
use crate::metadata::StreamInfo;
use crate::opener::{OpenedStream, open_stream};

/// An open input being decoded one frame at a time.
///
/// All FFmpeg contexts are owned by the session and released together when
/// it is closed or dropped. Stepping takes `&mut self`; use one session per
/// thread.
pub struct CaptureSession {
    input: Input,
    decoder: VideoDecoder,
    stepper: StepDecoder,
    converter: PixelConverter,
    decoded: VideoFrame,
    info: StreamInfo,
    options: CaptureOptions,
    source: String,
    frames_delivered: u64,
}

impl Debug for CaptureSession {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("CaptureSession")
            .field("source", &self.source)
            .field("info", &self.info)
            .field("options", &self.options)
            .field("state", &self.stepper.state())
            .field("frames_delivered", &self.frames_delivered)
            .finish_non_exhaustive()
    }
}

impl CaptureSession {
    /// Open a file path or stream URL with default options.
    ///
    /// # Errors
    ///
    /// - [`CaptureError::Open`] if the input cannot be opened or parsed.
    /// - [`CaptureError::NoVideoStream`] if it has no video stream.
    /// - [`CaptureError::UnsupportedCodec`] if no decoder is available.
    pub fn open(source: &str) -> Result<Self, CaptureError> {
        Self::open_with_options(source, CaptureOptions::new())
    }

    /// Open a file path or stream URL with custom options.
    ///
    /// # Errors
    ///
    /// Same as [`open`](Self::open).
    pub fn open_with_options(source: &str, options: CaptureOptions) -> Result<Self, CaptureError> {
        let OpenedStream {
            input,
            decoder,
            info,
        } = open_stream(source, &options)?;

        Ok(Self {
            input,
            decoder,
            stepper: StepDecoder::new(info.stream_index, &options),
            converter: PixelConverter::new(options.pixel_format),
            decoded: VideoFrame::empty(),
            info,
            options,
            source: source.to_string(),
            frames_delivered: 0,
        })
    }

    /// Description of the selected video stream.
    pub fn info(&self) -> &StreamInfo {
        &self.info
    }

    /// Options the session was opened with.
    pub fn options(&self) -> &CaptureOptions {
        &self.options
    }

    /// The path or URL the session was opened on.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Current decoder state.
    pub fn state(&self) -> DecoderState {
        self.stepper.state()
    }

    /// Packet and frame counters so far.
    pub fn stats(&self) -> DecodeStats {
        self.stepper.stats()
    }

    /// Number of frames handed out by [`step`](Self::step).
    pub fn frames_delivered(&self) -> u64 {
        self.frames_delivered
    }

    /// Decode the next picture.
    ///
    /// Returns `Ok(None)` once the stream has ended, and keeps returning it
    /// on every later call. The returned frame borrows the session and must
    /// be consumed before stepping again.
    ///
    /// # Errors
    ///
    /// [`CaptureError::Decode`] on a fatal decode failure. The session is
    /// then ended.
    pub fn step(&mut self) -> Result<Option<DecodedFrame<'_>>, CaptureError> {
        let produced = self
            .stepper
            .step(&mut self.input, &mut self.decoder, &mut self.decoded)?;
        if !produced {
            return Ok(None);
        }

        self.frames_delivered += 1;
        // SAFETY: the decoder context stays open for the session's lifetime
        // and is only read here.
        let coded_size = unsafe {
            let context = self.decoder.as_ptr();
            (
                u32::try_from((*context).coded_width).unwrap_or(0),
                u32::try_from((*context).coded_height).unwrap_or(0),
            )
        };
        Ok(Some(DecodedFrame {
            frame: &self.decoded,
            converter: &mut self.converter,
            frame_number: self.frames_delivered,
            coded_size,
            time_base: self.info.time_base,
            captured_at: SystemTime::now(),
        }))
    }

    /// Decode the next picture and return its motion vectors and converted
    /// pixels together.
    ///
    /// # Errors
    ///
    /// [`CaptureError::Decode`] as for [`step`](Self::step), or
    /// [`CaptureError::Conversion`] if the picture cannot be converted.
    pub fn read(&mut self) -> Result<Option<CapturedFrame>, CaptureError> {
        match self.step()? {
            Some(decoded) => decoded.into_captured().map(Some),
            None => Ok(None),
        }
    }

    /// Iterate over the remaining frames.
    pub fn frames(&mut self) -> FrameIterator<'_> {
        FrameIterator::new(self)
    }

    /// Release the input and decoder, returning the final counters.
    pub fn close(self) -> DecodeStats {
        let stats = self.stepper.stats();
        log::info!(
            "Closed capture input: {} ({} frames delivered, {} transient errors)",
            self.source,
            self.frames_delivered,
            stats.transient_errors
        );
        stats
    }
}
