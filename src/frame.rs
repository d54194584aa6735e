//! Per-step frame records.
//!
//! [`DecodedFrame`] is what a single [`CaptureSession::step`] hands out: a
//! borrow of the decoder's picture that stays valid until the next step.
//! [`CapturedFrame`] is the owned bundle of everything derived from one
//! decoded picture.
//!
//! [`CaptureSession::step`]: crate::CaptureSession::step

use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::time::SystemTime;

use ffmpeg_next::{Rational, frame::Video as VideoFrame, util::picture::Type as PictureType};

use crate::conversion::{ConvertedFrame, PixelConverter};
use crate::error::CaptureError;
use crate::motion::{self, MotionVector};

/// Picture coding type reported by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    /// Intra coded.
    I,
    /// Predicted from past pictures.
    P,
    /// Bidirectionally predicted.
    B,
    /// MPEG-4 S(GMC)-VOP.
    S,
    /// Switching intra.
    SI,
    /// Switching predicted.
    SP,
    /// BI type.
    BI,
    /// The decoder did not tag the picture.
    Unknown,
}

impl FrameType {
    /// Single-letter tag as printed by FFmpeg (`'?'` for unknown).
    pub fn as_char(self) -> char {
        match self {
            FrameType::I => 'I',
            FrameType::P => 'P',
            FrameType::B => 'B',
            FrameType::S => 'S',
            FrameType::SI => 'i',
            FrameType::SP => 'p',
            FrameType::BI => 'b',
            FrameType::Unknown => '?',
        }
    }

    /// Whether the picture was coded without reference to others.
    pub fn is_intra(self) -> bool {
        matches!(self, FrameType::I | FrameType::SI)
    }
}

impl From<PictureType> for FrameType {
    fn from(kind: PictureType) -> Self {
        match kind {
            PictureType::I => FrameType::I,
            PictureType::P => FrameType::P,
            PictureType::B => FrameType::B,
            PictureType::S => FrameType::S,
            PictureType::SI => FrameType::SI,
            PictureType::SP => FrameType::SP,
            PictureType::BI => FrameType::BI,
            PictureType::None => FrameType::Unknown,
        }
    }
}

impl Display for FrameType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_char())
    }
}

/// One decoded picture, borrowed from its session for a single step.
///
/// Motion vectors and the converted picture are both derived from this
/// same decoder output, so whatever is taken from one `DecodedFrame`
/// always belongs together.
pub struct DecodedFrame<'a> {
    pub(crate) frame: &'a VideoFrame,
    pub(crate) converter: &'a mut PixelConverter,
    pub(crate) frame_number: u64,
    pub(crate) coded_size: (u32, u32),
    pub(crate) time_base: Rational,
    pub(crate) captured_at: SystemTime,
}

impl Debug for DecodedFrame<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("DecodedFrame")
            .field("frame_number", &self.frame_number)
            .field("frame_type", &self.frame_type())
            .field("pts", &self.pts())
            .field("width", &self.width())
            .field("height", &self.height())
            .finish_non_exhaustive()
    }
}

impl DecodedFrame<'_> {
    /// 1-based position of this frame among those the session delivered.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Picture coding type.
    pub fn frame_type(&self) -> FrameType {
        FrameType::from(self.frame.kind())
    }

    /// Presentation timestamp in [`time_base`](Self::time_base) units.
    ///
    /// Uses FFmpeg's best-effort timestamp, falling back to the raw PTS.
    pub fn pts(&self) -> Option<i64> {
        self.frame.timestamp().or_else(|| self.frame.pts())
    }

    /// Time base of the video stream.
    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    /// Wall-clock time at which the step produced this frame.
    pub fn captured_at(&self) -> SystemTime {
        self.captured_at
    }

    /// Decoded width in pixels.
    pub fn width(&self) -> u32 {
        self.frame.width()
    }

    /// Decoded height in pixels.
    pub fn height(&self) -> u32 {
        self.frame.height()
    }

    /// Motion vectors the decoder attached to this picture.
    ///
    /// Empty for intra pictures. Block centres may lie below or right of
    /// the display size, up to the decoder's coded size.
    pub fn motion_vectors(&self) -> Vec<MotionVector> {
        let (coded_width, coded_height) = self.coded_size;
        motion::extract_within(self.frame, coded_width, coded_height)
    }

    /// Convert the picture to the session's pixel format.
    pub fn convert(&mut self) -> Result<ConvertedFrame, CaptureError> {
        self.converter.convert(self.frame)
    }

    /// Extract and convert everything into an owned [`CapturedFrame`].
    ///
    /// Fails as a whole if conversion fails; no partial record is returned.
    pub fn into_captured(mut self) -> Result<CapturedFrame, CaptureError> {
        let motion_vectors = self.motion_vectors();
        let frame = self.convert()?;
        Ok(CapturedFrame {
            frame,
            motion_vectors,
            frame_type: self.frame_type(),
            pts: self.pts(),
            time_base: self.time_base,
            frame_number: self.frame_number,
            captured_at: self.captured_at,
        })
    }
}

/// Everything produced from one decoded picture.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// The picture in the session's pixel format.
    pub frame: ConvertedFrame,
    /// Motion vectors in decoder order. Empty for intra pictures.
    pub motion_vectors: Vec<MotionVector>,
    /// Picture coding type.
    pub frame_type: FrameType,
    /// Presentation timestamp in `time_base` units, if the stream has one.
    pub pts: Option<i64>,
    /// Time base of the video stream.
    pub time_base: Rational,
    /// 1-based delivery counter.
    pub frame_number: u64,
    /// Wall-clock time at which the frame was decoded.
    pub captured_at: SystemTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_type_letters() {
        assert_eq!(FrameType::from(PictureType::I).as_char(), 'I');
        assert_eq!(FrameType::from(PictureType::P).as_char(), 'P');
        assert_eq!(FrameType::from(PictureType::B).as_char(), 'B');
        assert_eq!(FrameType::from(PictureType::None), FrameType::Unknown);
        assert_eq!(FrameType::Unknown.to_string(), "?");
    }

    #[test]
    fn intra_types() {
        assert!(FrameType::I.is_intra());
        assert!(FrameType::SI.is_intra());
        assert!(!FrameType::P.is_intra());
        assert!(!FrameType::B.is_intra());
    }
}
