//! Pull-based frame iterator.
//!
//! [`FrameIterator`] wraps [`CaptureSession::read`] in an [`Iterator`]:
//! each call to [`next()`](Iterator::next) decodes just enough packets to
//! produce the next picture.
//!
//! # Example
//!
//! ```no_run
//! use mvcapture::CaptureSession;
//!
//! let mut session = CaptureSession::open("input.mp4")?;
//! for captured in session.frames() {
//!     let captured = captured?;
//!     captured.frame.to_image()?.save(format!("frame_{}.png", captured.frame_number))?;
//! }
//! # Ok::<(), mvcapture::CaptureError>(())
//! ```

use std::iter::FusedIterator;

use crate::decoder::DecoderState;
use crate::error::CaptureError;
use crate::frame::CapturedFrame;
use crate::session::CaptureSession;

/// Iterator over the remaining frames of a session.
///
/// Borrows the session mutably; dropping the iterator releases it and
/// stepping may continue where the iterator stopped. A fatal decode error
/// is yielded once, after which the iterator is exhausted. A conversion
/// error affects only the frame it occurred on.
#[derive(Debug)]
pub struct FrameIterator<'a> {
    session: &'a mut CaptureSession,
}

impl<'a> FrameIterator<'a> {
    pub(crate) fn new(session: &'a mut CaptureSession) -> Self {
        Self { session }
    }
}

impl Iterator for FrameIterator<'_> {
    type Item = Result<CapturedFrame, CaptureError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.session.state() == DecoderState::Ended {
            return None;
        }
        self.session.read().transpose()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.session.state() == DecoderState::Ended {
            (0, Some(0))
        } else {
            (0, None)
        }
    }
}

impl FusedIterator for FrameIterator<'_> {}
