//! Motion vector extraction.
//!
//! With `AV_CODEC_FLAG2_EXPORT_MVS` set, FFmpeg's MPEG-4 Part 2 and H.264
//! decoders attach a table of `AVMotionVector` entries to every predicted
//! frame. Each entry describes one prediction block: its size (16x16 down to
//! 4x4 partitions), which reference it was predicted from, the block centre
//! in the current frame (`dst`), the matching centre in the reference
//! (`src`), and the displacement at sub-pixel precision (`motion_x`,
//! `motion_y` in units of `1 / motion_scale` pixel; `motion_scale` is 2 for
//! half-pel and 4 for quarter-pel codecs).
//!
//! [`extract`] converts that table into [`MotionVector`] records, one shape
//! for every partition size, in the order the decoder emitted them. The
//! order follows the decoder's macroblock scan and carries no spatial
//! guarantee.

use std::{mem::size_of, slice};

use ffmpeg_next::frame::{Video as VideoFrame, side_data::Type as SideDataType};
use ffmpeg_sys_next::AVMotionVector;

/// Which reference picture a block was predicted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredictionDirection {
    /// Predicted from a picture earlier in display order (forward
    /// prediction).
    Past,
    /// Predicted from a picture later in display order (backward
    /// prediction, B-frames only).
    Future,
}

impl PredictionDirection {
    fn from_source(source: i32) -> Self {
        if source > 0 {
            PredictionDirection::Future
        } else {
            PredictionDirection::Past
        }
    }

    /// FFmpeg's sign convention: `-1` for past, `1` for future.
    pub fn as_i32(self) -> i32 {
        match self {
            PredictionDirection::Past => -1,
            PredictionDirection::Future => 1,
        }
    }
}

/// Column names of [`MotionVector::to_row`], in order.
pub const MOTION_VECTOR_COLUMNS: [&str; 10] = [
    "source",
    "w",
    "h",
    "src_x",
    "src_y",
    "dst_x",
    "dst_y",
    "motion_x",
    "motion_y",
    "motion_scale",
];

/// One prediction block's motion, normalised across partition sizes.
///
/// All positions are block centres in the pixel grid of the converted
/// frame. The block's displacement in pixels is
/// `motion_x / motion_scale`, `motion_y / motion_scale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MotionVector {
    /// Reference the block was predicted from.
    pub direction: PredictionDirection,
    /// Block width in pixels.
    pub width: u8,
    /// Block height in pixels.
    pub height: u8,
    /// Block centre x in the reference picture.
    pub src_x: i32,
    /// Block centre y in the reference picture.
    pub src_y: i32,
    /// Block centre x in the current picture.
    pub dst_x: i32,
    /// Block centre y in the current picture.
    pub dst_y: i32,
    /// Horizontal displacement, in `1 / motion_scale` pixels.
    pub motion_x: i32,
    /// Vertical displacement, in `1 / motion_scale` pixels.
    pub motion_y: i32,
    /// Sub-pixel precision of `motion_x` / `motion_y`. Never zero.
    pub motion_scale: u16,
}

impl MotionVector {
    /// Displacement in pixels, source minus destination.
    pub fn displacement(&self) -> (f32, f32) {
        let scale = f32::from(self.motion_scale);
        (self.motion_x as f32 / scale, self.motion_y as f32 / scale)
    }

    /// Flatten into ten integers, ordered as [`MOTION_VECTOR_COLUMNS`].
    pub fn to_row(&self) -> [i32; 10] {
        [
            self.direction.as_i32(),
            i32::from(self.width),
            i32::from(self.height),
            self.src_x,
            self.src_y,
            self.dst_x,
            self.dst_y,
            self.motion_x,
            self.motion_y,
            i32::from(self.motion_scale),
        ]
    }
}

/// Size of a macroblock in the codecs that export motion vectors.
const MACROBLOCK_SIZE: u32 = 16;

/// The area block centres may fall in for a `width` x `height` picture.
///
/// Codecs predict whole macroblocks, so the bottom and right rows extend
/// past a display size that is not a multiple of 16 (1080 lines are coded
/// as 1088). `coded_width` and `coded_height` are the decoder's coded size,
/// or 0 when unknown.
pub(crate) fn coded_bounds(width: u32, height: u32, coded_width: u32, coded_height: u32) -> (u32, u32) {
    let round_up = |value: u32| value.div_ceil(MACROBLOCK_SIZE) * MACROBLOCK_SIZE;
    (
        round_up(width).max(coded_width),
        round_up(height).max(coded_height),
    )
}

/// Read the motion vectors attached to `frame`.
///
/// Returns an empty `Vec` when the frame carries no motion-vector side data
/// (intra frames, codecs without export support) or when the side data is
/// not a whole number of entries. Destinations are bounded by the frame's
/// macroblock grid.
pub fn extract(frame: &VideoFrame) -> Vec<MotionVector> {
    let (width, height) = coded_bounds(frame.width(), frame.height(), 0, 0);
    extract_within(frame, width, height)
}

/// [`extract`] with destinations bounded by a known coded size.
pub(crate) fn extract_within(frame: &VideoFrame, coded_width: u32, coded_height: u32) -> Vec<MotionVector> {
    let Some(side_data) = frame.side_data(SideDataType::MotionVectors) else {
        return Vec::new();
    };

    let bytes = side_data.data();
    let entry_size = size_of::<AVMotionVector>();
    if bytes.len() % entry_size != 0 {
        log::warn!(
            "Ignoring malformed motion vector side data ({} bytes, entry size {entry_size})",
            bytes.len()
        );
        return Vec::new();
    }

    let count = bytes.len() / entry_size;
    if count == 0 {
        return Vec::new();
    }

    // SAFETY: FFmpeg fills MOTION_VECTORS side data with a packed array of
    // AVMotionVector in an av_malloc'd (suitably aligned) buffer, and the
    // length was checked above. The slice does not outlive `side_data`.
    let raw = unsafe { slice::from_raw_parts(bytes.as_ptr().cast::<AVMotionVector>(), count) };

    let (width, height) = coded_bounds(frame.width(), frame.height(), coded_width, coded_height);
    normalize(raw, width, height)
}

/// Convert raw decoder entries for a picture coded at `width` x `height`.
///
/// Entries with a zero `motion_scale` and entries whose destination centre
/// lies outside the coded picture are dropped.
pub(crate) fn normalize(raw: &[AVMotionVector], width: u32, height: u32) -> Vec<MotionVector> {
    let mut vectors = Vec::with_capacity(raw.len());
    let mut dropped = 0usize;

    for entry in raw {
        match from_raw(entry, width, height) {
            Some(vector) => vectors.push(vector),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        log::trace!(
            "Dropped {dropped} of {} motion vectors (zero scale or off-frame)",
            raw.len()
        );
    }

    vectors
}

fn from_raw(entry: &AVMotionVector, width: u32, height: u32) -> Option<MotionVector> {
    if entry.motion_scale == 0 {
        return None;
    }

    let dst_x = i32::from(entry.dst_x);
    let dst_y = i32::from(entry.dst_y);
    let inside = dst_x >= 0 && dst_y >= 0 && (dst_x as u32) < width && (dst_y as u32) < height;
    if !inside {
        return None;
    }

    Some(MotionVector {
        direction: PredictionDirection::from_source(entry.source),
        width: entry.w,
        height: entry.h,
        src_x: i32::from(entry.src_x),
        src_y: i32::from(entry.src_y),
        dst_x,
        dst_y,
        motion_x: entry.motion_x,
        motion_y: entry.motion_y,
        motion_scale: entry.motion_scale,
    })
}
