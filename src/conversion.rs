//! Pixel format conversion.
//!
//! Decoders emit frames in whatever layout the codec uses (planar YUV for
//! nearly every H.264 and MPEG-4 stream). [`PixelConverter`] turns them into
//! a single packed plane in the session's [`PixelFormat`] at the decoded
//! resolution, and [`ConvertedFrame`] owns the result.

use ffmpeg_next::{
    format::Pixel,
    frame::Video as VideoFrame,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};

use crate::configuration::PixelFormat;
use crate::error::CaptureError;

/// A decoded picture as one tightly packed pixel buffer.
///
/// Rows run top to bottom with no padding, so `data().len()` is always
/// `width * height * channels`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedFrame {
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
    data: Vec<u8>,
}

impl ConvertedFrame {
    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Channel layout of [`data`](Self::data).
    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    /// Bytes per pixel.
    pub fn channels(&self) -> usize {
        self.pixel_format.channels()
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width as usize * self.channels()
    }

    /// Raw pixel bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Take ownership of the pixel bytes.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Build an [`image`] value for saving or further processing.
    ///
    /// BGR frames are reordered to RGB since `image` has no BGR buffer type.
    pub fn to_image(&self) -> Result<DynamicImage, CaptureError> {
        let (width, height) = (self.width, self.height);
        let image = match self.pixel_format {
            PixelFormat::Bgr8 => {
                let mut rgb = self.data.clone();
                for pixel in rgb.chunks_exact_mut(3) {
                    pixel.swap(0, 2);
                }
                RgbImage::from_raw(width, height, rgb).map(DynamicImage::ImageRgb8)
            }
            PixelFormat::Rgb8 => {
                RgbImage::from_raw(width, height, self.data.clone()).map(DynamicImage::ImageRgb8)
            }
            PixelFormat::Rgba8 => {
                RgbaImage::from_raw(width, height, self.data.clone()).map(DynamicImage::ImageRgba8)
            }
            PixelFormat::Gray8 => {
                GrayImage::from_raw(width, height, self.data.clone()).map(DynamicImage::ImageLuma8)
            }
        };

        image.ok_or_else(|| {
            CaptureError::Conversion(format!(
                "buffer of {} bytes does not hold a {width}x{height} {} image",
                self.data.len(),
                self.pixel_format
            ))
        })
    }
}

/// Converts decoded frames to one packed [`PixelFormat`].
///
/// The scaling context is built on first use and rebuilt only when the
/// decoded frames change format or size, which some streams do mid-way.
pub(crate) struct PixelConverter {
    target: PixelFormat,
    scaler: Option<(ScalingContext, Pixel, u32, u32)>,
    scaled: VideoFrame,
}

impl PixelConverter {
    pub(crate) fn new(target: PixelFormat) -> Self {
        Self {
            target,
            scaler: None,
            scaled: VideoFrame::empty(),
        }
    }

    /// Convert `frame` at its own resolution.
    pub(crate) fn convert(&mut self, frame: &VideoFrame) -> Result<ConvertedFrame, CaptureError> {
        let (format, width, height) = (frame.format(), frame.width(), frame.height());
        if format == Pixel::None || width == 0 || height == 0 {
            return Err(CaptureError::Conversion(format!(
                "decoded frame has no usable picture ({width}x{height}, {format:?})"
            )));
        }

        let reusable = matches!(
            &self.scaler,
            Some((_, cached_format, cached_width, cached_height))
                if *cached_format == format && *cached_width == width && *cached_height == height
        );

        if !reusable {
            log::debug!(
                "Building {format:?} {width}x{height} -> {} converter",
                self.target
            );
            let context = ScalingContext::get(
                format,
                width,
                height,
                self.target.to_ffmpeg_pixel(),
                width,
                height,
                ScalingFlags::BILINEAR,
            )
            .map_err(|error| CaptureError::Conversion(error.to_string()))?;
            self.scaler = Some((context, format, width, height));
            self.scaled = VideoFrame::empty();
        }

        let Some((scaler, _, _, _)) = self.scaler.as_mut() else {
            return Err(CaptureError::Conversion(
                "scaling context unavailable".to_string(),
            ));
        };
        scaler
            .run(frame, &mut self.scaled)
            .map_err(|error| CaptureError::Conversion(error.to_string()))?;

        let row_bytes = width as usize * self.target.channels();
        let data = pack_rows(
            self.scaled.data(0),
            self.scaled.stride(0),
            row_bytes,
            height as usize,
        )
        .ok_or_else(|| {
            CaptureError::Conversion(format!(
                "converted plane is smaller than {height} rows of {row_bytes} bytes"
            ))
        })?;

        Ok(ConvertedFrame {
            width,
            height,
            pixel_format: self.target,
            data,
        })
    }
}

/// Copy `rows` rows of `row_bytes` out of a plane laid out with `stride`
/// bytes per row, dropping the padding FFmpeg adds for alignment.
///
/// Returns `None` if the plane is too short for the requested rows.
pub(crate) fn pack_rows(plane: &[u8], stride: usize, row_bytes: usize, rows: usize) -> Option<Vec<u8>> {
    if rows == 0 || row_bytes == 0 {
        return Some(Vec::new());
    }
    if stride < row_bytes || plane.len() < stride * (rows - 1) + row_bytes {
        return None;
    }

    if stride == row_bytes {
        return Some(plane[..row_bytes * rows].to_vec());
    }

    let mut buffer = Vec::with_capacity(row_bytes * rows);
    for row in plane.chunks(stride).take(rows) {
        buffer.extend_from_slice(&row[..row_bytes]);
    }
    Some(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_plane_is_copied_as_is() {
        let plane: Vec<u8> = (0..12).collect();
        assert_eq!(pack_rows(&plane, 6, 6, 2), Some(plane.clone()));
    }

    #[test]
    fn row_padding_is_stripped() {
        // 2x2 BGR with 8-byte stride.
        let plane = [1, 2, 3, 4, 5, 6, 0, 0, 7, 8, 9, 10, 11, 12, 0, 0];
        let packed = pack_rows(&plane, 8, 6, 2).unwrap();
        assert_eq!(packed, vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
    }

    #[test]
    fn last_row_may_omit_padding() {
        let plane = [1, 2, 0, 0, 3, 4];
        assert_eq!(pack_rows(&plane, 4, 2, 2), Some(vec![1, 2, 3, 4]));
    }

    #[test]
    fn short_plane_is_rejected() {
        assert_eq!(pack_rows(&[0; 10], 8, 6, 2), None);
        assert_eq!(pack_rows(&[0; 16], 4, 6, 2), None);
    }

    #[test]
    fn bgr_frame_becomes_rgb_image() {
        let frame = ConvertedFrame {
            width: 2,
            height: 1,
            pixel_format: PixelFormat::Bgr8,
            data: vec![10, 20, 30, 40, 50, 60],
        };
        assert_eq!(frame.stride(), 6);
        let image = frame.to_image().unwrap().to_rgb8();
        assert_eq!(image.get_pixel(0, 0).0, [30, 20, 10]);
        assert_eq!(image.get_pixel(1, 0).0, [60, 50, 40]);
    }

    #[test]
    fn mismatched_buffer_is_a_conversion_error() {
        let frame = ConvertedFrame {
            width: 4,
            height: 4,
            pixel_format: PixelFormat::Gray8,
            data: vec![0; 3],
        };
        assert!(matches!(frame.to_image(), Err(CaptureError::Conversion(_))));
    }
}
