//! Pixel conversion integration tests.

use std::path::Path;

use mvcapture::{CaptureOptions, CaptureSession, PixelFormat};

const TEN_FRAMES: &str = "tests/fixtures/ten_frames_no_b.mp4";

fn first_frame(format: PixelFormat) -> mvcapture::ConvertedFrame {
    let options = CaptureOptions::new().with_pixel_format(format);
    let mut session =
        CaptureSession::open_with_options(TEN_FRAMES, options).expect("Failed to open test video");
    session
        .read()
        .expect("Read failed")
        .expect("no frame")
        .frame
}

#[test]
fn buffer_length_matches_geometry() {
    if !Path::new(TEN_FRAMES).exists() {
        return;
    }

    for format in [
        PixelFormat::Bgr8,
        PixelFormat::Rgb8,
        PixelFormat::Rgba8,
        PixelFormat::Gray8,
    ] {
        let frame = first_frame(format);
        assert_eq!(frame.pixel_format(), format);
        assert_eq!(frame.channels(), format.channels());
        assert_eq!(frame.stride(), frame.width() as usize * format.channels());
        assert_eq!(frame.data().len(), frame.stride() * frame.height() as usize);
    }
}

#[test]
fn bgr_and_rgb_differ_only_in_channel_order() {
    if !Path::new(TEN_FRAMES).exists() {
        return;
    }

    let bgr = first_frame(PixelFormat::Bgr8);
    let rgb = first_frame(PixelFormat::Rgb8);
    for (b, r) in bgr.data().chunks_exact(3).zip(rgb.data().chunks_exact(3)) {
        assert_eq!([b[2], b[1], b[0]], [r[0], r[1], r[2]]);
    }
}

#[test]
fn conversion_is_deterministic() {
    if !Path::new(TEN_FRAMES).exists() {
        return;
    }

    assert_eq!(first_frame(PixelFormat::Bgr8), first_frame(PixelFormat::Bgr8));
}

#[test]
fn frames_save_as_png() {
    if !Path::new(TEN_FRAMES).exists() {
        return;
    }

    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let output_path = temporary_directory.path().join("frame.png");

    let frame = first_frame(PixelFormat::Bgr8);
    let image = frame.to_image().expect("Image conversion failed");
    image.save(&output_path).expect("Failed to save frame");

    let reloaded = image::open(&output_path).expect("Failed to reload frame").to_rgb8();
    assert_eq!(reloaded.dimensions(), (frame.width(), frame.height()));
}
