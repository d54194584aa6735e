//! Error handling integration tests.
//!
//! Opening failures must surface before any step is possible, each with
//! the variant that names its cause.

use std::path::Path;

use mvcapture::{CaptureError, CaptureSession};

#[test]
fn open_nonexistent_file() {
    let result = CaptureSession::open("this_file_does_not_exist.mp4");
    let error = result.expect_err("opening a missing file should fail");
    assert!(matches!(error, CaptureError::Open { .. }));

    let message = error.to_string();
    assert!(
        message.contains("this_file_does_not_exist.mp4"),
        "Error message should name the input: {message}",
    );
}

#[test]
fn open_empty_source() {
    let result = CaptureSession::open("");
    assert!(matches!(result, Err(CaptureError::Open { .. })));
}

#[test]
fn open_invalid_file() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let invalid_file_path = temporary_directory.path().join("invalid.mp4");
    std::fs::write(&invalid_file_path, b"this is not a media file")
        .expect("Failed to write invalid file");

    let path = invalid_file_path.to_string_lossy();
    let result = CaptureSession::open(&path);
    assert!(
        matches!(result, Err(CaptureError::Open { .. })),
        "Expected open error for invalid media file"
    );
}

#[test]
fn open_audio_only_file() {
    let path = "tests/fixtures/audio_only.wav";
    if !Path::new(path).exists() {
        return;
    }

    let result = CaptureSession::open(path);
    assert!(matches!(result, Err(CaptureError::NoVideoStream)));
}

#[test]
fn damaged_media_data_is_decoded_best_effort() {
    let path = "tests/fixtures/with_b_frames.mp4";
    if !Path::new(path).exists() {
        return;
    }

    // Zero a run of bytes in the middle of the sample data. The container
    // index stays intact, so only the packets covering the run are damaged.
    let mut damaged = std::fs::read(path).expect("Failed to read fixture");
    let middle = damaged.len() / 2;
    let end = (middle + 2048).min(damaged.len());
    damaged[middle..end].fill(0);

    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let damaged_path = temporary_directory.path().join("damaged.mp4");
    std::fs::write(&damaged_path, &damaged).expect("Failed to write damaged copy");

    let path = damaged_path.to_string_lossy();
    let Ok(mut session) = CaptureSession::open(&path) else {
        return;
    };

    let mut delivered = 0;
    loop {
        match session.read() {
            Ok(Some(_)) => delivered += 1,
            Ok(None) => break,
            Err(CaptureError::Decode(_)) => break,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert!(delivered > 0, "frames before the damage should be delivered");
    assert!(session.read().expect("read after end").is_none());
}

#[test]
fn error_messages_are_descriptive() {
    let error = CaptureError::UnsupportedCodec {
        codec: "vp9".to_string(),
    };
    assert!(error.to_string().contains("vp9"));

    let error = CaptureError::Decode("sending packet failed".to_string());
    assert!(error.to_string().contains("sending packet failed"));
}
