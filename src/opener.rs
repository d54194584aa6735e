//! Stream opening.
//!
//! Opens a file path or network URL, picks the video stream, and builds a
//! decoder that exports per-macroblock motion vectors. The export flag is
//! part of the codec context before `avcodec_open2` runs; setting it later
//! has no effect on what side data the decoder attaches.

use std::time::Duration;

use ffmpeg_next::{
    Error as FfmpegError, codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder, format::context::Input, media::Type,
};
use ffmpeg_sys_next::AV_CODEC_FLAG2_EXPORT_MVS;

use crate::configuration::CaptureOptions;
use crate::error::CaptureError;
use crate::metadata::StreamInfo;

/// Demuxer, decoder and stream description produced by [`open_stream`].
///
/// The contexts are owned values; if any later step of opening fails, the
/// ones already built are released when this function's locals drop.
pub(crate) struct OpenedStream {
    pub input: Input,
    pub decoder: VideoDecoder,
    pub info: StreamInfo,
}

fn open_error(source: &str, reason: impl Into<String>) -> CaptureError {
    CaptureError::Open {
        input: source.to_string(),
        reason: reason.into(),
    }
}

/// Whether `source` names a network resource rather than a local file.
pub(crate) fn is_url(source: &str) -> bool {
    source.contains("://") && !source.starts_with("file://")
}

/// Open `source` and prepare a motion-vector exporting decoder for its
/// video stream.
pub(crate) fn open_stream(
    source: &str,
    options: &CaptureOptions,
) -> Result<OpenedStream, CaptureError> {
    if source.trim().is_empty() {
        return Err(open_error(source, "input path or URL must not be empty"));
    }

    log::debug!("Opening capture input: {source}");

    ffmpeg_next::init()
        .map_err(|error| open_error(source, format!("FFmpeg initialisation failed: {error}")))?;

    let input = if is_url(source) {
        ffmpeg_next::format::input_with_dictionary(&source, options.network.to_dictionary())
    } else {
        ffmpeg_next::format::input(&source)
    }
    .map_err(|error| open_error(source, error.to_string()))?;

    let format = input.format().name().to_string();
    let is_network = format.split(',').any(|name| name == "rtsp");

    let container_micros = input.duration();
    let duration = if container_micros > 0 {
        Duration::from_micros(container_micros as u64)
    } else {
        Duration::ZERO
    };

    // Prefer FFmpeg's pick; fall back to the first video stream.
    let stream = input
        .streams()
        .best(Type::Video)
        .or_else(|| {
            input
                .streams()
                .find(|stream| stream.parameters().medium() == Type::Video)
        })
        .ok_or(CaptureError::NoVideoStream)?;

    let stream_index = stream.index();
    let time_base = stream.time_base();
    let parameters = stream.parameters();
    let declared_frames = stream.frames();

    let frame_rate = stream.avg_frame_rate();
    let frames_per_second = if frame_rate.denominator() != 0 && frame_rate.numerator() != 0 {
        f64::from(frame_rate.numerator()) / f64::from(frame_rate.denominator())
    } else {
        let rate = stream.rate();
        if rate.denominator() != 0 {
            f64::from(rate.numerator()) / f64::from(rate.denominator())
        } else {
            0.0
        }
    };

    let codec_id = parameters.id();
    if ffmpeg_next::decoder::find(codec_id).is_none() {
        return Err(CaptureError::UnsupportedCodec {
            codec: codec_id.name().to_string(),
        });
    }

    let mut codec_context = CodecContext::from_parameters(parameters).map_err(|error| {
        open_error(
            source,
            format!("Failed to read codec parameters for stream {stream_index}: {error}"),
        )
    })?;

    unsafe {
        let context_pointer = codec_context.as_mut_ptr();
        (*context_pointer).flags2 |= AV_CODEC_FLAG2_EXPORT_MVS as i32;
    }

    let decoder = codec_context
        .decoder()
        .video()
        .map_err(|error| match error {
            FfmpegError::DecoderNotFound => CaptureError::UnsupportedCodec {
                codec: codec_id.name().to_string(),
            },
            other => open_error(
                source,
                format!("Failed to open video decoder for stream {stream_index}: {other}"),
            ),
        })?;

    let codec = decoder
        .codec()
        .map(|codec| codec.name().to_string())
        .unwrap_or_else(|| codec_id.name().to_string());

    let frame_count = if declared_frames > 0 {
        declared_frames as u64
    } else if frames_per_second > 0.0 {
        (duration.as_secs_f64() * frames_per_second) as u64
    } else {
        0
    };

    let info = StreamInfo {
        width: decoder.width(),
        height: decoder.height(),
        frames_per_second,
        frame_count,
        codec,
        time_base,
        stream_index,
        format,
        duration,
        is_network,
    };

    log::info!(
        "Opened capture input: {source} (format={}, stream={}, {}x{}, {:.2} fps, codec={}, ~{} frames, network={})",
        info.format,
        info.stream_index,
        info.width,
        info.height,
        info.frames_per_second,
        info.codec,
        info.frame_count,
        info.is_network,
    );

    Ok(OpenedStream {
        input,
        decoder,
        info,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_urls() {
        assert!(is_url("rtsp://10.0.0.2:554/stream1"));
        assert!(is_url("http://example.com/clip.mp4"));
        assert!(!is_url("file:///tmp/clip.mp4"));
        assert!(!is_url("videos/clip.mp4"));
        assert!(!is_url("C:\\videos\\clip.mp4"));
    }

    #[test]
    fn empty_source_is_an_open_error() {
        let result = open_stream("   ", &CaptureOptions::new());
        assert!(matches!(result, Err(CaptureError::Open { .. })));
    }
}
