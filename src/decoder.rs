//! The step decoder.
//!
//! A decoder does not turn one packet into one frame: it may sit on several
//! packets before emitting anything (B-frame reordering) and keeps frames
//! back until it is told the input has ended. [`StepDecoder`] makes that
//! hidden state explicit with three states:
//!
//! - [`DecoderState::Ready`]: input remains; frames are produced by feeding
//!   packets.
//! - [`DecoderState::Draining`]: input is exhausted and the decoder has been
//!   flushed; remaining frames are collected without new input.
//! - [`DecoderState::Ended`]: nothing more will be produced. Terminal.
//!
//! Each call to [`StepDecoder::step`] first asks the decoder for a frame it
//! already holds, and only reads input when the decoder needs more. No
//! frame is ever buffered on this side of the decoder.

use ffmpeg_next::{
    Error as FfmpegError, Packet, decoder::Video as VideoDecoder, format::context::Input,
    frame::Video as VideoFrame, util::error::EAGAIN,
};

use crate::configuration::{CaptureOptions, ErrorPolicy};
use crate::error::CaptureError;

/// Lifecycle of a capture session's decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecoderState {
    /// Input remains to be read.
    Ready,
    /// Input is exhausted and the decoder is flushing buffered frames.
    Draining,
    /// All frames have been delivered, or a fatal error occurred.
    Ended,
}

/// Counters describing the work done by a session so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    /// Packets read from the container, all streams.
    pub packets_read: u64,
    /// Packets of the video stream accepted by the decoder.
    pub packets_submitted: u64,
    /// Packets belonging to other streams.
    pub packets_skipped: u64,
    /// Frames returned by the decoder.
    pub frames_decoded: u64,
    /// Packet reads or decodes that failed and were skipped.
    pub transient_errors: u64,
}

/// Where compressed packets come from.
pub(crate) trait PacketSource {
    type Packet;

    /// Read the next packet and the index of the stream it belongs to.
    /// Returns [`FfmpegError::Eof`] once the input is exhausted.
    fn next_packet(&mut self) -> Result<(usize, Self::Packet), FfmpegError>;
}

/// The send/receive half of a codec.
pub(crate) trait FrameDecoder {
    type Packet;
    type Frame;

    fn submit(&mut self, packet: &Self::Packet) -> Result<(), FfmpegError>;

    fn submit_eof(&mut self) -> Result<(), FfmpegError>;

    /// Move one decoded frame into `frame`. `EAGAIN` means more input is
    /// needed, [`FfmpegError::Eof`] that the decoder is fully drained.
    fn take_frame(&mut self, frame: &mut Self::Frame) -> Result<(), FfmpegError>;
}

impl PacketSource for Input {
    type Packet = Packet;

    fn next_packet(&mut self) -> Result<(usize, Packet), FfmpegError> {
        let mut packet = Packet::empty();
        packet.read(self)?;
        Ok((packet.stream(), packet))
    }
}

impl FrameDecoder for VideoDecoder {
    type Packet = Packet;
    type Frame = VideoFrame;

    fn submit(&mut self, packet: &Packet) -> Result<(), FfmpegError> {
        self.send_packet(packet)
    }

    fn submit_eof(&mut self) -> Result<(), FfmpegError> {
        self.send_eof()
    }

    fn take_frame(&mut self, frame: &mut VideoFrame) -> Result<(), FfmpegError> {
        self.receive_frame(frame)
    }
}

/// Failures that only affect the packet at hand. Everything else (out of
/// memory, invalid decoder state, missing decoder) is fatal.
fn is_transient(error: &FfmpegError) -> bool {
    matches!(error, FfmpegError::InvalidData | FfmpegError::Unknown)
}

fn needs_input(error: &FfmpegError) -> bool {
    matches!(error, FfmpegError::Other { errno } if *errno == EAGAIN)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Read,
    Send,
    Receive,
}

impl Stage {
    fn describe(self) -> &'static str {
        match self {
            Stage::Read => "reading packet",
            Stage::Send => "submitting packet",
            Stage::Receive => "receiving frame",
        }
    }
}

/// Drives a decoder one output frame at a time.
#[derive(Debug)]
pub(crate) struct StepDecoder {
    stream_index: usize,
    policy: ErrorPolicy,
    max_consecutive_failures: u32,
    consecutive_failures: u32,
    state: DecoderState,
    stats: DecodeStats,
}

impl StepDecoder {
    pub(crate) fn new(stream_index: usize, options: &CaptureOptions) -> Self {
        Self {
            stream_index,
            policy: options.error_policy,
            max_consecutive_failures: options.max_consecutive_failures.max(1),
            consecutive_failures: 0,
            state: DecoderState::Ready,
            stats: DecodeStats::default(),
        }
    }

    pub(crate) fn state(&self) -> DecoderState {
        self.state
    }

    pub(crate) fn stats(&self) -> DecodeStats {
        self.stats
    }

    /// Advance until the decoder yields one frame into `frame`.
    ///
    /// Returns `Ok(true)` when a frame was produced and `Ok(false)` once the
    /// stream has ended; the latter repeats for every later call. A fatal
    /// failure returns an error and moves to [`DecoderState::Ended`].
    pub(crate) fn step<S, D>(
        &mut self,
        source: &mut S,
        decoder: &mut D,
        frame: &mut D::Frame,
    ) -> Result<bool, CaptureError>
    where
        S: PacketSource,
        D: FrameDecoder<Packet = S::Packet>,
    {
        loop {
            if self.state == DecoderState::Ended {
                return Ok(false);
            }

            match decoder.take_frame(frame) {
                Ok(()) => {
                    self.stats.frames_decoded += 1;
                    self.consecutive_failures = 0;
                    log::trace!(
                        "Decoded frame {} ({:?})",
                        self.stats.frames_decoded,
                        self.state
                    );
                    return Ok(true);
                }
                Err(FfmpegError::Eof) => {
                    self.finish();
                    return Ok(false);
                }
                Err(error) if needs_input(&error) => {
                    if self.state == DecoderState::Draining {
                        // A flushed decoder that asks for input has nothing left.
                        self.finish();
                        return Ok(false);
                    }
                    self.feed(source, decoder)?;
                }
                Err(error) => {
                    let transient = is_transient(&error);
                    self.record_failure(Stage::Receive, error, transient)?;
                }
            }
        }
    }

    /// Read packets until one video packet reached the decoder, the input
    /// ran out, or a read failed.
    fn feed<S, D>(&mut self, source: &mut S, decoder: &mut D) -> Result<(), CaptureError>
    where
        S: PacketSource,
        D: FrameDecoder<Packet = S::Packet>,
    {
        loop {
            match source.next_packet() {
                Ok((stream_index, packet)) => {
                    self.stats.packets_read += 1;
                    if stream_index != self.stream_index {
                        self.stats.packets_skipped += 1;
                        log::trace!("Skipping packet of stream {stream_index}");
                        continue;
                    }

                    return match decoder.submit(&packet) {
                        Ok(()) => {
                            self.stats.packets_submitted += 1;
                            log::trace!("Submitted packet {}", self.stats.packets_submitted);
                            self.consecutive_failures = 0;
                            Ok(())
                        }
                        Err(error) => {
                            let transient = is_transient(&error);
                            self.record_failure(Stage::Send, error, transient)
                        }
                    };
                }
                Err(FfmpegError::Eof) => {
                    log::debug!(
                        "Input exhausted after {} packets, flushing decoder",
                        self.stats.packets_read
                    );
                    match decoder.submit_eof() {
                        // Eof here means the decoder was already flushed.
                        Ok(()) | Err(FfmpegError::Eof) => {}
                        Err(error) => return self.record_failure(Stage::Send, error, false),
                    }
                    self.state = DecoderState::Draining;
                    return Ok(());
                }
                // Nothing available yet (non-blocking network demuxers).
                Err(error) if needs_input(&error) => return Ok(()),
                Err(error) => {
                    let transient = is_transient(&error);
                    return self.record_failure(Stage::Read, error, transient);
                }
            }
        }
    }

    /// Count a failure, or end the session if it cannot be skipped.
    fn record_failure(
        &mut self,
        stage: Stage,
        error: FfmpegError,
        transient: bool,
    ) -> Result<(), CaptureError> {
        if !transient || self.policy == ErrorPolicy::Strict {
            self.state = DecoderState::Ended;
            log::error!("Fatal error while {}: {error}", stage.describe());
            return Err(CaptureError::Decode(format!(
                "{} failed: {error}",
                stage.describe()
            )));
        }

        self.stats.transient_errors += 1;
        self.consecutive_failures += 1;
        log::warn!(
            "Skipping after error while {}: {error} ({} consecutive)",
            stage.describe(),
            self.consecutive_failures
        );

        if self.consecutive_failures >= self.max_consecutive_failures {
            self.state = DecoderState::Ended;
            return Err(CaptureError::Decode(format!(
                "giving up after {} consecutive failures, last while {}: {error}",
                self.consecutive_failures,
                stage.describe()
            )));
        }

        Ok(())
    }

    fn finish(&mut self) {
        if self.state != DecoderState::Ended {
            log::debug!(
                "Decoder drained: {} frames from {} packets ({} skipped, {} errors)",
                self.stats.frames_decoded,
                self.stats.packets_submitted,
                self.stats.packets_skipped,
                self.stats.transient_errors
            );
        }
        self.state = DecoderState::Ended;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use ffmpeg_next::util::error::ENOMEM;

    use super::*;

    const VIDEO: usize = 0;
    const AUDIO: usize = 1;

    /// Packets are plain ids; an exhausted script reads as end of input.
    struct ScriptedSource {
        script: VecDeque<Result<(usize, u32), FfmpegError>>,
    }

    impl ScriptedSource {
        fn video(count: u32) -> Self {
            Self {
                script: (0..count).map(|id| Ok((VIDEO, id))).collect(),
            }
        }

        fn scripted(items: Vec<Result<(usize, u32), FfmpegError>>) -> Self {
            Self {
                script: items.into(),
            }
        }
    }

    impl PacketSource for ScriptedSource {
        type Packet = u32;

        fn next_packet(&mut self) -> Result<(usize, u32), FfmpegError> {
            self.script.pop_front().unwrap_or(Err(FfmpegError::Eof))
        }
    }

    /// Holds `delay` packets back before emitting, like a reordering codec.
    struct DelayDecoder {
        delay: usize,
        held: VecDeque<u32>,
        flushed: bool,
        corrupt: Vec<u32>,
        fatal: Option<u32>,
    }

    impl DelayDecoder {
        fn new(delay: usize) -> Self {
            Self {
                delay,
                held: VecDeque::new(),
                flushed: false,
                corrupt: Vec::new(),
                fatal: None,
            }
        }
    }

    impl FrameDecoder for DelayDecoder {
        type Packet = u32;
        type Frame = u32;

        fn submit(&mut self, packet: &u32) -> Result<(), FfmpegError> {
            if self.fatal == Some(*packet) {
                return Err(FfmpegError::Other { errno: ENOMEM });
            }
            if self.corrupt.contains(packet) {
                return Err(FfmpegError::InvalidData);
            }
            self.held.push_back(*packet);
            Ok(())
        }

        fn submit_eof(&mut self) -> Result<(), FfmpegError> {
            if self.flushed {
                return Err(FfmpegError::Eof);
            }
            self.flushed = true;
            Ok(())
        }

        fn take_frame(&mut self, frame: &mut u32) -> Result<(), FfmpegError> {
            if self.held.len() > self.delay || (self.flushed && !self.held.is_empty()) {
                *frame = self.held.pop_front().unwrap_or_default();
                Ok(())
            } else if self.flushed {
                Err(FfmpegError::Eof)
            } else {
                Err(FfmpegError::Other { errno: EAGAIN })
            }
        }
    }

    fn collect(
        stepper: &mut StepDecoder,
        source: &mut ScriptedSource,
        decoder: &mut DelayDecoder,
    ) -> Result<Vec<u32>, CaptureError> {
        let mut frames = Vec::new();
        let mut frame = 0;
        while stepper.step(source, decoder, &mut frame)? {
            frames.push(frame);
        }
        Ok(frames)
    }

    #[test]
    fn delayed_decoder_yields_every_frame() {
        let mut stepper = StepDecoder::new(VIDEO, &CaptureOptions::new());
        let mut source = ScriptedSource::video(6);
        let mut decoder = DelayDecoder::new(2);

        let frames = collect(&mut stepper, &mut source, &mut decoder).unwrap();
        assert_eq!(frames, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(stepper.state(), DecoderState::Ended);
        assert_eq!(stepper.stats().packets_submitted, 6);
        assert_eq!(stepper.stats().frames_decoded, 6);
    }

    #[test]
    fn flush_releases_frames_held_at_end_of_input() {
        let mut stepper = StepDecoder::new(VIDEO, &CaptureOptions::new());
        let mut source = ScriptedSource::video(3);
        let mut decoder = DelayDecoder::new(3);
        let mut frame = 0;

        assert!(stepper.step(&mut source, &mut decoder, &mut frame).unwrap());
        assert_eq!(frame, 0);
        // The whole input had to be read before the first frame appeared.
        assert_eq!(stepper.state(), DecoderState::Draining);

        assert!(stepper.step(&mut source, &mut decoder, &mut frame).unwrap());
        assert!(stepper.step(&mut source, &mut decoder, &mut frame).unwrap());
        assert_eq!(frame, 2);
        assert!(!stepper.step(&mut source, &mut decoder, &mut frame).unwrap());
        assert_eq!(stepper.state(), DecoderState::Ended);
    }

    #[test]
    fn stays_ready_while_input_remains() {
        let mut stepper = StepDecoder::new(VIDEO, &CaptureOptions::new());
        let mut source = ScriptedSource::video(10);
        let mut decoder = DelayDecoder::new(1);
        let mut frame = 0;

        assert!(stepper.step(&mut source, &mut decoder, &mut frame).unwrap());
        assert_eq!(stepper.state(), DecoderState::Ready);
        assert_eq!(stepper.stats().packets_submitted, 2);
    }

    #[test]
    fn packets_of_other_streams_are_skipped() {
        let mut stepper = StepDecoder::new(VIDEO, &CaptureOptions::new());
        let mut source = ScriptedSource::scripted(vec![
            Ok((AUDIO, 100)),
            Ok((VIDEO, 0)),
            Ok((AUDIO, 101)),
            Ok((AUDIO, 102)),
            Ok((VIDEO, 1)),
        ]);
        let mut decoder = DelayDecoder::new(0);

        let frames = collect(&mut stepper, &mut source, &mut decoder).unwrap();
        assert_eq!(frames, vec![0, 1]);
        assert_eq!(stepper.stats().packets_read, 5);
        assert_eq!(stepper.stats().packets_skipped, 3);
    }

    #[test]
    fn ended_is_terminal_and_idempotent() {
        let mut stepper = StepDecoder::new(VIDEO, &CaptureOptions::new());
        let mut source = ScriptedSource::video(2);
        let mut decoder = DelayDecoder::new(0);

        collect(&mut stepper, &mut source, &mut decoder).unwrap();
        let stats = stepper.stats();

        let mut frame = 0;
        for _ in 0..5 {
            assert!(!stepper.step(&mut source, &mut decoder, &mut frame).unwrap());
        }
        assert_eq!(stepper.state(), DecoderState::Ended);
        assert_eq!(stepper.stats(), stats);
    }

    #[test]
    fn empty_input_ends_without_frames() {
        let mut stepper = StepDecoder::new(VIDEO, &CaptureOptions::new());
        let mut source = ScriptedSource::video(0);
        let mut decoder = DelayDecoder::new(2);

        let frames = collect(&mut stepper, &mut source, &mut decoder).unwrap();
        assert!(frames.is_empty());
        assert_eq!(stepper.state(), DecoderState::Ended);
    }

    #[test]
    fn corrupt_packet_is_skipped() {
        let mut stepper = StepDecoder::new(VIDEO, &CaptureOptions::new());
        let mut source = ScriptedSource::video(5);
        let mut decoder = DelayDecoder::new(1);
        decoder.corrupt = vec![2];

        let frames = collect(&mut stepper, &mut source, &mut decoder).unwrap();
        assert_eq!(frames, vec![0, 1, 3, 4]);
        assert_eq!(stepper.stats().transient_errors, 1);
    }

    #[test]
    fn strict_policy_stops_at_first_corrupt_packet() {
        let options = CaptureOptions::new().with_error_policy(ErrorPolicy::Strict);
        let mut stepper = StepDecoder::new(VIDEO, &options);
        let mut source = ScriptedSource::video(5);
        let mut decoder = DelayDecoder::new(0);
        decoder.corrupt = vec![2];

        let result = collect(&mut stepper, &mut source, &mut decoder);
        assert!(matches!(result, Err(CaptureError::Decode(_))));
        assert_eq!(stepper.state(), DecoderState::Ended);

        let mut frame = 0;
        assert!(!stepper.step(&mut source, &mut decoder, &mut frame).unwrap());
    }

    #[test]
    fn resource_exhaustion_is_fatal() {
        let mut stepper = StepDecoder::new(VIDEO, &CaptureOptions::new());
        let mut source = ScriptedSource::video(5);
        let mut decoder = DelayDecoder::new(0);
        decoder.fatal = Some(1);

        let mut frame = 0;
        assert!(stepper.step(&mut source, &mut decoder, &mut frame).unwrap());
        let error = stepper
            .step(&mut source, &mut decoder, &mut frame)
            .unwrap_err();
        assert!(matches!(error, CaptureError::Decode(_)));
        assert_eq!(stepper.state(), DecoderState::Ended);
    }

    #[test]
    fn gives_up_after_consecutive_failures() {
        let options = CaptureOptions::new().with_max_consecutive_failures(3);
        let mut stepper = StepDecoder::new(VIDEO, &options);
        let mut source = ScriptedSource::video(10);
        let mut decoder = DelayDecoder::new(0);
        decoder.corrupt = (0..10).collect();

        let result = collect(&mut stepper, &mut source, &mut decoder);
        assert!(matches!(result, Err(CaptureError::Decode(_))));
        assert_eq!(stepper.stats().transient_errors, 3);
        assert_eq!(stepper.state(), DecoderState::Ended);
    }

    #[test]
    fn out_of_memory_while_reading_is_fatal() {
        let mut stepper = StepDecoder::new(VIDEO, &CaptureOptions::new());
        let mut source = ScriptedSource::scripted(vec![
            Ok((VIDEO, 0)),
            Err(FfmpegError::Other { errno: ENOMEM }),
            Ok((VIDEO, 1)),
        ]);
        let mut decoder = DelayDecoder::new(0);
        let mut frame = 0;

        assert!(stepper.step(&mut source, &mut decoder, &mut frame).unwrap());
        let error = stepper
            .step(&mut source, &mut decoder, &mut frame)
            .unwrap_err();
        assert!(matches!(error, CaptureError::Decode(_)));
        assert_eq!(stepper.state(), DecoderState::Ended);
        assert_eq!(stepper.stats().transient_errors, 0);
        assert!(!stepper.step(&mut source, &mut decoder, &mut frame).unwrap());
    }

    #[test]
    fn read_errors_are_skipped() {
        let mut stepper = StepDecoder::new(VIDEO, &CaptureOptions::new());
        let mut source = ScriptedSource::scripted(vec![
            Ok((VIDEO, 0)),
            Err(FfmpegError::InvalidData),
            Ok((VIDEO, 1)),
        ]);
        let mut decoder = DelayDecoder::new(0);

        let frames = collect(&mut stepper, &mut source, &mut decoder).unwrap();
        assert_eq!(frames, vec![0, 1]);
        assert_eq!(stepper.stats().transient_errors, 1);
    }
}
