//! Capturing several inputs at once.
//!
//! A [`CaptureSession`] must never be stepped from two threads, so
//! [`read_all`] gives every input its own session on a [`rayon`] worker.
//! Results are returned in input order.

use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};

use crate::configuration::CaptureOptions;
use crate::error::CaptureError;
use crate::frame::CapturedFrame;
use crate::session::CaptureSession;

/// Open each input and read it to the end, in parallel.
///
/// Each entry of the result holds every frame of the corresponding input,
/// or the first error that stopped it. One failing input does not affect
/// the others.
///
/// All frames of an input are kept in memory; use [`for_each_frame`] for
/// long inputs.
pub fn read_all<S>(
    sources: &[S],
    options: &CaptureOptions,
) -> Vec<Result<Vec<CapturedFrame>, CaptureError>>
where
    S: AsRef<str> + Sync,
{
    sources
        .par_iter()
        .map(|source| {
            let mut session = CaptureSession::open_with_options(source.as_ref(), options.clone())?;
            let frames = session.frames().collect::<Result<Vec<_>, _>>()?;
            session.close();
            Ok(frames)
        })
        .collect()
}

/// Open each input in parallel and pass every captured frame to `callback`
/// together with the input's position in `sources`.
///
/// Returns the number of frames processed per input. A callback error stops
/// that input only.
pub fn for_each_frame<S, F>(
    sources: &[S],
    options: &CaptureOptions,
    callback: F,
) -> Vec<Result<u64, CaptureError>>
where
    S: AsRef<str> + Sync,
    F: Fn(usize, CapturedFrame) -> Result<(), CaptureError> + Sync,
{
    sources
        .par_iter()
        .enumerate()
        .map(|(index, source)| {
            let mut session = CaptureSession::open_with_options(source.as_ref(), options.clone())?;
            let mut count = 0u64;
            while let Some(captured) = session.read()? {
                callback(index, captured)?;
                count += 1;
            }
            session.close();
            Ok(count)
        })
        .collect()
}
