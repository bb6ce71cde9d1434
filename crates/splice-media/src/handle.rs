//! Interface to the underlying decode library.
//!
//! A handle is a stateful cursor into one file. Handles are not reentrant
//! and the library behind them is not reentrant either: every call must be
//! made while holding the [`DecodeGate`](crate::DecodeGate).

use crate::info::MediaInfo;
use splice_core::{FrameBuffer, Result};

/// How a seek resolves a target that is not a random-access point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekMode {
    /// Land on the closest keyframe/packet at or before the target.
    ClosestBackward,
    /// Land exactly on the target.
    Exact,
}

/// Seek-and-read cursor over one media file.
pub trait MediaHandle: Send {
    /// Position the video cursor; returns the frame actually landed on.
    fn seek_video(&mut self, frame: u64, mode: SeekMode) -> Result<u64>;

    /// Decode the frame at the cursor into `out` and advance by one.
    fn read_video(&mut self, out: &mut FrameBuffer) -> Result<()>;

    /// Frame the next `read_video` will produce.
    fn video_position(&self) -> u64;

    /// Position the audio cursor; returns the sample frame actually landed on.
    fn seek_audio(&mut self, sample: u64, mode: SeekMode) -> Result<u64>;

    /// Read interleaved samples at the cursor into `out`.
    ///
    /// `wanted` is the number of sample frames the caller still needs. The
    /// handle may write more than that (up to the stream's
    /// `read_overhead_bytes` extra) but never past `out.len()`. Returns the
    /// number of sample frames written; 0 means end of stream.
    fn read_audio(&mut self, out: &mut [u8], wanted: usize) -> Result<usize>;

    /// Sample frame the next `read_audio` starts at.
    fn audio_position(&self) -> u64;
}

/// Opens handles onto one file.
pub trait MediaOpener: Send + Sync {
    fn info(&self) -> &MediaInfo;

    fn open(&self) -> Result<Box<dyn MediaHandle>>;
}
