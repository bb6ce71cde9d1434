//! Static metadata of a media source.

use serde::{Deserialize, Serialize};
use splice_core::{AudioFormat, FrameRate, RationalTime};

/// Everything the caches need to know about a source without decoding it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Display name or file path.
    pub name: String,
    pub video: Option<VideoStreamInfo>,
    pub audio: Option<AudioStreamInfo>,
}

/// The video stream of a source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoStreamInfo {
    pub width: u32,
    pub height: u32,
    pub frame_rate: FrameRate,
    pub frame_count: u64,
}

impl VideoStreamInfo {
    pub fn duration(&self) -> RationalTime {
        RationalTime::from_frames(self.frame_count as i64, self.frame_rate)
    }

    /// Bytes of one decoded RGBA frame.
    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// The audio stream of a source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioStreamInfo {
    pub format: AudioFormat,
    /// Total sample frames in the stream.
    pub sample_count: u64,
    /// Bytes a single read may write past what was asked for.
    pub read_overhead_bytes: usize,
}

impl AudioStreamInfo {
    pub fn duration(&self) -> RationalTime {
        RationalTime::from_samples(self.sample_count as i64, self.format.sample_rate)
    }

    #[inline]
    pub fn silence_byte(&self) -> u8 {
        self.format.sample_format.silence_byte()
    }
}

impl MediaInfo {
    /// Longest of the stream durations.
    pub fn duration(&self) -> RationalTime {
        let video = self.video.map(|v| v.duration()).unwrap_or(RationalTime::ZERO);
        let audio = self.audio.map(|a| a.duration()).unwrap_or(RationalTime::ZERO);
        video.max(audio)
    }

    pub fn has_video(&self) -> bool {
        self.video.is_some()
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }
}
