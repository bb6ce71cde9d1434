//! Deterministic synthetic media.
//!
//! Produces test-pattern video (the frame index is stamped into every
//! frame) and generated audio in any sample format, with keyframe/packet
//! granularity like a real demuxer. Counters record every seek and read so
//! callers can observe cache hits, and transient failures can be injected.

use crate::handle::{MediaHandle, MediaOpener, SeekMode};
use crate::info::{AudioStreamInfo, MediaInfo, VideoStreamInfo};
use splice_core::{AudioFormat, FrameBuffer, FrameRate, Result, SampleFormat, SpliceError};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Generated audio content. Values are per channel where applicable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Signal {
    /// The same value on every sample of a channel (`[left, right]`; mono uses left).
    Constant([f32; 2]),
    /// Sine wave.
    Sine { frequency: f32, amplitude: f32 },
    /// Sawtooth in [-0.5, 0.5) over `period` samples.
    Ramp { period: u32 },
}

impl Signal {
    fn value(&self, index: u64, channel: usize, sample_rate: u32) -> f32 {
        match *self {
            Signal::Constant(values) => values[channel.min(1)],
            Signal::Sine {
                frequency,
                amplitude,
            } => {
                let t = index as f64 / sample_rate as f64;
                (amplitude as f64 * (t * frequency as f64 * std::f64::consts::TAU).sin()) as f32
            }
            Signal::Ramp { period } => {
                let period = period.max(1) as u64;
                (index % period) as f32 / period as f32 - 0.5
            }
        }
    }
}

/// Counters and fault injection shared by every handle of one synthetic file.
#[derive(Debug, Default)]
pub struct SyntheticStats {
    pub video_seeks: AtomicU64,
    pub frames_decoded: AtomicU64,
    pub audio_seeks: AtomicU64,
    pub audio_reads: AtomicU64,
    fail_reads: AtomicU32,
    fail_seeks: AtomicU32,
}

impl SyntheticStats {
    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded.load(Ordering::SeqCst)
    }

    pub fn video_seeks(&self) -> u64 {
        self.video_seeks.load(Ordering::SeqCst)
    }

    pub fn audio_reads(&self) -> u64 {
        self.audio_reads.load(Ordering::SeqCst)
    }

    pub fn audio_seeks(&self) -> u64 {
        self.audio_seeks.load(Ordering::SeqCst)
    }

    /// Make the next `n` reads (video or audio) fail transiently.
    pub fn fail_next_reads(&self, n: u32) {
        self.fail_reads.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` seeks fail transiently.
    pub fn fail_next_seeks(&self, n: u32) {
        self.fail_seeks.store(n, Ordering::SeqCst);
    }

    fn take_fault(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Opener for a synthetic file.
pub struct SyntheticMedia {
    info: MediaInfo,
    gop: u64,
    packet_frames: usize,
    signal: Signal,
    stats: Arc<SyntheticStats>,
}

impl SyntheticMedia {
    /// Video-only source.
    pub fn video(name: &str, width: u32, height: u32, frame_rate: FrameRate, frame_count: u64) -> Self {
        Self {
            info: MediaInfo {
                name: name.to_string(),
                video: Some(VideoStreamInfo {
                    width,
                    height,
                    frame_rate,
                    frame_count,
                }),
                audio: None,
            },
            gop: 12,
            packet_frames: 1024,
            signal: Signal::Sine {
                frequency: 440.0,
                amplitude: 0.5,
            },
            stats: Arc::default(),
        }
    }

    /// Audio-only source.
    pub fn audio(name: &str, format: AudioFormat, sample_count: u64, signal: Signal) -> Self {
        let packet_frames = 1024;
        Self {
            info: MediaInfo {
                name: name.to_string(),
                video: None,
                audio: Some(AudioStreamInfo {
                    format,
                    sample_count,
                    read_overhead_bytes: packet_frames * format.bytes_per_frame(),
                }),
            },
            gop: 12,
            packet_frames,
            signal,
            stats: Arc::default(),
        }
    }

    /// Add an audio stream to a video source.
    pub fn with_audio(mut self, format: AudioFormat, sample_count: u64, signal: Signal) -> Self {
        self.info.audio = Some(AudioStreamInfo {
            format,
            sample_count,
            read_overhead_bytes: self.packet_frames * format.bytes_per_frame(),
        });
        self.signal = signal;
        self
    }

    /// Distance between keyframes.
    pub fn with_gop(mut self, gop: u64) -> Self {
        self.gop = gop.max(1);
        self
    }

    /// Sample frames produced per audio read.
    pub fn with_packet_frames(mut self, packet_frames: usize) -> Self {
        self.packet_frames = packet_frames.max(1);
        if let Some(audio) = self.info.audio.as_mut() {
            audio.read_overhead_bytes = self.packet_frames * audio.format.bytes_per_frame();
        }
        self
    }

    pub fn stats(&self) -> Arc<SyntheticStats> {
        Arc::clone(&self.stats)
    }

    /// The value a source of this shape produces for `(sample, channel)`.
    pub fn sample_value(&self, index: u64, channel: usize) -> f32 {
        let rate = self.info.audio.map(|a| a.format.sample_rate).unwrap_or(48_000);
        self.signal.value(index, channel, rate)
    }
}

impl MediaOpener for SyntheticMedia {
    fn info(&self) -> &MediaInfo {
        &self.info
    }

    fn open(&self) -> Result<Box<dyn MediaHandle>> {
        Ok(Box::new(SyntheticHandle {
            info: self.info.clone(),
            gop: self.gop,
            packet_frames: self.packet_frames,
            signal: self.signal,
            stats: Arc::clone(&self.stats),
            video_pos: 0,
            audio_pos: 0,
        }))
    }
}

struct SyntheticHandle {
    info: MediaInfo,
    gop: u64,
    packet_frames: usize,
    signal: Signal,
    stats: Arc<SyntheticStats>,
    video_pos: u64,
    audio_pos: u64,
}

fn encode_sample(value: f32, format: SampleFormat, out: &mut [u8]) {
    let v = value.clamp(-1.0, 1.0);
    match format {
        SampleFormat::U8 => out[0] = ((v * 127.0) + 128.0).round() as u8,
        SampleFormat::S16 => out.copy_from_slice(&((v * 32767.0) as i16).to_le_bytes()),
        SampleFormat::S32 => out.copy_from_slice(&((v as f64 * 2_147_483_647.0) as i32).to_le_bytes()),
        SampleFormat::F32 => out.copy_from_slice(&value.to_ne_bytes()),
    }
}

impl MediaHandle for SyntheticHandle {
    fn seek_video(&mut self, frame: u64, mode: SeekMode) -> Result<u64> {
        let video = self
            .info
            .video
            .ok_or_else(|| SpliceError::NotFound(format!("{} has no video", self.info.name)))?;
        if SyntheticStats::take_fault(&self.stats.fail_seeks) {
            return Err(SpliceError::Decoder("injected seek failure".into()));
        }
        if frame >= video.frame_count {
            return Err(SpliceError::InvalidParameter(format!(
                "frame {frame} past end ({})",
                video.frame_count
            )));
        }
        self.stats.video_seeks.fetch_add(1, Ordering::SeqCst);
        self.video_pos = match mode {
            SeekMode::ClosestBackward => frame - frame % self.gop,
            SeekMode::Exact => frame,
        };
        trace!(target_frame = frame, landed = self.video_pos, "synthetic video seek");
        Ok(self.video_pos)
    }

    fn read_video(&mut self, out: &mut FrameBuffer) -> Result<()> {
        let video = self
            .info
            .video
            .ok_or_else(|| SpliceError::NotFound(format!("{} has no video", self.info.name)))?;
        if SyntheticStats::take_fault(&self.stats.fail_reads) {
            return Err(SpliceError::Decoder("injected read failure".into()));
        }
        if self.video_pos >= video.frame_count {
            return Err(SpliceError::NotFound("end of video stream".into()));
        }
        *out = FrameBuffer::test_pattern(video.width, video.height, self.video_pos);
        self.stats.frames_decoded.fetch_add(1, Ordering::SeqCst);
        self.video_pos += 1;
        Ok(())
    }

    fn video_position(&self) -> u64 {
        self.video_pos
    }

    fn seek_audio(&mut self, sample: u64, mode: SeekMode) -> Result<u64> {
        let audio = self
            .info
            .audio
            .ok_or_else(|| SpliceError::NotFound(format!("{} has no audio", self.info.name)))?;
        if SyntheticStats::take_fault(&self.stats.fail_seeks) {
            return Err(SpliceError::Decoder("injected seek failure".into()));
        }
        let sample = sample.min(audio.sample_count);
        self.stats.audio_seeks.fetch_add(1, Ordering::SeqCst);
        self.audio_pos = match mode {
            SeekMode::ClosestBackward => sample - sample % self.packet_frames as u64,
            SeekMode::Exact => sample,
        };
        Ok(self.audio_pos)
    }

    fn read_audio(&mut self, out: &mut [u8], _wanted: usize) -> Result<usize> {
        let audio = self
            .info
            .audio
            .ok_or_else(|| SpliceError::NotFound(format!("{} has no audio", self.info.name)))?;
        if SyntheticStats::take_fault(&self.stats.fail_reads) {
            return Err(SpliceError::Decoder("injected read failure".into()));
        }
        let format = audio.format;
        let bpf = format.bytes_per_frame();
        let bps = format.sample_format.bytes_per_sample();
        let remaining = audio.sample_count.saturating_sub(self.audio_pos) as usize;
        // Whole packets regardless of how much was wanted.
        let frames = self.packet_frames.min(remaining).min(out.len() / bpf.max(1));

        for f in 0..frames {
            let index = self.audio_pos + f as u64;
            for ch in 0..format.channels as usize {
                let value = self.signal.value(index, ch, format.sample_rate);
                let at = f * bpf + ch * bps;
                encode_sample(value, format.sample_format, &mut out[at..at + bps]);
            }
        }
        self.stats.audio_reads.fetch_add(1, Ordering::SeqCst);
        self.audio_pos += frames as u64;
        Ok(frames)
    }

    fn audio_position(&self) -> u64 {
        self.audio_pos
    }
}
