//! Audio sample formats and raw sample buffers.
//!
//! Decoded audio is cached in the source's native sample format. Readers
//! are allowed to overshoot a request by a source-specific number of bytes,
//! so buffers are allocated with headroom: [`SampleBuffer`] tracks the
//! allocated capacity separately from the bytes that are logically valid.

use crate::{Result, SpliceError};
use serde::{Deserialize, Serialize};

/// Native sample encoding of an audio stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SampleFormat {
    /// Unsigned 8-bit, silence at 0x80.
    U8,
    /// Signed 16-bit little endian.
    S16,
    /// Signed 32-bit little endian.
    S32,
    /// 32-bit float in [-1, 1].
    #[default]
    F32,
}

impl SampleFormat {
    #[inline]
    pub fn bytes_per_sample(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::S16 => 2,
            Self::S32 | Self::F32 => 4,
        }
    }

    /// Byte value that encodes silence in this format.
    #[inline]
    pub fn silence_byte(self) -> u8 {
        match self {
            Self::U8 => 0x80,
            Self::S16 | Self::S32 | Self::F32 => 0,
        }
    }

    #[inline]
    pub fn is_float(self) -> bool {
        matches!(self, Self::F32)
    }
}

/// Sample rate, channel count and encoding of an interleaved stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub sample_format: SampleFormat,
}

impl AudioFormat {
    pub const fn new(sample_rate: u32, channels: u16, sample_format: SampleFormat) -> Self {
        Self {
            sample_rate,
            channels,
            sample_format,
        }
    }

    /// 48 kHz stereo float, the usual mix target.
    pub const fn stereo_f32(sample_rate: u32) -> Self {
        Self::new(sample_rate, 2, SampleFormat::F32)
    }

    /// Bytes of one interleaved frame (one sample per channel).
    #[inline]
    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * self.sample_format.bytes_per_sample()
    }

    /// Number of whole frames that fit in `bytes`.
    #[inline]
    pub fn frames_in(&self, bytes: usize) -> usize {
        let per_frame = self.bytes_per_frame();
        if per_frame == 0 {
            0
        } else {
            bytes / per_frame
        }
    }

    #[inline]
    pub fn frames_to_bytes(&self, frames: usize) -> usize {
        frames * self.bytes_per_frame()
    }
}

/// Convert raw interleaved samples to f32, appending to `out`.
pub fn decode_to_f32(bytes: &[u8], format: SampleFormat, out: &mut Vec<f32>) {
    match format {
        SampleFormat::U8 => out.extend(bytes.iter().map(|&b| (b as f32 - 128.0) / 128.0)),
        SampleFormat::S16 => out.extend(
            bytes
                .chunks_exact(2)
                .map(|c| i16::from_le_bytes([c[0], c[1]]) as f32 / 32768.0),
        ),
        SampleFormat::S32 => out.extend(
            bytes
                .chunks_exact(4)
                .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f32 / 2_147_483_648.0),
        ),
        SampleFormat::F32 => match bytemuck::try_cast_slice::<u8, f32>(bytes) {
            Ok(samples) => out.extend_from_slice(samples),
            Err(_) => out.extend(
                bytes
                    .chunks_exact(4)
                    .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]])),
            ),
        },
    }
}

/// Write f32 samples into a raw byte buffer in native float layout.
pub fn write_f32(out: &mut [u8], samples: &[f32]) {
    match bytemuck::try_cast_slice_mut::<u8, f32>(out) {
        Ok(dst) => {
            let n = dst.len().min(samples.len());
            dst[..n].copy_from_slice(&samples[..n]);
        }
        Err(_) => {
            for (chunk, s) in out.chunks_exact_mut(4).zip(samples) {
                chunk.copy_from_slice(&s.to_ne_bytes());
            }
        }
    }
}

/// Raw sample storage that may be written up to `capacity` even though only
/// `used` bytes are valid.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    data: Vec<u8>,
    used: usize,
    silence: u8,
}

impl SampleBuffer {
    /// Allocate `payload + overhead` bytes, pre-filled with `silence`.
    ///
    /// Allocation failure is reported instead of aborting.
    pub fn allocate(payload: usize, overhead: usize, silence: u8) -> Result<Self> {
        let capacity = payload.checked_add(overhead).ok_or_else(|| {
            SpliceError::OutOfMemory(format!("{payload} + {overhead} bytes overflows"))
        })?;
        let mut data = Vec::new();
        data.try_reserve_exact(capacity)
            .map_err(|e| SpliceError::OutOfMemory(format!("{capacity} bytes: {e}")))?;
        data.resize(capacity, silence);
        Ok(Self {
            data,
            used: 0,
            silence,
        })
    }

    /// A zero-length buffer.
    pub fn empty(silence: u8) -> Self {
        Self {
            data: Vec::new(),
            used: 0,
            silence,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn used(&self) -> usize {
        self.used
    }

    /// The logically valid bytes.
    #[inline]
    pub fn valid(&self) -> &[u8] {
        &self.data[..self.used]
    }

    /// Everything past the valid region, up to capacity.
    #[inline]
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.used..]
    }

    /// Mark `bytes` more bytes (written through [`spare_mut`](Self::spare_mut)) as valid.
    #[inline]
    pub fn commit(&mut self, bytes: usize) {
        self.used = (self.used + bytes).min(self.data.len());
    }

    /// Shrink the valid region; bytes past it are reset to silence.
    pub fn truncate(&mut self, bytes: usize) {
        if bytes < self.used {
            let silence = self.silence;
            self.data[bytes..self.used].fill(silence);
            self.used = bytes;
        }
    }

    /// Extend the valid region to `bytes` with silence.
    pub fn pad_with_silence(&mut self, bytes: usize) {
        let target = bytes.min(self.data.len());
        if target > self.used {
            let silence = self.silence;
            self.data[self.used..target].fill(silence);
            self.used = target;
        }
    }
}
