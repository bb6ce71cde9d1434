//! Waveform computation and rendering for audio visualization.
//!
//! Generates min/max pairs for waveform display at various zoom levels and
//! rasterizes them into small RGBA images. Rendered images are cached per
//! (source, range, size); while an exact size is regenerated the closest
//! cached size can stand in.

use crate::mixer::fetch_samples;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use splice_cache::{AudioBufferCache, CacheStats, LruList};
use splice_core::{FrameBuffer, Result, SharedFrame, SourceId, SpliceError};
use splice_media::MediaSource;
use std::sync::Arc;
use tracing::{debug, trace};

/// A min/max pair representing the amplitude range at a pixel position.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct WaveformSample {
    pub min: f32,
    pub max: f32,
}

/// Pre-computed waveform data for a single audio channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Waveform {
    /// Samples per waveform pixel (the reduction ratio).
    pub samples_per_pixel: usize,
    /// Min/max pairs for display.
    pub data: Vec<WaveformSample>,
    /// Source sample rate.
    pub sample_rate: u32,
}

impl Waveform {
    /// Compute a waveform from mono samples.
    pub fn compute(samples: &[f32], samples_per_pixel: usize, sample_rate: u32) -> Self {
        if samples_per_pixel == 0 || samples.is_empty() {
            return Self {
                samples_per_pixel: samples_per_pixel.max(1),
                data: Vec::new(),
                sample_rate,
            };
        }

        let data = samples
            .chunks(samples_per_pixel)
            .map(|chunk| {
                chunk.iter().fold(
                    WaveformSample {
                        min: f32::MAX,
                        max: f32::MIN,
                    },
                    |acc, &s| WaveformSample {
                        min: acc.min.min(s),
                        max: acc.max.max(s),
                    },
                )
            })
            .collect();

        Self {
            samples_per_pixel,
            data,
            sample_rate,
        }
    }

    /// Compute from interleaved samples, averaging the channels to mono first.
    pub fn from_interleaved(
        samples: &[f32],
        channels: u16,
        samples_per_pixel: usize,
        sample_rate: u32,
    ) -> Self {
        assert!(channels > 0, "waveform with zero channels");
        if channels == 1 {
            return Self::compute(samples, samples_per_pixel, sample_rate);
        }
        let ch = channels as usize;
        let mono: Vec<f32> = samples
            .chunks_exact(ch)
            .map(|frame| frame.iter().sum::<f32>() / ch as f32)
            .collect();
        Self::compute(&mono, samples_per_pixel, sample_rate)
    }

    /// Get the RMS energy for a range of pixels.
    pub fn rms_range(&self, start_pixel: usize, end_pixel: usize) -> f32 {
        let start = start_pixel.min(self.data.len());
        let end = end_pixel.min(self.data.len());
        if start >= end {
            return 0.0;
        }

        let sum: f64 = self.data[start..end]
            .iter()
            .map(|s| {
                let peak = s.max.abs().max(s.min.abs()) as f64;
                peak * peak
            })
            .sum();
        (sum / (end - start) as f64).sqrt() as f32
    }

    /// Duration in seconds.
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        (self.data.len() * self.samples_per_pixel) as f64 / self.sample_rate as f64
    }

    /// Rasterize into a `width` x `height` image: one vertical bar per column
    /// spanning min..max, with +1 at the top row and -1 at the bottom.
    pub fn render(&self, width: u32, height: u32, foreground: [u8; 4], background: [u8; 4]) -> FrameBuffer {
        let mut image = FrameBuffer::filled(width, height, background);
        if self.data.is_empty() || width == 0 || height == 0 {
            return image;
        }
        let rows = (height - 1) as f32;
        let to_row = |v: f32| (((1.0 - v.clamp(-1.0, 1.0)) * 0.5) * rows).round() as u32;
        for x in 0..width {
            let index = (x as usize * self.data.len()) / width as usize;
            let sample = self.data[index];
            let (top, bottom) = (to_row(sample.max), to_row(sample.min));
            for y in top..=bottom {
                image.set_pixel(x, y, foreground);
            }
        }
        image
    }
}

/// Cache key of one rendered waveform image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaveformKey {
    pub source: SourceId,
    /// Sample frames `[start, end)` of the source.
    pub start: u64,
    pub end: u64,
    pub width: u32,
    pub height: u32,
}

impl WaveformKey {
    fn same_range(&self, other: &WaveformKey) -> bool {
        self.source == other.source && self.start == other.start && self.end == other.end
    }

    fn size_distance(&self, other: &WaveformKey) -> f64 {
        let dw = self.width as f64 - other.width as f64;
        let dh = self.height as f64 - other.height as f64;
        (dw * dw + dh * dh).sqrt()
    }
}

pub struct WaveformCache {
    images: Mutex<LruList<WaveformKey, SharedFrame>>,
    foreground: [u8; 4],
    background: [u8; 4],
}

impl WaveformCache {
    pub fn new(budget_bytes: usize, promotion_threshold: usize) -> Self {
        debug!(budget_kb = budget_bytes / 1024, "Waveform cache created");
        Self {
            images: Mutex::new(LruList::new(budget_bytes, promotion_threshold)),
            foreground: [120, 200, 255, 255],
            background: [0, 0, 0, 0],
        }
    }

    pub fn with_colors(mut self, foreground: [u8; 4], background: [u8; 4]) -> Self {
        self.foreground = foreground;
        self.background = background;
        self
    }

    pub fn get(&self, key: &WaveformKey) -> Option<SharedFrame> {
        self.images.lock().get(key).cloned()
    }

    pub fn insert(&self, key: WaveformKey, image: SharedFrame) {
        let size = image.byte_size();
        self.images.lock().insert(key, image, size);
    }

    /// Cached image of the same source and range whose size is closest to
    /// `key`'s. Exact matches win.
    pub fn find_similar(&self, key: &WaveformKey) -> Option<SharedFrame> {
        let images = self.images.lock();
        images
            .entries()
            .filter(|e| e.key.same_range(key))
            .min_by(|a, b| {
                a.key
                    .size_distance(key)
                    .total_cmp(&b.key.size_distance(key))
            })
            .map(|e| Arc::clone(&e.value))
    }

    /// The waveform image for `key`, rendering it from the audio cache on a miss.
    pub fn get_or_render(
        &self,
        audio: &AudioBufferCache,
        source: &MediaSource,
        key: WaveformKey,
    ) -> Result<SharedFrame> {
        if let Some(image) = self.get(&key) {
            return Ok(image);
        }
        let info = source
            .audio()
            .ok_or_else(|| SpliceError::NotFound(format!("{} has no audio stream", source.id())))?;
        let frames = key.end.saturating_sub(key.start) as usize;
        let mut samples = Vec::with_capacity(frames * info.format.channels as usize);
        fetch_samples(audio, source, key.start, frames, &mut samples)?;

        let per_pixel = frames.div_ceil(key.width.max(1) as usize).max(1);
        let waveform = Waveform::from_interleaved(
            &samples,
            info.format.channels,
            per_pixel,
            info.format.sample_rate,
        );
        let image: SharedFrame = Arc::new(waveform.render(
            key.width,
            key.height,
            self.foreground,
            self.background,
        ));
        self.insert(key, Arc::clone(&image));
        trace!(source = %key.source, width = key.width, height = key.height, "waveform rendered");
        Ok(image)
    }

    /// Drop every image of `source`.
    pub fn remove_source(&self, source: SourceId) -> usize {
        self.images.lock().retain(|k| k.source != source)
    }

    pub fn stats(&self) -> CacheStats {
        self.images.lock().stats()
    }
}
