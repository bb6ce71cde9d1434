//! Decoded audio buffer cache.
//!
//! Entries hold a contiguous run of raw samples in the source's native
//! format. A miss decodes a window larger than the request (up to
//! `max_audio_window_secs`) so that the following requests of a playback
//! run are served from the same entry. Hits hand out an [`AudioSlice`], a
//! view into the entry that keeps it alive even if the cache evicts it.

use crate::lru::{CacheStats, LruList};
use parking_lot::Mutex;
use splice_core::{
    audio::decode_to_f32, AudioFormat, CacheConfig, Result, SampleBuffer, SourceId, SpliceError,
};
use splice_media::{with_retries, AudioStreamInfo, DecodeGate, MediaHandle, MediaSource, SeekMode};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Scratch used to read and discard samples between a seek and the target.
const DISCARD_CHUNK_FRAMES: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AudioKey {
    source: SourceId,
    start: u64,
    end: u64,
}

impl AudioKey {
    fn covers(&self, source: SourceId, start: u64, end: u64) -> bool {
        self.source == source && self.start <= start && end <= self.end
    }
}

#[derive(Debug)]
struct AudioEntry {
    source: SourceId,
    start: u64,
    format: AudioFormat,
    buffer: SampleBuffer,
}

/// Borrowed view of cached samples, `[start, end)` in source sample frames.
///
/// The view may extend past what was asked for; the caller consumes as much
/// as it needs.
#[derive(Debug, Clone)]
pub struct AudioSlice {
    entry: Arc<AudioEntry>,
    offset_frames: usize,
    frames: usize,
}

impl AudioSlice {
    fn empty(source: SourceId, start: u64, format: AudioFormat) -> Self {
        Self {
            entry: Arc::new(AudioEntry {
                source,
                start,
                format,
                buffer: SampleBuffer::empty(format.sample_format.silence_byte()),
            }),
            offset_frames: 0,
            frames: 0,
        }
    }

    pub fn source(&self) -> SourceId {
        self.entry.source
    }

    pub fn format(&self) -> AudioFormat {
        self.entry.format
    }

    /// First sample frame of the view.
    pub fn start(&self) -> u64 {
        self.entry.start + self.offset_frames as u64
    }

    /// One past the last sample frame of the view.
    pub fn end(&self) -> u64 {
        self.start() + self.frames as u64
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames == 0
    }

    /// Raw interleaved bytes of the view.
    pub fn bytes(&self) -> &[u8] {
        let bpf = self.entry.format.bytes_per_frame();
        let from = self.offset_frames * bpf;
        &self.entry.buffer.valid()[from..from + self.frames * bpf]
    }

    /// The same view limited to its first `frames` sample frames.
    pub fn truncated(&self, frames: usize) -> Self {
        Self {
            entry: Arc::clone(&self.entry),
            offset_frames: self.offset_frames,
            frames: self.frames.min(frames),
        }
    }

    /// Append the view's samples to `out` as interleaved f32.
    pub fn to_f32(&self, out: &mut Vec<f32>) {
        decode_to_f32(self.bytes(), self.entry.format.sample_format, out);
    }

    /// Whether two slices share the same cached buffer.
    pub fn shares_buffer(&self, other: &AudioSlice) -> bool {
        Arc::ptr_eq(&self.entry, &other.entry)
    }
}

pub struct AudioBufferCache {
    entries: Mutex<LruList<AudioKey, Arc<AudioEntry>>>,
    gate: DecodeGate,
    config: CacheConfig,
}

impl AudioBufferCache {
    pub fn new(budget_bytes: usize, gate: DecodeGate, config: CacheConfig) -> Self {
        info!(
            budget_mb = budget_bytes / (1024 * 1024),
            window_secs = config.max_audio_window_secs,
            "Audio buffer cache created"
        );
        Self {
            entries: Mutex::new(LruList::new(budget_bytes, config.promotion_threshold)),
            gate,
            config,
        }
    }

    /// Samples `[start, end)` of `source`, decoding on a miss.
    ///
    /// The range is clamped to the stream. The returned view starts at
    /// `start` and ends at the covering entry's end, which is at least
    /// `end` unless the request is longer than one decode window.
    pub fn get_or_decode_range(&self, source: &MediaSource, start: u64, end: u64) -> Result<AudioSlice> {
        let info = *source
            .audio()
            .ok_or_else(|| SpliceError::NotFound(format!("{} has no audio stream", source.id())))?;
        let start = start.min(info.sample_count);
        let end = end.clamp(start, info.sample_count);
        if start == end {
            return Ok(AudioSlice::empty(source.id(), start, info.format));
        }
        let window = self.window_frames(&info);
        let end = end.min(start.saturating_add(window));

        if let Some(slice) = self.lookup(source.id(), start, end) {
            return Ok(slice);
        }

        let decode_end = start.saturating_add(window).min(info.sample_count);
        let buffer = {
            let guard = self.gate.lock();
            // Only checked if the cache lock is free; the gate never waits on it.
            if let Some(slice) = self
                .entries
                .try_lock()
                .and_then(|mut entries| covering(&mut entries, source.id(), start, end))
            {
                return Ok(slice);
            }
            let mut handle = source.primary(&guard);
            let decoded = decode_window(
                &mut **handle,
                &info,
                start,
                decode_end,
                self.config.decode_attempts,
            );
            match decoded {
                Ok(buffer) => buffer,
                Err(e) => {
                    drop(handle);
                    drop(guard);
                    warn!(source = %source.id(), start, end, error = %e, "Audio unavailable");
                    return Err(e);
                }
            }
        };

        let mut entries = self.entries.lock();
        // A decode of an overlapping window may have been published meanwhile.
        let raced = entries
            .entries()
            .find(|e| e.key.covers(source.id(), start, end))
            .map(|e| slice_from(&e.value, start));
        if let Some(slice) = raced {
            return Ok(slice);
        }
        let entry = Arc::new(AudioEntry {
            source: source.id(),
            start,
            format: info.format,
            buffer,
        });
        let size = entry.buffer.capacity();
        let key = AudioKey {
            source: source.id(),
            start,
            end: decode_end,
        };
        if entries.insert(key, Arc::clone(&entry), size).is_none() {
            debug!(source = %source.id(), size, "Audio window larger than cache budget, not cached");
        }
        drop(entries);
        trace!(source = %source.id(), start, end = decode_end, "audio window decoded");

        Ok(AudioSlice {
            entry,
            offset_frames: 0,
            frames: (decode_end - start) as usize,
        })
    }

    fn window_frames(&self, info: &AudioStreamInfo) -> u64 {
        let frames = self.config.max_audio_window_secs * info.format.sample_rate as f64;
        (frames as u64).max(1)
    }

    fn lookup(&self, source: SourceId, start: u64, end: u64) -> Option<AudioSlice> {
        covering(&mut self.entries.lock(), source, start, end)
    }

    /// Drop every buffer of `source`.
    pub fn remove_source(&self, source: SourceId) -> usize {
        self.entries.lock().retain(|k| k.source != source)
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        self.entries.lock().stats()
    }
}

/// The cached entry covering `[start, end)`, promoted and viewed from `start`.
fn covering(
    entries: &mut LruList<AudioKey, Arc<AudioEntry>>,
    source: SourceId,
    start: u64,
    end: u64,
) -> Option<AudioSlice> {
    let entry = entries.find(|k| k.covers(source, start, end))?;
    Some(slice_from(entry, start))
}

fn slice_from(entry: &Arc<AudioEntry>, start: u64) -> AudioSlice {
    let offset_frames = (start - entry.start) as usize;
    let total = entry.format.frames_in(entry.buffer.used());
    AudioSlice {
        entry: Arc::clone(entry),
        offset_frames,
        frames: total - offset_frames,
    }
}

/// Decode sample frames `[start, end)` into a fresh buffer.
///
/// The buffer carries the stream's read overhead as headroom so a reader
/// that overshoots never writes out of bounds; the overshoot is dropped and
/// any shortfall at end of stream is filled with the format's silence.
fn decode_window(
    handle: &mut dyn MediaHandle,
    info: &AudioStreamInfo,
    start: u64,
    end: u64,
    attempts: u32,
) -> Result<SampleBuffer> {
    let bpf = info.format.bytes_per_frame();
    if bpf == 0 {
        return Err(SpliceError::UnsupportedFormat("audio stream with zero channels".into()));
    }
    let payload = info.format.frames_to_bytes((end - start) as usize);
    let mut buffer = SampleBuffer::allocate(payload, info.read_overhead_bytes, info.silence_byte())?;

    let landed = with_retries(attempts, "audio seek", || {
        handle.seek_audio(start, SeekMode::ClosestBackward)
    })
    .map_err(|_| SpliceError::Seek {
        target: start,
        attempts,
    })?;

    // Read and discard up to `start`, keeping whatever a read returns past it.
    let mut skip = start.saturating_sub(landed) as usize;
    if skip > 0 {
        let mut scratch = vec![0u8; DISCARD_CHUNK_FRAMES * bpf + info.read_overhead_bytes];
        while skip > 0 {
            let wanted = skip.min(DISCARD_CHUNK_FRAMES);
            let read = with_retries(attempts, "audio read", || handle.read_audio(&mut scratch, wanted))
                .map_err(|_| SpliceError::Read {
                    position: handle.audio_position(),
                    attempts,
                })?;
            if read == 0 {
                break;
            }
            if read <= skip {
                skip -= read;
                continue;
            }
            let keep = &scratch[skip * bpf..read * bpf];
            let spare = buffer.spare_mut();
            let n = keep.len().min(spare.len());
            spare[..n].copy_from_slice(&keep[..n]);
            buffer.commit(n);
            skip = 0;
        }
    }

    while buffer.used() < payload {
        let wanted = (payload - buffer.used()) / bpf;
        let read = with_retries(attempts, "audio read", || {
            handle.read_audio(buffer.spare_mut(), wanted)
        })
        .map_err(|_| SpliceError::Read {
            position: handle.audio_position(),
            attempts,
        })?;
        if read == 0 {
            break;
        }
        buffer.commit(read * bpf);
    }

    buffer.truncate(payload);
    buffer.pad_with_silence(payload);
    Ok(buffer)
}
