//! Decoded video frame cache.
//!
//! Maps (source, frame index) to a shared RGBA frame. A miss decodes on the
//! source's primary handle under the decode gate: seek to the closest
//! preceding keyframe, then read forward to the target, caching every frame
//! read on the way since each one cost a full decode.

use crate::lru::{CacheStats, LruList};
use parking_lot::Mutex;
use splice_core::{CacheConfig, FrameBuffer, Result, SharedFrame, SourceId, SpliceError};
use splice_media::{with_retries, DecodeGate, MediaHandle, MediaSource, SeekMode};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Cache key for one decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameKey {
    pub source: SourceId,
    pub index: u64,
}

impl FrameKey {
    pub fn new(source: SourceId, index: u64) -> Self {
        Self { source, index }
    }
}

pub struct VideoFrameCache {
    frames: Mutex<LruList<FrameKey, SharedFrame>>,
    gate: DecodeGate,
    config: CacheConfig,
}

impl VideoFrameCache {
    pub fn new(budget_bytes: usize, gate: DecodeGate, config: CacheConfig) -> Self {
        info!(
            budget_mb = budget_bytes / (1024 * 1024),
            frames = budget_bytes / config.typical_frame_bytes.max(1),
            "Video frame cache created"
        );
        Self {
            frames: Mutex::new(LruList::new(budget_bytes, config.promotion_threshold)),
            gate,
            config,
        }
    }

    pub fn gate(&self) -> &DecodeGate {
        &self.gate
    }

    /// The frame at `requested`, clamped to the source's frame range.
    ///
    /// Repeated requests for the same frame return the same `Arc` until the
    /// entry is evicted. An error means the frame is unavailable; callers
    /// skip it rather than abort.
    pub fn get_or_decode_frame(&self, source: &MediaSource, requested: i64) -> Result<SharedFrame> {
        let video = source
            .video()
            .ok_or_else(|| SpliceError::NotFound(format!("{} has no video stream", source.id())))?;
        if video.frame_count == 0 {
            return Err(SpliceError::NotFound(format!("{} has no frames", source.id())));
        }
        let index = requested.clamp(0, video.frame_count as i64 - 1) as u64;
        let key = FrameKey::new(source.id(), index);

        if let Some(frame) = self.frames.lock().get(&key) {
            return Ok(Arc::clone(frame));
        }

        // Decode into local buffers; cached results are published only after
        // the gate is released.
        let mut skipped = Vec::new();
        let result = {
            let guard = self.gate.lock();
            // Another thread may have decoded it while we waited for the gate.
            // Only checked if the cache lock is free; the gate never waits on it.
            if let Some(frame) = self.frames.try_lock().and_then(|f| f.peek(&key).cloned()) {
                return Ok(frame);
            }
            let mut handle = source.primary(&guard);
            read_forward_to(
                &mut **handle,
                index,
                self.config.sequential_read_window,
                self.config.decode_attempts,
                |at, frame| skipped.push((at, frame)),
            )
        };

        let mut frames = self.frames.lock();
        for (at, frame) in skipped {
            let size = frame.byte_size();
            frames.insert_if_absent(FrameKey::new(source.id(), at), Arc::new(frame), size);
        }
        match result {
            Ok(frame) => {
                if let Some(existing) = frames.peek(&key) {
                    return Ok(Arc::clone(existing));
                }
                let frame: SharedFrame = Arc::new(frame);
                let size = frame.byte_size();
                frames.insert(key, Arc::clone(&frame), size);
                Ok(frame)
            }
            Err(e) => {
                if let SpliceError::Read { position, .. } = &e {
                    frames.remove(&FrameKey::new(source.id(), *position));
                }
                drop(frames);
                warn!(source = %source.id(), frame = index, error = %e, "Frame unavailable");
                Err(e)
            }
        }
    }

    /// Drop one entry, e.g. after a read failed part way through a sequence.
    pub fn invalidate_entry(&self, source: SourceId, index: u64) -> bool {
        self.frames.lock().remove(&FrameKey::new(source, index)).is_some()
    }

    /// Cached frame without decoding or promoting.
    pub fn cached(&self, source: SourceId, index: u64) -> Option<SharedFrame> {
        self.frames.lock().peek(&FrameKey::new(source, index)).cloned()
    }

    /// Current recency position of a frame, 0 being most recent.
    pub fn position(&self, source: SourceId, index: u64) -> Option<usize> {
        self.frames.lock().position(&FrameKey::new(source, index))
    }

    /// Drop every frame of `source`.
    pub fn remove_source(&self, source: SourceId) -> usize {
        let removed = self.frames.lock().retain(|k| k.source != source);
        debug!(source = %source, removed, "Removed source from frame cache");
        removed
    }

    pub fn clear(&self) {
        self.frames.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        self.frames.lock().stats()
    }
}

/// Position `handle` and read forward until frame `target` is decoded.
///
/// When the cursor already sits at most `window` frames before the target
/// it is read forward without a seek. Every frame read before the target is
/// handed to `on_skipped`. Must be called with the decode gate held.
pub(crate) fn read_forward_to(
    handle: &mut dyn MediaHandle,
    target: u64,
    window: u64,
    attempts: u32,
    mut on_skipped: impl FnMut(u64, FrameBuffer),
) -> Result<FrameBuffer> {
    let position = handle.video_position();
    let sequential = position <= target && target - position <= window;
    if !sequential {
        with_retries(attempts, "video seek", || {
            handle.seek_video(target, SeekMode::ClosestBackward)
        })
        .map_err(|e| {
            debug!(target_frame = target, error = %e, "seek gave up");
            SpliceError::Seek { target, attempts }
        })?;
    }

    let start = handle.video_position();
    if start > target {
        return Err(SpliceError::Seek { target, attempts });
    }
    for _ in start..=target {
        let at = handle.video_position();
        let mut frame = FrameBuffer::new(0, 0);
        with_retries(attempts, "video read", || handle.read_video(&mut frame)).map_err(|e| {
            debug!(frame = at, error = %e, "read gave up");
            SpliceError::Read {
                position: at,
                attempts,
            }
        })?;
        if at == target {
            return Ok(frame);
        }
        on_skipped(at, frame);
    }
    Err(SpliceError::Internal(format!(
        "decoder never reached frame {target}"
    )))
}
