//! Splice Cache - bounded in-memory caches for decoded media
//!
//! Architecture:
//! - `LruList`: byte-budgeted, most-recently-used-first list with anti-thrash promotion
//! - `VideoFrameCache`: (source, frame) -> decoded RGBA frame, decoding on miss
//! - `ThumbnailCache`: small frames generated off the caller's thread by worker actors
//! - `AudioBufferCache`: (source, sample range) -> raw samples, decoding ahead on miss
//! - `CacheSet`: the three caches sharing one decode gate

pub mod audio;
pub mod lru;
pub mod thumbnail;
pub mod video;

#[cfg(test)]
mod testing;

pub use audio::{AudioBufferCache, AudioSlice};
pub use lru::{CacheStats, LruList};
pub use thumbnail::{ThumbnailCache, ThumbnailReady};
pub use video::{FrameKey, VideoFrameCache};

use splice_core::{CacheConfig, MemoryBudget, Result, SourceId};
use splice_media::DecodeGate;
use std::sync::Arc;

/// The caches of one process, sharing a single decode gate.
pub struct CacheSet {
    pub gate: DecodeGate,
    pub video: Arc<VideoFrameCache>,
    pub thumbnails: Arc<ThumbnailCache>,
    pub audio: Arc<AudioBufferCache>,
}

impl CacheSet {
    /// Build the caches and start the thumbnail workers.
    pub fn new(config: &CacheConfig, budget: MemoryBudget) -> Result<Self> {
        let gate = DecodeGate::new();
        Ok(Self {
            video: Arc::new(VideoFrameCache::new(
                budget.video_bytes,
                gate.clone(),
                config.clone(),
            )),
            thumbnails: Arc::new(ThumbnailCache::new(
                budget.thumbnail_bytes,
                gate.clone(),
                config.clone(),
            )?),
            audio: Arc::new(AudioBufferCache::new(
                budget.audio_bytes,
                gate.clone(),
                config.clone(),
            )),
            gate,
        })
    }

    /// Budgets derived from the memory free right now.
    pub fn from_system(config: &CacheConfig) -> Result<Self> {
        Self::new(config, MemoryBudget::from_system(config))
    }

    /// Drop everything cached or queued for one source.
    pub fn remove_source(&self, source: SourceId) {
        self.video.remove_source(source);
        self.thumbnails.remove_source(source);
        self.audio.remove_source(source);
    }
}
