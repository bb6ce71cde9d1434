//! Cache configuration and memory budgets.
//!
//! Budgets are derived once at startup from the memory that is free at that
//! moment; they are never re-evaluated while the caches are alive.

use crate::{Result, SpliceError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use sysinfo::System;
use tracing::info;

/// Recognized cache options. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Share of free memory given to decoded video frames (percent).
    pub video_cache_percent: f64,
    /// Share of free memory given to thumbnails (percent).
    pub thumbnail_cache_percent: f64,
    /// Share of free memory given to decoded audio buffers (percent).
    pub audio_cache_percent: f64,
    /// Footprint of a typical frame, used to report the video budget in frames.
    pub typical_frame_bytes: usize,
    /// Longest audio range decoded in one go, in seconds.
    pub max_audio_window_secs: f64,
    /// Attempts per seek/read before a decode gives up.
    pub decode_attempts: u32,
    /// Entries within this many positions of the front are not relocated on a hit.
    pub promotion_threshold: usize,
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,
    pub thumbnail_workers: usize,
    /// Queued thumbnail requests beyond this are refused.
    pub max_pending_thumbnails: usize,
    /// A primary handle sitting at most this many frames before the target is
    /// read forward instead of seeking.
    pub sequential_read_window: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            video_cache_percent: 20.0,
            thumbnail_cache_percent: 2.0,
            audio_cache_percent: 10.0,
            typical_frame_bytes: 1920 * 1080 * 4,
            max_audio_window_secs: 60.0,
            decode_attempts: 5,
            promotion_threshold: 8,
            thumbnail_width: 160,
            thumbnail_height: 90,
            thumbnail_workers: 1,
            max_pending_thumbnails: 256,
            sequential_read_window: 48,
        }
    }
}

impl CacheConfig {
    /// Parse a JSON document; missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, pct) in [
            ("video_cache_percent", self.video_cache_percent),
            ("thumbnail_cache_percent", self.thumbnail_cache_percent),
            ("audio_cache_percent", self.audio_cache_percent),
        ] {
            if !(0.0..=100.0).contains(&pct) {
                return Err(SpliceError::Config(format!(
                    "{name} must be within 0..=100, got {pct}"
                )));
            }
        }
        if self.decode_attempts == 0 {
            return Err(SpliceError::Config("decode_attempts must be at least 1".into()));
        }
        if self.max_audio_window_secs <= 0.0 {
            return Err(SpliceError::Config(
                "max_audio_window_secs must be positive".into(),
            ));
        }
        if self.thumbnail_width == 0 || self.thumbnail_height == 0 {
            return Err(SpliceError::Config("thumbnail size must be non-zero".into()));
        }
        Ok(())
    }
}

/// Byte budgets for each cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryBudget {
    pub video_bytes: usize,
    pub thumbnail_bytes: usize,
    pub audio_bytes: usize,
}

impl MemoryBudget {
    /// Explicit budgets, mostly for tests.
    pub const fn fixed(video_bytes: usize, thumbnail_bytes: usize, audio_bytes: usize) -> Self {
        Self {
            video_bytes,
            thumbnail_bytes,
            audio_bytes,
        }
    }

    /// Budgets as percentages of `free_bytes`.
    pub fn from_free_memory(config: &CacheConfig, free_bytes: u64) -> Self {
        let share = |pct: f64| (free_bytes as f64 * pct / 100.0) as usize;
        Self {
            video_bytes: share(config.video_cache_percent),
            thumbnail_bytes: share(config.thumbnail_cache_percent),
            audio_bytes: share(config.audio_cache_percent),
        }
    }

    /// Query the system once for free memory and derive the budgets.
    pub fn from_system(config: &CacheConfig) -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        let free = sys.available_memory();
        let budget = Self::from_free_memory(config, free);
        info!(
            free_mb = free / (1024 * 1024),
            video_mb = budget.video_bytes / (1024 * 1024),
            video_frames = budget.video_bytes / config.typical_frame_bytes.max(1),
            thumbnail_mb = budget.thumbnail_bytes / (1024 * 1024),
            audio_mb = budget.audio_bytes / (1024 * 1024),
            "Cache budgets derived from free memory"
        );
        budget
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = CacheConfig::from_json_str(r#"{ "decode_attempts": 3 }"#).unwrap();
        assert_eq!(config.decode_attempts, 3);
        assert_eq!(config.promotion_threshold, CacheConfig::default().promotion_threshold);
    }

    #[test]
    fn test_rejects_out_of_range_percent() {
        let err = CacheConfig::from_json_str(r#"{ "audio_cache_percent": 150.0 }"#);
        assert!(matches!(err, Err(SpliceError::Config(_))));
    }

    #[test]
    fn test_rejects_zero_attempts() {
        assert!(CacheConfig::from_json_str(r#"{ "decode_attempts": 0 }"#).is_err());
    }

    #[test]
    fn test_budget_from_free_memory() {
        let config = CacheConfig::default();
        let budget = MemoryBudget::from_free_memory(&config, 1_000_000);
        assert_eq!(budget.video_bytes, 200_000);
        assert_eq!(budget.thumbnail_bytes, 20_000);
        assert_eq!(budget.audio_bytes, 100_000);
    }
}
