//! Shared setup for the integration tests.

use splice_cache::CacheSet;
use splice_core::{CacheConfig, MemoryBudget, RationalTime, SourceId, TimeRange};
use splice_timeline::{MediaClip, Timeline, Track};

pub fn secs(s: i64) -> RationalTime {
    RationalTime::new(s, 1)
}

pub fn span(start: i64, end: i64) -> TimeRange {
    TimeRange::from_start_end(secs(start), secs(end))
}

pub fn caches() -> CacheSet {
    caches_with(CacheConfig::default())
}

pub fn caches_with(config: CacheConfig) -> CacheSet {
    CacheSet::new(&config, MemoryBudget::fixed(256 << 20, 4 << 20, 64 << 20)).unwrap()
}

/// Append a track holding one clip of `source` covering `[0, seconds)`.
pub fn push_full_track(timeline: &mut Timeline, name: &str, source: SourceId, seconds: i64) -> usize {
    let mut track = Track::new(name);
    track
        .insert_clip(MediaClip::new(name, source, span(0, seconds), RationalTime::ZERO))
        .unwrap();
    timeline.push_track(track)
}
