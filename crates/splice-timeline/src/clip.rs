//! Clip types for the timeline.

use serde::{Deserialize, Serialize};
use splice_core::{RationalTime, SourceId, TimeRange};
use uuid::Uuid;

/// A span of a media source placed on a track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaClip {
    /// Unique clip ID
    pub id: Uuid,
    /// Clip name (displayed in UI)
    pub name: String,
    /// Source in the project source registry
    pub source: SourceId,
    /// Portion of the source used, in source time
    pub source_range: TimeRange,
    /// Where the clip starts on the timeline
    pub timeline_start: RationalTime,
    pub video_enabled: bool,
    pub audio_enabled: bool,
    /// Free-text tag
    pub tag: Option<String>,
}

impl MediaClip {
    /// Create a clip playing `source_range` of `source` from `timeline_start`.
    pub fn new(
        name: impl Into<String>,
        source: SourceId,
        source_range: TimeRange,
        timeline_start: RationalTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            source,
            source_range,
            timeline_start,
            video_enabled: true,
            audio_enabled: true,
            tag: None,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_video(mut self, enabled: bool) -> Self {
        self.video_enabled = enabled;
        self
    }

    pub fn with_audio(mut self, enabled: bool) -> Self {
        self.audio_enabled = enabled;
        self
    }

    #[inline]
    pub fn duration(&self) -> RationalTime {
        self.source_range.duration
    }

    /// Timeline end (exclusive).
    #[inline]
    pub fn timeline_end(&self) -> RationalTime {
        self.timeline_start + self.duration()
    }

    #[inline]
    pub fn timeline_range(&self) -> TimeRange {
        TimeRange::new(self.timeline_start, self.duration())
    }

    #[inline]
    pub fn contains(&self, instant: RationalTime) -> bool {
        self.timeline_range().contains(instant)
    }

    /// Source time shown at timeline `instant`.
    #[inline]
    pub fn source_time_at(&self, instant: RationalTime) -> RationalTime {
        self.source_range.start + (instant - self.timeline_start)
    }

    /// Trim the clip's in point, keeping its timeline end fixed.
    pub fn trim_in(&mut self, delta: RationalTime) {
        self.source_range.start = self.source_range.start + delta;
        self.source_range.duration = self.source_range.duration - delta;
        self.timeline_start = self.timeline_start + delta;
    }

    /// Trim the clip's out point.
    pub fn trim_out(&mut self, delta: RationalTime) {
        self.source_range.duration = self.source_range.duration + delta;
    }
}
