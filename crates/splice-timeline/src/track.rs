//! Track types for the timeline.
//!
//! Clips on a track are kept sorted by timeline start and never overlap;
//! the per-instant lookups below rely on that and stop at the first clip
//! that starts at or before the instant.

use serde::{Deserialize, Serialize};
use splice_core::{RationalTime, TimeRange};
use uuid::Uuid;

use crate::clip::MediaClip;
use crate::effect::MediaEffect;
use crate::error::TimelineError;

/// Per-track stereo level scalars applied when mixing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioLevels {
    pub left: f32,
    pub right: f32,
}

impl AudioLevels {
    pub const UNITY: Self = Self {
        left: 1.0,
        right: 1.0,
    };

    pub const fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    /// Levels from volume and pan (-1 left .. 1 right), constant-power.
    pub fn from_pan(volume: f32, pan: f32) -> Self {
        let angle = (pan.clamp(-1.0, 1.0) + 1.0) * 0.25 * std::f32::consts::PI;
        Self {
            left: volume * angle.cos(),
            right: volume * angle.sin(),
        }
    }

    pub fn is_silent(&self) -> bool {
        self.left == 0.0 && self.right == 0.0
    }
}

impl Default for AudioLevels {
    fn default() -> Self {
        Self::UNITY
    }
}

/// A track holding clips and the effects layered over them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    /// Unique track ID
    pub id: Uuid,
    /// Track name
    pub name: String,
    /// Clips sorted by timeline start
    pub clips: Vec<MediaClip>,
    pub effects: Vec<MediaEffect>,
    pub levels: AudioLevels,
    pub muted: bool,
    pub solo: bool,
}

impl Track {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            clips: Vec::new(),
            effects: Vec::new(),
            levels: AudioLevels::UNITY,
            muted: false,
            solo: false,
        }
    }

    pub fn with_levels(mut self, levels: AudioLevels) -> Self {
        self.levels = levels;
        self
    }

    /// Insert a clip at its sorted position. Returns its index.
    pub fn insert_clip(&mut self, clip: MediaClip) -> Result<usize, TimelineError> {
        if clip.duration() <= RationalTime::ZERO {
            return Err(TimelineError::InvalidRange(format!(
                "clip {} has non-positive duration",
                clip.id
            )));
        }
        let index = self
            .clips
            .partition_point(|c| c.timeline_start <= clip.timeline_start);
        let neighbours = index
            .checked_sub(1)
            .and_then(|i| self.clips.get(i))
            .into_iter()
            .chain(self.clips.get(index));
        for other in neighbours {
            if other.timeline_range().overlaps(clip.timeline_range()) {
                return Err(TimelineError::OverlappingClips {
                    track: self.name.clone(),
                    existing: other.id,
                    inserted: clip.id,
                });
            }
        }
        self.clips.insert(index, clip);
        Ok(index)
    }

    pub fn remove_clip(&mut self, id: Uuid) -> Option<MediaClip> {
        let index = self.clips.iter().position(|c| c.id == id)?;
        Some(self.clips.remove(index))
    }

    pub fn find_clip(&self, id: Uuid) -> Option<&MediaClip> {
        self.clips.iter().find(|c| c.id == id)
    }

    pub fn add_effect(&mut self, effect: MediaEffect) {
        self.effects.push(effect);
    }

    pub fn remove_effect(&mut self, id: Uuid) -> Option<MediaEffect> {
        let index = self.effects.iter().position(|e| e.id == id)?;
        Some(self.effects.remove(index))
    }

    /// Index of the clip visible at `instant`, if any.
    pub fn active_clip_index(&self, instant: RationalTime) -> Option<usize> {
        for (i, clip) in self.clips.iter().enumerate().rev() {
            if clip.timeline_start <= instant {
                if instant < clip.timeline_end() {
                    return Some(i);
                }
                break;
            }
        }
        None
    }

    pub fn active_clip(&self, instant: RationalTime) -> Option<&MediaClip> {
        self.active_clip_index(instant).map(|i| &self.clips[i])
    }

    /// Indices of the clips overlapping `range`, in timeline order.
    pub fn clips_in_range(&self, range: TimeRange) -> impl Iterator<Item = usize> + '_ {
        let first = self
            .clips
            .partition_point(|c| c.timeline_end() <= range.start);
        self.clips[first..]
            .iter()
            .take_while(move |c| c.timeline_start < range.end())
            .enumerate()
            .map(move |(i, _)| first + i)
    }

    /// Indices of enabled image effects covering `instant`.
    pub fn image_effects_at(&self, instant: RationalTime) -> impl Iterator<Item = usize> + '_ {
        self.effects
            .iter()
            .enumerate()
            .filter(move |(_, e)| e.is_image() && e.is_active_at(instant))
            .map(|(i, _)| i)
    }

    /// Enabled audio effects overlapping `range`, in ascending priority.
    pub fn audio_effects_in(&self, range: TimeRange) -> Vec<&MediaEffect> {
        let mut effects: Vec<&MediaEffect> = self
            .effects
            .iter()
            .filter(|e| e.is_audio() && e.is_active_in(range))
            .collect();
        effects.sort_by_key(|e| e.priority);
        effects
    }

    /// End of the last clip.
    pub fn duration(&self) -> RationalTime {
        self.clips
            .iter()
            .map(|c| c.timeline_end())
            .max()
            .unwrap_or(RationalTime::ZERO)
    }

    /// Check that clips are sorted and disjoint.
    pub fn validate(&self) -> Result<(), TimelineError> {
        for (i, pair) in self.clips.windows(2).enumerate() {
            let (a, b) = (&pair[0], &pair[1]);
            if b.timeline_start < a.timeline_start {
                return Err(TimelineError::UnsortedClips {
                    track: self.name.clone(),
                    index: i + 1,
                });
            }
            if a.timeline_end() > b.timeline_start {
                return Err(TimelineError::OverlappingClips {
                    track: self.name.clone(),
                    existing: a.id,
                    inserted: b.id,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use splice_core::SourceId;

    fn secs(s: i64) -> RationalTime {
        RationalTime::new(s, 1)
    }

    fn clip(start: i64, len: i64) -> MediaClip {
        MediaClip::new(
            format!("c{start}"),
            SourceId(0),
            TimeRange::new(RationalTime::ZERO, secs(len)),
            secs(start),
        )
    }

    #[test]
    fn test_insert_keeps_order() {
        let mut track = Track::new("V1");
        track.insert_clip(clip(10, 2)).unwrap();
        track.insert_clip(clip(0, 5)).unwrap();
        track.insert_clip(clip(5, 5)).unwrap();
        let starts: Vec<_> = track.clips.iter().map(|c| c.timeline_start).collect();
        assert_eq!(starts, vec![secs(0), secs(5), secs(10)]);
        assert!(track.validate().is_ok());
    }

    #[test]
    fn test_insert_rejects_overlap() {
        let mut track = Track::new("V1");
        track.insert_clip(clip(0, 5)).unwrap();
        let err = track.insert_clip(clip(4, 2));
        assert!(matches!(err, Err(TimelineError::OverlappingClips { .. })));
        assert_eq!(track.clips.len(), 1);
    }

    #[test]
    fn test_active_clip_lookup() {
        let mut track = Track::new("V1");
        track.insert_clip(clip(0, 2)).unwrap();
        track.insert_clip(clip(4, 2)).unwrap();
        assert_eq!(track.active_clip(secs(1)).map(|c| c.timeline_start), Some(secs(0)));
        assert!(track.active_clip(secs(3)).is_none());
        assert_eq!(track.active_clip(secs(4)).map(|c| c.timeline_start), Some(secs(4)));
        assert!(track.active_clip(secs(6)).is_none());
    }

    #[test]
    fn test_validate_detects_unsorted_clips() {
        let mut track = Track::new("V1");
        track.clips = vec![clip(4, 2), clip(0, 2)];
        assert!(matches!(
            track.validate(),
            Err(TimelineError::UnsortedClips { index: 1, .. })
        ));
        // The early exit in the lookup then misses the clip at 4.
        assert!(track.active_clip(secs(5)).is_none());
    }

    #[test]
    fn test_clips_in_range() {
        let mut track = Track::new("A1");
        for start in [0, 3, 6, 9] {
            track.insert_clip(clip(start, 2)).unwrap();
        }
        let hits: Vec<_> = track
            .clips_in_range(TimeRange::from_start_end(secs(4), secs(7)))
            .collect();
        assert_eq!(hits, vec![1, 2]);
    }

    #[test]
    fn test_audio_effects_sorted_by_priority() {
        let mut track = Track::new("A1");
        let range = TimeRange::new(RationalTime::ZERO, secs(5));
        track.add_effect(MediaEffect::audio("gain", range, 3));
        track.add_effect(MediaEffect::audio("gain", range, 1));
        track.add_effect(MediaEffect::image("tint", range, 0));
        let priorities: Vec<_> = track.audio_effects_in(range).iter().map(|e| e.priority).collect();
        assert_eq!(priorities, vec![1, 3]);
    }

    #[test]
    fn test_pan_is_constant_power() {
        let centre = AudioLevels::from_pan(1.0, 0.0);
        assert!((centre.left - centre.right).abs() < 1e-6);
        assert!((centre.left * centre.left + centre.right * centre.right - 1.0).abs() < 1e-5);
        let hard_left = AudioLevels::from_pan(1.0, -1.0);
        assert!(hard_left.right.abs() < 1e-6);
    }
}
