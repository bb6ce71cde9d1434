//! The timeline: output format plus an ordered stack of tracks.

use splice_core::{FrameRate, RationalTime, TimeRange};
use uuid::Uuid;

use crate::error::TimelineError;
use crate::sources::SourceRegistry;
use crate::track::Track;

/// Tracks are ordered front to back: `tracks[0]` is drawn on top of
/// everything else.
#[derive(Debug)]
pub struct Timeline {
    pub id: Uuid,
    pub name: String,
    /// Output resolution
    pub width: u32,
    pub height: u32,
    pub frame_rate: FrameRate,
    pub tracks: Vec<Track>,
    pub sources: SourceRegistry,
}

impl Timeline {
    pub fn new(name: impl Into<String>, width: u32, height: u32, frame_rate: FrameRate) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            width,
            height,
            frame_rate,
            tracks: Vec::new(),
            sources: SourceRegistry::new(),
        }
    }

    /// Add a track behind the existing ones. Returns its index.
    pub fn push_track(&mut self, track: Track) -> usize {
        self.tracks.push(track);
        self.tracks.len() - 1
    }

    /// Add a track in front of the existing ones.
    pub fn push_front_track(&mut self, track: Track) {
        self.tracks.insert(0, track);
    }

    pub fn track(&self, index: usize) -> Result<&Track, TimelineError> {
        self.tracks.get(index).ok_or(TimelineError::TrackNotFound(index))
    }

    pub fn track_mut(&mut self, index: usize) -> Result<&mut Track, TimelineError> {
        self.tracks
            .get_mut(index)
            .ok_or(TimelineError::TrackNotFound(index))
    }

    /// Whether any track is soloed.
    pub fn any_solo(&self) -> bool {
        self.tracks.iter().any(|t| t.solo)
    }

    /// Whether `track` contributes audio given mute and solo state.
    pub fn is_audible(&self, track: &Track) -> bool {
        !track.muted && (track.solo || !self.any_solo())
    }

    #[inline]
    pub fn frame_duration(&self) -> RationalTime {
        self.frame_rate.frame_duration()
    }

    pub fn duration(&self) -> RationalTime {
        self.tracks
            .iter()
            .map(|t| t.duration())
            .max()
            .unwrap_or(RationalTime::ZERO)
    }

    pub fn time_range(&self) -> TimeRange {
        TimeRange::new(RationalTime::ZERO, self.duration())
    }

    /// Check every track's clip order and that every clip's source exists.
    pub fn validate(&self) -> Result<(), TimelineError> {
        for track in &self.tracks {
            track.validate()?;
            if let Some(clip) = track.clips.iter().find(|c| !self.sources.contains(c.source)) {
                return Err(TimelineError::UnknownSource(clip.source));
            }
        }
        Ok(())
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new("Timeline 1", 1920, 1080, FrameRate::FPS_24)
    }
}
