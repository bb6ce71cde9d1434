//! Work list of one composited frame.
//!
//! Tracks are walked back to front. Each contributes at most one clip (the
//! one under the instant) followed by its active image effects in ascending
//! priority, so later items draw over earlier ones.

use smallvec::SmallVec;
use splice_core::RationalTime;
use splice_timeline::Timeline;
use tracing::trace;

/// One render step. Indices point into `timeline.tracks[track]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameWorkItem {
    Clip {
        track: usize,
        clip: usize,
    },
    Effect {
        track: usize,
        effect: usize,
        /// Render into the secondary target instead of onto the running composite.
        use_secondary: bool,
    },
}

impl FrameWorkItem {
    pub fn track(&self) -> usize {
        match *self {
            Self::Clip { track, .. } | Self::Effect { track, .. } => track,
        }
    }

    pub fn is_clip(&self) -> bool {
        matches!(self, Self::Clip { .. })
    }
}

/// Everything visible at `instant`, in render order.
pub fn build_work_list(timeline: &Timeline, instant: RationalTime) -> Vec<FrameWorkItem> {
    let mut work = Vec::new();
    for (track_index, track) in timeline.tracks.iter().enumerate().rev() {
        if let Some(clip_index) = track.active_clip_index(instant) {
            let clip = &track.clips[clip_index];
            let has_video = timeline
                .sources
                .get(clip.source)
                .is_some_and(|s| s.video().is_some());
            if clip.video_enabled && has_video {
                work.push(FrameWorkItem::Clip {
                    track: track_index,
                    clip: clip_index,
                });
            } else {
                trace!(clip = %clip.id, "clip has no video to draw");
            }
        }

        let mut effects: SmallVec<[usize; 4]> = track.image_effects_at(instant).collect();
        effects.sort_by_key(|&i| track.effects[i].priority);
        for &i in &effects {
            let effect = &track.effects[i];
            let shares_layer = effects
                .iter()
                .filter(|&&j| track.effects[j].priority == effect.priority)
                .count()
                > 1;
            work.push(FrameWorkItem::Effect {
                track: track_index,
                effect: i,
                use_secondary: effect.transparent_backdrop || shares_layer,
            });
        }
    }
    work
}
