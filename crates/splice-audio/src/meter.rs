//! Per-track peak levels for driving level meters.
//!
//! Peaks decay exponentially between updates so meters fall back naturally
//! when a track goes quiet.

use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PeakMeter {
    peaks: HashMap<Uuid, [f32; 2]>,
    /// Factor applied to a held peak on every update.
    decay: f32,
}

impl PeakMeter {
    pub const DEFAULT_DECAY: f32 = 0.85;

    pub fn new(decay: f32) -> Self {
        Self {
            peaks: HashMap::new(),
            decay: decay.clamp(0.0, 1.0),
        }
    }

    /// Fold the latest left/right peaks of `track` into its held levels.
    pub fn update(&mut self, track: Uuid, levels: [f32; 2]) {
        let held = self.peaks.entry(track).or_insert([0.0; 2]);
        for (held, new) in held.iter_mut().zip(levels) {
            *held = (*held * self.decay).max(new.abs());
        }
    }

    /// Decay every track that produced nothing this round.
    pub fn decay_all_except(&mut self, updated: &[Uuid]) {
        for (track, held) in self.peaks.iter_mut() {
            if !updated.contains(track) {
                held[0] *= self.decay;
                held[1] *= self.decay;
            }
        }
    }

    /// Held left/right peaks of `track`, zero if never seen.
    pub fn levels(&self, track: Uuid) -> [f32; 2] {
        self.peaks.get(&track).copied().unwrap_or([0.0; 2])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Uuid, &[f32; 2])> {
        self.peaks.iter()
    }

    pub fn reset(&mut self) {
        self.peaks.clear();
    }
}

impl Default for PeakMeter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DECAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_holds_then_decays() {
        let track = Uuid::new_v4();
        let mut meter = PeakMeter::new(0.5);
        meter.update(track, [0.8, -0.4]);
        assert_eq!(meter.levels(track), [0.8, 0.4]);

        meter.update(track, [0.1, 0.1]);
        assert_eq!(meter.levels(track), [0.4, 0.2]);

        meter.update(track, [0.9, 0.0]);
        assert_eq!(meter.levels(track), [0.9, 0.1]);
    }

    #[test]
    fn test_idle_tracks_decay() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut meter = PeakMeter::new(0.5);
        meter.update(a, [1.0, 1.0]);
        meter.update(b, [1.0, 1.0]);
        meter.decay_all_except(&[a]);
        assert_eq!(meter.levels(a), [1.0, 1.0]);
        assert_eq!(meter.levels(b), [0.5, 0.5]);
    }

    #[test]
    fn test_unknown_track_is_silent() {
        let meter = PeakMeter::default();
        assert_eq!(meter.levels(Uuid::new_v4()), [0.0, 0.0]);
    }
}
