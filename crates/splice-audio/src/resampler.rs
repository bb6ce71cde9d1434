//! Sample rate conversion using linear interpolation.
//!
//! A [`Resampler`] converts interleaved f32 audio between two fixed rates.
//! It renders at an absolute source position ([`render`](Resampler::render))
//! and keeps a stream anchor so contiguous output requests continue from an
//! exact integer position instead of re-deriving it in floating point.

use splice_core::SourceId;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Positions further apart than this are treated as a jump, not a continuation.
const CONTINUITY_TOLERANCE: f64 = 0.5;

pub struct Resampler {
    from_rate: u32,
    to_rate: u32,
    channels: u16,
    /// Input frames advanced per output frame.
    step: f64,
    /// Output frame and source position the current stream started at.
    anchor: Option<(u64, f64)>,
    /// Output frames rendered since the anchor.
    emitted: u64,
}

impl Resampler {
    pub fn new(from_rate: u32, to_rate: u32, channels: u16) -> Self {
        assert!(from_rate > 0 && to_rate > 0, "resampler with zero sample rate");
        assert!(channels > 0, "resampler with zero channels");
        Self {
            from_rate,
            to_rate,
            channels,
            step: from_rate as f64 / to_rate as f64,
            anchor: None,
            emitted: 0,
        }
    }

    /// Source position of the output frame `emitted` frames past an anchor at
    /// `anchor_pos`. The whole part is exact integer math.
    fn offset_from(&self, anchor_pos: f64, emitted: u64) -> f64 {
        let to = self.to_rate as u128;
        let num = emitted as u128 * self.from_rate as u128;
        anchor_pos + (num / to) as f64 + (num % to) as f64 / to as f64
    }

    /// Position the stream at absolute output frame `output_frame`, whose
    /// source position is `position`, and return the position to render from.
    ///
    /// When `output_frame` directly follows the frames already rendered and
    /// the stream agrees with `position`, the stream's exact position is
    /// returned. Otherwise the stream restarts at `position`.
    pub fn seek_stream(&mut self, output_frame: u64, position: f64) -> f64 {
        if let Some((start, anchor_pos)) = self.anchor {
            if start.checked_add(self.emitted) == Some(output_frame) {
                let continued = self.offset_from(anchor_pos, self.emitted);
                if (continued - position).abs() < CONTINUITY_TOLERANCE {
                    return continued;
                }
            }
            trace!(output_frame, position, "resampler stream restarted");
        }
        self.anchor = Some((output_frame, position));
        self.emitted = 0;
        position
    }

    /// Record that `frames` output frames were rendered from the stream position.
    pub fn advance(&mut self, frames: usize) {
        self.emitted += frames as u64;
    }

    /// Output frames rendered since the stream last restarted.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Whole input frames the stream has moved past since it last restarted.
    pub fn consumed(&self) -> u64 {
        match self.anchor {
            Some((_, anchor_pos)) => {
                let now = self.offset_from(anchor_pos, self.emitted);
                (now.floor() - anchor_pos.floor()) as u64
            }
            None => 0,
        }
    }

    /// Render `frames` output frames starting at fractional input frame
    /// `position`, appending to `out`.
    ///
    /// `position` is relative to the first frame of `input`. Reads past the
    /// end of `input` hold its last frame; an empty input renders silence.
    pub fn render(&self, input: &[f32], position: f64, frames: usize, out: &mut Vec<f32>) {
        let ch = self.channels as usize;
        let input_frames = input.len() / ch;
        if input_frames == 0 {
            out.resize(out.len() + frames * ch, 0.0);
            return;
        }
        let last = input_frames - 1;
        for i in 0..frames {
            let pos = (position + i as f64 * self.step).max(0.0);
            let idx = (pos.floor() as usize).min(last);
            let frac = if idx == last {
                0.0
            } else {
                (pos - idx as f64) as f32
            };
            let next = (idx + 1).min(last);
            for c in 0..ch {
                let a = input[idx * ch + c];
                let b = input[next * ch + c];
                out.push(a + (b - a) * frac);
            }
        }
    }

    /// Input frames needed to render `frames` output frames from `position`.
    pub fn input_frames_for(&self, position: f64, frames: usize) -> usize {
        if frames == 0 {
            return 0;
        }
        let last_pos = position + (frames - 1) as f64 * self.step;
        last_pos.floor() as usize + 2
    }

    /// Input frames per output frame.
    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn from_rate(&self) -> u32 {
        self.from_rate
    }

    pub fn to_rate(&self) -> u32 {
        self.to_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ResamplerKey {
    source: SourceId,
    from_rate: u32,
    to_rate: u32,
    channels: u16,
}

/// Resamplers created on first use and kept until the output format changes.
#[derive(Default)]
pub struct ResamplerBank {
    resamplers: HashMap<ResamplerKey, Resampler>,
}

impl ResamplerBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// The resampler of `source` for this rate pair, created if needed.
    pub fn get(&mut self, source: SourceId, from_rate: u32, to_rate: u32, channels: u16) -> &mut Resampler {
        let key = ResamplerKey {
            source,
            from_rate,
            to_rate,
            channels,
        };
        self.resamplers.entry(key).or_insert_with(|| {
            debug!(source = %source, from_rate, to_rate, channels, "Created resampler");
            Resampler::new(from_rate, to_rate, channels)
        })
    }

    /// Drop every resampler; they are rebuilt lazily for the new settings.
    pub fn reset_all(&mut self) {
        if !self.resamplers.is_empty() {
            debug!(count = self.resamplers.len(), "Resamplers reset");
        }
        self.resamplers.clear();
    }

    /// The resampler of `source` for this rate pair, if one was created.
    pub fn find(&self, source: SourceId, from_rate: u32, to_rate: u32, channels: u16) -> Option<&Resampler> {
        self.resamplers.get(&ResamplerKey {
            source,
            from_rate,
            to_rate,
            channels,
        })
    }

    pub fn len(&self) -> usize {
        self.resamplers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resamplers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Render `total` output frames of `input` from its start, `chunk` frames
    /// per request, the way the mixer drives a stream.
    fn stream(r: &mut Resampler, input: &[f32], total: usize, chunk: usize) -> Vec<f32> {
        let mut out = Vec::new();
        let mut done = 0;
        while done < total {
            let frames = chunk.min(total - done);
            let position = r.seek_stream(done as u64, done as f64 * r.step());
            r.render(input, position, frames, &mut out);
            r.advance(frames);
            done += frames;
        }
        out
    }

    fn gcd(a: u32, b: u32) -> u32 {
        if b == 0 {
            a
        } else {
            gcd(b, a % b)
        }
    }

    #[test]
    fn test_same_rate_passthrough() {
        let mut r = Resampler::new(44_100, 44_100, 1);
        let input: Vec<f32> = (0..100).map(|i| i as f32 / 100.0).collect();
        assert_eq!(stream(&mut r, &input, 100, 32), input);
        assert_eq!(r.consumed(), 100);
    }

    #[test]
    fn test_upsample_doubles() {
        let mut r = Resampler::new(22_050, 44_100, 1);
        assert_eq!(stream(&mut r, &[0.0; 100], 200, 64).len(), 200);
        assert_eq!(r.emitted(), 200);
        assert_eq!(r.consumed(), 100);
    }

    #[test]
    fn test_downsample_halves() {
        let mut r = Resampler::new(44_100, 22_050, 2);
        assert_eq!(stream(&mut r, &[0.0; 400], 100, 64).len(), 200);
        assert_eq!(r.consumed(), 200);
    }

    #[test]
    fn test_chunked_stream_matches_one_shot() {
        let input: Vec<f32> = (0..300).map(|i| (i as f32 * 0.05).sin()).collect();
        let whole = Resampler::new(32_000, 48_000, 1);
        let mut expected = Vec::new();
        whole.render(&input, 0.0, 450, &mut expected);

        let mut chunked = Resampler::new(32_000, 48_000, 1);
        let got = stream(&mut chunked, &input, 450, 64);
        assert_eq!(got.len(), 450);
        for (a, b) in got.iter().zip(&expected) {
            assert!((a - b).abs() < 1e-5);
        }
        assert_eq!(chunked.consumed(), 300);
    }

    #[test]
    fn test_stream_restarts_on_jump() {
        let mut r = Resampler::new(44_100, 48_000, 2);
        assert_eq!(r.seek_stream(0, 0.0), 0.0);
        r.advance(480);

        // Contiguous: the stream position wins over the caller's estimate.
        let exact = r.seek_stream(480, 480.0 * r.step() + 0.001);
        assert_eq!(exact, 441.0);
        r.advance(480);
        assert_eq!(r.emitted(), 960);

        // A gap in the output restarts.
        assert_eq!(r.seek_stream(10_000, 5.0), 5.0);
        assert_eq!(r.emitted(), 0);
        r.advance(10);

        // Contiguous output but a different source position, e.g. a cut.
        assert_eq!(r.seek_stream(10_010, 900.0), 900.0);
        assert_eq!(r.emitted(), 0);
    }

    #[test]
    fn test_render_interpolates_between_frames() {
        let r = Resampler::new(1_000, 2_000, 1);
        let mut out = Vec::new();
        r.render(&[0.0, 1.0, 2.0], 0.0, 5, &mut out);
        assert_eq!(out, vec![0.0, 0.5, 1.0, 1.5, 2.0]);
    }

    #[test]
    fn test_render_holds_last_frame() {
        let r = Resampler::new(1_000, 1_000, 2);
        let mut out = Vec::new();
        r.render(&[0.1, 0.2, 0.3, 0.4], 1.0, 3, &mut out);
        assert_eq!(out, vec![0.3, 0.4, 0.3, 0.4, 0.3, 0.4]);
    }

    #[test]
    fn test_input_frames_for() {
        let r = Resampler::new(44_100, 48_000, 1);
        let needed = r.input_frames_for(0.25, 480);
        let last = 0.25 + 479.0 * r.step();
        assert_eq!(needed, last.floor() as usize + 2);
    }

    #[test]
    fn test_bank_reuses_and_resets() {
        let mut bank = ResamplerBank::new();
        bank.get(SourceId(1), 44_100, 48_000, 2).advance(64);
        assert_eq!(bank.get(SourceId(1), 44_100, 48_000, 2).emitted(), 64);
        bank.get(SourceId(2), 44_100, 48_000, 2);
        assert_eq!(bank.len(), 2);
        assert!(bank.find(SourceId(1), 48_000, 44_100, 2).is_none());
        bank.reset_all();
        assert!(bank.is_empty());
    }

    proptest! {
        #[test]
        fn prop_sample_count_is_conserved(
            rates in prop::sample::select(vec![
                (44_100u32, 48_000u32), (48_000, 44_100), (22_050, 48_000),
                (48_000, 8_000), (32_000, 48_000), (96_000, 44_100),
            ]),
            periods in 1usize..40,
            chunk in 1usize..700,
        ) {
            let (from, to) = rates;
            // Whole rate periods so the input count is exactly output * from / to.
            let g = gcd(from, to);
            let output_frames = periods * (to / g) as usize;
            let input_frames = periods * (from / g) as usize;
            let mut r = Resampler::new(from, to, 1);
            prop_assert!(r.input_frames_for(0.0, output_frames) <= input_frames + 1);

            let out = stream(&mut r, &vec![0.25; input_frames], output_frames, chunk);
            prop_assert_eq!(out.len(), output_frames);
            prop_assert_eq!(r.emitted(), output_frames as u64);
            prop_assert_eq!(r.consumed(), input_frames as u64,
                "{} -> {}: {} out in chunks of {}", from, to, output_frames, chunk);
        }
    }
}
