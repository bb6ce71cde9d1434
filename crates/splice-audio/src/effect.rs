//! Audio effects and the scratch buffers an effect chain runs through.
//!
//! Each effect reads the previous stage's samples and writes the next
//! stage. Stages rotate through a small fixed pool of buffers that keep
//! their allocations between fill calls.

use splice_timeline::MediaEffect;
use tracing::warn;

const SCRATCH_BUFFERS: usize = 3;

/// One stage of an audio effect chain over interleaved f32 samples.
pub trait AudioEffect: Send {
    /// Read `input` and append the processed samples to `output`, which is empty.
    fn process(&self, input: &[f32], output: &mut Vec<f32>, channels: u16);
}

/// Effects implemented by the engine, built from timeline audio effects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BuiltinAudioEffect {
    /// Linear gain factor.
    Gain(f32),
    /// Phase inversion.
    Invert,
    /// Hard limiter at the given linear threshold.
    Limit(f32),
}

impl BuiltinAudioEffect {
    /// The engine effect for a timeline effect, or `None` for unknown types.
    pub fn from_effect(effect: &MediaEffect) -> Option<Self> {
        match effect.effect_type.as_str() {
            "gain" => Some(Self::Gain(effect.param_f32("gain").unwrap_or(1.0))),
            "invert" => Some(Self::Invert),
            "limiter" => Some(Self::Limit(
                effect.param_f32("threshold").unwrap_or(0.95).abs(),
            )),
            other => {
                warn!(effect_type = other, id = %effect.id, "Unknown audio effect skipped");
                None
            }
        }
    }
}

impl AudioEffect for BuiltinAudioEffect {
    fn process(&self, input: &[f32], output: &mut Vec<f32>, _channels: u16) {
        match *self {
            Self::Gain(gain) => output.extend(input.iter().map(|s| s * gain)),
            Self::Invert => output.extend(input.iter().map(|s| -s)),
            Self::Limit(threshold) => {
                output.extend(input.iter().map(|s| s.clamp(-threshold, threshold)))
            }
        }
    }
}

/// Rotating scratch buffers for effect chains.
#[derive(Debug, Default)]
pub struct ScratchPool {
    buffers: [Vec<f32>; SCRATCH_BUFFERS],
    current: usize,
}

impl ScratchPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a chain with `samples` as its input.
    pub fn load(&mut self, samples: &[f32]) {
        self.current = 0;
        let first = &mut self.buffers[0];
        first.clear();
        first.extend_from_slice(samples);
    }

    /// Start a chain by letting `fill` write its input.
    pub fn load_with<R>(&mut self, fill: impl FnOnce(&mut Vec<f32>) -> R) -> R {
        self.current = 0;
        let first = &mut self.buffers[0];
        first.clear();
        fill(first)
    }

    /// Output of the last stage (the loaded samples before any stage ran).
    pub fn current(&self) -> &[f32] {
        &self.buffers[self.current]
    }

    /// Run one stage from the current buffer into the next one.
    pub fn advance(&mut self, stage: impl FnOnce(&[f32], &mut Vec<f32>)) {
        let next = (self.current + 1) % SCRATCH_BUFFERS;
        let mut output = std::mem::take(&mut self.buffers[next]);
        output.clear();
        stage(&self.buffers[self.current], &mut output);
        self.buffers[next] = output;
        self.current = next;
    }

    /// Run `effects` in order over the loaded samples.
    pub fn apply(&mut self, effects: &[&dyn AudioEffect], channels: u16) -> &[f32] {
        for effect in effects {
            self.advance(|input, output| effect.process(input, output, channels));
        }
        self.current()
    }
}
