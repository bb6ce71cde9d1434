//! Splice Audio - audio output engine
//!
//! Fills output buffers from the timeline and renders waveforms.
//!
//! Architecture:
//! - `Resampler` / `ResamplerBank`: linear-interpolation rate conversion, one per source and rate pair
//! - `convert_channels`: mono/stereo conversion
//! - `AudioEffect` + `ScratchPool`: effect chains over rotating scratch buffers
//! - `AudioMixEngine`: timeline -> interleaved f32 output with per-track levels
//! - `PeakMeter`: decaying per-track peak levels for meters
//! - `Waveform` / `WaveformCache`: min/max waveform images

pub mod channels;
pub mod effect;
pub mod meter;
pub mod mixer;
pub mod resampler;
pub mod waveform;

pub use channels::convert_channels;
pub use effect::{AudioEffect, BuiltinAudioEffect, ScratchPool};
pub use meter::PeakMeter;
pub use mixer::AudioMixEngine;
pub use resampler::{Resampler, ResamplerBank};
pub use waveform::{Waveform, WaveformCache, WaveformKey, WaveformSample};
