//! Audio mix engine: fills output buffers from the timeline.
//!
//! For every audible track the clips overlapping the requested window are
//! fetched from the audio cache, resampled to the output rate, converted to
//! the output channel count, run through the track's audio effects and
//! summed with the track's left/right levels. Output frames not covered by
//! any clip stay silent.

use crate::channels::convert_channels;
use crate::effect::{AudioEffect, BuiltinAudioEffect, ScratchPool};
use crate::meter::PeakMeter;
use crate::resampler::ResamplerBank;
use splice_cache::AudioBufferCache;
use splice_core::audio::write_f32;
use splice_core::{AudioFormat, RationalTime, Result, SampleFormat, TimeRange};
use splice_media::MediaSource;
use smallvec::SmallVec;
use splice_timeline::{AudioLevels, MediaClip, Timeline};
use std::sync::Arc;
use tracing::{debug, trace, warn};
use uuid::Uuid;

pub struct AudioMixEngine {
    cache: Arc<AudioBufferCache>,
    output: AudioFormat,
    resamplers: ResamplerBank,
    pool: ScratchPool,
    /// Source samples of the clip being mixed, as f32.
    decoded: Vec<f32>,
    resampled: Vec<f32>,
    /// Running sum of every contributor, interleaved in the output layout.
    mix: Vec<f32>,
    meter: PeakMeter,
}

/// One clip's share of the output window.
struct Contribution<'a> {
    source: &'a MediaSource,
    /// First output frame written, relative to the window start.
    offset: usize,
    /// The same frame counted from timeline zero.
    output_frame: u64,
    frames: usize,
    /// Source position of the first output frame, in source sample frames.
    position: f64,
}

impl AudioMixEngine {
    pub fn new(cache: Arc<AudioBufferCache>, output: AudioFormat) -> Self {
        assert!(output.channels > 0, "output format with zero channels");
        assert!(output.sample_rate > 0, "output format with zero sample rate");
        Self {
            cache,
            output,
            resamplers: ResamplerBank::new(),
            pool: ScratchPool::new(),
            decoded: Vec::new(),
            resampled: Vec::new(),
            mix: Vec::new(),
            meter: PeakMeter::default(),
        }
    }

    pub fn output_format(&self) -> AudioFormat {
        self.output
    }

    /// Switch the output format. Resamplers are rebuilt on next use.
    pub fn set_output_format(&mut self, output: AudioFormat) {
        assert!(output.channels > 0, "output format with zero channels");
        assert!(output.sample_rate > 0, "output format with zero sample rate");
        if output != self.output {
            debug!(
                sample_rate = output.sample_rate,
                channels = output.channels,
                "Audio output format changed"
            );
            self.output = output;
            self.resamplers.reset_all();
        }
    }

    pub fn set_meter_decay(&mut self, decay: f32) {
        self.meter = PeakMeter::new(decay);
    }

    /// Held left/right peak levels of a track.
    pub fn peak_levels(&self, track: Uuid) -> [f32; 2] {
        self.meter.levels(track)
    }

    pub fn meter(&self) -> &PeakMeter {
        &self.meter
    }

    /// Mix output frames `[start, end)` of `timeline` into `out`.
    ///
    /// Frames are counted at the output rate from timeline zero. The range is
    /// shortened to what fits in `out`; the end actually written is
    /// returned. Only f32 output is mixed; other formats get silence.
    pub fn fill_output_buffer(
        &mut self,
        timeline: &Timeline,
        start: u64,
        end: u64,
        out: &mut [u8],
        format: &AudioFormat,
    ) -> u64 {
        assert!(format.channels > 0, "output format with zero channels");
        assert!(format.sample_rate > 0, "output format with zero sample rate");

        let bpf = format.bytes_per_frame();
        let fits = (out.len() / bpf) as u64;
        let end = end.max(start).min(start.saturating_add(fits));
        let frames = (end - start) as usize;
        let out = &mut out[..frames * bpf];
        out.fill(format.sample_format.silence_byte());
        if frames == 0 {
            return end;
        }
        if format.sample_format != SampleFormat::F32 {
            warn!(
                format = ?format.sample_format,
                "Only f32 output is mixed, writing silence"
            );
            return end;
        }
        self.set_output_format(*format);

        let channels = format.channels as usize;
        self.mix.clear();
        self.mix.resize(frames * channels, 0.0);

        let window = TimeRange::from_start_end(
            RationalTime::from_samples(start as i64, format.sample_rate),
            RationalTime::from_samples(end as i64, format.sample_rate),
        );

        let mut metered = Vec::new();
        // Back to front; mixing is additive so the order only matters for metering.
        for track in timeline.tracks.iter().rev() {
            if !timeline.is_audible(track) {
                continue;
            }
            let effects: SmallVec<[BuiltinAudioEffect; 4]> = track
                .audio_effects_in(window)
                .into_iter()
                .filter_map(BuiltinAudioEffect::from_effect)
                .collect();

            let mut peak = [0.0f32; 2];
            let mut contributed = false;
            for index in track.clips_in_range(window) {
                let clip = &track.clips[index];
                if !clip.audio_enabled {
                    continue;
                }
                let Some(source) = timeline.sources.get(clip.source) else {
                    warn!(clip = %clip.id, source = %clip.source, "Clip source not loaded");
                    continue;
                };
                let Some(contribution) = Self::contribution(clip, source, start, end, format) else {
                    continue;
                };
                match self.render_contribution(&contribution, &effects) {
                    Ok(()) => {
                        Self::mix_into(
                            &mut self.mix,
                            self.pool.current(),
                            contribution.offset,
                            channels,
                            track.levels,
                            &mut peak,
                        );
                        contributed = true;
                    }
                    Err(e) => {
                        warn!(clip = %clip.id, source = %clip.source, error = %e, "Audio contributor skipped");
                    }
                }
            }
            if contributed {
                self.meter.update(track.id, peak);
                metered.push(track.id);
            }
        }
        self.meter.decay_all_except(&metered);

        for s in self.mix.iter_mut() {
            *s = s.clamp(-1.0, 1.0);
        }
        write_f32(out, &self.mix);
        trace!(start, end, contributors = metered.len(), "audio buffer filled");
        end
    }

    /// Where `clip` lands in the output window `[start, end)`, if it does.
    fn contribution<'a>(
        clip: &MediaClip,
        source: &'a Arc<MediaSource>,
        start: u64,
        end: u64,
        format: &AudioFormat,
    ) -> Option<Contribution<'a>> {
        let info = source.audio()?;
        let out_rate = format.sample_rate;
        let clip_start = clip.timeline_start.to_samples_rounded(out_rate);
        let clip_end = clip.timeline_end().to_samples_rounded(out_rate);
        let from = (start as i64).max(clip_start);
        let to = (end as i64).min(clip_end);
        if from >= to {
            return None;
        }
        let in_point = clip.source_range.start.to_samples_rounded(info.format.sample_rate) as f64;
        let step = info.format.sample_rate as f64 / out_rate as f64;
        Some(Contribution {
            source: source.as_ref(),
            offset: (from - start as i64) as usize,
            output_frame: from as u64,
            frames: (to - from) as usize,
            position: (in_point + (from - clip_start) as f64 * step).max(0.0),
        })
    }

    /// Produce the contribution's samples in the output layout into the scratch pool.
    fn render_contribution(
        &mut self,
        contribution: &Contribution<'_>,
        effects: &[BuiltinAudioEffect],
    ) -> Result<()> {
        let source = contribution.source;
        let Some(info) = source.audio() else {
            return Ok(());
        };
        let in_rate = info.format.sample_rate;
        let in_channels = info.format.channels;
        let out_rate = self.output.sample_rate;
        let out_channels = self.output.channels;
        let mut resampler = if in_rate != out_rate {
            Some(self.resamplers.get(source.id(), in_rate, out_rate, in_channels))
        } else {
            None
        };
        let position = match resampler.as_mut() {
            Some(r) => r.seek_stream(contribution.output_frame, contribution.position),
            None => contribution.position,
        };
        let first = position.floor();
        let fraction = position - first;
        let needed = match &resampler {
            Some(r) => r.input_frames_for(fraction, contribution.frames),
            None => contribution.frames,
        };

        self.decoded.clear();
        fetch_samples(&self.cache, source, first as u64, needed, &mut self.decoded)?;
        // Past the end of the source reads as silence.
        self.decoded.resize(needed * in_channels as usize, 0.0);

        let stage = match resampler {
            Some(r) => {
                self.resampled.clear();
                r.render(&self.decoded, fraction, contribution.frames, &mut self.resampled);
                r.advance(contribution.frames);
                &self.resampled
            }
            None => &self.decoded,
        };

        self.pool
            .load_with(|first| convert_channels(stage, in_channels, out_channels, first))?;
        let chain: SmallVec<[&dyn AudioEffect; 4]> =
            effects.iter().map(|e| e as &dyn AudioEffect).collect();
        self.pool.apply(&chain, out_channels);
        Ok(())
    }

    fn mix_into(
        mix: &mut [f32],
        samples: &[f32],
        offset: usize,
        channels: usize,
        levels: AudioLevels,
        peak: &mut [f32; 2],
    ) {
        let center = (levels.left + levels.right) * 0.5;
        let dst = &mut mix[offset * channels..];
        for (out_frame, in_frame) in dst.chunks_exact_mut(channels).zip(samples.chunks_exact(channels)) {
            for (c, (out, &s)) in out_frame.iter_mut().zip(in_frame).enumerate() {
                let gain = match (channels, c) {
                    (1, _) => center,
                    (_, 0) => levels.left,
                    (_, 1) => levels.right,
                    _ => center,
                };
                let v = s * gain;
                *out += v;
                if channels == 1 {
                    peak[0] = peak[0].max(v.abs());
                    peak[1] = peak[0];
                } else if c < 2 {
                    peak[c] = peak[c].max(v.abs());
                }
            }
        }
    }
}

/// Append `frames` sample frames of `source` from `start` to `out` as f32,
/// stopping early at the end of the stream.
pub(crate) fn fetch_samples(
    cache: &AudioBufferCache,
    source: &MediaSource,
    start: u64,
    frames: usize,
    out: &mut Vec<f32>,
) -> Result<()> {
    let mut position = start;
    let mut remaining = frames;
    while remaining > 0 {
        let slice = cache.get_or_decode_range(source, position, position + remaining as u64)?;
        if slice.is_empty() {
            break;
        }
        let slice = slice.truncated(remaining);
        slice.to_f32(out);
        position += slice.frames() as u64;
        remaining -= slice.frames();
    }
    Ok(())
}
