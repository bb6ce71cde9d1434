//! Integration tests for audio mixing.

use crate::fixtures::{caches, push_full_track};
use splice_audio::{AudioMixEngine, WaveformCache, WaveformKey};
use splice_core::audio::decode_to_f32;
use splice_core::{AudioFormat, FrameRate, RationalTime, SampleFormat};
use splice_media::{Signal, SyntheticMedia};
use splice_timeline::{AudioLevels, MediaClip, Timeline, Track};
use std::sync::Arc;

const RATE: u32 = 48_000;

fn mix(timeline: &Timeline, start: u64, frames: usize, format: AudioFormat) -> Vec<u8> {
    let caches = caches();
    let mut engine = AudioMixEngine::new(Arc::clone(&caches.audio), format);
    let mut out = vec![0x55u8; format.frames_to_bytes(frames)];
    let end = engine.fill_output_buffer(timeline, start, start + frames as u64, &mut out, &format);
    assert_eq!(end, start + frames as u64);
    out
}

fn sine(rate: u32, channels: u16, frequency: f32) -> SyntheticMedia {
    SyntheticMedia::audio(
        "tone",
        AudioFormat::new(rate, channels, SampleFormat::F32),
        rate as u64 * 10,
        Signal::Sine {
            frequency,
            amplitude: 0.6,
        },
    )
}

#[test]
fn muted_track_contributes_nothing() {
    // Track A: mono 44.1 kHz, resampled and duplicated to stereo 48 kHz.
    let a = sine(44_100, 1, 330.0);
    let b = sine(RATE, 2, 1_000.0);

    let mut both = Timeline::new("both", 64, 36, FrameRate::FPS_24);
    let a_id = both.sources.open(&a).unwrap();
    let b_id = both.sources.open(&b).unwrap();
    push_full_track(&mut both, "A", a_id, 10);
    let b_track = push_full_track(&mut both, "B", b_id, 10);
    both.tracks[b_track].muted = true;

    let mut alone = Timeline::new("alone", 64, 36, FrameRate::FPS_24);
    let a_id = alone.sources.open(&a).unwrap();
    push_full_track(&mut alone, "A", a_id, 10);

    let format = AudioFormat::stereo_f32(RATE);
    let mixed = mix(&both, 12_345, 4_800, format);
    assert_eq!(mixed, mix(&alone, 12_345, 4_800, format));

    let mut samples = Vec::new();
    decode_to_f32(&mixed, SampleFormat::F32, &mut samples);
    assert!(samples.iter().any(|&s| s.abs() > 0.1));
    for frame in samples.chunks_exact(2) {
        assert_eq!(frame[0], frame[1]);
    }
}

#[test]
fn range_outside_clip_is_all_silence_bytes() {
    let media = sine(RATE, 2, 440.0);
    let mut timeline = Timeline::new("t", 64, 36, FrameRate::FPS_24);
    let id = timeline.sources.open(&media).unwrap();
    let mut track = Track::new("A1");
    track
        .insert_clip(MediaClip::new(
            "tone",
            id,
            splice_core::TimeRange::new(RationalTime::ZERO, RationalTime::new(2, 1)),
            RationalTime::new(3, 1),
        ))
        .unwrap();
    timeline.push_track(track);

    let format = AudioFormat::stereo_f32(RATE);
    // Ends exactly where the clip starts.
    let before = mix(&timeline, 2 * RATE as u64, RATE as usize, format);
    assert!(before.iter().all(|&b| b == 0));
    // Starts exactly where the clip ends.
    let after = mix(&timeline, 5 * RATE as u64, 1_000, format);
    assert!(after.iter().all(|&b| b == 0));
}

#[test]
fn non_float_output_is_silence_of_that_format() {
    let media = sine(RATE, 2, 440.0);
    let mut timeline = Timeline::new("t", 64, 36, FrameRate::FPS_24);
    let id = timeline.sources.open(&media).unwrap();
    push_full_track(&mut timeline, "A1", id, 10);

    let format = AudioFormat::new(RATE, 2, SampleFormat::U8);
    let out = mix(&timeline, 0, 512, format);
    assert!(out.iter().all(|&b| b == 128));
}

#[test]
fn panned_levels_and_peaks() {
    let media = SyntheticMedia::audio(
        "dc",
        AudioFormat::stereo_f32(RATE),
        RATE as u64 * 4,
        Signal::Constant([0.5, 0.5]),
    );
    let mut timeline = Timeline::new("t", 64, 36, FrameRate::FPS_24);
    let id = timeline.sources.open(&media).unwrap();
    let track = push_full_track(&mut timeline, "A1", id, 4);
    timeline.tracks[track].levels = AudioLevels::from_pan(1.0, 1.0);

    let caches = caches();
    let format = AudioFormat::stereo_f32(RATE);
    let mut engine = AudioMixEngine::new(Arc::clone(&caches.audio), format);
    let mut out = vec![0u8; format.frames_to_bytes(256)];
    engine.fill_output_buffer(&timeline, 0, 256, &mut out, &format);

    let mut samples = Vec::new();
    decode_to_f32(&out, SampleFormat::F32, &mut samples);
    // Hard right: left is (almost) silent.
    assert!(samples[0].abs() < 1e-6);
    assert!((samples[1] - 0.5).abs() < 1e-6);
    let peaks = engine.peak_levels(timeline.tracks[track].id);
    assert!(peaks[0] < 1e-6 && (peaks[1] - 0.5).abs() < 1e-6);
}

#[test]
fn waveform_renders_from_audio_cache() {
    let media = sine(RATE, 2, 50.0);
    let mut timeline = Timeline::new("t", 64, 36, FrameRate::FPS_24);
    let id = timeline.sources.open(&media).unwrap();
    let source = Arc::clone(timeline.sources.get(id).unwrap());

    let caches = caches();
    let waveforms = WaveformCache::new(1 << 20, 4);
    let key = WaveformKey {
        source: id,
        start: 0,
        end: RATE as u64,
        width: 100,
        height: 20,
    };
    let image = waveforms.get_or_render(&caches.audio, &source, key).unwrap();
    assert_eq!((image.width, image.height), (100, 20));
    let again = waveforms.get_or_render(&caches.audio, &source, key).unwrap();
    assert!(Arc::ptr_eq(&image, &again));

    let near = WaveformKey { width: 110, ..key };
    assert!(Arc::ptr_eq(&waveforms.find_similar(&near).unwrap(), &image));
    // The samples were decoded through the shared audio cache.
    assert!(caches.audio.stats().entries > 0);
}
