//! Integration tests for frame compositing.

use crate::fixtures::{caches, push_full_track, secs, span};
use splice_compositor::{CompositorConfig, CompositorPipeline, ImageEffect};
use splice_core::{FrameBuffer, FrameRate};
use splice_media::{MediaHandle, MediaOpener, SeekMode, SyntheticMedia};
use splice_timeline::{MediaEffect, Timeline};
use std::sync::Arc;

/// Decode frame `target` on a fresh handle, outside any cache.
fn direct_decode(media: &SyntheticMedia, target: u64) -> FrameBuffer {
    let mut handle = media.open().unwrap();
    handle.seek_video(target, SeekMode::ClosestBackward).unwrap();
    let mut frame = FrameBuffer::new(0, 0);
    loop {
        let at = handle.video_position();
        handle.read_video(&mut frame).unwrap();
        if at == target {
            return frame;
        }
    }
}

fn small_timeline(tracks: usize) -> (Timeline, Vec<SyntheticMedia>) {
    let mut timeline = Timeline::new("t", 48, 27, FrameRate::FPS_24);
    let mut media = Vec::new();
    for n in 0..tracks {
        let m = SyntheticMedia::video(&format!("v{n}"), 48, 27, FrameRate::FPS_24, 240);
        let id = timeline.sources.open(&m).unwrap();
        push_full_track(&mut timeline, &format!("V{}", n + 1), id, 10);
        media.push(m);
    }
    (timeline, media)
}

#[test]
fn full_screen_clip_takes_fast_path_bit_identical() {
    let mut timeline = Timeline::new("hd", 1920, 1080, FrameRate::FPS_24);
    let media = SyntheticMedia::video("hd", 1920, 1080, FrameRate::FPS_24, 240);
    let id = timeline.sources.open(&media).unwrap();
    push_full_track(&mut timeline, "V1", id, 10);

    let caches = caches();
    let mut pipeline = CompositorPipeline::new(Arc::clone(&caches.video), CompositorConfig::default());
    let frame = pipeline.compose_frame(&timeline, secs(3));

    // Returned straight from the cache, not a composited copy.
    let cached = caches.video.cached(id, 72).unwrap();
    assert!(Arc::ptr_eq(&frame, &cached));
    assert_eq!(*frame, direct_decode(&media, 72));
}

#[test]
fn higher_priority_effect_renders_after_lower() {
    let (mut timeline, _media) = small_timeline(1);
    let tint = serde_json::json!({ "color": [255, 0, 0, 255], "amount": 0.5 });
    timeline.tracks[0].add_effect(MediaEffect::image("tint", span(0, 10), 1).with_params(tint));
    timeline.tracks[0].add_effect(MediaEffect::image("invert", span(0, 10), 0));

    let caches = caches();
    let mut pipeline = CompositorPipeline::new(Arc::clone(&caches.video), CompositorConfig::default());
    let frame = pipeline.compose_frame(&timeline, secs(2));

    let tint = ImageEffect::Tint {
        color: [255, 0, 0, 255],
        amount: 0.5,
    };
    let mut invert_then_tint = FrameBuffer::test_pattern(48, 27, 48);
    ImageEffect::Invert.apply(&mut invert_then_tint);
    tint.apply(&mut invert_then_tint);
    let mut tint_then_invert = FrameBuffer::test_pattern(48, 27, 48);
    tint.apply(&mut tint_then_invert);
    ImageEffect::Invert.apply(&mut tint_then_invert);

    assert_eq!(*frame, invert_then_tint);
    assert_ne!(*frame, tint_then_invert);
}

#[test]
fn stacked_same_priority_effects_match_sequential_application() {
    let (mut timeline, _media) = small_timeline(1);
    let tint = serde_json::json!({ "color": [0, 0, 255, 255], "amount": 0.25 });
    timeline.tracks[0].add_effect(MediaEffect::image("tint", span(0, 10), 2).with_params(tint));
    timeline.tracks[0].add_effect(MediaEffect::image("invert", span(0, 10), 2));

    let caches = caches();
    let mut pipeline = CompositorPipeline::new(Arc::clone(&caches.video), CompositorConfig::default());
    let frame = pipeline.compose_frame(&timeline, secs(1));

    let mut expected = FrameBuffer::test_pattern(48, 27, 24);
    ImageEffect::Tint {
        color: [0, 0, 255, 255],
        amount: 0.25,
    }
    .apply(&mut expected);
    ImageEffect::Invert.apply(&mut expected);
    assert_eq!(*frame, expected);
}

#[test]
fn transparent_backdrop_isolates_effect_from_composite() {
    let (mut timeline, _media) = small_timeline(1);
    let half = serde_json::json!({ "opacity": 0.5 });
    timeline.tracks[0].add_effect(
        MediaEffect::image("opacity", span(0, 5), 0)
            .with_params(half.clone())
            .with_transparent_backdrop(),
    );
    timeline.tracks[0].add_effect(MediaEffect::image("opacity", span(5, 10), 0).with_params(half));

    let caches = caches();
    let mut pipeline = CompositorPipeline::new(Arc::clone(&caches.video), CompositorConfig::default());

    // Isolated: fades an empty layer, the composite is untouched.
    let isolated = pipeline.compose_frame(&timeline, secs(1));
    assert_eq!(*isolated, FrameBuffer::test_pattern(48, 27, 24));

    // Chained: fades the composite itself.
    let chained = pipeline.compose_frame(&timeline, secs(6));
    assert_eq!(chained.pixel(10, 10)[3], 128);
}

#[test]
fn gap_in_front_track_reveals_back_track() {
    let (mut timeline, _media) = small_timeline(2);
    let front = timeline.tracks[0].clips[0].id;
    timeline.tracks[0].remove_clip(front);
    let source = timeline.tracks[1].clips[0].source;
    timeline.tracks[0]
        .insert_clip(splice_timeline::MediaClip::new(
            "front",
            source,
            span(0, 5),
            secs(0),
        ))
        .unwrap();

    let caches = caches();
    let mut pipeline = CompositorPipeline::new(Arc::clone(&caches.video), CompositorConfig::default());
    assert_eq!(pipeline.compose_frame(&timeline, secs(7)).pattern_index(), 168);
    assert_eq!(pipeline.compose_frame(&timeline, secs(2)).pattern_index(), 48);
}

#[test]
fn empty_timeline_returns_background() {
    let timeline = Timeline::new("empty", 16, 9, FrameRate::FPS_25);
    let caches = caches();
    let config = CompositorConfig {
        background: [12, 34, 56, 255],
        ..Default::default()
    };
    let mut pipeline = CompositorPipeline::new(Arc::clone(&caches.video), config);
    let frame = pipeline.compose_frame(&timeline, secs(0));
    assert_eq!((frame.width, frame.height), (16, 9));
    assert!(frame.data().chunks(4).all(|px| px == [12, 34, 56, 255]));
}

#[test]
fn missing_clip_keeps_rest_of_composite() {
    let (mut timeline, media) = small_timeline(2);
    timeline.tracks[0].add_effect(MediaEffect::image("invert", span(0, 10), 0));
    media[0].stats().fail_next_seeks(50);

    let caches = caches();
    let mut pipeline = CompositorPipeline::new(Arc::clone(&caches.video), CompositorConfig::default());
    let frame = pipeline.compose_frame(&timeline, secs(4));

    // Front clip is gone; the back clip still shows, inverted by the front track's effect.
    let mut expected = FrameBuffer::test_pattern(48, 27, 96);
    ImageEffect::Invert.apply(&mut expected);
    assert_eq!(*frame, expected);
    assert!(Arc::ptr_eq(pipeline.last_frame().unwrap(), &frame));
}
