//! Integration tests for the caches under load.

use crate::fixtures::{caches, caches_with, push_full_track};
use splice_compositor::{CompositorConfig, CompositorPipeline};
use splice_core::{AudioFormat, CacheConfig, FrameRate, RationalTime, SampleFormat, SourceId};
use splice_media::{MediaSource, Signal, SyntheticMedia};
use splice_timeline::Timeline;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn one_past_the_end_returns_last_frame() {
    let media = SyntheticMedia::video("v", 32, 18, FrameRate::FPS_25, 75);
    let source = MediaSource::open(SourceId(9), &media).unwrap();
    let caches = caches();

    let frame = caches.video.get_or_decode_frame(&source, 75).unwrap();
    assert_eq!(frame.pattern_index(), 74);
    let again = caches.video.get_or_decode_frame(&source, 74).unwrap();
    assert!(Arc::ptr_eq(&frame, &again));
}

#[test]
fn repeated_reads_are_idempotent_across_sources() {
    let a = SyntheticMedia::video("a", 16, 9, FrameRate::FPS_24, 100);
    let b = SyntheticMedia::video("b", 16, 9, FrameRate::FPS_24, 100);
    let a = MediaSource::open(SourceId(1), &a).unwrap();
    let b = MediaSource::open(SourceId(2), &b).unwrap();
    let caches = caches();

    for index in [3, 50, 97] {
        let first_a = caches.video.get_or_decode_frame(&a, index).unwrap();
        let first_b = caches.video.get_or_decode_frame(&b, index).unwrap();
        assert!(!Arc::ptr_eq(&first_a, &first_b));
        assert!(Arc::ptr_eq(&first_a, &caches.video.get_or_decode_frame(&a, index).unwrap()));
        assert!(Arc::ptr_eq(&first_b, &caches.video.get_or_decode_frame(&b, index).unwrap()));
    }
}

#[test]
fn thumbnails_generate_while_playback_decodes() {
    let media = SyntheticMedia::video("v", 64, 36, FrameRate::FPS_24, 480).with_gop(24);
    let mut timeline = Timeline::new("t", 64, 36, FrameRate::FPS_24);
    let id = timeline.sources.open(&media).unwrap();
    push_full_track(&mut timeline, "V1", id, 20);
    let source = Arc::clone(timeline.sources.get(id).unwrap());

    let caches = caches_with(CacheConfig {
        thumbnail_workers: 2,
        thumbnail_width: 16,
        thumbnail_height: 9,
        ..CacheConfig::default()
    });
    let events = caches.thumbnails.ready_events();
    for index in (0..480).step_by(40) {
        assert!(caches
            .thumbnails
            .get_or_generate_thumbnail_async(&source, index, true)
            .is_none());
    }

    // Playback keeps running on this thread while the workers decode.
    let mut pipeline = CompositorPipeline::new(Arc::clone(&caches.video), CompositorConfig::default());
    for n in 0..240 {
        let frame = pipeline.compose_frame(&timeline, RationalTime::from_frames(n, FrameRate::FPS_24));
        assert_eq!(frame.pattern_index() as i64, n);
    }

    let mut ready = Vec::new();
    while ready.len() < 12 {
        let event = events.recv_timeout(Duration::from_secs(10)).unwrap();
        assert_eq!(event.thumbnail.pattern_index() as u64 % 40, 0);
        ready.push(event.index);
    }
    ready.sort_unstable();
    assert_eq!(ready, (0..480).step_by(40).collect::<Vec<u64>>());
    assert!(caches.thumbnails.cached(id, 440).is_some());
}

#[test]
fn pipelines_on_several_threads_share_one_cache() {
    let media = SyntheticMedia::video("v", 32, 18, FrameRate::FPS_24, 240).with_gop(6);
    let mut timeline = Timeline::new("t", 32, 18, FrameRate::FPS_24);
    let id = timeline.sources.open(&media).unwrap();
    push_full_track(&mut timeline, "V1", id, 10);
    let timeline = Arc::new(timeline);
    let caches = caches();

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let timeline = Arc::clone(&timeline);
            let video = Arc::clone(&caches.video);
            std::thread::spawn(move || {
                let mut pipeline = CompositorPipeline::new(video, CompositorConfig::default());
                for n in (t..240).step_by(7) {
                    let instant = RationalTime::from_frames(n, FrameRate::FPS_24);
                    let frame = pipeline.compose_frame(&timeline, instant);
                    assert_eq!(frame.pattern_index() as i64, n);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    let stats = caches.video.stats();
    assert!(stats.used_bytes <= stats.budget_bytes);
}

#[test]
fn clear_pending_drops_resize_burst() {
    let media = SyntheticMedia::video("v", 64, 36, FrameRate::FPS_24, 1_000);
    let source = Arc::new(MediaSource::open(SourceId(5), &media).unwrap());
    let caches = caches();

    // Hold the decode gate so nothing can finish while the burst is queued.
    let held = caches.gate.lock();
    for index in 0..200 {
        caches
            .thumbnails
            .get_or_generate_thumbnail_async(&source, index, false);
    }
    let dropped = caches.thumbnails.clear_pending();
    assert!(dropped >= 199);
    drop(held);
    assert_eq!(caches.thumbnails.pending_count(), 0);
}

#[test]
fn audio_playback_run_decodes_once() {
    let media = SyntheticMedia::audio(
        "a",
        AudioFormat::new(48_000, 2, SampleFormat::S16),
        48_000 * 30,
        Signal::Ramp { period: 1_000 },
    );
    let source = MediaSource::open(SourceId(4), &media).unwrap();
    let caches = caches_with(CacheConfig {
        max_audio_window_secs: 10.0,
        ..CacheConfig::default()
    });

    let first = caches.audio.get_or_decode_range(&source, 0, 1_024).unwrap();
    assert!(first.end() >= 480_000);
    let reads = media.stats().audio_reads();
    // One second of 1024-frame callbacks inside the decoded window.
    for block in 1..47u64 {
        let slice = caches
            .audio
            .get_or_decode_range(&source, block * 1_024, (block + 1) * 1_024)
            .unwrap();
        assert!(slice.shares_buffer(&first));
        assert_eq!(slice.start(), block * 1_024);
    }
    assert_eq!(media.stats().audio_reads(), reads);
}
