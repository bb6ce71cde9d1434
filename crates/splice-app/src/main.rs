//! Splice preview - plays a synthetic timeline headlessly
//!
//! Composites every frame, mixes the matching audio, requests thumbnails and
//! renders a waveform, then reports what the caches did.
//!
//! Usage: `splice-preview [settings.json]`

mod scene;

use anyhow::{Context, Result};
use scene::{build_timeline, PreviewSettings};
use splice_audio::{AudioMixEngine, WaveformCache, WaveformKey};
use splice_cache::CacheSet;
use splice_compositor::CompositorPipeline;
use splice_core::{AudioFormat, FrameBuffer, RationalTime};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let settings: PreviewSettings = serde_json::from_str(&text)
                .with_context(|| format!("parsing {}", path.display()))?;
            settings.cache.validate()?;
            settings
        }
        None => PreviewSettings::default(),
    };
    info!(
        width = settings.width,
        height = settings.height,
        seconds = settings.seconds,
        "Splice preview starting"
    );

    let caches = CacheSet::from_system(&settings.cache)?;
    let timeline = build_timeline(&settings)?;
    let mut pipeline =
        CompositorPipeline::new(Arc::clone(&caches.video), settings.compositor.clone());
    let output = AudioFormat::stereo_f32(settings.sample_rate);
    let mut mixer = AudioMixEngine::new(Arc::clone(&caches.audio), output);

    request_thumbnails(&caches, &timeline);

    let started = Instant::now();
    let total = timeline.duration().to_frames(timeline.frame_rate);
    let mut audio_out = Vec::new();
    for n in 0..total {
        let instant = RationalTime::from_frames(n, timeline.frame_rate);
        let frame = pipeline.compose_frame(&timeline, instant);

        let start = instant.to_samples(output.sample_rate) as u64;
        let end = (instant + timeline.frame_duration()).to_samples(output.sample_rate) as u64;
        audio_out.resize((end - start) as usize * output.bytes_per_frame(), 0);
        let written = mixer.fill_output_buffer(&timeline, start, end, &mut audio_out, &output);
        if written != end {
            warn!(start, end, written, "audio buffer came up short");
        }

        if n % timeline.frame_rate.numerator as i64 == 0 {
            let peaks: Vec<[f32; 2]> = timeline
                .tracks
                .iter()
                .map(|t| mixer.peak_levels(t.id))
                .collect();
            info!(
                frame = n,
                luma = mean_luma(&frame),
                peaks = ?peaks,
                "Preview position"
            );
        }
    }
    let elapsed = started.elapsed();
    info!(
        frames = total,
        ms = elapsed.as_millis() as u64,
        fps = total as f64 / elapsed.as_secs_f64().max(1e-9),
        "Playback finished"
    );

    render_waveforms(&caches, &timeline, &settings)?;

    for (name, stats) in [
        ("video", caches.video.stats()),
        ("thumbnails", caches.thumbnails.stats()),
        ("audio", caches.audio.stats()),
    ] {
        info!(
            cache = name,
            entries = stats.entries,
            used_kb = stats.used_bytes / 1024,
            hit_ratio = stats.hit_ratio(),
            evictions = stats.evictions,
            "Cache summary"
        );
    }
    Ok(())
}

/// Ask for one thumbnail per second of every video source and wait for them.
fn request_thumbnails(caches: &CacheSet, timeline: &splice_timeline::Timeline) {
    let events = caches.thumbnails.ready_events();
    let mut requested = 0;
    for (_, source) in timeline.sources.iter() {
        let Some(video) = source.video() else {
            continue;
        };
        let step = video.frame_rate.to_fps_f64().round().max(1.0) as usize;
        for index in (0..video.frame_count).step_by(step) {
            if caches
                .thumbnails
                .get_or_generate_thumbnail_async(source, index as i64, true)
                .is_none()
            {
                requested += 1;
            }
        }
    }

    let mut ready = 0;
    while ready < requested {
        match events.recv_timeout(Duration::from_secs(2)) {
            Ok(event) => {
                debug!(source = %event.source, frame = event.index, "thumbnail ready");
                ready += 1;
            }
            Err(_) => {
                warn!(requested, ready, "Gave up waiting for thumbnails");
                break;
            }
        }
    }
    info!(requested, ready, "Thumbnails generated");
}

fn render_waveforms(
    caches: &CacheSet,
    timeline: &splice_timeline::Timeline,
    settings: &PreviewSettings,
) -> Result<()> {
    let waveforms = WaveformCache::new(8 << 20, settings.cache.promotion_threshold);
    for (&id, source) in timeline.sources.iter() {
        let Some(audio) = source.audio() else {
            continue;
        };
        let key = WaveformKey {
            source: id,
            start: 0,
            end: audio.sample_count,
            width: 320,
            height: 48,
        };
        let image = waveforms.get_or_render(&caches.audio, source, key)?;
        // A resized request is answered from the closest cached size first.
        let wider = WaveformKey { width: 400, ..key };
        let similar = waveforms.find_similar(&wider).map(|f| (f.width, f.height));
        info!(
            source = %id,
            width = image.width,
            height = image.height,
            similar = ?similar,
            "Waveform rendered"
        );
    }
    Ok(())
}

fn mean_luma(frame: &FrameBuffer) -> f32 {
    let pixels = (frame.width as usize * frame.height as usize).max(1);
    let sum: u64 = frame
        .data()
        .chunks_exact(4)
        .map(|px| (px[0] as u64 * 299 + px[1] as u64 * 587 + px[2] as u64 * 114) / 1000)
        .sum();
    sum as f32 / pixels as f32
}
