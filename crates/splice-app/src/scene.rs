//! The synthetic project the preview plays.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use splice_compositor::CompositorConfig;
use splice_core::{AudioFormat, CacheConfig, FrameRate, RationalTime, TimeRange, Transform2D};
use splice_media::{Signal, SyntheticMedia};
use splice_timeline::{AudioLevels, MediaClip, MediaEffect, Timeline, Track};

/// Preview settings, read from an optional JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewSettings {
    pub cache: CacheConfig,
    pub compositor: CompositorConfig,
    pub width: u32,
    pub height: u32,
    /// Seconds of timeline to play.
    pub seconds: u32,
    pub sample_rate: u32,
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            compositor: CompositorConfig::default(),
            width: 640,
            height: 360,
            seconds: 4,
            sample_rate: 48_000,
        }
    }
}

fn secs(s: i64) -> RationalTime {
    RationalTime::new(s, 1)
}

/// Three tracks: a darkening wash over the first two seconds, a zoomed and
/// later tinted background clip, and a 44.1 kHz music bed panned slightly left.
pub fn build_timeline(settings: &PreviewSettings) -> Result<Timeline> {
    let fps = FrameRate::FPS_24;
    let length = settings.seconds.max(2) as i64;
    let mut timeline = Timeline::new("preview", settings.width, settings.height, fps);

    let background = SyntheticMedia::video(
        "background",
        settings.width,
        settings.height,
        fps,
        length as u64 * 24,
    )
    .with_audio(
        AudioFormat::stereo_f32(48_000),
        length as u64 * 48_000,
        Signal::Sine {
            frequency: 220.0,
            amplitude: 0.3,
        },
    );
    let music = SyntheticMedia::audio(
        "music",
        AudioFormat::stereo_f32(44_100),
        length as u64 * 44_100,
        Signal::Sine {
            frequency: 440.0,
            amplitude: 0.5,
        },
    );

    let background_id = timeline.sources.open(&background)?;
    let music_id = timeline.sources.open(&music)?;

    let mut wash = Track::new("V2");
    wash.add_effect(
        MediaEffect::image("solid", TimeRange::new(secs(0), secs(2)), 0)
            .with_params(serde_json::json!({ "color": [0, 0, 0, 96] }))
            .with_transparent_backdrop(),
    );

    let mut main = Track::new("V1");
    main.insert_clip(MediaClip::new(
        "background",
        background_id,
        TimeRange::new(secs(0), secs(length)),
        secs(0),
    ))?;
    main.add_effect(MediaEffect::transform(
        TimeRange::new(secs(0), secs(length)),
        0,
        Transform2D::scale(1.1, 1.1),
    ));
    main.add_effect(
        MediaEffect::image("tint", TimeRange::new(secs(1), secs(length)), 1)
            .with_params(serde_json::json!({ "color": [255, 180, 120, 255], "amount": 0.2 })),
    );

    let mut bed = Track::new("A1").with_levels(AudioLevels::from_pan(0.8, -0.2));
    bed.insert_clip(MediaClip::new(
        "music",
        music_id,
        TimeRange::new(secs(0), secs(length)),
        secs(0),
    ))?;
    bed.add_effect(
        MediaEffect::audio("limiter", TimeRange::new(secs(0), secs(length)), 0)
            .with_params(serde_json::json!({ "threshold": 0.9 })),
    );

    timeline.push_track(wash);
    timeline.push_track(main);
    timeline.push_track(bed);
    timeline.validate()?;
    Ok(timeline)
}
