//! Frame compositor: turns one timeline instant into one output frame.
//!
//! The work list is drawn in order onto the primary target of a
//! [`RenderBackend`]. Effects flagged for isolation draw into the secondary
//! target, which is folded back over the primary when the isolated run ends.
//! When the topmost item is a clip already at output size, its decoded frame
//! is returned as is.

use crate::backend::{CpuBackend, RenderBackend, Target};
use crate::effects::ImageEffect;
use crate::work_list::{build_work_list, FrameWorkItem};
use serde::{Deserialize, Serialize};
use splice_cache::VideoFrameCache;
use splice_core::{FrameBuffer, FrameRate, RationalTime, Result, SharedFrame, SpliceError};
use splice_timeline::{MediaClip, Timeline};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// When a lone top clip may be returned without compositing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FastPathMode {
    /// Source resolution equals the output resolution.
    #[default]
    Exact,
    /// Source resolution is at least the output resolution; larger frames are scaled down.
    AtLeast,
    Disabled,
}

/// Configuration for the compositor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorConfig {
    /// Fill of the primary target, and the frame returned when nothing is visible.
    pub background: [u8; 4],
    pub fast_path: FastPathMode,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            background: [0, 0, 0, 255],
            fast_path: FastPathMode::Exact,
        }
    }
}

pub struct CompositorPipeline<B: RenderBackend = CpuBackend> {
    cache: Arc<VideoFrameCache>,
    backend: B,
    config: CompositorConfig,
    /// Background frame of the last output size.
    background: Option<SharedFrame>,
    last_frame: Option<SharedFrame>,
    /// Copy of a target taken before a transform redraws it.
    snapshot: FrameBuffer,
}

impl CompositorPipeline<CpuBackend> {
    pub fn new(cache: Arc<VideoFrameCache>, config: CompositorConfig) -> Self {
        Self::with_backend(cache, config, CpuBackend::new())
    }
}

impl<B: RenderBackend> CompositorPipeline<B> {
    pub fn with_backend(cache: Arc<VideoFrameCache>, config: CompositorConfig, backend: B) -> Self {
        Self {
            cache,
            backend,
            config,
            background: None,
            last_frame: None,
            snapshot: FrameBuffer::new(0, 0),
        }
    }

    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: CompositorConfig) {
        if config.background != self.config.background {
            self.background = None;
        }
        self.config = config;
    }

    pub fn cache(&self) -> &Arc<VideoFrameCache> {
        &self.cache
    }

    /// The frame returned by the previous call to [`compose_frame`](Self::compose_frame).
    pub fn last_frame(&self) -> Option<&SharedFrame> {
        self.last_frame.as_ref()
    }

    /// Composite everything visible at `instant`.
    ///
    /// Never fails: a clip that cannot be decoded is left out and the rest
    /// of the frame is still drawn.
    pub fn compose_frame(&mut self, timeline: &Timeline, instant: RationalTime) -> SharedFrame {
        let mut work = build_work_list(timeline, instant);
        trace!(instant = %instant, items = work.len(), "compose frame");

        let frame = match self.try_fast_path(timeline, instant, &mut work) {
            Some(frame) => frame,
            None if work.is_empty() => self.background_frame(timeline.width, timeline.height),
            None => self.render(timeline, instant, &work),
        };
        self.last_frame = Some(Arc::clone(&frame));
        frame
    }

    /// Return the top clip's frame directly when nothing draws over it and
    /// it already fills the output. A top clip that fails to decode is
    /// dropped from `work`.
    fn try_fast_path(
        &mut self,
        timeline: &Timeline,
        instant: RationalTime,
        work: &mut Vec<FrameWorkItem>,
    ) -> Option<SharedFrame> {
        if self.config.fast_path == FastPathMode::Disabled {
            return None;
        }
        let &FrameWorkItem::Clip { track, clip } = work.last()? else {
            return None;
        };
        let clip = &timeline.tracks[track].clips[clip];
        let frame = match self.decode_clip(timeline, clip, instant) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(clip = %clip.id, error = %e, "Clip frame unavailable, skipped");
                work.pop();
                return None;
            }
        };

        let (w, h) = (timeline.width, timeline.height);
        let exact = frame.width == w && frame.height == h;
        let larger = frame.width >= w && frame.height >= h;
        match self.config.fast_path {
            FastPathMode::Exact if exact => Some(frame),
            FastPathMode::AtLeast if exact => Some(frame),
            FastPathMode::AtLeast if larger => {
                debug!(from_w = frame.width, from_h = frame.height, w, h, "fast path scaled");
                Some(Arc::new(frame.resized(w, h)))
            }
            _ => None,
        }
    }

    fn render(&mut self, timeline: &Timeline, instant: RationalTime, work: &[FrameWorkItem]) -> SharedFrame {
        self.backend
            .begin_frame(timeline.width, timeline.height, self.config.background);
        // Track and priority of the isolated run held in the secondary target.
        let mut isolated: Option<(usize, i32)> = None;

        for item in work {
            match *item {
                FrameWorkItem::Clip { track, clip } => {
                    if isolated.take().is_some() {
                        self.backend.fold_secondary();
                    }
                    let clip = &timeline.tracks[track].clips[clip];
                    match self.decode_clip(timeline, clip, instant) {
                        Ok(frame) => self.backend.draw_frame(Target::Primary, &frame),
                        Err(e) => {
                            warn!(clip = %clip.id, error = %e, "Clip frame unavailable, skipped");
                        }
                    }
                }
                FrameWorkItem::Effect {
                    track,
                    effect,
                    use_secondary,
                } => {
                    let effect = &timeline.tracks[track].effects[effect];
                    let Some(image) = ImageEffect::from_effect(effect) else {
                        continue;
                    };
                    let target = if use_secondary {
                        let layer = (track, effect.priority);
                        if isolated != Some(layer) {
                            if isolated.is_some() {
                                self.backend.fold_secondary();
                            }
                            if effect.transparent_backdrop {
                                self.backend.clear(Target::Secondary, [0; 4]);
                            } else {
                                self.backend.copy(Target::Primary, Target::Secondary);
                            }
                            isolated = Some(layer);
                        }
                        Target::Secondary
                    } else {
                        if isolated.take().is_some() {
                            self.backend.fold_secondary();
                        }
                        Target::Primary
                    };
                    self.apply(target, &image);
                }
            }
        }
        if isolated.is_some() {
            self.backend.fold_secondary();
        }
        Arc::new(self.backend.finish())
    }

    fn apply(&mut self, target: Target, image: &ImageEffect) {
        let ImageEffect::Transform(transform) = image else {
            self.backend.apply_effect(target, image);
            return;
        };
        // A transform redefines the canvas: clear it, then redraw the old
        // contents through the transform.
        let current = self.backend.target(target);
        if self.snapshot.same_size(current) {
            self.snapshot.data_mut().copy_from_slice(current.data());
        } else {
            self.snapshot = current.clone();
        }
        let clear = match target {
            Target::Primary => self.config.background,
            Target::Secondary => [0; 4],
        };
        self.backend.clear(target, clear);
        self.backend.draw_transformed(target, &self.snapshot, transform);
    }

    fn decode_clip(&self, timeline: &Timeline, clip: &MediaClip, instant: RationalTime) -> Result<SharedFrame> {
        let source = timeline
            .sources
            .get(clip.source)
            .ok_or_else(|| SpliceError::NotFound(format!("source {}", clip.source)))?;
        let video = source
            .video()
            .ok_or_else(|| SpliceError::NotFound(format!("{} has no video stream", clip.source)))?;
        let index = source_frame_index(clip, instant, timeline.frame_duration(), video.frame_rate);
        self.cache.get_or_decode_frame(source, index)
    }

    fn background_frame(&mut self, width: u32, height: u32) -> SharedFrame {
        match &self.background {
            Some(frame) if frame.width == width && frame.height == height => Arc::clone(frame),
            _ => {
                let frame = Arc::new(FrameBuffer::filled(width, height, self.config.background));
                self.background = Some(Arc::clone(&frame));
                frame
            }
        }
    }
}

/// Source frame shown by `clip` at timeline `instant`.
///
/// The source time is kept a quarter of an output frame inside the clip's
/// source range so rounding never lands on a frame outside it.
pub fn source_frame_index(
    clip: &MediaClip,
    instant: RationalTime,
    frame_duration: RationalTime,
    source_rate: FrameRate,
) -> i64 {
    let grace = frame_duration.scaled(1, 4);
    let lo = clip.source_range.start + grace;
    let hi = clip.source_range.end() - grace;
    clip.source_time_at(instant).clamp_to(lo, hi).to_frames(source_rate)
}
