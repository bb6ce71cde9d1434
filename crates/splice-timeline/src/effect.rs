//! Effects placed on a track.
//!
//! Effect bodies live in the compositor and mixer; the timeline only knows
//! where an effect applies, how it stacks and its parameter blob.

use serde::{Deserialize, Serialize};
use splice_core::{RationalTime, TimeRange, Transform2D};
use uuid::Uuid;

/// What an effect processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectKind {
    Image,
    Audio,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaEffect {
    pub id: Uuid,
    pub kind: EffectKind,
    /// Registered effect name, e.g. `"tint"` or `"gain"`.
    pub effect_type: String,
    /// Timeline range the effect applies to
    pub range: TimeRange,
    /// Layer within the track; higher renders later, on top.
    pub priority: i32,
    pub enabled: bool,
    /// Opaque parameters interpreted by the effect body.
    pub params: serde_json::Value,
    /// Renders onto a cleared backdrop instead of the running composite.
    pub transparent_backdrop: bool,
    /// Redefines the visible canvas; the running composite is cleared first.
    pub spatial_transform: bool,
}

impl MediaEffect {
    fn new(kind: EffectKind, effect_type: &str, range: TimeRange, priority: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            effect_type: effect_type.to_string(),
            range,
            priority,
            enabled: true,
            params: serde_json::Value::Null,
            transparent_backdrop: false,
            spatial_transform: false,
        }
    }

    pub fn image(effect_type: &str, range: TimeRange, priority: i32) -> Self {
        Self::new(EffectKind::Image, effect_type, range, priority)
    }

    pub fn audio(effect_type: &str, range: TimeRange, priority: i32) -> Self {
        Self::new(EffectKind::Audio, effect_type, range, priority)
    }

    /// A spatial-transform image effect.
    pub fn transform(range: TimeRange, priority: i32, transform: Transform2D) -> Self {
        let mut effect = Self::image("transform", range, priority);
        effect.params = serde_json::to_value(transform).unwrap_or(serde_json::Value::Null);
        effect.spatial_transform = true;
        effect
    }

    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }

    pub fn with_transparent_backdrop(mut self) -> Self {
        self.transparent_backdrop = true;
        self
    }

    #[inline]
    pub fn is_image(&self) -> bool {
        self.kind == EffectKind::Image
    }

    #[inline]
    pub fn is_audio(&self) -> bool {
        self.kind == EffectKind::Audio
    }

    /// Enabled and covering `instant`.
    #[inline]
    pub fn is_active_at(&self, instant: RationalTime) -> bool {
        self.enabled && self.range.contains(instant)
    }

    /// Enabled and overlapping `range`.
    #[inline]
    pub fn is_active_in(&self, range: TimeRange) -> bool {
        self.enabled && self.range.overlaps(range)
    }

    /// Numeric parameter `name`, if present.
    pub fn param_f32(&self, name: &str) -> Option<f32> {
        self.params.get(name)?.as_f64().map(|v| v as f32)
    }

    /// `[r, g, b, a]` parameter `name` with components in 0..=255.
    pub fn param_rgba(&self, name: &str) -> Option<[u8; 4]> {
        let values = self.params.get(name)?.as_array()?;
        let mut rgba = [0u8, 0, 0, 255];
        for (slot, value) in rgba.iter_mut().zip(values) {
            *slot = value.as_u64()?.min(255) as u8;
        }
        Some(rgba)
    }

    /// The transform carried by a spatial-transform effect.
    pub fn transform_params(&self) -> Transform2D {
        serde_json::from_value(self.params.clone()).unwrap_or_default()
    }
}
