//! Built-in image effects.
//!
//! Pixel work runs row-parallel with rayon. Frames are straight-alpha RGBA8.

use glam::Vec2;
use rayon::prelude::*;
use splice_core::{FrameBuffer, Transform2D};
use splice_timeline::MediaEffect;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImageEffect {
    /// Blend RGB toward `color` by `amount` (0..1), scaled by the color's alpha.
    Tint { color: [u8; 4], amount: f32 },
    /// Multiply alpha.
    Opacity(f32),
    /// Paint a color over the whole frame.
    Solid([u8; 4]),
    Invert,
    /// Spatial transform of the whole canvas.
    Transform(Transform2D),
}

impl ImageEffect {
    /// The built-in effect for a timeline effect, `None` for unknown types.
    pub fn from_effect(effect: &MediaEffect) -> Option<Self> {
        if effect.spatial_transform {
            return Some(Self::Transform(effect.transform_params()));
        }
        match effect.effect_type.as_str() {
            "tint" => Some(Self::Tint {
                color: effect.param_rgba("color").unwrap_or([255, 255, 255, 255]),
                amount: effect.param_f32("amount").unwrap_or(0.5).clamp(0.0, 1.0),
            }),
            "opacity" => Some(Self::Opacity(
                effect.param_f32("opacity").unwrap_or(1.0).clamp(0.0, 1.0),
            )),
            "solid" => Some(Self::Solid(effect.param_rgba("color").unwrap_or([0, 0, 0, 255]))),
            "invert" => Some(Self::Invert),
            other => {
                warn!(effect_type = other, id = %effect.id, "Unknown image effect skipped");
                None
            }
        }
    }

    pub fn is_transform(&self) -> bool {
        matches!(self, Self::Transform(_))
    }

    /// Apply in place. Transforms need a separate source; see [`draw_transformed`].
    pub fn apply(&self, frame: &mut FrameBuffer) {
        let stride = frame.stride();
        if stride == 0 {
            return;
        }
        match *self {
            Self::Tint { color, amount } => {
                let k = amount * color[3] as f32 / 255.0;
                for_each_pixel(frame, stride, |px| {
                    for c in 0..3 {
                        let v = px[c] as f32;
                        px[c] = (v + (color[c] as f32 - v) * k).round() as u8;
                    }
                });
            }
            Self::Opacity(opacity) => for_each_pixel(frame, stride, |px| {
                px[3] = (px[3] as f32 * opacity).round() as u8;
            }),
            Self::Solid(color) => for_each_pixel(frame, stride, |px| blend_over(px, &color)),
            Self::Invert => for_each_pixel(frame, stride, |px| {
                for v in &mut px[..3] {
                    *v = 255 - *v;
                }
            }),
            Self::Transform(_) => {}
        }
    }
}

fn for_each_pixel(frame: &mut FrameBuffer, stride: usize, op: impl Fn(&mut [u8]) + Sync) {
    frame.data_mut().par_chunks_mut(stride).for_each(|row| {
        for px in row.chunks_exact_mut(4) {
            op(px);
        }
    });
}

/// Straight-alpha "over": `src` drawn on top of `dst`.
#[inline]
pub(crate) fn blend_over(dst: &mut [u8], src: &[u8]) {
    match src[3] {
        255 => dst[..4].copy_from_slice(&src[..4]),
        0 => {}
        a => {
            let sa = a as f32 / 255.0;
            let da = dst[3] as f32 / 255.0;
            let out_a = sa + da * (1.0 - sa);
            for c in 0..3 {
                let s = src[c] as f32 * sa;
                let d = dst[c] as f32 * da * (1.0 - sa);
                dst[c] = ((s + d) / out_a).round().min(255.0) as u8;
            }
            dst[3] = (out_a * 255.0).round() as u8;
        }
    }
}

/// Draw `source` through `transform` over `target`, sampling nearest
/// neighbour. Canvas pixels that map outside the source are left alone.
pub fn draw_transformed(target: &mut FrameBuffer, source: &FrameBuffer, transform: &Transform2D) {
    let Some(inverse) = transform.inverse_affine(target.width, target.height) else {
        return;
    };
    let stride = target.stride();
    if stride == 0 || source.width == 0 || source.height == 0 {
        return;
    }
    // Source is stretched to the canvas before the transform applies.
    let sx = source.width as f32 / target.width as f32;
    let sy = source.height as f32 / target.height as f32;
    target
        .data_mut()
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                let p = inverse.transform_point2(Vec2::new(x as f32 + 0.5, y as f32 + 0.5));
                if p.x < 0.0 || p.y < 0.0 {
                    continue;
                }
                let (u, v) = ((p.x * sx) as u32, (p.y * sy) as u32);
                if u >= source.width || v >= source.height {
                    continue;
                }
                blend_over(px, &source.pixel(u, v));
            }
        });
}
