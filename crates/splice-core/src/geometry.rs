//! 2D transforms used by spatial-transform effects.

use glam::Affine2;
use serde::{Deserialize, Serialize};

/// 2D vector.
pub type Vec2 = glam::Vec2;

/// Translation, rotation (radians) and scale, applied about the canvas center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transform2D {
    pub translation: [f32; 2],
    pub rotation: f32,
    pub scale: [f32; 2],
}

impl Transform2D {
    pub const IDENTITY: Self = Self {
        translation: [0.0, 0.0],
        rotation: 0.0,
        scale: [1.0, 1.0],
    };

    #[inline]
    pub fn translate(x: f32, y: f32) -> Self {
        Self {
            translation: [x, y],
            ..Self::IDENTITY
        }
    }

    #[inline]
    pub fn scale(x: f32, y: f32) -> Self {
        Self {
            scale: [x, y],
            ..Self::IDENTITY
        }
    }

    #[inline]
    pub fn rotate(angle: f32) -> Self {
        Self {
            rotation: angle,
            ..Self::IDENTITY
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Affine matrix mapping source pixels to canvas pixels for a
    /// `width` x `height` canvas, pivoting on its center.
    pub fn to_affine(&self, width: u32, height: u32) -> Affine2 {
        let center = Vec2::new(width as f32 * 0.5, height as f32 * 0.5);
        Affine2::from_translation(center + Vec2::from(self.translation))
            * Affine2::from_scale_angle_translation(
                Vec2::from(self.scale),
                self.rotation,
                Vec2::ZERO,
            )
            * Affine2::from_translation(-center)
    }

    /// Inverse mapping (canvas pixel back to source pixel), or `None` when
    /// the transform collapses the image (zero scale).
    pub fn inverse_affine(&self, width: u32, height: u32) -> Option<Affine2> {
        if self.scale[0] == 0.0 || self.scale[1] == 0.0 {
            return None;
        }
        Some(self.to_affine(width, height).inverse())
    }

    #[inline]
    pub fn transform_point(&self, point: Vec2, width: u32, height: u32) -> Vec2 {
        self.to_affine(width, height).transform_point2(point)
    }
}

impl Default for Transform2D {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_translate() {
        let t = Transform2D::translate(10.0, 20.0);
        let p = t.transform_point(Vec2::new(5.0, 5.0), 100, 100);
        assert!((p.x - 15.0).abs() < 0.001);
        assert!((p.y - 25.0).abs() < 0.001);
    }

    #[test]
    fn test_scale_pivots_on_center() {
        let t = Transform2D::scale(2.0, 2.0);
        let center = t.transform_point(Vec2::new(50.0, 50.0), 100, 100);
        assert!((center - Vec2::new(50.0, 50.0)).length() < 0.001);
        let corner = t.transform_point(Vec2::new(0.0, 0.0), 100, 100);
        assert!((corner - Vec2::new(-50.0, -50.0)).length() < 0.001);
    }

    #[test]
    fn test_zero_scale_has_no_inverse() {
        assert!(Transform2D::scale(0.0, 1.0).inverse_affine(10, 10).is_none());
        assert!(Transform2D::IDENTITY.inverse_affine(10, 10).is_some());
    }
}
