//! Render targets the pipeline draws into.
//!
//! A backend owns two same-sized targets. The primary holds the running
//! composite; the secondary is an isolated layer that gets folded back
//! into the primary when isolation ends.

use crate::effects::{blend_over, draw_transformed, ImageEffect};
use rayon::prelude::*;
use splice_core::{FrameBuffer, Transform2D};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Primary,
    Secondary,
}

pub trait RenderBackend: Send {
    /// Size both targets, fill the primary with `background` and clear the secondary.
    fn begin_frame(&mut self, width: u32, height: u32, background: [u8; 4]);

    fn clear(&mut self, target: Target, rgba: [u8; 4]);

    /// Copy one target over the other.
    fn copy(&mut self, from: Target, to: Target);

    /// Draw `frame` over `target`, stretched to the target size.
    fn draw_frame(&mut self, target: Target, frame: &FrameBuffer);

    fn apply_effect(&mut self, target: Target, effect: &ImageEffect);

    /// Draw `source` through `transform` over `target`.
    fn draw_transformed(&mut self, target: Target, source: &FrameBuffer, transform: &Transform2D);

    /// Draw the secondary over the primary, then clear the secondary.
    fn fold_secondary(&mut self);

    fn target(&self, target: Target) -> &FrameBuffer;

    /// Hand out the primary target as the finished frame.
    fn finish(&mut self) -> FrameBuffer;
}

/// Backend rendering on the CPU, row-parallel.
#[derive(Debug)]
pub struct CpuBackend {
    primary: FrameBuffer,
    secondary: FrameBuffer,
    /// Reused for frames that need resizing before drawing.
    scaled: FrameBuffer,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self {
            primary: FrameBuffer::new(0, 0),
            secondary: FrameBuffer::new(0, 0),
            scaled: FrameBuffer::new(0, 0),
        }
    }

    fn target_mut(&mut self, target: Target) -> &mut FrameBuffer {
        match target {
            Target::Primary => &mut self.primary,
            Target::Secondary => &mut self.secondary,
        }
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn draw_over(dst: &mut FrameBuffer, src: &FrameBuffer) {
    let stride = dst.stride();
    if stride == 0 {
        return;
    }
    dst.data_mut()
        .par_chunks_mut(stride)
        .zip(src.data().par_chunks(stride))
        .for_each(|(d, s)| {
            for (dp, sp) in d.chunks_exact_mut(4).zip(s.chunks_exact(4)) {
                blend_over(dp, sp);
            }
        });
}

impl RenderBackend for CpuBackend {
    fn begin_frame(&mut self, width: u32, height: u32, background: [u8; 4]) {
        let size_changed = self.primary.width != width || self.primary.height != height;
        if size_changed {
            self.primary = FrameBuffer::new(width, height);
            self.secondary = FrameBuffer::new(width, height);
        } else {
            self.secondary.fill([0; 4]);
        }
        self.primary.fill(background);
    }

    fn clear(&mut self, target: Target, rgba: [u8; 4]) {
        self.target_mut(target).fill(rgba);
    }

    fn copy(&mut self, from: Target, to: Target) {
        match (from, to) {
            (Target::Primary, Target::Secondary) => {
                self.secondary.data_mut().copy_from_slice(self.primary.data())
            }
            (Target::Secondary, Target::Primary) => {
                self.primary.data_mut().copy_from_slice(self.secondary.data())
            }
            _ => {}
        }
    }

    fn draw_frame(&mut self, target: Target, frame: &FrameBuffer) {
        let (width, height) = {
            let t = self.target_mut(target);
            (t.width, t.height)
        };
        if frame.width == width && frame.height == height {
            draw_over(self.target_mut(target), frame);
        } else {
            let scaled = std::mem::replace(&mut self.scaled, FrameBuffer::new(0, 0));
            let scaled = if scaled.width == width && scaled.height == height {
                resize_into(scaled, frame)
            } else {
                frame.resized(width, height)
            };
            draw_over(self.target_mut(target), &scaled);
            self.scaled = scaled;
        }
    }

    fn apply_effect(&mut self, target: Target, effect: &ImageEffect) {
        effect.apply(self.target_mut(target));
    }

    fn draw_transformed(&mut self, target: Target, source: &FrameBuffer, transform: &Transform2D) {
        draw_transformed(self.target_mut(target), source, transform);
    }

    fn fold_secondary(&mut self) {
        draw_over(&mut self.primary, &self.secondary);
        self.secondary.fill([0; 4]);
    }

    fn target(&self, target: Target) -> &FrameBuffer {
        match target {
            Target::Primary => &self.primary,
            Target::Secondary => &self.secondary,
        }
    }

    fn finish(&mut self) -> FrameBuffer {
        self.primary.clone()
    }
}

/// Nearest-neighbour resize of `src` into an existing buffer of the wanted size.
fn resize_into(mut dst: FrameBuffer, src: &FrameBuffer) -> FrameBuffer {
    let (w, h) = (dst.width as usize, dst.height as usize);
    if src.width == 0 || src.height == 0 {
        dst.fill([0; 4]);
        return dst;
    }
    let stride = dst.stride();
    dst.data_mut()
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row)| {
            let sy = (y * src.height as usize / h) as u32;
            let src_row = src.row(sy);
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                let sx = x * src.width as usize / w;
                px.copy_from_slice(&src_row[sx * 4..sx * 4 + 4]);
            }
        });
    dst
}
