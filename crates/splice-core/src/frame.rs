//! Decoded RGBA8 frames in CPU memory.
//!
//! Every decoded video frame, thumbnail and composited output is a
//! `FrameBuffer`. Caches hand frames out as [`SharedFrame`] so a frame
//! stays valid for its holder even after the cache evicts it.

use std::sync::Arc;

/// Bytes per RGBA8 pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// A tightly packed RGBA8 image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    pub width: u32,
    pub height: u32,
    data: Vec<u8>,
}

impl FrameBuffer {
    /// A transparent black frame.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; width as usize * height as usize * BYTES_PER_PIXEL],
        }
    }

    /// A frame filled with one RGBA color.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let mut frame = Self::new(width, height);
        frame.fill(rgba);
        frame
    }

    /// Wrap existing pixel data. Fails when the length does not match.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> crate::Result<Self> {
        let expected = width as usize * height as usize * BYTES_PER_PIXEL;
        if data.len() != expected {
            return Err(crate::SpliceError::InvalidParameter(format!(
                "RGBA data is {} bytes, expected {expected} for {width}x{height}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    /// Total payload size in bytes.
    #[inline]
    pub fn byte_size(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride();
        &self.data[start..start + self.stride()]
    }

    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let stride = self.stride();
        let start = y as usize * stride;
        &mut self.data[start..start + stride]
    }

    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    #[inline]
    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        let i = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        self.data[i..i + BYTES_PER_PIXEL].copy_from_slice(&rgba);
    }

    pub fn fill(&mut self, rgba: [u8; 4]) {
        for px in self.data.chunks_exact_mut(BYTES_PER_PIXEL) {
            px.copy_from_slice(&rgba);
        }
    }

    #[inline]
    pub fn same_size(&self, other: &FrameBuffer) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Nearest-neighbour resample to a new size.
    pub fn resized(&self, width: u32, height: u32) -> FrameBuffer {
        if width == self.width && height == self.height {
            return self.clone();
        }
        let mut out = FrameBuffer::new(width, height);
        if self.width == 0 || self.height == 0 {
            return out;
        }
        for y in 0..height {
            let sy = (y as u64 * self.height as u64 / height.max(1) as u64) as u32;
            let src_row = self.row(sy);
            let dst_row = out.row_mut(y);
            for x in 0..width as usize {
                let sx = x * self.width as usize / width.max(1) as usize;
                dst_row[x * BYTES_PER_PIXEL..(x + 1) * BYTES_PER_PIXEL].copy_from_slice(
                    &src_row[sx * BYTES_PER_PIXEL..(sx + 1) * BYTES_PER_PIXEL],
                );
            }
        }
        out
    }

    /// Deterministic pattern for frame `index`: eight vertical bars whose
    /// phase shifts with the index, with the index stamped into pixel (0, 0).
    pub fn test_pattern(width: u32, height: u32, index: u64) -> Self {
        const BARS: [[u8; 4]; 8] = [
            [255, 255, 255, 255],
            [255, 255, 0, 255],
            [0, 255, 255, 255],
            [0, 255, 0, 255],
            [255, 0, 255, 255],
            [255, 0, 0, 255],
            [0, 0, 255, 255],
            [0, 0, 0, 255],
        ];
        let mut frame = Self::new(width, height);
        for y in 0..height {
            let row = frame.row_mut(y);
            for x in 0..width {
                let bar = ((x as u64 * 8 / width.max(1) as u64 + index) % 8) as usize;
                let i = x as usize * BYTES_PER_PIXEL;
                row[i..i + BYTES_PER_PIXEL].copy_from_slice(&BARS[bar]);
            }
        }
        if width > 0 && height > 0 {
            let stamp = (index as u32).to_le_bytes();
            frame.set_pixel(0, 0, [stamp[0], stamp[1], stamp[2], 255]);
        }
        frame
    }

    /// Read back the index stamped by [`FrameBuffer::test_pattern`].
    pub fn pattern_index(&self) -> u32 {
        let px = self.pixel(0, 0);
        u32::from_le_bytes([px[0], px[1], px[2], 0])
    }
}

/// Arc-wrapped frame buffer for shared ownership.
pub type SharedFrame = Arc<FrameBuffer>;
