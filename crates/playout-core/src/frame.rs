//! Composited frames as they leave the mixer.
//!
//! A [`Frame`] is immutable once produced. The pixel storage is shared, so
//! handing the same frame to several outputs never copies the image.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::sync::Arc;

/// Pixel format of a composited frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit BGRA, the mixer's native output order
    #[default]
    Bgra8,
    /// 8-bit RGBA
    Rgba8,
    /// 8-bit single channel (key/alpha)
    Gray8,
}

impl PixelFormat {
    /// Bytes per pixel.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Bgra8 | Self::Rgba8 => 4,
            Self::Gray8 => 1,
        }
    }

    /// Tightly packed size of a frame of this format.
    pub fn frame_size(self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.bytes_per_pixel()
    }
}

/// A plane of pixel data with stride information.
#[derive(Debug, Clone)]
pub struct FramePlane {
    /// Raw pixel data
    pub data: Vec<u8>,
    /// Bytes per row (may include padding)
    pub stride: usize,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    bytes_per_pixel: usize,
}

impl FramePlane {
    /// Create a zeroed plane. Rows are padded to 64 bytes.
    pub fn new(width: u32, height: u32, bytes_per_pixel: usize) -> Self {
        let min_stride = (width as usize) * bytes_per_pixel;
        let stride = (min_stride + 63) & !63;
        Self {
            data: vec![0u8; stride * height as usize],
            stride,
            width,
            height,
            bytes_per_pixel,
        }
    }

    /// Get a row of pixel data, without padding.
    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.width as usize * self.bytes_per_pixel]
    }

    /// Get a mutable row of pixel data, without padding.
    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let start = y as usize * self.stride;
        let end = start + self.width as usize * self.bytes_per_pixel;
        &mut self.data[start..end]
    }

    /// Bytes per pixel of this plane.
    pub fn bytes_per_pixel(&self) -> usize {
        self.bytes_per_pixel
    }
}

/// A composited image in host memory.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub planes: SmallVec<[FramePlane; 1]>,
}

impl FrameBuffer {
    /// Create a zeroed frame buffer.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            format,
            width,
            height,
            planes: smallvec::smallvec![FramePlane::new(width, height, format.bytes_per_pixel())],
        }
    }

    /// Total memory usage of this frame in bytes.
    pub fn memory_size(&self) -> usize {
        self.planes.iter().map(|p| p.data.len()).sum()
    }

    #[inline]
    pub fn primary_plane(&self) -> &FramePlane {
        &self.planes[0]
    }

    #[inline]
    pub fn primary_plane_mut(&mut self) -> &mut FramePlane {
        &mut self.planes[0]
    }

    /// Copy the pixels into a tightly packed buffer (no row padding).
    pub fn to_packed(&self) -> Vec<u8> {
        let plane = self.primary_plane();
        let mut out = Vec::with_capacity(self.format.frame_size(self.width, self.height));
        for y in 0..self.height {
            out.extend_from_slice(plane.row(y));
        }
        out
    }

    /// Fill every pixel of a 4-byte format with `color`.
    pub fn fill(&mut self, color: [u8; 4]) {
        debug_assert_eq!(self.format.bytes_per_pixel(), 4);
        let height = self.height;
        let plane = self.primary_plane_mut();
        for y in 0..height {
            let pixels: &mut [[u8; 4]] = bytemuck::cast_slice_mut(plane.row_mut(y));
            pixels.fill(color);
        }
    }

    /// Color bars in BGRA order, shifted horizontally by `phase` pixels so
    /// consecutive frames are visually distinct.
    pub fn test_pattern(width: u32, height: u32, phase: u32) -> Self {
        const BARS: [[u8; 4]; 8] = [
            [255, 255, 255, 255], // White
            [0, 255, 255, 255],   // Yellow
            [255, 255, 0, 255],   // Cyan
            [0, 255, 0, 255],     // Green
            [255, 0, 255, 255],   // Magenta
            [0, 0, 255, 255],     // Red
            [255, 0, 0, 255],     // Blue
            [0, 0, 0, 255],       // Black
        ];

        let mut frame = Self::new(width, height, PixelFormat::Bgra8);
        if width == 0 {
            return frame;
        }
        let plane = frame.primary_plane_mut();
        for y in 0..height {
            let pixels: &mut [[u8; 4]] = bytemuck::cast_slice_mut(plane.row_mut(y));
            for (x, px) in pixels.iter_mut().enumerate() {
                let shifted = (x as u64 + phase as u64) % width as u64;
                *px = BARS[(shifted * 8 / width as u64) as usize];
            }
        }
        frame
    }
}

/// Arc-wrapped frame buffer for shared ownership.
pub type SharedFrameBuffer = Arc<FrameBuffer>;

/// One composited frame and its position in arrival order.
#[derive(Debug, Clone)]
pub struct Frame {
    number: u64,
    image: SharedFrameBuffer,
}

impl Frame {
    pub fn new(number: u64, image: impl Into<SharedFrameBuffer>) -> Self {
        Self {
            number,
            image: image.into(),
        }
    }

    /// Arrival sequence number, assigned by the producer.
    #[inline]
    pub fn number(&self) -> u64 {
        self.number
    }

    #[inline]
    pub fn image(&self) -> &FrameBuffer {
        &self.image
    }

    /// Shared handle to the pixels, for outputs that keep the frame around.
    pub fn shared_image(&self) -> SharedFrameBuffer {
        Arc::clone(&self.image)
    }
}
