use std::sync::Arc;

use crate::foundation::core::Rgba8Premul;
use crate::foundation::error::{PackError, PackResult};

/// A rendered image as premultiplied RGBA8 pixels.
///
/// Pixel storage is shared; cloning is cheap and never copies pixels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RasterImage {
    width: u32,
    height: u32,
    pixels: Arc<Vec<u8>>,
}

impl RasterImage {
    /// Wrap tightly packed, row-major premultiplied RGBA8 bytes.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> PackResult<Self> {
        let expected = byte_len(width, height)?;
        if pixels.len() != expected {
            return Err(PackError::render(format!(
                "image buffer is {} bytes, expected {expected} for {width}x{height}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels: Arc::new(pixels),
        })
    }

    /// Image filled with one color.
    pub fn solid(width: u32, height: u32, color: Rgba8Premul) -> PackResult<Self> {
        let px = (width as usize).saturating_mul(height as usize);
        Self::new(width, height, color.to_array().repeat(px))
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw premultiplied RGBA8 bytes.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub(crate) fn shared_pixels(&self) -> &Arc<Vec<u8>> {
        &self.pixels
    }

    pub(crate) fn from_shared(width: u32, height: u32, pixels: Arc<Vec<u8>>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Pixel at `(x, y)`. Panics when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Rgba8Premul {
        assert!(x < self.width && y < self.height, "pixel ({x},{y}) out of bounds");
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        let p = &self.pixels[i..i + 4];
        Rgba8Premul {
            r: p[0],
            g: p[1],
            b: p[2],
            a: p[3],
        }
    }

    /// Every pixel has alpha 255.
    pub fn is_fully_opaque(&self) -> bool {
        self.pixels.chunks_exact(4).all(|px| px[3] == 255)
    }

    /// Same width and height.
    pub fn same_size(&self, other: &RasterImage) -> bool {
        self.width == other.width && self.height == other.height
    }
}

/// Encoded PNG file contents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PngBytes(pub(crate) Arc<Vec<u8>>);

impl PngBytes {
    /// Encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Encoded length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` when there are no bytes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub(crate) fn byte_len(width: u32, height: u32) -> PackResult<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| PackError::render(format!("image size overflow: {width}x{height}")))
}
