//! Fixed-size luma surface frames are painted into before decoding.

use crate::geometry::Rect;
use crate::traits::Frame;

/// 8-bit luma raster with an optional persistent horizontal flip.
///
/// The flip is the raster's coordinate transform: once set, every paint is
/// mirrored around the vertical center line. Reads through [`luma`] and
/// [`pixels`] always see device space.
///
/// [`luma`]: RasterBuffer::luma
/// [`pixels`]: RasterBuffer::pixels
#[derive(Debug, Clone)]
pub struct RasterBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    flipped: bool,
}

impl RasterBuffer {
    /// Create a cleared raster.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize],
            flipped: false,
        }
    }

    /// Raster width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Raster height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Whether paints are horizontally flipped.
    #[must_use]
    pub const fn is_flipped(&self) -> bool {
        self.flipped
    }

    /// Set the persistent horizontal flip, the equivalent of `scale(-1, 1)`
    /// anchored at the right edge.
    pub fn set_horizontal_flip(&mut self, flipped: bool) {
        self.flipped = flipped;
    }

    /// Reset every pixel to zero.
    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    /// Row-major pixel data in device space.
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Pixel value in device space.
    #[must_use]
    pub fn luma(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Paint the `source` region of `frame` into the `destination` region
    /// using nearest-neighbour sampling. Destination pixels outside the
    /// raster are dropped.
    ///
    /// The caller is expected to have checked [`Frame::is_complete`];
    /// unreadable source pixels paint as zero.
    pub fn draw_frame(&mut self, frame: &Frame, source: Rect, destination: Rect) {
        if destination.width <= 0.0 || destination.height <= 0.0 {
            return;
        }

        let (x0, x1) = pixel_span(destination.x, destination.width, self.width);
        let (y0, y1) = pixel_span(destination.y, destination.height, self.height);
        let max_x = frame.width().saturating_sub(1);
        let max_y = frame.height().saturating_sub(1);

        for y in y0..y1 {
            let v = (f64::from(y) + 0.5 - destination.y) / destination.height;
            let sy = sample_coord(source.y + v * source.height, max_y);
            for x in x0..x1 {
                let u = (f64::from(x) + 0.5 - destination.x) / destination.width;
                let sx = sample_coord(source.x + u * source.width, max_x);
                let value = frame.luma_at(sx, sy).unwrap_or(0);
                self.put(x, y, value);
            }
        }
    }

    fn put(&mut self, x: u32, y: u32, value: u8) {
        let x = if self.flipped {
            self.width - 1 - x
        } else {
            x
        };
        let index = y as usize * self.width as usize + x as usize;
        if let Some(pixel) = self.pixels.get_mut(index) {
            *pixel = value;
        }
    }
}

/// Integer pixel range `[start, end)` covered by a span, clipped to `limit`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn pixel_span(start: f64, length: f64, limit: u32) -> (u32, u32) {
    let limit = f64::from(limit);
    let first = start.round().clamp(0.0, limit);
    let last = (start + length).round().clamp(0.0, limit);
    (first as u32, last as u32)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn sample_coord(position: f64, max: u32) -> u32 {
    (position.floor().max(0.0) as u32).min(max)
}
