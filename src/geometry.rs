//! Frame geometry: where a source frame lands in the raster.

/// Orientation of a source frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Width is at least the height.
    Landscape,
    /// Taller than wide.
    Portrait,
}

impl Orientation {
    /// Classify a frame by its dimensions.
    #[must_use]
    pub const fn of(width: u32, height: u32) -> Self {
        if width >= height {
            Self::Landscape
        } else {
            Self::Portrait
        }
    }
}

/// Axis-aligned rectangle in pixel units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl Rect {
    /// Create a rectangle.
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle anchored at the origin.
    #[must_use]
    pub fn sized(width: u32, height: u32) -> Self {
        Self::new(0.0, 0.0, f64::from(width), f64::from(height))
    }
}

/// Source and destination rectangles for one paint, recomputed every tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameGeometry {
    /// Orientation of the source frame.
    pub orientation: Orientation,
    /// Region of the source frame that is sampled.
    pub source: Rect,
    /// Region of the raster that is painted.
    pub destination: Rect,
}

impl FrameGeometry {
    /// Compute the projection of a `source_width`x`source_height` frame into
    /// a `raster_width`x`raster_height` raster.
    ///
    /// Landscape frames stretch over the whole raster. Portrait frames land
    /// in a horizontally centered rectangle whose size follows
    /// `scaled = raster * s / (s * 2)` with `s = raster_width / raster_height`,
    /// which reduces to half the raster in each dimension.
    #[must_use]
    pub fn compute(
        source_width: u32,
        source_height: u32,
        raster_width: u32,
        raster_height: u32,
        square_crop: bool,
    ) -> Self {
        let orientation = Orientation::of(source_width, source_height);
        let source = if square_crop {
            centered_square(source_width, source_height)
        } else {
            Rect::sized(source_width, source_height)
        };

        let destination = match orientation {
            Orientation::Landscape => Rect::sized(raster_width, raster_height),
            Orientation::Portrait => {
                let raster_w = f64::from(raster_width);
                let raster_h = f64::from(raster_height);
                let scale = raster_w / raster_h;
                let scaled_height = raster_w * scale / (scale * 2.0);
                let scaled_width = raster_h * scale / (scale * 2.0);
                let margin_left = (raster_w - scaled_width) / 2.0;
                Rect::new(margin_left, 0.0, scaled_width, scaled_height)
            }
        };

        Self {
            orientation,
            source,
            destination,
        }
    }

    /// Portrait paints leave margins, so the raster is cleared first.
    #[must_use]
    pub const fn clears_raster(&self) -> bool {
        matches!(self.orientation, Orientation::Portrait)
    }
}

fn centered_square(width: u32, height: u32) -> Rect {
    let side = width.min(height);
    Rect::new(
        f64::from(width - side) / 2.0,
        f64::from(height - side) / 2.0,
        f64::from(side),
        f64::from(side),
    )
}
