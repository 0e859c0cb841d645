//! Projects captured frames into the decode raster.

use crate::geometry::FrameGeometry;
use crate::raster::RasterBuffer;
use crate::traits::{CaptureError, Frame, Result};

/// Writes a geometry-corrected projection of each frame into a raster.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameTransformer {
    square_crop: bool,
}

impl FrameTransformer {
    /// Create a transformer; `square_crop` samples the centered square of
    /// each frame instead of the whole frame.
    #[must_use]
    pub const fn new(square_crop: bool) -> Self {
        Self { square_crop }
    }

    /// Create the raster for a session.
    ///
    /// A non-mirrored view flips the raster's coordinate system once, here,
    /// so every later paint lands in corrected orientation. A mirrored view
    /// leaves the raster alone and mirrors only the preview.
    #[must_use]
    pub fn prepare_raster(width: u32, height: u32, mirrored: bool) -> RasterBuffer {
        let mut raster = RasterBuffer::new(width, height);
        raster.set_horizontal_flip(!mirrored);
        raster
    }

    /// Paint `frame` into `raster`.
    ///
    /// Fails with [`CaptureError::Transient`] when the frame cannot be
    /// sampled; the raster is left untouched in that case.
    pub fn project(&self, frame: &Frame, raster: &mut RasterBuffer) -> Result<FrameGeometry> {
        if !frame.format.fourcc.is_sampleable() {
            return Err(CaptureError::Transient(format!(
                "cannot sample {} frames",
                frame.format.fourcc
            )));
        }
        if !frame.is_complete() {
            return Err(CaptureError::Transient(format!(
                "video source not ready ({}x{}, {} bytes)",
                frame.width(),
                frame.height(),
                frame.data.len()
            )));
        }

        let geometry = FrameGeometry::compute(
            frame.width(),
            frame.height(),
            raster.width(),
            raster.height(),
            self.square_crop,
        );

        if geometry.clears_raster() {
            raster.clear();
        }
        raster.draw_frame(frame, geometry.source, geometry.destination);

        Ok(geometry)
    }
}
