//! QR decode oracle backed by `rqrr`.

use tracing::{debug, trace};

use crate::raster::RasterBuffer;
use crate::traits::{DecodeOracle, Result};

/// Decodes the first readable QR code in the raster.
#[derive(Debug, Clone, Copy, Default)]
pub struct QrOracle;

impl QrOracle {
    /// Create the oracle.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl DecodeOracle for QrOracle {
    fn decode(&mut self, raster: &RasterBuffer) -> Result<Option<String>> {
        let start = std::time::Instant::now();
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            raster.width() as usize,
            raster.height() as usize,
            |x, y| {
                #[allow(clippy::cast_possible_truncation)]
                raster.luma(x as u32, y as u32).unwrap_or(0)
            },
        );

        let grids = prepared.detect_grids();
        trace!(
            grids = grids.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "QR grid detection complete"
        );

        for grid in grids {
            match grid.decode() {
                Ok((_meta, content)) => {
                    debug!(len = content.len(), "decoded QR code");
                    return Ok(Some(content));
                }
                Err(err) => debug!(error = %err, "failed to decode QR grid"),
            }
        }

        Ok(None)
    }
}
