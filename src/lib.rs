//! Cam-Scan: periodic camera capture feeding a pattern decoder.
//!
//! A [`Scanner`] acquires a camera through a [`CaptureProvider`], paints the
//! current frame into a fixed-size raster on every tick and hands the raster
//! to a [`DecodeOracle`]. Decoded values and lifecycle failures arrive as
//! [`ScanEvent`]s.

pub mod config;
pub mod device;
pub mod geometry;
pub mod oracle;
pub mod raster;
pub mod scheduler;
pub mod selector;
pub mod session;
pub mod traits;
pub mod transform;

#[cfg(test)]
pub mod mock;

pub use config::{CaptureConfig, Facing};
pub use device::V4L2Provider;
pub use geometry::{FrameGeometry, Orientation, Rect};
pub use oracle::QrOracle;
pub use raster::RasterBuffer;
pub use scheduler::{PipelineState, ScanEvent, Scanner};
pub use selector::{Constraints, DeviceDescriptor, DeviceRequest};
pub use session::CaptureSession;
pub use traits::{
    Attachment, CaptureError, CaptureProvider, CaptureStream, DecodeOracle, DeviceInfo,
    DeviceKind, Format, FourCC, Frame, FrameMetadata, ProviderKind,
};
pub use transform::FrameTransformer;
