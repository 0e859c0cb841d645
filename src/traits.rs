//! Core traits and types for the capture-to-decode pipeline.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::raster::RasterBuffer;
use crate::selector::Constraints;

/// Pixel format representation (e.g., YUYV, MJPG, RGB3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// Create a new `FourCC` from a 4-byte array.
    #[must_use]
    pub const fn new(code: &[u8; 4]) -> Self {
        Self(*code)
    }

    /// YUYV pixel format (4:2:2 packed).
    pub const YUYV: Self = Self::new(b"YUYV");
    /// MJPEG pixel format (Motion JPEG).
    pub const MJPG: Self = Self::new(b"MJPG");
    /// RGB3 pixel format (24-bit RGB).
    pub const RGB3: Self = Self::new(b"RGB3");
    /// GREY pixel format (8-bit luma only).
    pub const GREY: Self = Self::new(b"GREY");

    /// Bytes per pixel for uncompressed formats the pipeline can sample.
    ///
    /// Returns `None` for compressed or unknown formats.
    #[must_use]
    pub const fn bytes_per_pixel(self) -> Option<u32> {
        match &self.0 {
            b"YUYV" => Some(2),
            b"RGB3" => Some(3),
            b"GREY" => Some(1),
            _ => None,
        }
    }

    /// Whether frames in this format can be projected into a raster.
    #[must_use]
    pub const fn is_sampleable(self) -> bool {
        self.bytes_per_pixel().is_some()
    }
}

impl std::fmt::Display for FourCC {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl From<v4l::FourCC> for FourCC {
    fn from(fourcc: v4l::FourCC) -> Self {
        Self(fourcc.repr)
    }
}

impl From<FourCC> for v4l::FourCC {
    fn from(fourcc: FourCC) -> Self {
        Self::new(&fourcc.0)
    }
}

/// Video format specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Format {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel format.
    pub fourcc: FourCC,
    /// Bytes per line (stride).
    pub stride: u32,
    /// Total frame size in bytes.
    pub size: u32,
}

impl Format {
    /// Create a new format specification with a tightly packed stride.
    #[must_use]
    pub const fn new(width: u32, height: u32, fourcc: FourCC) -> Self {
        let bpp = match fourcc.bytes_per_pixel() {
            Some(bpp) => bpp,
            None => 0,
        };
        let stride = width * bpp;
        let size = stride * height;
        Self {
            width,
            height,
            fourcc,
            stride,
            size,
        }
    }
}

/// Metadata for a captured frame.
#[derive(Debug, Clone)]
pub struct FrameMetadata {
    /// Frame sequence number.
    pub sequence: u32,
    /// Capture timestamp.
    pub timestamp: Duration,
    /// Actual bytes used in the frame buffer.
    pub bytes_used: u32,
}

/// A captured video frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Raw frame data.
    pub data: Vec<u8>,
    /// Layout of `data`.
    pub format: Format,
    /// Frame metadata.
    pub metadata: FrameMetadata,
}

impl Frame {
    /// Frame width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.format.width
    }

    /// Frame height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.format.height
    }

    /// Whether the payload covers every row the format describes.
    ///
    /// A frame from a detached or not-yet-ready source fails this check.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        if self.format.width == 0 || self.format.height == 0 {
            return false;
        }
        let Some(bpp) = self.format.fourcc.bytes_per_pixel() else {
            return false;
        };
        let needed = u64::from(self.format.stride) * u64::from(self.format.height - 1)
            + u64::from(self.format.width) * u64::from(bpp);
        self.data.len() as u64 >= needed
    }

    /// Get the luminance of the pixel at the specified coordinates.
    ///
    /// Returns `None` if the coordinates are outside the payload or the
    /// format cannot be sampled.
    #[must_use]
    pub fn luma_at(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.format.width || y >= self.format.height {
            return None;
        }
        let row = (y as usize) * (self.format.stride as usize);

        match &self.format.fourcc.0 {
            // [Y0 U Y1 V]: every pixel carries its own Y byte
            b"YUYV" => self.data.get(row + (x as usize) * 2).copied(),
            b"GREY" => self.data.get(row + x as usize).copied(),
            b"RGB3" => {
                let offset = row + (x as usize) * 3;
                let r = *self.data.get(offset)?;
                let g = *self.data.get(offset + 1)?;
                let b = *self.data.get(offset + 2)?;
                Some(rgb_to_luma(r, g, b))
            }
            _ => None,
        }
    }
}

/// Convert RGB values to luma using the ITU-R BT.601 weights.
#[must_use]
fn rgb_to_luma(r: u8, g: u8, b: u8) -> u8 {
    let luma = 0.114f32.mul_add(
        f32::from(b),
        0.587f32.mul_add(f32::from(g), 0.299 * f32::from(r)),
    );

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    {
        luma.round().clamp(0.0, 255.0) as u8
    }
}

/// Kind of device reported by enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    /// A node that can capture video frames.
    VideoInput,
    /// Anything else (metadata nodes, output devices).
    Other,
}

/// One entry of a device enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Platform identifier used to open the device.
    pub id: String,
    /// Human readable label, matched against the facing preference.
    pub label: String,
    /// Device kind.
    pub kind: DeviceKind,
}

/// Which camera access API the platform exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Streams can be opened and devices enumerated.
    Modern,
    /// Streams can be opened but devices cannot be enumerated.
    Legacy,
    /// No camera access API at all.
    Unsupported,
}

/// Buffer mechanism binding a stream to its frame source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    /// Driver buffers mapped into the process.
    MemoryMapped,
    /// Buffers allocated by the process and handed to the driver.
    UserPointer,
    /// Frames are produced in-process (test doubles, synthetic sources).
    Synthetic,
}

/// Error type for capture and decode operations.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// No usable camera access API on this platform.
    #[error("no camera access API available on this platform")]
    UnsupportedPlatform,
    /// Permission refused or no device available.
    #[error("camera access denied: {0}")]
    AcquisitionDenied(String),
    /// A single tick failed to capture, paint or decode.
    #[error("transient capture failure: {0}")]
    Transient(String),
    /// Device listing failed.
    #[error("device enumeration failed: {0}")]
    Enumeration(String),
    /// Invalid or unreadable configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for capture operations.
pub type Result<T> = std::result::Result<T, CaptureError>;

/// Abstraction over a platform camera API.
///
/// A provider is selected once at startup; its [`ProviderKind`] decides
/// whether the selector may enumerate devices and whether acquisition is
/// attempted at all.
#[async_trait]
pub trait CaptureProvider: Send + Sync {
    /// Capability of this provider.
    fn kind(&self) -> ProviderKind;

    /// List capture devices.
    async fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>>;

    /// Request a live stream matching `constraints`.
    async fn open_stream(&self, constraints: &Constraints) -> Result<Box<dyn CaptureStream>>;
}

/// Abstraction over a live capture stream.
pub trait CaptureStream: Send {
    /// Mechanism the stream was attached with.
    fn attachment(&self) -> Attachment;

    /// Capture the current frame from the stream.
    fn next_frame(&mut self) -> Result<Frame>;

    /// Stop the hardware tracks backing this stream.
    fn stop(&mut self);
}

/// Opaque pattern decoder run against the raster once per tick.
pub trait DecodeOracle: Send {
    /// Decode the raster, returning `Ok(None)` when nothing was found.
    fn decode(&mut self, raster: &RasterBuffer) -> Result<Option<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(format: Format, data: Vec<u8>) -> Frame {
        Frame {
            data,
            format,
            metadata: FrameMetadata {
                sequence: 0,
                timestamp: Duration::ZERO,
                bytes_used: 0,
            },
        }
    }

    #[test]
    fn test_format_stride_follows_fourcc() {
        assert_eq!(Format::new(640, 480, FourCC::YUYV).stride, 1280);
        assert_eq!(Format::new(640, 480, FourCC::RGB3).stride, 1920);
        assert_eq!(Format::new(640, 480, FourCC::GREY).size, 640 * 480);
        assert_eq!(Format::new(640, 480, FourCC::MJPG).stride, 0);
    }

    #[test]
    fn test_yuyv_luma_uses_own_y_byte() {
        let format = Format::new(2, 1, FourCC::YUYV);
        let frame = frame(format, vec![10, 128, 200, 128]);
        assert_eq!(frame.luma_at(0, 0), Some(10));
        assert_eq!(frame.luma_at(1, 0), Some(200));
        assert_eq!(frame.luma_at(2, 0), None);
    }

    #[test]
    fn test_rgb_luma() {
        let format = Format::new(2, 1, FourCC::RGB3);
        let frame = frame(format, vec![255, 255, 255, 0, 0, 0]);
        assert_eq!(frame.luma_at(0, 0), Some(255));
        assert_eq!(frame.luma_at(1, 0), Some(0));
    }

    #[test]
    fn test_incomplete_frames() {
        let truncated = frame(Format::new(4, 4, FourCC::GREY), vec![0; 10]);
        assert!(!truncated.is_complete());

        let empty = frame(Format::new(0, 0, FourCC::GREY), Vec::new());
        assert!(!empty.is_complete());

        let compressed = frame(Format::new(4, 4, FourCC::MJPG), vec![0; 64]);
        assert!(!compressed.is_complete());

        let full = frame(Format::new(4, 4, FourCC::GREY), vec![0; 16]);
        assert!(full.is_complete());
    }

    #[test]
    fn test_error_display() {
        let err = CaptureError::AcquisitionDenied("permission denied".to_owned());
        assert_eq!(err.to_string(), "camera access denied: permission denied");
    }
}
