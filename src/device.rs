//! V4L2 capture provider using the v4l crate.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, trace, warn};
use v4l::buffer::{Metadata, Type};
use v4l::io::mmap::Stream as MmapStream;
use v4l::io::traits::{CaptureStream as V4lCaptureStream, Stream as V4lStream};
use v4l::io::userptr::Stream as UserptrStream;
use v4l::video::Capture;
use v4l::device::Handle;
use v4l::Device;

use crate::selector::{Constraints, DeviceRequest};
use crate::traits::{
    Attachment, CaptureError, CaptureProvider, CaptureStream, DeviceInfo, DeviceKind, Format,
    FourCC, Frame, FrameMetadata, ProviderKind, Result,
};

const SYSFS_VIDEO4LINUX: &str = "/sys/class/video4linux";
const DEFAULT_NODE: &str = "/dev/video0";
/// Longest wait for a filled buffer before a read gives up.
const FRAME_TIMEOUT: Duration = Duration::from_secs(2);

/// V4L2 provider.
///
/// Enumeration goes through sysfs; without it the provider can still open
/// the default node but cannot list devices.
#[derive(Debug, Clone)]
pub struct V4L2Provider {
    kind: ProviderKind,
    buffer_count: u32,
}

impl V4L2Provider {
    /// Probe the host once and pick the matching capability.
    #[must_use]
    pub fn detect() -> Self {
        let kind = if Path::new(SYSFS_VIDEO4LINUX).is_dir() {
            ProviderKind::Modern
        } else if Path::new(DEFAULT_NODE).exists() {
            ProviderKind::Legacy
        } else {
            ProviderKind::Unsupported
        };
        debug!(?kind, "probed V4L2 support");
        Self::with_kind(kind)
    }

    /// Provider with an explicit capability.
    #[must_use]
    pub const fn with_kind(kind: ProviderKind) -> Self {
        Self {
            kind,
            buffer_count: 4,
        }
    }

    /// Set the number of driver buffers per stream.
    ///
    /// Reads skip stale buffers, so extra buffers do not add latency.
    #[must_use]
    pub const fn with_buffer_count(mut self, buffer_count: u32) -> Self {
        self.buffer_count = buffer_count;
        self
    }
}

#[async_trait]
impl CaptureProvider for V4L2Provider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>> {
        if self.kind != ProviderKind::Modern {
            return Err(CaptureError::Enumeration(
                "device enumeration unavailable".to_owned(),
            ));
        }

        tokio::task::spawn_blocking(enumerate_nodes)
            .await
            .map_err(|err| CaptureError::Enumeration(err.to_string()))
    }

    async fn open_stream(&self, constraints: &Constraints) -> Result<Box<dyn CaptureStream>> {
        if self.kind == ProviderKind::Unsupported {
            return Err(CaptureError::UnsupportedPlatform);
        }

        let constraints = constraints.clone();
        let buffer_count = self.buffer_count;
        let stream = tokio::task::spawn_blocking(move || V4L2Stream::open(&constraints, buffer_count))
            .await
            .map_err(|err| CaptureError::AcquisitionDenied(err.to_string()))??;

        Ok(Box::new(stream))
    }
}

fn enumerate_nodes() -> Vec<DeviceInfo> {
    v4l::context::enum_devices()
        .into_iter()
        .map(|node| {
            let id = node.path().display().to_string();
            let kind = match Device::with_path(node.path()).and_then(|device| device.query_caps()) {
                Ok(caps) if caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) => {
                    DeviceKind::VideoInput
                }
                _ => DeviceKind::Other,
            };
            let label = node.name().unwrap_or_else(|| id.clone());
            DeviceInfo { id, label, kind }
        })
        .collect()
}

enum Buffers {
    Mmap(MmapStream<'static>),
    UserPtr(UserptrStream),
}

/// Live V4L2 capture stream.
pub struct V4L2Stream {
    buffers: Option<Buffers>,
    format: Format,
    buffer_count: u32,
    handle: Arc<Handle>,
    // streams hold their own handle; the device stays open for the session
    _device: Device,
}

impl V4L2Stream {
    /// Open the requested device, negotiate a sampleable format near the
    /// ideal size and start streaming.
    pub fn open(constraints: &Constraints, buffer_count: u32) -> Result<Self> {
        let path = match &constraints.request {
            DeviceRequest::Device(descriptor) => descriptor.id.clone(),
            DeviceRequest::Facing(_) => DEFAULT_NODE.to_owned(),
        };
        let device = Device::with_path(&path)
            .map_err(|err| CaptureError::AcquisitionDenied(format!("{path}: {err}")))?;

        let format = negotiate_format(&device, constraints)
            .map_err(|err| CaptureError::AcquisitionDenied(format!("{path}: {err}")))?;
        if !format.fourcc.is_sampleable() {
            return Err(CaptureError::AcquisitionDenied(format!(
                "{path}: device delivers {} frames, which cannot be sampled",
                format.fourcc
            )));
        }

        let buffers = attach(&device, buffer_count)
            .map_err(|err| CaptureError::AcquisitionDenied(format!("{path}: {err}")))?;

        debug!(
            %path,
            width = format.width,
            height = format.height,
            fourcc = %format.fourcc,
            "V4L2 stream open"
        );

        Ok(Self {
            buffers: Some(buffers),
            format,
            buffer_count,
            handle: device.handle(),
            _device: device,
        })
    }
}

fn negotiate_format(device: &Device, constraints: &Constraints) -> std::io::Result<Format> {
    let mut fmt = device.format()?;
    fmt.width = constraints.ideal_width;
    fmt.height = constraints.ideal_height;
    fmt.fourcc = FourCC::YUYV.into();

    let fmt = device.set_format(&fmt)?;

    Ok(Format {
        width: fmt.width,
        height: fmt.height,
        fourcc: FourCC::from(fmt.fourcc),
        stride: fmt.stride,
        size: fmt.size,
    })
}

/// Start streaming with memory-mapped buffers, falling back to user
/// pointers when the driver refuses them.
///
/// The first read queues every buffer and turns streaming on, so a stream
/// is only attached once it has delivered a frame.
fn attach(device: &Device, buffer_count: u32) -> std::io::Result<Buffers> {
    let mmap = MmapStream::with_buffers(device, Type::VideoCapture, buffer_count).and_then(
        |mut stream| {
            stream.set_timeout(FRAME_TIMEOUT);
            V4lCaptureStream::next(&mut stream)?;
            Ok(stream)
        },
    );

    match mmap {
        Ok(stream) => Ok(Buffers::Mmap(stream)),
        Err(err) => {
            debug!(error = %err, "memory-mapped buffers unavailable, trying user pointers");
            let mut stream = UserptrStream::with_buffers(device, Type::VideoCapture, buffer_count)?;
            stream.set_timeout(FRAME_TIMEOUT);
            V4lCaptureStream::next(&mut stream)?;
            Ok(Buffers::UserPtr(stream))
        }
    }
}

/// Discard every buffer the driver already filled, then wait for the next
/// frame.
///
/// Between ticks the driver fills all queued buffers and starts dropping
/// frames; the head of the queue can be several ticks old.
fn read_newest<S>(
    stream: &mut S,
    handle: &Handle,
    buffer_count: u32,
) -> std::io::Result<(Vec<u8>, FrameMetadata, u32)>
where
    S: for<'a> V4lCaptureStream<'a> + V4lStream<Item = [u8]>,
{
    let mut skipped = 0;
    while skipped < buffer_count && handle.poll(libc::POLLIN, 0)? > 0 {
        V4lCaptureStream::next(stream)?;
        skipped += 1;
    }

    let (buf, meta) = V4lCaptureStream::next(stream)?;
    Ok((used_bytes(buf, meta), frame_metadata(meta), skipped))
}

impl CaptureStream for V4L2Stream {
    fn attachment(&self) -> Attachment {
        match self.buffers {
            Some(Buffers::UserPtr(_)) => Attachment::UserPointer,
            _ => Attachment::MemoryMapped,
        }
    }

    fn next_frame(&mut self) -> Result<Frame> {
        let buffers = self
            .buffers
            .as_mut()
            .ok_or_else(|| CaptureError::Transient("stream stopped".to_owned()))?;

        let (data, metadata, skipped) = match buffers {
            Buffers::Mmap(stream) => read_newest(stream, &self.handle, self.buffer_count)?,
            Buffers::UserPtr(stream) => read_newest(stream, &self.handle, self.buffer_count)?,
        };
        if skipped > 0 {
            trace!(skipped, sequence = metadata.sequence, "dropped stale frames");
        }

        Ok(Frame {
            data,
            format: self.format.clone(),
            metadata,
        })
    }

    fn stop(&mut self) {
        let result = match self.buffers.take() {
            Some(Buffers::Mmap(mut stream)) => stream.stop(),
            Some(Buffers::UserPtr(mut stream)) => stream.stop(),
            None => return,
        };
        if let Err(err) = result {
            warn!(error = %err, "failed to stop V4L2 stream");
        }
    }
}

fn used_bytes(buf: &[u8], meta: &Metadata) -> Vec<u8> {
    buf.get(..meta.bytesused as usize).unwrap_or(buf).to_vec()
}

fn frame_metadata(meta: &Metadata) -> FrameMetadata {
    // Safe conversions: V4L2 timestamps are always non-negative in practice
    #[allow(clippy::cast_sign_loss)]
    let secs = meta.timestamp.sec.max(0) as u64;
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let nanos = (meta.timestamp.usec.max(0) as u32).saturating_mul(1000);

    FrameMetadata {
        sequence: meta.sequence,
        timestamp: Duration::new(secs, nanos),
        bytes_used: meta.bytesused,
    }
}
