//! Capture session: owns the live stream between acquisition and release.

use tracing::{debug, info};

use crate::config::CaptureConfig;
use crate::selector::{Constraints, DeviceRequest};
use crate::traits::{CaptureError, CaptureProvider, CaptureStream, ProviderKind, Result};

/// Holder of at most one live capture stream.
///
/// Only the session stops hardware tracks. [`release`] runs on every
/// teardown path, including drop.
///
/// [`release`]: CaptureSession::release
#[derive(Default)]
pub struct CaptureSession {
    stream: Option<Box<dyn CaptureStream>>,
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl CaptureSession {
    /// Create a session with no stream.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire a stream for `request`, releasing any stream held before.
    ///
    /// Provider failures surface as [`CaptureError::AcquisitionDenied`]; an
    /// unsupported provider short-circuits with
    /// [`CaptureError::UnsupportedPlatform`] without issuing a request.
    pub async fn acquire<P>(
        &mut self,
        provider: &P,
        request: DeviceRequest,
        config: &CaptureConfig,
    ) -> Result<()>
    where
        P: CaptureProvider + ?Sized,
    {
        self.release();

        if provider.kind() == ProviderKind::Unsupported {
            return Err(CaptureError::UnsupportedPlatform);
        }

        let constraints = Constraints::new(request, config);
        let stream = provider
            .open_stream(&constraints)
            .await
            .map_err(|err| match err {
                CaptureError::UnsupportedPlatform => CaptureError::UnsupportedPlatform,
                CaptureError::AcquisitionDenied(reason) => CaptureError::AcquisitionDenied(reason),
                other => CaptureError::AcquisitionDenied(other.to_string()),
            })?;

        info!(
            attachment = ?stream.attachment(),
            width = constraints.ideal_width,
            height = constraints.ideal_height,
            "capture stream attached"
        );
        self.stream = Some(stream);
        Ok(())
    }

    /// Whether a stream is held.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// The live stream, if connected.
    pub fn stream_mut(&mut self) -> Option<&mut (dyn CaptureStream + 'static)> {
        self.stream.as_deref_mut()
    }

    /// Stop every hardware track and drop the stream. No-op when idle.
    pub fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            debug!("capture stream released");
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.release();
    }
}
