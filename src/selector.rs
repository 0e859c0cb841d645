//! Resolves a facing preference into a concrete device request.

use tracing::{debug, warn};

use crate::config::{CaptureConfig, Facing};
use crate::traits::{CaptureProvider, DeviceKind, ProviderKind};

/// A concrete device chosen by enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Platform identifier used to open the device.
    pub id: String,
    /// Facing the device was selected for.
    pub facing: Facing,
}

/// What the session should ask the platform for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceRequest {
    /// Open this exact device.
    Device(DeviceDescriptor),
    /// Let the platform pick a device for this facing.
    Facing(Facing),
}

/// Stream request handed to a [`CaptureProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraints {
    /// Device to open.
    pub request: DeviceRequest,
    /// Preferred frame width.
    pub ideal_width: u32,
    /// Preferred frame height.
    pub ideal_height: u32,
    /// Whether audio is requested. Always `false`.
    pub audio: bool,
}

impl Constraints {
    /// Merge a resolved request with the configured resolution hints.
    #[must_use]
    pub const fn new(request: DeviceRequest, config: &CaptureConfig) -> Self {
        Self {
            request,
            ideal_width: config.width,
            ideal_height: config.height,
            audio: false,
        }
    }
}

/// Resolve `facing` against the provider's devices.
///
/// Picks the first video input whose label contains the facing keyword.
/// Providers without enumeration, failed enumeration, and no match all
/// resolve to a facing-only request; this never fails.
pub async fn select_device<P>(provider: &P, facing: &Facing, debug_enabled: bool) -> DeviceRequest
where
    P: CaptureProvider + ?Sized,
{
    if provider.kind() != ProviderKind::Modern {
        return DeviceRequest::Facing(facing.clone());
    }

    let devices = match provider.enumerate_devices().await {
        Ok(devices) => devices,
        Err(err) => {
            if debug_enabled {
                warn!(error = %err, "device enumeration failed, using facing hint");
            }
            return DeviceRequest::Facing(facing.clone());
        }
    };

    let selected = devices
        .into_iter()
        .filter(|device| device.kind == DeviceKind::VideoInput)
        .find(|device| facing.matches_label(&device.label));

    match selected {
        Some(device) => {
            debug!(id = %device.id, label = %device.label, %facing, "selected capture device");
            DeviceRequest::Device(DeviceDescriptor {
                id: device.id,
                facing: facing.clone(),
            })
        }
        None => {
            debug!(%facing, "no device label matched, using facing hint");
            DeviceRequest::Facing(facing.clone())
        }
    }
}
