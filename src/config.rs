//! Scanner configuration.
//!
//! A [`CaptureConfig`] is handed to the scanner and only read at `start()`;
//! changing it mid-session requires a restart.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::traits::{CaptureError, Result};

/// Logical camera-selection hint, independent of concrete device identity.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Facing {
    /// User-facing camera.
    Front,
    /// Environment-facing camera.
    #[default]
    Back,
    /// Any other label fragment, matched verbatim.
    Other(String),
}

impl Facing {
    /// Keyword matched against device labels.
    #[must_use]
    pub fn keyword(&self) -> &str {
        match self {
            Self::Front => "front",
            Self::Back => "back",
            Self::Other(label) => label,
        }
    }

    /// Case-insensitive substring match against a device label.
    #[must_use]
    pub fn matches_label(&self, label: &str) -> bool {
        label
            .to_lowercase()
            .contains(&self.keyword().to_lowercase())
    }
}

impl From<String> for Facing {
    fn from(value: String) -> Self {
        match value.to_lowercase().as_str() {
            "front" | "user" => Self::Front,
            "back" | "environment" => Self::Back,
            _ => Self::Other(value),
        }
    }
}

impl From<Facing> for String {
    fn from(facing: Facing) -> Self {
        facing.keyword().to_owned()
    }
}

impl FromStr for Facing {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::from(s.to_owned()))
    }
}

impl std::fmt::Display for Facing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Per-session scanner configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Raster width in pixels, also the ideal capture width.
    pub width: u32,
    /// Raster height in pixels, also the ideal capture height.
    pub height: u32,
    /// Which camera to prefer.
    pub facing: Facing,
    /// Show the preview mirrored instead of flipping the raster.
    pub mirrored: bool,
    /// Sample only the centered square of each frame.
    pub square_crop: bool,
    /// Delay between ticks, in milliseconds.
    pub update_interval_ms: u64,
    /// Stop the pipeline after the first decoded value.
    pub stop_after_scan: bool,
    /// Log recoverable failures.
    pub debug: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            facing: Facing::Back,
            mirrored: false,
            square_crop: false,
            update_interval_ms: 500,
            stop_after_scan: false,
            debug: false,
        }
    }
}

impl CaptureConfig {
    /// Parse a configuration from TOML text. Missing keys take defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|err| CaptureError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|err| {
            CaptureError::Config(format!("failed to read {}: {err}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(CaptureError::Config(format!(
                "raster must be non-empty, got {}x{}",
                self.width, self.height
            )));
        }
        if self.update_interval_ms == 0 {
            return Err(CaptureError::Config(
                "update_interval_ms must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }

    /// Delay between ticks.
    #[must_use]
    pub const fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    /// Set the raster size.
    #[must_use]
    pub const fn with_raster(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the facing preference.
    #[must_use]
    pub fn with_facing(mut self, facing: Facing) -> Self {
        self.facing = facing;
        self
    }

    /// Set the mirrored flag.
    #[must_use]
    pub const fn with_mirrored(mut self, mirrored: bool) -> Self {
        self.mirrored = mirrored;
        self
    }

    /// Set the square-crop flag.
    #[must_use]
    pub const fn with_square_crop(mut self, square_crop: bool) -> Self {
        self.square_crop = square_crop;
        self
    }

    /// Set the tick interval.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn with_update_interval(mut self, interval: Duration) -> Self {
        self.update_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set the stop-after-first-result flag.
    #[must_use]
    pub const fn with_stop_after_scan(mut self, stop_after_scan: bool) -> Self {
        self.stop_after_scan = stop_after_scan;
        self
    }

    /// Set the debug flag.
    #[must_use]
    pub const fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}
