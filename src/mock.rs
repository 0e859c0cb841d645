//! Mock provider, stream and oracle for testing without hardware.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::raster::RasterBuffer;
use crate::selector::Constraints;
use crate::traits::{
    Attachment, CaptureError, CaptureProvider, CaptureStream, DecodeOracle, DeviceInfo, Format,
    FourCC, Frame, FrameMetadata, ProviderKind, Result,
};

/// Call counters shared between a mock provider and its streams.
#[derive(Debug, Default)]
pub struct Probe {
    enumerations: AtomicUsize,
    opens: AtomicUsize,
    stops: AtomicUsize,
    frames: AtomicUsize,
    constraints: Mutex<Vec<Constraints>>,
}

impl Probe {
    /// Number of `enumerate_devices` calls.
    pub fn enumerations(&self) -> usize {
        self.enumerations.load(Ordering::SeqCst)
    }

    /// Number of `open_stream` calls.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Number of `stop` calls across all streams.
    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Number of `next_frame` calls across all streams.
    pub fn frames(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }

    /// Constraints of the most recent `open_stream` call.
    pub fn last_constraints(&self) -> Option<Constraints> {
        self.constraints
            .lock()
            .expect("constraints lock poisoned")
            .last()
            .cloned()
    }
}

/// Mock capture provider.
pub struct MockProvider {
    kind: ProviderKind,
    devices: Vec<DeviceInfo>,
    enumeration_fails: bool,
    denied: bool,
    format: Format,
    pattern: TestPattern,
    failing_frames: usize,
    probe: Arc<Probe>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    /// Create a modern provider with no devices and a 640x480 YUYV stream.
    #[must_use]
    pub fn new() -> Self {
        Self {
            kind: ProviderKind::Modern,
            devices: Vec::new(),
            enumeration_fails: false,
            denied: false,
            format: Format::new(640, 480, FourCC::YUYV),
            pattern: TestPattern::ColorBars,
            failing_frames: 0,
            probe: Arc::new(Probe::default()),
        }
    }

    /// Set the provider capability.
    #[must_use]
    pub const fn with_kind(mut self, kind: ProviderKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the devices returned by enumeration.
    #[must_use]
    pub fn with_devices(mut self, devices: Vec<DeviceInfo>) -> Self {
        self.devices = devices;
        self
    }

    /// Make enumeration fail.
    #[must_use]
    pub const fn with_enumeration_failure(mut self) -> Self {
        self.enumeration_fails = true;
        self
    }

    /// Make acquisition fail as if permission were refused.
    #[must_use]
    pub const fn with_denial(mut self) -> Self {
        self.denied = true;
        self
    }

    /// Set the format of opened streams.
    #[must_use]
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Set the test pattern of opened streams.
    #[must_use]
    pub const fn with_pattern(mut self, pattern: TestPattern) -> Self {
        self.pattern = pattern;
        self
    }

    /// Make the first `count` frames of each stream fail transiently.
    #[must_use]
    pub const fn with_failing_frames(mut self, count: usize) -> Self {
        self.failing_frames = count;
        self
    }

    /// Shared call counters.
    pub fn probe(&self) -> Arc<Probe> {
        Arc::clone(&self.probe)
    }
}

#[async_trait]
impl CaptureProvider for MockProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>> {
        self.probe.enumerations.fetch_add(1, Ordering::SeqCst);
        if self.enumeration_fails {
            return Err(CaptureError::Enumeration("mock enumeration failure".to_owned()));
        }
        Ok(self.devices.clone())
    }

    async fn open_stream(&self, constraints: &Constraints) -> Result<Box<dyn CaptureStream>> {
        self.probe.opens.fetch_add(1, Ordering::SeqCst);
        self.probe
            .constraints
            .lock()
            .expect("constraints lock poisoned")
            .push(constraints.clone());

        if self.kind == ProviderKind::Unsupported {
            return Err(CaptureError::UnsupportedPlatform);
        }
        if self.denied {
            return Err(CaptureError::AcquisitionDenied("permission denied".to_owned()));
        }

        Ok(Box::new(MockStream {
            format: self.format.clone(),
            pattern: self.pattern,
            frame_count: 0,
            failing_frames: self.failing_frames,
            stopped: false,
            probe: Arc::clone(&self.probe),
        }))
    }
}

/// Test pattern types for mock frame generation.
#[derive(Debug, Clone, Copy)]
pub enum TestPattern {
    /// SMPTE color bars pattern.
    ColorBars,
    /// Horizontal gradient from dark to light.
    Gradient,
}

/// Mock capture stream.
pub struct MockStream {
    format: Format,
    pattern: TestPattern,
    frame_count: u32,
    failing_frames: usize,
    stopped: bool,
    probe: Arc<Probe>,
}

impl CaptureStream for MockStream {
    fn attachment(&self) -> Attachment {
        Attachment::Synthetic
    }

    fn next_frame(&mut self) -> Result<Frame> {
        let calls = self.probe.frames.fetch_add(1, Ordering::SeqCst);
        if self.stopped {
            return Err(CaptureError::Transient("stream stopped".to_owned()));
        }
        if calls < self.failing_frames {
            return Err(CaptureError::Transient("video source not ready".to_owned()));
        }

        let seq = self.frame_count;
        self.frame_count += 1;

        Ok(Frame {
            data: generate_test_frame(&self.format, self.pattern),
            format: self.format.clone(),
            metadata: FrameMetadata {
                sequence: seq,
                timestamp: Duration::from_millis(u64::from(seq) * 33), // ~30fps
                bytes_used: self.format.size,
            },
        })
    }

    fn stop(&mut self) {
        self.stopped = true;
        self.probe.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Generate YUYV test frame data based on pattern.
fn generate_test_frame(format: &Format, pattern: TestPattern) -> Vec<u8> {
    let size = (format.width * format.height * 2) as usize; // YUYV = 2 bytes/pixel
    let mut data = vec![0u8; size];

    match pattern {
        TestPattern::ColorBars => {
            generate_color_bars(&mut data, format.width, format.height);
        }
        TestPattern::Gradient => {
            generate_gradient(&mut data, format.width, format.height);
        }
    }

    data
}

/// Generate YUYV color bars pattern.
fn generate_color_bars(data: &mut [u8], width: u32, height: u32) {
    // White, Yellow, Cyan, Green, Magenta, Red, Blue, Black
    let bars: [(u8, u8, u8); 8] = [
        (235, 128, 128),
        (210, 16, 146),
        (170, 166, 16),
        (145, 54, 34),
        (106, 202, 222),
        (81, 90, 240),
        (41, 240, 110),
        (16, 128, 128),
    ];

    let bar_width = (width / 8).max(1);

    for y in 0..height {
        for x in (0..width).step_by(2) {
            let bar_idx = (x / bar_width).min(7) as usize;
            let (y_val, u_val, v_val) = bars[bar_idx];

            let offset = ((y * width + x) * 2) as usize;
            if offset + 3 < data.len() {
                data[offset] = y_val;
                data[offset + 1] = u_val;
                data[offset + 2] = y_val;
                data[offset + 3] = v_val;
            }
        }
    }
}

/// Generate YUYV horizontal gradient pattern.
fn generate_gradient(data: &mut [u8], width: u32, height: u32) {
    for y in 0..height {
        for x in (0..width).step_by(2) {
            #[allow(clippy::cast_possible_truncation)]
            let y_val = ((x * 255) / width) as u8;
            let offset = ((y * width + x) * 2) as usize;

            if offset + 3 < data.len() {
                data[offset] = y_val;
                data[offset + 1] = 128;
                data[offset + 2] = y_val;
                data[offset + 3] = 128;
            }
        }
    }
}

/// Oracle replaying a fixed script of outcomes, then reporting not-found.
pub struct ScriptedOracle {
    script: VecDeque<Result<Option<String>>>,
    calls: Arc<AtomicUsize>,
    busy: Arc<AtomicBool>,
    overlaps: Arc<AtomicUsize>,
}

impl ScriptedOracle {
    /// Create an oracle from a script of outcomes.
    pub fn new(script: Vec<Result<Option<String>>>) -> Self {
        Self {
            script: script.into(),
            calls: Arc::new(AtomicUsize::new(0)),
            busy: Arc::new(AtomicBool::new(false)),
            overlaps: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Oracle that always decodes `text`.
    pub fn always(text: &str, times: usize) -> Self {
        Self::new((0..times).map(|_| Ok(Some(text.to_owned()))).collect())
    }

    /// Shared decode call counter.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    /// Shared counter of decodes that started while another was running.
    pub fn overlaps(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.overlaps)
    }
}

impl DecodeOracle for ScriptedOracle {
    fn decode(&mut self, _raster: &RasterBuffer) -> Result<Option<String>> {
        if self.busy.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self.script.pop_front().unwrap_or(Ok(None));
        self.busy.store(false, Ordering::SeqCst);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CaptureConfig, Facing};
    use crate::selector::DeviceRequest;

    fn constraints() -> Constraints {
        Constraints::new(
            DeviceRequest::Facing(Facing::Back),
            &CaptureConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_mock_stream_capture() {
        let provider = MockProvider::new();
        let mut stream = provider
            .open_stream(&constraints())
            .await
            .expect("open_stream should succeed");

        let frame1 = stream.next_frame().expect("next_frame should succeed");
        assert_eq!(frame1.metadata.sequence, 0);
        assert_eq!(frame1.data.len(), 640 * 480 * 2);

        let frame2 = stream.next_frame().expect("next_frame should succeed");
        assert_eq!(frame2.metadata.sequence, 1);
        assert_eq!(provider.probe().opens(), 1);
    }

    #[tokio::test]
    async fn test_stopped_stream_yields_no_frames() {
        let provider = MockProvider::new();
        let mut stream = provider
            .open_stream(&constraints())
            .await
            .expect("open_stream should succeed");

        stream.stop();
        assert!(matches!(
            stream.next_frame(),
            Err(CaptureError::Transient(_))
        ));
        assert_eq!(provider.probe().stops(), 1);
    }

    #[tokio::test]
    async fn test_denied_provider() {
        let provider = MockProvider::new().with_denial();
        let result = provider.open_stream(&constraints()).await;
        assert!(matches!(result, Err(CaptureError::AcquisitionDenied(_))));
    }

    #[test]
    fn test_color_bars_pattern() {
        let format = Format::new(640, 480, FourCC::YUYV);
        let data = generate_test_frame(&format, TestPattern::ColorBars);

        assert_eq!(data.len(), (640 * 480 * 2) as usize);
        // First bar should be white (Y=235)
        assert_eq!(data[0], 235);
    }

    #[test]
    fn test_gradient_pattern() {
        let format = Format::new(640, 480, FourCC::YUYV);
        let data = generate_test_frame(&format, TestPattern::Gradient);

        assert!(data[0] < 10);
        let last_row_start = (479 * 640 * 2) as usize;
        assert!(data[last_row_start + 638 * 2] > 200);
    }

    #[test]
    fn test_scripted_oracle_runs_out() {
        let mut oracle = ScriptedOracle::always("hello", 1);
        let raster = RasterBuffer::new(4, 4);

        assert_eq!(
            oracle.decode(&raster).expect("decode").as_deref(),
            Some("hello")
        );
        assert_eq!(oracle.decode(&raster).expect("decode"), None);
        assert_eq!(oracle.calls().load(Ordering::SeqCst), 2);
    }
}
