//! Capture scheduler: the state machine that acquires a camera and runs the
//! capture, paint and decode cycle on a fixed interval.
//!
//! Each tick runs to completion under the pipeline lock before the next
//! sleep is armed, so ticks never overlap and the raster needs no further
//! synchronization. Results and lifecycle failures are delivered as
//! [`ScanEvent`]s on a channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::CaptureConfig;
use crate::raster::RasterBuffer;
use crate::selector::select_device;
use crate::session::CaptureSession;
use crate::transform::FrameTransformer;
use crate::traits::{CaptureError, CaptureProvider, DecodeOracle, ProviderKind, Result};

/// Lifecycle state of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Not started, or back at rest after a failed start.
    Idle,
    /// Waiting for device selection and acquisition.
    Acquiring,
    /// Connected and ticking.
    Streaming,
    /// Torn down by `stop()` or after a single-shot read.
    Stopped,
}

/// Event delivered to the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// The oracle decoded a value.
    Read(String),
    /// Acquisition failed: permission refused or no device.
    DeviceNotAllowed,
    /// The platform has no camera access API.
    UnsupportedPlatform,
}

struct Pipeline {
    state: PipelineState,
    session: CaptureSession,
    raster: RasterBuffer,
    transformer: FrameTransformer,
    oracle: Box<dyn DecodeOracle>,
}

impl Pipeline {
    /// Capture, paint and decode one frame. Every failure is transient.
    fn tick(&mut self) -> Result<Option<String>> {
        let stream = self
            .session
            .stream_mut()
            .ok_or_else(|| CaptureError::Transient("session disconnected".to_owned()))?;
        let frame = stream.next_frame().map_err(transient)?;
        self.transformer.project(&frame, &mut self.raster)?;
        self.oracle.decode(&self.raster).map_err(transient)
    }

    fn teardown(&mut self) {
        self.session.release();
        self.state = PipelineState::Stopped;
    }
}

fn transient(err: CaptureError) -> CaptureError {
    match err {
        CaptureError::Transient(_) => err,
        other => CaptureError::Transient(other.to_string()),
    }
}

#[derive(Debug, Clone, Copy)]
struct TickSettings {
    interval: Duration,
    stop_after_scan: bool,
    debug: bool,
}

/// Revocable handle to a running tick loop.
struct TickLoop {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl TickLoop {
    fn is_pending(&self) -> bool {
        !self.cancel.is_cancelled() && !self.task.is_finished()
    }
}

/// Drives a [`CaptureProvider`] and a [`DecodeOracle`] through the
/// `Idle → Acquiring → Streaming → Stopped` lifecycle.
pub struct Scanner<P> {
    provider: P,
    config: CaptureConfig,
    pipeline: Arc<Mutex<Pipeline>>,
    events: UnboundedSender<ScanEvent>,
    ticks: Option<TickLoop>,
}

impl<P: CaptureProvider> Scanner<P> {
    /// Create an idle scanner and the receiving end of its event channel.
    pub fn new<O>(provider: P, oracle: O, config: CaptureConfig) -> (Self, UnboundedReceiver<ScanEvent>)
    where
        O: DecodeOracle + 'static,
    {
        let (events, receiver) = mpsc::unbounded_channel();
        let pipeline = Pipeline {
            state: PipelineState::Idle,
            session: CaptureSession::new(),
            raster: FrameTransformer::prepare_raster(config.width, config.height, config.mirrored),
            transformer: FrameTransformer::new(config.square_crop),
            oracle: Box::new(oracle),
        };

        let scanner = Self {
            provider,
            config,
            pipeline: Arc::new(Mutex::new(pipeline)),
            events,
            ticks: None,
        };
        (scanner, receiver)
    }

    /// Configuration used by the next `start()`.
    pub const fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Replace the configuration. Takes effect at the next `start()`.
    ///
    /// An invalid configuration is rejected and the current one kept.
    pub fn reconfigure(&mut self, config: CaptureConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Whether the live preview should be shown mirrored.
    ///
    /// Mirrored views leave the raster unflipped; the preview carries the
    /// mirroring instead.
    pub const fn preview_mirrored(&self) -> bool {
        self.config.mirrored
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> PipelineState {
        self.pipeline.lock().await.state
    }

    /// Start scanning.
    ///
    /// An invalid configuration leaves the scanner `Idle` without touching
    /// the provider. Acquisition failures are reported as events, not errors. Calling
    /// `start()` while streaming with a pending tick does nothing; while
    /// streaming with no pending tick it re-arms the loop once.
    pub async fn start(&mut self) {
        let shared = Arc::clone(&self.pipeline);
        let mut pipeline = shared.lock().await;

        if pipeline.state == PipelineState::Streaming && pipeline.session.is_connected() {
            if self.ticks.as_ref().is_some_and(TickLoop::is_pending) {
                debug!("scanner already streaming");
                return;
            }
            drop(pipeline);
            self.arm();
            return;
        }

        if let Some(stale) = self.ticks.take() {
            stale.cancel.cancel();
        }
        pipeline.session.release();
        pipeline.state = PipelineState::Idle;

        if let Err(err) = self.config.validate() {
            warn!(error = %err, "refusing to start");
            return;
        }

        if self.provider.kind() == ProviderKind::Unsupported {
            warn!("no camera access API available");
            self.emit(ScanEvent::UnsupportedPlatform);
            return;
        }

        pipeline.raster = FrameTransformer::prepare_raster(
            self.config.width,
            self.config.height,
            self.config.mirrored,
        );
        pipeline.transformer = FrameTransformer::new(self.config.square_crop);
        pipeline.state = PipelineState::Acquiring;

        let request = select_device(&self.provider, &self.config.facing, self.config.debug).await;
        let acquired = pipeline
            .session
            .acquire(&self.provider, request, &self.config)
            .await;
        match acquired {
            Ok(()) => {
                pipeline.state = PipelineState::Streaming;
                drop(pipeline);
                info!(
                    interval_ms = self.config.update_interval_ms,
                    "scanner streaming"
                );
                self.arm();
            }
            Err(CaptureError::UnsupportedPlatform) => {
                pipeline.state = PipelineState::Idle;
                warn!("no camera access API available");
                self.emit(ScanEvent::UnsupportedPlatform);
            }
            Err(err) => {
                pipeline.state = PipelineState::Idle;
                warn!(error = %err, "camera acquisition failed");
                self.emit(ScanEvent::DeviceNotAllowed);
            }
        }
    }

    /// Stop scanning and release the camera. Safe to call in any state.
    ///
    /// A tick already running is allowed to finish; no tick starts after
    /// this returns.
    pub async fn stop(&mut self) {
        if let Some(ticks) = self.ticks.take() {
            ticks.cancel.cancel();
            if let Err(err) = ticks.task.await {
                warn!(error = %err, "tick loop ended abnormally");
            }
        }

        let mut pipeline = self.pipeline.lock().await;
        if pipeline.state != PipelineState::Stopped {
            debug!(state = ?pipeline.state, "stopping scanner");
        }
        pipeline.teardown();
    }

    fn arm(&mut self) {
        let cancel = CancellationToken::new();
        let settings = TickSettings {
            interval: self.config.update_interval(),
            stop_after_scan: self.config.stop_after_scan,
            debug: self.config.debug,
        };
        let task = tokio::spawn(run_ticks(
            Arc::clone(&self.pipeline),
            cancel.clone(),
            self.events.clone(),
            settings,
        ));
        self.ticks = Some(TickLoop { cancel, task });
    }

    fn emit(&self, event: ScanEvent) {
        if self.events.send(event).is_err() {
            trace!("event receiver dropped");
        }
    }
}

impl<P> Drop for Scanner<P> {
    fn drop(&mut self) {
        if let Some(ticks) = self.ticks.take() {
            ticks.cancel.cancel();
        }
    }
}

async fn run_ticks(
    pipeline: Arc<Mutex<Pipeline>>,
    cancel: CancellationToken,
    events: UnboundedSender<ScanEvent>,
    settings: TickSettings,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(settings.interval) => {}
        }

        let guard = Arc::clone(&pipeline).lock_owned().await;
        if cancel.is_cancelled() || !guard.session.is_connected() {
            break;
        }

        // frame reads block on the driver; keep them off the async workers
        let joined = tokio::task::spawn_blocking(move || {
            let mut guard = guard;
            let outcome = guard.tick();
            (guard, outcome)
        })
        .await;
        let (mut ticked, outcome) = match joined {
            Ok(ticked) => ticked,
            Err(err) => {
                warn!(error = %err, "tick panicked, scanner halted");
                break;
            }
        };

        match outcome {
            Ok(Some(text)) => {
                debug!(%text, "decoded value");
                if events.send(ScanEvent::Read(text)).is_err() {
                    trace!("event receiver dropped");
                }
                if settings.stop_after_scan {
                    cancel.cancel();
                    ticked.teardown();
                    info!("single scan complete, scanner stopped");
                    break;
                }
            }
            Ok(None) => trace!("nothing decoded"),
            Err(err) => {
                if settings.debug {
                    debug!(error = %err, "tick skipped");
                } else {
                    trace!(error = %err, "tick skipped");
                }
            }
        }
    }
}
