use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;

use crate::capture::domain::capture_request::{CaptureResult, Label, OperationMode};
use crate::capture::domain::frame_encoder::FrameEncoder;
use crate::capture::domain::prediction_client::PredictionClient;
use crate::detection::domain::detection::DetectionSet;
use crate::detection::domain::model_binding::{BindingConfig, BindingError, ModelBinding};
use crate::detection::domain::quality_gate::QualityGate;
use crate::detection::infrastructure::shared_binding::{BindingState, SharedBinding};
use crate::overlay::domain::overlay_renderer::OverlayRenderer;
use crate::pipeline::capture_use_case::{CaptureAndUploadUseCase, CaptureOutcome};
use crate::pipeline::detection_poller::{DetectionPoller, PollLoop, PollerConfig};
use crate::pipeline::observable::Observable;
use crate::pipeline::pipeline_error::{NotReadyCause, PipelineError};
use crate::pipeline::pipeline_logger::SharedLogger;
use crate::pipeline::user_notifier::{Notice, UserNotifier};
use crate::shared::frame::Frame;
use crate::video::domain::video_source::{SourceError, VideoSource};

/// Collaborators a session is built from.
pub struct SessionParts {
    pub binding: Box<dyn ModelBinding>,
    pub encoder: Arc<dyn FrameEncoder>,
    pub client: Arc<dyn PredictionClient>,
    pub notifier: Arc<dyn UserNotifier>,
    pub logger: SharedLogger,
    pub gate: QualityGate,
    pub poller: PollerConfig,
}

struct RunningCamera {
    cancelled: Arc<AtomicBool>,
    thread: JoinHandle<Box<dyn VideoSource>>,
}

/// One capture session: the model binding, the camera poll thread and the
/// capture pipeline, plus the state they publish (current frame, latest
/// detections, latest capture result).
pub struct LiveSession {
    binding: SharedBinding,
    frames: Arc<Observable<Frame>>,
    detections: Arc<Observable<DetectionSet>>,
    results: Arc<Observable<CaptureResult>>,
    poller: Arc<DetectionPoller>,
    capture: Arc<CaptureAndUploadUseCase>,
    notifier: Arc<dyn UserNotifier>,
    logger: SharedLogger,
    poller_config: PollerConfig,
    renderer: Option<Box<dyn OverlayRenderer>>,
    camera: Option<RunningCamera>,
    started: Instant,
}

impl LiveSession {
    pub fn new(parts: SessionParts) -> Self {
        let binding = SharedBinding::new(parts.binding);
        let frames = Arc::new(Observable::new());
        let detections = Arc::new(Observable::new());
        let results = Arc::new(Observable::new());

        let poller = Arc::new(DetectionPoller::new(
            binding.clone(),
            Arc::clone(&detections),
            Arc::clone(&parts.logger),
        ));
        let capture = Arc::new(CaptureAndUploadUseCase::new(
            Arc::clone(&frames),
            Arc::clone(&detections),
            Arc::clone(&results),
            parts.gate,
            parts.encoder,
            parts.client,
            Arc::clone(&parts.notifier),
            Arc::clone(&parts.logger),
        ));

        Self {
            binding,
            frames,
            detections,
            results,
            poller,
            capture,
            notifier: parts.notifier,
            logger: parts.logger,
            poller_config: parts.poller,
            renderer: None,
            camera: None,
            started: Instant::now(),
        }
    }

    pub fn model_state(&self) -> BindingState {
        self.binding.state()
    }

    pub fn load_model(&self, config: &BindingConfig) -> Result<(), BindingError> {
        self.binding.load(config)
    }

    pub fn load_model_in_background(&self, config: BindingConfig) -> JoinHandle<()> {
        self.binding.load_in_background(config)
    }

    pub fn wait_for_model(&self, timeout: Duration) -> BindingState {
        self.binding.wait_until_settled(timeout)
    }

    /// Overlay renderer for the next camera started with [`enable_camera`].
    ///
    /// [`enable_camera`]: LiveSession::enable_camera
    pub fn set_renderer(&mut self, renderer: Box<dyn OverlayRenderer>) {
        self.renderer = Some(renderer);
    }

    /// Opens `source` and starts polling it. Any camera already running is
    /// stopped first.
    ///
    /// Refused with a user notice while the model is not ready. A source that
    /// denies access yields [`PipelineError::PermissionDenied`].
    pub fn enable_camera(
        &mut self,
        mut source: Box<dyn VideoSource>,
    ) -> Result<(u32, u32), PipelineError> {
        if !self.binding.is_ready() {
            self.notifier.notify(&Notice::ModelLoading);
            return Err(PipelineError::NotReady(NotReadyCause::Model));
        }

        self.stop();

        let size = match source.open() {
            Ok(size) => size,
            Err(SourceError::PermissionDenied(detail)) => {
                log::warn!("Camera access denied: {detail}");
                self.notifier.notify(&Notice::PermissionDenied(detail.clone()));
                return Err(PipelineError::PermissionDenied(detail));
            }
            Err(e) => {
                log::warn!("Camera could not be opened: {e}");
                self.notifier.notify(&Notice::CameraUnavailable(e.to_string()));
                return Err(PipelineError::NotReady(NotReadyCause::Camera));
            }
        };
        log::info!("Camera opened at {}x{}", size.0, size.1);

        let cancelled = Arc::new(AtomicBool::new(false));
        let thread = PollLoop {
            poller: Arc::clone(&self.poller),
            frames: Arc::clone(&self.frames),
            renderer: self.renderer.take(),
            config: self.poller_config.clone(),
            clock: self.started,
        }
        .spawn(source, Arc::clone(&cancelled));

        self.camera = Some(RunningCamera { cancelled, thread });
        Ok(size)
    }

    pub fn is_camera_running(&self) -> bool {
        self.camera.is_some()
    }

    /// Stops polling and releases the camera. Returns the closed source, if
    /// one was running.
    pub fn stop(&mut self) -> Option<Box<dyn VideoSource>> {
        let camera = self.camera.take()?;
        camera.cancelled.store(true, Ordering::Relaxed);
        let source = match camera.thread.join() {
            Ok(source) => Some(source),
            Err(_) => {
                log::error!("Poll thread panicked");
                None
            }
        };
        self.frames.clear();
        self.detections.clear();
        log::info!("Camera stopped");
        source
    }

    pub fn capture(&self, mode: OperationMode, label: Option<Label>) -> CaptureOutcome {
        self.capture.capture(mode, label)
    }

    pub fn capture_in_background(
        &self,
        mode: OperationMode,
        label: Option<Label>,
    ) -> Result<Receiver<CaptureOutcome>, PipelineError> {
        self.capture.capture_in_background(mode, label)
    }

    pub fn frames(&self) -> &Arc<Observable<Frame>> {
        &self.frames
    }

    pub fn detections(&self) -> &Arc<Observable<DetectionSet>> {
        &self.detections
    }

    pub fn results(&self) -> &Arc<Observable<CaptureResult>> {
        &self.results
    }

    pub fn clear_result(&self) {
        self.results.clear();
    }

    /// Logs the session summary through the pipeline logger.
    pub fn summary(&self) {
        self.logger
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .summary();
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        self.stop();
    }
}
