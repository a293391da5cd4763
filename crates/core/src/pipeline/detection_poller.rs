use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::detection::domain::detection::DetectionSet;
use crate::detection::domain::model_binding::BindingError;
use crate::detection::infrastructure::shared_binding::SharedBinding;
use crate::overlay::domain::display_mapping::layout;
use crate::overlay::domain::overlay_renderer::OverlayRenderer;
use crate::pipeline::observable::Observable;
use crate::pipeline::pipeline_logger::{with_logger, SharedLogger};
use crate::shared::frame::Frame;
use crate::video::domain::video_source::VideoSource;

const DEFAULT_NOT_READY_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Clone, Debug, PartialEq)]
pub enum PollOutcome {
    Published(Arc<DetectionSet>),
    /// The binding has not finished loading.
    NotReady,
    /// A previous poll is still running.
    Skipped,
    /// The binding failed; the previous set stays published.
    Failed(String),
}

/// Runs the model binding against frames and republishes the latest
/// [`DetectionSet`].
///
/// At most one detection runs at a time. A `poll` that arrives while another
/// is in progress returns [`PollOutcome::Skipped`] instead of queueing.
pub struct DetectionPoller {
    binding: SharedBinding,
    detections: Arc<Observable<DetectionSet>>,
    busy: AtomicBool,
    ticks: AtomicUsize,
    logger: SharedLogger,
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl DetectionPoller {
    pub fn new(
        binding: SharedBinding,
        detections: Arc<Observable<DetectionSet>>,
        logger: SharedLogger,
    ) -> Self {
        Self {
            binding,
            detections,
            busy: AtomicBool::new(false),
            ticks: AtomicUsize::new(0),
            logger,
        }
    }

    pub fn detections(&self) -> &Arc<Observable<DetectionSet>> {
        &self.detections
    }

    pub fn poll(&self, frame: &Frame) -> PollOutcome {
        if !self.binding.is_ready() {
            return PollOutcome::NotReady;
        }
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return PollOutcome::Skipped;
        }
        let _busy = BusyGuard(&self.busy);

        let t0 = Instant::now();
        let result = self.binding.detect(frame, frame.timestamp());
        let detect_ms = t0.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(detections) => {
                let count = detections.len();
                let set = self.detections.publish(DetectionSet::new(
                    detections,
                    frame.timestamp(),
                    frame.width(),
                    frame.height(),
                ));
                let tick = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;
                with_logger(&self.logger, |l| {
                    l.timing("detect", detect_ms);
                    l.metric("faces", count as f64);
                    l.tick(tick);
                });
                PollOutcome::Published(set)
            }
            Err(BindingError::NotInitialized) => PollOutcome::NotReady,
            Err(e) => {
                log::warn!("Detection skipped for frame at {:?}: {e}", frame.timestamp());
                PollOutcome::Failed(e.to_string())
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct PollerConfig {
    /// Pause between ticks. `None` polls back-to-back.
    pub interval: Option<Duration>,
    /// Pause after a tick that could not run (model loading, source error).
    pub not_ready_backoff: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: None,
            not_ready_backoff: DEFAULT_NOT_READY_BACKOFF,
        }
    }
}

/// Everything the poll thread needs besides the source.
pub struct PollLoop {
    pub poller: Arc<DetectionPoller>,
    pub frames: Arc<Observable<Frame>>,
    pub renderer: Option<Box<dyn OverlayRenderer>>,
    pub config: PollerConfig,
    /// Origin of frame timestamps. Reuse it across restarts so timestamps
    /// seen by the binding never go backwards.
    pub clock: Instant,
}

impl PollLoop {
    /// Reads frames from an already opened `source` until `cancelled` is set,
    /// then closes the source and hands it back through the join handle.
    pub fn spawn(
        self,
        mut source: Box<dyn VideoSource>,
        cancelled: Arc<AtomicBool>,
    ) -> thread::JoinHandle<Box<dyn VideoSource>> {
        let PollLoop {
            poller,
            frames,
            mut renderer,
            config,
            clock,
        } = self;

        thread::spawn(move || {
            while !cancelled.load(Ordering::Relaxed) {
                let frame = match source.read_frame(clock.elapsed()) {
                    Ok(frame) => frames.publish(frame),
                    Err(e) => {
                        log::debug!("Frame read failed: {e}");
                        thread::sleep(config.not_ready_backoff);
                        continue;
                    }
                };

                let outcome = poller.poll(&frame);

                if let Some(renderer) = renderer.as_mut() {
                    render_overlay(&mut **renderer, &frame, poller.detections());
                }

                match outcome {
                    PollOutcome::NotReady => thread::sleep(config.not_ready_backoff),
                    _ => {
                        if let Some(interval) = config.interval {
                            thread::sleep(interval);
                        }
                    }
                }
            }
            source.close();
            source
        })
    }
}

fn render_overlay(
    renderer: &mut dyn OverlayRenderer,
    frame: &Frame,
    detections: &Observable<DetectionSet>,
) {
    let boxes = match detections.latest() {
        Some(set) => layout(&set, renderer.display_size()),
        None => Vec::new(),
    };
    if let Err(e) = renderer.render(frame, &boxes) {
        log::warn!("Overlay render failed: {e}");
    }
}
