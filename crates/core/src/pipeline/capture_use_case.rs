use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use chrono::Utc;
use crossbeam_channel::Receiver;

use crate::capture::domain::capture_request::{
    capture_filename, CaptureRequest, CaptureResult, EncodedImage, Label, OperationMode,
};
use crate::capture::domain::frame_encoder::FrameEncoder;
use crate::capture::domain::prediction_client::PredictionClient;
use crate::detection::domain::detection::DetectionSet;
use crate::detection::domain::quality_gate::{GateDecision, QualityGate};
use crate::pipeline::observable::Observable;
use crate::pipeline::pipeline_error::{NotReadyCause, PipelineError};
use crate::pipeline::pipeline_logger::{with_logger, SharedLogger};
use crate::pipeline::user_notifier::{Notice, UserNotifier};
use crate::shared::frame::Frame;

pub type CaptureOutcome = Result<CaptureResult, PipelineError>;

/// Freezes the current frame, checks it against the quality gate and sends
/// it to the prediction API.
///
/// Only one capture may be outstanding at a time; the result of a successful
/// upload replaces the published [`CaptureResult`].
pub struct CaptureAndUploadUseCase {
    frames: Arc<Observable<Frame>>,
    detections: Arc<Observable<DetectionSet>>,
    results: Arc<Observable<CaptureResult>>,
    gate: QualityGate,
    encoder: Arc<dyn FrameEncoder>,
    client: Arc<dyn PredictionClient>,
    notifier: Arc<dyn UserNotifier>,
    in_flight: Arc<AtomicBool>,
    logger: SharedLogger,
}

/// Holds the single in-flight slot until dropped.
struct InFlight(Arc<AtomicBool>);

impl InFlight {
    fn claim(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A capture that passed every precondition and owns the in-flight slot.
struct Accepted {
    frame: Arc<Frame>,
    mode: OperationMode,
    label: Option<Label>,
    _slot: InFlight,
}

impl CaptureAndUploadUseCase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        frames: Arc<Observable<Frame>>,
        detections: Arc<Observable<DetectionSet>>,
        results: Arc<Observable<CaptureResult>>,
        gate: QualityGate,
        encoder: Arc<dyn FrameEncoder>,
        client: Arc<dyn PredictionClient>,
        notifier: Arc<dyn UserNotifier>,
        logger: SharedLogger,
    ) -> Self {
        Self {
            frames,
            detections,
            results,
            gate,
            encoder,
            client,
            notifier,
            in_flight: Arc::new(AtomicBool::new(false)),
            logger,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Captures and uploads on the calling thread.
    pub fn capture(&self, mode: OperationMode, label: Option<Label>) -> CaptureOutcome {
        let accepted = self.accept(mode, label)?;
        self.upload(accepted)
    }

    /// Checks preconditions on the calling thread, then uploads on a new
    /// thread. The outcome arrives on the returned channel.
    pub fn capture_in_background(
        self: &Arc<Self>,
        mode: OperationMode,
        label: Option<Label>,
    ) -> Result<Receiver<CaptureOutcome>, PipelineError> {
        let accepted = self.accept(mode, label)?;
        let (tx, rx) = crossbeam_channel::bounded(1);
        let this = Arc::clone(self);
        thread::spawn(move || {
            let _ = tx.send(this.upload(accepted));
        });
        Ok(rx)
    }

    fn accept(
        &self,
        mode: OperationMode,
        label: Option<Label>,
    ) -> Result<Accepted, PipelineError> {
        let frame = self
            .frames
            .latest()
            .filter(|f| !f.is_empty())
            .ok_or(PipelineError::NotReady(NotReadyCause::Frame))?;

        if mode.requires_label() && label.is_none() {
            self.notifier.notify(&Notice::MissingLabel);
            return Err(PipelineError::MissingLabel);
        }

        let current = self.detections.latest().unwrap_or_default();
        if let GateDecision::Rejected(reason) = self.gate.evaluate(&current) {
            let message = format!(
                "Capture rejected ({reason}): {} detection(s) at threshold {}",
                current.len(),
                self.gate.threshold()
            );
            with_logger(&self.logger, |l| l.info(&message));
            return Err(PipelineError::GateRejected { reason });
        }

        let slot = InFlight::claim(&self.in_flight).ok_or(PipelineError::CaptureInFlight)?;
        Ok(Accepted {
            frame,
            mode,
            label: if mode.requires_label() { label } else { None },
            _slot: slot,
        })
    }

    fn upload(&self, accepted: Accepted) -> CaptureOutcome {
        let t0 = Instant::now();
        let bytes = self.encoder.encode(&accepted.frame).map_err(|e| {
            log::error!("Failed to encode capture: {e}");
            PipelineError::from(e)
        })?;
        let encode_ms = t0.elapsed().as_secs_f64() * 1000.0;

        let image = EncodedImage {
            filename: capture_filename(Utc::now(), self.encoder.extension()),
            mime_type: self.encoder.mime_type(),
            bytes,
        };
        let request = CaptureRequest::new(accepted.mode, accepted.label, image)
            .ok_or(PipelineError::MissingLabel)?;

        log::info!(
            "Uploading {} ({} bytes) for {}",
            request.image().filename,
            request.image().bytes.len(),
            request.mode()
        );
        let t1 = Instant::now();
        let outcome = self.client.submit(&request);
        let upload_ms = t1.elapsed().as_secs_f64() * 1000.0;
        with_logger(&self.logger, |l| {
            l.timing("encode", encode_ms);
            l.timing("upload", upload_ms);
        });

        match outcome {
            Ok(result) => {
                self.results.publish(result.clone());
                let message = format!("{} succeeded with status {}", request.mode(), result.status);
                with_logger(&self.logger, |l| l.info(&message));
                Ok(result)
            }
            Err(e) => {
                log::error!("Capture upload failed: {e}");
                Err(e.into())
            }
        }
    }
}
