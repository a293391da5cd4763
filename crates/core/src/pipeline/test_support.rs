use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::capture::domain::capture_request::{CaptureRequest, CaptureResult};
use crate::capture::domain::frame_encoder::{EncodeError, FrameEncoder};
use crate::capture::domain::prediction_client::{PredictionClient, UploadError};
use crate::detection::domain::detection::{BoundingBox, Detection};
use crate::detection::domain::model_binding::{BindingConfig, BindingError, ModelBinding};
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::user_notifier::{Notice, UserNotifier};
use crate::shared::frame::Frame;
use crate::video::domain::video_source::{SourceError, VideoSource};

pub fn face(x: f64, confidence: f64) -> Detection {
    Detection::new(BoundingBox::new(x, 10.0, 40.0, 40.0), confidence)
}

pub fn frame_at(ms: u64) -> Frame {
    Frame::new(vec![128u8; 8 * 6 * 3], 8, 6, 3, Duration::from_millis(ms))
}

pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    condition()
}

/// Lets a test hold a binding inside `detect` until released.
#[derive(Default)]
pub struct Hold {
    pub entered: AtomicBool,
    pub released: AtomicBool,
}

/// Binding whose `detect` replays scripted results, then repeats `fallback`.
pub struct ScriptedBinding {
    ready: bool,
    fail_init: bool,
    script: VecDeque<Result<Vec<Detection>, BindingError>>,
    fallback: Vec<Detection>,
    hold: Option<Arc<Hold>>,
    pub calls: Arc<AtomicUsize>,
}

impl ScriptedBinding {
    pub fn ready(fallback: Vec<Detection>) -> Self {
        Self {
            ready: true,
            fail_init: false,
            script: VecDeque::new(),
            fallback,
            hold: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn uninitialized(fallback: Vec<Detection>) -> Self {
        Self {
            ready: false,
            ..Self::ready(fallback)
        }
    }

    pub fn failing_init() -> Self {
        Self {
            fail_init: true,
            ..Self::uninitialized(Vec::new())
        }
    }

    pub fn then(mut self, result: Result<Vec<Detection>, BindingError>) -> Self {
        self.script.push_back(result);
        self
    }

    pub fn held(mut self, hold: Arc<Hold>) -> Self {
        self.hold = Some(hold);
        self
    }
}

impl ModelBinding for ScriptedBinding {
    fn initialize(&mut self, _config: &BindingConfig) -> Result<(), BindingError> {
        if self.fail_init {
            return Err(BindingError::Initialization("model file missing".into()));
        }
        self.ready = true;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn detect(&mut self, _frame: &Frame, _timestamp: Duration) -> Result<Vec<Detection>, BindingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(hold) = &self.hold {
            hold.entered.store(true, Ordering::SeqCst);
            while !hold.released.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(1));
            }
        }
        self.script
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

/// Video source producing flat frames, with a configurable open result.
pub struct FakeSource {
    open_result: Result<(u32, u32), SourceError>,
    opened: bool,
    pub reads: Arc<AtomicUsize>,
    pub closed: Arc<AtomicBool>,
}

impl FakeSource {
    pub fn working() -> Self {
        Self::opening_with(Ok((8, 6)))
    }

    pub fn opening_with(open_result: Result<(u32, u32), SourceError>) -> Self {
        Self {
            open_result,
            opened: false,
            reads: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl VideoSource for FakeSource {
    fn open(&mut self) -> Result<(u32, u32), SourceError> {
        let size = self.open_result.clone()?;
        self.opened = true;
        Ok(size)
    }

    fn read_frame(&mut self, timestamp: Duration) -> Result<Frame, SourceError> {
        if !self.opened {
            return Err(SourceError::NotOpen);
        }
        self.reads.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(1));
        Ok(Frame::new(vec![128u8; 8 * 6 * 3], 8, 6, 3, timestamp))
    }

    fn close(&mut self) {
        self.opened = false;
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }
}

impl UserNotifier for RecordingNotifier {
    fn notify(&self, notice: &Notice) {
        self.notices.lock().unwrap().push(notice.clone());
    }
}

/// Keeps `info` messages; the handle stays readable after the logger is boxed.
#[derive(Clone, Default)]
pub struct RecordingLogger {
    messages: Arc<Mutex<Vec<String>>>,
}

impl RecordingLogger {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl PipelineLogger for RecordingLogger {
    fn tick(&mut self, _tick: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

/// Encoder that returns fixed bytes without touching pixels.
pub struct StubEncoder;

impl FrameEncoder for StubEncoder {
    fn encode(&self, frame: &Frame) -> Result<Vec<u8>, EncodeError> {
        if frame.is_empty() {
            return Err(EncodeError::EmptyFrame);
        }
        Ok(vec![0xFF, 0xD8, 0xFF, 0xD9])
    }

    fn mime_type(&self) -> &'static str {
        "image/jpeg"
    }

    fn extension(&self) -> &'static str {
        "jpg"
    }
}

/// Prediction client that records requests and answers from a script.
pub struct FakeClient {
    pub requests: Mutex<Vec<CaptureRequest>>,
    responses: Mutex<VecDeque<Result<serde_json::Value, UploadError>>>,
    hold: Option<Arc<Hold>>,
}

impl FakeClient {
    pub fn answering(responses: Vec<Result<serde_json::Value, UploadError>>) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            responses: Mutex::new(responses.into()),
            hold: None,
        }
    }

    pub fn held(mut self, hold: Arc<Hold>) -> Self {
        self.hold = Some(hold);
        self
    }

    pub fn sent(&self) -> Vec<CaptureRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl PredictionClient for FakeClient {
    fn submit(&self, request: &CaptureRequest) -> Result<CaptureResult, UploadError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(hold) = &self.hold {
            hold.entered.store(true, Ordering::SeqCst);
            while !hold.released.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(1));
            }
        }
        let next = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(serde_json::json!({ "prediction": "live" })));
        next.map(|body| CaptureResult {
            mode: request.mode(),
            status: 200,
            body,
            received_at: chrono::Utc::now(),
        })
    }
}
