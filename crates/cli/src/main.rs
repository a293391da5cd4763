mod settings;

use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};

use liveness_capture_core::capture::domain::capture_request::{Label, OperationMode};
use liveness_capture_core::capture::infrastructure::http_prediction_client::HttpPredictionClient;
use liveness_capture_core::capture::infrastructure::jpeg_frame_encoder::JpegFrameEncoder;
use liveness_capture_core::detection::domain::model_binding::BindingConfig;
use liveness_capture_core::detection::domain::quality_gate::QualityGate;
use liveness_capture_core::detection::infrastructure::onnx_blazeface_binding::OnnxBlazefaceBinding;
use liveness_capture_core::detection::infrastructure::shared_binding::BindingState;
use liveness_capture_core::overlay::infrastructure::snapshot_overlay_renderer::SnapshotOverlayRenderer;
use liveness_capture_core::pipeline::detection_poller::PollerConfig;
use liveness_capture_core::pipeline::live_session::{LiveSession, SessionParts};
use liveness_capture_core::pipeline::pipeline_error::PipelineError;
use liveness_capture_core::pipeline::pipeline_logger::{shared, StdoutPipelineLogger};
use liveness_capture_core::pipeline::user_notifier::{Notice, UserNotifier};
use liveness_capture_core::video::domain::video_source::VideoSource;
use liveness_capture_core::video::infrastructure::image_file_source::ImageFileSource;

use crate::settings::Settings;

const MODEL_LOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Live face detection with quality-gated capture to a liveness API.
#[derive(Parser)]
#[command(name = "liveness-capture", version)]
struct Cli {
    /// API base URL (overrides settings and LIVENESS_API_BASE_URL).
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Minimum confidence for a face to count toward a capture (0.0-1.0).
    #[arg(long, global = true)]
    gate_threshold: Option<f64>,

    /// Path to the BlazeFace ONNX model (skips cache and download).
    #[arg(long, global = true)]
    model: Option<PathBuf>,

    /// Upload timeout in seconds (default: wait indefinitely).
    #[arg(long, global = true)]
    upload_timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the detector on the video source and report faces.
    Watch {
        #[command(flatten)]
        source: SourceArgs,

        /// Write an overlay snapshot to this image file every tick.
        #[arg(long)]
        overlay: Option<PathBuf>,

        /// Overlay display width in pixels.
        #[arg(long, default_value = "640")]
        display_width: u32,

        /// Overlay display height in pixels.
        #[arg(long, default_value = "480")]
        display_height: u32,

        /// Stop after this many seconds (default: run until interrupted).
        #[arg(long)]
        duration: Option<u64>,
    },
    /// Wait for exactly one qualifying face, then capture and upload it.
    Capture {
        #[command(flatten)]
        source: SourceArgs,

        /// Operation: predict, train or retrain.
        #[arg(long, default_value = "predict")]
        mode: OperationMode,

        /// Ground-truth label for training: live or spoof.
        #[arg(long)]
        label: Option<Label>,

        /// Seconds to wait for a qualifying face.
        #[arg(long, default_value = "10")]
        timeout: u64,
    },
    /// Print the effective settings.
    Settings {
        /// Also write them to the settings file.
        #[arg(long)]
        save: bool,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Replay an image file or a directory of images instead of a camera.
    #[arg(long)]
    images: Option<PathBuf>,

    /// Camera index (requires the `camera` feature).
    #[arg(long)]
    camera: Option<u32>,
}

/// Prints notices on stderr so they reach the user regardless of RUST_LOG.
struct StderrNotifier;

impl UserNotifier for StderrNotifier {
    fn notify(&self, notice: &Notice) {
        eprintln!("{notice}");
    }
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut settings = Settings::load()?;
    apply_overrides(&mut settings, &cli);
    settings.validate()?;

    match cli.command {
        Command::Settings { save } => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
            if save {
                let path = settings.save()?;
                log::info!("Settings written to {}", path.display());
            }
            Ok(())
        }
        Command::Watch {
            source,
            overlay,
            display_width,
            display_height,
            duration,
        } => {
            let source = open_source(&source)?;
            let mut session = start_session(&settings)?;
            if let Some(path) = overlay {
                session.set_renderer(Box::new(SnapshotOverlayRenderer::new(
                    path,
                    (display_width, display_height),
                )));
            }
            let interrupted = Arc::new(AtomicBool::new(false));
            let flag = Arc::clone(&interrupted);
            ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))?;
            run_watch(
                &mut session,
                source,
                duration.map(Duration::from_secs),
                &interrupted,
            )
        }
        Command::Capture {
            source,
            mode,
            label,
            timeout,
        } => {
            if mode.requires_label() && label.is_none() {
                return Err(PipelineError::MissingLabel.into());
            }
            let source = open_source(&source)?;
            let mut session = start_session(&settings)?;
            run_capture(
                &mut session,
                source,
                mode,
                label,
                QualityGate::new(settings.gate_threshold)?,
                Duration::from_secs(timeout),
            )
        }
    }
}

fn apply_overrides(settings: &mut Settings, cli: &Cli) {
    if let Some(url) = &cli.api_url {
        settings.api_base_url = url.clone();
    }
    if let Some(threshold) = cli.gate_threshold {
        settings.gate_threshold = threshold;
    }
    if let Some(model) = &cli.model {
        settings.model_path = Some(model.clone());
    }
    if let Some(secs) = cli.upload_timeout {
        settings.upload_timeout_secs = Some(secs);
    }
}

fn open_source(args: &SourceArgs) -> Result<Box<dyn VideoSource>, Box<dyn std::error::Error>> {
    match (&args.images, args.camera) {
        (Some(_), Some(_)) => Err("--images and --camera are mutually exclusive".into()),
        (Some(path), None) => Ok(Box::new(ImageFileSource::new(path))),
        (None, index) => camera_source(index.unwrap_or(0)),
    }
}

#[cfg(feature = "camera")]
fn camera_source(index: u32) -> Result<Box<dyn VideoSource>, Box<dyn std::error::Error>> {
    use liveness_capture_core::video::infrastructure::camera_source::CameraSource;
    Ok(Box::new(CameraSource::new(index)))
}

#[cfg(not(feature = "camera"))]
fn camera_source(_index: u32) -> Result<Box<dyn VideoSource>, Box<dyn std::error::Error>> {
    Err("this build has no camera support; rebuild with --features camera or pass --images".into())
}

fn start_session(settings: &Settings) -> Result<LiveSession, Box<dyn std::error::Error>> {
    let client = HttpPredictionClient::new(
        &settings.api_base_url,
        settings.upload_timeout_secs.map(Duration::from_secs),
    )?;
    let interval = (settings.poll_interval_ms > 0)
        .then(|| Duration::from_millis(settings.poll_interval_ms));

    let session = LiveSession::new(SessionParts {
        binding: Box::new(OnnxBlazefaceBinding::new()),
        encoder: Arc::new(JpegFrameEncoder::new(
            settings.capture_width,
            settings.capture_height,
            settings.jpeg_quality,
        )),
        client: Arc::new(client),
        notifier: Arc::new(StderrNotifier),
        logger: shared(StdoutPipelineLogger::default()),
        gate: QualityGate::new(settings.gate_threshold)?,
        poller: PollerConfig {
            interval,
            ..PollerConfig::default()
        },
    });

    log::info!("Loading face detector...");
    session.load_model_in_background(BindingConfig {
        model_path: settings.model_path.clone(),
        model_url: settings.model_url.clone(),
        min_confidence: settings.detector_confidence,
        prefer_gpu: true,
    });
    match session.wait_for_model(MODEL_LOAD_TIMEOUT) {
        BindingState::Ready => Ok(session),
        BindingState::Failed(e) => Err(format!("Face detector failed to load: {e}").into()),
        other => Err(format!("Face detector not ready after {MODEL_LOAD_TIMEOUT:?} ({other:?})").into()),
    }
}

/// Keeps watching until Ctrl-C or, when given, until `duration` has passed.
fn keep_watching(elapsed: Duration, duration: Option<Duration>, interrupted: &AtomicBool) -> bool {
    !interrupted.load(Ordering::SeqCst) && duration.map_or(true, |d| elapsed < d)
}

fn run_watch(
    session: &mut LiveSession,
    source: Box<dyn VideoSource>,
    duration: Option<Duration>,
    interrupted: &AtomicBool,
) -> Result<(), Box<dyn std::error::Error>> {
    let detections = session.detections().subscribe();
    let (width, height) = session.enable_camera(source)?;
    log::info!("Watching {width}x{height} stream (Ctrl-C to stop)");

    let started = Instant::now();
    let mut last_count = None;
    while keep_watching(started.elapsed(), duration, interrupted) {
        let Ok(set) = detections.recv_timeout(Duration::from_millis(200)) else {
            continue;
        };
        if last_count != Some(set.len()) {
            let best = set.iter().map(|d| d.confidence).fold(0.0, f64::max);
            println!("{} face(s), best confidence {:.2}%", set.len(), best * 100.0);
            last_count = Some(set.len());
        }
    }

    if interrupted.load(Ordering::SeqCst) {
        log::info!("Interrupted, stopping camera");
    }
    session.stop();
    session.summary();
    Ok(())
}

fn run_capture(
    session: &mut LiveSession,
    source: Box<dyn VideoSource>,
    mode: OperationMode,
    label: Option<Label>,
    gate: QualityGate,
    timeout: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let detections = session.detections().subscribe();
    session.enable_camera(source)?;
    log::info!("Waiting up to {}s for exactly one qualifying face", timeout.as_secs());

    let deadline = Instant::now() + timeout;
    let mut last_rejection = None;
    while Instant::now() < deadline {
        let Ok(set) = detections.recv_timeout(Duration::from_millis(200)) else {
            continue;
        };
        if !gate.evaluate(&set).is_accepted() {
            continue;
        }
        match session.capture(mode, label) {
            Ok(result) => {
                session.stop();
                println!("{}", serde_json::to_string_pretty(&result.body)?);
                return Ok(());
            }
            Err(PipelineError::GateRejected { reason }) => last_rejection = Some(reason),
            Err(e) => {
                session.stop();
                return Err(e.into());
            }
        }
    }

    session.stop();
    Err(match last_rejection {
        Some(reason) => format!("No capture within {}s (last rejection: {reason})", timeout.as_secs()),
        None => format!("No qualifying face within {}s", timeout.as_secs()),
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_arguments_parse() {
        let cli = Cli::try_parse_from([
            "liveness-capture",
            "capture",
            "--images",
            "faces/",
            "--mode",
            "train",
            "--label",
            "spoof",
        ])
        .unwrap();
        match cli.command {
            Command::Capture {
                mode,
                label,
                timeout,
                source,
            } => {
                assert_eq!(mode, OperationMode::Train);
                assert_eq!(label, Some(Label::Spoof));
                assert_eq!(timeout, 10);
                assert_eq!(source.images, Some(PathBuf::from("faces/")));
            }
            _ => panic!("expected capture"),
        }
    }

    #[test]
    fn test_watch_runs_until_interrupted() {
        let interrupted = AtomicBool::new(false);
        let hour = Duration::from_secs(3600);
        assert!(keep_watching(hour, None, &interrupted));
        assert!(keep_watching(Duration::from_secs(1), Some(Duration::from_secs(5)), &interrupted));
        assert!(!keep_watching(Duration::from_secs(5), Some(Duration::from_secs(5)), &interrupted));

        interrupted.store(true, Ordering::SeqCst);
        assert!(!keep_watching(Duration::ZERO, None, &interrupted));
        assert!(!keep_watching(Duration::ZERO, Some(hour), &interrupted));
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        assert!(Cli::try_parse_from(["liveness-capture", "capture", "--mode", "guess"]).is_err());
    }

    #[test]
    fn test_flags_override_settings() {
        let cli = Cli::try_parse_from([
            "liveness-capture",
            "--api-url",
            "http://10.0.0.2:5000",
            "--gate-threshold",
            "0.75",
            "settings",
        ])
        .unwrap();
        let mut settings = Settings::default();
        apply_overrides(&mut settings, &cli);
        assert_eq!(settings.api_base_url, "http://10.0.0.2:5000");
        assert_eq!(settings.gate_threshold, 0.75);
        assert_eq!(settings.upload_timeout_secs, None);
    }

    #[test]
    fn test_images_and_camera_conflict() {
        let args = SourceArgs {
            images: Some(PathBuf::from("faces/")),
            camera: Some(0),
        };
        assert!(open_source(&args).is_err());
    }

    #[test]
    fn test_images_source_is_built() {
        let args = SourceArgs {
            images: Some(PathBuf::from("faces/")),
            camera: None,
        };
        assert!(open_source(&args).is_ok());
    }
}
