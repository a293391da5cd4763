use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Cross-cutting logger for session events: poll ticks, stage timings
/// (`detect`, `encode`, `upload`) and metrics such as `faces` per tick.
///
/// Keeps the poller and the capture use case free of any particular output
/// mechanism.
pub trait PipelineLogger: Send {
    /// Report that poll tick `tick` has completed.
    fn tick(&mut self, tick: usize);

    /// Record how long a named stage took.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric.
    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    /// Emit an end-of-session summary. Default: no-op.
    fn summary(&self) {}
}

/// Logger shared by the poller thread and capture threads.
pub type SharedLogger = Arc<Mutex<Box<dyn PipelineLogger>>>;

pub fn shared(logger: impl PipelineLogger + 'static) -> SharedLogger {
    Arc::new(Mutex::new(Box::new(logger)))
}

/// Runs `f` against the shared logger, ignoring poisoning.
pub(crate) fn with_logger(logger: &SharedLogger, f: impl FnOnce(&mut dyn PipelineLogger)) {
    let mut guard = logger.lock().unwrap_or_else(|e| e.into_inner());
    f(&mut **guard);
}

/// Discards all events. Used by tests and by callers with their own reporting.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn tick(&mut self, _tick: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Running aggregate for one stage or metric. Constant size however long
/// the session runs.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct RunningStats {
    count: usize,
    sum: f64,
    max: f64,
    last: f64,
}

impl RunningStats {
    fn record(&mut self, value: f64) {
        if self.count == 0 || value > self.max {
            self.max = value;
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// CLI-oriented logger that aggregates per-stage timings and metrics
/// and reports them at the end of the session.
///
/// Tick output is throttled to every `throttle_ticks` ticks.
pub struct StdoutPipelineLogger {
    throttle_ticks: usize,
    timings: HashMap<String, RunningStats>,
    metrics: HashMap<String, RunningStats>,
    start_time: Instant,
    ticks: usize,
    events: usize,
}

impl StdoutPipelineLogger {
    pub fn new(throttle_ticks: usize) -> Self {
        Self {
            throttle_ticks: throttle_ticks.max(1),
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
            ticks: 0,
            events: 0,
        }
    }

    /// Returns the formatted summary, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_s = self.start_time.elapsed().as_secs_f64();
        let mut lines = vec![format!(
            "Session summary ({} ticks, {elapsed_s:.1}s):",
            self.ticks
        )];

        let mut stages: Vec<_> = self.timings.iter().collect();
        stages.sort_by(|a, b| a.0.cmp(b.0));
        for (stage, stats) in stages {
            lines.push(format!(
                "  {stage:8}: n {:5}  avg {:7.1}ms  max {:7.1}ms",
                stats.count,
                stats.mean(),
                stats.max,
            ));
        }

        let mut names: Vec<_> = self.metrics.iter().collect();
        names.sort_by(|a, b| a.0.cmp(b.0));
        for (name, stats) in names {
            lines.push(format!("  {name}: avg {:.2}", stats.mean()));
        }

        if self.events > 0 {
            lines.push(format!("  Capture events: {}", self.events));
        }
        if self.ticks > 0 && elapsed_s > 0.0 {
            lines.push(format!(
                "  Poll rate: {:.1} ticks/s",
                self.ticks as f64 / elapsed_s
            ));
        }

        Some(lines.join("\n"))
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(30)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn tick(&mut self, tick: usize) {
        self.ticks = self.ticks.max(tick);
        if tick % self.throttle_ticks == 0 {
            let faces = self.metrics.get("faces").map_or(0.0, |s| s.last);
            log::info!("Tick {tick}: {faces} face(s)");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .record(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics
            .entry(name.to_string())
            .or_default()
            .record(value);
    }

    fn info(&mut self, message: &str) {
        self.events += 1;
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_null_logger_accepts_everything() {
        let mut logger = NullPipelineLogger;
        logger.tick(1);
        logger.timing("detect", 5.0);
        logger.metric("faces", 1.0);
        logger.info("hello");
        logger.summary();
    }

    #[test]
    fn test_timing_aggregates_per_stage() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.timing("detect", 20.0);
        logger.timing("detect", 30.0);
        logger.timing("upload", 120.0);

        let detect = logger.timings.get("detect").unwrap();
        assert_eq!(detect.count, 2);
        assert_relative_eq!(detect.mean(), 25.0);
        assert_relative_eq!(detect.max, 30.0);
        assert_eq!(logger.timings.get("upload").unwrap().count, 1);
        assert!(logger.timings.get("encode").is_none());
    }

    #[test]
    fn test_metric_average_in_summary() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.metric("faces", 1.0);
        logger.metric("faces", 2.0);

        assert_relative_eq!(logger.metrics.get("faces").unwrap().mean(), 1.5);
        assert!(logger.summary_string().unwrap().contains("faces: avg 1.50"));
    }

    #[test]
    fn test_negative_values_still_set_max() {
        let mut stats = RunningStats::default();
        stats.record(-3.0);
        stats.record(-5.0);
        assert_relative_eq!(stats.max, -3.0);
        assert_relative_eq!(stats.last, -5.0);
    }

    #[test]
    fn test_long_session_keeps_constant_state() {
        let mut logger = StdoutPipelineLogger::new(1_000_000);
        for i in 1..=100_000 {
            logger.timing("detect", (i % 7) as f64);
            logger.metric("faces", (i % 2) as f64);
            logger.info("capture accepted");
            logger.tick(i);
        }

        assert_eq!(logger.timings.len(), 1);
        assert_eq!(logger.metrics.len(), 1);
        let detect = logger.timings.get("detect").unwrap();
        assert_eq!(detect.count, 100_000);
        assert_relative_eq!(detect.max, 6.0);
        assert_relative_eq!(logger.metrics.get("faces").unwrap().mean(), 0.5);
        assert_eq!(logger.events, 100_000);
        assert_eq!(logger.ticks, 100_000);
    }

    #[test]
    fn test_summary_lists_stages_and_poll_rate() {
        let mut logger = StdoutPipelineLogger::new(10);
        for i in 1..=4 {
            logger.timing("detect", 10.0);
            logger.tick(i);
        }
        logger.timing("encode", 3.0);

        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("Session summary (4 ticks"));
        assert!(summary.contains("detect"));
        assert!(summary.contains("encode"));
        assert!(summary.contains("ticks/s"));
    }

    #[test]
    fn test_empty_summary_returns_none() {
        assert!(StdoutPipelineLogger::default().summary_string().is_none());
    }

    #[test]
    fn test_info_counts_events() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.info("capture accepted");
        logger.metric("faces", 1.0);
        assert_eq!(logger.events, 1);
        assert!(logger.summary_string().unwrap().contains("Capture events: 1"));
    }

    #[test]
    fn test_shared_logger_is_usable_across_threads() {
        let logger = shared(NullPipelineLogger);
        let clone = Arc::clone(&logger);
        std::thread::spawn(move || with_logger(&clone, |l| l.tick(1)))
            .join()
            .unwrap();
        with_logger(&logger, |l| l.info("done"));
    }
}
