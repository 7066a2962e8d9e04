use std::collections::BTreeMap;
use std::time::Instant;

/// Observer for encode-run internals: per-stage timing, frame progress, and
/// status lines. Separate from [`EncodeListener`](super::encode_listener::EncodeListener),
/// which carries the caller-facing outcome.
pub trait PipelineLogger: Send {
    fn progress(&mut self, current: usize, total: usize);

    /// Time spent in one stage (`convert`, `submit`, `drain`, ...) for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Compressed bytes handed to the muxer for one sample.
    fn sample_written(&mut self, bytes: usize);

    fn info(&mut self, message: &str);

    /// Emit an end-of-run summary. Default: no-op.
    fn summary(&self) {}
}

pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _current: usize, _total: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn sample_written(&mut self, _bytes: usize) {}
    fn info(&mut self, _message: &str) {}
}

#[derive(Default)]
struct StageTotals {
    calls: usize,
    total_ms: f64,
}

impl StageTotals {
    fn average_ms(&self) -> f64 {
        self.total_ms / self.calls.max(1) as f64
    }
}

/// Forwards to the `log` crate and reports per-stage cost when the run ends.
///
/// Progress lines are throttled to one every `throttle_frames` frames.
pub struct LogPipelineLogger {
    throttle_frames: usize,
    stages: BTreeMap<String, StageTotals>,
    started: Instant,
    frames_done: usize,
    samples: usize,
    bytes: usize,
}

impl LogPipelineLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            stages: BTreeMap::new(),
            started: Instant::now(),
            frames_done: 0,
            samples: 0,
            bytes: 0,
        }
    }

    /// Returns `None` until at least one stage timing has been recorded.
    fn summary_string(&self) -> Option<String> {
        if self.stages.is_empty() {
            return None;
        }
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let mut lines = vec![format!(
            "Encode summary ({} frames, {} samples, {} bytes, {:.1}s):",
            self.frames_done,
            self.samples,
            self.bytes,
            elapsed_ms / 1000.0
        )];

        for (stage, totals) in &self.stages {
            lines.push(format!(
                "  {stage:8}: avg {:6.2}ms  total {:7.0}ms  ({} calls)",
                totals.average_ms(),
                totals.total_ms,
                totals.calls
            ));
        }

        if self.frames_done > 0 && elapsed_ms > 0.0 {
            let fps = self.frames_done as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Throughput: {fps:.1} frames/s"));
        }
        Some(lines.join("\n"))
    }
}

impl Default for LogPipelineLogger {
    fn default() -> Self {
        Self::new(10)
    }
}

impl PipelineLogger for LogPipelineLogger {
    fn progress(&mut self, current: usize, total: usize) {
        self.frames_done = current;
        if total > 0 && (current % self.throttle_frames == 0 || current == total) {
            log::info!("Encoded {current}/{total} frames");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        let totals = self.stages.entry(stage.to_string()).or_default();
        totals.calls += 1;
        totals.total_ms += duration_ms;
    }

    fn sample_written(&mut self, bytes: usize) {
        self.samples += 1;
        self.bytes += bytes;
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n{text}");
        }
    }
}
