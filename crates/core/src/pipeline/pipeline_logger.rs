use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use crate::guidance::domain::guidance_decision::GuidanceDecision;

/// Observer for analysis cycle events.
///
/// Keeps the worker loop free of any particular output mechanism. Called on
/// the analysis worker, so implementations must be cheap.
pub trait PipelineLogger: Send {
    /// A cycle finished with `decision` for the frame with `frame_index`.
    fn decision(&mut self, frame_index: usize, decision: &GuidanceDecision);

    /// Record how long a named stage took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. faces reported).
    fn metric(&mut self, name: &str, value: f64);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit an end-of-run summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards all events.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn decision(&mut self, _frame_index: usize, _decision: &GuidanceDecision) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Logger for the CLI: collects per-stage timings and metrics, logs each
/// change of guidance, and prints a report when the run ends.
pub struct StdoutPipelineLogger {
    timings: HashMap<String, Vec<f64>>,
    metrics: HashMap<String, Vec<f64>>,
    decisions: BTreeMap<&'static str, usize>,
    last_decision: Option<GuidanceDecision>,
    start_time: Instant,
    cycles: usize,
    messages: Vec<String>,
}

impl StdoutPipelineLogger {
    pub fn new() -> Self {
        Self {
            timings: HashMap::new(),
            metrics: HashMap::new(),
            decisions: BTreeMap::new(),
            last_decision: None,
            start_time: Instant::now(),
            cycles: 0,
            messages: Vec::new(),
        }
    }

    /// Returns the formatted summary string, or `None` if no cycle ran.
    pub fn summary_string(&self) -> Option<String> {
        if self.cycles == 0 {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let mut lines = vec![format!(
            "Guidance summary ({} frames analysed, {:.1}s total):",
            self.cycles,
            elapsed_ms / 1000.0
        )];

        let mut stages: Vec<_> = self.timings.iter().collect();
        stages.sort_by_key(|(stage, _)| stage.as_str());
        for (stage, durations) in stages {
            let total_ms: f64 = durations.iter().sum();
            let avg_ms = average(durations);
            lines.push(format!(
                "  {stage:10}: avg {avg_ms:6.1}ms  max {:6.1}ms  total {total_ms:7.0}ms",
                durations.iter().copied().fold(0.0, f64::max)
            ));
        }

        let mut metric_names: Vec<_> = self.metrics.keys().collect();
        metric_names.sort();
        for name in metric_names {
            lines.push(format!("  {name}: avg {:.1}", average(&self.metrics[name])));
        }

        for (kind, count) in &self.decisions {
            let pct = *count as f64 / self.cycles as f64 * 100.0;
            lines.push(format!("  {kind:10}: {count} ({pct:.0}%)"));
        }

        if elapsed_ms > 0.0 {
            let fps = self.cycles as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Analysis rate: {fps:.1} fps"));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(|v| v.as_slice())
    }

    pub fn metrics_for(&self, name: &str) -> Option<&[f64]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }

    /// Cycles that ended in a decision of the given [`GuidanceDecision::kind`].
    pub fn decisions_of_kind(&self, kind: &str) -> usize {
        self.decisions.get(kind).copied().unwrap_or(0)
    }
}

fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn decision(&mut self, frame_index: usize, decision: &GuidanceDecision) {
        self.cycles += 1;
        *self.decisions.entry(decision.kind()).or_insert(0) += 1;
        if self.last_decision.as_ref() != Some(decision) {
            log::info!("Frame {frame_index}: {decision}");
            self.last_decision = Some(*decision);
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics
            .entry(name.to_string())
            .or_default()
            .push(value);
    }

    fn info(&mut self, message: &str) {
        self.messages.push(message.to_string());
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
