use std::collections::BTreeMap;
use std::time::Instant;

/// Observer for pipeline orchestration events.
///
/// Use cases report progress and per-stage timings through this trait so
/// the CLI, the server and tests can each decide what to do with them.
pub trait PipelineLogger: Send {
    /// Frame-level progress. `total` is 0 when the source length is unknown.
    fn progress(&mut self, current: usize, total: usize);

    /// How long a named stage took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// A point-in-time measurement (e.g. detections per frame).
    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    /// End-of-item report. Default: no-op.
    fn summary(&self) {}
}

/// Discards all events.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _current: usize, _total: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Forwards events to the `log` facade, prefixed with an item label so
/// concurrent requests can be told apart.
///
/// Progress is throttled to every `every_frames` frames; timings and
/// metrics are aggregated into the summary.
pub struct LogPipelineLogger {
    label: String,
    every_frames: usize,
    timings: BTreeMap<String, RunningStats>,
    metrics: BTreeMap<String, RunningStats>,
    started: Instant,
    frames_seen: usize,
}

impl LogPipelineLogger {
    pub fn new(label: impl Into<String>, every_frames: usize) -> Self {
        Self {
            label: label.into(),
            every_frames: every_frames.max(1),
            timings: BTreeMap::new(),
            metrics: BTreeMap::new(),
            started: Instant::now(),
            frames_seen: 0,
        }
    }

    /// Formatted summary, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_s = self.started.elapsed().as_secs_f64();
        let mut lines = vec![format!(
            "[{}] {} frames in {elapsed_s:.1}s",
            self.label, self.frames_seen
        )];

        for (stage, stats) in &self.timings {
            lines.push(format!(
                "  {stage:10}: avg {:6.1}ms  total {:7.0}ms",
                stats.mean(),
                stats.total
            ));
        }
        for (name, stats) in &self.metrics {
            lines.push(format!("  {name}: avg {:.1}", stats.mean()));
        }
        if self.frames_seen > 0 && elapsed_s > 0.0 {
            lines.push(format!(
                "  Throughput: {:.1} fps",
                self.frames_seen as f64 / elapsed_s
            ));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<RunningStats> {
        self.timings.get(stage).copied()
    }

    pub fn metrics_for(&self, name: &str) -> Option<RunningStats> {
        self.metrics.get(name).copied()
    }
}

/// Sample count and sum for one stage or metric; constant size however
/// many frames are reported.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RunningStats {
    pub count: usize,
    pub total: f64,
}

impl RunningStats {
    fn add(&mut self, value: f64) {
        self.count += 1;
        self.total += value;
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

impl PipelineLogger for LogPipelineLogger {
    fn progress(&mut self, current: usize, total: usize) {
        self.frames_seen = self.frames_seen.max(current);
        if current % self.every_frames != 0 && current != total {
            return;
        }
        if total > 0 {
            let pct = current as f64 / total as f64 * 100.0;
            log::info!("[{}] {current}/{total} frames ({pct:.1}%)", self.label);
        } else {
            log::info!("[{}] {current} frames", self.label);
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .add(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_string()).or_default().add(value);
    }

    fn info(&mut self, message: &str) {
        log::info!("[{}] {message}", self.label);
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("{text}");
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
        logger.progress(1, 10);
        logger.timing("detect", 5.0);
        logger.metric("detections", 3.0);
        logger.info("hello");
        logger.summary();
    }

    #[test]
    fn test_timings_recorded_per_stage() {
        let mut logger = LogPipelineLogger::new("req", 10);
        logger.timing("detect", 20.0);
        logger.timing("detect", 30.0);
        logger.timing("annotate", 5.0);

        assert_eq!(
            logger.timings_for("detect").unwrap(),
            RunningStats {
                count: 2,
                total: 50.0
            }
        );
        assert_relative_eq!(logger.timings_for("detect").unwrap().mean(), 25.0);
        assert_eq!(logger.timings_for("annotate").unwrap().count, 1);
        assert!(logger.timings_for("encode").is_none());
    }

    #[test]
    fn test_long_runs_keep_one_entry_per_stage() {
        let mut logger = LogPipelineLogger::new("req", 10);
        for _ in 0..100_000 {
            logger.timing("detect", 2.0);
            logger.metric("detections", 1.0);
        }

        assert_eq!(logger.timings.len(), 1);
        let stats = logger.timings_for("detect").unwrap();
        assert_eq!(stats.count, 100_000);
        assert_relative_eq!(stats.total, 200_000.0);
        assert_relative_eq!(logger.metrics_for("detections").unwrap().mean(), 1.0);
    }

    #[test]
    fn test_metric_average_in_summary() {
        let mut logger = LogPipelineLogger::new("req", 10);
        logger.metric("detections", 3.0);
        logger.metric("detections", 4.0);

        assert_relative_eq!(logger.metrics_for("detections").unwrap().mean(), 3.5);
        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("detections: avg 3.5"));
    }

    #[test]
    fn test_summary_names_label_and_stages() {
        let mut logger = LogPipelineLogger::new("upload-42", 10);
        logger.progress(10, 10);
        logger.timing("detect", 10.0);
        logger.timing("encode", 2.0);

        let summary = logger.summary_string().unwrap();
        assert!(summary.starts_with("[upload-42] 10 frames"));
        assert!(summary.contains("detect"));
        assert!(summary.contains("encode"));
    }

    #[test]
    fn test_empty_stats_mean_is_zero() {
        assert_eq!(RunningStats::default().mean(), 0.0);
    }

    #[test]
    fn test_empty_summary_is_none() {
        assert!(LogPipelineLogger::new("req", 10).summary_string().is_none());
    }

    #[test]
    fn test_progress_tracks_frames_with_unknown_total() {
        let mut logger = LogPipelineLogger::new("req", 5);
        for i in 1..=12 {
            logger.progress(i, 0);
        }
        assert_eq!(logger.frames_seen, 12);
    }

    #[test]
    fn test_zero_throttle_clamped() {
        assert_eq!(LogPipelineLogger::new("req", 0).every_frames, 1);
    }
}
