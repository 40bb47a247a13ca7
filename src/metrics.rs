//! Per-frame instrumentation: phase timings and batching counters.
//!
//! Collected unconditionally every tick (the cost is a few `Instant::now()`
//! calls and struct copies); the `render_metrics` feature additionally
//! enables a per-frame trace log of the rolling summary.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Per-frame batching counters, useful for diagnosing why a scene produced
/// more draw calls than expected.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchCounters {
    /// Number of quads emitted to the main pass.
    pub main_pass_quads: u32,
    /// Number of RenderOps emitted to the main pass.
    pub main_pass_ops: u32,
    /// Number of text RenderOps emitted.
    pub text_ops: u32,
    /// Number of RTT passes rendered this frame.
    pub rtt_passes: u32,
    /// Number of quads emitted across all RTT passes.
    pub rtt_pass_quads: u32,
    /// Number of shader/pipeline switches (`use_pipeline` calls that actually changed state).
    pub pipeline_switches: u32,
    /// Number of texture binds that missed the shadow cache and issued a GPU bind.
    pub texture_unit_rebinds: u32,
    /// Number of textures evicted from the texture cache this frame.
    pub textures_evicted: u32,
    /// Number of images that finished decoding and were uploaded this frame.
    pub images_uploaded: u32,
}

impl BatchCounters {
    pub fn accumulate(&mut self, other: &Self) {
        self.main_pass_quads += other.main_pass_quads;
        self.main_pass_ops += other.main_pass_ops;
        self.text_ops += other.text_ops;
        self.rtt_passes += other.rtt_passes;
        self.rtt_pass_quads += other.rtt_pass_quads;
        self.pipeline_switches += other.pipeline_switches;
        self.texture_unit_rebinds += other.texture_unit_rebinds;
        self.textures_evicted += other.textures_evicted;
        self.images_uploaded += other.images_uploaded;
    }
}

/// Per-phase wall-clock timings for a single frame tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhaseTimings {
    /// Time spent in the scene graph update pass.
    pub scene_update: Duration,
    /// Time spent building RenderOps (batching) for RTT + main passes.
    pub batch: Duration,
    /// Time spent encoding GPU commands and submitting them.
    pub encode_and_submit: Duration,
    /// Time spent presenting the frame.
    pub present: Duration,
    /// Total frame time (sum of all phases).
    pub total: Duration,
}

const ROLLING_WINDOW_DURATION: Duration = Duration::from_secs(1);
const MAX_ROLLING_WINDOW_SAMPLE_COUNT: usize = 16_384;

/// Accumulates per-frame samples over a rolling one-second window and reports
/// min/max/average. Only meaningful when frames are ticked at a roughly
/// steady rate; a single outlier (e.g. a cold-start frame) will eventually
/// roll out of the window.
#[derive(Debug, Default)]
pub struct RollingMetrics {
    samples: VecDeque<(Instant, PhaseTimings, BatchCounters)>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FrameTimeSummary {
    pub min_total: Duration,
    pub max_total: Duration,
    pub avg_total: Duration,
    pub sample_count: usize,
}

impl RollingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, now: Instant, timings: PhaseTimings, counters: BatchCounters) {
        self.samples.push_back((now, timings, counters));
        while self.samples.len() > MAX_ROLLING_WINDOW_SAMPLE_COUNT {
            self.samples.pop_front();
        }
        while let Some((oldest, _, _)) = self.samples.front() {
            if now.duration_since(*oldest) > ROLLING_WINDOW_DURATION {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn summary(&self) -> FrameTimeSummary {
        if self.samples.is_empty() {
            return FrameTimeSummary::default();
        }
        let mut min = Duration::MAX;
        let mut max = Duration::ZERO;
        let mut sum = Duration::ZERO;
        for (_, timings, _) in &self.samples {
            min = min.min(timings.total);
            max = max.max(timings.total);
            sum += timings.total;
        }
        FrameTimeSummary {
            min_total: min,
            max_total: max,
            avg_total: sum / self.samples.len() as u32,
            sample_count: self.samples.len(),
        }
    }

    pub fn latest_counters(&self) -> BatchCounters {
        self.samples
            .back()
            .map(|(_, _, counters)| *counters)
            .unwrap_or_default()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulate_sums_fields() {
        let mut a = BatchCounters {
            main_pass_quads: 2,
            pipeline_switches: 1,
            ..Default::default()
        };
        let b = BatchCounters {
            main_pass_quads: 3,
            textures_evicted: 1,
            ..Default::default()
        };
        a.accumulate(&b);
        assert_eq!(a.main_pass_quads, 5);
        assert_eq!(a.pipeline_switches, 1);
        assert_eq!(a.textures_evicted, 1);
    }

    #[test]
    fn rolling_metrics_summary_empty() {
        let metrics = RollingMetrics::new();
        let summary = metrics.summary();
        assert_eq!(summary.sample_count, 0);
        assert_eq!(summary.avg_total, Duration::ZERO);
    }

    #[test]
    fn rolling_metrics_summary_single_sample() {
        let mut metrics = RollingMetrics::new();
        let now = Instant::now();
        let timings = PhaseTimings {
            total: Duration::from_millis(16),
            ..Default::default()
        };
        metrics.push(now, timings, BatchCounters::default());
        let summary = metrics.summary();
        assert_eq!(summary.sample_count, 1);
        assert_eq!(summary.min_total, Duration::from_millis(16));
        assert_eq!(summary.max_total, Duration::from_millis(16));
    }
}
