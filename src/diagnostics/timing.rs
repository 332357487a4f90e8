use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Wall-clock time spent in one calibration or replay stage.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTiming {
    pub label: String,
    pub elapsed_ms: f64,
}

impl StageTiming {
    pub fn new(label: impl Into<String>, elapsed_ms: f64) -> Self {
        Self {
            label: label.into(),
            elapsed_ms,
        }
    }
}

/// Per-stage timings of a run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingBreakdown {
    pub total_ms: f64,
    pub stages: Vec<StageTiming>,
}

impl TimingBreakdown {
    pub fn push(&mut self, label: impl Into<String>, elapsed_ms: f64) {
        self.stages.push(StageTiming::new(label, elapsed_ms));
    }

    /// Records the time elapsed since `start` and restarts the clock.
    pub fn lap(&mut self, label: impl Into<String>, start: &mut Instant) {
        self.push(label, elapsed_ms(*start));
        *start = Instant::now();
    }

    /// Sum over every stage recorded under `label`.
    pub fn stage_ms(&self, label: &str) -> Option<f64> {
        let mut hits = self.stages.iter().filter(|s| s.label == label).peekable();
        hits.peek()?;
        Some(hits.map(|s| s.elapsed_ms).sum())
    }
}

pub fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_labels_accumulate() {
        let mut t = TimingBreakdown::default();
        t.push("unwrap", 1.5);
        t.push("phase_map", 4.0);
        t.push("unwrap", 2.0);
        assert_eq!(t.stage_ms("unwrap"), Some(3.5));
        assert_eq!(t.stage_ms("crop"), None);
    }

    #[test]
    fn lap_restarts_the_clock() {
        let mut t = TimingBreakdown::default();
        let mut clock = Instant::now();
        let before = clock;
        t.lap("bragg", &mut clock);
        assert!(clock >= before);
        assert_eq!(t.stages.len(), 1);
        assert!(t.stages[0].elapsed_ms >= 0.0);
    }
}
