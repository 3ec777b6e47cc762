use isoforge_shared::Stage;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageMetrics {
    pub stage: Stage,
    pub duration_ms: u128,
    pub succeeded: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineMetrics {
    pub total_duration_ms: u128,
    pub stages: Vec<StageMetrics>,
}

impl PipelineMetrics {
    pub fn stage_duration_ms(&self, stage: Stage) -> Option<u128> {
        self.stages
            .iter()
            .find(|m| m.stage == stage)
            .map(|m| m.duration_ms)
    }

    /// Stages that ran, in order.
    pub fn executed(&self) -> Vec<Stage> {
        self.stages.iter().map(|m| m.stage).collect()
    }
}

/// Collects per-stage timings for one run.
#[derive(Debug)]
pub(crate) struct MetricsRecorder {
    started: Instant,
    stages: Vec<StageMetrics>,
}

impl MetricsRecorder {
    pub(crate) fn start() -> Self {
        Self {
            started: Instant::now(),
            stages: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, stage: Stage, started: Instant, succeeded: bool) {
        let duration_ms = started.elapsed().as_millis();
        tracing::debug!(stage = %stage, duration_ms, succeeded, "Stage finished");
        self.stages.push(StageMetrics {
            stage,
            duration_ms,
            succeeded,
        });
    }

    pub(crate) fn finish(self) -> PipelineMetrics {
        PipelineMetrics {
            total_duration_ms: self.started.elapsed().as_millis(),
            stages: self.stages,
        }
    }
}
