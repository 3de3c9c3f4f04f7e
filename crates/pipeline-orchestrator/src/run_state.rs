use std::collections::BTreeMap;

use batch_predictor::PredictionStats;
use chrono::{DateTime, NaiveDate, Utc};
use event_risk::AdjustmentSummary;
use pipeline_core::{Opportunity, PipelinePhase, SentimentSnapshot, TrainingQueueEntry};
use serde::{Deserialize, Serialize};

/// Externally visible status of a run, published on every change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatus {
    pub phase: PipelinePhase,
    pub progress_percent: u8,
    pub processed_count: usize,
    pub total_count: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Phase active when the run failed
    pub failed_phase: Option<PipelinePhase>,
}

impl RunStatus {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            phase: PipelinePhase::Initializing,
            progress_percent: 0,
            processed_count: 0,
            total_count: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
            started_at,
            updated_at: started_at,
            failed_phase: None,
        }
    }
}

/// Per-run aggregate root. Owned and mutated by the orchestrator only.
///
/// Phases only move forward (or to `Failed`), and progress never decreases.
#[derive(Debug, Clone)]
pub struct PipelineRunState {
    status: RunStatus,
}

impl PipelineRunState {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            status: RunStatus::new(started_at),
        }
    }

    pub fn status(&self) -> &RunStatus {
        &self.status
    }

    pub fn phase(&self) -> PipelinePhase {
        self.status.phase
    }

    /// Enter `phase` and raise progress to its checkpoint. Returns false,
    /// leaving the state untouched, for a backwards or post-terminal move.
    pub fn enter(&mut self, phase: PipelinePhase) -> bool {
        if !self.status.phase.can_transition_to(phase) {
            tracing::warn!(
                "Ignoring phase transition {} -> {}",
                self.status.phase,
                phase
            );
            return false;
        }
        self.status.phase = phase;
        self.status.progress_percent = self.status.progress_percent.max(phase.checkpoint());
        self.touch();
        true
    }

    pub fn set_total(&mut self, total: usize) {
        self.status.total_count = total;
        self.touch();
    }

    pub fn set_processed(&mut self, processed: usize) {
        self.status.processed_count = processed;
        self.touch();
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.status.warnings.push(message);
        self.touch();
    }

    /// Record a fatal error and move to `Failed`. Progress is kept as is.
    pub fn fail(&mut self, message: impl Into<String>, phase: PipelinePhase) {
        let message = message.into();
        tracing::error!("Pipeline failed during {}: {}", phase, message);
        self.status.errors.push(message);
        if !self.status.phase.is_terminal() {
            self.status.failed_phase = Some(phase);
            self.status.phase = PipelinePhase::Failed;
        }
        self.touch();
    }

    fn touch(&mut self) {
        self.status.updated_at = Utc::now();
    }
}

/// Headline counts for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub sectors_requested: usize,
    pub sectors_failed: usize,
    pub instruments_scanned: usize,
    pub predictions_completed: usize,
    pub predictions_failed: usize,
    pub opportunities: usize,
    pub skipped_for_event_risk: usize,
    pub haircut_for_event_risk: usize,
    pub stale_models: usize,
    pub models_queued: usize,
}

/// Final result of a successful run; serialized as the day's state file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub status: String,
    pub run_date: NaiveDate,
    pub timestamp: DateTime<Utc>,
    pub execution_time_seconds: f64,
    pub summary: RunSummary,
    pub statistics: PredictionStats,
    pub market_sentiment: SentimentSnapshot,
    pub top_opportunities: Vec<Opportunity>,
    pub report_path: String,
    pub csv_paths: BTreeMap<String, String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub training_queue: Vec<TrainingQueueEntry>,
    pub event_risk: AdjustmentSummary,
    /// Full ranked list; the state file only carries the top slice
    #[serde(skip)]
    pub opportunities: Vec<Opportunity>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_follows_checkpoints() {
        let mut state = PipelineRunState::new(Utc::now());
        assert!(state.enter(PipelinePhase::MarketSentiment));
        assert!(state.enter(PipelinePhase::StockScanning));
        assert_eq!(state.status().progress_percent, 20);

        assert!(!state.enter(PipelinePhase::MarketSentiment));
        assert_eq!(state.phase(), PipelinePhase::StockScanning);
        assert_eq!(state.status().progress_percent, 20);
    }

    #[test]
    fn test_fail_records_phase_and_keeps_progress() {
        let mut state = PipelineRunState::new(Utc::now());
        state.enter(PipelinePhase::MarketSentiment);
        state.enter(PipelinePhase::StockScanning);
        state.fail("no instruments", PipelinePhase::StockScanning);

        let status = state.status();
        assert_eq!(status.phase, PipelinePhase::Failed);
        assert_eq!(status.failed_phase, Some(PipelinePhase::StockScanning));
        assert_eq!(status.progress_percent, 20);
        assert_eq!(status.errors, vec!["no instruments".to_string()]);
        assert!(!state.enter(PipelinePhase::Complete));
    }
}
