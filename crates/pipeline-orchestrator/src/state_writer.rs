use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use pipeline_core::PipelinePhase;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::run_state::{RunResult, RunStatus};

/// Postmortem snapshot written only when a run fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorStateDocument {
    pub timestamp: DateTime<Utc>,
    pub error: String,
    pub traceback: Vec<String>,
    pub failed_phase: PipelinePhase,
    pub status: RunStatus,
}

/// Persists the dated state and error snapshots. One file per kind per
/// calendar day; a later run on the same day replaces the whole document.
#[derive(Debug, Clone)]
pub struct StateWriter {
    state_dir: PathBuf,
}

impl StateWriter {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    pub fn state_path(&self, run_date: NaiveDate) -> PathBuf {
        self.state_dir
            .join(format!("pipeline_state_{}.json", run_date.format("%Y%m%d")))
    }

    pub fn error_path(&self, run_date: NaiveDate) -> PathBuf {
        self.state_dir
            .join(format!("pipeline_error_{}.json", run_date.format("%Y%m%d")))
    }

    pub async fn write_state(&self, result: &RunResult) -> Result<PathBuf, PipelineError> {
        let path = self.state_path(result.run_date);
        let persistence_error = |source: io::Error| PipelineError::StatePersistence {
            path: path.display().to_string(),
            source,
        };

        let content = serde_json::to_vec_pretty(result)
            .map_err(io::Error::from)
            .map_err(persistence_error)?;
        self.write_atomic(&path, &content).await.map_err(persistence_error)?;

        tracing::info!("Saved pipeline state to {}", path.display());
        Ok(path)
    }

    pub async fn write_error(
        &self,
        run_date: NaiveDate,
        document: &ErrorStateDocument,
    ) -> io::Result<PathBuf> {
        let path = self.error_path(run_date);
        let content = serde_json::to_vec_pretty(document)?;
        self.write_atomic(&path, &content).await?;

        tracing::info!("Saved pipeline error state to {}", path.display());
        Ok(path)
    }

    async fn write_atomic(&self, path: &Path, content: &[u8]) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.state_dir).await?;
        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, content).await?;
        tokio::fs::rename(&temp_path, path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run_state::PipelineRunState;

    #[tokio::test]
    async fn test_error_document_round_trips_status() {
        let dir = tempfile::tempdir().unwrap();
        let writer = StateWriter::new(dir.path().join("state"));
        let mut state = PipelineRunState::new(Utc::now());
        state.enter(PipelinePhase::MarketSentiment);
        state.fail("boom", PipelinePhase::MarketSentiment);
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();

        let path = writer
            .write_error(
                date,
                &ErrorStateDocument {
                    timestamp: Utc::now(),
                    error: "boom".into(),
                    traceback: vec![],
                    failed_phase: PipelinePhase::MarketSentiment,
                    status: state.status().clone(),
                },
            )
            .await
            .unwrap();

        assert!(path.ends_with("pipeline_error_20261019.json"));
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["failed_phase"], "market_sentiment");
        assert_eq!(raw["status"]["phase"], "failed");
        assert!(!path.with_extension("json.tmp").exists());
    }
}
