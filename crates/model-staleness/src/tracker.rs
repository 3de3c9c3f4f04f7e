use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use pipeline_core::{ModelRecord, ModelRegistry, RegistryError};

/// Staleness of every symbol checked in one run.
#[derive(Debug, Clone, Default)]
pub struct StalenessReport {
    pub stale: BTreeSet<String>,
    pub records: HashMap<String, ModelRecord>,
    /// Symbols whose registry lookup failed; they are also in `stale`.
    pub registry_failures: Vec<String>,
}

/// Decides which symbols need their model (re)trained, independent of the
/// current run's predictions.
pub struct ModelStalenessTracker {
    registry: Arc<dyn ModelRegistry>,
    stale_threshold_days: i64,
}

impl ModelStalenessTracker {
    pub fn new(registry: Arc<dyn ModelRegistry>, stale_threshold_days: i64) -> Self {
        Self {
            registry,
            stale_threshold_days,
        }
    }

    pub fn stale_threshold_days(&self) -> i64 {
        self.stale_threshold_days
    }

    /// No model, or trained more than the threshold ago. A threshold too
    /// large to represent never expires a model by age.
    pub fn record_is_stale(&self, record: &ModelRecord, now: DateTime<Utc>) -> bool {
        match (record.exists, record.last_trained_at) {
            (true, Some(trained)) => Duration::try_days(self.stale_threshold_days)
                .is_some_and(|threshold| now - trained > threshold),
            _ => true,
        }
    }

    pub async fn is_stale(
        &self,
        symbol: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, RegistryError> {
        let record = self.registry.record(symbol, now).await?;
        Ok(self.record_is_stale(&record, now))
    }

    /// Check every symbol. A failed lookup counts as stale.
    pub async fn stale_symbols(
        &self,
        symbols: &[String],
        now: DateTime<Utc>,
    ) -> StalenessReport {
        let mut report = StalenessReport::default();

        for symbol in symbols {
            match self.registry.record(symbol, now).await {
                Ok(record) => {
                    if self.record_is_stale(&record, now) {
                        report.stale.insert(symbol.clone());
                    }
                    report.records.insert(symbol.clone(), record);
                }
                Err(e) => {
                    tracing::debug!("Model registry lookup failed for {}: {}", symbol, e);
                    report.registry_failures.push(symbol.clone());
                    report.stale.insert(symbol.clone());
                }
            }
        }

        tracing::info!(
            checked = symbols.len(),
            stale = report.stale.len(),
            registry_failures = report.registry_failures.len(),
            "Model staleness check complete"
        );
        report
    }
}
