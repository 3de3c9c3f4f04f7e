use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    CollaboratorError, EventRisk, Instrument, ModelRecord, Prediction, PredictionError,
    RegistryError, SentimentSnapshot,
};

/// Per-sector instrument fetch used by the universe scanner.
#[async_trait]
pub trait UniverseSource: Send + Sync {
    async fn fetch_sector(
        &self,
        sector: &str,
        limit: usize,
    ) -> Result<Vec<Instrument>, CollaboratorError>;

    fn name(&self) -> &str;
}

/// Market-wide sentiment for the whole run. Callers fall back to
/// `SentimentSnapshot::neutral()` on error.
#[async_trait]
pub trait MarketSentimentService: Send + Sync {
    async fn get_snapshot(&self) -> Result<SentimentSnapshot, CollaboratorError>;
}

/// Batch event-risk lookup. Symbols absent from the result carry no risk.
#[async_trait]
pub trait EventRiskAssessor: Send + Sync {
    async fn assess_batch(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, EventRisk>, CollaboratorError>;
}

/// Single-instrument prediction, invoked once per worker task.
#[async_trait]
pub trait Predictor: Send + Sync {
    async fn predict(
        &self,
        instrument: &Instrument,
        sentiment: &SentimentSnapshot,
    ) -> Result<Prediction, PredictionError>;
}

/// Current state of a symbol's trained model.
#[async_trait]
pub trait ModelRegistry: Send + Sync {
    async fn record(&self, symbol: &str, now: DateTime<Utc>)
        -> Result<ModelRecord, RegistryError>;
}
