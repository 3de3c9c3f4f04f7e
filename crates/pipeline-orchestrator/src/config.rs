use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use universe_scanner::DEFAULT_SECTORS;

/// 100 years.
pub const MAX_STALE_THRESHOLD_DAYS: i64 = 36_500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    // Universe
    pub sectors: Vec<String>,
    pub stocks_per_sector: usize,          // 20

    // Prediction
    pub prediction_workers: usize,         // 8
    pub high_confidence_threshold: f64,    // 70

    // Model retraining
    pub stale_threshold_days: i64,         // 7
    pub max_models_per_night: usize,       // 20
    pub training_priority: String,         // "highest_score"

    // Output
    pub report_top_n: usize,               // 20
    pub state_dir: PathBuf,
    pub report_dir: PathBuf,

    // Collaborators
    pub model_dir: PathBuf,
    pub universe_dir: PathBuf,
    pub event_calendar_path: Option<PathBuf>,
    pub sentiment_service_url: String,     // http://localhost:8002
    pub ml_service_url: String,            // http://localhost:8004
    pub collaborator_timeout: Duration,    // 30s

    /// Wall-clock budget for the whole run; unbounded when `None`
    pub run_budget: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sectors: DEFAULT_SECTORS.iter().map(|s| s.to_string()).collect(),
            stocks_per_sector: 20,
            prediction_workers: 8,
            high_confidence_threshold: 70.0,
            stale_threshold_days: 7,
            max_models_per_night: 20,
            training_priority: "highest_score".to_string(),
            report_top_n: 20,
            state_dir: PathBuf::from("data/pipeline_state"),
            report_dir: PathBuf::from("reports"),
            model_dir: PathBuf::from("models"),
            universe_dir: PathBuf::from("data/universe"),
            event_calendar_path: None,
            sentiment_service_url: "http://localhost:8002".to_string(),
            ml_service_url: "http://localhost:8004".to_string(),
            collaborator_timeout: Duration::from_secs(30),
            run_budget: None,
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {key}: '{raw}'")),
        None => Ok(default),
    }
}

impl PipelineConfig {
    /// Load from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let config = Self::from_lookup(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let path_or = |key: &str, default: PathBuf| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(default)
        };

        let sectors = match lookup("PIPELINE_SECTORS").filter(|v| !v.trim().is_empty()) {
            Some(raw) => parse_sector_list(&raw),
            None => defaults.sectors,
        };

        let run_budget = match lookup("RUN_BUDGET_SECS").filter(|v| !v.trim().is_empty()) {
            Some(raw) => Some(Duration::from_secs(
                raw.trim()
                    .parse()
                    .with_context(|| format!("Invalid value for RUN_BUDGET_SECS: '{raw}'"))?,
            )),
            None => None,
        };

        Ok(Self {
            sectors,
            stocks_per_sector: parse_or(&lookup, "STOCKS_PER_SECTOR", defaults.stocks_per_sector)?,
            prediction_workers: parse_or(
                &lookup,
                "PREDICTION_WORKERS",
                defaults.prediction_workers,
            )?,
            high_confidence_threshold: parse_or(
                &lookup,
                "HIGH_CONFIDENCE_THRESHOLD",
                defaults.high_confidence_threshold,
            )?,
            stale_threshold_days: parse_or(
                &lookup,
                "STALE_THRESHOLD_DAYS",
                defaults.stale_threshold_days,
            )?,
            max_models_per_night: parse_or(
                &lookup,
                "MAX_MODELS_PER_NIGHT",
                defaults.max_models_per_night,
            )?,
            training_priority: lookup("TRAINING_PRIORITY")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.training_priority),
            report_top_n: parse_or(&lookup, "REPORT_TOP_N", defaults.report_top_n)?,
            state_dir: path_or("PIPELINE_STATE_DIR", defaults.state_dir),
            report_dir: path_or("PIPELINE_REPORT_DIR", defaults.report_dir),
            model_dir: path_or("MODEL_DIR", defaults.model_dir),
            universe_dir: path_or("UNIVERSE_DIR", defaults.universe_dir),
            event_calendar_path: lookup("EVENT_CALENDAR_PATH")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            sentiment_service_url: lookup("SENTIMENT_SERVICE_URL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.sentiment_service_url),
            ml_service_url: lookup("ML_SERVICE_URL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.ml_service_url),
            collaborator_timeout: Duration::from_secs(parse_or(
                &lookup,
                "COLLABORATOR_TIMEOUT_SECS",
                defaults.collaborator_timeout.as_secs(),
            )?),
            run_budget,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.sectors.is_empty() {
            bail!("PIPELINE_SECTORS must name at least one sector");
        }
        if self.stocks_per_sector == 0 {
            bail!("STOCKS_PER_SECTOR must be at least 1");
        }
        if self.prediction_workers == 0 {
            bail!("PREDICTION_WORKERS must be at least 1");
        }
        if !(0..=MAX_STALE_THRESHOLD_DAYS).contains(&self.stale_threshold_days) {
            bail!(
                "STALE_THRESHOLD_DAYS must be within 0-{} (got {})",
                MAX_STALE_THRESHOLD_DAYS,
                self.stale_threshold_days
            );
        }
        if !(0.0..=100.0).contains(&self.high_confidence_threshold) {
            bail!(
                "HIGH_CONFIDENCE_THRESHOLD must be within 0-100 (got {})",
                self.high_confidence_threshold
            );
        }
        if model_staleness::priority_from_name(&self.training_priority).is_none() {
            bail!(
                "Unsupported TRAINING_PRIORITY '{}' (supported: highest_score)",
                self.training_priority
            );
        }
        if self.collaborator_timeout.is_zero() {
            bail!("COLLABORATOR_TIMEOUT_SECS must be at least 1");
        }
        if self.run_budget.is_some_and(|b| b.is_zero()) {
            bail!("RUN_BUDGET_SECS must be at least 1 when set");
        }
        Ok(())
    }
}

pub(crate) fn parse_sector_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
