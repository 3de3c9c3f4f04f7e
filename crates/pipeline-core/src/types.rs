//! Records shared by every pipeline phase.
//!
//! Optional-field policy: an `Option` field means "the producing collaborator
//! did not supply it". Consumers render `None` explicitly (e.g. "N/A") and
//! never substitute a numeric default at the call site.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single tradable security captured during one run's scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    pub name: String,
    pub sector: String,
    pub last_price: f64,
    pub scanned_at: DateTime<Utc>,
}

/// Directional bias of the market-wide sentiment snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketBias {
    Bullish,
    Neutral,
    Bearish,
}

impl MarketBias {
    /// Bias implied by a 0-100 sentiment score.
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 60.0 => MarketBias::Bullish,
            s if s <= 40.0 => MarketBias::Bearish,
            _ => MarketBias::Neutral,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MarketBias::Bullish => "bullish",
            MarketBias::Neutral => "neutral",
            MarketBias::Bearish => "bearish",
        }
    }
}

impl FromStr for MarketBias {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bullish" | "bull" | "positive" => Ok(MarketBias::Bullish),
            "neutral" => Ok(MarketBias::Neutral),
            "bearish" | "bear" | "negative" => Ok(MarketBias::Bearish),
            other => Err(format!("unknown market bias '{other}'")),
        }
    }
}

/// One market-wide sentiment reading per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentSnapshot {
    /// 0 (extreme fear) to 100 (extreme greed)
    pub score: f64,
    pub bias: MarketBias,
    pub recommendation: String,
}

impl SentimentSnapshot {
    pub const NEUTRAL_SCORE: f64 = 50.0;

    /// Default used whenever the sentiment collaborator fails.
    pub fn neutral() -> Self {
        Self {
            score: Self::NEUTRAL_SCORE,
            bias: MarketBias::Neutral,
            recommendation: "Sentiment unavailable; treating market as neutral".to_string(),
        }
    }
}

impl Default for SentimentSnapshot {
    fn default() -> Self {
        Self::neutral()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Earnings,
    Regulatory,
    Dividend,
    None,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Earnings => "earnings",
            EventType::Regulatory => "regulatory",
            EventType::Dividend => "dividend",
            EventType::None => "none",
        }
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "earnings" => Ok(EventType::Earnings),
            "regulatory" | "fda" | "regulation" => Ok(EventType::Regulatory),
            "dividend" | "ex_dividend" | "ex-dividend" => Ok(EventType::Dividend),
            "none" => Ok(EventType::None),
            other => Err(format!("unknown event type '{other}'")),
        }
    }
}

/// Near-term event risk annotation for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRisk {
    /// 0.0 (no risk) to 1.0
    pub risk_score: f64,
    pub event_type: EventType,
    pub days_to_event: Option<i64>,
    pub skip_trading: bool,
    /// Multiplicative confidence reduction, 0.0 to 1.0
    pub weight_haircut: f64,
    pub warning_message: Option<String>,
}

impl EventRisk {
    /// Annotation for symbols the assessor did not flag.
    pub fn none() -> Self {
        Self {
            risk_score: 0.0,
            event_type: EventType::None,
            days_to_event: None,
            skip_trading: false,
            weight_haircut: 0.0,
            warning_message: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Buy => "BUY",
            Signal::Sell => "SELL",
            Signal::Hold => "HOLD",
        }
    }

    pub fn is_directional(&self) -> bool {
        !matches!(self, Signal::Hold)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Signal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" | "STRONG_BUY" | "STRONGBUY" => Ok(Signal::Buy),
            "SELL" | "STRONG_SELL" | "STRONGSELL" => Ok(Signal::Sell),
            "HOLD" | "NEUTRAL" => Ok(Signal::Hold),
            other => Err(format!("unknown signal '{other}'")),
        }
    }
}

/// Per-instrument model output. Mutated only by the event-risk adjustment
/// step, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub symbol: String,
    pub signal: Signal,
    /// 0-100
    pub confidence: f64,
    pub raw_model_output: Option<f64>,
    /// Set when event risk forced the signal to HOLD
    pub skip_reason: Option<String>,
    /// Set on placeholder predictions standing in for a failed model call
    pub error: Option<String>,
}

impl Prediction {
    pub fn new(symbol: impl Into<String>, signal: Signal, confidence: f64) -> Self {
        Self {
            symbol: symbol.into(),
            signal,
            confidence: confidence.clamp(0.0, 100.0),
            raw_model_output: None,
            skip_reason: None,
            error: None,
        }
    }

    /// Neutral HOLD / zero-confidence stand-in for a failed prediction.
    pub fn placeholder(symbol: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(symbol, Signal::Hold, 0.0)
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.error.is_some()
    }
}

/// Components that make up an opportunity score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub confidence: f64,
    pub sentiment: f64,
    pub signal: f64,
    pub risk_penalty: f64,
}

/// Ranked, read-only terminal artifact of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub symbol: String,
    pub name: String,
    pub sector: String,
    pub last_price: f64,
    pub signal: Signal,
    pub confidence: f64,
    /// 0-100
    pub opportunity_score: f64,
    /// 1-based
    pub rank: usize,
    pub components: ScoreBreakdown,
    pub skip_reason: Option<String>,
}

/// Registry view of one symbol's predictive model, recomputed every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub exists: bool,
    pub last_trained_at: Option<DateTime<Utc>>,
    pub age_days: Option<i64>,
}

impl ModelRecord {
    pub fn missing() -> Self {
        Self {
            exists: false,
            last_trained_at: None,
            age_days: None,
        }
    }

    pub fn trained_at(last_trained_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            exists: true,
            last_trained_at: Some(last_trained_at),
            age_days: Some((now - last_trained_at).num_days()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingQueueEntry {
    pub symbol: String,
    pub opportunity_score: f64,
    /// 1-based
    pub priority_rank: usize,
}

/// Fixed phase sequence of a nightly run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    Initializing,
    MarketSentiment,
    StockScanning,
    EventRiskAssessment,
    Prediction,
    Scoring,
    ReportGeneration,
    Complete,
    Failed,
}

impl PipelinePhase {
    /// Non-terminal phases in execution order.
    pub const SEQUENCE: [PipelinePhase; 8] = [
        PipelinePhase::Initializing,
        PipelinePhase::MarketSentiment,
        PipelinePhase::StockScanning,
        PipelinePhase::EventRiskAssessment,
        PipelinePhase::Prediction,
        PipelinePhase::Scoring,
        PipelinePhase::ReportGeneration,
        PipelinePhase::Complete,
    ];

    fn ordinal(&self) -> usize {
        match self {
            PipelinePhase::Initializing => 0,
            PipelinePhase::MarketSentiment => 1,
            PipelinePhase::StockScanning => 2,
            PipelinePhase::EventRiskAssessment => 3,
            PipelinePhase::Prediction => 4,
            PipelinePhase::Scoring => 5,
            PipelinePhase::ReportGeneration => 6,
            PipelinePhase::Complete => 7,
            PipelinePhase::Failed => 8,
        }
    }

    /// Progress reported when the phase starts.
    pub fn checkpoint(&self) -> u8 {
        match self {
            PipelinePhase::Initializing => 0,
            PipelinePhase::MarketSentiment => 10,
            PipelinePhase::StockScanning => 20,
            PipelinePhase::EventRiskAssessment => 35,
            PipelinePhase::Prediction => 50,
            PipelinePhase::Scoring => 70,
            PipelinePhase::ReportGeneration => 85,
            PipelinePhase::Complete => 100,
            PipelinePhase::Failed => 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelinePhase::Complete | PipelinePhase::Failed)
    }

    /// Forward-only through the sequence; `Failed` from any non-terminal phase.
    pub fn can_transition_to(&self, next: PipelinePhase) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == PipelinePhase::Failed {
            return true;
        }
        next.ordinal() > self.ordinal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelinePhase::Initializing => "initializing",
            PipelinePhase::MarketSentiment => "market_sentiment",
            PipelinePhase::StockScanning => "stock_scanning",
            PipelinePhase::EventRiskAssessment => "event_risk_assessment",
            PipelinePhase::Prediction => "prediction",
            PipelinePhase::Scoring => "scoring",
            PipelinePhase::ReportGeneration => "report_generation",
            PipelinePhase::Complete => "complete",
            PipelinePhase::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_transitions_are_forward_only() {
        assert!(PipelinePhase::Initializing.can_transition_to(PipelinePhase::MarketSentiment));
        assert!(PipelinePhase::Prediction.can_transition_to(PipelinePhase::Scoring));
        assert!(!PipelinePhase::Scoring.can_transition_to(PipelinePhase::Prediction));
        assert!(!PipelinePhase::Scoring.can_transition_to(PipelinePhase::Scoring));
        assert!(PipelinePhase::StockScanning.can_transition_to(PipelinePhase::Failed));
        assert!(!PipelinePhase::Complete.can_transition_to(PipelinePhase::Failed));
        assert!(!PipelinePhase::Failed.can_transition_to(PipelinePhase::Complete));
    }

    #[test]
    fn test_checkpoints_increase_along_sequence() {
        let checkpoints: Vec<u8> = PipelinePhase::SEQUENCE.iter().map(|p| p.checkpoint()).collect();
        assert!(checkpoints.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(checkpoints.last(), Some(&100));
    }

    #[test]
    fn test_signal_parsing() {
        assert_eq!("buy".parse::<Signal>().unwrap(), Signal::Buy);
        assert_eq!("STRONG_SELL".parse::<Signal>().unwrap(), Signal::Sell);
        assert_eq!(" neutral ".parse::<Signal>().unwrap(), Signal::Hold);
        assert!("moon".parse::<Signal>().is_err());
    }

    #[test]
    fn test_placeholder_prediction() {
        let p = Prediction::placeholder("AAPL", "model offline");
        assert_eq!(p.signal, Signal::Hold);
        assert_eq!(p.confidence, 0.0);
        assert!(p.is_placeholder());
    }

    #[test]
    fn test_model_record_age() {
        let now = Utc::now();
        let record = ModelRecord::trained_at(now - chrono::Duration::days(9), now);
        assert!(record.exists);
        assert_eq!(record.age_days, Some(9));
        assert!(!ModelRecord::missing().exists);
    }

    #[test]
    fn test_bias_from_score() {
        assert_eq!(MarketBias::from_score(75.0), MarketBias::Bullish);
        assert_eq!(MarketBias::from_score(50.0), MarketBias::Neutral);
        assert_eq!(MarketBias::from_score(20.0), MarketBias::Bearish);
    }

    #[test]
    fn test_serialized_names() {
        assert_eq!(serde_json::to_string(&Signal::Hold).unwrap(), "\"HOLD\"");
        assert_eq!(
            serde_json::to_string(&PipelinePhase::EventRiskAssessment).unwrap(),
            "\"event_risk_assessment\""
        );
    }
}
