use std::collections::HashMap;

use pipeline_core::{
    EventRisk, Instrument, Opportunity, Prediction, ScoreBreakdown, SentimentSnapshot, Signal,
};
use serde::{Deserialize, Serialize};

/// Weights for the scoring components. Each component is on a 0-100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    /// Weight for (risk-adjusted) prediction confidence
    pub confidence_weight: f64,
    /// Weight for agreement between the signal and market sentiment
    pub sentiment_weight: f64,
    /// Weight for having a directional signal at all
    pub signal_weight: f64,
    /// Weight subtracted per point of event risk
    pub risk_weight: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            confidence_weight: 0.50,
            sentiment_weight: 0.25,
            signal_weight: 0.25,
            risk_weight: 0.20,
        }
    }
}

/// Ranks scanned instruments into opportunities.
///
/// Output order is score descending, then symbol ascending, so identical
/// inputs always produce an identical ranking.
pub struct OpportunityScorer {
    weights: ScoringWeights,
}

impl Default for OpportunityScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl OpportunityScorer {
    pub fn new() -> Self {
        Self {
            weights: ScoringWeights::default(),
        }
    }

    pub fn with_weights(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    /// Score every instrument exactly once. An instrument without a
    /// prediction is scored as a failed (HOLD, zero-confidence) prediction.
    pub fn score(
        &self,
        instruments: &[Instrument],
        predictions: &HashMap<String, Prediction>,
        sentiment: &SentimentSnapshot,
        risks: &HashMap<String, EventRisk>,
    ) -> Vec<Opportunity> {
        let mut opportunities: Vec<Opportunity> = instruments
            .iter()
            .map(|instrument| {
                let prediction = predictions
                    .get(&instrument.symbol)
                    .cloned()
                    .unwrap_or_else(|| {
                        Prediction::placeholder(&instrument.symbol, "no prediction produced")
                    });
                let risk_score = risks
                    .get(&instrument.symbol)
                    .map(|r| r.risk_score)
                    .unwrap_or(0.0);
                self.build_opportunity(instrument, prediction, sentiment, risk_score)
            })
            .collect();

        opportunities.sort_by(|a, b| {
            b.opportunity_score
                .total_cmp(&a.opportunity_score)
                .then_with(|| a.symbol.cmp(&b.symbol))
        });
        for (i, opp) in opportunities.iter_mut().enumerate() {
            opp.rank = i + 1;
        }

        if let Some(top) = opportunities.first() {
            tracing::debug!(
                "Scored {} opportunities, top {} at {:.1}",
                opportunities.len(),
                top.symbol,
                top.opportunity_score
            );
        }
        opportunities
    }

    fn build_opportunity(
        &self,
        instrument: &Instrument,
        prediction: Prediction,
        sentiment: &SentimentSnapshot,
        risk_score: f64,
    ) -> Opportunity {
        let components = ScoreBreakdown {
            confidence: finite_or_zero(prediction.confidence).clamp(0.0, 100.0),
            sentiment: sentiment_alignment(prediction.signal, sentiment.score),
            signal: if prediction.signal.is_directional() { 100.0 } else { 0.0 },
            risk_penalty: finite_or_zero(risk_score).clamp(0.0, 1.0) * 100.0,
        };

        let w = &self.weights;
        let raw = components.confidence * w.confidence_weight
            + components.sentiment * w.sentiment_weight
            + components.signal * w.signal_weight
            - components.risk_penalty * w.risk_weight;

        Opportunity {
            symbol: instrument.symbol.clone(),
            name: instrument.name.clone(),
            sector: instrument.sector.clone(),
            last_price: instrument.last_price,
            signal: prediction.signal,
            confidence: components.confidence,
            opportunity_score: finite_or_zero(raw).clamp(0.0, 100.0),
            rank: 0,
            components,
            skip_reason: prediction.skip_reason,
        }
    }
}

/// How well the signal agrees with the market. HOLD is indifferent.
fn sentiment_alignment(signal: Signal, sentiment_score: f64) -> f64 {
    let s = finite_or_zero(sentiment_score).clamp(0.0, 100.0);
    match signal {
        Signal::Buy => s,
        Signal::Sell => 100.0 - s,
        Signal::Hold => 50.0,
    }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pipeline_core::{EventType, MarketBias};

    fn instrument(symbol: &str) -> Instrument {
        Instrument {
            symbol: symbol.to_string(),
            name: format!("{symbol} Corp"),
            sector: "technology".to_string(),
            last_price: 100.0,
            scanned_at: Utc::now(),
        }
    }

    fn sentiment(score: f64) -> SentimentSnapshot {
        SentimentSnapshot {
            score,
            bias: MarketBias::from_score(score),
            recommendation: String::new(),
        }
    }

    fn predictions(rows: &[(&str, Signal, f64)]) -> HashMap<String, Prediction> {
        rows.iter()
            .map(|(s, sig, c)| (s.to_string(), Prediction::new(*s, *sig, *c)))
            .collect()
    }

    #[test]
    fn test_ranks_by_score_then_symbol() {
        let instruments: Vec<Instrument> = ["MSFT", "AAPL", "NVDA", "AMZN"]
            .iter()
            .map(|s| instrument(s))
            .collect();
        let preds = predictions(&[
            ("MSFT", Signal::Buy, 80.0),
            ("AAPL", Signal::Buy, 80.0),
            ("NVDA", Signal::Buy, 95.0),
            ("AMZN", Signal::Hold, 60.0),
        ]);

        let opps =
            OpportunityScorer::new().score(&instruments, &preds, &sentiment(70.0), &HashMap::new());

        let order: Vec<&str> = opps.iter().map(|o| o.symbol.as_str()).collect();
        assert_eq!(order, vec!["NVDA", "AAPL", "MSFT", "AMZN"]);
        let ranks: Vec<usize> = opps.iter().map(|o| o.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_scoring_is_deterministic_and_does_not_mutate_inputs() {
        let instruments: Vec<Instrument> =
            (0..30).map(|i| instrument(&format!("S{i:02}"))).collect();
        let preds: HashMap<String, Prediction> = instruments
            .iter()
            .enumerate()
            .map(|(i, inst)| {
                let signal = match i % 3 {
                    0 => Signal::Buy,
                    1 => Signal::Sell,
                    _ => Signal::Hold,
                };
                (inst.symbol.clone(), Prediction::new(&inst.symbol, signal, (i % 5) as f64 * 20.0))
            })
            .collect();
        let risks: HashMap<String, EventRisk> = [(
            "S03".to_string(),
            EventRisk {
                risk_score: 0.4,
                event_type: EventType::Dividend,
                days_to_event: Some(2),
                skip_trading: false,
                weight_haircut: 0.1,
                warning_message: None,
            },
        )]
        .into_iter()
        .collect();
        let preds_before = preds.clone();

        let scorer = OpportunityScorer::new();
        let first = scorer.score(&instruments, &preds, &sentiment(55.0), &risks);
        let second = scorer.score(&instruments, &preds, &sentiment(55.0), &risks);

        assert_eq!(first, second);
        assert_eq!(preds, preds_before);
        assert_eq!(first.len(), instruments.len());
    }

    #[test]
    fn test_scores_stay_in_range() {
        let instruments = vec![instrument("HI"), instrument("LO")];
        let preds = predictions(&[("HI", Signal::Buy, 100.0), ("LO", Signal::Hold, 0.0)]);
        let risks: HashMap<String, EventRisk> = [(
            "LO".to_string(),
            EventRisk {
                risk_score: 1.0,
                event_type: EventType::Earnings,
                days_to_event: Some(1),
                skip_trading: true,
                weight_haircut: 0.0,
                warning_message: None,
            },
        )]
        .into_iter()
        .collect();

        let opps = OpportunityScorer::new().score(&instruments, &preds, &sentiment(100.0), &risks);
        assert_eq!(opps[0].opportunity_score, 100.0);
        assert_eq!(opps[1].opportunity_score, 0.0);
    }

    #[test]
    fn test_sell_aligns_with_bearish_market() {
        let instruments = vec![instrument("XOM")];
        let preds = predictions(&[("XOM", Signal::Sell, 70.0)]);
        let scorer = OpportunityScorer::new();

        let bearish = scorer.score(&instruments, &preds, &sentiment(20.0), &HashMap::new());
        let bullish = scorer.score(&instruments, &preds, &sentiment(80.0), &HashMap::new());
        assert!(bearish[0].opportunity_score > bullish[0].opportunity_score);
        assert_eq!(bearish[0].components.sentiment, 80.0);
    }

    #[test]
    fn test_missing_prediction_scored_as_hold() {
        let instruments = vec![instrument("GHOST")];
        let opps = OpportunityScorer::new().score(
            &instruments,
            &HashMap::new(),
            &sentiment(50.0),
            &HashMap::new(),
        );
        assert_eq!(opps.len(), 1);
        assert_eq!(opps[0].signal, Signal::Hold);
        assert_eq!(opps[0].confidence, 0.0);
    }
}
