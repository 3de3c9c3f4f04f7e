use pipeline_core::{Prediction, Signal};
use serde::{Deserialize, Serialize};

/// Aggregate prediction statistics. Signal counts and confidence figures
/// cover completed predictions only; placeholders are counted as failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionStats {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub buy_signals: usize,
    pub sell_signals: usize,
    pub hold_signals: usize,
    pub mean_confidence: f64,
    pub high_confidence_count: usize,
    pub high_confidence_threshold: f64,
}

impl PredictionStats {
    pub fn from_predictions<'a>(
        predictions: impl IntoIterator<Item = &'a Prediction>,
        high_confidence_threshold: f64,
    ) -> Self {
        let mut stats = Self {
            high_confidence_threshold,
            ..Self::default()
        };
        let mut confidence_sum = 0.0;

        for prediction in predictions {
            stats.total += 1;
            if prediction.is_placeholder() {
                stats.failed += 1;
                continue;
            }
            stats.completed += 1;
            match prediction.signal {
                Signal::Buy => stats.buy_signals += 1,
                Signal::Sell => stats.sell_signals += 1,
                Signal::Hold => stats.hold_signals += 1,
            }
            confidence_sum += prediction.confidence;
            if prediction.confidence >= high_confidence_threshold {
                stats.high_confidence_count += 1;
            }
        }

        if stats.completed > 0 {
            stats.mean_confidence = confidence_sum / stats.completed as f64;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_excluded_from_aggregates() {
        let predictions = vec![
            Prediction::new("AAA", Signal::Buy, 80.0),
            Prediction::new("BBB", Signal::Sell, 60.0),
            Prediction::new("CCC", Signal::Hold, 40.0),
            Prediction::placeholder("DDD", "timeout"),
        ];

        let stats = PredictionStats::from_predictions(&predictions, 70.0);

        assert_eq!(stats.total, 4);
        assert_eq!(stats.completed, 3);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.buy_signals, 1);
        assert_eq!(stats.hold_signals, 1);
        assert!((stats.mean_confidence - 60.0).abs() < 1e-9);
        assert_eq!(stats.high_confidence_count, 1);
    }

    #[test]
    fn test_empty_batch() {
        let stats = PredictionStats::from_predictions(&Vec::new(), 70.0);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.mean_confidence, 0.0);
    }
}
