use std::collections::HashMap;

use pipeline_core::{EventRisk, Prediction, Signal};
use serde::{Deserialize, Serialize};

/// Symbols touched by the adjustment step, sorted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentSummary {
    pub skipped: Vec<String>,
    pub haircut: Vec<String>,
}

/// Apply event risk to predictions in place, before scoring.
///
/// `skip_trading` forces HOLD and records the warning as the skip reason;
/// otherwise a positive haircut scales confidence by `1 - haircut`.
/// Predictions without a risk entry are left untouched.
pub fn apply_event_risk(
    predictions: &mut HashMap<String, Prediction>,
    risks: &HashMap<String, EventRisk>,
) -> AdjustmentSummary {
    let mut summary = AdjustmentSummary::default();

    for (symbol, prediction) in predictions.iter_mut() {
        let Some(risk) = risks.get(symbol) else {
            continue;
        };

        if risk.skip_trading {
            if prediction.signal != Signal::Hold {
                tracing::info!(
                    "{}: {} forced to HOLD by {} risk",
                    symbol,
                    prediction.signal,
                    risk.event_type.as_str()
                );
            }
            prediction.signal = Signal::Hold;
            prediction.skip_reason = Some(
                risk.warning_message
                    .clone()
                    .unwrap_or_else(|| format!("{} event risk", risk.event_type.as_str())),
            );
            summary.skipped.push(symbol.clone());
        } else if risk.weight_haircut > 0.0 {
            let haircut = risk.weight_haircut.clamp(0.0, 1.0);
            prediction.confidence = (prediction.confidence * (1.0 - haircut)).clamp(0.0, 100.0);
            summary.haircut.push(symbol.clone());
        }
    }

    summary.skipped.sort();
    summary.haircut.sort();
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline_core::EventType;

    fn risk(skip: bool, haircut: f64) -> EventRisk {
        EventRisk {
            risk_score: 0.8,
            event_type: EventType::Earnings,
            days_to_event: Some(1),
            skip_trading: skip,
            weight_haircut: haircut,
            warning_message: Some("Earnings in 1 day(s)".to_string()),
        }
    }

    fn predictions(entries: &[(&str, Signal, f64)]) -> HashMap<String, Prediction> {
        entries
            .iter()
            .map(|(s, sig, c)| (s.to_string(), Prediction::new(*s, *sig, *c)))
            .collect()
    }

    #[test]
    fn test_skip_forces_hold() {
        let mut preds = predictions(&[("XYZ", Signal::Buy, 90.0)]);
        let risks = HashMap::from([("XYZ".to_string(), risk(true, 0.0))]);

        let summary = apply_event_risk(&mut preds, &risks);

        assert_eq!(preds["XYZ"].signal, Signal::Hold);
        assert_eq!(preds["XYZ"].skip_reason.as_deref(), Some("Earnings in 1 day(s)"));
        assert_eq!(summary.skipped, vec!["XYZ".to_string()]);
    }

    #[test]
    fn test_haircut_scales_confidence_and_keeps_signal() {
        let mut preds = predictions(&[("ABC", Signal::Sell, 80.0)]);
        let risks = HashMap::from([("ABC".to_string(), risk(false, 0.25))]);

        let summary = apply_event_risk(&mut preds, &risks);

        assert_eq!(preds["ABC"].signal, Signal::Sell);
        assert!((preds["ABC"].confidence - 60.0).abs() < 1e-9);
        assert_eq!(summary.haircut, vec!["ABC".to_string()]);
    }

    #[test]
    fn test_symbols_without_risk_untouched() {
        let mut preds = predictions(&[("AAA", Signal::Buy, 70.0), ("BBB", Signal::Buy, 70.0)]);
        let risks = HashMap::from([("AAA".to_string(), risk(false, 0.5))]);

        apply_event_risk(&mut preds, &risks);

        assert_eq!(preds["BBB"].confidence, 70.0);
        assert_eq!(preds["BBB"].skip_reason, None);
    }

    #[test]
    fn test_zero_haircut_is_noop() {
        let mut preds = predictions(&[("AAA", Signal::Buy, 70.0)]);
        let risks = HashMap::from([("AAA".to_string(), risk(false, 0.0))]);

        let summary = apply_event_risk(&mut preds, &risks);

        assert_eq!(preds["AAA"].confidence, 70.0);
        assert!(summary.haircut.is_empty());
    }
}
