use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use pipeline_core::{Instrument, Prediction, PredictionError, Predictor, SentimentSnapshot};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::stats::PredictionStats;

/// Result of one batch: exactly one prediction per distinct input symbol.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub predictions: HashMap<String, Prediction>,
    pub stats: PredictionStats,
    pub failed_symbols: Vec<String>,
    pub duration_ms: u64,
}

/// Fans per-instrument predictions out over a bounded pool of tasks.
///
/// At most `workers` predictions are in flight. Results come back in
/// completion order and are keyed by symbol; a failed or panicked task
/// yields a HOLD / zero-confidence placeholder instead of aborting the batch.
pub struct BatchPredictor {
    predictor: Arc<dyn Predictor>,
    workers: usize,
    high_confidence_threshold: f64,
}

impl BatchPredictor {
    pub fn new(predictor: Arc<dyn Predictor>, workers: usize) -> Self {
        Self {
            predictor,
            workers: workers.max(1),
            high_confidence_threshold: 70.0,
        }
    }

    pub fn with_high_confidence_threshold(mut self, threshold: f64) -> Self {
        self.high_confidence_threshold = threshold;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub async fn predict_batch(
        &self,
        instruments: &[Instrument],
        sentiment: &SentimentSnapshot,
    ) -> BatchOutcome {
        let started = Instant::now();
        let total = instruments.len();
        tracing::info!(
            "Predicting {} instruments with {} workers",
            total,
            self.workers
        );

        let sentiment = Arc::new(sentiment.clone());
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let completed = Arc::new(AtomicUsize::new(0));
        let mut tasks = JoinSet::new();
        let mut task_symbols = HashMap::with_capacity(total);

        for instrument in instruments.iter().cloned() {
            let predictor = Arc::clone(&self.predictor);
            let sentiment = Arc::clone(&sentiment);
            let semaphore = Arc::clone(&semaphore);
            let completed = Arc::clone(&completed);
            let symbol = instrument.symbol.clone();

            let handle = tasks.spawn(async move {
                let result = match semaphore.acquire().await {
                    Ok(_permit) => predictor.predict(&instrument, &sentiment).await,
                    Err(e) => Err(PredictionError::Aborted(e.to_string())),
                };
                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::debug!("[{}/{}] {} prediction finished", done, total, instrument.symbol);
                (instrument.symbol, result)
            });
            task_symbols.insert(handle.id(), symbol);
        }

        let mut outcome = BatchOutcome::default();
        while let Some(joined) = tasks.join_next_with_id().await {
            let (symbol, result) = match joined {
                Ok((_, pair)) => pair,
                Err(e) => {
                    let Some(symbol) = task_symbols.get(&e.id()).cloned() else {
                        tracing::error!("Prediction task for unknown symbol failed: {}", e);
                        continue;
                    };
                    (symbol, Err(PredictionError::Aborted(e.to_string())))
                }
            };

            match result {
                Ok(mut prediction) => {
                    if prediction.symbol != symbol {
                        tracing::warn!(
                            "Predictor returned symbol {} for {}; re-keying",
                            prediction.symbol,
                            symbol
                        );
                        prediction.symbol = symbol.clone();
                    }
                    prediction.confidence = if prediction.confidence.is_finite() {
                        prediction.confidence.clamp(0.0, 100.0)
                    } else {
                        0.0
                    };
                    outcome.predictions.insert(symbol, prediction);
                }
                Err(e) => {
                    tracing::warn!("Prediction failed for {}: {}", symbol, e);
                    outcome.failed_symbols.push(symbol.clone());
                    outcome
                        .predictions
                        .insert(symbol.clone(), Prediction::placeholder(symbol, e.to_string()));
                }
            }
        }

        outcome.failed_symbols.sort();
        outcome.stats = PredictionStats::from_predictions(
            outcome.predictions.values(),
            self.high_confidence_threshold,
        );
        outcome.duration_ms = started.elapsed().as_millis() as u64;

        tracing::info!(
            total = outcome.stats.total,
            completed = outcome.stats.completed,
            failed = outcome.stats.failed,
            buy = outcome.stats.buy_signals,
            sell = outcome.stats.sell_signals,
            hold = outcome.stats.hold_signals,
            mean_confidence = outcome.stats.mean_confidence,
            duration_ms = outcome.duration_ms,
            "Batch prediction complete"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use pipeline_core::Signal;
    use std::time::Duration;

    /// Predicts BUY with confidence = price, fails on "ERR", panics on "BOOM".
    struct PricePredictor {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl PricePredictor {
        fn new() -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Predictor for PricePredictor {
        async fn predict(
            &self,
            instrument: &Instrument,
            _sentiment: &SentimentSnapshot,
        ) -> Result<Prediction, PredictionError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match instrument.symbol.as_str() {
                "ERR" => Err(PredictionError::Model("no features".into())),
                "BOOM" => panic!("model crashed"),
                _ => Ok(Prediction::new(&instrument.symbol, Signal::Buy, instrument.last_price)),
            }
        }
    }

    fn instrument(symbol: &str, price: f64) -> Instrument {
        Instrument {
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            sector: "technology".to_string(),
            last_price: price,
            scanned_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_one_prediction_per_instrument() {
        let predictor = BatchPredictor::new(Arc::new(PricePredictor::new()), 4);
        let instruments: Vec<Instrument> = (0..20)
            .map(|i| instrument(&format!("S{i:02}"), 50.0 + i as f64))
            .collect();

        let outcome = predictor
            .predict_batch(&instruments, &SentimentSnapshot::neutral())
            .await;

        assert_eq!(outcome.predictions.len(), 20);
        assert_eq!(outcome.stats.completed, 20);
        assert_eq!(outcome.predictions["S05"].confidence, 55.0);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let inner = Arc::new(PricePredictor::new());
        let predictor = BatchPredictor::new(inner.clone(), 3);
        let instruments: Vec<Instrument> =
            (0..12).map(|i| instrument(&format!("S{i}"), 60.0)).collect();

        predictor
            .predict_batch(&instruments, &SentimentSnapshot::neutral())
            .await;

        assert!(inner.max_in_flight.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_failures_become_placeholders() {
        let predictor = BatchPredictor::new(Arc::new(PricePredictor::new()), 2);
        let instruments = vec![
            instrument("AAPL", 90.0),
            instrument("ERR", 10.0),
            instrument("BOOM", 10.0),
        ];

        let outcome = predictor
            .predict_batch(&instruments, &SentimentSnapshot::neutral())
            .await;

        assert_eq!(outcome.predictions.len(), 3);
        assert_eq!(outcome.failed_symbols, vec!["BOOM".to_string(), "ERR".to_string()]);
        let err = &outcome.predictions["ERR"];
        assert_eq!(err.signal, Signal::Hold);
        assert_eq!(err.confidence, 0.0);
        assert!(outcome.predictions["BOOM"].is_placeholder());
        assert_eq!(outcome.stats.completed, 1);
        assert_eq!(outcome.stats.mean_confidence, 90.0);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let predictor = BatchPredictor::new(Arc::new(PricePredictor::new()), 0);
        assert_eq!(predictor.workers(), 1);
        let outcome = predictor
            .predict_batch(&[], &SentimentSnapshot::neutral())
            .await;
        assert!(outcome.predictions.is_empty());
    }
}
