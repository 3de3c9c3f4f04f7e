use std::time::Duration;

use async_trait::async_trait;
use pipeline_core::{
    Instrument, Prediction, PredictionError, Predictor, RetryPolicy, SentimentSnapshot, Signal,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
struct PredictRequest<'a> {
    symbol: &'a str,
    last_price: f64,
    sector: &'a str,
    sentiment: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub signal: String,
    pub confidence: f64,
    #[serde(default)]
    pub predicted_return: Option<f64>,
}

/// Per-symbol predictor backed by the ML service (`POST /predict`).
#[derive(Clone)]
pub struct ModelServicePredictor {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl ModelServicePredictor {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, PredictionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PredictionError::Request(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::none(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn predict_once(
        &self,
        instrument: &Instrument,
        sentiment: &SentimentSnapshot,
    ) -> Result<PredictResponse, PredictionError> {
        let request = PredictRequest {
            symbol: &instrument.symbol,
            last_price: instrument.last_price,
            sector: &instrument.sector,
            sentiment: sentiment.score,
        };

        let response = self
            .client
            .post(format!("{}/predict", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| PredictionError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PredictionError::Model(format!("HTTP {status}: {body}")));
        }

        response
            .json::<PredictResponse>()
            .await
            .map_err(|e| PredictionError::InvalidResponse(e.to_string()))
    }
}

fn is_transport_error(e: &PredictionError) -> bool {
    matches!(e, PredictionError::Request(_))
}

/// Map a service response onto a prediction. Unknown signals are rejected;
/// confidence is clamped to 0-100.
pub fn prediction_from_response(
    symbol: &str,
    response: PredictResponse,
) -> Result<Prediction, PredictionError> {
    let signal: Signal = response
        .signal
        .parse()
        .map_err(PredictionError::InvalidResponse)?;
    if !response.confidence.is_finite() {
        return Err(PredictionError::InvalidResponse(format!(
            "non-finite confidence for {symbol}"
        )));
    }

    let mut prediction = Prediction::new(symbol, signal, response.confidence);
    prediction.raw_model_output = response.predicted_return;
    Ok(prediction)
}

#[async_trait]
impl Predictor for ModelServicePredictor {
    async fn predict(
        &self,
        instrument: &Instrument,
        sentiment: &SentimentSnapshot,
    ) -> Result<Prediction, PredictionError> {
        let label = format!("predict {}", instrument.symbol);
        let response = self
            .retry
            .run(&label, is_transport_error, move || {
                self.predict_once(instrument, sentiment)
            })
            .await?;
        prediction_from_response(&instrument.symbol, response)
    }
}
