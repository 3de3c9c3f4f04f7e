use std::time::Duration;

use async_trait::async_trait;
use pipeline_core::{
    CollaboratorError, MarketBias, MarketSentimentService, RetryPolicy, SentimentSnapshot,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSentimentResponse {
    pub score: f64,
    #[serde(default)]
    pub bias: Option<String>,
    #[serde(default)]
    pub recommendation: Option<String>,
}

/// HTTP client for the market sentiment service (`GET /market-sentiment`).
#[derive(Clone)]
pub struct HttpSentimentService {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl HttpSentimentService {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, CollaboratorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CollaboratorError::Request(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn fetch_once(&self) -> Result<MarketSentimentResponse, CollaboratorError> {
        let response = self
            .client
            .get(format!("{}/market-sentiment", self.base_url))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CollaboratorError::Timeout(self.timeout)
                } else {
                    CollaboratorError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_server_error() {
            return Err(CollaboratorError::ServiceUnavailable(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(CollaboratorError::InvalidResponse(format!("HTTP {status}")));
        }

        response
            .json::<MarketSentimentResponse>()
            .await
            .map_err(|e| CollaboratorError::InvalidResponse(e.to_string()))
    }
}

/// Normalise a service response into a snapshot. Scores are clamped to
/// 0-100; a missing or unknown bias is derived from the score.
pub fn snapshot_from_response(
    response: MarketSentimentResponse,
) -> Result<SentimentSnapshot, CollaboratorError> {
    if !response.score.is_finite() {
        return Err(CollaboratorError::InvalidResponse(format!(
            "non-finite sentiment score {}",
            response.score
        )));
    }
    let score = response.score.clamp(0.0, 100.0);
    let bias = response
        .bias
        .as_deref()
        .and_then(|b| b.parse::<MarketBias>().ok())
        .unwrap_or_else(|| MarketBias::from_score(score));
    let recommendation = response
        .recommendation
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| default_recommendation(bias).to_string());

    Ok(SentimentSnapshot {
        score,
        bias,
        recommendation,
    })
}

fn default_recommendation(bias: MarketBias) -> &'static str {
    match bias {
        MarketBias::Bullish => "Risk-on conditions; favour long setups",
        MarketBias::Neutral => "Mixed conditions; be selective",
        MarketBias::Bearish => "Risk-off conditions; reduce exposure",
    }
}

#[async_trait]
impl MarketSentimentService for HttpSentimentService {
    async fn get_snapshot(&self) -> Result<SentimentSnapshot, CollaboratorError> {
        let response = self
            .retry
            .run("market sentiment", CollaboratorError::is_retryable, move || {
                self.fetch_once()
            })
            .await?;
        let snapshot = snapshot_from_response(response)?;
        tracing::info!(
            "Market sentiment: {:.1} ({})",
            snapshot.score,
            snapshot.bias.as_str()
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(score: f64, bias: Option<&str>) -> MarketSentimentResponse {
        MarketSentimentResponse {
            score,
            bias: bias.map(|b| b.to_string()),
            recommendation: None,
        }
    }

    #[test]
    fn test_score_is_clamped() {
        let snapshot = snapshot_from_response(response(140.0, None)).unwrap();
        assert_eq!(snapshot.score, 100.0);
        assert_eq!(snapshot.bias, MarketBias::Bullish);
    }

    #[test]
    fn test_explicit_bias_wins() {
        let snapshot = snapshot_from_response(response(65.0, Some("bearish"))).unwrap();
        assert_eq!(snapshot.bias, MarketBias::Bearish);
        assert!(!snapshot.recommendation.is_empty());
    }

    #[test]
    fn test_unknown_bias_falls_back_to_score() {
        let snapshot = snapshot_from_response(response(30.0, Some("sideways"))).unwrap();
        assert_eq!(snapshot.bias, MarketBias::Bearish);
    }

    #[test]
    fn test_nan_score_rejected() {
        assert!(snapshot_from_response(response(f64::NAN, None)).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_service_returns_error() {
        let service = HttpSentimentService::new(
            "http://127.0.0.1:9".to_string(),
            Duration::from_secs(2),
        )
        .unwrap()
        .with_retry(RetryPolicy::none());

        assert!(service.get_snapshot().await.is_err());
    }
}
