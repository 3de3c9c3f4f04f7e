use async_trait::async_trait;

use crate::{Alert, AlertType, NotificationChannel, NotificationError};

const MAX_EMBED_FIELDS: usize = 10;

fn inline_field(name: &str, value: &usize) -> serde_json::Value {
    serde_json::json!({"name": name, "value": value.to_string(), "inline": true})
}

/// Discord webhook notifier.
pub struct DiscordWebhookNotifier {
    webhook_url: String,
    client: reqwest::Client,
}

impl DiscordWebhookNotifier {
    pub fn new(webhook_url: String) -> Self {
        Self {
            webhook_url,
            client: reqwest::Client::new(),
        }
    }

    pub(crate) fn payload(alert: &Alert) -> serde_json::Value {
        let (color, fields) = match &alert.alert_type {
            AlertType::PipelineCompleted {
                instruments_scanned,
                opportunities,
                models_queued,
                top_picks,
                ..
            } => {
                let mut fields = vec![
                    inline_field("Scanned", instruments_scanned),
                    inline_field("Opportunities", opportunities),
                    inline_field("Models queued", models_queued),
                ];
                fields.extend(top_picks.iter().take(MAX_EMBED_FIELDS - 3).map(|p| {
                    serde_json::json!({
                        "name": p.symbol,
                        "value": format!(
                            "{} | conf {:.0}% | score {:.1}",
                            p.signal, p.confidence, p.opportunity_score
                        ),
                        "inline": false,
                    })
                }));
                (0x00ff00, fields)
            }
            AlertType::PipelineFailed { phase, .. } => (
                0xff0000,
                vec![serde_json::json!({"name": "Phase", "value": phase, "inline": true})],
            ),
        };

        serde_json::json!({
            "embeds": [{
                "title": alert.title,
                "description": alert.message,
                "color": color,
                "fields": fields,
                "timestamp": alert.timestamp.to_rfc3339(),
            }]
        })
    }
}

#[async_trait]
impl NotificationChannel for DiscordWebhookNotifier {
    async fn send(&self, alert: &Alert) -> Result<(), NotificationError> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&Self::payload(alert))
            .send()
            .await
            .map_err(|e| NotificationError::Discord(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotificationError::Discord(format!(
                "HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "discord-webhook"
    }
}
