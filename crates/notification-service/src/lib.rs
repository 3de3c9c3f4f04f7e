mod discord;
mod smtp;
mod templates;

pub use discord::DiscordWebhookNotifier;
pub use smtp::SmtpNotifier;
pub use templates::EmailTemplate;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One ranked pick included in a completion alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopPick {
    pub symbol: String,
    pub signal: String,
    pub confidence: f64,
    pub opportunity_score: f64,
}

/// Alert types raised by the nightly pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AlertType {
    PipelineCompleted {
        run_date: String,
        instruments_scanned: usize,
        opportunities: usize,
        models_queued: usize,
        warnings: usize,
        execution_time_seconds: f64,
        report_path: String,
        top_picks: Vec<TopPick>,
    },
    PipelineFailed {
        phase: String,
        error: String,
        traceback: Vec<String>,
    },
}

/// A notification alert to be dispatched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub alert_type: AlertType,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub title: String,
    pub message: String,
}

impl Alert {
    pub fn new(
        alert_type: AlertType,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            alert_type,
            timestamp: chrono::Utc::now(),
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.alert_type, AlertType::PipelineFailed { .. })
    }
}

/// Trait for notification channels.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, alert: &Alert) -> Result<(), NotificationError>;
    fn name(&self) -> &str;
}

/// Errors from the notification system.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("SMTP error: {0}")]
    Smtp(String),
    #[error("Discord webhook error: {0}")]
    Discord(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Configuration for the notification service.
#[derive(Debug, Clone, Default)]
pub struct NotificationConfig {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: Option<String>,
    pub smtp_to: Vec<String>,
    pub smtp_tls: SmtpTls,
    pub discord_webhook_url: Option<String>,
    /// Also alert on successful runs, not only failures
    pub notify_on_success: bool,
}

#[derive(Debug, Clone, Default)]
pub enum SmtpTls {
    #[default]
    StartTls,
    Tls,
    None,
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

impl NotificationConfig {
    /// Load from environment variables.
    pub fn from_env() -> Self {
        let smtp_to = std::env::var("NOTIFICATION_EMAIL_TO")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let smtp_tls = match std::env::var("SMTP_TLS").unwrap_or_default().as_str() {
            "tls" => SmtpTls::Tls,
            "none" => SmtpTls::None,
            _ => SmtpTls::StartTls,
        };

        Self {
            smtp_host: non_empty_var("SMTP_HOST"),
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(587),
            smtp_username: non_empty_var("SMTP_USERNAME"),
            smtp_password: non_empty_var("SMTP_PASSWORD"),
            smtp_from: non_empty_var("SMTP_FROM_ADDRESS"),
            smtp_to,
            smtp_tls,
            discord_webhook_url: non_empty_var("DISCORD_WEBHOOK_URL"),
            notify_on_success: std::env::var("NOTIFY_ON_SUCCESS")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
        }
    }

    pub fn smtp_configured(&self) -> bool {
        self.smtp_host.is_some() && self.smtp_from.is_some() && !self.smtp_to.is_empty()
    }
}

/// Dispatches alerts to every configured channel. Channel failures are
/// logged and never returned to the caller.
#[derive(Clone)]
pub struct NotificationService {
    channels: Arc<Vec<Box<dyn NotificationChannel>>>,
    notify_on_success: bool,
}

impl NotificationService {
    pub fn new(config: &NotificationConfig) -> Self {
        let mut channels: Vec<Box<dyn NotificationChannel>> = Vec::new();

        if config.smtp_configured() {
            match SmtpNotifier::new(config) {
                Ok(notifier) => {
                    tracing::info!(
                        "Email notifications enabled (SMTP -> {} recipients)",
                        config.smtp_to.len()
                    );
                    channels.push(Box::new(notifier));
                }
                Err(e) => {
                    tracing::warn!("Failed to initialize SMTP notifier: {}", e);
                }
            }
        }

        if let Some(ref webhook_url) = config.discord_webhook_url {
            channels.push(Box::new(DiscordWebhookNotifier::new(webhook_url.clone())));
            tracing::info!("Discord webhook notifications enabled");
        }

        if channels.is_empty() {
            tracing::info!(
                "No notification channels configured (set SMTP_HOST or DISCORD_WEBHOOK_URL)"
            );
        }

        Self {
            channels: Arc::new(channels),
            notify_on_success: config.notify_on_success,
        }
    }

    pub fn with_channels(channels: Vec<Box<dyn NotificationChannel>>) -> Self {
        Self {
            channels: Arc::new(channels),
            notify_on_success: true,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Send an alert to all channels, awaiting completion. Returns how many
    /// channels accepted it.
    pub async fn send_alert_async(&self, alert: &Alert) -> usize {
        if !alert.is_failure() && !self.notify_on_success {
            tracing::debug!("Success notifications disabled; skipping '{}'", alert.title);
            return 0;
        }

        let mut delivered = 0;
        for channel in self.channels.iter() {
            match channel.send(alert).await {
                Ok(()) => {
                    delivered += 1;
                    tracing::debug!("Sent notification via {}", channel.name())
                }
                Err(e) => {
                    tracing::warn!("Failed to send notification via {}: {}", channel.name(), e)
                }
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recording {
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl NotificationChannel for Recording {
        async fn send(&self, alert: &Alert) -> Result<(), NotificationError> {
            self.seen.lock().unwrap().push(alert.title.clone());
            Ok(())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    struct Broken;

    #[async_trait]
    impl NotificationChannel for Broken {
        async fn send(&self, _alert: &Alert) -> Result<(), NotificationError> {
            Err(NotificationError::Discord("HTTP 500".into()))
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    fn failure_alert() -> Alert {
        Alert::new(
            AlertType::PipelineFailed {
                phase: "stock_scanning".into(),
                error: "no instruments scanned".into(),
                traceback: vec![],
            },
            "Nightly pipeline failed",
            "no instruments scanned",
        )
    }

    #[tokio::test]
    async fn test_broken_channel_does_not_stop_delivery() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let service = NotificationService::with_channels(vec![
            Box::new(Broken),
            Box::new(Recording { seen: seen.clone() }),
        ]);

        let delivered = service.send_alert_async(&failure_alert()).await;

        assert_eq!(delivered, 1);
        assert_eq!(*seen.lock().unwrap(), vec!["Nightly pipeline failed".to_string()]);
    }

    #[tokio::test]
    async fn test_success_alerts_can_be_disabled() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut service =
            NotificationService::with_channels(vec![Box::new(Recording { seen: seen.clone() })]);
        service.notify_on_success = false;

        let success = Alert::new(
            AlertType::PipelineCompleted {
                run_date: "2026-10-19".into(),
                instruments_scanned: 10,
                opportunities: 10,
                models_queued: 2,
                warnings: 0,
                execution_time_seconds: 12.5,
                report_path: "reports/nightly_report_20261019.md".into(),
                top_picks: vec![],
            },
            "Nightly pipeline complete",
            "",
        );

        assert_eq!(service.send_alert_async(&success).await, 0);
        assert_eq!(service.send_alert_async(&failure_alert()).await, 1);
    }

    #[test]
    fn test_unconfigured_service_has_no_channels() {
        let service = NotificationService::new(&NotificationConfig::default());
        assert_eq!(service.channel_count(), 0);
    }
}
