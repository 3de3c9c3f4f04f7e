use async_trait::async_trait;
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::templates::EmailTemplate;
use crate::{Alert, NotificationChannel, NotificationConfig, NotificationError, SmtpTls};

/// Sends each alert as one multipart (text + HTML) email addressed to every
/// configured recipient.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    recipients: Vec<Mailbox>,
}

fn parse_recipients(addresses: &[String]) -> Vec<Mailbox> {
    addresses
        .iter()
        .filter_map(|addr| match addr.parse::<Mailbox>() {
            Ok(mailbox) => Some(mailbox),
            Err(e) => {
                tracing::warn!("Ignoring invalid recipient '{}': {}", addr, e);
                None
            }
        })
        .collect()
}

fn build_transport(
    host: &str,
    config: &NotificationConfig,
) -> Result<AsyncSmtpTransport<Tokio1Executor>, NotificationError> {
    let relay = match config.smtp_tls {
        SmtpTls::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(host),
        SmtpTls::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host),
        SmtpTls::None => Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)),
    };
    let mut builder = relay
        .map_err(|e| NotificationError::Smtp(format!("SMTP relay {host}: {e}")))?
        .port(config.smtp_port);

    if let (Some(user), Some(pass)) = (&config.smtp_username, &config.smtp_password) {
        builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
    }
    Ok(builder.build())
}

impl SmtpNotifier {
    pub fn new(config: &NotificationConfig) -> Result<Self, NotificationError> {
        let host = config
            .smtp_host
            .as_deref()
            .ok_or_else(|| NotificationError::Config("SMTP_HOST not set".into()))?;
        let from = config
            .smtp_from
            .as_deref()
            .ok_or_else(|| NotificationError::Config("SMTP_FROM_ADDRESS not set".into()))?
            .parse::<Mailbox>()
            .map_err(|e| NotificationError::Config(format!("Invalid from address: {e}")))?;

        let recipients = parse_recipients(&config.smtp_to);
        if recipients.is_empty() {
            return Err(NotificationError::Config(
                "No valid NOTIFICATION_EMAIL_TO addresses".into(),
            ));
        }

        Ok(Self {
            transport: build_transport(host, config)?,
            from,
            recipients,
        })
    }

    fn message(&self, alert: &Alert) -> Result<Message, NotificationError> {
        let mut builder = Message::builder().from(self.from.clone()).subject(&alert.title);
        for recipient in &self.recipients {
            builder = builder.to(recipient.clone());
        }
        builder
            .multipart(MultiPart::alternative_plain_html(
                EmailTemplate::render_text(alert),
                EmailTemplate::render(alert),
            ))
            .map_err(|e| NotificationError::Smtp(format!("Failed to build email: {e}")))
    }
}

#[async_trait]
impl NotificationChannel for SmtpNotifier {
    async fn send(&self, alert: &Alert) -> Result<(), NotificationError> {
        let email = self.message(alert)?;
        self.transport
            .send(email)
            .await
            .map_err(|e| NotificationError::Smtp(format!("Failed to send email: {e}")))?;
        tracing::debug!("Alert emailed to {} recipient(s)", self.recipients.len());
        Ok(())
    }

    fn name(&self) -> &str {
        "smtp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> NotificationConfig {
        NotificationConfig {
            smtp_host: Some("localhost".into()),
            smtp_port: 2525,
            smtp_from: Some("pipeline@example.com".into()),
            smtp_to: vec!["ops@example.com".into(), "not-an-address".into()],
            smtp_tls: SmtpTls::None,
            ..NotificationConfig::default()
        }
    }

    #[test]
    fn test_missing_host_is_config_error() {
        let cfg = NotificationConfig {
            smtp_host: None,
            ..config()
        };
        assert!(matches!(SmtpNotifier::new(&cfg), Err(NotificationError::Config(_))));
    }

    #[test]
    fn test_invalid_recipients_are_dropped() {
        let recipients = parse_recipients(&config().smtp_to);
        assert_eq!(recipients.len(), 1);
        assert_eq!(recipients[0].email.to_string(), "ops@example.com");

        let cfg = NotificationConfig {
            smtp_to: vec!["nobody".into()],
            ..config()
        };
        assert!(matches!(SmtpNotifier::new(&cfg), Err(NotificationError::Config(_))));
    }
}
