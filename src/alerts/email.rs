use crate::alerts::engine::AlertKind;
use crate::alerts::notifier::{AlertEvent, Notifier};
use crate::config::EmailSettings;
use crate::error::{NotifyError, StockWatchError};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use log::info;
use rust_decimal::Decimal;
use std::time::Duration;

/// Mails each alert over SMTP.
pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailNotifier {
    pub fn new(settings: &EmailSettings) -> Result<Self, StockWatchError> {
        let from = parse_address("from_email", &settings.from_email)?;
        let to = parse_address("to_email", &settings.to_email)?;

        let mut builder = if settings.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.smtp_server)
                .map_err(|e| StockWatchError::ConfigError(format!("smtp_server: {}", e)))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.smtp_server)
        };
        builder = builder
            .port(settings.smtp_port)
            .timeout(Some(Duration::from_secs(settings.timeout_secs)));
        if !settings.email_password.is_empty() {
            builder = builder.credentials(Credentials::new(
                settings.from_email.clone(),
                settings.email_password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from: Mailbox::new(Some("Stock Alert".to_string()), from),
            to: Mailbox::new(Some("Recipient".to_string()), to),
        })
    }

    fn compose(&self, event: &AlertEvent) -> Result<Message, NotifyError> {
        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(event.subject())
            .header(ContentType::TEXT_HTML)
            .body(format!("<b>{}</b>", event.body()))
            .map_err(|e| NotifyError::Delivery(e.to_string()))
    }
}

fn parse_address(field: &str, raw: &str) -> Result<Address, StockWatchError> {
    raw.trim()
        .parse()
        .map_err(|e| StockWatchError::ConfigError(format!("{}: {}", field, e)))
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn notify(
        &self,
        symbol: &str,
        price: Decimal,
        kind: AlertKind,
    ) -> Result<(), NotifyError> {
        let email = self.compose(&AlertEvent::new(symbol, price, kind))?;
        self.transport
            .send(email)
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;
        info!("Email alert sent successfully");
        Ok(())
    }
}
