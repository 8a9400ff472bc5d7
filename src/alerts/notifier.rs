use crate::alerts::engine::AlertKind;
use crate::error::NotifyError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{error, info};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Delivery capability for fired alerts.
///
/// Called from detached tasks, so implementations must be shareable
/// across threads. Failures are reported back only to be logged.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, symbol: &str, price: Decimal, kind: AlertKind)
        -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertEvent {
    pub symbol: String,
    pub price: Decimal,
    pub kind: AlertKind,
    pub triggered_at: DateTime<Utc>,
}

impl AlertEvent {
    pub fn new(symbol: &str, price: Decimal, kind: AlertKind) -> Self {
        Self {
            symbol: symbol.to_string(),
            price,
            kind,
            triggered_at: Utc::now(),
        }
    }

    pub fn subject(&self) -> String {
        format!("{} Alert for {}", self.kind, self.symbol)
    }

    pub fn body(&self) -> String {
        format!(
            "{} triggered for {} at price {}",
            self.kind, self.symbol, self.price
        )
    }
}

/// Hands alerts to a dispatcher task over a bounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::Sender<AlertEvent>,
}

impl ChannelNotifier {
    pub fn new(sender: mpsc::Sender<AlertEvent>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(
        &self,
        symbol: &str,
        price: Decimal,
        kind: AlertKind,
    ) -> Result<(), NotifyError> {
        self.sender
            .send(AlertEvent::new(symbol, price, kind))
            .await
            .map_err(|_| NotifyError::ChannelClosed)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub alerts: usize,
    pub failed_deliveries: usize,
}

/// Drains the alert channel one event at a time until every sender is gone.
/// Each alert is logged and, when a delivery notifier is given, sent through
/// it; delivery failures are logged and never retried.
pub async fn run_alert_dispatcher(
    mut receiver: mpsc::Receiver<AlertEvent>,
    delivery: Option<Arc<dyn Notifier>>,
) -> DispatchSummary {
    let mut summary = DispatchSummary::default();
    while let Some(event) = receiver.recv().await {
        summary.alerts += 1;
        info!(
            "ALERT: {} | {} ({})",
            event.subject(),
            event.body(),
            event.triggered_at.format("%Y-%m-%d %H:%M:%S%.3f UTC")
        );
        if let Some(notifier) = &delivery {
            if let Err(e) = notifier.notify(&event.symbol, event.price, event.kind).await {
                summary.failed_deliveries += 1;
                error!("Failed to deliver {}: {}", event.subject(), e);
            }
        }
    }
    info!(
        "Alert dispatcher stopped after {} alert(s), {} failed deliveries",
        summary.alerts, summary.failed_deliveries
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn formats_subject_and_body() {
        let event = AlertEvent::new(
            "PETR4.SA",
            Decimal::from_str("38.10").unwrap(),
            AlertKind::TakeProfit,
        );
        assert_eq!(event.subject(), "Take Profit Alert for PETR4.SA");
        assert_eq!(
            event.body(),
            "Take Profit triggered for PETR4.SA at price 38.10"
        );
    }

    #[tokio::test]
    async fn channel_notifier_feeds_dispatcher() {
        let (tx, rx) = mpsc::channel(4);
        let notifier = ChannelNotifier::new(tx);

        notifier
            .notify("VALE3.SA", Decimal::from(60), AlertKind::StopLoss)
            .await
            .unwrap();
        notifier
            .notify("VALE3.SA", Decimal::from(65), AlertKind::NoTradeZone)
            .await
            .unwrap();
        drop(notifier);

        assert_eq!(
            run_alert_dispatcher(rx, None).await,
            DispatchSummary {
                alerts: 2,
                failed_deliveries: 0
            }
        );
    }

    struct RejectingNotifier;

    #[async_trait]
    impl Notifier for RejectingNotifier {
        async fn notify(
            &self,
            _symbol: &str,
            _price: Decimal,
            _kind: AlertKind,
        ) -> Result<(), NotifyError> {
            Err(NotifyError::Delivery("mailbox unavailable".to_string()))
        }
    }

    #[tokio::test]
    async fn delivery_failures_are_counted_and_skipped() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(AlertEvent::new("BBAS3.SA", Decimal::from(25), AlertKind::StopLoss))
            .await
            .unwrap();
        tx.send(AlertEvent::new("BBAS3.SA", Decimal::from(27), AlertKind::NoTradeZone))
            .await
            .unwrap();
        drop(tx);

        let summary = run_alert_dispatcher(rx, Some(Arc::new(RejectingNotifier))).await;
        assert_eq!(
            summary,
            DispatchSummary {
                alerts: 2,
                failed_deliveries: 2
            }
        );
    }

    #[tokio::test]
    async fn closed_channel_is_reported() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let notifier = ChannelNotifier::new(tx);

        let result = notifier
            .notify("ITUB4.SA", Decimal::from(30), AlertKind::TakeProfit)
            .await;
        assert!(matches!(result, Err(NotifyError::ChannelClosed)));
    }
}
