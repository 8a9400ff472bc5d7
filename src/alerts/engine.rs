use crate::alerts::notifier::Notifier;
use log::{error, info};
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertKind {
    TakeProfit,
    StopLoss,
    NoTradeZone,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AlertKind::TakeProfit => "Take Profit",
            AlertKind::StopLoss => "Stop Loss",
            AlertKind::NoTradeZone => "No-Trade Zone",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub take_profit: Decimal,
    pub stop_loss: Decimal,
}

impl Thresholds {
    pub fn new(take_profit: Decimal, stop_loss: Decimal) -> Self {
        Self {
            take_profit,
            stop_loss,
        }
    }

    /// True when the neutral zone `(stop_loss, take_profit)` is empty.
    pub fn is_degenerate(&self) -> bool {
        self.stop_loss >= self.take_profit
    }
}

/// Latches recording which alerts have fired in the current episode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertState {
    pub take_profit_sent: bool,
    pub stop_loss_sent: bool,
    pub neutral_zone_sent: bool,
}

impl AlertState {
    /// Applies one price observation. Take profit is checked first, then
    /// stop loss, then the neutral zone; at most one alert fires.
    pub fn evaluate(&mut self, price: Decimal, thresholds: &Thresholds) -> Option<AlertKind> {
        if price >= thresholds.take_profit && !self.take_profit_sent {
            self.take_profit_sent = true;
            self.neutral_zone_sent = false;
            Some(AlertKind::TakeProfit)
        } else if price <= thresholds.stop_loss && !self.stop_loss_sent {
            self.stop_loss_sent = true;
            self.neutral_zone_sent = false;
            Some(AlertKind::StopLoss)
        } else if price > thresholds.stop_loss
            && price < thresholds.take_profit
            && !self.neutral_zone_sent
        {
            // Back in the neutral zone re-arms both boundary alerts.
            self.neutral_zone_sent = true;
            self.take_profit_sent = false;
            self.stop_loss_sent = false;
            Some(AlertKind::NoTradeZone)
        } else {
            None
        }
    }
}

/// Receives every decoded price in arrival order.
pub trait PriceObserver: Send {
    fn on_price(&mut self, symbol: &str, price: Decimal);
}

pub struct AlertEngine {
    thresholds: Thresholds,
    state: AlertState,
    notifier: Arc<dyn Notifier>,
}

impl AlertEngine {
    pub fn new(thresholds: Thresholds, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            thresholds,
            state: AlertState::default(),
            notifier,
        }
    }

    pub fn state(&self) -> AlertState {
        self.state
    }

    /// Updates the latches and, if an alert fires, hands it to the notifier
    /// on a detached task. Must be called from within a tokio runtime.
    pub fn evaluate(&mut self, symbol: &str, price: Decimal) -> Option<AlertKind> {
        let kind = self.state.evaluate(price, &self.thresholds)?;
        info!("{} triggered for {} at {}", kind, symbol, price);
        self.dispatch(symbol, price, kind);
        Some(kind)
    }

    fn dispatch(&self, symbol: &str, price: Decimal, kind: AlertKind) {
        let notifier = Arc::clone(&self.notifier);
        let symbol = symbol.to_string();
        tokio::spawn(async move {
            if let Err(e) = notifier.notify(&symbol, price, kind).await {
                error!("Failed to send {} alert for {}: {}", kind, symbol, e);
            }
        });
    }
}

impl PriceObserver for AlertEngine {
    fn on_price(&mut self, symbol: &str, price: Decimal) {
        self.evaluate(symbol, price);
    }
}
