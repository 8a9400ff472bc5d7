//! Streaming stock quote monitor.
//!
//! [`api::yahoo::ws::FeedConnection`] keeps a websocket subscription to a
//! single symbol alive, reconnecting with exponential backoff, and hands
//! each decoded price to an [`alerts::AlertEngine`]. The engine fires a
//! take-profit, stop-loss or no-trade-zone alert once per episode and
//! passes it to a [`alerts::Notifier`].

pub mod alerts;
pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod shutdown;

use alerts::{AlertEngine, Notifier, Thresholds};
use api::yahoo::ws::{FeedConfig, FeedConnection, RunOutcome, WsConnector};
use shutdown::Shutdown;
use std::sync::Arc;

/// Monitors `symbol` over the live websocket feed until cancelled or
/// until reconnection gives up.
pub async fn monitor(
    config: FeedConfig,
    symbol: &str,
    thresholds: Thresholds,
    notifier: Arc<dyn Notifier>,
    shutdown: Shutdown,
) -> RunOutcome {
    let engine = AlertEngine::new(thresholds, notifier);
    let mut feed = FeedConnection::new(WsConnector, engine, config);
    feed.run(symbol, shutdown).await
}
