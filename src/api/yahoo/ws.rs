use crate::alerts::engine::PriceObserver;
use crate::api::yahoo::pricing;
use crate::config::Config;
use crate::error::StockWatchError;
use crate::shutdown::Shutdown;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub const YAHOO_WS_URL: &str = "wss://streamer.finance.yahoo.com";

const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// One open streaming session.
#[async_trait]
pub trait FeedSession: Send {
    async fn send(&mut self, message: Message) -> Result<(), StockWatchError>;

    /// `None` once the peer has gone away.
    async fn next_message(&mut self) -> Option<Result<Message, StockWatchError>>;

    async fn close(&mut self) -> Result<(), StockWatchError>;
}

/// Opens sessions against an endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: FeedSession;

    async fn connect(&self, uri: &str) -> Result<Self::Session, StockWatchError>;
}

pub struct WsConnector;

pub struct WsSession {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Connector for WsConnector {
    type Session = WsSession;

    async fn connect(&self, uri: &str) -> Result<WsSession, StockWatchError> {
        let (stream, response) = connect_async(uri).await?;
        debug!("Connected to {} ({})", uri, response.status());
        Ok(WsSession { stream })
    }
}

#[async_trait]
impl FeedSession for WsSession {
    async fn send(&mut self, message: Message) -> Result<(), StockWatchError> {
        self.stream.send(message).await?;
        Ok(())
    }

    async fn next_message(&mut self) -> Option<Result<Message, StockWatchError>> {
        self.stream
            .next()
            .await
            .map(|message| message.map_err(StockWatchError::from))
    }

    async fn close(&mut self) -> Result<(), StockWatchError> {
        self.stream.close(None).await?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    pub uri: String,
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            uri: YAHOO_WS_URL.to_string(),
            max_retries: 5,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl From<&Config> for FeedConfig {
    fn from(config: &Config) -> Self {
        Self {
            uri: config.websocket_uri.clone(),
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.reconnection_delay_ms),
        }
    }
}

/// How a monitoring run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Cancelled,
    RetriesExhausted { attempts: u32 },
}

#[derive(Debug)]
enum SessionEnd {
    /// The server sent a close frame.
    Closed,
    Cancelled,
    Failed(StockWatchError),
}

#[derive(Debug)]
struct SessionReport {
    frames: u64,
    end: SessionEnd,
}

/// Delay before the next connect: `base` after a clean session, then
/// `base * 2^(attempt - 1)` for consecutive failures.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    base.saturating_mul(1u32 << exponent)
}

pub fn subscribe_message(symbol: &str) -> String {
    serde_json::json!({ "subscribe": [symbol] }).to_string()
}

/// Keeps a single-symbol subscription alive and feeds every decoded price
/// to the observer.
pub struct FeedConnection<C: Connector, O: PriceObserver> {
    connector: C,
    observer: O,
    config: FeedConfig,
}

impl<C: Connector, O: PriceObserver> FeedConnection<C, O> {
    pub fn new(connector: C, observer: O, config: FeedConfig) -> Self {
        Self {
            connector,
            observer,
            config,
        }
    }

    /// Runs until cancelled or until `max_retries` consecutive attempts fail.
    pub async fn run(&mut self, symbol: &str, mut shutdown: Shutdown) -> RunOutcome {
        let mut attempt: u32 = 0;

        loop {
            if shutdown.is_cancelled() {
                info!("Monitoring of {} cancelled", symbol);
                return RunOutcome::Cancelled;
            }

            info!("Connecting to {}", self.config.uri);
            let report = self.run_session(symbol, &mut shutdown).await;

            match report.end {
                SessionEnd::Cancelled => {
                    info!("Monitoring of {} cancelled", symbol);
                    return RunOutcome::Cancelled;
                }
                SessionEnd::Closed => {
                    info!("Server closed the stream after {} frames", report.frames);
                    attempt = 0;
                }
                SessionEnd::Failed(e) => {
                    if report.frames > 0 {
                        attempt = 0;
                    }
                    attempt += 1;
                    error!(
                        "Error during WebSocket communication (attempt {}/{}): {}",
                        attempt, self.config.max_retries, e
                    );
                    if attempt >= self.config.max_retries {
                        error!("Max retries reached for {}, giving up", symbol);
                        return RunOutcome::RetriesExhausted { attempts: attempt };
                    }
                }
            }

            let delay = backoff_delay(self.config.base_delay, attempt);
            info!("Waiting {}ms to reconnect", delay.as_millis());
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Monitoring of {} cancelled during backoff", symbol);
                    return RunOutcome::Cancelled;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn run_session(&mut self, symbol: &str, shutdown: &mut Shutdown) -> SessionReport {
        let connected = tokio::select! {
            _ = shutdown.cancelled() => {
                return SessionReport { frames: 0, end: SessionEnd::Cancelled };
            }
            connected = self.connector.connect(&self.config.uri) => connected,
        };
        let mut session = match connected {
            Ok(session) => session,
            Err(e) => {
                return SessionReport {
                    frames: 0,
                    end: SessionEnd::Failed(e),
                }
            }
        };

        let report = self.stream_prices(&mut session, symbol, shutdown).await;

        debug!("Closing WebSocket connection...");
        match tokio::time::timeout(CLOSE_TIMEOUT, session.close()).await {
            Ok(Ok(())) => info!("WebSocket connection closed"),
            Ok(Err(e)) => debug!("Close handshake failed: {}", e),
            Err(_) => debug!("Close handshake timed out"),
        }

        report
    }

    async fn stream_prices(
        &mut self,
        session: &mut C::Session,
        symbol: &str,
        shutdown: &mut Shutdown,
    ) -> SessionReport {
        let mut frames = 0u64;

        let subscribe = Message::Text(subscribe_message(symbol));
        let sent = tokio::select! {
            _ = shutdown.cancelled() => {
                return SessionReport { frames, end: SessionEnd::Cancelled };
            }
            sent = session.send(subscribe) => sent,
        };
        if let Err(e) = sent {
            return SessionReport {
                frames,
                end: SessionEnd::Failed(e),
            };
        }
        debug!("Subscribed to {}", symbol);

        loop {
            let message = tokio::select! {
                _ = shutdown.cancelled() => {
                    return SessionReport { frames, end: SessionEnd::Cancelled };
                }
                message = session.next_message() => message,
            };

            match message {
                Some(Ok(Message::Text(text))) => {
                    frames += 1;
                    self.handle_text(symbol, &text);
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!("Close frame received: {:?}", frame);
                    return SessionReport {
                        frames,
                        end: SessionEnd::Closed,
                    };
                }
                Some(Ok(_)) => {
                    frames += 1;
                }
                Some(Err(e)) => {
                    return SessionReport {
                        frames,
                        end: SessionEnd::Failed(e),
                    };
                }
                None => {
                    return SessionReport {
                        frames,
                        end: SessionEnd::Failed(StockWatchError::ConnectionClosed),
                    };
                }
            }
        }
    }

    fn handle_text(&mut self, symbol: &str, text: &str) {
        match pricing::decode_frame(text) {
            Ok(tick) => {
                let at = tick
                    .time()
                    .map(|t| t.format("%H:%M:%S%.3f").to_string())
                    .unwrap_or_else(|| "?".to_string());
                info!("{}: {} at {}", tick.id, tick.price, at);
                self.observer.on_price(symbol, tick.price);
            }
            Err(e) => warn!("Failed to parse stock price: {}", e),
        }
    }
}
