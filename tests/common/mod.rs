#![allow(dead_code)]

use async_trait::async_trait;
use base64::prelude::*;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use stockwatch::alerts::PriceObserver;
use stockwatch::api::yahoo::ws::{Connector, FeedSession};
use stockwatch::error::StockWatchError;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::protocol::Message;

/// What the fake server does on one connect attempt.
pub enum Script {
    Refuse,
    RejectSubscribe,
    Serve(Vec<Incoming>),
}

pub enum Incoming {
    Text(String),
    Ping,
    Close,
    Error,
    /// Never yields again.
    Hang,
}

#[derive(Default)]
pub struct Activity {
    pub connects: Vec<Instant>,
    pub sent: Vec<String>,
    pub closes: usize,
}

impl Activity {
    /// Seconds between consecutive connect attempts.
    pub fn gaps_secs(&self) -> Vec<u64> {
        self.connects
            .windows(2)
            .map(|w| (w[1] - w[0]).as_secs())
            .collect()
    }
}

pub struct FakeConnector {
    scripts: Mutex<VecDeque<Script>>,
    pub activity: Arc<Mutex<Activity>>,
}

impl FakeConnector {
    /// Once the scripts run out every further attempt is refused.
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            activity: Arc::new(Mutex::new(Activity::default())),
        }
    }
}

fn io_error(kind: std::io::ErrorKind) -> StockWatchError {
    StockWatchError::IoError(std::io::Error::new(kind, "scripted failure"))
}

#[async_trait]
impl Connector for FakeConnector {
    type Session = FakeSession;

    async fn connect(&self, _uri: &str) -> Result<FakeSession, StockWatchError> {
        self.activity.lock().unwrap().connects.push(Instant::now());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Script::Refuse);

        match script {
            Script::Refuse => Err(io_error(std::io::ErrorKind::ConnectionRefused)),
            Script::RejectSubscribe => Ok(FakeSession {
                incoming: VecDeque::new(),
                fail_send: true,
                activity: Arc::clone(&self.activity),
            }),
            Script::Serve(incoming) => Ok(FakeSession {
                incoming: incoming.into(),
                fail_send: false,
                activity: Arc::clone(&self.activity),
            }),
        }
    }
}

pub struct FakeSession {
    incoming: VecDeque<Incoming>,
    fail_send: bool,
    activity: Arc<Mutex<Activity>>,
}

#[async_trait]
impl FeedSession for FakeSession {
    async fn send(&mut self, message: Message) -> Result<(), StockWatchError> {
        if self.fail_send {
            return Err(io_error(std::io::ErrorKind::BrokenPipe));
        }
        if let Message::Text(text) = message {
            self.activity.lock().unwrap().sent.push(text);
        }
        Ok(())
    }

    async fn next_message(&mut self) -> Option<Result<Message, StockWatchError>> {
        match self.incoming.pop_front() {
            Some(Incoming::Text(text)) => Some(Ok(Message::Text(text))),
            Some(Incoming::Ping) => Some(Ok(Message::Ping(vec![1]))),
            Some(Incoming::Close) => Some(Ok(Message::Close(None))),
            Some(Incoming::Error) => Some(Err(io_error(std::io::ErrorKind::ConnectionReset))),
            Some(Incoming::Hang) => std::future::pending().await,
            None => None,
        }
    }

    async fn close(&mut self) -> Result<(), StockWatchError> {
        self.activity.lock().unwrap().closes += 1;
        Ok(())
    }
}

/// Remembers every price handed over by the feed.
#[derive(Clone, Default)]
pub struct RecordingObserver {
    pub prices: Arc<Mutex<Vec<(String, Decimal)>>>,
}

impl PriceObserver for RecordingObserver {
    fn on_price(&mut self, symbol: &str, price: Decimal) {
        self.prices.lock().unwrap().push((symbol.to_string(), price));
    }
}

fn varint(mut value: u64, out: &mut Vec<u8>) {
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Builds a text frame the way the streamer sends it.
pub fn tick_frame(id: &str, price: f32, time_millis: i64) -> String {
    let mut out = vec![0x0a];
    varint(id.len() as u64, &mut out);
    out.extend_from_slice(id.as_bytes());
    out.push(0x15);
    out.extend_from_slice(&price.to_le_bytes());
    out.push(0x18);
    varint(((time_millis << 1) ^ (time_millis >> 63)) as u64, &mut out);
    BASE64_STANDARD.encode(out)
}

pub fn tick(price: f32) -> Incoming {
    Incoming::Text(tick_frame("PETR4.SA", price, 1_718_900_000_000))
}
