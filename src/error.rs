use thiserror::Error;

#[derive(Error, Debug)]
pub enum StockWatchError {
    #[error("WebSocket error: {0}")]
    WebsocketError(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Connection closed by peer without a close frame")]
    ConnectionClosed,

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

/// Reasons an inbound frame could not be turned into a price tick.
#[derive(Error, Debug, PartialEq)]
pub enum DecodeError {
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("record truncated while reading {0}")]
    Truncated(&'static str),

    #[error("unsupported wire type {wire_type} on field {field}")]
    UnsupportedWireType { field: u32, wire_type: u8 },

    #[error("identifier is not valid UTF-8")]
    InvalidIdentifier,

    #[error("record has no {0} field")]
    MissingField(&'static str),

    #[error("price {0} is not representable")]
    InvalidPrice(f64),
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("alert channel closed")]
    ChannelClosed,

    #[error("delivery failed: {0}")]
    Delivery(String),
}
