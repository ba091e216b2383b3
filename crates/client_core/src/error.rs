use std::time::Duration;

use shared::error::ProtocolError;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("invalid sensor feed url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("failed to connect websocket {url}")]
    Connect {
        url: String,
        #[source]
        source: tungstenite::Error,
    },
    #[error("websocket transport error")]
    Transport(#[from] tungstenite::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("no traffic from sensor feed within {0:?}")]
    HeartbeatTimeout(Duration),
    #[error("sensor feed rejected namespace connect: {0}")]
    ConnectRejected(String),
    #[error("sensor feed closed the connection")]
    Closed,
    #[error("sensor feed sent a disconnect packet")]
    ServerDisconnect,
}

#[derive(Debug, Error)]
#[error("alert sound playback failed: {message}")]
pub struct PlaybackError {
    message: String,
}

impl PlaybackError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
