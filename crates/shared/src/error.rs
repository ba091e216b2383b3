use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("empty packet")]
    Empty,
    #[error("unknown engine.io packet type {0:?}")]
    UnknownEngineType(char),
    #[error("unknown socket.io packet type {0:?}")]
    UnknownSocketType(char),
    #[error("malformed handshake")]
    Handshake(#[source] serde_json::Error),
    #[error("malformed event payload")]
    EventPayload(#[source] serde_json::Error),
    #[error("event payload must be a non-empty array starting with the event name")]
    EventShape,
}
