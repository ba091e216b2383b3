//! Engine.IO v4 / Socket.IO v5 text framing, as spoken by the pedal sensor publisher.
//!
//! Only the websocket transport and text frames are handled. Binary events and
//! HTTP long-polling are never produced by the sensor service.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{domain::SensorEvent, error::ProtocolError};

pub const ENGINE_IO_PATH: &str = "/socket.io/";
pub const ENGINE_IO_VERSION: u8 = 4;
pub const DEFAULT_NAMESPACE: &str = "/";
pub const SENSOR_DATA_EVENT: &str = "sensor_data";

/// Body of the Engine.IO `open` packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    pub ping_interval: u64,
    pub ping_timeout: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_payload: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    pub fn decode(frame: &str) -> Result<Self, ProtocolError> {
        let mut chars = frame.chars();
        let kind = chars.next().ok_or(ProtocolError::Empty)?;
        let body = chars.as_str();
        match kind {
            '0' => serde_json::from_str(body)
                .map(Self::Open)
                .map_err(ProtocolError::Handshake),
            '1' => Ok(Self::Close),
            '2' => Ok(Self::Ping(body.to_string())),
            '3' => Ok(Self::Pong(body.to_string())),
            '4' => Ok(Self::Message(body.to_string())),
            '5' => Ok(Self::Upgrade),
            '6' => Ok(Self::Noop),
            other => Err(ProtocolError::UnknownEngineType(other)),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            // Handshake serialization cannot fail: plain strings and integers.
            Self::Open(handshake) => format!(
                "0{}",
                serde_json::to_string(handshake).unwrap_or_else(|_| "{}".to_string())
            ),
            Self::Close => "1".to_string(),
            Self::Ping(data) => format!("2{data}"),
            Self::Pong(data) => format!("3{data}"),
            Self::Message(data) => format!("4{data}"),
            Self::Upgrade => "5".to_string(),
            Self::Noop => "6".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect {
        namespace: String,
        data: Option<Value>,
    },
    Disconnect {
        namespace: String,
    },
    Event {
        namespace: String,
        ack_id: Option<u64>,
        name: String,
        args: Vec<Value>,
    },
    Ack {
        namespace: String,
        ack_id: u64,
        args: Vec<Value>,
    },
    ConnectError {
        namespace: String,
        data: Option<Value>,
    },
}

impl SocketPacket {
    pub fn connect() -> Self {
        Self::Connect {
            namespace: DEFAULT_NAMESPACE.to_string(),
            data: None,
        }
    }

    pub fn disconnect() -> Self {
        Self::Disconnect {
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }

    pub fn event(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self::Event {
            namespace: DEFAULT_NAMESPACE.to_string(),
            ack_id: None,
            name: name.into(),
            args,
        }
    }

    pub fn namespace(&self) -> &str {
        match self {
            Self::Connect { namespace, .. }
            | Self::Disconnect { namespace }
            | Self::Event { namespace, .. }
            | Self::Ack { namespace, .. }
            | Self::ConnectError { namespace, .. } => namespace,
        }
    }

    /// Decodes `<type>[<namespace>,][<ack id>][<json>]`.
    pub fn decode(payload: &str) -> Result<Self, ProtocolError> {
        let mut chars = payload.chars();
        let kind = chars.next().ok_or(ProtocolError::Empty)?;
        let mut rest = chars.as_str();

        let namespace = if rest.starts_with('/') {
            match rest.find(',') {
                Some(idx) => {
                    let ns = &rest[..idx];
                    rest = &rest[idx + 1..];
                    ns.to_string()
                }
                None => {
                    let ns = rest.to_string();
                    rest = "";
                    ns
                }
            }
        } else {
            DEFAULT_NAMESPACE.to_string()
        };

        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        let ack_id = if digits > 0 {
            let id = rest[..digits].parse::<u64>().ok();
            rest = &rest[digits..];
            id
        } else {
            None
        };

        let data = if rest.is_empty() {
            None
        } else {
            Some(serde_json::from_str::<Value>(rest).map_err(ProtocolError::EventPayload)?)
        };

        match kind {
            '0' => Ok(Self::Connect { namespace, data }),
            '1' => Ok(Self::Disconnect { namespace }),
            '2' => {
                let (name, args) = split_event(data)?;
                Ok(Self::Event {
                    namespace,
                    ack_id,
                    name,
                    args,
                })
            }
            '3' => {
                let args = match data {
                    Some(Value::Array(args)) => args,
                    _ => return Err(ProtocolError::EventShape),
                };
                Ok(Self::Ack {
                    namespace,
                    ack_id: ack_id.ok_or(ProtocolError::EventShape)?,
                    args,
                })
            }
            '4' => Ok(Self::ConnectError { namespace, data }),
            other => Err(ProtocolError::UnknownSocketType(other)),
        }
    }

    pub fn encode(&self) -> String {
        let (kind, namespace, ack_id, data) = match self {
            Self::Connect { namespace, data } => ('0', namespace, None, data.clone()),
            Self::Disconnect { namespace } => ('1', namespace, None, None),
            Self::Event {
                namespace,
                ack_id,
                name,
                args,
            } => {
                let mut items = Vec::with_capacity(args.len() + 1);
                items.push(Value::String(name.clone()));
                items.extend(args.iter().cloned());
                ('2', namespace, *ack_id, Some(Value::Array(items)))
            }
            Self::Ack {
                namespace,
                ack_id,
                args,
            } => ('3', namespace, Some(*ack_id), Some(Value::Array(args.clone()))),
            Self::ConnectError { namespace, data } => ('4', namespace, None, data.clone()),
        };

        let mut out = String::new();
        out.push(kind);
        if namespace != DEFAULT_NAMESPACE {
            out.push_str(namespace);
            out.push(',');
        }
        if let Some(id) = ack_id {
            out.push_str(&id.to_string());
        }
        if let Some(data) = data {
            out.push_str(&data.to_string());
        }
        out
    }

    /// Wraps this packet in an Engine.IO message frame.
    pub fn into_frame(self) -> String {
        EnginePacket::Message(self.encode()).encode()
    }
}

fn split_event(data: Option<Value>) -> Result<(String, Vec<Value>), ProtocolError> {
    let Some(Value::Array(mut items)) = data else {
        return Err(ProtocolError::EventShape);
    };
    if items.is_empty() {
        return Err(ProtocolError::EventShape);
    }
    let Value::String(name) = items.remove(0) else {
        return Err(ProtocolError::EventShape);
    };
    Ok((name, items))
}

/// Full websocket text frame carrying one `sensor_data` event.
pub fn sensor_data_frame(event: &SensorEvent) -> Result<String, ProtocolError> {
    let payload = serde_json::to_value(event).map_err(ProtocolError::EventPayload)?;
    Ok(SocketPacket::event(SENSOR_DATA_EVENT, vec![payload]).into_frame())
}
