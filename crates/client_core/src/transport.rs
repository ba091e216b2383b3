//! Socket.IO websocket subscription to the pedal sensor feed.
//!
//! A spawned task owns the websocket, answers heartbeats, reconnects with
//! backoff and pushes decoded [`FeedEvent`]s onto a bounded channel. The
//! subscription handle is the single consumer.

use std::time::Duration;

use futures::{Sink, SinkExt, StreamExt};
use shared::{
    domain::SensorEvent,
    protocol::{
        EnginePacket, SocketPacket, ENGINE_IO_PATH, ENGINE_IO_VERSION, SENSOR_DATA_EVENT,
    },
};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::FeedError;

const FEED_CHANNEL_CAPACITY: usize = 256;
/// Liveness window used until the server's handshake announces its own.
const DEFAULT_LIVENESS: Duration = Duration::from_millis(25_000 + 20_000);

#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Connected { sid: Option<String> },
    Sensor(SensorEvent),
    Disconnected { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub randomization_factor: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(5000),
            randomization_factor: 0.5,
        }
    }
}

impl ReconnectPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.delay_with_sample(attempt, rand::random::<f64>())
    }

    /// Exponential backoff (factor 2) with jitter; `sample` is uniform in [0, 1).
    pub fn delay_with_sample(&self, attempt: u32, sample: f64) -> Duration {
        let base = self.initial_delay.as_millis() as f64 * 2f64.powi(attempt.min(31) as i32);
        let deviation = (sample * self.randomization_factor * base).floor();
        let jittered = if ((sample * 10.0).floor() as u64) & 1 == 0 {
            base - deviation
        } else {
            base + deviation
        };
        let capped = jittered.min(self.max_delay.as_millis() as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }
}

/// Rewrites `http(s)://host:port` to the Engine.IO websocket endpoint.
pub fn socket_io_endpoint(server_url: &str) -> Result<Url, FeedError> {
    let invalid = |reason: String| FeedError::InvalidUrl {
        url: server_url.to_string(),
        reason,
    };

    let mut url = Url::parse(server_url.trim()).map_err(|err| invalid(err.to_string()))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(invalid(format!("unsupported scheme '{other}'"))),
    };
    url.set_scheme(scheme)
        .map_err(|()| invalid("cannot switch to websocket scheme".to_string()))?;

    let base_path = url.path().trim_end_matches('/').to_string();
    url.set_path(&format!("{base_path}{ENGINE_IO_PATH}"));
    url.query_pairs_mut()
        .clear()
        .append_pair("EIO", &ENGINE_IO_VERSION.to_string())
        .append_pair("transport", "websocket");
    Ok(url)
}

/// Live subscription. Dropping it (or calling [`FeedSubscription::close`])
/// tears the connection down.
pub struct FeedSubscription {
    events: mpsc::Receiver<FeedEvent>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl FeedSubscription {
    /// Starts the feed task on the current tokio runtime.
    pub fn open(server_url: &str, policy: ReconnectPolicy) -> Result<Self, FeedError> {
        let endpoint = socket_io_endpoint(server_url)?;
        let (events_tx, events) = mpsc::channel(FEED_CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run_feed(endpoint, policy, events_tx, shutdown_rx));
        Ok(Self {
            events,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        })
    }

    /// Wraps an already-populated event channel; used for replays and tests.
    pub fn from_channel(events: mpsc::Receiver<FeedEvent>) -> Self {
        Self {
            events,
            shutdown: None,
            task: None,
        }
    }

    pub async fn recv(&mut self) -> Option<FeedEvent> {
        self.events.recv().await
    }

    pub async fn close(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        self.events.close();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                if !err.is_cancelled() {
                    warn!(error = %err, "sensor feed task ended abnormally");
                }
            }
        }
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

enum SessionEnd {
    Shutdown,
    ConsumerGone,
    Lost { error: FeedError, connected: bool },
}

async fn run_feed(
    endpoint: Url,
    policy: ReconnectPolicy,
    events: mpsc::Sender<FeedEvent>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut attempt: u32 = 0;
    loop {
        info!(%endpoint, attempt, "connecting to sensor feed");
        match run_session(&endpoint, &events, &mut shutdown).await {
            SessionEnd::Shutdown => {
                debug!("sensor feed subscription released");
                return;
            }
            SessionEnd::ConsumerGone => {
                debug!("sensor feed consumer dropped; stopping");
                return;
            }
            SessionEnd::Lost { error, connected } => {
                if connected {
                    attempt = 0;
                    let reason = format!("{:#}", anyhow::Error::new(error));
                    info!(%reason, "sensor feed disconnected");
                    if events
                        .send(FeedEvent::Disconnected { reason })
                        .await
                        .is_err()
                    {
                        return;
                    }
                } else {
                    warn!(
                        error = &error as &dyn std::error::Error,
                        attempt,
                        "sensor feed connection attempt failed"
                    );
                }
            }
        }

        if !policy.enabled {
            return;
        }
        let delay = policy.delay_for(attempt);
        attempt = attempt.saturating_add(1);
        debug!(delay_ms = delay.as_millis() as u64, "scheduling sensor feed reconnect");
        tokio::select! {
            _ = &mut shutdown => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

async fn run_session(
    endpoint: &Url,
    events: &mpsc::Sender<FeedEvent>,
    shutdown: &mut oneshot::Receiver<()>,
) -> SessionEnd {
    let connecting = tokio::select! {
        _ = &mut *shutdown => return SessionEnd::Shutdown,
        res = connect_async(endpoint.as_str()) => res,
    };
    let (ws_stream, _) = match connecting {
        Ok(stream) => stream,
        Err(source) => {
            return SessionEnd::Lost {
                error: FeedError::Connect {
                    url: endpoint.to_string(),
                    source,
                },
                connected: false,
            }
        }
    };
    let (mut ws_writer, mut ws_reader) = ws_stream.split();

    let mut liveness = DEFAULT_LIVENESS;
    let mut connected = false;
    let lost = |error: FeedError, connected: bool| SessionEnd::Lost { error, connected };

    loop {
        let next = tokio::select! {
            _ = &mut *shutdown => {
                if connected {
                    let _ = send_frame(&mut ws_writer, SocketPacket::disconnect().into_frame()).await;
                }
                let _ = ws_writer.close().await;
                return SessionEnd::Shutdown;
            }
            next = tokio::time::timeout(liveness, ws_reader.next()) => next,
        };

        let message = match next {
            Err(_) => return lost(FeedError::HeartbeatTimeout(liveness), connected),
            Ok(None) => return lost(FeedError::Closed, connected),
            Ok(Some(Err(err))) => return lost(FeedError::Transport(err), connected),
            Ok(Some(Ok(message))) => message,
        };

        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => return lost(FeedError::Closed, connected),
            _ => continue,
        };

        let packet = match EnginePacket::decode(&text) {
            Ok(packet) => packet,
            Err(error) => {
                warn!(error = &error as &dyn std::error::Error, frame = %text, "dropping undecodable engine.io frame");
                continue;
            }
        };

        match packet {
            EnginePacket::Open(handshake) => {
                liveness = Duration::from_millis(handshake.ping_interval + handshake.ping_timeout);
                debug!(sid = %handshake.sid, liveness_ms = liveness.as_millis() as u64, "engine.io session opened");
                if let Err(error) =
                    send_frame(&mut ws_writer, SocketPacket::connect().into_frame()).await
                {
                    return lost(error, connected);
                }
            }
            EnginePacket::Ping(data) => {
                if let Err(error) =
                    send_frame(&mut ws_writer, EnginePacket::Pong(data).encode()).await
                {
                    return lost(error, connected);
                }
            }
            EnginePacket::Close => return lost(FeedError::Closed, connected),
            EnginePacket::Message(body) => {
                let socket_packet = match SocketPacket::decode(&body) {
                    Ok(packet) => packet,
                    Err(error) => {
                        warn!(error = &error as &dyn std::error::Error, payload = %body, "dropping undecodable socket.io packet");
                        continue;
                    }
                };
                match socket_packet {
                    SocketPacket::Connect { data, .. } => {
                        connected = true;
                        let sid = data
                            .as_ref()
                            .and_then(|d| d.get("sid"))
                            .and_then(|sid| sid.as_str())
                            .map(str::to_string);
                        info!(sid = sid.as_deref().unwrap_or("-"), "sensor feed connected");
                        if events.send(FeedEvent::Connected { sid }).await.is_err() {
                            return SessionEnd::ConsumerGone;
                        }
                    }
                    SocketPacket::Event { name, args, .. } if name == SENSOR_DATA_EVENT => {
                        let Some(payload) = args.into_iter().next() else {
                            warn!("sensor_data event without payload");
                            continue;
                        };
                        match serde_json::from_value::<SensorEvent>(payload) {
                            Ok(event) => {
                                if events.send(FeedEvent::Sensor(event)).await.is_err() {
                                    return SessionEnd::ConsumerGone;
                                }
                            }
                            Err(error) => warn!(%error, "dropping malformed sensor_data payload"),
                        }
                    }
                    SocketPacket::Event { name, .. } => {
                        debug!(event = %name, "ignoring unhandled socket.io event");
                    }
                    SocketPacket::Disconnect { .. } => {
                        return lost(FeedError::ServerDisconnect, connected)
                    }
                    SocketPacket::ConnectError { data, .. } => {
                        let reason = data.map(|d| d.to_string()).unwrap_or_default();
                        return lost(FeedError::ConnectRejected(reason), connected);
                    }
                    SocketPacket::Ack { .. } => {}
                }
            }
            EnginePacket::Pong(_) | EnginePacket::Upgrade | EnginePacket::Noop => {}
        }
    }
}

async fn send_frame<S>(sink: &mut S, frame: String) -> Result<(), FeedError>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    sink.send(Message::Text(frame)).await.map_err(FeedError::Transport)
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
