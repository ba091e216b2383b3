use std::{net::SocketAddr, time::Duration};

use anyhow::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use clap::{Parser, Subcommand};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use shared::{
    domain::{SensorEvent, PEDAL_ACCELERATOR, PEDAL_BRAKE, PEDAL_IDLE},
    protocol::{sensor_data_frame, EnginePacket, Handshake, SocketPacket, ENGINE_IO_PATH},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const PING_INTERVAL_MS: u64 = 25_000;
const PING_TIMEOUT_MS: u64 = 20_000;
const MAX_PAYLOAD: u64 = 1_000_000;

/// Ticks per idle/accelerate/brake loop.
const CYCLE_LEN: u64 = 30;
const ACCEL_START: u64 = 5;
const BRAKE_START: u64 = 20;
/// Position in the loop whose frame is sent twice, verbatim.
const RETRANSMIT_AT: u64 = 8;
/// Position in the loop flagged as sudden acceleration, every third loop.
const SUDDEN_AT: u64 = 12;

#[derive(Parser, Debug)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve a scripted `sensor_data` feed over Socket.IO websockets.
    Serve {
        #[arg(long, default_value = "127.0.0.1:5000")]
        bind: SocketAddr,
        #[arg(long, default_value_t = 200)]
        interval_ms: u64,
    },
    /// Print the first `count` scripted frames without serving them.
    Frames {
        #[arg(long, default_value_t = 30)]
        count: u64,
    },
}

#[derive(Clone)]
struct SimulatorState {
    interval: Duration,
}

/// Deterministic pedal cycle: idle, accelerate with a rising angle, brake.
#[derive(Debug, Default)]
struct PedalScript {
    step: u64,
}

impl PedalScript {
    /// Events to emit on the next tick. A retransmission tick yields the same
    /// event twice.
    fn next_batch(&mut self, timestamp: f64) -> Vec<SensorEvent> {
        let step = self.step;
        self.step += 1;

        let position = step % CYCLE_LEN;
        let lap = step / CYCLE_LEN;
        let (pedal, angle) = if position < ACCEL_START {
            (PEDAL_IDLE, 0.0)
        } else if position < BRAKE_START {
            let progress = (position - ACCEL_START + 1) as f64 / (BRAKE_START - ACCEL_START) as f64;
            (PEDAL_ACCELERATOR, (progress * 20.0 * 10.0).round() / 10.0)
        } else {
            (PEDAL_BRAKE, 0.0)
        };
        let event = SensorEvent {
            pedal,
            angle,
            timestamp,
            sudden_acceleration: position == SUDDEN_AT && lap % 3 == 2,
        };
        if position == RETRANSMIT_AT {
            vec![event.clone(), event]
        } else {
            vec![event]
        }
    }
}

fn unix_seconds() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

async fn feed_handler(ws: WebSocketUpgrade, State(state): State<SimulatorState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| feed_connection(state, socket))
}

async fn feed_connection(state: SimulatorState, socket: WebSocket) {
    let sid = Uuid::new_v4().to_string();
    if let Err(err) = run_feed_connection(&state, socket, &sid).await {
        warn!(%sid, "feed connection ended: {err:#}");
    } else {
        info!(%sid, "feed connection closed");
    }
}

async fn run_feed_connection(state: &SimulatorState, socket: WebSocket, sid: &str) -> Result<()> {
    let (mut sender, mut receiver) = socket.split();

    let open = EnginePacket::Open(Handshake {
        sid: sid.to_string(),
        upgrades: Vec::new(),
        ping_interval: PING_INTERVAL_MS,
        ping_timeout: PING_TIMEOUT_MS,
        max_payload: Some(MAX_PAYLOAD),
    });
    sender.send(Message::Text(open.encode())).await?;

    // Nothing is emitted until the client joins the default namespace.
    loop {
        let Some(msg) = receiver.next().await else {
            return Ok(());
        };
        let Message::Text(text) = msg? else {
            continue;
        };
        if let Ok(EnginePacket::Message(payload)) = EnginePacket::decode(&text) {
            if matches!(SocketPacket::decode(&payload), Ok(SocketPacket::Connect { .. })) {
                break;
            }
        }
    }
    let socket_sid = Uuid::new_v4().to_string();
    let joined = SocketPacket::Connect {
        namespace: "/".to_string(),
        data: Some(json!({ "sid": socket_sid })),
    };
    sender.send(Message::Text(joined.into_frame())).await?;
    info!(%sid, %socket_sid, "client joined sensor feed");

    let mut script = PedalScript::default();
    let mut ticks = tokio::time::interval(state.interval);
    let mut pings = tokio::time::interval(Duration::from_millis(PING_INTERVAL_MS));
    pings.tick().await;

    loop {
        tokio::select! {
            _ = ticks.tick() => {
                for event in script.next_batch(unix_seconds()) {
                    sender.send(Message::Text(sensor_data_frame(&event)?)).await?;
                }
            }
            _ = pings.tick() => {
                sender.send(Message::Text(EnginePacket::Ping(String::new()).encode())).await?;
            }
            incoming = receiver.next() => {
                let Some(msg) = incoming else {
                    return Ok(());
                };
                match msg? {
                    Message::Text(text) => match EnginePacket::decode(&text) {
                        Ok(EnginePacket::Close) => return Ok(()),
                        Ok(EnginePacket::Message(payload))
                            if matches!(SocketPacket::decode(&payload), Ok(SocketPacket::Disconnect { .. })) =>
                        {
                            return Ok(());
                        }
                        Ok(_) => {}
                        Err(err) => warn!(%sid, error = &err as &dyn std::error::Error, "ignoring undecodable frame"),
                    },
                    Message::Close(_) => return Ok(()),
                    _ => {}
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { bind, interval_ms } => {
            let state = SimulatorState {
                interval: Duration::from_millis(interval_ms.max(1)),
            };
            let app = Router::new()
                .route(ENGINE_IO_PATH, get(feed_handler))
                .with_state(state);
            let listener = tokio::net::TcpListener::bind(bind).await?;
            info!("sensor feed simulator listening on {}", listener.local_addr()?);
            axum::serve(listener, app).await?;
        }
        Command::Frames { count } => {
            let mut script = PedalScript::default();
            let start = unix_seconds();
            let mut emitted = 0;
            let mut tick = 0;
            while emitted < count {
                for event in script.next_batch(start + tick as f64 * 0.2) {
                    println!("{}", sensor_data_frame(&event)?);
                    emitted += 1;
                }
                tick += 1;
            }
        }
    }

    Ok(())
}
