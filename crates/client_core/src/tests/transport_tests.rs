use super::*;
use axum::{
    extract::{
        ws::{Message as AxumMessage, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};
use tokio::net::TcpListener;

#[derive(Clone)]
struct FakeFeedState {
    frames: Arc<Vec<String>>,
    received: Arc<Mutex<Option<oneshot::Sender<Vec<String>>>>>,
}

async fn fake_feed_handler(
    ws: WebSocketUpgrade,
    State(state): State<FakeFeedState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| fake_feed_session(state, socket))
}

async fn next_text(socket: &mut WebSocket) -> Option<String> {
    while let Some(Ok(msg)) = socket.recv().await {
        if let AxumMessage::Text(text) = msg {
            return Some(text);
        }
    }
    None
}

async fn fake_feed_session(state: FakeFeedState, mut socket: WebSocket) {
    let mut received = Vec::new();
    let open = r#"0{"sid":"engine-sid","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#;
    socket
        .send(AxumMessage::Text(open.to_string()))
        .await
        .expect("send open");
    received.extend(next_text(&mut socket).await);
    socket
        .send(AxumMessage::Text(r#"40{"sid":"socket-sid"}"#.to_string()))
        .await
        .expect("send connect");
    socket
        .send(AxumMessage::Text("2".to_string()))
        .await
        .expect("send ping");
    received.extend(next_text(&mut socket).await);
    for frame in state.frames.iter() {
        socket
            .send(AxumMessage::Text(frame.clone()))
            .await
            .expect("send frame");
    }
    socket
        .send(AxumMessage::Text("41".to_string()))
        .await
        .expect("send disconnect");

    if let Some(tx) = state.received.lock().expect("lock").take() {
        let _ = tx.send(received);
    }
}

async fn spawn_fake_feed(frames: Vec<String>) -> (SocketAddr, oneshot::Receiver<Vec<String>>) {
    let (tx, rx) = oneshot::channel();
    let state = FakeFeedState {
        frames: Arc::new(frames),
        received: Arc::new(Mutex::new(Some(tx))),
    };
    let app = Router::new()
        .route("/socket.io/", get(fake_feed_handler))
        .with_state(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    (addr, rx)
}

fn sensor(pedal: i64, angle: f64, timestamp: f64, sudden: bool) -> SensorEvent {
    SensorEvent {
        pedal,
        angle,
        timestamp,
        sudden_acceleration: sudden,
    }
}

#[test]
fn rewrites_http_url_to_engine_io_websocket_endpoint() {
    let url = socket_io_endpoint("http://192.168.141.5:5000").expect("endpoint");
    assert_eq!(
        url.as_str(),
        "ws://192.168.141.5:5000/socket.io/?EIO=4&transport=websocket"
    );
    let secure = socket_io_endpoint("https://feed.example.com/base/").expect("endpoint");
    assert_eq!(
        secure.as_str(),
        "wss://feed.example.com/base/socket.io/?EIO=4&transport=websocket"
    );
}

#[test]
fn rejects_unsupported_schemes() {
    assert!(matches!(
        socket_io_endpoint("ftp://example.com"),
        Err(FeedError::InvalidUrl { .. })
    ));
    assert!(matches!(
        socket_io_endpoint("not a url"),
        Err(FeedError::InvalidUrl { .. })
    ));
}

#[test]
fn backoff_doubles_and_caps() {
    let policy = ReconnectPolicy {
        randomization_factor: 0.0,
        ..ReconnectPolicy::default()
    };
    assert_eq!(policy.delay_with_sample(0, 0.3), Duration::from_millis(1000));
    assert_eq!(policy.delay_with_sample(1, 0.3), Duration::from_millis(2000));
    assert_eq!(policy.delay_with_sample(2, 0.3), Duration::from_millis(4000));
    assert_eq!(policy.delay_with_sample(3, 0.3), Duration::from_millis(5000));
    assert_eq!(policy.delay_with_sample(40, 0.3), Duration::from_millis(5000));
}

#[test]
fn backoff_jitter_moves_both_directions() {
    let policy = ReconnectPolicy::default();
    // floor(0.25 * 10) = 2 (even): subtract floor(0.25 * 0.5 * 1000) = 125
    assert_eq!(policy.delay_with_sample(0, 0.25), Duration::from_millis(875));
    // floor(0.35 * 10) = 3 (odd): add floor(0.35 * 0.5 * 1000) = 175
    assert_eq!(policy.delay_with_sample(0, 0.35), Duration::from_millis(1175));
}

#[tokio::test]
async fn subscription_connects_streams_sensor_events_and_reports_disconnect() {
    let first = sensor(1, 5.0, 100.0, true);
    let second = sensor(-1, 0.0, 101.0, false);
    let frames = vec![
        shared::protocol::sensor_data_frame(&first).expect("frame"),
        r#"42["status",{"ok":true}]"#.to_string(),
        r#"42["sensor_data",{"pedal":"bad"}]"#.to_string(),
        "not-a-packet".to_string(),
        shared::protocol::sensor_data_frame(&second).expect("frame"),
    ];
    let (addr, received_rx) = spawn_fake_feed(frames).await;

    let mut feed = FeedSubscription::open(&format!("http://{addr}"), ReconnectPolicy::disabled())
        .expect("open");

    assert_eq!(
        feed.recv().await,
        Some(FeedEvent::Connected {
            sid: Some("socket-sid".to_string())
        })
    );
    assert_eq!(feed.recv().await, Some(FeedEvent::Sensor(first)));
    assert_eq!(feed.recv().await, Some(FeedEvent::Sensor(second)));
    assert!(matches!(
        feed.recv().await,
        Some(FeedEvent::Disconnected { .. })
    ));
    assert_eq!(feed.recv().await, None);

    let received = received_rx.await.expect("server transcript");
    assert_eq!(received, vec!["40".to_string(), "3".to_string()]);
}

#[tokio::test]
async fn failed_connect_without_reconnect_ends_subscription() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let mut feed = FeedSubscription::open(&format!("http://{addr}"), ReconnectPolicy::disabled())
        .expect("open");
    assert_eq!(feed.recv().await, None);
}

#[tokio::test]
async fn replayed_channel_behaves_like_live_feed() {
    let (tx, rx) = mpsc::channel(4);
    tx.send(FeedEvent::Sensor(sensor(0, 1.0, 1.0, false)))
        .await
        .expect("send");
    drop(tx);
    let mut feed = FeedSubscription::from_channel(rx);
    assert!(matches!(feed.recv().await, Some(FeedEvent::Sensor(_))));
    assert_eq!(feed.recv().await, None);
    feed.close().await;
}

/// Fake feed that joins every client, optionally drops the first session with
/// a server `41`, then records what the client sends until it goes away.
#[derive(Clone)]
struct SessionFeedState {
    ping_interval_ms: u64,
    ping_timeout_ms: u64,
    disconnect_first_session: bool,
    sessions: Arc<AtomicUsize>,
    transcripts: mpsc::UnboundedSender<Vec<String>>,
}

async fn session_feed_handler(
    ws: WebSocketUpgrade,
    State(state): State<SessionFeedState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| session_feed_session(state, socket))
}

async fn session_feed_session(state: SessionFeedState, mut socket: WebSocket) {
    let session = state.sessions.fetch_add(1, Ordering::SeqCst) + 1;
    let open = format!(
        r#"0{{"sid":"engine-{session}","upgrades":[],"pingInterval":{},"pingTimeout":{}}}"#,
        state.ping_interval_ms, state.ping_timeout_ms
    );
    if socket.send(AxumMessage::Text(open)).await.is_err() {
        return;
    }
    let mut received: Vec<String> = next_text(&mut socket).await.into_iter().collect();
    let joined = format!(r#"40{{"sid":"socket-{session}"}}"#);
    if socket.send(AxumMessage::Text(joined)).await.is_err() {
        return;
    }
    if state.disconnect_first_session && session == 1 {
        let _ = socket.send(AxumMessage::Text("41".to_string())).await;
    }
    while let Some(text) = next_text(&mut socket).await {
        received.push(text);
    }
    let _ = state.transcripts.send(received);
}

async fn spawn_session_feed(
    ping_interval_ms: u64,
    ping_timeout_ms: u64,
    disconnect_first_session: bool,
) -> (SocketAddr, mpsc::UnboundedReceiver<Vec<String>>) {
    let (transcripts, transcripts_rx) = mpsc::unbounded_channel();
    let state = SessionFeedState {
        ping_interval_ms,
        ping_timeout_ms,
        disconnect_first_session,
        sessions: Arc::new(AtomicUsize::new(0)),
        transcripts,
    };
    let app = Router::new()
        .route("/socket.io/", get(session_feed_handler))
        .with_state(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    (addr, transcripts_rx)
}

async fn recv_within(feed: &mut FeedSubscription) -> Option<FeedEvent> {
    tokio::time::timeout(Duration::from_secs(5), feed.recv())
        .await
        .expect("feed event in time")
}

#[tokio::test]
async fn close_sends_socket_io_disconnect_while_connected() {
    let (addr, mut transcripts) = spawn_session_feed(25_000, 20_000, false).await;
    let mut feed = FeedSubscription::open(&format!("http://{addr}"), ReconnectPolicy::disabled())
        .expect("open");
    assert_eq!(
        recv_within(&mut feed).await,
        Some(FeedEvent::Connected {
            sid: Some("socket-1".to_string())
        })
    );

    feed.close().await;

    let transcript = tokio::time::timeout(Duration::from_secs(5), transcripts.recv())
        .await
        .expect("transcript in time")
        .expect("transcript");
    assert_eq!(transcript, vec!["40".to_string(), "41".to_string()]);
}

#[tokio::test]
async fn server_disconnect_is_followed_by_reconnect() {
    let (addr, _transcripts) = spawn_session_feed(25_000, 20_000, true).await;
    let policy = ReconnectPolicy {
        enabled: true,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(20),
        randomization_factor: 0.0,
    };
    let mut feed = FeedSubscription::open(&format!("http://{addr}"), policy).expect("open");

    assert_eq!(
        recv_within(&mut feed).await,
        Some(FeedEvent::Connected {
            sid: Some("socket-1".to_string())
        })
    );
    match recv_within(&mut feed).await {
        Some(FeedEvent::Disconnected { reason }) => {
            assert_eq!(reason, FeedError::ServerDisconnect.to_string())
        }
        other => panic!("expected disconnect, got {other:?}"),
    }
    assert_eq!(
        recv_within(&mut feed).await,
        Some(FeedEvent::Connected {
            sid: Some("socket-2".to_string())
        })
    );
    feed.close().await;
}

#[tokio::test]
async fn silent_feed_trips_heartbeat_timeout() {
    let (addr, _transcripts) = spawn_session_feed(50, 50, false).await;
    let mut feed = FeedSubscription::open(&format!("http://{addr}"), ReconnectPolicy::disabled())
        .expect("open");

    assert!(matches!(
        recv_within(&mut feed).await,
        Some(FeedEvent::Connected { .. })
    ));
    match recv_within(&mut feed).await {
        Some(FeedEvent::Disconnected { reason }) => assert_eq!(
            reason,
            FeedError::HeartbeatTimeout(Duration::from_millis(100)).to_string()
        ),
        other => panic!("expected heartbeat timeout, got {other:?}"),
    }
    assert_eq!(recv_within(&mut feed).await, None);
}
