//! Integration tests for the connection supervisor
//!
//! A local tokio-tungstenite server stands in for the remote relay; each
//! test drives the supervisor against it over a real socket.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::{accept_async, tungstenite::Message, WebSocketStream};

use ws_relay::relay::{ConnectionState, ConnectionSupervisor, SupervisorConfig};

const TEST_TIMEOUT: Duration = Duration::from_secs(5);
const TEST_BACKOFF: Duration = Duration::from_millis(100);

/// Bind a listener for the mock relay and return it with its ws:// URL
async fn mock_relay() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, format!("ws://{}/ws", addr))
}

/// Accept the supervisor's next connection on the mock relay
async fn accept_connection(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = timeout(TEST_TIMEOUT, listener.accept())
        .await
        .expect("timed out waiting for supervisor to connect")
        .unwrap();
    accept_async(stream).await.unwrap()
}

/// Start a supervisor with a short backoff and return it with its task handle
fn start_supervisor(endpoint: &str) -> (Arc<ConnectionSupervisor>, JoinHandle<anyhow::Result<()>>) {
    let config = SupervisorConfig::new(endpoint).with_backoff(TEST_BACKOFF);
    let supervisor = Arc::new(ConnectionSupervisor::new(config));
    let task = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move { supervisor.run().await })
    };
    (supervisor, task)
}

/// Read the next text frame from the mock relay's side of the connection
async fn next_text(ws: &mut WebSocketStream<TcpStream>) -> String {
    loop {
        let msg = timeout(TEST_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for a reply")
            .expect("connection ended while waiting for a reply")
            .unwrap();
        if let Message::Text(text) = msg {
            return text;
        }
    }
}

fn expected_reply() -> serde_json::Value {
    json!({
        "status": "success",
        "data": {
            "message": "Processed by FastAPI",
            "defaultKey": 4_000_000u64,
        }
    })
}

#[tokio::test]
async fn replies_with_fixed_payload() {
    let (listener, url) = mock_relay().await;
    let (supervisor, task) = start_supervisor(&url);

    let mut ws = accept_connection(&listener).await;
    ws.send(Message::Text(
        r#"{"method":"GET","path":"/x"}"#.to_string(),
    ))
    .await
    .unwrap();

    let reply: serde_json::Value = serde_json::from_str(&next_text(&mut ws).await).unwrap();
    assert_eq!(reply, expected_reply());

    supervisor.shutdown();
    timeout(TEST_TIMEOUT, task).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn one_reply_per_message_in_order() {
    let (listener, url) = mock_relay().await;
    let (supervisor, task) = start_supervisor(&url);

    let mut ws = accept_connection(&listener).await;
    for i in 0..3 {
        let inbound = json!({ "seq": i }).to_string();
        ws.send(Message::Text(inbound)).await.unwrap();
    }

    // Exactly one reply per inbound message, each the fixed payload
    for _ in 0..3 {
        let reply: serde_json::Value = serde_json::from_str(&next_text(&mut ws).await).unwrap();
        assert_eq!(reply, expected_reply());
    }

    // No extra replies in flight
    supervisor.shutdown();
    timeout(TEST_TIMEOUT, task).await.unwrap().unwrap().unwrap();
    let mut extra = 0;
    while let Some(Ok(msg)) = ws.next().await {
        if matches!(msg, Message::Text(_)) {
            extra += 1;
        }
    }
    assert_eq!(extra, 0);
}

#[tokio::test]
async fn malformed_payload_is_skipped() {
    let (listener, url) = mock_relay().await;
    let (supervisor, task) = start_supervisor(&url);

    let mut ws = accept_connection(&listener).await;
    ws.send(Message::Text("{not valid json".to_string()))
        .await
        .unwrap();
    ws.send(Message::Text(r#"{"ok":true}"#.to_string()))
        .await
        .unwrap();

    // The bad payload produces no reply and the connection stays open;
    // the valid one that follows is answered as usual.
    let reply: serde_json::Value = serde_json::from_str(&next_text(&mut ws).await).unwrap();
    assert_eq!(reply, expected_reply());

    supervisor.shutdown();
    timeout(TEST_TIMEOUT, task).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn reconnects_after_remote_close_with_backoff() {
    let (listener, url) = mock_relay().await;
    let (supervisor, task) = start_supervisor(&url);

    // Close immediately, before any message is exchanged
    let ws = accept_connection(&listener).await;
    let closed_at = Instant::now();
    drop(ws);

    // A fresh connection attempt arrives, but not before the backoff
    let _ws = accept_connection(&listener).await;
    assert!(closed_at.elapsed() >= TEST_BACKOFF);

    supervisor.shutdown();
    timeout(TEST_TIMEOUT, task).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn repeated_failures_keep_constant_backoff() {
    let (listener, url) = mock_relay().await;
    let (supervisor, task) = start_supervisor(&url);

    // Two consecutive zero-message closes; each retry waits at least one
    // full interval, with no cumulative growth
    let first = accept_connection(&listener).await;
    drop(first);
    let t1 = Instant::now();

    let second = accept_connection(&listener).await;
    let gap1 = t1.elapsed();
    drop(second);
    let t2 = Instant::now();

    let _third = accept_connection(&listener).await;
    let gap2 = t2.elapsed();

    assert!(gap1 >= TEST_BACKOFF);
    assert!(gap2 >= TEST_BACKOFF);
    assert!(gap2 < TEST_BACKOFF * 10, "backoff grew unexpectedly: {gap2:?}");

    supervisor.shutdown();
    timeout(TEST_TIMEOUT, task).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn shutdown_closes_live_session() {
    let (listener, url) = mock_relay().await;
    let (supervisor, task) = start_supervisor(&url);

    let mut ws = accept_connection(&listener).await;
    supervisor.shutdown();

    // The supervisor sends a close frame rather than dropping the socket
    let saw_close = loop {
        match timeout(TEST_TIMEOUT, ws.next()).await.unwrap() {
            Some(Ok(Message::Close(_))) | None => break true,
            Some(Ok(_)) => continue,
            Some(Err(_)) => break true,
        }
    };
    assert!(saw_close);

    timeout(TEST_TIMEOUT, task).await.unwrap().unwrap().unwrap();
    assert_eq!(supervisor.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn state_tracks_connection_lifecycle() {
    let (listener, url) = mock_relay().await;
    let (supervisor, task) = start_supervisor(&url);
    let mut state_rx = supervisor.state_receiver();

    let _ws = accept_connection(&listener).await;
    timeout(TEST_TIMEOUT, async {
        while *state_rx.borrow() != ConnectionState::Connected {
            state_rx.changed().await.unwrap();
        }
    })
    .await
    .expect("supervisor never reported Connected");

    supervisor.shutdown();
    timeout(TEST_TIMEOUT, task).await.unwrap().unwrap().unwrap();
    assert_eq!(supervisor.state(), ConnectionState::Disconnected);
}
