//! Integration tests running the client against an in-process bridge that
//! speaks the wire protocol: a hello sequence (`CurrentServer`, `Channels`)
//! followed by an echo loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};

use meshchat_client::{ChatClient, ChatMessage, ClientConfig, ConnectionState, FixedBackoff};

/// In-process bridge: accepts any number of connections, records every frame
/// a client sends, and echoes chat traffic back the way the real bridge does.
struct TestServer {
    addr: SocketAddr,
    frames: mpsc::UnboundedReceiver<ChatMessage>,
    connections: Arc<AtomicUsize>,
}

impl TestServer {
    fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    async fn next_frame(&mut self) -> ChatMessage {
        timeout(Duration::from_secs(5), self.frames.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("server task ended")
    }
}

async fn spawn_server(drop_after_hello: bool) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (frame_tx, frames) = mpsc::unbounded_channel();
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&connections);

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(handle_connection(stream, frame_tx.clone(), drop_after_hello));
        }
    });

    TestServer {
        addr,
        frames,
        connections,
    }
}

async fn handle_connection(
    stream: TcpStream,
    frames: mpsc::UnboundedSender<ChatMessage>,
    drop_after_hello: bool,
) {
    let mut ws = accept_async(stream).await.unwrap();

    send_frame(&mut ws, &ChatMessage::CurrentServer("testnode".to_string())).await;
    send_frame(
        &mut ws,
        &ChatMessage::Channels(vec!["general".to_string(), "random".to_string()]),
    )
    .await;

    if drop_after_hello {
        let _ = ws.close(None).await;
        return;
    }

    while let Some(Ok(msg)) = ws.next().await {
        match msg {
            Message::Text(text) => {
                if let Ok(frame) = serde_json::from_str::<ChatMessage>(&text) {
                    let _ = frames.send(frame.clone());
                    send_frame(&mut ws, &frame).await;
                }
            }
            Message::Close(_) => return,
            _ => {}
        }
    }
}

async fn send_frame(ws: &mut WebSocketStream<TcpStream>, frame: &ChatMessage) {
    let text = serde_json::to_string(frame).unwrap();
    let _ = ws.send(Message::Text(text.into())).await;
}

#[tokio::test]
async fn connect_receives_server_identity_and_roster() {
    // given:
    let server = spawn_server(false).await;
    let mut client = ChatClient::new(ClientConfig::new(server.url()));

    // when:
    client.connect();

    // then: the hello sequence lands in the snapshot and the first roster
    // entry becomes the current channel
    let mut snapshots = client.subscribe();
    let snapshot = timeout(
        Duration::from_secs(5),
        snapshots.wait_for(|s| s.current_server == "testnode" && !s.channels.is_empty()),
    )
    .await
    .expect("timed out waiting for the hello sequence")
    .expect("snapshot channel closed")
    .clone();

    assert_eq!(snapshot.channels, vec!["general", "random"]);
    assert_eq!(snapshot.current_channel, "general");

    client.shutdown().await;
}

#[tokio::test]
async fn join_sanitizes_name_and_targets_current_server() {
    // given: a connected client that knows its server
    let mut server = spawn_server(false).await;
    let mut client = ChatClient::new(ClientConfig::new(server.url()));
    client.connect();
    let mut snapshots = client.subscribe();
    timeout(
        Duration::from_secs(5),
        snapshots.wait_for(|s| s.current_server == "testnode"),
    )
    .await
    .expect("timed out")
    .expect("snapshot channel closed");

    // when:
    client.join("bob!!");

    // then:
    let frame = server.next_frame().await;
    assert_eq!(frame, ChatMessage::Join("bob@testnode".to_string()));
    assert_eq!(client.snapshot().identity.name, "bob");

    client.shutdown().await;
}

#[tokio::test]
async fn send_normalizes_text_and_routes_to_current_channel() {
    // given: a joined client on the default channel
    let mut server = spawn_server(false).await;
    let mut client = ChatClient::new(ClientConfig::new(server.url()));
    client.connect();
    let mut snapshots = client.subscribe();
    timeout(
        Duration::from_secs(5),
        snapshots.wait_for(|s| s.current_server == "testnode" && s.current_channel == "general"),
    )
    .await
    .expect("timed out")
    .expect("snapshot channel closed");
    client.join("bob");
    server.next_frame().await;

    // when:
    client.send("  hello   world  ");

    // then: whitespace runs collapse and the frame carries author + channel
    let frame = server.next_frame().await;
    assert_eq!(
        frame,
        ChatMessage::Text {
            author: "bob".to_string(),
            content: "hello world".to_string(),
            channel: "general".to_string(),
        }
    );

    // The echo flows back through the reducer into the log.
    timeout(
        Duration::from_secs(5),
        snapshots.wait_for(|s| {
            s.log
                .iter()
                .any(|m| matches!(m, ChatMessage::Text { content, .. } if content == "hello world"))
        }),
    )
    .await
    .expect("timed out waiting for the echo")
    .expect("snapshot channel closed");

    client.shutdown().await;
}

#[tokio::test]
async fn whitespace_only_send_produces_no_frame() {
    // given:
    let mut server = spawn_server(false).await;
    let mut client = ChatClient::new(ClientConfig::new(server.url()));
    client.connect();
    let mut snapshots = client.subscribe();
    timeout(
        Duration::from_secs(5),
        snapshots.wait_for(|s| s.current_server == "testnode"),
    )
    .await
    .expect("timed out")
    .expect("snapshot channel closed");

    // when:
    client.send("   ");

    // then: nothing reaches the wire and the log stays empty
    let got = timeout(Duration::from_millis(300), server.frames.recv()).await;
    assert!(got.is_err(), "whitespace-only text must not produce a frame");
    assert!(client.snapshot().log.is_empty());

    client.shutdown().await;
}

#[tokio::test]
async fn double_connect_creates_exactly_one_socket() {
    // given:
    let server = spawn_server(false).await;
    let mut client = ChatClient::new(ClientConfig::new(server.url()));

    // when: the second call lands while the first dial is still in flight
    client.connect();
    client.connect();

    // then:
    let mut states = client.watch_state();
    timeout(
        Duration::from_secs(5),
        states.wait_for(|s| *s == ConnectionState::Open),
    )
    .await
    .expect("timed out")
    .expect("state channel closed");
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(server.connections.load(Ordering::SeqCst), 1);

    client.shutdown().await;
}

#[tokio::test]
async fn double_close_is_a_noop() {
    // given:
    let server = spawn_server(false).await;
    let mut client = ChatClient::new(ClientConfig::new(server.url()));
    client.connect();
    let mut states = client.watch_state();
    timeout(
        Duration::from_secs(5),
        states.wait_for(|s| *s == ConnectionState::Open),
    )
    .await
    .expect("timed out")
    .expect("state channel closed");

    // when:
    client.close();
    client.close();

    // then:
    timeout(
        Duration::from_secs(5),
        states.wait_for(|s| *s == ConnectionState::Closed),
    )
    .await
    .expect("timed out waiting for close")
    .expect("state channel closed");

    client.shutdown().await;
}

#[tokio::test]
async fn reconnect_policy_dials_again_after_drop() {
    // given: a bridge that drops every connection right after the hello
    let server = spawn_server(true).await;
    let config = ClientConfig::new(server.url()).with_reconnect(FixedBackoff {
        delay: Duration::from_millis(50),
        max_attempts: 3,
    });
    let mut client = ChatClient::new(config);

    // when:
    client.connect();

    // then: the hello was applied and a second socket is dialed on its own
    let mut snapshots = client.subscribe();
    timeout(
        Duration::from_secs(5),
        snapshots.wait_for(|s| s.current_server == "testnode"),
    )
    .await
    .expect("timed out")
    .expect("snapshot channel closed");

    timeout(Duration::from_secs(5), async {
        while server.connections.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("no reconnect was attempted");

    client.shutdown().await;
}

#[tokio::test]
async fn identity_edits_coalesce_into_one_join() {
    // given: a short debounce window
    let mut server = spawn_server(false).await;
    let config =
        ClientConfig::new(server.url()).with_join_debounce(Duration::from_millis(50));
    let mut client = ChatClient::new(config);
    client.connect();
    let mut snapshots = client.subscribe();
    timeout(
        Duration::from_secs(5),
        snapshots.wait_for(|s| s.current_server == "testnode"),
    )
    .await
    .expect("timed out")
    .expect("snapshot channel closed");

    // when: two rapid edits within the window
    client.set_identity("ali");
    client.set_identity("alice!");

    // then: exactly one join, carrying the last (sanitized) value
    let frame = server.next_frame().await;
    assert_eq!(frame, ChatMessage::Join("alice@testnode".to_string()));
    let extra = timeout(Duration::from_millis(300), server.frames.recv()).await;
    assert!(extra.is_err(), "expected exactly one join frame");

    client.shutdown().await;
}
