//! Connection lifecycle management.
//!
//! [`ConnectionManager`] is an actor task that exclusively owns the one
//! WebSocket handle. Every session mutation happens on this task, so the
//! snapshot and the state machine never see parallel writers. The facade
//! talks to it over an unbounded command channel and observes it through
//! watch channels.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::client::ClientConfig;
use crate::error::ClientError;
use crate::protocol::{self, ChatMessage, Intent};
use crate::session::{self, SessionSnapshot};

/// Spacing between transport liveness probes.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Lifecycle of the single socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection has been attempted yet.
    Idle,
    /// A dial is in flight.
    Connecting,
    /// The socket is live and frames may be sent.
    Open,
    /// The socket is gone; reachable again only through reconnect.
    Closed,
}

impl ConnectionState {
    /// A new dial is allowed only when no socket is alive or in flight.
    pub fn can_connect(self) -> bool {
        matches!(self, ConnectionState::Idle | ConnectionState::Closed)
    }

    /// Outbound frames are deliverable only on an open socket.
    pub fn can_send(self) -> bool {
        matches!(self, ConnectionState::Open)
    }
}

/// Instructions from the facade to the connection actor.
#[derive(Debug)]
pub(crate) enum Command {
    /// Announce presence under an already sanitized name.
    Join(String),
    /// Send an already sanitized chat line to the current channel.
    SendText(String),
    /// Debounced join: coalesce rapid identity edits into one announcement.
    SetIdentity(String),
    /// Tear the connection down for good.
    Close,
}

/// Why a driven socket session ended.
enum SessionEnd {
    /// Explicit teardown; the actor must not reconnect.
    Teardown,
    /// The transport died underneath us.
    Lost,
}

/// Outcome of one dial attempt.
enum Dial {
    Socket(Box<WsStream>),
    Failed,
    Teardown,
}

pub(crate) struct ConnectionManager {
    config: ClientConfig,
    snapshot_tx: Arc<watch::Sender<SessionSnapshot>>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    commands: mpsc::UnboundedReceiver<Command>,
    /// Identity waiting for its debounce window to elapse.
    pending_identity: Option<(String, Instant)>,
}

impl ConnectionManager {
    pub(crate) fn new(
        config: ClientConfig,
        snapshot_tx: Arc<watch::Sender<SessionSnapshot>>,
        state_tx: Arc<watch::Sender<ConnectionState>>,
        commands: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        Self {
            config,
            snapshot_tx,
            state_tx,
            commands,
            pending_identity: None,
        }
    }

    /// Drive the connection until teardown or until the reconnect policy
    /// declines to dial again.
    pub(crate) async fn run(mut self) {
        let mut attempt: u32 = 0;
        loop {
            self.transition(ConnectionState::Connecting);
            tracing::info!("Connecting to {}", self.config.url);

            match self.establish().await {
                Dial::Teardown => break,
                Dial::Failed => {}
                Dial::Socket(ws) => {
                    attempt = 0;
                    self.transition(ConnectionState::Open);
                    tracing::info!("Connected to {}", self.config.url);
                    if let SessionEnd::Teardown = self.drive(*ws).await {
                        break;
                    }
                }
            }

            self.transition(ConnectionState::Closed);
            let Some(delay) = self.config.reconnect.next_delay(attempt) else {
                tracing::info!("Connection closed; no reconnect scheduled");
                return;
            };
            attempt += 1;
            tracing::info!("Reconnecting in {:?} (attempt {})", delay, attempt);
            if !self.wait_for_reconnect(delay).await {
                break;
            }
        }
        self.transition(ConnectionState::Closed);
    }

    /// Dial the peer while staying responsive to commands.
    async fn establish(&mut self) -> Dial {
        let url = self.config.url.clone();
        let connect = connect_async(url);
        tokio::pin!(connect);

        loop {
            tokio::select! {
                result = &mut connect => match result {
                    Ok((ws, _response)) => return Dial::Socket(Box::new(ws)),
                    Err(e) => {
                        tracing::warn!("{}", ClientError::Connection(e.to_string()));
                        return Dial::Failed;
                    }
                },
                cmd = self.commands.recv() => match cmd {
                    None | Some(Command::Close) => return Dial::Teardown,
                    Some(Command::SetIdentity(name)) => self.set_pending_identity(name),
                    Some(Command::Join(_) | Command::SendText(_)) => {
                        tracing::warn!("Dropping outbound message; connection is not open");
                    }
                },
            }
        }
    }

    /// Pump one open socket: inbound frames into the reducer, commands onto
    /// the wire, and a heartbeat probing for a dead transport.
    async fn drive(&mut self, ws: WsStream) -> SessionEnd {
        let (mut write, mut read) = ws.split();

        // Re-announce a known identity after (re)connecting.
        let name = self.snapshot_tx.borrow().identity.name.clone();
        if !name.is_empty() && self.send_join(name, &mut write).await.is_err() {
            return SessionEnd::Lost;
        }

        let mut heartbeat = time::interval_at(
            Instant::now() + self.config.heartbeat_interval,
            self.config.heartbeat_interval,
        );

        loop {
            let debounce_at = self.pending_identity.as_ref().map(|(_, at)| *at);

            tokio::select! {
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(msg) = protocol::decode(&text) {
                            self.apply(msg);
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("Server closed the connection");
                        return SessionEnd::Lost;
                    }
                    // Ping/pong/binary are not part of the protocol.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!("{}", ClientError::Connection(e.to_string()));
                        return SessionEnd::Lost;
                    }
                    None => {
                        tracing::info!("WebSocket stream ended");
                        return SessionEnd::Lost;
                    }
                },
                cmd = self.commands.recv() => match cmd {
                    None | Some(Command::Close) => {
                        let _ = write.send(Message::Close(None)).await;
                        return SessionEnd::Teardown;
                    }
                    Some(Command::Join(name)) => {
                        // Optimistic identity update, then announce.
                        self.snapshot_tx.send_modify(|s| s.identity.name = name.clone());
                        if self.send_join(name, &mut write).await.is_err() {
                            return SessionEnd::Lost;
                        }
                    }
                    Some(Command::SendText(content)) => {
                        let (author, channel) = {
                            let snap = self.snapshot_tx.borrow();
                            (snap.identity.name.clone(), snap.current_channel.clone())
                        };
                        let intent = Intent::Text { author, content, channel };
                        if self.send_intent(intent, &mut write).await.is_err() {
                            return SessionEnd::Lost;
                        }
                    }
                    Some(Command::SetIdentity(name)) => self.set_pending_identity(name),
                },
                _ = heartbeat.tick() => {
                    // A transport that died without delivering a close event
                    // fails the ping write; synthesize the close from it.
                    if let Err(e) = write.send(Message::Ping(vec![].into())).await {
                        tracing::warn!("Heartbeat failed, transport is dead: {}", e);
                        return SessionEnd::Lost;
                    }
                },
                _ = sleep_until_or_never(debounce_at) => {
                    if let Some((name, _)) = self.pending_identity.take() {
                        self.snapshot_tx.send_modify(|s| s.identity.name = name.clone());
                        if self.send_join(name, &mut write).await.is_err() {
                            return SessionEnd::Lost;
                        }
                    }
                },
            }
        }
    }

    /// Sleep through the reconnect delay while staying responsive to
    /// commands. Returns `false` on teardown.
    async fn wait_for_reconnect(&mut self, delay: Duration) -> bool {
        let deadline = Instant::now() + delay;
        loop {
            tokio::select! {
                _ = time::sleep_until(deadline) => return true,
                cmd = self.commands.recv() => match cmd {
                    None | Some(Command::Close) => return false,
                    Some(Command::SetIdentity(name)) => self.set_pending_identity(name),
                    Some(Command::Join(_) | Command::SendText(_)) => {
                        tracing::warn!("Dropping outbound message; connection is not open");
                    }
                },
            }
        }
    }

    /// Fold one inbound message onto the snapshot, atomically, notifying
    /// every subscriber.
    fn apply(&self, msg: ChatMessage) {
        self.snapshot_tx.send_modify(|snapshot| {
            let prev = std::mem::take(snapshot);
            *snapshot = session::reduce(prev, msg);
        });
    }

    fn transition(&self, next: ConnectionState) {
        let prev = self.state_tx.send_replace(next);
        if prev != next {
            tracing::debug!("Connection state: {:?} -> {:?}", prev, next);
        }
    }

    fn set_pending_identity(&mut self, name: String) {
        self.pending_identity = Some((name, Instant::now() + self.config.join_debounce));
    }

    async fn send_join(&self, name: String, write: &mut WsSink) -> Result<(), ClientError> {
        let server = self.snapshot_tx.borrow().current_server.clone();
        self.send_intent(Intent::Join { name, server }, write).await
    }

    async fn send_intent(&self, intent: Intent, write: &mut WsSink) -> Result<(), ClientError> {
        let frame = match protocol::encode(intent) {
            Ok(frame) => frame,
            Err(e) => {
                // A serialization failure is not a transport failure; drop
                // the intent and keep the session alive.
                tracing::error!("Failed to encode frame: {}", e);
                return Ok(());
            }
        };
        write.send(Message::Text(frame.into())).await.map_err(|e| {
            let err = ClientError::Connection(e.to_string());
            tracing::warn!("Failed to send frame: {}", err);
            err
        })
    }
}

async fn sleep_until_or_never(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}
