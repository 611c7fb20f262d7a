//! Public client facade.
//!
//! [`ChatClient`] composes the codec, the reducer, and the connection actor
//! behind a small surface: `connect`, `join`, `send`, `change_channel`, and
//! watch-channel subscriptions for snapshots and connection state. Operations
//! never block and never panic; anything undeliverable degrades to a logged
//! no-op.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::connection::{Command, ConnectionManager, ConnectionState, HEARTBEAT_INTERVAL};
use crate::domain::{sanitize_name, sanitize_text};
use crate::reconnect::{NoReconnect, ReconnectPolicy};
use crate::session::SessionSnapshot;

/// Window within which repeated identity edits coalesce into one join.
pub const JOIN_DEBOUNCE: Duration = Duration::from_millis(400);

/// Connection settings for a [`ChatClient`].
#[derive(Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint, e.g. `ws://127.0.0.1:8080`.
    pub url: String,
    pub heartbeat_interval: Duration,
    pub join_debounce: Duration,
    /// Policy consulted after every close. Defaults to staying closed.
    pub reconnect: Arc<dyn ReconnectPolicy>,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            heartbeat_interval: HEARTBEAT_INTERVAL,
            join_debounce: JOIN_DEBOUNCE,
            reconnect: Arc::new(NoReconnect),
        }
    }

    pub fn with_reconnect(mut self, policy: impl ReconnectPolicy + 'static) -> Self {
        self.reconnect = Arc::new(policy);
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_join_debounce(mut self, window: Duration) -> Self {
        self.join_debounce = window;
        self
    }
}

/// Handle to one logical conversation stream.
///
/// Dropping the client tears the connection down; [`ChatClient::shutdown`]
/// does the same but waits for the connection task to finish.
pub struct ChatClient {
    config: ClientConfig,
    commands: mpsc::UnboundedSender<Command>,
    snapshot_tx: Arc<watch::Sender<SessionSnapshot>>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    task: Option<JoinHandle<()>>,
}

impl ChatClient {
    /// Create an idle client. No socket exists until [`ChatClient::connect`].
    pub fn new(config: ClientConfig) -> Self {
        let (snapshot_tx, _) = watch::channel(SessionSnapshot::new());
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        // Commands go nowhere until the first connect wires up an actor.
        let (commands, _) = mpsc::unbounded_channel();
        Self {
            config,
            commands,
            snapshot_tx: Arc::new(snapshot_tx),
            state_tx: Arc::new(state_tx),
            task: None,
        }
    }

    /// Open the connection.
    ///
    /// Idempotent: while a dial is in flight or a socket is open this is a
    /// no-op, so exactly one socket can be alive at a time. After a close it
    /// dials again, which is also the manual-reconnect path.
    pub fn connect(&mut self) {
        let state = self.state();
        if !state.can_connect() {
            tracing::debug!("Ignoring connect; connection already live (state: {:?})", state);
            return;
        }
        if self.task.as_ref().is_some_and(|task| !task.is_finished()) {
            tracing::debug!("Ignoring connect; connection task still running");
            return;
        }

        let (commands, receiver) = mpsc::unbounded_channel();
        let manager = ConnectionManager::new(
            self.config.clone(),
            Arc::clone(&self.snapshot_tx),
            Arc::clone(&self.state_tx),
            receiver,
        );
        self.commands = commands;
        self.task = Some(tokio::spawn(manager.run()));
    }

    /// Announce presence under `name`.
    ///
    /// The name is restricted to `[A-Za-z0-9_]`; a name that sanitizes to
    /// nothing is rejected. Valid only while open; otherwise the call is a
    /// logged no-op and the caller is expected to retry once connected.
    pub fn join(&self, name: &str) {
        let name = sanitize_name(name);
        if name.is_empty() {
            tracing::warn!("Ignoring join; name is empty after sanitization");
            return;
        }
        let state = self.state();
        if !state.can_send() {
            tracing::warn!("Ignoring join; connection is not open (state: {:?})", state);
            return;
        }
        let _ = self.commands.send(Command::Join(name));
    }

    /// Debounced identity change: rapid successive calls collapse into one
    /// join carrying the last value, sent once the value stabilizes.
    pub fn set_identity(&self, name: &str) {
        let name = sanitize_name(name);
        if name.is_empty() {
            return;
        }
        let _ = self.commands.send(Command::SetIdentity(name));
    }

    /// Send a chat line to the current channel.
    ///
    /// Whitespace runs collapse to one space and the line is capped at 250
    /// characters; empty or whitespace-only input is dropped. Valid only
    /// while open.
    pub fn send(&self, text: &str) {
        let Some(content) = sanitize_text(text) else {
            return;
        };
        let state = self.state();
        if !state.can_send() {
            tracing::warn!("Dropping message; connection is not open (state: {:?})", state);
            return;
        }
        let _ = self.commands.send(Command::SendText(content));
    }

    /// Switch the current channel. Purely local: no wire interaction and no
    /// membership validation.
    pub fn change_channel(&self, channel: &str) {
        let channel = channel.to_string();
        self.snapshot_tx.send_modify(|s| s.current_channel = channel);
    }

    /// Subscribe to session snapshots. Every reducer application and local
    /// mutation publishes a new value; dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Subscribe to connection lifecycle transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// The current session snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// The current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Tear the connection down. Idempotent and safe to call in any state,
    /// including when no socket exists.
    pub fn close(&self) {
        let _ = self.commands.send(Command::Close);
    }

    /// Close and wait for the connection task to finish.
    pub async fn shutdown(mut self) {
        self.close();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("Connection task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for ChatClient {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Close);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::WAITING_CHANNEL;

    #[test]
    fn test_send_while_not_open_is_a_guarded_noop() {
        // given: a client that never connected
        let client = ChatClient::new(ClientConfig::new("ws://127.0.0.1:9"));

        // when:
        client.send("hi");

        // then: no panic, no state change
        assert_eq!(client.state(), ConnectionState::Idle);
        assert!(client.snapshot().log.is_empty());
    }

    #[test]
    fn test_join_with_empty_sanitized_name_is_rejected() {
        // given:
        let client = ChatClient::new(ClientConfig::new("ws://127.0.0.1:9"));

        // when: nothing survives sanitization
        client.join("!!!");

        // then:
        assert_eq!(client.snapshot().identity.name, "");
    }

    #[test]
    fn test_change_channel_is_local_and_observable() {
        // given:
        let client = ChatClient::new(ClientConfig::new("ws://127.0.0.1:9"));
        let subscriber = client.subscribe();
        assert_eq!(client.snapshot().current_channel, WAITING_CHANNEL);

        // when:
        client.change_channel("random");

        // then: the snapshot moved and subscribers were notified, all
        // without any connection
        assert_eq!(client.snapshot().current_channel, "random");
        assert!(subscriber.has_changed().unwrap());
        assert_eq!(client.state(), ConnectionState::Idle);
    }

    #[test]
    fn test_close_without_a_socket_is_idempotent() {
        // given:
        let client = ChatClient::new(ClientConfig::new("ws://127.0.0.1:9"));

        // when / then: both calls are quiet no-ops
        client.close();
        client.close();
        assert_eq!(client.state(), ConnectionState::Idle);
    }
}
