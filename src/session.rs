//! Session state and the pure reducer that advances it.
//!
//! The snapshot is only ever advanced by [`reduce`]; there is no other
//! mutation path for server-driven state. The reducer is deterministic and
//! side-effect free, which keeps every invariant testable without a socket.

use crate::protocol::ChatMessage;

/// Placeholder channel name until the first roster arrives.
pub const WAITING_CHANNEL: &str = "<waiting>";

/// Placeholder server name until the peer announces itself.
pub const UNKNOWN_SERVER: &str = "<unknown>";

/// Local user identity. Mutated only as a side effect of a successful join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
}

/// The full session state at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub identity: Identity,
    pub current_server: String,
    pub current_channel: String,
    /// Channel roster, order as received from the peer.
    pub channels: Vec<String>,
    /// Append-only message log; never truncated or reordered.
    pub log: Vec<ChatMessage>,
}

impl SessionSnapshot {
    pub fn new() -> Self {
        Self {
            identity: Identity {
                name: String::new(),
            },
            current_server: UNKNOWN_SERVER.to_string(),
            current_channel: WAITING_CHANNEL.to_string(),
            channels: Vec::new(),
            log: Vec::new(),
        }
    }

    /// The log filtered to what the current channel should display.
    ///
    /// Chat lines addressed to other channels are excluded; presence notices
    /// are visible everywhere.
    pub fn channel_log(&self) -> Vec<&ChatMessage> {
        self.log
            .iter()
            .filter(|msg| match msg {
                ChatMessage::Text { channel, .. } => channel == &self.current_channel,
                _ => true,
            })
            .collect()
    }
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

/// Fold one inbound message onto the previous snapshot.
///
/// - `Join` / `Text` append to the log, nothing else changes
/// - `Channels` replaces the roster wholesale; the current channel is set to
///   the first entry exactly once, while it still holds the waiting sentinel
/// - `CurrentServer` replaces the server name
pub fn reduce(prev: SessionSnapshot, msg: ChatMessage) -> SessionSnapshot {
    let mut next = prev;
    match msg {
        entry @ (ChatMessage::Text { .. } | ChatMessage::Join(_)) => {
            next.log.push(entry);
        }
        ChatMessage::Channels(list) => {
            if next.current_channel == WAITING_CHANNEL
                && let Some(first) = list.first()
            {
                next.current_channel = first.clone();
            }
            next.channels = list;
        }
        ChatMessage::CurrentServer(name) => {
            next.current_server = name;
        }
    }
    next
}
