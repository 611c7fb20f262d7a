//! Wire protocol codec.
//!
//! Frames are JSON text, one externally tagged [`ChatMessage`] per frame,
//! exchanged in both directions. Outbound user intents are mapped onto the
//! same frame type before serialization.

use serde::{Deserialize, Serialize};

/// One protocol frame, as it appears on the wire and in the session log.
///
/// The serde derive produces the externally tagged encoding the bridge
/// expects: `{"Join":"bob"}`, `{"Text":{"author":...,"content":...,
/// "channel":...}}`, `{"Channels":["general"]}`, `{"CurrentServer":"node"}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChatMessage {
    /// A chat line addressed to one channel.
    Text {
        author: String,
        content: String,
        channel: String,
    },
    /// Presence notice for a user.
    Join(String),
    /// Full roster replacement, order as sent by the peer.
    Channels(Vec<String>),
    /// Server identity announcement.
    CurrentServer(String),
}

/// An outbound user intent, before encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Announce presence as `name` on `server`.
    Join { name: String, server: String },
    /// Send a chat line to `channel`.
    Text {
        author: String,
        content: String,
        channel: String,
    },
}

impl Intent {
    /// Map the intent onto its wire frame.
    ///
    /// `Join` collapses name and server into the `"<name>@<server>"` payload
    /// the bridge routes on; `Text` carries all three fields verbatim.
    fn into_frame(self) -> ChatMessage {
        match self {
            Intent::Join { name, server } => ChatMessage::Join(format!("{name}@{server}")),
            Intent::Text {
                author,
                content,
                channel,
            } => ChatMessage::Text {
                author,
                content,
                channel,
            },
        }
    }
}

/// Encode an outbound intent as a JSON text frame.
pub fn encode(intent: Intent) -> Result<String, serde_json::Error> {
    serde_json::to_string(&intent.into_frame())
}

/// Decode an inbound text frame into a typed message.
///
/// Malformed payloads and unrecognized tags yield `None`; one bad frame must
/// never terminate the session, so callers drop it and move on.
pub fn decode(raw: &str) -> Option<ChatMessage> {
    match serde_json::from_str(raw) {
        Ok(msg) => Some(msg),
        Err(e) => {
            tracing::debug!("Dropping undecodable frame: {}", e);
            None
        }
    }
}
