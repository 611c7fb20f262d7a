//! Client-side session layer for a WebSocket mesh chat bridge.
//!
//! This library maintains one logical conversation stream over an unreliable
//! WebSocket connection. Inbound protocol frames are folded into an observable
//! [`SessionSnapshot`](session::SessionSnapshot) (identity, current server,
//! channel roster, message log); outbound user intents (join, send, switch
//! channel) are encoded into frames and written to the socket.
//!
//! The pieces, leaf to root:
//!
//! - [`protocol`]: wire codec between intents/frames and typed messages
//! - [`session`]: pure reducer from message to next snapshot
//! - [`connection`]: socket ownership, lifecycle state machine, heartbeat
//! - [`client`]: the public facade composing the above

pub mod client;
pub mod connection;
pub mod domain;
pub mod error;
pub mod logger;
pub mod protocol;
pub mod reconnect;
pub mod session;

pub use client::{ChatClient, ClientConfig};
pub use connection::ConnectionState;
pub use error::ClientError;
pub use protocol::{ChatMessage, Intent};
pub use reconnect::{FixedBackoff, NoReconnect, ReconnectPolicy};
pub use session::SessionSnapshot;
