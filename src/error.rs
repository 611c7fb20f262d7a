//! Error types for the chat client.

use thiserror::Error;

/// Client-side failures.
///
/// Nothing in this layer is fatal to the hosting process: transport failures
/// degrade to the `Closed` connection state and everything else degrades to
/// "no state change".
#[derive(Debug, Error)]
pub enum ClientError {
    /// Socket-level failure (connect, read, write, or heartbeat).
    #[error("Connection error: {0}")]
    Connection(String),

    /// An outbound intent could not be serialized.
    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),
}
