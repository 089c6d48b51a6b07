//! Error types for the bot bridge

use thiserror::Error;

use crate::types::PlaceError;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Bridge error types
///
/// None of these ever escape the bridge as a failure of the game itself; they
/// end up in the status signal and the log. A pacing timer that outlives its
/// session is not an error value at all: it simply never fires.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Socket failed to open, or closed unexpectedly
    #[error("transport error: {0}")]
    Transport(String),

    /// Frame could not be parsed, or has an unrecognized shape
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Engine refused the agent's placement
    #[error("engine rejected placement: {0}")]
    Semantic(#[from] PlaceError),

    /// Invalid endpoint or setting
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Protocol(err.to_string())
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        BridgeError::Transport(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for BridgeError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        BridgeError::Transport(err.to_string())
    }
}
