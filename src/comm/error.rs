//! Error types for the message-passing layer

use thiserror::Error;

/// Result type for communication operations
pub type CommResult<T> = std::result::Result<T, CommError>;

/// Errors raised by [`World`](super::World) and friends
#[derive(Debug, Error)]
pub enum CommError {
    /// Socket-level failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Message could not be encoded
    #[error("Failed to encode message: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// Message body could not be decoded
    #[error("Failed to decode message: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// Length prefix exceeds the frame limit
    #[error("Frame too large: {len} bytes (max {max})")]
    FrameTooLarge { len: usize, max: usize },

    /// Peer speaks a different protocol version
    #[error("Protocol version mismatch: local={local}, peer={peer}")]
    ProtocolMismatch { local: u32, peer: u32 },

    /// Rank outside `[0, world_size)` or not routable
    #[error("Invalid rank: {0}")]
    InvalidRank(u32),

    /// Two peers claimed the same rank during init
    #[error("Duplicate rank in handshake: {0}")]
    DuplicateRank(u32),

    /// Walker could not reach the root before the deadline
    #[error("Timed out after {0}ms connecting to root")]
    ConnectTimeout(u64),

    /// Root gave up waiting for walkers to join
    #[error("Timed out after {timeout_ms}ms waiting for walkers ({joined} of {expected} joined)")]
    AcceptTimeout {
        joined: u32,
        expected: u32,
        timeout_ms: u64,
    },

    /// Peer sent a message that is not valid at this point of the protocol
    #[error("Unexpected message: {0}")]
    UnexpectedMessage(String),

    /// Peer closed the connection
    #[error("Peer disconnected")]
    Disconnected,
}

impl CommError {
    /// Creates an unexpected-message error from anything printable.
    pub fn unexpected(msg: impl std::fmt::Debug) -> Self {
        Self::UnexpectedMessage(format!("{:?}", msg))
    }
}
