use thiserror::Error;

/// Errors surfaced by the gateway client and the clip assembly pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// A control-plane message arrived out of the expected handshake
    /// order or with an unexpected shape. Fatal to `connect()`.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A speaker's audio segment for one chunk was longer than the chunk
    /// duration plus tolerance. Fatal to that assembly call only; the
    /// window is untouched and the caller may retry with a fresh snapshot.
    #[error("audio segment is {actual_ms}ms, longer than the {limit_ms}ms chunk limit")]
    LengthMismatch { actual_ms: u64, limit_ms: u64 },

    /// An operation was requested against state that doesn't exist yet
    /// (empty window, already-live session, unnegotiated media params).
    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WAV encoding error: {0}")]
    Wav(#[from] hound::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
