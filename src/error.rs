//! Error types for the session core.

/// Top-level error type for the live-session system.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Inbound event source error (subscribe/unsubscribe failure).
    #[error("event source error: {0}")]
    Source(String),

    /// Outbound send rejected or failed.
    #[error("send error: {0}")]
    Send(String),

    /// Media playback error that is not locally absorbable.
    #[error("playback error: {0}")]
    Playback(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, SessionError>;
