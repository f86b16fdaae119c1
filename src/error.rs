//! Crate-level error types.

/// Errors surfaced by the acquisition engine.
///
/// Transient conditions never surface here: transport stalls are retried
/// internally, and a waveform that goes missing mid-stream is re-requested
/// and then skipped without an error. Every variant below is fatal for the
/// acquisition it occurred in.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Malformed or missing response while reading the device configuration.
    #[error("configuration read failed: {0}")]
    Config(String),

    /// A wait predicate exceeded its time budget.
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    /// The transport failed outside the retryable envelope.
    #[error("transport error: {0}")]
    Transport(String),

    /// The wave descriptor announced no data and the response held only
    /// the two-byte terminator.
    #[error("device returned an empty waveform")]
    EmptyWaveform,

    /// The wave descriptor announced no data, or its fields are inconsistent.
    #[error("malformed wave descriptor: {0}")]
    MalformedHeader(String),

    /// The two-byte line-feed terminator after a data block was absent.
    #[error("waveform terminator missing")]
    MissingTerminator,

    /// The device or the host violated the acquisition protocol.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Create a configuration error with context.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a transport error with context.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a protocol error with context.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// True for wait-predicate timeouts.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Crate-level result type.
pub type Result<T> = std::result::Result<T, Error>;
