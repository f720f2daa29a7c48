use thiserror::Error;

/// Failure taxonomy for the sync and notification core.
///
/// `Transport` and `Upstream` are both retryable, but only at the next
/// scheduled cycle. Nothing here is fatal to the scheduling process; jobs
/// log and carry on.
#[derive(Debug, Error)]
pub enum BotError {
    /// Connectivity, timeout, or response-decoding failure below the HTTP
    /// status level.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The upstream judge API answered with a non-success status.
    #[error("upstream responded with status {0}")]
    Upstream(reqwest::StatusCode),

    #[error("database failure: {0}")]
    Persistence(#[from] rusqlite::Error),

    /// A send to the messaging platform failed. Logged and dropped by the
    /// dispatch loops.
    #[error("messaging platform failure: {0}")]
    Platform(#[from] serenity::Error),

    /// Malformed or out-of-range values, caught before any I/O happens.
    #[error("invalid configuration: {0}")]
    Configuration(String),
}
