//! Main crate error.

/// Main error enum.
///
/// Every fatal condition named in the error-handling design ends up as one of these variants;
/// the non-fatal JSON-RPC error codes (`11044`, `10010`, `13009`, `13777`) are reconciled at the
/// session/strategy boundary and never surface here.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// TLS/TCP/WebSocket failure.
    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),
    /// Inbound frame was not valid JSON.
    #[error("failed to parse JSON-RPC frame: {0}")]
    ProtocolParse(#[from] serde_json::Error),
    /// Inbound frame was valid JSON but matched none of the recognized JSON-RPC shapes.
    #[error("unrecognized JSON-RPC frame shape: {0}")]
    UnrecognizedFrame(String),
    /// A book update's `prev_change_id` did not match the locally stored sequence.
    #[error("book sequence gap: expected prev_change_id {expected}, got {got}")]
    SequenceGap {
        /// Locally stored `change_id` before the update was applied.
        expected: i64,
        /// `prev_change_id` carried by the rejected update.
        got: i64,
    },
    /// A book delta carried an action other than `new`/`change`/`delete`.
    #[error("invalid book change type: {0}")]
    InvalidChangeType(String),
    /// A `new` inserted a price that was already resting, or a `change`/`delete` named an absent one.
    #[error("book price {0} violates a new/change/delete precondition")]
    BookPriceViolation(f64),
    /// The server's reported position disagreed with the locally tracked one.
    #[error("position mismatch: local {local}, server {server}")]
    PositionMismatch {
        /// Locally tracked position in USD.
        local: f64,
        /// Position reported by `private/get_position`.
        server: f64,
    },
    /// A trade notification carried a `direction` other than `buy`/`sell`.
    #[error("invalid trade direction: {0}")]
    InvalidDirection(String),
    /// A trade notification carried a `state` other than `filled`/`open`.
    #[error("unexpected trade state: {0}")]
    UnexpectedState(String),
    /// A JSON-RPC error arrived with a code outside the recognized set.
    #[error("unexpected JSON-RPC error {code}: {message}")]
    UnexpectedError {
        /// Venue error code.
        code: i64,
        /// Venue error message.
        message: String,
    },
    /// The implied-volatility Newton solver exceeded its step cap without converging.
    #[error("implied volatility solver did not converge within {0} steps")]
    NotConverged(usize),
    /// A venue URI could not be parsed.
    #[error("invalid venue URI: {0}")]
    InvalidUri(String),
    /// Failed to open or write the subscription-writer output file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate's public API.
pub type Result<T> = std::result::Result<T, Error>;
