//! Inbound JSON-RPC frame classification.

use serde::Deserialize;
use serde_json::Value;

use crate::error::Error;

/// JSON-RPC error object.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcError {
    /// Venue error code.
    pub code: i64,
    /// Venue error message.
    pub message: String,
}

/// The three structural shapes an inbound frame can take, dispatched on by shape rather than by
/// an explicit envelope tag (the venue does not send one).
#[derive(Debug)]
pub enum Inbound {
    /// Carries `method` (and optionally `params`) — not a reply to anything this client sent.
    Notification {
        /// The notified method name, e.g. `"heartbeat"` or `"subscription"`.
        method: String,
        /// The notification's `params` object, or `Null` if absent.
        params: Value,
    },
    /// Carries `id` and `result` — a successful reply to a prior request.
    Response {
        /// The request id this reply correlates to.
        id: String,
        /// The `result` value.
        result: Value,
    },
    /// Carries `id` and `error` — a failed reply to a prior request.
    Error {
        /// The request id this reply correlates to.
        id: String,
        /// The parsed `error` object.
        error: RpcError,
    },
}

impl Inbound {
    /// Classifies a raw frame by structural shape.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProtocolParse`] if `text` is not JSON, or if it is a JSON object that
    /// matches none of the three recognized shapes.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let value: Value = serde_json::from_str(text)?;

        if let Some(method) = value.get("method").and_then(Value::as_str) {
            return Ok(Inbound::Notification {
                method: method.to_owned(),
                params: value.get("params").cloned().unwrap_or(Value::Null),
            });
        }

        let id = value
            .get("id")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned);

        if let Some(result) = value.get("result") {
            let id = id.ok_or_else(|| Error::UnrecognizedFrame(text.to_owned()))?;
            return Ok(Inbound::Response {
                id,
                result: result.clone(),
            });
        }

        if let Some(error) = value.get("error") {
            let id = id.ok_or_else(|| Error::UnrecognizedFrame(text.to_owned()))?;
            let error: RpcError = serde_json::from_value(error.clone())?;
            return Ok(Inbound::Error { id, error });
        }

        Err(Error::UnrecognizedFrame(text.to_owned()))
    }
}
