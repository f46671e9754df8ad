//! Outgoing JSON-RPC request construction.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

/// One parameter value: the heterogeneous `{string, number, [string]}` union JSON-RPC params
/// take, expressed as an ordinary enum serialized untagged so each variant round-trips as its
/// own JSON type rather than a wrapper object.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ParamValue {
    /// A string value.
    Str(String),
    /// An integer value, e.g. the `interval` parameter of `public/set_heartbeat`. Kept distinct
    /// from `Num` so it serializes without a trailing `.0`, which some integer-typed venue
    /// fields reject.
    Int(i64),
    /// A floating-point value, e.g. a price or amount.
    Num(f64),
    /// A list of strings, e.g. the `channels` parameter of `public/subscribe`.
    List(Vec<String>),
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Str(value.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Str(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Num(value)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(value: Vec<String>) -> Self {
        ParamValue::List(value)
    }
}

/// A request's `params` object: an ordered mapping of name to [`ParamValue`].
pub type Params = BTreeMap<String, ParamValue>;

/// Builds a `Params` map from `(key, value)` pairs, converting each value with [`Into`].
#[macro_export]
macro_rules! params {
    () => { $crate::request::Params::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::request::Params::new();
        $( map.insert($key.to_owned(), $crate::request::ParamValue::from($value)); )+
        map
    }};
}

/// The outbound envelope: `{jsonrpc, id, method, params}`, per JSON-RPC 2.0.
#[derive(Debug, Serialize)]
pub struct Request {
    jsonrpc: &'static str,
    id: String,
    method: String,
    params: Value,
}

impl Request {
    /// Builds a request with an empty `params` object.
    #[must_use]
    pub fn empty(id: String, method: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params: Value::Object(serde_json::Map::new()),
        }
    }

    /// Builds a request from a `Params` map, keeping a copy as a [`Value`] for the pending table.
    ///
    /// # Panics
    ///
    /// Panics if `params` cannot be serialized to JSON, which cannot happen for this value type.
    #[must_use]
    pub fn with_params(id: String, method: impl Into<String>, params: &Params) -> Self {
        let params =
            serde_json::to_value(params).expect("Params only contains JSON-representable values");

        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
        }
    }

    /// The `params` object as it will be sent — also what gets retained in the pending table.
    #[must_use]
    pub fn params_value(&self) -> Value {
        self.params.clone()
    }
}
