//! JSON-RPC-over-WebSocket session: framing, id correlation, dispatch, and auth lifecycle.

use std::collections::HashMap;

use serde_json::Value;
use uuid::Uuid;

use crate::error::Error;
use crate::params;
use crate::request::{Params, Request};
use crate::response::Inbound;
use crate::uri::Uri;
use crate::ws::WsChannel;

/// Capability interface a strategy registers with [`Session::run`].
///
/// The session takes the strategy as a collaborator rather than the strategy owning (or being
/// owned by) a session, so a hook can be handed `&mut Session` to send further requests without
/// creating a self-referential type.
///
/// Methods are `async fn` directly (no `async-trait`) since the loop that drives them runs on a
/// single task and never needs the hooks to be `Send` across an executor boundary.
#[allow(async_fn_in_trait)]
pub trait StrategyHooks {
    /// A server-initiated message: `{method, params}` with no correlating request.
    async fn on_notification(
        &mut self,
        session: &mut Session,
        method: &str,
        params: &Value,
    ) -> Result<(), Error>;

    /// A successful reply to a request this client sent. `request_params` is the params the
    /// session retained when the request went out.
    async fn on_response(
        &mut self,
        session: &mut Session,
        method: &str,
        request_params: &Value,
        result: &Value,
    ) -> Result<(), Error>;

    /// A failed reply to a request this client sent, for any error code the session itself does
    /// not recognize and reconcile (`13009` never reaches here — see [`Session::run`]).
    async fn on_error(
        &mut self,
        session: &mut Session,
        method: &str,
        request_params: &Value,
        code: i64,
        message: &str,
    ) -> Result<(), Error>;
}

/// JSON-RPC error code for an expired access token — handled transparently by the session.
const EXPIRED_ACCESS_TOKEN: i64 = 13_009;

/// A JSON-RPC-over-WebSocket session: the channel, the pending-request table, and the auth state.
#[derive(Debug)]
pub struct Session {
    channel: WsChannel,
    pending: HashMap<String, (String, Value)>,
    refresh_token: Option<String>,
    access_token: Option<String>,
}

impl Session {
    /// Connects to `uri` and, if `client_id` is non-empty, bootstraps authentication with
    /// `public/auth {grant_type: "client_credentials", ...}`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the connection cannot be established, or whatever
    /// [`Session::send`] returns for the initial auth request.
    pub async fn connect(uri: &Uri, client_id: &str, client_secret: &str) -> Result<Self, Error> {
        let channel = WsChannel::connect(uri).await?;

        let mut session = Self {
            channel,
            pending: HashMap::new(),
            refresh_token: None,
            access_token: None,
        };

        if !client_id.is_empty() {
            session
                .send(
                    "public/auth",
                    &params! {
                        "grant_type" => "client_credentials",
                        "client_id" => client_id,
                        "client_secret" => client_secret,
                    },
                )
                .await?;
        }

        Ok(session)
    }

    /// The access token most recently received from `public/auth`, if any.
    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    /// Sends a request with no parameters; returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the frame could not be written.
    pub async fn send_empty(&mut self, method: impl Into<String>) -> Result<String, Error> {
        let method = method.into();
        let id = Uuid::new_v4().to_string();
        let request = Request::empty(id.clone(), method.clone());

        self.dispatch_send(id.clone(), method, request.params_value(), &request)
            .await?;

        Ok(id)
    }

    /// Sends a request with the given parameters; returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the frame could not be written.
    pub async fn send(&mut self, method: impl Into<String>, params: &Params) -> Result<String, Error> {
        let method = method.into();
        let id = Uuid::new_v4().to_string();
        let request = Request::with_params(id.clone(), method.clone(), params);

        self.dispatch_send(id.clone(), method, request.params_value(), &request)
            .await?;

        Ok(id)
    }

    async fn dispatch_send(
        &mut self,
        id: String,
        method: String,
        params_value: Value,
        request: &Request,
    ) -> Result<(), Error> {
        let text = serde_json::to_string(request)?;
        self.channel.send(text).await?;
        self.pending.insert(id, (method, params_value));
        Ok(())
    }

    /// Sends `public/subscribe {channels}`; returns the request id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the frame could not be written.
    pub async fn subscribe(&mut self, channels: Vec<String>) -> Result<String, Error> {
        self.send("public/subscribe", &params! { "channels" => channels }).await
    }

    /// Runs the receive-dispatch loop until the channel closes or a fatal error occurs.
    ///
    /// Exactly one frame is in flight at a time: `recv` is awaited, then fully dispatched
    /// (including every `send` the dispatch triggers) before the next `recv` begins, so the hook
    /// target's state is never touched from more than one place at once.
    ///
    /// # Errors
    ///
    /// Propagates transport errors, parse errors, and anything a hook returns. The channel is
    /// closed on every exit path, success or failure.
    pub async fn run(&mut self, hooks: &mut impl StrategyHooks) -> Result<(), Error> {
        let result = self.run_inner(hooks).await;
        let _ = self.channel.close().await;
        result
    }

    async fn run_inner(&mut self, hooks: &mut impl StrategyHooks) -> Result<(), Error> {
        while self.channel.is_open() {
            let text = match self.channel.recv().await {
                Ok(text) => text,
                Err(Error::Transport(tokio_tungstenite::tungstenite::Error::ConnectionClosed)) => {
                    return Ok(());
                }
                Err(other) => return Err(other),
            };

            match Inbound::parse(&text)? {
                Inbound::Notification { method, params } => {
                    hooks.on_notification(self, &method, &params).await?;
                }
                Inbound::Response { id, result } => {
                    let Some((method, request_params)) = self.pending.remove(&id) else {
                        log::warn!("response for unknown request id {id}");
                        continue;
                    };

                    if method == "public/auth" {
                        self.refresh_token = result
                            .get("refresh_token")
                            .and_then(Value::as_str)
                            .map(ToOwned::to_owned);
                        self.access_token = result
                            .get("access_token")
                            .and_then(Value::as_str)
                            .map(ToOwned::to_owned);
                    } else {
                        hooks.on_response(self, &method, &request_params, &result).await?;
                    }
                }
                Inbound::Error { id, error } => {
                    let Some((method, request_params)) = self.pending.remove(&id) else {
                        log::warn!("error response for unknown request id {id}");
                        continue;
                    };

                    if error.code == EXPIRED_ACCESS_TOKEN {
                        let refresh_token = self.refresh_token.clone().unwrap_or_default();
                        self.send(
                            "public/auth",
                            &params! {
                                "grant_type" => "refresh_token",
                                "refresh_token" => refresh_token,
                            },
                        )
                        .await?;
                    } else {
                        hooks.on_error(self, &method, &request_params, error.code, &error.message).await?;
                    }
                }
            }
        }

        Ok(())
    }

    /// Number of requests awaiting a reply. Exposed for tests.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
