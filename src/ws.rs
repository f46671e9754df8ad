//! TLS WebSocket transport: text frames in, text frames out, nothing else.

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::Error;
use crate::uri::Uri;

type Stream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// A single bidirectional, text-frame-only WebSocket channel.
///
/// Owns the handshake-to-close lifetime of one connection: [`WsChannel::connect`] performs the
/// DNS/TCP/TLS/WS handshake (delegated to `tokio_tungstenite::connect_async`, which also applies
/// the library's default `User-Agent` decorator), and [`WsChannel::close`] must be called on every
/// exit path, since closing is an `async fn` and a `Drop` impl cannot await it.
pub struct WsChannel {
    stream: Stream,
    open: bool,
}

impl std::fmt::Debug for WsChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsChannel").field("open", &self.open).finish()
    }
}

impl WsChannel {
    /// Connects to `uri`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if DNS resolution, the TCP connect, the TLS handshake, or the
    /// WebSocket upgrade fails.
    pub async fn connect(uri: &Uri) -> Result<Self, Error> {
        let url = format!(
            "{}://{}{}{}",
            uri.protocol,
            uri.authority(),
            uri.resource,
            if uri.query.is_empty() {
                String::new()
            } else {
                format!("?{}", uri.query)
            }
        );

        let (stream, _response) = tokio_tungstenite::connect_async(url).await?;
        log::info!("WebSocket handshake with {} completed", uri.domain);

        Ok(Self { stream, open: true })
    }

    /// Sends one text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the underlying socket write fails.
    pub async fn send(&mut self, text: String) -> Result<(), Error> {
        self.stream.send(Message::Text(text)).await?;
        Ok(())
    }

    /// Blocks until the next text frame arrives.
    ///
    /// Ping frames are answered transparently and do not produce a return value; the caller only
    /// ever observes application text frames.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] on a socket error, or if the stream ends (`recv` returning
    /// `Ok(None)`'s C++ analogue — here surfaced as `ConnectionClosed`).
    pub async fn recv(&mut self) -> Result<String, Error> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text),
                Some(Ok(Message::Ping(payload))) => {
                    self.stream.send(Message::Pong(payload)).await?;
                }
                Some(Ok(Message::Close(_))) | None => {
                    self.open = false;
                    return Err(Error::Transport(tungstenite::Error::ConnectionClosed));
                }
                Some(Ok(_)) => continue,
                Some(Err(err)) => {
                    self.open = false;
                    return Err(err.into());
                }
            }
        }
    }

    /// `true` until a close frame has been seen or sent.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Sends a normal WebSocket close frame. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the close frame could not be written (the socket may
    /// already be half-closed by the peer, which is not itself an error here).
    pub async fn close(&mut self) -> Result<(), Error> {
        if !self.open {
            return Ok(());
        }

        self.open = false;
        self.stream
            .send(Message::Close(Some(CloseFrame {
                code: tungstenite::protocol::frame::coding::CloseCode::Normal,
                reason: "".into(),
            })))
            .await?;

        Ok(())
    }
}
