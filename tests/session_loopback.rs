//! Exercises `Session`/`StrategyHooks` end-to-end against a local WebSocket listener standing in
//! for the venue, so the dispatch, auth-refresh, and subscribe paths are covered without a live
//! network dependency.

use deribit_mm::error::Error;
use deribit_mm::session::{Session, StrategyHooks};
use deribit_mm::uri;
use deribit_mm::params;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

#[derive(Default)]
struct Recorder {
    notifications: Vec<(String, Value)>,
    responses: Vec<(String, Value)>,
    errors: Vec<(String, i64)>,
}

impl StrategyHooks for Recorder {
    async fn on_notification(
        &mut self,
        _session: &mut Session,
        method: &str,
        params: &Value,
    ) -> Result<(), Error> {
        self.notifications.push((method.to_owned(), params.clone()));
        Ok(())
    }

    async fn on_response(
        &mut self,
        _session: &mut Session,
        method: &str,
        _request_params: &Value,
        result: &Value,
    ) -> Result<(), Error> {
        self.responses.push((method.to_owned(), result.clone()));
        Ok(())
    }

    async fn on_error(
        &mut self,
        _session: &mut Session,
        method: &str,
        _request_params: &Value,
        code: i64,
        _message: &str,
    ) -> Result<(), Error> {
        self.errors.push((method.to_owned(), code));
        Ok(())
    }
}

async fn loopback_uri(listener: &TcpListener) -> uri::Uri {
    let addr = listener.local_addr().unwrap();
    uri::parse(&format!("ws://{addr}/ws")).unwrap()
}

#[tokio::test]
async fn subscribe_request_roundtrips_and_notification_dispatches() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let uri = loopback_uri(&listener).await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        let text = ws.next().await.unwrap().unwrap().into_text().unwrap();
        let request: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(request["method"], "public/subscribe");
        let id = request["id"].as_str().unwrap().to_owned();

        ws.send(Message::Text(
            json!({"jsonrpc": "2.0", "id": id, "result": ["book.BTC-PERPETUAL.raw"]}).to_string(),
        ))
        .await
        .unwrap();

        ws.send(Message::Text(
            json!({"method": "heartbeat", "params": {"type": "heartbeat"}}).to_string(),
        ))
        .await
        .unwrap();

        ws.close(None).await.ok();
    });

    let mut session = Session::connect(&uri, "", "").await.unwrap();
    session
        .subscribe(vec!["book.BTC-PERPETUAL.raw".to_owned()])
        .await
        .unwrap();

    let mut recorder = Recorder::default();
    session.run(&mut recorder).await.unwrap();
    server.await.unwrap();

    assert_eq!(recorder.responses.len(), 1);
    assert_eq!(recorder.responses[0].0, "public/subscribe");
    assert_eq!(recorder.notifications.len(), 1);
    assert_eq!(recorder.notifications[0].0, "heartbeat");
}

#[tokio::test]
async fn expired_access_token_triggers_silent_refresh() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let uri = loopback_uri(&listener).await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        // construction-time client_credentials auth
        let text = ws.next().await.unwrap().unwrap().into_text().unwrap();
        let auth_request: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(auth_request["method"], "public/auth");
        assert_eq!(auth_request["params"]["grant_type"], "client_credentials");
        let id = auth_request["id"].as_str().unwrap().to_owned();

        ws.send(Message::Text(
            json!({"jsonrpc": "2.0", "id": id, "result": {"access_token": "tok-1", "refresh_token": "refresh-1"}})
                .to_string(),
        ))
        .await
        .unwrap();

        // a request that the venue rejects as expired
        let text = ws.next().await.unwrap().unwrap().into_text().unwrap();
        let position_request: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(position_request["method"], "private/get_position");
        let id = position_request["id"].as_str().unwrap().to_owned();

        ws.send(Message::Text(
            json!({"jsonrpc": "2.0", "id": id, "error": {"code": 13009, "message": "expired access token"}})
                .to_string(),
        ))
        .await
        .unwrap();

        // the session should silently re-authenticate with the refresh token
        let text = ws.next().await.unwrap().unwrap().into_text().unwrap();
        let refresh_request: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(refresh_request["method"], "public/auth");
        assert_eq!(refresh_request["params"]["grant_type"], "refresh_token");
        assert_eq!(refresh_request["params"]["refresh_token"], "refresh-1");
        let id = refresh_request["id"].as_str().unwrap().to_owned();

        ws.send(Message::Text(
            json!({"jsonrpc": "2.0", "id": id, "result": {"access_token": "tok-2", "refresh_token": "refresh-2"}})
                .to_string(),
        ))
        .await
        .unwrap();

        ws.close(None).await.ok();
    });

    let mut session = Session::connect(&uri, "client", "secret").await.unwrap();
    session
        .send("private/get_position", &params! { "instrument_name" => "BTC-PERPETUAL" })
        .await
        .unwrap();

    let mut recorder = Recorder::default();
    session.run(&mut recorder).await.unwrap();
    server.await.unwrap();

    assert!(recorder.errors.is_empty(), "refresh-triggering error must not reach the hook target");
    assert_eq!(session.access_token(), Some("tok-2"));
}

#[tokio::test]
async fn order_closure_error_dispatches_to_hook() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let uri = loopback_uri(&listener).await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        let text = ws.next().await.unwrap().unwrap().into_text().unwrap();
        let request: Value = serde_json::from_str(&text).unwrap();
        let id = request["id"].as_str().unwrap().to_owned();

        ws.send(Message::Text(
            json!({"jsonrpc": "2.0", "id": id, "error": {"code": 11044, "message": "not_open_order"}}).to_string(),
        ))
        .await
        .unwrap();

        ws.close(None).await.ok();
    });

    let mut session = Session::connect(&uri, "", "").await.unwrap();
    session
        .send("private/edit", &params! { "order_id" => "ord-1", "price" => 100.0 })
        .await
        .unwrap();

    let mut recorder = Recorder::default();
    session.run(&mut recorder).await.unwrap();
    server.await.unwrap();

    assert_eq!(recorder.errors, vec![("private/edit".to_owned(), 11044)]);
}
