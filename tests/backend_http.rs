//! Exercises the HTTP transport and session against a local stand-in backend.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use relay_chat::reply::{CANCELLED_TEXT, NETWORK_ERROR_TEXT};
use relay_chat::{ChatTransport, HttpTransport, RequestId, Session, SessionEvent, Status};

#[derive(Clone, Default)]
struct Recorded {
    requests: Arc<Mutex<Vec<(Option<String>, Value)>>>,
}

async fn chat(State(recorded): State<Recorded>, headers: HeaderMap, body: String) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let parsed: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
    recorded
        .requests
        .lock()
        .unwrap()
        .push((content_type, parsed.clone()));

    match parsed["prompt"].as_str().unwrap_or_default() {
        "hi" => Json(json!({"output": [{"generated_text": "hello back"}]})).into_response(),
        "text" => Json(json!({"output": [{"text": "plain text"}]})).into_response(),
        "boom" => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "overloaded"}))).into_response(),
        "bare" => StatusCode::BAD_GATEWAY.into_response(),
        "garbage" => (StatusCode::OK, "<html>not json</html>").into_response(),
        "slow" => {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Json(json!("too late")).into_response()
        }
        other => Json(json!({ "echo": other })).into_response(),
    }
}

async fn spawn_backend() -> (String, Recorded) {
    let recorded = Recorded::default();
    let app = Router::new()
        .route("/ping", get(|| async { "pong" }))
        .route("/chat", post(chat))
        .with_state(recorded.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), recorded)
}

async fn unused_address() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

fn transport(url: &str) -> HttpTransport {
    HttpTransport::new(url, Duration::from_secs(5)).unwrap()
}

/// Apply events until `id` settles and return the text appended for it.
async fn reply_for(
    session: &mut Session<HttpTransport>,
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    id: RequestId,
) -> String {
    loop {
        let event = events.recv().await.expect("session channel closed");
        let ours = matches!(&event, SessionEvent::Settled { id: settled, .. } if *settled == id);
        let appended = session.apply(event).map(|m| m.text.clone());
        if ours {
            return appended.expect("settlement appends a message");
        }
    }
}

#[tokio::test]
async fn test_chat_wire_format() {
    let (url, recorded) = spawn_backend().await;
    let response = transport(&url).chat("hi").await.unwrap();

    assert_eq!(response.status, 200);
    let requests = recorded.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0.as_deref(), Some("application/json"));
    assert_eq!(requests[0].1, json!({"prompt": "hi"}));
}

#[tokio::test]
async fn test_ping_success_and_unreachable() {
    let (url, _) = spawn_backend().await;
    assert!(transport(&url).ping().await.is_ok());

    let err = transport(&unused_address().await).ping().await.unwrap_err();
    assert!(err.is_unreachable());
}

#[tokio::test]
async fn test_session_reconciles_backend_shapes() {
    let (url, _) = spawn_backend().await;
    let (mut session, mut events) = Session::new(transport(&url));

    let cases = [
        ("hi", "hello back".to_string()),
        ("text", "plain text".to_string()),
        ("boom", "⚠️ Error: overloaded".to_string()),
        ("bare", "⚠️ Error: Bad Gateway".to_string()),
        ("garbage", NETWORK_ERROR_TEXT.to_string()),
        ("other", r#"{"echo":"other"}"#.to_string()),
    ];

    for (prompt, expected) in cases {
        let id = session.submit(prompt).unwrap();
        assert_eq!(reply_for(&mut session, &mut events, id).await, expected, "prompt {prompt}");
        assert!(!session.is_busy());
    }
}

#[tokio::test]
async fn test_session_supersedes_slow_request() {
    let (url, _) = spawn_backend().await;
    let (mut session, mut events) = Session::new(transport(&url));

    let slow = session.submit("slow").unwrap();
    let fast = session.submit("hi").unwrap();
    assert_eq!(session.live_request(), Some(fast));

    assert_eq!(reply_for(&mut session, &mut events, slow).await, CANCELLED_TEXT);
    assert_eq!(reply_for(&mut session, &mut events, fast).await, "hello back");
    assert!(!session.is_busy());
    assert!(session.live_request().is_none());
}

#[tokio::test]
async fn test_timeout_reported_as_network_error() {
    let (url, _) = spawn_backend().await;
    let quick = HttpTransport::new(&url, Duration::from_millis(200)).unwrap();
    let (mut session, mut events) = Session::new(quick);

    let id = session.submit("slow").unwrap();
    assert_eq!(reply_for(&mut session, &mut events, id).await, NETWORK_ERROR_TEXT);
    assert!(!session.is_busy());
}

#[tokio::test]
async fn test_probe_against_missing_backend_leaves_idle() {
    let url = unused_address().await;
    let (mut session, mut events) = Session::new(transport(&url));
    assert_eq!(session.status(), Status::Warming);

    let event = events.recv().await.unwrap();
    assert!(session.apply(event).is_none());
    assert_eq!(session.status(), Status::Idle);
    assert!(session.messages().is_empty());
}
