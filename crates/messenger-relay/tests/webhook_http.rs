use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use http::{Method, Request, StatusCode};
use messenger_relay::server;
use messenger_relay_core::{
    DEFAULT_REPLY_PREFIX, MockResponse, RecordingSender, RelayConfig, SendEndpoint, WebhookRelay,
    sign_payload,
};
use serde_json::{Value, json};
use tower::ServiceExt;

const SECRET: &str = "app-secret";
const VERIFY_TOKEN: &str = "verify-me";

fn relay_app(sender: RecordingSender) -> Router {
    let config = RelayConfig::new(
        SendEndpoint::new("https://graph.example.test/v2.6", "page-token"),
        VERIFY_TOKEN,
        SECRET.as_bytes().to_vec(),
    );
    server::router(
        WebhookRelay::new(Arc::new(config), Arc::new(sender)),
        "/",
    )
}

fn recording() -> RecordingSender {
    RecordingSender::new(SendEndpoint::new(
        "https://graph.example.test/v2.6",
        "page-token",
    ))
}

const HI_BODY: &str = r#"{"object":"page","entry":[{"id":"1","time":0,"messaging":[{"sender":{"id":"U1"},"recipient":{"id":"P1"},"timestamp":0,"message":{"mid":"m1","text":"hi"}}]}]}"#;

fn signed_post(body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/")
        .header("content-type", "application/json")
        .header(
            "X-Hub-Signature",
            sign_payload(body.as_bytes(), SECRET.as_bytes()),
        )
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn signed_text_message_is_answered() {
    let sender = recording();
    let app = relay_app(sender.clone());

    let response = app.oneshot(signed_post(HI_BODY)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "");

    let calls = sender.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].url,
        "https://graph.example.test/v2.6/me/messages?access_token=page-token"
    );
    let sent = serde_json::to_value(&calls[0].payload).unwrap();
    assert_eq!(
        sent,
        json!({
            "recipient": {"id": "U1"},
            "message": {"text": format!("{DEFAULT_REPLY_PREFIX}hi")}
        })
    );
}

#[tokio::test]
async fn missing_signature_is_forbidden() {
    let sender = recording();
    let app = relay_app(sender.clone());
    let request = Request::builder()
        .method(Method::POST)
        .uri("/")
        .header("content-type", "application/json")
        .body(Body::from(HI_BODY))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(sender.calls().is_empty());
}

#[tokio::test]
async fn tampered_body_is_forbidden() {
    let sender = recording();
    let app = relay_app(sender.clone());
    let signature = sign_payload(HI_BODY.as_bytes(), SECRET.as_bytes());
    let tampered = HI_BODY.replace("\"hi\"", "\"ho\"");
    let request = Request::builder()
        .method(Method::POST)
        .uri("/")
        .header("X-Hub-Signature", signature)
        .body(Body::from(tampered))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(sender.calls().is_empty());
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let sender = recording();
    let app = relay_app(sender.clone());

    let response = app.oneshot(signed_post("{\"object\":")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(sender.calls().is_empty());
}

#[tokio::test]
async fn send_failures_are_still_acknowledged() {
    let sender = recording();
    sender.queue_response(MockResponse::status(
        400,
        r#"{"error":{"message":"(#100) No matching user found"}}"#,
    ));
    let app = relay_app(sender.clone());
    let body = json!({
        "object": "page",
        "entry": [{
            "id": "1",
            "time": 0,
            "messaging": [
                {"sender": {"id": "U1"}, "recipient": {"id": "P1"}, "message": {"text": "one"}},
                {"sender": {"id": "U2"}, "recipient": {"id": "P1"}, "message": {"text": "two"}}
            ]
        }]
    })
    .to_string();

    let response = app.oneshot(signed_post(&body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let recipients: Vec<_> = sender
        .calls()
        .into_iter()
        .map(|call| call.payload.recipient.id)
        .collect();
    assert_eq!(recipients, vec!["U1", "U2"]);
}

#[tokio::test]
async fn echo_and_unsupported_attachments_send_nothing() {
    let sender = recording();
    let app = relay_app(sender.clone());
    let body = json!({
        "object": "page",
        "entry": [{
            "messaging": [
                {"sender": {"id": "P1"}, "recipient": {"id": "U1"}, "message": {"text": "sent by page", "is_echo": true}},
                {"sender": {"id": "U1"}, "recipient": {"id": "P1"}, "message": {"attachments": [{"type": "sticker", "payload": {"url": "https://cdn.test/s.png"}}]}}
            ]
        }]
    })
    .to_string();

    let response = app.oneshot(signed_post(&body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(sender.calls().is_empty());
}

#[tokio::test]
async fn subscription_handshake_returns_challenge() {
    let app = relay_app(recording());
    let request = Request::builder()
        .method(Method::GET)
        .uri("/?hub.mode=subscribe&hub.verify_token=verify-me&hub.challenge=xyz")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "xyz");
}

#[tokio::test]
async fn subscription_handshake_rejects_wrong_token() {
    let app = relay_app(recording());
    let request = Request::builder()
        .method(Method::GET)
        .uri("/?hub.verify_token=guess&hub.challenge=xyz")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn other_methods_are_not_allowed() {
    let app = relay_app(recording());
    for method in [Method::PUT, Method::DELETE, Method::PATCH, Method::HEAD] {
        let request = Request::builder()
            .method(method.clone())
            .uri("/?hub.verify_token=verify-me&hub.challenge=xyz")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(
            response.status(),
            StatusCode::METHOD_NOT_ALLOWED,
            "{method} should be rejected"
        );
    }
}

#[tokio::test]
async fn untyped_attachment_does_not_drop_sibling_events() {
    let sender = recording();
    let app = relay_app(sender.clone());
    let body = json!({
        "object": "page",
        "entry": [{
            "messaging": [
                {"sender": {"id": "U1"}, "message": {"text": "hi"}},
                {"sender": {"id": "U2"}, "message": {"attachments": [{"payload": {"url": "https://x"}}]}}
            ]
        }]
    })
    .to_string();

    let response = app.oneshot(signed_post(&body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let calls = sender.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].payload.recipient.id, "U1");
}

#[tokio::test]
async fn null_message_does_not_drop_sibling_events() {
    let sender = recording();
    let app = relay_app(sender.clone());
    let body = json!({
        "object": "page",
        "entry": [{
            "messaging": [
                {"sender": {"id": "U1"}, "message": {"text": "hi"}},
                {"sender": {"id": "U2"}, "message": null}
            ]
        }]
    })
    .to_string();

    let response = app.oneshot(signed_post(&body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let calls = sender.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].payload.recipient.id, "U1");
}

#[tokio::test]
async fn media_attachments_are_forwarded() {
    let sender = recording();
    let app = relay_app(sender.clone());
    let body = json!({
        "object": "page",
        "entry": [{
            "messaging": [{
                "sender": {"id": "U1"},
                "recipient": {"id": "P1"},
                "message": {
                    "mid": "m2",
                    "attachments": [
                        {"type": "image", "payload": {"url": "https://cdn.test/cat.png"}},
                        {"type": "audio", "payload": {"url": "https://cdn.test/a.mp3"}}
                    ]
                }
            }]
        }]
    })
    .to_string();

    let response = app.oneshot(signed_post(&body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let sent: Vec<Value> = sender
        .calls()
        .iter()
        .map(|call| serde_json::to_value(&call.payload).unwrap())
        .collect();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0]["message"]["attachment"]["type"], "image");
    assert_eq!(
        sent[0]["message"]["attachment"]["payload"]["url"],
        "https://i.gifer.com/Ifph.gif"
    );
    assert_eq!(sent[1]["message"]["attachment"]["type"], "audio");
    assert_eq!(
        sent[1]["message"]["attachment"]["payload"]["url"],
        "https://cdn.test/a.mp3"
    );
}
