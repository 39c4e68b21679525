mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use bulk_sender::api::{router, AppState};
use common::{settle, test_config, MockConnector};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "----bulk-sender-test";

fn app(connector: &Arc<MockConnector>) -> Router {
    router(AppState::new(Arc::new(test_config()), connector.clone()))
}

fn multipart(fields: &[(&str, &str)]) -> Body {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!("--{}\r\n", BOUNDARY));
        if *name == "recipients" {
            body.push_str(
                "Content-Disposition: form-data; name=\"recipients\"; filename=\"numbers.txt\"\r\n\
                 Content-Type: text/plain\r\n\r\n",
            );
        } else {
            body.push_str(&format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name));
        }
        body.push_str(value);
        body.push_str("\r\n");
    }
    body.push_str(&format!("--{}--\r\n", BOUNDARY));
    Body::from(body)
}

fn dispatch_request(user: &str, fields: &[(&str, &str)]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/api/sessions/{}/dispatch", user))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(multipart(fields))
        .unwrap()
}

fn request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

async fn ready_session(app: &Router, user: &str) {
    let response = app
        .clone()
        .oneshot(request("POST", &format!("/api/sessions/{}/init", user)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    settle().await;
}

#[tokio::test]
async fn test_health_endpoint() {
    let connector = Arc::new(MockConnector::auto_ready());
    let response = app(&connector).oneshot(request("GET", "/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["activeSessions"], 0);
    assert_eq!(json["activeRuns"], 0);
    assert!(json["memory"]["totalBytes"].is_u64());
}

#[tokio::test]
async fn test_session_lifecycle() {
    let connector = Arc::new(MockConnector::auto_ready());
    let app = app(&connector);

    ready_session(&app, "alice").await;

    let response = app.clone().oneshot(request("GET", "/api/sessions/alice")).await.unwrap();
    let json = body_json(response).await;
    assert_eq!(json["state"], "ready");
    assert_eq!(json["healthy"], true);

    let response = app
        .clone()
        .oneshot(request("POST", "/api/sessions/alice/init"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ready");

    let response = app.clone().oneshot(request("GET", "/api/sessions/alice/qr")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.clone().oneshot(request("DELETE", "/api/sessions/alice")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let response = app.clone().oneshot(request("DELETE", "/api/sessions/alice")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_pairing_code_exposed_while_awaiting() {
    let connector = Arc::new(MockConnector::manual());
    let app = app(&connector);

    ready_session(&app, "alice").await;
    connector
        .events(0)
        .send(bulk_sender::transport::TransportEvent::PairingCode("2@xyz".into()))
        .await
        .unwrap();
    settle().await;

    let response = app.clone().oneshot(request("GET", "/api/sessions/alice/qr")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["pairingCode"], "2@xyz");
}

#[tokio::test]
async fn test_dispatch_streams_ndjson() {
    let connector = Arc::new(MockConnector::auto_ready());
    let app = app(&connector);
    ready_session(&app, "alice").await;

    let response = app
        .clone()
        .oneshot(dispatch_request(
            "alice",
            &[
                ("message", "Olá!"),
                ("recipients", "11999999999\n\n 11888888888 \n11777777777\n"),
                ("exclusions", "(11) 99999-9999"),
                ("batchSize", "1"),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/x-ndjson"
    );
    assert!(response.headers().contains_key("x-run-id"));

    let text = body_text(response).await;
    let events: Vec<Value> = text
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(events[0]["type"], "progress");
    assert_eq!(events[0]["total"], 2);
    assert_eq!(events[0]["processed"], 0);

    let last = events.last().unwrap();
    assert_eq!(last["type"], "complete");
    assert_eq!(last["status"], "completed");
    assert_eq!(last["summary"]["total"], 2);
    assert_eq!(last["summary"]["sent"], 2);
    assert_eq!(last["summary"]["successRate"], 100.0);
    assert_eq!(last["results"][0]["number"], "11888888888");
    assert_eq!(last["results"][1]["number"], "11777777777");
    assert_eq!(last["results"][0]["status"], "sent");

    assert_eq!(
        connector.transport(0).sent(),
        ["11888888888@c.us", "11777777777@c.us"]
    );
}

#[tokio::test]
async fn test_dispatch_everything_excluded_completes_with_zero() {
    let connector = Arc::new(MockConnector::auto_ready());
    let app = app(&connector);
    ready_session(&app, "alice").await;

    let response = app
        .clone()
        .oneshot(dispatch_request(
            "alice",
            &[
                ("message", "hi"),
                ("recipients", "11999999999"),
                ("exclusions", "11999999999"),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let text = body_text(response).await;
    let last: Value = serde_json::from_str(text.lines().last().unwrap()).unwrap();
    assert_eq!(last["type"], "complete");
    assert_eq!(last["summary"]["total"], 0);
    assert_eq!(last["summary"]["successRate"], 0.0);
}

#[tokio::test]
async fn test_dispatch_validation_errors() {
    let connector = Arc::new(MockConnector::auto_ready());
    let app = app(&connector);
    ready_session(&app, "alice").await;

    let cases: [(&[(&str, &str)], &str); 4] = [
        (&[("message", " "), ("recipients", "1")], "missing_message"),
        (&[("message", "hi")], "missing_recipients"),
        (&[("message", "hi"), ("recipients", "\n \n")], "empty_recipients"),
        (
            &[("message", "hi"), ("recipients", "1"), ("batchSize", "ten")],
            "invalid_field",
        ),
    ];
    for (fields, code) in cases {
        let response = app.clone().oneshot(dispatch_request("alice", fields)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", code);
        assert_eq!(body_json(response).await["code"], code);
    }
    assert_eq!(connector.transport(0).calls(), 0);
}

#[tokio::test]
async fn test_dispatch_requires_ready_session() {
    let connector = Arc::new(MockConnector::manual());
    let app = app(&connector);

    let response = app
        .clone()
        .oneshot(dispatch_request("bob", &[("message", "hi"), ("recipients", "1")]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    ready_session(&app, "bob").await;
    let response = app
        .clone()
        .oneshot(dispatch_request("bob", &[("message", "hi"), ("recipients", "1")]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "session_not_ready");
}

#[tokio::test]
async fn test_unknown_run_is_not_found() {
    let connector = Arc::new(MockConnector::auto_ready());
    let app = app(&connector);

    let response = app.clone().oneshot(request("GET", "/api/runs/nope-1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(request("POST", "/api/runs/nope-1/cancel"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
