use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;
use tokio::net::TcpListener;

use pulse_core::client::http::{HttpSink, API_KEY_HEADER};
use pulse_core::client::{CaptureRequest, PulseClient};
use pulse_core::common::error::PulseError;
use pulse_core::common::events::TelemetryEvent;
use pulse_core::config::{DispatchSettings, PulseSettings};
use pulse_core::queue::{EventQueue, EventSink};
use pulse_core::storage::PulseStore;

#[derive(Clone, Default)]
struct Ingested {
    bodies: Arc<Mutex<Vec<Value>>>,
    api_keys: Arc<Mutex<Vec<String>>>,
}

async fn ingest(
    State(state): State<Ingested>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    let key = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    state.api_keys.lock().expect("lock").push(key);
    state.bodies.lock().expect("lock").push(body);
    StatusCode::OK
}

async fn spawn_ingest_server() -> (String, Ingested) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let state = Ingested::default();
    let app = Router::new()
        .route("/ingest", post(ingest))
        .route(
            "/broken",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "ingest down") }),
        )
        .route(
            "/slow",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                StatusCode::OK
            }),
        )
        .with_state(state.clone());

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });

    (format!("http://{}", addr), state)
}

fn event(name: &str) -> TelemetryEvent {
    TelemetryEvent {
        event_name: name.to_string(),
        captured_at: "2026-01-01T00:00:00".to_string(),
        app: Some("frappe".to_string()),
        user: None,
        site: Some("test.localhost".to_string()),
        properties: Default::default(),
    }
}

#[tokio::test]
async fn posts_events_with_api_key() {
    let (base_url, ingested) = spawn_ingest_server().await;
    let sink = HttpSink::new(
        &format!("{}/ingest", base_url),
        "secret-key",
        Duration::from_secs(5),
    )
    .expect("sink");

    sink.deliver(&[event("a"), event("b")]).await.expect("deliver");

    let bodies = ingested.bodies.lock().expect("lock").clone();
    assert_eq!(bodies.len(), 1);
    let events = bodies[0]["events"].as_array().expect("events array");
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["event_name"], "a");
    assert_eq!(events[1]["event_name"], "b");
    assert_eq!(
        ingested.api_keys.lock().expect("lock").as_slice(),
        ["secret-key".to_string()]
    );
}

#[tokio::test]
async fn non_success_status_is_delivery_error() {
    let (base_url, _ingested) = spawn_ingest_server().await;
    let sink = HttpSink::new(
        &format!("{}/broken", base_url),
        "secret-key",
        Duration::from_secs(5),
    )
    .expect("sink");

    let err = sink.deliver(&[event("a")]).await.expect_err("should fail");
    match err.downcast_ref::<PulseError>() {
        Some(PulseError::Delivery { status, body }) => {
            assert_eq!(*status, 500);
            assert_eq!(body, "ingest down");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn slow_endpoint_times_out() {
    let (base_url, _ingested) = spawn_ingest_server().await;
    let sink = HttpSink::new(
        &format!("{}/slow", base_url),
        "secret-key",
        Duration::from_millis(200),
    )
    .expect("sink");

    let err = sink.deliver(&[event("a")]).await.expect_err("should time out");
    assert!(matches!(
        err.downcast_ref::<PulseError>(),
        Some(PulseError::Transport(_))
    ));
}

#[test]
fn rejects_unparseable_url() {
    assert!(HttpSink::new("not a url", "key", Duration::from_secs(1)).is_err());
}

fn make_client(host: &str, endpoint: &str) -> (tempfile::TempDir, PulseClient) {
    let temp_dir = tempdir().expect("tempdir");
    let db_path = temp_dir.path().join("pulse.db");
    let store = PulseStore::new(db_path.to_string_lossy().as_ref(), 2).expect("store");
    let pulse = PulseSettings {
        enabled: true,
        managed: true,
        developer_mode: false,
        api_key: Some("secret-key".to_string()),
        host: Some(host.to_string()),
        ingest_endpoint: Some(endpoint.to_string()),
        site: "test.localhost".to_string(),
        enabled_cache_ttl_secs: 60,
        request_timeout_secs: 5,
    };
    let dispatch = DispatchSettings {
        interval_ms: 10,
        batch_size: 2,
        max_batches: 10,
        max_retries: 1,
        backoff_ms: 1,
    };
    let sink = HttpSink::from_settings(&pulse).expect("sink");
    let client = PulseClient::new(EventQueue::new(store, 100), pulse, dispatch, Arc::new(sink));
    (temp_dir, client)
}

#[tokio::test]
async fn client_delivers_queue_in_batches() {
    let (base_url, ingested) = spawn_ingest_server().await;
    let (_temp_dir, client) = make_client(&base_url, "/ingest");
    for i in 0..5 {
        client.capture(CaptureRequest::new(format!("event_{}", i)));
    }

    let report = client
        .send_queued_events()
        .await
        .expect("send")
        .expect("enabled");

    assert_eq!(report.delivered, 5);
    assert_eq!(report.batches, 3);
    assert_eq!(ingested.bodies.lock().expect("lock").len(), 3);
    assert_eq!(client.queue().length().expect("len"), 0);
}

#[tokio::test]
async fn client_requeues_when_endpoint_keeps_failing() {
    let (base_url, _ingested) = spawn_ingest_server().await;
    let (_temp_dir, client) = make_client(&base_url, "broken");
    for i in 0..5 {
        client.capture(CaptureRequest::new(format!("event_{}", i)));
    }

    let report = client
        .send_queued_events()
        .await
        .expect("send")
        .expect("enabled");

    assert_eq!(report.attempts, 2);
    assert_eq!(report.requeued, 2);
    assert_eq!(client.queue().length().expect("len"), 5);

    let next = client.queue().collect(1).expect("collect");
    assert_eq!(next[0].event_name, "event_0");
}
