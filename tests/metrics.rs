// tests/metrics.rs
//
// The Prometheus recorder is process-global, so this file holds a single test.

use shuttle_axum::axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use tower::ServiceExt as _;

use nirvana_intake::api::{create_router, AppState};
use nirvana_intake::config::Replies;
use nirvana_intake::conversation::Intake;
use nirvana_intake::metrics::Metrics;
use nirvana_intake::store::MemoryStore;
use nirvana_intake::submit::Submitter;
use nirvana_intake::whatsapp::LogMessenger;
use std::sync::Arc;

#[tokio::test]
async fn metrics_endpoint_exposes_webhook_counters() {
    let metrics = Metrics::init().expect("install recorder");
    let intake = Intake::new(
        Arc::new(LogMessenger),
        Submitter::new(Arc::new(MemoryStore::new()), None),
        Replies::default(),
    );
    let app: Router = create_router(AppState::new(intake, "t"), false).merge(metrics.router());

    let resp = app
        .clone()
        .oneshot(Request::post("/").body(Body::from("garbage")).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    // axum::body::to_bytes requires an explicit limit
    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap(); // 1 MiB
    let text = String::from_utf8(body.to_vec()).unwrap();

    for needle in ["webhook_events_total", "webhook_payload_errors_total"] {
        assert!(text.contains(needle), "missing {needle} in:\n{text}");
    }
}
