mod support;

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use metrics_util::debugging::DebuggingRecorder;
use pagewright::{
    application::{content::ContentClient, sanitize::AmmoniaSanitizer},
    infra::{
        contentstack::ContentstackClient,
        http::{HttpState, build_router},
    },
};
use serde_json::json;

use support::{FakeCms, get, live_channel, live_preview_settings, send, site};

#[tokio::test]
async fn request_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let cms = FakeCms::spawn(vec![json!({ "uid": "blt-home", "url": "/", "title": "Home" })]).await;
    let channel = live_channel();
    let client: Arc<dyn ContentClient> = Arc::new(
        ContentstackClient::new(&cms.content_settings(), &live_preview_settings(true, "localhost"))
            .expect("client"),
    );
    let app = build_router(HttpState::new(
        client,
        Arc::new(AmmoniaSanitizer::new()),
        Some(channel.clone()),
        site("development"),
    ));

    let response = get(&app, "/").await;
    assert_eq!(response.status(), StatusCode::OK);

    let stream = get(&app, "/_live").await;
    let notify = Request::builder()
        .method(Method::POST)
        .uri("/_notify")
        .body(Body::empty())
        .expect("request");
    assert_eq!(send(&app, notify).await.status(), StatusCode::ACCEPTED);
    drop(stream);

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "pagewright_content_fetch_total",
        "pagewright_content_request_ms",
        "pagewright_live_preview_notifications_total",
        "pagewright_live_preview_subscribers",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
