//! In-memory content source and router wiring shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Json, Router,
    body::{Body, to_bytes},
    extract::{Path, Query, State},
    http::{HeaderMap, Request, Response, StatusCode},
    response::IntoResponse,
    routing::get as get_route,
};
use pagewright::{
    application::{
        content::{ContentClient, ContentError, PreviewSession},
        live_preview::{LivePreview, LivePreviewConfig},
        sanitize::AmmoniaSanitizer,
    },
    config::{ContentSettings, DeploymentMode, LivePreviewSettings, SiteSettings},
    domain::page::PageDocument,
    infra::http::{HttpState, build_router},
};
use serde_json::{Value, json};
use tower::ServiceExt;
use url::Url;

#[derive(Default)]
struct Entries {
    pages: Vec<PageDocument>,
    failing: HashSet<String>,
    listing_fails: bool,
    previews: Vec<Option<String>>,
}

/// Content source backed by a mutable list, in API order.
#[derive(Clone, Default)]
pub struct InMemoryContent {
    entries: Arc<Mutex<Entries>>,
}

impl InMemoryContent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, page: PageDocument) -> Self {
        self.put(page);
        self
    }

    /// Insert or replace the entry published at `page.url`.
    pub fn put(&self, page: PageDocument) {
        let mut entries = self.entries.lock().expect("entries lock");
        match entries.pages.iter_mut().find(|existing| existing.url == page.url) {
            Some(existing) => *existing = page,
            None => entries.pages.push(page),
        }
    }

    pub fn fail_path(&self, path: &str) {
        self.entries
            .lock()
            .expect("entries lock")
            .failing
            .insert(path.to_string());
    }

    pub fn fail_listing(&self) {
        self.entries.lock().expect("entries lock").listing_fails = true;
    }

    /// Preview session hash of every page fetch, in call order.
    pub fn previews(&self) -> Vec<Option<String>> {
        self.entries.lock().expect("entries lock").previews.clone()
    }
}

#[async_trait]
impl ContentClient for InMemoryContent {
    async fn get_page(
        &self,
        path: &str,
        preview: Option<&PreviewSession>,
    ) -> Result<Option<PageDocument>, ContentError> {
        let mut entries = self.entries.lock().expect("entries lock");
        entries
            .previews
            .push(preview.map(|session| session.hash().to_string()));
        if entries.failing.contains(path) {
            return Err(ContentError::Status {
                status: 503,
                path: path.to_string(),
            });
        }
        Ok(entries.pages.iter().find(|page| page.url == path).cloned())
    }

    async fn list_pages(&self) -> Result<Vec<PageDocument>, ContentError> {
        let entries = self.entries.lock().expect("entries lock");
        if entries.listing_fails {
            return Err(ContentError::transport("*", "connection reset"));
        }
        Ok(entries.pages.clone())
    }
}

pub fn site(mode: &str) -> SiteSettings {
    SiteSettings {
        title: "Pagewright".to_string(),
        footer_copy: None,
        deployment_mode: DeploymentMode::parse(mode),
    }
}

pub fn live_channel() -> LivePreview {
    LivePreview::new(&LivePreviewConfig {
        enabled: true,
        capacity: 16,
    })
}

pub fn router(content: &InMemoryContent, live: Option<LivePreview>) -> Router {
    router_with_site(content, live, site("development"))
}

pub fn router_with_site(
    content: &InMemoryContent,
    live: Option<LivePreview>,
    site: SiteSettings,
) -> Router {
    let state = HttpState::new(
        Arc::new(content.clone()),
        Arc::new(AmmoniaSanitizer::new()),
        live,
        site,
    );
    build_router(state)
}

pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router
        .clone()
        .oneshot(request)
        .await
        .expect("router is infallible")
}

pub async fn get(router: &Router, path: &str) -> Response<Body> {
    let request = Request::builder()
        .uri(path)
        .body(Body::empty())
        .expect("request");
    send(router, request).await
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

pub fn page(url: &str, title: &str) -> PageDocument {
    PageDocument {
        uid: Some(format!("uid-{}", url.trim_matches('/').replace('/', "-"))),
        title: Some(title.to_string()),
        ..PageDocument::new(url)
    }
}

/// One request observed by [`FakeCms`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub host: String,
    pub content_type: String,
    pub params: HashMap<String, String>,
    pub headers: HashMap<String, String>,
}

#[derive(Clone)]
struct FakeCmsState {
    entries: Arc<Mutex<Vec<Value>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    failure: Arc<Mutex<Option<StatusCode>>>,
}

/// Delivery API stand-in served on a loopback port.
pub struct FakeCms {
    pub base_url: Url,
    state: FakeCmsState,
}

impl FakeCms {
    pub async fn spawn(entries: Vec<Value>) -> Self {
        let state = FakeCmsState {
            entries: Arc::new(Mutex::new(entries)),
            requests: Arc::new(Mutex::new(Vec::new())),
            failure: Arc::new(Mutex::new(None)),
        };
        let app = Router::new()
            .route("/v3/content_types/{content_type}/entries", get_route(fake_entries))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake cms");
        let addr = listener.local_addr().expect("fake cms addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake cms serve");
        });

        Self {
            base_url: Url::parse(&format!("http://{addr}/")).expect("fake cms url"),
            state,
        }
    }

    pub fn replace_entries(&self, entries: Vec<Value>) {
        *self.state.entries.lock().expect("entries lock") = entries;
    }

    /// Answer every following request with `status`.
    pub fn fail_with(&self, status: u16) {
        *self.state.failure.lock().expect("failure lock") =
            Some(StatusCode::from_u16(status).expect("status code"));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().expect("requests lock").clone()
    }

    pub fn content_settings(&self) -> ContentSettings {
        ContentSettings {
            base_url: self.base_url.clone(),
            api_key: Some("blt-api-key".to_string()),
            delivery_token: Some("cs-delivery".to_string()),
            environment: "preview".to_string(),
            content_type: "page".to_string(),
            locale: "en-us".to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

async fn fake_entries(
    State(state): State<FakeCmsState>,
    Path(content_type): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> axum::response::Response {
    let recorded_headers = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect::<HashMap<_, _>>();
    let host = recorded_headers.get("host").cloned().unwrap_or_default();

    let lookup = params
        .get("query")
        .and_then(|query| serde_json::from_str::<Value>(query).ok())
        .and_then(|query| query.get("url").and_then(Value::as_str).map(str::to_string));

    state
        .requests
        .lock()
        .expect("requests lock")
        .push(RecordedRequest {
            host,
            content_type,
            params,
            headers: recorded_headers,
        });

    if let Some(status) = *state.failure.lock().expect("failure lock") {
        return status.into_response();
    }

    let entries = state.entries.lock().expect("entries lock").clone();
    let matching: Vec<Value> = entries
        .into_iter()
        .filter(|entry| match lookup.as_deref() {
            Some(url) => entry.get("url").and_then(Value::as_str) == Some(url),
            None => true,
        })
        .collect();
    Json(json!({ "entries": matching })).into_response()
}

pub fn live_preview_settings(enabled: bool, preview_host: &str) -> LivePreviewSettings {
    LivePreviewSettings {
        enabled,
        preview_token: Some("cs-preview".to_string()),
        preview_host: preview_host.to_string(),
        editable_tags: enabled,
        capacity: NonZeroU32::new(16).expect("non-zero"),
    }
}
