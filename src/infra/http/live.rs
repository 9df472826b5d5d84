//! Live-preview surfaces: the per-route SSE stream and the change ingress.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use serde::Serialize;
use tracing::{debug, info};
use url::form_urlencoded;

use crate::application::{
    content::PreviewSession,
    error::HttpError,
    lifecycle::{PageController, live_states},
    resolve::Route,
    stream::page_patch_response,
};

use super::public::{HttpState, PreviewQuery};

const LIVE_PREFIX: &str = "/_live";

/// SSE endpoint a page rendered for `lookup` connects to, carrying the
/// editor session the page was rendered for.
pub fn endpoint_for(lookup: &str, preview: Option<&PreviewSession>) -> String {
    let mut endpoint = if lookup == "/" {
        LIVE_PREFIX.to_string()
    } else {
        format!("{LIVE_PREFIX}{lookup}")
    };
    if let Some(session) = preview {
        endpoint.push_str("?live_preview=");
        endpoint.extend(form_urlencoded::byte_serialize(session.hash().as_bytes()));
    }
    endpoint
}

pub(super) async fn live_root(
    State(state): State<HttpState>,
    Query(query): Query<PreviewQuery>,
) -> Response {
    let preview = state.preview_session(query);
    live_stream(state, "/", preview)
}

pub(super) async fn live_path(
    State(state): State<HttpState>,
    Path(path): Path<String>,
    Query(query): Query<PreviewQuery>,
) -> Response {
    let preview = state.preview_session(query);
    live_stream(state, &path, preview)
}

/// Mount `request_path` for the lifetime of the SSE connection.
fn live_stream(state: HttpState, request_path: &str, preview: Option<PreviewSession>) -> Response {
    let Some(channel) = state.live_preview.clone() else {
        return live_preview_disabled("infra::http::live::live_stream");
    };

    let (lookup, kind) = match Route::for_request_path(request_path) {
        Route::Page { lookup, kind } => (lookup, kind),
        Route::Blog => {
            return HttpError::new(
                "infra::http::live::live_stream",
                StatusCode::NOT_FOUND,
                "Route has no live view",
                format!("`{request_path}` does not support live preview"),
            )
            .into_response();
        }
    };

    info!(
        target = "pagewright::http::live",
        path = %lookup,
        subscribers = channel.subscriber_count() + 1,
        preview = preview.is_some(),
        "live preview session opened"
    );

    let controller = PageController::new(Arc::clone(&state.content), lookup).with_preview(preview);
    let subscription = channel.subscribe();
    let renderer = state.renderer.clone();
    let variant = state.variant(kind);

    let bodies = live_states(controller, subscription)
        .map(move |fetch_state| renderer.render_state(&fetch_state, &variant));
    page_patch_response(bodies)
}

#[derive(Debug, Serialize)]
struct NotifyReceipt {
    delivered: usize,
}

/// Entry-changed ingress. Carries no state: any body is ignored, and
/// subscribers refetch with the session they were opened for.
pub(super) async fn notify(State(state): State<HttpState>) -> Response {
    let Some(channel) = state.live_preview.as_ref() else {
        return live_preview_disabled("infra::http::live::notify");
    };

    let delivered = channel.notify_entry_change();
    debug!(
        target = "pagewright::http::live",
        delivered, "entry change accepted"
    );
    (StatusCode::ACCEPTED, Json(NotifyReceipt { delivered })).into_response()
}

fn live_preview_disabled(source: &'static str) -> Response {
    HttpError::new(
        source,
        StatusCode::NOT_FOUND,
        "Live preview is disabled",
        "live preview is not enabled for this deployment",
    )
    .into_response()
}
