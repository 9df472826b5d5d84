use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tracing::error;

use crate::{
    application::{
        content::{ContentClient, PreviewSession, blog_posts},
        error::ErrorReport,
        lifecycle::{PageController, Trigger},
        live_preview::LivePreview,
        resolve::{
            ABOUT_PATH, HELP_PATH, PageKind, ROOT_PATH, Route, TEST_PATH, resolve_capture,
        },
        sanitize::Sanitizer,
    },
    config::SiteSettings,
    domain::page::FetchState,
    presentation::{
        render::{PageRenderer, PageVariant},
        views::{
            BlogTemplate, BlogView, LayoutChrome, LayoutContext, render_page_response,
            render_template_response,
        },
    },
};

use super::{
    live,
    middleware::{log_responses, set_request_context},
};

#[derive(Clone)]
pub struct HttpState {
    pub content: Arc<dyn ContentClient>,
    pub renderer: PageRenderer,
    /// Present only while live preview is enabled.
    pub live_preview: Option<LivePreview>,
    pub site: Arc<SiteSettings>,
}

impl HttpState {
    pub fn new(
        content: Arc<dyn ContentClient>,
        sanitizer: Arc<dyn Sanitizer>,
        live_preview: Option<LivePreview>,
        site: SiteSettings,
    ) -> Self {
        Self {
            content,
            renderer: PageRenderer::new(sanitizer),
            live_preview: live_preview.filter(LivePreview::is_enabled),
            site: Arc::new(site),
        }
    }

    pub fn chrome(&self) -> LayoutChrome {
        LayoutChrome::new(self.site.title.clone(), self.site.footer_copy.clone())
    }

    /// The editor session named by a request, honoured only while live
    /// preview is enabled.
    pub fn preview_session(&self, query: PreviewQuery) -> Option<PreviewSession> {
        self.live_preview.as_ref()?;
        query.live_preview.and_then(PreviewSession::new)
    }

    pub fn variant(&self, kind: PageKind) -> PageVariant {
        match kind {
            PageKind::Dynamic => PageVariant::Full,
            PageKind::RichTextOnly => PageVariant::RichTextOnly,
            PageKind::Environment => PageVariant::Environment(self.site.deployment_mode.label()),
        }
    }
}

/// Query the CMS preview pane appends to the pages it frames.
#[derive(Debug, Default, Deserialize)]
pub struct PreviewQuery {
    pub live_preview: Option<String>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/about", get(about))
        .route("/help", get(help))
        .route("/test", get(test_page))
        .route("/blog", get(blog))
        .route("/_health", get(health))
        .route("/_notify", post(live::notify))
        .route("/_live", get(live::live_root))
        .route("/_live/{*path}", get(live::live_path))
        .route("/{*slug}", get(dynamic_page))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn index(State(state): State<HttpState>, Query(query): Query<PreviewQuery>) -> Response {
    let preview = state.preview_session(query);
    page_response(&state, ROOT_PATH.to_string(), PageKind::Dynamic, preview).await
}

async fn about(State(state): State<HttpState>, Query(query): Query<PreviewQuery>) -> Response {
    let preview = state.preview_session(query);
    page_response(&state, ABOUT_PATH.to_string(), PageKind::RichTextOnly, preview).await
}

async fn help(State(state): State<HttpState>, Query(query): Query<PreviewQuery>) -> Response {
    let preview = state.preview_session(query);
    page_response(&state, HELP_PATH.to_string(), PageKind::RichTextOnly, preview).await
}

async fn test_page(State(state): State<HttpState>, Query(query): Query<PreviewQuery>) -> Response {
    let preview = state.preview_session(query);
    page_response(&state, TEST_PATH.to_string(), PageKind::Environment, preview).await
}

async fn dynamic_page(
    State(state): State<HttpState>,
    Path(slug): Path<String>,
    Query(query): Query<PreviewQuery>,
) -> Response {
    let preview = state.preview_session(query);
    page_response(&state, resolve_capture(Some(&slug)), PageKind::Dynamic, preview).await
}

async fn blog(State(state): State<HttpState>) -> Response {
    blog_response(&state).await
}

async fn health() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Mount the route once, render its settled state and map it to a status.
///
/// Drafts are fetched only for the editor session in `preview`; the live
/// hook carries that session on to the stream.
pub(crate) async fn page_response(
    state: &HttpState,
    lookup: String,
    kind: PageKind,
    preview: Option<PreviewSession>,
) -> Response {
    let mut controller =
        PageController::new(Arc::clone(&state.content), lookup).with_preview(preview.clone());
    controller.run_once(Trigger::Mount).await;

    let variant = state.variant(kind);
    let body = state.renderer.render_state(controller.state(), &variant);
    let live_endpoint = state
        .live_preview
        .as_ref()
        .map(|_| live::endpoint_for(controller.path(), preview.as_ref()));

    let (status, document) = match controller.state() {
        FetchState::Loaded(document) => (StatusCode::OK, Some(document)),
        FetchState::NotFound => (StatusCode::NOT_FOUND, None),
        FetchState::Error(_) => (StatusCode::BAD_GATEWAY, None),
        FetchState::Idle | FetchState::Loading => (StatusCode::OK, None),
    };
    let chrome = state.chrome().for_document(document);

    render_page_response(chrome, &body, live_endpoint, status)
}

pub(crate) async fn blog_response(state: &HttpState) -> Response {
    let chrome = state.chrome().with_title("Blog");

    match state.content.list_pages().await {
        Ok(entries) => {
            let posts = blog_posts(entries);
            let view = LayoutContext::new(chrome, BlogView::loaded(&posts));
            render_template_response(BlogTemplate { view }, StatusCode::OK)
        }
        Err(err) => {
            error!(
                target = "pagewright::http::blog",
                error = %err,
                "failed to load blog posts"
            );
            let view = LayoutContext::new(chrome, BlogView::failed());
            let mut response = render_template_response(BlogTemplate { view }, StatusCode::BAD_GATEWAY);
            ErrorReport::from_error(
                "infra::http::public::blog_response",
                StatusCode::BAD_GATEWAY,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

/// Render whatever `request_path` would serve, for callers outside the router.
pub async fn render_request_path(state: &HttpState, request_path: &str) -> Response {
    match Route::for_request_path(request_path) {
        Route::Blog => blog_response(state).await,
        Route::Page { lookup, kind } => page_response(state, lookup, kind, None).await,
    }
}
