use crate::{
    application::{
        content::BLOG_INDEX_PATH,
        error::{ErrorReport, HttpError},
    },
    domain::page::PageDocument,
    presentation::tree::Element,
};
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

pub const DEFAULT_FOOTER_COPY: &str = "© 2025 Your Company Name. All rights reserved.";
pub const BLOG_FAILURE_MESSAGE: &str = "Failed to load blog posts";
pub const BLOG_PREVIEW_FALLBACK: &str = "No preview available";

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Render a page body inside the layout.
///
/// Non-success statuses carry an [`ErrorReport`] so the response logger
/// records why the route did not load.
pub fn render_page_response(
    chrome: LayoutChrome,
    body: &Element,
    live_endpoint: Option<String>,
    status: StatusCode,
) -> Response {
    let content = PageView {
        body_html: body.to_html(),
        live_endpoint,
    };
    let view = LayoutContext::new(chrome, content);
    let mut response = render_template_response(PageTemplate { view }, status);

    if status == StatusCode::NOT_FOUND {
        ErrorReport::from_message(
            "presentation::views::render_page_response",
            status,
            "Page not found",
        )
        .attach(&mut response);
    } else if status.is_server_error() {
        ErrorReport::from_message(
            "presentation::views::render_page_response",
            status,
            "Page content unavailable",
        )
        .attach(&mut response);
    }
    response
}

#[derive(Clone)]
pub struct BrandView {
    pub title: String,
    pub href: String,
}

#[derive(Clone)]
pub struct FooterView {
    pub copy: String,
}

#[derive(Clone)]
pub struct PageMetaView {
    pub title: String,
    pub description: String,
}

#[derive(Clone)]
pub struct LayoutChrome {
    pub brand: BrandView,
    pub footer: FooterView,
    pub meta: PageMetaView,
}

impl LayoutChrome {
    pub fn new(site_title: impl Into<String>, footer_copy: Option<String>) -> Self {
        let site_title = site_title.into();
        Self {
            brand: BrandView {
                title: site_title.clone(),
                href: "/".to_string(),
            },
            footer: FooterView {
                copy: footer_copy
                    .filter(|copy| !copy.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_FOOTER_COPY.to_string()),
            },
            meta: PageMetaView {
                title: site_title,
                description: String::new(),
            },
        }
    }

    /// Take the document title and description when the page provides them.
    pub fn for_document(self, document: Option<&PageDocument>) -> Self {
        let Some(document) = document else {
            return self;
        };

        let title = document
            .title
            .as_deref()
            .filter(|title| !title.trim().is_empty())
            .map(|title| format!("{title} | {}", self.brand.title))
            .unwrap_or_else(|| self.meta.title.clone());
        let description = document
            .description
            .clone()
            .unwrap_or_else(|| self.meta.description.clone());

        Self {
            meta: PageMetaView { title, description },
            ..self
        }
    }

    pub fn with_title(self, title: &str) -> Self {
        let title = format!("{title} | {}", self.brand.title);
        Self {
            meta: PageMetaView {
                title,
                ..self.meta
            },
            ..self
        }
    }
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub brand: BrandView,
    pub footer: FooterView,
    pub meta: PageMetaView,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self {
            brand: chrome.brand,
            footer: chrome.footer,
            meta: chrome.meta,
            content,
        }
    }
}

pub struct PageView {
    pub body_html: String,
    /// SSE endpoint the `#page` container connects to for live updates.
    pub live_endpoint: Option<String>,
}

#[derive(Template)]
#[template(path = "page.html")]
pub struct PageTemplate {
    pub view: LayoutContext<PageView>,
}

#[derive(Clone)]
pub struct BlogCard {
    pub uid: String,
    pub title: String,
    pub preview: String,
    pub href: String,
}

impl BlogCard {
    pub fn from_document(document: &PageDocument) -> Self {
        Self {
            uid: document.uid.clone().unwrap_or_else(|| document.url.clone()),
            title: document.title.clone().unwrap_or_default(),
            preview: document
                .description
                .clone()
                .filter(|description| !description.trim().is_empty())
                .unwrap_or_else(|| BLOG_PREVIEW_FALLBACK.to_string()),
            href: root_relative(&document.url).unwrap_or(BLOG_INDEX_PATH).to_string(),
        }
    }
}

/// Same-origin paths only; scheme and protocol-relative urls are refused.
fn root_relative(url: &str) -> Option<&str> {
    let rest = url.strip_prefix('/')?;
    (!rest.starts_with(['/', '\\'])).then_some(url)
}

pub struct BlogView {
    pub posts: Vec<BlogCard>,
    pub failure: Option<String>,
}

impl BlogView {
    pub fn loaded(documents: &[PageDocument]) -> Self {
        Self {
            posts: documents.iter().map(BlogCard::from_document).collect(),
            failure: None,
        }
    }

    pub fn failed() -> Self {
        Self {
            posts: Vec::new(),
            failure: Some(BLOG_FAILURE_MESSAGE.to_string()),
        }
    }
}

#[derive(Template)]
#[template(path = "blog.html")]
pub struct BlogTemplate {
    pub view: LayoutContext<BlogView>,
}
