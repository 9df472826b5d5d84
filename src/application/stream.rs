//! Helpers for building server-driven datastar SSE responses.

use std::convert::Infallible;

use axum::response::{
    IntoResponse, Response,
    sse::{Event, KeepAlive, Sse},
};
use datastar::prelude::{ElementPatchMode, PatchElements};
use futures::{Stream, StreamExt};

use crate::presentation::tree::Element;

/// Container every page body is rendered into.
pub const PAGE_SELECTOR: &str = "#page";

/// Patch that morphs the contents of the page container into `body`.
///
/// Morphing matches elements by id, so keyed blocks keep their identity
/// across updates.
pub fn page_patch(body: &Element) -> Event {
    PatchElements::new(body.to_html())
        .selector(PAGE_SELECTOR)
        .mode(ElementPatchMode::Inner)
        .write_as_axum_sse_event()
}

/// Wrap a stream of rendered page bodies into a long-lived SSE response.
pub fn page_patch_response<S>(bodies: S) -> Response
where
    S: Stream<Item = Element> + Send + 'static,
{
    let events = bodies.map(|body| Ok::<Event, Infallible>(page_patch(&body)));
    Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response()
}
