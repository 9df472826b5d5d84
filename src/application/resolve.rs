//! Route to lookup-path resolution.

/// Lookup path of the site root.
pub const ROOT_PATH: &str = "/";

/// Fixed lookup paths of the static routes.
pub const ABOUT_PATH: &str = "/about";
pub const HELP_PATH: &str = "/help";
pub const TEST_PATH: &str = "/test";
/// Request path of the blog listing.
pub const BLOG_PATH: &str = "/blog";

/// How a mounted route presents its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Dynamic,
    RichTextOnly,
    Environment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Page { lookup: String, kind: PageKind },
    Blog,
}

impl Route {
    /// Classify a request path the way the router does.
    pub fn for_request_path(path: &str) -> Self {
        let lookup = resolve_capture(Some(path));
        match lookup.as_str() {
            ABOUT_PATH | HELP_PATH => Route::Page {
                lookup,
                kind: PageKind::RichTextOnly,
            },
            TEST_PATH => Route::Page {
                lookup,
                kind: PageKind::Environment,
            },
            BLOG_PATH => Route::Blog,
            _ => Route::Page {
                lookup,
                kind: PageKind::Dynamic,
            },
        }
    }
}

/// Map dynamic route segments to the lookup path used against the content API.
///
/// Absent or empty segments resolve to the site root; otherwise the segments
/// are joined with `/` and prefixed with `/`.
pub fn resolve<S: AsRef<str>>(segments: Option<&[S]>) -> String {
    match segments {
        Some(segments) if !segments.is_empty() => {
            let mut path = String::new();
            for segment in segments {
                path.push('/');
                path.push_str(segment.as_ref());
            }
            path
        }
        _ => ROOT_PATH.to_string(),
    }
}

/// Split a catch-all capture (`a/b/c`) into its segments.
pub fn split_segments(capture: &str) -> Vec<&str> {
    capture.split('/').filter(|segment| !segment.is_empty()).collect()
}

/// Resolve a catch-all capture straight to a lookup path.
pub fn resolve_capture(capture: Option<&str>) -> String {
    let segments = capture.map(split_segments);
    resolve(segments.as_deref())
}
