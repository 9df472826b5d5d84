//! Content fetch contract consumed by the page lifecycle and blog listing.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{error::DomainError, page::PageDocument};

/// URL prefix that marks an entry as a blog post.
pub const BLOG_PREFIX: &str = "/blog/";
/// Lookup path of the blog index entry itself, excluded from the listing.
pub const BLOG_INDEX_PATH: &str = "/blog";

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("content request for `{path}` failed: {message}")]
    Transport { path: String, message: String },
    #[error("content API answered {status} for `{path}`")]
    Status { status: u16, path: String },
    #[error("content payload for `{path}` could not be decoded: {message}")]
    Decode { path: String, message: String },
    #[error("content for `{path}` is invalid")]
    Invalid {
        path: String,
        #[source]
        source: DomainError,
    },
}

impl ContentError {
    pub fn transport(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn decode(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// An editor's live-preview session. Draft content is only fetched on
/// behalf of one, never for ordinary page views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewSession {
    hash: String,
}

impl PreviewSession {
    /// `None` for a blank hash.
    pub fn new(hash: impl Into<String>) -> Option<Self> {
        let hash = hash.into();
        if hash.trim().is_empty() {
            None
        } else {
            Some(Self { hash })
        }
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }
}

/// Source of page documents.
#[async_trait]
pub trait ContentClient: Send + Sync {
    /// Fetch the document published at `path`, or its draft when `preview`
    /// names an editor session. `Ok(None)` means no entry matches.
    async fn get_page(
        &self,
        path: &str,
        preview: Option<&PreviewSession>,
    ) -> Result<Option<PageDocument>, ContentError>;

    /// Fetch every page entry of the configured content type, in API order.
    async fn list_pages(&self) -> Result<Vec<PageDocument>, ContentError>;
}

/// Keep only blog posts: urls under `/blog/`, never the index itself.
pub fn blog_posts(entries: Vec<PageDocument>) -> Vec<PageDocument> {
    entries
        .into_iter()
        .filter(|entry| entry.url.starts_with(BLOG_PREFIX) && entry.url != BLOG_INDEX_PATH)
        .collect()
}
