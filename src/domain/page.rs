//! Page documents as delivered by the content API.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::editor::EditorMetadata;
use super::error::DomainError;

/// Public message carried by [`FetchState::Error`]; diagnostics go to the log.
pub const FETCH_FAILURE_MESSAGE: &str = "Failed to load page";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageDocument {
    /// Lookup path the document was resolved from.
    pub url: String,
    /// CMS entry identifier, when the source provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageAsset>,
    /// Raw rich-text HTML. Must pass through a sanitizer before rendering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rich_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<BlockWrapper>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor: Option<EditorMetadata>,
}

impl PageDocument {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Blocks in author order; empty when the field is absent.
    pub fn block_list(&self) -> &[BlockWrapper] {
        self.blocks.as_deref().unwrap_or_default()
    }

    /// Block ids are the rendering identity of each block; they must be
    /// non-empty and unique within one page.
    pub fn validate(&self) -> Result<(), DomainError> {
        let mut seen = HashSet::new();
        for wrapper in self.block_list() {
            let id = wrapper.block.id.as_str();
            if id.trim().is_empty() {
                return Err(DomainError::invariant(format!(
                    "page `{}` has a block without an id",
                    self.url
                )));
            }
            if !seen.insert(id) {
                return Err(DomainError::invariant(format!(
                    "page `{}` repeats block id `{id}`",
                    self.url
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAsset {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor: Option<EditorMetadata>,
}

impl ImageAsset {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            editor: None,
        }
    }
}

/// One-field envelope around a block, mirroring the CMS modular-block shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockWrapper {
    pub block: Block,
}

impl From<Block> for BlockWrapper {
    fn from(block: Block) -> Self {
        Self { block }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    #[serde(default)]
    pub layout: BlockLayout,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageAsset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Raw HTML copy. Must pass through a sanitizer before rendering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor: Option<EditorMetadata>,
}

impl Block {
    pub fn new(id: impl Into<String>, layout: BlockLayout) -> Self {
        Self {
            id: id.into(),
            layout,
            image: None,
            title: None,
            copy: None,
            editor: None,
        }
    }
}

/// Placement of a block's image relative to its text on wide viewports.
///
/// Anything other than `image_left` places the text first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockLayout {
    ImageLeft,
    #[default]
    #[serde(other)]
    ImageRight,
}

impl BlockLayout {
    pub fn from_raw(value: Option<&str>) -> Self {
        match value {
            Some("image_left") => Self::ImageLeft,
            _ => Self::ImageRight,
        }
    }

    pub fn image_first(self) -> bool {
        matches!(self, Self::ImageLeft)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ImageLeft => "image_left",
            Self::ImageRight => "image_right",
        }
    }
}

/// Fetch lifecycle of one mounted route.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FetchState {
    #[default]
    Idle,
    Loading,
    Loaded(PageDocument),
    NotFound,
    Error(String),
}

impl FetchState {
    pub fn failed() -> Self {
        Self::Error(FETCH_FAILURE_MESSAGE.to_string())
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Loaded(_) => "loaded",
            Self::NotFound => "not_found",
            Self::Error(_) => "error",
        }
    }
}
