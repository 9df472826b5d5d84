//! Contentstack delivery API client.

use std::time::Instant;

use async_trait::async_trait;
use metrics::histogram;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::{
    application::content::{ContentClient, ContentError, PreviewSession},
    config::{ContentSettings, LivePreviewSettings},
    domain::{
        editor::{EditorMetadata, EditorTags},
        page::{Block, BlockLayout, BlockWrapper, ImageAsset, PageDocument},
    },
    infra::error::InfraError,
};

const SOURCE: &str = "pagewright::content";
const EDITOR_TAG_ATTRIBUTE: &str = "data-cslp";
const LIST_PATH: &str = "*";

pub struct ContentstackClient {
    http: Client,
    base_url: Url,
    api_key: String,
    delivery_token: String,
    environment: String,
    content_type: String,
    locale: String,
    editable_tags: bool,
    preview: Option<PreviewTarget>,
}

struct PreviewTarget {
    host: String,
    token: String,
}

impl ContentstackClient {
    pub fn new(
        content: &ContentSettings,
        live_preview: &LivePreviewSettings,
    ) -> Result<Self, InfraError> {
        let api_key = content
            .api_key
            .clone()
            .ok_or(InfraError::MissingSetting {
                key: "content.api_key",
            })?;
        let delivery_token = content
            .delivery_token
            .clone()
            .ok_or(InfraError::MissingSetting {
                key: "content.delivery_token",
            })?;

        let http = Client::builder()
            .user_agent(concat!("pagewright/", env!("CARGO_PKG_VERSION")))
            .timeout(content.timeout)
            .build()
            .map_err(InfraError::ContentClient)?;

        let preview = match (live_preview.enabled, live_preview.preview_token.clone()) {
            (true, Some(token)) => Some(PreviewTarget {
                host: live_preview.preview_host.clone(),
                token,
            }),
            (true, None) => {
                warn!(
                    target = SOURCE,
                    "live preview enabled without preview_token; drafts will not be fetched"
                );
                None
            }
            _ => None,
        };

        Ok(Self {
            http,
            base_url: content.base_url.clone(),
            api_key,
            delivery_token,
            environment: content.environment.clone(),
            content_type: content.content_type.clone(),
            locale: content.locale.clone(),
            editable_tags: live_preview.editable_tags,
            preview,
        })
    }

    fn entries_url(
        &self,
        query: Option<&str>,
        preview: Option<&PreviewTarget>,
    ) -> Result<Url, ContentError> {
        let path = query.unwrap_or(LIST_PATH);
        let mut url = self.base_url.clone();
        if let Some(target) = preview {
            url.set_host(Some(&target.host))
                .map_err(|err| ContentError::transport(path, format!("preview host: {err}")))?;
        }
        url.set_path(&format!("/v3/content_types/{}/entries", self.content_type));
        {
            let mut pairs = url.query_pairs_mut();
            if !self.environment.is_empty() {
                pairs.append_pair("environment", &self.environment);
            }
            pairs.append_pair("locale", &self.locale);
            if let Some(lookup) = query {
                pairs.append_pair("query", &serde_json::json!({ "url": lookup }).to_string());
            }
        }
        Ok(url)
    }

    async fn fetch_entries(
        &self,
        query: Option<&str>,
        session: Option<&PreviewSession>,
    ) -> Result<Vec<PageDocument>, ContentError> {
        let path = query.unwrap_or(LIST_PATH);
        let preview = match (self.preview.as_ref(), session) {
            (Some(target), Some(session)) => Some((target, session)),
            (None, Some(_)) => {
                debug!(
                    target = SOURCE,
                    path, "preview session ignored; no preview token configured"
                );
                None
            }
            _ => None,
        };
        let url = self.entries_url(query, preview.map(|(target, _)| target))?;

        let mut request = self
            .http
            .get(url)
            .header("api_key", &self.api_key)
            .header("access_token", &self.delivery_token);
        if let Some((target, session)) = preview {
            request = request
                .header("preview_token", &target.token)
                .header("live_preview", session.hash());
        }

        let started = Instant::now();
        let response = request
            .send()
            .await
            .map_err(|err| ContentError::transport(path, err.to_string()))?;
        histogram!("pagewright_content_request_ms").record(started.elapsed().as_secs_f64() * 1000.0);

        let status = response.status();
        debug!(
            target = SOURCE,
            path,
            status = status.as_u16(),
            preview = preview.is_some(),
            "content API responded"
        );
        if !status.is_success() {
            return Err(ContentError::Status {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|err| ContentError::transport(path, err.to_string()))?;
        let payload = decode_entries(path, &body)?;

        Ok(payload
            .entries
            .into_iter()
            .map(|entry| {
                let mut document = entry.into_document();
                if self.editable_tags {
                    add_editable_tags(&mut document, &self.content_type, &self.locale);
                }
                document
            })
            .collect())
    }
}

#[async_trait]
impl ContentClient for ContentstackClient {
    async fn get_page(
        &self,
        path: &str,
        preview: Option<&PreviewSession>,
    ) -> Result<Option<PageDocument>, ContentError> {
        let entries = self.fetch_entries(Some(path), preview).await?;
        Ok(entries.into_iter().next())
    }

    async fn list_pages(&self) -> Result<Vec<PageDocument>, ContentError> {
        self.fetch_entries(None, None).await
    }
}

fn decode_entries(path: &str, body: &str) -> Result<EntriesResponse, ContentError> {
    serde_json::from_str(body).map_err(|err| ContentError::decode(path, err.to_string()))
}

/// Attach `data-cslp` tags to every rendered field, keyed the way the
/// preview overlay expects: `{content_type}.{uid}.{locale}.{field path}`.
///
/// Entries without a uid cannot be addressed by the overlay and are left as is.
pub fn add_editable_tags(document: &mut PageDocument, content_type: &str, locale: &str) {
    let Some(uid) = document.uid.clone() else {
        return;
    };
    let prefix = format!("{content_type}.{uid}.{locale}");
    let tag = |field: &str| EditorTags::single(EDITOR_TAG_ATTRIBUTE, format!("{prefix}.{field}"));

    let mut metadata = document.editor.take().unwrap_or_default();
    for field in ["title", "description", "rich_text", "blocks"] {
        if metadata.field(field).is_none() {
            metadata.insert(field, tag(field));
        }
    }

    if let Some(image) = document.image.as_mut() {
        let editor = image.editor.get_or_insert_with(EditorMetadata::new);
        if editor.field("url").is_none() {
            editor.insert("url", tag("image"));
        }
    }

    for (index, wrapper) in document.blocks.iter_mut().flatten().enumerate() {
        let key = format!("blocks__{index}");
        if metadata.field(&key).is_none() {
            metadata.insert(key, tag(&format!("blocks.{index}")));
        }

        let block = &mut wrapper.block;
        let block_editor = block.editor.get_or_insert_with(EditorMetadata::new);
        for field in ["image", "title", "copy"] {
            if block_editor.field(field).is_none() {
                block_editor.insert(field, tag(&format!("blocks.{index}.block.{field}")));
            }
        }
    }

    document.editor = Some(metadata);
}

#[derive(Debug, Deserialize)]
struct EntriesResponse {
    #[serde(default)]
    entries: Vec<EntryDto>,
}

#[derive(Debug, Deserialize)]
struct EntryDto {
    uid: Option<String>,
    #[serde(default)]
    url: String,
    title: Option<String>,
    description: Option<String>,
    image: Option<AssetDto>,
    rich_text: Option<String>,
    blocks: Option<Vec<BlockWrapperDto>>,
    #[serde(rename = "$")]
    editor: Option<EditorMetadata>,
}

#[derive(Debug, Deserialize)]
struct AssetDto {
    url: Option<String>,
    title: Option<String>,
    filename: Option<String>,
    #[serde(rename = "$")]
    editor: Option<EditorMetadata>,
}

#[derive(Debug, Deserialize)]
struct BlockWrapperDto {
    block: BlockDto,
}

#[derive(Debug, Deserialize)]
struct BlockDto {
    #[serde(rename = "_metadata")]
    metadata: Option<BlockMetadataDto>,
    layout: Option<String>,
    image: Option<AssetDto>,
    title: Option<String>,
    copy: Option<String>,
    #[serde(rename = "$")]
    editor: Option<EditorMetadata>,
}

#[derive(Debug, Deserialize)]
struct BlockMetadataDto {
    uid: Option<String>,
}

impl EntryDto {
    fn into_document(self) -> PageDocument {
        let blocks = self.blocks.map(|blocks| {
            blocks
                .into_iter()
                .enumerate()
                .map(|(index, wrapper)| wrapper.block.into_block(index))
                .collect()
        });

        PageDocument {
            url: self.url,
            uid: self.uid,
            title: self.title,
            description: self.description,
            image: self.image.and_then(AssetDto::into_asset),
            rich_text: self.rich_text,
            blocks,
            editor: self.editor.filter(|editor| !editor.is_empty()),
        }
    }
}

impl AssetDto {
    fn into_asset(self) -> Option<ImageAsset> {
        let url = self.url.filter(|url| !url.trim().is_empty())?;
        Some(ImageAsset {
            url,
            title: self.title.or(self.filename).unwrap_or_default(),
            editor: self.editor,
        })
    }
}

impl BlockDto {
    fn into_block(self, index: usize) -> BlockWrapper {
        let id = self
            .metadata
            .and_then(|metadata| metadata.uid)
            .filter(|uid| !uid.trim().is_empty())
            .unwrap_or_else(|| {
                warn!(
                    target = SOURCE,
                    index, "block has no _metadata.uid; keying it by position"
                );
                format!("position-{index}")
            });

        Block {
            id,
            layout: BlockLayout::from_raw(self.layout.as_deref()),
            image: self.image.and_then(AssetDto::into_asset),
            title: self.title,
            copy: self.copy,
            editor: self.editor,
        }
        .into()
    }
}
