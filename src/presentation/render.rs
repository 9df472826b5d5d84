//! Page renderer: page documents and fetch states to render trees.

use std::sync::Arc;

use crate::{
    application::sanitize::{SafeHtml, Sanitizer},
    domain::{
        editor::{EditorMetadata, field_tags},
        page::{Block, FetchState, ImageAsset, PageDocument},
    },
    presentation::tree::{Element, Node},
};

/// Marker the live-preview overlay looks for to offer in-place insertion of a first block.
pub const EMPTY_BLOCK_PARENT_CLASS: &str = "visual-builder__empty-block-parent";

pub const LOADING_MESSAGE: &str = "Loading...";
pub const NOT_FOUND_MESSAGE: &str = "Page not found";
pub const HOME_LINK_LABEL: &str = "Go back to home";

const HERO_WIDTH: u32 = 768;
const HERO_HEIGHT: u32 = 414;
const BLOCK_IMAGE_WIDTH: u32 = 200;
const BLOCK_IMAGE_HEIGHT: u32 = 112;

/// Which parts of a document a route shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageVariant {
    /// Title, description, hero image, rich text and blocks.
    Full,
    /// Rich text only.
    RichTextOnly,
    /// Rich text preceded by a banner naming the deployment environment.
    Environment(&'static str),
}

#[derive(Clone)]
pub struct PageRenderer {
    sanitizer: Arc<dyn Sanitizer>,
}

impl PageRenderer {
    pub fn new(sanitizer: Arc<dyn Sanitizer>) -> Self {
        Self { sanitizer }
    }

    /// Render a full page. An absent document renders the empty shell.
    pub fn render(&self, document: Option<&PageDocument>) -> Element {
        self.render_variant(document, &PageVariant::Full)
    }

    pub fn render_variant(&self, document: Option<&PageDocument>, variant: &PageVariant) -> Element {
        match variant {
            PageVariant::Full => self.full_page(document),
            PageVariant::RichTextOnly => Element::new("main")
                .class("page")
                .class("page--static")
                .maybe_child(document.and_then(|doc| self.page_rich_text(doc))),
            PageVariant::Environment(label) => Element::new("main")
                .class("page")
                .class("page--static")
                .child(environment_banner(label))
                .maybe_child(document.and_then(|doc| self.page_rich_text(doc))),
        }
    }

    /// Render whatever a route in `state` should show.
    pub fn render_state(&self, state: &FetchState, variant: &PageVariant) -> Element {
        match state {
            FetchState::Idle | FetchState::Loading => loading_view(),
            FetchState::Loaded(document) => self.render_variant(Some(document), variant),
            FetchState::NotFound => status_view("404", NOT_FOUND_MESSAGE),
            FetchState::Error(message) => status_view("Error", message),
        }
    }

    fn full_page(&self, document: Option<&PageDocument>) -> Element {
        let editor = document.and_then(|doc| doc.editor.as_ref());

        let section = Element::new("section")
            .class("page__section")
            .maybe_child(document.and_then(|doc| heading(doc, editor)))
            .maybe_child(document.and_then(|doc| description(doc, editor)))
            .maybe_child(
                document
                    .and_then(|doc| doc.image.as_ref())
                    .and_then(|image| {
                        image_node(image, HERO_WIDTH, HERO_HEIGHT, hero_image_tags(image))
                            .map(|img| img.class("page__hero"))
                    }),
            )
            .maybe_child(document.and_then(|doc| self.page_rich_text(doc)))
            .child(self.block_stack(document, editor));

        Element::new("main").class("page").child(section)
    }

    fn page_rich_text(&self, document: &PageDocument) -> Option<Element> {
        let html = self.sanitized(document.rich_text.as_deref())?;
        Some(
            Element::new("div")
                .class("prose")
                .class("page__rich-text")
                .tags(field_tags(document.editor.as_ref(), "rich_text"))
                .child(Node::Html(html)),
        )
    }

    fn block_stack(&self, document: Option<&PageDocument>, editor: Option<&EditorMetadata>) -> Element {
        let blocks = document.map(PageDocument::block_list).unwrap_or_default();

        let mut stack = Element::new("div")
            .class("page__blocks")
            .tags(field_tags(editor, "blocks"));
        if blocks.is_empty() {
            stack = stack.class(EMPTY_BLOCK_PARENT_CLASS);
        }

        stack.children(
            blocks
                .iter()
                .enumerate()
                .map(|(index, wrapper)| self.block(index, &wrapper.block, editor)),
        )
    }

    fn block(&self, index: usize, block: &Block, page_editor: Option<&EditorMetadata>) -> Element {
        let editor = block.editor.as_ref();

        let media = Element::new("div").class("block__media").maybe_child(
            block.image.as_ref().and_then(|image| {
                image_node(
                    image,
                    BLOCK_IMAGE_WIDTH,
                    BLOCK_IMAGE_HEIGHT,
                    field_tags(editor, "image"),
                )
            }),
        );

        let content = Element::new("div")
            .class("block__content")
            .maybe_child(non_empty(block.title.as_deref()).map(|title| {
                Element::new("h2")
                    .class("block__title")
                    .tags(field_tags(editor, "title"))
                    .child(Node::text(title))
            }))
            .maybe_child(self.sanitized(block.copy.as_deref()).map(|html| {
                Element::new("div")
                    .class("prose")
                    .class("block__copy")
                    .tags(field_tags(editor, "copy"))
                    .child(Node::Html(html))
            }));

        let (layout_class, first, second) = if block.layout.image_first() {
            ("block--image-left", media, content)
        } else {
            ("block--image-right", content, media)
        };

        Element::new("div")
            .key(block_key(&block.id))
            .class("block")
            .class(layout_class)
            .attr("data-layout", block.layout.as_str())
            .tags(field_tags(page_editor, &format!("blocks__{index}")))
            .child(first)
            .child(second)
    }

    fn sanitized(&self, html: Option<&str>) -> Option<SafeHtml> {
        let html = non_empty(html)?;
        let safe = self.sanitizer.sanitize(html);
        (!safe.is_empty()).then_some(safe)
    }
}

/// Element id used as the reconciliation key of a block.
pub fn block_key(id: &str) -> String {
    format!("block-{id}")
}

fn heading(document: &PageDocument, editor: Option<&EditorMetadata>) -> Option<Element> {
    let title = non_empty(document.title.as_deref())?;
    Some(
        Element::new("h1")
            .class("page__title")
            .tags(field_tags(editor, "title"))
            .child(Node::text(title)),
    )
}

fn description(document: &PageDocument, editor: Option<&EditorMetadata>) -> Option<Element> {
    let description = non_empty(document.description.as_deref())?;
    Some(
        Element::new("p")
            .class("page__description")
            .tags(field_tags(editor, "description"))
            .child(Node::text(description)),
    )
}

fn hero_image_tags(image: &ImageAsset) -> Option<&crate::domain::editor::EditorTags> {
    field_tags(image.editor.as_ref(), "url")
}

fn image_node(
    image: &ImageAsset,
    width: u32,
    height: u32,
    tags: Option<&crate::domain::editor::EditorTags>,
) -> Option<Element> {
    let url = non_empty(Some(image.url.as_str()))?;
    Some(
        Element::new("img")
            .attr("src", url)
            .attr("alt", image.title.as_str())
            .attr("width", width.to_string())
            .attr("height", height.to_string())
            .attr("loading", "lazy")
            .tags(tags),
    )
}

fn environment_banner(label: &str) -> Element {
    Element::new("div").class("environment-banner").child(
        Element::new("p").child(Node::text(format!("Current Environment: {label}"))),
    )
}

fn loading_view() -> Element {
    Element::new("main")
        .class("page")
        .class("page--loading")
        .attr("aria-busy", "true")
        .child(
            Element::new("section")
                .class("page__status")
                .child(Element::new("p").child(Node::text(LOADING_MESSAGE))),
        )
}

fn status_view(heading: &str, message: &str) -> Element {
    Element::new("main").class("page").class("page--error").child(
        Element::new("section")
            .class("page__status")
            .child(Element::new("h1").child(Node::text(heading)))
            .child(Element::new("p").class("page__message").child(Node::text(message)))
            .child(
                Element::new("p").child(
                    Element::new("a")
                        .attr("href", "/")
                        .child(Node::text(HOME_LINK_LABEL)),
                ),
            ),
    )
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::sanitize::AmmoniaSanitizer;
    use crate::domain::editor::EditorTags;
    use crate::domain::page::{BlockLayout, BlockWrapper};

    fn renderer() -> PageRenderer {
        PageRenderer::new(Arc::new(AmmoniaSanitizer::new()))
    }

    fn block(id: &str, layout: BlockLayout) -> BlockWrapper {
        Block {
            image: Some(ImageAsset::new(format!("https://img.example.com/{id}.png"), id)),
            title: Some(format!("Block {id}")),
            copy: Some("<p>copy</p>".to_string()),
            ..Block::new(id, layout)
        }
        .into()
    }

    fn blocks_of(tree: &Element) -> &Element {
        tree.find_by_class("page__blocks").expect("block stack")
    }

    #[test]
    fn empty_or_absent_blocks_mark_the_stack() {
        let renderer = renderer();
        let absent = PageDocument::new("/");
        let empty = PageDocument {
            blocks: Some(Vec::new()),
            ..PageDocument::new("/")
        };

        for doc in [&absent, &empty] {
            let tree = renderer.render(Some(doc));
            assert!(blocks_of(&tree).has_class(EMPTY_BLOCK_PARENT_CLASS));
        }
        assert!(blocks_of(&renderer.render(None)).has_class(EMPTY_BLOCK_PARENT_CLASS));
    }

    #[test]
    fn populated_blocks_do_not_mark_the_stack() {
        let doc = PageDocument {
            blocks: Some(vec![block("a", BlockLayout::ImageLeft)]),
            ..PageDocument::new("/")
        };
        let tree = renderer().render(Some(&doc));
        assert!(!blocks_of(&tree).has_class(EMPTY_BLOCK_PARENT_CLASS));
    }

    #[test]
    fn layout_decides_slot_order() {
        let doc = PageDocument {
            blocks: Some(vec![
                block("left", BlockLayout::ImageLeft),
                block("right", BlockLayout::ImageRight),
            ]),
            ..PageDocument::new("/")
        };
        let tree = renderer().render(Some(&doc));
        let blocks: Vec<_> = blocks_of(&tree).child_elements().collect();

        let slots = |el: &Element| -> Vec<String> {
            el.child_elements().map(|c| c.classes[0].clone()).collect()
        };
        assert_eq!(slots(blocks[0]), vec!["block__media", "block__content"]);
        assert_eq!(slots(blocks[1]), vec!["block__content", "block__media"]);
        assert_eq!(blocks[0].key.as_deref(), Some("block-left"));
        assert_eq!(blocks[1].key.as_deref(), Some("block-right"));
    }

    #[test]
    fn absent_fields_are_omitted_entirely() {
        let doc = PageDocument {
            title: Some("Hello".to_string()),
            description: Some("   ".to_string()),
            ..PageDocument::new("/hello")
        };
        let tree = renderer().render(Some(&doc));

        assert_eq!(tree.find_by_tag("h1").map(Element::text_content).as_deref(), Some("Hello"));
        assert!(tree.find_by_class("page__description").is_none());
        assert!(tree.find_by_class("page__hero").is_none());
        assert!(tree.find_by_class("page__rich-text").is_none());
    }

    #[test]
    fn rich_text_and_copy_are_sanitized() {
        let doc = PageDocument {
            rich_text: Some(r#"<p onclick="steal()">Hi</p><script>alert(1)</script>"#.to_string()),
            blocks: Some(vec![
                Block {
                    copy: Some(r#"<img src="x.png" onerror="alert(1)"><script>x()</script>"#.to_string()),
                    ..Block::new("a", BlockLayout::ImageLeft)
                }
                .into(),
            ]),
            ..PageDocument::new("/")
        };
        let html = renderer().render(Some(&doc)).to_html();

        assert!(html.contains("<p>Hi</p>"));
        assert!(!html.contains("<script"));
        assert!(!html.contains("onclick"));
        assert!(!html.contains("onerror"));
    }

    #[test]
    fn editor_tags_are_spread_onto_matching_nodes() {
        let mut editor = EditorMetadata::new();
        editor.insert("title", EditorTags::single("data-cslp", "page.p1.en-us.title"));
        editor.insert("blocks__0", EditorTags::single("data-cslp", "page.p1.en-us.blocks.0"));
        let mut block_editor = EditorMetadata::new();
        block_editor.insert(
            "title",
            EditorTags::single("data-cslp", "page.p1.en-us.blocks.0.block.title"),
        );

        let doc = PageDocument {
            title: Some("Tagged".to_string()),
            editor: Some(editor),
            blocks: Some(vec![
                Block {
                    title: Some("Block".to_string()),
                    editor: Some(block_editor),
                    ..Block::new("b0", BlockLayout::ImageRight)
                }
                .into(),
            ]),
            ..PageDocument::new("/")
        };
        let tree = renderer().render(Some(&doc));

        let h1 = tree.find_by_tag("h1").expect("title");
        assert_eq!(h1.attr_value("data-cslp"), Some("page.p1.en-us.title"));
        let block = tree.find_by_class("block").expect("block");
        assert_eq!(block.attr_value("data-cslp"), Some("page.p1.en-us.blocks.0"));
        let h2 = tree.find_by_tag("h2").expect("block title");
        assert_eq!(h2.attr_value("data-cslp"), Some("page.p1.en-us.blocks.0.block.title"));
        assert!(!blocks_of(&tree).has_attr("data-cslp"));
    }

    #[test]
    fn rendering_is_idempotent() {
        let doc = PageDocument {
            title: Some("Same".to_string()),
            rich_text: Some("<p>body</p>".to_string()),
            blocks: Some(vec![block("a", BlockLayout::ImageLeft)]),
            ..PageDocument::new("/same")
        };
        let renderer = renderer();
        assert_eq!(renderer.render(Some(&doc)), renderer.render(Some(&doc)));
    }

    #[test]
    fn hello_scenario_places_image_first() {
        let doc = PageDocument {
            title: Some("Hello".to_string()),
            blocks: Some(vec![
                Block {
                    image: Some(ImageAsset::new("https://img.example.com/a.png", "A")),
                    title: Some("First".to_string()),
                    ..Block::new("only", BlockLayout::ImageLeft)
                }
                .into(),
            ]),
            ..PageDocument::new("/hello")
        };
        let tree = renderer().render(Some(&doc));

        assert_eq!(tree.find_by_tag("h1").map(Element::text_content).as_deref(), Some("Hello"));
        assert!(tree.find_by_class("page__description").is_none());
        let block = tree.find_by_class("block").expect("block");
        let first = block.child_elements().next().expect("first slot");
        assert!(first.has_class("block__media"));
        assert!(first.find_by_tag("img").is_some());
    }

    #[test]
    fn state_views_follow_the_rendering_policy() {
        let renderer = renderer();

        let loading = renderer.render_state(&FetchState::Loading, &PageVariant::Full);
        assert!(loading.text_content().contains(LOADING_MESSAGE));
        let idle = renderer.render_state(&FetchState::Idle, &PageVariant::Full);
        assert_eq!(idle, loading);

        let missing = renderer.render_state(&FetchState::NotFound, &PageVariant::Full);
        assert!(missing.text_content().contains("Page not found"));
        let link = missing.find_by_tag("a").expect("home link");
        assert_eq!(link.attr_value("href"), Some("/"));

        let failed = renderer.render_state(&FetchState::failed(), &PageVariant::RichTextOnly);
        assert!(failed.text_content().contains("Failed to load page"));
        assert!(failed.find_by_tag("a").is_some());
    }

    #[test]
    fn environment_variant_shows_banner_and_rich_text_only() {
        let doc = PageDocument {
            title: Some("Hidden".to_string()),
            rich_text: Some("<p>Test body</p>".to_string()),
            ..PageDocument::new("/test")
        };
        let tree = renderer().render_variant(Some(&doc), &PageVariant::Environment("Development"));

        assert!(tree.text_content().contains("Current Environment: Development"));
        assert!(tree.find_by_tag("h1").is_none());
        assert!(tree.to_html().contains("<p>Test body</p>"));
    }
}
