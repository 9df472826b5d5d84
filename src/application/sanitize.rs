//! HTML sanitisation for CMS rich text.

use std::{collections::HashSet, fmt};

use ammonia::Builder as AmmoniaBuilder;

/// HTML that has been through a [`Sanitizer`] and may be inserted verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeHtml(String);

impl SafeHtml {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for SafeHtml {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Strips executable content from untrusted HTML.
pub trait Sanitizer: Send + Sync {
    /// Return a cleaned copy of `html` with scripts and event handlers removed.
    fn clean(&self, html: &str) -> String;

    fn sanitize(&self, html: &str) -> SafeHtml {
        SafeHtml(self.clean(html))
    }
}

/// Ammonia-backed sanitizer tuned for CMS rich-text fields.
pub struct AmmoniaSanitizer {
    builder: AmmoniaBuilder<'static>,
}

impl AmmoniaSanitizer {
    pub fn new() -> Self {
        Self {
            builder: build_rich_text_sanitizer(),
        }
    }
}

impl Default for AmmoniaSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sanitizer for AmmoniaSanitizer {
    fn clean(&self, html: &str) -> String {
        self.builder.clean(html).to_string()
    }
}

fn build_rich_text_sanitizer() -> AmmoniaBuilder<'static> {
    let mut builder = AmmoniaBuilder::default();

    let tags: HashSet<&'static str> = HashSet::from([
        "a",
        "abbr",
        "b",
        "blockquote",
        "br",
        "caption",
        "code",
        "del",
        "div",
        "em",
        "figcaption",
        "figure",
        "h1",
        "h2",
        "h3",
        "h4",
        "h5",
        "h6",
        "hr",
        "i",
        "img",
        "li",
        "mark",
        "ol",
        "p",
        "pre",
        "s",
        "span",
        "strong",
        "sub",
        "sup",
        "table",
        "tbody",
        "td",
        "tfoot",
        "th",
        "thead",
        "tr",
        "u",
        "ul",
    ]);
    builder.tags(tags);

    // No `id`: rich text shares the document with the `#page` patch target.
    // The only `data-*` attribute kept is the editor overlay tag; any other
    // would be read by the client runtime as a reactive binding.
    let generic: HashSet<&'static str> = HashSet::from([
        "class",
        "title",
        "lang",
        "dir",
        "role",
        "aria-label",
        "data-cslp",
    ]);
    builder.generic_attributes(generic);

    builder.add_tag_attributes("a", &["href", "target"]);
    builder.add_tag_attributes("img", &["src", "alt", "width", "height", "loading"]);
    builder.add_tag_attributes("td", &["colspan", "rowspan"]);
    builder.add_tag_attributes("th", &["colspan", "rowspan", "scope"]);

    builder.url_schemes(HashSet::from(["http", "https", "mailto", "tel"]));
    builder.link_rel(Some("noopener noreferrer"));

    builder
}
