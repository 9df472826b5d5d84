//! Minimal render tree with HTML serialisation.
//!
//! Text and attribute values are escaped on output. The only way to emit
//! markup verbatim is [`Node::Html`], which requires [`SafeHtml`].

use std::fmt::Write as _;

use crate::application::sanitize::SafeHtml;
use crate::domain::editor::EditorTags;

const VOID_ELEMENTS: &[&str] = &["br", "hr", "img", "input", "link", "meta", "source"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    Html(SafeHtml),
}

impl Node {
    pub fn text(value: impl Into<String>) -> Self {
        Node::Text(value.into())
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        match self {
            Node::Element(element) => element.write_html(out),
            Node::Text(text) => out.push_str(&escape_text(text)),
            Node::Html(html) => out.push_str(html.as_str()),
        }
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: &'static str,
    /// Reconciliation key; serialised as the element `id`.
    pub key: Option<String>,
    pub classes: Vec<String>,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: &'static str) -> Self {
        Self {
            tag,
            key: None,
            classes: Vec::new(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    /// Spread an editor annotation bag onto this element. `None` is a no-op.
    pub fn tags(mut self, tags: Option<&EditorTags>) -> Self {
        if let Some(tags) = tags {
            for (name, value) in tags.attributes() {
                if !self.has_attr(name) {
                    self.attrs.push((name.to_string(), value.to_string()));
                }
            }
        }
        self
    }

    pub fn child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn maybe_child(mut self, child: Option<impl Into<Node>>) -> Self {
        if let Some(child) = child {
            self.children.push(child.into());
        }
        self
    }

    pub fn children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Node>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|existing| existing == class)
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|(existing, _)| existing == name)
    }

    pub fn attr_value(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// Depth-first search for the first element matching `predicate`, self included.
    pub fn find(&self, predicate: &dyn Fn(&Element) -> bool) -> Option<&Element> {
        if predicate(self) {
            return Some(self);
        }
        self.child_elements()
            .find_map(|child| child.find(predicate))
    }

    pub fn find_by_class(&self, class: &str) -> Option<&Element> {
        self.find(&|element| element.has_class(class))
    }

    pub fn find_by_tag(&self, tag: &str) -> Option<&Element> {
        self.find(&|element| element.tag == tag)
    }

    /// Concatenated text content, excluding sanitized HTML fragments.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            match child {
                Node::Text(text) => out.push_str(text),
                Node::Element(element) => out.push_str(&element.text_content()),
                Node::Html(_) => {}
            }
        }
        out
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        out.push('<');
        out.push_str(self.tag);
        if let Some(key) = &self.key {
            let _ = write!(out, " id=\"{}\"", escape_attribute(key));
        }
        if !self.classes.is_empty() {
            let _ = write!(out, " class=\"{}\"", escape_attribute(&self.classes.join(" ")));
        }
        for (name, value) in &self.attrs {
            let _ = write!(out, " {}=\"{}\"", name, escape_attribute(value));
        }
        out.push('>');

        if VOID_ELEMENTS.contains(&self.tag) {
            return;
        }

        for child in &self.children {
            child.write_html(out);
        }
        let _ = write!(out, "</{}>", self.tag);
    }
}

fn escape_text(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\n' | '\r' | '\t' => escaped.push(' '),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialises_key_classes_and_escaped_attributes() {
        let element = Element::new("div")
            .key("block-1")
            .class("a")
            .class("b")
            .attr("title", "say \"hi\" <now>")
            .child(Node::text("1 < 2 & 3"));

        assert_eq!(
            element.to_html(),
            r#"<div id="block-1" class="a b" title="say &quot;hi&quot; &lt;now&gt;">1 &lt; 2 &amp; 3</div>"#
        );
    }

    #[test]
    fn void_elements_have_no_closing_tag() {
        let img = Element::new("img").attr("src", "/a.png");
        assert_eq!(img.to_html(), r#"<img src="/a.png">"#);
    }

    #[test]
    fn absent_tags_add_no_attributes() {
        let element = Element::new("h1").tags(None);
        assert!(element.attrs.is_empty());
        assert_eq!(element.to_html(), "<h1></h1>");
    }

    #[test]
    fn spread_tags_do_not_override_existing_attributes() {
        let tags: EditorTags = [("data-cslp", "page.a.en-us.title"), ("alt", "spoofed")]
            .into_iter()
            .collect();
        let element = Element::new("img").attr("alt", "Hero").tags(Some(&tags));

        assert_eq!(element.attr_value("alt"), Some("Hero"));
        assert_eq!(element.attr_value("data-cslp"), Some("page.a.en-us.title"));
    }
}
