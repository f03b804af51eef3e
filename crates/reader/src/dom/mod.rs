// ABOUTME: Owned, mutable document tree built from lenient HTML parsing.
// ABOUTME: Converts scraper's parse into an ego_tree of elements and text, resolving relative URLs.

//! DOM utilities for HTML document manipulation.
//!
//! Markup is parsed by html5ever (through `scraper`), which gives browser-grade
//! recovery from unclosed tags and bad nesting. The result is copied into a
//! small owned tree of [`Node`]s that the extractor is free to mutate: nodes
//! are addressed by [`NodeId`] and removed by detaching them.

pub mod brs;
pub mod cleaners;
pub mod scoring;
pub mod serialize;

use ego_tree::{NodeId, NodeRef, Tree};
use once_cell::sync::Lazy;
use regex::bytes::Regex as BytesRegex;
use url::Url;

use crate::error::ParseError;

/// Elements that start a new block. Text never flows across their boundary.
const BLOCK_TAGS: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "body",
    "caption",
    "dd",
    "details",
    "dialog",
    "div",
    "dl",
    "dt",
    "fieldset",
    "figcaption",
    "figure",
    "footer",
    "form",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "hgroup",
    "hr",
    "li",
    "main",
    "menu",
    "nav",
    "ol",
    "p",
    "pre",
    "section",
    "summary",
    "table",
    "tbody",
    "td",
    "tfoot",
    "th",
    "thead",
    "tr",
    "ul",
];

/// Attributes holding a single URL.
const URL_ATTRS: &[&str] = &["href", "src", "poster"];

/// How many leading bytes are inspected for charset declarations and binary data.
const SNIFF_LEN: usize = 1024;

static META_CHARSET_RE: Lazy<BytesRegex> = Lazy::new(|| {
    BytesRegex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?\s*([a-z0-9_\-:.]+)"#)
        .expect("valid meta charset regex")
});

/// A node of the document tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// The tree root. Exactly one per tree.
    Document,
    Element(ElementData),
    Text(String),
}

impl Node {
    pub fn as_element(&self) -> Option<&ElementData> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut ElementData> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Node::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns true if this is an element with the given (lower-case) tag name.
    pub fn is_element(&self, tag: &str) -> bool {
        self.as_element().map_or(false, |el| el.name == tag)
    }
}

/// An element: lower-cased tag name and attributes in source order.
///
/// Attribute names are unique; setting an existing name replaces its value
/// in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    pub name: String,
    attrs: Vec<(String, String)>,
}

impl ElementData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().to_ascii_lowercase(),
            attrs: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .attrs
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name.to_ascii_lowercase(), value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) {
        self.attrs.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    /// Keep only the attributes for which `keep` returns true.
    pub fn retain_attrs(&mut self, mut keep: impl FnMut(&str, &str) -> bool) {
        self.attrs.retain(|(k, v)| keep(k, v));
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Class and id joined by a space, the string matched by the keyword tables.
    pub fn class_and_id(&self) -> String {
        format!(
            "{} {}",
            self.attr("class").unwrap_or(""),
            self.attr("id").unwrap_or("")
        )
    }
}

/// A parsed HTML document that owns its tree.
#[derive(Debug, Clone)]
pub struct Document {
    tree: Tree<Node>,
    base_url: Option<Url>,
}

impl Document {
    /// Parse an HTML string, resolving relative links against `page_url`
    /// (or the document's own `<base href>`, itself resolved against `page_url`).
    pub fn parse(html: &str, page_url: &Url) -> Self {
        let parsed = scraper::Html::parse_document(html);
        let base = document_base(&parsed, page_url);
        let tree = convert(&parsed, Some(&base));
        Self {
            tree,
            base_url: Some(base),
        }
    }

    /// Parse an HTML string without any URL context. Links are left as written.
    pub fn parse_without_base(html: &str) -> Self {
        let parsed = scraper::Html::parse_document(html);
        Self {
            tree: convert(&parsed, None),
            base_url: None,
        }
    }

    /// Decode raw bytes and parse them.
    ///
    /// Fails only when the payload is not text at all: a non-textual content
    /// type, or NUL bytes in the leading bytes when no content type is known.
    pub fn from_bytes(
        body: &[u8],
        content_type: Option<&str>,
        page_url: &Url,
    ) -> Result<Self, ParseError> {
        if let Some(ct) = content_type {
            if !is_textual_content_type(ct) {
                return Err(ParseError::unparsable(
                    page_url.as_str(),
                    "Decode",
                    Some(anyhow::anyhow!("content type {} is not HTML or text", ct)),
                ));
            }
        } else if looks_binary(body) {
            return Err(ParseError::unparsable(
                page_url.as_str(),
                "Decode",
                Some(anyhow::anyhow!("body is binary data")),
            ));
        }

        let html = decode_body(body, content_type);
        Ok(Self::parse(&html, page_url))
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    pub fn tree(&self) -> &Tree<Node> {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut Tree<Node> {
        &mut self.tree
    }

    pub fn root(&self) -> NodeRef<'_, Node> {
        self.tree.root()
    }

    pub fn get(&self, id: NodeId) -> Option<NodeRef<'_, Node>> {
        self.tree.get(id)
    }

    /// Run `f` on the element stored at `id`, if it is an element.
    pub fn update_element(&mut self, id: NodeId, f: impl FnOnce(&mut ElementData)) {
        if let Some(mut node) = self.tree.get_mut(id) {
            if let Some(el) = node.value().as_element_mut() {
                f(el);
            }
        }
    }

    /// All elements attached to the tree, in document order.
    pub fn elements(&self) -> impl Iterator<Item = NodeRef<'_, Node>> {
        self.tree
            .root()
            .descendants()
            .filter(|node| node.value().as_element().is_some())
    }

    /// All elements with the given tag name, in document order.
    pub fn elements_named<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = NodeRef<'a, Node>> {
        self.elements().filter(move |node| node.value().is_element(tag))
    }

    pub fn first_element(&self, tag: &str) -> Option<NodeRef<'_, Node>> {
        self.elements().find(|node| node.value().is_element(tag))
    }

    pub fn body(&self) -> Option<NodeRef<'_, Node>> {
        self.first_element("body")
    }

    /// Detach every listed node (and its subtree) from the tree.
    ///
    /// Ids are collected by the caller beforehand; removing a node whose
    /// ancestor was already removed is harmless.
    pub fn remove_nodes(&mut self, ids: &[NodeId]) {
        for &id in ids {
            if let Some(mut node) = self.tree.get_mut(id) {
                node.detach();
            }
        }
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        self.get(id)
            .map(serialize::outer_html)
            .unwrap_or_default()
    }

    pub fn inner_html(&self, id: NodeId) -> String {
        self.get(id)
            .map(serialize::inner_html)
            .unwrap_or_default()
    }
}

/// Tag name of an element node, `None` for text and the root.
pub fn tag_name<'a>(node: &NodeRef<'a, Node>) -> Option<&'a str> {
    node.value().as_element().map(|el| el.name.as_str())
}

pub fn is_block_tag(tag: &str) -> bool {
    BLOCK_TAGS.contains(&tag)
}

/// Concatenated text of every text node below `node`.
pub fn text_content(node: NodeRef<'_, Node>) -> String {
    let mut out = String::new();
    for desc in node.descendants() {
        if let Some(text) = desc.value().as_text() {
            out.push_str(text);
        }
    }
    out
}

/// Text content with whitespace runs collapsed and ends trimmed.
pub fn inner_text(node: NodeRef<'_, Node>) -> String {
    normalize_spaces(&text_content(node))
}

/// Text owned by `node` itself: its text children plus the text of inline
/// descendants, without descending into block-level children. A skipped
/// block child leaves a word boundary behind.
pub fn direct_text(node: NodeRef<'_, Node>) -> String {
    let mut out = String::new();
    let mut stack: Vec<NodeRef<'_, Node>> = node.children().collect();
    stack.reverse();
    while let Some(current) = stack.pop() {
        match current.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if !is_block_tag(&el.name) => {
                let mut children: Vec<_> = current.children().collect();
                children.reverse();
                stack.extend(children);
            }
            Node::Element(_) => out.push(' '),
            _ => {}
        }
    }
    normalize_spaces(&out)
}

/// Returns true if any descendant of `node` is a block-level element.
pub fn has_block_descendant(node: NodeRef<'_, Node>) -> bool {
    node.descendants()
        .skip(1)
        .any(|desc| tag_name(&desc).map_or(false, is_block_tag))
}

/// Element children of `node`, skipping text.
pub fn element_children<'a>(node: NodeRef<'a, Node>) -> impl Iterator<Item = NodeRef<'a, Node>> {
    node.children()
        .filter(|child| child.value().as_element().is_some())
}

/// Returns true if any ancestor of `node` has one of the given tag names.
pub fn has_ancestor_tag(node: NodeRef<'_, Node>, tags: &[&str]) -> bool {
    node.ancestors()
        .any(|anc| tag_name(&anc).map_or(false, |t| tags.contains(&t)))
}

/// Collapse whitespace runs into single spaces and trim.
pub fn normalize_spaces(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Copy a scraper parse into an owned tree, iteratively to keep deep
/// documents off the call stack.
fn convert(parsed: &scraper::Html, base: Option<&Url>) -> Tree<Node> {
    let mut tree = Tree::new(Node::Document);
    let root_id = tree.root().id();

    let mut stack: Vec<(ego_tree::NodeRef<'_, scraper::Node>, NodeId)> = parsed
        .tree
        .root()
        .children()
        .rev()
        .map(|child| (child, root_id))
        .collect();

    while let Some((source, parent_id)) = stack.pop() {
        let value = match source.value() {
            scraper::Node::Element(el) => {
                let mut data = ElementData::new(el.name());
                for (name, value) in el.attrs() {
                    if data.attr(name).is_none() {
                        data.attrs.push((name.to_ascii_lowercase(), value.to_string()));
                    }
                }
                if let Some(base) = base {
                    resolve_urls(&mut data, base);
                }
                Node::Element(data)
            }
            scraper::Node::Text(text) => Node::Text(String::from(&**text)),
            scraper::Node::Document | scraper::Node::Fragment => {
                for child in source.children().rev() {
                    stack.push((child, parent_id));
                }
                continue;
            }
            _ => continue,
        };

        let Some(mut parent) = tree.get_mut(parent_id) else {
            continue;
        };
        let new_id = parent.append(value).id();
        for child in source.children().rev() {
            stack.push((child, new_id));
        }
    }

    tree
}

/// The first `<base href>` resolved against the page URL, or the page URL.
fn document_base(parsed: &scraper::Html, page_url: &Url) -> Url {
    parsed
        .tree
        .root()
        .descendants()
        .filter_map(|node| match node.value() {
            scraper::Node::Element(el) if el.name() == "base" => el.attr("href"),
            _ => None,
        })
        .next()
        .and_then(|href| page_url.join(href.trim()).ok())
        .unwrap_or_else(|| page_url.clone())
}

fn resolve_urls(data: &mut ElementData, base: &Url) {
    for (name, value) in data.attrs.iter_mut() {
        if URL_ATTRS.contains(&name.as_str()) {
            if let Some(resolved) = resolve_url(value, base) {
                *value = resolved;
            }
        } else if name == "srcset" {
            *value = resolve_srcset(value, base);
        }
    }
}

/// Resolve one URL value. Fragment-only, `javascript:` and `data:` values stay as written.
fn resolve_url(value: &str, base: &Url) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("javascript:") || lower.starts_with("data:") {
        return None;
    }
    base.join(trimmed).ok().map(|u| u.to_string())
}

fn resolve_srcset(value: &str, base: &Url) -> String {
    value
        .split(',')
        .map(str::trim)
        .filter(|candidate| !candidate.is_empty())
        .map(|candidate| {
            let mut parts = candidate.splitn(2, char::is_whitespace);
            let url = parts.next().unwrap_or("");
            let descriptor = parts.next().map(str::trim).unwrap_or("");
            let resolved = resolve_url(url, base).unwrap_or_else(|| url.to_string());
            if descriptor.is_empty() {
                resolved
            } else {
                format!("{} {}", resolved, descriptor)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn is_textual_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    mime.is_empty()
        || mime.starts_with("text/")
        || mime == "application/xhtml+xml"
        || mime == "application/xml"
        || mime.ends_with("+xml")
}

fn looks_binary(body: &[u8]) -> bool {
    // UTF-16 byte order marks: text with embedded NULs.
    if body.starts_with(&[0xFF, 0xFE]) || body.starts_with(&[0xFE, 0xFF]) {
        return false;
    }
    body.iter().take(SNIFF_LEN).any(|&b| b == 0)
}

/// Decode body bytes using the header charset, a `<meta charset>` in the
/// leading bytes, or detection.
fn decode_body(body: &[u8], content_type: Option<&str>) -> String {
    let declared = content_type
        .and_then(extract_charset)
        .or_else(|| sniff_meta_charset(body));

    if let Some(charset) = declared {
        if let Some(encoding) = encoding_rs::Encoding::for_label(charset.as_bytes()) {
            let (decoded, _, _) = encoding.decode(body);
            return decoded.into_owned();
        }
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(body, true);
    let encoding = detector.guess(None, true);
    let (decoded, _, _) = encoding.decode(body);
    decoded.into_owned()
}

/// Extract the charset value from a Content-Type header.
fn extract_charset(content_type: &str) -> Option<String> {
    let lower = content_type.to_lowercase();
    for part in lower.split(';') {
        let trimmed = part.trim();
        if let Some(charset) = trimmed.strip_prefix("charset=") {
            let charset = charset.trim_matches('"').trim_matches('\'');
            return Some(charset.to_string());
        }
    }
    None
}

fn sniff_meta_charset(body: &[u8]) -> Option<String> {
    let head = &body[..body.len().min(SNIFF_LEN)];
    META_CHARSET_RE
        .captures(head)
        .and_then(|caps| caps.get(1))
        .map(|m| String::from_utf8_lossy(m.as_bytes()).to_lowercase())
}
