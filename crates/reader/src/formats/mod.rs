// ABOUTME: Sanitizing and measuring of the extracted article HTML.
// ABOUTME: Applies the ammonia article policy and derives text, word count, reading time and excerpt.

//! Output post-processing.
//!
//! The article fragment produced by the extractor is passed through an
//! ammonia allow-list before it leaves the crate. Derived fields (length,
//! word count, reading time, fallback excerpt) are computed from the
//! sanitized fragment so they describe exactly what the caller receives.

use ego_tree::iter::Edge;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::dom::{is_block_tag, inner_text, normalize_spaces, Document, Node};

/// Tags kept in article output.
const ALLOWED_TAGS: &[&str] = &[
    "a", "abbr", "article", "audio", "b", "blockquote", "br", "caption", "cite", "code", "dd",
    "del", "details", "div", "dl", "dt", "em", "figcaption", "figure", "h1", "h2", "h3", "h4",
    "h5", "h6", "hr", "i", "img", "ins", "kbd", "li", "mark", "ol", "p", "picture", "pre", "q",
    "s", "section", "small", "source", "span", "strong", "sub", "summary", "sup", "table",
    "tbody", "td", "tfoot", "th", "thead", "time", "tr", "u", "ul", "video",
];

/// Removed together with everything inside them.
const CONTENT_STRIPPED_TAGS: &[&str] = &[
    "script", "style", "iframe", "noscript", "object", "embed", "frame", "frameset", "applet",
    "template", "textarea", "title",
];

static SENTENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?。！？](\s|$)").expect("valid sentence regex"));

/// Sanitize HTML using the ammonia article policy.
///
/// Allowed URL schemes are http, https and mailto. Relative URLs pass through
/// and `rel` is not rewritten.
pub fn sanitize_html(html: &str) -> String {
    let mut builder = ammonia::Builder::new();
    builder
        .tags(ALLOWED_TAGS.iter().copied().collect())
        .clean_content_tags(CONTENT_STRIPPED_TAGS.iter().copied().collect())
        .link_rel(None);

    builder.add_tag_attributes("a", &["href", "title"]);
    builder.add_tag_attributes("img", &["src", "alt", "width", "height", "srcset", "sizes"]);
    builder.add_tag_attributes("source", &["src", "srcset", "sizes", "type", "media"]);
    builder.add_tag_attributes("video", &["src", "poster", "controls", "width", "height"]);
    builder.add_tag_attributes("audio", &["src", "controls"]);
    builder.add_tag_attributes("time", &["datetime"]);
    builder.add_tag_attributes("th", &["colspan", "rowspan", "scope"]);
    builder.add_tag_attributes("td", &["colspan", "rowspan"]);

    builder
        .url_schemes(["http", "https", "mailto"].iter().copied().collect())
        .clean(html)
        .to_string()
}

/// Convert HTML to plain text.
///
/// Block boundaries and `<br>` become whitespace; whitespace runs collapse
/// to single spaces and the ends are trimmed.
pub fn html_to_text(html: &str) -> String {
    let doc = Document::parse_without_base(html);
    let mut raw = String::new();
    for edge in doc.root().traverse() {
        match edge {
            Edge::Open(node) => match node.value() {
                Node::Text(text) => raw.push_str(text),
                Node::Element(el) if el.name == "br" || is_block_tag(&el.name) => raw.push(' '),
                _ => {}
            },
            Edge::Close(node) => {
                if let Node::Element(el) = node.value() {
                    if is_block_tag(&el.name) {
                        raw.push(' ');
                    }
                }
            }
        }
    }
    normalize_spaces(&raw)
}

/// Whitespace-separated tokens of `text`.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Minutes to read `words` words, rounded up.
pub fn reading_time(words: usize, words_per_minute: usize) -> u32 {
    words.div_ceil(words_per_minute.max(1)) as u32
}

/// The first sentence of the first paragraph with text, at most `max_chars` long.
pub fn excerpt_from_content(html: &str, max_chars: usize) -> Option<String> {
    let doc = Document::parse_without_base(html);
    let text = doc
        .elements_named("p")
        .map(inner_text)
        .find(|t| !t.is_empty())?;

    let sentence = match SENTENCE_RE.find(&text) {
        Some(m) => text[..m.start() + first_char_len(&text[m.start()..])].to_string(),
        None => text,
    };
    Some(truncate_chars(&sentence, max_chars))
}

fn first_char_len(s: &str) -> usize {
    s.chars().next().map_or(0, char::len_utf8)
}

/// Cut `s` to at most `max_chars` characters, preferring a word boundary.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let cut: String = s.chars().take(max_chars).collect();
    match cut.rfind(char::is_whitespace) {
        Some(idx) if idx > 0 => cut[..idx].trim_end().to_string(),
        _ => cut,
    }
}
