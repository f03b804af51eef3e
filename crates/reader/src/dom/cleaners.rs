// ABOUTME: Tree cleaners run before scoring and on the assembled article.
// ABOUTME: Removes noise tags, hidden and unlikely nodes, conditional junk, spacer images and empty containers.

use ego_tree::{NodeId, NodeRef};
use once_cell::sync::Lazy;
use regex::Regex;

use super::brs::brs_to_ps;
use super::scoring::{count_commas, get_weight, link_density};
use super::{has_ancestor_tag, inner_text, tag_name, Document, Node};

/// Removed with their content before anything is scored.
const NOISE_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "link", "meta", "iframe", "frame", "frameset",
    "object", "embed", "applet", "svg", "canvas",
];

/// ARIA roles of page chrome.
const NOISE_ROLES: &[&str] = &[
    "menu",
    "menubar",
    "complementary",
    "navigation",
    "alert",
    "alertdialog",
    "dialog",
];

/// Never part of an article body.
const CLEAN_TAGS: &[&str] = &[
    "form", "fieldset", "footer", "aside", "object", "embed", "input", "textarea", "select",
    "button", "nav",
];

/// Checked with the content heuristics, in this order.
const CONDITIONAL_TAGS: &[&str] = &["form", "table", "ul", "ol", "div", "section"];

const PRESENTATIONAL_ATTRS: &[&str] = &[
    "align",
    "background",
    "bgcolor",
    "border",
    "cellpadding",
    "cellspacing",
    "frame",
    "hspace",
    "rules",
    "style",
    "valign",
    "vspace",
];

/// Size attributes are dropped from these only.
const SIZED_TAGS: &[&str] = &["table", "th", "td", "hr", "pre"];

/// Removed when they hold no text and no media.
const EMPTY_TAGS: &[&str] = &[
    "p", "div", "section", "span", "h1", "h2", "h3", "h4", "h5", "h6", "li", "ul", "ol",
    "blockquote", "article", "header",
];

/// Descendants that keep an otherwise empty container alive.
const MEDIA_TAGS: &[&str] = &["img", "picture", "figure", "video", "audio", "source", "table"];

static UNLIKELY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)-ad-|ai2html|banner|breadcrumbs|combx|comment|community|cover-wrap|disqus|extra|footer|gdpr|header|legends|menu|related|remark|replies|rss|shoutbox|sidebar|skyscraper|social|sponsor|supplemental|ad-break|agegate|pagination|pager|popup|yom-remote")
        .expect("valid unlikely regex")
});
static MAYBE_CANDIDATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)and|article|body|column|content|main|mathjax|shadow")
        .expect("valid maybe candidate regex")
});
static BYLINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)byline|author|dateline|writtenby|p-author").expect("valid byline regex")
});
static HIDDEN_STYLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)display\s*:\s*none|visibility\s*:\s*hidden").expect("valid hidden style regex")
});
static SPACER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)transparent|spacer|blank").expect("valid spacer regex"));

/// Strip page chrome from the whole document ahead of scoring.
///
/// Returns the text of the in-page byline when one was found; that node is
/// removed along with the rest.
pub fn prepare_document(doc: &mut Document) -> Option<String> {
    let noise: Vec<NodeId> = doc
        .elements()
        .filter(|n| tag_name(n).map_or(false, |t| NOISE_TAGS.contains(&t)))
        .map(|n| n.id())
        .collect();
    doc.remove_nodes(&noise);

    let hidden: Vec<NodeId> = doc
        .elements()
        .filter(|n| is_hidden(*n) || has_noise_role(*n))
        .map(|n| n.id())
        .collect();
    doc.remove_nodes(&hidden);

    let mut byline = None;
    let mut doomed = Vec::new();
    for node in doc.elements() {
        if byline.is_none() {
            if let Some(text) = byline_text(node) {
                byline = Some(text);
                doomed.push(node.id());
                continue;
            }
        }
        if is_unlikely_candidate(node) {
            doomed.push(node.id());
        }
    }
    doc.remove_nodes(&doomed);

    brs_to_ps(doc);
    byline
}

fn is_hidden(node: NodeRef<'_, Node>) -> bool {
    let Some(el) = node.value().as_element() else {
        return false;
    };
    if matches!(el.name.as_str(), "html" | "body") {
        return false;
    }
    el.attr("hidden").is_some()
        || el
            .attr("aria-hidden")
            .map_or(false, |v| v.trim().eq_ignore_ascii_case("true"))
        || el.attr("style").map_or(false, |s| HIDDEN_STYLE_RE.is_match(s))
}

fn has_noise_role(node: NodeRef<'_, Node>) -> bool {
    node.value()
        .as_element()
        .and_then(|el| el.attr("role"))
        .map_or(false, |role| NOISE_ROLES.contains(&role.trim().to_ascii_lowercase().as_str()))
}

/// Check if element should be stripped as unlikely candidate
pub fn is_unlikely_candidate(node: NodeRef<'_, Node>) -> bool {
    let Some(el) = node.value().as_element() else {
        return false;
    };
    if matches!(el.name.as_str(), "html" | "body" | "a") {
        return false;
    }

    let class_and_id = el.class_and_id();
    if class_and_id.trim().is_empty() {
        return false;
    }
    if !UNLIKELY_RE.is_match(&class_and_id) || MAYBE_CANDIDATE_RE.is_match(&class_and_id) {
        return false;
    }

    !has_ancestor_tag(node, &["table", "code"])
}

/// The trimmed text of `node` when it looks like an author line.
fn byline_text(node: NodeRef<'_, Node>) -> Option<String> {
    let el = node.value().as_element()?;
    let rel_author = el.attr("rel").map_or(false, |r| r == "author");
    let itemprop_author = el.attr("itemprop").map_or(false, |p| p.contains("author"));
    if !(rel_author || itemprop_author || BYLINE_RE.is_match(&el.class_and_id())) {
        return None;
    }

    let text = inner_text(node);
    let len = text.chars().count();
    (len > 0 && len < 100).then_some(text)
}

/// Clean the assembled article below `root`.
///
/// `title` is the resolved article title; the first `h1`/`h2` repeating it
/// is dropped.
pub fn clean_article(doc: &mut Document, root: NodeId, title: &str) {
    let junk = collect_below(doc, root, |n| {
        tag_name(&n).map_or(false, |t| CLEAN_TAGS.contains(&t))
    });
    doc.remove_nodes(&junk);

    let headers = headers_to_remove(doc, root, title);
    doc.remove_nodes(&headers);

    for tag in CONDITIONAL_TAGS {
        let doomed = collect_below(doc, root, |n| {
            n.value().is_element(tag) && should_remove_conditionally(n)
        });
        doc.remove_nodes(&doomed);
    }

    let images = collect_below(doc, root, |n| {
        n.value().is_element("img") && should_remove_image(n)
    });
    doc.remove_nodes(&images);

    strip_presentational_attrs(doc, root);

    loop {
        let empty = collect_below(doc, root, is_empty_container);
        if empty.is_empty() {
            break;
        }
        doc.remove_nodes(&empty);
    }
}

fn collect_below(
    doc: &Document,
    root: NodeId,
    mut pred: impl FnMut(NodeRef<'_, Node>) -> bool,
) -> Vec<NodeId> {
    let Some(root) = doc.get(root) else {
        return Vec::new();
    };
    root.descendants()
        .skip(1)
        .filter(|n| pred(*n))
        .map(|n| n.id())
        .collect()
}

fn headers_to_remove(doc: &Document, root: NodeId, title: &str) -> Vec<NodeId> {
    let wanted = title.trim().to_lowercase();
    let mut title_removed = wanted.is_empty();
    collect_below(doc, root, |n| {
        let Some(el) = n.value().as_element() else {
            return false;
        };
        if el.name != "h1" && el.name != "h2" {
            return false;
        }
        if get_weight(el) < 0.0 {
            return true;
        }
        if !title_removed && inner_text(n).to_lowercase() == wanted {
            title_removed = true;
            return true;
        }
        false
    })
}

fn is_data_table(node: NodeRef<'_, Node>) -> bool {
    node.value().is_element("table")
        && (node
            .value()
            .as_element()
            .map_or(false, |el| el.attr("summary").is_some())
            || node.descendants().any(|d| {
                matches!(tag_name(&d), Some("th") | Some("caption") | Some("thead"))
            }))
}

fn count_tags(node: NodeRef<'_, Node>, tags: &[&str]) -> usize {
    node.descendants()
        .skip(1)
        .filter(|d| tag_name(d).map_or(false, |t| tags.contains(&t)))
        .count()
}

/// Content heuristics for tables, lists and generic containers.
pub fn should_remove_conditionally(node: NodeRef<'_, Node>) -> bool {
    let Some(el) = node.value().as_element() else {
        return false;
    };
    if is_data_table(node)
        || node.ancestors().any(is_data_table)
        || has_ancestor_tag(node, &["code"])
    {
        return false;
    }

    let weight = get_weight(el);
    if weight < 0.0 {
        return true;
    }

    let text = inner_text(node);
    if count_commas(&text) >= 10 {
        return false;
    }

    let is_list = matches!(el.name.as_str(), "ul" | "ol");
    let in_figure = has_ancestor_tag(node, &["figure"]);
    let p = count_tags(node, &["p"]) as f64;
    let img = count_tags(node, &["img"]) as f64;
    let li = count_tags(node, &["li"]) as f64 - 100.0;
    let input = count_tags(node, &["input"]) as f64;
    let embeds = count_tags(node, &["object", "embed", "iframe"]);
    let content_length = text.chars().count();
    let density = link_density(node);

    (img > 1.0 && p / img < 0.5 && !in_figure)
        || (!is_list && li > p)
        || (input > (p / 3.0).floor())
        || (!is_list && content_length < 25 && (img == 0.0 || img > 2.0) && !in_figure)
        || (!is_list && weight < 25.0 && density > 0.2)
        || (weight >= 25.0 && density > 0.5)
        || (embeds == 1 && content_length < 75)
        || embeds > 1
}

/// Check if image should be removed (spacer or too small)
pub fn should_remove_image(node: NodeRef<'_, Node>) -> bool {
    let Some(el) = node.value().as_element() else {
        return false;
    };
    match el.attr("src") {
        Some(src) if SPACER_RE.is_match(src) => return true,
        None if el.attr("srcset").is_none() => return true,
        _ => {}
    }

    let size = |name: &str| {
        el.attr(name)
            .and_then(|v| v.trim().trim_end_matches("px").parse::<i32>().ok())
            .unwrap_or(20)
    };
    size("height") < 10 || size("width") < 10
}

fn strip_presentational_attrs(doc: &mut Document, root: NodeId) {
    let ids: Vec<NodeId> = match doc.get(root) {
        Some(root) => root.descendants().map(|n| n.id()).collect(),
        None => return,
    };
    for id in ids {
        doc.update_element(id, |el| {
            let sized = SIZED_TAGS.contains(&el.name.as_str());
            el.retain_attrs(|name, _| {
                let name = name.to_ascii_lowercase();
                !(PRESENTATIONAL_ATTRS.contains(&name.as_str())
                    || name.starts_with("on")
                    || (sized && (name == "width" || name == "height")))
            });
        });
    }
}

fn is_empty_container(node: NodeRef<'_, Node>) -> bool {
    let Some(tag) = tag_name(&node) else {
        return false;
    };
    EMPTY_TAGS.contains(&tag)
        && inner_text(node).is_empty()
        && !node
            .descendants()
            .skip(1)
            .any(|d| tag_name(&d).map_or(false, |t| MEDIA_TAGS.contains(&t)))
}
