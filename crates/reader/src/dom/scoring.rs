// ABOUTME: Readability scoring for content extraction on the owned document tree.
// ABOUTME: Implements score_content, find_top_candidate and merge_siblings over a NodeId score table.

use ego_tree::{NodeId, NodeRef};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use super::{
    direct_text, element_children, has_block_descendant, inner_text, tag_name, Document,
    ElementData, Node,
};
use crate::options::ExtractorOptions;

pub static POSITIVE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)article|body|content|entry|hentry|h-entry|main|page|pagination|post|text|blog|story")
        .expect("valid positive regex")
});
pub static NEGATIVE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)-ad-|hidden|^hid$| hid$| hid |^hid |banner|combx|comment|com-|contact|footer|gdpr|masthead|media|meta|outbrain|promo|related|scroll|share|shoutbox|sidebar|skyscraper|sponsor|shopping|tags|widget")
        .expect("valid negative regex")
});

/// Class/id keyword table: every entry that matches adds its weight, once
/// for the class and once for the id.
static WEIGHT_TABLE: Lazy<Vec<(&'static Regex, f64)>> =
    Lazy::new(|| vec![(&*POSITIVE_RE, 25.0), (&*NEGATIVE_RE, -25.0)]);

static SENTENCE_END_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.( |$)").expect("valid sentence end regex"));

/// Elements whose whole text is scored as one paragraph.
const SCORED_TAGS: &[&str] = &["p", "pre", "td", "h2", "h3", "h4", "h5", "h6", "blockquote"];

/// Containers that are scored for their own text.
const CONTAINER_TAGS: &[&str] = &["div", "article", "section"];

/// Score storage using NodeId as key
pub type NodeScores = HashMap<NodeId, f64>;

/// Class/id weight of an element from the keyword table.
pub fn get_weight(el: &ElementData) -> f64 {
    let mut weight = 0.0;
    for value in [el.attr("class"), el.attr("id")].into_iter().flatten() {
        if value.is_empty() {
            continue;
        }
        for (re, w) in WEIGHT_TABLE.iter() {
            if re.is_match(value) {
                weight += w;
            }
        }
    }
    weight
}

/// Starting score of a candidate before any paragraph contributes.
fn tag_base_score(tag: &str) -> f64 {
    match tag {
        "div" => 5.0,
        "pre" | "td" | "blockquote" => 3.0,
        "address" | "ol" | "ul" | "dl" | "dd" | "dt" | "li" | "form" => -3.0,
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "th" => -5.0,
        _ => 0.0,
    }
}

fn initial_score(el: &ElementData) -> f64 {
    tag_base_score(&el.name) + get_weight(el)
}

/// Ratio of anchor text to all text below `node`. Fragment links count 0.3.
pub fn link_density(node: NodeRef<'_, Node>) -> f64 {
    let total = inner_text(node).chars().count();
    if total == 0 {
        return 0.0;
    }

    let mut link_len = 0.0;
    for desc in node.descendants() {
        let Some(el) = desc.value().as_element() else {
            continue;
        };
        if el.name != "a" {
            continue;
        }
        let coefficient = match el.attr("href") {
            Some(href) if href.trim_start().starts_with('#') => 0.3,
            _ => 1.0,
        };
        link_len += inner_text(desc).chars().count() as f64 * coefficient;
    }

    link_len / total as f64
}

/// Count commas in text, including the CJK and Arabic forms.
pub fn count_commas(text: &str) -> usize {
    text.chars()
        .filter(|c| matches!(c, ',' | '，' | '、' | '،' | '﹐' | '︐' | '︑' | '⸴' | '⸲'))
        .count()
}

/// Score of a single paragraph of text.
pub fn paragraph_score(text: &str) -> f64 {
    let len = text.chars().count();
    1.0 + count_commas(text) as f64 + (len / 100).min(3) as f64
}

/// Returns true if `.` is followed by a space or ends the text.
pub fn has_sentence_end(text: &str) -> bool {
    SENTENCE_END_RE.is_match(text)
}

/// The text a node contributes as a paragraph, with the node that receives
/// the full score.
fn paragraph_of<'a>(node: NodeRef<'a, Node>) -> Option<(String, NodeRef<'a, Node>)> {
    let tag = tag_name(&node)?;
    if SCORED_TAGS.contains(&tag) {
        return Some((inner_text(node), node.parent()?));
    }
    if CONTAINER_TAGS.contains(&tag) {
        if has_block_descendant(node) {
            // Loose text between block children, rooted at the container itself.
            return Some((direct_text(node), node));
        }
        return Some((inner_text(node), node.parent()?));
    }
    None
}

/// Score every candidate of the document.
///
/// Each paragraph adds its score to up to `max_ancestor_depth` levels: the
/// first level gets it whole, the second half, level `n` beyond that
/// `score / (n * 3)`. Candidates are then scaled by `1 - link_density`.
pub fn score_content(doc: &Document, opts: &ExtractorOptions) -> NodeScores {
    let mut scores = NodeScores::new();

    for node in doc.elements() {
        let Some((text, first_level)) = paragraph_of(node) else {
            continue;
        };
        if text.chars().count() < opts.min_paragraph_len {
            continue;
        }
        let score = paragraph_score(&text);

        let mut level = 0usize;
        let mut current = Some(first_level);
        while let Some(ancestor) = current {
            if level >= opts.max_ancestor_depth {
                break;
            }
            let Some(el) = ancestor.value().as_element() else {
                break;
            };
            if el.name == "html" {
                break;
            }

            let divider = match level {
                0 => 1.0,
                1 => 2.0,
                n => n as f64 * 3.0,
            };
            let entry = scores
                .entry(ancestor.id())
                .or_insert_with(|| initial_score(el));
            *entry += score / divider;

            level += 1;
            current = ancestor.parent();
        }
    }

    for (id, score) in scores.iter_mut() {
        if let Some(node) = doc.get(*id) {
            *score *= 1.0 - link_density(node);
        }
    }

    scores
}

/// Pick the highest scoring candidate in document order.
///
/// Only a strictly greater score replaces the current best, so the earliest
/// node wins ties. When the winner is the only element child of its parent
/// the parent is taken instead, up to (not including) `body`.
pub fn find_top_candidate(doc: &Document, scores: &NodeScores) -> Option<(NodeId, f64)> {
    let mut best: Option<(NodeId, f64)> = None;
    for node in doc.elements() {
        if node.value().is_element("html") {
            continue;
        }
        let Some(&score) = scores.get(&node.id()) else {
            continue;
        };
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((node.id(), score));
        }
    }

    let (mut top, top_score) = best?;
    loop {
        let Some(node) = doc.get(top) else {
            break;
        };
        let Some(parent) = node.parent() else {
            break;
        };
        match tag_name(&parent) {
            Some("body") | Some("html") | None => break,
            _ => {}
        }
        if element_children(parent).count() != 1 {
            break;
        }
        top = parent.id();
    }

    Some((top, top_score))
}

/// Collect the winner and the siblings that belong with it into a fresh
/// `div`, in document order. Returns the id of that (detached) container.
///
/// When the winner is `body`, its children form the article directly.
pub fn merge_siblings(
    doc: &mut Document,
    top: NodeId,
    top_score: f64,
    scores: &NodeScores,
    opts: &ExtractorOptions,
) -> NodeId {
    let absorbed: Vec<NodeId> = match doc.get(top) {
        Some(node) if node.value().is_element("body") => node.children().map(|c| c.id()).collect(),
        Some(node) => match node.parent() {
            Some(parent) => {
                let threshold = 10f64.max(top_score * opts.sibling_score_ratio);
                let top_class = node
                    .value()
                    .as_element()
                    .and_then(|el| el.attr("class"))
                    .unwrap_or("")
                    .to_string();
                element_children(parent)
                    .filter(|sibling| {
                        sibling.id() == top
                            || sibling_belongs(*sibling, &top_class, top_score, threshold, scores)
                    })
                    .map(|sibling| sibling.id())
                    .collect()
            }
            None => vec![top],
        },
        None => Vec::new(),
    };

    let tree = doc.tree_mut();
    let container = tree.orphan(Node::Element(ElementData::new("div"))).id();
    for id in absorbed {
        if let Some(mut node) = tree.get_mut(container) {
            node.append_id(id);
        }
    }
    container
}

fn sibling_belongs(
    sibling: NodeRef<'_, Node>,
    top_class: &str,
    top_score: f64,
    threshold: f64,
    scores: &NodeScores,
) -> bool {
    let Some(el) = sibling.value().as_element() else {
        return false;
    };

    let mut bonus = 0.0;
    if let Some(class) = el.attr("class") {
        if !class.is_empty() && class == top_class {
            bonus += top_score * 0.2;
        }
    }
    if let Some(score) = scores.get(&sibling.id()) {
        if score + bonus >= threshold {
            return true;
        }
    }

    if el.name != "p" {
        return false;
    }
    let density = link_density(sibling);
    let text = inner_text(sibling);
    let len = text.chars().count();
    if len > 80 && density < 0.25 {
        return true;
    }
    len > 0 && len <= 80 && density == 0.0 && has_sentence_end(&text)
}
