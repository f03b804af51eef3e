// ABOUTME: Readability article grab: preprocess, score, pick the winner, absorb siblings, clean.
// ABOUTME: Works on a clone so the caller's document is never mutated.

use anyhow::anyhow;
use tracing::debug;

use crate::dom::cleaners::{clean_article, prepare_document};
use crate::dom::scoring::{find_top_candidate, merge_siblings, score_content};
use crate::dom::{inner_text, tag_name, Document};
use crate::options::ExtractorOptions;

/// The article body found by the readability pass, before sanitizing.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedContent {
    /// Serialized `<div>` holding the article nodes.
    pub html: String,
    /// Author line found in the page body, removed from `html`.
    pub byline: Option<String>,
}

/// Locate and clean the main article of `document`.
///
/// `title` is the resolved page title; a heading repeating it is dropped
/// from the content. Fails when no candidate reaches `opts.min_score` or
/// nothing is left after cleaning.
pub fn grab_article(
    document: &Document,
    title: &str,
    opts: &ExtractorOptions,
) -> anyhow::Result<ExtractedContent> {
    let mut doc = document.clone();
    let byline = prepare_document(&mut doc);

    let scores = score_content(&doc, opts);
    let (top, top_score) =
        find_top_candidate(&doc, &scores).ok_or_else(|| anyhow!("no scorable content"))?;

    debug!(
        tag = doc.get(top).as_ref().and_then(tag_name).unwrap_or(""),
        score = top_score,
        candidates = scores.len(),
        "top candidate"
    );

    if top_score < opts.min_score {
        return Err(anyhow!(
            "top candidate scored {:.1}, below the minimum of {:.1}",
            top_score,
            opts.min_score
        ));
    }

    let container = merge_siblings(&mut doc, top, top_score, &scores, opts);
    clean_article(&mut doc, container, title);

    let empty = doc.get(container).map_or(true, |n| inner_text(n).is_empty());
    if empty {
        return Err(anyhow!("article is empty after cleaning"));
    }

    Ok(ExtractedContent {
        html: doc.outer_html(container),
        byline,
    })
}
