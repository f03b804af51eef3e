// ABOUTME: Article extraction from a parsed document: metadata, readability content and derived fields.
// ABOUTME: Produces the final sanitized Article or an ExtractionFailed error.

//! Content extraction module.
//!
//! Submodules:
//! - `content`: the readability pass that locates and cleans the article body.
//! - `metadata`: title, byline, dates and other fields from meta tags and headings.
//! - `json_ld`: schema.org article data embedded in the page.

pub mod content;
pub mod json_ld;
pub mod metadata;

use chrono::SecondsFormat;

use crate::dom::Document;
use crate::error::ParseError;
use crate::formats::{excerpt_from_content, html_to_text, reading_time, sanitize_html, word_count};
use crate::options::ExtractorOptions;
use crate::result::Article;

use self::content::grab_article;
use self::metadata::{detect_direction, extract_metadata};

/// Extract the article of `document`. `url` is reported on the result and
/// on errors.
///
/// A page without any title source, or whose content has no text, fails
/// with `ExtractionFailed`. The document is not modified; extracting twice
/// yields identical output.
pub fn extract(
    document: &Document,
    url: &str,
    opts: &ExtractorOptions,
) -> Result<Article, ParseError> {
    let meta = extract_metadata(document);
    let title = meta.title.as_deref().map(str::trim).unwrap_or("").to_string();
    if title.is_empty() {
        return Err(ParseError::extraction_failed(
            url,
            "Extract",
            Some(anyhow::anyhow!("page has no title")),
        ));
    }

    let grabbed = grab_article(document, &title, opts)
        .map_err(|e| ParseError::extraction_failed(url, "Extract", Some(e)))?;

    let content = sanitize_html(&grabbed.html);
    let text = html_to_text(&content);
    if text.is_empty() {
        return Err(ParseError::extraction_failed(
            url,
            "Extract",
            Some(anyhow::anyhow!("sanitized article has no text")),
        ));
    }

    let words = word_count(&text);
    let excerpt = non_empty(meta.excerpt)
        .or_else(|| excerpt_from_content(&content, opts.excerpt_max_chars));

    Ok(Article {
        url: url.to_string(),
        title,
        byline: non_empty(meta.byline).or_else(|| non_empty(grabbed.byline)),
        excerpt: non_empty(excerpt),
        length: text.chars().count(),
        word_count: words,
        site_name: non_empty(meta.site_name),
        published_time: meta
            .published_time
            .map(|d| d.to_rfc3339_opts(SecondsFormat::Secs, true)),
        reading_time: reading_time(words, opts.words_per_minute),
        language: meta.language,
        direction: meta.direction.or_else(|| Some(detect_direction(&text))),
        content,
    })
}

/// Trimmed value, or `None` when nothing is left.
fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(Some("  x ".to_string())), Some("x".to_string()));
        assert_eq!(non_empty(Some("   ".to_string())), None);
        assert_eq!(non_empty(None), None);
    }

    #[test]
    fn test_extract_fills_derived_fields() {
        let paragraph = "<p>Rivers bend, lakes settle, and the valley keeps its quiet shape through every season of the year.</p>";
        let html = format!(
            r#"<html lang="en"><head><meta property="og:site_name" content=" Valley Notes "></head><body><h1>The Valley</h1><div class="post-body">{}</div></body></html>"#,
            paragraph.repeat(6)
        );
        let doc = Document::parse_without_base(&html);
        let article = extract(&doc, "https://example.com/valley", &ExtractorOptions::default())
            .unwrap();

        assert_eq!(article.title, "The Valley");
        assert_eq!(article.site_name.as_deref(), Some("Valley Notes"));
        assert_eq!(article.language.as_deref(), Some("en"));
        assert_eq!(article.direction.as_deref(), Some("ltr"));
        assert_eq!(article.url, "https://example.com/valley");
        assert_eq!(article.word_count, 6 * 17);
        assert_eq!(article.reading_time, 1);
        assert_eq!(
            article.excerpt.as_deref(),
            Some("Rivers bend, lakes settle, and the valley keeps its quiet shape through every season of the year.")
        );
        assert!(article.length > 0);
    }

    #[test]
    fn test_extract_reports_failure_as_expected_outcome() {
        let doc = Document::parse_without_base("<html><body><p>tiny</p></body></html>");
        let err = extract(&doc, "https://example.com/", &ExtractorOptions::default()).unwrap_err();
        assert!(err.is_extraction_failed());
        assert!(err.is_expected());
        assert_eq!(err.op, "Extract");
    }

    #[test]
    fn test_extract_rejects_untitled_page() {
        let paragraph = "<p>Rivers bend, lakes settle, and the valley keeps its quiet shape through every season of the year.</p>";
        let html = format!(
            "<html><head></head><body><div>{}</div></body></html>",
            paragraph.repeat(10)
        );
        let doc = Document::parse_without_base(&html);
        let err = extract(&doc, "https://example.com/x", &ExtractorOptions::default()).unwrap_err();

        assert!(err.is_extraction_failed());
        assert_eq!(err.http_status(), 422);
        assert_eq!(err.url, "https://example.com/x");
    }
}
