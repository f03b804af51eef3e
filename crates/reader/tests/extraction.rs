// ABOUTME: End-to-end extraction tests over HTML fixtures without any network access.
// ABOUTME: Covers title, metadata, sanitizing guarantees, reading time, idempotence and failure cases.

use cleanread_reader::{extract, Client, Document, ErrorCode, ExtractorOptions};
use pretty_assertions::assert_eq;
use std::fs;
use url::Url;

/// Load an HTML snapshot from the fixtures directory.
fn load_html_fixture(name: &str) -> String {
    let path = format!(
        "{}/tests/fixtures/{}.html",
        env!("CARGO_MANIFEST_DIR"),
        name
    );
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("failed to read {}: {}", path, e))
}

fn client() -> Client {
    Client::builder().build().expect("client builds")
}

const FIELD_NOTES_URL: &str = "https://fieldnotes.example/2023/dry-stone-wall";

#[test]
fn article_fixture_fields() {
    let html = load_html_fixture("article");
    let article = client().parse_html(&html, FIELD_NOTES_URL).unwrap();

    assert_eq!(article.title, "Building a Dry Stone Wall");
    assert_eq!(article.byline.as_deref(), Some("Mara Ellison"));
    assert_eq!(article.site_name.as_deref(), Some("Field Notes"));
    assert_eq!(
        article.published_time.as_deref(),
        Some("2023-04-12T07:30:00Z")
    );
    assert_eq!(
        article.excerpt.as_deref(),
        Some("A season spent learning an old craft on a hillside farm.")
    );
    assert_eq!(article.language.as_deref(), Some("en"));
    assert_eq!(article.direction.as_deref(), Some("ltr"));
    assert_eq!(article.url, FIELD_NOTES_URL);
}

#[test]
fn article_fixture_keeps_body_and_drops_boilerplate() {
    let html = load_html_fixture("article");
    let article = client().parse_html(&html, FIELD_NOTES_URL).unwrap();
    let content = &article.content;

    assert!(content.contains("The farm sits on a steep hillside"));
    assert!(content.contains("which is all a waller can ask"));
    assert!(content.contains(r#"src="https://fieldnotes.example/images/wall.jpg""#));
    assert!(content.contains(r#"href="https://fieldnotes.example/notes/walling""#));
    assert!(content.contains("<figcaption>"));

    for boilerplate in ["Great post", "Hedge laying", "Archive", "Copyright", "About us"] {
        assert!(
            !content.contains(boilerplate),
            "{:?} leaked into content",
            boilerplate
        );
    }
}

#[test]
fn output_never_contains_foreign_document_tags() {
    let html = load_html_fixture("article");
    let article = client().parse_html(&html, FIELD_NOTES_URL).unwrap();

    let lowered = article.content.to_lowercase();
    for tag in ["<script", "<style", "<iframe"] {
        assert!(!lowered.contains(tag), "found {} in content", tag);
    }
    assert!(!lowered.contains("trackscroll"));
    assert!(!lowered.contains("analytics"));
}

#[test]
fn reading_time_follows_word_count() {
    let html = load_html_fixture("article");
    let article = client().parse_html(&html, FIELD_NOTES_URL).unwrap();

    assert!(article.word_count > 0);
    assert!(article.reading_time >= 1);
    assert_eq!(
        article.reading_time as usize,
        article.word_count.div_ceil(200)
    );
    assert!(article.length > article.word_count);
}

#[test]
fn extraction_is_idempotent() {
    let html = load_html_fixture("article");
    let base = Url::parse(FIELD_NOTES_URL).unwrap();
    let document = Document::parse(&html, &base);
    let opts = ExtractorOptions::default();

    let first = extract(&document, FIELD_NOTES_URL, &opts).unwrap();
    let second = extract(&document, FIELD_NOTES_URL, &opts).unwrap();

    assert_eq!(first.content, second.content);
    assert_eq!(first, second);
}

#[test]
fn navigation_page_has_no_article() {
    let html = load_html_fixture("navigation");
    let err = client()
        .parse_html(&html, "https://example.com")
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::ExtractionFailed);
    assert!(err.is_expected());
    assert_eq!(err.http_status(), 422);
}

/// Ten paragraphs of exactly 25 words each.
fn comma_rich_story() -> String {
    let sentence = "Alpha, beta, gamma, delta, and epsilon walk, talk, and rest by the river, \
                    while the town sleeps, dreams, and waits for morning light to return.";
    assert_eq!(sentence.split_whitespace().count(), 25);
    (0..10).map(|_| format!("<p>{}</p>", sentence)).collect()
}

/// Twenty-five links of two words each.
fn link_only_nav() -> String {
    let links: String = (0..25)
        .map(|i| format!(r#"<li><a href="/section/{}">Section {}</a></li>"#, i, i))
        .collect();
    format!("<nav><ul>{}</ul></nav>", links)
}

#[test]
fn article_beats_link_navigation() {
    let html = format!(
        "<html><head><title>River Town</title></head><body><h1>River Town</h1>{}<div id=\"story\">{}</div></body></html>",
        link_only_nav(),
        comma_rich_story()
    );
    let article = client()
        .parse_html(&html, "https://rivertown.example/story")
        .unwrap();

    assert_eq!(article.title, "River Town");
    assert_eq!(article.word_count, 250);
    assert_eq!(article.reading_time, 2);
    assert!(!article.content.contains("Section 3"));
}

#[test]
fn relative_links_resolve_against_base_tag() {
    let html = format!(
        r#"<html><head><title>Appendix Notes</title><base href="https://cdn.example/assets/"></head><body><div>{}<p>See <a href="more.html">the appendix</a>, which has, many, more, details, for readers.</p></div></body></html>"#,
        comma_rich_story()
    );
    let article = client()
        .parse_html(&html, "https://rivertown.example/story")
        .unwrap();

    assert!(article
        .content
        .contains(r#"href="https://cdn.example/assets/more.html""#));
}

#[test]
fn untitled_page_is_not_an_article() {
    let html = format!(
        "<html><head></head><body><div>{}</div></body></html>",
        comma_rich_story()
    );
    let err = client()
        .parse_html(&html, "https://example.com/x")
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::ExtractionFailed);
    assert_eq!(err.http_status(), 422);
}
