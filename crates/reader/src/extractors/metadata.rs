// ABOUTME: Metadata extraction from meta tags, JSON-LD and headings of the unmodified page.
// ABOUTME: Resolves title, byline, excerpt, site name, published time, language and direction.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use super::json_ld::{extract_json_ld, JsonLdArticle};
use crate::dom::{inner_text, Document};

/// Separators between an article title and the site name in `<title>`.
const TITLE_SEPARATORS: &[&str] = &[" | ", " - ", " – ", " — ", " :: ", " » "];

static FOUR_DIGIT_YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^|\D)\d{4}(\D|$)").expect("valid year regex"));

/// Metadata read from the page before any cleaning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub title: Option<String>,
    pub byline: Option<String>,
    pub excerpt: Option<String>,
    pub site_name: Option<String>,
    pub published_time: Option<DateTime<Utc>>,
    /// Primary language tag, e.g. `en`.
    pub language: Option<String>,
    /// `dir` declared on `html` or `body`.
    pub direction: Option<String>,
}

/// Extract metadata from the unmodified document.
pub fn extract_metadata(doc: &Document) -> Metadata {
    let ld = extract_json_ld(doc);

    Metadata {
        title: extract_title(doc, &ld),
        byline: extract_byline(doc, &ld),
        excerpt: ld
            .description
            .clone()
            .or_else(|| meta_by(doc, "name", "description"))
            .or_else(|| meta_by(doc, "property", "og:description"))
            .or_else(|| meta_any(doc, "twitter:description")),
        site_name: ld
            .site_name
            .clone()
            .or_else(|| meta_by(doc, "property", "og:site_name"))
            .or_else(|| meta_by(doc, "name", "application-name")),
        published_time: extract_published(doc, &ld),
        language: extract_language(doc),
        direction: declared_direction(doc),
    }
}

/// The `content` of the first `<meta {attr}="{value}">` with a non-empty content.
fn meta_by(doc: &Document, attr: &str, value: &str) -> Option<String> {
    doc.elements_named("meta").find_map(|node| {
        let el = node.value().as_element()?;
        let key = el.attr(attr)?;
        if !key.split_whitespace().any(|k| k.eq_ignore_ascii_case(value)) {
            return None;
        }
        let content = el.attr("content")?.trim();
        (!content.is_empty()).then(|| content.to_string())
    })
}

/// Twitter cards show up under either `name` or `property`.
fn meta_any(doc: &Document, value: &str) -> Option<String> {
    meta_by(doc, "name", value).or_else(|| meta_by(doc, "property", value))
}

fn extract_title(doc: &Document, ld: &JsonLdArticle) -> Option<String> {
    let h1s: Vec<String> = doc
        .elements_named("h1")
        .map(inner_text)
        .filter(|t| !t.is_empty())
        .collect();
    if h1s.len() == 1 {
        return h1s.into_iter().next();
    }

    ld.headline
        .clone()
        .or_else(|| ld.name.clone())
        .or_else(|| meta_by(doc, "property", "og:title"))
        .or_else(|| meta_any(doc, "twitter:title"))
        .or_else(|| {
            doc.first_element("title")
                .map(inner_text)
                .filter(|t| !t.is_empty())
                .map(|t| clean_title(&t))
        })
        .or_else(|| {
            doc.elements_named("h2")
                .map(inner_text)
                .find(|t| !t.is_empty())
        })
}

/// Drop a trailing or leading site-name part from a `<title>`.
///
/// The cut is only made when the remaining part keeps at least three words.
pub fn clean_title(raw: &str) -> String {
    let title = raw.trim();
    for sep in TITLE_SEPARATORS {
        let Some(last) = title.rfind(sep) else {
            continue;
        };
        let head = title[..last].trim();
        if word_count(head) >= 3 {
            return head.to_string();
        }
        if let Some(first) = title.find(sep) {
            let tail = title[first + sep.len()..].trim();
            if word_count(tail) >= 3 {
                return tail.to_string();
            }
        }
    }
    title.to_string()
}

fn word_count(s: &str) -> usize {
    s.split_whitespace().count()
}

fn extract_byline(doc: &Document, ld: &JsonLdArticle) -> Option<String> {
    ld.byline
        .clone()
        .or_else(|| meta_by(doc, "name", "author"))
        .or_else(|| {
            meta_by(doc, "property", "article:author")
                .filter(|a| !a.starts_with("http://") && !a.starts_with("https://"))
        })
        .or_else(|| meta_by(doc, "name", "dc.creator"))
}

fn extract_published(doc: &Document, ld: &JsonLdArticle) -> Option<DateTime<Utc>> {
    let time_attr = doc.elements_named("time").find_map(|node| {
        node.value()
            .as_element()
            .and_then(|el| el.attr("datetime"))
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
    });

    [
        ld.date_published.clone(),
        meta_by(doc, "property", "article:published_time"),
        meta_by(doc, "property", "og:published_time"),
        meta_by(doc, "itemprop", "datePublished"),
        meta_by(doc, "name", "date"),
        meta_by(doc, "name", "dc.date"),
        time_attr,
    ]
    .into_iter()
    .flatten()
    .find_map(|raw| parse_date(&raw))
}

/// Parse a date string, trying RFC3339 first then falling back to dateparser.
///
/// Everything is read as UTC. Input without a four-digit year is rejected so
/// relative phrases ("yesterday", "3 hours ago") never depend on the clock.
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    if !FOUR_DIGIT_YEAR_RE.is_match(s) {
        return None;
    }

    const LOOSE_PATTERNS: &[&str] = &[
        "%Y-%m-%d",  // 2024-01-05
        "%Y/%m/%d",  // 2024/01/05
        "%b %e, %Y", // Jan 5, 2024
        "%e %b %Y",  // 5 Jan 2024
        "%b %d, %Y", // Jan 05, 2024
        "%d %b %Y",  // 05 Jan 2024
        "%B %e, %Y", // January 5, 2024
        "%e %B %Y",  // 5 January 2024
        "%B %d, %Y", // January 05, 2024
        "%d %B %Y",  // 05 January 2024
    ];
    let midnight = NaiveTime::from_hms_opt(0, 0, 0)?;
    for pat in LOOSE_PATTERNS {
        if let Ok(date) = NaiveDate::parse_from_str(s, pat) {
            return Some(DateTime::<Utc>::from_naive_utc_and_offset(
                date.and_time(midnight),
                Utc,
            ));
        }
    }

    dateparser::parse_with(s, &Utc, midnight).ok()
}

fn extract_language(doc: &Document) -> Option<String> {
    doc.first_element("html")
        .and_then(|html| html.value().as_element().and_then(|el| el.attr("lang")))
        .map(str::to_string)
        .or_else(|| meta_by(doc, "property", "og:locale"))
        .map(|lang| normalize_lang(&lang))
        .filter(|lang| !lang.is_empty())
}

/// Normalizes a language/locale string to its primary language tag.
///
/// For example: "en_US" -> "en", "EN-GB" -> "en", "fr" -> "fr".
pub fn normalize_lang(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .split(['-', '_'])
        .next()
        .unwrap_or("")
        .to_string()
}

fn declared_direction(doc: &Document) -> Option<String> {
    ["html", "body"].iter().find_map(|tag| {
        let dir = doc
            .first_element(tag)?
            .value()
            .as_element()?
            .attr("dir")?
            .trim()
            .to_lowercase();
        matches!(dir.as_str(), "rtl" | "ltr").then_some(dir)
    })
}

/// "rtl" when at least 30% of the letters are Hebrew or Arabic, else "ltr".
pub fn detect_direction(text: &str) -> String {
    let mut rtl_count = 0u32;
    let mut letter_count = 0u32;

    for ch in text.chars() {
        if ch.is_alphabetic() {
            letter_count += 1;
            if is_rtl_char(ch) {
                rtl_count += 1;
            }
        }
    }

    if letter_count > 0 && (rtl_count as f64 / letter_count as f64) >= 0.30 {
        "rtl".to_string()
    } else {
        "ltr".to_string()
    }
}

/// Check if a character is in RTL unicode ranges (Hebrew or Arabic).
fn is_rtl_char(ch: char) -> bool {
    let code = ch as u32;
    (0x0590..=0x05FF).contains(&code)
        || (0xFB1D..=0xFB4F).contains(&code)
        || (0x0600..=0x06FF).contains(&code)
        || (0x0750..=0x077F).contains(&code)
        || (0x08A0..=0x08FF).contains(&code)
        || (0xFB50..=0xFDFF).contains(&code)
        || (0xFE70..=0xFEFF).contains(&code)
}
