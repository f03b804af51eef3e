// ABOUTME: Reads article metadata from schema.org JSON-LD script blocks.
// ABOUTME: Walks @graph containers and picks the first object typed as an article.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::dom::{text_content, Document};

static ARTICLE_TYPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(Article|AdvertiserContentArticle|NewsArticle|AnalysisNewsArticle|AskPublicNewsArticle|BackgroundNewsArticle|OpinionNewsArticle|ReportageNewsArticle|ReviewNewsArticle|Report|SatiricalArticle|ScholarlyArticle|MedicalScholarlyArticle|SocialMediaPosting|BlogPosting|LiveBlogPosting|DiscussionForumPosting|TechArticle|APIReference)$")
        .expect("valid article type regex")
});

/// Fields of the first article-typed JSON-LD object on the page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonLdArticle {
    pub headline: Option<String>,
    pub name: Option<String>,
    pub byline: Option<String>,
    pub description: Option<String>,
    pub date_published: Option<String>,
    pub site_name: Option<String>,
}

/// Parse every `application/ld+json` block and return the first article.
///
/// Blocks that are not valid JSON are skipped.
pub fn extract_json_ld(doc: &Document) -> JsonLdArticle {
    for script in doc.elements_named("script") {
        let is_ld = script
            .value()
            .as_element()
            .and_then(|el| el.attr("type"))
            .map_or(false, |t| t.trim().eq_ignore_ascii_case("application/ld+json"));
        if !is_ld {
            continue;
        }

        let raw = text_content(script);
        // CDATA wrappers show up on some CMS output.
        let raw = raw
            .trim()
            .trim_start_matches("<![CDATA[")
            .trim_end_matches("]]>");
        let Ok(value) = serde_json::from_str::<Value>(raw) else {
            continue;
        };
        if let Some(article) = find_article(&value) {
            return read_article(article);
        }
    }
    JsonLdArticle::default()
}

fn find_article(value: &Value) -> Option<&Value> {
    match value {
        Value::Object(map) => {
            if map.get("@type").map_or(false, is_article_type) {
                return Some(value);
            }
            map.get("@graph").and_then(find_article)
        }
        Value::Array(items) => items.iter().find_map(find_article),
        _ => None,
    }
}

fn is_article_type(value: &Value) -> bool {
    match value {
        Value::String(s) => ARTICLE_TYPE_RE.is_match(s),
        Value::Array(items) => items.iter().any(is_article_type),
        _ => false,
    }
}

fn read_article(value: &Value) -> JsonLdArticle {
    JsonLdArticle {
        headline: string_field(value, "headline"),
        name: string_field(value, "name"),
        byline: value.get("author").and_then(author_names),
        description: string_field(value, "description"),
        date_published: string_field(value, "datePublished"),
        site_name: value.get("publisher").and_then(|p| match p {
            Value::String(s) => non_empty(s),
            other => string_field(other, "name"),
        }),
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).and_then(non_empty)
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// `"author"` may be a string, a Person object, or an array of either.
fn author_names(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_empty(s),
        Value::Object(_) => string_field(value, "name"),
        Value::Array(items) => {
            let names: Vec<String> = items.iter().filter_map(author_names).collect();
            (!names.is_empty()).then(|| names.join(", "))
        }
        _ => None,
    }
}
