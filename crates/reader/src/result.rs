// ABOUTME: Article struct holding the cleaned content and metadata of a parsed page.
// ABOUTME: Serializes in camelCase to match the reader JSON response.

use serde::{Deserialize, Serialize};

/// The readable version of a page.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    /// Final URL after redirects.
    pub url: String,
    pub title: String,
    pub byline: Option<String>,
    /// Sanitized HTML fragment.
    pub content: String,
    pub excerpt: Option<String>,
    /// Character count of the content's text.
    pub length: usize,
    pub word_count: usize,
    pub site_name: Option<String>,
    /// RFC 3339, UTC.
    pub published_time: Option<String>,
    /// Estimated minutes to read.
    pub reading_time: u32,
    pub language: Option<String>,
    /// "ltr" or "rtl".
    pub direction: Option<String>,
}

impl Article {
    pub fn has_byline(&self) -> bool {
        self.byline.as_ref().map_or(false, |b| !b.is_empty())
    }

    pub fn has_published_time(&self) -> bool {
        self.published_time.is_some()
    }

    pub fn is_rtl(&self) -> bool {
        self.direction.as_deref() == Some("rtl")
    }
}

/// Convenience alias for Results with ParseError.
pub type Result<T> = std::result::Result<T, crate::error::ParseError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_serializes_camel_case() {
        let article = Article {
            url: "https://example.com/a".to_string(),
            title: "T".to_string(),
            content: "<div><p>x</p></div>".to_string(),
            length: 1,
            word_count: 1,
            site_name: Some("Example".to_string()),
            published_time: Some("2024-01-05T00:00:00Z".to_string()),
            reading_time: 1,
            ..Default::default()
        };
        let json = serde_json::to_value(&article).unwrap();
        assert_eq!(json["siteName"], "Example");
        assert_eq!(json["publishedTime"], "2024-01-05T00:00:00Z");
        assert_eq!(json["readingTime"], 1);
        assert_eq!(json["wordCount"], 1);
        assert_eq!(json["length"], 1);
        assert!(json["byline"].is_null());

        let back: Article = serde_json::from_value(json).unwrap();
        assert_eq!(back, article);
    }

    #[test]
    fn test_helpers() {
        let mut article = Article::default();
        assert!(!article.has_byline());
        article.byline = Some("Jane".to_string());
        article.direction = Some("rtl".to_string());
        assert!(article.has_byline());
        assert!(article.is_rtl());
        assert!(!article.has_published_time());
    }
}
