// ABOUTME: Error types for the reader pipeline including the ErrorCode enum and ParseError struct.
// ABOUTME: Provides categorized failures with convenience constructors, boolean helpers and status mapping.

use std::fmt;

/// Error codes representing the categories of pipeline failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The input was not an absolute http(s) URL. No network call was made.
    InvalidUrl,
    /// DNS resolution failed, or the server answered 404.
    NotFound,
    /// The server answered 403, or the target is a private network address.
    Blocked,
    /// Connection refused, reset, or timed out.
    Unreachable,
    /// The server answered with a 5xx status.
    UpstreamUnavailable,
    /// The server answered with another status outside [200, 400).
    UpstreamHttp,
    /// The body is not text/HTML at all.
    UnparsableDocument,
    /// The page holds no article. Expected for listing, login or navigation pages.
    ExtractionFailed,
    /// Anything else, e.g. a redirect loop.
    Internal,
}

impl ErrorCode {
    /// The HTTP status a serving layer should answer with for this failure.
    ///
    /// `UpstreamHttp` has no fixed mapping; `ParseError::http_status` forwards
    /// the upstream status for it.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::InvalidUrl => 400,
            ErrorCode::NotFound => 404,
            ErrorCode::Blocked => 403,
            ErrorCode::Unreachable | ErrorCode::UpstreamUnavailable => 503,
            ErrorCode::UnparsableDocument | ErrorCode::ExtractionFailed => 422,
            ErrorCode::UpstreamHttp => 502,
            ErrorCode::Internal => 500,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::InvalidUrl => "invalid URL",
            ErrorCode::NotFound => "not found",
            ErrorCode::Blocked => "blocked",
            ErrorCode::Unreachable => "unreachable",
            ErrorCode::UpstreamUnavailable => "upstream unavailable",
            ErrorCode::UpstreamHttp => "upstream HTTP error",
            ErrorCode::UnparsableDocument => "unparsable document",
            ErrorCode::ExtractionFailed => "extraction failed",
            ErrorCode::Internal => "internal error",
        };
        write!(f, "{}", s)
    }
}

/// The main error type for pipeline operations.
#[derive(Debug, thiserror::Error)]
pub struct ParseError {
    pub code: ErrorCode,
    pub url: String,
    pub op: String,
    /// Upstream HTTP status, when the failure came from a response.
    pub status: Option<u16>,
    #[source]
    pub source: Option<anyhow::Error>,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reader: {} {}: {}", self.op, self.url, self.code)?;
        if let Some(status) = self.status {
            write!(f, " (HTTP {})", status)?;
        }
        if let Some(ref src) = self.source {
            write!(f, ": {}", src)?;
        }
        Ok(())
    }
}

impl ParseError {
    /// Create an error with an arbitrary code.
    pub fn new(
        code: ErrorCode,
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self {
            code,
            url: url.into(),
            op: op.into(),
            status: None,
            source,
        }
    }

    /// Create an InvalidUrl error.
    pub fn invalid_url(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::new(ErrorCode::InvalidUrl, url, op, source)
    }

    /// Create a NotFound error.
    pub fn not_found(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::new(ErrorCode::NotFound, url, op, source)
    }

    /// Create a Blocked error.
    pub fn blocked(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::new(ErrorCode::Blocked, url, op, source)
    }

    /// Create an Unreachable error.
    pub fn unreachable(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::new(ErrorCode::Unreachable, url, op, source)
    }

    /// Create an UnparsableDocument error.
    pub fn unparsable(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::new(ErrorCode::UnparsableDocument, url, op, source)
    }

    /// Create an ExtractionFailed error.
    pub fn extraction_failed(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::new(ErrorCode::ExtractionFailed, url, op, source)
    }

    /// Create an Internal error.
    pub fn internal(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::new(ErrorCode::Internal, url, op, source)
    }

    /// Map an upstream status outside [200, 400) to its error.
    ///
    /// 403 is Blocked, 404 NotFound, 5xx UpstreamUnavailable, anything else
    /// UpstreamHttp. The status is kept on the error in every case.
    pub fn from_status(url: impl Into<String>, op: impl Into<String>, status: u16) -> Self {
        let code = match status {
            403 => ErrorCode::Blocked,
            404 => ErrorCode::NotFound,
            s if s >= 500 => ErrorCode::UpstreamUnavailable,
            _ => ErrorCode::UpstreamHttp,
        };
        let mut err = Self::new(
            code,
            url,
            op,
            Some(anyhow::anyhow!("HTTP status {}", status)),
        );
        err.status = Some(status);
        err
    }

    /// The HTTP status a serving layer should answer with.
    pub fn http_status(&self) -> u16 {
        match (self.code, self.status) {
            (ErrorCode::UpstreamHttp, Some(status)) => status,
            (code, _) => code.http_status(),
        }
    }

    /// Returns true if this is an InvalidUrl error.
    pub fn is_invalid_url(&self) -> bool {
        self.code == ErrorCode::InvalidUrl
    }

    /// Returns true if this is a NotFound error.
    pub fn is_not_found(&self) -> bool {
        self.code == ErrorCode::NotFound
    }

    /// Returns true if this is a Blocked error.
    pub fn is_blocked(&self) -> bool {
        self.code == ErrorCode::Blocked
    }

    /// Returns true if this is an Unreachable error.
    pub fn is_unreachable(&self) -> bool {
        self.code == ErrorCode::Unreachable
    }

    /// Returns true if this is an UnparsableDocument error.
    pub fn is_unparsable(&self) -> bool {
        self.code == ErrorCode::UnparsableDocument
    }

    /// Returns true if the page simply held no article.
    pub fn is_extraction_failed(&self) -> bool {
        self.code == ErrorCode::ExtractionFailed
    }

    /// Returns true if the caller may retry the same URL later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::Unreachable | ErrorCode::UpstreamUnavailable
        )
    }

    /// Returns true for outcomes that are not system faults.
    pub fn is_expected(&self) -> bool {
        self.code == ErrorCode::ExtractionFailed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_mapping() {
        assert_eq!(ParseError::from_status("u", "Fetch", 403).code, ErrorCode::Blocked);
        assert_eq!(ParseError::from_status("u", "Fetch", 404).code, ErrorCode::NotFound);
        assert_eq!(
            ParseError::from_status("u", "Fetch", 500).code,
            ErrorCode::UpstreamUnavailable
        );
        assert_eq!(
            ParseError::from_status("u", "Fetch", 503).code,
            ErrorCode::UpstreamUnavailable
        );

        let gone = ParseError::from_status("u", "Fetch", 410);
        assert_eq!(gone.code, ErrorCode::UpstreamHttp);
        assert_eq!(gone.status, Some(410));
    }

    #[test]
    fn test_http_status_equivalents() {
        assert_eq!(ParseError::invalid_url("u", "Parse", None).http_status(), 400);
        assert_eq!(ParseError::not_found("u", "Fetch", None).http_status(), 404);
        assert_eq!(ParseError::blocked("u", "Fetch", None).http_status(), 403);
        assert_eq!(ParseError::unreachable("u", "Fetch", None).http_status(), 503);
        assert_eq!(ParseError::from_status("u", "Fetch", 502).http_status(), 503);
        assert_eq!(ParseError::from_status("u", "Fetch", 429).http_status(), 429);
        assert_eq!(
            ParseError::extraction_failed("u", "Extract", None).http_status(),
            422
        );
        assert_eq!(ParseError::internal("u", "Fetch", None).http_status(), 500);
    }

    #[test]
    fn test_helpers() {
        let err = ParseError::extraction_failed("https://example.com", "Extract", None);
        assert!(err.is_extraction_failed());
        assert!(err.is_expected());
        assert!(!err.is_transient());

        let err = ParseError::unreachable("https://example.com", "Fetch", None);
        assert!(err.is_transient());
        assert!(!err.is_expected());
    }

    #[test]
    fn test_display_includes_status() {
        let err = ParseError::from_status("https://example.com/x", "Fetch", 404);
        let text = err.to_string();
        assert!(text.contains("Fetch https://example.com/x: not found"));
        assert!(text.contains("HTTP 404"));
    }
}
