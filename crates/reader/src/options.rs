// ABOUTME: Configuration for the reader pipeline including Options, ExtractorOptions, and ClientBuilder.
// ABOUTME: ClientBuilder provides a fluent API for constructing Client instances with custom settings.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::client::Client;
use crate::error::ParseError;
use crate::resource::Fetcher;

/// Browser User-Agent sent by default. Many sites serve a stripped page or
/// refuse outright when the agent does not look like a browser.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Numeric thresholds of the readability extractor.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractorOptions {
    /// Minimum score the top candidate needs, below it the page holds no article.
    pub min_score: f64,
    /// Paragraph text shorter than this (in characters) is not scored.
    pub min_paragraph_len: usize,
    /// Siblings scoring at least `top_score * sibling_score_ratio` (and 10) are absorbed.
    pub sibling_score_ratio: f64,
    /// How many ancestor levels a paragraph score propagates to.
    pub max_ancestor_depth: usize,
    /// Maximum length of the fallback excerpt, in characters.
    pub excerpt_max_chars: usize,
    pub words_per_minute: usize,
}

impl Default for ExtractorOptions {
    fn default() -> Self {
        Self {
            min_score: 20.0,
            min_paragraph_len: 25,
            sibling_score_ratio: 0.2,
            max_ancestor_depth: 5,
            excerpt_max_chars: 200,
            words_per_minute: 200,
        }
    }
}

/// Configuration options for the reader client.
#[derive(Clone)]
pub struct Options {
    pub timeout: Duration,
    pub user_agent: String,
    pub allow_private_networks: bool,
    pub max_redirects: usize,
    pub http_client: Option<reqwest::Client>,
    pub headers: HashMap<String, String>,
    /// Replaces the HTTP fetcher entirely when set.
    pub fetcher: Option<Arc<dyn Fetcher>>,
    pub extractor: ExtractorOptions,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            allow_private_networks: false,
            max_redirects: 5,
            http_client: None,
            headers: HashMap::new(),
            fetcher: None,
            extractor: ExtractorOptions::default(),
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .field("allow_private_networks", &self.allow_private_networks)
            .field("max_redirects", &self.max_redirects)
            .field("http_client", &self.http_client.is_some())
            .field("headers", &self.headers)
            .field("fetcher", &self.fetcher.is_some())
            .field("extractor", &self.extractor)
            .finish()
    }
}

/// Builder for constructing Client instances with custom configuration.
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    opts: Options,
}

impl ClientBuilder {
    /// Create a new ClientBuilder with default options.
    pub fn new() -> Self {
        Self {
            opts: Options::default(),
        }
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.opts.timeout = timeout;
        self
    }

    /// Set the User-Agent header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.opts.user_agent = user_agent.into();
        self
    }

    /// Allow or disallow requests to private networks.
    pub fn allow_private_networks(mut self, allow: bool) -> Self {
        self.opts.allow_private_networks = allow;
        self
    }

    /// Set how many redirects are followed before the fetch fails.
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.opts.max_redirects = max;
        self
    }

    /// Use a custom HTTP client.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.opts.http_client = Some(client);
        self
    }

    /// Add a custom header to all requests.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.opts.headers.insert(key.into(), value.into());
        self
    }

    /// Fetch documents through `fetcher` instead of HTTP.
    pub fn fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.opts.fetcher = Some(fetcher);
        self
    }

    /// Override the extractor thresholds.
    pub fn extractor_options(mut self, extractor: ExtractorOptions) -> Self {
        self.opts.extractor = extractor;
        self
    }

    /// Build the Client with the configured options.
    ///
    /// Fails with `Internal` when the HTTP client cannot be constructed.
    pub fn build(self) -> Result<Client, ParseError> {
        Client::new(self.opts)
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
