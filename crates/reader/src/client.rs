// ABOUTME: The main Client struct that runs the fetch, parse, extract and sanitize pipeline.
// ABOUTME: Provides async parse() for URLs plus parse_html() and parse_document() for content already in hand.

use std::sync::Arc;

use tracing::{debug, info};
use url::Url;

use crate::dom::Document;
use crate::error::ParseError;
use crate::extractors::extract;
use crate::options::{ClientBuilder, Options};
use crate::resource::{validate_url, FetchOptions, Fetcher, HttpFetcher};
use crate::result::Article;

/// The reader client. Cheap to share; every call is independent.
#[derive(Clone)]
pub struct Client {
    opts: Options,
    fetcher: Arc<dyn Fetcher>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").field("opts", &self.opts).finish()
    }
}

impl Client {
    /// Create a new ClientBuilder for configuring the client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Create a new Client with the given options.
    ///
    /// A configured `fetcher` wins over `http_client`; otherwise an
    /// `HttpFetcher` is built from the options.
    pub fn new(opts: Options) -> Result<Self, ParseError> {
        let fetcher: Arc<dyn Fetcher> = match (&opts.fetcher, &opts.http_client) {
            (Some(fetcher), _) => Arc::clone(fetcher),
            (None, Some(client)) => Arc::new(HttpFetcher::with_client(
                client.clone(),
                fetch_options(&opts),
            )),
            (None, None) => Arc::new(HttpFetcher::new(fetch_options(&opts))?),
        };
        Ok(Self { opts, fetcher })
    }

    pub fn options(&self) -> &Options {
        &self.opts
    }

    /// Fetch the page at `url` and extract its article.
    ///
    /// The URL is validated before any network call. Relative links in the
    /// result are resolved against the final URL after redirects, which is
    /// also the `url` reported on the article.
    #[tracing::instrument(skip(self), fields(url = %url))]
    pub async fn parse(&self, url: &str) -> Result<Article, ParseError> {
        let target = validate_url(url, "Parse")?;

        let fetched = self.fetcher.fetch(&target).await?;
        let final_url = Url::parse(&fetched.final_url).unwrap_or(target);

        let document = Document::from_bytes(
            &fetched.body,
            fetched.content_type.as_deref(),
            &final_url,
        )?;
        self.parse_document(&document, final_url.as_str())
    }

    /// Extract the article from an HTML string already in hand. No network.
    ///
    /// `url` must still be a valid http(s) URL; links are resolved against it.
    #[tracing::instrument(skip(self, html), fields(url = %url, bytes = html.len()))]
    pub fn parse_html(&self, html: &str, url: &str) -> Result<Article, ParseError> {
        let base = validate_url(url, "Parse")?;
        let document = Document::parse(html, &base);
        self.parse_document(&document, base.as_str())
    }

    /// Extract the article from a built document. The document is not modified.
    pub fn parse_document(&self, document: &Document, url: &str) -> Result<Article, ParseError> {
        match extract(document, url, &self.opts.extractor) {
            Ok(article) => {
                info!(
                    url,
                    title = %article.title,
                    reading_time = article.reading_time,
                    words = article.word_count,
                    "article extracted"
                );
                Ok(article)
            }
            Err(err) => {
                debug!(url, error = %err, "extraction failed");
                Err(err)
            }
        }
    }
}

fn fetch_options(opts: &Options) -> FetchOptions {
    FetchOptions {
        headers: opts.headers.clone(),
        allow_private_networks: opts.allow_private_networks,
        timeout: opts.timeout,
        max_redirects: opts.max_redirects,
        user_agent: opts.user_agent.clone(),
    }
}
