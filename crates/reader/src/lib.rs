// ABOUTME: Main library entry point for the cleanread reader pipeline.
// ABOUTME: Re-exports the public API: Client, ClientBuilder, Article, ParseError, ErrorCode, Options, Fetcher.

//! cleanread-reader turns an arbitrary web page into a clean, readable article.
//!
//! The pipeline fetches the page (with SSRF protection and bounded time and
//! size), builds a mutable document tree, runs a readability-style scoring
//! pass to find the main content and sanitizes the result.
//!
//! # Example
//!
//! ```no_run
//! use cleanread_reader::{Client, ParseError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ParseError> {
//!     let client = Client::builder().build()?;
//!     let article = client.parse("https://example.com/article").await?;
//!     println!("{} ({} min)", article.title, article.reading_time);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod dom;
pub mod error;
pub mod extractors;
pub mod formats;
pub mod options;
pub mod resource;
pub mod result;

pub use crate::client::Client;
pub use crate::dom::Document;
pub use crate::error::{ErrorCode, ParseError};
pub use crate::extractors::extract;
pub use crate::options::{ClientBuilder, ExtractorOptions, Options};
pub use crate::resource::{FetchResult, Fetcher, HttpFetcher};
pub use crate::result::{Article, Result};
