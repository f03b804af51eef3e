// ABOUTME: Resource handling module for fetching web pages behind the Fetcher trait.
// ABOUTME: HttpFetcher adds SSRF protection, redirect limits, content-length limits and status mapping.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use once_cell::sync::Lazy;
use tracing::{debug, warn};
use url::Url;

use crate::error::{ErrorCode, ParseError};

/// Maximum allowed content length (10 MB).
pub const MAX_CONTENT_LENGTH: usize = 10 * 1024 * 1024;

static PRIVATE_NETS: Lazy<Vec<IpNet>> = Lazy::new(|| {
    let v4 = [
        "0.0.0.0/8",
        "10.0.0.0/8",
        "100.64.0.0/10",
        "127.0.0.0/8",
        "169.254.0.0/16",
        "172.16.0.0/12",
        "192.168.0.0/16",
    ];
    let v6 = ["::1/128", "::/128", "fc00::/7", "fe80::/10"];
    v4.iter()
        .map(|n| IpNet::V4(n.parse::<Ipv4Net>().expect("valid v4 net")))
        .chain(
            v6.iter()
                .map(|n| IpNet::V6(n.parse::<Ipv6Net>().expect("valid v6 net"))),
        )
        .collect()
});

/// Source of documents for the pipeline.
///
/// `HttpFetcher` is the production implementation; tests substitute their own.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchResult, ParseError>;
}

/// Result of a successful fetch operation.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub status: u16,
    pub url: String,
    pub final_url: String,
    /// Lower-cased Content-Type header.
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// Options for fetching a resource.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub headers: HashMap<String, String>,
    pub allow_private_networks: bool,
    pub timeout: Duration,
    pub max_redirects: usize,
    pub user_agent: String,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            headers: HashMap::new(),
            allow_private_networks: false,
            timeout: Duration::from_secs(30),
            max_redirects: 5,
            user_agent: crate::options::DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Fetches pages over HTTP with reqwest.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    opts: FetchOptions,
}

impl HttpFetcher {
    /// Build a fetcher with its own HTTP client.
    ///
    /// The client never follows redirects itself; `fetch` walks them so every
    /// hop is resolved and checked before it is requested.
    pub fn new(opts: FetchOptions) -> Result<Self, ParseError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(&opts.user_agent)
            .timeout(opts.timeout)
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| {
                ParseError::internal("", "Fetch", Some(anyhow::anyhow!("HTTP client: {}", e)))
            })?;

        Ok(Self { client, opts })
    }

    /// Use a caller-supplied client. Redirects it follows on its own are not
    /// checked hop by hop; the final URL still is.
    pub fn with_client(client: reqwest::Client, opts: FetchOptions) -> Self {
        Self { client, opts }
    }

    fn request(&self, url: &Url) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .get(url.clone())
            .header(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .header("Upgrade-Insecure-Requests", "1");
        for (key, value) in &self.opts.headers {
            request = request.header(key, value);
        }
        request
    }

    async fn fetch_inner(&self, url: &Url) -> Result<FetchResult, ParseError> {
        let requested = url.as_str();
        let allow_private = self.opts.allow_private_networks;

        let mut current = url.clone();
        let mut hops = 0usize;
        let response = loop {
            check_host(&current, requested, allow_private).await?;
            let response = self
                .request(&current)
                .send()
                .await
                .map_err(|e| classify_send_error(requested, e))?;

            let Some(next) = redirect_target(&response, &current) else {
                break response;
            };
            if hops >= self.opts.max_redirects {
                warn!(url = requested, hops, "redirect limit reached");
                return Err(ParseError::internal(
                    requested,
                    "Fetch",
                    Some(anyhow::anyhow!(
                        "stopped after {} redirects",
                        self.opts.max_redirects
                    )),
                ));
            }
            let next = validate_url(next.as_str(), "Fetch").map_err(|e| {
                ParseError::internal(
                    requested,
                    "Fetch",
                    Some(anyhow::anyhow!("redirect to unsupported URL {}: {}", next, e)),
                )
            })?;
            debug!(from = %current, to = %next, "following redirect");
            hops += 1;
            current = next;
        };

        if !allow_private && response.url() != &current {
            check_host(response.url(), requested, false).await?;
        }

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        if !(200..400).contains(&status) {
            debug!(url = requested, status, "upstream status rejected");
            return Err(ParseError::from_status(requested, "Fetch", status));
        }

        if let Some(len) = response.content_length() {
            if len > MAX_CONTENT_LENGTH as u64 {
                return Err(too_large(requested));
            }
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_lowercase());

        let body = read_body(response, requested).await?;

        debug!(
            url = requested,
            final_url = %final_url,
            status,
            bytes = body.len(),
            "fetched"
        );

        Ok(FetchResult {
            status,
            url: requested.to_string(),
            final_url,
            content_type,
            body,
        })
    }
}

/// Where a 3xx response points, resolved against the URL that produced it.
fn redirect_target(response: &reqwest::Response, current: &Url) -> Option<Url> {
    if !response.status().is_redirection() {
        return None;
    }
    let location = response
        .headers()
        .get(reqwest::header::LOCATION)?
        .to_str()
        .ok()?;
    current.join(location.trim()).ok()
}

/// Read the body chunk by chunk, giving up as soon as it passes
/// `MAX_CONTENT_LENGTH`. Compressed and chunked bodies carry no usable
/// Content-Length, so the header check alone is not enough.
async fn read_body(mut response: reqwest::Response, requested: &str) -> Result<Bytes, ParseError> {
    let mut body = BytesMut::new();
    loop {
        let chunk = response.chunk().await.map_err(|e| {
            warn!(url = requested, error = %e, "failed to read body");
            ParseError::unreachable(
                requested,
                "Fetch",
                Some(anyhow::anyhow!("failed to read body: {}", e)),
            )
        })?;
        let Some(chunk) = chunk else {
            break;
        };
        if body.len() + chunk.len() > MAX_CONTENT_LENGTH {
            warn!(url = requested, "body exceeds size limit");
            return Err(too_large(requested));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body.freeze())
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchResult, ParseError> {
        validate_url(url.as_str(), "Fetch")?;
        match tokio::time::timeout(self.opts.timeout, self.fetch_inner(url)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(url = url.as_str(), timeout = ?self.opts.timeout, "fetch timed out");
                Err(ParseError::unreachable(
                    url.as_str(),
                    "Fetch",
                    Some(anyhow::anyhow!("timed out after {:?}", self.opts.timeout)),
                ))
            }
        }
    }
}

/// Parse `raw` as an absolute http(s) URL with a host.
pub fn validate_url(raw: &str, op: &str) -> Result<Url, ParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ParseError::invalid_url(raw, op, None));
    }
    let parsed = Url::parse(trimmed).map_err(|e| {
        ParseError::invalid_url(raw, op, Some(anyhow::anyhow!("invalid URL: {}", e)))
    })?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ParseError::invalid_url(
            raw,
            op,
            Some(anyhow::anyhow!("scheme must be http or https")),
        ));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(ParseError::invalid_url(
            raw,
            op,
            Some(anyhow::anyhow!("URL has no host")),
        ));
    }
    Ok(parsed)
}

/// Check if an IP address is in a private/reserved range.
pub fn is_private_ip(addr: &IpAddr) -> bool {
    let addr = match addr {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(*addr),
        IpAddr::V4(_) => *addr,
    };
    PRIVATE_NETS.iter().any(|net| net.contains(&addr))
}

fn default_port(url: &Url) -> u16 {
    url.port_or_known_default().unwrap_or(80)
}

/// Resolve the host of `url` and reject private targets.
///
/// DNS failure, or a name with no addresses, is `NotFound`.
async fn check_host(url: &Url, requested: &str, allow_private: bool) -> Result<(), ParseError> {
    let host = match url.host() {
        Some(url::Host::Ipv4(ip)) => return check_ip(IpAddr::V4(ip), requested, allow_private),
        Some(url::Host::Ipv6(ip)) => return check_ip(IpAddr::V6(ip), requested, allow_private),
        Some(url::Host::Domain(domain)) => domain.to_string(),
        None => return Err(ParseError::invalid_url(requested, "Fetch", None)),
    };

    let addrs: Vec<IpAddr> = tokio::net::lookup_host((host.as_str(), default_port(url)))
        .await
        .map_err(|e| {
            debug!(host = %host, error = %e, "DNS lookup failed");
            ParseError::not_found(
                requested,
                "Fetch",
                Some(anyhow::anyhow!("DNS lookup failed for {}: {}", host, e)),
            )
        })?
        .map(|sa| sa.ip())
        .collect();

    if addrs.is_empty() {
        return Err(ParseError::not_found(
            requested,
            "Fetch",
            Some(anyhow::anyhow!("{} has no addresses", host)),
        ));
    }
    for ip in addrs {
        check_ip(ip, requested, allow_private)?;
    }
    Ok(())
}

fn check_ip(ip: IpAddr, requested: &str, allow_private: bool) -> Result<(), ParseError> {
    if !allow_private && is_private_ip(&ip) {
        return Err(ParseError::blocked(
            requested,
            "Fetch",
            Some(anyhow::anyhow!("private address {} is not allowed", ip)),
        ));
    }
    Ok(())
}

fn too_large(requested: &str) -> ParseError {
    ParseError::unparsable(
        requested,
        "Fetch",
        Some(anyhow::anyhow!(
            "content exceeds {} bytes",
            MAX_CONTENT_LENGTH
        )),
    )
}

/// Map a reqwest send failure onto the error taxonomy.
fn classify_send_error(requested: &str, err: reqwest::Error) -> ParseError {
    let transport = err.is_timeout() || err.is_connect() || err.is_request() || err.is_body();
    let code = if transport && !err.is_redirect() {
        ErrorCode::Unreachable
    } else {
        ErrorCode::Internal
    };

    warn!(url = requested, error = %err, code = %code, "request failed");
    ParseError::new(code, requested, "Fetch", Some(anyhow::Error::new(err)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::io::{Read, Write};

    fn local_opts() -> FetchOptions {
        FetchOptions {
            allow_private_networks: true,
            timeout: Duration::from_secs(5),
            ..Default::default()
        }
    }

    fn fetcher(opts: FetchOptions) -> HttpFetcher {
        HttpFetcher::new(opts).expect("client builds")
    }

    fn url(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_ok_html() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/article");
                then.status(200)
                    .header("content-type", "Text/HTML; charset=utf-8")
                    .body("<p>hello</p>");
            })
            .await;

        let result = fetcher(local_opts())
            .fetch(&url(&server.url("/article")))
            .await
            .expect("fetch should succeed");
        mock.assert_async().await;

        assert_eq!(result.status, 200);
        assert_eq!(result.content_type.as_deref(), Some("text/html; charset=utf-8"));
        assert_eq!(&result.body[..], b"<p>hello</p>");
        assert_eq!(result.final_url, server.url("/article"));
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let server = MockServer::start_async().await;
        for (path, status) in [("/403", 403), ("/404", 404), ("/410", 410), ("/503", 503)] {
            server
                .mock_async(|when, then| {
                    when.method(GET).path(path);
                    then.status(status).body("nope");
                })
                .await;
        }
        let f = fetcher(local_opts());

        let err = f.fetch(&url(&server.url("/403"))).await.unwrap_err();
        assert!(err.is_blocked());
        let err = f.fetch(&url(&server.url("/404"))).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.status, Some(404));
        let err = f.fetch(&url(&server.url("/410"))).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::UpstreamHttp);
        assert_eq!(err.http_status(), 410);
        let err = f.fetch(&url(&server.url("/503"))).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::UpstreamUnavailable);
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_follows_redirects() {
        let server = MockServer::start_async().await;
        let target = server.url("/new");
        server
            .mock_async(|when, then| {
                when.method(GET).path("/old");
                then.status(301).header("Location", target.as_str());
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/new");
                then.status(200).header("content-type", "text/html").body("ok");
            })
            .await;

        let result = fetcher(local_opts())
            .fetch(&url(&server.url("/old")))
            .await
            .expect("redirect is followed");
        assert_eq!(result.final_url, server.url("/new"));
        assert_eq!(result.url, server.url("/old"));
    }

    #[tokio::test]
    async fn test_too_many_redirects_is_internal() {
        let server = MockServer::start_async().await;
        let target = server.url("/loop");
        server
            .mock_async(|when, then| {
                when.method(GET).path("/loop");
                then.status(302).header("Location", target.as_str());
            })
            .await;

        let opts = FetchOptions {
            max_redirects: 2,
            ..local_opts()
        };
        let err = fetcher(opts)
            .fetch(&url(&server.url("/loop")))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Internal);
    }

    #[tokio::test]
    async fn test_relative_redirect_resolves_against_current_url() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/a/start");
                then.status(302).header("Location", "../b/end");
            })
            .await;
        let landing = server
            .mock_async(|when, then| {
                when.method(GET).path("/b/end");
                then.status(200).header("content-type", "text/html").body("ok");
            })
            .await;

        let result = fetcher(local_opts())
            .fetch(&url(&server.url("/a/start")))
            .await
            .expect("relative redirect is followed");
        landing.assert_async().await;
        assert_eq!(result.final_url, server.url("/b/end"));
    }

    #[tokio::test]
    async fn test_every_redirect_hop_is_resolved_before_request() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/away");
                then.status(301)
                    .header("Location", "http://no-such-host.invalid/landing");
            })
            .await;

        let err = fetcher(local_opts())
            .fetch(&url(&server.url("/away")))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.url, server.url("/away"));
    }

    #[tokio::test]
    async fn test_redirect_to_other_scheme_is_internal() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/ftp");
                then.status(302).header("Location", "ftp://files.example/a.html");
            })
            .await;

        let err = fetcher(local_opts())
            .fetch(&url(&server.url("/ftp")))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Internal);
    }

    /// Serve one chunked response of `total` bytes with no Content-Length.
    fn serve_chunked_once(total: usize) -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let Ok((mut stream, _)) = listener.accept() else {
                return;
            };
            let mut buf = [0u8; 4096];
            let mut head = Vec::new();
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut buf) {
                    Ok(0) | Err(_) => return,
                    Ok(n) => head.extend_from_slice(&buf[..n]),
                }
            }
            let status = "HTTP/1.1 200 OK\r\ncontent-type: text/html\r\ntransfer-encoding: chunked\r\n\r\n";
            if stream.write_all(status.as_bytes()).is_err() {
                return;
            }
            let chunk = vec![b'a'; 64 * 1024];
            let mut sent = 0;
            while sent < total {
                let size = chunk.len().min(total - sent);
                let written = stream
                    .write_all(format!("{:x}\r\n", size).as_bytes())
                    .and_then(|_| stream.write_all(&chunk[..size]))
                    .and_then(|_| stream.write_all(b"\r\n"));
                if written.is_err() {
                    return;
                }
                sent += size;
            }
            let _ = stream.write_all(b"0\r\n\r\n");
        });
        format!("http://{}/stream", addr)
    }

    #[tokio::test]
    async fn test_chunked_body_within_limit() {
        let target = serve_chunked_once(256 * 1024);
        let result = fetcher(local_opts())
            .fetch(&url(&target))
            .await
            .expect("small chunked body is read");
        assert_eq!(result.body.len(), 256 * 1024);
    }

    #[tokio::test]
    async fn test_chunked_body_over_limit_is_rejected() {
        let target = serve_chunked_once(MAX_CONTENT_LENGTH + 128 * 1024);
        let err = fetcher(local_opts())
            .fetch(&url(&target))
            .await
            .unwrap_err();
        assert!(err.is_unparsable());
        assert_eq!(err.http_status(), 422);
    }

    #[tokio::test]
    async fn test_private_ip_block() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/test");
                then.status(200).body("secret");
            })
            .await;

        let opts = FetchOptions {
            allow_private_networks: false,
            ..local_opts()
        };
        let target = format!("http://127.0.0.1:{}/test", server.port());
        let err = fetcher(opts).fetch(&url(&target)).await.unwrap_err();

        assert!(err.is_blocked());
        assert_eq!(mock.hits_async().await, 0);
    }

    #[tokio::test]
    async fn test_dns_failure_is_not_found() {
        let err = fetcher(local_opts())
            .fetch(&url("http://no-such-host.invalid/"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_connection_refused_is_unreachable() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = fetcher(local_opts())
            .fetch(&url(&format!("http://127.0.0.1:{}/", port)))
            .await
            .unwrap_err();
        assert!(err.is_unreachable());
    }

    #[tokio::test]
    async fn test_timeout_is_unreachable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/slow");
                then.status(200)
                    .delay(Duration::from_millis(1500))
                    .body("late");
            })
            .await;

        let opts = FetchOptions {
            timeout: Duration::from_millis(200),
            ..local_opts()
        };
        let err = fetcher(opts)
            .fetch(&url(&server.url("/slow")))
            .await
            .unwrap_err();
        assert!(err.is_unreachable());
    }

    #[tokio::test]
    async fn test_non_http_scheme_is_invalid() {
        let err = fetcher(local_opts())
            .fetch(&url("ftp://example.com/file"))
            .await
            .unwrap_err();
        assert!(err.is_invalid_url());
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://example.com/a", "Parse").is_ok());
        assert!(validate_url("not-a-url", "Parse").unwrap_err().is_invalid_url());
        assert!(validate_url("", "Parse").unwrap_err().is_invalid_url());
        assert!(validate_url("mailto:a@example.com", "Parse")
            .unwrap_err()
            .is_invalid_url());
        assert!(validate_url("file:///etc/passwd", "Parse")
            .unwrap_err()
            .is_invalid_url());
    }

    #[test]
    fn test_max_content_length_constant() {
        assert_eq!(MAX_CONTENT_LENGTH, 10 * 1024 * 1024);
    }

    #[test]
    fn test_is_private_ip_v4() {
        assert!(is_private_ip(&"10.0.0.1".parse().unwrap()));
        assert!(is_private_ip(&"172.16.0.1".parse().unwrap()));
        assert!(is_private_ip(&"172.31.255.255".parse().unwrap()));
        assert!(is_private_ip(&"192.168.0.1".parse().unwrap()));
        assert!(is_private_ip(&"127.0.0.1".parse().unwrap()));
        assert!(is_private_ip(&"169.254.0.1".parse().unwrap()));
        assert!(is_private_ip(&"0.0.0.0".parse().unwrap()));

        assert!(!is_private_ip(&"8.8.8.8".parse().unwrap()));
        assert!(!is_private_ip(&"1.1.1.1".parse().unwrap()));
        assert!(!is_private_ip(&"172.32.0.1".parse().unwrap()));
    }

    #[test]
    fn test_is_private_ip_v6() {
        assert!(is_private_ip(&"::1".parse().unwrap()));
        assert!(is_private_ip(&"fc00::1".parse().unwrap()));
        assert!(is_private_ip(&"fd00::1".parse().unwrap()));
        assert!(is_private_ip(&"fe80::1".parse().unwrap()));
        assert!(is_private_ip(&"::ffff:127.0.0.1".parse().unwrap()));

        assert!(!is_private_ip(&"2001:4860:4860::8888".parse().unwrap()));
    }
}
