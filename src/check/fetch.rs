use std::error::Error as StdError;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use encoding_rs::{Encoding, UTF_8};
use once_cell::sync::Lazy;
use regex::bytes::Regex;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::redirect::Policy;
use reqwest::{Client, Response, StatusCode};
use thiserror::Error;
use url::Url;

use super::normalize::{blocked_host, is_private_ip};
use crate::models::ErrorKind;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_REDIRECTS: usize = 5;
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;
pub const DEFAULT_USER_AGENT: &str = concat!(
    "Mozilla/5.0 (compatible; SharecardBot/",
    env!("CARGO_PKG_VERSION"),
    "; +https://github.com/sharecard/sharecard-server)"
);
pub const ACCEPT_HTML: &str = "text/html,application/xhtml+xml;q=0.9,*/*;q=0.1";

/// How far into the body we look for `<meta charset>`.
const CHARSET_SNIFF_BYTES: usize = 1024;

static META_CHARSET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i-u)<meta[^>]+charset\s*=\s*["']?\s*([a-z0-9_:.\-]+)"#)
        .expect("meta charset regex is valid")
});

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub max_redirects: usize,
    pub max_body_bytes: usize,
    pub user_agent: String,
    /// Refuse hosts that resolve into private space and redirects to private
    /// literals. Only disabled by tests that talk to a local mock server.
    pub block_private_addresses: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            timeout: DEFAULT_TIMEOUT,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            block_private_addresses: true,
        }
    }
}

/// A successfully retrieved HTML document.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub html: String,
    pub final_url: Url,
    pub status: u16,
    pub elapsed_ms: u64,
    pub truncated: bool,
    pub charset: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FetchError {
    pub kind: ErrorKind,
    pub message: String,
    pub elapsed_ms: u64,
}

impl FetchError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, elapsed_ms: u64) -> Self {
        FetchError {
            kind,
            message: message.into(),
            elapsed_ms,
        }
    }
}

/// Source of page HTML for the pipeline.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError>;
}

// ── Transport guard errors ────────────────────────────────────────────────

#[derive(Debug, Error)]
#[error("too many redirects (limit {0})")]
struct TooManyRedirects(usize);

#[derive(Debug, Error)]
#[error("redirect to private or reserved address {0} refused")]
struct BlockedRedirect(String);

#[derive(Debug, Error)]
enum ResolveError {
    #[error("could not resolve {host}: {source}")]
    Lookup {
        host: String,
        source: std::io::Error,
    },

    #[error("{0} did not resolve to any address")]
    NoAddresses(String),

    #[error("{0} resolves only to private or reserved addresses")]
    Blocked(String),
}

type BoxError = Box<dyn StdError + Send + Sync>;

/// Resolver that drops private and reserved addresses before connecting.
struct GuardedResolver;

impl Resolve for GuardedResolver {
    fn resolve(&self, name: Name) -> Resolving {
        Box::pin(resolve_public(name.as_str().to_string()))
    }
}

async fn resolve_public(host: String) -> Result<Addrs, BoxError> {
    let resolved: Vec<SocketAddr> = tokio::net::lookup_host((host.as_str(), 0))
        .await
        .map_err(|source| ResolveError::Lookup {
            host: host.clone(),
            source,
        })?
        .collect();

    if resolved.is_empty() {
        return Err(ResolveError::NoAddresses(host).into());
    }

    let allowed: Vec<SocketAddr> = resolved
        .into_iter()
        .filter(|addr| !is_private_ip(addr.ip()))
        .collect();
    if allowed.is_empty() {
        tracing::warn!(host = %host, "Refusing host that resolves to private space");
        return Err(ResolveError::Blocked(host).into());
    }

    Ok(Box::new(allowed.into_iter()))
}

// ── Fetcher ───────────────────────────────────────────────────────────────

/// reqwest-backed fetcher. The client is built once and shared by every
/// check; cloning is cheap.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    config: Arc<FetchConfig>,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig) -> Result<Self, reqwest::Error> {
        let max_redirects = config.max_redirects;
        let block_private = config.block_private_addresses;

        let policy = Policy::custom(move |attempt| {
            if attempt.previous().len() > max_redirects {
                return attempt.error(TooManyRedirects(max_redirects));
            }
            if block_private {
                if let Some(host) = blocked_host(attempt.url()) {
                    return attempt.error(BlockedRedirect(host));
                }
            }
            attempt.follow()
        });

        let mut builder = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .redirect(policy);
        if block_private {
            builder = builder.dns_resolver(Arc::new(GuardedResolver));
        }

        Ok(HttpFetcher {
            client: builder.build()?,
            config: Arc::new(config),
        })
    }

    async fn fetch_once(&self, url: &Url, started: Instant) -> Result<FetchedPage, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, ACCEPT_HTML)
            .send()
            .await
            .map_err(|e| classify_transport(&e, elapsed_ms(started)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, elapsed_ms(started)));
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        if let Some(ct) = content_type.as_deref() {
            if !is_html_content_type(ct) {
                return Err(FetchError::new(
                    ErrorKind::NotHtml,
                    format!("Expected an HTML page but the server sent {}", mime_essence(ct)),
                    elapsed_ms(started),
                ));
            }
        }

        let (body, truncated) = read_capped(response, self.config.max_body_bytes)
            .await
            .map_err(|e| classify_transport(&e, elapsed_ms(started)))?;

        if content_type.is_none() {
            if let Some(kind) = infer::get(&body) {
                if kind.matcher_type() != infer::MatcherType::Text {
                    return Err(FetchError::new(
                        ErrorKind::NotHtml,
                        format!("Expected an HTML page but the body looks like {}", kind.mime_type()),
                        elapsed_ms(started),
                    ));
                }
            }
        }

        if truncated {
            tracing::debug!(url = %final_url, cap = self.config.max_body_bytes, "Response body truncated");
        }

        let (html, charset) = decode_body(&body, content_type.as_deref());

        Ok(FetchedPage {
            html,
            final_url,
            status: status.as_u16(),
            elapsed_ms: elapsed_ms(started),
            truncated,
            charset,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let started = Instant::now();
        // The outer timeout drops the request future, aborting DNS, connect
        // or body reads that are still in flight.
        match tokio::time::timeout(self.config.timeout, self.fetch_once(url, started)).await {
            Ok(result) => result,
            Err(_) => Err(timeout_error(self.config.timeout, elapsed_ms(started))),
        }
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn timeout_error(limit: Duration, elapsed_ms: u64) -> FetchError {
    FetchError::new(
        ErrorKind::Timeout,
        format!(
            "The site did not respond within {} seconds",
            limit.as_secs_f32()
        ),
        elapsed_ms,
    )
}

async fn read_capped(mut response: Response, cap: usize) -> Result<(Vec<u8>, bool), reqwest::Error> {
    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let remaining = cap.saturating_sub(body.len());
        if chunk.len() > remaining {
            body.extend_from_slice(&chunk[..remaining]);
            return Ok((body, true));
        }
        body.extend_from_slice(&chunk);
    }
    Ok((body, false))
}

fn mime_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

pub fn is_html_content_type(content_type: &str) -> bool {
    matches!(
        mime_essence(content_type).as_str(),
        "text/html" | "application/xhtml+xml"
    )
}

fn charset_from_content_type(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches(|c| c == '"' || c == '\''))
    })
}

fn sniff_meta_charset(body: &[u8]) -> Option<&'static Encoding> {
    let head = &body[..body.len().min(CHARSET_SNIFF_BYTES)];
    let label = META_CHARSET.captures(head)?.get(1)?;
    Encoding::for_label(label.as_bytes())
}

/// Decode with the header charset, else a byte-order mark, else
/// `<meta charset>`, else UTF-8. Invalid sequences become U+FFFD.
pub fn decode_body(body: &[u8], content_type: Option<&str>) -> (String, &'static str) {
    let encoding = content_type
        .and_then(charset_from_content_type)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .or_else(|| Encoding::for_bom(body).map(|(encoding, _)| encoding))
        .or_else(|| sniff_meta_charset(body))
        .unwrap_or(UTF_8);

    let (text, used, _) = encoding.decode(body);
    (text.into_owned(), used.name())
}

pub fn classify_status(status: StatusCode, elapsed_ms: u64) -> FetchError {
    let code = status.as_u16();
    let (kind, message) = match code {
        401 | 403 | 429 => (
            ErrorKind::Blocked,
            format!("The site refused our request (HTTP {code}); it may block preview bots"),
        ),
        404 | 410 => (
            ErrorKind::NotFound,
            format!("The page was not found (HTTP {code})"),
        ),
        500..=599 => (
            ErrorKind::ServerError,
            format!("The site returned a server error (HTTP {code})"),
        ),
        _ => (
            ErrorKind::Unknown,
            format!("The site returned an unexpected status (HTTP {code})"),
        ),
    };
    FetchError::new(kind, message, elapsed_ms)
}

fn error_chain<'a>(
    err: &'a (dyn StdError + 'static),
) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    std::iter::successors(Some(err), |e| (*e).source())
}

fn classify_transport(err: &reqwest::Error, elapsed_ms: u64) -> FetchError {
    let kind = transport_kind(err);
    tracing::debug!(error = ?err, kind = %kind, "Fetch failed");

    let message = match kind {
        ErrorKind::Timeout => "The site took too long to respond".to_string(),
        ErrorKind::Dns => "Could not resolve the site's domain name".to_string(),
        ErrorKind::Ssl => "The site's TLS certificate or handshake is invalid".to_string(),
        ErrorKind::Blocked => "The site points at a private or reserved address".to_string(),
        ErrorKind::Network if err.is_redirect() => "The site redirected too many times".to_string(),
        ErrorKind::Network => "Could not connect to the site".to_string(),
        _ => format!("Failed to fetch the page: {err}"),
    };
    FetchError::new(kind, message, elapsed_ms)
}

fn transport_kind(err: &reqwest::Error) -> ErrorKind {
    for cause in error_chain(err) {
        if cause.downcast_ref::<BlockedRedirect>().is_some() {
            return ErrorKind::Blocked;
        }
        if cause.downcast_ref::<TooManyRedirects>().is_some() {
            return ErrorKind::Network;
        }
        if let Some(resolve) = cause.downcast_ref::<ResolveError>() {
            return match resolve {
                ResolveError::Blocked(_) => ErrorKind::Blocked,
                ResolveError::Lookup { .. } | ResolveError::NoAddresses(_) => ErrorKind::Dns,
            };
        }
    }

    if err.is_timeout() {
        return ErrorKind::Timeout;
    }
    if err.is_redirect() {
        return ErrorKind::Network;
    }

    let chain = error_chain(err)
        .map(|e| e.to_string().to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join(": ");

    if chain.contains("dns error")
        || chain.contains("failed to lookup address")
        || chain.contains("name or service not known")
        || chain.contains("no such host")
    {
        ErrorKind::Dns
    } else if chain.contains("certificate")
        || chain.contains("tls")
        || chain.contains("ssl")
        || chain.contains("handshake")
    {
        ErrorKind::Ssl
    } else if err.is_connect() || err.is_body() {
        ErrorKind::Network
    } else {
        ErrorKind::Unknown
    }
}
