use std::borrow::Cow;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use thiserror::Error;
use url::{Host, Url};

/// Host names refused regardless of what they resolve to.
const BLOCKED_HOSTNAMES: &[&str] = &["localhost", "metadata.google.internal"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidUrl {
    #[error("Please enter a URL")]
    Empty,

    #[error("Invalid URL: {0}")]
    Malformed(String),

    #[error("Only http and https URLs are supported, got {0}")]
    UnsupportedScheme(String),

    #[error("URL has no host")]
    MissingHost,

    #[error("URL points to a private or reserved address ({0})")]
    PrivateAddress(String),
}

/// Turn user input into a fetchable absolute URL.
///
/// Input without a scheme is treated as `https://`. The fragment is dropped
/// since it never reaches the server.
pub fn normalize_url(raw: &str) -> Result<Url, InvalidUrl> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(InvalidUrl::Empty);
    }

    let candidate: Cow<'_, str> = if has_scheme(trimmed) {
        Cow::Borrowed(trimmed)
    } else {
        Cow::Owned(format!("https://{trimmed}"))
    };

    let mut url = Url::parse(&candidate).map_err(|e| InvalidUrl::Malformed(e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(InvalidUrl::UnsupportedScheme(other.to_string())),
    }

    match url.host() {
        None => return Err(InvalidUrl::MissingHost),
        Some(Host::Domain(domain)) if domain.trim_end_matches('.').is_empty() => {
            return Err(InvalidUrl::MissingHost)
        }
        Some(_) => {}
    }

    if let Some(host) = blocked_host(&url) {
        return Err(InvalidUrl::PrivateAddress(host));
    }

    url.set_fragment(None);
    Ok(url)
}

/// Returns the offending host when `url` targets a blocked name or IP literal.
///
/// Only literals are inspected here; names that resolve to private space are
/// caught by the fetcher's resolver.
pub fn blocked_host(url: &Url) -> Option<String> {
    match url.host()? {
        Host::Domain(domain) => {
            let domain = domain.trim_end_matches('.').to_ascii_lowercase();
            is_blocked_hostname(&domain).then_some(domain)
        }
        Host::Ipv4(v4) => is_private_ip(IpAddr::V4(v4)).then(|| v4.to_string()),
        Host::Ipv6(v6) => is_private_ip(IpAddr::V6(v6)).then(|| v6.to_string()),
    }
}

fn is_blocked_hostname(domain: &str) -> bool {
    BLOCKED_HOSTNAMES.contains(&domain) || domain.ends_with(".localhost")
}

/// Returns `true` if `ip` is loopback, private, link-local, shared, reserved
/// or multicast space. `169.254.169.254` (cloud metadata) falls in link-local.
pub fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_private_v4(v4),
        IpAddr::V6(v6) => is_private_v6(v6),
    }
}

fn is_private_v4(v4: Ipv4Addr) -> bool {
    let o = v4.octets();
    matches!(
        o,
        [0, ..]
            | [10, ..]
            | [127, ..]
            | [169, 254, ..]
            | [192, 168, ..]
            | [192, 0, 0, _]
    ) || (o[0] == 172 && (16..=31).contains(&o[1]))
        || (o[0] == 100 && (64..=127).contains(&o[1]))
        || (o[0] == 198 && (18..=19).contains(&o[1]))
        || o[0] >= 224
}

fn is_private_v6(v6: Ipv6Addr) -> bool {
    if let Some(mapped) = v6.to_ipv4_mapped() {
        return is_private_v4(mapped);
    }
    let first = v6.segments()[0];
    v6.is_unspecified()
        || v6.is_loopback()
        || (first & 0xfe00 == 0xfc00)
        || (first & 0xffc0 == 0xfe80)
        || (first & 0xff00 == 0xff00)
}

/// `scheme://` prefix check. `Url::parse` alone would read `example.com:8080`
/// as scheme `example.com`.
fn has_scheme(input: &str) -> bool {
    match input.split_once("://") {
        Some((scheme, _)) => {
            !scheme.is_empty()
                && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}
