//! Request parsing.
//!
//! Turns the client's initial bytes into a method, a target and the
//! destination host and port. Only the request line and headers are looked
//! at; the raw bytes are forwarded untouched.

use thiserror::Error;
use url::{Host, Url};

/// Default port for plain HTTP destinations.
pub const HTTP_PORT: u16 = 80;

/// Why a request could not be turned into a forwardable destination.
/// Every variant is a MalformedRequest: the connection is closed silently.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty request line")]
    EmptyRequest,

    #[error("request line has no target: {0:?}")]
    MissingTarget(String),

    #[error("invalid port in Host header: {0:?}")]
    InvalidPort(String),

    #[error("no destination host for target {0:?}")]
    UnresolvedHost(String),
}

/// A parsed client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRequest {
    pub method: String,
    /// Request target exactly as sent. Also the cache key.
    pub target: String,
    pub host: String,
    pub port: u16,
    /// The bytes read from the client, forwarded verbatim.
    pub raw: Vec<u8>,
}

impl ProxyRequest {
    /// Parse the initial chunk read from the client.
    pub fn parse(raw: &[u8]) -> Result<Self, ParseError> {
        let text = String::from_utf8_lossy(raw);
        let mut lines = text.split("\r\n");

        let request_line = lines.next().unwrap_or_default();
        if request_line.is_empty() {
            return Err(ParseError::EmptyRequest);
        }

        let mut parts = request_line.split(' ');
        let method = parts.next().unwrap_or_default();
        let target = parts
            .next()
            .ok_or_else(|| ParseError::MissingTarget(request_line.to_string()))?;

        let (host, port) = match host_header(lines)? {
            Some(destination) => destination,
            None => destination_from_target(target)?,
        };

        Ok(Self {
            method: method.to_string(),
            target: target.to_string(),
            host,
            port,
            raw: raw.to_vec(),
        })
    }

    /// Only GET responses are served from or written to the cache.
    pub fn is_cacheable_method(&self) -> bool {
        self.method == "GET"
    }
}

/// First `Host:` header, split into host and port. An empty value counts as
/// absent.
fn host_header<'a>(
    lines: impl Iterator<Item = &'a str>,
) -> Result<Option<(String, u16)>, ParseError> {
    let Some(value) = lines
        .take_while(|line| !line.is_empty())
        .find(|line| line.get(..5).is_some_and(|name| name.eq_ignore_ascii_case("host:")))
        .and_then(|line| line.get(5..))
        .map(str::trim)
    else {
        return Ok(None);
    };

    match value.split_once(':') {
        Some((host, port)) => {
            if host.is_empty() {
                return Ok(None);
            }
            let port = port
                .trim()
                .parse::<u16>()
                .map_err(|_| ParseError::InvalidPort(value.to_string()))?;
            Ok(Some((host.to_string(), port)))
        }
        None if value.is_empty() => Ok(None),
        None => Ok(Some((value.to_string(), HTTP_PORT))),
    }
}

/// Destination taken from the target itself: an absolute URI, or failing
/// that the leading path segment as a bare host name.
fn destination_from_target(target: &str) -> Result<(String, u16), ParseError> {
    let unresolved = || ParseError::UnresolvedHost(target.to_string());

    if target.starts_with("http://") || target.starts_with("https://") {
        let url = Url::parse(target).map_err(|_| unresolved())?;
        let host = match url.host() {
            Some(Host::Domain(domain)) => domain.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            None => return Err(unresolved()),
        };
        let port = url.port_or_known_default().unwrap_or(HTTP_PORT);
        return Ok((host, port));
    }

    match target.split('/').next() {
        Some(host) if !host.is_empty() => Ok((host.to_string(), HTTP_PORT)),
        _ => Err(unresolved()),
    }
}
