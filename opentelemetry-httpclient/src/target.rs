//! Call target resolution.
//!
//! Derives the identity of an outgoing call from the target host and the raw
//! request URI: the remote peer (`host:port`), the span operation name and the
//! fully qualified URL recorded on the span.
use std::fmt;
use std::str::FromStr;

use http::Uri;
use thiserror::Error;
use url::Url;

/// Operation name used when an absolute-looking request URI cannot be parsed.
pub const ERROR_URI: &str = "/_blank";

const HTTPS_SCHEME: &str = "https";
const HTTPS_DEFAULT_PORT: u16 = 443;
const HTTP_DEFAULT_PORT: u16 = 80;

/// Errors returned when an [`HttpHost`] cannot be derived.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TargetError {
    /// The input is not a valid URI.
    #[error("invalid target uri: {0}")]
    InvalidUri(#[from] http::uri::InvalidUri),

    /// The URI carries no scheme, e.g. a relative request path.
    #[error("target uri `{0}` has no scheme")]
    MissingScheme(String),

    /// The URI carries no host.
    #[error("target uri `{0}` has no host")]
    MissingHost(String),
}

/// The host an HTTP request is executed against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpHost {
    hostname: String,
    port: Option<u16>,
    scheme: String,
}

impl HttpHost {
    /// Create a new host. A missing or zero port falls back to the scheme
    /// default when resolved.
    pub fn new(hostname: impl Into<String>, port: Option<u16>, scheme: impl Into<String>) -> Self {
        HttpHost {
            hostname: hostname.into(),
            port,
            scheme: scheme.into(),
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// The explicitly configured port, if any.
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The port the call goes to: the explicit port when it is greater than
    /// zero, otherwise 443 for `https` (any case) and 80 for everything else.
    pub fn resolved_port(&self) -> u16 {
        match self.port {
            Some(port) if port > 0 => port,
            _ if self.scheme.eq_ignore_ascii_case(HTTPS_SCHEME) => HTTPS_DEFAULT_PORT,
            _ => HTTP_DEFAULT_PORT,
        }
    }

    /// The `host:port` identity of the remote peer.
    pub fn remote_peer(&self) -> String {
        format!("{}:{}", self.hostname, self.resolved_port())
    }
}

impl fmt::Display for HttpHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}://{}",
            self.scheme.to_ascii_lowercase(),
            self.remote_peer()
        )
    }
}

impl TryFrom<&Uri> for HttpHost {
    type Error = TargetError;

    fn try_from(uri: &Uri) -> Result<Self, Self::Error> {
        let scheme = uri
            .scheme_str()
            .ok_or_else(|| TargetError::MissingScheme(uri.to_string()))?;
        let hostname = uri
            .host()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| TargetError::MissingHost(uri.to_string()))?;

        Ok(HttpHost::new(hostname, uri.port_u16(), scheme))
    }
}

impl FromStr for HttpHost {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uri = s.parse::<Uri>()?;
        HttpHost::try_from(&uri)
    }
}

/// Whether the request URI is treated as an absolute URL.
///
/// This is a plain case-insensitive `http` prefix check, so strings such as
/// `httpxyz` count as absolute and end up as [`ERROR_URI`] once parsing fails.
pub fn is_url(uri: &str) -> bool {
    uri.get(..4)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("http"))
}

/// Derive the span operation name from the raw request URI.
///
/// Absolute URLs contribute their path exactly as written (`/` when the path
/// is empty, or [`ERROR_URI`] when the URL does not parse as an http(s) URL
/// with a host).
/// Anything else is used verbatim.
pub fn derive_operation_name(uri: &str) -> String {
    if !is_url(uri) {
        return uri.to_owned();
    }

    match Url::parse(uri) {
        Ok(url) if url.has_host() && matches!(url.scheme(), "http" | "https") => {
            let path = raw_path(uri);
            if path.is_empty() {
                "/".to_owned()
            } else {
                path.to_owned()
            }
        }
        _ => ERROR_URI.to_owned(),
    }
}

/// The path of an absolute URL as written: no dot-segment removal and no
/// percent-encoding, so it matches the recorded `url.full`.
fn raw_path(uri: &str) -> &str {
    let rest = uri.split_once(':').map_or(uri, |(_, rest)| rest);
    let rest = match rest.strip_prefix("//") {
        Some(authority_and_path) => {
            let start = authority_and_path
                .find(|c: char| matches!(c, '/' | '?' | '#'))
                .unwrap_or(authority_and_path.len());
            &authority_and_path[start..]
        }
        None => rest,
    };
    let end = rest
        .find(|c: char| matches!(c, '?' | '#'))
        .unwrap_or(rest.len());
    &rest[..end]
}

/// Build the fully qualified URL recorded on the span.
///
/// Absolute URIs are returned as they are; relative ones are appended to
/// `scheme://host:port` with the resolved port always spelled out.
pub fn build_url(host: &HttpHost, uri: &str) -> String {
    if is_url(uri) {
        uri.to_owned()
    } else {
        format!("{host}{uri}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("http://host/a/b", "/a/b")]
    #[case("https://host", "/")]
    #[case("HTTPS://Host:8443/Upper/Case?q=1", "/Upper/Case")]
    #[case("https://host?q=1", "/")]
    #[case("https://host/a/b#frag", "/a/b")]
    #[case("http://host/a/../b", "/a/../b")]
    #[case("http://host/a/./b", "/a/./b")]
    #[case("http://host/{x}", "/{x}")]
    #[case("http://host/a%7Eb/c d", "/a%7Eb/c d")]
    #[case("http://", ERROR_URI)]
    #[case("httpxyz", ERROR_URI)]
    #[case("httpfoo://host/path", ERROR_URI)]
    #[case("/relative/path?x=1", "/relative/path?x=1")]
    #[case("*", "*")]
    #[case("", "")]
    fn operation_name(#[case] uri: &str, #[case] expected: &str) {
        assert_eq!(derive_operation_name(uri), expected);
    }

    #[rstest]
    #[case(HttpHost::new("host", Some(8443), "https"), "host:8443")]
    #[case(HttpHost::new("host", None, "https"), "host:443")]
    #[case(HttpHost::new("host", None, "HTTPS"), "host:443")]
    #[case(HttpHost::new("host", None, "http"), "host:80")]
    #[case(HttpHost::new("host", Some(0), "https"), "host:443")]
    #[case(HttpHost::new("host", None, "ws"), "host:80")]
    fn remote_peer(#[case] host: HttpHost, #[case] expected: &str) {
        assert_eq!(host.remote_peer(), expected);
    }

    #[test]
    fn build_url_for_relative_uri() {
        let host = HttpHost::new("example.com", Some(8080), "http");
        assert_eq!(
            build_url(&host, "/path"),
            "http://example.com:8080/path"
        );

        let host = HttpHost::new("api.example.com", None, "HTTPS");
        assert_eq!(
            build_url(&host, "/status"),
            "https://api.example.com:443/status"
        );
    }

    #[test]
    fn build_url_keeps_absolute_uri() {
        let host = HttpHost::new("example.com", Some(8080), "http");
        assert_eq!(
            build_url(&host, "https://other.example.com/x?y=z"),
            "https://other.example.com/x?y=z"
        );
    }

    #[test]
    fn host_from_uri() {
        let host: HttpHost = "https://api.example.com:8443/status".parse().unwrap();
        assert_eq!(host, HttpHost::new("api.example.com", Some(8443), "https"));

        let host = HttpHost::try_from(&Uri::from_static("http://example.com/")).unwrap();
        assert_eq!(host.port(), None);
        assert_eq!(host.remote_peer(), "example.com:80");
    }

    #[test]
    fn host_from_relative_uri_fails() {
        let err = HttpHost::try_from(&Uri::from_static("/status")).unwrap_err();
        assert!(matches!(err, TargetError::MissingScheme(_)));

        let err = "not a uri".parse::<HttpHost>().unwrap_err();
        assert!(matches!(err, TargetError::InvalidUri(_)));
    }
}
