//! Where a request goes: scheme, host, port and path.
//!
//! # Design
//! A `Target` is derived from a `RequestConfig` once per hop. Redirects
//! produce a new `Target` through `resolve_location`; the coordinator then
//! rebuilds the configuration from it, so every hop carries owned values and
//! nothing borrowed from the previous hop's buffer.

use serde::{Deserialize, Serialize};
use url::{Host, Url};

use crate::error::HttpcError;

/// URL scheme understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn from_tls(is_https: bool) -> Self {
        if is_https {
            Scheme::Https
        } else {
            Scheme::Http
        }
    }

    pub fn is_tls(self) -> bool {
        self == Scheme::Https
    }

    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "http" => Some(Scheme::Http),
            "https" => Some(Scheme::Https),
            _ => None,
        }
    }
}

/// The effective destination of one hop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    /// Path plus query, always starting with `/`.
    pub path: String,
}

impl Target {
    /// Split an absolute `http`/`https` URL into a target.
    pub fn from_url(url: &Url) -> Result<Self, HttpcError> {
        let scheme = Scheme::parse(url.scheme())
            .ok_or_else(|| HttpcError::Param(format!("unsupported scheme: {}", url.scheme())))?;
        // IPv6 literals are stored without brackets so they can be handed to
        // the resolver and used as a TLS server name directly.
        let host = match url.host() {
            Some(Host::Domain(domain)) if !domain.is_empty() => domain.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            _ => return Err(HttpcError::Param(format!("no host in {url}"))),
        };
        let port = url.port().unwrap_or_else(|| scheme.default_port());

        let mut path = url.path().to_string();
        if path.is_empty() {
            path.push('/');
        }
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }

        Ok(Target {
            scheme,
            host,
            port,
            path,
        })
    }

    /// Value for the `Host` header; the port is omitted when it is the
    /// scheme default.
    pub fn host_header(&self) -> String {
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        if self.port == self.scheme.default_port() {
            host
        } else {
            format!("{host}:{}", self.port)
        }
    }

    pub fn url(&self) -> String {
        format!("{}://{}{}", self.scheme.as_str(), self.host_header(), self.path)
    }

    /// Compute the next hop from a `Location` value.
    ///
    /// A value starting with a single `/` keeps scheme, host and port and
    /// replaces only the path. Anything else must be an absolute URL, or a
    /// reference that resolves against the current URL.
    pub fn resolve_location(&self, location: &str) -> Result<Target, HttpcError> {
        let location = location.trim();
        if location.is_empty() {
            return Err(HttpcError::Redirect("empty Location header".to_string()));
        }

        if location.starts_with('/') && !location.starts_with("//") {
            return Ok(Target {
                path: location.to_string(),
                ..self.clone()
            });
        }

        let resolved = match Url::parse(location) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&self.url())
                .and_then(|base| base.join(location))
                .map_err(|e| HttpcError::Redirect(format!("cannot resolve {location:?}: {e}")))?,
            Err(e) => {
                return Err(HttpcError::Redirect(format!("cannot parse {location:?}: {e}")));
            }
        };

        Target::from_url(&resolved).map_err(|e| HttpcError::Redirect(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::ToSocketAddrs;

    fn current() -> Target {
        Target {
            scheme: Scheme::Http,
            host: "cn.bing.com".to_string(),
            port: 80,
            path: "/translator".to_string(),
        }
    }

    #[test]
    fn relative_location_keeps_host_and_scheme() {
        let next = current().resolve_location("/new?q=1").unwrap();
        assert_eq!(next.host, "cn.bing.com");
        assert_eq!(next.scheme, Scheme::Http);
        assert_eq!(next.port, 80);
        assert_eq!(next.path, "/new?q=1");
    }

    #[test]
    fn absolute_location_switches_scheme_and_port() {
        let next = current()
            .resolve_location("https://www.bing.com/translator?ref=x#frag")
            .unwrap();
        assert_eq!(next.scheme, Scheme::Https);
        assert_eq!(next.host, "www.bing.com");
        assert_eq!(next.port, 443);
        assert_eq!(next.path, "/translator?ref=x");
    }

    #[test]
    fn absolute_location_with_explicit_port() {
        let next = current().resolve_location("http://127.0.0.1:8080").unwrap();
        assert_eq!(next.host, "127.0.0.1");
        assert_eq!(next.port, 8080);
        assert_eq!(next.path, "/");
    }

    #[test]
    fn bare_relative_reference_is_joined() {
        let next = current().resolve_location("other").unwrap();
        assert_eq!(next.host, "cn.bing.com");
        assert_eq!(next.path, "/other");
    }

    #[test]
    fn scheme_relative_location_changes_host() {
        let next = current().resolve_location("//example.org/x").unwrap();
        assert_eq!(next.host, "example.org");
        assert_eq!(next.scheme, Scheme::Http);
        assert_eq!(next.path, "/x");
    }

    #[test]
    fn empty_location_is_redirect_error() {
        let err = current().resolve_location("  ").unwrap_err();
        assert!(matches!(err, HttpcError::Redirect(_)));
    }

    #[test]
    fn unsupported_scheme_is_redirect_error() {
        let err = current().resolve_location("ftp://example.org/file").unwrap_err();
        assert!(matches!(err, HttpcError::Redirect(_)));
    }

    #[test]
    fn ipv6_location_host_has_no_brackets() {
        let next = current().resolve_location("http://[::1]:9/x").unwrap();
        assert_eq!(next.host, "::1");
        assert_eq!(next.port, 9);
        assert_eq!(next.host_header(), "[::1]:9");
        assert_eq!(next.url(), "http://[::1]:9/x");
        assert!(("::1", next.port).to_socket_addrs().is_ok());

        let next = current().resolve_location("https://[2001:db8::1]/").unwrap();
        assert_eq!(next.host, "2001:db8::1");
        assert_eq!(next.host_header(), "[2001:db8::1]");
    }

    #[test]
    fn host_header_omits_default_port() {
        let mut t = current();
        assert_eq!(t.host_header(), "cn.bing.com");
        t.port = 8080;
        assert_eq!(t.host_header(), "cn.bing.com:8080");
        assert_eq!(t.url(), "http://cn.bing.com:8080/translator");
    }
}
