//! Minimal `ws(s)://host[:port]/path[?query]` parser.
//!
//! The venue is always addressed over WebSocket, so this does not aim to be a general URL parser
//! (that is an explicit non-goal) — only the handful of fields the session needs to open a
//! connection.

use crate::error::Error;

/// A parsed venue address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uri {
    /// `http`, `https`, `ws`, or `wss`.
    pub protocol: String,
    /// Host, e.g. `test.deribit.com`.
    pub domain: String,
    /// Port, defaulted to `"80"` for insecure schemes and `"443"` for secure ones.
    pub port: String,
    /// Path, defaulted to `"/"`.
    pub resource: String,
    /// Everything after `?`, or an empty string.
    pub query: String,
}

impl Uri {
    /// `true` for `https`/`wss`.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        matches!(self.protocol.as_str(), "https" | "wss")
    }

    /// Reassembles the host-and-port pair used for the WebSocket handshake's `Host` header.
    #[must_use]
    pub fn authority(&self) -> String {
        format!("{}:{}", self.domain, self.port)
    }
}

/// Parse a venue address.
///
/// # Errors
///
/// Returns [`Error::InvalidUri`] if `input` has no domain component.
pub fn parse(input: &str) -> Result<Uri, Error> {
    let (scheme, rest) = match input.split_once("://") {
        Some((scheme, rest)) => (Some(scheme.to_ascii_lowercase()), rest),
        None => (None, input),
    };

    let (authority, path_and_query) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, ""),
    };

    let (domain, explicit_port) = match authority.split_once(':') {
        Some((domain, port)) => (domain, Some(port)),
        None => (authority, None),
    };

    if domain.is_empty() {
        return Err(Error::InvalidUri(input.to_owned()));
    }

    let protocol = scheme.unwrap_or_else(|| "http".to_owned());
    let is_secure = matches!(protocol.as_str(), "https" | "wss");

    let port = explicit_port
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| if is_secure { "443" } else { "80" }.to_owned());

    let (path, query) = match path_and_query.split_once('?') {
        Some((path, query)) => (path, query),
        None => (path_and_query, ""),
    };

    let resource = if path.is_empty() { "/" } else { path }.to_owned();

    Ok(Uri {
        protocol,
        domain: domain.to_owned(),
        port,
        resource,
        query: query.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_wss_uri() {
        let uri = parse("wss://test.deribit.com/ws/api/v2").unwrap();
        assert_eq!(uri.protocol, "wss");
        assert_eq!(uri.domain, "test.deribit.com");
        assert_eq!(uri.port, "443");
        assert_eq!(uri.resource, "/ws/api/v2");
        assert_eq!(uri.query, "");
    }

    #[test]
    fn bare_http_host_defaults_port_and_resource() {
        let uri = parse("http://x").unwrap();
        assert_eq!(uri.protocol, "http");
        assert_eq!(uri.port, "80");
        assert_eq!(uri.resource, "/");
    }

    #[test]
    fn explicit_port_and_query_are_preserved() {
        let uri = parse("ws://localhost:8080/feed?token=abc").unwrap();
        assert_eq!(uri.port, "8080");
        assert_eq!(uri.resource, "/feed");
        assert_eq!(uri.query, "token=abc");
    }

    #[test]
    fn scheme_defaults_to_http_when_absent() {
        let uri = parse("example.com/path").unwrap();
        assert_eq!(uri.protocol, "http");
        assert_eq!(uri.port, "80");
    }

    #[test]
    fn empty_domain_is_rejected() {
        assert!(parse("wss:///path").is_err());
    }
}
