//! Inbox service address
//!
//! The demo historically addressed the server as a bare `host:port`.
//! Both that form and a full `http(s)://` base URL are accepted here.

use std::fmt;
use std::str::FromStr;

/// Base URL of the inbox service, without a trailing slash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base: String,
}

#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("Endpoint is empty")]
    Empty,
    #[error("Unsupported scheme in endpoint: {0}")]
    UnsupportedScheme(String),
    #[error("Endpoint has no host: {0}")]
    MissingHost(String),
}

impl Endpoint {
    pub fn parse(raw: &str) -> Result<Self, EndpointError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(EndpointError::Empty);
        }

        let base = match trimmed.split_once("://") {
            Some((scheme, rest)) => {
                if scheme != "http" && scheme != "https" {
                    return Err(EndpointError::UnsupportedScheme(scheme.to_string()));
                }
                let host = rest.trim_end_matches('/');
                if host.is_empty() {
                    return Err(EndpointError::MissingHost(raw.to_string()));
                }
                format!("{}://{}", scheme, host)
            }
            None => {
                let host = trimmed.trim_end_matches('/');
                if host.is_empty() {
                    return Err(EndpointError::MissingHost(raw.to_string()));
                }
                format!("http://{}", host)
            }
        };

        Ok(Self { base })
    }

    /// Join a path onto the base URL. Leading slashes on `path` are ignored.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    /// URL of a per-recipient route, e.g. `/{id}/pk`
    pub fn recipient_url(&self, recipient: u32, path: &str) -> String {
        self.url(&format!("{}/{}", recipient, path.trim_start_matches('/')))
    }

    pub fn as_str(&self) -> &str {
        &self.base
    }
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_host_port_gets_http() {
        let ep = Endpoint::parse("localhost:8080").unwrap();
        assert_eq!(ep.as_str(), "http://localhost:8080");
        assert_eq!(ep.recipient_url(1, "pk"), "http://localhost:8080/1/pk");
    }

    #[test]
    fn test_full_url_kept() {
        let ep = Endpoint::parse("https://inbox.example.org/").unwrap();
        assert_eq!(ep.url("/ping"), "https://inbox.example.org/ping");
        assert_eq!(ep.recipient_url(7, "/inbox/len"), "https://inbox.example.org/7/inbox/len");
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(Endpoint::parse("   "), Err(EndpointError::Empty)));
        assert!(matches!(
            Endpoint::parse("ftp://host:21"),
            Err(EndpointError::UnsupportedScheme(_))
        ));
        assert!(matches!(Endpoint::parse("http://"), Err(EndpointError::MissingHost(_))));
    }
}
