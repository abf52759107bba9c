// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Error types for httpjar
//!
//! Request failures carry the URL and the proxy that was in use so callers
//! can log or rotate proxies without keeping their own bookkeeping.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for httpjar operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for httpjar
#[derive(Error, Debug)]
pub enum Error {
    /// Request failed in the transport or was killed by the watchdog
    #[error(transparent)]
    Request(#[from] RequestError),

    /// Cookie specification could not be stored
    #[error("Cookie error: {0}")]
    Cookie(#[from] CookieParseError),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Response body is not valid UTF-8
    #[error("Invalid UTF-8 in body: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Failure of a single request, delivered through the same channel as a
/// successful response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// Network, DNS, TLS or protocol failure reported by the transport
    #[error("{message} ({url})")]
    Transport {
        message: String,
        url: String,
        proxy: Option<String>,
    },

    /// The software deadline expired before the transport completed
    #[error("{message} ({url}, {}ms)", .elapsed.as_millis())]
    WatchdogTimeout {
        message: String,
        url: String,
        proxy: Option<String>,
        elapsed: Duration,
    },
}

impl RequestError {
    /// Create a transport error
    pub fn transport(
        message: impl Into<String>,
        url: impl Into<String>,
        proxy: Option<String>,
    ) -> Self {
        RequestError::Transport {
            message: message.into(),
            url: url.into(),
            proxy,
        }
    }

    /// Create a watchdog timeout error
    pub fn watchdog(url: impl Into<String>, proxy: Option<String>, elapsed: Duration) -> Self {
        RequestError::WatchdogTimeout {
            message: "Something went wrong and timeout expired".to_string(),
            url: url.into(),
            proxy,
            elapsed,
        }
    }

    /// The requested URL
    pub fn url(&self) -> &str {
        match self {
            RequestError::Transport { url, .. } | RequestError::WatchdogTimeout { url, .. } => url,
        }
    }

    /// The proxy in use when the request failed
    pub fn proxy(&self) -> Option<&str> {
        match self {
            RequestError::Transport { proxy, .. }
            | RequestError::WatchdogTimeout { proxy, .. } => proxy.as_deref(),
        }
    }

    /// Human readable failure message
    pub fn message(&self) -> &str {
        match self {
            RequestError::Transport { message, .. }
            | RequestError::WatchdogTimeout { message, .. } => message,
        }
    }

    /// Check if the watchdog fired
    pub fn is_watchdog(&self) -> bool {
        matches!(self, RequestError::WatchdogTimeout { .. })
    }
}

/// Malformed or rejected cookie specification
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CookieParseError {
    #[error("cookie specification is empty")]
    Empty,

    #[error("cookie specification has no name=value pair: {0:?}")]
    MissingNameValue(String),

    #[error("cookie name is empty")]
    EmptyName,

    #[error("cookie domain {domain:?} does not match host {host:?}")]
    DomainMismatch { domain: String, host: String },

    #[error("URL has no host: {0}")]
    NoHost(String),
}

/// A request result was about to be delivered a second time.
///
/// This is an internal invariant violation. It is never returned to callers
/// of the client; the request driver treats it as fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("trying to deliver a request result twice: {url}")]
pub struct DoubleCompletion {
    pub url: String,
}

impl Error {
    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Request(RequestError::WatchdogTimeout { .. }))
    }

    /// Check if this is a network error
    pub fn is_network(&self) -> bool {
        matches!(self, Error::Request(_))
    }

    /// Check if this is recoverable (caller may retry)
    pub fn is_recoverable(&self) -> bool {
        self.is_network()
    }

    /// Get URL if available
    pub fn url(&self) -> Option<&str> {
        match self {
            Error::Request(err) => Some(err.url()),
            _ => None,
        }
    }

    /// Get the proxy in use if available
    pub fn proxy(&self) -> Option<&str> {
        match self {
            Error::Request(err) => err.proxy(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_error_accessors() {
        let err = RequestError::transport(
            "Could not resolve host",
            "http://example.invalid/",
            Some("10.0.0.1:3128".to_string()),
        );

        assert_eq!(err.url(), "http://example.invalid/");
        assert_eq!(err.proxy(), Some("10.0.0.1:3128"));
        assert_eq!(err.message(), "Could not resolve host");
        assert!(!err.is_watchdog());
    }

    #[test]
    fn test_watchdog_error() {
        let err: Error =
            RequestError::watchdog("https://example.com", None, Duration::from_secs(41)).into();

        assert!(err.is_timeout());
        assert!(err.is_recoverable());
        assert_eq!(err.url(), Some("https://example.com"));
        assert_eq!(err.proxy(), None);
        assert!(err.to_string().contains("41000ms"));
    }

    #[test]
    fn test_cookie_error_is_not_network() {
        let err: Error = CookieParseError::EmptyName.into();
        assert!(!err.is_network());
        assert_eq!(err.url(), None);
    }
}
