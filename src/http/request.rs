// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Request configuration: per-call options, merging, and header assembly

use std::collections::BTreeMap;
use std::time::Duration;

use base64::Engine;
use bytes::Bytes;
use serde::Serialize;
use url::form_urlencoded;

use super::{defaults, headers};
use crate::error::Result;

/// HTTP proxy with optional credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Proxy address, `host:port` or a full `http://` URL
    pub address: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProxyConfig {
    /// Create a proxy without credentials
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            username: None,
            password: None,
        }
    }

    /// Attach credentials given as `user:password`
    pub fn credentials(mut self, user_pass: &str) -> Self {
        let (user, pass) = user_pass.split_once(':').unwrap_or((user_pass, ""));
        self.username = Some(user.to_string());
        self.password = Some(pass.to_string());
        self
    }
}

/// Authorization header sent with a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    Basic { username: String, password: String },
    Bearer(String),
}

impl Authorization {
    /// Header value for this authorization
    pub fn header_value(&self) -> String {
        match self {
            Authorization::Basic { username, password } => {
                let encoded = base64::engine::general_purpose::STANDARD
                    .encode(format!("{}:{}", username, password));
                format!("Basic {}", encoded)
            }
            Authorization::Bearer(token) => format!("Bearer {}", token),
        }
    }
}

/// Partial request configuration.
///
/// Used for both the client-level layer and the per-call layer; every unset
/// field falls through to the layer below.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub body: Option<Bytes>,
    pub timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    /// Abort when the transfer stalls for this long
    pub low_speed_time: Option<Duration>,
    /// Bytes per second below which the transfer counts as stalled
    pub low_speed_limit: Option<u32>,
    pub proxy: Option<ProxyConfig>,
    pub follow_redirects: Option<bool>,
    pub user_agent: Option<String>,
    pub accept: Option<String>,
    pub accept_language: Option<String>,
    pub accept_encoding: Option<String>,
    pub connection: Option<String>,
    pub cache_control: Option<String>,
    pub proxy_connection: Option<String>,
    pub content_type: Option<String>,
    pub referer: Option<String>,
    /// Raw `Name: value` lines appended after the standard headers
    pub headers: Vec<String>,
    /// Do not send `Accept-Encoding`
    pub no_deflate: Option<bool>,
    /// Send `X-Requested-With: XMLHttpRequest`
    pub ajax: Option<bool>,
    pub origin: Option<String>,
    pub authorization: Option<Authorization>,
}

impl RequestOptions {
    /// Create empty options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the request body
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set JSON body and content type
    pub fn json<T: Serialize>(mut self, data: &T) -> Result<Self> {
        self.body = Some(Bytes::from(serde_json::to_vec(data)?));
        self.content_type = Some(defaults::JSON_CONTENT_TYPE.to_string());
        Ok(self)
    }

    /// Set form body
    pub fn form(mut self, data: &BTreeMap<String, String>) -> Self {
        let body = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(data)
            .finish();
        self.body = Some(Bytes::from(body));
        self.content_type = Some(defaults::FORM_CONTENT_TYPE.to_string());
        self
    }

    /// Set read timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set low-speed threshold
    pub fn low_speed(mut self, time: Duration, bytes_per_sec: u32) -> Self {
        self.low_speed_time = Some(time);
        self.low_speed_limit = Some(bytes_per_sec);
        self
    }

    /// Route through a proxy
    pub fn proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Set follow redirects
    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = Some(follow);
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Set Accept
    pub fn accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    /// Set Accept-Language
    pub fn accept_language(mut self, language: impl Into<String>) -> Self {
        self.accept_language = Some(language.into());
        self
    }

    /// Set content type
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Set referer
    pub fn referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    /// Append a raw header line
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.headers
            .push(format!("{}: {}", name.as_ref(), value.as_ref()));
        self
    }

    /// Append a header line verbatim
    pub fn raw_header(mut self, line: impl Into<String>) -> Self {
        self.headers.push(line.into());
        self
    }

    /// Suppress `Accept-Encoding`
    pub fn no_deflate(mut self, no_deflate: bool) -> Self {
        self.no_deflate = Some(no_deflate);
        self
    }

    /// Mark as an XHR request
    pub fn ajax(mut self, ajax: bool) -> Self {
        self.ajax = Some(ajax);
        self
    }

    /// Set Origin
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Use basic auth
    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.authorization = Some(Authorization::Basic {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Use a bearer token
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.authorization = Some(Authorization::Bearer(token.into()));
        self
    }
}

/// Fully resolved configuration of one request
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub body: Option<Bytes>,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub low_speed_time: Duration,
    pub low_speed_limit: u32,
    pub proxy: Option<ProxyConfig>,
    pub follow_redirects: bool,
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
    pub accept_encoding: String,
    pub connection: String,
    pub cache_control: String,
    pub proxy_connection: String,
    pub content_type: Option<String>,
    pub referer: Option<String>,
    pub headers: Vec<String>,
    pub no_deflate: bool,
    pub ajax: bool,
    pub origin: Option<String>,
    pub authorization: Option<Authorization>,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            body: None,
            timeout: defaults::TIMEOUT,
            connect_timeout: defaults::CONNECT_TIMEOUT,
            low_speed_time: defaults::TIMEOUT,
            low_speed_limit: defaults::LOW_SPEED_LIMIT,
            proxy: None,
            follow_redirects: true,
            user_agent: defaults::USER_AGENT.to_string(),
            accept: defaults::ACCEPT.to_string(),
            accept_language: defaults::ACCEPT_LANGUAGE.to_string(),
            accept_encoding: defaults::ACCEPT_ENCODING.to_string(),
            connection: "close".to_string(),
            cache_control: "max-age=0".to_string(),
            proxy_connection: "close".to_string(),
            content_type: None,
            referer: None,
            headers: Vec::new(),
            no_deflate: false,
            ajax: false,
            origin: None,
            authorization: None,
        }
    }
}

impl RequestConfig {
    /// Resolve library defaults, then client options, then call options
    pub fn resolve(client: &RequestOptions, call: &RequestOptions) -> Self {
        Self::default().merge(client).merge(call)
    }

    /// Overlay a set of options; set fields win
    pub fn merge(self, options: &RequestOptions) -> Self {
        let o = options.clone();
        // low-speed time tracks the timeout unless set explicitly
        let timeout = o.timeout.unwrap_or(self.timeout);
        let low_speed_time = match (o.low_speed_time, o.timeout) {
            (Some(time), _) => time,
            (None, Some(timeout)) => timeout,
            (None, None) => self.low_speed_time,
        };
        let mut headers = self.headers;
        headers.extend(o.headers);

        Self {
            body: o.body.or(self.body),
            timeout,
            connect_timeout: o.connect_timeout.unwrap_or(self.connect_timeout),
            low_speed_time,
            low_speed_limit: o.low_speed_limit.unwrap_or(self.low_speed_limit),
            proxy: o.proxy.or(self.proxy),
            follow_redirects: o.follow_redirects.unwrap_or(self.follow_redirects),
            user_agent: o.user_agent.unwrap_or(self.user_agent),
            accept: o.accept.unwrap_or(self.accept),
            accept_language: o.accept_language.unwrap_or(self.accept_language),
            accept_encoding: o.accept_encoding.unwrap_or(self.accept_encoding),
            connection: o.connection.unwrap_or(self.connection),
            cache_control: o.cache_control.unwrap_or(self.cache_control),
            proxy_connection: o.proxy_connection.unwrap_or(self.proxy_connection),
            content_type: o.content_type.or(self.content_type),
            referer: o.referer.or(self.referer),
            headers,
            no_deflate: o.no_deflate.unwrap_or(self.no_deflate),
            ajax: o.ajax.unwrap_or(self.ajax),
            origin: o.origin.or(self.origin),
            authorization: o.authorization.or(self.authorization),
        }
    }

    /// Deadline after which the watchdog fails the request
    pub fn watchdog_limit(&self) -> Duration {
        (self.timeout + self.connect_timeout) * defaults::WATCHDOG_FACTOR
    }

    /// Proxy address reported with responses and errors
    pub fn proxy_address(&self) -> Option<String> {
        self.proxy.as_ref().map(|p| p.address.clone())
    }

    /// Assemble the outbound header lines.
    ///
    /// Order matters and keys may repeat: extra headers are appended after
    /// the standard set without deduplication.
    pub fn header_lines(&self, cookie_header: &str) -> Vec<String> {
        let mut lines = Vec::with_capacity(16 + self.headers.len());

        if !cookie_header.is_empty() {
            lines.push(format!("{}: {}", headers::COOKIE, cookie_header));
        }
        match (&self.content_type, &self.body) {
            (Some(content_type), _) => {
                lines.push(format!("{}: {}", headers::CONTENT_TYPE, content_type))
            }
            (None, Some(_)) => lines.push(format!(
                "{}: {}",
                headers::CONTENT_TYPE,
                defaults::FORM_CONTENT_TYPE
            )),
            (None, None) => {}
        }
        lines.push(format!("{}: {}", headers::CONNECTION, self.connection));
        lines.push(format!("{}: {}", headers::ACCEPT, self.accept));
        lines.push(format!("{}: {}", headers::ACCEPT_LANGUAGE, self.accept_language));
        lines.push(format!("{}: {}", headers::USER_AGENT, self.user_agent));
        lines.push(format!("{}: {}", headers::CACHE_CONTROL, self.cache_control));
        lines.push(format!("{}: {}", headers::PROXY_CONNECTION, self.proxy_connection));
        if let Some(referer) = &self.referer {
            lines.push(format!("{}: {}", headers::REFERER, referer));
        }
        if !self.no_deflate {
            lines.push(format!("{}: {}", headers::ACCEPT_ENCODING, self.accept_encoding));
        }
        lines.extend(self.headers.iter().cloned());
        // empty Expect keeps the transport from negotiating 100-continue
        lines.push(format!("{}:", headers::EXPECT));
        if self.ajax {
            lines.push(format!("{}: XMLHttpRequest", headers::X_REQUESTED_WITH));
        }
        if let Some(origin) = &self.origin {
            lines.push(format!("{}: {}", headers::ORIGIN, origin));
        }
        if let Some(auth) = &self.authorization {
            lines.push(format!("{}: {}", headers::AUTHORIZATION, auth.header_value()));
        }

        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(lines: &[String]) -> Vec<&str> {
        lines
            .iter()
            .map(|l| l.split(':').next().unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = RequestConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.low_speed_time, Duration::from_secs(15));
        assert!(config.follow_redirects);
        assert_eq!(config.watchdog_limit(), Duration::from_secs(40));
    }

    #[test]
    fn test_merge_order() {
        let client = RequestOptions::new()
            .timeout(Duration::from_secs(30))
            .user_agent("client-agent")
            .referer("https://client.example/")
            .header("X-Client", "1");
        let call = RequestOptions::new()
            .user_agent("call-agent")
            .header("X-Call", "2");

        let config = RequestConfig::resolve(&client, &call);

        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.low_speed_time, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.user_agent, "call-agent");
        assert_eq!(config.referer.as_deref(), Some("https://client.example/"));
        assert_eq!(config.headers, vec!["X-Client: 1", "X-Call: 2"]);
    }

    #[test]
    fn test_header_order() {
        let config = RequestConfig::resolve(
            &RequestOptions::new().referer("https://ref.example/"),
            &RequestOptions::new()
                .body("a=1")
                .raw_header("Accept: application/json")
                .ajax(true)
                .origin("https://ref.example")
                .bearer_token("t0k"),
        );

        let lines = config.header_lines("sid=1");
        assert_eq!(
            names(&lines),
            vec![
                "Cookie",
                "Content-Type",
                "Connection",
                "Accept",
                "Accept-Language",
                "User-Agent",
                "Cache-Control",
                "Proxy-Connection",
                "Referer",
                "Accept-Encoding",
                "Accept",
                "Expect",
                "X-Requested-With",
                "Origin",
                "Authorization",
            ]
        );
        assert_eq!(lines[0], "Cookie: sid=1");
        assert_eq!(lines[1], "Content-Type: application/x-www-form-urlencoded");
        assert_eq!(lines[11], "Expect:");
        assert_eq!(lines[14], "Authorization: Bearer t0k");
    }

    #[test]
    fn test_no_cookie_no_body() {
        let lines = RequestConfig::default().header_lines("");
        let names = names(&lines);
        assert_eq!(names[0], "Connection");
        assert!(!names.contains(&"Cookie"));
        assert!(!names.contains(&"Content-Type"));
        assert!(!names.contains(&"Referer"));
    }

    #[test]
    fn test_no_deflate_drops_accept_encoding() {
        let config =
            RequestConfig::resolve(&RequestOptions::new(), &RequestOptions::new().no_deflate(true));
        let lines = config.header_lines("");
        assert!(!lines
            .iter()
            .any(|l| l.to_ascii_lowercase().starts_with("accept-encoding")));
    }

    #[test]
    fn test_explicit_content_type_wins() {
        let config = RequestConfig::resolve(
            &RequestOptions::new(),
            &RequestOptions::new().json(&serde_json::json!({"a": 1})).unwrap(),
        );
        assert_eq!(config.body.as_deref(), Some(&b"{\"a\":1}"[..]));
        assert!(config
            .header_lines("")
            .contains(&"Content-Type: application/json".to_string()));
    }

    #[test]
    fn test_basic_auth_header() {
        let auth = Authorization::Basic {
            username: "user".into(),
            password: "pass".into(),
        };
        assert_eq!(auth.header_value(), "Basic dXNlcjpwYXNz");
    }

    #[test]
    fn test_proxy_credentials() {
        let proxy = ProxyConfig::new("10.0.0.1:3128").credentials("bob:s:ecret");
        assert_eq!(proxy.username.as_deref(), Some("bob"));
        assert_eq!(proxy.password.as_deref(), Some("s:ecret"));
    }

    #[test]
    fn test_form_body() {
        let mut data = BTreeMap::new();
        data.insert("q".to_string(), "a b&c".to_string());
        data.insert("lang".to_string(), "ру".to_string());
        data.insert("sig".to_string(), "a~b*".to_string());
        let options = RequestOptions::new().form(&data);
        assert_eq!(
            options.body.as_deref(),
            Some(&b"lang=%D1%80%D1%83&q=a+b%26c&sig=a%7Eb*"[..])
        );
    }
}
