// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! HTTP client layer for httpjar
//!
//! Provides a browser-like HTTP client with cookie management, proxy
//! support and a pluggable transport.

mod client;
mod cookie;
mod pending;
mod request;
mod response;
mod transport;

pub use client::HttpClient;
pub use cookie::{Cookie, CookieJar, DomainAlias, SameSite, SetCookieOptions};
pub use request::{Authorization, ProxyConfig, RequestConfig, RequestOptions};
pub use response::Response;
pub use transport::{
    EventSink, ReqwestTransport, Transport, TransportEvent, TransportInfo, TransportRequest,
};

/// Library defaults, the bottom layer of every request configuration
pub mod defaults {
    use std::time::Duration;

    /// Default user agent string
    pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_12_5) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.36";
    pub const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
    pub const ACCEPT_LANGUAGE: &str = "ru,en-US,en;q=0.8,ru;q=0.6";
    pub const ACCEPT_ENCODING: &str = "gzip, deflate";
    pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
    pub const JSON_CONTENT_TYPE: &str = "application/json";

    pub const TIMEOUT: Duration = Duration::from_secs(15);
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
    pub const LOW_SPEED_LIMIT: u32 = 512;

    /// How often the watchdog checks elapsed time
    pub const WATCHDOG_TICK: Duration = Duration::from_millis(500);
    /// Watchdog deadline is this many times `timeout + connect_timeout`
    pub const WATCHDOG_FACTOR: u32 = 2;
}

/// Common HTTP headers
pub mod headers {
    pub const ACCEPT: &str = "Accept";
    pub const ACCEPT_LANGUAGE: &str = "Accept-Language";
    pub const ACCEPT_ENCODING: &str = "Accept-Encoding";
    pub const AUTHORIZATION: &str = "Authorization";
    pub const CACHE_CONTROL: &str = "Cache-Control";
    pub const CONNECTION: &str = "Connection";
    pub const CONTENT_TYPE: &str = "Content-Type";
    pub const COOKIE: &str = "Cookie";
    pub const EXPECT: &str = "Expect";
    pub const ORIGIN: &str = "Origin";
    pub const PROXY_CONNECTION: &str = "Proxy-Connection";
    pub const REFERER: &str = "Referer";
    pub const SET_COOKIE: &str = "Set-Cookie";
    pub const USER_AGENT: &str = "User-Agent";
    pub const X_REQUESTED_WITH: &str = "X-Requested-With";
}
