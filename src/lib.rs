// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! # httpjar - Browser-like HTTP client
//!
//! An asynchronous HTTP client that presents itself like a desktop browser
//! and keeps a persistent cookie jar across requests.
//!
//! ## Features
//!
//! - Cookie jar: RFC 6265 domain/path matching, Set-Cookie capture, JSON persistence
//! - Domain alias: cookies set for an internal host are stored for its public twin
//! - Layered options: library defaults, client options, per-call options
//! - Ordered header lines: duplicates allowed, sent in a fixed order
//! - Proxy support with credentials, reported back with every result
//! - Watchdog: a request still running after twice its configured time is failed
//! - Pluggable transport: reqwest by default, anything implementing [`Transport`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use httpjar::{HttpClient, ProxyConfig, RequestOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = HttpClient::new();
//!     client.set_proxy(Some(ProxyConfig::new("10.0.0.1:3128")));
//!
//!     let response = client
//!         .post("https://example.com/login", "user=a&pass=b", RequestOptions::new())
//!         .await?;
//!     println!("{} via {:?}", response.status, response.proxy);
//!
//!     // session cookies from the login are sent automatically
//!     let page = client.get("https://example.com/account", RequestOptions::new()).await?;
//!     println!("{}", page.text_lossy());
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod http;

// Re-exports for convenience

// Errors
pub use error::{CookieParseError, DoubleCompletion, Error, RequestError, Result};

// HTTP
pub use http::{Authorization, HttpClient, ProxyConfig, RequestConfig, RequestOptions, Response};

// Cookies
pub use http::{Cookie, CookieJar, DomainAlias, SameSite, SetCookieOptions};

// Transport
pub use http::{EventSink, ReqwestTransport, Transport, TransportEvent, TransportInfo, TransportRequest};

// Reqwest types used in the public API
pub use reqwest::Method;

/// httpjar version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
