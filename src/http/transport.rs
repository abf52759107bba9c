// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Pluggable transport
//!
//! The engine hands a fully configured [`TransportRequest`] to a
//! [`Transport`], which performs the exchange and streams raw header lines,
//! body chunks and exactly one terminal event (error or end) into an
//! [`EventSink`].

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{
    HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE, COOKIE, LOCATION,
};
use reqwest::redirect::Policy;
use reqwest::{Client, Method, StatusCode};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{trace, warn};
use url::Url;

use super::headers;
use super::request::ProxyConfig;

/// Everything a transport needs to perform one exchange
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    /// Raw `Name: value` lines; an empty value asks the transport to
    /// suppress a header it would otherwise add on its own
    pub headers: Vec<String>,
    pub body: Option<Bytes>,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub low_speed_time: Duration,
    pub low_speed_limit: u32,
    pub follow_redirects: bool,
    /// Verify TLS certificates and host names
    pub verify_tls: bool,
    pub proxy: Option<ProxyConfig>,
    /// Resolve and connect over IPv4 only
    pub ipv4_only: bool,
}

/// Introspection available once an exchange has ended
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportInfo {
    pub content_type: Option<String>,
}

/// Event streamed from a transport to the engine
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// One raw header line, including status lines and line terminators
    Header(Bytes),
    /// One body chunk
    Data(Bytes),
    /// The exchange failed
    Error(String),
    /// The exchange finished
    End(TransportInfo),
}

impl TransportEvent {
    /// Error and End complete a request
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransportEvent::Error(_) | TransportEvent::End(_))
    }
}

/// Sending half of a transport event stream
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<TransportEvent>,
}

impl EventSink {
    /// Create a sink and the receiver the engine reads from
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Emit a raw header line. Returns false once nobody is listening.
    pub fn header(&self, line: impl Into<Bytes>) -> bool {
        self.emit(TransportEvent::Header(line.into()))
    }

    /// Emit a body chunk
    pub fn data(&self, chunk: impl Into<Bytes>) -> bool {
        self.emit(TransportEvent::Data(chunk.into()))
    }

    /// Report a failure
    pub fn error(&self, message: impl Into<String>) -> bool {
        self.emit(TransportEvent::Error(message.into()))
    }

    /// Report completion
    pub fn end(&self, info: TransportInfo) -> bool {
        self.emit(TransportEvent::End(info))
    }

    /// Check if the engine stopped listening
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Emit any event
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Network-request execution capability
///
/// Implementations must emit at most one terminal event per call. The engine
/// treats a second one as a fatal bug.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the exchange, streaming its events into `events`
    async fn perform(&self, request: TransportRequest, events: EventSink);
}

/// Default transport backed by reqwest
///
/// A fresh `reqwest::Client` is built for every exchange so each request owns
/// its connection settings (proxy, timeouts, redirect policy).
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    max_redirects: usize,
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqwestTransport {
    /// Create a transport following at most 10 redirects
    pub fn new() -> Self {
        Self { max_redirects: 10 }
    }

    /// Set the redirect limit
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    fn build_client(&self, request: &TransportRequest, decode: bool) -> reqwest::Result<Client> {
        let mut builder = Client::builder()
            .timeout(request.timeout)
            .connect_timeout(request.connect_timeout)
            // redirects are followed hop by hop in `exchange`
            .redirect(Policy::none())
            // rustls skips host name checks along with certificate checks
            .danger_accept_invalid_certs(!request.verify_tls)
            .gzip(decode)
            .brotli(decode);

        if request.ipv4_only {
            builder = builder.local_address(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        }

        if let Some(proxy_config) = &request.proxy {
            let mut proxy = reqwest::Proxy::all(proxy_config.address.as_str())?;
            if let Some(username) = &proxy_config.username {
                proxy = proxy.basic_auth(username, proxy_config.password.as_deref().unwrap_or(""));
            }
            builder = builder.proxy(proxy);
        }

        builder.build()
    }

    async fn exchange(
        &self,
        request: TransportRequest,
        events: &EventSink,
    ) -> Result<TransportInfo, String> {
        // reqwest negotiates and decodes compression itself when asked to
        let decode = request.headers.iter().any(|line| {
            line.split_once(':').map_or(false, |(name, value)| {
                name.trim().eq_ignore_ascii_case(headers::ACCEPT_ENCODING)
                    && !value.trim().is_empty()
            })
        });
        let client = self.build_client(&request, decode).map_err(error_message)?;

        let mut header_map = Vec::with_capacity(request.headers.len());
        for line in &request.headers {
            let Some((name, value)) = line.split_once(':') else {
                warn!(header = %line, "skipping header line without a colon");
                continue;
            };
            let (name, value) = (name.trim(), value.trim());
            if value.is_empty() || name.eq_ignore_ascii_case(headers::ACCEPT_ENCODING) {
                continue;
            }
            match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
                (Ok(name), Ok(value)) => header_map.push((name, value)),
                _ => warn!(header = %line, "skipping invalid header"),
            }
        }

        let mut hop = Hop {
            method: request.method.clone(),
            url: request.url.clone(),
            body: request.body.clone(),
            headers: header_map,
        };
        let mut redirects = 0usize;

        let mut response = loop {
            let mut builder = client.request(hop.method.clone(), hop.url.clone());
            for (name, value) in &hop.headers {
                builder = builder.header(name.clone(), value.clone());
            }
            if let Some(body) = &hop.body {
                builder = builder.body(body.clone());
            }

            let response = builder.send().await.map_err(error_message)?;

            events.header(format!("{:?} {}\r\n", response.version(), response.status()));
            for (name, value) in response.headers() {
                events.header(format!(
                    "{}: {}\r\n",
                    name,
                    String::from_utf8_lossy(value.as_bytes())
                ));
            }
            events.header("\r\n");

            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|loc| hop.url.join(loc).ok());
            let next = match location {
                Some(next) if request.follow_redirects && response.status().is_redirection() => {
                    next
                }
                _ => break response,
            };

            if redirects >= self.max_redirects {
                return Err(format!("Maximum ({}) redirects followed", self.max_redirects));
            }
            redirects += 1;
            trace!(from = %hop.url, to = %next, status = %response.status(), "following redirect");
            hop.redirect(response.status(), next);
        };

        let info = TransportInfo {
            content_type: response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(String::from),
        };

        let mut window_start = Instant::now();
        let mut window_bytes = 0usize;
        loop {
            let chunk = if request.low_speed_time.is_zero() {
                response.chunk().await
            } else {
                tokio::time::timeout(request.low_speed_time, response.chunk())
                    .await
                    .map_err(|_| {
                        format!(
                            "Operation too slow. Less than {} bytes/sec transferred the last {} seconds",
                            request.low_speed_limit,
                            request.low_speed_time.as_secs()
                        )
                    })?
            };
            let Some(chunk) = chunk.map_err(error_message)? else {
                break;
            };

            window_bytes += chunk.len();
            let window = window_start.elapsed();
            if !request.low_speed_time.is_zero() && window >= request.low_speed_time {
                let rate = window_bytes as f64 / window.as_secs_f64();
                if rate < f64::from(request.low_speed_limit) {
                    return Err(format!(
                        "Operation too slow. Less than {} bytes/sec transferred the last {} seconds",
                        request.low_speed_limit,
                        window.as_secs()
                    ));
                }
                window_start = Instant::now();
                window_bytes = 0;
            }

            trace!(len = chunk.len(), "body chunk");
            if !events.data(chunk) {
                break;
            }
        }

        Ok(info)
    }
}

/// Method, target and headers of one hop in a redirect chain
#[derive(Debug)]
struct Hop {
    method: Method,
    url: Url,
    body: Option<Bytes>,
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl Hop {
    /// Move to the redirect target.
    ///
    /// 301 and 302 turn POST into GET, 303 turns anything but HEAD into GET;
    /// the body and its content type go with it. Credentials and cookies are
    /// not carried to another host.
    fn redirect(&mut self, status: StatusCode, next: Url) {
        let to_get = match status {
            StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND => self.method == Method::POST,
            StatusCode::SEE_OTHER => self.method != Method::HEAD,
            _ => false,
        };
        if to_get {
            self.method = Method::GET;
            self.body = None;
            self.headers.retain(|(name, _)| *name != CONTENT_TYPE);
        }
        let same_origin = next.host_str() == self.url.host_str()
            && next.port_or_known_default() == self.url.port_or_known_default();
        if !same_origin {
            self.headers
                .retain(|(name, _)| *name != COOKIE && *name != AUTHORIZATION);
        }
        self.url = next;
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn perform(&self, request: TransportRequest, events: EventSink) {
        match self.exchange(request, &events).await {
            Ok(info) => events.end(info),
            Err(message) => events.error(message),
        };
    }
}

/// Flatten a reqwest error and its sources into one message
fn error_message(err: reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = std::error::Error::source(cause);
    }
    message
}
