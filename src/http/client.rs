// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! HTTP client implementation

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::RwLock;
use reqwest::Method;
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, trace, warn};
use url::Url;

use super::cookie::{CookieJar, SetCookieOptions};
use super::defaults;
use super::pending::{Completion, Outcome, PendingRequest};
use super::request::{Authorization, ProxyConfig, RequestConfig, RequestOptions};
use super::response::Response;
use super::transport::{EventSink, ReqwestTransport, Transport, TransportRequest};
use crate::error::{Error, RequestError, Result};

/// HTTP client with cookie management
///
/// Cloning is cheap; clones share the cookie jar, the client-level options
/// and the transport.
#[derive(Clone)]
pub struct HttpClient {
    transport: Arc<dyn Transport>,
    options: Arc<RwLock<RequestOptions>>,
    cookie_jar: CookieJar,
}

impl HttpClient {
    /// Create a new HTTP client with library defaults and the reqwest transport
    pub fn new() -> Self {
        Self::with_options(RequestOptions::default())
    }

    /// Create a new HTTP client with client-level options
    pub fn with_options(options: RequestOptions) -> Self {
        Self::with_transport(options, ReqwestTransport::new())
    }

    /// Create a new HTTP client on a custom transport
    pub fn with_transport(options: RequestOptions, transport: impl Transport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
            options: Arc::new(RwLock::new(options)),
            cookie_jar: CookieJar::new(),
        }
    }

    /// Replace the cookie jar
    pub fn with_cookie_jar(mut self, cookie_jar: CookieJar) -> Self {
        self.cookie_jar = cookie_jar;
        self
    }

    /// Get the cookie jar
    pub fn cookie_jar(&self) -> &CookieJar {
        &self.cookie_jar
    }

    /// Snapshot of the client-level options
    pub fn options(&self) -> RequestOptions {
        self.options.read().clone()
    }

    /// Store a cookie specification for `url`
    pub fn set_cookie(
        &self,
        spec: &str,
        url: impl AsRef<str>,
        options: SetCookieOptions,
    ) -> Result<()> {
        let url = Url::parse(url.as_ref())?;
        self.cookie_jar.set_cookie(spec, &url, options)?;
        Ok(())
    }

    /// Value of the cookie `name` that would be sent to `url`
    pub fn get_cookie(&self, name: &str, url: impl AsRef<str>) -> Result<Option<String>> {
        let url = Url::parse(url.as_ref())?;
        Ok(self.cookie_jar.get_cookie(name, &url))
    }

    /// Cookie header that would be sent to `url`
    pub fn cookie_header(&self, url: impl AsRef<str>) -> Result<String> {
        let url = Url::parse(url.as_ref())?;
        Ok(self.cookie_jar.get_cookie_header(&url))
    }

    /// Proxy used by requests that do not set their own
    pub fn proxy(&self) -> Option<ProxyConfig> {
        self.options.read().proxy.clone()
    }

    /// Set or clear the client-level proxy
    pub fn set_proxy(&self, proxy: Option<ProxyConfig>) {
        self.options.write().proxy = proxy;
    }

    /// Set connect and read timeouts
    pub fn set_timeout(&self, connect: Duration, read: Duration) {
        let mut options = self.options.write();
        options.connect_timeout = Some(connect);
        options.timeout = Some(read);
    }

    /// Set the referer sent with every request
    pub fn set_referer(&self, referer: impl Into<String>) {
        self.options.write().referer = Some(referer.into());
    }

    /// Follow redirects or not
    pub fn set_allow_redirect(&self, allow: bool) {
        self.options.write().follow_redirects = Some(allow);
    }

    /// Set bearer token
    pub fn set_bearer_token(&self, token: impl Into<String>) {
        self.options.write().authorization = Some(Authorization::Bearer(token.into()));
    }

    /// Set basic auth
    pub fn set_basic_auth(&self, username: impl Into<String>, password: impl Into<String>) {
        self.options.write().authorization = Some(Authorization::Basic {
            username: username.into(),
            password: password.into(),
        });
    }

    /// Clear client-level authorization
    pub fn clear_auth(&self) {
        self.options.write().authorization = None;
    }

    /// Execute a GET request
    pub async fn get(&self, url: impl AsRef<str>, options: RequestOptions) -> Result<Response> {
        self.request(Method::GET, url, options).await
    }

    /// Execute a POST request
    pub async fn post(
        &self,
        url: impl AsRef<str>,
        body: impl Into<Bytes>,
        options: RequestOptions,
    ) -> Result<Response> {
        self.request(Method::POST, url, options.body(body)).await
    }

    /// Execute a POST request with a JSON body
    pub async fn json<T: Serialize>(
        &self,
        url: impl AsRef<str>,
        body: &T,
        options: RequestOptions,
    ) -> Result<Response> {
        self.request(Method::POST, url, options.json(body)?).await
    }

    /// Execute a request
    ///
    /// Transport failures and watchdog expiry come back as
    /// [`Error::Request`].
    pub async fn request(
        &self,
        method: Method,
        url: impl AsRef<str>,
        options: RequestOptions,
    ) -> Result<Response> {
        let url = Url::parse(url.as_ref())?;
        let config = RequestConfig::resolve(&self.options.read(), &options);
        let cookie_header = self.cookie_jar.get_cookie_header(&url);
        let proxy = config.proxy_address();

        let transport_request = TransportRequest {
            method: method.clone(),
            url: url.clone(),
            headers: config.header_lines(&cookie_header),
            body: config.body.clone(),
            timeout: config.timeout,
            connect_timeout: config.connect_timeout,
            low_speed_time: config.low_speed_time,
            low_speed_limit: config.low_speed_limit,
            follow_redirects: config.follow_redirects,
            // self-signed and mismatched certificates are trusted on purpose
            verify_tls: false,
            proxy: config.proxy.clone(),
            ipv4_only: true,
        };

        debug!(%method, %url, proxy = ?proxy, "dispatching request");

        let (completion, outcome) = Completion::new(url.as_str());
        let pending = PendingRequest::new(url.clone(), proxy.clone(), completion);
        tokio::spawn(drive(
            self.transport.clone(),
            transport_request,
            pending,
            self.cookie_jar.clone(),
            config.watchdog_limit(),
        ));

        match outcome.await {
            Ok(outcome) => {
                if let Ok(response) = &outcome {
                    debug!(%url, status = response.status, len = response.body_len(), "request completed");
                }
                outcome.map_err(Error::from)
            }
            Err(_) => Err(RequestError::transport(
                "request driver stopped before completing",
                url.as_str(),
                proxy,
            )
            .into()),
        }
    }

    /// Execute multiple requests concurrently
    pub async fn execute_all(
        &self,
        requests: impl IntoIterator<Item = (Method, String, RequestOptions)>,
    ) -> Vec<Result<Response>> {
        let futures: Vec<_> = requests
            .into_iter()
            .map(|(method, url, options)| self.request(method, url, options))
            .collect();
        futures::future::join_all(futures).await
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Run one exchange to completion.
///
/// Reads transport events until a terminal one arrives or the watchdog
/// deadline passes, then keeps draining so a second terminal event from a
/// misbehaving transport is caught.
async fn drive(
    transport: Arc<dyn Transport>,
    request: TransportRequest,
    mut pending: PendingRequest,
    cookie_jar: CookieJar,
    watchdog_limit: Duration,
) {
    let (sink, mut events) = EventSink::channel();
    pending.dispatch();
    let exchange = tokio::spawn(async move { transport.perform(request, sink).await });

    let mut watchdog = tokio::time::interval(defaults::WATCHDOG_TICK);
    watchdog.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            event = events.recv() => {
                let outcome = match event {
                    Some(event) => match pending.on_event(event) {
                        Some(outcome) => outcome,
                        None => continue,
                    },
                    None => Err(pending.failure("transport closed without completing the request")),
                };
                let outcome = outcome.map(|response| {
                    cookie_jar.store_response_cookies(&response.headers, pending.url());
                    response
                });
                finish(&mut pending, outcome);
                break;
            }

            _ = watchdog.tick() => {
                let elapsed = pending.elapsed();
                if elapsed > watchdog_limit {
                    warn!(
                        url = %pending.url(),
                        state = ?pending.state(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        limit_ms = watchdog_limit.as_millis() as u64,
                        "watchdog timeout"
                    );
                    exchange.abort();
                    let err = RequestError::watchdog(
                        pending.url().as_str(),
                        pending.proxy().map(String::from),
                        elapsed,
                    );
                    finish(&mut pending, Err(err));
                    return;
                }
            }
        }
    }

    while let Some(event) = events.recv().await {
        if event.is_terminal() && pending.is_completed() {
            let late = Err(pending.failure("late terminal event"));
            finish(&mut pending, late);
        } else {
            trace!(url = %pending.url(), "dropping event after completion");
        }
    }
}

/// Deliver an outcome; a double completion is a bug and is fatal
fn finish(pending: &mut PendingRequest, outcome: Outcome) {
    if let Err(err) = pending.complete(outcome) {
        error!(url = %err.url, "{}", err);
        panic!("{}", err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{TransportEvent, TransportInfo};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Replays a fixed list of events and records what it was asked to send
    #[derive(Clone, Default)]
    struct ScriptedTransport {
        script: Vec<TransportEvent>,
        seen: Arc<Mutex<Vec<TransportRequest>>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<TransportEvent>) -> Self {
            Self {
                script,
                seen: Arc::default(),
            }
        }

        fn ok(lines: &[&str], body: &'static str) -> Self {
            let mut script: Vec<_> = lines
                .iter()
                .map(|l| TransportEvent::Header(Bytes::from(format!("{}\r\n", l))))
                .collect();
            script.push(TransportEvent::Data(Bytes::from_static(body.as_bytes())));
            script.push(TransportEvent::End(TransportInfo::default()));
            Self::new(script)
        }

        fn last_headers(&self) -> Vec<String> {
            self.seen.lock().last().map(|r| r.headers.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn perform(&self, request: TransportRequest, events: EventSink) {
            self.seen.lock().push(request);
            for event in self.script.clone() {
                events.emit(event);
            }
        }
    }

    /// Never emits anything and never returns
    struct StalledTransport;

    #[async_trait]
    impl Transport for StalledTransport {
        async fn perform(&self, _request: TransportRequest, _events: EventSink) {
            std::future::pending::<()>().await;
        }
    }

    fn has_header(lines: &[String], name: &str) -> bool {
        lines.iter().any(|l| {
            l.split_once(':')
                .map_or(false, |(n, _)| n.trim().eq_ignore_ascii_case(name))
        })
    }

    #[tokio::test]
    async fn test_get_sends_cookies_and_stores_new_ones() {
        let transport = ScriptedTransport::ok(
            &[
                "HTTP/1.1 200 OK",
                "Content-Type: text/html",
                "Set-Cookie: fresh=2; Path=/",
            ],
            "<html></html>",
        );
        let client = HttpClient::with_transport(RequestOptions::new(), transport.clone());
        client
            .set_cookie("sid=1", "http://example.com/", SetCookieOptions::default())
            .unwrap();

        let response = client
            .get("http://example.com/page", RequestOptions::new())
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.content_type.as_deref(), Some("text/html"));
        assert_eq!(response.text().unwrap(), "<html></html>");
        assert_eq!(transport.last_headers()[0], "Cookie: sid=1");
        assert_eq!(
            client.cookie_header("http://example.com/").unwrap(),
            "sid=1; fresh=2"
        );
    }

    #[tokio::test]
    async fn test_followed_redirect_reports_final_status() {
        let transport = ScriptedTransport::ok(
            &[
                "HTTP/1.1 301 Moved Permanently",
                "Location: /new",
                "",
                "HTTP/1.1 200 OK",
                "Content-Length: 2",
            ],
            "ok",
        );
        let client = HttpClient::with_transport(RequestOptions::new(), transport);

        let response = client
            .get("http://example.com/old", RequestOptions::new())
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.header("location"), Some("/new"));
    }

    #[tokio::test]
    async fn test_no_deflate_per_call() {
        let transport = ScriptedTransport::ok(&["HTTP/1.1 204 No Content"], "");
        let client = HttpClient::with_transport(RequestOptions::new(), transport.clone());

        client.get("http://example.com/", RequestOptions::new()).await.unwrap();
        assert!(has_header(&transport.last_headers(), "accept-encoding"));

        client
            .get("http://example.com/", RequestOptions::new().no_deflate(true))
            .await
            .unwrap();
        assert!(!has_header(&transport.last_headers(), "accept-encoding"));
    }

    #[tokio::test]
    async fn test_dispatch_settings() {
        let transport = ScriptedTransport::ok(&["HTTP/1.1 200 OK"], "");
        let client = HttpClient::with_transport(RequestOptions::new(), transport.clone());
        client.set_proxy(Some(ProxyConfig::new("10.0.0.1:3128").credentials("u:p")));
        client.set_timeout(Duration::from_secs(2), Duration::from_secs(9));
        client.set_allow_redirect(false);
        client.set_referer("https://ref.example/");

        let response = client
            .post("http://example.com/form", "a=1", RequestOptions::new())
            .await
            .unwrap();
        assert_eq!(response.proxy.as_deref(), Some("10.0.0.1:3128"));

        let seen = transport.seen.lock();
        let request = seen.last().unwrap();
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.body.as_deref(), Some(&b"a=1"[..]));
        assert_eq!(request.timeout, Duration::from_secs(9));
        assert_eq!(request.connect_timeout, Duration::from_secs(2));
        assert_eq!(request.low_speed_time, Duration::from_secs(9));
        assert!(!request.follow_redirects);
        assert!(!request.verify_tls);
        assert!(request.ipv4_only);
        assert_eq!(request.proxy.as_ref().unwrap().username.as_deref(), Some("u"));
        assert!(request
            .headers
            .contains(&"Content-Type: application/x-www-form-urlencoded".to_string()));
        assert!(request
            .headers
            .contains(&"Referer: https://ref.example/".to_string()));
    }

    #[tokio::test]
    async fn test_json_forces_content_type() {
        let transport = ScriptedTransport::ok(&["HTTP/1.1 200 OK"], "{}");
        let client = HttpClient::with_transport(RequestOptions::new(), transport.clone());

        client
            .json(
                "http://example.com/api",
                &serde_json::json!({"id": 7}),
                RequestOptions::new().content_type("text/plain"),
            )
            .await
            .unwrap();

        let headers = transport.last_headers();
        assert!(headers.contains(&"Content-Type: application/json".to_string()));
        assert!(!headers.contains(&"Content-Type: text/plain".to_string()));
    }

    #[tokio::test]
    async fn test_transport_error_carries_url_and_proxy() {
        let transport =
            ScriptedTransport::new(vec![TransportEvent::Error("Connection refused".into())]);
        let client = HttpClient::with_transport(
            RequestOptions::new().proxy(ProxyConfig::new("10.0.0.1:3128")),
            transport,
        );

        let err = client
            .get("http://example.com/", RequestOptions::new())
            .await
            .unwrap_err();
        match err {
            Error::Request(RequestError::Transport {
                message,
                url,
                proxy,
            }) => {
                assert_eq!(message, "Connection refused");
                assert_eq!(url, "http://example.com/");
                assert_eq!(proxy.as_deref(), Some("10.0.0.1:3128"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_transport_closing_silently_is_an_error() {
        let client =
            HttpClient::with_transport(RequestOptions::new(), ScriptedTransport::new(vec![]));
        let err = client
            .get("http://example.com/", RequestOptions::new())
            .await
            .unwrap_err();
        assert!(err.is_network());
        assert!(!err.is_timeout());
    }

    #[tokio::test]
    async fn test_failed_response_does_not_store_cookies() {
        let transport = ScriptedTransport::new(vec![
            TransportEvent::Header(Bytes::from_static(b"HTTP/1.1 200 OK\r\n")),
            TransportEvent::Header(Bytes::from_static(b"Set-Cookie: a=1\r\n")),
            TransportEvent::Error("Connection reset by peer".into()),
        ]);
        let client = HttpClient::with_transport(RequestOptions::new(), transport);

        assert!(client.get("http://example.com/", RequestOptions::new()).await.is_err());
        assert!(client.cookie_jar().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_completion_delivers_once() {
        let transport = ScriptedTransport::new(vec![
            TransportEvent::Header(Bytes::from_static(b"HTTP/1.1 200 OK\r\n")),
            TransportEvent::End(TransportInfo::default()),
            TransportEvent::Error("late".into()),
        ]);
        let client = HttpClient::with_transport(RequestOptions::new(), transport);

        let response = client
            .get("http://example.com/", RequestOptions::new())
            .await
            .unwrap();
        assert_eq!(response.status, 200);
    }

    /// Spawn a driver directly so its own exit can be observed
    fn spawn_driver(
        script: Vec<TransportEvent>,
    ) -> (
        tokio::task::JoinHandle<()>,
        tokio::sync::oneshot::Receiver<Outcome>,
    ) {
        let url = Url::parse("http://example.com/").unwrap();
        let config = RequestConfig::default();
        let request = TransportRequest {
            method: Method::GET,
            url: url.clone(),
            headers: config.header_lines(""),
            body: None,
            timeout: config.timeout,
            connect_timeout: config.connect_timeout,
            low_speed_time: config.low_speed_time,
            low_speed_limit: config.low_speed_limit,
            follow_redirects: true,
            verify_tls: false,
            proxy: None,
            ipv4_only: true,
        };
        let (completion, outcome) = Completion::new(url.as_str());
        let pending = PendingRequest::new(url, None, completion);
        let handle = tokio::spawn(drive(
            Arc::new(ScriptedTransport::new(script)),
            request,
            pending,
            CookieJar::new(),
            config.watchdog_limit(),
        ));
        (handle, outcome)
    }

    #[tokio::test]
    async fn test_second_terminal_event_is_fatal_to_driver() {
        let (handle, outcome) = spawn_driver(vec![
            TransportEvent::Header(Bytes::from_static(b"HTTP/1.1 200 OK\r\n")),
            TransportEvent::End(TransportInfo::default()),
            TransportEvent::Error("late".into()),
        ]);

        let response = outcome.await.unwrap().unwrap();
        assert_eq!(response.status, 200);

        let err = handle.await.unwrap_err();
        assert!(err.is_panic());
    }

    #[tokio::test]
    async fn test_single_terminal_event_driver_exits_cleanly() {
        let (handle, outcome) = spawn_driver(vec![
            TransportEvent::Header(Bytes::from_static(b"HTTP/1.1 204 No Content\r\n")),
            TransportEvent::End(TransportInfo::default()),
            TransportEvent::Data(Bytes::from_static(b"ignored")),
        ]);

        assert_eq!(outcome.await.unwrap().unwrap().status, 204);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_fails_stalled_request() {
        let client = HttpClient::with_transport(RequestOptions::new(), StalledTransport);
        client.set_timeout(Duration::from_secs(1), Duration::from_secs(2));
        client.set_proxy(Some(ProxyConfig::new("10.0.0.1:3128")));

        let started = tokio::time::Instant::now();
        let err = client
            .get("http://example.com/slow", RequestOptions::new())
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(err.url(), Some("http://example.com/slow"));
        assert_eq!(err.proxy(), Some("10.0.0.1:3128"));
        // deadline is 2 * (2s + 1s), checked every 500ms
        let waited = started.elapsed();
        assert!(waited > Duration::from_secs(6));
        assert!(waited <= Duration::from_millis(6500));
    }

    #[tokio::test]
    async fn test_alias_cookie_sent_to_public_domain() {
        let transport = ScriptedTransport::ok(
            &[
                "HTTP/1.1 200 OK",
                "Set-Cookie: PHPSESSID=abc; Domain=.qwintry.loc; Path=/",
            ],
            "",
        );
        let client = HttpClient::with_transport(RequestOptions::new(), transport);

        client
            .get("http://qwintry.loc/login", RequestOptions::new())
            .await
            .unwrap();

        assert_eq!(
            client.cookie_header("https://qwintry.com/").unwrap(),
            "PHPSESSID=abc"
        );
    }

    #[tokio::test]
    async fn test_execute_all_runs_independently() {
        let transport = ScriptedTransport::ok(&["HTTP/1.1 200 OK"], "x");
        let client = HttpClient::with_transport(RequestOptions::new(), transport.clone());

        let results = client
            .execute_all(vec![
                (Method::GET, "http://a.example/".to_string(), RequestOptions::new()),
                (Method::GET, "not a url".to_string(), RequestOptions::new()),
                (Method::DELETE, "http://b.example/".to_string(), RequestOptions::new()),
            ])
            .await;

        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(Error::Url(_))));
        assert!(results[2].is_ok());
        assert_eq!(transport.seen.lock().len(), 2);
    }

    #[test]
    fn test_auth_setters() {
        let client = HttpClient::with_transport(RequestOptions::new(), StalledTransport);
        client.set_bearer_token("test_token");
        assert_eq!(
            client.options().authorization,
            Some(Authorization::Bearer("test_token".into()))
        );
        client.clear_auth();
        assert!(client.options().authorization.is_none());
    }

    #[test]
    fn test_request_from_blocking_context() {
        let transport = ScriptedTransport::ok(&["HTTP/1.0 404 Not Found"], "missing");
        let client = HttpClient::with_transport(RequestOptions::new(), transport);

        let response =
            tokio_test::block_on(client.get("http://example.com/x", RequestOptions::new()))
                .unwrap();
        assert_eq!(response.status, 404);
        assert!(response.is_client_error());
        assert_eq!(response.text_lossy(), "missing");
    }
}
