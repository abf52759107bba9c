// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Per-request accumulator and completion guard

use bytes::{Bytes, BytesMut};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::trace;
use url::Url;

use super::headers;
use super::response::Response;
use super::transport::{TransportEvent, TransportInfo};
use crate::error::{DoubleCompletion, RequestError};

/// Outcome delivered to the caller of a request
pub(crate) type Outcome = std::result::Result<Response, RequestError>;

/// Lifecycle of one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RequestState {
    Built,
    Dispatched,
    HeadersReceiving,
    BodyReceiving,
    Completed,
}

/// Delivers a request outcome exactly once
#[derive(Debug)]
pub(crate) struct Completion {
    url: String,
    sender: Option<oneshot::Sender<Outcome>>,
}

impl Completion {
    pub(crate) fn new(url: impl Into<String>) -> (Self, oneshot::Receiver<Outcome>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                url: url.into(),
                sender: Some(tx),
            },
            rx,
        )
    }

    /// Deliver the outcome; a second call is an invariant violation
    pub(crate) fn complete(&mut self, outcome: Outcome) -> Result<(), DoubleCompletion> {
        let sender = self.sender.take().ok_or_else(|| DoubleCompletion {
            url: self.url.clone(),
        })?;
        // the caller may have stopped waiting; nothing to deliver to then
        let _ = sender.send(outcome);
        Ok(())
    }

    pub(crate) fn is_done(&self) -> bool {
        self.sender.is_none()
    }
}

/// Mutable state of one in-flight exchange
#[derive(Debug)]
pub(crate) struct PendingRequest {
    url: Url,
    proxy: Option<String>,
    state: RequestState,
    status: u16,
    headers: Vec<String>,
    body: Vec<Bytes>,
    started: Option<Instant>,
    completion: Completion,
}

impl PendingRequest {
    pub(crate) fn new(url: Url, proxy: Option<String>, completion: Completion) -> Self {
        Self {
            url,
            proxy,
            state: RequestState::Built,
            status: 0,
            headers: Vec::new(),
            body: Vec::new(),
            started: None,
            completion,
        }
    }

    pub(crate) fn state(&self) -> RequestState {
        self.state
    }

    pub(crate) fn url(&self) -> &Url {
        &self.url
    }

    pub(crate) fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    /// Mark the request as handed to the transport and start the clock
    pub(crate) fn dispatch(&mut self) {
        if self.state == RequestState::Built {
            self.state = RequestState::Dispatched;
            self.started = Some(Instant::now());
        }
    }

    /// Time since dispatch
    pub(crate) fn elapsed(&self) -> std::time::Duration {
        self.started.map(|s| s.elapsed()).unwrap_or_default()
    }

    /// Feed one transport event.
    ///
    /// Returns the outcome when the event is terminal. Events arriving after
    /// completion are dropped here; the caller decides whether a late
    /// terminal event is a double completion.
    pub(crate) fn on_event(&mut self, event: TransportEvent) -> Option<Outcome> {
        if self.state == RequestState::Completed {
            return None;
        }
        match event {
            TransportEvent::Header(line) => {
                self.state = RequestState::HeadersReceiving;
                self.on_header(&line);
                None
            }
            TransportEvent::Data(chunk) => {
                self.state = RequestState::BodyReceiving;
                trace!(len = chunk.len(), "body chunk");
                self.body.push(chunk);
                None
            }
            TransportEvent::Error(message) => Some(Err(self.failure(message))),
            TransportEvent::End(info) => Some(Ok(self.finish(info))),
        }
    }

    fn on_header(&mut self, raw: &[u8]) {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return;
        }
        if line.starts_with("HTTP") {
            match parse_status_line(line) {
                Some(status) => self.status = status,
                None => trace!(line, "unparseable status line"),
            }
        } else {
            trace!(line, "header");
            self.headers.push(line.to_string());
        }
    }

    /// Build a transport error for this request
    pub(crate) fn failure(&self, message: impl Into<String>) -> RequestError {
        RequestError::transport(message, self.url.as_str(), self.proxy.clone())
    }

    fn finish(&mut self, info: TransportInfo) -> Response {
        let total = self.body.iter().map(Bytes::len).sum();
        let mut body = BytesMut::with_capacity(total);
        for chunk in self.body.drain(..) {
            body.extend_from_slice(&chunk);
        }

        let content_type = info.content_type.or_else(|| {
            self.headers
                .iter()
                .rev()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case(headers::CONTENT_TYPE))
                .map(|(_, value)| value.trim().to_string())
        });

        Response::new(
            self.status,
            content_type,
            std::mem::take(&mut self.headers),
            body.freeze(),
            self.proxy.clone(),
            self.url.clone(),
        )
    }

    /// Deliver the outcome and enter the terminal state
    pub(crate) fn complete(&mut self, outcome: Outcome) -> Result<(), DoubleCompletion> {
        self.state = RequestState::Completed;
        self.completion.complete(outcome)
    }

    pub(crate) fn is_completed(&self) -> bool {
        self.completion.is_done()
    }
}

/// Status code from a line such as `HTTP/1.1 301 Moved Permanently`
fn parse_status_line(line: &str) -> Option<u16> {
    line.split_whitespace().nth(1)?.parse().ok()
}
