// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Cookie jar implementation for persistent cookie storage

use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use super::headers;
use crate::error::{CookieParseError, Result};

/// Netscape-style `Expires` formats still sent by many servers
const EXPIRES_FORMATS: &[&str] = &[
    "%a, %d-%b-%Y %H:%M:%S GMT",
    "%A, %d-%b-%y %H:%M:%S GMT",
    "%a, %d %b %Y %H:%M:%S GMT",
    "%a %b %e %H:%M:%S %Y",
];

/// A single HTTP cookie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    /// Cookie name
    pub name: String,
    /// Cookie value
    pub value: String,
    /// Domain the cookie belongs to (lowercase, no leading dot)
    pub domain: String,
    /// Path the cookie is valid for
    pub path: String,
    /// Expiration time (None = session cookie)
    pub expires: Option<DateTime<Utc>>,
    /// Secure flag (HTTPS only)
    pub secure: bool,
    /// HttpOnly flag
    pub http_only: bool,
    /// Only sent to the exact host that set it
    #[serde(default)]
    pub host_only: bool,
    /// SameSite attribute
    #[serde(default)]
    pub same_site: SameSite,
}

/// SameSite cookie attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SameSite {
    /// Cookie sent with all requests
    #[default]
    None,
    /// Cookie sent with same-site and top-level navigations
    Lax,
    /// Cookie only sent with same-site requests
    Strict,
}

/// Cookie attributes as written in a `Set-Cookie` line, before they are
/// resolved against the request URL.
#[derive(Debug, Clone, Default)]
struct ParsedCookie {
    name: String,
    value: String,
    domain: Option<String>,
    path: Option<String>,
    expires: Option<DateTime<Utc>>,
    max_age: Option<i64>,
    secure: bool,
    http_only: bool,
    same_site: SameSite,
}

impl Cookie {
    /// Create a new cookie
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: String::new(),
            path: "/".to_string(),
            expires: None,
            secure: false,
            http_only: false,
            host_only: false,
            same_site: SameSite::default(),
        }
    }

    /// Set the domain
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into().trim_start_matches('.').to_ascii_lowercase();
        self
    }

    /// Set the path
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set secure flag
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Set http_only flag
    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// Set host_only flag
    pub fn host_only(mut self, host_only: bool) -> Self {
        self.host_only = host_only;
        self
    }

    /// Set same_site attribute
    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    /// Set expiration time
    pub fn expires(mut self, expires: DateTime<Utc>) -> Self {
        self.expires = Some(expires);
        self
    }

    /// Check if the cookie is expired
    pub fn is_expired(&self) -> bool {
        self.expires.map_or(false, |exp| exp <= Utc::now())
    }

    /// Check if the cookie should be sent to `host`/`path` over `scheme`.
    ///
    /// `host` must already be normalized by the jar's domain alias.
    fn matches(&self, scheme: &str, host: &str, path: &str) -> bool {
        if !self.domain_matches(host) {
            return false;
        }

        if !path_matches(path, &self.path) {
            return false;
        }

        if self.secure && !matches!(scheme, "https" | "wss") {
            return false;
        }

        !self.is_expired()
    }

    /// Check if domain matches
    fn domain_matches(&self, host: &str) -> bool {
        if self.host_only {
            return host == self.domain;
        }
        domain_matches(host, &self.domain)
    }

    /// Key under which a cookie replaces another
    fn same_slot(&self, other: &Cookie) -> bool {
        self.name == other.name && self.domain == other.domain && self.path == other.path
    }

    /// Convert to cookie header format
    pub fn to_header_value(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

impl ParsedCookie {
    /// Parse a Set-Cookie header value
    fn parse(header: &str) -> std::result::Result<Self, CookieParseError> {
        let header = header.trim();
        if header.is_empty() {
            return Err(CookieParseError::Empty);
        }

        let mut parts = header.split(';');
        let first = parts.next().unwrap_or_default().trim();

        let (name, value) = first
            .split_once('=')
            .ok_or_else(|| CookieParseError::MissingNameValue(first.to_string()))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(CookieParseError::EmptyName);
        }

        let mut cookie = ParsedCookie {
            name: name.to_string(),
            value: value.trim().to_string(),
            ..Default::default()
        };

        for part in parts {
            let part = part.trim();
            if let Some((attr, val)) = part.split_once('=') {
                let attr = attr.trim().to_lowercase();
                let val = val.trim();
                match attr.as_str() {
                    "domain" => {
                        let domain = val.trim_start_matches('.').to_ascii_lowercase();
                        cookie.domain = (!domain.is_empty()).then_some(domain);
                    }
                    "path" => cookie.path = val.starts_with('/').then(|| val.to_string()),
                    "expires" => cookie.expires = parse_expires(val),
                    "max-age" => {
                        if let Ok(secs) = val.parse::<i64>() {
                            cookie.max_age = Some(secs);
                        }
                    }
                    "samesite" => {
                        cookie.same_site = match val.to_lowercase().as_str() {
                            "strict" => SameSite::Strict,
                            "lax" => SameSite::Lax,
                            _ => SameSite::None,
                        };
                    }
                    _ => {}
                }
            } else {
                match part.to_lowercase().as_str() {
                    "secure" => cookie.secure = true,
                    "httponly" => cookie.http_only = true,
                    _ => {}
                }
            }
        }

        Ok(cookie)
    }

    /// Resolve default domain and path against the URL the cookie came from
    fn resolve(self, host: &str, url_path: &str) -> std::result::Result<Cookie, CookieParseError> {
        let (domain, host_only) = match self.domain {
            Some(domain) => {
                if !domain_matches(host, &domain) {
                    return Err(CookieParseError::DomainMismatch {
                        domain,
                        host: host.to_string(),
                    });
                }
                (domain, false)
            }
            None => (host.to_string(), true),
        };

        // Max-Age wins over Expires
        let expires = match self.max_age {
            Some(secs) if secs <= 0 => Some(DateTime::<Utc>::MIN_UTC),
            Some(secs) => Some(
                chrono::Duration::try_seconds(secs)
                    .and_then(|age| Utc::now().checked_add_signed(age))
                    .map_or_else(latest_expiry, |at| at.min(latest_expiry())),
            ),
            None => self.expires,
        };

        Ok(Cookie {
            name: self.name,
            value: self.value,
            domain,
            path: self.path.unwrap_or_else(|| default_path(url_path)),
            expires,
            secure: self.secure,
            http_only: self.http_only,
            host_only,
            same_site: self.same_site,
        })
    }
}

/// Cap for expiry times; later dates do not survive an RFC 3339 round trip
fn latest_expiry() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59)
        .single()
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn parse_expires(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }
    EXPIRES_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// RFC 6265 domain-match
fn domain_matches(host: &str, domain: &str) -> bool {
    if domain.is_empty() {
        return false;
    }
    host == domain
        || (host.len() > domain.len()
            && host.ends_with(domain)
            && host.as_bytes()[host.len() - domain.len() - 1] == b'.')
}

/// RFC 6265 path-match
fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    request_path.starts_with(cookie_path)
        && (cookie_path.ends_with('/')
            || request_path.as_bytes().get(cookie_path.len()) == Some(&b'/'))
}

/// RFC 6265 default-path: the directory of the request path
fn default_path(url_path: &str) -> String {
    if !url_path.starts_with('/') {
        return "/".to_string();
    }
    match url_path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => url_path[..idx].to_string(),
    }
}

/// Literal host rewrite applied before cookies are parsed or matched.
///
/// Lets a client talk to an internal deployment while sending and accepting
/// cookies scoped to the production domain. The substitution is plain text:
/// the first occurrence of `internal` is replaced by `public`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainAlias {
    /// Domain used by the internal deployment
    pub internal: String,
    /// Public domain cookies are scoped to
    pub public: String,
}

impl DomainAlias {
    /// Create a new alias rule
    pub fn new(internal: impl Into<String>, public: impl Into<String>) -> Self {
        Self {
            internal: internal.into(),
            public: public.into(),
        }
    }

    /// Apply the rewrite to a cookie specification or host
    pub fn rewrite<'a>(&self, input: &'a str) -> Cow<'a, str> {
        if self.internal.is_empty() || !input.contains(self.internal.as_str()) {
            return Cow::Borrowed(input);
        }
        Cow::Owned(input.replacen(self.internal.as_str(), &self.public, 1))
    }
}

impl Default for DomainAlias {
    fn default() -> Self {
        Self::new("qwintry.loc", "qwintry.com")
    }
}

/// Options for [`CookieJar::set_cookie`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SetCookieOptions {
    /// Drop malformed cookies silently instead of returning an error
    pub ignore_error: bool,
}

impl SetCookieOptions {
    /// Options used for cookies arriving in responses
    pub fn ignore_errors() -> Self {
        Self { ignore_error: true }
    }
}

/// Thread-safe cookie storage
///
/// Cookies are kept in store order: a new cookie is appended, a cookie with
/// the same name, domain and path replaces the old one in place.
#[derive(Debug, Clone)]
pub struct CookieJar {
    cookies: Arc<RwLock<Vec<Cookie>>>,
    alias: Option<DomainAlias>,
}

impl Default for CookieJar {
    fn default() -> Self {
        Self::new()
    }
}

impl CookieJar {
    /// Create a new empty cookie jar with the default domain alias
    pub fn new() -> Self {
        Self::with_alias(Some(DomainAlias::default()))
    }

    /// Create a new empty cookie jar with a custom alias rule (or none)
    pub fn with_alias(alias: Option<DomainAlias>) -> Self {
        Self {
            cookies: Arc::new(RwLock::new(Vec::new())),
            alias,
        }
    }

    /// The domain alias rule in effect
    pub fn alias(&self) -> Option<&DomainAlias> {
        self.alias.as_ref()
    }

    fn rewrite<'a>(&self, input: &'a str) -> Cow<'a, str> {
        match &self.alias {
            Some(alias) => alias.rewrite(input),
            None => Cow::Borrowed(input),
        }
    }

    fn normalized_host(&self, url: &Url) -> String {
        let host = url.host_str().unwrap_or("").to_ascii_lowercase();
        self.rewrite(&host).into_owned()
    }

    /// Add a cookie to the jar, replacing one with the same name, domain and path
    pub fn add(&self, cookie: Cookie) {
        let mut cookies = self.cookies.write();
        match cookies.iter_mut().find(|c| c.same_slot(&cookie)) {
            Some(slot) => *slot = cookie,
            None => cookies.push(cookie),
        }
    }

    /// Parse a cookie specification and store it for `url`.
    ///
    /// Missing `Domain` makes the cookie host-only for the URL host; missing
    /// `Path` defaults to the directory of the URL path.
    pub fn set_cookie(
        &self,
        spec: &str,
        url: &Url,
        options: SetCookieOptions,
    ) -> std::result::Result<(), CookieParseError> {
        match self.parse_for_url(spec, url) {
            Ok(cookie) => {
                debug!(name = %cookie.name, domain = %cookie.domain, path = %cookie.path, "storing cookie");
                self.add(cookie);
                Ok(())
            }
            Err(err) if options.ignore_error => {
                warn!(url = %url, error = %err, "ignoring malformed cookie");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn parse_for_url(
        &self,
        spec: &str,
        url: &Url,
    ) -> std::result::Result<Cookie, CookieParseError> {
        let host = self.normalized_host(url);
        if host.is_empty() {
            return Err(CookieParseError::NoHost(url.to_string()));
        }
        let spec = self.rewrite(spec);
        ParsedCookie::parse(&spec)?.resolve(&host, url.path())
    }

    /// Store every `Set-Cookie` line found in raw response header lines.
    ///
    /// Malformed cookies are dropped; they never fail the response.
    pub fn store_response_cookies<S: AsRef<str>>(&self, header_lines: &[S], url: &Url) {
        for line in header_lines {
            let line = line.as_ref();
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            if name.trim().eq_ignore_ascii_case(headers::SET_COOKIE) {
                // ignore_error never yields Err
                let _ = self.set_cookie(value.trim(), url, SetCookieOptions::ignore_errors());
            }
        }
    }

    /// Get all cookies for a URL in store order
    pub fn get_cookies(&self, url: &Url) -> Vec<Cookie> {
        let host = self.normalized_host(url);
        let path = url.path();
        let scheme = url.scheme();

        self.cookies
            .read()
            .iter()
            .filter(|c| c.matches(scheme, &host, path))
            .cloned()
            .collect()
    }

    /// Get the Cookie header value for a URL, empty when nothing applies
    pub fn get_cookie_header(&self, url: &Url) -> String {
        self.get_cookies(url)
            .iter()
            .map(|c| c.to_header_value())
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Get the value of a cookie that would be sent to `url`
    pub fn get_cookie(&self, name: &str, url: &Url) -> Option<String> {
        self.get_cookies(url)
            .into_iter()
            .find(|c| c.name == name)
            .map(|c| c.value)
    }

    /// Snapshot of every stored cookie
    pub fn cookies(&self) -> Vec<Cookie> {
        self.cookies.read().clone()
    }

    /// Remove a specific cookie
    pub fn remove(&self, name: &str, domain: &str, path: &str) {
        self.cookies
            .write()
            .retain(|c| c.name != name || c.domain != domain || c.path != path);
    }

    /// Clear all cookies
    pub fn clear(&self) {
        self.cookies.write().clear();
    }

    /// Clear cookies for a specific domain
    pub fn clear_domain(&self, domain: &str) {
        self.cookies.write().retain(|c| c.domain != domain);
    }

    /// Remove expired cookies
    pub fn remove_expired(&self) {
        self.cookies.write().retain(|c| !c.is_expired());
    }

    /// Get total cookie count
    pub fn len(&self) -> usize {
        self.cookies.read().len()
    }

    /// Check if jar is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Export all unexpired cookies as JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        let cookies: Vec<Cookie> = self
            .cookies
            .read()
            .iter()
            .filter(|c| !c.is_expired())
            .cloned()
            .collect();
        serde_json::to_string(&cookies)
    }

    /// Import cookies from JSON
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let cookies: Vec<Cookie> = serde_json::from_str(json)?;
        let jar = CookieJar::new();
        for cookie in cookies {
            jar.add(cookie);
        }
        Ok(jar)
    }

    /// Persist the jar to a file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Load cookies from a file written by [`CookieJar::save`] into this jar
    pub fn load(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = std::fs::read_to_string(path)?;
        let cookies: Vec<Cookie> = serde_json::from_str(&json)?;
        for cookie in cookies {
            self.add(cookie);
        }
        Ok(())
    }
}
