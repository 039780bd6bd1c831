/*
 * cookies.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Courier, an HTTP client library.
 *
 * Courier is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Courier is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Courier.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Cookie jar: stores `Set-Cookie` results and produces `Cookie` request headers.
//!
//! A subset of RFC 6265: `Domain` (host-only when absent), `Path` (default path when
//! absent), `Expires`, `Max-Age` (takes precedence over `Expires`), `Secure`, `HttpOnly`.
//! Cookies are keyed by (domain, path, name); a later `Set-Cookie` replaces an earlier one.
//! The jar itself is not synchronized; `Session` keeps it behind a lock.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, Utc};
use url::Url;

use crate::protocol::http::header::HeaderMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    /// Lower-case domain without leading dot.
    pub domain: String,
    /// True when the cookie had no `Domain` attribute: it matches only that exact host.
    pub host_only: bool,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    /// `None` for session cookies.
    pub expires: Option<DateTime<Utc>>,
}

impl Cookie {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires.map(|e| e <= now).unwrap_or(false)
    }

    fn matches(&self, url: &Url, now: DateTime<Utc>) -> bool {
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        let domain_ok = if self.host_only {
            host == self.domain
        } else {
            domain_match(&host, &self.domain)
        };
        domain_ok
            && path_match(url.path(), &self.path)
            && (!self.secure || url.scheme() == "https")
            && !self.is_expired(now)
    }
}

/// In-memory cookie jar.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    cookies: Vec<Cookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store every `Set-Cookie` header of a response received from `url`.
    pub fn store_response_cookies(&mut self, url: &Url, headers: &HeaderMap) {
        let now = Utc::now();
        for value in headers.get_all("set-cookie") {
            if let Some(cookie) = parse_set_cookie(url, value, now) {
                self.store(cookie, now);
            }
        }
    }

    /// Value for the `Cookie` header of a request to `url`, if any cookie matches.
    /// Longer paths come first.
    pub fn cookie_header(&self, url: &Url) -> Option<String> {
        let now = Utc::now();
        let mut matching: Vec<&Cookie> = self.cookies.iter().filter(|c| c.matches(url, now)).collect();
        if matching.is_empty() {
            return None;
        }
        matching.sort_by(|a, b| b.path.len().cmp(&a.path.len()));
        Some(
            matching
                .iter()
                .map(|c| format!("{}={}", c.name, c.value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Set a cookie directly. An empty `domain` makes it match any host.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>, domain: &str, path: &str) {
        let domain = domain.trim_start_matches('.').to_ascii_lowercase();
        let cookie = Cookie {
            name: name.into(),
            value: value.into(),
            host_only: false,
            domain,
            path: if path.is_empty() { "/".to_string() } else { path.to_string() },
            secure: false,
            http_only: false,
            expires: None,
        };
        self.store(cookie, Utc::now());
    }

    /// First stored value for `name` on any domain/path.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.value.as_str())
    }

    /// Remove every cookie named `name`; returns how many were removed.
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.cookies.len();
        self.cookies.retain(|c| c.name != name);
        before - self.cookies.len()
    }

    pub fn clear(&mut self) {
        self.cookies.clear();
    }

    /// Drop expired cookies.
    pub fn clear_expired(&mut self) {
        let now = Utc::now();
        self.cookies.retain(|c| !c.is_expired(now));
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cookie> {
        self.cookies.iter()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    fn store(&mut self, cookie: Cookie, now: DateTime<Utc>) {
        self.cookies.retain(|c| {
            !(c.name == cookie.name && c.domain == cookie.domain && c.path == cookie.path)
        });
        // An already expired cookie only deletes.
        if !cookie.is_expired(now) {
            self.cookies.push(cookie);
        }
    }
}

/// Parse one `Set-Cookie` value in the context of the request URL.
/// Returns `None` for malformed cookies and for a `Domain` the request host does not match.
fn parse_set_cookie(url: &Url, header: &str, now: DateTime<Utc>) -> Option<Cookie> {
    let mut parts = header.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let host = url.host_str()?.to_ascii_lowercase();
    let mut cookie = Cookie {
        name: name.to_string(),
        value: value.trim().trim_matches('"').to_string(),
        domain: host.clone(),
        host_only: true,
        path: default_path(url),
        secure: false,
        http_only: false,
        expires: None,
    };
    let mut max_age: Option<i64> = None;
    for attr in parts {
        let attr = attr.trim();
        let (key, val) = match attr.split_once('=') {
            Some((k, v)) => (k.trim(), v.trim()),
            None => (attr, ""),
        };
        match key.to_ascii_lowercase().as_str() {
            "domain" if !val.is_empty() => {
                let domain = val.trim_start_matches('.').to_ascii_lowercase();
                // A dotless domain (a TLD) is only accepted for that exact host.
                if !domain_match(&host, &domain)
                    || (!domain.trim_end_matches('.').contains('.') && domain != host)
                {
                    return None;
                }
                cookie.domain = domain;
                cookie.host_only = false;
            }
            "path" if val.starts_with('/') => cookie.path = val.to_string(),
            "expires" => cookie.expires = parse_cookie_date(val),
            "max-age" => max_age = val.parse::<i64>().ok(),
            "secure" => cookie.secure = true,
            "httponly" => cookie.http_only = true,
            _ => {}
        }
    }
    if let Some(seconds) = max_age {
        cookie.expires = Some(if seconds <= 0 {
            DateTime::<Utc>::MIN_UTC
        } else {
            ChronoDuration::try_seconds(seconds)
                .and_then(|delta| now.checked_add_signed(delta))
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        });
    }
    Some(cookie)
}

/// RFC 6265 5.1.4 default path: directory of the request path.
fn default_path(url: &Url) -> String {
    let path = url.path();
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(i) => path[..i].to_string(),
    }
}

/// `Expires` in RFC 1123 form, or the older `Wed, 21-Oct-2015 07:28:00 GMT` form.
fn parse_cookie_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%a, %d-%b-%Y %H:%M:%S GMT")
        .ok()
        .map(|naive| naive.and_utc())
}

fn domain_match(host: &str, domain: &str) -> bool {
    if domain.is_empty() {
        return true;
    }
    host == domain
        || (host.len() > domain.len()
            && host.ends_with(domain)
            && host.as_bytes()[host.len() - domain.len() - 1] == b'.')
}

fn path_match(request_path: &str, cookie_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    request_path.starts_with(cookie_path)
        && (cookie_path.ends_with('/') || request_path.as_bytes().get(cookie_path.len()) == Some(&b'/'))
}
