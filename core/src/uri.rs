/*
 * uri.rs
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

//! URL normalization: parse and resolve request URLs, merge query parameters,
//! form encoding, userinfo credentials, and redirect host comparison.

use percent_encoding::percent_decode_str;
use url::{form_urlencoded, Url};

use crate::error::{Error, Result};

/// Parse `raw` as an absolute http(s) URL, resolving it against `base` when it is relative.
pub fn parse_url(raw: &str, base: Option<&Url>) -> Result<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Error::UrlRequired);
    }
    let url = match Url::parse(raw) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => match base {
            Some(base) => base
                .join(raw)
                .map_err(|e| Error::invalid_url(raw, e.to_string()))?,
            None => return Err(Error::MissingSchema(raw.to_string())),
        },
        Err(e) => return Err(Error::invalid_url(raw, e.to_string())),
    };
    check_http_url(&url)?;
    Ok(url)
}

/// An http or https URL with a non-empty host.
pub fn check_http_url(url: &Url) -> Result<()> {
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(Error::invalid_url(
                url.as_str(),
                format!("unsupported scheme {:?}", other),
            ))
        }
    }
    match url.host_str() {
        Some(h) if !h.is_empty() => Ok(()),
        _ => Err(Error::invalid_url(url.as_str(), "no host")),
    }
}

/// Append `params` (form-encoded) after any query already in `url`.
pub fn merge_params<K: AsRef<str>, V: AsRef<str>>(url: &mut Url, params: &[(K, V)]) {
    if params.is_empty() {
        return;
    }
    let mut pairs = url.query_pairs_mut();
    for (k, v) in params {
        pairs.append_pair(k.as_ref(), v.as_ref());
    }
}

/// `application/x-www-form-urlencoded` serialization.
pub fn encode_form<K: AsRef<str>, V: AsRef<str>>(fields: &[(K, V)]) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (k, v) in fields {
        serializer.append_pair(k.as_ref(), v.as_ref());
    }
    serializer.finish()
}

/// Parse a form-encoded body into ordered pairs.
pub fn parse_form(body: &[u8]) -> Vec<(String, String)> {
    form_urlencoded::parse(body).into_owned().collect()
}

/// Percent-decoded (username, password) from the URL userinfo, if a username is present.
pub fn credentials(url: &Url) -> Option<(String, String)> {
    if url.username().is_empty() {
        return None;
    }
    let user = percent_decode_str(url.username())
        .decode_utf8_lossy()
        .into_owned();
    let pass = url
        .password()
        .map(|p| percent_decode_str(p).decode_utf8_lossy().into_owned())
        .unwrap_or_default();
    Some((user, pass))
}

/// Copy of `url` without userinfo.
pub fn strip_credentials(url: &Url) -> Url {
    let mut out = url.clone();
    // Both setters only fail for cannot-be-a-base URLs, which http(s) URLs never are.
    let _ = out.set_username("");
    let _ = out.set_password(None);
    out
}

/// Host as used for connecting and SNI: IPv6 literals without brackets.
pub fn connect_host(url: &Url) -> String {
    match url.host() {
        Some(url::Host::Ipv6(addr)) => addr.to_string(),
        Some(host) => host.to_string(),
        None => String::new(),
    }
}

/// Value for the `Host` header: host plus port when it is not the scheme default.
pub fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

/// Origin-form request target: path plus query.
pub fn request_target(url: &Url) -> String {
    match url.query() {
        Some(q) => format!("{}?{}", url.path(), q),
        None => url.path().to_string(),
    }
}

/// Absolute-form request target (for plain-HTTP proxies), never with userinfo or fragment.
pub fn absolute_target(url: &Url) -> String {
    let mut out = strip_credentials(url);
    out.set_fragment(None);
    out.to_string()
}

/// Whether Authorization must be dropped when redirecting from `old` to `new`.
///
/// Dropped when the host changes, or the scheme or port change, except an http to https
/// upgrade on the default ports of the same host.
pub fn should_strip_auth(old: &Url, new: &Url) -> bool {
    if old.host_str() != new.host_str() {
        return true;
    }
    if old.scheme() == "http"
        && new.scheme() == "https"
        && old.port().is_none()
        && new.port().is_none()
    {
        return false;
    }
    old.scheme() != new.scheme() || old.port_or_known_default() != new.port_or_known_default()
}
