/*
 * prepare.rs
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

//! Request preparation: merge a `Request` with session defaults into an immutable `PreparedRequest`.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use url::Url;

use crate::auth::{Auth, BasicAuth};
use crate::config::default_user_agent;
use crate::error::Result;
use crate::protocol::http::header::HeaderMap;
use crate::protocol::http::request::{Body, BodyStream, Method, Request};
use crate::uri;

/// Final request body.
#[derive(Debug)]
pub enum PreparedBody {
    Empty,
    Bytes(Bytes),
    /// Sent chunked; taken out by the adapter before the request is shared.
    Stream(BodyStream),
    /// A stream body that has already been handed to the connection.
    Sent,
}

/// Session-level inputs to `prepare`.
#[derive(Default)]
pub struct PrepareDefaults<'a> {
    pub base_url: Option<&'a Url>,
    pub headers: Option<&'a HeaderMap>,
    pub params: &'a [(String, String)],
    pub auth: Option<&'a Arc<dyn Auth>>,
    /// Session cookies matching the final URL, computed by the caller.
    pub cookie_header: Option<&'a dyn Fn(&Url) -> Option<String>>,
}

/// Fully resolved, immutable request. Fields are read-only.
pub struct PreparedRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: PreparedBody,
    cookies: Vec<(String, String)>,
}

impl PreparedRequest {
    pub fn method(&self) -> Method {
        self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &PreparedBody {
        &self.body
    }

    /// Buffered body bytes, if the body is not a stream.
    pub fn body_bytes(&self) -> Option<&Bytes> {
        match &self.body {
            PreparedBody::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Cookies given on the request itself (not from the jar); kept for redirects.
    pub fn request_cookies(&self) -> &[(String, String)] {
        &self.cookies
    }

    /// Copy for a resend. `None` when the body is a stream.
    pub fn try_clone(&self) -> Option<PreparedRequest> {
        let body = match &self.body {
            PreparedBody::Empty => PreparedBody::Empty,
            PreparedBody::Bytes(b) => PreparedBody::Bytes(b.clone()),
            PreparedBody::Stream(_) | PreparedBody::Sent => return None,
        };
        Some(PreparedRequest {
            method: self.method,
            url: self.url.clone(),
            headers: self.headers.clone(),
            body,
            cookies: self.cookies.clone(),
        })
    }

    /// Separate a stream body from the request; the returned request records it as `Sent`.
    pub(crate) fn take_stream(mut self) -> (PreparedRequest, Option<BodyStream>) {
        match std::mem::replace(&mut self.body, PreparedBody::Sent) {
            PreparedBody::Stream(stream) => (self, Some(stream)),
            other => {
                self.body = other;
                (self, None)
            }
        }
    }

    /// Next hop of a redirect: a new request built from this one.
    pub(crate) fn redirected(
        &self,
        method: Method,
        url: Url,
        headers: HeaderMap,
        body: PreparedBody,
    ) -> PreparedRequest {
        PreparedRequest {
            method,
            url,
            headers,
            body,
            cookies: self.cookies.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn for_test(method: Method, url: &str, headers: HeaderMap, body: PreparedBody) -> Self {
        PreparedRequest {
            method,
            url: Url::parse(url).unwrap(),
            headers,
            body,
            cookies: Vec::new(),
        }
    }
}

impl fmt::Debug for PreparedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedRequest")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("headers", &self.headers)
            .field("body", &self.body)
            .finish()
    }
}

/// Headers every request starts from.
pub fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("User-Agent", default_user_agent());
    headers.insert("Accept", "*/*");
    headers.insert("Connection", "keep-alive");
    headers
}

/// Merge `request` with `defaults` into a `PreparedRequest`.
///
/// Header precedence: request > session > library defaults. Auth runs last:
/// request auth, else session auth, else credentials in the URL.
pub fn prepare(request: Request, defaults: &PrepareDefaults<'_>) -> Result<PreparedRequest> {
    let Request {
        method,
        url,
        headers: request_headers,
        params,
        body,
        auth,
        cookies,
    } = request;

    let parsed = uri::parse_url(&url, defaults.base_url)?;
    let url_credentials = uri::credentials(&parsed);
    let mut url = uri::strip_credentials(&parsed);
    url.set_fragment(None);
    uri::merge_params(&mut url, defaults.params);
    uri::merge_params(&mut url, &params);

    let mut headers = default_headers();
    if let Some(session_headers) = defaults.headers {
        headers.merge(session_headers);
    }
    headers.merge(&request_headers);
    headers.validate()?;

    if !headers.contains("cookie") {
        let mut parts: Vec<String> = Vec::new();
        if let Some(jar) = defaults.cookie_header.and_then(|f| f(&url)) {
            parts.push(jar);
        }
        parts.extend(cookies.iter().map(|(k, v)| format!("{}={}", k, v)));
        if !parts.is_empty() {
            headers.insert("Cookie", parts.join("; "));
        }
    }

    let body = prepare_body(method, body, &mut headers)?;

    let auth: Option<Arc<dyn Auth>> = match auth.or_else(|| defaults.auth.cloned()) {
        Some(a) => Some(a),
        None => url_credentials.map(|(u, p)| Arc::new(BasicAuth::new(u, p)) as Arc<dyn Auth>),
    };
    if let Some(auth) = auth {
        auth.apply(&mut url, &mut headers)?;
        uri::check_http_url(&url)?;
    }

    Ok(PreparedRequest {
        method,
        url,
        headers,
        body,
        cookies,
    })
}

fn prepare_body(method: Method, body: Body, headers: &mut HeaderMap) -> Result<PreparedBody> {
    let prepared = match body {
        Body::Empty => PreparedBody::Empty,
        Body::Form(fields) => {
            set_default(headers, "Content-Type", "application/x-www-form-urlencoded");
            PreparedBody::Bytes(Bytes::from(uri::encode_form(&fields)))
        }
        Body::Json(value) => {
            set_default(headers, "Content-Type", "application/json");
            PreparedBody::Bytes(Bytes::from(serde_json::to_vec(&value)?))
        }
        Body::Bytes(bytes) => PreparedBody::Bytes(bytes),
        Body::Text(text) => PreparedBody::Bytes(Bytes::from(text)),
        Body::Stream(stream) => PreparedBody::Stream(stream),
    };
    match &prepared {
        PreparedBody::Bytes(bytes) => {
            headers.remove("Transfer-Encoding");
            headers.insert("Content-Length", bytes.len().to_string());
        }
        PreparedBody::Empty if method.expects_body() => {
            headers.insert("Content-Length", "0");
        }
        PreparedBody::Stream(_) => {
            headers.remove("Content-Length");
            headers.insert("Transfer-Encoding", "chunked");
        }
        _ => {}
    }
    Ok(prepared)
}

fn set_default(headers: &mut HeaderMap, name: &str, value: &str) {
    if !headers.contains(name) {
        headers.insert(name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn prep(req: Request) -> Result<PreparedRequest> {
        prepare(req, &PrepareDefaults::default())
    }

    #[test]
    fn request_headers_override_session_headers() {
        let session: HeaderMap = [("user-agent", "session-agent"), ("X-Session", "s")]
            .into_iter()
            .collect();
        let mut req = Request::new(Method::Get, "http://h/");
        req.header("USER-AGENT", "request-agent");
        let defaults = PrepareDefaults {
            headers: Some(&session),
            ..Default::default()
        };
        let p = prepare(req, &defaults).unwrap();
        assert_eq!(p.headers().get("User-Agent"), Some("request-agent"));
        assert_eq!(p.headers().get_all("user-agent").count(), 1);
        assert_eq!(p.headers().get("x-session"), Some("s"));
        assert_eq!(p.headers().get("accept"), Some("*/*"));
    }

    #[test]
    fn session_headers_override_library_defaults() {
        let session: HeaderMap = [("Accept", "application/json")].into_iter().collect();
        let defaults = PrepareDefaults {
            headers: Some(&session),
            ..Default::default()
        };
        let p = prepare(Request::new(Method::Get, "http://h/"), &defaults).unwrap();
        assert_eq!(p.headers().get("accept"), Some("application/json"));
        assert!(p.headers().get("user-agent").unwrap().starts_with("courier/"));
    }

    #[test]
    fn url_is_absolute_with_merged_params() {
        let base = Url::parse("https://api.example.com/v2/").unwrap();
        let session_params = vec![("key".to_string(), "k".to_string())];
        let mut req = Request::new(Method::Get, "items?sort=asc#top");
        req.param("page", "2");
        let defaults = PrepareDefaults {
            base_url: Some(&base),
            params: &session_params,
            ..Default::default()
        };
        let p = prepare(req, &defaults).unwrap();
        assert_eq!(p.url().scheme(), "https");
        assert_eq!(p.url().host_str(), Some("api.example.com"));
        assert_eq!(p.url().as_str(), "https://api.example.com/v2/items?sort=asc&key=k&page=2");
    }

    #[test]
    fn relative_url_without_base_fails() {
        assert!(matches!(
            prep(Request::new(Method::Get, "/relative")),
            Err(Error::MissingSchema(_))
        ));
    }

    #[test]
    fn form_body_sets_type_and_length() {
        let mut req = Request::new(Method::Post, "http://h/");
        req.form([("a", "1 2"), ("b", "&")]);
        let p = prep(req).unwrap();
        assert_eq!(
            p.headers().get("content-type"),
            Some("application/x-www-form-urlencoded")
        );
        let body = p.body_bytes().unwrap();
        assert_eq!(p.headers().get("content-length"), Some(body.len().to_string().as_str()));
        let mut parsed = uri::parse_form(body);
        parsed.sort();
        assert_eq!(
            parsed,
            vec![("a".to_string(), "1 2".to_string()), ("b".to_string(), "&".to_string())]
        );
    }

    #[test]
    fn explicit_content_type_is_kept() {
        let mut req = Request::new(Method::Post, "http://h/");
        req.header("Content-Type", "application/vnd.api+json")
            .json(&serde_json::json!({"x": 1}))
            .unwrap();
        let p = prep(req).unwrap();
        assert_eq!(p.headers().get("content-type"), Some("application/vnd.api+json"));
        assert_eq!(p.body_bytes().unwrap().as_ref(), br#"{"x":1}"#);
    }

    #[test]
    fn json_body_sets_content_type() {
        let mut req = Request::new(Method::Patch, "http://h/");
        req.json(&vec![1, 2, 3]).unwrap();
        let p = prep(req).unwrap();
        assert_eq!(p.headers().get("content-type"), Some("application/json"));
        assert_eq!(p.headers().get("content-length"), Some("7"));
    }

    #[test]
    fn streaming_body_has_no_content_length() {
        let mut req = Request::new(Method::Put, "http://h/upload");
        req.header("Content-Length", "99")
            .body(Body::stream(std::io::Cursor::new(b"abc".to_vec())));
        let p = prep(req).unwrap();
        assert!(p.headers().get("content-length").is_none());
        assert_eq!(p.headers().get("transfer-encoding"), Some("chunked"));
        assert!(p.try_clone().is_none());
        let (shared, stream) = p.take_stream();
        assert!(stream.is_some());
        assert!(matches!(shared.body(), PreparedBody::Sent));
    }

    #[test]
    fn empty_post_announces_zero_length() {
        let p = prep(Request::new(Method::Post, "http://h/")).unwrap();
        assert_eq!(p.headers().get("content-length"), Some("0"));
        let g = prep(Request::new(Method::Get, "http://h/")).unwrap();
        assert!(g.headers().get("content-length").is_none());
    }

    #[test]
    fn auth_is_applied_last_and_url_credentials_lifted() {
        let p = prep(Request::new(Method::Get, "http://user:pw@h/secret")).unwrap();
        assert_eq!(p.url().as_str(), "http://h/secret");
        assert_eq!(p.headers().get("authorization"), Some("Basic dXNlcjpwdw=="));

        let mut req = Request::new(Method::Get, "http://user:pw@h/secret");
        req.header("Authorization", "overwritten")
            .auth(crate::auth::BearerAuth::new("tok"));
        let p = prep(req).unwrap();
        assert_eq!(p.headers().get("authorization"), Some("Bearer tok"));
    }

    #[test]
    fn cookies_from_jar_and_request() {
        let jar = |url: &Url| -> Option<String> {
            (url.host_str() == Some("h")).then(|| "sid=1".to_string())
        };
        let mut req = Request::new(Method::Get, "http://h/");
        req.cookie("extra", "2");
        let defaults = PrepareDefaults {
            cookie_header: Some(&jar),
            ..Default::default()
        };
        let p = prepare(req, &defaults).unwrap();
        assert_eq!(p.headers().get("cookie"), Some("sid=1; extra=2"));
    }

    #[test]
    fn control_characters_in_headers_fail() {
        let mut req = Request::new(Method::Get, "http://h/");
        req.header("X-Evil", "a\nb");
        assert!(matches!(prep(req), Err(Error::InvalidHeader { .. })));
    }
}
