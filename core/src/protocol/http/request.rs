/*
 * request.rs
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

//! HTTP request: method, URL, headers, query params, body, auth.
//!
//! A `Request` is the caller's mutable description. It is never sent as is:
//! `prepare` turns it into an immutable `PreparedRequest`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tokio::io::AsyncRead;

use crate::auth::Auth;
use crate::error::{Error, Result};
use crate::protocol::http::header::HeaderMap;

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }

    /// Methods whose empty body is still announced with `Content-Length: 0`.
    pub(crate) fn expects_body(&self) -> bool {
        !matches!(self, Method::Get | Method::Head | Method::Options)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "PATCH" => Ok(Method::Patch),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            _ => Err(Error::Protocol(format!("unsupported method {:?}", s))),
        }
    }
}

/// Streaming request body. Sent with chunked transfer encoding; can be sent only once.
pub struct BodyStream(Box<dyn AsyncRead + Send + Sync + Unpin>);

impl BodyStream {
    pub fn new(reader: impl AsyncRead + Send + Sync + Unpin + 'static) -> Self {
        Self(Box::new(reader))
    }

    pub(crate) fn reader(&mut self) -> &mut (dyn AsyncRead + Send + Sync + Unpin) {
        &mut *self.0
    }
}

impl fmt::Debug for BodyStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BodyStream")
    }
}

/// Request body, dispatched explicitly by the preparer.
#[derive(Debug, Default)]
pub enum Body {
    #[default]
    Empty,
    /// Form fields, sent as `application/x-www-form-urlencoded`.
    Form(Vec<(String, String)>),
    Bytes(Bytes),
    Text(String),
    /// Serialized as JSON with `Content-Type: application/json`.
    Json(serde_json::Value),
    Stream(BodyStream),
}

impl Body {
    pub fn form<K: Into<String>, V: Into<String>>(fields: impl IntoIterator<Item = (K, V)>) -> Self {
        Body::Form(fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(Body::Json(serde_json::to_value(value)?))
    }

    pub fn stream(reader: impl AsyncRead + Send + Sync + Unpin + 'static) -> Self {
        Body::Stream(BodyStream::new(reader))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }
}

impl From<Vec<u8>> for Body {
    fn from(data: Vec<u8>) -> Self {
        Body::Bytes(Bytes::from(data))
    }
}

impl From<&'static [u8]> for Body {
    fn from(data: &'static [u8]) -> Self {
        Body::Bytes(Bytes::from_static(data))
    }
}

impl From<Bytes> for Body {
    fn from(data: Bytes) -> Self {
        Body::Bytes(data)
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

/// Mutable logical request.
///
/// Add headers, params and a body, then hand it to `Session::prepare_request`
/// or `prepare`. Header names compare case-insensitively; setting a header twice keeps the last value.
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub params: Vec<(String, String)>,
    pub body: Body,
    pub auth: Option<Arc<dyn Auth>>,
    /// Sent in addition to the session's matching cookies.
    pub cookies: Vec<(String, String)>,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            params: Vec::new(),
            body: Body::Empty,
            auth: None,
            cookies: Vec::new(),
        }
    }

    /// Add or replace a header.
    pub fn header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.insert(name, value);
        self
    }

    /// Append a query parameter.
    pub fn param(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn body(&mut self, body: impl Into<Body>) -> &mut Self {
        self.body = body.into();
        self
    }

    pub fn form<K: Into<String>, V: Into<String>>(
        &mut self,
        fields: impl IntoIterator<Item = (K, V)>,
    ) -> &mut Self {
        self.body = Body::form(fields);
        self
    }

    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<&mut Self> {
        self.body = Body::json(value)?;
        Ok(self)
    }

    pub fn auth(&mut self, auth: impl Auth + 'static) -> &mut Self {
        self.auth = Some(Arc::new(auth));
        self
    }

    pub fn cookie(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.cookies.push((name.into(), value.into()));
        self
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("params", &self.params)
            .field("body", &self.body)
            .field("auth", &self.auth.as_ref().map(|_| "***"))
            .finish()
    }
}
