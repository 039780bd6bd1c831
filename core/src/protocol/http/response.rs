/*
 * response.rs
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

//! HTTP response: status, headers, final URL, history, and a lazily read body.
//!
//! The body is read at most once. `bytes`, `text` and `json` buffer it and cache the
//! buffer; `chunk` streams it forward-only. Once streamed, the body cannot be
//! buffered any more (`ContentConsumed`).

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::http::header::{HeaderMap, MediaType};
use crate::protocol::http::prepare::PreparedRequest;
use crate::status;

pub type ChunkFuture<'a> = Pin<Box<dyn Future<Output = Result<Option<Bytes>>> + Send + 'a>>;

/// Source of response body chunks. Adapters implement this for their transport.
pub trait BodyReader: Send {
    /// Next chunk, `None` at the end of the body.
    fn next_chunk(&mut self) -> ChunkFuture<'_>;
}

enum BodyState {
    /// Nothing read yet.
    Pending(Box<dyn BodyReader>),
    /// Partially read through `chunk`.
    Streaming(Box<dyn BodyReader>),
    Buffered { data: Bytes, yielded: bool },
    Consumed,
}

pub struct Response {
    status: u16,
    reason: String,
    headers: HeaderMap,
    url: Url,
    elapsed: Duration,
    request: Arc<PreparedRequest>,
    history: Vec<Response>,
    body: BodyState,
    encoding: Option<&'static Encoding>,
}

impl Response {
    /// Response whose body is read from `reader` on demand.
    pub fn from_reader(
        request: Arc<PreparedRequest>,
        status: u16,
        reason: impl Into<String>,
        headers: HeaderMap,
        reader: Box<dyn BodyReader>,
    ) -> Self {
        Self::with_body(request, status, reason.into(), headers, BodyState::Pending(reader))
    }

    /// Response with an already buffered body.
    pub fn from_bytes(
        request: Arc<PreparedRequest>,
        status: u16,
        headers: HeaderMap,
        body: impl Into<Bytes>,
    ) -> Self {
        let reason = status::reason_phrase(status).unwrap_or_default().to_string();
        Self::with_body(
            request,
            status,
            reason,
            headers,
            BodyState::Buffered {
                data: body.into(),
                yielded: false,
            },
        )
    }

    fn with_body(
        request: Arc<PreparedRequest>,
        status: u16,
        reason: String,
        headers: HeaderMap,
        body: BodyState,
    ) -> Self {
        Self {
            status,
            reason,
            headers,
            url: request.url().clone(),
            elapsed: Duration::ZERO,
            request,
            history: Vec::new(),
            body,
            encoding: None,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// True for status codes below 400.
    pub fn ok(&self) -> bool {
        self.status < 400
    }

    /// A redirect status with a `Location` header.
    pub fn is_redirect(&self) -> bool {
        status::is_redirect(self.status) && self.headers.contains("location")
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Final URL, after redirects.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Time from sending the request to receiving the response head.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub(crate) fn set_elapsed(&mut self, elapsed: Duration) {
        self.elapsed = elapsed;
    }

    /// The request that produced this response (its stream body, if any, already sent).
    pub fn request(&self) -> &Arc<PreparedRequest> {
        &self.request
    }

    /// Responses of the redirects that led here, oldest first.
    pub fn history(&self) -> &[Response] {
        &self.history
    }

    pub(crate) fn set_history(&mut self, history: Vec<Response>) {
        self.history = history;
    }

    pub fn content_length(&self) -> Option<u64> {
        self.headers.content_length()
    }

    /// Encoding used by `text`: the override, else the `Content-Type` charset, else
    /// windows-1252 for `text/*` and UTF-8 for anything else.
    pub fn encoding(&self) -> &'static Encoding {
        if let Some(encoding) = self.encoding {
            return encoding;
        }
        let media = self.headers.get("content-type").and_then(MediaType::parse);
        if let Some(encoding) = media
            .as_ref()
            .and_then(|m| m.charset())
            .and_then(|c| Encoding::for_label(c.as_bytes()))
        {
            return encoding;
        }
        match media {
            Some(m) if m.primary_type().eq_ignore_ascii_case("text") => WINDOWS_1252,
            _ => UTF_8,
        }
    }

    /// Override the encoding used by `text`. Unknown labels are rejected.
    pub fn set_encoding(&mut self, label: &str) -> Result<()> {
        let encoding = Encoding::for_label(label.as_bytes())
            .ok_or_else(|| Error::Protocol(format!("unknown encoding {:?}", label)))?;
        self.encoding = Some(encoding);
        Ok(())
    }

    /// Whole body, buffered on first call.
    pub async fn bytes(&mut self) -> Result<Bytes> {
        match std::mem::replace(&mut self.body, BodyState::Consumed) {
            BodyState::Pending(mut reader) => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = reader.next_chunk().await? {
                    buf.extend_from_slice(&chunk);
                }
                let data = buf.freeze();
                self.body = BodyState::Buffered {
                    data: data.clone(),
                    yielded: false,
                };
                Ok(data)
            }
            BodyState::Buffered { data, yielded } => {
                self.body = BodyState::Buffered {
                    data: data.clone(),
                    yielded,
                };
                Ok(data)
            }
            state @ (BodyState::Streaming(_) | BodyState::Consumed) => {
                self.body = state;
                Err(Error::ContentConsumed)
            }
        }
    }

    /// Body decoded with `encoding()`; a byte order mark takes precedence.
    pub async fn text(&mut self) -> Result<String> {
        let data = self.bytes().await?;
        let (text, _, _) = self.encoding().decode(&data);
        Ok(text.into_owned())
    }

    /// Body deserialized from JSON.
    pub async fn json<T: DeserializeOwned>(&mut self) -> Result<T> {
        let data = self.bytes().await?;
        let body = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&data[..]);
        Ok(serde_json::from_slice(body)?)
    }

    /// Next body chunk, `None` when the body is exhausted. A buffered body is
    /// yielded once as a single chunk.
    pub async fn chunk(&mut self) -> Result<Option<Bytes>> {
        match &mut self.body {
            BodyState::Buffered { data, yielded } => {
                if *yielded || data.is_empty() {
                    return Ok(None);
                }
                *yielded = true;
                Ok(Some(data.clone()))
            }
            BodyState::Consumed => Ok(None),
            BodyState::Pending(_) | BodyState::Streaming(_) => {
                let mut reader = match std::mem::replace(&mut self.body, BodyState::Consumed) {
                    BodyState::Pending(r) | BodyState::Streaming(r) => r,
                    _ => return Ok(None),
                };
                // On error the body stays Consumed and the reader (and its connection) is dropped.
                let next = reader.next_chunk().await?;
                if next.is_some() {
                    self.body = BodyState::Streaming(reader);
                }
                Ok(next)
            }
        }
    }

    /// Read and discard the rest of the body so the connection can be reused.
    pub(crate) async fn drain(&mut self) -> Result<()> {
        while self.chunk().await?.is_some() {}
        Ok(())
    }

    /// Buffer the body now (non-stream requests).
    pub(crate) async fn buffer(&mut self) -> Result<()> {
        if matches!(self.body, BodyState::Pending(_)) {
            self.bytes().await?;
        }
        Ok(())
    }

    /// Fail with `Http` for 4xx and 5xx statuses.
    pub fn raise_for_status(&self) -> Result<()> {
        let class = if status::is_client_error(self.status) {
            "Client Error"
        } else if status::is_server_error(self.status) {
            "Server Error"
        } else {
            return Ok(());
        };
        Err(Error::Http {
            status: self.status,
            class,
            reason: self.reason.clone(),
            url: self.url.to_string(),
        })
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = match &self.body {
            BodyState::Pending(_) => "pending",
            BodyState::Streaming(_) => "streaming",
            BodyState::Buffered { .. } => "buffered",
            BodyState::Consumed => "consumed",
        };
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("url", &self.url.as_str())
            .field("headers", &self.headers)
            .field("body", &body)
            .finish()
    }
}
