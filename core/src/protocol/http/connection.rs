/*
 * connection.rs
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

//! HTTP connection: one TCP or TLS stream. Writes a request head and body, then drives
//! the H1 push parser to read the response head and, on demand, the body.

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream;

use crate::error::{Error, Result, TimeoutPhase};
use crate::protocol::http::h1::{H1ResponseHandler, HttpVersion, ParseState, ResponseParser};
use crate::protocol::http::header::HeaderMap;
use crate::protocol::http::request::BodyStream;

const READ_CHUNK: usize = 16 * 1024;

/// Unified stream: plain TCP or TLS. Implements AsyncRead + AsyncWrite.
pub enum HttpStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for HttpStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for HttpStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_flush(cx),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Status line and headers of a final (non-1xx) response.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub version: HttpVersion,
    pub status: u16,
    pub reason: String,
    pub headers: HeaderMap,
}

/// Collects parser events for the response in flight.
#[derive(Default)]
struct Inbound {
    status: Option<(HttpVersion, u16, String)>,
    headers: HeaderMap,
    trailers: HeaderMap,
    body: VecDeque<Bytes>,
    complete: bool,
}

impl H1ResponseHandler for Inbound {
    fn status(&mut self, version: HttpVersion, code: u16, reason: &str) {
        self.status = Some((version, code, reason.to_string()));
    }

    fn header(&mut self, name: &str, value: &str) {
        self.headers.append(name, value);
    }

    fn body_chunk(&mut self, data: &[u8]) {
        if !data.is_empty() {
            self.body.push_back(Bytes::copy_from_slice(data));
        }
    }

    fn trailer(&mut self, name: &str, value: &str) {
        self.trailers.append(name, value);
    }

    fn complete(&mut self) {
        self.complete = true;
    }
}

/// One HTTP/1.1 connection carrying one exchange at a time.
pub struct HttpConnection {
    stream: HttpStream,
    /// `host:port` of the peer, for error messages.
    peer: String,
    read_buf: BytesMut,
    parser: ResponseParser,
    inbound: Inbound,
    read_timeout: Option<Duration>,
    keep_alive: bool,
    received_any: bool,
}

impl HttpConnection {
    pub fn new(stream: HttpStream, peer: impl Into<String>) -> Self {
        Self {
            stream,
            peer: peer.into(),
            read_buf: BytesMut::with_capacity(READ_CHUNK),
            parser: ResponseParser::new(),
            inbound: Inbound::default(),
            read_timeout: None,
            keep_alive: true,
            received_any: false,
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Deadline for each socket read and for sending a request. `None` waits forever.
    pub fn set_read_timeout(&mut self, limit: Option<Duration>) {
        self.read_timeout = limit;
    }

    /// Whether any byte of the current response has arrived.
    pub fn received_any(&self) -> bool {
        self.received_any
    }

    /// Write an encoded request head followed by the body: buffered bytes as is, a stream
    /// with chunked framing.
    pub async fn write_request(
        &mut self,
        head: &[u8],
        body: Option<&Bytes>,
        body_stream: Option<&mut BodyStream>,
    ) -> Result<()> {
        self.parser.reset();
        self.inbound = Inbound::default();
        self.received_any = false;
        let write = write_message(&mut self.stream, head, body, body_stream);
        let result = match self.read_timeout {
            Some(limit) => timeout(limit, write).await.map_err(|_| Error::Timeout {
                phase: TimeoutPhase::Send,
                after: limit,
            })?,
            None => write.await,
        };
        result.map_err(|e| Error::connection(&self.peer, e))
    }

    /// Read up to the end of the final response head, skipping 1xx interim responses.
    /// With `bodiless` (HEAD, CONNECT) the body is taken to be empty whatever the headers say.
    pub async fn read_head(&mut self, bodiless: bool) -> Result<ResponseHead> {
        loop {
            self.parser.receive(&mut self.read_buf, &mut self.inbound)?;
            if self.parser.state() == ParseState::HeadersComplete {
                let (version, status, reason) = self
                    .inbound
                    .status
                    .take()
                    .ok_or_else(|| Error::Protocol("response without status line".into()))?;
                let headers = std::mem::take(&mut self.inbound.headers);
                if (100..200).contains(&status) && status != 101 {
                    self.parser.reset();
                    continue;
                }
                let no_body = bodiless || status < 200 || status == 204 || status == 304;
                let (length, chunked) = if no_body {
                    (Some(0), false)
                } else if headers.is_chunked() {
                    (None, true)
                } else {
                    (headers.checked_content_length()?, false)
                };
                self.keep_alive = match version {
                    HttpVersion::Http11 => !headers.connection_has("close"),
                    HttpVersion::Http10 => headers.connection_has("keep-alive"),
                } && (length.is_some() || chunked);
                self.parser.set_body_mode(length, chunked, &mut self.inbound);
                return Ok(ResponseHead {
                    version,
                    status,
                    reason,
                    headers,
                });
            }
            if self.fill().await? == 0 {
                return Err(if self.received_any {
                    Error::Protocol(format!("{} closed the connection mid-headers", self.peer))
                } else {
                    Error::connection(
                        &self.peer,
                        io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed before response"),
                    )
                });
            }
        }
    }

    /// Next body chunk of the current response, `None` once the body is complete.
    pub async fn read_chunk(&mut self) -> Result<Option<Bytes>> {
        loop {
            self.parser.receive(&mut self.read_buf, &mut self.inbound)?;
            if let Some(chunk) = self.inbound.body.pop_front() {
                return Ok(Some(chunk));
            }
            if self.inbound.complete {
                return Ok(None);
            }
            if self.fill().await? == 0 {
                self.keep_alive = false;
                self.parser.eof(&mut self.inbound)?;
            }
        }
    }

    /// Trailer fields of a chunked response, once the body has been read.
    pub fn trailers(&self) -> &HeaderMap {
        &self.inbound.trailers
    }

    /// The response was read to the end and the peer allows another request.
    pub fn is_reusable(&self) -> bool {
        self.keep_alive
            && self.inbound.complete
            && self.parser.state() == ParseState::Idle
            && self.read_buf.is_empty()
    }

    /// The plain TCP stream, e.g. after a proxy `CONNECT` was accepted.
    pub fn into_tcp(self) -> Result<TcpStream> {
        if !self.read_buf.is_empty() {
            return Err(Error::Protocol("unexpected data after CONNECT response".into()));
        }
        match self.stream {
            HttpStream::Plain(tcp) => Ok(tcp),
            HttpStream::Tls(_) => Err(Error::Protocol("cannot tunnel through a TLS stream".into())),
        }
    }

    async fn fill(&mut self) -> Result<usize> {
        self.read_buf.reserve(READ_CHUNK);
        let read = self.stream.read_buf(&mut self.read_buf);
        let result = match self.read_timeout {
            Some(limit) => timeout(limit, read).await.map_err(|_| Error::Timeout {
                phase: TimeoutPhase::Read,
                after: limit,
            })?,
            None => read.await,
        };
        let n = result.map_err(|e| Error::connection(&self.peer, e))?;
        if n > 0 {
            self.received_any = true;
        }
        Ok(n)
    }
}

async fn write_message(
    stream: &mut HttpStream,
    head: &[u8],
    body: Option<&Bytes>,
    body_stream: Option<&mut BodyStream>,
) -> io::Result<()> {
    stream.write_all(head).await?;
    if let Some(body) = body {
        stream.write_all(body).await?;
    }
    if let Some(source) = body_stream {
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            let n = source.reader().read(&mut buf).await?;
            if n == 0 {
                break;
            }
            stream.write_all(format!("{:x}\r\n", n).as_bytes()).await?;
            stream.write_all(&buf[..n]).await?;
            stream.write_all(b"\r\n").await?;
        }
        stream.write_all(b"0\r\n\r\n").await?;
    }
    stream.flush().await
}

/// Request line and header block. `Host` is written first when `headers` lacks it.
pub fn encode_head(method: &str, target: &str, host: &str, headers: &HeaderMap) -> BytesMut {
    let mut out = BytesMut::with_capacity(256);
    out.put_slice(method.as_bytes());
    out.put_u8(b' ');
    out.put_slice(target.as_bytes());
    out.put_slice(b" HTTP/1.1\r\n");
    if !headers.contains("host") {
        out.put_slice(b"Host: ");
        out.put_slice(host.as_bytes());
        out.put_slice(b"\r\n");
    }
    for (name, value) in headers {
        out.put_slice(name.as_bytes());
        out.put_slice(b": ");
        out.put_slice(value.as_bytes());
        out.put_slice(b"\r\n");
    }
    out.put_slice(b"\r\n");
    out
}
