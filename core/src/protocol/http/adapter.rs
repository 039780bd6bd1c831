/*
 * adapter.rs
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

//! Transport adapters. An adapter performs exactly one request/response exchange;
//! redirects are followed above it.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;

use crate::config::{PoolConfig, Proxies, Timeout, Verify};
use crate::error::{Error, Result};
use crate::logging::Logger;
use crate::net::RootStore;
use crate::protocol::http::client::{proxy_authorization, Connector};
use crate::protocol::http::connection::{encode_head, HttpConnection, ResponseHead};
use crate::protocol::http::pool::{Lease, Pool, PoolKey};
use crate::protocol::http::prepare::PreparedRequest;
use crate::protocol::http::request::{BodyStream, Method};
use crate::protocol::http::response::{BodyReader, ChunkFuture, Response};
use crate::uri;

pub type SendFuture<'a> = Pin<Box<dyn Future<Output = Result<Response>> + Send + 'a>>;

/// Per-exchange transport settings.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub timeout: Timeout,
    pub verify: Verify,
    pub proxies: Proxies,
    /// Leave the body on the connection instead of buffering it.
    pub stream: bool,
}

/// Sends one prepared request and returns the response head with a lazily read body.
pub trait Adapter: Send + Sync {
    fn send<'a>(&'a self, request: PreparedRequest, options: &'a SendOptions) -> SendFuture<'a>;

    /// Release pooled resources. Called when the owning session closes.
    fn close(&self) {}
}

/// HTTP/1.1 adapter over a connection pool.
pub struct HttpAdapter {
    pool: Pool<HttpConnection>,
    pool_config: PoolConfig,
    connector: Connector,
    logger: Logger,
}

impl HttpAdapter {
    pub fn new(roots: RootStore, pool_config: PoolConfig, logger: Logger) -> Self {
        Self {
            pool: Pool::new(pool_config, logger.clone()),
            pool_config,
            connector: Connector::new(roots, logger.clone()),
            logger,
        }
    }

    pub fn idle_connections(&self) -> usize {
        self.pool.idle_count()
    }

    async fn exchange(&self, request: PreparedRequest, options: &SendOptions) -> Result<Response> {
        let proxy = options.proxies.for_url(request.url()).cloned();
        let key = PoolKey::new(request.url(), proxy.as_ref(), &options.verify);
        let (request, mut body_stream) = request.take_stream();
        let request = Arc::new(request);
        let head = self.encode(&request, proxy.as_ref());
        let wait = self.pool_config.acquire_timeout.or(options.timeout.connect);
        let started = Instant::now();
        let mut retried = false;

        loop {
            let mut lease = self.pool.acquire(&key, wait).await?;
            let (mut conn, reused) = match lease.take_idle() {
                Some(conn) => {
                    self.logger.trace(format_args!("reusing idle connection to {}", key));
                    (conn, true)
                }
                None => {
                    let conn = self
                        .connector
                        .connect(request.url(), proxy.as_ref(), &options.verify, options.timeout.connect)
                        .await?;
                    (conn, false)
                }
            };
            conn.set_read_timeout(options.timeout.read);
            let bodiless = request.method() == Method::Head;
            match round_trip(&mut conn, &head, request.body_bytes(), body_stream.as_mut(), bodiless).await {
                Ok(response_head) => {
                    let mut response = self.response(request, response_head, conn, lease);
                    response.set_elapsed(started.elapsed());
                    if !options.stream {
                        response.buffer().await?;
                    }
                    return Ok(response);
                }
                Err(e) if reused && !retried && body_stream.is_none() && is_stale(&e, &conn) => {
                    self.logger.debug(format_args!(
                        "idle connection to {} was closed by the peer, retrying on a new connection",
                        key
                    ));
                    retried = true;
                }
                Err(e) => {
                    self.logger.warn(format_args!("discarding connection to {}: {}", key, e));
                    return Err(e);
                }
            }
        }
    }

    fn encode(&self, request: &PreparedRequest, proxy: Option<&url::Url>) -> bytes::BytesMut {
        let url = request.url();
        let absolute = proxy.is_some() && url.scheme() == "http";
        let target = if absolute {
            uri::absolute_target(url)
        } else {
            uri::request_target(url)
        };
        let mut headers = request.headers().clone();
        if absolute && !headers.contains("proxy-authorization") {
            if let Some(value) = proxy.and_then(proxy_authorization) {
                headers.insert("Proxy-Authorization", value);
            }
        }
        encode_head(request.method().as_str(), &target, &uri::host_header(url), &headers)
    }

    fn response(
        &self,
        request: Arc<PreparedRequest>,
        head: ResponseHead,
        conn: HttpConnection,
        lease: Lease<HttpConnection>,
    ) -> Response {
        let reader = PooledBody {
            conn: Some(conn),
            lease: Some(lease),
            logger: self.logger.clone(),
        };
        Response::from_reader(request, head.status, head.reason, head.headers, Box::new(reader))
    }
}

impl Adapter for HttpAdapter {
    fn send<'a>(&'a self, request: PreparedRequest, options: &'a SendOptions) -> SendFuture<'a> {
        Box::pin(self.exchange(request, options))
    }

    fn close(&self) {
        self.pool.close();
    }
}

async fn round_trip(
    conn: &mut HttpConnection,
    head: &[u8],
    body: Option<&Bytes>,
    body_stream: Option<&mut BodyStream>,
    bodiless: bool,
) -> Result<ResponseHead> {
    conn.write_request(head, body, body_stream).await?;
    conn.read_head(bodiless).await
}

/// A reused connection that failed before any response byte arrived was closed
/// by the peer while idle.
fn is_stale(err: &Error, conn: &HttpConnection) -> bool {
    if conn.received_any() {
        return false;
    }
    match err {
        Error::Connection { source, .. } => matches!(
            source.kind(),
            io::ErrorKind::BrokenPipe
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::UnexpectedEof
        ),
        _ => false,
    }
}

/// Body read from a pooled connection. The connection goes back to the pool when
/// the body ends cleanly and the exchange allows keep-alive; otherwise it is dropped.
struct PooledBody {
    conn: Option<HttpConnection>,
    lease: Option<Lease<HttpConnection>>,
    logger: Logger,
}

impl PooledBody {
    async fn next(&mut self) -> Result<Option<Bytes>> {
        let Some(conn) = self.conn.as_mut() else {
            return Ok(None);
        };
        match conn.read_chunk().await {
            Ok(Some(chunk)) => Ok(Some(chunk)),
            Ok(None) => {
                if let (Some(conn), Some(lease)) = (self.conn.take(), self.lease.take()) {
                    if conn.is_reusable() {
                        self.logger
                            .trace(format_args!("returning connection to {} to the pool", conn.peer()));
                        lease.release(conn);
                    }
                }
                Ok(None)
            }
            Err(e) => {
                self.logger
                    .warn(format_args!("discarding connection to {}: {}", conn.peer(), e));
                self.conn = None;
                self.lease = None;
                Err(e)
            }
        }
    }
}

impl BodyReader for PooledBody {
    fn next_chunk(&mut self) -> ChunkFuture<'_> {
        Box::pin(self.next())
    }
}
