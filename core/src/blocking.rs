/*
 * blocking.rs
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

//! Blocking facade over the async client.
//!
//! Calls block the current thread until the response head (or the requested body
//! data) is available. A blocking session either owns a small multi-threaded tokio
//! runtime or runs on a caller-supplied runtime handle. Do not call it from inside
//! an async task: `block_on` panics there.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use tokio::runtime::{Builder, Handle, Runtime};

use crate::error::{Error, Result};
use crate::protocol::http::prepare::PreparedRequest;
use crate::protocol::http::request::{Method, Request};
use crate::session::{RequestOptions, SessionBuilder};
use crate::{CookieJar, HeaderMap};

#[derive(Clone)]
enum Executor {
    Owned(Arc<Runtime>),
    Handle(Handle),
}

impl Executor {
    fn owned() -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("courier-blocking")
            .enable_all()
            .build()
            .map_err(Error::Runtime)?;
        Ok(Executor::Owned(Arc::new(runtime)))
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        match self {
            Executor::Owned(runtime) => runtime.block_on(future),
            Executor::Handle(handle) => handle.block_on(future),
        }
    }
}

/// Blocking session. Cloning shares the session and its runtime.
#[derive(Clone)]
pub struct Session {
    inner: crate::Session,
    executor: Executor,
}

impl Session {
    /// Default session on an owned runtime.
    pub fn new() -> Result<Session> {
        Self::from_builder(&SessionBuilder::new())
    }

    /// Build the async session from `builder` and run it on an owned runtime.
    pub fn from_builder(builder: &SessionBuilder) -> Result<Session> {
        let inner = builder.build()?;
        Ok(Session {
            inner,
            executor: Executor::owned()?,
        })
    }

    /// Wrap an existing async session, driving it with `handle`.
    pub fn with_runtime_handle(session: crate::Session, handle: Handle) -> Session {
        Session {
            inner: session,
            executor: Executor::Handle(handle),
        }
    }

    /// The underlying async session.
    pub fn as_async(&self) -> &crate::Session {
        &self.inner
    }

    pub fn request(&self, method: Method, url: &str, options: RequestOptions) -> Result<Response> {
        let response = self.executor.block_on(self.inner.request(method, url, options))?;
        Ok(self.wrap(response))
    }

    pub fn get(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::Get, url, options)
    }

    pub fn post(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::Post, url, options)
    }

    pub fn put(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::Put, url, options)
    }

    pub fn patch(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::Patch, url, options)
    }

    pub fn delete(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::Delete, url, options)
    }

    pub fn head(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::Head, url, options)
    }

    pub fn options(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::Options, url, options)
    }

    pub fn prepare_request(&self, request: Request) -> Result<PreparedRequest> {
        self.inner.prepare_request(request)
    }

    pub fn send(&self, request: PreparedRequest, options: RequestOptions) -> Result<Response> {
        let response = self.executor.block_on(self.inner.send(request, options))?;
        Ok(self.wrap(response))
    }

    pub fn cookies(&self) -> CookieJar {
        self.inner.cookies()
    }

    pub fn idle_connections(&self) -> usize {
        self.inner.idle_connections()
    }

    pub fn close(&self) {
        self.inner.close();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    fn wrap(&self, inner: crate::Response) -> Response {
        Response {
            inner,
            executor: self.executor.clone(),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("blocking::Session").field(&self.inner).finish()
    }
}

/// Blocking response. Body reads block on the session's runtime.
pub struct Response {
    inner: crate::Response,
    executor: Executor,
}

impl Response {
    pub fn status(&self) -> u16 {
        self.inner.status()
    }

    pub fn reason(&self) -> &str {
        self.inner.reason()
    }

    pub fn ok(&self) -> bool {
        self.inner.ok()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    pub fn url(&self) -> &url::Url {
        self.inner.url()
    }

    pub fn history(&self) -> &[crate::Response] {
        self.inner.history()
    }

    pub fn raise_for_status(&self) -> Result<()> {
        self.inner.raise_for_status()
    }

    /// The async response, e.g. for accessors not mirrored here.
    pub fn as_async(&self) -> &crate::Response {
        &self.inner
    }

    pub fn bytes(&mut self) -> Result<Bytes> {
        self.executor.block_on(self.inner.bytes())
    }

    pub fn text(&mut self) -> Result<String> {
        self.executor.block_on(self.inner.text())
    }

    pub fn json<T: DeserializeOwned>(&mut self) -> Result<T> {
        self.executor.block_on(self.inner.json())
    }

    pub fn chunk(&mut self) -> Result<Option<Bytes>> {
        self.executor.block_on(self.inner.chunk())
    }

    /// Body chunks as an iterator. Ends after the last chunk or the first error.
    pub fn iter_content(&mut self) -> IterContent<'_> {
        IterContent {
            response: self,
            done: false,
        }
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("blocking::Response").field(&self.inner).finish()
    }
}

pub struct IterContent<'a> {
    response: &'a mut Response,
    done: bool,
}

impl Iterator for IterContent<'_> {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.response.chunk() {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// One-shot blocking request on a temporary session.
pub fn request(method: Method, url: &str, options: RequestOptions) -> Result<Response> {
    let session = Session::new()?;
    let response = session.request(method, url, options);
    session.close();
    response
}

pub fn get(url: &str, options: RequestOptions) -> Result<Response> {
    request(Method::Get, url, options)
}

pub fn head(url: &str, options: RequestOptions) -> Result<Response> {
    request(Method::Head, url, options)
}

pub fn post(url: &str, options: RequestOptions) -> Result<Response> {
    request(Method::Post, url, options)
}

pub fn put(url: &str, options: RequestOptions) -> Result<Response> {
    request(Method::Put, url, options)
}

pub fn patch(url: &str, options: RequestOptions) -> Result<Response> {
    request(Method::Patch, url, options)
}

pub fn delete(url: &str, options: RequestOptions) -> Result<Response> {
    request(Method::Delete, url, options)
}

pub fn options(url: &str, options: RequestOptions) -> Result<Response> {
    request(Method::Options, url, options)
}
