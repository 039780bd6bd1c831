/*
 * lib.rs
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

//! Courier core: an HTTP/1.1 client library.
//!
//! Build a `Request` (or use `RequestOptions`), let a `Session` merge it with its
//! defaults into an immutable `PreparedRequest`, send it over a pooled TCP/TLS
//! connection, follow redirects, and read the `Response` body buffered or as a
//! stream of chunks. The core is async on tokio; `blocking` wraps it for
//! synchronous callers and `api` offers one-shot requests.

pub mod api;
pub mod auth;
pub mod blocking;
pub mod config;
pub mod cookies;
pub mod error;
pub mod logging;
pub mod net;
pub mod protocol;
pub mod session;
pub mod status;
pub mod uri;

pub use auth::{Auth, BasicAuth, BearerAuth};
pub use config::{PoolConfig, Proxies, SessionConfig, Timeout, Verify};
pub use cookies::{Cookie, CookieJar};
pub use error::{Error, Result, TimeoutPhase};
pub use net::RootStore;
pub use protocol::http::{
    prepare, Adapter, Body, BodyReader, BodyStream, HeaderMap, HttpAdapter, Method, PreparedBody,
    PreparedRequest, Request, Response, SendFuture, SendOptions,
};
pub use session::{RequestOptions, Session, SessionBuilder};

/// Crate version, sent in the default `User-Agent`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
