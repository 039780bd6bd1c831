/*
 * mod.rs
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

//! HTTP/1.1 client: request preparation, pooled connections, redirects and lazily read responses.
//!
//! Layering:
//! - `prepare` turns a mutable `Request` into an immutable `PreparedRequest`.
//! - An `Adapter` performs one exchange; `HttpAdapter` does it over pooled
//!   TCP/TLS connections driven by the `h1` push parser.
//! - `redirect` follows `Location` hops above the adapter.
//! - `Response` reads the body on demand from the connection it came from.

pub mod adapter;
pub mod client;
pub mod connection;
pub mod h1;
pub mod header;
pub mod pool;
pub mod prepare;
pub(crate) mod redirect;
pub mod request;
pub mod response;

pub use adapter::{Adapter, HttpAdapter, SendFuture, SendOptions};
pub use header::{HeaderMap, MediaType};
pub use prepare::{prepare, PrepareDefaults, PreparedBody, PreparedRequest};
pub use request::{Body, BodyStream, Method, Request};
pub use response::{BodyReader, ChunkFuture, Response};
