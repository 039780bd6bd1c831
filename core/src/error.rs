/*
 * error.rs
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

//! Request errors.
//!
//! Every failure surfaced by a session, adapter or response is one variant of
//! [`Error`], so callers can match a single category or any specific one.

use std::fmt;
use std::io;
use std::time::Duration;

use thiserror::Error;

/// Phase of an exchange in which a deadline expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPhase {
    /// TCP connect, proxy tunnel or TLS handshake.
    Connect,
    /// Writing the request line, headers or body.
    Send,
    /// Waiting for response headers or reading the body.
    Read,
}

impl fmt::Display for TimeoutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutPhase::Connect => write!(f, "connect"),
            TimeoutPhase::Send => write!(f, "send"),
            TimeoutPhase::Read => write!(f, "read"),
        }
    }
}

/// Errors from preparing, sending or reading a request.
#[derive(Debug, Error)]
pub enum Error {
    /// The URL could not be parsed or is not an http(s) URL with a host.
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Relative URL and no base URL to resolve it against.
    #[error("invalid URL {0:?}: no scheme supplied, perhaps you meant http://{0}?")]
    MissingSchema(String),

    /// No URL at all.
    #[error("a URL is required to make a request")]
    UrlRequired,

    /// Header name is not a token, or the value contains control characters.
    #[error("invalid header {name:?}: {reason}")]
    InvalidHeader { name: String, reason: String },

    /// Transport-level failure: refused, reset, DNS, unexpected EOF.
    #[error("connection error ({host}): {source}")]
    Connection {
        host: String,
        #[source]
        source: io::Error,
    },

    /// A deadline expired.
    #[error("{phase} timed out after {after:?}")]
    Timeout { phase: TimeoutPhase, after: Duration },

    /// No pooled connection became available in time.
    #[error("timed out waiting for a pooled connection to {host}")]
    ConnectionPoolTimeout { host: String },

    /// Redirect chain longer than the configured maximum.
    #[error("exceeded {max} redirects (last location {location})")]
    TooManyRedirects { max: usize, location: String },

    /// Raised by `raise_for_status` only.
    #[error("{status} {class}: {reason} for url {url}")]
    Http {
        status: u16,
        class: &'static str,
        reason: String,
        url: String,
    },

    /// TLS configuration or handshake failure.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Malformed response from the server.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Body could not be (de)serialized as JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A streaming request body cannot be sent a second time.
    #[error("streaming request body cannot be replayed")]
    UnrewindableBody,

    /// The response body was already streamed and not buffered.
    #[error("response content already consumed")]
    ContentConsumed,

    /// The session was closed.
    #[error("session is closed")]
    SessionClosed,

    /// The blocking facade could not start its runtime.
    #[error("runtime error: {0}")]
    Runtime(#[source] io::Error),
}

impl Error {
    pub(crate) fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_header(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidHeader {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn connection(host: impl Into<String>, source: io::Error) -> Self {
        Error::Connection {
            host: host.into(),
            source,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. } | Error::ConnectionPoolTimeout { .. })
    }

    pub fn is_connect(&self) -> bool {
        matches!(
            self,
            Error::Connection { .. }
                | Error::Timeout {
                    phase: TimeoutPhase::Connect,
                    ..
                }
        )
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self, Error::TooManyRedirects { .. })
    }

    pub fn is_status(&self) -> bool {
        matches!(self, Error::Http { .. })
    }

    /// Status code for `Http` errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_display_names_phase() {
        let e = Error::Timeout {
            phase: TimeoutPhase::Read,
            after: Duration::from_millis(250),
        };
        assert_eq!(e.to_string(), "read timed out after 250ms");
        assert!(e.is_timeout());
        assert!(!e.is_connect());
    }

    #[test]
    fn connect_timeout_counts_as_connect_error() {
        let e = Error::Timeout {
            phase: TimeoutPhase::Connect,
            after: Duration::from_secs(1),
        };
        assert!(e.is_connect());
    }

    #[test]
    fn http_error_exposes_status() {
        let e = Error::Http {
            status: 404,
            class: "Client Error",
            reason: "Not Found".into(),
            url: "http://example.com/x".into(),
        };
        assert_eq!(e.status(), Some(404));
        assert!(e.is_status());
        assert_eq!(
            e.to_string(),
            "404 Client Error: Not Found for url http://example.com/x"
        );
    }
}
