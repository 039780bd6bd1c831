/*
 * auth.rs
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

//! Credential providers. A provider runs last during preparation and may rewrite
//! the URL or the headers of the request.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use url::Url;

use crate::error::Result;
use crate::protocol::http::header::HeaderMap;

/// Attaches credentials to a request being prepared.
pub trait Auth: Send + Sync {
    fn apply(&self, url: &mut Url, headers: &mut HeaderMap) -> Result<()>;
}

/// Closures act as token providers, e.g. to fetch a fresh token per request.
impl<F> Auth for F
where
    F: Fn(&mut Url, &mut HeaderMap) -> Result<()> + Send + Sync,
{
    fn apply(&self, url: &mut Url, headers: &mut HeaderMap) -> Result<()> {
        self(url, headers)
    }
}

/// HTTP Basic authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    username: String,
    password: String,
}

impl BasicAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// `Basic <base64(user:pass)>`.
    pub fn header_value(&self) -> String {
        let token = STANDARD.encode(format!("{}:{}", self.username, self.password));
        format!("Basic {}", token)
    }
}

impl Auth for BasicAuth {
    fn apply(&self, _url: &mut Url, headers: &mut HeaderMap) -> Result<()> {
        headers.insert("Authorization", self.header_value());
        Ok(())
    }
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// `Authorization: Bearer <token>`.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerAuth {
    token: String,
}

impl BearerAuth {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl Auth for BearerAuth {
    fn apply(&self, _url: &mut Url, headers: &mut HeaderMap) -> Result<()> {
        headers.insert("Authorization", format!("Bearer {}", self.token));
        Ok(())
    }
}

impl fmt::Debug for BearerAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerAuth(***)")
    }
}
