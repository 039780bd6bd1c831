/*
 * api.rs
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

//! One-shot requests. Each call builds a temporary session, sends one request and
//! closes the session; use a `Session` to reuse connections and cookies.

use crate::error::Result;
use crate::protocol::http::request::Method;
use crate::protocol::http::response::Response;
use crate::session::{RequestOptions, Session};

pub async fn request(method: Method, url: &str, options: RequestOptions) -> Result<Response> {
    let session = Session::new()?;
    let response = session.request(method, url, options).await;
    session.close();
    response
}

pub async fn get(url: &str, options: RequestOptions) -> Result<Response> {
    request(Method::Get, url, options).await
}

pub async fn head(url: &str, options: RequestOptions) -> Result<Response> {
    request(Method::Head, url, options).await
}

pub async fn post(url: &str, options: RequestOptions) -> Result<Response> {
    request(Method::Post, url, options).await
}

pub async fn put(url: &str, options: RequestOptions) -> Result<Response> {
    request(Method::Put, url, options).await
}

pub async fn patch(url: &str, options: RequestOptions) -> Result<Response> {
    request(Method::Patch, url, options).await
}

pub async fn delete(url: &str, options: RequestOptions) -> Result<Response> {
    request(Method::Delete, url, options).await
}

pub async fn options(url: &str, options: RequestOptions) -> Result<Response> {
    request(Method::Options, url, options).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[tokio::test]
    async fn invalid_urls_fail_before_connecting() {
        assert!(matches!(
            get("", RequestOptions::new()).await,
            Err(Error::UrlRequired)
        ));
        assert!(matches!(
            get("example.com/x", RequestOptions::new()).await,
            Err(Error::MissingSchema(_))
        ));
        assert!(matches!(
            post("ftp://example.com/x", RequestOptions::new()).await,
            Err(Error::InvalidUrl { .. })
        ));
    }
}
