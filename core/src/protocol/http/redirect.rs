/*
 * redirect.rs
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

//! Redirect following as an explicit state machine:
//! `Sending -> AwaitStatus -> (Redirect -> Sending | Done)`.

use std::future::Future;
use std::pin::Pin;

use url::Url;

use crate::error::{Error, Result};
use crate::logging::Logger;
use crate::protocol::http::prepare::{PreparedBody, PreparedRequest};
use crate::protocol::http::request::Method;
use crate::protocol::http::response::Response;
use crate::uri;

/// What the redirect machine needs from the session.
pub(crate) trait Hop: Send + Sync {
    /// One exchange through the adapter mounted for the request URL.
    fn send_once(&self, request: PreparedRequest) -> Pin<Box<dyn Future<Output = Result<Response>> + Send + '_>>;

    /// Persist the `Set-Cookie` headers of a response.
    fn store_cookies(&self, response: &Response);

    /// `Cookie` value from the jar for `url`.
    fn cookie_header(&self, url: &Url) -> Option<String>;
}

enum State {
    Sending(PreparedRequest),
    AwaitStatus(Response),
    Redirect(Response, PreparedRequest),
    Done(Response),
}

/// Send `request`, following up to `max_redirects` redirects when `follow` is set.
pub(crate) async fn send<H: Hop + ?Sized>(
    hop: &H,
    request: PreparedRequest,
    follow: bool,
    max_redirects: usize,
    logger: &Logger,
) -> Result<Response> {
    let mut history: Vec<Response> = Vec::new();
    let mut state = State::Sending(request);
    loop {
        state = match state {
            State::Sending(request) => {
                let response = hop.send_once(request).await?;
                hop.store_cookies(&response);
                State::AwaitStatus(response)
            }
            State::AwaitStatus(response) => {
                if !follow || !response.is_redirect() {
                    State::Done(response)
                } else if history.len() >= max_redirects {
                    return Err(Error::TooManyRedirects {
                        max: max_redirects,
                        location: response.headers().get("location").unwrap_or_default().to_string(),
                    });
                } else {
                    let next = next_request(&response, hop)?;
                    logger.debug(format_args!(
                        "{} redirect {} -> {} {}",
                        response.status(),
                        response.url(),
                        next.method(),
                        next.url()
                    ));
                    State::Redirect(response, next)
                }
            }
            State::Redirect(mut response, next) => {
                // Free the connection of the intermediate response for reuse.
                if let Err(e) = response.drain().await {
                    logger.debug(format_args!("could not drain redirect body: {}", e));
                }
                history.push(response);
                State::Sending(next)
            }
            State::Done(mut response) => {
                response.set_history(history);
                return Ok(response);
            }
        };
    }
}

/// Build the request for the `Location` of `response`.
fn next_request<H: Hop + ?Sized>(response: &Response, hop: &H) -> Result<PreparedRequest> {
    let previous = response.request();
    let location = response.headers().get("location").unwrap_or_default();
    let mut url = response
        .url()
        .join(location.trim())
        .map_err(|e| Error::invalid_url(location, e.to_string()))?;
    uri::check_http_url(&url)?;
    url.set_fragment(None);

    let status = response.status();
    let method = previous.method();
    let rewrite_to_get = match status {
        302 | 303 => method != Method::Head,
        301 => method == Method::Post,
        _ => false,
    };

    let mut headers = previous.headers().clone();
    let (method, body) = if rewrite_to_get {
        for name in ["Content-Length", "Content-Type", "Transfer-Encoding"] {
            headers.remove(name);
        }
        (Method::Get, PreparedBody::Empty)
    } else {
        let body = match previous.body() {
            PreparedBody::Empty => PreparedBody::Empty,
            PreparedBody::Bytes(data) => PreparedBody::Bytes(data.clone()),
            PreparedBody::Stream(_) | PreparedBody::Sent => return Err(Error::UnrewindableBody),
        };
        (method, body)
    };

    if uri::should_strip_auth(previous.url(), &url) {
        headers.remove("Authorization");
    }

    headers.remove("Cookie");
    let mut cookies: Vec<String> = Vec::new();
    if let Some(jar) = hop.cookie_header(&url) {
        cookies.push(jar);
    }
    cookies.extend(
        previous
            .request_cookies()
            .iter()
            .map(|(name, value)| format!("{}={}", name, value)),
    );
    if !cookies.is_empty() {
        headers.insert("Cookie", cookies.join("; "));
    }

    Ok(previous.redirected(method, url, headers, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::CookieJar;
    use crate::protocol::http::header::HeaderMap;
    use std::sync::{Arc, Mutex};

    /// Serves scripted responses keyed by path and records every request sent.
    struct Scripted {
        routes: Vec<(&'static str, u16, Vec<(&'static str, &'static str)>)>,
        sent: Mutex<Vec<(Method, String, HeaderMap, Option<Vec<u8>>)>>,
        jar: Mutex<CookieJar>,
    }

    impl Scripted {
        fn new(routes: Vec<(&'static str, u16, Vec<(&'static str, &'static str)>)>) -> Self {
            Self {
                routes,
                sent: Mutex::new(Vec::new()),
                jar: Mutex::new(CookieJar::new()),
            }
        }

        fn sent(&self) -> Vec<(Method, String, HeaderMap, Option<Vec<u8>>)> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Hop for Scripted {
        fn send_once(&self, request: PreparedRequest) -> Pin<Box<dyn Future<Output = Result<Response>> + Send + '_>> {
            let url = request.url().clone();
            self.sent.lock().unwrap().push((
                request.method(),
                url.to_string(),
                request.headers().clone(),
                request.body_bytes().map(|b| b.to_vec()),
            ));
            let (status, headers) = self
                .routes
                .iter()
                .find(|(path, _, _)| url.as_str().ends_with(path))
                .map(|(_, status, headers)| (*status, headers.iter().cloned().collect::<HeaderMap>()))
                .unwrap_or((404, HeaderMap::new()));
            let (request, _) = request.take_stream();
            let response = Response::from_bytes(Arc::new(request), status, headers, &b"body"[..]);
            Box::pin(async move { Ok(response) })
        }

        fn store_cookies(&self, response: &Response) {
            self.jar
                .lock()
                .unwrap()
                .store_response_cookies(response.url(), response.headers());
        }

        fn cookie_header(&self, url: &Url) -> Option<String> {
            self.jar.lock().unwrap().cookie_header(url)
        }
    }

    fn prepared(method: Method, url: &str, headers: &[(&str, &str)], body: PreparedBody) -> PreparedRequest {
        PreparedRequest::for_test(method, url, headers.iter().cloned().collect(), body)
    }

    fn chain(hops: usize) -> Scripted {
        let mut routes = Vec::new();
        let paths: Vec<&'static str> = (0..=hops)
            .map(|i| &*Box::leak(format!("/r{}", i).into_boxed_str()))
            .collect();
        for i in 0..hops {
            let location: &'static str = paths[i + 1];
            routes.push((paths[i], 302, vec![("Location", location)]));
        }
        routes.push((paths[hops], 200, vec![]));
        Scripted::new(routes)
    }

    #[tokio::test]
    async fn follows_up_to_the_limit() {
        let hop = chain(3);
        let req = prepared(Method::Get, "http://h/r0", &[], PreparedBody::Empty);
        let response = send(&hop, req, true, 3, &Logger::global()).await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.url().as_str(), "http://h/r3");
        assert_eq!(response.history().len(), 3);
        assert_eq!(response.history()[0].url().as_str(), "http://h/r0");
    }

    #[tokio::test]
    async fn one_more_than_the_limit_fails() {
        let hop = chain(4);
        let req = prepared(Method::Get, "http://h/r0", &[], PreparedBody::Empty);
        let err = send(&hop, req, true, 3, &Logger::global()).await.unwrap_err();
        assert!(matches!(err, Error::TooManyRedirects { max: 3, .. }));
        assert!(err.is_redirect());
    }

    #[tokio::test]
    async fn not_following_returns_the_redirect() {
        let hop = chain(1);
        let req = prepared(Method::Get, "http://h/r0", &[], PreparedBody::Empty);
        let response = send(&hop, req, false, 30, &Logger::global()).await.unwrap();
        assert_eq!(response.status(), 302);
        assert!(response.history().is_empty());
    }

    #[tokio::test]
    async fn see_other_turns_post_into_get() {
        let hop = Scripted::new(vec![
            ("/form", 303, vec![("Location", "/done")]),
            ("/done", 200, vec![]),
        ]);
        let req = prepared(
            Method::Post,
            "http://h/form",
            &[("Content-Type", "text/plain"), ("Content-Length", "4")],
            PreparedBody::Bytes(bytes::Bytes::from_static(b"data")),
        );
        send(&hop, req, true, 30, &Logger::global()).await.unwrap();
        let sent = hop.sent();
        assert_eq!(sent[1].0, Method::Get);
        assert!(sent[1].2.get("content-type").is_none());
        assert!(sent[1].2.get("content-length").is_none());
        assert_eq!(sent[1].3, None);
    }

    #[tokio::test]
    async fn temporary_redirect_keeps_method_and_body() {
        let hop = Scripted::new(vec![
            ("/upload", 307, vec![("Location", "/upload2")]),
            ("/upload2", 201, vec![]),
        ]);
        let req = prepared(
            Method::Put,
            "http://h/upload",
            &[],
            PreparedBody::Bytes(bytes::Bytes::from_static(b"data")),
        );
        let response = send(&hop, req, true, 30, &Logger::global()).await.unwrap();
        assert_eq!(response.status(), 201);
        let sent = hop.sent();
        assert_eq!(sent[1].0, Method::Put);
        assert_eq!(sent[1].3.as_deref(), Some(&b"data"[..]));
    }

    #[tokio::test]
    async fn streamed_body_cannot_be_replayed() {
        let hop = Scripted::new(vec![("/upload", 308, vec![("Location", "/elsewhere")])]);
        let req = prepared(
            Method::Post,
            "http://h/upload",
            &[],
            PreparedBody::Stream(crate::protocol::http::request::BodyStream::new(std::io::Cursor::new(
                b"abc".to_vec(),
            ))),
        );
        let err = send(&hop, req, true, 30, &Logger::global()).await.unwrap_err();
        assert!(matches!(err, Error::UnrewindableBody));
    }

    #[tokio::test]
    async fn authorization_dropped_on_host_change_only() {
        let hop = Scripted::new(vec![
            ("/a", 302, vec![("Location", "/b")]),
            ("/b", 302, vec![("Location", "http://other.example/c")]),
            ("/c", 200, vec![]),
        ]);
        let req = prepared(Method::Get, "http://h/a", &[("Authorization", "Bearer t")], PreparedBody::Empty);
        send(&hop, req, true, 30, &Logger::global()).await.unwrap();
        let sent = hop.sent();
        assert_eq!(sent[1].2.get("authorization"), Some("Bearer t"));
        assert!(sent[2].2.get("authorization").is_none());
    }

    #[tokio::test]
    async fn cookies_set_on_a_hop_are_sent_to_the_next() {
        let hop = Scripted::new(vec![
            ("/login", 302, vec![("Location", "/home"), ("Set-Cookie", "sid=abc; Path=/")]),
            ("/home", 200, vec![]),
        ]);
        let req = prepared(Method::Get, "http://h/login", &[], PreparedBody::Empty);
        send(&hop, req, true, 30, &Logger::global()).await.unwrap();
        assert_eq!(hop.sent()[1].2.get("cookie"), Some("sid=abc"));
    }
}
