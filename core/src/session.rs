/*
 * session.rs
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

//! Session: default headers, params and auth, a cookie jar, mounted adapters and the
//! connection pool, shared by every request made through it.
//!
//! Cloning a `Session` shares its state. The cookie jar and the pool are internally
//! synchronized, so one session can serve many tasks and threads at once.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::Serialize;
use url::Url;

use crate::auth::Auth;
use crate::config::{Proxies, SessionConfig, Timeout, Verify};
use crate::cookies::CookieJar;
use crate::error::{Error, Result};
use crate::logging::Logger;
use crate::net::{self, RootStore};
use crate::protocol::http::adapter::{Adapter, HttpAdapter, SendOptions};
use crate::protocol::http::header::HeaderMap;
use crate::protocol::http::prepare::{prepare, PrepareDefaults, PreparedRequest};
use crate::protocol::http::redirect::{self, Hop};
use crate::protocol::http::request::{Body, Method, Request};
use crate::protocol::http::response::Response;
use crate::uri;

/// Per-request options: request content plus transport settings. Unset transport
/// settings fall back to the session's.
pub struct RequestOptions {
    headers: HeaderMap,
    params: Vec<(String, String)>,
    body: Body,
    auth: Option<Arc<dyn Auth>>,
    cookies: Vec<(String, String)>,
    timeout: Option<Timeout>,
    allow_redirects: Option<bool>,
    stream: bool,
    verify: Option<Verify>,
    proxies: Proxies,
    /// First builder error, reported when the request is made.
    error: Option<Error>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            headers: HeaderMap::new(),
            params: Vec::new(),
            body: Body::Empty,
            auth: None,
            cookies: Vec::new(),
            timeout: None,
            allow_redirects: None,
            stream: false,
            verify: None,
            proxies: Proxies::new(),
            error: None,
        }
    }
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn headers(mut self, headers: &HeaderMap) -> Self {
        self.headers.merge(headers);
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn params<K: Into<String>, V: Into<String>>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn form<K: Into<String>, V: Into<String>>(mut self, fields: impl IntoIterator<Item = (K, V)>) -> Self {
        self.body = Body::form(fields);
        self
    }

    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match Body::json(value) {
            Ok(body) => self.body = body,
            Err(e) => self.fail(e),
        }
        self
    }

    /// Raw bytes, text, or a `Body::stream`.
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    pub fn auth(mut self, auth: impl Auth + 'static) -> Self {
        self.auth = Some(Arc::new(auth));
        self
    }

    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push((name.into(), value.into()));
        self
    }

    /// A `Duration` for both phases, or `(connect, read)`.
    pub fn timeout(mut self, timeout: impl Into<Timeout>) -> Self {
        self.timeout = Some(timeout.into());
        self
    }

    /// Follow redirects (default: on, except for HEAD).
    pub fn allow_redirects(mut self, allow: bool) -> Self {
        self.allow_redirects = Some(allow);
        self
    }

    /// Leave the body unread until the caller asks for it.
    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// `true`/`false` or a CA bundle path.
    pub fn verify(mut self, verify: impl Into<Verify>) -> Self {
        self.verify = Some(verify.into());
        self
    }

    pub fn proxy(mut self, scheme: &str, proxy_url: &str) -> Self {
        if let Err(e) = self.proxies.insert(scheme, proxy_url) {
            self.fail(e);
        }
        self
    }

    fn fail(&mut self, e: Error) {
        if self.error.is_none() {
            self.error = Some(e);
        }
    }

    fn into_request(self, method: Method, url: &str) -> Result<(Request, Transport)> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let request = Request {
            method,
            url: url.to_string(),
            headers: self.headers,
            params: self.params,
            body: self.body,
            auth: self.auth,
            cookies: self.cookies,
        };
        let transport = Transport {
            timeout: self.timeout,
            allow_redirects: self.allow_redirects,
            stream: self.stream,
            verify: self.verify,
            proxies: self.proxies,
        };
        Ok((request, transport))
    }
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("headers", &self.headers)
            .field("params", &self.params)
            .field("body", &self.body)
            .field("timeout", &self.timeout)
            .field("allow_redirects", &self.allow_redirects)
            .field("stream", &self.stream)
            .finish()
    }
}

/// Transport part of `RequestOptions`.
struct Transport {
    timeout: Option<Timeout>,
    allow_redirects: Option<bool>,
    stream: bool,
    verify: Option<Verify>,
    proxies: Proxies,
}

struct SessionInner {
    config: SessionConfig,
    auth: Option<Arc<dyn Auth>>,
    cookies: RwLock<CookieJar>,
    http: Arc<HttpAdapter>,
    /// Longest prefix first.
    mounts: RwLock<Vec<(String, Arc<dyn Adapter>)>>,
    env_proxies: Proxies,
    logger: Logger,
    closed: AtomicBool,
}

/// HTTP client session. See the module docs.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Session with default settings.
    pub fn new() -> Result<Session> {
        SessionBuilder::new().build()
    }

    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Merge `request` with the session defaults and cookies.
    pub fn prepare_request(&self, request: Request) -> Result<PreparedRequest> {
        self.ensure_open()?;
        let config = &self.inner.config;
        let jar = |url: &Url| self.cookie_header(url);
        let defaults = PrepareDefaults {
            base_url: config.base_url.as_ref(),
            headers: Some(&config.headers),
            params: &config.params,
            auth: self.inner.auth.as_ref(),
            cookie_header: Some(&jar),
        };
        prepare(request, &defaults)
    }

    /// Prepare and send a request, following redirects unless disabled.
    pub async fn request(&self, method: Method, url: &str, options: RequestOptions) -> Result<Response> {
        let (request, transport) = options.into_request(method, url)?;
        let prepared = self.prepare_request(request)?;
        self.dispatch(prepared, transport).await
    }

    /// Send an already prepared request. Only the transport settings of `options` apply.
    pub async fn send(&self, request: PreparedRequest, options: RequestOptions) -> Result<Response> {
        let (_, transport) = options.into_request(request.method(), request.url().as_str())?;
        self.dispatch(request, transport).await
    }

    pub async fn get(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::Get, url, options).await
    }

    pub async fn post(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::Post, url, options).await
    }

    pub async fn put(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::Put, url, options).await
    }

    pub async fn patch(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::Patch, url, options).await
    }

    pub async fn delete(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::Delete, url, options).await
    }

    /// HEAD does not follow redirects unless `allow_redirects(true)` is given.
    pub async fn head(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::Head, url, options).await
    }

    pub async fn options(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.request(Method::Options, url, options).await
    }

    async fn dispatch(&self, request: PreparedRequest, transport: Transport) -> Result<Response> {
        self.ensure_open()?;
        let follow = transport
            .allow_redirects
            .unwrap_or(request.method() != Method::Head);
        let hop = SessionHop {
            session: self,
            options: self.send_options(transport),
        };
        self.inner.logger.debug(format_args!("{} {}", request.method(), request.url()));
        redirect::send(
            &hop,
            request,
            follow,
            self.inner.config.max_redirects,
            &self.inner.logger,
        )
        .await
    }

    fn send_options(&self, transport: Transport) -> SendOptions {
        let config = &self.inner.config;
        let mut proxies = transport.proxies.merged_with(&config.proxies);
        if config.trust_env {
            proxies = proxies.merged_with(&self.inner.env_proxies);
        }
        SendOptions {
            timeout: transport.timeout.unwrap_or(config.timeout),
            verify: transport.verify.unwrap_or_else(|| config.verify.clone()),
            proxies,
            stream: transport.stream,
        }
    }

    /// Route URLs starting with `prefix` to `adapter`. The longest matching prefix wins.
    pub fn mount(&self, prefix: &str, adapter: Arc<dyn Adapter>) {
        let mut mounts = self.inner.mounts.write().unwrap_or_else(|e| e.into_inner());
        insert_mount(&mut mounts, prefix, adapter);
    }

    fn adapter_for(&self, url: &Url) -> Result<Arc<dyn Adapter>> {
        let mounts = self.inner.mounts.read().unwrap_or_else(|e| e.into_inner());
        let target = url.as_str().to_ascii_lowercase();
        mounts
            .iter()
            .find(|(prefix, _)| target.starts_with(prefix.as_str()))
            .map(|(_, adapter)| Arc::clone(adapter))
            .ok_or_else(|| Error::invalid_url(url.as_str(), "no adapter mounted for this URL"))
    }

    /// Snapshot of the cookie jar.
    pub fn cookies(&self) -> CookieJar {
        self.inner
            .cookies
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Run `f` with the cookie jar locked for writing.
    pub fn with_cookies<R>(&self, f: impl FnOnce(&mut CookieJar) -> R) -> R {
        let mut jar = self.inner.cookies.write().unwrap_or_else(|e| e.into_inner());
        f(&mut jar)
    }

    fn cookie_header(&self, url: &Url) -> Option<String> {
        self.inner
            .cookies
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .cookie_header(url)
    }

    fn store_cookies(&self, response: &Response) {
        if response.headers().contains("set-cookie") {
            self.with_cookies(|jar| jar.store_response_cookies(response.url(), response.headers()));
        }
    }

    /// Idle pooled connections of the built-in HTTP adapter.
    pub fn idle_connections(&self) -> usize {
        self.inner.http.idle_connections()
    }

    /// Drop every idle connection and refuse further requests. Responses still
    /// streaming keep their connection until they finish.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mounts = self.inner.mounts.read().unwrap_or_else(|e| e.into_inner());
        for (_, adapter) in mounts.iter() {
            adapter.close();
        }
        self.inner.http.close();
        self.inner.logger.debug(format_args!("session closed"));
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(Error::SessionClosed)
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.inner.config)
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn insert_mount(mounts: &mut Vec<(String, Arc<dyn Adapter>)>, prefix: &str, adapter: Arc<dyn Adapter>) {
    let prefix = prefix.to_ascii_lowercase();
    mounts.retain(|(p, _)| *p != prefix);
    mounts.push((prefix, adapter));
    mounts.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
}

/// Redirect hops go through the session: adapter lookup per URL, cookie jar.
struct SessionHop<'s> {
    session: &'s Session,
    options: SendOptions,
}

impl Hop for SessionHop<'_> {
    fn send_once(
        &self,
        request: PreparedRequest,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response>> + Send + '_>> {
        Box::pin(async move {
            let adapter = self.session.adapter_for(request.url())?;
            adapter.send(request, &self.options).await
        })
    }

    fn store_cookies(&self, response: &Response) {
        self.session.store_cookies(response);
    }

    fn cookie_header(&self, url: &Url) -> Option<String> {
        self.session.cookie_header(url)
    }
}

/// Builds a `Session`. Setters take `&mut self` so they can be chained or applied in steps.
pub struct SessionBuilder {
    config: SessionConfig,
    base_url: Option<String>,
    proxies: Vec<(String, String)>,
    auth: Option<Arc<dyn Auth>>,
    logger: Logger,
    mounts: Vec<(String, Arc<dyn Adapter>)>,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self {
            config: SessionConfig::default(),
            base_url: None,
            proxies: Vec::new(),
            auth: None,
            logger: Logger::global(),
            mounts: Vec::new(),
        }
    }

    /// Start from a complete configuration.
    pub fn config(&mut self, config: SessionConfig) -> &mut Self {
        self.config = config;
        self
    }

    /// Relative request URLs resolve against this URL.
    pub fn base_url(&mut self, url: impl Into<String>) -> &mut Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.config.headers.insert(name, value);
        self
    }

    pub fn param(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.config.params.push((name.into(), value.into()));
        self
    }

    pub fn auth(&mut self, auth: impl Auth + 'static) -> &mut Self {
        self.auth = Some(Arc::new(auth));
        self
    }

    pub fn timeout(&mut self, timeout: impl Into<Timeout>) -> &mut Self {
        self.config.timeout = timeout.into();
        self
    }

    pub fn max_redirects(&mut self, max: usize) -> &mut Self {
        self.config.max_redirects = max;
        self
    }

    pub fn pool_max_per_host(&mut self, max: usize) -> &mut Self {
        self.config.pool.max_per_host = max;
        self
    }

    pub fn pool_max_idle(&mut self, max: usize) -> &mut Self {
        self.config.pool.max_idle = max;
        self
    }

    pub fn idle_timeout(&mut self, timeout: Option<Duration>) -> &mut Self {
        self.config.pool.idle_timeout = timeout;
        self
    }

    /// How long to wait for a free pooled connection.
    pub fn pool_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.config.pool.acquire_timeout = Some(timeout);
        self
    }

    pub fn root_store(&mut self, roots: RootStore) -> &mut Self {
        self.config.roots = roots;
        self
    }

    pub fn verify(&mut self, verify: impl Into<Verify>) -> &mut Self {
        self.config.verify = verify.into();
        self
    }

    pub fn proxy(&mut self, scheme: impl Into<String>, proxy_url: impl Into<String>) -> &mut Self {
        self.proxies.push((scheme.into(), proxy_url.into()));
        self
    }

    pub fn no_proxy(&mut self, host: &str) -> &mut Self {
        self.config.proxies.bypass(host);
        self
    }

    /// Fill unset proxies from `HTTP_PROXY`, `HTTPS_PROXY`, `ALL_PROXY` and `NO_PROXY`.
    pub fn trust_env(&mut self, trust: bool) -> &mut Self {
        self.config.trust_env = trust;
        self
    }

    /// Send the session's log records to `sink` instead of the global logger.
    pub fn logger(&mut self, sink: Arc<dyn log::Log>) -> &mut Self {
        self.logger = Logger::with_sink(sink);
        self
    }

    pub fn mount(&mut self, prefix: &str, adapter: Arc<dyn Adapter>) -> &mut Self {
        self.mounts.push((prefix.to_string(), adapter));
        self
    }

    pub fn build(&self) -> Result<Session> {
        let mut config = self.config.clone();
        config.headers.validate()?;
        if let Some(raw) = &self.base_url {
            config.base_url = Some(uri::parse_url(raw, None)?);
        }
        for (scheme, proxy_url) in &self.proxies {
            config.proxies.insert(scheme, proxy_url)?;
        }
        if let Verify::CaBundle(_) = &config.verify {
            net::http_client_config(config.roots, &config.verify)?;
        }
        let env_proxies = if config.trust_env {
            Proxies::from_env()
        } else {
            Proxies::new()
        };

        let http = Arc::new(HttpAdapter::new(config.roots, config.pool, self.logger.clone()));
        let mut mounts: Vec<(String, Arc<dyn Adapter>)> = Vec::new();
        insert_mount(&mut mounts, "http://", http.clone());
        insert_mount(&mut mounts, "https://", http.clone());
        for (prefix, adapter) in &self.mounts {
            insert_mount(&mut mounts, prefix, Arc::clone(adapter));
        }

        Ok(Session {
            inner: Arc::new(SessionInner {
                config,
                auth: self.auth.clone(),
                cookies: RwLock::new(CookieJar::new()),
                http,
                mounts: RwLock::new(mounts),
                env_proxies,
                logger: self.logger.clone(),
                closed: AtomicBool::new(false),
            }),
        })
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::http::adapter::SendFuture;
    use std::sync::Mutex;

    /// Adapter answering every request with a fixed status, recording URLs.
    struct Canned {
        status: u16,
        seen: Mutex<Vec<String>>,
        closed: AtomicBool,
    }

    impl Canned {
        fn new(status: u16) -> Arc<Self> {
            Arc::new(Self {
                status,
                seen: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            })
        }
    }

    impl Adapter for Canned {
        fn send<'a>(&'a self, request: PreparedRequest, _options: &'a SendOptions) -> SendFuture<'a> {
            self.seen.lock().unwrap().push(request.url().to_string());
            let mut headers = HeaderMap::new();
            headers.append("Set-Cookie", "seen=1; Path=/");
            let response = Response::from_bytes(Arc::new(request), self.status, headers, &b"canned"[..]);
            Box::pin(async move { Ok(response) })
        }

        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn session() -> Session {
        Session::builder().trust_env(false).build().unwrap()
    }

    #[tokio::test]
    async fn longest_mount_prefix_wins() {
        let s = session();
        let api = Canned::new(201);
        let v2 = Canned::new(202);
        s.mount("https://api.example.com/", api.clone());
        s.mount("https://api.example.com/v2/", v2.clone());
        let r = s.get("https://api.example.com/v2/items", RequestOptions::new()).await.unwrap();
        assert_eq!(r.status(), 202);
        let r = s.get("https://API.example.com/v1/items", RequestOptions::new()).await.unwrap();
        assert_eq!(r.status(), 201);
        assert_eq!(v2.seen.lock().unwrap().len(), 1);
        assert_eq!(api.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn set_cookie_is_persisted() {
        let s = session();
        s.mount("http://cookie.test/", Canned::new(200));
        s.get("http://cookie.test/a", RequestOptions::new()).await.unwrap();
        assert_eq!(s.cookies().get("seen"), Some("1"));
        let prepared = s
            .prepare_request(Request::new(Method::Get, "http://cookie.test/b"))
            .unwrap();
        assert_eq!(prepared.headers().get("cookie"), Some("seen=1"));
    }

    #[tokio::test]
    async fn closed_session_refuses_requests() {
        let s = session();
        let canned = Canned::new(200);
        s.mount("http://closed.test/", canned.clone());
        let clone = s.clone();
        s.close();
        assert!(clone.is_closed());
        assert!(canned.closed.load(Ordering::SeqCst));
        let err = clone.get("http://closed.test/", RequestOptions::new()).await.unwrap_err();
        assert!(matches!(err, Error::SessionClosed));
    }

    #[test]
    fn builder_validates_inputs() {
        assert!(Session::builder().base_url("not a url").build().is_err());
        assert!(Session::builder().proxy("http", "ftp://proxy").build().is_err());
        assert!(Session::builder().header("Bad Name", "v").build().is_err());
        let s = Session::builder()
            .base_url("https://api.example.com/v1/")
            .header("X-Client", "courier-tests")
            .param("key", "k")
            .trust_env(false)
            .build()
            .unwrap();
        let p = s.prepare_request(Request::new(Method::Get, "users")).unwrap();
        assert_eq!(p.url().as_str(), "https://api.example.com/v1/users?key=k");
        assert_eq!(p.headers().get("x-client"), Some("courier-tests"));
    }

    #[test]
    fn deferred_option_errors_surface_at_request_time() {
        let options = RequestOptions::new().proxy("http", "socks5://p:1");
        assert!(options.into_request(Method::Get, "http://h/").is_err());
    }

    #[test]
    fn session_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Session>();
    }
}
