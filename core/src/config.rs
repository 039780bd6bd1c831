/*
 * config.rs
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

//! Session configuration: timeouts, TLS verification, proxies, pool limits and defaults.
//! Proxy settings can be filled from the usual environment variables.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::net::RootStore;

/// Redirect hops followed before `TooManyRedirects`.
pub const DEFAULT_MAX_REDIRECTS: usize = 30;
/// Connections per (scheme, host, port) at any time.
pub const DEFAULT_POOL_MAX_PER_HOST: usize = 10;
/// Idle connections kept across all hosts.
pub const DEFAULT_POOL_MAX_IDLE: usize = 32;
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

pub fn default_user_agent() -> String {
    format!("courier/{}", crate::VERSION)
}

/// Connect and read deadlines. `None` waits forever.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timeout {
    pub connect: Option<Duration>,
    pub read: Option<Duration>,
}

impl Timeout {
    /// The same deadline for connect and read.
    pub fn new(total: Duration) -> Self {
        Self {
            connect: Some(total),
            read: Some(total),
        }
    }

    pub fn split(connect: Duration, read: Duration) -> Self {
        Self {
            connect: Some(connect),
            read: Some(read),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }
}

impl From<Duration> for Timeout {
    fn from(total: Duration) -> Self {
        Timeout::new(total)
    }
}

impl From<(Duration, Duration)> for Timeout {
    fn from((connect, read): (Duration, Duration)) -> Self {
        Timeout::split(connect, read)
    }
}

/// TLS certificate verification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Verify {
    /// Verify against the session's root store.
    #[default]
    Enabled,
    /// Accept any certificate.
    Disabled,
    /// Verify against the PEM bundle at this path only.
    CaBundle(PathBuf),
}

impl From<bool> for Verify {
    fn from(verify: bool) -> Self {
        if verify {
            Verify::Enabled
        } else {
            Verify::Disabled
        }
    }
}

impl From<PathBuf> for Verify {
    fn from(path: PathBuf) -> Self {
        Verify::CaBundle(path)
    }
}

impl From<&str> for Verify {
    fn from(path: &str) -> Self {
        Verify::CaBundle(PathBuf::from(path))
    }
}

/// Proxy per URL scheme (`"http"`, `"https"`, or `"all"`), plus hosts that bypass proxies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Proxies {
    by_scheme: HashMap<String, Url>,
    no_proxy: Vec<String>,
}

impl Proxies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route `scheme` requests through `proxy_url` (an http:// proxy, credentials allowed).
    pub fn insert(&mut self, scheme: &str, proxy_url: &str) -> Result<()> {
        let url = Url::parse(proxy_url).map_err(|e| Error::invalid_url(proxy_url, e.to_string()))?;
        if url.scheme() != "http" || url.host_str().is_none() {
            return Err(Error::invalid_url(proxy_url, "proxy must be an http:// URL with a host"));
        }
        self.by_scheme.insert(scheme.to_ascii_lowercase(), url);
        Ok(())
    }

    /// Hosts (or domain suffixes) never proxied.
    pub fn bypass(&mut self, host: &str) {
        let host = host.trim().trim_start_matches('.').to_ascii_lowercase();
        if !host.is_empty() {
            self.no_proxy.push(host);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.by_scheme.is_empty()
    }

    /// Read `HTTP_PROXY`, `HTTPS_PROXY`, `ALL_PROXY` and `NO_PROXY` (either case).
    /// Malformed values are ignored.
    pub fn from_env() -> Self {
        let mut proxies = Proxies::new();
        for (scheme, var) in [("http", "http_proxy"), ("https", "https_proxy"), ("all", "all_proxy")] {
            if let Some(value) = env_var(var) {
                let _ = proxies.insert(scheme, &value);
            }
        }
        if let Some(value) = env_var("no_proxy") {
            for host in value.split(',') {
                proxies.bypass(host);
            }
        }
        proxies
    }

    /// Entries of `self` win; `fallback` fills the rest.
    pub fn merged_with(&self, fallback: &Proxies) -> Proxies {
        let mut out = fallback.clone();
        for (scheme, url) in &self.by_scheme {
            out.by_scheme.insert(scheme.clone(), url.clone());
        }
        out.no_proxy.extend(self.no_proxy.iter().cloned());
        out
    }

    /// Proxy for a request to `url`, if any.
    pub fn for_url(&self, url: &Url) -> Option<&Url> {
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        let host = host.trim_start_matches('[').trim_end_matches(']');
        let bypassed = self.no_proxy.iter().any(|entry| {
            entry == "*" || host == entry || host.ends_with(&format!(".{}", entry))
        });
        if bypassed {
            return None;
        }
        self.by_scheme
            .get(url.scheme())
            .or_else(|| self.by_scheme.get("all"))
    }
}

fn env_var(lower: &str) -> Option<String> {
    std::env::var(lower)
        .ok()
        .or_else(|| std::env::var(lower.to_ascii_uppercase()).ok())
        .filter(|v| !v.trim().is_empty())
}

/// Connection pool limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Connections (idle or in use) per pool key.
    pub max_per_host: usize,
    /// Idle connections kept across all keys; least recently used are evicted first.
    pub max_idle: usize,
    /// Idle connections older than this are closed instead of reused.
    pub idle_timeout: Option<Duration>,
    /// How long to wait for a free slot; falls back to the connect timeout.
    pub acquire_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_per_host: DEFAULT_POOL_MAX_PER_HOST,
            max_idle: DEFAULT_POOL_MAX_IDLE,
            idle_timeout: Some(DEFAULT_IDLE_TIMEOUT),
            acquire_timeout: None,
        }
    }
}

/// Everything a session is built from. See `SessionBuilder` for the setters.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub base_url: Option<Url>,
    pub headers: crate::HeaderMap,
    pub params: Vec<(String, String)>,
    pub timeout: Timeout,
    pub max_redirects: usize,
    pub pool: PoolConfig,
    pub roots: RootStore,
    pub verify: Verify,
    pub proxies: Proxies,
    /// Fill unset proxies from the environment.
    pub trust_env: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            headers: crate::HeaderMap::new(),
            params: Vec::new(),
            timeout: Timeout::none(),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            pool: PoolConfig::default(),
            roots: RootStore::default(),
            verify: Verify::Enabled,
            proxies: Proxies::new(),
            trust_env: true,
        }
    }
}
