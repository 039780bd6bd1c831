/*
 * pool.rs
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

//! Connection pool keyed by (scheme, host, port, proxy, verification mode).
//!
//! Each key has a semaphore bounding the connections in use or idle for that key.
//! Idle connections are kept most-recent-first per key; across keys at most
//! `max_idle` are kept and the least recently used are evicted first. A key with
//! no idle connections and nobody holding or waiting for a slot is forgotten.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::timeout;
use url::Url;

use crate::config::{PoolConfig, Verify};
use crate::error::{Error, Result};
use crate::logging::Logger;

/// Identity of a reusable connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    /// Proxy origin the connection goes through, if any.
    pub proxy: Option<String>,
    pub verify: Verify,
}

impl PoolKey {
    pub fn new(url: &Url, proxy: Option<&Url>, verify: &Verify) -> Self {
        let scheme = url.scheme().to_string();
        // Verification does not apply to plain connections.
        let verify = if scheme == "https" {
            verify.clone()
        } else {
            Verify::Enabled
        };
        Self {
            host: url.host_str().unwrap_or_default().to_ascii_lowercase(),
            port: url.port_or_known_default().unwrap_or(80),
            proxy: proxy.map(|p| p.origin().ascii_serialization()),
            scheme,
            verify,
        }
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

struct Idle<T> {
    conn: T,
    since: Instant,
    /// Release order across all keys, for LRU eviction.
    seq: u64,
}

struct HostSlot<T> {
    idle: Vec<Idle<T>>,
    permits: Arc<Semaphore>,
}

struct PoolInner<T> {
    hosts: HashMap<PoolKey, HostSlot<T>>,
    idle_total: usize,
    seq: u64,
    closed: bool,
}

/// Shared connection pool. Cloning shares the same pool.
pub struct Pool<T> {
    inner: Arc<Mutex<PoolInner<T>>>,
    config: PoolConfig,
    logger: Logger,
}

impl<T> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            config: self.config,
            logger: self.logger.clone(),
        }
    }
}

impl<T: Send + 'static> Pool<T> {
    pub fn new(config: PoolConfig, logger: Logger) -> Self {
        Self {
            inner: Arc::new(Mutex::new(PoolInner {
                hosts: HashMap::new(),
                idle_total: 0,
                seq: 0,
                closed: false,
            })),
            config,
            logger,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolInner<T>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Reserve a slot for `key`, waiting up to `wait` when the key is at capacity.
    /// The lease carries the most recently released idle connection, if any.
    pub async fn acquire(&self, key: &PoolKey, wait: Option<Duration>) -> Result<Lease<T>> {
        let permits = {
            let mut inner = self.lock();
            if inner.closed {
                return Err(Error::SessionClosed);
            }
            let max = self.config.max_per_host.max(1);
            Arc::clone(
                &inner
                    .hosts
                    .entry(key.clone())
                    .or_insert_with(|| HostSlot {
                        idle: Vec::new(),
                        permits: Arc::new(Semaphore::new(max)),
                    })
                    .permits,
            )
        };
        let acquired = match wait {
            Some(limit) => timeout(limit, Arc::clone(&permits).acquire_owned()).await.ok(),
            None => Some(Arc::clone(&permits).acquire_owned().await),
        };
        drop(permits);
        let Some(acquired) = acquired else {
            self.forget_if_unused(key);
            return Err(Error::ConnectionPoolTimeout {
                host: key.to_string(),
            });
        };
        let permit = acquired.map_err(|_| Error::SessionClosed)?;

        let mut inner = self.lock();
        if inner.closed {
            return Err(Error::SessionClosed);
        }
        let idle_timeout = self.config.idle_timeout;
        let mut expired = 0;
        let mut idle = None;
        if let Some(slot) = inner.hosts.get_mut(key) {
            let before = slot.idle.len();
            if let Some(limit) = idle_timeout {
                slot.idle.retain(|i| i.since.elapsed() <= limit);
            }
            expired = before - slot.idle.len();
            idle = slot.idle.pop().map(|i| i.conn);
        }
        inner.idle_total -= expired + usize::from(idle.is_some());
        if expired > 0 {
            self.logger
                .trace(format_args!("dropped {} expired idle connection(s) to {}", expired, key));
        }
        Ok(Lease {
            key: key.clone(),
            idle,
            pool: self.clone(),
            permit: Some(permit),
        })
    }

    fn put_idle(&self, key: &PoolKey, conn: T) {
        let mut inner = self.lock();
        if inner.closed || self.config.max_idle == 0 {
            return;
        }
        inner.seq += 1;
        let seq = inner.seq;
        match inner.hosts.get_mut(key) {
            Some(slot) => slot.idle.push(Idle {
                conn,
                since: Instant::now(),
                seq,
            }),
            None => return,
        }
        inner.idle_total += 1;
        while inner.idle_total > self.config.max_idle {
            if !evict_oldest(&mut inner, &self.logger) {
                break;
            }
        }
    }

    fn forget_if_unused(&self, key: &PoolKey) {
        forget_if_unused(&mut self.lock(), key);
    }

    /// Keys currently tracked.
    #[cfg(test)]
    fn key_count(&self) -> usize {
        self.lock().hosts.len()
    }

    /// Idle connections currently kept.
    pub fn idle_count(&self) -> usize {
        self.lock().idle_total
    }

    /// Drop every idle connection and refuse further acquisitions. Waiters fail with
    /// `SessionClosed`.
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        inner.idle_total = 0;
        for slot in inner.hosts.values_mut() {
            slot.idle.clear();
            slot.permits.close();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

/// Drop the slot for `key` once it has no idle connections and its semaphore is
/// referenced by nothing but the slot (no lease, permit or waiter).
fn forget_if_unused<T>(inner: &mut PoolInner<T>, key: &PoolKey) {
    let unused = inner
        .hosts
        .get(key)
        .is_some_and(|slot| slot.idle.is_empty() && Arc::strong_count(&slot.permits) == 1);
    if unused {
        inner.hosts.remove(key);
    }
}

fn evict_oldest<T>(inner: &mut PoolInner<T>, logger: &Logger) -> bool {
    let oldest = inner
        .hosts
        .iter()
        .filter_map(|(key, slot)| slot.idle.iter().map(|i| i.seq).min().map(|seq| (seq, key.clone())))
        .min_by_key(|(seq, _)| *seq);
    let Some((seq, key)) = oldest else {
        return false;
    };
    if let Some(slot) = inner.hosts.get_mut(&key) {
        slot.idle.retain(|i| i.seq != seq);
        inner.idle_total -= 1;
        logger.trace(format_args!("evicted least recently used idle connection to {}", key));
    }
    forget_if_unused(inner, &key);
    true
}

/// A reserved slot in the pool. Dropping the lease frees the slot; `release`
/// additionally hands a healthy connection back for reuse.
pub struct Lease<T: Send + 'static> {
    key: PoolKey,
    idle: Option<T>,
    pool: Pool<T>,
    /// Taken on drop so the slot can be forgotten once the permit is gone.
    permit: Option<OwnedSemaphorePermit>,
}

impl<T: Send + 'static> Lease<T> {
    pub fn key(&self) -> &PoolKey {
        &self.key
    }

    /// The idle connection handed out with this lease; `None` means connect a new one.
    pub fn take_idle(&mut self) -> Option<T> {
        self.idle.take()
    }

    /// Return `conn` to the idle list and free the slot.
    pub fn release(self, conn: T) {
        self.pool.put_idle(&self.key, conn);
    }
}

impl<T: Send + 'static> Drop for Lease<T> {
    fn drop(&mut self) {
        drop(self.permit.take());
        self.pool.forget_if_unused(&self.key);
    }
}
