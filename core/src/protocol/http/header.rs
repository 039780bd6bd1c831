/*
 * header.rs
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

//! Header map (ordered, case-insensitive names), header validation and media type parsing.

use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};

/// Ordered header map. Names compare case-insensitively and keep the spelling of the first insert.
///
/// `insert` is last-write-wins: it replaces every existing value of the name in place.
/// `append` keeps earlier values (used for `Set-Cookie` and other repeatable headers).
#[derive(Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name` to `value`, replacing earlier values.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(first) => {
                self.entries[first].1 = value;
                let mut i = first + 1;
                while i < self.entries.len() {
                    if self.entries[i].0.eq_ignore_ascii_case(&name) {
                        self.entries.remove(i);
                    } else {
                        i += 1;
                    }
                }
            }
            None => self.entries.push((name, value)),
        }
    }

    /// Add a value without removing existing ones.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|i| self.entries[i].1.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Remove every value of `name`; returns the first removed value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let mut removed = None;
        self.entries.retain(|(k, v)| {
            if k.eq_ignore_ascii_case(name) {
                if removed.is_none() {
                    removed = Some(v.clone());
                }
                false
            } else {
                true
            }
        });
        removed
    }

    /// Overlay `other` on `self`: each name present in `other` replaces the values in `self`.
    pub fn merge(&mut self, other: &HeaderMap) {
        let mut seen: Vec<&str> = Vec::new();
        for (name, _) in &other.entries {
            if seen.iter().any(|s| s.eq_ignore_ascii_case(name)) {
                continue;
            }
            seen.push(name);
            self.remove(name);
            for value in other.get_all(name) {
                self.append(name.clone(), value);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Validate every entry (see [`validate_header`]).
    pub fn validate(&self) -> Result<()> {
        for (name, value) in &self.entries {
            validate_header(name, value)?;
        }
        Ok(())
    }

    /// Parsed `Content-Length`, if present and well formed.
    pub fn content_length(&self) -> Option<u64> {
        self.checked_content_length().ok().flatten()
    }

    /// `Content-Length` as message framing. Repeated fields and comma lists are
    /// accepted only when every element is the same decimal number.
    pub fn checked_content_length(&self) -> Result<Option<u64>> {
        let mut length: Option<u64> = None;
        for value in self.get_all("content-length") {
            for part in value.split(',').map(str::trim) {
                let n = Some(part)
                    .filter(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
                    .and_then(|p| p.parse::<u64>().ok())
                    .ok_or_else(|| Error::Protocol(format!("invalid Content-Length {:?}", value)))?;
                match length {
                    Some(seen) if seen != n => {
                        return Err(Error::Protocol(format!(
                            "conflicting Content-Length values {} and {}",
                            seen, n
                        )))
                    }
                    _ => length = Some(n),
                }
            }
        }
        Ok(length)
    }

    /// True if any `Transfer-Encoding` value ends with `chunked`.
    pub fn is_chunked(&self) -> bool {
        self.get_all("transfer-encoding").any(|v| {
            v.rsplit(',')
                .next()
                .map(|last| last.trim().eq_ignore_ascii_case("chunked"))
                .unwrap_or(false)
        })
    }

    /// True if a `Connection` header carries the given token.
    pub fn connection_has(&self, token: &str) -> bool {
        self.get_all("connection")
            .flat_map(|v| v.split(','))
            .any(|t| t.trim().eq_ignore_ascii_case(token))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(name))
    }
}

impl fmt::Debug for HeaderMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HeaderMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = HeaderMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<'a> IntoIterator for &'a HeaderMap {
    type Item = (&'a str, &'a str);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a str)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// Checks if a character is valid in an RFC 7230 token.
#[inline]
pub fn is_token_char(c: u8) -> bool {
    matches!(c,
        b'0'..=b'9' | b'A'..=b'Z' | b'a'..=b'z' |
        b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' |
        b'^' | b'_' | b'`' | b'|' | b'~'
    )
}

pub fn is_token(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(is_token_char)
}

/// Reject header names that are not tokens, and values with CR, LF, NUL or other controls
/// (HTAB allowed) or with leading whitespace.
pub fn validate_header(name: &str, value: &str) -> Result<()> {
    if !is_token(name) {
        return Err(Error::invalid_header(name, "name must be a non-empty token"));
    }
    if value.starts_with([' ', '\t']) {
        return Err(Error::invalid_header(name, "value has leading whitespace"));
    }
    if value.bytes().any(|b| (b < 0x20 && b != b'\t') || b == 0x7f) {
        return Err(Error::invalid_header(name, "value contains control characters"));
    }
    Ok(())
}

/// Media type from a `Content-Type` value: `type/subtype; name=value; ...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    primary_type: String,
    sub_type: String,
    parameters: HashMap<String, String>,
}

impl MediaType {
    /// Parse a `Content-Type` header value. Returns `None` when the essence is not `token/token`.
    pub fn parse(value: &str) -> Option<MediaType> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        let (type_part, params_part) = match value.find(';') {
            Some(i) => (value[..i].trim(), value[i + 1..].trim()),
            None => (value, ""),
        };
        let slash = type_part.find('/')?;
        let primary = type_part[..slash].trim();
        let sub = type_part[slash + 1..].trim();
        if !is_token(primary) || !is_token(sub) {
            return None;
        }
        Some(MediaType {
            primary_type: primary.to_ascii_lowercase(),
            sub_type: sub.to_ascii_lowercase(),
            parameters: parse_parameters(params_part),
        })
    }

    pub fn primary_type(&self) -> &str {
        &self.primary_type
    }

    pub fn sub_type(&self) -> &str {
        &self.sub_type
    }

    pub fn is(&self, primary: &str, sub: &str) -> bool {
        self.primary_type.eq_ignore_ascii_case(primary) && self.sub_type.eq_ignore_ascii_case(sub)
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn charset(&self) -> Option<&str> {
        self.parameter("charset")
    }
}

/// Parse `name=value; name="quoted \" value"` pairs. Malformed pairs are skipped.
fn parse_parameters(params: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    let bytes = params.as_bytes();
    let len = bytes.len();
    let mut pos = 0;
    while pos < len {
        while pos < len && (bytes[pos] == b';' || bytes[pos].is_ascii_whitespace()) {
            pos += 1;
        }
        if pos >= len {
            break;
        }
        let eq = match bytes[pos..].iter().position(|&b| b == b'=') {
            Some(i) => pos + i,
            None => break,
        };
        let name = params[pos..eq].trim();
        pos = eq + 1;
        let value = if pos < len && bytes[pos] == b'"' {
            pos += 1;
            let mut v = String::new();
            while pos < len {
                let c = bytes[pos];
                if c == b'\\' && pos + 1 < len {
                    v.push(bytes[pos + 1] as char);
                    pos += 2;
                } else if c == b'"' {
                    pos += 1;
                    break;
                } else {
                    v.push(c as char);
                    pos += 1;
                }
            }
            while pos < len && bytes[pos] != b';' {
                pos += 1;
            }
            v
        } else {
            let end = bytes[pos..]
                .iter()
                .position(|&b| b == b';')
                .map(|i| pos + i)
                .unwrap_or(len);
            let v = params[pos..end].trim().to_string();
            pos = end;
            v
        };
        if is_token(name) {
            out.insert(name.to_ascii_lowercase(), value);
        }
    }
    out
}
