/*
 * parser.rs
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

//! HTTP/1.1 response push parser: status line, headers, body (Content-Length, chunked,
//! or read-until-close).

use bytes::{Buf, BytesMut};

use crate::error::{Error, Result};

/// Upper bound on a response head (status line plus headers), and on trailers.
pub const MAX_HEAD_SIZE: usize = 64 * 1024;

/// Callback for HTTP/1.1 response events. The connection implements this to collect
/// the head and queue body chunks.
pub trait H1ResponseHandler {
    fn status(&mut self, version: HttpVersion, code: u16, reason: &str);
    fn header(&mut self, name: &str, value: &str);
    fn body_chunk(&mut self, data: &[u8]);
    fn trailer(&mut self, name: &str, value: &str);
    /// The message is complete; the connection may carry the next one.
    fn complete(&mut self);
}

/// Protocol version from the status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    Http10,
    Http11,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    Idle,
    StatusLine,
    Headers,
    /// Headers done; the connection must call `set_body_mode`.
    HeadersComplete,
    Body,
    ChunkSize,
    ChunkData,
    /// CRLF after a chunk's data.
    ChunkDataEnd,
    ChunkTrailer,
}

/// Push parser for one HTTP/1.1 response at a time. Feed bytes via `receive`; the
/// handler is invoked as complete tokens are parsed.
pub struct ResponseParser {
    state: ParseState,
    /// `None` means read until the connection closes.
    content_length: Option<u64>,
    bytes_received: u64,
    chunk_remaining: u64,
    /// Head and trailer bytes consumed for the current response.
    head_bytes: usize,
}

impl ResponseParser {
    pub fn new() -> Self {
        Self {
            state: ParseState::StatusLine,
            content_length: None,
            bytes_received: 0,
            chunk_remaining: 0,
            head_bytes: 0,
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    /// Prepare for the next response on the same connection.
    pub fn reset(&mut self) {
        self.state = ParseState::StatusLine;
        self.content_length = None;
        self.bytes_received = 0;
        self.chunk_remaining = 0;
        self.head_bytes = 0;
    }

    fn find_crlf(buf: &[u8]) -> Option<usize> {
        buf.windows(2).position(|w| w == b"\r\n")
    }

    /// Take one CRLF-terminated line off `buf`, without the CRLF.
    /// Bytes that are not UTF-8 (obs-text) are read as ISO-8859-1.
    fn take_line(buf: &mut BytesMut) -> Option<String> {
        let line_end = Self::find_crlf(buf)?;
        let line = buf.split_to(line_end + 2);
        let raw = &line[..line_end];
        Some(match std::str::from_utf8(raw) {
            Ok(text) => text.to_string(),
            Err(_) => raw.iter().map(|&b| char::from(b)).collect(),
        })
    }

    /// `take_line` for the head and trailers, counted against `MAX_HEAD_SIZE`.
    fn take_head_line(&mut self, buf: &mut BytesMut, what: &str) -> Result<Option<String>> {
        let before = buf.len();
        let line = Self::take_line(buf);
        self.head_bytes += before - buf.len();
        let pending = if line.is_none() { buf.len() } else { 0 };
        if self.head_bytes + pending > MAX_HEAD_SIZE {
            return Err(Error::Protocol(format!("{} exceeds {} bytes", what, MAX_HEAD_SIZE)));
        }
        Ok(line)
    }

    /// Consume and parse as much as possible from `buf`. Partial tokens stay in `buf`.
    /// Returns when the headers are complete so the connection can choose the body mode.
    pub fn receive<H: H1ResponseHandler>(&mut self, buf: &mut BytesMut, handler: &mut H) -> Result<()> {
        while !buf.is_empty() {
            match self.state {
                ParseState::StatusLine => {
                    let line = match self.take_head_line(buf, "response head")? {
                        Some(line) => line,
                        None => return Ok(()),
                    };
                    // Tolerate stray CRLF between messages.
                    if line.is_empty() {
                        continue;
                    }
                    let (version, code, reason) = parse_status_line(&line)?;
                    handler.status(version, code, reason);
                    self.state = ParseState::Headers;
                }
                ParseState::Headers => {
                    let line = match self.take_head_line(buf, "response head")? {
                        Some(line) => line,
                        None => return Ok(()),
                    };
                    if line.is_empty() {
                        self.state = ParseState::HeadersComplete;
                        return Ok(());
                    }
                    let (name, value) = split_header(&line)?;
                    handler.header(name, value);
                }
                ParseState::HeadersComplete => return Ok(()),
                ParseState::Body => match self.content_length {
                    Some(length) => {
                        let remaining = (length - self.bytes_received) as usize;
                        let to_read = remaining.min(buf.len());
                        let chunk = buf.split_to(to_read);
                        handler.body_chunk(&chunk);
                        self.bytes_received += to_read as u64;
                        if self.bytes_received >= length {
                            self.finish(handler);
                        }
                    }
                    None => {
                        let chunk = buf.split_to(buf.len());
                        handler.body_chunk(&chunk);
                    }
                },
                ParseState::ChunkSize => {
                    let line = match Self::take_line(buf) {
                        Some(line) => line,
                        None if buf.len() > MAX_HEAD_SIZE => {
                            return Err(Error::Protocol("chunk size line too long".into()))
                        }
                        None => return Ok(()),
                    };
                    let hex = line.split(';').next().unwrap_or_default().trim();
                    self.chunk_remaining = u64::from_str_radix(hex, 16)
                        .map_err(|_| Error::Protocol(format!("invalid chunk size {:?}", hex)))?;
                    self.state = if self.chunk_remaining == 0 {
                        ParseState::ChunkTrailer
                    } else {
                        ParseState::ChunkData
                    };
                }
                ParseState::ChunkData => {
                    let to_read = (self.chunk_remaining as usize).min(buf.len());
                    let chunk = buf.split_to(to_read);
                    handler.body_chunk(&chunk);
                    self.chunk_remaining -= to_read as u64;
                    if self.chunk_remaining == 0 {
                        self.state = ParseState::ChunkDataEnd;
                    }
                }
                ParseState::ChunkDataEnd => {
                    if buf.len() < 2 {
                        return Ok(());
                    }
                    if &buf[..2] != b"\r\n" {
                        return Err(Error::Protocol("missing CRLF after chunk data".into()));
                    }
                    buf.advance(2);
                    self.state = ParseState::ChunkSize;
                }
                ParseState::ChunkTrailer => {
                    let line = match self.take_head_line(buf, "trailer section")? {
                        Some(line) => line,
                        None => return Ok(()),
                    };
                    if line.is_empty() {
                        self.finish(handler);
                    } else {
                        let (name, value) = split_header(&line)?;
                        handler.trailer(name, value);
                    }
                }
                ParseState::Idle => return Ok(()),
            }
        }
        Ok(())
    }

    /// Called after `HeadersComplete`. A bodiless response completes immediately.
    pub fn set_body_mode<H: H1ResponseHandler>(
        &mut self,
        content_length: Option<u64>,
        chunked: bool,
        handler: &mut H,
    ) {
        if self.state != ParseState::HeadersComplete {
            return;
        }
        self.bytes_received = 0;
        if chunked {
            self.content_length = None;
            self.state = ParseState::ChunkSize;
        } else if content_length == Some(0) {
            self.finish(handler);
        } else {
            self.content_length = content_length;
            self.state = ParseState::Body;
        }
    }

    /// The peer closed the connection. Ends a read-until-close body; anything else
    /// in flight is a truncated message.
    pub fn eof<H: H1ResponseHandler>(&mut self, handler: &mut H) -> Result<()> {
        match self.state {
            ParseState::Idle => Ok(()),
            ParseState::Body if self.content_length.is_none() => {
                self.finish(handler);
                Ok(())
            }
            ParseState::Body => Err(Error::Protocol(format!(
                "connection closed after {} of {} body bytes",
                self.bytes_received,
                self.content_length.unwrap_or_default()
            ))),
            state => Err(Error::Protocol(format!(
                "connection closed in parse state {:?}",
                state
            ))),
        }
    }

    /// Whether the body length is delimited by connection close.
    pub fn reads_until_close(&self) -> bool {
        self.state == ParseState::Body && self.content_length.is_none()
    }

    fn finish<H: H1ResponseHandler>(&mut self, handler: &mut H) {
        self.state = ParseState::Idle;
        handler.complete();
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

/// `HTTP/1.1 200 OK` or `HTTP/1.1 200`.
fn parse_status_line(line: &str) -> Result<(HttpVersion, u16, &str)> {
    let bad = || Error::Protocol(format!("malformed status line {:?}", line));
    let mut parts = line.splitn(3, ' ');
    let version = match parts.next() {
        Some("HTTP/1.1") => HttpVersion::Http11,
        Some("HTTP/1.0") => HttpVersion::Http10,
        _ => return Err(bad()),
    };
    let code = parts
        .next()
        .filter(|s| s.len() == 3)
        .and_then(|s| s.parse::<u16>().ok())
        .filter(|c| (100..600).contains(c))
        .ok_or_else(bad)?;
    let reason = parts.next().unwrap_or_default().trim();
    Ok((version, code, reason))
}

fn split_header(line: &str) -> Result<(&str, &str)> {
    let colon = line
        .find(':')
        .ok_or_else(|| Error::Protocol(format!("malformed header line {:?}", line)))?;
    Ok((line[..colon].trim(), line[colon + 1..].trim()))
}
