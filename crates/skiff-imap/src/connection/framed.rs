//! Framed I/O for IMAP protocol.
//!
//! A server response unit is one or more CRLF-terminated lines. A line that
//! ends in `{N}` is followed by exactly N octets of literal data, after
//! which the unit continues with another line. [`Framer`] splits a byte
//! buffer into such units without doing I/O; [`FramedStream`] drives it over
//! an async stream.

use std::io;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{Error, Result};

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Default guard for one line or one literal.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 16 * 1024 * 1024;

/// Splits inbound bytes into response units.
///
/// The framer is incremental: bytes already scanned are not scanned again
/// on the next call, and a pending literal is skipped by length.
#[derive(Debug, Clone)]
pub struct Framer {
    max_line_length: usize,
    /// Start of the line currently being scanned.
    line_start: usize,
    /// Offset up to which the current line has been searched for CRLF.
    scanned: usize,
    /// End of a literal that has not fully arrived.
    literal_end: Option<usize>,
}

impl Default for Framer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_LENGTH)
    }
}

impl Framer {
    /// Creates a framer that rejects lines or literals above `max_line_length`.
    #[must_use]
    pub const fn new(max_line_length: usize) -> Self {
        Self {
            max_line_length,
            line_start: 0,
            scanned: 0,
            literal_end: None,
        }
    }

    fn reset(&mut self) {
        self.line_start = 0;
        self.scanned = 0;
        self.literal_end = None;
    }

    /// Takes one complete unit off the front of `buf`.
    ///
    /// Returns `Ok(None)` when more bytes are needed. The returned unit
    /// includes its final CRLF and any literal bytes verbatim.
    ///
    /// # Errors
    ///
    /// [`Error::MalformedFrame`] if a line or literal exceeds the limit.
    pub fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Bytes>> {
        loop {
            if let Some(end) = self.literal_end {
                if buf.len() < end {
                    return Ok(None);
                }
                self.literal_end = None;
                self.line_start = end;
                self.scanned = end;
            }

            let Some(offset) = find_crlf(&buf[self.scanned..]) else {
                if buf.len() - self.line_start > self.max_line_length {
                    return Err(Error::MalformedFrame(format!(
                        "line exceeds {} bytes",
                        self.max_line_length
                    )));
                }
                // A trailing CR may be completed by the next read.
                self.scanned = buf.len().saturating_sub(1).max(self.line_start);
                return Ok(None);
            };

            let line_end = self.scanned + offset + 2;
            if line_end - self.line_start > self.max_line_length {
                return Err(Error::MalformedFrame(format!(
                    "line exceeds {} bytes",
                    self.max_line_length
                )));
            }

            match parse_literal_length(&buf[self.line_start..line_end]) {
                Some(len) if len > self.max_line_length => {
                    return Err(Error::MalformedFrame(format!(
                        "literal of {len} bytes exceeds {}",
                        self.max_line_length
                    )));
                }
                Some(len) => {
                    self.literal_end = Some(line_end + len);
                    self.line_start = line_end;
                    self.scanned = line_end;
                }
                None => {
                    self.reset();
                    return Ok(Some(buf.split_to(line_end).freeze()));
                }
            }
        }
    }

    /// Returns true if part of a unit has been consumed.
    #[must_use]
    pub const fn is_mid_unit(&self) -> bool {
        self.line_start > 0 || self.literal_end.is_some()
    }
}

/// Finds the position of CRLF in a buffer.
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Parses a literal length from the end of a line.
///
/// Matches `{123}\r\n` and the non-synchronizing `{123+}\r\n`.
pub fn parse_literal_length(line: &[u8]) -> Option<usize> {
    let line = line.strip_suffix(b"\r\n")?;
    let line = line.strip_suffix(b"}")?;
    let line = line.strip_suffix(b"+").unwrap_or(line);
    let open = line.iter().rposition(|&b| b == b'{')?;
    let digits = &line[open + 1..];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

/// Framed connection for IMAP protocol.
///
/// Reading is cancel-safe: a `read_unit` future dropped inside
/// `tokio::select!` loses no bytes, since both the buffer and the framer
/// progress live in `self`.
#[derive(Debug)]
pub struct FramedStream<S> {
    stream: S,
    read_buf: BytesMut,
    framer: Framer,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a framed stream with the default line limit.
    pub fn new(stream: S) -> Self {
        Self::with_max_line_length(stream, DEFAULT_MAX_LINE_LENGTH)
    }

    /// Creates a framed stream with a custom line limit.
    pub fn with_max_line_length(stream: S, max_line_length: usize) -> Self {
        Self {
            stream,
            read_buf: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
            framer: Framer::new(max_line_length),
        }
    }

    /// Reads one complete response unit.
    ///
    /// # Errors
    ///
    /// - [`Error::Transport`] with `UnexpectedEof` if the peer closes between units
    /// - [`Error::MalformedFrame`] if it closes inside a unit, or a limit is exceeded
    pub async fn read_unit(&mut self) -> Result<Bytes> {
        loop {
            if let Some(unit) = self.framer.decode(&mut self.read_buf)? {
                return Ok(unit);
            }
            if self.stream.read_buf(&mut self.read_buf).await? == 0 {
                if self.read_buf.is_empty() && !self.framer.is_mid_unit() {
                    return Err(
                        io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed").into(),
                    );
                }
                return Err(Error::MalformedFrame(
                    "connection closed inside a response".to_string(),
                ));
            }
        }
    }

    /// Writes bytes to the stream.
    ///
    /// # Errors
    ///
    /// [`Error::Transport`] on write failure.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.stream.write_all(data).await?;
        Ok(())
    }

    /// Flushes the stream.
    ///
    /// # Errors
    ///
    /// [`Error::Transport`] on write failure.
    pub async fn flush(&mut self) -> Result<()> {
        self.stream.flush().await?;
        Ok(())
    }

    /// Shuts down the write half.
    ///
    /// # Errors
    ///
    /// [`Error::Transport`] on failure.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }

    /// Gets a reference to the underlying stream.
    pub const fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Consumes the framed stream and returns the inner stream.
    ///
    /// Buffered bytes are lost.
    pub fn into_inner(self) -> S {
        self.stream
    }
}
