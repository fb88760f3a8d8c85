//! Raw message octets with a parsed header block.

use std::collections::HashMap;

/// Header fields of a message, keyed case-insensitively.
///
/// Folded lines are unfolded. Encoded words are left as sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    headers: HashMap<String, Vec<String>>,
}

impl Headers {
    /// Creates an empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&mut self, name: &str, value: String) {
        self.headers
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value);
    }

    /// Returns the first value of a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .and_then(|v| v.first().map(String::as_str))
    }

    /// Returns every value of a header, in message order.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|v| v.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Returns the number of distinct header names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Returns true if no header was parsed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Parses a header block. Parsing stops at the first empty line.
    ///
    /// Lines without a colon that are not continuations are skipped.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut headers = Self::new();
        let mut current: Option<(String, String)> = None;

        for line in text.lines() {
            if line.is_empty() {
                break;
            }
            if line.starts_with([' ', '\t']) {
                if let Some((_, value)) = current.as_mut() {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                continue;
            }
            if let Some((name, value)) = current.take() {
                headers.add(&name, value);
            }
            if let Some((name, value)) = line.split_once(':') {
                current = Some((name.trim().to_string(), value.trim().to_string()));
            }
        }
        if let Some((name, value)) = current {
            headers.add(&name, value);
        }
        headers
    }
}

/// Body octets as fetched, plus the parsed header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBody {
    raw: Vec<u8>,
    header: Headers,
    header_len: usize,
}

impl MessageBody {
    /// Splits `raw` at the first empty line and parses the header above it.
    ///
    /// Works for `BODY[]` (header and text) and `BODY[HEADER]` (header only).
    #[must_use]
    pub fn parse(raw: Vec<u8>) -> Self {
        let header_len = find_header_end(&raw).unwrap_or(raw.len());
        let header = Headers::parse(&String::from_utf8_lossy(&raw[..header_len]));
        Self {
            raw,
            header,
            header_len,
        }
    }

    /// Returns the octets exactly as the server sent them.
    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Returns the parsed header fields.
    #[must_use]
    pub const fn header(&self) -> &Headers {
        &self.header
    }

    /// Returns the octets after the header block; empty for a header fetch.
    #[must_use]
    pub fn text(&self) -> &[u8] {
        &self.raw[self.header_len..]
    }

    /// Consumes the body, returning the raw octets.
    #[must_use]
    pub fn into_raw(self) -> Vec<u8> {
        self.raw
    }
}

/// Returns the offset just past the blank line that ends the header.
fn find_header_end(raw: &[u8]) -> Option<usize> {
    let crlf = raw.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4);
    let lf = raw.windows(2).position(|w| w == b"\n\n").map(|i| i + 2);
    match (crlf, lf) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}
