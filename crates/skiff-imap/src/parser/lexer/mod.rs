//! Tokenizer for one IMAP response unit.
//!
//! The lexer works on a complete unit produced by the framer, so literals
//! are always present in full and can be borrowed instead of copied.

#![allow(clippy::missing_errors_doc)]

mod token;

pub use token::Token;

use crate::{Error, Result};

/// Lexer over a response unit.
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input.
    #[must_use]
    pub const fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    /// Returns the current position in the input.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Returns the remaining input.
    #[must_use]
    pub fn remaining(&self) -> &'a [u8] {
        &self.input[self.pos..]
    }

    /// Returns true if at end of input.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Peeks at the current byte without consuming it.
    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    /// Peeks at the byte at offset from current position.
    #[must_use]
    pub fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    /// Advances by one byte and returns it.
    pub fn advance(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    /// Skips n bytes.
    pub fn skip(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.input.len());
    }

    /// Reads the next token.
    pub fn next_token(&mut self) -> Result<Token<'a>> {
        let Some(byte) = self.peek() else {
            return Ok(Token::Eof);
        };

        match byte {
            b'\r' => {
                if self.peek_at(1) == Some(b'\n') {
                    self.skip(2);
                    Ok(Token::Crlf)
                } else {
                    Err(self.error("expected LF after CR"))
                }
            }
            b' ' => self.single(Token::Space),
            b'(' => self.single(Token::LParen),
            b')' => self.single(Token::RParen),
            b'[' => self.single(Token::LBracket),
            b']' => self.single(Token::RBracket),
            b'*' => self.single(Token::Asterisk),
            b'+' => self.single(Token::Plus),
            b'"' => self.read_quoted_string(),
            b'{' => self.read_literal(),
            b'0'..=b'9' => self.read_number_or_atom(),
            _ if is_atom_char(byte) => self.read_atom(),
            _ => Err(self.error(format!("unexpected character {byte:#04x}"))),
        }
    }

    fn single(&mut self, token: Token<'a>) -> Result<Token<'a>> {
        self.advance();
        Ok(token)
    }

    fn read_quoted_string(&mut self) -> Result<Token<'a>> {
        self.advance();
        let mut result = Vec::new();

        loop {
            match self.advance() {
                Some(b'"') => break,
                Some(b'\\') => match self.advance() {
                    Some(c @ (b'"' | b'\\')) => result.push(c),
                    Some(c) => return Err(self.error(format!("invalid escape \\{}", c as char))),
                    None => return Err(self.error("unterminated quoted string")),
                },
                Some(b'\r' | b'\n') | None => return Err(self.error("unterminated quoted string")),
                Some(c) => result.push(c),
            }
        }

        // Servers send raw 8-bit text in quoted strings (Latin-1 subjects).
        Ok(Token::QuotedString(String::from_utf8_lossy(&result).into_owned()))
    }

    /// Reads `{n}` or `{n+}`, the CRLF, and the n payload bytes.
    fn read_literal(&mut self) -> Result<Token<'a>> {
        self.advance();
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.advance();
        }
        let digits = &self.input[start..self.pos];
        if self.peek() == Some(b'+') {
            self.advance();
        }
        if self.advance() != Some(b'}') {
            return Err(self.error("expected } after literal size"));
        }
        let size: usize = std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| self.error("invalid literal size"))?;

        if self.advance() != Some(b'\r') || self.advance() != Some(b'\n') {
            return Err(self.error("expected CRLF after literal size"));
        }
        let end = self
            .pos
            .checked_add(size)
            .filter(|end| *end <= self.input.len())
            .ok_or_else(|| self.error("incomplete literal data"))?;

        let data = &self.input[self.pos..end];
        self.pos = end;
        Ok(Token::Literal(data))
    }

    fn read_number_or_atom(&mut self) -> Result<Token<'a>> {
        let start = self.pos;
        while self.peek().is_some_and(is_atom_char) {
            self.advance();
        }
        let s = self.slice_str(start)?;
        if s.bytes().all(|b| b.is_ascii_digit()) {
            s.parse()
                .map(Token::Number)
                .map_err(|_| self.error("number too large"))
        } else {
            Ok(Token::Atom(s))
        }
    }

    fn read_atom(&mut self) -> Result<Token<'a>> {
        let start = self.pos;
        while self.peek().is_some_and(is_atom_char) {
            self.advance();
        }
        // `\*` is a flag even though `*` is a list wildcard.
        if self.pos - start == 1 && self.input[start] == b'\\' && self.peek() == Some(b'*') {
            self.advance();
        }

        let s = self.slice_str(start)?;
        if s.eq_ignore_ascii_case("NIL") {
            Ok(Token::Nil)
        } else {
            Ok(Token::Atom(s))
        }
    }

    fn slice_str(&self, start: usize) -> Result<&'a str> {
        std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| self.error("invalid UTF-8 in atom"))
    }

    /// Creates a parse error at the current position.
    pub fn error(&self, message: impl Into<String>) -> Error {
        Error::parse(self.pos, message)
    }

    /// Expects and consumes a token of the same kind as `expected`.
    #[allow(clippy::needless_pass_by_value)]
    pub fn expect(&mut self, expected: Token<'_>) -> Result<()> {
        let token = self.next_token()?;
        if std::mem::discriminant(&token) == std::mem::discriminant(&expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected {expected:?}, got {token:?}")))
        }
    }

    /// Expects and consumes a space.
    pub fn expect_space(&mut self) -> Result<()> {
        self.expect(Token::Space)
    }

    /// Consumes a space if one is next.
    pub fn eat_space(&mut self) -> bool {
        if self.peek() == Some(b' ') {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Reads an astring (atom, quoted string or literal).
    ///
    /// Unlike a bare token, an astring atom may contain `[` and `]`, as in
    /// `[Gmail]/Sent`, and `NIL` is an ordinary name.
    pub fn read_astring(&mut self) -> Result<String> {
        if self.peek().is_some_and(is_astring_char) {
            let start = self.pos;
            while self.peek().is_some_and(is_astring_char) {
                self.advance();
            }
            return self.slice_str(start).map(str::to_string);
        }
        match self.next_token()? {
            Token::QuotedString(s) => Ok(s),
            Token::Literal(data) => Ok(String::from_utf8_lossy(data).into_owned()),
            token => Err(self.error(format!("expected astring, got {token:?}"))),
        }
    }

    /// Reads an nstring (NIL, quoted string or literal).
    pub fn read_nstring(&mut self) -> Result<Option<String>> {
        match self.next_token()? {
            Token::Nil => Ok(None),
            Token::QuotedString(s) => Ok(Some(s)),
            Token::Literal(data) => Ok(Some(String::from_utf8_lossy(data).into_owned())),
            token => Err(self.error(format!("expected nstring, got {token:?}"))),
        }
    }

    /// Reads an nstring as raw octets, for message bodies.
    pub fn read_nstring_bytes(&mut self) -> Result<Option<Vec<u8>>> {
        match self.next_token()? {
            Token::Nil => Ok(None),
            Token::QuotedString(s) => Ok(Some(s.into_bytes())),
            Token::Literal(data) => Ok(Some(data.to_vec())),
            token => Err(self.error(format!("expected nstring, got {token:?}"))),
        }
    }

    /// Reads a 32-bit number.
    pub fn read_number(&mut self) -> Result<u32> {
        let n = self.read_number64()?;
        u32::try_from(n).map_err(|_| self.error(format!("number {n} out of range")))
    }

    /// Reads a 64-bit number.
    pub fn read_number64(&mut self) -> Result<u64> {
        match self.next_token()? {
            Token::Number(n) => Ok(n),
            token => Err(self.error(format!("expected number, got {token:?}"))),
        }
    }

    /// Reads an atom.
    pub fn read_atom_string(&mut self) -> Result<&'a str> {
        match self.next_token()? {
            Token::Atom(s) => Ok(s),
            token => Err(self.error(format!("expected atom, got {token:?}"))),
        }
    }

    /// Consumes the rest of the line up to (not including) CRLF.
    pub fn read_text(&mut self) -> String {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b == b'\r' && self.peek_at(1) == Some(b'\n') {
                break;
            }
            self.advance();
        }
        String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
    }

    /// Consumes bytes up to (not including) `delim`, on the current line.
    pub fn read_until(&mut self, delim: u8) -> Result<&'a str> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b == delim {
                return self.slice_str(start);
            }
            if b == b'\r' {
                break;
            }
            self.advance();
        }
        Err(self.error(format!("expected {:?}", delim as char)))
    }
}

/// Returns true if the byte may appear in an atom.
///
/// This includes `\` so flags like `\Seen` lex as single atoms, even though
/// RFC 3501 defines `\` as a quoted-special.
#[must_use]
pub const fn is_atom_char(b: u8) -> bool {
    matches!(b,
        0x21 | 0x23 | 0x24 | 0x26 | 0x27 |
        0x2B..=0x5A |
        0x5C |
        0x5E..=0x7A |
        0x7C |
        0x7D |
        0x7E
    )
}

/// Returns true if the byte may appear in an astring atom.
#[must_use]
pub const fn is_astring_char(b: u8) -> bool {
    is_atom_char(b) || b == b'[' || b == b']'
}
