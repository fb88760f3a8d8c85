//! IMAP response parser.
//!
//! Turns one framed response unit into a [`Response`].

#![allow(clippy::missing_errors_doc)]

mod fetch;
mod helpers;
mod types;

pub use types::{
    Address, BodyFields, BodyStructure, Envelope, FetchItem, TaggedResponse, UntaggedResponse,
};

use crate::Result;
use crate::parser::lexer::{Lexer, Token};
use crate::types::{ResponseCode, SeqNum, Status, Tag};
use helpers::{
    parse_capability_data, parse_folder, parse_response_code, parse_search_response,
    parse_status_response,
};

pub(crate) use helpers::parse_flag_list;

/// A parsed IMAP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Tagged completion.
    Tagged(TaggedResponse),
    /// Untagged data or status.
    Untagged(UntaggedResponse),
    /// Continuation request (`+ text`).
    Continuation {
        /// Text after `+ `, possibly empty.
        text: String,
    },
}

/// Response parser.
pub struct ResponseParser;

impl ResponseParser {
    /// Parses a complete response unit.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MalformedResponse`] with the byte offset of
    /// the first syntax error.
    pub fn parse(input: &[u8]) -> Result<Response> {
        let mut lexer = Lexer::new(input);
        match lexer.next_token()? {
            Token::Asterisk => Self::parse_untagged(&mut lexer),
            Token::Plus => Ok(Self::parse_continuation(&mut lexer)),
            Token::Atom(tag) => Self::parse_tagged(&mut lexer, tag),
            Token::Number(tag) => Self::parse_tagged(&mut lexer, &tag.to_string()),
            token => Err(crate::Error::parse(
                0,
                format!("expected *, + or tag, got {token:?}"),
            )),
        }
    }

    fn parse_tagged(lexer: &mut Lexer<'_>, tag: &str) -> Result<Response> {
        lexer.expect_space()?;
        let status = Self::parse_status(lexer)?;
        let (code, text) = Self::parse_resp_text(lexer)?;
        Self::finish(lexer)?;
        Ok(Response::Tagged(TaggedResponse {
            tag: Tag::new(tag),
            status,
            code,
            text,
        }))
    }

    fn parse_untagged(lexer: &mut Lexer<'_>) -> Result<Response> {
        lexer.expect_space()?;
        let untagged = match lexer.next_token()? {
            Token::Atom(keyword) => Self::parse_keyword(lexer, keyword)?,
            Token::Number(n) => Self::parse_message_data(lexer, n)?,
            token => {
                return Err(lexer.error(format!("unexpected {token:?} in untagged response")));
            }
        };
        Self::finish(lexer)?;
        Ok(Response::Untagged(untagged))
    }

    fn parse_keyword(lexer: &mut Lexer<'_>, keyword: &str) -> Result<UntaggedResponse> {
        let upper = keyword.to_ascii_uppercase();
        if let Some(status) = Status::parse(&upper) {
            let (code, text) = Self::parse_resp_text(lexer)?;
            return Ok(match status {
                Status::Ok => UntaggedResponse::Ok { code, text },
                Status::No => UntaggedResponse::No { code, text },
                Status::Bad => UntaggedResponse::Bad { code, text },
                Status::PreAuth => UntaggedResponse::PreAuth { code, text },
                Status::Bye => UntaggedResponse::Bye { code, text },
            });
        }

        let response = match upper.as_str() {
            "CAPABILITY" => UntaggedResponse::Capability(parse_capability_data(lexer)?),
            "FLAGS" => {
                lexer.expect_space()?;
                UntaggedResponse::Flags(parse_flag_list(lexer)?)
            }
            "LIST" => {
                lexer.expect_space()?;
                UntaggedResponse::List(parse_folder(lexer)?)
            }
            "LSUB" => {
                lexer.expect_space()?;
                UntaggedResponse::Lsub(parse_folder(lexer)?)
            }
            "SEARCH" => UntaggedResponse::Search(parse_search_response(lexer)?),
            "STATUS" => {
                lexer.expect_space()?;
                UntaggedResponse::Status(parse_status_response(lexer)?)
            }
            _ => Self::opaque(lexer, upper),
        };
        Ok(response)
    }

    fn parse_message_data(lexer: &mut Lexer<'_>, n: u64) -> Result<UntaggedResponse> {
        let n = u32::try_from(n).map_err(|_| lexer.error("message number out of range"))?;
        lexer.expect_space()?;
        let keyword = lexer.read_atom_string()?.to_ascii_uppercase();

        let response = match keyword.as_str() {
            "EXISTS" => UntaggedResponse::Exists(n),
            "RECENT" => UntaggedResponse::Recent(n),
            "EXPUNGE" => UntaggedResponse::Expunge(Self::seq_num(lexer, n)?),
            "FETCH" => {
                let seq = Self::seq_num(lexer, n)?;
                lexer.expect_space()?;
                let items = fetch::parse_fetch_response(lexer)?;
                UntaggedResponse::Fetch { seq, items }
            }
            _ => Self::opaque(lexer, format!("{n} {keyword}")),
        };
        Ok(response)
    }

    fn seq_num(lexer: &Lexer<'_>, n: u32) -> Result<SeqNum> {
        SeqNum::new(n).ok_or_else(|| lexer.error("sequence number cannot be 0"))
    }

    /// Keeps a response this parser does not model, up to the end of the unit.
    fn opaque(lexer: &mut Lexer<'_>, keyword: String) -> UntaggedResponse {
        lexer.eat_space();
        let rest = lexer.remaining();
        let body = rest.strip_suffix(b"\r\n").unwrap_or(rest);
        let text = String::from_utf8_lossy(body).into_owned();
        lexer.skip(body.len());
        UntaggedResponse::Other { keyword, text }
    }

    fn parse_continuation(lexer: &mut Lexer<'_>) -> Response {
        lexer.eat_space();
        Response::Continuation {
            text: lexer.read_text(),
        }
    }

    fn parse_status(lexer: &mut Lexer<'_>) -> Result<Status> {
        let s = lexer.read_atom_string()?;
        Status::parse(s).ok_or_else(|| lexer.error(format!("invalid status {s}")))
    }

    /// Parses `[SP ["[" code "]"] [SP] text]` after a status word.
    fn parse_resp_text(lexer: &mut Lexer<'_>) -> Result<(Option<ResponseCode>, String)> {
        if !lexer.eat_space() {
            return Ok((None, String::new()));
        }
        let code = if lexer.peek() == Some(b'[') {
            let code = parse_response_code(lexer)?;
            lexer.eat_space();
            Some(code)
        } else {
            None
        };
        Ok((code, lexer.read_text()))
    }

    /// Requires the unit to end with CRLF.
    fn finish(lexer: &mut Lexer<'_>) -> Result<()> {
        match lexer.next_token()? {
            Token::Crlf | Token::Eof if lexer.is_eof() => Ok(()),
            token => Err(lexer.error(format!("expected end of response, got {token:?}"))),
        }
    }
}
