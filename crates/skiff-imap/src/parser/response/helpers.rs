//! Parser helper functions.

use crate::Result;
use crate::parser::lexer::{Lexer, Token};
use crate::types::{
    Capability, Flag, Flags, FolderAttribute, FolderMetadata, Mailbox, MailboxStatus,
    ResponseCode, Uid, UidValidity,
};

/// Parses `[code args]` into a response code.
pub fn parse_response_code(lexer: &mut Lexer<'_>) -> Result<ResponseCode> {
    lexer.expect(Token::LBracket)?;
    let atom = lexer.read_atom_string()?;

    let code = match atom.to_ascii_uppercase().as_str() {
        "ALERT" => ResponseCode::Alert,
        "PARSE" => ResponseCode::Parse,
        "READ-ONLY" => ResponseCode::ReadOnly,
        "READ-WRITE" => ResponseCode::ReadWrite,
        "TRYCREATE" => ResponseCode::TryCreate,
        "UIDNEXT" => {
            lexer.expect_space()?;
            ResponseCode::UidNext(read_uid(lexer)?)
        }
        "UIDVALIDITY" => {
            lexer.expect_space()?;
            ResponseCode::UidValidity(read_uid_validity(lexer)?)
        }
        "UNSEEN" => {
            lexer.expect_space()?;
            ResponseCode::Unseen(lexer.read_number()?)
        }
        "CAPABILITY" => ResponseCode::Capability(parse_capability_data(lexer)?),
        "PERMANENTFLAGS" => {
            lexer.expect_space()?;
            ResponseCode::PermanentFlags(parse_flag_list(lexer)?.into_iter().collect())
        }
        "APPENDUID" => {
            lexer.expect_space()?;
            let uid_validity = read_uid_validity(lexer)?;
            lexer.expect_space()?;
            let uid = read_uid(lexer)?;
            ResponseCode::AppendUid { uid_validity, uid }
        }
        upper => {
            let args = if lexer.eat_space() {
                Some(lexer.read_until(b']')?.to_string())
            } else {
                None
            };
            ResponseCode::Other {
                name: upper.to_string(),
                args,
            }
        }
    };

    lexer.expect(Token::RBracket)?;
    Ok(code)
}

fn read_uid(lexer: &mut Lexer<'_>) -> Result<Uid> {
    let n = lexer.read_number()?;
    Uid::new(n).ok_or_else(|| lexer.error("UID cannot be 0"))
}

fn read_uid_validity(lexer: &mut Lexer<'_>) -> Result<UidValidity> {
    let n = lexer.read_number()?;
    UidValidity::new(n).ok_or_else(|| lexer.error("UIDVALIDITY cannot be 0"))
}

/// Parses the space-separated capability atoms that follow `CAPABILITY`.
pub fn parse_capability_data(lexer: &mut Lexer<'_>) -> Result<Vec<Capability>> {
    let mut caps = Vec::new();
    while lexer.eat_space() {
        match lexer.next_token()? {
            Token::Atom(s) => caps.push(Capability::parse(s)),
            // Trailing space before CRLF or `]`.
            Token::Crlf | Token::RBracket | Token::Eof => break,
            token => return Err(lexer.error(format!("unexpected {token:?} in capability list"))),
        }
    }
    Ok(caps)
}

/// Parses a parenthesized flag list.
pub fn parse_flag_list(lexer: &mut Lexer<'_>) -> Result<Flags> {
    lexer.expect(Token::LParen)?;
    let mut flags = Flags::new();

    loop {
        match lexer.next_token()? {
            Token::RParen => break,
            Token::Atom(s) => flags.insert(Flag::parse(s)),
            Token::Space => {}
            token => return Err(lexer.error(format!("unexpected {token:?} in flag list"))),
        }
    }
    Ok(flags)
}

/// Parses the body of a LIST or LSUB response.
///
/// Attributes outside the known set are dropped.
pub fn parse_folder(lexer: &mut Lexer<'_>) -> Result<FolderMetadata> {
    lexer.expect(Token::LParen)?;
    let mut attributes = std::collections::BTreeSet::new();
    loop {
        match lexer.next_token()? {
            Token::RParen => break,
            Token::Atom(s) => attributes.extend(FolderAttribute::parse(s)),
            Token::Space => {}
            token => return Err(lexer.error(format!("unexpected {token:?} in LIST attributes"))),
        }
    }
    lexer.expect_space()?;

    let delimiter = match lexer.next_token()? {
        Token::Nil => None,
        Token::QuotedString(s) => s.chars().next(),
        token => return Err(lexer.error(format!("expected delimiter, got {token:?}"))),
    };
    lexer.expect_space()?;

    let name = lexer.read_astring()?;
    Ok(FolderMetadata {
        name: Mailbox::from_wire(&name),
        delimiter,
        attributes,
    })
}

/// Parses the numbers that follow `SEARCH`.
pub fn parse_search_response(lexer: &mut Lexer<'_>) -> Result<Vec<u32>> {
    let mut nums = Vec::new();
    while lexer.eat_space() {
        match lexer.next_token()? {
            Token::Number(n) => {
                nums.push(u32::try_from(n).map_err(|_| lexer.error("search result out of range"))?);
            }
            Token::Crlf | Token::Eof => break,
            // Extension data such as `(MODSEQ 917162500)` is not modelled.
            Token::LParen => skip_parenthesized(lexer)?,
            token => return Err(lexer.error(format!("unexpected {token:?} in SEARCH"))),
        }
    }
    Ok(nums)
}

/// Parses `mailbox (NAME value ...)` after `STATUS`.
pub fn parse_status_response(lexer: &mut Lexer<'_>) -> Result<MailboxStatus> {
    let name = lexer.read_astring()?;
    lexer.expect_space()?;
    lexer.expect(Token::LParen)?;

    let mut status = MailboxStatus {
        mailbox: Mailbox::from_wire(&name),
        ..MailboxStatus::default()
    };
    loop {
        match lexer.next_token()? {
            Token::RParen => break,
            Token::Space => {}
            Token::Atom(item) => {
                lexer.expect_space()?;
                let value = lexer.read_number64()?;
                let small = u32::try_from(value).ok();
                match item.to_ascii_uppercase().as_str() {
                    "MESSAGES" => status.messages = small,
                    "RECENT" => status.recent = small,
                    "UIDNEXT" => status.uid_next = small.and_then(Uid::new),
                    "UIDVALIDITY" => status.uid_validity = small.and_then(UidValidity::new),
                    "UNSEEN" => status.unseen = small,
                    _ => {}
                }
            }
            token => return Err(lexer.error(format!("unexpected {token:?} in STATUS"))),
        }
    }
    Ok(status)
}

/// Skips a parenthesized expression whose `(` was already consumed.
pub fn skip_parenthesized(lexer: &mut Lexer<'_>) -> Result<()> {
    let mut depth = 1usize;
    while depth > 0 {
        match lexer.next_token()? {
            Token::LParen => depth += 1,
            Token::RParen => depth -= 1,
            Token::Crlf | Token::Eof => return Err(lexer.error("unbalanced parentheses")),
            _ => {}
        }
    }
    Ok(())
}
