//! FETCH response parsing.

use chrono::DateTime;

use crate::Result;
use crate::parser::lexer::{Lexer, Token};
use crate::types::Uid;

use super::helpers::{parse_flag_list, skip_parenthesized};
use super::types::{Address, BodyFields, BodyStructure, Envelope, FetchItem};

const INTERNALDATE_FORMAT: &str = "%d-%b-%Y %H:%M:%S %z";

/// Parses the parenthesized item list of a FETCH response.
pub fn parse_fetch_response(lexer: &mut Lexer<'_>) -> Result<Vec<FetchItem>> {
    lexer.expect(Token::LParen)?;
    let mut items = Vec::new();

    loop {
        let name = match lexer.next_token()? {
            Token::RParen => break,
            Token::Space => continue,
            Token::Atom(name) => name,
            token => return Err(lexer.error(format!("unexpected {token:?} in FETCH"))),
        };

        match name.to_ascii_uppercase().as_str() {
            "FLAGS" => {
                lexer.expect_space()?;
                items.push(FetchItem::Flags(parse_flag_list(lexer)?));
            }
            "UID" => {
                lexer.expect_space()?;
                let n = lexer.read_number()?;
                let uid = Uid::new(n).ok_or_else(|| lexer.error("UID cannot be 0"))?;
                items.push(FetchItem::Uid(uid));
            }
            "RFC822.SIZE" => {
                lexer.expect_space()?;
                items.push(FetchItem::Rfc822Size(lexer.read_number()?));
            }
            "INTERNALDATE" => {
                lexer.expect_space()?;
                let raw = match lexer.next_token()? {
                    Token::QuotedString(s) => s,
                    token => return Err(lexer.error(format!("expected date, got {token:?}"))),
                };
                let date = DateTime::parse_from_str(raw.trim(), INTERNALDATE_FORMAT)
                    .map_err(|e| lexer.error(format!("invalid INTERNALDATE {raw:?}: {e}")))?;
                items.push(FetchItem::InternalDate(date));
            }
            "ENVELOPE" => {
                lexer.expect_space()?;
                items.push(FetchItem::Envelope(Box::new(parse_envelope(lexer)?)));
            }
            "BODYSTRUCTURE" => {
                lexer.expect_space()?;
                items.push(FetchItem::BodyStructure(parse_body_structure(lexer)?));
            }
            "BODY" if lexer.peek() != Some(b'[') => {
                lexer.expect_space()?;
                items.push(FetchItem::BodyStructure(parse_body_structure(lexer)?));
            }
            "BODY" => {
                let (section, origin) = parse_section_and_origin(lexer)?;
                lexer.expect_space()?;
                let data = lexer.read_nstring_bytes()?;
                items.push(FetchItem::Body {
                    section,
                    origin,
                    data,
                });
            }
            upper @ ("RFC822" | "RFC822.HEADER" | "RFC822.TEXT") => {
                let section = upper.strip_prefix("RFC822.").map(str::to_string);
                lexer.expect_space()?;
                let data = lexer.read_nstring_bytes()?;
                items.push(FetchItem::Body {
                    section,
                    origin: None,
                    data,
                });
            }
            _ => {
                tracing::trace!(item = name, "skipping unknown FETCH item");
                skip_fetch_value(lexer)?;
            }
        }
    }

    Ok(items)
}

/// Reads `[section]` and an optional `<origin>` after `BODY`.
fn parse_section_and_origin(lexer: &mut Lexer<'_>) -> Result<(Option<String>, Option<u32>)> {
    lexer.expect(Token::LBracket)?;
    let section = lexer.read_until(b']')?;
    let section = (!section.is_empty()).then(|| section.to_string());
    lexer.expect(Token::RBracket)?;

    let origin = if lexer.peek() == Some(b'<') {
        lexer.advance();
        let digits = lexer.read_until(b'>')?;
        let origin = digits
            .parse()
            .map_err(|_| lexer.error(format!("invalid origin <{digits}>")))?;
        lexer.advance();
        Some(origin)
    } else {
        None
    };

    Ok((section, origin))
}

/// Skips the value of an unknown FETCH item.
fn skip_fetch_value(lexer: &mut Lexer<'_>) -> Result<()> {
    if lexer.peek() == Some(b'[') {
        parse_section_and_origin(lexer)?;
    }
    lexer.expect_space()?;
    match lexer.next_token()? {
        Token::LParen => skip_parenthesized(lexer),
        Token::Atom(_)
        | Token::Number(_)
        | Token::QuotedString(_)
        | Token::Literal(_)
        | Token::Nil => Ok(()),
        token => Err(lexer.error(format!("unexpected {token:?} in FETCH value"))),
    }
}

/// Parses an envelope structure.
pub fn parse_envelope(lexer: &mut Lexer<'_>) -> Result<Envelope> {
    lexer.expect(Token::LParen)?;
    let date = lexer.read_nstring()?;
    lexer.expect_space()?;
    let subject = lexer.read_nstring()?;
    lexer.expect_space()?;
    let from = parse_address_list(lexer)?;
    lexer.expect_space()?;
    let sender = parse_address_list(lexer)?;
    lexer.expect_space()?;
    let reply_to = parse_address_list(lexer)?;
    lexer.expect_space()?;
    let to = parse_address_list(lexer)?;
    lexer.expect_space()?;
    let cc = parse_address_list(lexer)?;
    lexer.expect_space()?;
    let bcc = parse_address_list(lexer)?;
    lexer.expect_space()?;
    let in_reply_to = lexer.read_nstring()?;
    lexer.expect_space()?;
    let message_id = lexer.read_nstring()?;
    lexer.expect(Token::RParen)?;

    Ok(Envelope {
        date,
        subject,
        from,
        sender,
        reply_to,
        to,
        cc,
        bcc,
        in_reply_to,
        message_id,
    })
}

/// Parses an address list; `NIL` yields an empty list.
pub fn parse_address_list(lexer: &mut Lexer<'_>) -> Result<Vec<Address>> {
    match lexer.next_token()? {
        Token::Nil => Ok(Vec::new()),
        Token::LParen => {
            let mut addresses = Vec::new();
            loop {
                match lexer.peek() {
                    Some(b')') => {
                        lexer.advance();
                        break;
                    }
                    Some(b'(') => addresses.push(parse_address(lexer)?),
                    Some(b' ') => {
                        lexer.advance();
                    }
                    _ => return Err(lexer.error("unterminated address list")),
                }
            }
            Ok(addresses)
        }
        token => Err(lexer.error(format!("expected address list, got {token:?}"))),
    }
}

fn parse_address(lexer: &mut Lexer<'_>) -> Result<Address> {
    lexer.expect(Token::LParen)?;
    let name = lexer.read_nstring()?;
    lexer.expect_space()?;
    let adl = lexer.read_nstring()?;
    lexer.expect_space()?;
    let mailbox = lexer.read_nstring()?;
    lexer.expect_space()?;
    let host = lexer.read_nstring()?;
    lexer.expect(Token::RParen)?;
    Ok(Address {
        name,
        adl,
        mailbox,
        host,
    })
}

/// Parses a BODY or BODYSTRUCTURE value.
///
/// Extension data after the basic fields (MD5, disposition, language,
/// location) is skipped.
pub fn parse_body_structure(lexer: &mut Lexer<'_>) -> Result<BodyStructure> {
    lexer.expect(Token::LParen)?;

    if lexer.peek() == Some(b'(') {
        let mut bodies = Vec::new();
        while lexer.peek() == Some(b'(') {
            bodies.push(parse_body_structure(lexer)?);
            lexer.eat_space();
        }
        let subtype = lexer.read_nstring()?.unwrap_or_default().to_ascii_uppercase();
        skip_extensions(lexer)?;
        return Ok(BodyStructure::Multipart { bodies, subtype });
    }

    let media_type = lexer.read_nstring()?.unwrap_or_default().to_ascii_uppercase();
    lexer.expect_space()?;
    let media_subtype = lexer.read_nstring()?.unwrap_or_default().to_ascii_uppercase();
    lexer.expect_space()?;
    let fields = parse_body_fields(lexer)?;

    let body = match (media_type.as_str(), media_subtype.as_str()) {
        ("TEXT", _) => {
            lexer.expect_space()?;
            let lines = lexer.read_number()?;
            BodyStructure::Text {
                subtype: media_subtype,
                fields,
                lines,
            }
        }
        ("MESSAGE", "RFC822") => {
            lexer.expect_space()?;
            let envelope = Box::new(parse_envelope(lexer)?);
            lexer.expect_space()?;
            let body = Box::new(parse_body_structure(lexer)?);
            lexer.expect_space()?;
            let lines = lexer.read_number()?;
            BodyStructure::Message {
                fields,
                envelope,
                body,
                lines,
            }
        }
        _ => BodyStructure::Basic {
            media_type,
            media_subtype,
            fields,
        },
    };

    skip_extensions(lexer)?;
    Ok(body)
}

fn parse_body_fields(lexer: &mut Lexer<'_>) -> Result<BodyFields> {
    let params = parse_body_params(lexer)?;
    lexer.expect_space()?;
    let id = lexer.read_nstring()?;
    lexer.expect_space()?;
    let description = lexer.read_nstring()?;
    lexer.expect_space()?;
    let encoding = lexer.read_nstring()?.unwrap_or_default();
    lexer.expect_space()?;
    let size = lexer.read_number()?;
    Ok(BodyFields {
        params,
        id,
        description,
        encoding,
        size,
    })
}

fn parse_body_params(lexer: &mut Lexer<'_>) -> Result<Vec<(String, String)>> {
    match lexer.next_token()? {
        Token::Nil => Ok(Vec::new()),
        Token::LParen => {
            let mut params = Vec::new();
            while lexer.peek() != Some(b')') {
                let key = lexer.read_nstring()?.unwrap_or_default();
                lexer.expect_space()?;
                let value = lexer.read_nstring()?.unwrap_or_default();
                params.push((key, value));
                lexer.eat_space();
            }
            lexer.expect(Token::RParen)?;
            Ok(params)
        }
        token => Err(lexer.error(format!("expected body parameters, got {token:?}"))),
    }
}

/// Skips everything up to and including the `)` closing the current part.
fn skip_extensions(lexer: &mut Lexer<'_>) -> Result<()> {
    skip_parenthesized(lexer)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::too_many_lines)]
mod tests {
    use super::*;
    use crate::types::Flag;

    fn parse(input: &[u8]) -> Vec<FetchItem> {
        parse_fetch_response(&mut Lexer::new(input)).unwrap()
    }

    #[test]
    fn flags_uid_and_size() {
        let items = parse(b"(FLAGS (\\Seen) UID 4827 RFC822.SIZE 44827)");
        assert_eq!(items.len(), 3);
        assert!(matches!(&items[0], FetchItem::Flags(f) if f.contains(&Flag::Seen)));
        assert_eq!(items[1], FetchItem::Uid(Uid::new(4827).unwrap()));
        assert_eq!(items[2], FetchItem::Rfc822Size(44827));
    }

    #[test]
    fn internaldate_with_space_padded_day() {
        let items = parse(b"(INTERNALDATE \" 1-Jul-2015 09:41:07 +0200\")");
        let FetchItem::InternalDate(date) = &items[0] else {
            panic!("expected INTERNALDATE, got {items:?}");
        };
        assert_eq!(date.to_rfc3339(), "2015-07-01T09:41:07+02:00");
    }

    #[test]
    fn invalid_internaldate_is_malformed() {
        let result = parse_fetch_response(&mut Lexer::new(b"(INTERNALDATE \"tomorrow\")"));
        assert!(matches!(result, Err(crate::Error::MalformedResponse { .. })));
    }

    #[test]
    fn envelope_with_nil_address_lists() {
        let items = parse(
            b"(ENVELOPE (\"Wed, 17 Jul 1996 02:23:25 -0700 (PDT)\" \"IMAP4rev1 WG mtg summary\" \
((\"Terry Gray\" NIL \"gray\" \"cac.washington.edu\")) NIL NIL \
((NIL NIL \"imap\" \"cac.washington.edu\")) NIL NIL NIL \"<B27397-0100000@cac.washington.edu>\"))",
        );
        let FetchItem::Envelope(envelope) = &items[0] else {
            panic!("expected ENVELOPE");
        };
        assert_eq!(envelope.subject.as_deref(), Some("IMAP4rev1 WG mtg summary"));
        assert_eq!(envelope.from[0].email().as_deref(), Some("gray@cac.washington.edu"));
        assert!(envelope.sender.is_empty());
        assert!(envelope.reply_to.is_empty());
        assert!(envelope.cc.is_empty());
        assert_eq!(envelope.to.len(), 1);
        assert!(envelope.parsed_date().is_some());
        assert_eq!(
            envelope.message_id.as_deref(),
            Some("<B27397-0100000@cac.washington.edu>")
        );
    }

    #[test]
    fn body_section_literal() {
        let items = parse(b"(BODY[HEADER] {23}\r\nSubject: hi\r\nX-A: b\r\n\r\n)");
        assert_eq!(
            items[0],
            FetchItem::Body {
                section: Some("HEADER".into()),
                origin: None,
                data: Some(b"Subject: hi\r\nX-A: b\r\n\r\n".to_vec()),
            }
        );
    }

    #[test]
    fn body_section_with_origin_and_fields() {
        let items = parse(b"(BODY[HEADER.FIELDS (SUBJECT)]<0> \"Subject: x\")");
        assert_eq!(
            items[0],
            FetchItem::Body {
                section: Some("HEADER.FIELDS (SUBJECT)".into()),
                origin: Some(0),
                data: Some(b"Subject: x".to_vec()),
            }
        );
    }

    #[test]
    fn whole_message_section_is_none() {
        let items = parse(b"(BODY[] NIL RFC822.TEXT {2}\r\nhi)");
        assert_eq!(
            items[0],
            FetchItem::Body {
                section: None,
                origin: None,
                data: None,
            }
        );
        assert_eq!(
            items[1],
            FetchItem::Body {
                section: Some("TEXT".into()),
                origin: None,
                data: Some(b"hi".to_vec()),
            }
        );
    }

    #[test]
    fn single_part_bodystructure() {
        let items = parse(
            b"(BODYSTRUCTURE (\"TEXT\" \"PLAIN\" (\"CHARSET\" \"US-ASCII\") NIL NIL \"7BIT\" 3028 92))",
        );
        let FetchItem::BodyStructure(BodyStructure::Text {
            subtype,
            fields,
            lines,
        }) = &items[0]
        else {
            panic!("expected text body, got {items:?}");
        };
        assert_eq!(subtype, "PLAIN");
        assert_eq!(fields.params, vec![("CHARSET".into(), "US-ASCII".into())]);
        assert_eq!(fields.size, 3028);
        assert_eq!(*lines, 92);
    }

    #[test]
    fn multipart_bodystructure_with_extensions() {
        let items = parse(
            b"(BODYSTRUCTURE ((\"TEXT\" \"PLAIN\" (\"CHARSET\" \"UTF-8\") NIL NIL \"QUOTED-PRINTABLE\" 120 4 NIL NIL NIL) \
(\"APPLICATION\" \"PDF\" (\"NAME\" \"a.pdf\") NIL NIL \"BASE64\" 4096 NIL (\"ATTACHMENT\" (\"FILENAME\" \"a.pdf\")) NIL) \
\"MIXED\" (\"BOUNDARY\" \"xyz\") NIL NIL))",
        );
        let FetchItem::BodyStructure(BodyStructure::Multipart { bodies, subtype }) = &items[0]
        else {
            panic!("expected multipart, got {items:?}");
        };
        assert_eq!(subtype, "MIXED");
        assert_eq!(bodies.len(), 2);
        assert!(matches!(
            &bodies[1],
            BodyStructure::Basic { media_type, fields, .. } if media_type == "APPLICATION" && fields.size == 4096
        ));
    }

    #[test]
    fn non_extensible_body_form() {
        let items = parse(b"(BODY (\"TEXT\" \"HTML\" NIL NIL NIL \"8BIT\" 10 1) UID 9)");
        assert!(matches!(
            items[0],
            FetchItem::BodyStructure(BodyStructure::Text { .. })
        ));
        assert_eq!(items[1], FetchItem::Uid(Uid::new(9).unwrap()));
    }

    #[test]
    fn unknown_items_are_skipped() {
        let items = parse(b"(X-GM-MSGID 1278455344230334865 X-GM-LABELS (\\Inbox \"Work\") UID 3)");
        assert_eq!(items, vec![FetchItem::Uid(Uid::new(3).unwrap())]);
    }
}
