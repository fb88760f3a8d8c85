//! Parses the wire form of a command back into a [`Command`].
//!
//! Recognized are the commands whose responses need a dedicated builder
//! (LIST, LSUB, FETCH, SEARCH and STORE with their UID forms) and the ones
//! that move the connection between states (LOGIN, SELECT, EXAMINE, CLOSE,
//! UNSELECT and LOGOUT), plus the other argument-free and single-mailbox
//! commands.

use chrono::NaiveDate;

use crate::parser::lexer::{Lexer, Token};
use crate::parser::response::parse_flag_list;
use crate::types::{Flag, Mailbox, SequenceSet};
use crate::Result;

use super::{Command, FetchAttribute, FetchItems, SearchKey, StoreAction};

impl Command {
    /// Parses a command line without its tag, e.g. `UID FETCH 1:* (FLAGS)`.
    ///
    /// String arguments may be quoted strings or literals (`{N}\r\n` followed
    /// by the data). Mailbox patterns are decoded from modified UTF-7.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::MalformedResponse`] with the byte offset when the
    /// line is not a well-formed command of a recognized kind.
    pub fn parse_line(line: &str) -> Result<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut lexer = Lexer::new(line.as_bytes());

        let mut verb = word(&mut lexer)?.to_ascii_uppercase();
        let uid = verb == "UID";
        if uid {
            lexer.expect_space()?;
            verb = word(&mut lexer)?.to_ascii_uppercase();
        }

        let command = match (verb.as_str(), uid) {
            ("CAPABILITY", false) => Self::Capability,
            ("NOOP", false) => Self::Noop,
            ("LOGOUT", false) => Self::Logout,
            ("CLOSE", false) => Self::Close,
            ("UNSELECT", false) => Self::Unselect,
            ("EXPUNGE", false) => Self::Expunge,
            _ => {
                lexer.expect_space()?;
                arguments(&mut lexer, &verb, uid)?
            }
        };

        if !lexer.is_eof() {
            return Err(lexer.error("trailing characters after command"));
        }
        Ok(command)
    }
}

/// Parses what follows the verb of a command that takes arguments.
fn arguments(lexer: &mut Lexer<'_>, verb: &str, uid: bool) -> Result<Command> {
    let command = match (verb, uid) {
        ("LOGIN", false) => {
            let username = string(lexer)?;
            lexer.expect_space()?;
            let password = string(lexer)?;
            Command::Login { username, password }
        }
        ("SELECT", false) => Command::Select {
            mailbox: mailbox(lexer)?,
        },
        ("EXAMINE", false) => Command::Examine {
            mailbox: mailbox(lexer)?,
        },
        ("CREATE", false) => Command::Create {
            mailbox: mailbox(lexer)?,
        },
        ("DELETE", false) => Command::Delete {
            mailbox: mailbox(lexer)?,
        },
        ("LIST" | "LSUB", false) => {
            let reference = mailbox_pattern(lexer)?;
            lexer.expect_space()?;
            let pattern = mailbox_pattern(lexer)?;
            if verb == "LIST" {
                Command::List { reference, pattern }
            } else {
                Command::Lsub { reference, pattern }
            }
        }
        ("FETCH", _) => {
            let sequence = sequence_set(lexer)?;
            lexer.expect_space()?;
            let items = fetch_items(lexer)?;
            Command::Fetch {
                sequence,
                items,
                uid,
            }
        }
        ("SEARCH", _) => Command::Search {
            criteria: search_keys(lexer)?,
            uid,
        },
        ("STORE", _) => {
            let sequence = sequence_set(lexer)?;
            lexer.expect_space()?;
            let (action, silent) = store_action(lexer)?;
            Command::Store {
                sequence,
                action,
                uid,
                silent,
            }
        }
        _ => return Err(lexer.error(format!("unsupported command {verb}"))),
    };
    Ok(command)
}

/// Reads bytes up to a space, `)` or the end of the line.
fn word<'a>(lexer: &mut Lexer<'a>) -> Result<&'a str> {
    let rest = lexer.remaining();
    let len = rest
        .iter()
        .position(|b| matches!(b, b' ' | b')' | b'\r' | b'\n'))
        .unwrap_or(rest.len());
    if len == 0 {
        return Err(lexer.error("expected a word"));
    }
    let text = std::str::from_utf8(&rest[..len]).map_err(|_| lexer.error("invalid UTF-8"))?;
    lexer.skip(len);
    Ok(text)
}

/// Reads a string argument: quoted, literal, or a bare word.
fn string(lexer: &mut Lexer<'_>) -> Result<String> {
    match lexer.peek() {
        Some(b'"' | b'{') => lexer.read_astring(),
        _ => word(lexer).map(str::to_string),
    }
}

fn mailbox(lexer: &mut Lexer<'_>) -> Result<Mailbox> {
    string(lexer).map(|raw| Mailbox::from_wire(&raw))
}

fn mailbox_pattern(lexer: &mut Lexer<'_>) -> Result<String> {
    let raw = string(lexer)?;
    Ok(crate::utf7::decode(&raw).unwrap_or(raw))
}

fn sequence_set(lexer: &mut Lexer<'_>) -> Result<SequenceSet> {
    let text = word(lexer)?;
    SequenceSet::parse(text).ok_or_else(|| lexer.error(format!("invalid sequence set {text}")))
}

fn fetch_items(lexer: &mut Lexer<'_>) -> Result<FetchItems> {
    if lexer.peek() == Some(b'(') {
        lexer.advance();
        let mut attrs = Vec::new();
        loop {
            match lexer.peek() {
                Some(b')') => {
                    lexer.advance();
                    break;
                }
                Some(b' ') => {
                    lexer.advance();
                }
                Some(_) => attrs.push(fetch_attribute(lexer)?),
                None => return Err(lexer.error("unterminated fetch item list")),
            }
        }
        return Ok(FetchItems::Items(attrs));
    }

    let name = item_name(lexer)?;
    Ok(match name.to_ascii_uppercase().as_str() {
        "ALL" => FetchItems::All,
        "FAST" => FetchItems::Fast,
        "FULL" => FetchItems::Full,
        _ => FetchItems::Items(vec![fetch_attribute_named(lexer, name)?]),
    })
}

/// Reads a fetch item name, stopping before `[`.
fn item_name<'a>(lexer: &mut Lexer<'a>) -> Result<&'a str> {
    let rest = lexer.remaining();
    let len = rest
        .iter()
        .position(|b| matches!(b, b' ' | b')' | b'[' | b'\r' | b'\n'))
        .unwrap_or(rest.len());
    if len == 0 {
        return Err(lexer.error("expected a fetch item"));
    }
    let text = std::str::from_utf8(&rest[..len]).map_err(|_| lexer.error("invalid UTF-8"))?;
    lexer.skip(len);
    Ok(text)
}

fn fetch_attribute(lexer: &mut Lexer<'_>) -> Result<FetchAttribute> {
    let name = item_name(lexer)?;
    fetch_attribute_named(lexer, name)
}

fn fetch_attribute_named(lexer: &mut Lexer<'_>, name: &str) -> Result<FetchAttribute> {
    let upper = name.to_ascii_uppercase();
    Ok(match upper.as_str() {
        "FLAGS" => FetchAttribute::Flags,
        "INTERNALDATE" => FetchAttribute::InternalDate,
        "RFC822.SIZE" => FetchAttribute::Rfc822Size,
        "ENVELOPE" => FetchAttribute::Envelope,
        "BODYSTRUCTURE" => FetchAttribute::BodyStructure,
        "UID" => FetchAttribute::Uid,
        "RFC822" => FetchAttribute::Rfc822,
        "RFC822.HEADER" => FetchAttribute::Rfc822Header,
        "RFC822.TEXT" => FetchAttribute::Rfc822Text,
        "BODY" | "BODY.PEEK" if lexer.peek() == Some(b'[') => {
            lexer.advance();
            let section = lexer.read_until(b']')?;
            lexer.advance();
            let partial = if lexer.peek() == Some(b'<') {
                lexer.advance();
                let range = lexer.read_until(b'>')?;
                lexer.advance();
                let parsed = range
                    .split_once('.')
                    .and_then(|(o, l)| Some((o.parse().ok()?, l.parse().ok()?)));
                Some(parsed.ok_or_else(|| lexer.error(format!("invalid partial <{range}>")))?)
            } else {
                None
            };
            FetchAttribute::BodySection {
                section: (!section.is_empty()).then(|| section.to_string()),
                peek: upper == "BODY.PEEK",
                partial,
            }
        }
        "BODY" => FetchAttribute::Body,
        _ => return Err(lexer.error(format!("unknown fetch item {name}"))),
    })
}

fn store_action(lexer: &mut Lexer<'_>) -> Result<(StoreAction, bool)> {
    let item = word(lexer)?.to_ascii_uppercase();
    let (name, silent) = item
        .strip_suffix(".SILENT")
        .map_or((item.as_str(), false), |name| (name, true));
    lexer.expect_space()?;

    let flags: Vec<Flag> = if lexer.peek() == Some(b'(') {
        parse_flag_list(lexer)?.into_iter().collect()
    } else {
        let mut flags = vec![Flag::parse(word(lexer)?)];
        while lexer.eat_space() {
            flags.push(Flag::parse(word(lexer)?));
        }
        flags
    };

    let action = match name {
        "FLAGS" => StoreAction::SetFlags(flags),
        "+FLAGS" => StoreAction::AddFlags(flags),
        "-FLAGS" => StoreAction::RemoveFlags(flags),
        _ => return Err(lexer.error(format!("unknown store item {item}"))),
    };
    Ok((action, silent))
}

/// Parses the whole key list of a SEARCH command.
fn search_keys(lexer: &mut Lexer<'_>) -> Result<SearchKey> {
    let mut keys = vec![search_key(lexer)?];
    while lexer.eat_space() {
        keys.push(search_key(lexer)?);
    }
    Ok(collapse(keys))
}

fn collapse(mut keys: Vec<SearchKey>) -> SearchKey {
    if keys.len() == 1 {
        keys.remove(0)
    } else {
        SearchKey::And(keys)
    }
}

fn search_key(lexer: &mut Lexer<'_>) -> Result<SearchKey> {
    if lexer.peek() == Some(b'(') {
        lexer.advance();
        let mut keys = vec![search_key(lexer)?];
        while lexer.eat_space() {
            keys.push(search_key(lexer)?);
        }
        lexer.expect(Token::RParen)?;
        return Ok(SearchKey::And(keys));
    }

    let name = word(lexer)?;
    let key = match name.to_ascii_uppercase().as_str() {
        "ALL" => SearchKey::All,
        "ANSWERED" => SearchKey::Answered,
        "DELETED" => SearchKey::Deleted,
        "DRAFT" => SearchKey::Draft,
        "FLAGGED" => SearchKey::Flagged,
        "NEW" => SearchKey::New,
        "OLD" => SearchKey::Old,
        "RECENT" => SearchKey::Recent,
        "SEEN" => SearchKey::Seen,
        "UNANSWERED" => SearchKey::Unanswered,
        "UNDELETED" => SearchKey::Undeleted,
        "UNDRAFT" => SearchKey::Undraft,
        "UNFLAGGED" => SearchKey::Unflagged,
        "UNSEEN" => SearchKey::Unseen,
        "KEYWORD" => SearchKey::Keyword(argument(lexer, word)?.to_string()),
        "UNKEYWORD" => SearchKey::Unkeyword(argument(lexer, word)?.to_string()),
        "BCC" => SearchKey::Bcc(argument(lexer, string)?),
        "BODY" => SearchKey::Body(argument(lexer, string)?),
        "CC" => SearchKey::Cc(argument(lexer, string)?),
        "FROM" => SearchKey::From(argument(lexer, string)?),
        "SUBJECT" => SearchKey::Subject(argument(lexer, string)?),
        "TEXT" => SearchKey::Text(argument(lexer, string)?),
        "TO" => SearchKey::To(argument(lexer, string)?),
        "HEADER" => {
            let field = argument(lexer, string)?;
            SearchKey::Header(field, argument(lexer, string)?)
        }
        "BEFORE" => SearchKey::Before(argument(lexer, date)?),
        "ON" => SearchKey::On(argument(lexer, date)?),
        "SINCE" => SearchKey::Since(argument(lexer, date)?),
        "SENTBEFORE" => SearchKey::SentBefore(argument(lexer, date)?),
        "SENTON" => SearchKey::SentOn(argument(lexer, date)?),
        "SENTSINCE" => SearchKey::SentSince(argument(lexer, date)?),
        "LARGER" => SearchKey::Larger(argument(lexer, number)?),
        "SMALLER" => SearchKey::Smaller(argument(lexer, number)?),
        "UID" => SearchKey::Uid(argument(lexer, sequence_set)?),
        "NOT" => SearchKey::Not(Box::new(argument(lexer, search_key)?)),
        "OR" => {
            let a = argument(lexer, search_key)?;
            let b = argument(lexer, search_key)?;
            SearchKey::Or(Box::new(a), Box::new(b))
        }
        _ => SearchKey::SequenceSet(
            SequenceSet::parse(name)
                .ok_or_else(|| lexer.error(format!("unknown search key {name}")))?,
        ),
    };
    Ok(key)
}

/// Reads `SP value`.
fn argument<'a, T>(
    lexer: &mut Lexer<'a>,
    read: impl FnOnce(&mut Lexer<'a>) -> Result<T>,
) -> Result<T> {
    lexer.expect_space()?;
    read(lexer)
}

fn date(lexer: &mut Lexer<'_>) -> Result<NaiveDate> {
    let text = string(lexer)?;
    NaiveDate::parse_from_str(&text, "%d-%b-%Y")
        .map_err(|_| lexer.error(format!("invalid date {text}")))
}

fn number(lexer: &mut Lexer<'_>) -> Result<u32> {
    let text = word(lexer)?;
    text.parse()
        .map_err(|_| lexer.error(format!("invalid number {text}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Tag;
    use proptest::prelude::*;

    mod parse_tests {
        use super::*;

        #[test]
        fn list_with_bare_wildcard() {
            assert_eq!(
                Command::parse_line("LIST \"\" *").unwrap(),
                Command::List {
                    reference: String::new(),
                    pattern: "*".into()
                }
            );
        }

        #[test]
        fn lsub_decodes_pattern() {
            assert_eq!(
                Command::parse_line("lsub \"\" \"&ZeVnLIqe-/%\"").unwrap(),
                Command::Lsub {
                    reference: String::new(),
                    pattern: "日本語/%".into()
                }
            );
        }

        #[test]
        fn uid_fetch_with_sections() {
            let cmd =
                Command::parse_line("UID FETCH 1:4,9 (UID BODY.PEEK[HEADER.FIELDS (SUBJECT)]<0.512> FLAGS)")
                    .unwrap();
            assert_eq!(
                cmd,
                Command::Fetch {
                    sequence: SequenceSet::parse("1:4,9").unwrap(),
                    items: FetchItems::Items(vec![
                        FetchAttribute::Uid,
                        FetchAttribute::BodySection {
                            section: Some("HEADER.FIELDS (SUBJECT)".into()),
                            peek: true,
                            partial: Some((0, 512)),
                        },
                        FetchAttribute::Flags,
                    ]),
                    uid: true,
                }
            );
        }

        #[test]
        fn fetch_macro_and_single_item() {
            assert!(matches!(
                Command::parse_line("FETCH 1:* FAST").unwrap(),
                Command::Fetch {
                    items: FetchItems::Fast,
                    uid: false,
                    ..
                }
            ));
            assert!(matches!(
                Command::parse_line("FETCH 3 BODY[]").unwrap(),
                Command::Fetch { items: FetchItems::Items(items), .. }
                    if items == vec![FetchAttribute::BodySection { section: None, peek: false, partial: None }]
            ));
        }

        #[test]
        fn search_tree() {
            let cmd = Command::parse_line(
                "UID SEARCH OR (SINCE 1-Feb-2024 BEFORE 1-Mar-2024) FROM \"bob\" NOT SEEN",
            )
            .unwrap();
            let expected = SearchKey::And(vec![
                SearchKey::Or(
                    Box::new(SearchKey::between(
                        NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
                        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                    )),
                    Box::new(SearchKey::From("bob".into())),
                ),
                SearchKey::Not(Box::new(SearchKey::Seen)),
            ]);
            assert_eq!(
                cmd,
                Command::Search {
                    criteria: expected,
                    uid: true
                }
            );
        }

        #[test]
        fn search_literal_argument() {
            assert_eq!(
                Command::parse_line("SEARCH SUBJECT {5}\r\nh\"llo").unwrap(),
                Command::Search {
                    criteria: SearchKey::Subject("h\"llo".into()),
                    uid: false
                }
            );
        }

        #[test]
        fn store_forms() {
            assert_eq!(
                Command::parse_line("STORE 2:4 +FLAGS.SILENT (\\Deleted $Junk)").unwrap(),
                Command::Store {
                    sequence: SequenceSet::range(2, 4),
                    action: StoreAction::AddFlags(vec![
                        Flag::Deleted,
                        Flag::Keyword("$Junk".into())
                    ]),
                    uid: false,
                    silent: true,
                }
            );
            assert_eq!(
                Command::parse_line("UID STORE 7 FLAGS \\Seen").unwrap(),
                Command::Store {
                    sequence: SequenceSet::single(7),
                    action: StoreAction::SetFlags(vec![Flag::Seen]),
                    uid: true,
                    silent: false,
                }
            );
        }

        #[test]
        fn state_changing_commands() {
            assert_eq!(
                Command::parse_line("select INBOX").unwrap(),
                Command::Select {
                    mailbox: Mailbox::inbox()
                }
            );
            assert_eq!(
                Command::parse_line("EXAMINE \"&ZeVnLIqe-\"").unwrap(),
                Command::Examine {
                    mailbox: Mailbox::new("日本語")
                }
            );
            assert_eq!(
                Command::parse_line("LOGIN user \"p w\"").unwrap(),
                Command::Login {
                    username: "user".into(),
                    password: "p w".into()
                }
            );
            assert_eq!(Command::parse_line("CLOSE").unwrap(), Command::Close);
            assert_eq!(Command::parse_line("unselect").unwrap(), Command::Unselect);
            assert_eq!(Command::parse_line("LOGOUT\r\n").unwrap(), Command::Logout);
            assert_eq!(Command::parse_line("NOOP").unwrap(), Command::Noop);
        }

        #[test]
        fn rejects_other_commands() {
            assert!(Command::parse_line("IDLE").is_err());
            assert!(Command::parse_line("RENAME a b").is_err());
            assert!(Command::parse_line("CLOSE now").is_err());
            assert!(Command::parse_line("UID SELECT INBOX").is_err());
            assert!(Command::parse_line("UID LIST \"\" *").is_err());
            assert!(Command::parse_line("FETCH 0 FLAGS").is_err());
            assert!(Command::parse_line("FETCH 1 (FLAGS) junk").is_err());
        }
    }

    fn text() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9 {}\"\\\\é]{0,12}"
    }

    fn sequence() -> impl Strategy<Value = SequenceSet> {
        prop_oneof![
            (1u32..5000).prop_map(SequenceSet::single),
            (1u32..5000, 1u32..5000).prop_map(|(a, b)| SequenceSet::range(a, b)),
            (1u32..5000).prop_map(SequenceSet::starting_at),
        ]
    }

    fn flags() -> impl Strategy<Value = Vec<Flag>> {
        prop::collection::btree_set(
            prop_oneof![
                Just(Flag::Seen),
                Just(Flag::Flagged),
                Just(Flag::Deleted),
                "[a-z$]{1,8}".prop_map(Flag::Keyword),
            ],
            1..4,
        )
        .prop_map(|set| set.into_iter().collect())
    }

    fn fetch_attribute() -> impl Strategy<Value = FetchAttribute> {
        prop_oneof![
            Just(FetchAttribute::Flags),
            Just(FetchAttribute::Uid),
            Just(FetchAttribute::Envelope),
            Just(FetchAttribute::InternalDate),
            Just(FetchAttribute::Rfc822Size),
            Just(FetchAttribute::BodyStructure),
            (
                prop::option::of(prop_oneof![Just("HEADER"), Just("TEXT"), Just("1.2")]),
                any::<bool>(),
                prop::option::of((0u32..1000, 1u32..1000))
            )
                .prop_map(|(section, peek, partial)| FetchAttribute::BodySection {
                    section: section.map(str::to_string),
                    peek,
                    partial,
                }),
        ]
    }

    fn simple_key() -> impl Strategy<Value = SearchKey> {
        let date = (2000i32..2030, 1u32..13, 1u32..29)
            .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap());
        prop_oneof![
            Just(SearchKey::All),
            Just(SearchKey::Unseen),
            Just(SearchKey::Flagged),
            text().prop_map(SearchKey::Subject),
            text().prop_map(SearchKey::From),
            (text(), text()).prop_map(|(f, v)| SearchKey::Header(f, v)),
            date.clone().prop_map(SearchKey::Since),
            date.prop_map(SearchKey::Before),
            (1u32..100_000).prop_map(SearchKey::Larger),
            sequence().prop_map(SearchKey::Uid),
        ]
    }

    fn search_key() -> impl Strategy<Value = SearchKey> {
        simple_key().prop_recursive(3, 12, 3, |inner| {
            prop_oneof![
                inner.clone().prop_map(|k| SearchKey::Not(Box::new(k))),
                (inner.clone(), inner.clone())
                    .prop_map(|(a, b)| SearchKey::Or(Box::new(a), Box::new(b))),
                prop::collection::vec(inner, 2..4).prop_map(SearchKey::And),
            ]
        })
    }

    fn command() -> impl Strategy<Value = Command> {
        prop_oneof![
            (text(), text()).prop_map(|(reference, pattern)| Command::List { reference, pattern }),
            (
                sequence(),
                prop::collection::vec(fetch_attribute(), 1..4),
                any::<bool>()
            )
                .prop_map(|(sequence, attrs, uid)| Command::Fetch {
                    sequence,
                    items: FetchItems::Items(attrs),
                    uid,
                }),
            (search_key(), any::<bool>()).prop_map(|(criteria, uid)| Command::Search {
                criteria: collapse(match criteria {
                    SearchKey::And(keys) => keys,
                    key => vec![key],
                }),
                uid,
            }),
            (sequence(), flags(), 0u8..3, any::<bool>(), any::<bool>()).prop_map(
                |(sequence, flags, op, uid, silent)| Command::Store {
                    sequence,
                    action: match op {
                        0 => StoreAction::SetFlags(flags),
                        1 => StoreAction::AddFlags(flags),
                        _ => StoreAction::RemoveFlags(flags),
                    },
                    uid,
                    silent,
                }
            ),
        ]
    }

    proptest! {
        #[test]
        fn encode_then_parse_is_identity(cmd in command()) {
            let wire = cmd.encode(&Tag::new("A0001")).unwrap().to_bytes();
            let wire = String::from_utf8(wire).unwrap();
            let line = wire.strip_prefix("A0001 ").unwrap();
            prop_assert_eq!(Command::parse_line(line).unwrap(), cmd);
        }
    }
}
