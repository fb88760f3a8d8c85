//! Command serialization helpers.

use std::collections::VecDeque;

use chrono::{DateTime, FixedOffset, NaiveDate};

use crate::types::{Flag, Mailbox, SequenceSet};
use crate::{Error, Result};

use super::types::{FetchAttribute, FetchItems, SearchKey, StatusAttribute, StoreAction};

/// Strings longer than this are always sent as literals.
pub const MAX_QUOTED_LEN: usize = 1024;

/// A command in wire form, split at synchronizing literals.
///
/// Every segment except the last ends with `{N}\r\n`. The writer sends the
/// first segment, then waits for a continuation request before each of the
/// following ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedCommand {
    pub(crate) segments: Vec<Vec<u8>>,
    pub(crate) summary: String,
}

impl EncodedCommand {
    /// Returns the wire segments.
    #[must_use]
    pub fn segments(&self) -> &[Vec<u8>] {
        &self.segments
    }

    /// Returns a loggable form of the command, with secrets redacted.
    #[must_use]
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Returns every segment concatenated, as it appears on the wire.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.segments.concat()
    }

    /// Splits off the segment written immediately, leaving those that wait
    /// for a continuation request.
    pub(crate) fn split_first(self) -> Result<(Vec<u8>, VecDeque<Vec<u8>>)> {
        let mut segments = VecDeque::from(self.segments);
        let first = segments.pop_front().ok_or_else(|| {
            Error::ProtocolMismatch(format!("{} encoded to no bytes", self.summary))
        })?;
        Ok((first, segments))
    }
}

/// Accumulates command bytes and cuts a new segment at each literal.
#[derive(Debug, Default)]
pub struct CommandWriter {
    segments: Vec<Vec<u8>>,
    current: Vec<u8>,
}

impl CommandWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes bytes verbatim.
    pub fn raw(&mut self, bytes: &[u8]) {
        self.current.extend_from_slice(bytes);
    }

    pub fn space(&mut self) {
        self.current.push(b' ');
    }

    /// Writes a string as a quoted string, or as a literal if quoting
    /// cannot represent it.
    pub fn string(&mut self, value: &[u8]) {
        if needs_literal(value) {
            self.literal(value);
        } else {
            self.current.push(b'"');
            self.current.extend_from_slice(value);
            self.current.push(b'"');
        }
    }

    /// Writes a synchronizing literal and starts a new segment with its data.
    pub fn literal(&mut self, data: &[u8]) {
        self.current
            .extend_from_slice(format!("{{{}}}\r\n", data.len()).as_bytes());
        self.segments.push(std::mem::take(&mut self.current));
        self.current.extend_from_slice(data);
    }

    /// Ends the current line and waits for a continuation before the next.
    pub fn line_break(&mut self) {
        self.current.extend_from_slice(b"\r\n");
        self.segments.push(std::mem::take(&mut self.current));
    }

    pub fn mailbox(&mut self, mailbox: &Mailbox) {
        self.string(mailbox.encoded().as_bytes());
    }

    pub fn flags(&mut self, flags: &[Flag]) {
        self.current.push(b'(');
        for (i, flag) in flags.iter().enumerate() {
            if i > 0 {
                self.space();
            }
            self.raw(flag.as_str().as_bytes());
        }
        self.current.push(b')');
    }

    pub fn sequence(&mut self, set: &SequenceSet) {
        self.raw(set.to_string().as_bytes());
    }

    /// Writes a search date as `d-Mon-yyyy`.
    pub fn date(&mut self, date: NaiveDate) {
        self.raw(date.format("%-d-%b-%Y").to_string().as_bytes());
    }

    /// Writes an APPEND date-time as a quoted `dd-Mon-yyyy hh:mm:ss +zzzz`.
    pub fn date_time(&mut self, date: &DateTime<FixedOffset>) {
        self.string(date.format("%d-%b-%Y %H:%M:%S %z").to_string().as_bytes());
    }

    /// Terminates the command and returns its segments.
    pub fn finish(mut self) -> Vec<Vec<u8>> {
        self.current.extend_from_slice(b"\r\n");
        self.segments.push(self.current);
        self.segments
    }
}

/// Returns true if the value cannot be sent as a quoted string.
pub fn needs_literal(value: &[u8]) -> bool {
    value.len() > MAX_QUOTED_LEN
        || value
            .iter()
            .any(|&b| b < 0x20 || b >= 0x7F || matches!(b, b'{' | b'"' | b'\\'))
}

/// Writes FETCH items.
pub fn write_fetch_items(w: &mut CommandWriter, items: &FetchItems) -> Result<()> {
    match items {
        FetchItems::All => w.raw(b"ALL"),
        FetchItems::Full => w.raw(b"FULL"),
        FetchItems::Fast => w.raw(b"FAST"),
        FetchItems::Items(attrs) => {
            w.raw(b"(");
            for (i, attr) in attrs.iter().enumerate() {
                if i > 0 {
                    w.space();
                }
                write_fetch_attribute(w, attr)?;
            }
            w.raw(b")");
        }
    }
    Ok(())
}

fn write_fetch_attribute(w: &mut CommandWriter, attr: &FetchAttribute) -> Result<()> {
    match attr {
        FetchAttribute::Flags => w.raw(b"FLAGS"),
        FetchAttribute::InternalDate => w.raw(b"INTERNALDATE"),
        FetchAttribute::Rfc822Size => w.raw(b"RFC822.SIZE"),
        FetchAttribute::Envelope => w.raw(b"ENVELOPE"),
        FetchAttribute::BodyStructure => w.raw(b"BODYSTRUCTURE"),
        FetchAttribute::Uid => w.raw(b"UID"),
        FetchAttribute::Rfc822 => w.raw(b"RFC822"),
        FetchAttribute::Rfc822Header => w.raw(b"RFC822.HEADER"),
        FetchAttribute::Rfc822Text => w.raw(b"RFC822.TEXT"),
        FetchAttribute::Body => return Err(Error::UnknownFetchItemType("BODY".to_string())),
        FetchAttribute::BodySection {
            section,
            peek,
            partial,
        } => {
            w.raw(if *peek { &b"BODY.PEEK["[..] } else { b"BODY[" });
            if let Some(section) = section {
                w.raw(section.as_bytes());
            }
            w.raw(b"]");
            if let Some((origin, len)) = partial {
                w.raw(format!("<{origin}.{len}>").as_bytes());
            }
        }
    }
    Ok(())
}

/// Writes a STORE data item and its flags.
pub fn write_store_action(w: &mut CommandWriter, action: &StoreAction, silent: bool) {
    w.raw(action.item_name().as_bytes());
    if silent {
        w.raw(b".SILENT");
    }
    w.space();
    w.flags(action.flags());
}

/// Writes a STATUS attribute list.
pub fn write_status_items(w: &mut CommandWriter, items: &[StatusAttribute]) {
    w.raw(b"(");
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            w.space();
        }
        w.raw(item.as_str().as_bytes());
    }
    w.raw(b")");
}

/// Writes a search key. A nested AND is parenthesized.
pub fn write_search_key(w: &mut CommandWriter, key: &SearchKey, nested: bool) {
    let word: &[u8] = match key {
        SearchKey::All => b"ALL",
        SearchKey::Answered => b"ANSWERED",
        SearchKey::Deleted => b"DELETED",
        SearchKey::Draft => b"DRAFT",
        SearchKey::Flagged => b"FLAGGED",
        SearchKey::New => b"NEW",
        SearchKey::Old => b"OLD",
        SearchKey::Recent => b"RECENT",
        SearchKey::Seen => b"SEEN",
        SearchKey::Unanswered => b"UNANSWERED",
        SearchKey::Undeleted => b"UNDELETED",
        SearchKey::Undraft => b"UNDRAFT",
        SearchKey::Unflagged => b"UNFLAGGED",
        SearchKey::Unseen => b"UNSEEN",
        SearchKey::Keyword(k) | SearchKey::Unkeyword(k) => {
            w.raw(if matches!(key, SearchKey::Keyword(_)) {
                &b"KEYWORD "[..]
            } else {
                b"UNKEYWORD "
            });
            w.raw(k.as_bytes());
            return;
        }
        SearchKey::Bcc(s)
        | SearchKey::Body(s)
        | SearchKey::Cc(s)
        | SearchKey::From(s)
        | SearchKey::Subject(s)
        | SearchKey::Text(s)
        | SearchKey::To(s) => {
            w.raw(text_key_name(key).as_bytes());
            w.space();
            w.string(s.as_bytes());
            return;
        }
        SearchKey::Header(name, value) => {
            w.raw(b"HEADER ");
            w.string(name.as_bytes());
            w.space();
            w.string(value.as_bytes());
            return;
        }
        SearchKey::Before(d)
        | SearchKey::On(d)
        | SearchKey::Since(d)
        | SearchKey::SentBefore(d)
        | SearchKey::SentOn(d)
        | SearchKey::SentSince(d) => {
            w.raw(date_key_name(key).as_bytes());
            w.space();
            w.date(*d);
            return;
        }
        SearchKey::Larger(n) => {
            w.raw(format!("LARGER {n}").as_bytes());
            return;
        }
        SearchKey::Smaller(n) => {
            w.raw(format!("SMALLER {n}").as_bytes());
            return;
        }
        SearchKey::Uid(set) => {
            w.raw(b"UID ");
            w.sequence(set);
            return;
        }
        SearchKey::SequenceSet(set) => {
            w.sequence(set);
            return;
        }
        SearchKey::Not(inner) => {
            w.raw(b"NOT ");
            write_search_key(w, inner, true);
            return;
        }
        SearchKey::Or(a, b) => {
            w.raw(b"OR ");
            write_search_key(w, a, true);
            w.space();
            write_search_key(w, b, true);
            return;
        }
        SearchKey::And(keys) => {
            if nested {
                w.raw(b"(");
            }
            for (i, k) in keys.iter().enumerate() {
                if i > 0 {
                    w.space();
                }
                write_search_key(w, k, true);
            }
            if nested {
                w.raw(b")");
            }
            return;
        }
    };
    w.raw(word);
}

const fn text_key_name(key: &SearchKey) -> &'static str {
    match key {
        SearchKey::Bcc(_) => "BCC",
        SearchKey::Body(_) => "BODY",
        SearchKey::Cc(_) => "CC",
        SearchKey::From(_) => "FROM",
        SearchKey::Subject(_) => "SUBJECT",
        SearchKey::Text(_) => "TEXT",
        _ => "TO",
    }
}

const fn date_key_name(key: &SearchKey) -> &'static str {
    match key {
        SearchKey::Before(_) => "BEFORE",
        SearchKey::On(_) => "ON",
        SearchKey::Since(_) => "SINCE",
        SearchKey::SentBefore(_) => "SENTBEFORE",
        SearchKey::SentOn(_) => "SENTON",
        _ => "SENTSINCE",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn written(f: impl FnOnce(&mut CommandWriter)) -> Vec<Vec<u8>> {
        let mut w = CommandWriter::new();
        f(&mut w);
        w.finish()
    }

    #[test]
    fn split_first_keeps_literal_segments_queued() {
        let encoded = EncodedCommand {
            segments: vec![b"A1 LOGIN {3}\r\n".to_vec(), b"abc\r\n".to_vec()],
            summary: "A1 LOGIN".into(),
        };
        let (first, rest) = encoded.split_first().unwrap();
        assert_eq!(first, b"A1 LOGIN {3}\r\n");
        assert_eq!(rest, VecDeque::from([b"abc\r\n".to_vec()]));
    }

    #[test]
    fn split_first_fails_on_empty_command() {
        let encoded = EncodedCommand {
            segments: Vec::new(),
            summary: "A1 NOOP".into(),
        };
        assert!(matches!(
            encoded.split_first(),
            Err(Error::ProtocolMismatch(msg)) if msg.contains("A1 NOOP")
        ));
    }

    #[test]
    fn plain_string_is_quoted() {
        assert_eq!(written(|w| w.string(b"user@ex")), vec![b"\"user@ex\"\r\n".to_vec()]);
        assert_eq!(written(|w| w.string(b"")), vec![b"\"\"\r\n".to_vec()]);
    }

    #[test]
    fn special_characters_force_literal() {
        let values: [&[u8]; 5] = [b"p{ass}", b"a\"b", b"a\\b", b"line\r\nbreak", "caf\u{e9}".as_bytes()];
        for value in values {
            let segments = written(|w| w.string(value));
            assert_eq!(segments.len(), 2, "{value:?}");
            assert_eq!(
                segments[0],
                format!("{{{}}}\r\n", value.len()).into_bytes()
            );
            assert_eq!(&segments[1][..value.len()], value);
        }
    }

    #[test]
    fn long_string_becomes_literal() {
        let long = vec![b'a'; MAX_QUOTED_LEN + 1];
        assert!(needs_literal(&long));
        assert!(!needs_literal(&long[..MAX_QUOTED_LEN]));
    }

    #[test]
    fn mailbox_is_utf7_encoded() {
        let segments = written(|w| w.mailbox(&Mailbox::new("台北")));
        assert_eq!(segments, vec![b"\"&U,BTFw-\"\r\n".to_vec()]);
    }

    #[test]
    fn search_dates_and_nesting() {
        let key = SearchKey::Or(
            Box::new(SearchKey::between(
                NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
                NaiveDate::from_ymd_opt(2024, 2, 15).unwrap(),
            )),
            Box::new(SearchKey::Flagged),
        );
        let segments = written(|w| write_search_key(w, &key, false));
        assert_eq!(
            segments,
            vec![b"OR (SINCE 5-Jan-2024 BEFORE 15-Feb-2024) FLAGGED\r\n".to_vec()]
        );
    }

    #[test]
    fn top_level_and_is_bare() {
        let key = SearchKey::Unseen.and(SearchKey::From("bob".into()));
        let segments = written(|w| write_search_key(w, &key, false));
        assert_eq!(segments, vec![b"UNSEEN FROM \"bob\"\r\n".to_vec()]);
    }

    #[test]
    fn bare_body_is_rejected() {
        let mut w = CommandWriter::new();
        let err = write_fetch_items(&mut w, &FetchItems::Items(vec![FetchAttribute::Body]))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownFetchItemType(name) if name == "BODY"));
    }

    #[test]
    fn partial_body_section() {
        let items = FetchItems::Items(vec![FetchAttribute::BodySection {
            section: Some("1.2".into()),
            peek: true,
            partial: Some((0, 1024)),
        }]);
        let mut w = CommandWriter::new();
        write_fetch_items(&mut w, &items).unwrap();
        assert_eq!(w.finish(), vec![b"(BODY.PEEK[1.2]<0.1024>)\r\n".to_vec()]);
    }

    #[test]
    fn store_silent() {
        let segments = written(|w| {
            write_store_action(w, &StoreAction::AddFlags(vec![Flag::Seen, Flag::Flagged]), true);
        });
        assert_eq!(segments, vec![b"+FLAGS.SILENT (\\Seen \\Flagged)\r\n".to_vec()]);
    }
}
