//! Command argument types.

use chrono::{Days, NaiveDate};

use crate::types::{Flag, SequenceSet};

/// STATUS attributes to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusAttribute {
    /// Number of messages.
    Messages,
    /// Number of recent messages.
    Recent,
    /// Next UID.
    UidNext,
    /// UIDVALIDITY.
    UidValidity,
    /// Number of unseen messages.
    Unseen,
}

impl StatusAttribute {
    /// Every attribute defined by IMAP4rev1.
    pub const ALL: [Self; 5] = [
        Self::Messages,
        Self::Recent,
        Self::UidNext,
        Self::UidValidity,
        Self::Unseen,
    ];

    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Messages => "MESSAGES",
            Self::Recent => "RECENT",
            Self::UidNext => "UIDNEXT",
            Self::UidValidity => "UIDVALIDITY",
            Self::Unseen => "UNSEEN",
        }
    }
}

/// FETCH items to request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItems {
    /// `ALL`: FLAGS INTERNALDATE RFC822.SIZE ENVELOPE.
    All,
    /// `FULL`: ALL plus BODY.
    Full,
    /// `FAST`: FLAGS INTERNALDATE RFC822.SIZE.
    Fast,
    /// Custom list of items.
    Items(Vec<FetchAttribute>),
}

impl FetchItems {
    /// Returns true if the request includes `UID`.
    #[must_use]
    pub fn includes_uid(&self) -> bool {
        matches!(self, Self::Items(attrs) if attrs.contains(&FetchAttribute::Uid))
    }
}

impl From<Vec<FetchAttribute>> for FetchItems {
    fn from(attrs: Vec<FetchAttribute>) -> Self {
        Self::Items(attrs)
    }
}

/// Individual FETCH attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchAttribute {
    /// Message flags.
    Flags,
    /// Internal date.
    InternalDate,
    /// RFC822 size.
    Rfc822Size,
    /// Envelope structure.
    Envelope,
    /// Body structure.
    BodyStructure,
    /// Bare `BODY`. It cannot be sent: the encoder rejects it.
    Body,
    /// UID.
    Uid,
    /// Body section.
    BodySection {
        /// Section specifier, e.g. `HEADER` or `1.2`.
        section: Option<String>,
        /// Use `BODY.PEEK` so `\Seen` is not set.
        peek: bool,
        /// Partial fetch as (origin, length).
        partial: Option<(u32, u32)>,
    },
    /// RFC822 (full message).
    Rfc822,
    /// RFC822.HEADER.
    Rfc822Header,
    /// RFC822.TEXT.
    Rfc822Text,
}

impl FetchAttribute {
    /// `BODY.PEEK[]`, the whole message without setting `\Seen`.
    #[must_use]
    pub const fn body_peek() -> Self {
        Self::BodySection {
            section: None,
            peek: true,
            partial: None,
        }
    }

    /// `BODY.PEEK[HEADER]`.
    #[must_use]
    pub fn header_peek() -> Self {
        Self::BodySection {
            section: Some("HEADER".to_string()),
            peek: true,
            partial: None,
        }
    }
}

/// STORE action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreAction {
    /// Replace flags.
    SetFlags(Vec<Flag>),
    /// Add flags.
    AddFlags(Vec<Flag>),
    /// Remove flags.
    RemoveFlags(Vec<Flag>),
}

impl StoreAction {
    pub(crate) const fn item_name(&self) -> &'static str {
        match self {
            Self::SetFlags(_) => "FLAGS",
            Self::AddFlags(_) => "+FLAGS",
            Self::RemoveFlags(_) => "-FLAGS",
        }
    }

    /// Returns the flags carried by the action.
    #[must_use]
    pub fn flags(&self) -> &[Flag] {
        match self {
            Self::SetFlags(f) | Self::AddFlags(f) | Self::RemoveFlags(f) => f,
        }
    }
}

/// SEARCH key tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchKey {
    /// All messages.
    All,
    /// Messages with `\Answered`.
    Answered,
    /// Messages with `\Deleted`.
    Deleted,
    /// Messages with `\Draft`.
    Draft,
    /// Messages with `\Flagged`.
    Flagged,
    /// Recent and unseen messages.
    New,
    /// Messages without `\Recent`.
    Old,
    /// Messages with `\Recent`.
    Recent,
    /// Messages with `\Seen`.
    Seen,
    /// Messages without `\Answered`.
    Unanswered,
    /// Messages without `\Deleted`.
    Undeleted,
    /// Messages without `\Draft`.
    Undraft,
    /// Messages without `\Flagged`.
    Unflagged,
    /// Messages without `\Seen`.
    Unseen,
    /// Messages with the keyword set.
    Keyword(String),
    /// Messages without the keyword.
    Unkeyword(String),
    /// Bcc contains text.
    Bcc(String),
    /// Body contains text.
    Body(String),
    /// Cc contains text.
    Cc(String),
    /// From contains text.
    From(String),
    /// Subject contains text.
    Subject(String),
    /// Header or body contains text.
    Text(String),
    /// To contains text.
    To(String),
    /// Header field contains value.
    Header(String, String),
    /// Internal date earlier than the date.
    Before(NaiveDate),
    /// Internal date within the date.
    On(NaiveDate),
    /// Internal date within or later than the date.
    Since(NaiveDate),
    /// `Date:` header earlier than the date.
    SentBefore(NaiveDate),
    /// `Date:` header within the date.
    SentOn(NaiveDate),
    /// `Date:` header within or later than the date.
    SentSince(NaiveDate),
    /// Larger than size.
    Larger(u32),
    /// Smaller than size.
    Smaller(u32),
    /// UID set.
    Uid(SequenceSet),
    /// Sequence number set.
    SequenceSet(SequenceSet),
    /// Negation.
    Not(Box<Self>),
    /// Either key matches.
    Or(Box<Self>, Box<Self>),
    /// All keys match. Rendered space-separated, parenthesized when nested.
    And(Vec<Self>),
}

impl SearchKey {
    /// Messages received before `date`.
    #[must_use]
    pub const fn before(date: NaiveDate) -> Self {
        Self::Before(date)
    }

    /// Messages received after `date`, not including that day.
    #[must_use]
    pub fn after(date: NaiveDate) -> Self {
        Self::Since(date.checked_add_days(Days::new(1)).unwrap_or(date))
    }

    /// Messages received on or after `start` and before `end`.
    #[must_use]
    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self::And(vec![Self::Since(start), Self::Before(end)])
    }

    /// Negates this key.
    #[must_use]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Combines two keys with OR.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    /// Combines two keys with AND.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match self {
            Self::And(mut keys) => {
                keys.push(other);
                Self::And(keys)
            }
            key => Self::And(vec![key, other]),
        }
    }
}
