//! Mailbox types.

use std::collections::BTreeSet;

use super::{Uid, UidValidity};

/// Mailbox name, held in decoded (UTF-8) form.
///
/// Names are converted to modified UTF-7 only when written to the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Mailbox(pub String);

impl Mailbox {
    /// Creates a new mailbox name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The INBOX mailbox.
    #[must_use]
    pub fn inbox() -> Self {
        Self("INBOX".to_string())
    }

    /// Returns the mailbox name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this names INBOX, which is case-insensitive.
    #[must_use]
    pub fn is_inbox(&self) -> bool {
        self.0.eq_ignore_ascii_case("INBOX")
    }

    /// Returns the name in modified UTF-7, as sent on the wire.
    #[must_use]
    pub fn encoded(&self) -> String {
        crate::utf7::encode(&self.0)
    }

    /// Builds a mailbox from a wire name, decoding modified UTF-7.
    ///
    /// Names that are not valid modified UTF-7 are kept verbatim.
    #[must_use]
    pub fn from_wire(raw: &str) -> Self {
        Self(crate::utf7::decode(raw).unwrap_or_else(|| raw.to_string()))
    }
}

impl std::fmt::Display for Mailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Mailbox {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Folder attribute from a LIST or LSUB response.
///
/// This is a closed set. Attributes outside it are dropped by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FolderAttribute {
    /// `\All`: virtual mailbox holding all messages.
    All,
    /// `\NoInferiors`: no child mailboxes can exist.
    NoInferiors,
    /// `\NoSelect`: the mailbox cannot be selected.
    NoSelect,
    /// `\Marked`: the server marked the mailbox as interesting.
    Marked,
    /// `\Unmarked`: nothing new since last selection.
    Unmarked,
    /// `\HasNoChildren`
    HasNoChildren,
    /// `\HasChildren`
    HasChildren,
    /// `\Drafts`
    Drafts,
    /// `\Important`
    Important,
    /// `\Sent`
    Sent,
    /// `\Junk`
    Junk,
    /// `\Trash`
    Trash,
}

impl FolderAttribute {
    /// Parses an attribute atom such as `\HasChildren`.
    ///
    /// Matching ignores case and an optional leading backslash. Returns
    /// `None` for attributes outside the known set.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let name = s.strip_prefix('\\').unwrap_or(s);
        let attr = match name.to_ascii_uppercase().as_str() {
            "ALL" => Self::All,
            "NOINFERIORS" => Self::NoInferiors,
            "NOSELECT" => Self::NoSelect,
            "MARKED" => Self::Marked,
            "UNMARKED" => Self::Unmarked,
            "HASNOCHILDREN" => Self::HasNoChildren,
            "HASCHILDREN" => Self::HasChildren,
            "DRAFTS" => Self::Drafts,
            "IMPORTANT" => Self::Important,
            "SENT" => Self::Sent,
            "JUNK" => Self::Junk,
            "TRASH" => Self::Trash,
            _ => return None,
        };
        Some(attr)
    }

    /// Returns the attribute in its wire form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "\\All",
            Self::NoInferiors => "\\NoInferiors",
            Self::NoSelect => "\\NoSelect",
            Self::Marked => "\\Marked",
            Self::Unmarked => "\\Unmarked",
            Self::HasNoChildren => "\\HasNoChildren",
            Self::HasChildren => "\\HasChildren",
            Self::Drafts => "\\Drafts",
            Self::Important => "\\Important",
            Self::Sent => "\\Sent",
            Self::Junk => "\\Junk",
            Self::Trash => "\\Trash",
        }
    }
}

/// One folder reported by LIST or LSUB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderMetadata {
    /// Decoded folder name.
    pub name: Mailbox,
    /// Hierarchy delimiter, `None` for a flat namespace.
    pub delimiter: Option<char>,
    /// Recognized attributes.
    pub attributes: BTreeSet<FolderAttribute>,
}

impl FolderMetadata {
    /// Returns true if the folder carries the attribute.
    #[must_use]
    pub fn has(&self, attr: FolderAttribute) -> bool {
        self.attributes.contains(&attr)
    }

    /// Returns true if the folder can be opened.
    #[must_use]
    pub fn is_selectable(&self) -> bool {
        !self.has(FolderAttribute::NoSelect)
    }
}

/// Mailbox status returned by the STATUS command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailboxStatus {
    /// Mailbox the status describes.
    pub mailbox: Mailbox,
    /// `MESSAGES`
    pub messages: Option<u32>,
    /// `RECENT`
    pub recent: Option<u32>,
    /// `UIDNEXT`
    pub uid_next: Option<Uid>,
    /// `UIDVALIDITY`
    pub uid_validity: Option<UidValidity>,
    /// `UNSEEN`
    pub unseen: Option<u32>,
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::inbox()
    }
}
