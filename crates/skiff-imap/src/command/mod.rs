//! IMAP commands and their wire encoding.
//!
//! [`Command`] is a closed sum of every command the client can issue.
//! [`Command::encode`] turns one into an [`EncodedCommand`], split at each
//! synchronizing literal so the connection can wait for the server's
//! continuation request before sending the literal data.

mod parse;
mod serialize;
mod tag_generator;
mod types;

use chrono::{DateTime, FixedOffset};

use crate::Result;
use crate::types::{Flag, Mailbox, SequenceSet, Tag};

pub use serialize::{EncodedCommand, MAX_QUOTED_LEN};
pub use tag_generator::TagGenerator;
pub use types::{FetchAttribute, FetchItems, SearchKey, StatusAttribute, StoreAction};

use serialize::{
    CommandWriter, write_fetch_items, write_search_key, write_status_items, write_store_action,
};

/// IMAP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // Any state
    /// CAPABILITY command.
    Capability,
    /// NOOP command.
    Noop,
    /// LOGOUT command.
    Logout,

    // Not authenticated
    /// LOGIN command.
    Login {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// AUTHENTICATE command.
    Authenticate {
        /// SASL mechanism name.
        mechanism: String,
        /// Client response sent after the first continuation request.
        response: Option<String>,
    },

    // Authenticated
    /// SELECT command.
    Select {
        /// Mailbox to select.
        mailbox: Mailbox,
    },
    /// EXAMINE command (read-only SELECT).
    Examine {
        /// Mailbox to examine.
        mailbox: Mailbox,
    },
    /// CREATE command.
    Create {
        /// Mailbox to create.
        mailbox: Mailbox,
    },
    /// DELETE command.
    Delete {
        /// Mailbox to delete.
        mailbox: Mailbox,
    },
    /// LIST command.
    List {
        /// Reference name.
        reference: String,
        /// Mailbox pattern, may contain `*` and `%`.
        pattern: String,
    },
    /// LSUB command.
    Lsub {
        /// Reference name.
        reference: String,
        /// Mailbox pattern.
        pattern: String,
    },
    /// STATUS command.
    Status {
        /// Mailbox name.
        mailbox: Mailbox,
        /// Attributes to request.
        items: Vec<StatusAttribute>,
    },
    /// APPEND command.
    Append {
        /// Target mailbox.
        mailbox: Mailbox,
        /// Flags to set on the new message.
        flags: Vec<Flag>,
        /// Internal date to set.
        date: Option<DateTime<FixedOffset>>,
        /// RFC 5322 message.
        message: Vec<u8>,
    },

    // Selected
    /// CLOSE command.
    Close,
    /// UNSELECT command (RFC 3691).
    Unselect,
    /// EXPUNGE command.
    Expunge,
    /// SEARCH or UID SEARCH.
    Search {
        /// Search keys.
        criteria: SearchKey,
        /// Return UIDs instead of sequence numbers.
        uid: bool,
    },
    /// FETCH or UID FETCH.
    Fetch {
        /// Messages to fetch.
        sequence: SequenceSet,
        /// Data items.
        items: FetchItems,
        /// Interpret `sequence` as UIDs.
        uid: bool,
    },
    /// STORE or UID STORE.
    Store {
        /// Messages to change.
        sequence: SequenceSet,
        /// Flag action.
        action: StoreAction,
        /// Interpret `sequence` as UIDs.
        uid: bool,
        /// Suppress the untagged FETCH replies.
        silent: bool,
    },
    /// COPY or UID COPY.
    Copy {
        /// Messages to copy.
        sequence: SequenceSet,
        /// Target mailbox.
        mailbox: Mailbox,
        /// Interpret `sequence` as UIDs.
        uid: bool,
    },

    /// Text sent verbatim after the tag.
    Raw(String),
}

/// The kind of a command, for gating and builder selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum CommandKind {
    Capability,
    Noop,
    Logout,
    Login,
    Authenticate,
    Select,
    Examine,
    Create,
    Delete,
    List,
    Lsub,
    Status,
    Append,
    Close,
    Unselect,
    Expunge,
    Search,
    UidSearch,
    Fetch,
    UidFetch,
    Store,
    UidStore,
    Copy,
    UidCopy,
    Other,
}

impl CommandKind {
    /// Returns the command verb as sent on the wire.
    #[must_use]
    pub const fn verb(self) -> &'static str {
        match self {
            Self::Capability => "CAPABILITY",
            Self::Noop => "NOOP",
            Self::Logout => "LOGOUT",
            Self::Login => "LOGIN",
            Self::Authenticate => "AUTHENTICATE",
            Self::Select => "SELECT",
            Self::Examine => "EXAMINE",
            Self::Create => "CREATE",
            Self::Delete => "DELETE",
            Self::List => "LIST",
            Self::Lsub => "LSUB",
            Self::Status => "STATUS",
            Self::Append => "APPEND",
            Self::Close => "CLOSE",
            Self::Unselect => "UNSELECT",
            Self::Expunge => "EXPUNGE",
            Self::Search => "SEARCH",
            Self::UidSearch => "UID SEARCH",
            Self::Fetch => "FETCH",
            Self::UidFetch => "UID FETCH",
            Self::Store => "STORE",
            Self::UidStore => "UID STORE",
            Self::Copy => "COPY",
            Self::UidCopy => "UID COPY",
            Self::Other => "RAW",
        }
    }

    /// Returns true for LOGIN and AUTHENTICATE.
    #[must_use]
    pub const fn is_auth(self) -> bool {
        matches!(self, Self::Login | Self::Authenticate)
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.verb())
    }
}

impl Command {
    /// Returns the kind of this command.
    #[must_use]
    pub const fn kind(&self) -> CommandKind {
        match self {
            Self::Capability => CommandKind::Capability,
            Self::Noop => CommandKind::Noop,
            Self::Logout => CommandKind::Logout,
            Self::Login { .. } => CommandKind::Login,
            Self::Authenticate { .. } => CommandKind::Authenticate,
            Self::Select { .. } => CommandKind::Select,
            Self::Examine { .. } => CommandKind::Examine,
            Self::Create { .. } => CommandKind::Create,
            Self::Delete { .. } => CommandKind::Delete,
            Self::List { .. } => CommandKind::List,
            Self::Lsub { .. } => CommandKind::Lsub,
            Self::Status { .. } => CommandKind::Status,
            Self::Append { .. } => CommandKind::Append,
            Self::Close => CommandKind::Close,
            Self::Unselect => CommandKind::Unselect,
            Self::Expunge => CommandKind::Expunge,
            Self::Search { uid: false, .. } => CommandKind::Search,
            Self::Search { uid: true, .. } => CommandKind::UidSearch,
            Self::Fetch { uid: false, .. } => CommandKind::Fetch,
            Self::Fetch { uid: true, .. } => CommandKind::UidFetch,
            Self::Store { uid: false, .. } => CommandKind::Store,
            Self::Store { uid: true, .. } => CommandKind::UidStore,
            Self::Copy { uid: false, .. } => CommandKind::Copy,
            Self::Copy { uid: true, .. } => CommandKind::UidCopy,
            Self::Raw(_) => CommandKind::Other,
        }
    }

    /// Returns the mailbox a SELECT or EXAMINE opens.
    #[must_use]
    pub const fn opened_mailbox(&self) -> Option<&Mailbox> {
        match self {
            Self::Select { mailbox } | Self::Examine { mailbox } => Some(mailbox),
            _ => None,
        }
    }

    /// Encodes the command with the given tag.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnknownFetchItemType`] if a FETCH asks for an
    /// item that cannot be sent.
    #[allow(clippy::too_many_lines)]
    pub fn encode(&self, tag: &Tag) -> Result<EncodedCommand> {
        let mut w = CommandWriter::new();
        w.raw(tag.as_str().as_bytes());
        w.space();
        if matches!(
            self,
            Self::Search { uid: true, .. }
                | Self::Fetch { uid: true, .. }
                | Self::Store { uid: true, .. }
                | Self::Copy { uid: true, .. }
        ) {
            w.raw(b"UID ");
        }

        match self {
            Self::Capability => w.raw(b"CAPABILITY"),
            Self::Noop => w.raw(b"NOOP"),
            Self::Logout => w.raw(b"LOGOUT"),
            Self::Close => w.raw(b"CLOSE"),
            Self::Unselect => w.raw(b"UNSELECT"),
            Self::Expunge => w.raw(b"EXPUNGE"),

            Self::Login { username, password } => {
                w.raw(b"LOGIN ");
                w.string(username.as_bytes());
                w.space();
                w.string(password.as_bytes());
            }

            Self::Authenticate {
                mechanism,
                response,
            } => {
                w.raw(b"AUTHENTICATE ");
                w.raw(mechanism.as_bytes());
                if let Some(response) = response {
                    w.line_break();
                    w.raw(response.as_bytes());
                }
            }

            Self::Select { mailbox } => {
                w.raw(b"SELECT ");
                w.mailbox(mailbox);
            }
            Self::Examine { mailbox } => {
                w.raw(b"EXAMINE ");
                w.mailbox(mailbox);
            }
            Self::Create { mailbox } => {
                w.raw(b"CREATE ");
                w.mailbox(mailbox);
            }
            Self::Delete { mailbox } => {
                w.raw(b"DELETE ");
                w.mailbox(mailbox);
            }

            Self::List { reference, pattern } | Self::Lsub { reference, pattern } => {
                w.raw(self.kind().verb().as_bytes());
                w.space();
                w.string(crate::utf7::encode(reference).as_bytes());
                w.space();
                w.string(crate::utf7::encode(pattern).as_bytes());
            }

            Self::Status { mailbox, items } => {
                w.raw(b"STATUS ");
                w.mailbox(mailbox);
                w.space();
                write_status_items(&mut w, items);
            }

            Self::Append {
                mailbox,
                flags,
                date,
                message,
            } => {
                w.raw(b"APPEND ");
                w.mailbox(mailbox);
                if !flags.is_empty() {
                    w.space();
                    w.flags(flags);
                }
                if let Some(date) = date {
                    w.space();
                    w.date_time(date);
                }
                w.space();
                w.literal(message);
            }

            Self::Search { criteria, .. } => {
                w.raw(b"SEARCH ");
                write_search_key(&mut w, criteria, false);
            }

            Self::Fetch {
                sequence, items, ..
            } => {
                w.raw(b"FETCH ");
                w.sequence(sequence);
                w.space();
                write_fetch_items(&mut w, items)?;
            }

            Self::Store {
                sequence,
                action,
                silent,
                ..
            } => {
                w.raw(b"STORE ");
                w.sequence(sequence);
                w.space();
                write_store_action(&mut w, action, *silent);
            }

            Self::Copy {
                sequence, mailbox, ..
            } => {
                w.raw(b"COPY ");
                w.sequence(sequence);
                w.space();
                w.mailbox(mailbox);
            }

            Self::Raw(text) => w.raw(text.trim_end_matches(['\r', '\n']).as_bytes()),
        }

        let segments = w.finish();
        let summary = self.summary(tag, &segments);
        Ok(EncodedCommand { segments, summary })
    }

    /// Loggable first line. Credentials never appear in it.
    fn summary(&self, tag: &Tag, segments: &[Vec<u8>]) -> String {
        match self {
            Self::Login { username, .. } => format!("{tag} LOGIN {username} <redacted>"),
            Self::Authenticate { mechanism, .. } => {
                format!("{tag} AUTHENTICATE {mechanism} <redacted>")
            }
            _ => {
                let first = segments.first().map_or(&[][..], Vec::as_slice);
                String::from_utf8_lossy(first).trim_end().to_string()
            }
        }
    }
}
