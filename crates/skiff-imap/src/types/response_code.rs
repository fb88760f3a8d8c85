//! Response codes carried in `[...]` after a status word.

use super::{Capability, Flag, Uid, UidValidity};

/// Structured response-code attribute from a tagged or untagged status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCode {
    /// `ALERT`: text that must be shown to the user.
    Alert,
    /// `CAPABILITY`: capabilities sent along with a status line.
    Capability(Vec<Capability>),
    /// `PARSE`: the server could not parse a message.
    Parse,
    /// `PERMANENTFLAGS`: flags the client may change permanently.
    PermanentFlags(Vec<Flag>),
    /// `READ-ONLY`: the mailbox was opened read-only.
    ReadOnly,
    /// `READ-WRITE`: the mailbox was opened read-write.
    ReadWrite,
    /// `TRYCREATE`: the target mailbox does not exist but may be created.
    TryCreate,
    /// `UIDNEXT`: the next UID to be assigned.
    UidNext(Uid),
    /// `UIDVALIDITY`: the UID space identifier.
    UidValidity(UidValidity),
    /// `UNSEEN`: the first unseen message.
    Unseen(u32),
    /// `APPENDUID` (UIDPLUS): UID assigned to an appended message.
    AppendUid {
        /// UIDVALIDITY of the mailbox.
        uid_validity: UidValidity,
        /// UID of the appended message.
        uid: Uid,
    },
    /// Any other code, with its raw arguments.
    Other {
        /// Code atom, upper-cased.
        name: String,
        /// Raw text between the atom and `]`, if any.
        args: Option<String>,
    },
}

impl ResponseCode {
    /// Returns the code's atom, e.g. `UIDNEXT`.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Alert => "ALERT",
            Self::Capability(_) => "CAPABILITY",
            Self::Parse => "PARSE",
            Self::PermanentFlags(_) => "PERMANENTFLAGS",
            Self::ReadOnly => "READ-ONLY",
            Self::ReadWrite => "READ-WRITE",
            Self::TryCreate => "TRYCREATE",
            Self::UidNext(_) => "UIDNEXT",
            Self::UidValidity(_) => "UIDVALIDITY",
            Self::Unseen(_) => "UNSEEN",
            Self::AppendUid { .. } => "APPENDUID",
            Self::Other { name, .. } => name,
        }
    }
}
