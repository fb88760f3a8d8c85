//! Typed command responses.

use std::collections::BTreeMap;

use crate::message::ImapMessage;
use crate::parser::TaggedResponse;
use crate::types::{
    Capability, Flag, Flags, FolderMetadata, Mailbox, MailboxStatus, ResponseCode, SeqNum, Uid,
    UidValidity,
};

/// Access mode of an opened mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Opened with EXAMINE or reported `READ-ONLY`.
    Read,
    /// Opened with SELECT and reported `READ-WRITE`.
    Write,
}

/// Result of LIST or LSUB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListResponse {
    /// Completion code.
    pub code: Option<ResponseCode>,
    /// Completion text.
    pub text: String,
    /// Folders in server order.
    pub folders: Vec<FolderMetadata>,
}

impl ListResponse {
    /// Finds a folder by name.
    #[must_use]
    pub fn folder(&self, name: &str) -> Option<&FolderMetadata> {
        self.folders.iter().find(|f| f.name.as_str() == name)
    }
}

/// Result of SELECT or EXAMINE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenResponse {
    /// Mailbox that was opened.
    pub mailbox: Mailbox,
    /// Completion code, usually `READ-WRITE` or `READ-ONLY`.
    pub code: Option<ResponseCode>,
    /// Completion text.
    pub text: String,
    /// Message count from `EXISTS`.
    pub exists: u32,
    /// Count from `RECENT`.
    pub recent: u32,
    /// Flags defined in the mailbox.
    pub flags: Flags,
    /// Flags the client can change permanently. `\*` allows new keywords.
    pub permanent_flags: Vec<Flag>,
    /// UIDVALIDITY.
    pub uid_validity: Option<UidValidity>,
    /// Predicted next UID.
    pub uid_next: Option<Uid>,
    /// First unseen message.
    pub unseen: Option<u32>,
    /// Access mode.
    pub mode: OpenMode,
}

impl OpenResponse {
    /// Returns true if new keywords may be created.
    #[must_use]
    pub fn allows_new_keywords(&self) -> bool {
        self.permanent_flags.contains(&Flag::Wildcard)
    }
}

/// Result of FETCH or UID FETCH.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// Completion code.
    pub code: Option<ResponseCode>,
    /// Completion text.
    pub text: String,
    /// Messages keyed by sequence number.
    pub messages: BTreeMap<SeqNum, ImapMessage>,
}

impl FetchResponse {
    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true if the server reported no message.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Message with the given sequence number.
    #[must_use]
    pub fn get(&self, seq: SeqNum) -> Option<&ImapMessage> {
        self.messages.get(&seq)
    }

    /// Messages in sequence number order.
    pub fn iter(&self) -> impl Iterator<Item = &ImapMessage> {
        self.messages.values()
    }

    /// Folds another response into this one, as for batched fetches.
    pub fn extend(&mut self, other: Self) {
        for (seq, message) in other.messages {
            match self.messages.get_mut(&seq) {
                Some(existing) => existing.merge(message),
                None => {
                    self.messages.insert(seq, message);
                }
            }
        }
        self.code = other.code;
        self.text = other.text;
    }
}

/// Result of a streaming FETCH.
///
/// Messages were handed to the callback as they arrived; `results` holds
/// what the callback returned, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamingFetchResponse<T> {
    /// Completion code.
    pub code: Option<ResponseCode>,
    /// Completion text.
    pub text: String,
    /// Number of FETCH responses delivered to the callback.
    pub delivered: usize,
    /// Callback results.
    pub results: Vec<T>,
}

impl<T> StreamingFetchResponse<T> {
    /// Replaces the results, keeping the completion.
    #[must_use]
    pub fn with_results<U>(self, results: Vec<U>) -> StreamingFetchResponse<U> {
        StreamingFetchResponse {
            code: self.code,
            text: self.text,
            delivered: self.delivered,
            results,
        }
    }
}

/// Result of SEARCH or UID SEARCH.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResponse {
    /// Completion code.
    pub code: Option<ResponseCode>,
    /// Completion text.
    pub text: String,
    /// Matching numbers in emission order, duplicates preserved.
    pub ids: Vec<u32>,
}

/// Result of NOOP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoopResponse {
    /// Completion code.
    pub code: Option<ResponseCode>,
    /// Completion text.
    pub text: String,
}

/// Result of STATUS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusResponse {
    /// Completion code.
    pub code: Option<ResponseCode>,
    /// Completion text.
    pub text: String,
    /// Reported counters.
    pub status: MailboxStatus,
}

/// Result of CAPABILITY.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityResponse {
    /// Completion code.
    pub code: Option<ResponseCode>,
    /// Completion text.
    pub text: String,
    /// Advertised capabilities.
    pub capabilities: Vec<Capability>,
}

impl CapabilityResponse {
    /// Returns true if the capability is advertised.
    #[must_use]
    pub fn has(&self, capability: &Capability) -> bool {
        self.capabilities.contains(capability)
    }
}

/// The final result of any command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResponse {
    /// LIST or LSUB.
    List(ListResponse),
    /// SELECT or EXAMINE.
    Open(OpenResponse),
    /// FETCH.
    Fetch(FetchResponse),
    /// Streaming FETCH; results stay with the callback.
    StreamingFetch(StreamingFetchResponse<()>),
    /// SEARCH.
    Search(SearchResponse),
    /// NOOP.
    Noop(NoopResponse),
    /// STATUS.
    Status(StatusResponse),
    /// CAPABILITY.
    Capability(CapabilityResponse),
    /// Any other command: the tagged completion itself.
    Tagged(TaggedResponse),
}

impl CommandResponse {
    /// Completion code of the response.
    #[must_use]
    pub const fn code(&self) -> Option<&ResponseCode> {
        match self {
            Self::List(r) => r.code.as_ref(),
            Self::Open(r) => r.code.as_ref(),
            Self::Fetch(r) => r.code.as_ref(),
            Self::StreamingFetch(r) => r.code.as_ref(),
            Self::Search(r) => r.code.as_ref(),
            Self::Noop(r) => r.code.as_ref(),
            Self::Status(r) => r.code.as_ref(),
            Self::Capability(r) => r.code.as_ref(),
            Self::Tagged(r) => r.code.as_ref(),
        }
    }

    /// Completion text of the response.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::List(r) => &r.text,
            Self::Open(r) => &r.text,
            Self::Fetch(r) => &r.text,
            Self::StreamingFetch(r) => &r.text,
            Self::Search(r) => &r.text,
            Self::Noop(r) => &r.text,
            Self::Status(r) => &r.text,
            Self::Capability(r) => &r.text,
            Self::Tagged(r) => &r.text,
        }
    }
}
