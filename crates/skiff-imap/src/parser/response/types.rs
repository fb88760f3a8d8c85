//! Response data types.

use chrono::{DateTime, FixedOffset};

use crate::types::{
    Capability, Flags, FolderMetadata, MailboxStatus, ResponseCode, SeqNum, Status, Tag, Uid,
};

/// A tagged completion line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedResponse {
    /// The command tag.
    pub tag: Tag,
    /// Completion status.
    pub status: Status,
    /// Response code, if the server sent one.
    pub code: Option<ResponseCode>,
    /// Human-readable text after the code.
    pub text: String,
}

impl TaggedResponse {
    /// Returns true if the command succeeded.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.status.is_ok()
    }
}

/// FETCH response item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItem {
    /// `FLAGS`
    Flags(Flags),
    /// `INTERNALDATE`
    InternalDate(DateTime<FixedOffset>),
    /// `RFC822.SIZE`
    Rfc822Size(u32),
    /// `ENVELOPE`
    Envelope(Box<Envelope>),
    /// `UID`
    Uid(Uid),
    /// `BODY[section]<origin>`, also produced for `RFC822`, `RFC822.HEADER`
    /// and `RFC822.TEXT`.
    Body {
        /// Section specifier without brackets; `None` for the whole message.
        section: Option<String>,
        /// Origin octet of a partial fetch.
        origin: Option<u32>,
        /// Body octets; `None` when the server sent NIL.
        data: Option<Vec<u8>>,
    },
    /// `BODYSTRUCTURE` or the non-extensible `BODY` form.
    BodyStructure(BodyStructure),
}

/// Message envelope.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Envelope {
    /// Raw `Date:` header.
    pub date: Option<String>,
    /// Subject header.
    pub subject: Option<String>,
    /// From addresses.
    pub from: Vec<Address>,
    /// Sender addresses.
    pub sender: Vec<Address>,
    /// Reply-To addresses.
    pub reply_to: Vec<Address>,
    /// To addresses.
    pub to: Vec<Address>,
    /// Cc addresses.
    pub cc: Vec<Address>,
    /// Bcc addresses.
    pub bcc: Vec<Address>,
    /// In-Reply-To header.
    pub in_reply_to: Option<String>,
    /// Message-ID header.
    pub message_id: Option<String>,
}

impl Envelope {
    /// Parses the `Date:` header as an RFC 5322 date.
    ///
    /// Returns `None` if the header is missing or not a valid date.
    #[must_use]
    pub fn parsed_date(&self) -> Option<DateTime<FixedOffset>> {
        let raw = self.date.as_deref()?.trim();
        // Some agents append a zone comment, e.g. "+0000 (UTC)".
        let raw = raw.split_once(" (").map_or(raw, |(date, _)| date);
        DateTime::parse_from_rfc2822(raw).ok()
    }
}

/// Email address from an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    /// Display name.
    pub name: Option<String>,
    /// Source route (obsolete).
    pub adl: Option<String>,
    /// Mailbox name (local part).
    pub mailbox: Option<String>,
    /// Host name (domain part).
    pub host: Option<String>,
}

impl Address {
    /// Returns `mailbox@host`, if both parts are present.
    #[must_use]
    pub fn email(&self) -> Option<String> {
        match (&self.mailbox, &self.host) {
            (Some(m), Some(h)) => Some(format!("{m}@{h}")),
            _ => None,
        }
    }
}

/// Fields shared by every non-multipart body part.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BodyFields {
    /// Content-Type parameters.
    pub params: Vec<(String, String)>,
    /// Content-ID.
    pub id: Option<String>,
    /// Content-Description.
    pub description: Option<String>,
    /// Content-Transfer-Encoding.
    pub encoding: String,
    /// Size in octets.
    pub size: u32,
}

/// MIME structure of a message as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyStructure {
    /// Any single part that is neither text nor an attached message.
    Basic {
        /// MIME type, upper-cased.
        media_type: String,
        /// MIME subtype, upper-cased.
        media_subtype: String,
        /// Part fields.
        fields: BodyFields,
    },
    /// `TEXT/*` part.
    Text {
        /// Text subtype, upper-cased.
        subtype: String,
        /// Part fields.
        fields: BodyFields,
        /// Size in lines.
        lines: u32,
    },
    /// `MESSAGE/RFC822` part.
    Message {
        /// Part fields.
        fields: BodyFields,
        /// Envelope of the nested message.
        envelope: Box<Envelope>,
        /// Structure of the nested message.
        body: Box<Self>,
        /// Size in lines.
        lines: u32,
    },
    /// `MULTIPART/*` body.
    Multipart {
        /// Child parts.
        bodies: Vec<Self>,
        /// Multipart subtype, upper-cased.
        subtype: String,
    },
}

/// Untagged response data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UntaggedResponse {
    /// `* OK`
    Ok {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* NO`
    No {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* BAD`
    Bad {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* PREAUTH`, only valid as a greeting.
    PreAuth {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* BYE`: the server is closing the connection.
    Bye {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* CAPABILITY`
    Capability(Vec<Capability>),
    /// `* LIST`
    List(FolderMetadata),
    /// `* LSUB`
    Lsub(FolderMetadata),
    /// `* STATUS`
    Status(MailboxStatus),
    /// `* SEARCH`
    Search(Vec<u32>),
    /// `* FLAGS`
    Flags(Flags),
    /// `* n EXISTS`
    Exists(u32),
    /// `* n RECENT`
    Recent(u32),
    /// `* n EXPUNGE`
    Expunge(SeqNum),
    /// `* n FETCH (...)`
    Fetch {
        /// Message sequence number.
        seq: SeqNum,
        /// Data items in server order.
        items: Vec<FetchItem>,
    },
    /// Any response this parser does not model, kept opaque.
    Other {
        /// Leading keyword, including a preceding number if any.
        keyword: String,
        /// Rest of the unit after the keyword.
        text: String,
    },
}

impl UntaggedResponse {
    /// Returns the status word of a status response.
    #[must_use]
    pub const fn status(&self) -> Option<Status> {
        match self {
            Self::Ok { .. } => Some(Status::Ok),
            Self::No { .. } => Some(Status::No),
            Self::Bad { .. } => Some(Status::Bad),
            Self::PreAuth { .. } => Some(Status::PreAuth),
            Self::Bye { .. } => Some(Status::Bye),
            _ => None,
        }
    }

    /// Returns the response code of a status response.
    #[must_use]
    pub const fn code(&self) -> Option<&ResponseCode> {
        match self {
            Self::Ok { code, .. }
            | Self::No { code, .. }
            | Self::Bad { code, .. }
            | Self::PreAuth { code, .. }
            | Self::Bye { code, .. } => code.as_ref(),
            _ => None,
        }
    }
}
