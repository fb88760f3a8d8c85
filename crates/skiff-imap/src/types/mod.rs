//! Core IMAP types.
//!
//! Identifiers, flags, folder metadata, capabilities, response codes and
//! sequence sets shared by the parser, the encoder and the client.

#![allow(clippy::missing_const_for_fn)]

mod capability;
mod flags;
mod identifiers;
mod mailbox;
mod response_code;
mod sequence;

pub use capability::{Capability, Status};
pub use flags::{Flag, Flags};
pub use identifiers::{SeqNum, Tag, Uid, UidValidity};
pub use mailbox::{FolderAttribute, FolderMetadata, Mailbox, MailboxStatus};
pub use response_code::ResponseCode;
pub use sequence::{SeqItem, SequenceSet};
