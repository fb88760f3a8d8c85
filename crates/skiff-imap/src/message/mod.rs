//! Messages assembled from FETCH responses.
//!
//! An [`ImapMessage`] only knows the fields the server reported. Reading a
//! field that was not part of the fetch fails with
//! [`Error::UnfetchedField`] rather than returning a default.

mod body;

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};

use crate::parser::{BodyStructure, Envelope, FetchItem};
use crate::types::{Flags, SeqNum, Uid};
use crate::{Error, Result};

pub use body::{Headers, MessageBody};

/// A message keyed by sequence number, with the fields fetched so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImapMessage {
    seq: SeqNum,
    uid: Option<Uid>,
    internal_date: Option<DateTime<FixedOffset>>,
    size: Option<u32>,
    flags: Option<Flags>,
    envelope: Option<Envelope>,
    body_structure: Option<BodyStructure>,
    body: Option<MessageBody>,
    sections: BTreeMap<String, Vec<u8>>,
}

impl ImapMessage {
    /// Creates a message with no fetched fields.
    #[must_use]
    pub const fn new(seq: SeqNum) -> Self {
        Self {
            seq,
            uid: None,
            internal_date: None,
            size: None,
            flags: None,
            envelope: None,
            body_structure: None,
            body: None,
            sections: BTreeMap::new(),
        }
    }

    /// Builds a message from the items of one FETCH response.
    #[must_use]
    pub fn from_items(seq: SeqNum, items: Vec<FetchItem>) -> Self {
        let mut message = Self::new(seq);
        message.apply(items);
        message
    }

    /// Folds FETCH items into the message. Later values replace earlier ones.
    pub fn apply(&mut self, items: Vec<FetchItem>) {
        for item in items {
            match item {
                FetchItem::Uid(uid) => self.uid = Some(uid),
                FetchItem::Flags(flags) => self.flags = Some(flags),
                FetchItem::InternalDate(date) => self.internal_date = Some(date),
                FetchItem::Rfc822Size(size) => self.size = Some(size),
                FetchItem::Envelope(envelope) => self.envelope = Some(*envelope),
                FetchItem::BodyStructure(structure) => self.body_structure = Some(structure),
                FetchItem::Body {
                    section, data, ..
                } => self.apply_section(section, data.unwrap_or_default()),
            }
        }
    }

    fn apply_section(&mut self, section: Option<String>, data: Vec<u8>) {
        match section.as_deref() {
            None => self.body = Some(MessageBody::parse(data)),
            // A header fetch never replaces a whole message already present.
            Some(s) if s.eq_ignore_ascii_case("HEADER") => {
                if self.body.as_ref().is_none_or(|b| b.text().is_empty()) {
                    self.body = Some(MessageBody::parse(data));
                }
            }
            Some(s) => {
                self.sections.insert(s.to_ascii_uppercase(), data);
            }
        }
    }

    /// Merges a later report for the same message, field by field.
    pub fn merge(&mut self, other: Self) {
        self.uid = other.uid.or(self.uid);
        self.internal_date = other.internal_date.or(self.internal_date);
        self.size = other.size.or(self.size);
        if other.flags.is_some() {
            self.flags = other.flags;
        }
        if other.envelope.is_some() {
            self.envelope = other.envelope;
        }
        if other.body_structure.is_some() {
            self.body_structure = other.body_structure;
        }
        if other.body.is_some() {
            self.body = other.body;
        }
        self.sections.extend(other.sections);
    }

    /// Message sequence number.
    #[must_use]
    pub const fn seq(&self) -> SeqNum {
        self.seq
    }

    /// UID.
    ///
    /// # Errors
    ///
    /// [`Error::UnfetchedField`] if `UID` was not fetched.
    pub fn uid(&self) -> Result<Uid> {
        self.uid.ok_or(Error::UnfetchedField("uid"))
    }

    /// Internal date.
    ///
    /// # Errors
    ///
    /// [`Error::UnfetchedField`] if `INTERNALDATE` was not fetched.
    pub fn internal_date(&self) -> Result<DateTime<FixedOffset>> {
        self.internal_date
            .ok_or(Error::UnfetchedField("internal_date"))
    }

    /// Size in octets.
    ///
    /// # Errors
    ///
    /// [`Error::UnfetchedField`] if `RFC822.SIZE` was not fetched.
    pub fn size(&self) -> Result<u32> {
        self.size.ok_or(Error::UnfetchedField("size"))
    }

    /// Flags.
    ///
    /// # Errors
    ///
    /// [`Error::UnfetchedField`] if `FLAGS` was not fetched.
    pub fn flags(&self) -> Result<&Flags> {
        self.flags.as_ref().ok_or(Error::UnfetchedField("flags"))
    }

    /// Envelope.
    ///
    /// # Errors
    ///
    /// [`Error::UnfetchedField`] if `ENVELOPE` was not fetched.
    pub fn envelope(&self) -> Result<&Envelope> {
        self.envelope
            .as_ref()
            .ok_or(Error::UnfetchedField("envelope"))
    }

    /// Body structure.
    ///
    /// # Errors
    ///
    /// [`Error::UnfetchedField`] if `BODYSTRUCTURE` was not fetched.
    pub fn body_structure(&self) -> Result<&BodyStructure> {
        self.body_structure
            .as_ref()
            .ok_or(Error::UnfetchedField("body_structure"))
    }

    /// Whole message or header, from `BODY[]`, `BODY[HEADER]` or `RFC822*`.
    ///
    /// # Errors
    ///
    /// [`Error::UnfetchedField`] if no such section was fetched.
    pub fn body(&self) -> Result<&MessageBody> {
        self.body.as_ref().ok_or(Error::UnfetchedField("body"))
    }

    /// Raw octets of another body section, such as `TEXT` or `1.2`.
    #[must_use]
    pub fn section(&self, section: &str) -> Option<&[u8]> {
        self.sections
            .get(&section.to_ascii_uppercase())
            .map(Vec::as_slice)
    }

    /// Returns true if FLAGS is known.
    #[must_use]
    pub const fn has_flags(&self) -> bool {
        self.flags.is_some()
    }
}
