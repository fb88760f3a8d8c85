//! Protocol identifiers: tags, sequence numbers, UIDs and UIDVALIDITY.

use std::num::NonZeroU32;

/// Command tag.
///
/// The client picks a fresh tag for every command and the server echoes it
/// in the completion line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag(pub String);

impl Tag {
    /// Creates a new tag from a string.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Returns the tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! nonzero_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub NonZeroU32);

        impl $name {
            /// Creates the identifier, returning `None` for zero.
            #[must_use]
            pub const fn new(n: u32) -> Option<Self> {
                match NonZeroU32::new(n) {
                    Some(n) => Some(Self(n)),
                    None => None,
                }
            }

            /// Returns the underlying value.
            #[must_use]
            pub const fn get(self) -> u32 {
                self.0.get()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

nonzero_id!(
    /// Message sequence number.
    ///
    /// Sequence numbers start at 1 and shift down when messages are expunged.
    SeqNum
);

nonzero_id!(
    /// Unique identifier of a message, stable across sessions while
    /// `UIDVALIDITY` is unchanged.
    Uid
);

nonzero_id!(
    /// UIDVALIDITY value for a mailbox. A change invalidates cached UIDs.
    UidValidity
);
