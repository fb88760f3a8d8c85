//! Message flags.

/// A message flag: one of the RFC 3501 system flags or a keyword.
///
/// Flags compare by their canonical string, so `\SEEN` and `\Seen` parse to
/// the same value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Flag {
    /// Message has been read.
    Seen,
    /// Message has been answered.
    Answered,
    /// Message is flagged for special attention.
    Flagged,
    /// Message is marked for deletion.
    Deleted,
    /// Message is a draft.
    Draft,
    /// Message is recent (first session to see it).
    Recent,
    /// `\*` in `PERMANENTFLAGS`: new keywords may be created.
    Wildcard,
    /// Any other flag atom, kept verbatim.
    Keyword(String),
}

impl Flag {
    /// Parses a flag atom.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "\\SEEN" => Self::Seen,
            "\\ANSWERED" => Self::Answered,
            "\\FLAGGED" => Self::Flagged,
            "\\DELETED" => Self::Deleted,
            "\\DRAFT" => Self::Draft,
            "\\RECENT" => Self::Recent,
            "\\*" => Self::Wildcard,
            _ => Self::Keyword(s.to_string()),
        }
    }

    /// Returns the flag in its canonical wire form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Seen => "\\Seen",
            Self::Answered => "\\Answered",
            Self::Flagged => "\\Flagged",
            Self::Deleted => "\\Deleted",
            Self::Draft => "\\Draft",
            Self::Recent => "\\Recent",
            Self::Wildcard => "\\*",
            Self::Keyword(s) => s,
        }
    }

    /// Returns true for the backslash-prefixed system flags.
    #[must_use]
    pub const fn is_system(&self) -> bool {
        !matches!(self, Self::Keyword(_))
    }
}

impl std::fmt::Display for Flag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Flag {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

/// An ordered set of flags without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flags {
    flags: Vec<Flag>,
}

impl Flags {
    /// Creates an empty flag set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a flag unless already present.
    pub fn insert(&mut self, flag: Flag) {
        if !self.flags.contains(&flag) {
            self.flags.push(flag);
        }
    }

    /// Removes a flag.
    pub fn remove(&mut self, flag: &Flag) {
        self.flags.retain(|f| f != flag);
    }

    /// Returns true if the flag is present.
    #[must_use]
    pub fn contains(&self, flag: &Flag) -> bool {
        self.flags.contains(flag)
    }

    /// Returns true if the message has been seen.
    #[must_use]
    pub fn is_seen(&self) -> bool {
        self.contains(&Flag::Seen)
    }

    /// Returns true if the message is flagged.
    #[must_use]
    pub fn is_flagged(&self) -> bool {
        self.contains(&Flag::Flagged)
    }

    /// Returns true if the message is marked for deletion.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.contains(&Flag::Deleted)
    }

    /// Returns an iterator over the flags.
    pub fn iter(&self) -> impl Iterator<Item = &Flag> {
        self.flags.iter()
    }

    /// Returns the number of flags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    /// Returns true if there are no flags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Returns the flags as a slice, in insertion order.
    #[must_use]
    pub fn as_slice(&self) -> &[Flag] {
        &self.flags
    }
}

impl FromIterator<Flag> for Flags {
    fn from_iter<I: IntoIterator<Item = Flag>>(iter: I) -> Self {
        let mut flags = Self::new();
        for flag in iter {
            flags.insert(flag);
        }
        flags
    }
}

impl From<Vec<Flag>> for Flags {
    fn from(flags: Vec<Flag>) -> Self {
        flags.into_iter().collect()
    }
}

impl IntoIterator for Flags {
    type Item = Flag;
    type IntoIter = std::vec::IntoIter<Flag>;

    fn into_iter(self) -> Self::IntoIter {
        self.flags.into_iter()
    }
}

impl<'a> IntoIterator for &'a Flags {
    type Item = &'a Flag;
    type IntoIter = std::slice::Iter<'a, Flag>;

    fn into_iter(self) -> Self::IntoIter {
        self.flags.iter()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone)]
mod tests {
    use super::*;

    mod flag_tests {
        use super::*;

        #[test]
        fn system_flags_ignore_case() {
            assert_eq!(Flag::parse("\\Seen"), Flag::Seen);
            assert_eq!(Flag::parse("\\SEEN"), Flag::Seen);
            assert_eq!(Flag::parse("\\seen"), Flag::Seen);
            assert_eq!(Flag::parse("\\recent"), Flag::Recent);
        }

        #[test]
        fn wildcard() {
            assert_eq!(Flag::parse("\\*"), Flag::Wildcard);
            assert_eq!(Flag::Wildcard.to_string(), "\\*");
        }

        #[test]
        fn keyword_is_kept_verbatim() {
            let flag = Flag::parse("$Important");
            assert_eq!(flag, Flag::Keyword("$Important".to_string()));
            assert_eq!(flag.as_str(), "$Important");
            assert!(!flag.is_system());
        }

        #[test]
        fn equality_by_canonical_string() {
            assert_eq!(Flag::parse("\\FLAGGED").as_str(), Flag::Flagged.as_str());
            assert_ne!(Flag::parse("\\Junk"), Flag::parse("Junk"));
        }
    }

    mod flags_tests {
        use super::*;

        #[test]
        fn insert_is_idempotent() {
            let mut flags = Flags::new();
            flags.insert(Flag::Seen);
            flags.insert(Flag::Seen);
            assert_eq!(flags.len(), 1);
            assert!(flags.is_seen());
        }

        #[test]
        fn remove() {
            let mut flags: Flags = vec![Flag::Seen, Flag::Deleted].into();
            flags.remove(&Flag::Seen);
            assert!(!flags.is_seen());
            assert!(flags.is_deleted());
        }

        #[test]
        fn collect_dedups_in_order() {
            let flags: Flags = [Flag::Flagged, Flag::Seen, Flag::Flagged]
                .into_iter()
                .collect();
            assert_eq!(flags.as_slice(), &[Flag::Flagged, Flag::Seen]);
        }
    }
}
