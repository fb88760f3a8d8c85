//! Command tag generator.
//!
//! Tags match commands with their completions. They are unique within a
//! connection for as long as the counter does not wrap.

use crate::types::Tag;

/// Sequential tag source: `A0001`, `A0002`, and so on.
#[derive(Debug, Clone)]
pub struct TagGenerator {
    counter: u32,
    prefix: char,
}

impl TagGenerator {
    /// Creates a generator with the given prefix.
    #[must_use]
    pub const fn new(prefix: char) -> Self {
        Self { counter: 0, prefix }
    }

    /// Returns the next tag.
    pub fn next_tag(&mut self) -> Tag {
        self.counter = self.counter.checked_add(1).unwrap_or(1);
        Tag::new(format!("{}{:04}", self.prefix, self.counter))
    }

    /// Returns how many tags have been issued since the last wrap.
    #[must_use]
    pub const fn issued(&self) -> u32 {
        self.counter
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new('A')
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_one() {
        let mut generator = TagGenerator::default();
        assert_eq!(generator.next_tag().as_str(), "A0001");
        assert_eq!(generator.next_tag().as_str(), "A0002");
        assert_eq!(generator.issued(), 2);
    }

    #[test]
    fn custom_prefix() {
        let mut generator = TagGenerator::new('T');
        assert_eq!(generator.next_tag().as_str(), "T0001");
    }

    #[test]
    fn widens_past_four_digits() {
        let mut generator = TagGenerator::default();
        for _ in 0..9999 {
            let _ = generator.next_tag();
        }
        assert_eq!(generator.next_tag().as_str(), "A10000");
    }

    #[test]
    fn tags_are_unique() {
        let mut generator = TagGenerator::default();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..10_000 {
            assert!(seen.insert(generator.next_tag()), "duplicate tag generated");
        }
    }

    #[test]
    fn wraps_instead_of_panicking() {
        let mut generator = TagGenerator {
            counter: u32::MAX,
            prefix: 'A',
        };
        assert_eq!(generator.next_tag().as_str(), "A0001");
    }
}
