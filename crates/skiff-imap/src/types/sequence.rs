//! Sequence sets for message ranges.
//!
//! The same type serves message sequence numbers and UIDs; which one it
//! means is decided by the command that carries it (`FETCH` vs `UID FETCH`).

use std::fmt;
use std::num::NonZeroUsize;

/// One member of a sequence set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqItem {
    /// A single number.
    Single(u32),
    /// Inclusive range `a:b`.
    Range(u32, u32),
    /// Open range `a:*`.
    From(u32),
    /// `*`, the highest number in use.
    Last,
}

impl SeqItem {
    /// Number of members when the range is finite.
    fn len(self) -> Option<u64> {
        match self {
            Self::Single(_) => Some(1),
            Self::Range(a, b) => Some(u64::from(a.abs_diff(b)) + 1),
            Self::From(_) | Self::Last => None,
        }
    }

    fn parse(s: &str) -> Option<Self> {
        let num = |s: &str| s.parse::<u32>().ok().filter(|n| *n > 0);
        match s.split_once(':') {
            None if s == "*" => Some(Self::Last),
            None => num(s).map(Self::Single),
            Some((a, "*")) => num(a).map(Self::From),
            Some(("*", b)) => num(b).map(Self::From),
            Some((a, b)) => Some(Self::Range(num(a)?, num(b)?)),
        }
    }
}

impl fmt::Display for SeqItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(n) => write!(f, "{n}"),
            Self::Range(a, b) => write!(f, "{a}:{b}"),
            Self::From(a) => write!(f, "{a}:*"),
            Self::Last => f.write_str("*"),
        }
    }
}

/// A non-empty set of message numbers, rendered as `a[:b]` members joined
/// by commas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceSet {
    items: Vec<SeqItem>,
}

impl SequenceSet {
    /// A single message.
    #[must_use]
    pub fn single(n: u32) -> Self {
        Self {
            items: vec![SeqItem::Single(n)],
        }
    }

    /// The inclusive range `start:end`.
    #[must_use]
    pub fn range(start: u32, end: u32) -> Self {
        let item = if start == end {
            SeqItem::Single(start)
        } else {
            SeqItem::Range(start, end)
        };
        Self { items: vec![item] }
    }

    /// The open range `start:*`.
    #[must_use]
    pub fn starting_at(start: u32) -> Self {
        Self {
            items: vec![SeqItem::From(start)],
        }
    }

    /// `1:*`, every message in the mailbox.
    #[must_use]
    pub fn all() -> Self {
        Self::starting_at(1)
    }

    /// Builds a set from `start` and an optional `end`; `None` means `*`.
    #[must_use]
    pub fn span(start: u32, end: Option<u32>) -> Self {
        end.map_or_else(|| Self::starting_at(start), |end| Self::range(start, end))
    }

    /// Builds a compact set from individual numbers, merging consecutive runs.
    ///
    /// Returns `None` when `numbers` is empty or contains zero.
    #[must_use]
    pub fn from_numbers(numbers: impl IntoIterator<Item = u32>) -> Option<Self> {
        let mut sorted: Vec<u32> = numbers.into_iter().collect();
        sorted.sort_unstable();
        sorted.dedup();
        if sorted.first().is_none_or(|n| *n == 0) {
            return None;
        }

        let mut items = Vec::new();
        let mut run_start = sorted[0];
        let mut prev = sorted[0];
        for &n in &sorted[1..] {
            if n != prev + 1 {
                items.push(run(run_start, prev));
                run_start = n;
            }
            prev = n;
        }
        items.push(run(run_start, prev));
        Some(Self { items })
    }

    /// Parses the wire form, e.g. `1:4,7,9:*`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let items = s
            .split(',')
            .map(SeqItem::parse)
            .collect::<Option<Vec<_>>>()?;
        (!items.is_empty()).then_some(Self { items })
    }

    /// Returns the members of the set.
    #[must_use]
    pub fn items(&self) -> &[SeqItem] {
        &self.items
    }

    /// Returns true if the set contains `*`.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.items
            .iter()
            .any(|item| matches!(item, SeqItem::From(_) | SeqItem::Last))
    }

    /// Number of messages in a finite set.
    #[must_use]
    pub fn count(&self) -> Option<u64> {
        self.items.iter().map(|item| item.len()).sum()
    }

    /// Splits a finite set into sets of at most `size` numbers each.
    ///
    /// Open sets are returned whole.
    #[must_use]
    pub fn chunks(&self, size: NonZeroUsize) -> Vec<Self> {
        if self.is_open() {
            return vec![self.clone()];
        }
        let size = u32::try_from(size.get()).unwrap_or(u32::MAX);

        let mut chunks = Vec::new();
        let mut current = Vec::new();
        let mut room = size;
        for item in &self.items {
            let (mut lo, hi) = match *item {
                SeqItem::Single(n) => (n, n),
                SeqItem::Range(a, b) => (a.min(b), a.max(b)),
                SeqItem::From(_) | SeqItem::Last => continue,
            };
            loop {
                let take = (hi - lo).min(room - 1);
                current.push(run(lo, lo + take));
                room -= take + 1;
                if room == 0 {
                    chunks.push(Self {
                        items: std::mem::take(&mut current),
                    });
                    room = size;
                }
                if lo + take == hi {
                    break;
                }
                lo += take + 1;
            }
        }
        if !current.is_empty() {
            chunks.push(Self { items: current });
        }
        chunks
    }
}

const fn run(start: u32, end: u32) -> SeqItem {
    if start == end {
        SeqItem::Single(start)
    } else {
        SeqItem::Range(start, end)
    }
}

impl fmt::Display for SequenceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{item}")?;
        }
        Ok(())
    }
}

impl From<SeqItem> for SequenceSet {
    fn from(item: SeqItem) -> Self {
        Self { items: vec![item] }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn nz(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    mod display_tests {
        use super::*;

        #[test]
        fn single_and_range() {
            assert_eq!(SequenceSet::single(42).to_string(), "42");
            assert_eq!(SequenceSet::range(1, 100).to_string(), "1:100");
            assert_eq!(SequenceSet::range(7, 7).to_string(), "7");
        }

        #[test]
        fn open_ranges() {
            assert_eq!(SequenceSet::all().to_string(), "1:*");
            assert_eq!(SequenceSet::span(5, None).to_string(), "5:*");
            assert_eq!(SequenceSet::span(5, Some(9)).to_string(), "5:9");
            assert_eq!(SequenceSet::from(SeqItem::Last).to_string(), "*");
        }

        #[test]
        fn from_numbers_merges_runs() {
            let set = SequenceSet::from_numbers([9, 1, 2, 3, 7, 8, 3]).unwrap();
            assert_eq!(set.to_string(), "1:3,7:9");
        }

        #[test]
        fn from_numbers_rejects_empty_and_zero() {
            assert!(SequenceSet::from_numbers([]).is_none());
            assert!(SequenceSet::from_numbers([0, 1]).is_none());
        }
    }

    mod parse_tests {
        use super::*;

        #[test]
        fn parses_wire_form() {
            let set = SequenceSet::parse("1:4,7,9:*").unwrap();
            assert_eq!(
                set.items(),
                &[SeqItem::Range(1, 4), SeqItem::Single(7), SeqItem::From(9)]
            );
            assert_eq!(set.to_string(), "1:4,7,9:*");
        }

        #[test]
        fn rejects_garbage() {
            assert!(SequenceSet::parse("").is_none());
            assert!(SequenceSet::parse("0").is_none());
            assert!(SequenceSet::parse("a:b").is_none());
            assert!(SequenceSet::parse("1,,2").is_none());
        }
    }

    mod chunk_tests {
        use super::*;

        #[test]
        fn splits_long_ranges() {
            let chunks = SequenceSet::range(1, 10).chunks(nz(4));
            let rendered: Vec<String> = chunks.iter().map(ToString::to_string).collect();
            assert_eq!(rendered, ["1:4", "5:8", "9:10"]);
        }

        #[test]
        fn packs_singles() {
            let set = SequenceSet::parse("1,3,5,7,9").unwrap();
            let rendered: Vec<String> = set.chunks(nz(2)).iter().map(ToString::to_string).collect();
            assert_eq!(rendered, ["1,3", "5,7", "9"]);
        }

        #[test]
        fn chunk_counts_add_up() {
            let set = SequenceSet::parse("1:5,10,20:22").unwrap();
            let total: u64 = set.chunks(nz(3)).iter().map(|c| c.count().unwrap()).sum();
            assert_eq!(total, set.count().unwrap());
        }

        #[test]
        fn open_sets_are_not_split() {
            let set = SequenceSet::all();
            assert_eq!(set.chunks(nz(1)), vec![set]);
        }
    }
}
