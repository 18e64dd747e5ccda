//! Message sets.
//!
//! A client names messages with sequence-set syntax: `1`, `2:4`, `7:*`, `*`
//! and comma separated unions of those. [`SequenceSet`] is the parsed syntax;
//! [`MessageSet`] is the normalized result of resolving it against a
//! mailbox, as message sequence numbers or as UIDs.

use std::num::NonZeroU32;

use thiserror::Error;

use super::Uid;

/// Errors produced while parsing or resolving a sequence set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequenceError {
    /// The text is not sequence-set syntax.
    #[error("Invalid message set: {0}")]
    Syntax(String),
    /// A message sequence number exceeds the number of messages.
    #[error("Invalid message sequence number: {0}")]
    OutOfRange(String),
}

/// One end of a range: a number or `*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqBound {
    /// An explicit value.
    Value(NonZeroU32),
    /// `*`, the largest value in use.
    Star,
}

impl SeqBound {
    fn resolve(self, star: u32) -> u32 {
        match self {
            Self::Value(n) => n.get(),
            Self::Star => star,
        }
    }
}

impl std::fmt::Display for SeqBound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(n) => write!(f, "{n}"),
            Self::Star => write!(f, "*"),
        }
    }
}

/// One comma separated element of a sequence set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqItem {
    /// A single value.
    Single(SeqBound),
    /// An inclusive range; either order is allowed.
    Range(SeqBound, SeqBound),
}

/// Whether a set addresses sequence numbers or UIDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetKind {
    /// Message sequence numbers, 1..=EXISTS.
    Sequence,
    /// Unique identifiers.
    Uid,
}

/// Parsed sequence-set syntax, not yet resolved against a mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceSet {
    items: Vec<SeqItem>,
}

impl SequenceSet {
    /// Parses sequence-set syntax.
    ///
    /// # Errors
    ///
    /// Returns [`SequenceError::Syntax`] for empty elements, zero, or
    /// anything that is not a number, `*` or `:`.
    pub fn parse(s: &str) -> Result<Self, SequenceError> {
        if s.is_empty() {
            return Err(SequenceError::Syntax("empty message set".to_string()));
        }

        let items = s
            .split(',')
            .map(|item| match item.split_once(':') {
                Some((a, b)) => Ok(SeqItem::Range(parse_bound(a)?, parse_bound(b)?)),
                None => Ok(SeqItem::Single(parse_bound(item)?)),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { items })
    }

    /// Returns the parsed elements.
    #[must_use]
    pub fn items(&self) -> &[SeqItem] {
        &self.items
    }

    /// Resolves the set against a mailbox.
    ///
    /// `largest` is the value `*` stands for: the message count for
    /// sequence numbers, the highest UID in use for UIDs.
    ///
    /// # Errors
    ///
    /// For [`SetKind::Sequence`], any value above `largest` (including `*`
    /// in an empty mailbox) is [`SequenceError::OutOfRange`]. UIDs are never
    /// out of range; values without a message simply match nothing.
    pub fn resolve(&self, largest: u32, kind: SetKind) -> Result<MessageSet, SequenceError> {
        if kind == SetKind::Uid && largest == 0 {
            return Ok(MessageSet::default());
        }

        let mut ranges = Vec::with_capacity(self.items.len());
        for item in &self.items {
            let (a, b) = match *item {
                SeqItem::Single(v) => (v, v),
                SeqItem::Range(a, b) => (a, b),
            };
            let (a, b) = (a.resolve(largest), b.resolve(largest));
            let (low, high) = (a.min(b), a.max(b));

            if kind == SetKind::Sequence && (low == 0 || high > largest) {
                return Err(SequenceError::OutOfRange(item_text(*item)));
            }
            ranges.push((low, high));
        }

        Ok(MessageSet::from_ranges(ranges))
    }
}

fn item_text(item: SeqItem) -> String {
    match item {
        SeqItem::Single(v) => v.to_string(),
        SeqItem::Range(a, b) => format!("{a}:{b}"),
    }
}

fn parse_bound(s: &str) -> Result<SeqBound, SequenceError> {
    if s == "*" {
        return Ok(SeqBound::Star);
    }
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SequenceError::Syntax(s.to_string()));
    }
    s.parse::<u32>()
        .ok()
        .and_then(NonZeroU32::new)
        .map(SeqBound::Value)
        .ok_or_else(|| SequenceError::Syntax(s.to_string()))
}

impl std::fmt::Display for SequenceSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            f.write_str(&item_text(*item))?;
        }
        Ok(())
    }
}

/// A normalized set of message numbers: ascending, distinct, never empty
/// ranges. Stored as merged inclusive ranges so `1:4294967295` stays small.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageSet {
    ranges: Vec<(u32, u32)>,
}

impl MessageSet {
    /// Builds a set from inclusive `(low, high)` ranges in any order.
    #[must_use]
    pub fn from_ranges(mut ranges: Vec<(u32, u32)>) -> Self {
        ranges.retain(|&(low, high)| low <= high);
        ranges.sort_unstable();

        let mut merged: Vec<(u32, u32)> = Vec::with_capacity(ranges.len());
        for (low, high) in ranges {
            match merged.last_mut() {
                Some(last) if low <= last.1.saturating_add(1) => last.1 = last.1.max(high),
                _ => merged.push((low, high)),
            }
        }
        Self { ranges: merged }
    }

    /// Returns the merged ranges.
    #[must_use]
    pub fn ranges(&self) -> &[(u32, u32)] {
        &self.ranges
    }

    /// Returns true if `n` is in the set.
    #[must_use]
    pub fn contains(&self, n: u32) -> bool {
        self.ranges
            .binary_search_by(|&(low, high)| {
                if high < n {
                    std::cmp::Ordering::Less
                } else if low > n {
                    std::cmp::Ordering::Greater
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    /// Returns true if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Iterates the members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.ranges.iter().flat_map(|&(low, high)| low..=high)
    }
}

/// Decodes raw sequence-set text against a mailbox's UID sequence.
///
/// `sequence` lists the live UIDs in sequence-number order. With
/// `use_uids`, the result holds UIDs; otherwise sequence numbers.
///
/// # Errors
///
/// Returns a [`SequenceError`] for bad syntax or out-of-range sequence
/// numbers.
pub fn decode(raw: &str, sequence: &[Uid], use_uids: bool) -> Result<MessageSet, SequenceError> {
    let set = SequenceSet::parse(raw)?;
    if use_uids {
        let highest = sequence.last().map_or(0, |uid| uid.get());
        set.resolve(highest, SetKind::Uid)
    } else {
        let exists = u32::try_from(sequence.len()).unwrap_or(u32::MAX);
        set.resolve(exists, SetKind::Sequence)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn uids(values: &[u32]) -> Vec<Uid> {
        values.iter().map(|&v| Uid::new(v).unwrap()).collect()
    }

    mod parse_tests {
        use super::*;

        #[test]
        fn single_range_and_star() {
            let set = SequenceSet::parse("1,3:5,7:*,*").unwrap();
            assert_eq!(set.items().len(), 4);
            assert_eq!(set.to_string(), "1,3:5,7:*,*");
        }

        #[test]
        fn rejects_zero_and_junk() {
            assert!(SequenceSet::parse("0").is_err());
            assert!(SequenceSet::parse("").is_err());
            assert!(SequenceSet::parse("1,").is_err());
            assert!(SequenceSet::parse("a:b").is_err());
            assert!(SequenceSet::parse("1:2:3").is_err());
            assert!(SequenceSet::parse("-1").is_err());
        }
    }

    mod decode_tests {
        use super::*;

        #[test]
        fn msn_ranges_are_order_insensitive() {
            let seq = uids(&[10, 11, 12, 13, 14]);
            let set = decode("4:2", &seq, false).unwrap();
            assert_eq!(set.iter().collect::<Vec<_>>(), vec![2, 3, 4]);
        }

        #[test]
        fn msn_star_is_exists() {
            let seq = uids(&[10, 11, 12]);
            assert_eq!(decode("*", &seq, false).unwrap().iter().collect::<Vec<_>>(), vec![3]);
            assert_eq!(
                decode("2:*", &seq, false).unwrap().iter().collect::<Vec<_>>(),
                vec![2, 3]
            );
        }

        #[test]
        fn msn_out_of_range_is_error() {
            let seq = uids(&[10, 11, 12]);
            assert!(matches!(
                decode("4", &seq, false),
                Err(SequenceError::OutOfRange(_))
            ));
            assert!(decode("1:9", &seq, false).is_err());
        }

        #[test]
        fn msn_star_in_empty_mailbox_is_error() {
            assert!(decode("*", &[], false).is_err());
            assert!(decode("1:*", &[], false).is_err());
        }

        #[test]
        fn uid_out_of_range_matches_nothing_but_is_legal() {
            let seq = uids(&[10, 11, 12]);
            let set = decode("100:200", &seq, true).unwrap();
            assert!(set.contains(150));
            assert!(!set.contains(12));
        }

        #[test]
        fn uid_star_is_highest_uid() {
            let seq = uids(&[10, 11, 42]);
            let set = decode("20:*", &seq, true).unwrap();
            assert_eq!(set.ranges(), &[(20, 42)]);
        }

        #[test]
        fn uid_in_empty_mailbox_is_empty() {
            assert!(decode("1:*", &[], true).unwrap().is_empty());
        }

        #[test]
        fn dedup_and_merge() {
            let seq = uids(&[1, 2, 3, 4, 5, 6]);
            let set = decode("5,1:3,2,4", &seq, false).unwrap();
            assert_eq!(set.ranges(), &[(1, 5)]);
            assert_eq!(set.iter().collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
        }
    }

    proptest! {
        #[test]
        fn msn_decode_is_subset_ascending_distinct(
            items in proptest::collection::vec((1u32..30, proptest::option::of(1u32..30)), 1..8),
            exists in 0usize..30,
        ) {
            let raw = items
                .iter()
                .map(|(a, b)| b.map_or_else(|| a.to_string(), |b| format!("{a}:{b}")))
                .collect::<Vec<_>>()
                .join(",");
            let seq: Vec<Uid> = (1..=exists)
                .map(|n| Uid::new(u32::try_from(n).unwrap()).unwrap())
                .collect();

            match decode(&raw, &seq, false) {
                Ok(set) => {
                    let values: Vec<u32> = set.iter().collect();
                    prop_assert!(values.windows(2).all(|w| w[0] < w[1]));
                    prop_assert!(values.iter().all(|&v| v >= 1 && v as usize <= exists));
                    for (a, b) in &items {
                        let (lo, hi) = b.map_or((*a, *a), |b| ((*a).min(b), (*a).max(b)));
                        for v in lo..=hi {
                            prop_assert!(set.contains(v));
                        }
                    }
                }
                Err(_) => {
                    let max = items.iter().map(|(a, b)| (*a).max(b.unwrap_or(0))).max().unwrap();
                    prop_assert!(max as usize > exists);
                }
            }
        }

        #[test]
        fn uid_decode_is_sorted_and_distinct(
            items in proptest::collection::vec((1u32..1000, 1u32..1000), 1..6),
            highest in 1u32..1000,
        ) {
            let raw = items
                .iter()
                .map(|(a, b)| format!("{a}:{b}"))
                .collect::<Vec<_>>()
                .join(",");
            let seq = vec![Uid::new(highest).unwrap()];
            let set = decode(&raw, &seq, true).unwrap();
            let values: Vec<u32> = set.iter().collect();
            prop_assert!(values.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
