//! Core IMAP identifiers.
//!
//! Types for tags, UIDs, and UIDVALIDITY.

use std::num::NonZeroU32;

/// IMAP command tag.
///
/// Tags are client-chosen prefixes that identify commands. Every tagged
/// completion the server sends echoes the tag of the command it completes.
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

    /// Returns true if `b` may appear in a tag.
    ///
    /// A tag is any ASTRING-CHAR except `+`.
    #[must_use]
    pub const fn is_tag_char(b: u8) -> bool {
        crate::parser::is_astring_char(b) && b != b'+'
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a message.
///
/// UIDs are persistent identifiers that don't change when messages are expunged.
/// Combined with `UIDVALIDITY`, they uniquely identify a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Uid(pub NonZeroU32);

impl Uid {
    /// Creates a new UID.
    ///
    /// Returns `None` if the value is 0.
    #[must_use]
    pub fn new(n: u32) -> Option<Self> {
        NonZeroU32::new(n).map(Self)
    }

    /// Returns the underlying value.
    #[must_use]
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl std::fmt::Display for Uid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// UIDVALIDITY value for a mailbox.
///
/// If this value changes, all cached UIDs are invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UidValidity(pub NonZeroU32);

impl UidValidity {
    /// Creates a new UIDVALIDITY.
    #[must_use]
    pub fn new(n: u32) -> Option<Self> {
        NonZeroU32::new(n).map(Self)
    }

    /// Returns the underlying value.
    #[must_use]
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl std::fmt::Display for UidValidity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
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

    mod tag_tests {
        use super::*;

        #[test]
        fn display() {
            let tag = Tag::new("a001");
            assert_eq!(format!("{tag}"), "a001");
            assert_eq!(tag.as_str(), "a001");
        }

        #[test]
        fn tag_chars() {
            assert!(Tag::is_tag_char(b'a'));
            assert!(Tag::is_tag_char(b'.'));
            assert!(Tag::is_tag_char(b']'));
            assert!(!Tag::is_tag_char(b'+'));
            assert!(!Tag::is_tag_char(b'*'));
            assert!(!Tag::is_tag_char(b' '));
            assert!(!Tag::is_tag_char(b'"'));
            assert!(!Tag::is_tag_char(b'{'));
        }
    }

    mod uid_tests {
        use super::*;

        #[test]
        fn new_zero_returns_none() {
            assert!(Uid::new(0).is_none());
        }

        #[test]
        fn display_and_order() {
            let uid1 = Uid::new(100).unwrap();
            let uid2 = Uid::new(200).unwrap();
            assert_eq!(format!("{uid1}"), "100");
            assert!(uid1 < uid2);
        }
    }

    mod uid_validity_tests {
        use super::*;

        #[test]
        fn new_and_display() {
            assert!(UidValidity::new(0).is_none());
            let uv = UidValidity::new(987654321).unwrap();
            assert_eq!(uv.get(), 987654321);
            assert_eq!(uv.to_string(), "987654321");
        }
    }
}
