//! Mailbox types.

use super::{Uid, UidValidity};

/// Mailbox counters as reported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxStatus {
    /// Number of messages in the mailbox.
    pub exists: u32,
    /// Number of messages still flagged `\Recent`.
    pub recent: u32,
    /// Number of messages without `\Seen`.
    pub unseen: u32,
    /// Next UID to be assigned.
    pub uid_next: Uid,
    /// UIDVALIDITY value.
    pub uid_validity: UidValidity,
}

/// Mailbox attributes sent in LIST and LSUB responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MailboxAttribute {
    /// Mailbox cannot be selected.
    NoSelect,
    /// Mailbox cannot have children.
    NoInferiors,
    /// Mailbox is marked for attention.
    Marked,
    /// Mailbox is not marked.
    Unmarked,
}

impl MailboxAttribute {
    /// Returns the attribute as an IMAP string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoSelect => "\\Noselect",
            Self::NoInferiors => "\\Noinferiors",
            Self::Marked => "\\Marked",
            Self::Unmarked => "\\Unmarked",
        }
    }
}

impl std::fmt::Display for MailboxAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A STATUS data item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusItem {
    /// MESSAGES: message count.
    Messages,
    /// RECENT: count of `\Recent` messages.
    Recent,
    /// UIDNEXT: next UID.
    UidNext,
    /// UIDVALIDITY: UID validity value.
    UidValidity,
    /// UNSEEN: count of messages without `\Seen`.
    Unseen,
}

impl StatusItem {
    /// Parses a STATUS item name, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "MESSAGES" => Some(Self::Messages),
            "RECENT" => Some(Self::Recent),
            "UIDNEXT" => Some(Self::UidNext),
            "UIDVALIDITY" => Some(Self::UidValidity),
            "UNSEEN" => Some(Self::Unseen),
            _ => None,
        }
    }

    /// Returns the item name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Messages => "MESSAGES",
            Self::Recent => "RECENT",
            Self::UidNext => "UIDNEXT",
            Self::UidValidity => "UIDVALIDITY",
            Self::Unseen => "UNSEEN",
        }
    }

    /// Reads this item's value from mailbox counters.
    #[must_use]
    pub fn value(self, status: &MailboxStatus) -> u32 {
        match self {
            Self::Messages => status.exists,
            Self::Recent => status.recent,
            Self::UidNext => status.uid_next.get(),
            Self::UidValidity => status.uid_validity.get(),
            Self::Unseen => status.unseen,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn attribute_display() {
        assert_eq!(MailboxAttribute::NoSelect.to_string(), "\\Noselect");
        assert_eq!(MailboxAttribute::Unmarked.to_string(), "\\Unmarked");
    }

    #[test]
    fn status_item_parse() {
        assert_eq!(StatusItem::parse("messages"), Some(StatusItem::Messages));
        assert_eq!(StatusItem::parse("UIDNEXT"), Some(StatusItem::UidNext));
        assert_eq!(StatusItem::parse("HIGHESTMODSEQ"), None);
    }

    #[test]
    fn status_item_value() {
        let status = MailboxStatus {
            exists: 5,
            recent: 2,
            unseen: 1,
            uid_next: Uid::new(9).unwrap(),
            uid_validity: UidValidity::new(77).unwrap(),
        };
        assert_eq!(StatusItem::Messages.value(&status), 5);
        assert_eq!(StatusItem::UidNext.value(&status), 9);
        assert_eq!(StatusItem::UidValidity.value(&status), 77);
    }
}
