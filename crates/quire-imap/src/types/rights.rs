//! Access control rights (RFC 2086).

/// A set of ACL rights, written as letters from `lrswipcda`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rights(u16);

const LETTERS: [(char, Rights); 9] = [
    ('l', Rights::LOOKUP),
    ('r', Rights::READ),
    ('s', Rights::SEEN),
    ('w', Rights::WRITE),
    ('i', Rights::INSERT),
    ('p', Rights::POST),
    ('c', Rights::CREATE),
    ('d', Rights::DELETE),
    ('a', Rights::ADMIN),
];

impl Rights {
    /// No rights.
    pub const NONE: Self = Self(0);
    /// `l`: mailbox is visible to LIST/LSUB.
    pub const LOOKUP: Self = Self(1);
    /// `r`: SELECT, FETCH, SEARCH, COPY from.
    pub const READ: Self = Self(1 << 1);
    /// `s`: keep `\Seen` across sessions.
    pub const SEEN: Self = Self(1 << 2);
    /// `w`: store flags other than `\Seen` and `\Deleted`.
    pub const WRITE: Self = Self(1 << 3);
    /// `i`: APPEND and COPY into.
    pub const INSERT: Self = Self(1 << 4);
    /// `p`: post to the submission address.
    pub const POST: Self = Self(1 << 5);
    /// `c`: CREATE child mailboxes.
    pub const CREATE: Self = Self(1 << 6);
    /// `d`: store `\Deleted`, EXPUNGE, DELETE the mailbox.
    pub const DELETE: Self = Self(1 << 7);
    /// `a`: administer (GETACL, SETACL, ...).
    pub const ADMIN: Self = Self(1 << 8);
    /// Every right.
    pub const ALL: Self = Self((1 << 9) - 1);

    /// Parses a rights string. Returns `None` on an unknown letter.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        s.chars().try_fold(Self::NONE, |acc, c| {
            LETTERS
                .iter()
                .find(|(letter, _)| *letter == c.to_ascii_lowercase())
                .map(|(_, right)| acc.union(*right))
        })
    }

    /// Returns true if every right in `other` is held.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true if any right in `other` is held.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Returns the rights held in either set.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns the rights of `self` not in `other`.
    #[must_use]
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Returns true if no right is held.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Rights that allow changing a selected mailbox.
    #[must_use]
    pub const fn can_modify(self) -> bool {
        self.intersects(Self::SEEN.union(Self::WRITE).union(Self::DELETE))
    }
}

impl std::fmt::Display for Rights {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (letter, right) in LETTERS {
            if self.contains(right) {
                write!(f, "{letter}")?;
            }
        }
        Ok(())
    }
}

/// A SETACL modification: `+rights`, `-rights` or plain `rights`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RightsChange {
    /// Grant these rights in addition to existing ones.
    Add(Rights),
    /// Revoke these rights.
    Remove(Rights),
    /// Replace the existing rights.
    Replace(Rights),
}

impl RightsChange {
    /// Parses a SETACL rights argument.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        if let Some(rest) = s.strip_prefix('+') {
            Rights::parse(rest).map(Self::Add)
        } else if let Some(rest) = s.strip_prefix('-') {
            Rights::parse(rest).map(Self::Remove)
        } else {
            Rights::parse(s).map(Self::Replace)
        }
    }

    /// Applies the change to existing rights.
    #[must_use]
    pub const fn apply(self, current: Rights) -> Rights {
        match self {
            Self::Add(r) => current.union(r),
            Self::Remove(r) => current.difference(r),
            Self::Replace(r) => r,
        }
    }
}
