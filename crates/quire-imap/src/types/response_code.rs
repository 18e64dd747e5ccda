//! Response codes.

use super::{Flag, Uid, UidValidity};

/// Response code carried in brackets by a status response.
///
/// These provide additional information about command completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCode {
    /// ALERT: Human-readable message that MUST be shown to user.
    Alert,
    /// BADCHARSET: the SEARCH charset is not supported.
    BadCharset,
    /// CAPABILITY: the capability list.
    Capability(Vec<&'static str>),
    /// PARSE: Error parsing message.
    Parse,
    /// PERMANENTFLAGS: Flags that can be changed permanently; `\*` appended
    /// when `keywords` is set.
    PermanentFlags {
        /// Changeable system flags.
        flags: Vec<Flag>,
        /// Whether new keywords may be created.
        keywords: bool,
    },
    /// READ-ONLY: Mailbox selected as read-only.
    ReadOnly,
    /// READ-WRITE: Mailbox selected as read-write.
    ReadWrite,
    /// TRYCREATE: Mailbox doesn't exist, but can be created.
    TryCreate,
    /// UIDNEXT: Next UID to be assigned.
    UidNext(Uid),
    /// UIDVALIDITY: Unique identifier validity value.
    UidValidity(UidValidity),
    /// UNSEEN: First unseen message sequence number.
    Unseen(u32),
}

impl std::fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Alert => f.write_str("ALERT"),
            Self::BadCharset => f.write_str("BADCHARSET"),
            Self::Capability(caps) => write!(f, "CAPABILITY {}", caps.join(" ")),
            Self::Parse => f.write_str("PARSE"),
            Self::PermanentFlags { flags, keywords } => {
                let mut list: Vec<&str> = flags.iter().map(Flag::as_str).collect();
                if *keywords {
                    list.push("\\*");
                }
                write!(f, "PERMANENTFLAGS ({})", list.join(" "))
            }
            Self::ReadOnly => f.write_str("READ-ONLY"),
            Self::ReadWrite => f.write_str("READ-WRITE"),
            Self::TryCreate => f.write_str("TRYCREATE"),
            Self::UidNext(uid) => write!(f, "UIDNEXT {uid}"),
            Self::UidValidity(v) => write!(f, "UIDVALIDITY {v}"),
            Self::Unseen(n) => write!(f, "UNSEEN {n}"),
        }
    }
}
