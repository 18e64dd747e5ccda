//! Core IMAP types.
//!
//! This module defines the value types shared by the parser, the session
//! and the mail store, following RFC 3501 (`IMAP4rev1`) and RFC 2086 (ACL).

#![allow(clippy::missing_const_for_fn)]

mod envelope;
mod flags;
mod identifiers;
mod mailbox;
mod response_code;
mod rights;
mod sequence;

pub use envelope::{Address, BodyFields, BodyStructure, Envelope};
pub use flags::{Flag, FlagOp, Flags};
pub use identifiers::{Tag, Uid, UidValidity};
pub use mailbox::{MailboxAttribute, MailboxStatus, StatusItem};
pub use response_code::ResponseCode;
pub use rights::{Rights, RightsChange};
pub use sequence::{MessageSet, SeqBound, SeqItem, SequenceError, SequenceSet, SetKind, decode};
