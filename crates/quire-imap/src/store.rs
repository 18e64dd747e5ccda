//! The mail store collaborator.
//!
//! The server core never owns messages. It asks a [`MailStore`] for
//! everything, keyed by user and absolute mailbox name (`#mail.bob.INBOX`),
//! and turns every [`StoreError`] into a tagged NO. Stores are shared
//! between connections and synchronize internally.
//!
//! Access control is decided by the core from [`MailStore::rights`]; the
//! store only records and reports rights.

use bytes::Bytes;
use chrono::{DateTime, FixedOffset};
use quire_mime::{Part, split_message};
use thiserror::Error;

use crate::types::{
    BodyStructure, Envelope, FlagOp, Flags, MailboxStatus, Rights, RightsChange, Uid,
};

/// Errors reported by a mail store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The mailbox or message does not exist.
    #[error("No such mailbox: {0}")]
    NotFound(String),
    /// The user may not perform the operation.
    #[error("Permission denied")]
    AccessDenied,
    /// The mailbox already exists.
    #[error("Mailbox already exists: {0}")]
    AlreadyExists(String),
    /// The request is not valid for this store.
    #[error("{0}")]
    Invalid(String),
    /// The backing storage failed.
    #[error("Storage failure: {0}")]
    Storage(String),
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Fixed attributes of a stored message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageAttributes {
    /// INTERNALDATE.
    pub internal_date: DateTime<FixedOffset>,
    /// RFC822.SIZE in octets.
    pub size: u32,
    /// ENVELOPE.
    pub envelope: Envelope,
    /// BODYSTRUCTURE.
    pub body: BodyStructure,
}

/// Handle for a registered mailbox listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// Storage and access control for mailboxes and messages.
pub trait MailStore: Send + Sync {
    /// Counters and UID values of a mailbox.
    fn status(&self, user: &str, mailbox: &str) -> StoreResult<MailboxStatus>;

    /// Live UIDs in sequence number order.
    fn uids(&self, user: &str, mailbox: &str) -> StoreResult<Vec<Uid>>;

    /// UIDs still flagged `\Recent`. With `claim`, the store clears them so
    /// no other session sees them as recent.
    fn recent_uids(&self, user: &str, mailbox: &str, claim: bool) -> StoreResult<Vec<Uid>>;

    /// The user's rights on a mailbox.
    fn rights(&self, user: &str, mailbox: &str) -> StoreResult<Rights>;

    /// Flags of one message, without `\Recent`.
    fn flags(&self, user: &str, mailbox: &str, uid: Uid) -> StoreResult<Flags>;

    /// Changes the flags of one message and returns the new flags.
    fn store_flags(
        &self,
        user: &str,
        mailbox: &str,
        uid: Uid,
        op: FlagOp,
        flags: &Flags,
    ) -> StoreResult<Flags>;

    /// Date, size, envelope and body structure of one message.
    fn attributes(&self, user: &str, mailbox: &str, uid: Uid) -> StoreResult<MessageAttributes>;

    /// The raw message.
    ///
    /// FETCH passes the returned buffer, or slices of it, to the connection
    /// as literal payloads.
    fn message(&self, user: &str, mailbox: &str, uid: Uid) -> StoreResult<Bytes>;

    /// The header block, including the blank line after it.
    fn header(&self, user: &str, mailbox: &str, uid: Uid) -> StoreResult<Bytes> {
        let raw = self.message(user, mailbox, uid)?;
        let len = split_message(&raw).0.len();
        Ok(raw.slice(..len))
    }

    /// A MIME part by 1-based path, or `None` if the path does not exist.
    fn part(
        &self,
        user: &str,
        mailbox: &str,
        uid: Uid,
        path: &[u32],
    ) -> StoreResult<Option<Part>> {
        let raw = self.message(user, mailbox, uid)?;
        Ok(Part::parse(&raw).find(path).cloned())
    }

    /// Removes every message flagged `\Deleted`; returns the removed UIDs.
    fn expunge(&self, user: &str, mailbox: &str) -> StoreResult<Vec<Uid>>;

    /// Adds a message, `\Recent` until claimed. Returns its UID.
    fn append(
        &self,
        user: &str,
        mailbox: &str,
        flags: &Flags,
        internal_date: Option<DateTime<FixedOffset>>,
        message: &[u8],
    ) -> StoreResult<Uid>;

    /// Copies messages, keeping flags and internal date. Returns new UIDs.
    fn copy(&self, user: &str, from: &str, uids: &[Uid], to: &str) -> StoreResult<Vec<Uid>>;

    /// Makes sure pending changes are durable.
    fn check(&self, _user: &str, _mailbox: &str) -> StoreResult<()> {
        Ok(())
    }

    /// Creates a mailbox.
    fn create(&self, user: &str, mailbox: &str) -> StoreResult<()>;

    /// Deletes a mailbox.
    fn delete(&self, user: &str, mailbox: &str) -> StoreResult<()>;

    /// Renames a mailbox together with its children.
    fn rename(&self, user: &str, from: &str, to: &str) -> StoreResult<()>;

    /// Absolute names of every mailbox the user may see, in any order.
    fn list(&self, user: &str) -> StoreResult<Vec<String>>;

    /// Adds a mailbox to the user's subscriptions.
    fn subscribe(&self, user: &str, mailbox: &str) -> StoreResult<()>;

    /// Removes a mailbox from the user's subscriptions.
    fn unsubscribe(&self, user: &str, mailbox: &str) -> StoreResult<()>;

    /// The user's subscriptions.
    fn subscriptions(&self, user: &str) -> StoreResult<Vec<String>>;

    /// Every ACL entry of a mailbox.
    fn acl(&self, user: &str, mailbox: &str) -> StoreResult<Vec<(String, Rights)>>;

    /// Changes the rights of one identifier.
    fn set_acl(
        &self,
        user: &str,
        mailbox: &str,
        identifier: &str,
        change: RightsChange,
    ) -> StoreResult<()>;

    /// Removes one identifier from the ACL.
    fn delete_acl(&self, user: &str, mailbox: &str, identifier: &str) -> StoreResult<()>;

    /// Rights that are always granted to an identifier, and the groups of
    /// rights that may be granted.
    fn list_rights(
        &self,
        user: &str,
        mailbox: &str,
        identifier: &str,
    ) -> StoreResult<(Rights, Vec<Rights>)>;

    /// Registers interest in a mailbox for the duration of a selection.
    fn register_listener(&self, user: &str, mailbox: &str) -> StoreResult<ListenerId>;

    /// Releases a registration.
    fn unregister_listener(&self, id: ListenerId);
}
