//! Per-message store access for FETCH and SEARCH.

use bytes::Bytes;
use quire_mime::{Headers, Part};

use super::Context;
use crate::store::{MessageAttributes, StoreResult};
use crate::types::{FlagOp, Flags, Uid};

/// Loads the pieces of one message from the store on first use and keeps
/// them until the next message.
pub(super) struct MessageLoader<'a> {
    ctx: &'a Context,
    user: &'a str,
    mailbox: &'a str,
    uid: Uid,
    flags: Option<Flags>,
    attributes: Option<MessageAttributes>,
    message: Option<Bytes>,
    header: Option<Bytes>,
    headers: Option<Headers>,
}

impl<'a> MessageLoader<'a> {
    pub(super) const fn new(ctx: &'a Context, user: &'a str, mailbox: &'a str, uid: Uid) -> Self {
        Self {
            ctx,
            user,
            mailbox,
            uid,
            flags: None,
            attributes: None,
            message: None,
            header: None,
            headers: None,
        }
    }

    pub(super) const fn uid(&self) -> Uid {
        self.uid
    }

    /// Stored flags, without `\Recent`.
    pub(super) fn flags(&mut self) -> StoreResult<&Flags> {
        let flags = match self.flags.take() {
            Some(flags) => flags,
            None => self.ctx.store.flags(self.user, self.mailbox, self.uid)?,
        };
        Ok(self.flags.insert(flags))
    }

    /// Changes the stored flags and caches the result.
    pub(super) fn store_flags(&mut self, op: FlagOp, flags: &Flags) -> StoreResult<&Flags> {
        let updated = self
            .ctx
            .store
            .store_flags(self.user, self.mailbox, self.uid, op, flags)?;
        Ok(self.flags.insert(updated))
    }

    pub(super) fn attributes(&mut self) -> StoreResult<&MessageAttributes> {
        let attributes = match self.attributes.take() {
            Some(attributes) => attributes,
            None => self.ctx.store.attributes(self.user, self.mailbox, self.uid)?,
        };
        Ok(self.attributes.insert(attributes))
    }

    /// The whole raw message. Clones share the store's buffer.
    pub(super) fn message(&mut self) -> StoreResult<&Bytes> {
        let message = match self.message.take() {
            Some(message) => message,
            None => self.ctx.store.message(self.user, self.mailbox, self.uid)?,
        };
        Ok(self.message.insert(message))
    }

    /// The top-level header block, blank line included.
    pub(super) fn header(&mut self) -> StoreResult<&Bytes> {
        let header = match self.header.take() {
            Some(header) => header,
            None => self.ctx.store.header(self.user, self.mailbox, self.uid)?,
        };
        Ok(self.header.insert(header))
    }

    /// The top-level header fields, unfolded.
    pub(super) fn headers(&mut self) -> StoreResult<&Headers> {
        let headers = match self.headers.take() {
            Some(headers) => headers,
            None => Headers::parse(self.header()?),
        };
        Ok(self.headers.insert(headers))
    }

    /// A MIME part by path. Not cached.
    pub(super) fn part(&self, path: &[u32]) -> StoreResult<Option<Part>> {
        self.ctx.store.part(self.user, self.mailbox, self.uid, path)
    }
}
