//! In-memory mail store.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::num::NonZeroU32;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bytes::Bytes;
use chrono::{DateTime, FixedOffset, Local};
use quire_mime::Part;
use tracing::debug;

use super::mime;
use crate::session::{NAMESPACE_PREFIX, SEPARATOR};
use crate::store::{ListenerId, MailStore, MessageAttributes, StoreError, StoreResult};
use crate::types::{
    Flag, FlagOp, Flags, MailboxStatus, Rights, RightsChange, Uid, UidValidity,
};

/// ACL identifier matching every user.
const ANYONE: &str = "anyone";

#[derive(Debug, Clone)]
struct StoredMessage {
    uid: Uid,
    flags: Flags,
    recent: bool,
    data: Bytes,
    attributes: Arc<MessageAttributes>,
}

#[derive(Debug)]
struct Mailbox {
    uid_validity: UidValidity,
    uid_next: NonZeroU32,
    messages: Vec<StoredMessage>,
    acl: BTreeMap<String, Rights>,
}

impl Mailbox {
    fn message(&self, uid: Uid) -> StoreResult<&StoredMessage> {
        self.messages
            .binary_search_by_key(&uid, |m| m.uid)
            .map(|i| &self.messages[i])
            .map_err(|_| StoreError::NotFound(format!("message {uid}")))
    }

    fn message_mut(&mut self, uid: Uid) -> StoreResult<&mut StoredMessage> {
        let index = self
            .messages
            .binary_search_by_key(&uid, |m| m.uid)
            .map_err(|_| StoreError::NotFound(format!("message {uid}")))?;
        Ok(&mut self.messages[index])
    }

    fn push(&mut self, mut message: StoredMessage) -> Uid {
        let uid = Uid(self.uid_next);
        message.uid = uid;
        self.uid_next = self.uid_next.saturating_add(1);
        self.messages.push(message);
        uid
    }
}

#[derive(Debug)]
struct Inner {
    mailboxes: BTreeMap<String, Mailbox>,
    subscriptions: HashMap<String, BTreeSet<String>>,
    listeners: HashMap<ListenerId, String>,
    next_listener: u64,
    next_validity: u32,
}

impl Inner {
    fn mailbox(&self, name: &str) -> StoreResult<&Mailbox> {
        self.mailboxes
            .get(name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn mailbox_mut(&mut self, name: &str) -> StoreResult<&mut Mailbox> {
        self.mailboxes
            .get_mut(name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn new_mailbox(&mut self) -> Mailbox {
        self.next_validity = self.next_validity.wrapping_add(1).max(1);
        Mailbox {
            uid_validity: UidValidity(NonZeroU32::new(self.next_validity).unwrap_or(NonZeroU32::MIN)),
            uid_next: NonZeroU32::MIN,
            messages: Vec::new(),
            acl: BTreeMap::new(),
        }
    }
}

/// A [`MailStore`] that keeps everything in memory.
///
/// The owner of `#mail.<user>` and everything below it has every right;
/// other users get the rights granted to them, or to `anyone`, by the
/// mailbox ACL.
#[derive(Debug)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                mailboxes: BTreeMap::new(),
                subscriptions: HashMap::new(),
                listeners: HashMap::new(),
                next_listener: 0,
                next_validity: 0,
            }),
        }
    }

    /// Creates a user's INBOX if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Storage`] if the store lock is poisoned.
    pub fn add_user(&self, user: &str) -> StoreResult<()> {
        match self.create(user, &inbox(user)) {
            Ok(()) | Err(StoreError::AlreadyExists(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Number of live listener registrations on a mailbox.
    #[must_use]
    pub fn listener_count(&self, mailbox: &str) -> usize {
        self.read()
            .map(|inner| inner.listeners.values().filter(|m| *m == mailbox).count())
            .unwrap_or(0)
    }

    /// Removes one message regardless of flags, as another client's
    /// EXPUNGE or a delivery agent would.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the mailbox or message is missing.
    pub fn remove_message(&self, mailbox: &str, uid: Uid) -> StoreResult<()> {
        let mut inner = self.write()?;
        let mailbox = inner.mailbox_mut(mailbox)?;
        let index = mailbox
            .messages
            .binary_search_by_key(&uid, |m| m.uid)
            .map_err(|_| StoreError::NotFound(format!("message {uid}")))?;
        mailbox.messages.remove(index);
        Ok(())
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| StoreError::Storage("store lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| StoreError::Storage("store lock poisoned".to_string()))
    }
}

fn inbox(user: &str) -> String {
    format!("{NAMESPACE_PREFIX}{SEPARATOR}{user}{SEPARATOR}INBOX")
}

/// Returns true if `mailbox` lies in the user's own folder.
fn owns(user: &str, mailbox: &str) -> bool {
    let folder = format!("{NAMESPACE_PREFIX}{SEPARATOR}{user}");
    mailbox == folder
        || mailbox
            .strip_prefix(folder.as_str())
            .is_some_and(|rest| rest.starts_with(SEPARATOR))
}

fn owner_of(mailbox: &str) -> Option<&str> {
    let rest = mailbox
        .strip_prefix(NAMESPACE_PREFIX)?
        .strip_prefix(SEPARATOR)?;
    rest.split(SEPARATOR).next().filter(|s| !s.is_empty())
}

fn rights_in(user: &str, name: &str, mailbox: &Mailbox) -> Rights {
    if owns(user, name) {
        return Rights::ALL;
    }
    let anyone = mailbox.acl.get(ANYONE).copied().unwrap_or_default();
    mailbox
        .acl
        .get(user)
        .copied()
        .unwrap_or_default()
        .union(anyone)
}

fn now() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}

fn analyze(data: &[u8], internal_date: DateTime<FixedOffset>) -> MessageAttributes {
    let part = Part::parse(data);
    MessageAttributes {
        internal_date,
        size: u32::try_from(data.len()).unwrap_or(u32::MAX),
        envelope: mime::envelope(&part.headers),
        body: mime::body_structure(&part),
    }
}

fn without_recent(flags: &Flags) -> Flags {
    flags.iter().filter(|f| **f != Flag::Recent).cloned().collect()
}

impl MailStore for InMemoryStore {
    fn status(&self, _user: &str, mailbox: &str) -> StoreResult<MailboxStatus> {
        let inner = self.read()?;
        let mailbox = inner.mailbox(mailbox)?;
        let count = |pred: fn(&StoredMessage) -> bool| {
            u32::try_from(mailbox.messages.iter().filter(|m| pred(m)).count()).unwrap_or(u32::MAX)
        };
        Ok(MailboxStatus {
            exists: count(|_| true),
            recent: count(|m| m.recent),
            unseen: count(|m| !m.flags.is_seen()),
            uid_next: Uid(mailbox.uid_next),
            uid_validity: mailbox.uid_validity,
        })
    }

    fn uids(&self, _user: &str, mailbox: &str) -> StoreResult<Vec<Uid>> {
        let inner = self.read()?;
        Ok(inner.mailbox(mailbox)?.messages.iter().map(|m| m.uid).collect())
    }

    fn recent_uids(&self, _user: &str, mailbox: &str, claim: bool) -> StoreResult<Vec<Uid>> {
        if !claim {
            let inner = self.read()?;
            let mailbox = inner.mailbox(mailbox)?;
            return Ok(mailbox
                .messages
                .iter()
                .filter(|m| m.recent)
                .map(|m| m.uid)
                .collect());
        }
        let mut inner = self.write()?;
        let mailbox = inner.mailbox_mut(mailbox)?;
        Ok(mailbox
            .messages
            .iter_mut()
            .filter(|m| m.recent)
            .map(|m| {
                m.recent = false;
                m.uid
            })
            .collect())
    }

    fn rights(&self, user: &str, mailbox: &str) -> StoreResult<Rights> {
        let inner = self.read()?;
        match inner.mailboxes.get(mailbox) {
            Some(data) => Ok(rights_in(user, mailbox, data)),
            None if owns(user, mailbox) => Ok(Rights::ALL),
            None => Err(StoreError::NotFound(mailbox.to_string())),
        }
    }

    fn flags(&self, _user: &str, mailbox: &str, uid: Uid) -> StoreResult<Flags> {
        let inner = self.read()?;
        Ok(inner.mailbox(mailbox)?.message(uid)?.flags.clone())
    }

    fn store_flags(
        &self,
        _user: &str,
        mailbox: &str,
        uid: Uid,
        op: FlagOp,
        flags: &Flags,
    ) -> StoreResult<Flags> {
        let mut inner = self.write()?;
        let message = inner.mailbox_mut(mailbox)?.message_mut(uid)?;
        message.flags.apply(op, &without_recent(flags));
        Ok(message.flags.clone())
    }

    fn attributes(&self, _user: &str, mailbox: &str, uid: Uid) -> StoreResult<MessageAttributes> {
        let inner = self.read()?;
        let message = inner.mailbox(mailbox)?.message(uid)?;
        Ok(MessageAttributes::clone(&message.attributes))
    }

    fn message(&self, _user: &str, mailbox: &str, uid: Uid) -> StoreResult<Bytes> {
        let inner = self.read()?;
        let message = inner.mailbox(mailbox)?.message(uid)?;
        Ok(message.data.clone())
    }

    fn expunge(&self, _user: &str, mailbox: &str) -> StoreResult<Vec<Uid>> {
        let mut inner = self.write()?;
        let mailbox = inner.mailbox_mut(mailbox)?;
        let removed = mailbox
            .messages
            .iter()
            .filter(|m| m.flags.is_deleted())
            .map(|m| m.uid)
            .collect();
        mailbox.messages.retain(|m| !m.flags.is_deleted());
        Ok(removed)
    }

    fn append(
        &self,
        _user: &str,
        mailbox: &str,
        flags: &Flags,
        internal_date: Option<DateTime<FixedOffset>>,
        message: &[u8],
    ) -> StoreResult<Uid> {
        let attributes = analyze(message, internal_date.unwrap_or_else(now));
        let mut inner = self.write()?;
        let target = inner.mailbox_mut(mailbox)?;
        let uid = target.push(StoredMessage {
            uid: Uid(NonZeroU32::MIN),
            flags: without_recent(flags),
            recent: true,
            data: Bytes::copy_from_slice(message),
            attributes: Arc::new(attributes),
        });
        debug!(mailbox, %uid, size = message.len(), "message appended");
        Ok(uid)
    }

    fn copy(&self, _user: &str, from: &str, uids: &[Uid], to: &str) -> StoreResult<Vec<Uid>> {
        let mut inner = self.write()?;
        inner.mailbox(to)?;
        let source = inner.mailbox(from)?;
        let copies: Vec<StoredMessage> = uids
            .iter()
            .filter_map(|&uid| source.message(uid).ok())
            .map(|m| StoredMessage {
                recent: true,
                ..m.clone()
            })
            .collect();

        let target = inner.mailbox_mut(to)?;
        Ok(copies.into_iter().map(|m| target.push(m)).collect())
    }

    fn create(&self, _user: &str, mailbox: &str) -> StoreResult<()> {
        if owner_of(mailbox).is_none() {
            return Err(StoreError::Invalid(format!(
                "Mailbox names must start with {NAMESPACE_PREFIX}{SEPARATOR}<user>"
            )));
        }
        let mut inner = self.write()?;
        if inner.mailboxes.contains_key(mailbox) {
            return Err(StoreError::AlreadyExists(mailbox.to_string()));
        }
        let data = inner.new_mailbox();
        inner.mailboxes.insert(mailbox.to_string(), data);
        debug!(mailbox, "mailbox created");
        Ok(())
    }

    fn delete(&self, _user: &str, mailbox: &str) -> StoreResult<()> {
        let mut inner = self.write()?;
        inner
            .mailboxes
            .remove(mailbox)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(mailbox.to_string()))
    }

    fn rename(&self, _user: &str, from: &str, to: &str) -> StoreResult<()> {
        let mut inner = self.write()?;
        inner.mailbox(from)?;
        if inner.mailboxes.contains_key(to) {
            return Err(StoreError::AlreadyExists(to.to_string()));
        }

        let child_prefix = format!("{from}{SEPARATOR}");
        let moving: Vec<String> = inner
            .mailboxes
            .keys()
            .filter(|name| *name == from || name.starts_with(&child_prefix))
            .cloned()
            .collect();
        for old in moving {
            if let Some(data) = inner.mailboxes.remove(&old) {
                let new = format!("{to}{}", &old[from.len()..]);
                inner.mailboxes.insert(new, data);
            }
        }
        Ok(())
    }

    fn list(&self, user: &str) -> StoreResult<Vec<String>> {
        let inner = self.read()?;
        Ok(inner
            .mailboxes
            .iter()
            .filter(|(name, data)| rights_in(user, name, data).contains(Rights::LOOKUP))
            .map(|(name, _)| name.clone())
            .collect())
    }

    fn subscribe(&self, user: &str, mailbox: &str) -> StoreResult<()> {
        let mut inner = self.write()?;
        inner
            .subscriptions
            .entry(user.to_string())
            .or_default()
            .insert(mailbox.to_string());
        Ok(())
    }

    fn unsubscribe(&self, user: &str, mailbox: &str) -> StoreResult<()> {
        let mut inner = self.write()?;
        let removed = inner
            .subscriptions
            .get_mut(user)
            .is_some_and(|set| set.remove(mailbox));
        if removed {
            Ok(())
        } else {
            Err(StoreError::NotFound(mailbox.to_string()))
        }
    }

    fn subscriptions(&self, user: &str) -> StoreResult<Vec<String>> {
        let inner = self.read()?;
        Ok(inner
            .subscriptions
            .get(user)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn acl(&self, _user: &str, mailbox: &str) -> StoreResult<Vec<(String, Rights)>> {
        let inner = self.read()?;
        let data = inner.mailbox(mailbox)?;
        let mut entries = Vec::with_capacity(data.acl.len() + 1);
        if let Some(owner) = owner_of(mailbox) {
            entries.push((owner.to_string(), Rights::ALL));
        }
        entries.extend(
            data.acl
                .iter()
                .filter(|(id, _)| Some(id.as_str()) != owner_of(mailbox))
                .map(|(id, rights)| (id.clone(), *rights)),
        );
        Ok(entries)
    }

    fn set_acl(
        &self,
        _user: &str,
        mailbox: &str,
        identifier: &str,
        change: RightsChange,
    ) -> StoreResult<()> {
        if owner_of(mailbox) == Some(identifier) {
            return Err(StoreError::Invalid(
                "The owner's rights cannot be changed".to_string(),
            ));
        }
        let mut inner = self.write()?;
        let data = inner.mailbox_mut(mailbox)?;
        let current = data.acl.get(identifier).copied().unwrap_or_default();
        let updated = change.apply(current);
        if updated.is_empty() {
            data.acl.remove(identifier);
        } else {
            data.acl.insert(identifier.to_string(), updated);
        }
        Ok(())
    }

    fn delete_acl(&self, _user: &str, mailbox: &str, identifier: &str) -> StoreResult<()> {
        let mut inner = self.write()?;
        inner.mailbox_mut(mailbox)?.acl.remove(identifier);
        Ok(())
    }

    fn list_rights(
        &self,
        _user: &str,
        mailbox: &str,
        identifier: &str,
    ) -> StoreResult<(Rights, Vec<Rights>)> {
        let inner = self.read()?;
        inner.mailbox(mailbox)?;
        if owner_of(mailbox) == Some(identifier) {
            return Ok((Rights::ALL, Vec::new()));
        }
        let optional = "lrswipcda"
            .chars()
            .filter_map(|c| Rights::parse(&c.to_string()))
            .collect();
        Ok((Rights::NONE, optional))
    }

    fn register_listener(&self, _user: &str, mailbox: &str) -> StoreResult<ListenerId> {
        let mut inner = self.write()?;
        inner.mailbox(mailbox)?;
        inner.next_listener += 1;
        let id = ListenerId(inner.next_listener);
        inner.listeners.insert(id, mailbox.to_string());
        Ok(id)
    }

    fn unregister_listener(&self, id: ListenerId) {
        if let Ok(mut inner) = self.write() {
            inner.listeners.remove(&id);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const INBOX: &str = "#mail.bob.INBOX";
    const MESSAGE: &[u8] = b"From: alice@example.org\r\nSubject: Hi\r\n\r\nHello\r\n";

    fn store() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.add_user("bob").unwrap();
        store
    }

    mod message_tests {
        use super::*;

        #[test]
        fn append_assigns_ascending_uids() {
            let store = store();
            let a = store.append("bob", INBOX, &Flags::new(), None, MESSAGE).unwrap();
            let b = store.append("bob", INBOX, &Flags::new(), None, MESSAGE).unwrap();
            assert!(a < b);
            assert_eq!(store.uids("bob", INBOX).unwrap(), vec![a, b]);
            let status = store.status("bob", INBOX).unwrap();
            assert_eq!(status.exists, 2);
            assert_eq!(status.recent, 2);
            assert_eq!(status.unseen, 2);
            assert_eq!(status.uid_next.get(), b.get() + 1);
        }

        #[test]
        fn claiming_recent_clears_it() {
            let store = store();
            store.append("bob", INBOX, &Flags::new(), None, MESSAGE).unwrap();
            assert_eq!(store.recent_uids("bob", INBOX, false).unwrap().len(), 1);
            assert_eq!(store.recent_uids("bob", INBOX, true).unwrap().len(), 1);
            assert!(store.recent_uids("bob", INBOX, true).unwrap().is_empty());
        }

        #[test]
        fn store_flags_and_expunge() {
            let store = store();
            let uid = store.append("bob", INBOX, &Flags::new(), None, MESSAGE).unwrap();
            let deleted = Flags::from_vec(vec![Flag::Deleted, Flag::Recent]);
            let flags = store
                .store_flags("bob", INBOX, uid, FlagOp::Add, &deleted)
                .unwrap();
            assert!(flags.is_deleted());
            assert!(!flags.contains(&Flag::Recent));
            assert_eq!(store.expunge("bob", INBOX).unwrap(), vec![uid]);
            assert!(store.uids("bob", INBOX).unwrap().is_empty());
        }

        #[test]
        fn attributes_and_header() {
            let store = store();
            let uid = store.append("bob", INBOX, &Flags::new(), None, MESSAGE).unwrap();
            let attributes = store.attributes("bob", INBOX, uid).unwrap();
            assert_eq!(attributes.size as usize, MESSAGE.len());
            assert_eq!(attributes.envelope.subject.as_deref(), Some("Hi"));
            let header = store.header("bob", INBOX, uid).unwrap();
            assert!(header.ends_with(b"\r\n\r\n"));
        }

        #[test]
        fn message_shares_stored_buffer() {
            let store = store();
            let uid = store.append("bob", INBOX, &Flags::new(), None, MESSAGE).unwrap();
            let first = store.message("bob", INBOX, uid).unwrap();
            let second = store.message("bob", INBOX, uid).unwrap();
            assert_eq!(first, MESSAGE);
            assert_eq!(first.as_ptr(), second.as_ptr());
            assert_eq!(store.header("bob", INBOX, uid).unwrap().as_ptr(), first.as_ptr());
        }

        #[test]
        fn copy_keeps_flags_and_marks_recent() {
            let store = store();
            store.create("bob", "#mail.bob.Archive").unwrap();
            let seen = Flags::from_vec(vec![Flag::Seen]);
            let uid = store.append("bob", INBOX, &seen, None, MESSAGE).unwrap();
            let copied = store
                .copy("bob", INBOX, &[uid], "#mail.bob.Archive")
                .unwrap();
            assert_eq!(copied.len(), 1);
            let flags = store.flags("bob", "#mail.bob.Archive", copied[0]).unwrap();
            assert!(flags.is_seen());
            assert_eq!(
                store.recent_uids("bob", "#mail.bob.Archive", false).unwrap(),
                copied
            );
        }

        #[test]
        fn copy_to_missing_mailbox() {
            let store = store();
            let err = store.copy("bob", INBOX, &[], "#mail.bob.Nope").unwrap_err();
            assert_eq!(err, StoreError::NotFound("#mail.bob.Nope".into()));
        }
    }

    mod mailbox_tests {
        use super::*;

        #[test]
        fn recreated_mailbox_gets_new_validity() {
            let store = store();
            store.create("bob", "#mail.bob.Tmp").unwrap();
            let first = store.status("bob", "#mail.bob.Tmp").unwrap().uid_validity;
            store.delete("bob", "#mail.bob.Tmp").unwrap();
            store.create("bob", "#mail.bob.Tmp").unwrap();
            let second = store.status("bob", "#mail.bob.Tmp").unwrap().uid_validity;
            assert_ne!(first, second);
        }

        #[test]
        fn rename_moves_children() {
            let store = store();
            store.create("bob", "#mail.bob.work").unwrap();
            store.create("bob", "#mail.bob.work.2024").unwrap();
            store.create("bob", "#mail.bob.workshop").unwrap();
            store.rename("bob", "#mail.bob.work", "#mail.bob.jobs").unwrap();
            let names = store.list("bob").unwrap();
            assert!(names.contains(&"#mail.bob.jobs".to_string()));
            assert!(names.contains(&"#mail.bob.jobs.2024".to_string()));
            assert!(names.contains(&"#mail.bob.workshop".to_string()));
            assert!(!names.contains(&"#mail.bob.work".to_string()));
        }

        #[test]
        fn create_existing_fails() {
            let store = store();
            assert_eq!(
                store.create("bob", INBOX).unwrap_err(),
                StoreError::AlreadyExists(INBOX.into())
            );
        }

        #[test]
        fn subscriptions() {
            let store = store();
            store.subscribe("bob", INBOX).unwrap();
            assert_eq!(store.subscriptions("bob").unwrap(), vec![INBOX.to_string()]);
            store.unsubscribe("bob", INBOX).unwrap();
            assert!(store.unsubscribe("bob", INBOX).is_err());
        }
    }

    mod acl_tests {
        use super::*;

        #[test]
        fn owner_has_everything() {
            let store = store();
            assert_eq!(store.rights("bob", INBOX).unwrap(), Rights::ALL);
            assert_eq!(store.rights("bob", "#mail.bob.Missing").unwrap(), Rights::ALL);
            assert!(store.rights("alice", "#mail.bob.Missing").is_err());
        }

        #[test]
        fn granted_rights_and_anyone() {
            let store = store();
            assert_eq!(store.rights("alice", INBOX).unwrap(), Rights::NONE);
            let lr = Rights::parse("lr").unwrap();
            store
                .set_acl("bob", INBOX, "alice", RightsChange::Replace(lr))
                .unwrap();
            assert_eq!(store.rights("alice", INBOX).unwrap(), lr);
            store
                .set_acl("bob", INBOX, ANYONE, RightsChange::Add(Rights::SEEN))
                .unwrap();
            assert!(store.rights("carol", INBOX).unwrap().contains(Rights::SEEN));
            assert_eq!(store.list("alice").unwrap(), vec![INBOX.to_string()]);

            let acl = store.acl("bob", INBOX).unwrap();
            assert_eq!(acl[0], ("bob".to_string(), Rights::ALL));
            assert_eq!(acl.len(), 3);

            store.delete_acl("bob", INBOX, "alice").unwrap();
            assert!(!store.rights("alice", INBOX).unwrap().contains(Rights::READ));
        }

        #[test]
        fn owner_rights_are_fixed() {
            let store = store();
            assert!(
                store
                    .set_acl("bob", INBOX, "bob", RightsChange::Remove(Rights::READ))
                    .is_err()
            );
        }
    }

    #[test]
    fn listeners_are_counted() {
        let store = store();
        let a = store.register_listener("bob", INBOX).unwrap();
        let _b = store.register_listener("bob", INBOX).unwrap();
        assert_eq!(store.listener_count(INBOX), 2);
        store.unregister_listener(a);
        assert_eq!(store.listener_count(INBOX), 1);
    }
}
