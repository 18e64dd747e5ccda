//! Mailbox management: CREATE, DELETE, RENAME, SUBSCRIBE, UNSUBSCRIBE,
//! LIST, LSUB, STATUS, APPEND and NAMESPACE.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use tracing::{debug, info};

use super::{CommandError, Completion, Context, HandlerResult, NO_ACCESS, logged_in};
use crate::parser::Command;
use crate::response::{Responder, Response};
use crate::session::{Namespace, Session};
use crate::store::StoreError;
use crate::types::{Flags, MailboxAttribute, ResponseCode, Rights, StatusItem};

/// The mailbox one level up, or `None` at the top of the hierarchy.
fn parent(name: &str, separator: char) -> Option<&str> {
    name.rsplit_once(separator).map(|(parent, _)| parent)
}

/// Resolves a name for CREATE and RENAME targets. A trailing separator only
/// says the client intends to create children.
fn target_name(namespace: &Namespace, mailbox: &str) -> String {
    let trimmed = mailbox
        .strip_suffix(namespace.separator())
        .filter(|rest| !rest.is_empty())
        .unwrap_or(mailbox);
    namespace.full_name(trimmed)
}

fn require(rights: Rights, needed: Rights) -> Result<(), CommandError> {
    if rights.contains(needed) {
        Ok(())
    } else {
        Err(CommandError::no("Permission denied"))
    }
}

/// Checks the `c` right on the parent of a mailbox about to be created.
fn check_create(ctx: &Context, user: &str, namespace: &Namespace, name: &str) -> Result<(), CommandError> {
    let parent = parent(name, namespace.separator()).unwrap_or(name);
    require(ctx.store.rights(user, parent)?, Rights::CREATE)
}

pub(super) fn create(
    session: &mut Session,
    ctx: &Context,
    command: &Command,
    mailbox: &str,
) -> HandlerResult {
    let login = logged_in(session)?;
    let name = target_name(&login.namespace, mailbox);
    check_create(ctx, &login.user, &login.namespace, &name)?;
    ctx.store.create(&login.user, &name)?;
    info!(mailbox = %name, "mailbox created");
    Ok(Completion::done(command))
}

pub(super) fn delete(
    session: &mut Session,
    ctx: &Context,
    command: &Command,
    mailbox: &str,
) -> HandlerResult {
    let login = logged_in(session)?;
    let name = login.namespace.full_name(mailbox);
    if name == login.namespace.inbox() {
        return Err(CommandError::no("Cannot delete INBOX"));
    }
    require(ctx.store.rights(&login.user, &name)?, Rights::DELETE)?;
    ctx.store.delete(&login.user, &name)?;
    info!(mailbox = %name, "mailbox deleted");
    Ok(Completion::done(command))
}

pub(super) fn rename(
    session: &mut Session,
    ctx: &Context,
    command: &Command,
    from: &str,
    to: &str,
) -> HandlerResult {
    let login = logged_in(session)?;
    let old = login.namespace.full_name(from);
    if old == login.namespace.inbox() {
        return Err(CommandError::no("Renaming INBOX is not supported"));
    }
    let new = target_name(&login.namespace, to);
    require(ctx.store.rights(&login.user, &old)?, Rights::DELETE)?;
    check_create(ctx, &login.user, &login.namespace, &new)?;
    ctx.store.rename(&login.user, &old, &new)?;
    info!(from = %old, to = %new, "mailbox renamed");
    Ok(Completion::done(command))
}

pub(super) fn subscribe(
    session: &mut Session,
    ctx: &Context,
    command: &Command,
    mailbox: &str,
) -> HandlerResult {
    let login = logged_in(session)?;
    let name = login.namespace.full_name(mailbox);
    ctx.store.subscribe(&login.user, &name)?;
    Ok(Completion::done(command))
}

pub(super) fn unsubscribe(
    session: &mut Session,
    ctx: &Context,
    command: &Command,
    mailbox: &str,
) -> HandlerResult {
    let login = logged_in(session)?;
    let name = login.namespace.full_name(mailbox);
    ctx.store
        .unsubscribe(&login.user, &name)
        .map_err(|e| match e {
            StoreError::NotFound(_) => CommandError::no("Not subscribed to that mailbox"),
            other => other.into(),
        })?;
    Ok(Completion::done(command))
}

/// Matches a LIST pattern against a name: `*` matches anything, `%`
/// anything but the hierarchy separator.
fn matches(pattern: &[u8], name: &[u8], separator: u8) -> bool {
    match pattern.split_first() {
        None => name.is_empty(),
        Some((b'*', rest)) => (0..=name.len()).any(|i| matches(rest, &name[i..], separator)),
        Some((b'%', rest)) => {
            let level = name.iter().position(|&b| b == separator).unwrap_or(name.len());
            (0..=level).any(|i| matches(rest, &name[i..], separator))
        }
        Some((&p, rest)) => name
            .split_first()
            .is_some_and(|(&n, tail)| n == p && matches(rest, tail, separator)),
    }
}

/// Absolute form of a LIST reference and pattern.
fn full_pattern(namespace: &Namespace, reference: &str, pattern: &str) -> String {
    let separator = namespace.separator();
    let combined = if reference.is_empty() || pattern.starts_with(['#', separator]) {
        pattern.to_string()
    } else if reference.ends_with(separator) {
        format!("{reference}{pattern}")
    } else {
        format!("{reference}{separator}{pattern}")
    };
    namespace.full_name(&combined)
}

pub(super) fn list<R: Responder>(
    session: &mut Session,
    ctx: &Context,
    command: &Command,
    reference: &str,
    pattern: &str,
    out: &mut R,
) -> HandlerResult {
    let login = logged_in(session)?;
    let namespace = &login.namespace;
    let separator = namespace.separator();

    if pattern.is_empty() {
        out.send(Response::List {
            attributes: vec![MailboxAttribute::NoSelect],
            delimiter: Some(separator),
            name: String::new(),
        });
        return Ok(Completion::done(command));
    }

    // Existing mailboxes, plus every missing level above them as \Noselect.
    let mut names: BTreeMap<String, bool> = BTreeMap::new();
    for name in ctx.store.list(&login.user)? {
        let mut level = parent(&name, separator);
        while let Some(above) = level.filter(|p| p.contains(separator)) {
            names.entry(above.to_string()).or_insert(false);
            level = parent(above, separator);
        }
        names.insert(name, true);
    }

    let pattern = full_pattern(namespace, reference, pattern);
    let separator_byte = u8::try_from(separator).unwrap_or(b'.');
    for (name, selectable) in names {
        if !matches(pattern.as_bytes(), name.as_bytes(), separator_byte) {
            continue;
        }
        let attributes = if selectable {
            Vec::new()
        } else {
            vec![MailboxAttribute::NoSelect]
        };
        out.send(Response::List {
            attributes,
            delimiter: Some(separator),
            name: namespace.display_name(&name),
        });
    }
    Ok(Completion::done(command))
}

pub(super) fn lsub<R: Responder>(
    session: &mut Session,
    ctx: &Context,
    command: &Command,
    reference: &str,
    pattern: &str,
    out: &mut R,
) -> HandlerResult {
    let login = logged_in(session)?;
    let namespace = &login.namespace;
    let separator = namespace.separator();
    let existing = ctx.store.list(&login.user)?;

    let pattern = full_pattern(namespace, reference, pattern);
    let separator_byte = u8::try_from(separator).unwrap_or(b'.');
    let mut subscribed = ctx.store.subscriptions(&login.user)?;
    subscribed.sort();
    for name in subscribed {
        if !matches(pattern.as_bytes(), name.as_bytes(), separator_byte) {
            continue;
        }
        let attributes = if existing.contains(&name) {
            Vec::new()
        } else {
            vec![MailboxAttribute::NoSelect]
        };
        out.send(Response::Lsub {
            attributes,
            delimiter: Some(separator),
            name: namespace.display_name(&name),
        });
    }
    Ok(Completion::done(command))
}

pub(super) fn status<R: Responder>(
    session: &mut Session,
    ctx: &Context,
    command: &Command,
    mailbox: &str,
    items: &[StatusItem],
    out: &mut R,
) -> HandlerResult {
    let login = logged_in(session)?;
    let name = login.namespace.full_name(mailbox);
    if !ctx.store.rights(&login.user, &name)?.contains(Rights::READ) {
        return Err(CommandError::no(NO_ACCESS));
    }
    let status = ctx.store.status(&login.user, &name)?;
    out.send(Response::Status {
        mailbox: mailbox.to_string(),
        items: items.iter().map(|&item| (item, item.value(&status))).collect(),
    });
    Ok(Completion::done(command))
}

pub(super) fn append(
    session: &mut Session,
    ctx: &Context,
    command: &Command,
    mailbox: &str,
    flags: &Flags,
    date: Option<DateTime<FixedOffset>>,
    message: &[u8],
) -> HandlerResult {
    let login = logged_in(session)?;
    let name = login.namespace.full_name(mailbox);
    let rights = ctx.store.rights(&login.user, &name)?;
    if !rights.contains(Rights::INSERT) {
        return Err(CommandError::no(NO_ACCESS));
    }
    let uid = ctx
        .store
        .append(&login.user, &name, flags, date, message)
        .map_err(|e| match e {
            StoreError::NotFound(_) => {
                CommandError::no_with(ResponseCode::TryCreate, "Mailbox does not exist")
            }
            other => other.into(),
        })?;
    debug!(mailbox = %name, %uid, "appended");
    Ok(Completion::done(command))
}

/// The personal namespace is the user's own folder, reached with relative
/// names; other users' folders live under `#mail.`.
pub(super) fn namespace<R: Responder>(
    session: &mut Session,
    command: &Command,
    out: &mut R,
) -> HandlerResult {
    let login = logged_in(session)?;
    let separator = login.namespace.separator();
    out.send(Response::Namespace {
        personal: vec![(String::new(), separator)],
        other: vec![(format!("{}{separator}", login.namespace.prefix()), separator)],
        shared: Vec::new(),
    });
    Ok(Completion::done(command))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backend::{InMemoryStore, StaticAuthenticator};
    use crate::connection::ServerConfig;
    use crate::parser::{ParserConfig, parse};
    use crate::store::MailStore;

    fn setup() -> (Context, Arc<InMemoryStore>, Session) {
        let store = Arc::new(InMemoryStore::new());
        store.add_user("bob").unwrap();
        store.add_user("alice").unwrap();
        let ctx = Context::new(
            store.clone(),
            Arc::new(StaticAuthenticator::new()),
            ServerConfig::default(),
        );
        let mut session = Session::new();
        session.log_in("bob");
        (ctx, store, session)
    }

    fn command(line: &str) -> Command {
        parse(line.as_bytes(), &ParserConfig::default()).unwrap()
    }

    fn listed(out: &[Response]) -> Vec<(String, bool)> {
        out.iter()
            .filter_map(|r| match r {
                Response::List {
                    attributes, name, ..
                }
                | Response::Lsub {
                    attributes, name, ..
                } => Some((name.clone(), attributes.contains(&MailboxAttribute::NoSelect))),
                _ => None,
            })
            .collect()
    }

    mod pattern_tests {
        use super::*;

        #[test]
        fn star_and_percent() {
            assert!(matches(b"#mail.bob.*", b"#mail.bob.work.2024", b'.'));
            assert!(matches(b"#mail.bob.%", b"#mail.bob.work", b'.'));
            assert!(!matches(b"#mail.bob.%", b"#mail.bob.work.2024", b'.'));
            assert!(matches(b"#mail.bob.w%k", b"#mail.bob.work", b'.'));
            assert!(!matches(b"#mail.bob.INBOX", b"#mail.bob.INBOXES", b'.'));
        }

        #[test]
        fn reference_is_joined() {
            let ns = Namespace::for_user("bob");
            assert_eq!(full_pattern(&ns, "", "*"), "#mail.bob.*");
            assert_eq!(full_pattern(&ns, "work", "%"), "#mail.bob.work.%");
            assert_eq!(full_pattern(&ns, "work.", "%"), "#mail.bob.work.%");
            assert_eq!(full_pattern(&ns, "work", "#mail.%"), "#mail.%");
            assert_eq!(full_pattern(&ns, "", "inbox"), "#mail.bob.INBOX");
        }
    }

    #[test]
    fn create_list_and_delete() {
        let (ctx, _, mut session) = setup();
        create(&mut session, &ctx, &command("a1 CREATE work.2024"), "work.2024").unwrap();
        create(&mut session, &ctx, &command("a2 CREATE Drafts."), "Drafts.").unwrap();

        let mut out = Vec::new();
        list(&mut session, &ctx, &command("a3 LIST \"\" *"), "", "*", &mut out).unwrap();
        assert_eq!(
            listed(&out),
            vec![
                ("Drafts".to_string(), false),
                ("INBOX".to_string(), false),
                ("work".to_string(), true),
                ("work.2024".to_string(), false),
            ]
        );

        delete(&mut session, &ctx, &command("a4 DELETE Drafts"), "Drafts").unwrap();
        let err = delete(&mut session, &ctx, &command("a5 DELETE inbox"), "inbox").unwrap_err();
        assert_eq!(err.to_string(), "Cannot delete INBOX");
    }

    #[test]
    fn list_with_empty_pattern_gives_delimiter() {
        let (ctx, _, mut session) = setup();
        let mut out = Vec::new();
        list(&mut session, &ctx, &command("a1 LIST \"\" \"\""), "", "", &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out[0].to_bytes().to_vec()).unwrap(),
            "* LIST (\\Noselect) \".\" \"\"\r\n"
        );
    }

    #[test]
    fn other_users_mailboxes_need_lookup_right() {
        let (ctx, store, mut session) = setup();
        let mut out = Vec::new();
        list(&mut session, &ctx, &command("a1 LIST \"\" #mail.*"), "", "#mail.*", &mut out).unwrap();
        assert!(listed(&out).iter().all(|(name, _)| !name.starts_with("#mail.alice")));

        store
            .set_acl(
                "alice",
                "#mail.alice.INBOX",
                "bob",
                crate::types::RightsChange::Replace(Rights::LOOKUP),
            )
            .unwrap();
        let mut out = Vec::new();
        list(&mut session, &ctx, &command("a2 LIST \"\" #mail.*"), "", "#mail.*", &mut out).unwrap();
        let names = listed(&out);
        assert!(names.contains(&("#mail.alice".to_string(), true)));
        assert!(names.contains(&("#mail.alice.INBOX".to_string(), false)));
    }

    #[test]
    fn rename_inbox_is_refused() {
        let (ctx, _, mut session) = setup();
        let err = rename(&mut session, &ctx, &command("a1 RENAME INBOX old"), "INBOX", "old")
            .unwrap_err();
        assert!(matches!(err, CommandError::No { .. }));
    }

    #[test]
    fn append_to_missing_mailbox_asks_to_create() {
        let (ctx, _, mut session) = setup();
        let cmd = command("a1 APPEND Nope {3}\r\nabc");
        let err = append(&mut session, &ctx, &cmd, "Nope", &Flags::new(), None, b"abc").unwrap_err();
        assert!(matches!(
            err,
            CommandError::No { code: Some(ResponseCode::TryCreate), .. }
        ));
    }

    #[test]
    fn status_echoes_the_client_name() {
        let (ctx, store, mut session) = setup();
        store
            .append("bob", "#mail.bob.INBOX", &Flags::new(), None, b"Subject: x\r\n\r\n")
            .unwrap();
        let mut out = Vec::new();
        let items = [StatusItem::Messages, StatusItem::Unseen];
        status(&mut session, &ctx, &command("a1 STATUS inbox (MESSAGES UNSEEN)"), "inbox", &items, &mut out)
            .unwrap();
        assert_eq!(
            String::from_utf8(out[0].to_bytes().to_vec()).unwrap(),
            "* STATUS inbox (MESSAGES 1 UNSEEN 1)\r\n"
        );
    }

    #[test]
    fn lsub_marks_missing_mailboxes() {
        let (ctx, store, mut session) = setup();
        store.subscribe("bob", "#mail.bob.INBOX").unwrap();
        store.subscribe("bob", "#mail.bob.Gone").unwrap();
        let mut out = Vec::new();
        lsub(&mut session, &ctx, &command("a1 LSUB \"\" *"), "", "*", &mut out).unwrap();
        assert_eq!(
            listed(&out),
            vec![("Gone".to_string(), true), ("INBOX".to_string(), false)]
        );
    }

    #[test]
    fn namespace_response() {
        let (_, _, mut session) = setup();
        let mut out = Vec::new();
        namespace(&mut session, &command("a1 NAMESPACE"), &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out[0].to_bytes().to_vec()).unwrap(),
            "* NAMESPACE ((\"\" \".\")) ((\"#mail.\" \".\")) NIL\r\n"
        );
    }
}
