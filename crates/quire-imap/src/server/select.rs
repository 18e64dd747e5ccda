//! SELECT, EXAMINE, CHECK, CLOSE and EXPUNGE.

use std::collections::BTreeSet;

use tracing::{debug, info};

use super::{CommandError, Completion, Context, HandlerResult, NO_ACCESS, logged_in, selection};
use crate::parser::Command;
use crate::response::{Responder, Response, Status};
use crate::session::{SelectedMailbox, Session, SessionState, Snapshot};
use crate::types::{Flag, ResponseCode, Rights, Uid};

pub(super) fn select<R: Responder>(
    session: &mut Session,
    ctx: &Context,
    command: &Command,
    mailbox: &str,
    examine: bool,
    out: &mut R,
) -> HandlerResult {
    if let Some(previous) = session.deselect() {
        debug!(mailbox = %previous.name, "deselected");
        ctx.store.unregister_listener(previous.listener);
    }

    let login = logged_in(session)?;
    let user = login.user.as_str();
    let name = login.namespace.full_name(mailbox);

    let rights = ctx.store.rights(user, &name)?;
    if !rights.contains(Rights::READ) {
        return Err(CommandError::no(NO_ACCESS));
    }
    let read_only = examine || !rights.can_modify();

    let status = ctx.store.status(user, &name)?;
    let uids = ctx.store.uids(user, &name)?;
    let recent: BTreeSet<_> = ctx
        .store
        .recent_uids(user, &name, !read_only)?
        .into_iter()
        .filter(|uid| uids.binary_search(uid).is_ok())
        .collect();
    let first_unseen = if status.unseen > 0 {
        first_unseen(ctx, user, &name, &uids)?
    } else {
        None
    };

    let snapshot = Snapshot::new(uids, u32::try_from(recent.len()).unwrap_or(u32::MAX));
    out.send(Response::Flags(Flag::permanent()));
    out.send(Response::Exists(snapshot.exists()));
    out.send(Response::Recent(snapshot.recent));
    if let Some(msn) = first_unseen {
        out.send(Response::untagged(
            Status::Ok,
            Some(ResponseCode::Unseen(msn)),
            format!("Message {msn} is first unseen"),
        ));
    }
    let permanent = if read_only { Vec::new() } else { Flag::permanent() };
    out.send(Response::untagged(
        Status::Ok,
        Some(ResponseCode::PermanentFlags {
            keywords: !read_only,
            flags: permanent,
        }),
        if read_only {
            "No permanent flags permitted"
        } else {
            "Limited"
        },
    ));
    out.send(Response::untagged(
        Status::Ok,
        Some(ResponseCode::UidValidity(status.uid_validity)),
        "UIDs valid",
    ));
    out.send(Response::untagged(
        Status::Ok,
        Some(ResponseCode::UidNext(status.uid_next)),
        "Predicted next UID",
    ));

    let listener = ctx.store.register_listener(user, &name)?;
    info!(mailbox = %name, read_only, exists = snapshot.exists(), "mailbox selected");
    session.state = SessionState::Selected(SelectedMailbox {
        name,
        read_only,
        uid_validity: status.uid_validity,
        snapshot,
        recent,
        listener,
    });

    let code = if read_only {
        ResponseCode::ReadOnly
    } else {
        ResponseCode::ReadWrite
    };
    Ok(Completion::done(command).with_code(code))
}

fn first_unseen(
    ctx: &Context,
    user: &str,
    mailbox: &str,
    uids: &[Uid],
) -> Result<Option<u32>, CommandError> {
    for (index, &uid) in uids.iter().enumerate() {
        if !ctx.store.flags(user, mailbox, uid)?.is_seen() {
            return Ok(u32::try_from(index + 1).ok());
        }
    }
    Ok(None)
}

pub(super) fn check(session: &mut Session, ctx: &Context, command: &Command) -> HandlerResult {
    let (login, selected) = selection(session)?;
    ctx.store.check(&login.user, &selected.name)?;
    Ok(Completion::done(command))
}

/// Deselects, first removing `\Deleted` messages when the mailbox is
/// writable. No EXPUNGE responses are sent.
pub(super) fn close(session: &mut Session, ctx: &Context, command: &Command) -> HandlerResult {
    let (login, selected) = selection(session)?;
    let user = login.user.clone();
    let name = selected.name.clone();
    let read_only = selected.read_only;

    if let Some(selected) = session.deselect() {
        ctx.store.unregister_listener(selected.listener);
    }
    if !read_only && ctx.store.rights(&user, &name)?.contains(Rights::DELETE) {
        let removed = ctx.store.expunge(&user, &name)?;
        debug!(mailbox = %name, count = removed.len(), "expunged on close");
    }
    Ok(Completion::done(command))
}

/// Removes `\Deleted` messages. The EXPUNGE responses are produced by the
/// reconciler before the tagged OK.
pub(super) fn expunge(session: &mut Session, ctx: &Context, command: &Command) -> HandlerResult {
    let (login, selected) = selection(session)?;
    if selected.read_only {
        return Err(CommandError::no_with(
            ResponseCode::ReadOnly,
            "Mailbox is read-only",
        ));
    }
    if !ctx
        .store
        .rights(&login.user, &selected.name)?
        .contains(Rights::DELETE)
    {
        return Err(CommandError::no("Permission denied"));
    }
    let removed = ctx.store.expunge(&login.user, &selected.name)?;
    debug!(mailbox = %selected.name, count = removed.len(), "expunged");
    Ok(Completion::done(command))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backend::{InMemoryStore, StaticAuthenticator};
    use crate::connection::ServerConfig;
    use crate::parser::{CommandKind, ParserConfig, parse};
    use crate::store::MailStore;
    use crate::types::{Flags, RightsChange};

    const MESSAGE: &[u8] = b"Subject: hi\r\n\r\nbody\r\n";

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

    fn run_select(
        session: &mut Session,
        ctx: &Context,
        line: &str,
    ) -> (Vec<Response>, HandlerResult) {
        let command = command(line);
        let mut out = Vec::new();
        let (mailbox, examine) = match &command.kind {
            CommandKind::Select { mailbox } => (mailbox.clone(), false),
            CommandKind::Examine { mailbox } => (mailbox.clone(), true),
            _ => unreachable!(),
        };
        let result = select(session, ctx, &command, &mailbox, examine, &mut out);
        (out, result)
    }

    #[test]
    fn select_reports_counts_and_read_write() {
        let (ctx, store, mut session) = setup();
        let seen = Flags::from_vec(vec![Flag::Seen]);
        store.append("bob", "#mail.bob.INBOX", &seen, None, MESSAGE).unwrap();
        store.append("bob", "#mail.bob.INBOX", &Flags::new(), None, MESSAGE).unwrap();

        let (out, result) = run_select(&mut session, &ctx, "a1 SELECT INBOX");
        let completion = result.unwrap();
        assert_eq!(completion.code, Some(ResponseCode::ReadWrite));
        assert_eq!(completion.text, "SELECT completed");
        assert!(out.contains(&Response::Exists(2)));
        assert!(out.contains(&Response::Recent(2)));
        assert!(out.iter().any(|r| matches!(
            r,
            Response::Untagged { code: Some(ResponseCode::Unseen(2)), .. }
        )));

        let selected = session.selected().unwrap();
        assert!(!selected.read_only);
        assert_eq!(selected.snapshot.exists(), 2);
        assert!(store.recent_uids("bob", "#mail.bob.INBOX", false).unwrap().is_empty());
    }

    #[test]
    fn examine_is_read_only_and_leaves_recent() {
        let (ctx, store, mut session) = setup();
        store.append("bob", "#mail.bob.INBOX", &Flags::new(), None, MESSAGE).unwrap();

        let (_, result) = run_select(&mut session, &ctx, "a1 EXAMINE INBOX");
        assert_eq!(result.unwrap().code, Some(ResponseCode::ReadOnly));
        assert!(session.selected().unwrap().read_only);
        assert_eq!(store.recent_uids("bob", "#mail.bob.INBOX", false).unwrap().len(), 1);
    }

    #[test]
    fn missing_and_forbidden_look_the_same() {
        let (ctx, _, mut session) = setup();
        let (_, missing) = run_select(&mut session, &ctx, "a1 SELECT Nope");
        let (_, forbidden) = run_select(&mut session, &ctx, "a2 SELECT #mail.alice.INBOX");
        let text = |r: HandlerResult| match r {
            Err(CommandError::No { text, .. }) => text,
            _ => panic!("expected NO"),
        };
        assert_eq!(text(missing), text(forbidden));
    }

    #[test]
    fn select_without_write_rights_is_read_only() {
        let (ctx, store, mut session) = setup();
        store
            .set_acl(
                "alice",
                "#mail.alice.INBOX",
                "bob",
                RightsChange::Replace(Rights::parse("lr").unwrap()),
            )
            .unwrap();
        let (_, result) = run_select(&mut session, &ctx, "a1 SELECT #mail.alice.INBOX");
        assert_eq!(result.unwrap().code, Some(ResponseCode::ReadOnly));
    }

    #[test]
    fn failed_select_still_deselects() {
        let (ctx, store, mut session) = setup();
        let _ = run_select(&mut session, &ctx, "a1 SELECT INBOX");
        assert_eq!(store.listener_count("#mail.bob.INBOX"), 1);

        let (_, result) = run_select(&mut session, &ctx, "a2 SELECT Nope");
        assert!(result.is_err());
        assert!(matches!(session.state, SessionState::Authenticated));
        assert_eq!(store.listener_count("#mail.bob.INBOX"), 0);
    }

    #[test]
    fn close_expunges_silently() {
        let (ctx, store, mut session) = setup();
        let deleted = Flags::from_vec(vec![Flag::Deleted]);
        store.append("bob", "#mail.bob.INBOX", &deleted, None, MESSAGE).unwrap();
        let _ = run_select(&mut session, &ctx, "a1 SELECT INBOX");

        let completion = close(&mut session, &ctx, &command("a2 CLOSE")).unwrap();
        assert_eq!(completion.text, "CLOSE completed");
        assert!(session.selected().is_none());
        assert!(store.uids("bob", "#mail.bob.INBOX").unwrap().is_empty());
    }

    #[test]
    fn expunge_refused_when_read_only() {
        let (ctx, _, mut session) = setup();
        let _ = run_select(&mut session, &ctx, "a1 EXAMINE INBOX");
        let err = expunge(&mut session, &ctx, &command("a2 EXPUNGE")).unwrap_err();
        assert!(matches!(
            err,
            CommandError::No { code: Some(ResponseCode::ReadOnly), .. }
        ));
    }
}
