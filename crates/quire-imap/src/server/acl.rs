//! Access control commands: GETACL, SETACL, DELETEACL, LISTRIGHTS and
//! MYRIGHTS.

use tracing::info;

use super::{CommandError, Completion, Context, HandlerResult, NO_ACCESS, logged_in};
use crate::parser::Command;
use crate::response::{Responder, Response};
use crate::session::{LoggedIn, Session};
use crate::types::{Rights, RightsChange};

/// Resolves the mailbox and checks the administer right. Users who cannot
/// even see the mailbox get the same answer as for a missing one.
fn administered(ctx: &Context, login: &LoggedIn, mailbox: &str) -> Result<String, CommandError> {
    let name = login.namespace.full_name(mailbox);
    let rights = ctx.store.rights(&login.user, &name)?;
    if rights.contains(Rights::ADMIN) {
        Ok(name)
    } else if rights.intersects(Rights::LOOKUP.union(Rights::READ)) {
        Err(CommandError::no("Permission denied"))
    } else {
        Err(CommandError::no(NO_ACCESS))
    }
}

pub(super) fn get_acl<R: Responder>(
    session: &mut Session,
    ctx: &Context,
    command: &Command,
    mailbox: &str,
    out: &mut R,
) -> HandlerResult {
    let login = logged_in(session)?;
    let name = administered(ctx, login, mailbox)?;
    let entries = ctx.store.acl(&login.user, &name)?;
    out.send(Response::Acl {
        mailbox: mailbox.to_string(),
        entries,
    });
    Ok(Completion::done(command))
}

pub(super) fn set_acl(
    session: &mut Session,
    ctx: &Context,
    command: &Command,
    mailbox: &str,
    identifier: &str,
    change: RightsChange,
) -> HandlerResult {
    let login = logged_in(session)?;
    let name = administered(ctx, login, mailbox)?;
    ctx.store.set_acl(&login.user, &name, identifier, change)?;
    info!(mailbox = %name, identifier, ?change, "acl changed");
    Ok(Completion::done(command))
}

pub(super) fn delete_acl(
    session: &mut Session,
    ctx: &Context,
    command: &Command,
    mailbox: &str,
    identifier: &str,
) -> HandlerResult {
    let login = logged_in(session)?;
    let name = administered(ctx, login, mailbox)?;
    ctx.store.delete_acl(&login.user, &name, identifier)?;
    info!(mailbox = %name, identifier, "acl entry removed");
    Ok(Completion::done(command))
}

pub(super) fn list_rights<R: Responder>(
    session: &mut Session,
    ctx: &Context,
    command: &Command,
    mailbox: &str,
    identifier: &str,
    out: &mut R,
) -> HandlerResult {
    let login = logged_in(session)?;
    let name = administered(ctx, login, mailbox)?;
    let (required, optional) = ctx.store.list_rights(&login.user, &name, identifier)?;
    out.send(Response::ListRights {
        mailbox: mailbox.to_string(),
        identifier: identifier.to_string(),
        required,
        optional,
    });
    Ok(Completion::done(command))
}

/// Needs no particular right, but a user with no rights at all learns
/// nothing about the mailbox.
pub(super) fn my_rights<R: Responder>(
    session: &mut Session,
    ctx: &Context,
    command: &Command,
    mailbox: &str,
    out: &mut R,
) -> HandlerResult {
    let login = logged_in(session)?;
    let name = login.namespace.full_name(mailbox);
    let rights = ctx.store.rights(&login.user, &name)?;
    if rights.is_empty() {
        return Err(CommandError::no(NO_ACCESS));
    }
    // Existence check: a folder the user could create is not a mailbox yet.
    ctx.store.status(&login.user, &name)?;
    out.send(Response::MyRights {
        mailbox: mailbox.to_string(),
        rights,
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

    fn wire(out: &[Response]) -> Vec<String> {
        out.iter()
            .map(|r| String::from_utf8(r.to_bytes().to_vec()).unwrap())
            .collect()
    }

    #[test]
    fn owner_manages_own_inbox() {
        let (ctx, store, mut session) = setup();
        set_acl(
            &mut session,
            &ctx,
            &command("a1 SETACL INBOX alice +lr"),
            "INBOX",
            "alice",
            RightsChange::Add(Rights::parse("lr").unwrap()),
        )
        .unwrap();
        assert!(
            store
                .rights("alice", "#mail.bob.INBOX")
                .unwrap()
                .contains(Rights::READ)
        );

        let mut out = Vec::new();
        get_acl(&mut session, &ctx, &command("a2 GETACL INBOX"), "INBOX", &mut out).unwrap();
        assert_eq!(wire(&out), vec!["* ACL INBOX bob lrswipcda alice lr\r\n"]);

        delete_acl(
            &mut session,
            &ctx,
            &command("a3 DELETEACL INBOX alice"),
            "INBOX",
            "alice",
        )
        .unwrap();
        assert!(store.rights("alice", "#mail.bob.INBOX").unwrap().is_empty());
    }

    #[test]
    fn getacl_needs_administer() {
        let (ctx, store, mut session) = setup();
        let mut out = Vec::new();
        let hidden = get_acl(
            &mut session,
            &ctx,
            &command("a1 GETACL #mail.alice.INBOX"),
            "#mail.alice.INBOX",
            &mut out,
        )
        .unwrap_err();
        assert_eq!(hidden.to_string(), NO_ACCESS);

        store
            .set_acl(
                "alice",
                "#mail.alice.INBOX",
                "bob",
                RightsChange::Replace(Rights::parse("lr").unwrap()),
            )
            .unwrap();
        let visible = get_acl(
            &mut session,
            &ctx,
            &command("a2 GETACL #mail.alice.INBOX"),
            "#mail.alice.INBOX",
            &mut out,
        )
        .unwrap_err();
        assert_eq!(visible.to_string(), "Permission denied");
        assert!(out.is_empty());
    }

    #[test]
    fn myrights_reports_granted_rights() {
        let (ctx, store, mut session) = setup();
        store
            .set_acl(
                "alice",
                "#mail.alice.INBOX",
                "bob",
                RightsChange::Replace(Rights::parse("lrs").unwrap()),
            )
            .unwrap();
        let mut out = Vec::new();
        my_rights(
            &mut session,
            &ctx,
            &command("a1 MYRIGHTS #mail.alice.INBOX"),
            "#mail.alice.INBOX",
            &mut out,
        )
        .unwrap();
        assert_eq!(wire(&out), vec!["* MYRIGHTS #mail.alice.INBOX lrs\r\n"]);
    }

    #[test]
    fn myrights_on_missing_mailbox() {
        let (ctx, _, mut session) = setup();
        let mut out = Vec::new();
        let err = my_rights(&mut session, &ctx, &command("a1 MYRIGHTS Nope"), "Nope", &mut out)
            .unwrap_err();
        assert_eq!(err.to_string(), NO_ACCESS);
    }

    #[test]
    fn listrights_for_other_user() {
        let (ctx, _, mut session) = setup();
        let mut out = Vec::new();
        list_rights(
            &mut session,
            &ctx,
            &command("a1 LISTRIGHTS INBOX alice"),
            "INBOX",
            "alice",
            &mut out,
        )
        .unwrap();
        assert_eq!(
            wire(&out),
            vec!["* LISTRIGHTS INBOX alice \"\" l r s w i p c d a\r\n"]
        );
    }
}
