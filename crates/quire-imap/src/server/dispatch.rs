//! Routes a parsed command to its handler.

use tracing::debug;

use super::{CommandError, Completion, Context, Flow, HandlerResult, acl, auth, copy, fetch};
use super::{mailbox, reconcile, search, select, store};
use crate::Result;
use crate::parser::{Command, CommandKind};
use crate::response::{Responder, Response, Status};
use crate::session::{Session, SessionState};

/// Executes one command and queues every response it produces, ending with
/// the tagged completion.
///
/// A command that is not valid in the current state is answered with BAD
/// and not executed. After an OK or NO completion in the Selected state,
/// changes made to the mailbox by other sessions are reported before the
/// tagged line.
///
/// # Errors
///
/// Returns an error only when the connection cannot continue: a failed
/// write while streaming FETCH output.
pub async fn dispatch<R: Responder>(
    session: &mut Session,
    ctx: &Context,
    command: Command,
    out: &mut R,
) -> Result<Flow> {
    debug!(
        tag = %command.tag,
        verb = command.name(),
        state = session.state.name(),
        "dispatching command"
    );

    let valid = session
        .state
        .mask()
        .is_some_and(|state| command.verb.valid_in.contains(state));
    if !valid {
        out.send(Response::tagged(
            command.tag,
            Status::Bad,
            None,
            "Command not valid in this state",
        ));
        return Ok(Flow::Continue);
    }

    let (status, code, text) = match execute(session, ctx, &command, out).await {
        Ok(Completion { code, text }) => (Status::Ok, code, text),
        Err(CommandError::No { code, text }) => (Status::No, code, text),
        Err(CommandError::Bad(text)) => {
            out.send(Response::tagged(command.tag, Status::Bad, None, text));
            return Ok(Flow::Continue);
        }
        Err(CommandError::Fatal(e)) => return Err(e),
    };

    reconcile::refresh(session, ctx, out);
    out.send(Response::tagged(command.tag, status, code, text));

    if matches!(session.state, SessionState::Logout) {
        return Ok(Flow::Close);
    }
    if matches!(command.kind, CommandKind::Login { .. }) && auth::too_many_failures(session, ctx) {
        out.send(Response::untagged(
            Status::Bye,
            None,
            "Too many failed login attempts",
        ));
        return Ok(Flow::Close);
    }
    Ok(Flow::Continue)
}

async fn execute<R: Responder>(
    session: &mut Session,
    ctx: &Context,
    command: &Command,
    out: &mut R,
) -> HandlerResult {
    match &command.kind {
        CommandKind::Capability => Ok(auth::capability(command, out)),
        CommandKind::Noop => Ok(Completion::done(command)),
        CommandKind::Logout => Ok(auth::logout(session, ctx, command, out)),
        CommandKind::Authenticate { mechanism } => auth::authenticate(mechanism),
        CommandKind::Login { username, password } => {
            auth::login(session, ctx, command, username, password)
        }
        CommandKind::Namespace => mailbox::namespace(session, command, out),
        CommandKind::GetAcl { mailbox } => acl::get_acl(session, ctx, command, mailbox, out),
        CommandKind::SetAcl {
            mailbox,
            identifier,
            change,
        } => acl::set_acl(session, ctx, command, mailbox, identifier, *change),
        CommandKind::DeleteAcl {
            mailbox,
            identifier,
        } => acl::delete_acl(session, ctx, command, mailbox, identifier),
        CommandKind::ListRights {
            mailbox,
            identifier,
        } => acl::list_rights(session, ctx, command, mailbox, identifier, out),
        CommandKind::MyRights { mailbox } => acl::my_rights(session, ctx, command, mailbox, out),
        CommandKind::Select { mailbox } => select::select(session, ctx, command, mailbox, false, out),
        CommandKind::Examine { mailbox } => select::select(session, ctx, command, mailbox, true, out),
        CommandKind::Create { mailbox } => mailbox::create(session, ctx, command, mailbox),
        CommandKind::Delete { mailbox } => mailbox::delete(session, ctx, command, mailbox),
        CommandKind::Rename { from, to } => mailbox::rename(session, ctx, command, from, to),
        CommandKind::Subscribe { mailbox } => mailbox::subscribe(session, ctx, command, mailbox),
        CommandKind::Unsubscribe { mailbox } => {
            mailbox::unsubscribe(session, ctx, command, mailbox)
        }
        CommandKind::List { reference, pattern } => {
            mailbox::list(session, ctx, command, reference, pattern, out)
        }
        CommandKind::Lsub { reference, pattern } => {
            mailbox::lsub(session, ctx, command, reference, pattern, out)
        }
        CommandKind::Status { mailbox, items } => {
            mailbox::status(session, ctx, command, mailbox, items, out)
        }
        CommandKind::Append {
            mailbox,
            flags,
            date,
            message,
        } => mailbox::append(session, ctx, command, mailbox, flags, *date, message),
        CommandKind::Check => select::check(session, ctx, command),
        CommandKind::Close => select::close(session, ctx, command),
        CommandKind::Expunge => select::expunge(session, ctx, command),
        CommandKind::Copy { set, mailbox, uid } => {
            copy::copy(session, ctx, command, set, mailbox, *uid)
        }
        CommandKind::Fetch { set, request, uid } => {
            fetch::fetch(session, ctx, command, set, request, *uid, out).await
        }
        CommandKind::Store {
            set,
            directive,
            uid,
        } => store::store(session, ctx, command, set, directive, *uid, out),
        CommandKind::Search {
            charset,
            criteria,
            uid,
        } => search::search(session, ctx, command, charset.as_deref(), criteria, *uid, out),
    }
}
