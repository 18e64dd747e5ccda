//! CAPABILITY, LOGOUT, AUTHENTICATE and LOGIN.

use tracing::{debug, info, warn};

use super::{CAPABILITIES, CommandError, Completion, Context, HandlerResult};
use crate::parser::Command;
use crate::response::{Responder, Response, Status};
use crate::session::{Session, SessionState};

pub(super) fn capability<R: Responder>(command: &Command, out: &mut R) -> Completion {
    out.send(Response::Capability(CAPABILITIES.to_vec()));
    Completion::done(command)
}

pub(super) fn logout<R: Responder>(
    session: &mut Session,
    ctx: &Context,
    command: &Command,
    out: &mut R,
) -> Completion {
    if let Some(selected) = session.deselect() {
        ctx.store.unregister_listener(selected.listener);
    }
    session.state = SessionState::Logout;
    out.send(Response::untagged(
        Status::Bye,
        None,
        "IMAP4rev1 server logging out",
    ));
    Completion::done(command)
}

/// No SASL mechanism is offered, so every AUTHENTICATE is declined.
pub(super) fn authenticate(mechanism: &str) -> HandlerResult {
    debug!(mechanism, "authentication mechanism declined");
    Err(CommandError::no("Unsupported authentication mechanism"))
}

pub(super) fn login(
    session: &mut Session,
    ctx: &Context,
    command: &Command,
    username: &str,
    password: &str,
) -> HandlerResult {
    match ctx.auth.authenticate(username, password) {
        Ok(Some(user)) => {
            info!(user = %user.name, "login succeeded");
            session.log_in(&user.name);
            Ok(Completion::done(command))
        }
        Ok(None) => {
            session.failed_logins += 1;
            warn!(
                user = username,
                attempts = session.failed_logins,
                "login failed"
            );
            Err(CommandError::no("LOGIN failed"))
        }
        Err(e) => {
            warn!(user = username, error = %e, "authenticator failure");
            Err(CommandError::no("LOGIN failed"))
        }
    }
}

/// True once the session has used up its LOGIN attempts.
pub(super) fn too_many_failures(session: &Session, ctx: &Context) -> bool {
    session.failed_logins >= ctx.config.max_login_failures
}
