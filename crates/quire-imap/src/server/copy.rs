//! COPY and UID COPY.

use tracing::debug;

use super::{CommandError, Completion, Context, HandlerResult, NO_ACCESS, selection};
use crate::parser::Command;
use crate::session::Session;
use crate::store::StoreError;
use crate::types::{ResponseCode, Rights, SequenceSet, Uid};

/// Copies messages into another mailbox. The target must exist before its
/// rights are considered; a missing target asks the client to create it.
pub(super) fn copy(
    session: &mut Session,
    ctx: &Context,
    command: &Command,
    set: &SequenceSet,
    mailbox: &str,
    uid: bool,
) -> HandlerResult {
    let (login, selected) = selection(session)?;
    let uids: Vec<Uid> = selected
        .snapshot
        .resolve(set, uid)?
        .into_iter()
        .map(|(_, uid)| uid)
        .collect();
    let target = login.namespace.full_name(mailbox);

    match ctx.store.status(&login.user, &target) {
        Ok(_) => {}
        Err(StoreError::NotFound(_)) => {
            return Err(CommandError::no_with(
                ResponseCode::TryCreate,
                "Mailbox does not exist",
            ));
        }
        Err(e) => return Err(e.into()),
    }
    if !ctx.store.rights(&login.user, &target)?.contains(Rights::INSERT) {
        return Err(CommandError::no(NO_ACCESS));
    }

    if !uids.is_empty() {
        let copied = ctx.store.copy(&login.user, &selected.name, &uids, &target)?;
        debug!(from = %selected.name, to = %target, count = copied.len(), "copied");
    }
    Ok(Completion::done(command))
}
