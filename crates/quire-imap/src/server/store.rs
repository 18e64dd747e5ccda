//! STORE and UID STORE.

use tracing::debug;

use super::fetch::visible_flags;
use super::{CommandError, Completion, Context, HandlerResult, selection};
use crate::parser::{Command, StoreDirective};
use crate::response::{FetchItem, Responder, Response};
use crate::session::Session;
use crate::store::StoreError;
use crate::types::{Flag, FlagOp, ResponseCode, Rights, SequenceSet};

/// Rights needed to apply a directive: `s` for `\Seen`, `d` for
/// `\Deleted`, `w` for everything else. Replacing touches every flag.
fn required_rights(directive: &StoreDirective) -> Rights {
    if directive.op == FlagOp::Replace {
        return Rights::SEEN.union(Rights::DELETE).union(Rights::WRITE);
    }
    directive
        .flags
        .iter()
        .fold(Rights::NONE, |needed, flag| match flag {
            Flag::Seen => needed.union(Rights::SEEN),
            Flag::Deleted => needed.union(Rights::DELETE),
            _ => needed.union(Rights::WRITE),
        })
}

pub(super) fn store<R: Responder>(
    session: &mut Session,
    ctx: &Context,
    command: &Command,
    set: &SequenceSet,
    directive: &StoreDirective,
    uid: bool,
    out: &mut R,
) -> HandlerResult {
    let (login, selected) = selection(session)?;
    if selected.read_only {
        return Err(CommandError::no_with(
            ResponseCode::ReadOnly,
            "Mailbox is read-only",
        ));
    }
    if directive.flags.contains(&Flag::Recent) {
        return Err(CommandError::no("\\Recent flag cannot be stored"));
    }
    let rights = ctx.store.rights(&login.user, &selected.name)?;
    if !rights.contains(required_rights(directive)) {
        return Err(CommandError::no("Permission denied"));
    }

    let targets = selected.snapshot.resolve(set, uid)?;
    let mut changed = 0_usize;
    for (msn, message) in targets {
        let before = match ctx.store.flags(&login.user, &selected.name, message) {
            Ok(flags) => flags,
            // Expunged by another session; the reconciler reports it.
            Err(StoreError::NotFound(_)) => continue,
            Err(e) => return Err(e.into()),
        };
        let after = ctx.store.store_flags(
            &login.user,
            &selected.name,
            message,
            directive.op,
            &directive.flags,
        )?;
        if before == after {
            continue;
        }
        changed += 1;
        if !directive.silent {
            let mut items = vec![FetchItem::Flags(visible_flags(selected, message, after))];
            if uid {
                items.push(FetchItem::Uid(message));
            }
            out.send(Response::Fetch { msn, items });
        }
    }
    debug!(mailbox = %selected.name, changed, "flags stored");
    Ok(Completion::done(command))
}
