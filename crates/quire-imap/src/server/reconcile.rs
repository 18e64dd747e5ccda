//! Reports changes made to the selected mailbox since the client last
//! heard about it.

use tracing::{debug, warn};

use super::Context;
use crate::response::{Responder, Response};
use crate::session::{SelectedMailbox, Session, SessionState, Snapshot};
use crate::store::StoreResult;

/// Compares the last announced snapshot with a live one.
///
/// Returns the untagged responses that bring the client up to date and the
/// snapshot to cache afterwards. EXPUNGE responses come first, highest
/// position first, so each number refers to the client's view at the time
/// it is received. EXISTS follows when the live count differs from the
/// count last announced, either before or after those EXPUNGEs. RECENT
/// follows when the recent count differs.
#[must_use]
pub fn reconcile(previous: &Snapshot, live: &Snapshot) -> (Vec<Response>, Snapshot) {
    let mut responses = Vec::new();

    let mut remaining = previous.exists();
    for (index, uid) in previous.uids.iter().enumerate().rev() {
        if live.uids.binary_search(uid).is_err() {
            let msn = u32::try_from(index + 1).unwrap_or(u32::MAX);
            responses.push(Response::Expunge(msn));
            remaining -= 1;
        }
    }
    if live.exists() != previous.exists() || live.exists() != remaining {
        responses.push(Response::Exists(live.exists()));
    }
    if live.recent != previous.recent {
        responses.push(Response::Recent(live.recent));
    }

    (responses, live.clone())
}

/// Polls the store for the selected mailbox and queues the responses that
/// describe what changed. Does nothing outside the Selected state.
pub(super) fn refresh<R: Responder>(session: &mut Session, ctx: &Context, out: &mut R) {
    let Session {
        login: Some(login),
        state: SessionState::Selected(selected),
        ..
    } = session
    else {
        return;
    };

    let live = match poll(ctx, &login.user, selected) {
        Ok(live) => live,
        Err(e) => {
            warn!(mailbox = %selected.name, error = %e, "failed to poll selected mailbox");
            return;
        }
    };

    let (responses, snapshot) = reconcile(&selected.snapshot, &live);
    if !responses.is_empty() {
        debug!(mailbox = %selected.name, count = responses.len(), "mailbox changed");
    }
    for response in responses {
        out.send(response);
    }
    selected.snapshot = snapshot;
}

/// Reads the live UID list and recent set. A read-write session claims new
/// `\Recent` messages so no other session reports them as recent.
fn poll(ctx: &Context, user: &str, selected: &mut SelectedMailbox) -> StoreResult<Snapshot> {
    let uids = ctx.store.uids(user, &selected.name)?;
    if selected.read_only {
        selected.recent = ctx
            .store
            .recent_uids(user, &selected.name, false)?
            .into_iter()
            .collect();
    } else {
        selected
            .recent
            .extend(ctx.store.recent_uids(user, &selected.name, true)?);
    }
    selected
        .recent
        .retain(|uid| uids.binary_search(uid).is_ok());

    let recent = u32::try_from(selected.recent.len()).unwrap_or(u32::MAX);
    Ok(Snapshot::new(uids, recent))
}
