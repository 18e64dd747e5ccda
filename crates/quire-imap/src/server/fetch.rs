//! FETCH and UID FETCH.
//!
//! Messages are rendered in ascending order, one FETCH response each, and
//! the responder is flushed after every message so only one message's data
//! is held at a time. Body data are [`Bytes`] slices of the stored message,
//! handed to the responder without copying.

use bytes::Bytes;
use quire_mime::{select_fields, split_message};
use tracing::debug;

use super::loader::MessageLoader;
use super::{CommandError, Completion, Context, HandlerResult, selection};
use crate::parser::{Command, FetchAttribute, FetchRequest, Partial, Section, SectionText};
use crate::response::{FetchItem, Responder, Response};
use crate::session::{SelectedMailbox, Session};
use crate::store::{StoreError, StoreResult};
use crate::types::{Flag, FlagOp, Flags, Rights, SequenceSet, Uid};

/// Flags as this session sees them: the stored flags plus `\Recent` when
/// the session holds the message as recent.
pub(super) fn visible_flags(selected: &SelectedMailbox, uid: Uid, mut flags: Flags) -> Flags {
    if selected.is_recent(uid) {
        flags.insert(Flag::Recent);
    }
    flags
}

pub(super) async fn fetch<R: Responder>(
    session: &mut Session,
    ctx: &Context,
    command: &Command,
    set: &SequenceSet,
    request: &FetchRequest,
    uid: bool,
    out: &mut R,
) -> HandlerResult {
    let (login, selected) = selection(session)?;
    let selected = &*selected;
    let targets = selected.snapshot.resolve(set, uid)?;

    let mark_seen = request.sets_seen()
        && !selected.read_only
        && ctx
            .store
            .rights(&login.user, &selected.name)?
            .contains(Rights::SEEN);

    if let Some(name) = &request.unrecognized
        && request.attributes.is_empty()
    {
        debug!(attribute = %name, "unrecognized fetch attribute");
        return Err(CommandError::no("FETCH attribute not recognized"));
    }

    let mut sent = 0_usize;
    for (msn, message) in targets {
        let mut loader = MessageLoader::new(ctx, &login.user, &selected.name, message);
        let items = match render(&mut loader, selected, request, mark_seen) {
            Ok(items) => items,
            // Expunged by another session; the reconciler reports it.
            Err(StoreError::NotFound(_)) => continue,
            Err(e) => return Err(e.into()),
        };
        if !items.is_empty() {
            out.send(Response::Fetch { msn, items });
            out.flush().await?;
            sent += 1;
        }
        if request.unrecognized.is_some() {
            break;
        }
    }

    if let Some(name) = &request.unrecognized {
        debug!(attribute = %name, "unrecognized fetch attribute");
        return Err(CommandError::no("FETCH attribute not recognized"));
    }
    debug!(mailbox = %selected.name, messages = sent, "fetched");
    Ok(Completion::done(command))
}

/// Builds the FETCH items of one message.
fn render(
    loader: &mut MessageLoader<'_>,
    selected: &SelectedMailbox,
    request: &FetchRequest,
    mark_seen: bool,
) -> StoreResult<Vec<FetchItem>> {
    let uid = loader.uid();
    let mut flags_changed = false;
    if mark_seen && !loader.flags()?.is_seen() {
        loader.store_flags(FlagOp::Add, &Flags::from_vec(vec![Flag::Seen]))?;
        flags_changed = true;
    }

    let mut items = Vec::with_capacity(request.attributes.len() + 1);
    for attribute in &request.attributes {
        items.push(item(loader, selected, attribute)?);
    }
    if flags_changed && !request.contains(&FetchAttribute::Flags) {
        items.push(FetchItem::Flags(visible_flags(
            selected,
            uid,
            loader.flags()?.clone(),
        )));
    }
    Ok(items)
}

fn item(
    loader: &mut MessageLoader<'_>,
    selected: &SelectedMailbox,
    attribute: &FetchAttribute,
) -> StoreResult<FetchItem> {
    let uid = loader.uid();
    Ok(match attribute {
        FetchAttribute::Flags => {
            FetchItem::Flags(visible_flags(selected, uid, loader.flags()?.clone()))
        }
        FetchAttribute::Uid => FetchItem::Uid(uid),
        FetchAttribute::InternalDate => FetchItem::InternalDate(loader.attributes()?.internal_date),
        FetchAttribute::Rfc822Size => FetchItem::Rfc822Size(loader.attributes()?.size),
        FetchAttribute::Envelope => {
            FetchItem::Envelope(Box::new(loader.attributes()?.envelope.clone()))
        }
        FetchAttribute::Body | FetchAttribute::BodyStructure => FetchItem::Structure {
            body: Box::new(loader.attributes()?.body.clone()),
            extensible: matches!(attribute, FetchAttribute::BodyStructure),
        },
        FetchAttribute::Rfc822 => data(attribute, Some(loader.message()?.clone())),
        FetchAttribute::Rfc822Header => data(attribute, Some(loader.header()?.clone())),
        FetchAttribute::Rfc822Text => data(attribute, Some(text_of(loader.message()?))),
        FetchAttribute::BodySection {
            section, partial, ..
        } => {
            let bytes = section_data(loader, section)?;
            data(attribute, bytes.map(|b| slice(b, *partial)))
        }
    })
}

fn data(attribute: &FetchAttribute, data: Option<Bytes>) -> FetchItem {
    FetchItem::Data {
        name: attribute.response_name(),
        data,
    }
}

/// The body of a raw message, sharing its buffer.
fn text_of(raw: &Bytes) -> Bytes {
    let header = split_message(raw).0.len();
    raw.slice(header..)
}

/// The octets a body section addresses, or `None` when the message has no
/// such section.
fn section_data(loader: &mut MessageLoader<'_>, section: &Section) -> StoreResult<Option<Bytes>> {
    if section.path.is_empty() {
        return Ok(match &section.text {
            None => Some(loader.message()?.clone()),
            Some(SectionText::Header) => Some(loader.header()?.clone()),
            Some(SectionText::HeaderFields(names)) => {
                Some(Bytes::from(select_fields(loader.header()?, names, false)))
            }
            Some(SectionText::HeaderFieldsNot(names)) => {
                Some(Bytes::from(select_fields(loader.header()?, names, true)))
            }
            Some(SectionText::Text) => Some(text_of(loader.message()?)),
            Some(SectionText::Mime) => None,
        });
    }

    let Some(part) = loader.part(&section.path)? else {
        return Ok(None);
    };
    Ok(match &section.text {
        None => Some(Bytes::from(part.body)),
        Some(SectionText::Mime) => Some(Bytes::from(part.header)),
        Some(text) => part.message.map(|inner| {
            Bytes::from(match text {
                SectionText::HeaderFields(names) => select_fields(&inner.header, names, false),
                SectionText::HeaderFieldsNot(names) => select_fields(&inner.header, names, true),
                SectionText::Text => inner.body,
                SectionText::Header | SectionText::Mime => inner.header,
            })
        }),
    })
}

/// Applies a `<start.length>` range. A start past the end gives an empty
/// string.
fn slice(bytes: Bytes, partial: Option<Partial>) -> Bytes {
    let Some(Partial { start, length }) = partial else {
        return bytes;
    };
    let start = usize::try_from(start).unwrap_or(usize::MAX).min(bytes.len());
    let end = start
        .saturating_add(usize::try_from(length).unwrap_or(usize::MAX))
        .min(bytes.len());
    bytes.slice(start..end)
}
