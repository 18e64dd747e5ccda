//! SEARCH and UID SEARCH.

use chrono::NaiveDate;
use quire_mime::{parse_date, split_message};
use tracing::debug;

use super::loader::MessageLoader;
use super::{CommandError, Completion, Context, HandlerResult, selection};
use crate::parser::{Command, SearchKey};
use crate::response::{Responder, Response};
use crate::session::{SelectedMailbox, Session};
use crate::store::StoreError;
use crate::types::{Flag, ResponseCode, SequenceSet, SetKind, Uid};

const CHARSETS: [&str; 2] = ["US-ASCII", "UTF-8"];

pub(super) fn search<R: Responder>(
    session: &mut Session,
    ctx: &Context,
    command: &Command,
    charset: Option<&str>,
    criteria: &[SearchKey],
    uid: bool,
    out: &mut R,
) -> HandlerResult {
    if let Some(charset) = charset {
        if !CHARSETS.iter().any(|c| c.eq_ignore_ascii_case(charset)) {
            return Err(CommandError::no_with(
                ResponseCode::BadCharset,
                format!("Charset {charset} not supported"),
            ));
        }
    }

    let (login, selected) = selection(session)?;
    let selected = &*selected;
    let mut hits = Vec::new();
    for (index, &message) in selected.snapshot.uids.iter().enumerate() {
        let msn = u32::try_from(index + 1).unwrap_or(u32::MAX);
        let mut loader = MessageLoader::new(ctx, &login.user, &selected.name, message);
        let mut matcher = Matcher {
            selected,
            msn,
            loader: &mut loader,
        };
        match matcher.all(criteria) {
            Ok(true) => hits.push(if uid { message.get() } else { msn }),
            Ok(false) => {}
            // Expunged by another session; the reconciler reports it.
            Err(CommandError::No { .. }) if vanished(ctx, &login.user, selected, message) => {}
            Err(e) => return Err(e),
        }
    }

    debug!(mailbox = %selected.name, hits = hits.len(), "search");
    out.send(Response::Search(hits));
    Ok(Completion::done(command))
}

fn vanished(ctx: &Context, user: &str, selected: &SelectedMailbox, uid: Uid) -> bool {
    matches!(
        ctx.store.flags(user, &selected.name, uid),
        Err(StoreError::NotFound(_))
    )
}

/// Evaluates search keys against one message.
struct Matcher<'s, 'l, 'a> {
    selected: &'s SelectedMailbox,
    msn: u32,
    loader: &'l mut MessageLoader<'a>,
}

impl Matcher<'_, '_, '_> {
    fn all(&mut self, keys: &[SearchKey]) -> Result<bool, CommandError> {
        for key in keys {
            if !self.eval(key)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn eval(&mut self, key: &SearchKey) -> Result<bool, CommandError> {
        Ok(match key {
            SearchKey::All => true,
            SearchKey::Answered => self.has(&Flag::Answered)?,
            SearchKey::Deleted => self.has(&Flag::Deleted)?,
            SearchKey::Draft => self.has(&Flag::Draft)?,
            SearchKey::Flagged => self.has(&Flag::Flagged)?,
            SearchKey::Seen => self.has(&Flag::Seen)?,
            SearchKey::Unanswered => !self.has(&Flag::Answered)?,
            SearchKey::Undeleted => !self.has(&Flag::Deleted)?,
            SearchKey::Undraft => !self.has(&Flag::Draft)?,
            SearchKey::Unflagged => !self.has(&Flag::Flagged)?,
            SearchKey::Unseen => !self.has(&Flag::Seen)?,
            SearchKey::Recent => self.recent(),
            SearchKey::Old => !self.recent(),
            SearchKey::New => self.recent() && !self.has(&Flag::Seen)?,
            SearchKey::Keyword(name) => self.has(&Flag::Keyword(name.clone()))?,
            SearchKey::Unkeyword(name) => !self.has(&Flag::Keyword(name.clone()))?,
            SearchKey::Bcc(text) => self.header_contains("bcc", text)?,
            SearchKey::Cc(text) => self.header_contains("cc", text)?,
            SearchKey::From(text) => self.header_contains("from", text)?,
            SearchKey::To(text) => self.header_contains("to", text)?,
            SearchKey::Subject(text) => self.header_contains("subject", text)?,
            SearchKey::Header(name, text) => self.header_contains(name, text)?,
            SearchKey::Body(text) => {
                let (_, body) = split_message(self.loader.message()?);
                contains_ignore_case(body, text)
            }
            SearchKey::Text(text) => contains_ignore_case(self.loader.message()?, text),
            SearchKey::Larger(n) => self.loader.attributes()?.size > *n,
            SearchKey::Smaller(n) => self.loader.attributes()?.size < *n,
            SearchKey::Before(day) => self.internal_day()? < *day,
            SearchKey::On(day) => self.internal_day()? == *day,
            SearchKey::Since(day) => self.internal_day()? >= *day,
            SearchKey::SentBefore(day) => self.sent_day()?.is_some_and(|d| d < *day),
            SearchKey::SentOn(day) => self.sent_day()?.is_some_and(|d| d == *day),
            SearchKey::SentSince(day) => self.sent_day()?.is_some_and(|d| d >= *day),
            SearchKey::Uid(set) => self.in_uid_set(set)?,
            SearchKey::Sequence(set) => set
                .resolve(self.selected.snapshot.exists(), SetKind::Sequence)?
                .contains(self.msn),
            SearchKey::Not(inner) => !self.eval(inner)?,
            SearchKey::Or(left, right) => self.eval(left)? || self.eval(right)?,
            SearchKey::And(keys) => self.all(keys)?,
        })
    }

    fn has(&mut self, flag: &Flag) -> Result<bool, CommandError> {
        Ok(self.loader.flags()?.contains(flag))
    }

    fn recent(&self) -> bool {
        self.selected.is_recent(self.loader.uid())
    }

    /// Substring match on every occurrence of a header field. An empty
    /// string matches any message that has the field.
    fn header_contains(&mut self, name: &str, text: &str) -> Result<bool, CommandError> {
        Ok(self
            .loader
            .headers()?
            .get_all(name)
            .iter()
            .any(|value| contains_ignore_case(value.as_bytes(), text)))
    }

    fn internal_day(&mut self) -> Result<NaiveDate, CommandError> {
        Ok(self.loader.attributes()?.internal_date.date_naive())
    }

    /// The Date header's calendar day, ignoring its time and zone.
    fn sent_day(&mut self) -> Result<Option<NaiveDate>, CommandError> {
        Ok(self
            .loader
            .headers()?
            .get("date")
            .and_then(|raw| parse_date(raw).ok())
            .map(|date| date.date_naive()))
    }

    fn in_uid_set(&self, set: &SequenceSet) -> Result<bool, CommandError> {
        let highest = self.selected.snapshot.highest_uid();
        Ok(set
            .resolve(highest, SetKind::Uid)?
            .contains(self.loader.uid().get()))
    }
}

fn contains_ignore_case(haystack: &[u8], needle: &str) -> bool {
    let needle = needle.as_bytes();
    if needle.is_empty() {
        return true;
    }
    haystack
        .windows(needle.len())
        .any(|window| window.eq_ignore_ascii_case(needle))
}
