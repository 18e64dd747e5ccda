//! Per-connection session state.
//!
//! A [`Session`] is owned by the task serving one connection and passed by
//! `&mut` into every command handler. The selected mailbox only exists
//! inside [`SessionState::Selected`], so "a mailbox is selected" and "the
//! state is Selected" cannot disagree.

use std::collections::BTreeSet;

use crate::parser::StateMask;
use crate::store::ListenerId;
use crate::types::{MessageSet, SequenceError, SequenceSet, SetKind, Uid, UidValidity};

/// Namespace token that starts every absolute mailbox name.
pub const NAMESPACE_PREFIX: &str = "#mail";

/// Hierarchy separator.
pub const SEPARATOR: char = '.';

/// The user's namespace context, fixed at LOGIN.
///
/// Every mailbox the store knows has an absolute name such as
/// `#mail.bob.INBOX`. Clients mostly use names relative to their own
/// folder (`#mail.bob`); this type converts between the two.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    prefix: String,
    separator: char,
    folder: String,
}

impl Namespace {
    /// Builds the namespace context for a user.
    #[must_use]
    pub fn for_user(user: &str) -> Self {
        Self {
            prefix: NAMESPACE_PREFIX.to_string(),
            separator: SEPARATOR,
            folder: format!("{NAMESPACE_PREFIX}{SEPARATOR}{user}"),
        }
    }

    /// The namespace token, `#mail`.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The hierarchy separator.
    #[must_use]
    pub const fn separator(&self) -> char {
        self.separator
    }

    /// The user's folder, `#mail.<user>`.
    #[must_use]
    pub fn folder(&self) -> &str {
        &self.folder
    }

    /// The absolute name of the user's inbox.
    #[must_use]
    pub fn inbox(&self) -> String {
        format!("{}{}INBOX", self.folder, self.separator)
    }

    /// Resolves a client-supplied mailbox name to its absolute form.
    ///
    /// - `#...` is already absolute.
    /// - `.x` is rooted at the namespace: `#mail.x`.
    /// - `INBOX` (any case, also as the first level of a longer name) is
    ///   the user's inbox.
    /// - Anything else is relative to the user's folder.
    #[must_use]
    pub fn full_name(&self, name: &str) -> String {
        if name.starts_with('#') {
            return name.to_string();
        }
        if name.starts_with(self.separator) {
            return format!("{}{name}", self.prefix);
        }

        let (first, rest) = match name.split_once(self.separator) {
            Some((first, rest)) => (first, Some(rest)),
            None => (name, None),
        };
        let first = if first.eq_ignore_ascii_case("INBOX") {
            "INBOX"
        } else {
            first
        };
        match rest {
            Some(rest) => format!("{}{sep}{first}{sep}{rest}", self.folder, sep = self.separator),
            None => format!("{}{}{first}", self.folder, self.separator),
        }
    }

    /// Presents an absolute name the way the client should see it: relative
    /// when inside the user's folder, absolute otherwise.
    #[must_use]
    pub fn display_name(&self, full: &str) -> String {
        full.strip_prefix(self.folder.as_str())
            .and_then(|rest| rest.strip_prefix(self.separator))
            .filter(|rest| !rest.is_empty())
            .unwrap_or(full)
            .to_string()
    }
}

/// The session's view of a selected mailbox's message list.
///
/// `uids` is in message sequence number order: index + 1 is the MSN.
/// `recent` is the last RECENT count announced to the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Live UIDs in MSN order.
    pub uids: Vec<Uid>,
    /// Recent count.
    pub recent: u32,
}

impl Snapshot {
    /// Creates a snapshot.
    #[must_use]
    pub const fn new(uids: Vec<Uid>, recent: u32) -> Self {
        Self { uids, recent }
    }

    /// Number of messages, as announced by EXISTS.
    #[must_use]
    pub fn exists(&self) -> u32 {
        u32::try_from(self.uids.len()).unwrap_or(u32::MAX)
    }

    /// Highest UID in the snapshot, 0 when empty.
    #[must_use]
    pub fn highest_uid(&self) -> u32 {
        self.uids.last().map_or(0, |uid| uid.get())
    }

    /// The UID at a 1-based sequence number.
    #[must_use]
    pub fn uid_at(&self, msn: u32) -> Option<Uid> {
        let index = usize::try_from(msn).ok()?.checked_sub(1)?;
        self.uids.get(index).copied()
    }

    /// The 1-based sequence number of a UID.
    #[must_use]
    pub fn msn_of(&self, uid: Uid) -> Option<u32> {
        let index = self.uids.binary_search(&uid).ok()?;
        u32::try_from(index + 1).ok()
    }

    /// Resolves a sequence set to `(msn, uid)` pairs in ascending order.
    ///
    /// # Errors
    ///
    /// Returns [`SequenceError::OutOfRange`] when a sequence number is past
    /// the end of the snapshot. UID sets never fail.
    pub fn resolve(&self, set: &SequenceSet, uid: bool) -> Result<Vec<(u32, Uid)>, SequenceError> {
        if uid {
            let matched = set.resolve(self.highest_uid(), SetKind::Uid)?;
            Ok(self.pairs_for_uids(&matched))
        } else {
            let matched = set.resolve(self.exists(), SetKind::Sequence)?;
            Ok(matched
                .iter()
                .filter_map(|msn| self.uid_at(msn).map(|uid| (msn, uid)))
                .collect())
        }
    }

    fn pairs_for_uids(&self, matched: &MessageSet) -> Vec<(u32, Uid)> {
        self.uids
            .iter()
            .enumerate()
            .filter(|(_, uid)| matched.contains(uid.get()))
            .filter_map(|(i, &uid)| u32::try_from(i + 1).ok().map(|msn| (msn, uid)))
            .collect()
    }
}

/// A mailbox in the Selected state.
#[derive(Debug)]
pub struct SelectedMailbox {
    /// Absolute mailbox name.
    pub name: String,
    /// True after EXAMINE or when the user lacks write rights.
    pub read_only: bool,
    /// UIDVALIDITY at selection time.
    pub uid_validity: UidValidity,
    /// Last state announced to the client.
    pub snapshot: Snapshot,
    /// UIDs that are `\Recent` for this session.
    pub recent: BTreeSet<Uid>,
    /// Store listener registration, released on deselect.
    pub listener: ListenerId,
}

impl SelectedMailbox {
    /// Returns true if the UID is `\Recent` in this session.
    #[must_use]
    pub fn is_recent(&self, uid: Uid) -> bool {
        self.recent.contains(&uid)
    }
}

/// Protocol state.
#[derive(Debug, Default)]
pub enum SessionState {
    /// Connected, not logged in.
    #[default]
    NotAuthenticated,
    /// Logged in.
    Authenticated,
    /// Logged in with a mailbox selected.
    Selected(SelectedMailbox),
    /// LOGOUT completed; the connection is closing.
    Logout,
}

impl SessionState {
    /// Returns the state as a mask for verb validity checks.
    #[must_use]
    pub const fn mask(&self) -> Option<StateMask> {
        match self {
            Self::NotAuthenticated => Some(StateMask::NOT_AUTHENTICATED),
            Self::Authenticated => Some(StateMask::AUTHENTICATED),
            Self::Selected(_) => Some(StateMask::SELECTED),
            Self::Logout => None,
        }
    }

    /// Returns the state name for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::NotAuthenticated => "not-authenticated",
            Self::Authenticated => "authenticated",
            Self::Selected(_) => "selected",
            Self::Logout => "logout",
        }
    }
}

/// A logged-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedIn {
    /// User name.
    pub user: String,
    /// Namespace context.
    pub namespace: Namespace,
}

/// Everything the server knows about one connection.
#[derive(Debug, Default)]
pub struct Session {
    /// Protocol state.
    pub state: SessionState,
    /// Set at LOGIN.
    pub login: Option<LoggedIn>,
    /// Failed LOGIN attempts so far.
    pub failed_logins: u32,
}

impl Session {
    /// Creates a session in the NotAuthenticated state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful login.
    pub fn log_in(&mut self, user: &str) {
        self.login = Some(LoggedIn {
            user: user.to_string(),
            namespace: Namespace::for_user(user),
        });
        self.state = SessionState::Authenticated;
    }

    /// Returns the selected mailbox, if any.
    #[must_use]
    pub const fn selected(&self) -> Option<&SelectedMailbox> {
        match &self.state {
            SessionState::Selected(mailbox) => Some(mailbox),
            _ => None,
        }
    }

    /// Returns the selected mailbox mutably, if any.
    pub fn selected_mut(&mut self) -> Option<&mut SelectedMailbox> {
        match &mut self.state {
            SessionState::Selected(mailbox) => Some(mailbox),
            _ => None,
        }
    }

    /// Leaves the Selected state, returning the mailbox that was selected.
    ///
    /// Does nothing outside the Selected state.
    pub fn deselect(&mut self) -> Option<SelectedMailbox> {
        if !matches!(self.state, SessionState::Selected(_)) {
            return None;
        }
        match std::mem::replace(&mut self.state, SessionState::Authenticated) {
            SessionState::Selected(mailbox) => Some(mailbox),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn uids(values: &[u32]) -> Vec<Uid> {
        values.iter().map(|&v| Uid::new(v).unwrap()).collect()
    }

    mod namespace_tests {
        use super::*;

        #[test]
        fn inbox_any_case() {
            let ns = Namespace::for_user("bob");
            assert_eq!(ns.full_name("INBOX"), "#mail.bob.INBOX");
            assert_eq!(ns.full_name("inbox"), "#mail.bob.INBOX");
            assert_eq!(ns.full_name("Inbox.Lists"), "#mail.bob.INBOX.Lists");
        }

        #[test]
        fn absolute_and_rooted() {
            let ns = Namespace::for_user("bob");
            assert_eq!(ns.full_name("#mail.alice.INBOX"), "#mail.alice.INBOX");
            assert_eq!(ns.full_name(".alice.INBOX"), "#mail.alice.INBOX");
        }

        #[test]
        fn relative_to_folder() {
            let ns = Namespace::for_user("bob");
            assert_eq!(ns.full_name("Sent"), "#mail.bob.Sent");
            assert_eq!(ns.full_name("work.2024"), "#mail.bob.work.2024");
        }

        #[test]
        fn display_names() {
            let ns = Namespace::for_user("bob");
            assert_eq!(ns.display_name("#mail.bob.INBOX"), "INBOX");
            assert_eq!(ns.display_name("#mail.alice.INBOX"), "#mail.alice.INBOX");
            assert_eq!(ns.display_name("#mail.bobby.INBOX"), "#mail.bobby.INBOX");
            assert_eq!(ns.display_name("#mail.bob"), "#mail.bob");
        }
    }

    mod snapshot_tests {
        use super::*;

        #[test]
        fn msn_mapping() {
            let snapshot = Snapshot::new(uids(&[3, 7, 9]), 0);
            assert_eq!(snapshot.exists(), 3);
            assert_eq!(snapshot.uid_at(2), Uid::new(7));
            assert_eq!(snapshot.uid_at(0), None);
            assert_eq!(snapshot.msn_of(Uid::new(9).unwrap()), Some(3));
            assert_eq!(snapshot.msn_of(Uid::new(4).unwrap()), None);
        }

        #[test]
        fn resolve_sequence_numbers() {
            let snapshot = Snapshot::new(uids(&[3, 7, 9]), 0);
            let set = SequenceSet::parse("2:*").unwrap();
            let pairs = snapshot.resolve(&set, false).unwrap();
            assert_eq!(pairs, vec![(2, Uid::new(7).unwrap()), (3, Uid::new(9).unwrap())]);

            let set = SequenceSet::parse("4").unwrap();
            assert!(snapshot.resolve(&set, false).is_err());
        }

        #[test]
        fn resolve_uids_ignores_missing() {
            let snapshot = Snapshot::new(uids(&[3, 7, 9]), 0);
            let set = SequenceSet::parse("1:7,100").unwrap();
            let pairs = snapshot.resolve(&set, true).unwrap();
            assert_eq!(pairs, vec![(1, Uid::new(3).unwrap()), (2, Uid::new(7).unwrap())]);
        }

        #[test]
        fn uid_star_is_highest() {
            let snapshot = Snapshot::new(uids(&[3, 7, 9]), 0);
            let set = SequenceSet::parse("*").unwrap();
            let pairs = snapshot.resolve(&set, true).unwrap();
            assert_eq!(pairs, vec![(3, Uid::new(9).unwrap())]);
        }
    }

    mod state_tests {
        use super::*;

        #[test]
        fn login_sets_namespace() {
            let mut session = Session::new();
            assert!(session.state.mask() == Some(StateMask::NOT_AUTHENTICATED));
            session.log_in("bob");
            assert!(matches!(session.state, SessionState::Authenticated));
            assert_eq!(session.login.unwrap().namespace.folder(), "#mail.bob");
        }

        #[test]
        fn deselect_outside_selected_is_noop() {
            let mut session = Session::new();
            session.log_in("bob");
            assert!(session.deselect().is_none());
            assert!(matches!(session.state, SessionState::Authenticated));
        }
    }
}
