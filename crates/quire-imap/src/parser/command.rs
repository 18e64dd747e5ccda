//! Parsed commands and the verb table.
//!
//! Every verb the server understands has one [`VerbSpec`] entry naming the
//! states it is valid in, the argument syntax used in BAD responses, and
//! the function that parses its arguments into a [`CommandKind`].

use chrono::{DateTime, FixedOffset};

use super::fetch::{FetchRequest, parse_fetch_request};
use super::lexer::Lexer;
use super::search::{SearchKey, parse_search};
use crate::Result;
use crate::types::{FlagOp, Flags, RightsChange, SequenceSet, StatusItem, Tag};

/// A set of session states, used to gate verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateMask(u8);

impl StateMask {
    /// Before LOGIN.
    pub const NOT_AUTHENTICATED: Self = Self(1);
    /// Logged in, nothing selected.
    pub const AUTHENTICATED: Self = Self(1 << 1);
    /// A mailbox is selected.
    pub const SELECTED: Self = Self(1 << 2);
    /// Logged in, with or without a selection.
    pub const LOGGED_IN: Self = Self(Self::AUTHENTICATED.0 | Self::SELECTED.0);
    /// Any state before LOGOUT.
    pub const ANY: Self = Self(Self::NOT_AUTHENTICATED.0 | Self::LOGGED_IN.0);

    /// Returns true if every state in `other` is in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }
}

/// A STORE directive: `[+|-]FLAGS[.SILENT] flags`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreDirective {
    /// Add, remove or replace.
    pub op: FlagOp,
    /// Suppress the FETCH responses.
    pub silent: bool,
    /// Flags to apply.
    pub flags: Flags,
}

/// Typed arguments of each command.
///
/// Mailbox names are kept as the client sent them; resolving them against
/// the session namespace happens at execution time.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum CommandKind {
    Capability,
    Noop,
    Logout,
    Authenticate {
        mechanism: String,
    },
    Login {
        username: String,
        password: String,
    },
    Namespace,
    GetAcl {
        mailbox: String,
    },
    SetAcl {
        mailbox: String,
        identifier: String,
        change: RightsChange,
    },
    DeleteAcl {
        mailbox: String,
        identifier: String,
    },
    ListRights {
        mailbox: String,
        identifier: String,
    },
    MyRights {
        mailbox: String,
    },
    Select {
        mailbox: String,
    },
    Examine {
        mailbox: String,
    },
    Create {
        mailbox: String,
    },
    Delete {
        mailbox: String,
    },
    Rename {
        from: String,
        to: String,
    },
    Subscribe {
        mailbox: String,
    },
    Unsubscribe {
        mailbox: String,
    },
    List {
        reference: String,
        pattern: String,
    },
    Lsub {
        reference: String,
        pattern: String,
    },
    Status {
        mailbox: String,
        items: Vec<StatusItem>,
    },
    Append {
        mailbox: String,
        flags: Flags,
        date: Option<DateTime<FixedOffset>>,
        message: Vec<u8>,
    },
    Check,
    Close,
    Expunge,
    Copy {
        set: SequenceSet,
        mailbox: String,
        uid: bool,
    },
    Fetch {
        set: SequenceSet,
        request: FetchRequest,
        uid: bool,
    },
    Store {
        set: SequenceSet,
        directive: StoreDirective,
        uid: bool,
    },
    Search {
        charset: Option<String>,
        criteria: Vec<SearchKey>,
        uid: bool,
    },
}

/// One row of the verb table.
pub struct VerbSpec {
    /// Verb as it appears in BAD texts, e.g. `SELECT` or `UID FETCH`.
    pub name: &'static str,
    /// States the verb may run in.
    pub valid_in: StateMask,
    /// Argument syntax, e.g. `<mailbox>`.
    pub syntax: &'static str,
    /// Argument parser. Starts right after the verb.
    pub parse: fn(&mut Lexer<'_>) -> Result<CommandKind>,
}

impl std::fmt::Debug for VerbSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerbSpec")
            .field("name", &self.name)
            .field("valid_in", &self.valid_in)
            .finish_non_exhaustive()
    }
}

impl PartialEq for VerbSpec {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for VerbSpec {}

impl VerbSpec {
    /// The BAD text for a syntax error in this verb's arguments.
    #[must_use]
    pub fn usage(&self) -> String {
        if self.syntax.is_empty() {
            format!("Command should be <tag> <{}>", self.name)
        } else {
            format!("Command should be <tag> <{}> {}", self.name, self.syntax)
        }
    }
}

/// A parsed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Client tag.
    pub tag: Tag,
    /// Verb table entry.
    pub verb: &'static VerbSpec,
    /// Typed arguments.
    pub kind: CommandKind,
}

impl Command {
    /// Returns the verb name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.verb.name
    }
}

macro_rules! verb {
    ($name:literal, $valid:ident, $syntax:literal, $parse:expr) => {
        VerbSpec {
            name: $name,
            valid_in: StateMask::$valid,
            syntax: $syntax,
            parse: $parse,
        }
    };
}

/// Top-level verbs.
pub static VERBS: &[VerbSpec] = &[
    verb!("CAPABILITY", ANY, "", no_args_capability),
    verb!("NOOP", ANY, "", no_args_noop),
    verb!("LOGOUT", ANY, "", no_args_logout),
    verb!("AUTHENTICATE", NOT_AUTHENTICATED, "<mechanism>", authenticate),
    verb!("LOGIN", NOT_AUTHENTICATED, "<username> <password>", login),
    verb!("NAMESPACE", LOGGED_IN, "", no_args_namespace),
    verb!("GETACL", LOGGED_IN, "<mailbox>", getacl),
    verb!("SETACL", LOGGED_IN, "<mailbox> <identifier> <rights>", setacl),
    verb!("DELETEACL", LOGGED_IN, "<mailbox> <identifier>", deleteacl),
    verb!("LISTRIGHTS", LOGGED_IN, "<mailbox> <identifier>", listrights),
    verb!("MYRIGHTS", LOGGED_IN, "<mailbox>", myrights),
    verb!("SELECT", LOGGED_IN, "<mailbox>", select),
    verb!("EXAMINE", LOGGED_IN, "<mailbox>", examine),
    verb!("CREATE", LOGGED_IN, "<mailbox>", create),
    verb!("DELETE", LOGGED_IN, "<mailbox>", delete),
    verb!("RENAME", LOGGED_IN, "<old mailbox> <new mailbox>", rename),
    verb!("SUBSCRIBE", LOGGED_IN, "<mailbox>", subscribe),
    verb!("UNSUBSCRIBE", LOGGED_IN, "<mailbox>", unsubscribe),
    verb!("LIST", LOGGED_IN, "<reference> <mailbox pattern>", list),
    verb!("LSUB", LOGGED_IN, "<reference> <mailbox pattern>", lsub),
    verb!("STATUS", LOGGED_IN, "<mailbox> (<status items>)", status),
    verb!(
        "APPEND",
        LOGGED_IN,
        "<mailbox> [(<flags>)] [\"<date-time>\"] <literal>",
        append
    ),
    verb!("CHECK", SELECTED, "", no_args_check),
    verb!("CLOSE", SELECTED, "", no_args_close),
    verb!("EXPUNGE", SELECTED, "", no_args_expunge),
    verb!("COPY", SELECTED, "<message set> <mailbox>", copy),
    verb!("FETCH", SELECTED, "<message set> <fetch attributes>", fetch),
    verb!("STORE", SELECTED, "<message set> <data item> <flags>", store),
    verb!("SEARCH", SELECTED, "[CHARSET <charset>] <search keys>", search),
];

/// Commands following the `UID` prefix.
pub static UID_VERBS: &[VerbSpec] = &[
    verb!("UID COPY", SELECTED, "<uid set> <mailbox>", uid_copy),
    verb!("UID FETCH", SELECTED, "<uid set> <fetch attributes>", uid_fetch),
    verb!("UID STORE", SELECTED, "<uid set> <data item> <flags>", uid_store),
    verb!(
        "UID SEARCH",
        SELECTED,
        "[CHARSET <charset>] <search keys>",
        uid_search
    ),
];

/// Looks up a verb by its (upper-case) name.
#[must_use]
pub fn lookup(name: &str) -> Option<&'static VerbSpec> {
    VERBS.iter().find(|v| v.name == name)
}

/// Looks up a `UID` sub-command by its (upper-case) name.
#[must_use]
pub fn lookup_uid(name: &str) -> Option<&'static VerbSpec> {
    UID_VERBS
        .iter()
        .find(|v| v.name.strip_prefix("UID ") == Some(name))
}

#[allow(clippy::unnecessary_wraps)]
const fn no_args(kind: CommandKind) -> Result<CommandKind> {
    Ok(kind)
}

fn no_args_capability(_: &mut Lexer<'_>) -> Result<CommandKind> {
    no_args(CommandKind::Capability)
}

fn no_args_noop(_: &mut Lexer<'_>) -> Result<CommandKind> {
    no_args(CommandKind::Noop)
}

fn no_args_logout(_: &mut Lexer<'_>) -> Result<CommandKind> {
    no_args(CommandKind::Logout)
}

fn no_args_namespace(_: &mut Lexer<'_>) -> Result<CommandKind> {
    no_args(CommandKind::Namespace)
}

fn no_args_check(_: &mut Lexer<'_>) -> Result<CommandKind> {
    no_args(CommandKind::Check)
}

fn no_args_close(_: &mut Lexer<'_>) -> Result<CommandKind> {
    no_args(CommandKind::Close)
}

fn no_args_expunge(_: &mut Lexer<'_>) -> Result<CommandKind> {
    no_args(CommandKind::Expunge)
}

/// Reads `SP astring`.
fn arg(lexer: &mut Lexer<'_>) -> Result<String> {
    lexer.expect_space()?;
    lexer.read_astring()
}

fn authenticate(lexer: &mut Lexer<'_>) -> Result<CommandKind> {
    lexer.expect_space()?;
    let mechanism = lexer.read_atom()?.to_ascii_uppercase();
    // An initial response may follow; it is never used.
    if lexer.eat(b' ') {
        lexer.read_astring()?;
    }
    Ok(CommandKind::Authenticate { mechanism })
}

fn login(lexer: &mut Lexer<'_>) -> Result<CommandKind> {
    let username = arg(lexer)?;
    let password = arg(lexer)?;
    Ok(CommandKind::Login { username, password })
}

fn getacl(lexer: &mut Lexer<'_>) -> Result<CommandKind> {
    Ok(CommandKind::GetAcl { mailbox: arg(lexer)? })
}

fn setacl(lexer: &mut Lexer<'_>) -> Result<CommandKind> {
    let mailbox = arg(lexer)?;
    let identifier = arg(lexer)?;
    let rights = arg(lexer)?;
    let change = RightsChange::parse(&rights)
        .ok_or_else(|| lexer.error(&format!("Invalid rights: {rights}")))?;
    Ok(CommandKind::SetAcl {
        mailbox,
        identifier,
        change,
    })
}

fn deleteacl(lexer: &mut Lexer<'_>) -> Result<CommandKind> {
    let mailbox = arg(lexer)?;
    let identifier = arg(lexer)?;
    Ok(CommandKind::DeleteAcl {
        mailbox,
        identifier,
    })
}

fn listrights(lexer: &mut Lexer<'_>) -> Result<CommandKind> {
    let mailbox = arg(lexer)?;
    let identifier = arg(lexer)?;
    Ok(CommandKind::ListRights {
        mailbox,
        identifier,
    })
}

fn myrights(lexer: &mut Lexer<'_>) -> Result<CommandKind> {
    Ok(CommandKind::MyRights { mailbox: arg(lexer)? })
}

fn select(lexer: &mut Lexer<'_>) -> Result<CommandKind> {
    Ok(CommandKind::Select { mailbox: arg(lexer)? })
}

fn examine(lexer: &mut Lexer<'_>) -> Result<CommandKind> {
    Ok(CommandKind::Examine { mailbox: arg(lexer)? })
}

fn create(lexer: &mut Lexer<'_>) -> Result<CommandKind> {
    Ok(CommandKind::Create { mailbox: arg(lexer)? })
}

fn delete(lexer: &mut Lexer<'_>) -> Result<CommandKind> {
    Ok(CommandKind::Delete { mailbox: arg(lexer)? })
}

fn rename(lexer: &mut Lexer<'_>) -> Result<CommandKind> {
    let from = arg(lexer)?;
    let to = arg(lexer)?;
    Ok(CommandKind::Rename { from, to })
}

fn subscribe(lexer: &mut Lexer<'_>) -> Result<CommandKind> {
    Ok(CommandKind::Subscribe { mailbox: arg(lexer)? })
}

fn unsubscribe(lexer: &mut Lexer<'_>) -> Result<CommandKind> {
    Ok(CommandKind::Unsubscribe { mailbox: arg(lexer)? })
}

fn list_args(lexer: &mut Lexer<'_>) -> Result<(String, String)> {
    let reference = arg(lexer)?;
    lexer.expect_space()?;
    let pattern = lexer.read_list_mailbox()?;
    Ok((reference, pattern))
}

fn list(lexer: &mut Lexer<'_>) -> Result<CommandKind> {
    let (reference, pattern) = list_args(lexer)?;
    Ok(CommandKind::List { reference, pattern })
}

fn lsub(lexer: &mut Lexer<'_>) -> Result<CommandKind> {
    let (reference, pattern) = list_args(lexer)?;
    Ok(CommandKind::Lsub { reference, pattern })
}

fn status(lexer: &mut Lexer<'_>) -> Result<CommandKind> {
    let mailbox = arg(lexer)?;
    lexer.expect_space()?;
    lexer.expect(b'(')?;
    let mut items = Vec::new();
    loop {
        let word = lexer.read_atom()?;
        let item = StatusItem::parse(word)
            .ok_or_else(|| lexer.error(&format!("Unknown status item: {word}")))?;
        if !items.contains(&item) {
            items.push(item);
        }
        if lexer.eat(b')') {
            break;
        }
        lexer.expect_space()?;
    }
    Ok(CommandKind::Status { mailbox, items })
}

fn append(lexer: &mut Lexer<'_>) -> Result<CommandKind> {
    let mailbox = arg(lexer)?;
    lexer.expect_space()?;

    let mut flags = Flags::new();
    if lexer.peek() == Some(b'(') {
        flags = lexer.read_flag_list()?;
        lexer.expect_space()?;
    }

    let mut date = None;
    if lexer.peek() == Some(b'"') {
        let text = lexer.read_quoted_string()?;
        let parsed = DateTime::parse_from_str(text.trim_start(), "%d-%b-%Y %H:%M:%S %z")
            .map_err(|_| lexer.error(&format!("Invalid date-time: {text}")))?;
        date = Some(parsed);
        lexer.expect_space()?;
    }

    if lexer.peek() != Some(b'{') {
        return Err(lexer.error("Expected message literal"));
    }
    let message = lexer.read_literal()?;
    Ok(CommandKind::Append {
        mailbox,
        flags,
        date,
        message,
    })
}

fn copy_args(lexer: &mut Lexer<'_>, uid: bool) -> Result<CommandKind> {
    lexer.expect_space()?;
    let set = lexer.read_sequence_set()?;
    let mailbox = arg(lexer)?;
    Ok(CommandKind::Copy { set, mailbox, uid })
}

fn copy(lexer: &mut Lexer<'_>) -> Result<CommandKind> {
    copy_args(lexer, false)
}

fn uid_copy(lexer: &mut Lexer<'_>) -> Result<CommandKind> {
    copy_args(lexer, true)
}

fn fetch_args(lexer: &mut Lexer<'_>, uid: bool) -> Result<CommandKind> {
    lexer.expect_space()?;
    let set = lexer.read_sequence_set()?;
    lexer.expect_space()?;
    let mut request = parse_fetch_request(lexer)?;
    if uid {
        request.ensure_uid();
    }
    Ok(CommandKind::Fetch { set, request, uid })
}

fn fetch(lexer: &mut Lexer<'_>) -> Result<CommandKind> {
    fetch_args(lexer, false)
}

fn uid_fetch(lexer: &mut Lexer<'_>) -> Result<CommandKind> {
    fetch_args(lexer, true)
}

fn store_args(lexer: &mut Lexer<'_>, uid: bool) -> Result<CommandKind> {
    lexer.expect_space()?;
    let set = lexer.read_sequence_set()?;
    lexer.expect_space()?;

    let item = lexer.read_atom()?.to_ascii_uppercase();
    let (op, rest) = match item.as_bytes().first() {
        Some(b'+') => (FlagOp::Add, &item[1..]),
        Some(b'-') => (FlagOp::Remove, &item[1..]),
        _ => (FlagOp::Replace, item.as_str()),
    };
    let silent = match rest {
        "FLAGS" => false,
        "FLAGS.SILENT" => true,
        _ => return Err(lexer.error(&format!("Unknown store data item: {item}"))),
    };

    lexer.expect_space()?;
    let flags = lexer.read_store_flags()?;
    Ok(CommandKind::Store {
        set,
        directive: StoreDirective { op, silent, flags },
        uid,
    })
}

fn store(lexer: &mut Lexer<'_>) -> Result<CommandKind> {
    store_args(lexer, false)
}

fn uid_store(lexer: &mut Lexer<'_>) -> Result<CommandKind> {
    store_args(lexer, true)
}

fn search_args(lexer: &mut Lexer<'_>, uid: bool) -> Result<CommandKind> {
    lexer.expect_space()?;
    let (charset, criteria) = parse_search(lexer)?;
    Ok(CommandKind::Search {
        charset,
        criteria,
        uid,
    })
}

fn search(lexer: &mut Lexer<'_>) -> Result<CommandKind> {
    search_args(lexer, false)
}

fn uid_search(lexer: &mut Lexer<'_>) -> Result<CommandKind> {
    search_args(lexer, true)
}
