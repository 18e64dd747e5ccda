//! IMAP command parser.
//!
//! Turns one framed command (the line plus any literal octets, without the
//! final CRLF) into a typed [`Command`]. Failures carry the tag when one
//! could be read, so the caller can answer with a tagged or untagged BAD.

mod command;
mod fetch;
mod lexer;
mod search;

pub use command::{
    Command, CommandKind, StateMask, StoreDirective, UID_VERBS, VERBS, VerbSpec, lookup,
    lookup_uid,
};
pub use fetch::{
    FetchAttribute, FetchMacro, FetchRequest, Partial, Section, SectionText, parse_fetch_request,
};
pub use lexer::{Lexer, Token, is_astring_char, is_atom_char, is_atom_special};
pub use search::{SearchKey, parse_search};

use thiserror::Error;

use crate::types::Tag;

/// Parser limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserConfig {
    /// Longest tag accepted.
    pub max_tag_len: usize,
    /// Longest verb accepted.
    pub max_verb_len: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_tag_len: 32,
            max_verb_len: 16,
        }
    }
}

/// A command that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ParseFailure {
    /// The tag, if one was read; `None` means the BAD is untagged.
    pub tag: Option<Tag>,
    /// Text for the BAD response.
    pub message: String,
}

impl ParseFailure {
    fn untagged(message: &str) -> Self {
        Self {
            tag: None,
            message: message.to_string(),
        }
    }

    fn tagged(tag: &Tag, message: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.clone()),
            message: message.into(),
        }
    }
}

/// Parses one command.
///
/// # Errors
///
/// Returns a [`ParseFailure`] for a missing or invalid tag (untagged), and
/// for a missing, over-long or unknown verb or malformed arguments
/// (tagged). Argument errors name the verb's expected syntax.
pub fn parse(line: &[u8], config: &ParserConfig) -> Result<Command, ParseFailure> {
    let mut lexer = Lexer::new(line);

    while lexer.peek().is_some_and(Tag::is_tag_char) {
        lexer.advance();
    }
    let raw_tag = lexer.since(0);
    if raw_tag.is_empty() || raw_tag.len() > config.max_tag_len || !lexer.eat(b' ') {
        return Err(ParseFailure::untagged("Missing or invalid tag"));
    }
    let tag = Tag::new(String::from_utf8_lossy(raw_tag));

    let verb = read_verb(&mut lexer, config).map_err(|m| ParseFailure::tagged(&tag, m))?;
    let spec = if verb == "UID" {
        if !lexer.eat(b' ') {
            return Err(ParseFailure::tagged(&tag, "Missing UID command"));
        }
        let sub = read_verb(&mut lexer, config).map_err(|m| ParseFailure::tagged(&tag, m))?;
        lookup_uid(&sub)
            .ok_or_else(|| ParseFailure::tagged(&tag, format!("Unknown UID command: {sub}")))?
    } else {
        lookup(&verb)
            .ok_or_else(|| ParseFailure::tagged(&tag, format!("Unknown command: {verb}")))?
    };

    let kind = (spec.parse)(&mut lexer)
        .and_then(|kind| lexer.expect_end().map(|()| kind))
        .map_err(|e| {
            tracing::trace!(verb = spec.name, error = %e, "argument parse failed");
            ParseFailure::tagged(&tag, spec.usage())
        })?;

    Ok(Command {
        tag,
        verb: spec,
        kind,
    })
}

fn read_verb(lexer: &mut Lexer<'_>, config: &ParserConfig) -> Result<String, &'static str> {
    let start = lexer.position();
    while lexer.peek().is_some_and(|b| b.is_ascii_alphabetic()) {
        lexer.advance();
    }
    let verb = lexer.since(start);
    if verb.is_empty() {
        return Err("Missing command");
    }
    if verb.len() > config.max_verb_len {
        return Err("Command name too long");
    }
    Ok(String::from_utf8_lossy(verb).to_ascii_uppercase())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{Flag, FlagOp, RightsChange};
    use proptest::prelude::*;

    fn parse_ok(line: &str) -> Command {
        parse(line.as_bytes(), &ParserConfig::default()).unwrap()
    }

    fn parse_err(line: &str) -> ParseFailure {
        parse(line.as_bytes(), &ParserConfig::default()).unwrap_err()
    }

    mod tag_tests {
        use super::*;

        #[test]
        fn missing_tag_is_untagged() {
            assert_eq!(parse_err("").tag, None);
            assert_eq!(parse_err(" NOOP").tag, None);
            assert_eq!(parse_err("a1").tag, None);
        }

        #[test]
        fn invalid_tag_characters() {
            assert_eq!(parse_err("a+1 NOOP").tag, None);
            assert_eq!(parse_err("a*1 NOOP").tag, None);
        }

        #[test]
        fn tag_too_long() {
            let line = format!("{} NOOP", "a".repeat(33));
            assert_eq!(parse_err(&line).tag, None);
            let line = format!("{} NOOP", "a".repeat(32));
            assert_eq!(parse_ok(&line).kind, CommandKind::Noop);
        }

        #[test]
        fn custom_tag_limit() {
            let config = ParserConfig {
                max_tag_len: 2,
                ..ParserConfig::default()
            };
            assert!(parse(b"abc NOOP", &config).is_err());
            assert!(parse(b"ab NOOP", &config).is_ok());
        }
    }

    mod verb_tests {
        use super::*;

        #[test]
        fn case_insensitive() {
            assert_eq!(parse_ok("a1 noop").kind, CommandKind::Noop);
            assert_eq!(parse_ok("a1 Capability").kind, CommandKind::Capability);
        }

        #[test]
        fn unknown_verb_is_tagged() {
            let failure = parse_err("a1 FROB");
            assert_eq!(failure.tag, Some(Tag::new("a1")));
            assert_eq!(failure.message, "Unknown command: FROB");
        }

        #[test]
        fn missing_verb_is_tagged() {
            let failure = parse_err("a1 ");
            assert_eq!(failure.tag, Some(Tag::new("a1")));
        }

        #[test]
        fn over_long_verb() {
            let failure = parse_err("a1 ABCDEFGHIJKLMNOPQ");
            assert_eq!(failure.message, "Command name too long");
        }

        #[test]
        fn bad_arguments_name_the_syntax() {
            let failure = parse_err("a1 SELECT");
            assert_eq!(failure.tag, Some(Tag::new("a1")));
            assert_eq!(failure.message, "Command should be <tag> <SELECT> <mailbox>");
            assert_eq!(
                parse_err("a1 NOOP extra").message,
                "Command should be <tag> <NOOP>"
            );
        }

        #[test]
        fn uid_prefix() {
            let command = parse_ok("a1 UID FETCH 1:* FLAGS");
            assert_eq!(command.name(), "UID FETCH");
            let CommandKind::Fetch { request, uid, .. } = command.kind else {
                panic!("expected fetch");
            };
            assert!(uid);
            assert!(request.contains(&FetchAttribute::Uid));
            assert!(parse_err("a1 UID SELECT INBOX").message.starts_with("Unknown UID"));
        }
    }

    mod argument_tests {
        use super::*;

        #[test]
        fn login_with_quoted_and_literal() {
            let command = parse_ok("a1 LOGIN \"bob smith\" {6}\r\nsecret");
            assert_eq!(
                command.kind,
                CommandKind::Login {
                    username: "bob smith".into(),
                    password: "secret".into()
                }
            );
        }

        #[test]
        fn list_with_empty_reference() {
            let command = parse_ok("a1 LIST \"\" *");
            assert_eq!(
                command.kind,
                CommandKind::List {
                    reference: String::new(),
                    pattern: "*".into()
                }
            );
        }

        #[test]
        fn store_directive() {
            let command = parse_ok("a1 STORE 2:4 +FLAGS.SILENT (\\Deleted)");
            let CommandKind::Store { directive, uid, .. } = command.kind else {
                panic!("expected store");
            };
            assert!(!uid);
            assert_eq!(directive.op, FlagOp::Add);
            assert!(directive.silent);
            assert!(directive.flags.contains(&Flag::Deleted));
        }

        #[test]
        fn store_rejects_unknown_item() {
            assert!(parse_err("a1 STORE 1 +LABELS (x)").tag.is_some());
        }

        #[test]
        fn append_with_flags_and_date() {
            let command =
                parse_ok("a1 APPEND saved (\\Seen) \" 7-Feb-1994 21:52:25 -0800\" {5}\r\nhello");
            let CommandKind::Append {
                mailbox,
                flags,
                date,
                message,
            } = command.kind
            else {
                panic!("expected append");
            };
            assert_eq!(mailbox, "saved");
            assert!(flags.is_seen());
            assert_eq!(date.unwrap().to_rfc3339(), "1994-02-07T21:52:25-08:00");
            assert_eq!(message, b"hello");
        }

        #[test]
        fn status_items() {
            let command = parse_ok("a1 STATUS INBOX (MESSAGES UNSEEN)");
            let CommandKind::Status { items, .. } = command.kind else {
                panic!("expected status");
            };
            assert_eq!(items.len(), 2);
        }

        #[test]
        fn setacl_modifiers() {
            let command = parse_ok("a1 SETACL INBOX fred +rw");
            let CommandKind::SetAcl { change, .. } = command.kind else {
                panic!("expected setacl");
            };
            assert!(matches!(change, RightsChange::Add(_)));
            assert!(parse_err("a1 SETACL INBOX fred xyz").tag.is_some());
        }

        #[test]
        fn fetch_header_fields_is_one_attribute() {
            let command = parse_ok("a1 FETCH 1 (BODY[HEADER.FIELDS (FROM TO)] UID)");
            let CommandKind::Fetch { request, .. } = command.kind else {
                panic!("expected fetch");
            };
            assert_eq!(request.attributes.len(), 2);
        }

        #[test]
        fn copy_and_search() {
            assert!(matches!(
                parse_ok("a1 UID COPY 1:3 Trash").kind,
                CommandKind::Copy { uid: true, .. }
            ));
            assert!(matches!(
                parse_ok("a1 SEARCH UNSEEN").kind,
                CommandKind::Search { uid: false, .. }
            ));
        }
    }

    proptest! {
        #[test]
        fn parse_never_panics(line in proptest::collection::vec(any::<u8>(), 0..64)) {
            let _ = parse(&line, &ParserConfig::default());
        }

        #[test]
        fn tagged_failures_keep_the_tag(tag in "[a-zA-Z0-9]{1,10}", junk in "[a-z]{17,20}") {
            let line = format!("{tag} {junk}");
            let failure = parse(line.as_bytes(), &ParserConfig::default()).unwrap_err();
            prop_assert_eq!(failure.tag, Some(Tag::new(tag)));
        }
    }
}
