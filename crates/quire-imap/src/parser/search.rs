//! SEARCH key grammar.

use chrono::NaiveDate;

use super::lexer::Lexer;
use crate::Result;
use crate::types::SequenceSet;

/// A single search key.
///
/// A key list is an implicit AND; [`SearchKey::And`] represents a
/// parenthesized group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchKey {
    /// All messages.
    All,
    /// `\Answered` set.
    Answered,
    /// `\Deleted` set.
    Deleted,
    /// `\Draft` set.
    Draft,
    /// `\Flagged` set.
    Flagged,
    /// Recent and unseen.
    New,
    /// Not recent.
    Old,
    /// Recent in this session.
    Recent,
    /// `\Seen` set.
    Seen,
    /// `\Answered` not set.
    Unanswered,
    /// `\Deleted` not set.
    Undeleted,
    /// `\Draft` not set.
    Undraft,
    /// `\Flagged` not set.
    Unflagged,
    /// `\Seen` not set.
    Unseen,
    /// Keyword flag set.
    Keyword(String),
    /// Keyword flag not set.
    Unkeyword(String),
    /// Substring of the Bcc header.
    Bcc(String),
    /// Substring of the Cc header.
    Cc(String),
    /// Substring of the From header.
    From(String),
    /// Substring of the To header.
    To(String),
    /// Substring of the Subject header.
    Subject(String),
    /// Substring of the body.
    Body(String),
    /// Substring of the header or body.
    Text(String),
    /// Substring of a named header field.
    Header(String, String),
    /// Size larger than n octets.
    Larger(u32),
    /// Size smaller than n octets.
    Smaller(u32),
    /// Internal date before the day.
    Before(NaiveDate),
    /// Internal date on the day.
    On(NaiveDate),
    /// Internal date on or after the day.
    Since(NaiveDate),
    /// Date header before the day.
    SentBefore(NaiveDate),
    /// Date header on the day.
    SentOn(NaiveDate),
    /// Date header on or after the day.
    SentSince(NaiveDate),
    /// UIDs in the set.
    Uid(SequenceSet),
    /// Sequence numbers in the set.
    Sequence(SequenceSet),
    /// Negation.
    Not(Box<SearchKey>),
    /// Either key.
    Or(Box<SearchKey>, Box<SearchKey>),
    /// Every key (a parenthesized list).
    And(Vec<SearchKey>),
}

/// Parses the arguments of SEARCH: `[CHARSET name SP] key *(SP key)`.
///
/// Returns the charset, if given, and the keys.
///
/// # Errors
///
/// Returns a parse error for unknown keys or malformed arguments.
pub fn parse_search(lexer: &mut Lexer<'_>) -> Result<(Option<String>, Vec<SearchKey>)> {
    let mut charset = None;
    let start = lexer.position();
    if lexer
        .read_atom()
        .is_ok_and(|word| word.eq_ignore_ascii_case("CHARSET"))
    {
        lexer.expect_space()?;
        charset = Some(lexer.read_astring()?);
        lexer.expect_space()?;
    } else {
        lexer.seek(start);
    }

    let mut keys = vec![parse_key(lexer)?];
    while lexer.eat(b' ') {
        keys.push(parse_key(lexer)?);
    }
    Ok((charset, keys))
}

fn parse_key(lexer: &mut Lexer<'_>) -> Result<SearchKey> {
    match lexer.peek() {
        Some(b'(') => {
            lexer.advance();
            let mut keys = vec![parse_key(lexer)?];
            while !lexer.eat(b')') {
                lexer.expect_space()?;
                keys.push(parse_key(lexer)?);
            }
            return Ok(SearchKey::And(keys));
        }
        Some(b) if b.is_ascii_digit() || b == b'*' => {
            return Ok(SearchKey::Sequence(lexer.read_sequence_set()?));
        }
        _ => {}
    }

    let word = lexer.read_atom()?.to_ascii_uppercase();
    let key = match word.as_str() {
        "ALL" => SearchKey::All,
        "ANSWERED" => SearchKey::Answered,
        "DELETED" => SearchKey::Deleted,
        "DRAFT" => SearchKey::Draft,
        "FLAGGED" => SearchKey::Flagged,
        "NEW" => SearchKey::New,
        "OLD" => SearchKey::Old,
        "RECENT" => SearchKey::Recent,
        "SEEN" => SearchKey::Seen,
        "UNANSWERED" => SearchKey::Unanswered,
        "UNDELETED" => SearchKey::Undeleted,
        "UNDRAFT" => SearchKey::Undraft,
        "UNFLAGGED" => SearchKey::Unflagged,
        "UNSEEN" => SearchKey::Unseen,
        "KEYWORD" => SearchKey::Keyword(argument_atom(lexer)?),
        "UNKEYWORD" => SearchKey::Unkeyword(argument_atom(lexer)?),
        "BCC" => SearchKey::Bcc(argument(lexer)?),
        "CC" => SearchKey::Cc(argument(lexer)?),
        "FROM" => SearchKey::From(argument(lexer)?),
        "TO" => SearchKey::To(argument(lexer)?),
        "SUBJECT" => SearchKey::Subject(argument(lexer)?),
        "BODY" => SearchKey::Body(argument(lexer)?),
        "TEXT" => SearchKey::Text(argument(lexer)?),
        "HEADER" => {
            let field = argument(lexer)?;
            SearchKey::Header(field, argument(lexer)?)
        }
        "LARGER" => SearchKey::Larger(argument_number(lexer)?),
        "SMALLER" => SearchKey::Smaller(argument_number(lexer)?),
        "BEFORE" => SearchKey::Before(argument_date(lexer)?),
        "ON" => SearchKey::On(argument_date(lexer)?),
        "SINCE" => SearchKey::Since(argument_date(lexer)?),
        "SENTBEFORE" => SearchKey::SentBefore(argument_date(lexer)?),
        "SENTON" => SearchKey::SentOn(argument_date(lexer)?),
        "SENTSINCE" => SearchKey::SentSince(argument_date(lexer)?),
        "UID" => {
            lexer.expect_space()?;
            SearchKey::Uid(lexer.read_sequence_set()?)
        }
        "NOT" => {
            lexer.expect_space()?;
            SearchKey::Not(Box::new(parse_key(lexer)?))
        }
        "OR" => {
            lexer.expect_space()?;
            let left = parse_key(lexer)?;
            lexer.expect_space()?;
            SearchKey::Or(Box::new(left), Box::new(parse_key(lexer)?))
        }
        _ => return Err(lexer.error(&format!("Unknown search key: {word}"))),
    };
    Ok(key)
}

fn argument(lexer: &mut Lexer<'_>) -> Result<String> {
    lexer.expect_space()?;
    lexer.read_astring()
}

fn argument_atom(lexer: &mut Lexer<'_>) -> Result<String> {
    lexer.expect_space()?;
    lexer.read_atom().map(str::to_string)
}

fn argument_number(lexer: &mut Lexer<'_>) -> Result<u32> {
    lexer.expect_space()?;
    lexer.read_number()
}

/// Reads `date-text` (`1-Feb-1994`), optionally quoted.
fn argument_date(lexer: &mut Lexer<'_>) -> Result<NaiveDate> {
    lexer.expect_space()?;
    let text = if lexer.peek() == Some(b'"') {
        lexer.read_quoted_string()?
    } else {
        lexer.read_atom()?.to_string()
    };
    NaiveDate::parse_from_str(&text, "%d-%b-%Y").map_err(|_| lexer.error("Invalid date"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<(Option<String>, Vec<SearchKey>)> {
        let mut lexer = Lexer::new(input.as_bytes());
        let parsed = parse_search(&mut lexer)?;
        lexer.expect_end()?;
        Ok(parsed)
    }

    #[test]
    fn flag_keys() {
        let (charset, keys) = parse("DELETED unseen").unwrap();
        assert_eq!(charset, None);
        assert_eq!(keys, vec![SearchKey::Deleted, SearchKey::Unseen]);
    }

    #[test]
    fn charset_prefix() {
        let (charset, keys) = parse("CHARSET UTF-8 SUBJECT \"hello world\"").unwrap();
        assert_eq!(charset.as_deref(), Some("UTF-8"));
        assert_eq!(keys, vec![SearchKey::Subject("hello world".into())]);
    }

    #[test]
    fn sequence_and_uid_sets() {
        let (_, keys) = parse("2:* UID 5,7").unwrap();
        assert_eq!(keys.len(), 2);
        assert!(matches!(keys[0], SearchKey::Sequence(_)));
        assert!(matches!(keys[1], SearchKey::Uid(_)));
    }

    #[test]
    fn boolean_structure() {
        let (_, keys) = parse("OR (FROM bob SEEN) NOT TO alice").unwrap();
        assert_eq!(keys.len(), 1);
        let SearchKey::Or(left, right) = &keys[0] else {
            panic!("expected OR");
        };
        assert_eq!(
            **left,
            SearchKey::And(vec![SearchKey::From("bob".into()), SearchKey::Seen])
        );
        assert_eq!(
            **right,
            SearchKey::Not(Box::new(SearchKey::To("alice".into())))
        );
    }

    #[test]
    fn dates_and_sizes() {
        let (_, keys) = parse("SINCE 1-Feb-1994 BEFORE \"15-Mar-2001\" LARGER 100").unwrap();
        assert_eq!(
            keys[0],
            SearchKey::Since(NaiveDate::from_ymd_opt(1994, 2, 1).unwrap())
        );
        assert_eq!(
            keys[1],
            SearchKey::Before(NaiveDate::from_ymd_opt(2001, 3, 15).unwrap())
        );
        assert_eq!(keys[2], SearchKey::Larger(100));
    }

    #[test]
    fn header_takes_two_arguments() {
        let (_, keys) = parse("HEADER X-Mailer mutt").unwrap();
        assert_eq!(
            keys,
            vec![SearchKey::Header("X-Mailer".into(), "mutt".into())]
        );
    }

    #[test]
    fn errors() {
        assert!(parse("FROB").is_err());
        assert!(parse("SINCE yesterday").is_err());
        assert!(parse("(SEEN").is_err());
        assert!(parse("FROM").is_err());
    }
}
