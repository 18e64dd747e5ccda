//! FETCH attribute grammar.
//!
//! Parses `FAST`, `ALL`, `FULL`, single attributes and parenthesized
//! attribute lists into a [`FetchRequest`]. Macro expansion and
//! de-duplication happen here, once per command, before any message is
//! touched.

use std::fmt;

use super::lexer::Lexer;
use crate::Result;

/// The text part of a body section specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionText {
    /// `HEADER`: the header block including the blank line.
    Header,
    /// `HEADER.FIELDS (..)`: only the listed fields.
    HeaderFields(Vec<String>),
    /// `HEADER.FIELDS.NOT (..)`: every field except the listed ones.
    HeaderFieldsNot(Vec<String>),
    /// `TEXT`: the body without its header.
    Text,
    /// `MIME`: the MIME header of a numbered part.
    Mime,
}

/// A body section: an optional part path plus an optional text specifier.
///
/// `BODY[]` is the empty section: the whole message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    /// 1-based part numbers, outermost first.
    pub path: Vec<u32>,
    /// Which piece of the addressed part.
    pub text: Option<SectionText>,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self
            .path
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".");
        f.write_str(&path)?;
        let Some(text) = &self.text else {
            return Ok(());
        };
        if !path.is_empty() {
            f.write_str(".")?;
        }
        match text {
            SectionText::Header => f.write_str("HEADER"),
            SectionText::Text => f.write_str("TEXT"),
            SectionText::Mime => f.write_str("MIME"),
            SectionText::HeaderFields(names) => write!(f, "HEADER.FIELDS ({})", names.join(" ")),
            SectionText::HeaderFieldsNot(names) => {
                write!(f, "HEADER.FIELDS.NOT ({})", names.join(" "))
            }
        }
    }
}

/// A `<start.length>` partial range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partial {
    /// First octet, 0-based.
    pub start: u32,
    /// Maximum number of octets.
    pub length: u32,
}

/// A single FETCH data item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchAttribute {
    /// `FLAGS`
    Flags,
    /// `INTERNALDATE`
    InternalDate,
    /// `RFC822.SIZE`
    Rfc822Size,
    /// `ENVELOPE`
    Envelope,
    /// `BODY` without a section: the non-extensible body structure.
    Body,
    /// `BODYSTRUCTURE`
    BodyStructure,
    /// `UID`
    Uid,
    /// `RFC822`: the whole message; sets `\Seen`.
    Rfc822,
    /// `RFC822.HEADER`: the header; never sets `\Seen`.
    Rfc822Header,
    /// `RFC822.TEXT`: the body; sets `\Seen`.
    Rfc822Text,
    /// `BODY[section]<partial>` or `BODY.PEEK[section]<partial>`.
    BodySection {
        /// Addressed section.
        section: Section,
        /// Optional partial range.
        partial: Option<Partial>,
        /// True for `BODY.PEEK`.
        peek: bool,
    },
}

impl FetchAttribute {
    /// Returns true if fetching this attribute implicitly sets `\Seen`.
    #[must_use]
    pub const fn sets_seen(&self) -> bool {
        match self {
            Self::Rfc822 | Self::Rfc822Text => true,
            Self::BodySection { peek, .. } => !*peek,
            _ => false,
        }
    }

    /// Returns the name this attribute carries in a FETCH response.
    ///
    /// `BODY.PEEK[..]` answers as `BODY[..]`, and a partial range answers
    /// with its start offset only.
    #[must_use]
    pub fn response_name(&self) -> String {
        match self {
            Self::Flags => "FLAGS".to_string(),
            Self::InternalDate => "INTERNALDATE".to_string(),
            Self::Rfc822Size => "RFC822.SIZE".to_string(),
            Self::Envelope => "ENVELOPE".to_string(),
            Self::Body => "BODY".to_string(),
            Self::BodyStructure => "BODYSTRUCTURE".to_string(),
            Self::Uid => "UID".to_string(),
            Self::Rfc822 => "RFC822".to_string(),
            Self::Rfc822Header => "RFC822.HEADER".to_string(),
            Self::Rfc822Text => "RFC822.TEXT".to_string(),
            Self::BodySection {
                section, partial, ..
            } => match partial {
                Some(p) => format!("BODY[{section}]<{}>", p.start),
                None => format!("BODY[{section}]"),
            },
        }
    }
}

/// The FETCH macros.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FetchMacro {
    /// `FLAGS INTERNALDATE RFC822.SIZE`
    Fast,
    /// `FAST` plus `ENVELOPE`
    All,
    /// `ALL` plus `BODY`
    Full,
}

impl FetchMacro {
    /// Expands the macro into its attributes.
    #[must_use]
    pub fn expand(self) -> Vec<FetchAttribute> {
        let mut attributes = vec![
            FetchAttribute::Flags,
            FetchAttribute::InternalDate,
            FetchAttribute::Rfc822Size,
        ];
        if self >= Self::All {
            attributes.push(FetchAttribute::Envelope);
        }
        if self == Self::Full {
            attributes.push(FetchAttribute::Body);
        }
        attributes
    }
}

/// A parsed, macro-expanded, de-duplicated FETCH request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchRequest {
    /// Attributes in request order.
    pub attributes: Vec<FetchAttribute>,
    /// The first attribute name that was not recognized, if any.
    ///
    /// Attributes listed after it are not kept.
    pub unrecognized: Option<String>,
}

impl FetchRequest {
    /// Builds a request from attributes, dropping duplicates.
    ///
    /// Two body sections with the same response name collapse into one,
    /// which is a peek only if both were.
    #[must_use]
    pub fn new(attributes: Vec<FetchAttribute>) -> Self {
        let mut request = Self::default();
        for attribute in attributes {
            request.push(attribute);
        }
        request
    }

    fn push(&mut self, attribute: FetchAttribute) {
        let name = attribute.response_name();
        let existing = self
            .attributes
            .iter_mut()
            .find(|a| a.response_name() == name);
        match (existing, attribute) {
            (
                Some(FetchAttribute::BodySection { peek, .. }),
                FetchAttribute::BodySection { peek: other, .. },
            ) => *peek = *peek && other,
            (Some(_), _) => {}
            (None, attribute) => self.attributes.push(attribute),
        }
    }

    /// Returns true if any attribute implicitly sets `\Seen`.
    #[must_use]
    pub fn sets_seen(&self) -> bool {
        self.attributes.iter().any(FetchAttribute::sets_seen)
    }

    /// Returns true if the attribute was requested.
    #[must_use]
    pub fn contains(&self, attribute: &FetchAttribute) -> bool {
        self.attributes.contains(attribute)
    }

    /// Makes sure `UID` is part of the request, as UID FETCH requires.
    pub fn ensure_uid(&mut self) {
        self.push(FetchAttribute::Uid);
    }
}

enum Item {
    Attribute(FetchAttribute),
    Macro(FetchMacro),
    Unknown(String),
}

/// Parses the fetch-att argument of FETCH.
///
/// # Errors
///
/// Returns a parse error for malformed section specifiers, partial ranges
/// or list syntax. Unknown attribute names are not errors; they are
/// recorded in [`FetchRequest::unrecognized`].
pub fn parse_fetch_request(lexer: &mut Lexer<'_>) -> Result<FetchRequest> {
    let mut attributes = Vec::new();
    let mut macro_seen: Option<FetchMacro> = None;
    let mut unrecognized = None;

    let in_list = lexer.eat(b'(');
    loop {
        match parse_item(lexer)? {
            Item::Attribute(attribute) => attributes.push(attribute),
            Item::Macro(m) => macro_seen = macro_seen.max(Some(m)),
            Item::Unknown(name) => {
                unrecognized = Some(name);
                skip_rest(lexer, in_list);
                break;
            }
        }
        if !in_list || lexer.eat(b')') {
            break;
        }
        lexer.expect_space()?;
    }

    let mut request = match macro_seen {
        Some(m) => FetchRequest::new(m.expand()),
        None => FetchRequest::new(attributes),
    };
    request.unrecognized = unrecognized;
    Ok(request)
}

/// Skips the remainder of an attribute list after an unknown name.
fn skip_rest(lexer: &mut Lexer<'_>, in_list: bool) {
    let mut depth = usize::from(in_list);
    while let Some(b) = lexer.peek() {
        if depth == 0 && !in_list && b == b' ' {
            return;
        }
        lexer.advance();
        match b {
            b'(' => depth += 1,
            b')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 && in_list {
                    return;
                }
            }
            _ => {}
        }
    }
}

fn parse_item(lexer: &mut Lexer<'_>) -> Result<Item> {
    let start = lexer.position();
    let mut name = String::new();
    while let Some(b) = lexer.peek() {
        if matches!(b, b' ' | b'(' | b')' | b'[' | b'<') {
            break;
        }
        name.push(char::from(b).to_ascii_uppercase());
        lexer.advance();
    }
    if name.is_empty() {
        return Err(lexer.error("Expected fetch attribute"));
    }

    let attribute = match name.as_str() {
        "FAST" => return Ok(Item::Macro(FetchMacro::Fast)),
        "ALL" => return Ok(Item::Macro(FetchMacro::All)),
        "FULL" => return Ok(Item::Macro(FetchMacro::Full)),
        "FLAGS" => FetchAttribute::Flags,
        "INTERNALDATE" => FetchAttribute::InternalDate,
        "RFC822.SIZE" => FetchAttribute::Rfc822Size,
        "ENVELOPE" => FetchAttribute::Envelope,
        "BODYSTRUCTURE" => FetchAttribute::BodyStructure,
        "UID" => FetchAttribute::Uid,
        "RFC822" => FetchAttribute::Rfc822,
        "RFC822.HEADER" => FetchAttribute::Rfc822Header,
        "RFC822.TEXT" => FetchAttribute::Rfc822Text,
        "BODY" if lexer.peek() != Some(b'[') => FetchAttribute::Body,
        "BODY" | "BODY.PEEK" => parse_body_section(lexer, name == "BODY.PEEK")?,
        _ => {
            let raw = String::from_utf8_lossy(lexer.since(start)).into_owned();
            return Ok(Item::Unknown(raw));
        }
    };
    Ok(Item::Attribute(attribute))
}

fn parse_body_section(lexer: &mut Lexer<'_>, peek: bool) -> Result<FetchAttribute> {
    lexer.expect(b'[')?;

    let mut path = Vec::new();
    let mut trailing_dot = false;
    while lexer.peek().is_some_and(|b| b.is_ascii_digit()) {
        let n = lexer.read_number()?;
        if n == 0 {
            return Err(lexer.error("Section part numbers start at 1"));
        }
        path.push(n);
        trailing_dot = lexer.eat(b'.');
        if !trailing_dot {
            break;
        }
    }

    let text = if lexer.peek() == Some(b']') {
        if trailing_dot {
            return Err(lexer.error("Expected section text after '.'"));
        }
        None
    } else {
        if !path.is_empty() && !trailing_dot {
            return Err(lexer.error("Expected ']' or '.' after part number"));
        }
        Some(parse_section_text(lexer, path.is_empty())?)
    };
    lexer.expect(b']')?;

    let partial = if lexer.eat(b'<') {
        let start = lexer.read_number()?;
        lexer.expect(b'.')?;
        let length = lexer.read_number()?;
        if length == 0 {
            return Err(lexer.error("Partial length must be positive"));
        }
        lexer.expect(b'>')?;
        Some(Partial { start, length })
    } else {
        None
    };

    Ok(FetchAttribute::BodySection {
        section: Section { path, text },
        partial,
        peek,
    })
}

fn parse_section_text(lexer: &mut Lexer<'_>, top_level: bool) -> Result<SectionText> {
    let mut word = String::new();
    while let Some(b) = lexer.peek() {
        if !(b.is_ascii_alphanumeric() || b == b'.') {
            break;
        }
        word.push(char::from(b).to_ascii_uppercase());
        lexer.advance();
    }

    match word.as_str() {
        "HEADER" => Ok(SectionText::Header),
        "TEXT" => Ok(SectionText::Text),
        "MIME" if !top_level => Ok(SectionText::Mime),
        "HEADER.FIELDS" => Ok(SectionText::HeaderFields(parse_field_names(lexer)?)),
        "HEADER.FIELDS.NOT" => Ok(SectionText::HeaderFieldsNot(parse_field_names(lexer)?)),
        _ => Err(lexer.error(&format!("Unknown section text: {word}"))),
    }
}

fn parse_field_names(lexer: &mut Lexer<'_>) -> Result<Vec<String>> {
    lexer.expect_space()?;
    lexer.expect(b'(')?;
    let mut names = vec![lexer.read_astring()?];
    while !lexer.eat(b')') {
        lexer.expect_space()?;
        names.push(lexer.read_astring()?);
    }
    Ok(names)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<FetchRequest> {
        let mut lexer = Lexer::new(input.as_bytes());
        let request = parse_fetch_request(&mut lexer)?;
        lexer.expect_end()?;
        Ok(request)
    }

    mod macro_tests {
        use super::*;

        #[test]
        fn all_expands_exactly() {
            let request = parse("ALL").unwrap();
            assert_eq!(
                request.attributes,
                vec![
                    FetchAttribute::Flags,
                    FetchAttribute::InternalDate,
                    FetchAttribute::Rfc822Size,
                    FetchAttribute::Envelope,
                ]
            );
        }

        #[test]
        fn macro_ignores_other_attributes() {
            let request = parse("(ALL UID BODY[TEXT])").unwrap();
            assert_eq!(request, parse("ALL").unwrap());
        }

        #[test]
        fn fast_and_full() {
            assert_eq!(parse("FAST").unwrap().attributes.len(), 3);
            let full = parse("full").unwrap();
            assert_eq!(full.attributes.last(), Some(&FetchAttribute::Body));
        }
    }

    mod attribute_tests {
        use super::*;

        #[test]
        fn duplicate_flags_collapse() {
            let request = parse("(FLAGS FLAGS)").unwrap();
            assert_eq!(request.attributes, vec![FetchAttribute::Flags]);
        }

        #[test]
        fn body_vs_body_section() {
            let request = parse("(BODY BODY[])").unwrap();
            assert_eq!(request.attributes[0], FetchAttribute::Body);
            assert_eq!(request.attributes[1].response_name(), "BODY[]");
        }

        #[test]
        fn header_fields_list_is_one_attribute() {
            let request = parse("(UID BODY.PEEK[HEADER.FIELDS (From To)] FLAGS)").unwrap();
            assert_eq!(request.attributes.len(), 3);
            let FetchAttribute::BodySection { section, peek, .. } = &request.attributes[1] else {
                panic!("expected body section");
            };
            assert!(*peek);
            assert_eq!(
                section.text,
                Some(SectionText::HeaderFields(vec!["From".into(), "To".into()]))
            );
            assert_eq!(
                request.attributes[1].response_name(),
                "BODY[HEADER.FIELDS (From To)]"
            );
        }

        #[test]
        fn part_paths_and_partial() {
            let request = parse("BODY[1.2.MIME]<10.20>").unwrap();
            let attribute = &request.attributes[0];
            assert_eq!(attribute.response_name(), "BODY[1.2.MIME]<10>");
            assert!(attribute.sets_seen());
        }

        #[test]
        fn peek_does_not_set_seen() {
            assert!(!parse("BODY.PEEK[TEXT]").unwrap().sets_seen());
            assert!(!parse("RFC822.HEADER").unwrap().sets_seen());
            assert!(parse("RFC822.TEXT").unwrap().sets_seen());
        }

        #[test]
        fn peek_and_plain_merge_to_plain() {
            let request = parse("(BODY.PEEK[TEXT] BODY[TEXT])").unwrap();
            assert_eq!(request.attributes.len(), 1);
            assert!(request.sets_seen());
        }

        #[test]
        fn ensure_uid_is_idempotent() {
            let mut request = parse("(UID FLAGS)").unwrap();
            request.ensure_uid();
            assert_eq!(request.attributes.len(), 2);
        }
    }

    mod error_tests {
        use super::*;

        #[test]
        fn unrecognized_is_recorded_not_rejected() {
            let request = parse("(FLAGS XYZZY UID)").unwrap();
            assert_eq!(request.attributes, vec![FetchAttribute::Flags]);
            assert_eq!(request.unrecognized.as_deref(), Some("XYZZY"));
        }

        #[test]
        fn unrecognized_single_attribute() {
            let request = parse("BOGUS").unwrap();
            assert!(request.attributes.is_empty());
            assert_eq!(request.unrecognized.as_deref(), Some("BOGUS"));
        }

        #[test]
        fn malformed_sections_are_errors() {
            assert!(parse("BODY[HEADER.FIELDS FROM]").is_err());
            assert!(parse("BODY[NOPE]").is_err());
            assert!(parse("BODY[0]").is_err());
            assert!(parse("BODY[1.]").is_err());
            assert!(parse("BODY[MIME]").is_err());
            assert!(parse("BODY.PEEK").is_err());
            assert!(parse("BODY[]<5.0>").is_err());
            assert!(parse("(FLAGS").is_err());
        }
    }
}
