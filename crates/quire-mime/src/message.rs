//! MIME message structure.

use crate::content_type::ContentType;
use crate::error::{Error, Result};
use crate::header::Headers;
use chrono::{DateTime, FixedOffset};
use std::fmt;

/// Multipart and encapsulated messages deeper than this are treated as opaque.
const MAX_DEPTH: usize = 32;

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit binary.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Parses transfer encoding from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit,
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

/// Splits a raw message into its header block and body.
///
/// The header block keeps the blank line that terminates it. A message
/// without a blank line is all header.
#[must_use]
pub fn split_message(raw: &[u8]) -> (&[u8], &[u8]) {
    if raw.starts_with(b"\r\n") {
        return raw.split_at(2);
    }
    if raw.starts_with(b"\n") {
        return raw.split_at(1);
    }
    let mut pos = 0;
    while let Some(offset) = raw[pos..].iter().position(|&b| b == b'\n') {
        let next = pos + offset + 1;
        let rest = &raw[next..];
        if rest.starts_with(b"\r\n") {
            return raw.split_at(next + 2);
        }
        if rest.starts_with(b"\n") {
            return raw.split_at(next + 1);
        }
        pos = next;
    }
    (raw, &[])
}

/// Counts the lines of a body, counting a trailing partial line.
#[must_use]
pub fn count_lines(body: &[u8]) -> u32 {
    let newlines = body.iter().filter(|&&b| b == b'\n').count();
    let partial = usize::from(!body.is_empty() && !body.ends_with(b"\n"));
    u32::try_from(newlines + partial).unwrap_or(u32::MAX)
}

/// One node of a parsed MIME tree.
///
/// A multipart node has `children`; an encapsulated `message/rfc822` node
/// has `message`; everything else is a leaf.
#[derive(Debug, Clone)]
pub struct Part {
    /// Raw header bytes, including the terminating blank line.
    pub header: Vec<u8>,
    /// Raw body bytes.
    pub body: Vec<u8>,
    /// Parsed headers.
    pub headers: Headers,
    /// Effective content type.
    pub content_type: ContentType,
    /// Sub-parts of a multipart body.
    pub children: Vec<Part>,
    /// The encapsulated message of a `message/rfc822` body.
    pub message: Option<Box<Part>>,
}

impl Part {
    /// Parses a raw entity (header block plus body).
    #[must_use]
    pub fn parse(raw: &[u8]) -> Self {
        Self::parse_at_depth(raw, 0)
    }

    fn parse_at_depth(raw: &[u8], depth: usize) -> Self {
        let (header, body) = split_message(raw);
        let headers = Headers::parse(header);
        let content_type = headers
            .get("content-type")
            .and_then(|v| ContentType::parse(v).ok())
            .unwrap_or_default();

        let mut part = Self {
            header: header.to_vec(),
            body: body.to_vec(),
            headers,
            content_type,
            children: Vec::new(),
            message: None,
        };

        if depth >= MAX_DEPTH {
            return part;
        }

        if part.content_type.is_multipart() {
            if let Some(boundary) = part.content_type.boundary() {
                part.children = split_multipart(body, boundary)
                    .into_iter()
                    .map(|raw| Self::parse_at_depth(raw, depth + 1))
                    .collect();
            }
        } else if part.content_type.is_message() {
            part.message = Some(Box::new(Self::parse_at_depth(body, depth + 1)));
        }

        part
    }

    /// Gets the transfer encoding.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.headers
            .get("content-transfer-encoding")
            .map_or(TransferEncoding::SevenBit, TransferEncoding::parse)
    }

    /// Looks up a sub-part by its 1-based IMAP part path.
    ///
    /// An empty path is the part itself. For a non-multipart entity, part `1`
    /// is the entity itself. A path continuing past a `message/rfc822` part
    /// descends into the encapsulated message.
    #[must_use]
    pub fn find(&self, path: &[u32]) -> Option<&Self> {
        let Some((&first, rest)) = path.split_first() else {
            return Some(self);
        };
        let index = usize::try_from(first).ok()?.checked_sub(1)?;

        if self.content_type.is_multipart() {
            return self.children.get(index)?.enter(rest);
        }
        if index == 0 {
            return self.enter(rest);
        }
        None
    }

    fn enter(&self, rest: &[u32]) -> Option<&Self> {
        if rest.is_empty() {
            return Some(self);
        }
        self.message.as_deref()?.find(rest)
    }
}

/// Splits a multipart body into its raw parts.
///
/// The line break before each delimiter belongs to the delimiter. The
/// preamble and epilogue are dropped.
fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Vec<&'a [u8]> {
    let delimiter = format!("--{boundary}");
    let mut parts = Vec::new();
    let mut start: Option<usize> = None;
    let mut pos = 0;

    while pos < body.len() {
        let line_end = body[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(body.len(), |i| pos + i);
        let next = (line_end + 1).min(body.len());
        let line = &body[pos..line_end];
        let line = line.strip_suffix(b"\r").unwrap_or(line);

        if let Some(rest) = line.strip_prefix(delimiter.as_bytes()) {
            let closing = rest.starts_with(b"--");
            if closing || rest.iter().all(u8::is_ascii_whitespace) {
                if let Some(s) = start {
                    let end = if body[..pos].ends_with(b"\r\n") {
                        pos - 2
                    } else if body[..pos].ends_with(b"\n") {
                        pos - 1
                    } else {
                        pos
                    };
                    parts.push(&body[s..end.max(s)]);
                }
                if closing {
                    return parts;
                }
                start = Some(next);
            }
        }

        if line_end >= body.len() {
            break;
        }
        pos = next;
    }

    // Unterminated multipart: keep what follows the last delimiter.
    if let Some(s) = start {
        parts.push(&body[s..]);
    }
    parts
}

/// Parses an RFC 5322 date, tolerating a trailing comment like `(UTC)`.
///
/// # Errors
///
/// Returns an error if the value is not a valid date.
pub fn parse_date(raw: &str) -> Result<DateTime<FixedOffset>> {
    let trimmed = raw
        .split_once('(')
        .map_or(raw, |(before, _)| before)
        .trim();
    DateTime::parse_from_rfc2822(trimmed).map_err(|e| Error::InvalidDate(format!("{raw}: {e}")))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    const SIMPLE: &[u8] = b"From: Alice <alice@example.com>\r\n\
To: bob@example.com\r\n\
Subject: Hello\r\n\
Date: Mon, 7 Feb 1994 21:52:25 -0800 (PST)\r\n\
\r\n\
Hi Bob,\r\nSee you.\r\n";

    const MULTIPART: &[u8] = b"Subject: parts\r\n\
Content-Type: multipart/mixed; boundary=\"XX\"\r\n\
\r\n\
preamble\r\n\
--XX\r\n\
Content-Type: text/plain\r\n\
\r\n\
first\r\n\
--XX\r\n\
Content-Type: message/rfc822\r\n\
\r\n\
Subject: inner\r\n\
\r\n\
inner body\r\n\
--XX--\r\n\
epilogue\r\n";

    mod split_tests {
        use super::*;

        #[test]
        fn split_keeps_blank_line_in_header() {
            let (header, body) = split_message(SIMPLE);
            assert!(header.ends_with(b"(PST)\r\n\r\n"));
            assert_eq!(body, b"Hi Bob,\r\nSee you.\r\n");
        }

        #[test]
        fn split_without_body() {
            let (header, body) = split_message(b"Subject: x\r\n");
            assert_eq!(header, b"Subject: x\r\n");
            assert!(body.is_empty());
        }

        #[test]
        fn split_empty_header() {
            let (header, body) = split_message(b"\r\nbody");
            assert_eq!(header, b"\r\n");
            assert_eq!(body, b"body");
        }

        #[test]
        fn count_lines_partial_last_line() {
            assert_eq!(count_lines(b"a\r\nb\r\n"), 2);
            assert_eq!(count_lines(b"a\r\nb"), 2);
            assert_eq!(count_lines(b""), 0);
        }
    }

    mod part_tests {
        use super::*;

        #[test]
        fn simple_part_defaults_to_text_plain() {
            let part = Part::parse(SIMPLE);
            assert!(part.content_type.is_text());
            assert_eq!(part.content_type.charset(), Some("us-ascii"));
            assert!(part.children.is_empty());
            assert_eq!(part.transfer_encoding(), TransferEncoding::SevenBit);
        }

        #[test]
        fn multipart_children() {
            let part = Part::parse(MULTIPART);
            assert_eq!(part.children.len(), 2);
            assert_eq!(part.children[0].body, b"first");
            assert!(part.children[1].content_type.is_message());
        }

        #[test]
        fn find_by_path() {
            let part = Part::parse(MULTIPART);
            assert_eq!(part.find(&[1]).unwrap().body, b"first");
            let inner = part.find(&[2, 1]).unwrap();
            assert_eq!(inner.body, b"inner body");
            assert!(part.find(&[3]).is_none());
            assert!(part.find(&[0]).is_none());
        }

        #[test]
        fn find_single_part() {
            let part = Part::parse(SIMPLE);
            assert!(std::ptr::eq(part.find(&[1]).unwrap(), &part));
            assert!(part.find(&[2]).is_none());
            assert!(part.find(&[1, 1]).is_none());
        }

        #[test]
        fn unterminated_multipart_keeps_last_part() {
            let raw = b"Content-Type: multipart/mixed; boundary=b\r\n\r\n--b\r\n\r\nonly";
            let part = Part::parse(raw);
            assert_eq!(part.children.len(), 1);
            assert_eq!(part.children[0].body, b"only");
        }
    }

    mod date_tests {
        use super::*;
        use crate::address::parse_address_list;

        #[test]
        fn header_accessors() {
            let part = Part::parse(SIMPLE);
            assert_eq!(part.headers.get("subject"), Some("Hello"));
            let from = parse_address_list(part.headers.get("from").unwrap());
            assert_eq!(from.len(), 1);
            assert_eq!(from[0].name.as_deref(), Some("Alice"));
            assert!(part.headers.get("cc").is_none());
        }

        #[test]
        fn date_strips_comment() {
            let part = Part::parse(SIMPLE);
            let date = parse_date(part.headers.get("date").unwrap()).unwrap();
            assert_eq!(date.format("%Y-%m-%d").to_string(), "1994-02-07");
        }

        #[test]
        fn malformed_date() {
            assert!(parse_date("next tuesday").is_err());
        }
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn split_is_lossless(raw in proptest::collection::vec(any::<u8>(), 0..256)) {
                let (header, body) = split_message(&raw);
                let mut joined = header.to_vec();
                joined.extend_from_slice(body);
                prop_assert_eq!(joined, raw);
            }

            #[test]
            fn parse_never_panics(raw in proptest::collection::vec(any::<u8>(), 0..512)) {
                let part = Part::parse(&raw);
                let _ = part.find(&[1, 2, 3]);
            }
        }
    }
}
