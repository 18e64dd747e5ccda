//! Message header handling.
//!
//! Two views of a header block are offered: [`Headers`], an unfolded,
//! case-insensitive lookup table, and [`fields`], which walks the raw field
//! bytes so callers can copy selected fields verbatim.

use std::collections::HashMap;

/// Collection of message headers.
///
/// Names are stored lowercased; values are unfolded and trimmed.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    headers: HashMap<String, Vec<String>>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header value.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into().to_lowercase();
        self.headers.entry(name).or_default().push(value.into());
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_lowercase())
            .and_then(|v| v.first().map(String::as_str))
    }

    /// Gets all values for a header.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .get(&name.to_lowercase())
            .map(|v| v.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Returns true if the header is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.headers.contains_key(&name.to_lowercase())
    }

    /// Returns an iterator over all headers.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .flat_map(|(name, values)| values.iter().map(move |v| (name.as_str(), v.as_str())))
    }

    /// Parses a raw header block.
    ///
    /// Parsing stops at the first empty line. Lines that are neither a field
    /// nor a continuation are skipped. Non-UTF-8 bytes are replaced.
    #[must_use]
    pub fn parse(raw: &[u8]) -> Self {
        let mut headers = Self::new();
        for (name, value) in fields(raw) {
            let text = String::from_utf8_lossy(value);
            let unfolded = unfold(&text);
            let value = unfolded
                .split_once(':')
                .map_or("", |(_, v)| v)
                .trim()
                .to_string();
            headers.add(name, value);
        }
        headers
    }
}

/// Joins continuation lines into a single logical line.
fn unfold(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for (i, line) in raw.lines().enumerate() {
        if i > 0 {
            out.push(' ');
            out.push_str(line.trim_start());
        } else {
            out.push_str(line);
        }
    }
    out
}

/// Iterates over the fields of a raw header block.
///
/// Each item is the field name (as written, untrimmed of case) and the raw
/// bytes of the field including its continuation lines and line endings.
pub fn fields(raw: &[u8]) -> impl Iterator<Item = (&str, &[u8])> {
    FieldIter { raw, pos: 0 }
}

struct FieldIter<'a> {
    raw: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for FieldIter<'a> {
    type Item = (&'a str, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let rest = self.raw.get(self.pos..)?;
            if rest.is_empty() || rest.starts_with(b"\r\n") || rest.starts_with(b"\n") {
                return None;
            }

            let start = self.pos;
            let mut end = start + line_len(rest);
            while let Some(&next) = self.raw.get(end) {
                if next == b' ' || next == b'\t' {
                    end += line_len(&self.raw[end..]);
                } else {
                    break;
                }
            }
            self.pos = end;

            let field = &self.raw[start..end];
            let Some(colon) = field.iter().position(|&b| b == b':') else {
                continue;
            };
            let Ok(name) = std::str::from_utf8(&field[..colon]) else {
                continue;
            };
            if name.is_empty() || name.contains(['\r', '\n']) {
                continue;
            }
            return Some((name.trim_end(), field));
        }
    }
}

/// Length of the line at the start of `buf`, including its terminator.
fn line_len(buf: &[u8]) -> usize {
    buf.iter().position(|&b| b == b'\n').map_or(buf.len(), |i| i + 1)
}

/// Copies the fields whose names are (or, with `exclude`, are not) in `names`.
///
/// Names compare case-insensitively and exactly. The result always ends with
/// the blank line that terminates a header block.
#[must_use]
pub fn select_fields<S: AsRef<str>>(raw: &[u8], names: &[S], exclude: bool) -> Vec<u8> {
    let mut out = Vec::new();
    for (name, field) in fields(raw) {
        let listed = names.iter().any(|n| n.as_ref().eq_ignore_ascii_case(name));
        if listed != exclude {
            out.extend_from_slice(field);
            if !field.ends_with(b"\n") {
                out.extend_from_slice(b"\r\n");
            }
        }
    }
    out.extend_from_slice(b"\r\n");
    out
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

    const HEADER: &[u8] = b"From: sender@example.com\r\n\
To: recipient@example.com\r\n\
Subject: Test\r\n Message\r\n\
Content-Type: text/plain;\r\n\tcharset=utf-8\r\n\
\r\n";

    #[test]
    fn test_headers_add_get() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain");
        assert_eq!(headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(headers.get("content-type"), Some("text/plain"));
        assert!(headers.contains("CONTENT-TYPE"));
    }

    #[test]
    fn test_headers_parse_unfolds() {
        let headers = Headers::parse(HEADER);
        assert_eq!(headers.get("From"), Some("sender@example.com"));
        assert_eq!(headers.get("Subject"), Some("Test Message"));
        assert_eq!(
            headers.get("Content-Type"),
            Some("text/plain; charset=utf-8")
        );
    }

    #[test]
    fn test_headers_parse_stops_at_blank_line() {
        let headers = Headers::parse(b"Subject: a\r\n\r\nX-Body: not a header\r\n");
        assert_eq!(headers.get("subject"), Some("a"));
        assert!(!headers.contains("x-body"));
    }

    #[test]
    fn test_headers_get_all() {
        let headers = Headers::parse(b"Received: a\r\nReceived: b\r\n\r\n");
        assert_eq!(headers.get_all("received"), vec!["a", "b"]);
    }

    #[test]
    fn test_fields_keeps_continuations() {
        let collected: Vec<_> = fields(HEADER).collect();
        assert_eq!(collected.len(), 4);
        assert_eq!(collected[2].0, "Subject");
        assert_eq!(collected[2].1, b"Subject: Test\r\n Message\r\n");
    }

    #[test]
    fn test_select_fields_include() {
        let out = select_fields(HEADER, &["subject", "FROM"], false);
        assert_eq!(
            out,
            b"From: sender@example.com\r\nSubject: Test\r\n Message\r\n\r\n".to_vec()
        );
    }

    #[test]
    fn test_select_fields_exclude() {
        let out = select_fields(HEADER, &["subject", "from", "content-type"], true);
        assert_eq!(out, b"To: recipient@example.com\r\n\r\n".to_vec());
    }

    #[test]
    fn test_select_fields_exact_name_match() {
        let out = select_fields(b"X-Subject: nope\r\n\r\n", &["Subject"], false);
        assert_eq!(out, b"\r\n".to_vec());
    }
}
