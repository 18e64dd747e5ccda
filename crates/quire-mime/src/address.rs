//! RFC 5322 address lists.

/// A single mailbox address.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Address {
    /// Display name, if any.
    pub name: Option<String>,
    /// Local part.
    pub mailbox: Option<String>,
    /// Domain part.
    pub host: Option<String>,
}

impl Address {
    /// Parses a single address such as `"Bob" <bob@example.com>`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }

        let (name, spec) = match (s.rfind('<'), s.rfind('>')) {
            (Some(open), Some(close)) if open < close => {
                let name = unquote(s[..open].trim());
                (
                    (!name.is_empty()).then_some(name),
                    s[open + 1..close].trim(),
                )
            }
            _ => (None, s),
        };

        let (mailbox, host) = match spec.rsplit_once('@') {
            Some((local, domain)) => (local.trim(), Some(domain.trim().to_string())),
            None => (spec, None),
        };

        Some(Self {
            name,
            mailbox: (!mailbox.is_empty()).then(|| mailbox.to_string()),
            host,
        })
    }
}

/// Parses a comma separated address list.
///
/// Group syntax (`team: a@x, b@y;`) is flattened into its members.
#[must_use]
pub fn parse_address_list(s: &str) -> Vec<Address> {
    split_list(s)
        .into_iter()
        .filter_map(|entry| {
            let entry = strip_group(entry);
            Address::parse(entry)
        })
        .collect()
}

/// Removes a leading `group:` label and a trailing `;`.
fn strip_group(entry: &str) -> &str {
    let entry = entry.trim().trim_end_matches(';');
    match entry.find(':') {
        Some(colon)
            if !entry[..colon].contains(['"', '<', '@'])
                && !entry[..colon].trim().is_empty() =>
        {
            &entry[colon + 1..]
        }
        _ => entry,
    }
}

/// Splits on commas that are outside quotes, comments and angle brackets.
fn split_list(s: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth_angle = 0u32;
    let mut depth_paren = 0u32;
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in s.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            '<' if !in_quotes => depth_angle += 1,
            '>' if !in_quotes => depth_angle = depth_angle.saturating_sub(1),
            '(' if !in_quotes => depth_paren += 1,
            ')' if !in_quotes => depth_paren = depth_paren.saturating_sub(1),
            ',' if !in_quotes && depth_angle == 0 && depth_paren == 0 => {
                out.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(&s[start..]);
    out.retain(|e| !e.trim().is_empty());
    out
}

fn unquote(s: &str) -> String {
    s.strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .map_or_else(|| s.to_string(), |v| v.replace("\\\"", "\"").replace("\\\\", "\\"))
}
