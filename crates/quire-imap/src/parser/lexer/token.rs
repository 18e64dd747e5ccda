//! IMAP token types.

/// Token types produced by [`Lexer::next_token`](super::Lexer::next_token).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// A run of bytes that are not spaces, parentheses, quotes or braces.
    ///
    /// Covers atoms, numbers and sequence sets such as `2:*`.
    Atom(&'a str),
    /// Quoted string, unescaped.
    QuotedString(String),
    /// Literal string with size prefix {n}.
    Literal(Vec<u8>),
    /// Opening parenthesis.
    LParen,
    /// Closing parenthesis.
    RParen,
    /// Space character.
    Space,
    /// End of input.
    Eof,
}

impl Token<'_> {
    /// Returns the token's text if it can serve as an astring.
    #[must_use]
    pub fn into_astring(self) -> Option<String> {
        match self {
            Self::Atom(s) => Some(s.to_string()),
            Self::QuotedString(s) => Some(s),
            Self::Literal(data) => String::from_utf8(data).ok(),
            _ => None,
        }
    }
}
