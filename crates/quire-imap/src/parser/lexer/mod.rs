//! IMAP lexer for tokenizing client commands.
//!
//! The lexer works on one complete command: the framed reader has already
//! collected the command line together with any literal octets it announced,
//! and stripped the final CRLF.

#![allow(clippy::missing_errors_doc)]

mod token;

pub use token::Token;

use crate::types::{Flag, Flags, SequenceSet};
use crate::{Error, Result};

/// IMAP lexer state.
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input.
    #[must_use]
    pub const fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    /// Returns the current position in the input.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Returns the remaining input.
    #[must_use]
    pub fn remaining(&self) -> &'a [u8] {
        &self.input[self.pos..]
    }

    /// Returns the input consumed since `start`.
    #[must_use]
    pub fn since(&self, start: usize) -> &'a [u8] {
        &self.input[start.min(self.pos)..self.pos]
    }

    /// Returns true if at end of input.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Peeks at the current byte without consuming it.
    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    /// Peeks at the byte at offset from current position.
    #[must_use]
    pub fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    /// Advances by one byte and returns it.
    pub fn advance(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    /// Moves back (or forward) to an earlier `position`.
    pub fn seek(&mut self, position: usize) {
        self.pos = position.min(self.input.len());
    }

    /// Skips n bytes.
    pub fn skip(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.input.len());
    }

    /// Consumes `byte` if it is next. Returns whether it did.
    pub fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Reads the next token.
    pub fn next_token(&mut self) -> Result<Token<'a>> {
        let Some(byte) = self.peek() else {
            return Ok(Token::Eof);
        };

        match byte {
            b' ' => {
                self.advance();
                Ok(Token::Space)
            }
            b'(' => {
                self.advance();
                Ok(Token::LParen)
            }
            b')' => {
                self.advance();
                Ok(Token::RParen)
            }
            b'"' => self.read_quoted_string().map(Token::QuotedString),
            b'{' => self.read_literal().map(Token::Literal),
            _ => {
                let word = self.take_while(|b| {
                    b > 0x20 && b != 0x7F && !matches!(b, b'(' | b')' | b'"' | b'{')
                })?;
                if word.is_empty() {
                    Err(self.error(&format!("Unexpected character: {byte:#04x}")))
                } else {
                    Ok(Token::Atom(word))
                }
            }
        }
    }

    /// Consumes bytes while `pred` holds and returns them as text.
    fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> Result<&'a str> {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.pos += 1;
        }
        std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| self.error("Invalid UTF-8"))
    }

    /// Reads a quoted string, unescaping `\"` and `\\`.
    pub fn read_quoted_string(&mut self) -> Result<String> {
        if !self.eat(b'"') {
            return Err(self.error("Expected quoted string"));
        }

        let mut result = Vec::new();

        loop {
            match self.advance() {
                Some(b'"') => break,
                Some(b'\\') => match self.advance() {
                    Some(c @ (b'"' | b'\\')) => result.push(c),
                    Some(c) => {
                        return Err(self.error(&format!("Invalid escape: \\{}", char::from(c))));
                    }
                    None => return Err(self.error("Missing closing quote")),
                },
                Some(b'\r' | b'\n') | None => return Err(self.error("Missing closing quote")),
                Some(c) => result.push(c),
            }
        }

        String::from_utf8(result).map_err(|_| self.error("Invalid UTF-8 in quoted string"))
    }

    /// Reads a literal: `{n}` or `{n+}`, CRLF, then exactly n octets.
    pub fn read_literal(&mut self) -> Result<Vec<u8>> {
        if !self.eat(b'{') {
            return Err(self.error("Expected literal"));
        }

        let digits = self.take_while(|b| b.is_ascii_digit())?;
        let size: usize = digits
            .parse()
            .map_err(|_| self.error("Invalid literal size"))?;
        self.eat(b'+');

        if !self.eat(b'}') {
            return Err(self.error("Expected } after literal size"));
        }
        if !(self.eat(b'\r') && self.eat(b'\n')) {
            return Err(self.error("Expected CRLF after literal size"));
        }

        if self.pos + size > self.input.len() {
            return Err(self.error("Incomplete literal data"));
        }

        let data = self.input[self.pos..self.pos + size].to_vec();
        self.skip(size);
        Ok(data)
    }

    /// Reads an atom (one or more ATOM-CHARs).
    pub fn read_atom(&mut self) -> Result<&'a str> {
        let atom = self.take_while(is_atom_char)?;
        if atom.is_empty() {
            return Err(self.error("Expected atom"));
        }
        Ok(atom)
    }

    /// Reads an astring: atom (with `]` allowed), quoted string or literal.
    pub fn read_astring(&mut self) -> Result<String> {
        match self.peek() {
            Some(b'"') => self.read_quoted_string(),
            Some(b'{') => {
                let data = self.read_literal()?;
                String::from_utf8(data).map_err(|_| self.error("Invalid UTF-8 in literal"))
            }
            _ => {
                let atom = self.take_while(is_astring_char)?;
                if atom.is_empty() {
                    return Err(self.error("Expected astring"));
                }
                Ok(atom.to_string())
            }
        }
    }

    /// Reads a string (quoted or literal) as raw octets.
    pub fn read_string(&mut self) -> Result<Vec<u8>> {
        match self.peek() {
            Some(b'"') => self.read_quoted_string().map(String::into_bytes),
            Some(b'{') => self.read_literal(),
            _ => Err(self.error("Expected quoted string or literal")),
        }
    }

    /// Reads a LIST mailbox pattern: a string, or atom chars plus `%` and `*`.
    pub fn read_list_mailbox(&mut self) -> Result<String> {
        match self.peek() {
            Some(b'"' | b'{') => self.read_astring(),
            _ => {
                let pattern =
                    self.take_while(|b| is_astring_char(b) || b == b'%' || b == b'*')?;
                if pattern.is_empty() {
                    return Err(self.error("Expected mailbox pattern"));
                }
                Ok(pattern.to_string())
            }
        }
    }

    /// Reads a number.
    pub fn read_number(&mut self) -> Result<u32> {
        let digits = self.take_while(|b| b.is_ascii_digit())?;
        digits.parse().map_err(|_| self.error("Expected number"))
    }

    /// Reads a sequence set such as `1:4,7,9:*`.
    pub fn read_sequence_set(&mut self) -> Result<SequenceSet> {
        let raw = self.take_while(|b| b.is_ascii_digit() || matches!(b, b':' | b',' | b'*'))?;
        SequenceSet::parse(raw).map_err(|e| self.error(&e.to_string()))
    }

    /// Reads a single flag: `\Name` or a keyword atom.
    pub fn read_flag(&mut self) -> Result<Flag> {
        let start = self.pos;
        self.eat(b'\\');
        let name = self.take_while(is_atom_char)?;
        if name.is_empty() {
            return Err(self.error("Expected flag"));
        }
        let text = std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| self.error("Invalid UTF-8 in flag"))?;
        Ok(Flag::parse(text))
    }

    /// Reads a parenthesized flag list, possibly empty.
    pub fn read_flag_list(&mut self) -> Result<Flags> {
        self.expect(b'(')?;
        let mut flags = Flags::new();
        if self.eat(b')') {
            return Ok(flags);
        }
        loop {
            flags.insert(self.read_flag()?);
            if self.eat(b')') {
                return Ok(flags);
            }
            self.expect_space()?;
        }
    }

    /// Reads either a parenthesized flag list or space separated flags.
    pub fn read_store_flags(&mut self) -> Result<Flags> {
        if self.peek() == Some(b'(') {
            return self.read_flag_list();
        }
        let mut flags = Flags::new();
        loop {
            flags.insert(self.read_flag()?);
            if !self.eat(b' ') {
                return Ok(flags);
            }
        }
    }

    /// Creates a parse error at the current position.
    pub fn error(&self, message: &str) -> Error {
        Error::Parse {
            position: self.pos,
            message: message.to_string(),
        }
    }

    /// Expects and consumes a specific byte.
    pub fn expect(&mut self, expected: u8) -> Result<()> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(&format!("Expected '{}'", char::from(expected))))
        }
    }

    /// Expects and consumes a space.
    pub fn expect_space(&mut self) -> Result<()> {
        self.expect(b' ')
    }

    /// Expects the end of the command.
    pub fn expect_end(&self) -> Result<()> {
        if self.is_eof() {
            Ok(())
        } else {
            Err(self.error("Unexpected extra arguments"))
        }
    }
}

/// Returns true if the byte is a valid atom character.
///
/// ATOM-CHAR is any CHAR except atom-specials: `(` `)` `{` SP CTL `%` `*`
/// `"` `\` `]`.
#[must_use]
pub const fn is_atom_char(b: u8) -> bool {
    b > 0x20 && b < 0x7F && !is_atom_special(b)
}

/// Returns true if the byte may appear in an unquoted astring.
#[must_use]
pub const fn is_astring_char(b: u8) -> bool {
    is_atom_char(b) || b == b']'
}

/// Returns true if the byte is an atom special character.
#[must_use]
pub const fn is_atom_special(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'{' | b' ' | b'%' | b'*' | b'"' | b'\\' | b']'
    ) || b < 0x20
        || b == 0x7F
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

    mod astring_tests {
        use super::*;

        #[test]
        fn atom() {
            let mut lexer = Lexer::new(b"INBOX rest");
            assert_eq!(lexer.read_astring().unwrap(), "INBOX");
            assert_eq!(lexer.remaining(), b" rest");
        }

        #[test]
        fn quoted_with_escapes() {
            let mut lexer = Lexer::new(br#""a \"b\" \\c""#);
            assert_eq!(lexer.read_astring().unwrap(), r#"a "b" \c"#);
            assert!(lexer.is_eof());
        }

        #[test]
        fn empty_quoted() {
            let mut lexer = Lexer::new(b"\"\"");
            assert_eq!(lexer.read_astring().unwrap(), "");
        }

        #[test]
        fn unterminated_quote_is_error() {
            let mut lexer = Lexer::new(b"\"abc");
            assert!(lexer.read_astring().is_err());
        }

        #[test]
        fn literal() {
            let mut lexer = Lexer::new(b"{5}\r\nhello world");
            assert_eq!(lexer.read_astring().unwrap(), "hello");
            assert_eq!(lexer.remaining(), b" world");
        }

        #[test]
        fn non_synchronizing_literal() {
            let mut lexer = Lexer::new(b"{3+}\r\nabc");
            assert_eq!(lexer.read_astring().unwrap(), "abc");
        }

        #[test]
        fn incomplete_literal_is_error() {
            let mut lexer = Lexer::new(b"{10}\r\nabc");
            assert!(lexer.read_astring().is_err());
        }

        #[test]
        fn astring_allows_close_bracket() {
            let mut lexer = Lexer::new(b"a]b");
            assert_eq!(lexer.read_astring().unwrap(), "a]b");
        }
    }

    mod token_tests {
        use super::*;

        #[test]
        fn search_like_tokens() {
            let mut lexer = Lexer::new(b"(2:* \"x\")");
            assert_eq!(lexer.next_token().unwrap(), Token::LParen);
            assert_eq!(lexer.next_token().unwrap(), Token::Atom("2:*"));
            assert_eq!(lexer.next_token().unwrap(), Token::Space);
            assert_eq!(
                lexer.next_token().unwrap(),
                Token::QuotedString("x".to_string())
            );
            assert_eq!(lexer.next_token().unwrap(), Token::RParen);
            assert_eq!(lexer.next_token().unwrap(), Token::Eof);
        }
    }

    mod flag_tests {
        use super::*;

        #[test]
        fn flag_list() {
            let mut lexer = Lexer::new(b"(\\Seen \\Deleted $Junk)");
            let flags = lexer.read_flag_list().unwrap();
            assert!(flags.contains(&Flag::Seen));
            assert!(flags.contains(&Flag::Deleted));
            assert!(flags.contains(&Flag::Keyword("$Junk".into())));
        }

        #[test]
        fn empty_flag_list() {
            let mut lexer = Lexer::new(b"()");
            assert!(lexer.read_flag_list().unwrap().is_empty());
        }

        #[test]
        fn store_flags_without_parens() {
            let mut lexer = Lexer::new(b"\\Seen \\Answered");
            assert_eq!(lexer.read_store_flags().unwrap().len(), 2);
        }

        #[test]
        fn unclosed_flag_list() {
            let mut lexer = Lexer::new(b"(\\Seen");
            assert!(lexer.read_flag_list().is_err());
        }
    }

    #[test]
    fn sequence_set() {
        let mut lexer = Lexer::new(b"1:3,5 (FLAGS)");
        let set = lexer.read_sequence_set().unwrap();
        assert_eq!(set.to_string(), "1:3,5");
        assert_eq!(lexer.peek(), Some(b' '));
    }

    #[test]
    fn list_mailbox_wildcards() {
        let mut lexer = Lexer::new(b"work.%");
        assert_eq!(lexer.read_list_mailbox().unwrap(), "work.%");
    }

    #[test]
    fn atom_chars() {
        assert!(is_atom_char(b'a'));
        assert!(is_atom_char(b'.'));
        assert!(!is_atom_char(b'\\'));
        assert!(!is_atom_char(b'*'));
        assert!(!is_atom_char(b']'));
        assert!(is_astring_char(b']'));
    }
}
