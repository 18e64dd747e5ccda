//! Framed I/O for the server side of IMAP.
//!
//! A client command is a CRLF-terminated line that may announce literals
//! with `{n}` (synchronizing: the server must answer with a continuation
//! request before the client sends the octets) or `{n+}` (LITERAL+: the
//! octets follow at once). This module reads one whole command at a time
//! and buffers responses until they are flushed. FETCH literal payloads
//! are queued as shared buffers and written straight to the stream.

#![allow(clippy::missing_errors_doc)]

use std::collections::VecDeque;
use std::io;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::trace;

use crate::response::{Responder, Response};
use crate::{Error, Result};

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Text of the continuation request sent before a synchronizing literal.
pub const CONTINUATION_TEXT: &str = "Ready for literal data";

/// A literal announced at the end of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LiteralHeader {
    len: usize,
    synchronizing: bool,
}

/// Framed connection for the IMAP server.
///
/// Reads whole commands, literals included, and implements [`Responder`]
/// by encoding responses into a write buffer.
pub struct FramedStream<S> {
    reader: BufReader<S>,
    /// Encoded output that precedes `write_buffer`, with FETCH payloads as
    /// their own entries.
    segments: VecDeque<Bytes>,
    write_buffer: BytesMut,
    max_line_length: usize,
    max_literal_size: usize,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new framed stream with the given limits.
    pub fn new(stream: S, max_line_length: usize, max_literal_size: usize) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
            segments: VecDeque::new(),
            write_buffer: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
            max_line_length,
            max_literal_size,
        }
    }

    /// Reads one complete command, without its final CRLF.
    ///
    /// Literal headers and their octets stay in the returned bytes, so
    /// `a1 LOGIN {3}` arrives as `a1 LOGIN {3}\r\nbob`. Returns `None` when
    /// the client closed the connection between commands.
    pub async fn read_command(&mut self) -> Result<Option<Vec<u8>>> {
        let mut command = Vec::new();
        let mut line_bytes = 0_usize;

        loop {
            let Some(line) = self.read_line().await? else {
                if command.is_empty() {
                    return Ok(None);
                }
                return Err(unexpected_eof());
            };
            line_bytes += line.len();
            if line_bytes > self.max_line_length {
                return Err(Error::Protocol("Command line too long".to_string()));
            }
            command.extend_from_slice(&line);

            let Some(literal) = parse_literal_header(&line) else {
                command.truncate(command.len().saturating_sub(2));
                return Ok(Some(command));
            };
            if literal.len > self.max_literal_size {
                return Err(Error::Protocol(format!(
                    "Literal too large: {} octets (max {})",
                    literal.len, self.max_literal_size
                )));
            }
            if literal.synchronizing {
                Response::Continuation(CONTINUATION_TEXT.to_string()).encode(&mut self.write_buffer);
                self.write_out().await?;
            }
            trace!(len = literal.len, "reading literal");

            let mut data = vec![0_u8; literal.len];
            self.reader.read_exact(&mut data).await.map_err(|e| {
                if e.kind() == io::ErrorKind::UnexpectedEof {
                    unexpected_eof()
                } else {
                    Error::Io(e)
                }
            })?;
            command.extend_from_slice(&data);
        }
    }

    /// Reads a single CRLF-terminated line. A bare LF also ends a line and
    /// is normalized to CRLF. Returns `None` on end of stream.
    async fn read_line(&mut self) -> Result<Option<Vec<u8>>> {
        let mut line = Vec::new();

        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                if line.is_empty() {
                    return Ok(None);
                }
                return Err(unexpected_eof());
            }

            if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                line.extend_from_slice(&buf[..=pos]);
                self.reader.consume(pos + 1);
                if !line.ends_with(b"\r\n") {
                    line.pop();
                    line.extend_from_slice(b"\r\n");
                }
                return Ok(Some(line));
            }

            let len = buf.len();
            line.extend_from_slice(buf);
            self.reader.consume(len);

            if line.len() > self.max_line_length {
                return Err(Error::Protocol("Command line too long".to_string()));
            }
        }
    }

    /// Writes the buffered responses to the stream.
    async fn write_out(&mut self) -> Result<()> {
        if self.segments.is_empty() && self.write_buffer.is_empty() {
            return Ok(());
        }
        let stream = self.reader.get_mut();
        while let Some(segment) = self.segments.pop_front() {
            stream.write_all(&segment).await?;
        }
        stream.write_all(&self.write_buffer).await?;
        stream.flush().await?;
        self.write_buffer.clear();
        Ok(())
    }

    /// Gets a reference to the underlying stream.
    pub fn get_ref(&self) -> &S {
        self.reader.get_ref()
    }

    /// Consumes the framed stream and returns the inner stream.
    ///
    /// Note: Any buffered data will be lost.
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
}

impl<S> Responder for FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn send(&mut self, response: Response) {
        response.encode_segments(&mut self.write_buffer, &mut self.segments);
    }

    fn flush(&mut self) -> impl Future<Output = Result<()>> + Send {
        self.write_out()
    }
}

fn unexpected_eof() -> Error {
    Error::Io(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        "connection closed in the middle of a command",
    ))
}

/// Parses a literal header from the end of a line.
///
/// Matches `{123}\r\n` or `{123+}\r\n`.
fn parse_literal_header(line: &[u8]) -> Option<LiteralHeader> {
    let line = line.strip_suffix(b"\r\n")?;
    let inner = line.strip_suffix(b"}")?;
    let open = inner.iter().rposition(|&b| b == b'{')?;
    let digits = &inner[open + 1..];
    let (digits, synchronizing) = match digits.strip_suffix(b"+") {
        Some(digits) => (digits, false),
        None => (digits, true),
    };
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let len = std::str::from_utf8(digits).ok()?.parse().ok()?;
    Some(LiteralHeader { len, synchronizing })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio_test::io::Builder;

    use super::*;
    use crate::response::{FetchItem, Status};
    use crate::types::{Flag, Flags, Tag, Uid};

    const LINE: usize = 1024;
    const LITERAL: usize = 64;

    #[test]
    fn literal_headers() {
        assert_eq!(
            parse_literal_header(b"a1 LOGIN {3}\r\n"),
            Some(LiteralHeader {
                len: 3,
                synchronizing: true
            })
        );
        assert_eq!(
            parse_literal_header(b"a1 LOGIN {12+}\r\n"),
            Some(LiteralHeader {
                len: 12,
                synchronizing: false
            })
        );
        assert_eq!(parse_literal_header(b"a1 NOOP\r\n"), None);
        assert_eq!(parse_literal_header(b"a1 X {}\r\n"), None);
        assert_eq!(parse_literal_header(b"a1 X {1a}\r\n"), None);
        assert_eq!(parse_literal_header(b"a1 X {3}"), None);
    }

    #[tokio::test]
    async fn reads_plain_lines() {
        let stream = Builder::new().read(b"a1 NOOP\r\na2 LOGOUT\n").build();
        let mut framed = FramedStream::new(stream, LINE, LITERAL);
        assert_eq!(framed.read_command().await.unwrap().unwrap(), b"a1 NOOP");
        assert_eq!(framed.read_command().await.unwrap().unwrap(), b"a2 LOGOUT");
        assert!(framed.read_command().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn synchronizing_literal_gets_continuation() {
        let stream = Builder::new()
            .read(b"a1 LOGIN {3}\r\n")
            .write(b"+ Ready for literal data\r\n")
            .read(b"bob secret\r\n")
            .build();
        let mut framed = FramedStream::new(stream, LINE, LITERAL);
        assert_eq!(
            framed.read_command().await.unwrap().unwrap(),
            b"a1 LOGIN {3}\r\nbob secret"
        );
    }

    #[tokio::test]
    async fn non_synchronizing_literal_reads_straight_on() {
        let stream = Builder::new()
            .read(b"a1 LOGIN {3+}\r\nbob {6+}\r\nsecret\r\n")
            .build();
        let mut framed = FramedStream::new(stream, LINE, LITERAL);
        assert_eq!(
            framed.read_command().await.unwrap().unwrap(),
            b"a1 LOGIN {3+}\r\nbob {6+}\r\nsecret"
        );
    }

    #[tokio::test]
    async fn oversized_literal_is_rejected() {
        let stream = Builder::new().read(b"a1 APPEND INBOX {65}\r\n").build();
        let mut framed = FramedStream::new(stream, LINE, LITERAL);
        assert!(matches!(
            framed.read_command().await,
            Err(Error::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn overlong_line_is_rejected() {
        let long = vec![b'a'; 40];
        let stream = Builder::new().read(&long).build();
        let mut framed = FramedStream::new(stream, 16, LITERAL);
        assert!(matches!(
            framed.read_command().await,
            Err(Error::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn eof_inside_a_command_is_an_error() {
        let stream = Builder::new().read(b"a1 NOO").build();
        let mut framed = FramedStream::new(stream, LINE, LITERAL);
        assert!(matches!(framed.read_command().await, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn responses_are_buffered_until_flush() {
        let stream = Builder::new()
            .write(b"* OK hello\r\na1 OK done\r\n")
            .build();
        let mut framed = FramedStream::new(stream, LINE, LITERAL);
        framed.send(Response::untagged(Status::Ok, None, "hello"));
        framed.send(Response::tagged(Tag::new("a1"), Status::Ok, None, "done"));
        framed.flush().await.unwrap();
    }

    #[tokio::test]
    async fn fetch_payload_bypasses_the_write_buffer() {
        let payload = Bytes::from(b"Subject: hi\r\n\r\nbody\r\n".to_vec());
        let stream = Builder::new()
            .write(b"* 1 FETCH (UID 7 BODY[] {21}\r\n")
            .write(b"Subject: hi\r\n\r\nbody\r\n")
            .write(b" FLAGS (\\Seen))\r\n")
            .build();
        let mut framed = FramedStream::new(stream, LINE, LITERAL);
        framed.send(Response::Fetch {
            msn: 1,
            items: vec![
                FetchItem::Uid(Uid::new(7).unwrap()),
                FetchItem::Data {
                    name: "BODY[]".into(),
                    data: Some(payload.clone()),
                },
                FetchItem::Flags(Flags::from_vec(vec![Flag::Seen])),
            ],
        });

        assert_eq!(&framed.write_buffer[..], b" FLAGS (\\Seen))\r\n");
        assert_eq!(framed.segments.len(), 2);
        assert_eq!(framed.segments[1].as_ptr(), payload.as_ptr());

        framed.flush().await.unwrap();
        assert!(framed.segments.is_empty());
        assert!(framed.write_buffer.is_empty());
    }
}
