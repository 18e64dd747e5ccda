//! # quire-mime
//!
//! Message parsing support for the quire IMAP server.
//!
//! The IMAP core never interprets message content itself; the mail store
//! uses this crate to answer the questions IMAP asks about a message:
//!
//! - **Header blocks**: split a message into header and body, look up
//!   unfolded header values, copy selected raw fields
//! - **Addresses**: parse `From`/`To`/`Cc` lists into envelope addresses
//! - **MIME tree**: walk multipart and `message/rfc822` bodies by IMAP part
//!   path (`1`, `2.1`, ...)
//!
//! ## Quick Start
//!
//! ```
//! use quire_mime::{Part, parse_address_list, split_message};
//!
//! let raw = b"Subject: Test\r\nFrom: a@example.com\r\n\r\nHello";
//! let (header, body) = split_message(raw);
//! assert_eq!(body, b"Hello");
//!
//! let part = Part::parse(raw);
//! assert_eq!(part.headers.get("subject"), Some("Test"));
//! let from = parse_address_list(part.headers.get("from").unwrap_or_default());
//! assert_eq!(from[0].host.as_deref(), Some("example.com"));
//! # let _ = header;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
mod content_type;
mod error;
mod header;
mod message;

pub use address::{Address, parse_address_list};
pub use content_type::ContentType;
pub use error::{Error, Result};
pub use header::{Headers, fields, select_fields};
pub use message::{Part, TransferEncoding, count_lines, parse_date, split_message};
