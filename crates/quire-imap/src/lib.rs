//! # quire-imap
//!
//! The protocol core of an IMAP4rev1 server (RFC 3501), with the ACL
//! (RFC 2086), NAMESPACE (RFC 2342) and LITERAL+ (RFC 2088) extensions.
//!
//! ## Features
//!
//! - **Framed command reader**: whole commands with synchronizing and
//!   non-synchronizing literals, bounded line and literal sizes
//! - **Typed parser**: every RFC 3501 verb, FETCH attributes with sections
//!   and partial ranges, the full SEARCH grammar
//! - **Session state machine**: Not-Authenticated, Authenticated, Selected
//!   and Logout, with per-state verb validity
//! - **Change reconciliation**: EXPUNGE, EXISTS, RECENT and FETCH FLAGS
//!   updates for changes other sessions made to the selected mailbox
//! - **Pluggable storage**: the [`MailStore`] and [`Authenticator`] traits,
//!   with in-memory reference implementations
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use quire_imap::{Connection, Context, InMemoryStore, ServerConfig, StaticAuthenticator};
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> quire_imap::Result<()> {
//!     let store = Arc::new(InMemoryStore::new());
//!     store.add_user("bob")?;
//!     let auth = Arc::new(StaticAuthenticator::new().with_user("bob", "secret"));
//!     let ctx = Context::new(store, auth, ServerConfig::default());
//!
//!     let listener = TcpListener::bind("127.0.0.1:1143").await?;
//!     loop {
//!         let (stream, _) = listener.accept().await?;
//!         tokio::spawn(Connection::new(stream, ctx.clone()).serve());
//!     }
//! }
//! ```
//!
//! ## Mailbox Names
//!
//! Internally every mailbox lives under `#mail.<user>.`. Clients see their
//! own mailboxes without that prefix (`INBOX`, `Drafts`) and other users'
//! mailboxes with it (`#mail.alice.INBOX`). [`session::Namespace`] does the
//! translation.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod auth;
pub mod backend;
pub mod connection;
pub mod error;
pub mod parser;
pub mod response;
pub mod server;
pub mod session;
pub mod store;
pub mod types;

pub use auth::{Authenticator, User};
pub use backend::{InMemoryStore, StaticAuthenticator};
pub use connection::{Connection, FramedStream, ServerConfig, ServerConfigBuilder};
pub use error::{Error, Result};
pub use parser::{Command, CommandKind, ParserConfig, parse};
pub use response::{Responder, Response, Status};
pub use server::{CAPABILITIES, Context, Flow, dispatch, reconcile};
pub use session::{Namespace, Session};
pub use store::{MailStore, StoreError, StoreResult};
pub use types::{Flag, Flags, Rights, SequenceSet, Tag, Uid, UidValidity};
