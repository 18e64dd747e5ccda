//! Command execution.
//!
//! [`dispatch`] checks that a command is valid in the session's state,
//! runs its handler against the [`MailStore`], reports mailbox changes made
//! by other sessions and writes the tagged completion. Handlers return a
//! [`Completion`] or a [`CommandError`]; only I/O failures escape as
//! [`CommandError::Fatal`].

mod acl;
mod auth;
mod copy;
mod dispatch;
mod fetch;
mod loader;
mod mailbox;
mod reconcile;
mod search;
mod select;
mod store;

use std::sync::Arc;

use tracing::warn;

pub use dispatch::dispatch;
pub use reconcile::reconcile;

use crate::Error;
use crate::auth::Authenticator;
use crate::connection::ServerConfig;
use crate::parser::Command;
use crate::session::{LoggedIn, SelectedMailbox, Session, SessionState};
use crate::store::{MailStore, StoreError};
use crate::types::{ResponseCode, SequenceError};

/// Capabilities advertised in the greeting and by CAPABILITY.
pub const CAPABILITIES: &[&str] = &["IMAP4rev1", "LITERAL+", "NAMESPACE", "ACL"];

/// Text of every NO that must not reveal whether a mailbox exists.
pub(crate) const NO_ACCESS: &str = "Mailbox does not exist or access denied";

/// Collaborators shared by every connection.
#[derive(Clone)]
pub struct Context {
    /// Mailbox storage.
    pub store: Arc<dyn MailStore>,
    /// Credential check for LOGIN.
    pub auth: Arc<dyn Authenticator>,
    /// Server settings.
    pub config: Arc<ServerConfig>,
}

impl Context {
    /// Creates a context.
    #[must_use]
    pub fn new(
        store: Arc<dyn MailStore>,
        auth: Arc<dyn Authenticator>,
        config: ServerConfig,
    ) -> Self {
        Self {
            store,
            auth,
            config: Arc::new(config),
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// What the connection does after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Read the next command.
    Continue,
    /// Close the connection.
    Close,
}

/// Successful completion of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Response code for the tagged OK.
    pub code: Option<ResponseCode>,
    /// Text of the tagged OK.
    pub text: String,
}

impl Completion {
    /// `<VERB> completed`, without a code.
    #[must_use]
    pub fn done(command: &Command) -> Self {
        Self {
            code: None,
            text: format!("{} completed", command.name()),
        }
    }

    /// Adds a response code.
    #[must_use]
    pub fn with_code(mut self, code: ResponseCode) -> Self {
        self.code = Some(code);
        self
    }
}

/// A command that did not complete with OK.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Valid request the server declined: tagged NO.
    #[error("{text}")]
    No {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Text of the tagged NO.
        text: String,
    },
    /// Request that makes no sense here: tagged BAD.
    #[error("{0}")]
    Bad(String),
    /// The connection cannot continue.
    #[error(transparent)]
    Fatal(#[from] Error),
}

impl CommandError {
    /// A tagged NO without a code.
    #[must_use]
    pub fn no(text: impl Into<String>) -> Self {
        Self::No {
            code: None,
            text: text.into(),
        }
    }

    /// A tagged NO with a code.
    #[must_use]
    pub fn no_with(code: ResponseCode, text: impl Into<String>) -> Self {
        Self::No {
            code: Some(code),
            text: text.into(),
        }
    }
}

impl From<StoreError> for CommandError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) | StoreError::AccessDenied => Self::no(NO_ACCESS),
            StoreError::Storage(_) => {
                warn!(error = %err, "store failure");
                Self::no("Server error, try again later")
            }
            StoreError::AlreadyExists(_) | StoreError::Invalid(_) => Self::no(err.to_string()),
        }
    }
}

impl From<SequenceError> for CommandError {
    fn from(err: SequenceError) -> Self {
        Self::Bad(err.to_string())
    }
}

/// Result of a command handler.
pub type HandlerResult = std::result::Result<Completion, CommandError>;

/// The logged-in user. Verb validity guarantees one exists for every
/// handler that calls this.
fn logged_in(session: &Session) -> Result<&LoggedIn, CommandError> {
    session
        .login
        .as_ref()
        .ok_or_else(|| CommandError::Bad("Not logged in".to_string()))
}

/// The logged-in user and the selected mailbox.
fn selection(session: &mut Session) -> Result<(&LoggedIn, &mut SelectedMailbox), CommandError> {
    match session {
        Session {
            login: Some(login),
            state: SessionState::Selected(mailbox),
            ..
        } => Ok((&*login, mailbox)),
        _ => Err(CommandError::Bad("No mailbox selected".to_string())),
    }
}
