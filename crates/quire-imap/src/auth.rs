//! User authentication collaborator.

use crate::Result;

/// An authenticated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Login name; also names the user's mail folder.
    pub name: String,
}

/// Checks LOGIN credentials.
pub trait Authenticator: Send + Sync {
    /// Returns the user for valid credentials and `None` for invalid ones.
    ///
    /// # Errors
    ///
    /// Returns an error only when the credential source itself fails.
    fn authenticate(&self, username: &str, password: &str) -> Result<Option<User>>;
}
