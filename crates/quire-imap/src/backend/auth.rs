//! Password table authenticator.

use std::collections::HashMap;

use crate::Result;
use crate::auth::{Authenticator, User};

/// Authenticates against a fixed username to password map.
///
/// Passwords are held in plain text; this is meant for tests and the demo
/// server.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthenticator {
    users: HashMap<String, String>,
}

impl StaticAuthenticator {
    /// Creates an authenticator with no users.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a user, builder style.
    #[must_use]
    pub fn with_user(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.add_user(username, password);
        self
    }

    /// Adds or replaces a user.
    pub fn add_user(&mut self, username: impl Into<String>, password: impl Into<String>) {
        self.users.insert(username.into(), password.into());
    }
}

impl Authenticator for StaticAuthenticator {
    fn authenticate(&self, username: &str, password: &str) -> Result<Option<User>> {
        let valid = self
            .users
            .get(username)
            .is_some_and(|expected| expected == password);
        Ok(valid.then(|| User {
            name: username.to_string(),
        }))
    }
}
