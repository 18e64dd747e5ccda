//! Server settings loaded from a JSON file.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use quire_imap::{
    Context, InMemoryStore, MailStore, Namespace, ParserConfig, ServerConfig, StaticAuthenticator,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Settings of the `quire` server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Address to listen on.
    pub listen: SocketAddr,
    /// Greeting text; the built-in one when absent.
    pub greeting: Option<String>,
    /// Seconds a client may stay silent before it is logged out.
    pub idle_timeout_secs: u64,
    /// Longest command tag accepted.
    pub max_tag_length: usize,
    /// Accounts to create at startup.
    pub users: Vec<UserSettings>,
}

/// One account of the in-memory store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    /// Login name.
    pub name: String,
    /// Plaintext password.
    pub password: String,
    /// Mailboxes to create besides INBOX, e.g. `Drafts` or `Work.Projects`.
    #[serde(default)]
    pub folders: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        let server = ServerConfig::default();
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 1143)),
            greeting: None,
            idle_timeout_secs: server.idle_timeout.as_secs(),
            max_tag_length: server.parser.max_tag_len,
            users: Vec::new(),
        }
    }
}

impl Settings {
    /// Default location of the settings file.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("quire")
            .join("settings.json")
    }

    /// Loads settings from `path`, or from [`Settings::default_path`].
    ///
    /// An explicit path must exist; a missing default file means defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let path = Self::default_path();
                if !path.exists() {
                    debug!(path = %path.display(), "no settings file, using defaults");
                    return Ok(Self::default());
                }
                path
            }
        };

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let settings = Self::from_json(&contents)
            .with_context(|| format!("parsing {}", path.display()))?;
        info!(path = %path.display(), users = settings.users.len(), "settings loaded");
        Ok(settings)
    }

    /// Parses settings from JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid settings JSON.
    pub fn from_json(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    /// The connection settings.
    #[must_use]
    pub fn server_config(&self) -> ServerConfig {
        let mut builder = ServerConfig::builder()
            .idle_timeout(Duration::from_secs(self.idle_timeout_secs))
            .parser(ParserConfig {
                max_tag_len: self.max_tag_length,
                ..ParserConfig::default()
            });
        if let Some(greeting) = &self.greeting {
            builder = builder.greeting(greeting.clone());
        }
        builder.build()
    }

    /// Creates the store and authenticator with every configured account.
    ///
    /// # Errors
    ///
    /// Returns an error if a user or folder cannot be created.
    pub fn build_context(&self) -> Result<Context> {
        let store = Arc::new(InMemoryStore::new());
        let mut auth = StaticAuthenticator::new();

        for user in &self.users {
            store
                .add_user(&user.name)
                .with_context(|| format!("creating user {}", user.name))?;
            let namespace = Namespace::for_user(&user.name);
            for folder in &user.folders {
                let name = namespace.full_name(folder);
                store
                    .create(&user.name, &name)
                    .with_context(|| format!("creating {name}"))?;
            }
            auth.add_user(&user.name, &user.password);
            debug!(user = %user.name, folders = user.folders.len(), "account seeded");
        }

        Ok(Context::new(store, Arc::new(auth), self.server_config()))
    }
}
