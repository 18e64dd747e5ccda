//! Server configuration types.

use std::time::Duration;

use crate::parser::ParserConfig;

/// Default greeting text after `* OK [CAPABILITY ...]`.
pub const DEFAULT_GREETING: &str = "quire IMAP4rev1 server ready";

/// Settings shared by every connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Text of the greeting.
    pub greeting: String,
    /// Time a client may stay silent before it is logged out.
    pub idle_timeout: Duration,
    /// Tag and verb length limits.
    pub parser: ParserConfig,
    /// Longest command line accepted, literals excluded.
    pub max_line_length: usize,
    /// Largest literal accepted.
    pub max_literal_size: usize,
    /// Failed LOGIN attempts before the connection is closed.
    pub max_login_failures: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            greeting: DEFAULT_GREETING.to_string(),
            idle_timeout: Duration::from_secs(30 * 60),
            parser: ParserConfig::default(),
            max_line_length: 1024 * 1024,
            max_literal_size: 100 * 1024 * 1024,
            max_login_failures: 3,
        }
    }
}

impl ServerConfig {
    /// Creates a configuration builder.
    #[must_use]
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug, Clone, Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Sets the greeting text.
    #[must_use]
    pub fn greeting(mut self, greeting: impl Into<String>) -> Self {
        self.config.greeting = greeting.into();
        self
    }

    /// Sets the idle timeout.
    #[must_use]
    pub const fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Sets the parser limits.
    #[must_use]
    pub const fn parser(mut self, parser: ParserConfig) -> Self {
        self.config.parser = parser;
        self
    }

    /// Sets the maximum line length.
    #[must_use]
    pub const fn max_line_length(mut self, bytes: usize) -> Self {
        self.config.max_line_length = bytes;
        self
    }

    /// Sets the maximum literal size.
    #[must_use]
    pub const fn max_literal_size(mut self, bytes: usize) -> Self {
        self.config.max_literal_size = bytes;
        self
    }

    /// Sets how many failed logins end the connection.
    #[must_use]
    pub const fn max_login_failures(mut self, attempts: u32) -> Self {
        self.config.max_login_failures = attempts;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> ServerConfig {
        self.config
    }
}
