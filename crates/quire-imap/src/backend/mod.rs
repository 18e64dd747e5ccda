//! Reference collaborators.
//!
//! [`InMemoryStore`] and [`StaticAuthenticator`] back the test suite and
//! the demo server. Production deployments supply their own
//! [`MailStore`](crate::store::MailStore) and
//! [`Authenticator`](crate::auth::Authenticator).

mod auth;
mod memory;
pub mod mime;

pub use auth::StaticAuthenticator;
pub use memory::InMemoryStore;
