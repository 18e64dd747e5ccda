//! Client connection handling.
//!
//! This module provides the per-connection side of the server:
//! - Configuration (greeting, limits, idle timeout)
//! - Framed I/O: whole commands in, buffered responses out
//! - The command loop with its idle watchdog

mod config;
mod framed;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

pub use config::{DEFAULT_GREETING, ServerConfig, ServerConfigBuilder};
pub use framed::{CONTINUATION_TEXT, FramedStream};

use crate::parser::parse;
use crate::response::{Responder, Response, Status};
use crate::server::{CAPABILITIES, Context, Flow, dispatch};
use crate::session::Session;
use crate::types::ResponseCode;
use crate::{Error, Result};

/// Text of the BYE sent when the idle timeout expires.
pub const AUTOLOGOUT_TEXT: &str = "Autologout; idle for too long";

/// One client connection: a framed stream plus its session.
pub struct Connection<S> {
    framed: FramedStream<S>,
    session: Session,
    ctx: Context,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wraps an accepted stream.
    pub fn new(stream: S, ctx: Context) -> Self {
        let framed = FramedStream::new(
            stream,
            ctx.config.max_line_length,
            ctx.config.max_literal_size,
        );
        Self {
            framed,
            session: Session::new(),
            ctx,
        }
    }

    /// Serves the connection until LOGOUT, disconnect, idle timeout or a
    /// framing error.
    ///
    /// Sends the greeting, then reads, parses and dispatches one command at
    /// a time. Any selected mailbox is released on the way out.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream fails or the client breaks framing
    /// (overlong line, oversized literal). A BYE is attempted first in the
    /// latter case.
    pub async fn serve(mut self) -> Result<()> {
        let result = self.run().await;
        if let Some(selected) = self.session.deselect() {
            self.ctx.store.unregister_listener(selected.listener);
        }
        match &result {
            Ok(()) => debug!("connection closed"),
            Err(e) => warn!(error = %e, "connection ended with error"),
        }
        result
    }

    async fn run(&mut self) -> Result<()> {
        self.framed.send(Response::untagged(
            Status::Ok,
            Some(ResponseCode::Capability(CAPABILITIES.to_vec())),
            self.ctx.config.greeting.clone(),
        ));
        self.framed.flush().await?;

        let idle = self.ctx.config.idle_timeout;
        let mut deadline = Instant::now() + idle;
        loop {
            let line = match timeout_at(deadline, self.framed.read_command()).await {
                Err(_) => {
                    info!(timeout = ?idle, "idle timeout");
                    self.bye(AUTOLOGOUT_TEXT).await?;
                    return Ok(());
                }
                Ok(Ok(Some(line))) => line,
                Ok(Ok(None)) => {
                    debug!("client disconnected");
                    return Ok(());
                }
                Ok(Err(Error::Protocol(message))) => {
                    self.bye(&message).await?;
                    return Err(Error::Protocol(message));
                }
                Ok(Err(e)) => return Err(e),
            };

            let command = match parse(&line, &self.ctx.config.parser) {
                Ok(command) => command,
                Err(failure) => {
                    debug!(error = %failure, "unparseable command");
                    let response = match failure.tag {
                        Some(tag) => Response::tagged(tag, Status::Bad, None, failure.message),
                        None => Response::untagged(Status::Bad, None, failure.message),
                    };
                    self.framed.send(response);
                    self.framed.flush().await?;
                    continue;
                }
            };
            deadline = Instant::now() + idle;

            let flow = dispatch(&mut self.session, &self.ctx, command, &mut self.framed).await?;
            self.framed.flush().await?;
            if flow == Flow::Close {
                return Ok(());
            }
        }
    }

    async fn bye(&mut self, text: &str) -> Result<()> {
        self.framed
            .send(Response::untagged(Status::Bye, None, text.to_string()));
        self.framed.flush().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, duplex};

    use super::*;
    use crate::backend::{InMemoryStore, StaticAuthenticator};

    fn context(config: ServerConfig) -> (Context, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        store.add_user("bob").unwrap();
        let auth = StaticAuthenticator::new().with_user("bob", "secret");
        (Context::new(store.clone(), Arc::new(auth), config), store)
    }

    #[tokio::test]
    async fn greeting_advertises_capabilities() {
        let (ctx, _) = context(ServerConfig::default());
        let (client, server) = duplex(4096);
        let task = tokio::spawn(Connection::new(server, ctx).serve());

        let (read, mut write) = tokio::io::split(client);
        let mut lines = BufReader::new(read).lines();
        assert_eq!(
            lines.next_line().await.unwrap().unwrap(),
            "* OK [CAPABILITY IMAP4rev1 LITERAL+ NAMESPACE ACL] quire IMAP4rev1 server ready"
        );

        write.write_all(b"a1 LOGOUT\r\n").await.unwrap();
        assert!(lines.next_line().await.unwrap().unwrap().starts_with("* BYE"));
        assert_eq!(
            lines.next_line().await.unwrap().unwrap(),
            "a1 OK LOGOUT completed"
        );
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn parse_errors_are_bad() {
        let (ctx, _) = context(ServerConfig::default());
        let (client, server) = duplex(4096);
        let task = tokio::spawn(Connection::new(server, ctx).serve());

        let (read, mut write) = tokio::io::split(client);
        let mut lines = BufReader::new(read).lines();
        lines.next_line().await.unwrap();

        write.write_all(b"a1 FROB\r\n\r\n").await.unwrap();
        assert_eq!(
            lines.next_line().await.unwrap().unwrap(),
            "a1 BAD Unknown command: FROB"
        );
        assert!(lines.next_line().await.unwrap().unwrap().starts_with("* BAD"));

        drop(write);
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn idle_clients_are_logged_out() {
        let config = ServerConfig::builder()
            .idle_timeout(Duration::from_secs(60))
            .build();
        let (ctx, store) = context(config);
        let (client, server) = duplex(4096);
        let task = tokio::spawn(Connection::new(server, ctx).serve());

        let (read, mut write) = tokio::io::split(client);
        let mut lines = BufReader::new(read).lines();
        lines.next_line().await.unwrap();
        write
            .write_all(b"a1 LOGIN bob secret\r\na2 SELECT INBOX\r\n")
            .await
            .unwrap();
        while !lines.next_line().await.unwrap().unwrap().starts_with("a2 ") {}
        assert_eq!(store.listener_count("#mail.bob.INBOX"), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(
            lines.next_line().await.unwrap().unwrap(),
            format!("* BYE {AUTOLOGOUT_TEXT}")
        );
        task.await.unwrap().unwrap();
        assert_eq!(store.listener_count("#mail.bob.INBOX"), 0);
    }

    #[tokio::test]
    async fn oversized_literal_gets_bye() {
        let config = ServerConfig::builder().max_literal_size(10).build();
        let (ctx, _) = context(config);
        let (client, server) = duplex(4096);
        let task = tokio::spawn(Connection::new(server, ctx).serve());

        let (read, mut write) = tokio::io::split(client);
        let mut lines = BufReader::new(read).lines();
        lines.next_line().await.unwrap();
        write.write_all(b"a1 APPEND INBOX {11}\r\n").await.unwrap();
        assert!(lines.next_line().await.unwrap().unwrap().starts_with("* BYE Literal too large"));
        assert!(matches!(task.await.unwrap(), Err(Error::Protocol(_))));
    }
}
