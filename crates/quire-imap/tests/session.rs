//! End-to-end sessions over an in-memory duplex stream.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use quire_imap::types::Flags;
use quire_imap::{
    Connection, Context, InMemoryStore, MailStore, Result, ServerConfig, StaticAuthenticator, Uid,
};
use tokio::io::{
    AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf, duplex,
};
use tokio::task::JoinHandle;

const BOB_INBOX: &str = "#mail.bob.INBOX";

const FIRST: &[u8] = b"From: Alice <alice@example.com>\r\n\
To: Bob <bob@example.com>\r\n\
Subject: Lunch\r\n\
\r\n\
Noon at the usual place?\r\n";

const SECOND: &[u8] = b"From: Carol <carol@example.com>\r\n\
To: Bob <bob@example.com>\r\n\
Subject: Report\r\n\
\r\n\
Numbers attached.\r\n";

struct Client {
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    write: WriteHalf<DuplexStream>,
    task: JoinHandle<Result<()>>,
}

impl Client {
    async fn connect(ctx: Context) -> Self {
        let (client, server) = duplex(64 * 1024);
        let task = tokio::spawn(Connection::new(server, ctx).serve());
        let (read, write) = tokio::io::split(client);
        let mut client = Self {
            lines: BufReader::new(read).lines(),
            write,
            task,
        };
        let greeting = client.line().await;
        assert!(greeting.starts_with("* OK [CAPABILITY IMAP4rev1"), "{greeting}");
        client
    }

    async fn line(&mut self) -> String {
        self.lines.next_line().await.unwrap().unwrap()
    }

    async fn send(&mut self, data: &str) {
        self.write.write_all(data.as_bytes()).await.unwrap();
    }

    /// Sends one command line and collects every line up to and including
    /// the tagged completion.
    async fn command(&mut self, line: &str) -> Vec<String> {
        let tag = line.split(' ').next().unwrap().to_string();
        self.send(&format!("{line}\r\n")).await;
        self.until_tagged(&tag).await
    }

    async fn until_tagged(&mut self, tag: &str) -> Vec<String> {
        let prefix = format!("{tag} ");
        let mut lines = Vec::new();
        loop {
            let line = self.line().await;
            let done = line.starts_with(&prefix);
            lines.push(line);
            if done {
                return lines;
            }
        }
    }

    async fn login(&mut self, user: &str, password: &str) {
        let lines = self.command(&format!("l1 LOGIN {user} {password}")).await;
        assert_eq!(lines.last().unwrap(), "l1 OK LOGIN completed");
    }
}

fn setup() -> (Context, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    store.add_user("bob").unwrap();
    store.add_user("alice").unwrap();
    for message in [FIRST, SECOND] {
        store
            .append("bob", BOB_INBOX, &Flags::new(), None, message)
            .unwrap();
    }
    let auth = StaticAuthenticator::new()
        .with_user("bob", "secret")
        .with_user("alice", "wonder");
    let ctx = Context::new(store.clone(), Arc::new(auth), ServerConfig::default());
    (ctx, store)
}

fn position(lines: &[String], prefix: &str) -> usize {
    lines
        .iter()
        .position(|l| l.starts_with(prefix))
        .unwrap_or_else(|| panic!("no line starting with {prefix:?} in {lines:?}"))
}

#[tokio::test]
async fn login_with_synchronizing_literals() {
    let (ctx, _) = setup();
    let mut client = Client::connect(ctx).await;

    client.send("a1 LOGIN {3}\r\n").await;
    assert_eq!(client.line().await, "+ Ready for literal data");
    client.send("bob {6}\r\n").await;
    assert_eq!(client.line().await, "+ Ready for literal data");
    client.send("secret\r\n").await;
    assert_eq!(client.until_tagged("a1").await, ["a1 OK LOGIN completed"]);
}

#[tokio::test]
async fn login_with_non_synchronizing_literals() {
    let (ctx, _) = setup();
    let mut client = Client::connect(ctx).await;

    let lines = client.command("a1 LOGIN {3+}\r\nbob {6+}\r\nsecret").await;
    assert_eq!(lines, ["a1 OK LOGIN completed"]);
}

#[tokio::test]
async fn select_reports_mailbox_state() {
    let (ctx, store) = setup();
    // Five messages, the first three already claimed as recent.
    store
        .append("bob", BOB_INBOX, &Flags::new(), None, FIRST)
        .unwrap();
    assert_eq!(store.recent_uids("bob", BOB_INBOX, true).unwrap().len(), 3);
    for message in [SECOND, FIRST] {
        store
            .append("bob", BOB_INBOX, &Flags::new(), None, message)
            .unwrap();
    }

    let mut client = Client::connect(ctx).await;
    client.login("bob", "secret").await;

    let lines = client.command("a2 SELECT INBOX").await;
    assert_eq!(lines[0], "* FLAGS (\\Seen \\Answered \\Flagged \\Deleted \\Draft)");
    assert!(lines.contains(&"* 5 EXISTS".to_string()), "{lines:?}");
    assert!(lines.contains(&"* 2 RECENT".to_string()), "{lines:?}");
    assert!(lines.contains(&"* OK [UNSEEN 1] Message 1 is first unseen".to_string()));
    assert!(lines.contains(
        &"* OK [PERMANENTFLAGS (\\Seen \\Answered \\Flagged \\Deleted \\Draft \\*)] Limited"
            .to_string()
    ));
    assert!(lines.iter().any(|l| l.starts_with("* OK [UIDVALIDITY ")));
    assert!(lines.contains(&"* OK [UIDNEXT 6] Predicted next UID".to_string()));
    assert_eq!(lines.last().unwrap(), "a2 OK [READ-WRITE] SELECT completed");

    assert!(store.recent_uids("bob", BOB_INBOX, false).unwrap().is_empty());
}

#[tokio::test]
async fn commands_outside_their_state_are_bad() {
    let (ctx, _) = setup();
    let mut client = Client::connect(ctx).await;

    let lines = client.command("a1 SELECT INBOX").await;
    assert_eq!(lines, ["a1 BAD Command not valid in this state"]);

    client.login("bob", "secret").await;
    let lines = client.command("a2 FETCH 1 FLAGS").await;
    assert_eq!(lines, ["a2 BAD Command not valid in this state"]);
}

#[tokio::test]
async fn fetch_sets_seen_and_streams_literals() {
    let (ctx, store) = setup();
    let mut client = Client::connect(ctx).await;
    client.login("bob", "secret").await;
    client.command("a2 SELECT INBOX").await;

    let lines = client.command("a3 FETCH 1 (BODY[TEXT] FLAGS)").await;
    assert_eq!(
        lines,
        [
            "* 1 FETCH (BODY[TEXT] {26}",
            "Noon at the usual place?",
            " FLAGS (\\Seen \\Recent))",
            "a3 OK FETCH completed",
        ]
    );
    assert!(
        store
            .flags("bob", BOB_INBOX, Uid::new(1).unwrap())
            .unwrap()
            .is_seen()
    );

    let lines = client.command("a4 UID FETCH 2 (BODY.PEEK[HEADER.FIELDS (SUBJECT)])").await;
    assert_eq!(
        lines,
        [
            "* 2 FETCH (BODY[HEADER.FIELDS (SUBJECT)] {19}",
            "Subject: Report",
            "",
            " UID 2)",
            "a4 OK UID FETCH completed",
        ]
    );
    assert!(
        !store
            .flags("bob", BOB_INBOX, Uid::new(2).unwrap())
            .unwrap()
            .is_seen()
    );

    let lines = client.command("a5 FETCH 1:2 (FLAGS)").await;
    assert_eq!(
        lines,
        [
            "* 1 FETCH (FLAGS (\\Seen \\Recent))",
            "* 2 FETCH (FLAGS (\\Recent))",
            "a5 OK FETCH completed",
        ]
    );
}

#[tokio::test]
async fn store_and_expunge() {
    let (ctx, store) = setup();
    let mut client = Client::connect(ctx).await;
    client.login("bob", "secret").await;
    client.command("a2 SELECT INBOX").await;

    let lines = client.command("a3 STORE 1 +FLAGS (\\Deleted)").await;
    assert_eq!(
        lines,
        [
            "* 1 FETCH (FLAGS (\\Deleted \\Recent))",
            "a3 OK STORE completed",
        ]
    );

    let lines = client.command("a4 STORE 2 +FLAGS.SILENT (\\Flagged)").await;
    assert_eq!(lines, ["a4 OK STORE completed"]);

    let lines = client.command("a5 FETCH 1:2 (FLAGS)").await;
    assert_eq!(
        lines,
        [
            "* 1 FETCH (FLAGS (\\Deleted \\Recent))",
            "* 2 FETCH (FLAGS (\\Flagged \\Recent))",
            "a5 OK FETCH completed",
        ]
    );

    let lines = client.command("a6 EXPUNGE").await;
    assert_eq!(
        lines,
        ["* 1 EXPUNGE", "* 1 EXISTS", "* 1 RECENT", "a6 OK EXPUNGE completed"]
    );
    assert_eq!(
        store.uids("bob", BOB_INBOX).unwrap(),
        [Uid::new(2).unwrap()]
    );
}

#[tokio::test]
async fn changes_by_others_are_reported_before_completion() {
    let (ctx, store) = setup();
    let mut client = Client::connect(ctx).await;
    client.login("bob", "secret").await;
    client.command("a2 SELECT INBOX").await;

    store.remove_message(BOB_INBOX, Uid::new(1).unwrap()).unwrap();
    store
        .append("bob", BOB_INBOX, &Flags::new(), None, FIRST)
        .unwrap();

    let lines = client.command("a3 NOOP").await;
    let expunge = position(&lines, "* 1 EXPUNGE");
    let exists = position(&lines, "* 2 EXISTS");
    assert!(expunge < exists);
    assert_eq!(lines.last().unwrap(), "a3 OK NOOP completed");

    let lines = client.command("a4 NOOP").await;
    assert_eq!(lines, ["a4 OK NOOP completed"]);
}

#[tokio::test]
async fn shared_mailbox_through_acl() {
    let (ctx, store) = setup();

    let mut bob = Client::connect(ctx.clone()).await;
    bob.login("bob", "secret").await;
    let lines = bob.command("a2 SETACL INBOX alice lr").await;
    assert_eq!(lines, ["a2 OK SETACL completed"]);
    let lines = bob.command("a3 GETACL INBOX").await;
    assert_eq!(lines[0], "* ACL INBOX bob lrswipcda alice lr");

    let mut alice = Client::connect(ctx).await;
    alice.login("alice", "wonder").await;
    let lines = alice.command("b1 MYRIGHTS #mail.bob.INBOX").await;
    assert_eq!(lines[0], "* MYRIGHTS #mail.bob.INBOX lr");

    let lines = alice.command("b2 SELECT #mail.bob.INBOX").await;
    assert_eq!(lines.last().unwrap(), "b2 OK [READ-ONLY] SELECT completed");
    assert!(lines.contains(&"* OK [PERMANENTFLAGS ()] No permanent flags permitted".to_string()));

    let lines = alice.command("b3 STORE 1 +FLAGS (\\Seen)").await;
    assert_eq!(lines, ["b3 NO [READ-ONLY] Mailbox is read-only"]);

    let lines = alice.command("b4 SETACL #mail.bob.INBOX alice lrswi").await;
    assert_eq!(lines, ["b4 NO Permission denied"]);

    assert_eq!(store.recent_uids("bob", BOB_INBOX, false).unwrap().len(), 2);
}

#[tokio::test]
async fn append_and_status() {
    let (ctx, _) = setup();
    let mut client = Client::connect(ctx).await;
    client.login("bob", "secret").await;

    let lines = client.command("a2 APPEND Drafts {5+}\r\nhello").await;
    assert_eq!(lines, ["a2 NO [TRYCREATE] Mailbox does not exist"]);

    assert_eq!(client.command("a3 CREATE Drafts").await, ["a3 OK CREATE completed"]);
    let lines = client
        .command("a4 APPEND Drafts (\\Draft) {23+}\r\nSubject: note\r\n\r\ntodo\r\n")
        .await;
    assert_eq!(lines, ["a4 OK APPEND completed"]);

    let lines = client.command("a5 STATUS Drafts (MESSAGES RECENT UNSEEN)").await;
    assert_eq!(
        lines,
        [
            "* STATUS Drafts (MESSAGES 1 RECENT 1 UNSEEN 1)",
            "a5 OK STATUS completed",
        ]
    );

    let lines = client.command("a6 LIST \"\" *").await;
    assert!(lines.contains(&"* LIST () \".\" Drafts".to_string()));
    assert!(lines.contains(&"* LIST () \".\" INBOX".to_string()));
}

#[tokio::test]
async fn logout_ends_the_connection() {
    let (ctx, store) = setup();
    let mut client = Client::connect(ctx).await;
    client.login("bob", "secret").await;
    client.command("a2 SELECT INBOX").await;
    assert_eq!(store.listener_count(BOB_INBOX), 1);

    let lines = client.command("a3 LOGOUT").await;
    assert_eq!(
        lines,
        ["* BYE IMAP4rev1 server logging out", "a3 OK LOGOUT completed"]
    );
    client.task.await.unwrap().unwrap();
    assert_eq!(store.listener_count(BOB_INBOX), 0);
}

#[tokio::test]
async fn repeated_login_failures_close_the_connection() {
    let (ctx, _) = setup();
    let mut client = Client::connect(ctx).await;

    for tag in ["a1", "a2"] {
        let lines = client.command(&format!("{tag} LOGIN bob wrong")).await;
        assert_eq!(lines, [format!("{tag} NO LOGIN failed")]);
    }
    client.send("a3 LOGIN bob wrong\r\n").await;
    assert_eq!(client.line().await, "a3 NO LOGIN failed");
    assert_eq!(client.line().await, "* BYE Too many failed login attempts");
    client.task.await.unwrap().unwrap();
}
