//! Server responses and their wire encoding.
//!
//! Every response the server sends is a [`Response`] value. Encoding
//! appends the CRLF-terminated wire form to a `BytesMut`; strings that
//! cannot travel as a quoted string are sent as literals.

use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};
use chrono::{DateTime, FixedOffset};

use crate::Result;
use crate::types::{
    Address, BodyFields, BodyStructure, Envelope, Flag, Flags, MailboxAttribute, ResponseCode,
    Rights, StatusItem, Tag, Uid,
};

/// Longest string sent quoted; anything longer goes out as a literal.
const MAX_QUOTED_LEN: usize = 1024;

/// Status condition of a status response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Success.
    Ok,
    /// Operational failure.
    No,
    /// Protocol or syntax error.
    Bad,
    /// Server is closing the connection.
    Bye,
    /// Connection starts authenticated.
    Preauth,
}

impl Status {
    /// Returns the wire keyword.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::No => "NO",
            Self::Bad => "BAD",
            Self::Bye => "BYE",
            Self::Preauth => "PREAUTH",
        }
    }
}

/// One data item of a FETCH response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItem {
    /// `FLAGS (..)`
    Flags(Flags),
    /// `UID n`
    Uid(Uid),
    /// `INTERNALDATE "dd-Mon-yyyy hh:mm:ss +zzzz"`
    InternalDate(DateTime<FixedOffset>),
    /// `RFC822.SIZE n`
    Rfc822Size(u32),
    /// `ENVELOPE (..)`
    Envelope(Box<Envelope>),
    /// `BODY (..)` without extension data, or `BODYSTRUCTURE (..)` with it.
    Structure {
        /// Body structure to encode.
        body: Box<BodyStructure>,
        /// True for BODYSTRUCTURE.
        extensible: bool,
    },
    /// Any item whose value is a string: `BODY[..]`, `RFC822`, ...
    Data {
        /// Item name as sent, e.g. `BODY[HEADER]<0>`.
        name: String,
        /// The octets, or `None` for `NIL`.
        data: Option<Bytes>,
    },
}

/// A server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `<tag> OK|NO|BAD [code] text`
    Tagged {
        /// Tag of the completed command.
        tag: Tag,
        /// Completion status.
        status: Status,
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* OK|NO|BAD|BYE|PREAUTH [code] text`
    Untagged {
        /// Status condition.
        status: Status,
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* CAPABILITY ..`
    Capability(Vec<&'static str>),
    /// `* FLAGS (..)`
    Flags(Vec<Flag>),
    /// `* n EXISTS`
    Exists(u32),
    /// `* n RECENT`
    Recent(u32),
    /// `* n EXPUNGE`
    Expunge(u32),
    /// `* n FETCH (..)`
    Fetch {
        /// Message sequence number.
        msn: u32,
        /// Data items.
        items: Vec<FetchItem>,
    },
    /// `* LIST (..) "." name`
    List {
        /// Name attributes.
        attributes: Vec<MailboxAttribute>,
        /// Hierarchy delimiter.
        delimiter: Option<char>,
        /// Mailbox name as presented to the client.
        name: String,
    },
    /// `* LSUB (..) "." name`
    Lsub {
        /// Name attributes.
        attributes: Vec<MailboxAttribute>,
        /// Hierarchy delimiter.
        delimiter: Option<char>,
        /// Mailbox name as presented to the client.
        name: String,
    },
    /// `* STATUS name (..)`
    Status {
        /// Mailbox name as given by the client.
        mailbox: String,
        /// Requested items with their values.
        items: Vec<(StatusItem, u32)>,
    },
    /// `* SEARCH n n ..`
    Search(Vec<u32>),
    /// `* NAMESPACE personal other shared`
    Namespace {
        /// Personal namespaces: prefix and delimiter.
        personal: Vec<(String, char)>,
        /// Other users' namespaces.
        other: Vec<(String, char)>,
        /// Shared namespaces.
        shared: Vec<(String, char)>,
    },
    /// `* ACL mailbox identifier rights ..`
    Acl {
        /// Mailbox name as given by the client.
        mailbox: String,
        /// Identifier and rights pairs.
        entries: Vec<(String, Rights)>,
    },
    /// `* LISTRIGHTS mailbox identifier required optional..`
    ListRights {
        /// Mailbox name as given by the client.
        mailbox: String,
        /// Identifier asked about.
        identifier: String,
        /// Rights always granted.
        required: Rights,
        /// Rights that may be granted, one group each.
        optional: Vec<Rights>,
    },
    /// `* MYRIGHTS mailbox rights`
    MyRights {
        /// Mailbox name as given by the client.
        mailbox: String,
        /// The user's rights.
        rights: Rights,
    },
    /// `+ text`
    Continuation(String),
}

impl Response {
    /// Builds a tagged completion.
    #[must_use]
    pub fn tagged(
        tag: Tag,
        status: Status,
        code: Option<ResponseCode>,
        text: impl Into<String>,
    ) -> Self {
        Self::Tagged {
            tag,
            status,
            code,
            text: text.into(),
        }
    }

    /// Builds an untagged status response.
    #[must_use]
    pub fn untagged(status: Status, code: Option<ResponseCode>, text: impl Into<String>) -> Self {
        Self::Untagged {
            status,
            code,
            text: text.into(),
        }
    }

    /// Appends the wire form, including the final CRLF.
    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            Self::Tagged {
                tag,
                status,
                code,
                text,
            } => {
                buf.extend_from_slice(tag.as_str().as_bytes());
                encode_status(buf, *status, code.as_ref(), text);
            }
            Self::Untagged { status, code, text } => {
                buf.extend_from_slice(b"*");
                encode_status(buf, *status, code.as_ref(), text);
            }
            Self::Capability(caps) => {
                buf.extend_from_slice(b"* CAPABILITY ");
                buf.extend_from_slice(caps.join(" ").as_bytes());
            }
            Self::Flags(flags) => {
                buf.extend_from_slice(b"* FLAGS (");
                let names: Vec<&str> = flags.iter().map(Flag::as_str).collect();
                buf.extend_from_slice(names.join(" ").as_bytes());
                buf.extend_from_slice(b")");
            }
            Self::Exists(n) => buf.extend_from_slice(format!("* {n} EXISTS").as_bytes()),
            Self::Recent(n) => buf.extend_from_slice(format!("* {n} RECENT").as_bytes()),
            Self::Expunge(n) => buf.extend_from_slice(format!("* {n} EXPUNGE").as_bytes()),
            Self::Fetch { msn, items } => {
                encode_fetch(buf, *msn, items, &mut |buf, payload| {
                    write_literal(buf, payload);
                });
            }
            Self::List {
                attributes,
                delimiter,
                name,
            } => encode_list(buf, "LIST", attributes, *delimiter, name),
            Self::Lsub {
                attributes,
                delimiter,
                name,
            } => encode_list(buf, "LSUB", attributes, *delimiter, name),
            Self::Status { mailbox, items } => {
                buf.extend_from_slice(b"* STATUS ");
                write_astring(buf, mailbox);
                let list: Vec<String> = items
                    .iter()
                    .map(|(item, value)| format!("{} {value}", item.as_str()))
                    .collect();
                buf.extend_from_slice(format!(" ({})", list.join(" ")).as_bytes());
            }
            Self::Search(numbers) => {
                buf.extend_from_slice(b"* SEARCH");
                for n in numbers {
                    buf.extend_from_slice(format!(" {n}").as_bytes());
                }
            }
            Self::Namespace {
                personal,
                other,
                shared,
            } => {
                buf.extend_from_slice(b"* NAMESPACE ");
                encode_namespaces(buf, personal);
                buf.extend_from_slice(b" ");
                encode_namespaces(buf, other);
                buf.extend_from_slice(b" ");
                encode_namespaces(buf, shared);
            }
            Self::Acl { mailbox, entries } => {
                buf.extend_from_slice(b"* ACL ");
                write_astring(buf, mailbox);
                for (identifier, rights) in entries {
                    buf.extend_from_slice(b" ");
                    write_astring(buf, identifier);
                    buf.extend_from_slice(b" ");
                    write_astring(buf, &rights.to_string());
                }
            }
            Self::ListRights {
                mailbox,
                identifier,
                required,
                optional,
            } => {
                buf.extend_from_slice(b"* LISTRIGHTS ");
                write_astring(buf, mailbox);
                buf.extend_from_slice(b" ");
                write_astring(buf, identifier);
                buf.extend_from_slice(b" ");
                write_astring(buf, &required.to_string());
                for group in optional {
                    buf.extend_from_slice(b" ");
                    write_astring(buf, &group.to_string());
                }
            }
            Self::MyRights { mailbox, rights } => {
                buf.extend_from_slice(b"* MYRIGHTS ");
                write_astring(buf, mailbox);
                buf.extend_from_slice(b" ");
                write_astring(buf, &rights.to_string());
            }
            Self::Continuation(text) => {
                buf.extend_from_slice(b"+ ");
                buf.extend_from_slice(text.as_bytes());
            }
        }
        buf.extend_from_slice(b"\r\n");
    }

    /// Appends the wire form like [`encode`](Self::encode), keeping FETCH
    /// literal payloads out of `buf`.
    ///
    /// Before each payload, the text encoded so far is split off `buf` and
    /// queued on `segments`, then the payload itself is queued. Text after
    /// the last payload stays in `buf`, so writing `segments` in order and
    /// then `buf` gives the same octets as `encode`.
    pub fn encode_segments(&self, buf: &mut BytesMut, segments: &mut VecDeque<Bytes>) {
        let Self::Fetch { msn, items } = self else {
            self.encode(buf);
            return;
        };
        encode_fetch(buf, *msn, items, &mut |buf, payload| {
            buf.extend_from_slice(format!("{{{}}}\r\n", payload.len()).as_bytes());
            if !payload.is_empty() {
                segments.push_back(buf.split().freeze());
                segments.push_back(payload.clone());
            }
        });
        buf.extend_from_slice(b"\r\n");
    }

    /// Returns the wire form as a new buffer.
    #[must_use]
    pub fn to_bytes(&self) -> BytesMut {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf
    }
}

/// Destination for the responses of a command.
///
/// Handlers queue responses with [`send`](Responder::send); the dispatcher
/// and the FETCH engine decide when queued output reaches the client.
pub trait Responder: Send {
    /// Queues a response.
    fn send(&mut self, response: Response);

    /// Writes everything queued so far to the client.
    fn flush(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Collects responses in memory.
impl Responder for Vec<Response> {
    fn send(&mut self, response: Response) {
        self.push(response);
    }

    fn flush(&mut self) -> impl Future<Output = Result<()>> + Send {
        std::future::ready(Ok(()))
    }
}

fn encode_status(buf: &mut BytesMut, status: Status, code: Option<&ResponseCode>, text: &str) {
    buf.extend_from_slice(b" ");
    buf.extend_from_slice(status.as_str().as_bytes());
    if let Some(code) = code {
        buf.extend_from_slice(format!(" [{code}]").as_bytes());
    }
    if !text.is_empty() {
        buf.extend_from_slice(b" ");
        buf.extend_from_slice(text.as_bytes());
    }
}

fn encode_list(
    buf: &mut BytesMut,
    verb: &str,
    attributes: &[MailboxAttribute],
    delimiter: Option<char>,
    name: &str,
) {
    let attributes: Vec<&str> = attributes.iter().map(|a| a.as_str()).collect();
    buf.extend_from_slice(format!("* {verb} ({}) ", attributes.join(" ")).as_bytes());
    match delimiter {
        Some(d) => write_quoted(buf, d.to_string().as_bytes()),
        None => buf.extend_from_slice(b"NIL"),
    }
    buf.extend_from_slice(b" ");
    write_astring(buf, name);
}

fn encode_namespaces(buf: &mut BytesMut, namespaces: &[(String, char)]) {
    if namespaces.is_empty() {
        buf.extend_from_slice(b"NIL");
        return;
    }
    buf.extend_from_slice(b"(");
    for (prefix, delimiter) in namespaces {
        buf.extend_from_slice(b"(");
        write_string(buf, prefix.as_bytes());
        buf.extend_from_slice(b" ");
        write_quoted(buf, delimiter.to_string().as_bytes());
        buf.extend_from_slice(b")");
    }
    buf.extend_from_slice(b")");
}

/// Writes `* n FETCH (..)`, passing each literal payload to `literal`.
fn encode_fetch(
    buf: &mut BytesMut,
    msn: u32,
    items: &[FetchItem],
    literal: &mut impl FnMut(&mut BytesMut, &Bytes),
) {
    buf.extend_from_slice(format!("* {msn} FETCH (").as_bytes());
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            buf.extend_from_slice(b" ");
        }
        encode_fetch_item(buf, item, literal);
    }
    buf.extend_from_slice(b")");
}

fn encode_fetch_item(
    buf: &mut BytesMut,
    item: &FetchItem,
    literal: &mut impl FnMut(&mut BytesMut, &Bytes),
) {
    match item {
        FetchItem::Flags(flags) => buf.extend_from_slice(format!("FLAGS {flags}").as_bytes()),
        FetchItem::Uid(uid) => buf.extend_from_slice(format!("UID {uid}").as_bytes()),
        FetchItem::InternalDate(date) => {
            let text = date.format("%e-%b-%Y %H:%M:%S %z").to_string();
            buf.extend_from_slice(format!("INTERNALDATE \"{text}\"").as_bytes());
        }
        FetchItem::Rfc822Size(size) => {
            buf.extend_from_slice(format!("RFC822.SIZE {size}").as_bytes());
        }
        FetchItem::Envelope(envelope) => {
            buf.extend_from_slice(b"ENVELOPE ");
            encode_envelope(buf, envelope);
        }
        FetchItem::Structure { body, extensible } => {
            if *extensible {
                buf.extend_from_slice(b"BODYSTRUCTURE ");
            } else {
                buf.extend_from_slice(b"BODY ");
            }
            encode_body(buf, body, *extensible);
        }
        FetchItem::Data { name, data } => {
            buf.extend_from_slice(name.as_bytes());
            buf.extend_from_slice(b" ");
            match data {
                Some(bytes) => literal(buf, bytes),
                None => buf.extend_from_slice(b"NIL"),
            }
        }
    }
}

fn encode_envelope(buf: &mut BytesMut, envelope: &Envelope) {
    buf.extend_from_slice(b"(");
    write_nstring(buf, envelope.date.as_deref());
    buf.extend_from_slice(b" ");
    write_nstring(buf, envelope.subject.as_deref());
    for list in [
        &envelope.from,
        &envelope.sender,
        &envelope.reply_to,
        &envelope.to,
        &envelope.cc,
        &envelope.bcc,
    ] {
        buf.extend_from_slice(b" ");
        encode_addresses(buf, list);
    }
    buf.extend_from_slice(b" ");
    write_nstring(buf, envelope.in_reply_to.as_deref());
    buf.extend_from_slice(b" ");
    write_nstring(buf, envelope.message_id.as_deref());
    buf.extend_from_slice(b")");
}

fn encode_addresses(buf: &mut BytesMut, addresses: &[Address]) {
    if addresses.is_empty() {
        buf.extend_from_slice(b"NIL");
        return;
    }
    buf.extend_from_slice(b"(");
    for address in addresses {
        buf.extend_from_slice(b"(");
        write_nstring(buf, address.name.as_deref());
        buf.extend_from_slice(b" ");
        write_nstring(buf, address.adl.as_deref());
        buf.extend_from_slice(b" ");
        write_nstring(buf, address.mailbox.as_deref());
        buf.extend_from_slice(b" ");
        write_nstring(buf, address.host.as_deref());
        buf.extend_from_slice(b")");
    }
    buf.extend_from_slice(b")");
}

fn encode_body(buf: &mut BytesMut, body: &BodyStructure, extensible: bool) {
    buf.extend_from_slice(b"(");
    match body {
        BodyStructure::Basic(fields) => {
            encode_body_fields(buf, fields);
            if extensible {
                buf.extend_from_slice(b" NIL");
            }
        }
        BodyStructure::Text { fields, lines } => {
            encode_body_fields(buf, fields);
            buf.extend_from_slice(format!(" {lines}").as_bytes());
            if extensible {
                buf.extend_from_slice(b" NIL");
            }
        }
        BodyStructure::Message {
            fields,
            envelope,
            body,
            lines,
        } => {
            encode_body_fields(buf, fields);
            buf.extend_from_slice(b" ");
            encode_envelope(buf, envelope);
            buf.extend_from_slice(b" ");
            encode_body(buf, body, extensible);
            buf.extend_from_slice(format!(" {lines}").as_bytes());
            if extensible {
                buf.extend_from_slice(b" NIL");
            }
        }
        BodyStructure::Multipart {
            parts,
            subtype,
            params,
        } => {
            for part in parts {
                encode_body(buf, part, extensible);
            }
            buf.extend_from_slice(b" ");
            write_string(buf, subtype.as_bytes());
            if extensible {
                buf.extend_from_slice(b" ");
                encode_params(buf, params);
            }
        }
    }
    buf.extend_from_slice(b")");
}

fn encode_body_fields(buf: &mut BytesMut, fields: &BodyFields) {
    write_string(buf, fields.media_type.as_bytes());
    buf.extend_from_slice(b" ");
    write_string(buf, fields.subtype.as_bytes());
    buf.extend_from_slice(b" ");
    encode_params(buf, &fields.params);
    buf.extend_from_slice(b" ");
    write_nstring(buf, fields.id.as_deref());
    buf.extend_from_slice(b" ");
    write_nstring(buf, fields.description.as_deref());
    buf.extend_from_slice(b" ");
    write_string(buf, fields.encoding.as_bytes());
    buf.extend_from_slice(format!(" {}", fields.size).as_bytes());
}

fn encode_params(buf: &mut BytesMut, params: &[(String, String)]) {
    if params.is_empty() {
        buf.extend_from_slice(b"NIL");
        return;
    }
    buf.extend_from_slice(b"(");
    for (i, (name, value)) in params.iter().enumerate() {
        if i > 0 {
            buf.extend_from_slice(b" ");
        }
        write_string(buf, name.as_bytes());
        buf.extend_from_slice(b" ");
        write_string(buf, value.as_bytes());
    }
    buf.extend_from_slice(b")");
}

/// Writes an astring: a bare atom when possible, else a string.
pub fn write_astring(buf: &mut BytesMut, s: &str) {
    if !s.is_empty() && s.bytes().all(crate::parser::is_astring_char) {
        buf.extend_from_slice(s.as_bytes());
    } else {
        write_string(buf, s.as_bytes());
    }
}

/// Writes an nstring: `NIL` or a string.
pub fn write_nstring(buf: &mut BytesMut, s: Option<&str>) {
    match s {
        Some(s) => write_string(buf, s.as_bytes()),
        None => buf.extend_from_slice(b"NIL"),
    }
}

/// Writes a string, quoted when every octet allows it, else as a literal.
pub fn write_string(buf: &mut BytesMut, data: &[u8]) {
    if data.len() <= MAX_QUOTED_LEN && data.iter().all(|&b| is_quoted_char(b)) {
        write_quoted(buf, data);
    } else {
        write_literal(buf, data);
    }
}

fn write_quoted(buf: &mut BytesMut, data: &[u8]) {
    buf.extend_from_slice(b"\"");
    for &b in data {
        if b == b'"' || b == b'\\' {
            buf.extend_from_slice(b"\\");
        }
        buf.extend_from_slice(&[b]);
    }
    buf.extend_from_slice(b"\"");
}

/// Writes `{n}CRLF` followed by the octets.
pub fn write_literal(buf: &mut BytesMut, data: &[u8]) {
    buf.extend_from_slice(format!("{{{}}}\r\n", data.len()).as_bytes());
    buf.extend_from_slice(data);
}

/// Octets allowed inside a quoted string: 7-bit, no NUL, CR or LF.
const fn is_quoted_char(b: u8) -> bool {
    b != 0 && b != b'\r' && b != b'\n' && b < 0x80
}
