//! ENVELOPE and BODYSTRUCTURE values.
//!
//! These are plain data; the mail store computes them and the response
//! encoder writes them in their parenthesized wire form.

/// An address in an envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Address {
    /// Display name.
    pub name: Option<String>,
    /// Source route, obsolete and always `NIL` in practice.
    pub adl: Option<String>,
    /// Local part.
    pub mailbox: Option<String>,
    /// Domain.
    pub host: Option<String>,
}

/// The ENVELOPE of a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    /// Date header, verbatim.
    pub date: Option<String>,
    /// Subject header, verbatim.
    pub subject: Option<String>,
    /// From addresses.
    pub from: Vec<Address>,
    /// Sender addresses; defaults to From.
    pub sender: Vec<Address>,
    /// Reply-To addresses; defaults to From.
    pub reply_to: Vec<Address>,
    /// To addresses.
    pub to: Vec<Address>,
    /// Cc addresses.
    pub cc: Vec<Address>,
    /// Bcc addresses.
    pub bcc: Vec<Address>,
    /// In-Reply-To header.
    pub in_reply_to: Option<String>,
    /// Message-ID header.
    pub message_id: Option<String>,
}

/// Fields shared by every non-multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyFields {
    /// Media type, e.g. `TEXT`.
    pub media_type: String,
    /// Media subtype, e.g. `PLAIN`.
    pub subtype: String,
    /// Content-Type parameters.
    pub params: Vec<(String, String)>,
    /// Content-ID.
    pub id: Option<String>,
    /// Content-Description.
    pub description: Option<String>,
    /// Content-Transfer-Encoding.
    pub encoding: String,
    /// Body size in octets.
    pub size: u32,
}

/// A BODY / BODYSTRUCTURE value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyStructure {
    /// Any single part that is neither text nor a nested message.
    Basic(BodyFields),
    /// A `text/*` part.
    Text {
        /// Common fields.
        fields: BodyFields,
        /// Body size in lines.
        lines: u32,
    },
    /// A `message/rfc822` part.
    Message {
        /// Common fields.
        fields: BodyFields,
        /// Envelope of the nested message.
        envelope: Box<Envelope>,
        /// Structure of the nested message.
        body: Box<BodyStructure>,
        /// Body size in lines.
        lines: u32,
    },
    /// A `multipart/*` container.
    Multipart {
        /// Child parts.
        parts: Vec<BodyStructure>,
        /// Multipart subtype, e.g. `MIXED`.
        subtype: String,
        /// Content-Type parameters (extension data).
        params: Vec<(String, String)>,
    },
}
