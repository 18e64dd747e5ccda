//! Envelope and body structure extraction with `quire-mime`.

use quire_mime::{Headers, Part, count_lines, parse_address_list};

use crate::types::{Address, BodyFields, BodyStructure, Envelope};

/// Builds the ENVELOPE of an entity from its headers.
pub fn envelope(headers: &Headers) -> Envelope {
    let from = addresses(headers, "from");
    let sender = non_empty_or(addresses(headers, "sender"), &from);
    let reply_to = non_empty_or(addresses(headers, "reply-to"), &from);

    Envelope {
        date: headers.get("date").map(str::to_string),
        subject: headers.get("subject").map(str::to_string),
        from,
        sender,
        reply_to,
        to: addresses(headers, "to"),
        cc: addresses(headers, "cc"),
        bcc: addresses(headers, "bcc"),
        in_reply_to: headers.get("in-reply-to").map(str::to_string),
        message_id: headers.get("message-id").map(str::to_string),
    }
}

fn addresses(headers: &Headers, name: &str) -> Vec<Address> {
    headers
        .get_all(name)
        .into_iter()
        .flat_map(parse_address_list)
        .map(|a| Address {
            name: a.name,
            adl: None,
            mailbox: a.mailbox,
            host: a.host,
        })
        .collect()
}

fn non_empty_or(list: Vec<Address>, fallback: &[Address]) -> Vec<Address> {
    if list.is_empty() {
        fallback.to_vec()
    } else {
        list
    }
}

/// Builds the BODYSTRUCTURE of an entity.
pub fn body_structure(part: &Part) -> BodyStructure {
    let content_type = &part.content_type;
    if content_type.is_multipart() && !part.children.is_empty() {
        return BodyStructure::Multipart {
            parts: part.children.iter().map(body_structure).collect(),
            subtype: content_type.sub_type.to_ascii_uppercase(),
            params: content_type.parameters.clone(),
        };
    }

    let fields = BodyFields {
        media_type: content_type.main_type.to_ascii_uppercase(),
        subtype: content_type.sub_type.to_ascii_uppercase(),
        params: content_type.parameters.clone(),
        id: part.headers.get("content-id").map(str::to_string),
        description: part.headers.get("content-description").map(str::to_string),
        encoding: part.transfer_encoding().to_string().to_ascii_uppercase(),
        size: u32::try_from(part.body.len()).unwrap_or(u32::MAX),
    };
    let lines = count_lines(&part.body);

    match &part.message {
        Some(inner) => BodyStructure::Message {
            fields,
            envelope: Box::new(envelope(&inner.headers)),
            body: Box::new(body_structure(inner)),
            lines,
        },
        None if content_type.is_text() => BodyStructure::Text { fields, lines },
        None => BodyStructure::Basic(fields),
    }
}
