//! Email messages
//!
//! Headers are kept as a draft of strings and rendered into a
//! [`lettre::Message`] on demand, so an email can be inspected and changed up
//! to the moment it is delivered. Address lists accept a single address, a
//! comma separated list or an array.
//!
//! ```rust
//! use outbox::{messages::Email, ChannelMessage};
//!
//! # fn main() -> Result<(), outbox::Error> {
//! let mut email = Email::new();
//! email
//!     .set_from("Mikel Lindsaar <mikel@test.lindsaar.net.au>")
//!     .set_to("nicolas@test.lindsaar.net.au, bob@example.com")
//!     .set_subject("First multipart email sent with outbox")
//!     .set_text_part("This is plain text")
//!     .set_html_part("<h1>This is HTML</h1>");
//!
//! assert_eq!(email.to(), ["nicolas@test.lindsaar.net.au", "bob@example.com"]);
//! assert_eq!(
//!     email.smtp_envelope_from().as_deref(),
//!     Some("mikel@test.lindsaar.net.au")
//! );
//! email.validate_fields()?;
//! # Ok(())
//! # }
//! ```

use std::sync::OnceLock;

use lettre::{
    address::Envelope,
    message::{
        header::{self, Comments, ContentType, Keywords},
        Mailbox, Mailboxes, MultiPart, SinglePart,
    },
    Address, Message,
};

use super::{ChannelMessage, FromType, MessageCore};
use crate::{
    accessor::{normalize_key, Accessor},
    clients::{ClientRef, MailClient},
    fields::{is_blank, FieldOptions},
    Error, MessageType, Value,
};

static EMAIL: OnceLock<MessageType> = OnceLock::new();

/// Read-only fields computed from the headers, required for delivery
const PROBES: [&str; 3] = ["smtp_envelope_from", "smtp_envelope_to", "encoded"];

const ADDRESS_FIELDS: [&str; 5] = ["from", "to", "cc", "bcc", "reply_to"];

const TEXT_FIELDS: [&str; 9] = [
    "sender",
    "return_path",
    "subject",
    "in_reply_to",
    "references",
    "message_id",
    "keywords",
    "comments",
    "content_type",
];

const BODY_FIELDS: [&str; 3] = ["body", "text_part", "html_part"];

#[derive(Debug, Clone, Default, PartialEq)]
struct Draft {
    from: Vec<String>,
    to: Vec<String>,
    cc: Vec<String>,
    bcc: Vec<String>,
    reply_to: Vec<String>,
    sender: Option<String>,
    return_path: Option<String>,
    subject: Option<String>,
    in_reply_to: Option<String>,
    references: Option<String>,
    message_id: Option<String>,
    keywords: Option<String>,
    comments: Option<String>,
    content_type: Option<String>,
    body: Option<String>,
    text_part: Option<String>,
    html_part: Option<String>,
}

impl Draft {
    fn addresses_mut(&mut self, name: &str) -> Option<&mut Vec<String>> {
        Some(match name {
            "from" => &mut self.from,
            "to" => &mut self.to,
            "cc" => &mut self.cc,
            "bcc" => &mut self.bcc,
            "reply_to" => &mut self.reply_to,
            _ => return None,
        })
    }

    fn addresses(&self, name: &str) -> Option<&[String]> {
        Some(match name {
            "from" => &self.from,
            "to" => &self.to,
            "cc" => &self.cc,
            "bcc" => &self.bcc,
            "reply_to" => &self.reply_to,
            _ => return None,
        })
    }

    fn text_mut(&mut self, name: &str) -> Option<&mut Option<String>> {
        Some(match name {
            "sender" => &mut self.sender,
            "return_path" => &mut self.return_path,
            "subject" => &mut self.subject,
            "in_reply_to" => &mut self.in_reply_to,
            "references" => &mut self.references,
            "message_id" => &mut self.message_id,
            "keywords" => &mut self.keywords,
            "comments" => &mut self.comments,
            "content_type" => &mut self.content_type,
            "body" => &mut self.body,
            "text_part" => &mut self.text_part,
            "html_part" => &mut self.html_part,
            _ => return None,
        })
    }

    fn text(&self, name: &str) -> Option<&Option<String>> {
        Some(match name {
            "sender" => &self.sender,
            "return_path" => &self.return_path,
            "subject" => &self.subject,
            "in_reply_to" => &self.in_reply_to,
            "references" => &self.references,
            "message_id" => &self.message_id,
            "keywords" => &self.keywords,
            "comments" => &self.comments,
            "content_type" => &self.content_type,
            "body" => &self.body,
            "text_part" => &self.text_part,
            "html_part" => &self.html_part,
            _ => return None,
        })
    }

    /// Stores `value` if `name` is a header or body field
    fn write(&mut self, name: &str, value: Value) -> bool {
        if let Some(addresses) = self.addresses_mut(name) {
            *addresses = address_list(value);
            true
        } else if let Some(text) = self.text_mut(name) {
            *text = text_value(value);
            true
        } else {
            false
        }
    }

    fn read(&self, name: &str) -> Option<Value> {
        if let Some(addresses) = self.addresses(name) {
            (!addresses.is_empty()).then(|| Value::from(addresses.to_vec()))
        } else {
            self.text(name)?.as_deref().map(Value::from)
        }
    }
}

fn is_draft_field(name: &str) -> bool {
    ADDRESS_FIELDS.contains(&name) || TEXT_FIELDS.contains(&name) || BODY_FIELDS.contains(&name)
}

/// Flattens a value into header text: null clears, arrays are joined
fn text_value(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text),
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(text_value)
                .collect::<Vec<_>>()
                .join(", "),
        ),
        other => Some(other.to_string()),
    }
}

/// Splits a value into single addresses. Lists that don't parse are kept
/// verbatim and reported when the message is rendered.
fn address_list(value: Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.into_iter().flat_map(address_list).collect(),
        value => match text_value(value) {
            Some(text) if !text.trim().is_empty() => match text.parse::<Mailboxes>() {
                Ok(mailboxes) => mailboxes.into_iter().map(|mbox| mbox.to_string()).collect(),
                Err(_) => vec![text],
            },
            _ => Vec::new(),
        },
    }
}

/// Bare address of a mailbox, the input itself when it doesn't parse
fn address_of(mailbox: &str) -> String {
    mailbox
        .parse::<Mailbox>()
        .map(|mbox| mbox.email.to_string())
        .unwrap_or_else(|_| mailbox.to_owned())
}

fn mailboxes(name: &str, list: &[String]) -> Result<Mailboxes, Error> {
    list.iter()
        .map(|raw| {
            raw.parse::<Mailbox>()
                .map_err(|err| Error::invalid_field(name, err))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Mailboxes::from)
}

fn mailbox(name: &str, raw: &str) -> Result<Mailbox, Error> {
    raw.parse().map_err(|err| Error::invalid_field(name, err))
}

/// An email
///
/// Built on the process-wide email type, whose default client is a
/// [`MailClient`] delivering over SMTP. Headers are reached through the typed
/// accessors below or by name (`reply-to` and `reply_to` alike) through
/// [`field`](ChannelMessage::field) and [`assign`](ChannelMessage::assign).
#[derive(Debug, Clone)]
pub struct Email {
    core: MessageCore,
    draft: Draft,
}

macro_rules! address_fields {
    ($($field:ident, $setter:ident, $header:expr;)*) => {
        impl Email {
            $(
                #[doc = concat!("`", $header, "` mailboxes")]
                pub fn $field(&self) -> &[String] {
                    &self.draft.$field
                }

                #[doc = concat!("Sets the `", $header, "` mailboxes from an address, a comma separated list or an array")]
                pub fn $setter(&mut self, value: impl Into<Value>) -> &mut Self {
                    self.draft.$field = address_list(value.into());
                    self
                }
            )*
        }
    };
}

macro_rules! text_fields {
    ($($field:ident, $setter:ident, $header:expr;)*) => {
        impl Email {
            $(
                #[doc = concat!("`", $header, "` value")]
                pub fn $field(&self) -> Option<&str> {
                    self.draft.$field.as_deref()
                }

                #[doc = concat!("Sets `", $header, "`, null clears it")]
                pub fn $setter(&mut self, value: impl Into<Value>) -> &mut Self {
                    self.draft.$field = text_value(value.into());
                    self
                }
            )*
        }
    };
}

address_fields! {
    from, set_from, "From";
    to, set_to, "To";
    cc, set_cc, "Cc";
    bcc, set_bcc, "Bcc";
    reply_to, set_reply_to, "Reply-To";
}

text_fields! {
    sender, set_sender, "Sender";
    return_path, set_return_path, "Return-Path";
    subject, set_subject, "Subject";
    in_reply_to, set_in_reply_to, "In-Reply-To";
    references, set_references, "References";
    message_id, set_message_id, "Message-Id";
    keywords, set_keywords, "Keywords";
    comments, set_comments, "Comments";
    content_type, set_content_type, "Content-Type";
    body, set_body_text, "body";
    text_part, set_text_part, "text/plain part";
    html_part, set_html_part, "text/html part";
}

impl Email {
    /// Creates an email of the shared email type
    pub fn new() -> Email {
        Email::from_type(Email::shared_type())
    }

    /// The process-wide email type, defined on first use
    pub fn shared_type() -> MessageType {
        EMAIL.get_or_init(Email::define).clone()
    }

    /// Defines a fresh, independent email type: `mail` client alias, a
    /// [`MailClient`] default client and the computed fields required for
    /// delivery
    pub fn define() -> MessageType {
        let message_type = MessageType::of::<Email>("email");
        message_type.register_client_alias("mail", ClientRef::class::<MailClient>());
        message_type.install_default_client(MailClient::default());
        message_type.require_fields_with(PROBES, FieldOptions::new().accessor(false));
        message_type.declare_fields(ADDRESS_FIELDS, FieldOptions::new().accessor(false));
        message_type.declare_fields(TEXT_FIELDS, FieldOptions::new().accessor(false));
        message_type.declare_fields(BODY_FIELDS, FieldOptions::new().accessor(false));
        message_type
    }

    /// Envelope sender: `Return-Path`, else `Sender`, else the first `From`
    pub fn smtp_envelope_from(&self) -> Option<String> {
        self.draft
            .return_path
            .as_deref()
            .or(self.draft.sender.as_deref())
            .or(self.draft.from.first().map(String::as_str))
            .filter(|raw| !raw.trim().is_empty())
            .map(address_of)
    }

    /// Envelope recipients: every `To`, `Cc` and `Bcc` address
    pub fn smtp_envelope_to(&self) -> Vec<String> {
        self.draft
            .to
            .iter()
            .chain(&self.draft.cc)
            .chain(&self.draft.bcc)
            .map(|raw| address_of(raw))
            .collect()
    }

    /// The full rendering of the message
    pub fn encoded(&self) -> Result<String, Error> {
        let formatted = self.message_object()?.formatted();
        Ok(String::from_utf8_lossy(&formatted).into_owned())
    }

    /// SMTP envelope built from [`smtp_envelope_from`](Email::smtp_envelope_from)
    /// and [`smtp_envelope_to`](Email::smtp_envelope_to)
    pub fn envelope(&self) -> Result<Envelope, Error> {
        let from = self
            .smtp_envelope_from()
            .map(|raw| {
                raw.parse::<Address>()
                    .map_err(|err| Error::invalid_field("smtp_envelope_from", err))
            })
            .transpose()?;
        let to = self
            .smtp_envelope_to()
            .iter()
            .map(|raw| {
                raw.parse::<Address>()
                    .map_err(|err| Error::invalid_field("smtp_envelope_to", err))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Envelope::new(from, to).map_err(|err| Error::invalid_field("smtp_envelope_to", err))
    }

    /// Renders the draft into a `lettre` message
    pub fn message_object(&self) -> Result<Message, Error> {
        let draft = &self.draft;
        let mut builder = Message::builder().envelope(self.envelope()?);

        builder = if draft.from.is_empty() {
            let originator = draft
                .sender
                .as_deref()
                .or(draft.return_path.as_deref())
                .ok_or_else(|| Error::MissingRequiredField("from".to_owned()))?;
            builder.from(mailbox("from", originator)?)
        } else {
            builder.mailbox(header::From::from(mailboxes("from", &draft.from)?))
        };
        if let Some(sender) = &draft.sender {
            builder = builder.sender(mailbox("sender", sender)?);
        }
        if !draft.to.is_empty() {
            builder = builder.mailbox(header::To::from(mailboxes("to", &draft.to)?));
        }
        if !draft.cc.is_empty() {
            builder = builder.mailbox(header::Cc::from(mailboxes("cc", &draft.cc)?));
        }
        if !draft.bcc.is_empty() {
            builder = builder.mailbox(header::Bcc::from(mailboxes("bcc", &draft.bcc)?));
        }
        if !draft.reply_to.is_empty() {
            builder = builder.mailbox(header::ReplyTo::from(mailboxes(
                "reply_to",
                &draft.reply_to,
            )?));
        }
        if let Some(subject) = &draft.subject {
            builder = builder.subject(subject);
        }
        if let Some(in_reply_to) = &draft.in_reply_to {
            builder = builder.in_reply_to(in_reply_to.clone());
        }
        if let Some(references) = &draft.references {
            builder = builder.references(references.clone());
        }
        if let Some(message_id) = &draft.message_id {
            builder = builder.message_id(Some(message_id.clone()));
        }
        if let Some(keywords) = &draft.keywords {
            builder = builder.header(Keywords::from(keywords.clone()));
        }
        if let Some(comments) = &draft.comments {
            builder = builder.header(Comments::from(comments.clone()));
        }

        let message = match (&draft.text_part, &draft.html_part) {
            (None, None) => {
                if let Some(content_type) = &draft.content_type {
                    let content_type = ContentType::parse(content_type)
                        .map_err(|err| Error::invalid_field("content_type", err))?;
                    builder = builder.header(content_type);
                }
                builder.body(draft.body.clone().unwrap_or_default())
            }
            _ => builder.multipart(self.parts()),
        };
        message.map_err(|err| Error::invalid_field("encoded", err))
    }

    /// The `multipart/alternative` body built from the text and HTML parts
    pub fn parts(&self) -> MultiPart {
        let mut parts = MultiPart::alternative().build();
        if let Some(text) = &self.draft.text_part {
            parts = parts.singlepart(
                SinglePart::builder()
                    .header(ContentType::TEXT_PLAIN)
                    .body(text.clone()),
            );
        }
        if let Some(html) = &self.draft.html_part {
            parts = parts.singlepart(
                SinglePart::builder()
                    .header(ContentType::TEXT_HTML)
                    .body(html.clone()),
            );
        }
        parts
    }

    /// Takes `to`, `cc` and `bcc` from an audience map or object. Absent
    /// entries clear the corresponding header.
    pub fn set_audience_from<'a>(&mut self, audience: impl Into<Accessor<'a>>) -> &mut Self {
        let audience = audience.into();
        for name in ["to", "cc", "bcc"] {
            let value = audience.get(name).unwrap_or(Value::Null);
            self.draft.write(name, value);
        }
        self
    }
}

impl Default for Email {
    fn default() -> Self {
        Email::new()
    }
}

impl FromType for Email {
    fn from_type(message_type: MessageType) -> Self {
        let mut core = MessageCore::new(message_type);
        let mut draft = Draft::default();
        let names: Vec<String> = core.values().keys().cloned().collect();
        for name in names.iter().filter(|name| is_draft_field(name)) {
            if let Some(value) = core.remove(name) {
                draft.write(name, value);
            }
        }
        Email { core, draft }
    }
}

impl ChannelMessage for Email {
    fn core(&self) -> &MessageCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut MessageCore {
        &mut self.core
    }

    fn read_field(&self, name: &str) -> Option<Value> {
        let name = normalize_key(name);
        match name.as_str() {
            "smtp_envelope_from" => self.smtp_envelope_from().map(Value::from),
            "smtp_envelope_to" => {
                let to = self.smtp_envelope_to();
                (!to.is_empty()).then(|| Value::from(to))
            }
            "encoded" => self.encoded().ok().map(Value::from),
            name if is_draft_field(name) => self.draft.read(name),
            name => self.core.get(name).cloned(),
        }
    }

    fn write_field(&mut self, name: &str, value: Value) -> Result<(), Error> {
        let name = normalize_key(name);
        if PROBES.contains(&name.as_str()) {
            return Err(Error::UnknownField(name));
        }
        if !self.draft.write(&name, value.clone()) {
            self.core.set(&name, value);
        }
        Ok(())
    }

    fn responds_to(&self, name: &str) -> bool {
        let name = normalize_key(name);
        PROBES.contains(&name.as_str())
            || is_draft_field(&name)
            || self
                .message_type()
                .field(&name)
                .map_or(false, |field| field.options().has_reader())
    }

    fn accepts(&self, name: &str) -> bool {
        let name = normalize_key(name);
        if PROBES.contains(&name.as_str()) {
            return false;
        }
        is_draft_field(&name)
            || self
                .message_type()
                .field(&name)
                .map_or(false, |field| field.options().has_writer())
    }

    fn stores(&self, name: &str) -> bool {
        let name = normalize_key(name);
        !PROBES.contains(&name.as_str())
            && (is_draft_field(&name) || self.message_type().field(&name).is_some())
    }

    fn set_body(&mut self, body: Value) -> Result<(), Error> {
        self.set_body_text(body);
        Ok(())
    }

    fn set_audience(&mut self, audience: Value) -> Result<(), Error> {
        match audience {
            Value::String(_) | Value::Array(_) => {
                self.set_to(audience);
            }
            other => {
                self.set_audience_from(other);
            }
        }
        Ok(())
    }

    fn validate_fields(&self) -> Result<(), Error> {
        for name in self.message_type().required_fields() {
            if name == "encoded" {
                self.message_object()?;
            } else if is_blank(self.read_field(&name).as_ref()) {
                return Err(Error::MissingRequiredField(name));
            }
        }
        Ok(())
    }
}
