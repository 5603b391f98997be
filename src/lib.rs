//! Outbox composes a message once and delivers it per channel.
//!
//! A composite [`Message`] holds one message per channel (email, SMS or a
//! channel of your own). Each channel message is described by a
//! [`MessageType`]: the fields it declares, which of them are required, the
//! default field values and the [`Client`] that delivers it. Clients are
//! pluggable: the recording [`TestClient`](clients::TestClient), the
//! [`MailClient`](clients::MailClient) built on `lettre`, or any type
//! implementing [`Client`].
//!
//! ## Features
//!
//! * **email** (default): the email channel and the `lettre` mail client
//! * **sendmail-transport**: `sendmail` delivery method of the mail client
//! * **file-transport**: `file` delivery method of the mail client
//! * **tracing**: diagnostics through the `tracing` crate
//!
//! ## Example
//!
//! ```rust
//! use outbox::{clients::TestClient, messages::Sms, Channels, Message};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), outbox::Error> {
//! let channels = Channels::new();
//! channels.register("sms", Sms::define());
//! channels.use_test_client()?;
//!
//! let mut message = Message::with_channels(channels);
//! message.assign(
//!     json!({ "sms": { "from": "Company Name" } })
//!         .as_object()
//!         .cloned()
//!         .unwrap(),
//! )?;
//! message.set_body("Your order shipped.")?;
//!
//! TestClient::clear_deliveries();
//! message.deliver(json!({ "sms": "+14155551212" }))?;
//!
//! let delivered = TestClient::deliveries();
//! assert_eq!(delivered.len(), 1);
//! assert_eq!(delivered[0].field("to"), Some(json!("+14155551212")));
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/crate/outbox/0.1.0")]
#![deny(
    missing_docs,
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_import_braces
)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod accessor;
pub mod channels;
pub mod clients;
mod error;
pub mod fields;
mod lock;
pub mod message;
pub mod message_type;
pub mod messages;

pub use crate::{
    accessor::{Accessor, Properties},
    channels::{Channels, ChannelsScope},
    clients::{Client, ClientRef, FromSettings},
    error::Error,
    fields::{FieldDescriptor, FieldOptions},
    message::Message,
    message_type::{MessageType, TypeScope},
    messages::{ChannelMessage, FromType, MessageCore},
};

/// A field, property or setting value
pub type Value = serde_json::Value;

/// Field values keyed by field name
pub type Values = serde_json::Map<String, Value>;

/// Client settings keyed by setting name
pub type Settings = serde_json::Map<String, Value>;
