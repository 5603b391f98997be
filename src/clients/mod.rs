//! Clients deliver channel messages
//!
//! A client is configured through a free-form settings map and performs the
//! actual delivery of one message. Message types reference clients through a
//! [`ClientRef`]: a registered alias, a client type built from settings, or a
//! ready instance.
//!
//! ```rust
//! use outbox::{clients::TestClient, ChannelMessage, MessageType};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), outbox::Error> {
//! let notice = MessageType::new("notice");
//! notice.require_fields(["to"]);
//! notice.set_default_client("test", None)?;
//!
//! let mut message = notice.instantiate();
//! message.deliver(Some(json!("Bob")))?;
//!
//! let last = TestClient::deliveries().pop().unwrap();
//! assert_eq!(last.field("to"), Some(json!("Bob")));
//! # Ok(())
//! # }
//! ```

use std::{
    any::Any,
    fmt::{self, Debug, Formatter},
};

pub use self::{
    base::Base,
    test_client::{Delivery, DeliveryLog, TestClient},
};
#[cfg(feature = "email")]
#[cfg_attr(docsrs, doc(cfg(feature = "email")))]
pub use self::mail::{FileSettings, MailClient, SendmailSettings, SmtpSettings};
use crate::{messages::ChannelMessage, Error, Settings};

mod base;
#[cfg(feature = "email")]
mod mail;
mod test_client;

/// Builds a client from settings
pub type ClientFactory = fn(Settings) -> Box<dyn Client>;

/// Conversions every [`Client`] gets for free
pub trait AsClient {
    /// Copies the client into a new box
    fn clone_box(&self) -> Box<dyn Client>;
    /// For downcasting to the concrete client type
    fn as_any(&self) -> &dyn Any;
}

impl<T: Client + Clone> AsClient for T {
    fn clone_box(&self) -> Box<dyn Client> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Delivers messages of one or more channels
pub trait Client: AsClient + Debug + Send + Sync + 'static {
    /// Current settings
    fn settings(&self) -> &Settings;

    /// Current settings, for changing them in place
    fn settings_mut(&mut self) -> &mut Settings;

    /// Delivers `message`. Fields have already been validated.
    fn deliver(&self, message: &dyn ChannelMessage) -> Result<(), Error>;
}

impl Clone for Box<dyn Client> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

impl dyn Client {
    /// Whether the client is a `C`
    pub fn is<C: Client>(&self) -> bool {
        self.as_any().is::<C>()
    }

    /// Downcasts to the concrete client type
    pub fn downcast_ref<C: Client>(&self) -> Option<&C> {
        self.as_any().downcast_ref()
    }
}

/// Clients that can be built from a settings map
pub trait FromSettings: Client + Sized {
    /// Settings a client starts from
    fn defaults() -> Settings {
        Settings::new()
    }

    /// Creates a client with exactly `settings`
    fn from_settings(settings: Settings) -> Self;

    /// Creates a client from [`defaults`](FromSettings::defaults) with
    /// `overrides` merged on top
    fn with_settings(overrides: Settings) -> Self {
        Self::from_settings(merge_settings(Self::defaults(), overrides))
    }
}

/// Shallow merge, keys of `overrides` win
pub fn merge_settings(mut base: Settings, overrides: Settings) -> Settings {
    base.extend(overrides);
    base
}

fn factory<C: FromSettings>(settings: Settings) -> Box<dyn Client> {
    Box::new(C::with_settings(settings))
}

/// How a message type refers to a client
#[derive(Clone)]
pub enum ClientRef {
    /// Name registered with
    /// [`register_client_alias`](crate::MessageType::register_client_alias)
    Alias(String),
    /// Client type, instantiated with the settings given at resolution
    Factory(ClientFactory),
    /// Ready client, used as is
    Instance(Box<dyn Client>),
}

impl ClientRef {
    /// Refers to a registered alias
    pub fn alias(name: impl Into<String>) -> ClientRef {
        ClientRef::Alias(name.into())
    }

    /// Refers to the client type `C`
    pub fn class<C: FromSettings>() -> ClientRef {
        ClientRef::Factory(factory::<C>)
    }

    /// Refers to a ready client
    pub fn instance<C: Client>(client: C) -> ClientRef {
        ClientRef::Instance(Box::new(client))
    }
}

impl Debug for ClientRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ClientRef::Alias(name) => f.debug_tuple("Alias").field(name).finish(),
            ClientRef::Factory(_) => f.write_str("Factory(..)"),
            ClientRef::Instance(client) => f.debug_tuple("Instance").field(client).finish(),
        }
    }
}

impl From<&str> for ClientRef {
    fn from(name: &str) -> Self {
        ClientRef::alias(name)
    }
}

impl From<String> for ClientRef {
    fn from(name: String) -> Self {
        ClientRef::Alias(name)
    }
}

impl From<Box<dyn Client>> for ClientRef {
    fn from(client: Box<dyn Client>) -> Self {
        ClientRef::Instance(client)
    }
}
