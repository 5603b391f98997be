//! Per-channel messages
//!
//! Every channel message (email, SMS or a type of your own) implements
//! [`ChannelMessage`]. The trait reaches fields through a single
//! [`read_field`](ChannelMessage::read_field)/[`write_field`](ChannelMessage::write_field)
//! pair keyed by name, so a message type can declare fields on its
//! [`MessageType`] and override how any of them is stored without generated
//! accessors.
//!
//! A message type of your own only needs a [`MessageCore`] and the hooks it
//! wants to change:
//!
//! ```rust
//! use outbox::{ChannelMessage, Error, FromType, MessageCore, MessageType, Value};
//! use serde_json::json;
//!
//! #[derive(Debug, Clone)]
//! struct Telepathy {
//!     core: MessageCore,
//! }
//!
//! impl FromType for Telepathy {
//!     fn from_type(message_type: MessageType) -> Self {
//!         Telepathy {
//!             core: MessageCore::new(message_type),
//!         }
//!     }
//! }
//!
//! impl ChannelMessage for Telepathy {
//!     fn core(&self) -> &MessageCore {
//!         &self.core
//!     }
//!
//!     fn core_mut(&mut self) -> &mut MessageCore {
//!         &mut self.core
//!     }
//!
//!     fn set_body(&mut self, body: Value) -> Result<(), Error> {
//!         self.write_field("thought", body)
//!     }
//! }
//!
//! # fn main() -> Result<(), Error> {
//! let telepathy = MessageType::of::<Telepathy>("telepathy");
//! telepathy.require_fields(["to", "thought"]);
//! telepathy.use_test_client()?;
//!
//! let mut message = telepathy.instantiate();
//! message.set_body(json!("Hello world."))?;
//! message.deliver(Some(json!("Bob")))?;
//! assert_eq!(message.field("to")?, Some(json!("Bob")));
//! # Ok(())
//! # }
//! ```

use std::{any::Any, fmt::Debug};

use crate::{
    accessor::normalize_key,
    clients::{Client, ClientRef},
    fields::is_blank,
    Error, MessageType, Settings, Value, Values,
};

mod base;
#[cfg(feature = "email")]
#[cfg_attr(docsrs, doc(cfg(feature = "email")))]
mod email;
mod sms;

pub use self::base::Base;
#[cfg(feature = "email")]
#[cfg_attr(docsrs, doc(cfg(feature = "email")))]
pub use self::email::Email;
pub use self::sms::Sms;

/// Builds a boxed message of a given type
pub type Constructor = fn(MessageType) -> Box<dyn ChannelMessage>;

pub(crate) fn construct<T: FromType>(message_type: MessageType) -> Box<dyn ChannelMessage> {
    Box::new(T::from_type(message_type))
}

/// Messages that can be built from their [`MessageType`]
pub trait FromType: ChannelMessage + Sized {
    /// Creates a message of `message_type`. Implementations should start from
    /// [`MessageCore::new`] so type defaults and the default client apply.
    fn from_type(message_type: MessageType) -> Self;
}

/// State every channel message carries: its type, the raw field map and its
/// own client
#[derive(Debug, Clone)]
pub struct MessageCore {
    message_type: MessageType,
    fields: Values,
    client: Option<Box<dyn Client>>,
}

impl MessageCore {
    /// Creates the state for a new message: fields seeded from the type
    /// defaults, client copied from the type's default client
    pub fn new(message_type: MessageType) -> MessageCore {
        MessageCore {
            fields: message_type.defaults(),
            client: message_type.default_client(),
            message_type,
        }
    }

    /// The message's type
    pub fn message_type(&self) -> &MessageType {
        &self.message_type
    }

    /// Raw field value
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(&normalize_key(name))
    }

    /// Sets a raw field value
    pub fn set(&mut self, name: &str, value: Value) {
        self.fields.insert(normalize_key(name), value);
    }

    /// Removes a raw field value
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(&normalize_key(name))
    }

    /// Every raw field value, declared or not
    pub fn values(&self) -> &Values {
        &self.fields
    }

    /// The message's client
    pub fn client(&self) -> Option<&dyn Client> {
        self.client.as_deref()
    }

    /// The message's client, for changing its settings
    pub fn client_mut(&mut self) -> Option<&mut (dyn Client + 'static)> {
        self.client.as_deref_mut()
    }

    /// Replaces the message's client
    pub fn set_client(&mut self, client: Box<dyn Client>) {
        self.client = Some(client);
    }
}

/// Conversions every [`ChannelMessage`] gets for free
pub trait AsMessage {
    /// Copies the message into a new box
    fn clone_box(&self) -> Box<dyn ChannelMessage>;
    /// Views the message as a trait object
    fn as_message(&self) -> &dyn ChannelMessage;
    /// For downcasting to the concrete message type
    fn as_any(&self) -> &dyn Any;
    /// For downcasting to the concrete message type
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: ChannelMessage + Clone> AsMessage for T {
    fn clone_box(&self) -> Box<dyn ChannelMessage> {
        Box::new(self.clone())
    }

    fn as_message(&self) -> &dyn ChannelMessage {
        self
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A message for one channel
pub trait ChannelMessage: AsMessage + Debug + Send + Sync + 'static {
    /// Shared message state
    fn core(&self) -> &MessageCore;

    /// Shared message state
    fn core_mut(&mut self) -> &mut MessageCore;

    /// Reads a field. Defaults to the raw field map; override to store some
    /// fields elsewhere.
    fn read_field(&self, name: &str) -> Option<Value> {
        self.core().get(name).cloned()
    }

    /// Writes a field. Defaults to the raw field map.
    fn write_field(&mut self, name: &str, value: Value) -> Result<(), Error> {
        self.core_mut().set(name, value);
        Ok(())
    }

    /// Whether `name` can be read through [`field`](ChannelMessage::field)
    fn responds_to(&self, name: &str) -> bool {
        self.message_type()
            .field(name)
            .map_or(false, |field| field.options().has_reader())
    }

    /// Whether `name` can be written through [`assign`](ChannelMessage::assign)
    fn accepts(&self, name: &str) -> bool {
        self.message_type()
            .field(name)
            .map_or(false, |field| field.options().has_writer())
    }

    /// Whether bulk assignment stores `name`: any declared field, whether or
    /// not it has a generated writer
    fn stores(&self, name: &str) -> bool {
        self.message_type().field(name).is_some()
    }

    /// Sets the message body. Message types without a writable `body` field
    /// must override this.
    fn set_body(&mut self, body: Value) -> Result<(), Error> {
        if self.accepts("body") {
            self.write_field("body", body)
        } else {
            Err(Error::Unimplemented("body"))
        }
    }

    /// Sets who the message goes to. Assigns the `to` field when the type has
    /// one.
    fn set_audience(&mut self, audience: Value) -> Result<(), Error> {
        if self.accepts("to") {
            self.write_field("to", audience)
        } else {
            Ok(())
        }
    }

    /// Checks required fields in declaration order and fails on the first one
    /// that is absent or empty
    fn validate_fields(&self) -> Result<(), Error> {
        for name in self.message_type().required_fields() {
            if is_blank(self.read_field(&name).as_ref()) {
                return Err(Error::MissingRequiredField(name));
            }
        }
        Ok(())
    }

    /// The message's type
    fn message_type(&self) -> &MessageType {
        self.core().message_type()
    }

    /// Reads the raw field map, bypassing declarations
    fn get_field(&self, name: &str) -> Option<&Value> {
        self.core().get(name)
    }

    /// Writes the raw field map, bypassing declarations
    fn set_field(&mut self, name: &str, value: Value) {
        self.core_mut().set(name, value)
    }

    /// Reads a declared field
    fn field(&self, name: &str) -> Result<Option<Value>, Error> {
        let name = normalize_key(name);
        if !self.responds_to(&name) {
            return Err(Error::UnknownField(name));
        }
        Ok(self.read_field(&name).filter(|value| !value.is_null()))
    }

    /// Sets a declared field through its reader and returns the stored value
    fn field_with(&mut self, name: &str, value: Value) -> Result<Option<Value>, Error> {
        let name = normalize_key(name);
        if !self.responds_to(&name) {
            return Err(Error::UnknownField(name));
        }
        self.write_field(&name, value)?;
        Ok(self.read_field(&name).filter(|value| !value.is_null()))
    }

    /// Sets a declared field through its writer
    fn assign(&mut self, name: &str, value: Value) -> Result<(), Error> {
        let name = normalize_key(name);
        if !self.accepts(&name) {
            return Err(Error::UnknownField(name));
        }
        self.write_field(&name, value)
    }

    /// Current value of every declared field, null when unset
    fn fields(&self) -> Values {
        self.message_type()
            .field_names()
            .into_iter()
            .map(|name| {
                let value = self.read_field(&name).unwrap_or(Value::Null);
                (name, value)
            })
            .collect()
    }

    /// Writes every entry of `values` naming a declared field, including
    /// fields declared without accessors; other keys are ignored
    fn set_fields(&mut self, values: Values) -> Result<(), Error> {
        for (name, value) in values {
            let name = normalize_key(&name);
            if self.stores(&name) {
                self.write_field(&name, value)?;
            } else {
                #[cfg(feature = "tracing")]
                tracing::trace!(message_type = self.message_type().name(), field = %name, "ignoring field");
            }
        }
        Ok(())
    }

    /// The message's own client
    fn client(&self) -> Option<&dyn Client> {
        self.core().client()
    }

    /// Resolves `client` through the type's alias table and uses it for this
    /// message only
    fn use_client(&mut self, client: ClientRef, settings: Option<Settings>) -> Result<(), Error> {
        let client = self.message_type().resolve_client(client, settings)?;
        self.core_mut().set_client(client);
        Ok(())
    }

    /// Assigns `audience` if given, validates and hands the message to its
    /// client
    fn deliver(&mut self, audience: Option<Value>) -> Result<(), Error> {
        if let Some(audience) = audience.filter(|audience| !audience.is_null()) {
            self.set_audience(audience)?;
        }
        self.validate_fields()?;
        let client = self.core().client().ok_or(Error::MissingClient)?;
        client.deliver(self.as_message())
    }
}

impl Clone for Box<dyn ChannelMessage> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

impl dyn ChannelMessage {
    /// Whether the message is a `T`
    pub fn is<T: ChannelMessage>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// Downcasts to the concrete message type
    pub fn downcast_ref<T: ChannelMessage>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }

    /// Downcasts to the concrete message type
    pub fn downcast_mut<T: ChannelMessage>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut()
    }
}
