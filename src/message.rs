//! Composite messages
//!
//! A [`Message`] holds at most one message per channel of its [`Channels`]
//! registry. Channels are materialized when content is first given to them,
//! and only materialized channels take a shared body or get delivered.
//!
//! ```rust
//! use outbox::{messages::Sms, Channels, Message};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), outbox::Error> {
//! let channels = Channels::new();
//! channels.register("sms", Sms::define());
//! channels.use_test_client()?;
//!
//! let mut message = Message::with_channels(channels);
//! message.compose_as::<Sms, _>("sms", |sms| {
//!     sms.set_from("+15551234567");
//! })?;
//! message.set_body("Hello world.")?;
//!
//! message.deliver(json!({ "sms": "+14155551212", "fax": "ignored" }))?;
//! assert_eq!(message.get::<Sms>("sms").unwrap().to(), Some("+14155551212"));
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;

#[cfg(feature = "email")]
use crate::messages::Email;
use crate::{
    accessor::{normalize_key, Accessor},
    channels::Channels,
    messages::{ChannelMessage, Sms},
    Error, Value, Values,
};

/// A message for several channels at once
#[derive(Debug, Clone)]
pub struct Message {
    channels: Channels,
    slots: BTreeMap<String, Box<dyn ChannelMessage>>,
}

impl Default for Message {
    fn default() -> Self {
        Message::new()
    }
}

impl Message {
    /// Creates an empty message over the standard channels
    pub fn new() -> Message {
        Message::with_channels(Channels::standard())
    }

    /// Creates an empty message over `channels`
    pub fn with_channels(channels: Channels) -> Message {
        Message {
            channels,
            slots: BTreeMap::new(),
        }
    }

    /// Creates a message over the standard channels from a map of channel
    /// name to content, see [`assign`](Message::assign)
    pub fn from_values(values: Values) -> Result<Message, Error> {
        let mut message = Message::new();
        message.assign(values)?;
        Ok(message)
    }

    /// Creates a message over the standard channels and lets `build` compose it
    ///
    /// ```rust
    /// use outbox::{ChannelMessage, Message};
    /// use serde_json::json;
    ///
    /// # fn main() -> Result<(), outbox::Error> {
    /// let message = Message::build(|message| {
    ///     message.compose("sms", |sms| sms.assign("from", json!("Company Name")))?;
    ///     message.set_body("Hello world.")
    /// })?;
    /// assert!(message.channel("sms").is_some());
    /// # Ok(())
    /// # }
    /// ```
    pub fn build<F>(build: F) -> Result<Message, Error>
    where
        F: FnOnce(&mut Message) -> Result<(), Error>,
    {
        let mut message = Message::new();
        build(&mut message)?;
        Ok(message)
    }

    /// Applies a map of channel name to content. An object is applied as
    /// fields, any other value becomes the channel's body. Null values and
    /// unknown channel names are skipped.
    pub fn assign(&mut self, values: Values) -> Result<(), Error> {
        for (name, value) in values {
            if !self.channels.contains(&name) {
                continue;
            }
            match value {
                Value::Null => {}
                Value::Object(fields) => {
                    self.channel_with(&name, fields)?;
                }
                body => {
                    self.materialize(&name)?.set_body(body)?;
                }
            }
        }
        Ok(())
    }

    /// The channel registry
    pub fn channels(&self) -> &Channels {
        &self.channels
    }

    /// The channel's message, `None` until content was given to it
    pub fn channel(&self, name: &str) -> Option<&dyn ChannelMessage> {
        self.slots.get(&normalize_key(name)).map(|slot| &**slot)
    }

    /// The channel's message, `None` until content was given to it
    pub fn channel_mut(&mut self, name: &str) -> Option<&mut (dyn ChannelMessage + 'static)> {
        self.slots.get_mut(&normalize_key(name)).map(|slot| &mut **slot)
    }

    /// Puts `message` in the channel's slot, replacing what was there
    pub fn set_channel(
        &mut self,
        name: &str,
        message: Box<dyn ChannelMessage>,
    ) -> Result<(), Error> {
        let name = normalize_key(name);
        if !self.channels.contains(&name) {
            return Err(Error::UnknownChannel(name));
        }
        self.slots.insert(name, message);
        Ok(())
    }

    /// Empties the channel's slot
    pub fn remove_channel(&mut self, name: &str) -> Option<Box<dyn ChannelMessage>> {
        self.slots.remove(&normalize_key(name))
    }

    /// Applies `fields` to the channel's message, materializing it first if
    /// needed
    pub fn channel_with(
        &mut self,
        name: &str,
        fields: Values,
    ) -> Result<&mut (dyn ChannelMessage + 'static), Error> {
        let message = self.materialize(name)?;
        message.set_fields(fields)?;
        Ok(message)
    }

    /// Runs `compose` on the channel's message, materializing it first if
    /// needed
    pub fn compose<F>(&mut self, name: &str, compose: F) -> Result<&mut Self, Error>
    where
        F: FnOnce(&mut (dyn ChannelMessage + 'static)) -> Result<(), Error>,
    {
        compose(self.materialize(name)?)?;
        Ok(self)
    }

    /// Like [`compose`](Message::compose), with the channel's concrete message
    /// type
    pub fn compose_as<T, F>(&mut self, name: &str, compose: F) -> Result<&mut Self, Error>
    where
        T: ChannelMessage,
        F: FnOnce(&mut T),
    {
        let message = self.materialize(name)?;
        let kind = message.message_type().name().to_owned();
        let message = message
            .downcast_mut::<T>()
            .ok_or(Error::UnsupportedMessage(kind))?;
        compose(message);
        Ok(self)
    }

    /// The channel's message as its concrete type
    pub fn get<T: ChannelMessage>(&self, name: &str) -> Option<&T> {
        self.channel(name)?.downcast_ref()
    }

    /// The channel's message as its concrete type
    pub fn get_mut<T: ChannelMessage>(&mut self, name: &str) -> Option<&mut T> {
        self.channel_mut(name)?.downcast_mut()
    }

    /// The `email` channel's message
    #[cfg(feature = "email")]
    #[cfg_attr(docsrs, doc(cfg(feature = "email")))]
    pub fn email(&self) -> Option<&Email> {
        self.get("email")
    }

    /// The `sms` channel's message
    pub fn sms(&self) -> Option<&Sms> {
        self.get("sms")
    }

    fn materialize(&mut self, name: &str) -> Result<&mut (dyn ChannelMessage + 'static), Error> {
        let name = normalize_key(name);
        let message_type = self
            .channels
            .get(&name)
            .ok_or_else(|| Error::UnknownChannel(name.clone()))?;
        let slot = self
            .slots
            .entry(name)
            .or_insert_with(|| message_type.instantiate());
        Ok(&mut **slot)
    }

    /// Sets the body of every materialized channel, in registration order.
    /// Channels without content stay empty.
    pub fn set_body(&mut self, body: impl Into<Value>) -> Result<(), Error> {
        let body = body.into();
        for name in self.channels.names() {
            if let Some(message) = self.slots.get_mut(&name) {
                message.set_body(body.clone())?;
            }
        }
        Ok(())
    }

    /// Delivers every materialized channel whose recipient the audience
    /// names, in registration order. The first failure stops delivery;
    /// channels delivered before it stay delivered.
    pub fn deliver<'a>(&mut self, audience: impl Into<Accessor<'a>>) -> Result<(), Error> {
        let audience = audience.into();
        for name in self.channels.names() {
            let Some(message) = self.slots.get_mut(&name) else {
                continue;
            };
            let Some(recipient) = audience.get(&name) else {
                #[cfg(feature = "tracing")]
                tracing::debug!(channel = %name, "no recipient, skipping channel");
                continue;
            };

            #[cfg(feature = "tracing")]
            tracing::debug!(channel = %name, "delivering channel");

            message.deliver(Some(recipient))?;
        }
        Ok(())
    }
}
