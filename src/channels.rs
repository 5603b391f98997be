//! Channel registry of composite messages
//!
//! A [`Channels`] registry maps channel names to message types, in
//! registration order. The order decides how [`Message`](crate::Message)
//! fans a body out and delivers. Registries are shared handles: every
//! composite message built from a registry sees channels registered later.
//!
//! ```rust
//! use outbox::{Channels, MessageType};
//!
//! # fn main() -> Result<(), outbox::Error> {
//! let channels = Channels::new();
//! let pager = MessageType::new("pager");
//! pager.require_fields(["to", "body"]);
//! channels.register("pager", pager);
//!
//! channels.set_default_client("pager", "test", None)?;
//! assert_eq!(channels.names(), ["pager"]);
//! assert!(channels.default_client("pager")?.is_some());
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, OnceLock, RwLock};

#[cfg(feature = "email")]
use crate::messages::Email;
use crate::{
    accessor::normalize_key,
    clients::{Client, ClientRef},
    lock,
    message_type::TypeScope,
    messages::Sms,
    Error, MessageType, Settings, Values,
};

static STANDARD: OnceLock<Channels> = OnceLock::new();

/// Named message types a composite message is made of
#[derive(Debug, Clone, Default)]
pub struct Channels(Arc<RwLock<Vec<(String, MessageType)>>>);

impl Channels {
    /// Creates an empty registry
    pub fn new() -> Channels {
        Channels::default()
    }

    /// The process-wide registry with the `email` (with the `email` feature)
    /// and `sms` channels, built on first use
    pub fn standard() -> Channels {
        STANDARD
            .get_or_init(|| {
                let channels = Channels::new();
                #[cfg(feature = "email")]
                channels.register("email", Email::shared_type());
                channels.register("sms", Sms::shared_type());
                channels
            })
            .clone()
    }

    /// Registers `message_type` under `name`. Registering a name again
    /// replaces its type in place, other channels are untouched.
    pub fn register(&self, name: &str, message_type: MessageType) {
        let name = normalize_key(name);
        let mut entries = lock::write(&self.0);
        match entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = message_type,
            None => entries.push((name, message_type)),
        }
    }

    /// Type of the channel called `name`
    pub fn get(&self, name: &str) -> Option<MessageType> {
        let name = normalize_key(name);
        lock::read(&self.0)
            .iter()
            .find(|(existing, _)| *existing == name)
            .map(|(_, message_type)| message_type.clone())
    }

    /// Whether a channel called `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Channel names in registration order
    pub fn names(&self) -> Vec<String> {
        lock::read(&self.0)
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Channels in registration order
    pub fn entries(&self) -> Vec<(String, MessageType)> {
        lock::read(&self.0).clone()
    }

    /// Number of registered channels
    pub fn len(&self) -> usize {
        lock::read(&self.0).len()
    }

    /// Whether no channel is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, name: &str) -> Result<MessageType, Error> {
        self.get(name)
            .ok_or_else(|| Error::UnknownChannel(normalize_key(name)))
    }

    /// Default client of the channel's type
    pub fn default_client(&self, channel: &str) -> Result<Option<Box<dyn Client>>, Error> {
        Ok(self.lookup(channel)?.default_client())
    }

    /// Sets the default client of the channel's type and returns a copy of it
    pub fn set_default_client(
        &self,
        channel: &str,
        client: impl Into<ClientRef>,
        settings: Option<Settings>,
    ) -> Result<Box<dyn Client>, Error> {
        self.lookup(channel)?.set_default_client(client, settings)
    }

    /// Settings of the channel's default client
    pub fn default_client_settings(&self, channel: &str) -> Result<Settings, Error> {
        self.lookup(channel)?.default_client_settings()
    }

    /// Merges `settings` into the channel's default client settings
    pub fn set_default_client_settings(
        &self,
        channel: &str,
        settings: Settings,
    ) -> Result<Settings, Error> {
        self.lookup(channel)?.merge_default_client_settings(settings)
    }

    /// Default field values of the channel's type
    pub fn defaults(&self, channel: &str) -> Result<Values, Error> {
        Ok(self.lookup(channel)?.defaults())
    }

    /// Merges `defaults` into the channel type's default field values
    pub fn set_defaults(&self, channel: &str, defaults: Values) -> Result<(), Error> {
        self.lookup(channel)?.merge_defaults(defaults);
        Ok(())
    }

    /// Points every channel's default client at the recording test client
    pub fn use_test_client(&self) -> Result<(), Error> {
        for (_, message_type) in self.entries() {
            message_type.use_test_client()?;
        }
        Ok(())
    }

    /// Snapshots the registered channels and each channel type's
    /// declarations; both are restored when the returned guard drops
    #[must_use = "channels are restored when the scope drops"]
    pub fn scope(&self) -> ChannelsScope {
        let entries = self.entries();
        ChannelsScope {
            channels: self.clone(),
            _types: entries
                .iter()
                .map(|(_, message_type)| message_type.scope())
                .collect(),
            saved: Some(entries),
        }
    }
}

/// Restores a [`Channels`] registry on drop
#[derive(Debug)]
pub struct ChannelsScope {
    channels: Channels,
    saved: Option<Vec<(String, MessageType)>>,
    _types: Vec<TypeScope>,
}

impl Drop for ChannelsScope {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            *lock::write(&self.channels.0) = saved;
        }
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::Channels;
    use crate::{clients::TestClient, Error, FieldOptions, MessageType, Values};

    fn values(value: serde_json::Value) -> Values {
        value.as_object().cloned().unwrap()
    }

    fn channels() -> Channels {
        let channels = Channels::new();
        for name in ["email", "sms"] {
            let message_type = MessageType::new(name);
            message_type.declare_fields(["to", "body"], FieldOptions::new());
            channels.register(name, message_type);
        }
        channels
    }

    #[test]
    fn keeps_registration_order() {
        let channels = channels();
        channels.register("pager", MessageType::new("pager"));
        assert_eq!(channels.names(), ["email", "sms", "pager"]);
    }

    #[test]
    fn reregistering_replaces_in_place() {
        let channels = channels();
        let replacement = MessageType::new("sms2");
        channels.register("sms", replacement.clone());
        assert_eq!(channels.names(), ["email", "sms"]);
        assert_eq!(channels.get("sms"), Some(replacement));
    }

    #[test]
    fn proxies_reach_the_channel_type() {
        let channels = channels();
        channels
            .set_defaults("email", values(json!({ "body": "Hi" })))
            .unwrap();
        assert_eq!(
            channels.get("email").unwrap().defaults(),
            values(json!({ "body": "Hi" }))
        );

        assert!(matches!(
            channels.set_default_client_settings("sms", Values::new()),
            Err(Error::MissingDefaultClient)
        ));
        channels.set_default_client("sms", "test", None).unwrap();
        let merged = channels
            .set_default_client_settings("sms", values(json!({ "key": 1 })))
            .unwrap();
        assert_eq!(merged, values(json!({ "key": 1 })));
        assert_eq!(channels.default_client_settings("sms").unwrap(), merged);
    }

    #[test]
    fn unknown_channels_are_errors() {
        let channels = channels();
        assert!(matches!(
            channels.defaults("fax"),
            Err(Error::UnknownChannel(name)) if name == "fax"
        ));
    }

    #[test]
    fn use_test_client_covers_every_channel() {
        let channels = channels();
        channels.use_test_client().unwrap();
        for name in channels.names() {
            let client = channels.default_client(&name).unwrap().unwrap();
            assert!(client.is::<TestClient>());
        }
    }

    #[test]
    fn scope_restores_channels_and_types() {
        let channels = channels();
        {
            let _scope = channels.scope();
            channels.register("pager", MessageType::new("pager"));
            channels.use_test_client().unwrap();
        }
        assert_eq!(channels.names(), ["email", "sms"]);
        assert!(channels.default_client("email").unwrap().is_none());
    }

    #[test]
    fn standard_registry_has_sms() {
        let standard = Channels::standard();
        assert!(standard.contains("sms"));
        #[cfg(feature = "email")]
        assert_eq!(standard.names(), ["email", "sms"]);
    }
}
