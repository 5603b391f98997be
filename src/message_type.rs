//! Type descriptors for per-channel messages
//!
//! A [`MessageType`] plays the role a class plays in a dynamic object model: it
//! owns the declared fields, the default field values, the default client and
//! the client alias table shared by every message of that type. Descriptors are
//! cheap handles (`Arc`), so instances keep a reference to their type and
//! changes made at start-up are seen by every message built afterwards.
//!
//! ```rust
//! use outbox::{ChannelMessage, FieldOptions, MessageType};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), outbox::Error> {
//! let notice = MessageType::new("notice");
//! notice.require_fields(["to", "from"]);
//! notice.declare_field("subject", FieldOptions::new());
//! notice.merge_defaults(json!({ "from": "alerts@example.com" }).as_object().cloned().unwrap());
//! notice.set_default_client("test", None)?;
//!
//! let mut message = notice.instantiate();
//! assert_eq!(message.field("from")?, Some(json!("alerts@example.com")));
//! message.deliver(Some(json!("ops@example.com")))?;
//! # Ok(())
//! # }
//! ```
//!
//! Subtypes extend their parent: they see every field, default, alias and the
//! default client declared on the parent, and may add their own without
//! disturbing it.

use std::{
    collections::BTreeMap,
    fmt::{self, Debug, Formatter},
    sync::{Arc, RwLock},
};

use crate::{
    accessor::normalize_key,
    clients::{Client, ClientRef, TestClient},
    fields::{FieldDescriptor, FieldOptions},
    lock,
    messages::{construct, Base, ChannelMessage, Constructor, FromType},
    Error, Settings, Values,
};

/// Alias every root type registers for the recording test client
pub const TEST_CLIENT_ALIAS: &str = "test";

/// Descriptor of a message type, shared by all its instances
#[derive(Clone)]
pub struct MessageType(Arc<Inner>);

struct Inner {
    name: String,
    parent: Option<MessageType>,
    construct: Constructor,
    state: RwLock<TypeState>,
}

#[derive(Debug, Clone, Default)]
struct TypeState {
    fields: Vec<FieldDescriptor>,
    required: Vec<String>,
    defaults: Values,
    default_client: Option<Box<dyn Client>>,
    aliases: BTreeMap<String, ClientRef>,
}

impl MessageType {
    /// Creates a root type whose instances are plain [`Base`] messages
    pub fn new(name: &str) -> MessageType {
        MessageType::of::<Base>(name)
    }

    /// Creates a root type whose instances are `T`
    pub fn of<T: FromType>(name: &str) -> MessageType {
        MessageType::with_constructor(name, construct::<T>)
    }

    /// Creates a root type instantiated through `construct`
    pub fn with_constructor(name: &str, construct: Constructor) -> MessageType {
        let mut state = TypeState::default();
        state.aliases.insert(
            TEST_CLIENT_ALIAS.to_owned(),
            ClientRef::class::<TestClient>(),
        );
        MessageType::from_parts(name, None, construct, state)
    }

    /// Derives a type that inherits everything declared on `self`
    pub fn subtype(&self, name: &str) -> MessageType {
        MessageType::from_parts(
            name,
            Some(self.clone()),
            self.0.construct,
            TypeState::default(),
        )
    }

    /// Derives a type that inherits everything declared on `self` but builds
    /// `T` instances
    pub fn subtype_of<T: FromType>(&self, name: &str) -> MessageType {
        MessageType::from_parts(
            name,
            Some(self.clone()),
            construct::<T>,
            TypeState::default(),
        )
    }

    fn from_parts(
        name: &str,
        parent: Option<MessageType>,
        construct: Constructor,
        state: TypeState,
    ) -> MessageType {
        MessageType(Arc::new(Inner {
            name: normalize_key(name),
            parent,
            construct,
            state: RwLock::new(state),
        }))
    }

    /// Name of the type
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Parent type, if this is a subtype
    pub fn parent(&self) -> Option<&MessageType> {
        self.0.parent.as_ref()
    }

    /// Whether `self` is `other` or one of its subtypes
    pub fn is_a(&self, other: &MessageType) -> bool {
        self == other || self.parent().map_or(false, |parent| parent.is_a(other))
    }

    /// Builds a new message of this type, seeded with the type defaults and a
    /// copy of the default client
    pub fn instantiate(&self) -> Box<dyn ChannelMessage> {
        (self.0.construct)(self.clone())
    }

    // Fields

    /// Declares a field. A `required` declaration appends the field to the
    /// required list; later declarations never remove it from there.
    pub fn declare_field(&self, name: &str, options: FieldOptions) {
        self.declare_fields([name], options);
    }

    /// Declares several fields with the same options
    pub fn declare_fields<I, S>(&self, names: I, options: FieldOptions)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = lock::write(&self.0.state);
        for name in names {
            let field = FieldDescriptor::new(name.as_ref(), options);
            if options.is_required() && !state.required.iter().any(|name| name == field.name()) {
                state.required.push(field.name().to_owned());
            }
            state.fields.push(field);
        }
    }

    /// Declares required fields with reader and writer
    pub fn require_fields<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.require_fields_with(names, FieldOptions::new());
    }

    /// Declares required fields; `options` controls accessor generation,
    /// `required` is forced on
    pub fn require_fields_with<I, S>(&self, names: I, options: FieldOptions)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.declare_fields(names, options.required(true));
    }

    /// Every field visible on this type, inherited fields first
    pub fn field_descriptors(&self) -> Vec<FieldDescriptor> {
        let mut fields = self
            .parent()
            .map(MessageType::field_descriptors)
            .unwrap_or_default();
        fields.extend(lock::read(&self.0.state).fields.iter().cloned());
        fields
    }

    /// The latest declaration of `name`
    pub fn field(&self, name: &str) -> Option<FieldDescriptor> {
        let name = normalize_key(name);
        let own = lock::read(&self.0.state)
            .fields
            .iter()
            .rev()
            .find(|field| field.name() == name)
            .cloned();
        own.or_else(|| self.parent().and_then(|parent| parent.field(&name)))
    }

    /// Names of the declared fields in declaration order
    pub fn field_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for field in self.field_descriptors() {
            if !names.iter().any(|name| name == field.name()) {
                names.push(field.name().to_owned());
            }
        }
        names
    }

    /// Names of the required fields in the order they were required,
    /// inherited ones first
    pub fn required_fields(&self) -> Vec<String> {
        let mut names = self
            .parent()
            .map(MessageType::required_fields)
            .unwrap_or_default();
        for name in lock::read(&self.0.state).required.iter() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }

    // Defaults

    /// Default field values, the parent's overridden by this type's
    pub fn defaults(&self) -> Values {
        let mut defaults = self
            .parent()
            .map(MessageType::defaults)
            .unwrap_or_default();
        for (name, value) in lock::read(&self.0.state).defaults.iter() {
            defaults.insert(name.clone(), value.clone());
        }
        defaults
    }

    /// Merges `defaults` into this type's default field values
    pub fn merge_defaults(&self, defaults: Values) {
        let mut state = lock::write(&self.0.state);
        for (name, value) in defaults {
            state.defaults.insert(normalize_key(&name), value);
        }
    }

    // Clients

    /// A copy of the default client, inherited from the parent when this type
    /// doesn't set one
    pub fn default_client(&self) -> Option<Box<dyn Client>> {
        let own = lock::read(&self.0.state).default_client.clone();
        own.or_else(|| self.parent().and_then(MessageType::default_client))
    }

    /// Resolves `client` with `settings`, makes it the default client and
    /// returns a copy of it
    pub fn set_default_client(
        &self,
        client: impl Into<ClientRef>,
        settings: Option<Settings>,
    ) -> Result<Box<dyn Client>, Error> {
        let client = self.resolve_client(client, settings)?;
        lock::write(&self.0.state).default_client = Some(client.clone());
        Ok(client)
    }

    /// Makes `client` the default client
    pub fn install_default_client<C: Client>(&self, client: C) {
        lock::write(&self.0.state).default_client = Some(Box::new(client));
    }

    /// Settings of the default client
    pub fn default_client_settings(&self) -> Result<Settings, Error> {
        self.default_client()
            .map(|client| client.settings().clone())
            .ok_or(Error::MissingDefaultClient)
    }

    /// Merges `settings` into the default client's settings and returns the
    /// result. An inherited default client is copied onto this type first.
    pub fn merge_default_client_settings(&self, settings: Settings) -> Result<Settings, Error> {
        let inherited = self.parent().and_then(MessageType::default_client);
        let mut state = lock::write(&self.0.state);
        let client = match state.default_client.take().or(inherited) {
            Some(client) => state.default_client.insert(client),
            None => return Err(Error::MissingDefaultClient),
        };
        client.settings_mut().extend(settings);
        Ok(client.settings().clone())
    }

    /// Registers `client` under `name` for this type and its subtypes
    pub fn register_client_alias(&self, name: &str, client: impl Into<ClientRef>) {
        lock::write(&self.0.state)
            .aliases
            .insert(normalize_key(name), client.into());
    }

    /// Looks an alias up on this type, then its ancestors
    pub fn client_alias(&self, name: &str) -> Option<ClientRef> {
        let name = normalize_key(name);
        let own = lock::read(&self.0.state).aliases.get(&name).cloned();
        own.or_else(|| self.parent().and_then(|parent| parent.client_alias(&name)))
    }

    /// Every alias visible on this type
    pub fn client_aliases(&self) -> Vec<String> {
        let mut names = self
            .parent()
            .map(MessageType::client_aliases)
            .unwrap_or_default();
        for name in lock::read(&self.0.state).aliases.keys() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }

    /// Turns a client reference into a client instance.
    ///
    /// Aliases are looked up in the alias table, factories are called with
    /// `settings` and instances are returned unchanged, `settings` ignored.
    pub fn resolve_client(
        &self,
        client: impl Into<ClientRef>,
        settings: Option<Settings>,
    ) -> Result<Box<dyn Client>, Error> {
        let mut client = client.into();
        // Aliases may point at aliases; a chain longer than the table loops.
        let mut hops = self.client_aliases().len();
        loop {
            match client {
                ClientRef::Alias(name) => {
                    if hops == 0 {
                        return Err(Error::UnknownClientAlias(name));
                    }
                    hops -= 1;

                    #[cfg(feature = "tracing")]
                    tracing::debug!(message_type = self.name(), alias = %name, "resolving client alias");

                    client = self
                        .client_alias(&name)
                        .ok_or(Error::UnknownClientAlias(name))?;
                }
                ClientRef::Factory(factory) => return Ok(factory(settings.unwrap_or_default())),
                ClientRef::Instance(instance) => return Ok(instance),
            }
        }
    }

    /// Points the default client at the recording test client
    pub fn use_test_client(&self) -> Result<(), Error> {
        self.set_default_client(TEST_CLIENT_ALIAS, None).map(drop)
    }

    /// Snapshots this type's own declarations; they are restored when the
    /// returned guard drops.
    ///
    /// ```rust
    /// use outbox::{FieldOptions, MessageType};
    ///
    /// let notice = MessageType::new("notice");
    /// {
    ///     let _scope = notice.scope();
    ///     notice.declare_field("subject", FieldOptions::new());
    ///     assert!(notice.field("subject").is_some());
    /// }
    /// assert!(notice.field("subject").is_none());
    /// ```
    #[must_use = "declarations are restored when the scope drops"]
    pub fn scope(&self) -> TypeScope {
        TypeScope {
            message_type: self.clone(),
            saved: Some(lock::read(&self.0.state).clone()),
        }
    }
}

impl PartialEq for MessageType {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for MessageType {}

impl Debug for MessageType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageType")
            .field("name", &self.name())
            .field("parent", &self.parent().map(MessageType::name))
            .finish()
    }
}

/// Restores a [`MessageType`]'s declarations on drop
#[derive(Debug)]
pub struct TypeScope {
    message_type: MessageType,
    saved: Option<TypeState>,
}

impl Drop for TypeScope {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            *lock::write(&self.message_type.0.state) = saved;
        }
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::MessageType;
    use crate::{
        clients::{self, ClientRef, TestClient},
        Error, FieldOptions, Settings,
    };

    fn settings(value: serde_json::Value) -> Settings {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn subtype_fields_extend_the_parent() {
        let parent = MessageType::new("parent");
        parent.declare_fields(["to", "from"], FieldOptions::new());
        let child = parent.subtype("child");
        child.declare_field("thought", FieldOptions::new().required(true));

        assert_eq!(child.field_names(), ["to", "from", "thought"]);
        assert_eq!(parent.field_names(), ["to", "from"]);
        assert_eq!(child.required_fields(), ["thought"]);
        assert!(child.is_a(&parent));
        assert!(!parent.is_a(&child));
    }

    #[test]
    fn later_declarations_win() {
        let ty = MessageType::new("notice");
        ty.declare_field("to", FieldOptions::new());
        ty.declare_field("to", FieldOptions::new().writer(false));
        assert!(!ty.field("to").unwrap().options().has_writer());
        assert_eq!(ty.field_names(), ["to"]);
    }

    #[test]
    fn required_fields_keep_declaration_order() {
        let ty = MessageType::new("notice");
        ty.require_fields(["to", "from"]);
        ty.declare_field("subject", FieldOptions::new());
        ty.require_fields(["body", "to"]);
        assert_eq!(ty.required_fields(), ["to", "from", "body"]);
    }

    #[test]
    fn required_order_follows_the_require_call() {
        let ty = MessageType::new("notice");
        ty.declare_fields(["to", "from"], FieldOptions::new());
        ty.require_fields(["from", "to"]);
        assert_eq!(ty.required_fields(), ["from", "to"]);
    }

    #[test]
    fn redeclaring_never_drops_a_requirement() {
        let parent = MessageType::new("parent");
        parent.require_fields(["to"]);
        let child = parent.subtype("child");
        child.declare_field("to", FieldOptions::new().reader(false));
        parent.declare_field("to", FieldOptions::new());

        assert_eq!(child.required_fields(), ["to"]);
        assert_eq!(parent.required_fields(), ["to"]);
        assert!(!child.field("to").unwrap().options().has_reader());
    }

    #[test]
    fn defaults_merge_down_the_hierarchy() {
        let parent = MessageType::new("parent");
        parent.merge_defaults(settings(json!({ "from": "a", "to": "b" })));
        let child = parent.subtype("child");
        child.merge_defaults(settings(json!({ "from": "c" })));

        assert_eq!(child.defaults(), settings(json!({ "from": "c", "to": "b" })));
        assert_eq!(parent.defaults(), settings(json!({ "from": "a", "to": "b" })));
        assert!(MessageType::new("empty").defaults().is_empty());
    }

    #[test]
    fn test_alias_is_seeded() {
        let ty = MessageType::new("notice");
        assert_eq!(ty.client_aliases(), ["test"]);
        let client = ty.resolve_client("test", None).unwrap();
        assert!(client.is::<TestClient>());
    }

    #[test]
    fn unknown_alias_is_an_error() {
        let ty = MessageType::new("notice");
        assert!(matches!(
            ty.set_default_client("nope", None),
            Err(Error::UnknownClientAlias(name)) if name == "nope"
        ));
        assert!(ty.default_client().is_none());
    }

    #[test]
    fn alias_cycles_terminate() {
        let ty = MessageType::new("notice");
        ty.register_client_alias("a", "b");
        ty.register_client_alias("b", "a");
        assert!(matches!(
            ty.resolve_client("a", None),
            Err(Error::UnknownClientAlias(_))
        ));
    }

    #[test]
    fn instances_resolve_unchanged() {
        let ty = MessageType::new("notice");
        let client = clients::Base::new(settings(json!({ "key": 1 })));
        let resolved = ty
            .resolve_client(ClientRef::instance(client), Some(settings(json!({ "key": 2 }))))
            .unwrap();
        assert_eq!(resolved.settings().get("key"), Some(&json!(1)));
    }

    #[test]
    fn settings_require_a_default_client() {
        let ty = MessageType::new("notice");
        assert!(matches!(
            ty.merge_default_client_settings(Settings::new()),
            Err(Error::MissingDefaultClient)
        ));
        assert!(matches!(
            ty.default_client_settings(),
            Err(Error::MissingDefaultClient)
        ));

        ty.use_test_client().unwrap();
        let merged = ty
            .merge_default_client_settings(settings(json!({ "option_1": 1 })))
            .unwrap();
        assert_eq!(merged.get("option_1"), Some(&json!(1)));
        assert_eq!(
            ty.default_client_settings().unwrap().get("option_1"),
            Some(&json!(1))
        );
    }

    #[test]
    fn subtypes_inherit_clients_without_touching_the_parent() {
        let parent = MessageType::new("parent");
        parent.register_client_alias("plain", ClientRef::class::<clients::Base>());
        parent.use_test_client().unwrap();
        let child = parent.subtype("child");

        assert!(child.default_client().unwrap().is::<TestClient>());
        child
            .merge_default_client_settings(settings(json!({ "only": "child" })))
            .unwrap();
        assert!(parent.default_client_settings().unwrap().is_empty());

        child.set_default_client("plain", None).unwrap();
        assert!(child.default_client().unwrap().is::<clients::Base>());
        assert!(parent.default_client().unwrap().is::<TestClient>());
    }

    #[test]
    fn scope_restores_declarations() {
        let ty = MessageType::new("notice");
        ty.declare_field("to", FieldOptions::new());
        {
            let _scope = ty.scope();
            ty.declare_field("from", FieldOptions::new());
            ty.merge_defaults(settings(json!({ "to": "Bob" })));
            ty.use_test_client().unwrap();
        }
        assert_eq!(ty.field_names(), ["to"]);
        assert!(ty.defaults().is_empty());
        assert!(ty.default_client().is_none());
    }
}
