//! Uniform property access over either a key-value map or an object exposing named
//! properties.
//!
//! Audiences handed to [`Message::deliver`](crate::Message::deliver) and to the
//! per-channel `set_audience` implementations are read through an [`Accessor`],
//! so callers can pass whichever shape they already have:
//!
//! ```rust
//! use outbox::{Accessor, Properties, Value};
//! use serde_json::json;
//!
//! let mut hash_accessor = Accessor::from(json!({ "a": 1, " b ": 2 }));
//! assert_eq!(hash_accessor.get("a"), Some(json!(1)));
//! assert_eq!(hash_accessor.get("b"), Some(json!(2)));
//! assert_eq!(hash_accessor.get("c"), None);
//! hash_accessor.set("c", json!(3));
//! assert_eq!(hash_accessor.into_map().unwrap().get("c"), Some(&json!(3)));
//!
//! struct User {
//!     email: String,
//! }
//!
//! impl Properties for User {
//!     fn property(&self, name: &str) -> Option<Value> {
//!         match name {
//!             "email" => Some(Value::from(self.email.as_str())),
//!             _ => None,
//!         }
//!     }
//! }
//!
//! let user = User { email: "bob@example.com".into() };
//! let object_accessor = Accessor::from(&user);
//! assert_eq!(object_accessor.get("email"), Some(json!("bob@example.com")));
//! assert_eq!(object_accessor.get("sms"), None);
//! ```

use std::fmt::{self, Debug, Formatter};

use crate::{Value, Values};

/// Normalizes a property or field name to its canonical form.
///
/// Surrounding whitespace is dropped and `-` becomes `_`, so `"reply-to"`,
/// `" reply_to"` and `"reply_to"` all address the same key.
pub fn normalize_key(key: &str) -> String {
    key.trim().replace('-', "_")
}

/// An object exposing named properties
///
/// Implement this for structs that should be usable as an audience. Names are
/// passed in canonical form (see [`normalize_key`]).
pub trait Properties {
    /// Returns the value of the named property, if the object exposes it
    fn property(&self, name: &str) -> Option<Value>;

    /// Sets the named property. Objects that don't expose a setter for `name`
    /// ignore the write.
    fn set_property(&mut self, name: &str, value: Value) {
        let _ = (name, value);
    }
}

/// Read/write access to either a map or a [`Properties`] object.
///
/// Maps are copied once with normalized keys, the input is never mutated.
/// Objects are wrapped by reference, so writes are visible through the
/// original object.
pub enum Accessor<'a> {
    /// Owned map with normalized keys
    Map(Values),
    /// Mutable object
    Object(&'a mut dyn Properties),
    /// Read-only object, writes are dropped
    View(&'a dyn Properties),
}

impl<'a> Accessor<'a> {
    /// Creates an accessor over a copy of `map` with normalized keys
    pub fn from_map(map: &Values) -> Accessor<'static> {
        Accessor::Map(
            map.iter()
                .map(|(key, value)| (normalize_key(key), value.clone()))
                .collect(),
        )
    }

    /// Reads a property, `None` if it is absent or null
    pub fn get(&self, key: &str) -> Option<Value> {
        let key = normalize_key(key);
        let value = match self {
            Accessor::Map(map) => map.get(&key).cloned(),
            Accessor::Object(object) => object.property(&key),
            Accessor::View(object) => object.property(&key),
        };
        value.filter(|value| !value.is_null())
    }

    /// Writes a property. Writes the backing value can't accept are dropped.
    pub fn set(&mut self, key: &str, value: Value) {
        let key = normalize_key(key);
        match self {
            Accessor::Map(map) => {
                map.insert(key, value);
            }
            Accessor::Object(object) => object.set_property(&key, value),
            Accessor::View(_) => {}
        }
    }

    /// Returns the backing map, `None` when wrapping an object
    pub fn into_map(self) -> Option<Values> {
        match self {
            Accessor::Map(map) => Some(map),
            _ => None,
        }
    }
}

impl Debug for Accessor<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Accessor::Map(map) => f.debug_tuple("Map").field(map).finish(),
            Accessor::Object(_) => f.write_str("Object(..)"),
            Accessor::View(_) => f.write_str("View(..)"),
        }
    }
}

impl From<Values> for Accessor<'static> {
    fn from(map: Values) -> Self {
        Accessor::from_map(&map)
    }
}

impl From<&Values> for Accessor<'static> {
    fn from(map: &Values) -> Self {
        Accessor::from_map(map)
    }
}

/// Objects become maps, any other value exposes no properties
impl From<Value> for Accessor<'static> {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Accessor::from_map(&map),
            _ => Accessor::Map(Values::new()),
        }
    }
}

impl<'a, P: Properties> From<&'a mut P> for Accessor<'a> {
    fn from(object: &'a mut P) -> Self {
        Accessor::Object(object)
    }
}

impl<'a, P: Properties> From<&'a P> for Accessor<'a> {
    fn from(object: &'a P) -> Self {
        Accessor::View(object)
    }
}
