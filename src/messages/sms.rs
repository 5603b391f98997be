use std::sync::OnceLock;

use super::{ChannelMessage, FromType, MessageCore};
use crate::{accessor::Accessor, Error, MessageType, Value};

static SMS: OnceLock<MessageType> = OnceLock::new();

/// A text message
///
/// SMS providers support very different parameters, so only `to`, `from` and
/// `body` are declared (all required). Anything else can go through the raw
/// field map with [`set_field`](ChannelMessage::set_field).
///
/// ```rust
/// use outbox::{messages::Sms, ChannelMessage};
///
/// let mut sms = Sms::new();
/// sms.set_to("+14155551212").set_from("Company Name").set_body_text("Hello world.");
/// assert_eq!(sms.to(), Some("+14155551212"));
/// assert!(sms.validate_fields().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct Sms {
    core: MessageCore,
}

impl Sms {
    /// Creates a message of the shared SMS type
    pub fn new() -> Sms {
        Sms::from_type(Sms::shared_type())
    }

    /// The process-wide SMS type, defined on first use
    pub fn shared_type() -> MessageType {
        SMS.get_or_init(Sms::define).clone()
    }

    /// Defines a fresh, independent SMS type
    pub fn define() -> MessageType {
        let message_type = MessageType::of::<Sms>("sms");
        message_type.require_fields(["to", "from", "body"]);
        message_type
    }

    /// Recipient number
    pub fn to(&self) -> Option<&str> {
        self.text("to")
    }

    /// Sets the recipient number
    pub fn set_to(&mut self, to: impl Into<Value>) -> &mut Self {
        self.core.set("to", to.into());
        self
    }

    /// Sender number or name
    pub fn from(&self) -> Option<&str> {
        self.text("from")
    }

    /// Sets the sender number or name
    pub fn set_from(&mut self, from: impl Into<Value>) -> &mut Self {
        self.core.set("from", from.into());
        self
    }

    /// Message text
    pub fn body(&self) -> Option<&str> {
        self.text("body")
    }

    /// Sets the message text
    pub fn set_body_text(&mut self, body: impl Into<Value>) -> &mut Self {
        self.core.set("body", body.into());
        self
    }

    /// Takes the recipient from an audience map or object's `to` property
    pub fn set_audience_from<'a>(&mut self, audience: impl Into<Accessor<'a>>) -> &mut Self {
        let to = audience.into().get("to").unwrap_or(Value::Null);
        self.set_to(to)
    }

    fn text(&self, name: &str) -> Option<&str> {
        self.core.get(name).and_then(Value::as_str)
    }
}

impl Default for Sms {
    fn default() -> Self {
        Sms::new()
    }
}

impl FromType for Sms {
    fn from_type(message_type: MessageType) -> Self {
        Sms {
            core: MessageCore::new(message_type),
        }
    }
}

impl ChannelMessage for Sms {
    fn core(&self) -> &MessageCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut MessageCore {
        &mut self.core
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
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::Sms;
    use crate::{Accessor, ChannelMessage, Error, FromType, Properties, Value};

    fn fresh() -> Sms {
        Sms::from_type(Sms::define())
    }

    fn valid_sms() -> Sms {
        let mut sms = fresh();
        sms.set_to("+14155551212")
            .set_from("john@gmail.com")
            .set_body_text("Hello world.");
        sms
    }

    struct Recipient;

    impl Properties for Recipient {
        fn property(&self, name: &str) -> Option<Value> {
            (name == "to").then(|| json!("+14155551212"))
        }
    }

    #[test]
    fn sets_common_fields() {
        let sms = valid_sms();
        assert_eq!(sms.to(), Some("+14155551212"));
        assert_eq!(sms.from(), Some("john@gmail.com"));
        assert_eq!(sms.body(), Some("Hello world."));
        assert_eq!(sms.field("body").unwrap(), Some(json!("Hello world.")));
    }

    #[test]
    fn audience_string_sets_to() {
        let mut sms = fresh();
        sms.set_audience(json!("+14155551212")).unwrap();
        assert_eq!(sms.to(), Some("+14155551212"));
    }

    #[test]
    fn audience_array_sets_to() {
        let mut sms = fresh();
        sms.set_audience(json!(["+14155551212", "+14155550000"]))
            .unwrap();
        assert_eq!(
            sms.field("to").unwrap(),
            Some(json!(["+14155551212", "+14155550000"]))
        );
    }

    #[test]
    fn audience_map_sets_to() {
        let mut sms = fresh();
        sms.set_audience(json!({ "to": "+14155551212", "from": "ignored" }))
            .unwrap();
        assert_eq!(sms.to(), Some("+14155551212"));
        assert_eq!(sms.from(), None);
    }

    #[test]
    fn audience_object_sets_to() {
        let mut sms = fresh();
        sms.set_audience_from(Accessor::from(&Recipient));
        assert_eq!(sms.to(), Some("+14155551212"));
    }

    #[test]
    fn every_field_is_required() {
        for field in ["to", "from", "body"] {
            let mut sms = valid_sms();
            sms.set_field(field, Value::Null);
            assert!(matches!(
                sms.validate_fields(),
                Err(Error::MissingRequiredField(name)) if name == field
            ));
        }
        assert!(valid_sms().validate_fields().is_ok());
    }

    #[test]
    fn body_fans_in_through_set_body() {
        let mut sms = fresh();
        sms.set_body(json!("Hi")).unwrap();
        assert_eq!(sms.body(), Some("Hi"));
    }
}
