use outbox::{
    clients::{DeliveryLog, TestClient},
    ChannelMessage, Channels, Error, FieldOptions, Message, MessageType, Properties, Settings,
    Value, Values,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn values(value: Value) -> Values {
    value.as_object().cloned().unwrap()
}

/// Three channels `a`, `b`, `c` each requiring `to`, recording into `log`
fn channels(log: &DeliveryLog) -> Channels {
    let channels = Channels::new();
    for name in ["a", "b", "c"] {
        let message_type = MessageType::new(name);
        message_type.require_fields(["to"]);
        message_type.declare_field("body", FieldOptions::new());
        message_type.install_default_client(TestClient::with_log(Settings::new(), log.clone()));
        channels.register(name, message_type);
    }
    channels
}

fn delivered_channels(log: &DeliveryLog) -> Vec<String> {
    log.deliveries()
        .iter()
        .map(|delivery| delivery.message_type().name().to_owned())
        .collect()
}

#[test]
fn only_present_channels_with_a_recipient_are_delivered() {
    let log = DeliveryLog::new();
    let mut message = Message::with_channels(channels(&log));
    message.assign(values(json!({ "a": "Hi" }))).unwrap();

    message.deliver(json!({ "a": "x", "c": "y" })).unwrap();

    assert_eq!(delivered_channels(&log), ["a"]);
    assert_eq!(log.last().unwrap().field("to"), Some(json!("x")));
    assert!(message.channel("b").is_none());
    assert!(message.channel("c").is_none());
}

#[test]
fn channels_are_delivered_in_registration_order() {
    let log = DeliveryLog::new();
    let mut message = Message::with_channels(channels(&log));
    message
        .assign(values(json!({ "c": "three", "a": "one", "b": "two" })))
        .unwrap();

    message
        .deliver(json!({ "b": "2", "c": "3", "a": "1" }))
        .unwrap();

    assert_eq!(delivered_channels(&log), ["a", "b", "c"]);
}

#[test]
fn first_failure_stops_delivery() {
    let log = DeliveryLog::new();
    let channels = channels(&log);
    channels
        .get("b")
        .unwrap()
        .require_fields(["body"]);
    let mut message = Message::with_channels(channels);
    message.compose("a", |a| a.assign("body", json!("Hi"))).unwrap();
    message.compose("b", |_| Ok(())).unwrap();
    message.compose("c", |c| c.assign("body", json!("Hi"))).unwrap();

    let err = message
        .deliver(json!({ "a": "1", "b": "2", "c": "3" }))
        .unwrap_err();

    assert!(matches!(err, Error::MissingRequiredField(name) if name == "body"));
    assert_eq!(delivered_channels(&log), ["a"]);
}

#[test]
fn body_fans_out_to_materialized_channels_only() {
    let log = DeliveryLog::new();
    let mut message = Message::with_channels(channels(&log));
    message.set_body("early").unwrap();
    assert!(message.channel("a").is_none());

    message.channel_with("a", Values::new()).unwrap();
    message.channel_with("c", Values::new()).unwrap();
    message.set_body("late").unwrap();

    assert_eq!(message.channel("a").unwrap().field("body").unwrap(), Some(json!("late")));
    assert_eq!(message.channel("c").unwrap().field("body").unwrap(), Some(json!("late")));
    assert!(message.channel("b").is_none());
}

#[test]
fn null_and_unknown_entries_are_ignored() {
    let mut message = Message::with_channels(channels(&DeliveryLog::new()));
    message
        .assign(values(json!({ "a": null, "fax": { "to": "1" } })))
        .unwrap();
    assert!(message.channel("a").is_none());
}

#[test]
fn null_recipients_skip_the_channel() {
    let log = DeliveryLog::new();
    let mut message = Message::with_channels(channels(&log));
    message.assign(values(json!({ "a": "Hi", "b": "Hi" }))).unwrap();

    message.deliver(json!({ "a": null, "b": "2" })).unwrap();

    assert_eq!(delivered_channels(&log), ["b"]);
}

#[test]
fn unknown_channels_are_rejected_by_compose() {
    let mut message = Message::with_channels(channels(&DeliveryLog::new()));
    let err = message.compose("fax", |_| Ok(())).unwrap_err();
    assert!(matches!(err, Error::UnknownChannel(name) if name == "fax"));
    assert!(message.set_channel("fax", MessageType::new("fax").instantiate()).is_err());
}

#[test]
fn channel_messages_can_be_swapped() {
    let log = DeliveryLog::new();
    let channels = channels(&log);
    let mut message = Message::with_channels(channels.clone());

    let mut replacement = channels.get("a").unwrap().instantiate();
    replacement.assign("body", json!("prepared")).unwrap();
    message.set_channel("a", replacement).unwrap();
    message.deliver(json!({ "a": "x" })).unwrap();
    assert_eq!(log.last().unwrap().field("body"), Some(json!("prepared")));

    assert!(message.remove_channel("a").is_some());
    message.deliver(json!({ "a": "x" })).unwrap();
    assert_eq!(log.len(), 1);
}

#[test]
fn later_registrations_reach_existing_messages() {
    let log = DeliveryLog::new();
    let channels = channels(&log);
    let mut message = Message::with_channels(channels.clone());

    let pager = MessageType::new("pager");
    pager.require_fields(["to"]);
    pager.install_default_client(TestClient::with_log(Settings::new(), log.clone()));
    channels.register("pager", pager);

    message.compose("pager", |_| Ok(())).unwrap();
    message.deliver(json!({ "pager": "555" })).unwrap();
    assert_eq!(delivered_channels(&log), ["pager"]);
}

struct Customer {
    email: &'static str,
    phone: Option<&'static str>,
}

impl Properties for Customer {
    fn property(&self, name: &str) -> Option<Value> {
        match name {
            "a" => Some(json!(self.email)),
            "b" => self.phone.map(Value::from),
            _ => None,
        }
    }
}

#[test]
fn audience_can_be_any_object_with_properties() {
    let log = DeliveryLog::new();
    let mut message = Message::with_channels(channels(&log));
    message.assign(values(json!({ "a": "Hi", "b": "Hi" }))).unwrap();

    let customer = Customer {
        email: "bob@example.com",
        phone: None,
    };
    message.deliver(&customer).unwrap();

    assert_eq!(delivered_channels(&log), ["a"]);
    assert_eq!(log.last().unwrap().field("to"), Some(json!("bob@example.com")));
}

#[test]
fn delivered_snapshots_are_independent_of_later_changes() {
    let log = DeliveryLog::new();
    let mut message = Message::with_channels(channels(&log));
    message.assign(values(json!({ "a": "first" }))).unwrap();
    message.deliver(json!({ "a": "x" })).unwrap();

    message.set_body("second").unwrap();
    message.deliver(json!({ "a": "x" })).unwrap();

    let bodies: Vec<_> = log
        .deliveries()
        .iter()
        .map(|delivery| delivery.field("body"))
        .collect();
    assert_eq!(bodies, [Some(json!("first")), Some(json!("second"))]);
}
