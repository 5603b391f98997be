#![cfg(feature = "email")]

use outbox::{
    clients::{FromSettings, MailClient},
    messages::Email,
    ChannelMessage, Client, ClientRef, FromType, Settings,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn settings(value: serde_json::Value) -> Settings {
    value.as_object().cloned().unwrap()
}

fn email() -> Email {
    let mut email = Email::from_type(Email::define());
    email
        .set_from("Shop <shop@example.com>")
        .set_to("bob@example.com")
        .set_subject("Order shipped")
        .set_body_text("Your order is on its way.");
    email
}

#[test]
fn emails_default_to_the_mail_client() {
    let email = email();
    let client = email.client().unwrap();
    assert!(client.is::<MailClient>());
    assert_eq!(client.settings().get("delivery_method"), Some(&json!("smtp")));
}

#[test]
fn mail_alias_builds_a_configured_client() {
    let message_type = Email::define();
    message_type
        .set_default_client("mail", Some(settings(json!({ "delivery_method": "test" }))))
        .unwrap();
    let client = message_type.default_client().unwrap();
    let mail = client.downcast_ref::<MailClient>().unwrap();
    assert_eq!(mail.delivery_method(), "test");
}

#[test]
fn delivers_through_the_stub_method() {
    let mut email = email();
    email
        .use_client(
            ClientRef::instance(MailClient::with_settings(settings(
                json!({ "delivery_method": "test" }),
            ))),
            None,
        )
        .unwrap();
    email.deliver(Some(json!("john@example.com"))).unwrap();
    assert_eq!(email.to(), ["john@example.com"]);
}

#[cfg(feature = "file-transport")]
#[test]
fn file_method_writes_eml_files() {
    use std::fs;

    let dir = std::env::temp_dir().join(format!("outbox-file-transport-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);

    let client = MailClient::with_settings(settings(json!({
        "delivery_method": "file",
        "file_settings": { "location": dir.to_str().unwrap() },
    })));
    client.deliver(&email()).unwrap();

    let files: Vec<_> = fs::read_dir(&dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.extension().map_or(false, |ext| ext == "eml"))
        .collect();
    assert_eq!(files.len(), 1);
    let contents = fs::read_to_string(&files[0]).unwrap();
    assert!(contents.contains("Subject: Order shipped"));
    assert!(contents.contains("To: bob@example.com"));

    fs::remove_dir_all(&dir).unwrap();
}
