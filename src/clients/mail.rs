//! Delivers [`Email`] messages through the `lettre` transports
//!
//! The transport is chosen by the `delivery_method` setting and configured
//! from a nested settings map:
//!
//! | `delivery_method` | transport                 | settings          |
//! |-------------------|---------------------------|-------------------|
//! | `smtp` (default)  | `lettre::SmtpTransport`    | [`SmtpSettings`]  |
//! | `sendmail`        | `lettre::SendmailTransport`| [`SendmailSettings`] |
//! | `file`            | `lettre::FileTransport`    | [`FileSettings`]  |
//! | `test`            | stub, accepts and drops   | none              |
//!
//! `sendmail` and `file` need the `sendmail-transport` and `file-transport`
//! features.
//!
//! ```rust
//! use outbox::clients::{FromSettings, MailClient};
//! use serde_json::json;
//!
//! let client = MailClient::with_settings(
//!     json!({
//!         "delivery_method": "sendmail",
//!         "sendmail_settings": { "location": "/usr/bin/sendmail" }
//!     })
//!     .as_object()
//!     .cloned()
//!     .unwrap(),
//! );
//! assert_eq!(client.delivery_method(), "sendmail");
//! assert_eq!(
//!     client.delivery_method_settings().get("location"),
//!     Some(&json!("/usr/bin/sendmail"))
//! );
//! ```

use std::error::Error as StdError;

use lettre::{
    transport::{
        smtp::{
            authentication::Credentials,
            client::{Tls, TlsParameters},
        },
        stub::StubTransport,
    },
    Message, SmtpTransport, Transport,
};
use serde::{de::DeserializeOwned, Deserialize};

use super::{Client, FromSettings};
use crate::{
    messages::{ChannelMessage, Email},
    Error, Settings, Value,
};

const DEFAULT_DELIVERY_METHOD: &str = "smtp";

/// SMTP relay configuration, decoded from `smtp_settings`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SmtpSettings {
    /// Relay host name
    pub address: String,
    /// Relay port, the transport default when unset
    pub port: Option<u16>,
    /// Login user name
    pub user_name: Option<String>,
    /// Login password
    pub password: Option<String>,
    /// Connect with implicit TLS
    pub tls: bool,
    /// Upgrade with `STARTTLS` when the relay offers it
    pub enable_starttls_auto: bool,
}

impl Default for SmtpSettings {
    fn default() -> Self {
        SmtpSettings {
            address: "localhost".to_owned(),
            port: None,
            user_name: None,
            password: None,
            tls: false,
            enable_starttls_auto: true,
        }
    }
}

impl SmtpSettings {
    fn credentials(&self) -> Option<Credentials> {
        self.user_name.as_ref().map(|user_name| {
            Credentials::new(user_name.clone(), self.password.clone().unwrap_or_default())
        })
    }

    fn transport(&self) -> Result<SmtpTransport, Error> {
        let mut builder = if self.tls {
            SmtpTransport::relay(&self.address).map_err(Error::client)?
        } else if self.enable_starttls_auto {
            let parameters = TlsParameters::new(self.address.clone()).map_err(Error::client)?;
            SmtpTransport::builder_dangerous(&self.address).tls(Tls::Opportunistic(parameters))
        } else {
            SmtpTransport::builder_dangerous(&self.address)
        };
        if let Some(port) = self.port {
            builder = builder.port(port);
        }
        if let Some(credentials) = self.credentials() {
            builder = builder.credentials(credentials);
        }
        Ok(builder.build())
    }
}

/// `sendmail` configuration, decoded from `sendmail_settings`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SendmailSettings {
    /// Path of the `sendmail` binary
    pub location: String,
}

impl Default for SendmailSettings {
    fn default() -> Self {
        SendmailSettings {
            location: "/usr/sbin/sendmail".to_owned(),
        }
    }
}

/// File transport configuration, decoded from `file_settings`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FileSettings {
    /// Directory the `.eml` files are written to
    pub location: String,
}

impl Default for FileSettings {
    fn default() -> Self {
        FileSettings {
            location: "mails".to_owned(),
        }
    }
}

/// Client delivering emails through a `lettre` transport
#[derive(Debug, Clone)]
pub struct MailClient {
    settings: Settings,
}

impl MailClient {
    /// Creates a client with exactly `settings`, see
    /// [`with_settings`](FromSettings::with_settings) to start from the
    /// defaults
    pub fn new(settings: Settings) -> MailClient {
        MailClient { settings }
    }

    /// The configured delivery method, `smtp` unless set
    pub fn delivery_method(&self) -> &str {
        self.settings
            .get("delivery_method")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_DELIVERY_METHOD)
    }

    /// Settings for the delivery method: `delivery_method_settings` if set,
    /// then `<delivery_method>_settings`, else empty
    pub fn delivery_method_settings(&self) -> Settings {
        let conventional = format!("{}_settings", self.delivery_method());
        self.settings
            .get("delivery_method_settings")
            .and_then(Value::as_object)
            .or_else(|| self.settings.get(&conventional).and_then(Value::as_object))
            .cloned()
            .unwrap_or_default()
    }

    /// Decodes [`delivery_method_settings`](MailClient::delivery_method_settings)
    /// into a typed configuration
    pub fn decode_settings<T: DeserializeOwned>(&self) -> Result<T, Error> {
        Ok(serde_json::from_value(Value::Object(
            self.delivery_method_settings(),
        ))?)
    }

    fn send(&self, message: &Message) -> Result<(), Error> {
        let method = self.delivery_method();

        #[cfg(feature = "tracing")]
        tracing::debug!(delivery_method = method, "sending email");

        match method {
            "smtp" => {
                let settings: SmtpSettings = self.decode_settings()?;
                send_with(&settings.transport()?, message)
            }
            #[cfg(feature = "sendmail-transport")]
            "sendmail" => {
                let settings: SendmailSettings = self.decode_settings()?;
                send_with(
                    &lettre::SendmailTransport::new_with_command(settings.location),
                    message,
                )
            }
            #[cfg(feature = "file-transport")]
            "file" => {
                let settings: FileSettings = self.decode_settings()?;
                std::fs::create_dir_all(&settings.location).map_err(Error::client)?;
                send_with(&lettre::FileTransport::new(settings.location), message)
            }
            "test" => send_with(&StubTransport::new_ok(), message),
            other => Err(Error::UnknownDeliveryMethod(other.to_owned())),
        }
    }
}

impl Default for MailClient {
    fn default() -> Self {
        MailClient::with_settings(Settings::new())
    }
}

impl FromSettings for MailClient {
    fn defaults() -> Settings {
        let mut defaults = Settings::new();
        defaults.insert(
            "delivery_method".to_owned(),
            Value::from(DEFAULT_DELIVERY_METHOD),
        );
        defaults
    }

    fn from_settings(settings: Settings) -> Self {
        MailClient::new(settings)
    }
}

impl Client for MailClient {
    fn settings(&self) -> &Settings {
        &self.settings
    }

    fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    fn deliver(&self, message: &dyn ChannelMessage) -> Result<(), Error> {
        let email = message
            .downcast_ref::<Email>()
            .ok_or_else(|| Error::UnsupportedMessage(message.message_type().name().to_owned()))?;
        self.send(&email.message_object()?)
    }
}

fn send_with<T>(transport: &T, message: &Message) -> Result<(), Error>
where
    T: Transport,
    T::Error: StdError + Send + Sync + 'static,
{
    transport.send(message).map(drop).map_err(Error::client)
}
