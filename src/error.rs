use std::{
    error::Error as StdError,
    fmt::{self, Display, Formatter},
};

pub(crate) type BoxError = Box<dyn StdError + Send + Sync>;

/// Error type for message composition and delivery
#[derive(Debug)]
pub enum Error {
    /// A required field is absent or empty
    MissingRequiredField(String),
    /// A base operation was invoked without a concrete implementation
    Unimplemented(&'static str),
    /// A client alias is not registered on the message type
    UnknownClientAlias(String),
    /// Default client settings were configured before any default client
    MissingDefaultClient,
    /// The message has no client to deliver through
    MissingClient,
    /// No reader or writer is installed for this field
    UnknownField(String),
    /// No channel with this name is registered on the composite message
    UnknownChannel(String),
    /// A field value was rejected while building the outgoing message
    InvalidField {
        /// Name of the offending field
        name: String,
        /// Underlying parse or build error
        source: BoxError,
    },
    /// The client cannot deliver this kind of message
    UnsupportedMessage(String),
    /// The configured delivery method is unknown or not compiled in
    UnknownDeliveryMethod(String),
    /// Client settings could not be decoded
    InvalidSettings(serde_json::Error),
    /// Error raised by the client while delivering
    Client(BoxError),
}

impl Error {
    pub(crate) fn invalid_field<E>(name: &str, source: E) -> Error
    where
        E: Into<BoxError>,
    {
        Error::InvalidField {
            name: name.to_owned(),
            source: source.into(),
        }
    }

    pub(crate) fn client<E>(source: E) -> Error
    where
        E: StdError + Send + Sync + 'static,
    {
        Error::Client(Box::new(source))
    }
}

impl Display for Error {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Error::MissingRequiredField(name) => write!(fmt, "Missing required field: {name}"),
            Error::Unimplemented(operation) => {
                write!(fmt, "{operation} must be implemented by the message or client type")
            }
            Error::UnknownClientAlias(name) => write!(fmt, "no client registered as `{name}`"),
            Error::MissingDefaultClient => {
                fmt.write_str("default client must be set before setting settings")
            }
            Error::MissingClient => fmt.write_str("message has no client to deliver through"),
            Error::UnknownField(name) => write!(fmt, "no accessor for field `{name}`"),
            Error::UnknownChannel(name) => write!(fmt, "no channel registered as `{name}`"),
            Error::InvalidField { name, source } => write!(fmt, "invalid `{name}` field: {source}"),
            Error::UnsupportedMessage(kind) => write!(fmt, "client cannot deliver {kind} messages"),
            Error::UnknownDeliveryMethod(method) => {
                write!(fmt, "unknown delivery method `{method}`")
            }
            Error::InvalidSettings(err) => write!(fmt, "invalid client settings: {err}"),
            Error::Client(err) => err.fmt(fmt),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::InvalidField { source, .. } => Some(&**source),
            Error::InvalidSettings(err) => Some(err),
            Error::Client(err) => Some(&**err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::InvalidSettings(err)
    }
}
