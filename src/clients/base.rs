use super::{Client, FromSettings};
use crate::{messages::ChannelMessage, Error, Settings};

/// A client that only holds settings
///
/// Useful as a placeholder default client, or to configure settings before the
/// real client is chosen. Delivering through it fails with
/// [`Error::Unimplemented`].
#[derive(Debug, Clone, Default)]
pub struct Base {
    settings: Settings,
}

impl Base {
    /// Creates a client with `settings`
    pub fn new(settings: Settings) -> Base {
        Base { settings }
    }
}

impl FromSettings for Base {
    fn from_settings(settings: Settings) -> Self {
        Base::new(settings)
    }
}

impl Client for Base {
    fn settings(&self) -> &Settings {
        &self.settings
    }

    fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    fn deliver(&self, _message: &dyn ChannelMessage) -> Result<(), Error> {
        Err(Error::Unimplemented("deliver"))
    }
}
