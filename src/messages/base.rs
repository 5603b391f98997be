use super::{ChannelMessage, FromType, MessageCore};
use crate::MessageType;

/// A message backed entirely by its field map
///
/// Types created with [`MessageType::new`] build `Base` messages. Every field
/// the type declares is stored in the raw field map; `set_body` works when the
/// type declares a writable `body` field.
#[derive(Debug, Clone)]
pub struct Base {
    core: MessageCore,
}

impl Base {
    /// Creates a message of `message_type`
    pub fn new(message_type: MessageType) -> Base {
        Base {
            core: MessageCore::new(message_type),
        }
    }
}

impl FromType for Base {
    fn from_type(message_type: MessageType) -> Self {
        Base::new(message_type)
    }
}

impl ChannelMessage for Base {
    fn core(&self) -> &MessageCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut MessageCore {
        &mut self.core
    }
}
