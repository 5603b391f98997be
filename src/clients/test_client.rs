//! The test client records delivered messages instead of sending them. It
//! mirrors the stub transport of a mail library: every message handed to it
//! ends up in a [`DeliveryLog`] that tests can inspect.

use std::sync::{Arc, Mutex, OnceLock};

use super::{Client, FromSettings};
use crate::{lock, messages::ChannelMessage, Error, MessageType, Settings, Value};

static SHARED: OnceLock<DeliveryLog> = OnceLock::new();

/// Ordered record of delivered messages
///
/// Test clients record into one process-wide log unless built with
/// [`TestClient::with_log`], so a type configured on one thread and delivered
/// from another is observed everywhere. Tests running in parallel should
/// either filter the shared log by message type or hand each client its own
/// log.
#[derive(Debug, Clone, Default)]
pub struct DeliveryLog(Arc<Mutex<Vec<Delivery>>>);

impl DeliveryLog {
    /// Creates an empty log
    pub fn new() -> DeliveryLog {
        DeliveryLog::default()
    }

    /// The process-wide log
    pub fn shared() -> DeliveryLog {
        SHARED.get_or_init(DeliveryLog::new).clone()
    }

    /// Appends a snapshot of `message`
    pub fn record(&self, message: &dyn ChannelMessage) {
        lock::lock(&self.0).push(Delivery {
            message: Arc::from(message.clone_box()),
        });
    }

    /// Every recorded delivery, oldest first
    pub fn deliveries(&self) -> Vec<Delivery> {
        lock::lock(&self.0).clone()
    }

    /// The latest delivery
    pub fn last(&self) -> Option<Delivery> {
        lock::lock(&self.0).last().cloned()
    }

    /// Number of recorded deliveries
    pub fn len(&self) -> usize {
        lock::lock(&self.0).len()
    }

    /// Whether nothing was delivered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forgets every recorded delivery
    pub fn clear(&self) {
        lock::lock(&self.0).clear();
    }
}

/// A delivered message, frozen at delivery time
#[derive(Debug, Clone)]
pub struct Delivery {
    message: Arc<dyn ChannelMessage>,
}

impl Delivery {
    /// The message as it was delivered
    pub fn message(&self) -> &dyn ChannelMessage {
        &*self.message
    }

    /// Type of the delivered message
    pub fn message_type(&self) -> &MessageType {
        self.message.message_type()
    }

    /// Downcasts to the concrete message type
    pub fn downcast_ref<T: ChannelMessage>(&self) -> Option<&T> {
        self.message().downcast_ref()
    }

    /// Value of a readable field, `None` when unset or unknown
    pub fn field(&self, name: &str) -> Option<Value> {
        self.message.field(name).ok().flatten()
    }
}

/// Client that records messages instead of delivering them
///
/// ```rust
/// use outbox::{clients::TestClient, ChannelMessage, MessageType};
/// use serde_json::json;
///
/// # fn main() -> Result<(), outbox::Error> {
/// let notice = MessageType::new("notice");
/// notice.declare_field("to", Default::default());
/// notice.use_test_client()?;
///
/// TestClient::clear_deliveries();
/// notice.instantiate().deliver(Some(json!("Bob")))?;
/// assert_eq!(TestClient::deliveries().len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TestClient {
    settings: Settings,
    log: DeliveryLog,
}

impl TestClient {
    /// Creates a client recording into the process-wide log
    pub fn new(settings: Settings) -> TestClient {
        TestClient::with_log(settings, DeliveryLog::shared())
    }

    /// Creates a client recording into `log`
    pub fn with_log(settings: Settings, log: DeliveryLog) -> TestClient {
        TestClient { settings, log }
    }

    /// The log this client records into
    pub fn log(&self) -> &DeliveryLog {
        &self.log
    }

    /// Deliveries recorded on the process-wide log
    pub fn deliveries() -> Vec<Delivery> {
        DeliveryLog::shared().deliveries()
    }

    /// Clears the process-wide log
    pub fn clear_deliveries() {
        DeliveryLog::shared().clear();
    }
}

impl Default for TestClient {
    fn default() -> Self {
        TestClient::new(Settings::new())
    }
}

impl FromSettings for TestClient {
    fn from_settings(settings: Settings) -> Self {
        TestClient::new(settings)
    }
}

impl Client for TestClient {
    fn settings(&self) -> &Settings {
        &self.settings
    }

    fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    fn deliver(&self, message: &dyn ChannelMessage) -> Result<(), Error> {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            message_type = message.message_type().name(),
            "recording delivery"
        );
        self.log.record(message);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::thread;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::{DeliveryLog, TestClient};
    use crate::{ChannelMessage, FieldOptions, MessageType, Settings};

    fn notice() -> MessageType {
        let ty = MessageType::new("notice");
        ty.declare_fields(["to", "body"], FieldOptions::new());
        ty
    }

    #[test]
    fn records_snapshots() {
        let log = DeliveryLog::new();
        let ty = notice();
        ty.install_default_client(TestClient::with_log(Settings::new(), log.clone()));

        let mut message = ty.instantiate();
        message.assign("body", json!("first")).unwrap();
        message.deliver(Some(json!("Bob"))).unwrap();
        message.assign("body", json!("second")).unwrap();
        message.deliver(None).unwrap();

        let deliveries = log.deliveries();
        assert_eq!(deliveries.len(), 2);
        assert_eq!(deliveries[0].field("body"), Some(json!("first")));
        assert_eq!(deliveries[1].field("body"), Some(json!("second")));
        assert_eq!(log.last().unwrap().field("to"), Some(json!("Bob")));
        assert_eq!(deliveries[0].message_type(), &ty);

        log.clear();
        assert!(log.is_empty());
    }

    fn count_of(ty: &MessageType) -> usize {
        TestClient::deliveries()
            .iter()
            .filter(|delivery| delivery.message_type() == ty)
            .count()
    }

    #[test]
    fn default_log_is_shared_across_threads() {
        let ty = notice();
        ty.use_test_client().unwrap();

        let worker = {
            let ty = ty.clone();
            thread::spawn(move || {
                ty.instantiate().deliver(Some(json!("Bob"))).unwrap();
                count_of(&ty)
            })
        };
        assert_eq!(worker.join().unwrap(), 1);
        assert_eq!(count_of(&ty), 1);
    }
}
