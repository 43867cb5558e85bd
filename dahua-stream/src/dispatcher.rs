//! Event publication
//!
//! Every parsed record is published to an [`EventBus`] under the fixed
//! event type [`EVENT_NAME`], one publication per record, in stream order.

use std::sync::mpsc;

use dahua_parser::EventRecord;

/// Event type every record is published under
pub const EVENT_NAME: &str = "dahua_event_received";

/// Destination for parsed events
pub trait EventBus: Send {
    fn fire(&self, event_type: &str, record: &EventRecord);
}

impl<F> EventBus for F
where
    F: Fn(&str, &EventRecord) + Send,
{
    fn fire(&self, event_type: &str, record: &EventRecord) {
        self(event_type, record)
    }
}

/// A published event as delivered through a [`ChannelBus`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusEvent {
    pub event_type: String,
    pub record: EventRecord,
}

/// [`EventBus`] forwarding into a std channel
#[derive(Debug, Clone)]
pub struct ChannelBus {
    sender: mpsc::Sender<BusEvent>,
}

impl ChannelBus {
    pub fn new(sender: mpsc::Sender<BusEvent>) -> Self {
        Self { sender }
    }

    /// Create a bus together with the receiving end
    pub fn channel() -> (Self, mpsc::Receiver<BusEvent>) {
        let (sender, receiver) = mpsc::channel();
        (Self::new(sender), receiver)
    }
}

impl EventBus for ChannelBus {
    fn fire(&self, event_type: &str, record: &EventRecord) {
        let event = BusEvent {
            event_type: event_type.to_string(),
            record: record.clone(),
        };
        if self.sender.send(event).is_err() {
            tracing::debug!("Event receiver dropped, discarding event from {}", record.device_name);
        }
    }
}

/// Publishes records to the bus
#[derive(Debug)]
pub struct Dispatcher<B> {
    bus: B,
}

impl<B: EventBus> Dispatcher<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Publish each record in order and return how many were published
    pub fn dispatch(&self, records: &[EventRecord]) -> usize {
        for record in records {
            tracing::debug!(
                "Publishing {} from {} ({})",
                record.code().unwrap_or("<no code>"),
                record.device_name,
                record.action().unwrap_or("-")
            );
            self.bus.fire(EVENT_NAME, record);
        }
        records.len()
    }
}
