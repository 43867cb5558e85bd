//! In-memory connector for tests
//!
//! [`ScriptedConnector`] hands out channel-backed handles and lets a test
//! push events into the most recent handle for a host. Clones share state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::{Connector, FailureKind, HandleStream, TransportEvent, TransportFailure};
use crate::device::ConnectionTarget;

#[derive(Debug, Default)]
struct ScriptState {
    senders: HashMap<String, mpsc::UnboundedSender<TransportEvent>>,
    connects: Vec<String>,
}

/// A [`Connector`] driven by the test instead of the network
#[derive(Debug, Clone, Default)]
pub struct ScriptedConnector {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Deliver an event on the latest handle for `host`.
    ///
    /// Returns false if there is no live handle to receive it.
    pub fn send(&self, host: &str, event: TransportEvent) -> bool {
        match self.lock().senders.get(host) {
            Some(sender) => sender.send(event).is_ok(),
            None => false,
        }
    }

    pub fn send_data(&self, host: &str, data: impl Into<Bytes>) -> bool {
        self.send(host, TransportEvent::Data(data.into()))
    }

    /// Send the status line a device opens its stream with
    pub fn accept(&self, host: &str) -> bool {
        self.send_data(host, "HTTP/1.1 200 OK\r\n")
    }

    /// End the latest handle for `host` normally
    pub fn complete(&self, host: &str) -> bool {
        let sent = self.send(host, TransportEvent::Completed);
        self.lock().senders.remove(host);
        sent
    }

    /// End the latest handle for `host` with a failure
    pub fn fail(&self, host: &str, kind: FailureKind, message: &str) -> bool {
        let sent = self.send(
            host,
            TransportEvent::Failed(TransportFailure::new(kind, message)),
        );
        self.lock().senders.remove(host);
        sent
    }

    /// How many handles have been opened for `host`
    pub fn connect_count(&self, host: &str) -> usize {
        self.lock().connects.iter().filter(|h| *h == host).count()
    }
}

impl Connector for ScriptedConnector {
    fn connect(&self, target: &ConnectionTarget) -> HandleStream {
        let (sender, receiver) = mpsc::unbounded_channel();
        let host = target.host().to_string();

        let mut state = self.lock();
        state.connects.push(host.clone());
        state.senders.insert(host, sender);

        UnboundedReceiverStream::new(receiver).boxed()
    }
}
