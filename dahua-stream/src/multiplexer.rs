//! Single-threaded multiplexing of many connection handles
//!
//! All handles are polled from one task. A handle is removed automatically
//! once it has produced its terminal event.

use std::time::Duration;

use bytes::Bytes;
use futures::{FutureExt, StreamExt};
use tokio_stream::StreamMap;

use crate::device::DeviceId;
use crate::transport::{HandleStream, TransportEvent, TransportFailure};

/// Upper bound on events collected by a single poll
pub const MAX_EVENTS_PER_POLL: usize = 256;

/// Everything observed during one poll, grouped by kind
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PollReport {
    /// Bytes received, in arrival order
    pub received: Vec<(DeviceId, Bytes)>,
    /// Handles the server ended normally
    pub completed: Vec<DeviceId>,
    /// Handles that failed
    pub failed: Vec<(DeviceId, TransportFailure)>,
}

impl PollReport {
    pub fn is_empty(&self) -> bool {
        self.received.is_empty() && self.completed.is_empty() && self.failed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.received.len() + self.completed.len() + self.failed.len()
    }

    fn record(&mut self, id: DeviceId, event: TransportEvent) {
        match event {
            TransportEvent::Data(bytes) => self.received.push((id, bytes)),
            TransportEvent::Completed => self.completed.push(id),
            TransportEvent::Failed(failure) => self.failed.push((id, failure)),
        }
    }
}

/// The set of in-flight handles, keyed by device
#[derive(Default)]
pub struct Multiplexer {
    handles: StreamMap<DeviceId, HandleStream>,
}

impl Multiplexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handle for `id`, dropping any handle it replaces
    pub fn add_handle(&mut self, id: DeviceId, handle: HandleStream) {
        if self.handles.insert(id, handle).is_some() {
            tracing::debug!("Replaced live handle for {}", id);
        }
    }

    /// Detach and drop the handle for `id`. Returns whether one was present.
    pub fn remove_handle(&mut self, id: DeviceId) -> bool {
        self.handles.remove(&id).is_some()
    }

    pub fn contains(&self, id: DeviceId) -> bool {
        self.handles.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait up to `timeout` for activity and collect whatever is ready.
    ///
    /// Returns an empty report on timeout or when no handles are registered.
    pub async fn poll(&mut self, timeout: Duration) -> PollReport {
        let mut report = PollReport::default();
        if self.handles.is_empty() {
            return report;
        }

        match tokio::time::timeout(timeout, self.handles.next()).await {
            Ok(Some((id, event))) => report.record(id, event),
            Ok(None) | Err(_) => return report,
        }

        while report.len() < MAX_EVENTS_PER_POLL {
            match self.handles.next().now_or_never() {
                Some(Some((id, event))) => report.record(id, event),
                _ => break,
            }
        }

        report
    }
}

impl std::fmt::Debug for Multiplexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Multiplexer")
            .field("handles", &self.handles.keys().collect::<Vec<_>>())
            .finish()
    }
}
