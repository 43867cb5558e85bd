//! Blocking access to published events
//!
//! The worker owns the only sender. Once it exits and the queue is drained,
//! every receive returns `None` and [`EventManagerIterator::worker_exited`]
//! turns true, which is how a consumer tells "quiet device" from "shut down".

use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dahua_stream::{BusEvent, EventRecord};

/// How long a receive may wait
#[derive(Debug, Clone, Copy)]
enum Wait {
    Forever,
    Never,
    Up(Duration),
}

/// Blocking iterator over `dahua_event_received` events
///
/// `next()` blocks until an event arrives and returns `None` once the worker
/// has exited.
pub struct EventManagerIterator {
    rx: Arc<Mutex<Receiver<BusEvent>>>,
    worker_exited: bool,
}

impl EventManagerIterator {
    pub(crate) fn new(rx: Arc<Mutex<Receiver<BusEvent>>>) -> Self {
        Self {
            rx,
            worker_exited: false,
        }
    }

    /// Block until an event is available. `None` once the worker has exited.
    pub fn recv(&mut self) -> Option<BusEvent> {
        self.take(Wait::Forever)
    }

    /// Take an event if one is queued
    pub fn try_recv(&mut self) -> Option<BusEvent> {
        self.take(Wait::Never)
    }

    /// Block until an event is available or `timeout` expires
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<BusEvent> {
        self.take(Wait::Up(timeout))
    }

    /// Whether the worker has exited and every queued event has been taken
    pub fn worker_exited(&self) -> bool {
        self.worker_exited
    }

    /// Non-blocking iterator over the events queued right now
    pub fn try_iter(&mut self) -> TryIterator<'_> {
        TryIterator { inner: self }
    }

    /// Blocking iterator that ends at the first wait longer than `timeout`
    pub fn timeout_iter(&mut self, timeout: Duration) -> TimeoutIterator<'_> {
        TimeoutIterator {
            inner: self,
            timeout,
        }
    }

    /// Just the records, for consumers that ignore the event name
    pub fn records(self) -> impl Iterator<Item = EventRecord> {
        self.map(|event| event.record)
    }

    fn take(&mut self, wait: Wait) -> Option<BusEvent> {
        if self.worker_exited {
            return None;
        }

        // A poisoned lock means another consumer panicked mid-receive;
        // treat the stream as over
        let Ok(rx) = self.rx.lock() else {
            self.worker_exited = true;
            return None;
        };

        let closed = match wait {
            Wait::Forever => match rx.recv() {
                Ok(event) => return Some(event),
                Err(_) => true,
            },
            Wait::Never => match rx.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Empty) => false,
                Err(TryRecvError::Disconnected) => true,
            },
            Wait::Up(timeout) => match rx.recv_timeout(timeout) {
                Ok(event) => return Some(event),
                Err(RecvTimeoutError::Timeout) => false,
                Err(RecvTimeoutError::Disconnected) => true,
            },
        };

        if closed {
            tracing::debug!("Event worker has exited, no more events");
            self.worker_exited = true;
        }
        None
    }
}

impl Iterator for EventManagerIterator {
    type Item = BusEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}

/// Non-blocking iterator over queued events
pub struct TryIterator<'a> {
    inner: &'a mut EventManagerIterator,
}

impl Iterator for TryIterator<'_> {
    type Item = BusEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.try_recv()
    }
}

/// Blocking iterator with a per-event timeout
pub struct TimeoutIterator<'a> {
    inner: &'a mut EventManagerIterator,
    timeout: Duration,
}

impl Iterator for TimeoutIterator<'_> {
    type Item = BusEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.recv_timeout(self.timeout)
    }
}
