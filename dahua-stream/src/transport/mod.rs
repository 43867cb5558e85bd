//! Connection transport
//!
//! A [`Connector`] turns a [`ConnectionTarget`] into a stream of
//! [`TransportEvent`]s. The stream is the connection handle: dropping it
//! closes the connection, and it ends after its terminal `Completed` or
//! `Failed` event. The multiplexer drives all of them from a single task.

pub mod digest;
pub mod http;

#[cfg(any(test, feature = "test-support"))]
pub mod scripted;

use std::fmt;

use bytes::Bytes;
use futures::stream::BoxStream;

use crate::device::ConnectionTarget;

pub use self::http::HttpConnector;

/// Something observed on a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Bytes received, in order
    Data(Bytes),
    /// The server ended the stream normally
    Completed,
    /// The connection failed; no further events follow
    Failed(TransportFailure),
}

/// Classification of a connection failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// TCP or TLS connection could not be established
    Connect,
    /// Connecting timed out
    Timeout,
    /// The device answered with a non-success status
    Status(u16),
    /// The authentication challenge could not be answered
    Auth,
    /// The response body broke off
    Body,
    /// Anything else reported by the HTTP stack
    Request,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Connect => write!(f, "connect"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Status(code) => write!(f, "HTTP {}", code),
            FailureKind::Auth => write!(f, "auth"),
            FailureKind::Body => write!(f, "body"),
            FailureKind::Request => write!(f, "request"),
        }
    }
}

/// A failed connection with its error message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl TransportFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Renders as `<message> (<kind>)`, the disconnect reason format
impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

/// An open (or opening) connection
pub type HandleStream = BoxStream<'static, TransportEvent>;

/// Opens long-poll connections
pub trait Connector: Send {
    /// Start a connection to `target`.
    ///
    /// Must not block: connecting happens when the returned stream is polled.
    fn connect(&self, target: &ConnectionTarget) -> HandleStream;
}
