//! Device records and connection targets
//!
//! A [`Device`] is created once from configuration and lives as long as the
//! supervisor. Its connection handle comes and goes with every reconnect;
//! the record itself only tracks what the supervisor needs to decide when to
//! re-arm it.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;
use url::Url;

use dahua_parser::{ChannelMap, LineAssembler};

use crate::config::DeviceConfig;
use crate::error::ConfigError;

/// Position of a device in the supervisor's collection, also its handle key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(usize);

impl DeviceId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device-{}", self.0)
    }
}

/// Username and password for Digest authentication
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything needed to issue the long-poll request for a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    pub url: Url,
    pub credentials: Credentials,
}

impl ConnectionTarget {
    pub fn new(url: Url, credentials: Credentials) -> Self {
        Self { url, credentials }
    }

    /// Host part of the URL, empty if there is none
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// Path and query as sent on the request line, used as the Digest `uri`
    pub fn request_uri(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{}", self.url.path(), query),
            None => self.url.path().to_string(),
        }
    }
}

/// Whether the device's stream is currently attached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// One monitored device
#[derive(Debug)]
pub struct Device {
    id: DeviceId,
    name: String,
    target: ConnectionTarget,
    channels: ChannelMap,
    state: ConnectionState,
    reconnect_deadline: Option<Instant>,
    lines: LineAssembler,
}

impl Device {
    pub fn new(
        id: DeviceId,
        name: impl Into<String>,
        target: ConnectionTarget,
        channels: ChannelMap,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            target,
            channels,
            state: ConnectionState::Disconnected,
            reconnect_deadline: None,
            lines: LineAssembler::new(),
        }
    }

    /// Build a device from its configuration. The URL is built here, once.
    pub fn from_config(id: DeviceId, config: &DeviceConfig) -> Result<Self, ConfigError> {
        let target = ConnectionTarget::new(
            config.event_url()?,
            Credentials::new(config.user.clone(), config.password.clone()),
        );
        Ok(Self::new(
            id,
            config.display_name(),
            target,
            config.channel_map(),
        ))
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &ConnectionTarget {
        &self.target
    }

    pub fn channels(&self) -> &ChannelMap {
        &self.channels
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn reconnect_deadline(&self) -> Option<Instant> {
        self.reconnect_deadline
    }

    /// Record a success status line. Returns true on an actual transition.
    ///
    /// Ignored while a reconnect is pending: a device is never connected
    /// with a deadline outstanding.
    pub(crate) fn mark_connected(&mut self) -> bool {
        if self.reconnect_deadline.is_some() || self.is_connected() {
            return false;
        }
        self.state = ConnectionState::Connected;
        true
    }

    /// Mark the device disconnected and schedule a retry at `now + delay`.
    ///
    /// Returns false, changing nothing, when a retry is already scheduled.
    pub(crate) fn schedule_reconnect(&mut self, now: Instant, delay: Duration) -> bool {
        if self.reconnect_deadline.is_some() {
            return false;
        }
        self.state = ConnectionState::Disconnected;
        self.reconnect_deadline = Some(now + delay);
        true
    }

    pub(crate) fn is_due(&self, now: Instant) -> bool {
        self.reconnect_deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Clear the deadline once the handle has been re-armed
    pub(crate) fn rearmed(&mut self) {
        self.reconnect_deadline = None;
        self.lines.clear();
    }

    /// Feed received bytes through the line buffer
    pub(crate) fn assemble(&mut self, chunk: &[u8]) -> Option<Bytes> {
        self.lines.push(chunk)
    }

    /// Release a trailing unterminated line once the stream has ended
    pub(crate) fn flush_lines(&mut self) -> Option<Bytes> {
        self.lines.finish()
    }
}
