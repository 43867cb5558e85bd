//! # dahua-stream
//!
//! The connection engine for Dahua event streams: one long-poll HTTP
//! connection per device, all driven from a single task, with a fixed-delay
//! reconnect after every disconnect.
//!
//! The pieces, leaves first:
//!
//! - [`Device`]: one monitored endpoint and its connection state
//! - [`Connector`]: opens a connection and returns it as a stream of
//!   [`TransportEvent`]s ([`HttpConnector`] for real devices)
//! - [`Multiplexer`]: polls every open connection at once and returns a
//!   [`PollReport`]
//! - [`Supervisor`]: parses what was received, publishes records through the
//!   [`Dispatcher`] and re-arms disconnected devices
//!
//! ## Example
//!
//! ```rust,no_run
//! use dahua_stream::{ChannelBus, DeviceConfig, HttpConnector, Supervisor, WatcherConfig};
//!
//! # async fn run() -> dahua_stream::Result<()> {
//! let config = WatcherConfig::default()
//!     .with_device(DeviceConfig::new("192.168.1.108").with_channel(1, "Front Door"));
//!
//! let connector = HttpConnector::new(&config.settings)?;
//! let (bus, events) = ChannelBus::channel();
//! let mut supervisor = Supervisor::from_config(&config, connector, bus)?;
//!
//! supervisor.arm_all();
//! loop {
//!     supervisor.run_once(config.settings.poll_timeout).await;
//!     for event in events.try_iter() {
//!         println!("{:?}", event.record.payload());
//!     }
//! }
//! # }
//! ```

pub mod config;
pub mod device;
pub mod dispatcher;
pub mod error;
pub mod multiplexer;
pub mod supervisor;
pub mod transport;

pub use config::{ChannelConfig, DeviceConfig, WatcherConfig, WatcherSettings, DEFAULT_EVENTS};
pub use device::{ConnectionState, ConnectionTarget, Credentials, Device, DeviceId};
pub use dispatcher::{BusEvent, ChannelBus, Dispatcher, EventBus, EVENT_NAME};
pub use error::{ConfigError, DigestError, Result, StreamError, TransportError};
pub use multiplexer::{Multiplexer, PollReport, MAX_EVENTS_PER_POLL};
pub use supervisor::{StepSummary, Supervisor};
pub use transport::{
    Connector, FailureKind, HandleStream, HttpConnector, TransportEvent, TransportFailure,
};

#[cfg(any(test, feature = "test-support"))]
pub use transport::scripted::ScriptedConnector;

// Re-export the parser so hosts need only one dependency
pub use dahua_parser;
pub use dahua_parser::EventRecord;
