//! # Dahua Event Manager
//!
//! A sync-first facade over `dahua-stream`: one background worker thread
//! keeps a long-poll connection open to every configured device, reconnects
//! after drops, and publishes each event line as a `dahua_event_received`
//! event.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use dahua_event_manager::prelude::*;
//!
//! let config = WatcherConfig::from_yaml_str(r#"
//! - host: 192.168.1.108
//!   password: secret
//!   channels:
//!     - number: 1
//!       name: Front Door
//! "#)?;
//!
//! let mut manager = DahuaEventManager::new(config)?;
//! manager.start()?;
//!
//! for event in manager.iter().timeout_iter(Duration::from_secs(30)) {
//!     println!("{:?}", event.record.payload());
//! }
//!
//! manager.stop();
//! manager.join()?;
//! # Ok::<(), EventManagerError>(())
//! ```
//!
//! ## Architecture
//!
//! 1. **Start**: the manager validates the configuration, builds the
//!    supervisor and hands it to a worker thread with its own runtime
//! 2. **Worker loop**: sleep, poll every connection, parse and publish,
//!    re-arm devices whose reconnect delay has passed
//! 3. **Stop**: a cancellation token checked once per iteration

pub mod error;
pub mod iter;
pub mod logging;
pub mod manager;
pub mod worker;

// Re-export main types for convenience
pub use error::{EventManagerError, Result};
pub use iter::EventManagerIterator;
pub use manager::DahuaEventManager;

// Re-export commonly used types from dependencies
pub use dahua_stream::{
    BusEvent, ChannelConfig, DeviceConfig, EventRecord, WatcherConfig, WatcherSettings, EVENT_NAME,
};

/// Prelude module for convenient imports
///
/// ```rust
/// use dahua_event_manager::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        BusEvent, DahuaEventManager, DeviceConfig, EventManagerError, EventManagerIterator,
        EventRecord, Result, WatcherConfig, WatcherSettings,
    };
}
