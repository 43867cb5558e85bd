//! Configuration types for the dahua-stream crate
//!
//! [`DeviceConfig`] mirrors the per-device configuration record a host hands
//! over (with the same defaults), and [`WatcherSettings`] holds the timing
//! constants of the connection engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use dahua_parser::ChannelMap;

use crate::error::ConfigError;

/// Event codes requested when none are configured
pub const DEFAULT_EVENTS: &str = "VideoMotion,CrossLineDetection,AlarmLocal,VideoLoss,VideoBlind";

fn default_protocol() -> String {
    "http".to_string()
}

fn default_user() -> String {
    "admin".to_string()
}

fn default_password() -> String {
    "admin".to_string()
}

fn default_port() -> u16 {
    80
}

fn default_events() -> String {
    DEFAULT_EVENTS.to_string()
}

/// A labelled video input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub number: u32,
    pub name: String,
}

/// Configuration for one monitored device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Display name; derived from host and port when absent
    #[serde(default)]
    pub name: Option<String>,

    /// URL scheme
    /// Default: "http"
    #[serde(default = "default_protocol")]
    pub protocol: String,

    /// Default: "admin"
    #[serde(default = "default_user")]
    pub user: String,

    /// Default: "admin"
    #[serde(default = "default_password")]
    pub password: String,

    pub host: String,

    /// Default: 80
    #[serde(default = "default_port")]
    pub port: u16,

    /// Comma separated event codes to attach to
    /// Default: [`DEFAULT_EVENTS`]
    #[serde(default = "default_events")]
    pub events: String,

    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

impl DeviceConfig {
    /// Create a configuration for `host` with every other field defaulted
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            name: None,
            protocol: default_protocol(),
            user: default_user(),
            password: default_password(),
            host: host.into(),
            port: default_port(),
            events: default_events(),
            channels: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_events(mut self, events: impl Into<String>) -> Self {
        self.events = events.into();
        self
    }

    pub fn with_channel(mut self, number: u32, name: impl Into<String>) -> Self {
        self.channels.push(ChannelConfig {
            number,
            name: name.into(),
        });
        self
    }

    /// The configured name, or `host:port`
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{}:{}", self.host, self.port))
    }

    /// Build the long-poll URL for this device.
    ///
    /// The brackets around the code list are sent percent-encoded.
    pub fn event_url(&self) -> Result<Url, ConfigError> {
        let raw = format!(
            "{}://{}:{}/cgi-bin/eventManager.cgi?action=attach&channel=1&codes=%5B{}%5D",
            self.protocol, self.host, self.port, self.events
        );
        Url::parse(&raw).map_err(|source| ConfigError::InvalidUrl {
            host: self.host.clone(),
            source,
        })
    }

    /// Channel labels keyed by number; a repeated number keeps the last label
    pub fn channel_map(&self) -> ChannelMap {
        self.channels
            .iter()
            .map(|c| (c.number, c.name.clone()))
            .collect()
    }
}

/// Timing constants for the connection engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherSettings {
    /// Delay between a detected disconnect and the reconnect attempt
    /// Default: 5 seconds
    pub reconnect_delay: Duration,

    /// Longest a single multiplexer poll waits for I/O
    /// Default: 1 second
    pub poll_timeout: Duration,

    /// Pause between loop iterations
    /// Default: 50 milliseconds
    pub idle_sleep: Duration,

    /// TCP connect timeout for each long-poll request
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle time before the first TCP keepalive probe
    /// Default: 30 seconds
    pub keepalive_idle: Duration,

    /// Interval between TCP keepalive probes
    /// Default: 15 seconds
    pub keepalive_interval: Duration,
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(5),
            poll_timeout: Duration::from_secs(1),
            idle_sleep: Duration::from_millis(50),
            connect_timeout: Duration::from_secs(30),
            keepalive_idle: Duration::from_secs(30),
            keepalive_interval: Duration::from_secs(15),
        }
    }
}

impl WatcherSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the settings and return the first problem found
    pub fn validate(&self) -> Result<(), ConfigError> {
        let durations = [
            ("reconnect_delay", self.reconnect_delay),
            ("poll_timeout", self.poll_timeout),
            ("idle_sleep", self.idle_sleep),
            ("connect_timeout", self.connect_timeout),
            ("keepalive_idle", self.keepalive_idle),
            ("keepalive_interval", self.keepalive_interval),
        ];

        for (name, value) in durations {
            if value.is_zero() {
                return Err(ConfigError::InvalidSetting(format!(
                    "{name} must be greater than 0"
                )));
            }
        }

        Ok(())
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn with_idle_sleep(mut self, sleep: Duration) -> Self {
        self.idle_sleep = sleep;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_keepalive(mut self, idle: Duration, interval: Duration) -> Self {
        self.keepalive_idle = idle;
        self.keepalive_interval = interval;
        self
    }
}

/// Devices to watch plus engine settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatcherConfig {
    pub devices: Vec<DeviceConfig>,
    pub settings: WatcherSettings,
}

/// Accepted configuration document shapes
#[derive(Deserialize)]
#[serde(untagged)]
enum ConfigDocument {
    Devices(Vec<DeviceConfig>),
    Wrapped { devices: Vec<DeviceConfig> },
}

impl From<ConfigDocument> for WatcherConfig {
    fn from(document: ConfigDocument) -> Self {
        let devices = match document {
            ConfigDocument::Devices(devices) | ConfigDocument::Wrapped { devices } => devices,
        };
        Self {
            devices,
            settings: WatcherSettings::default(),
        }
    }
}

impl WatcherConfig {
    pub fn new(devices: Vec<DeviceConfig>) -> Self {
        Self {
            devices,
            settings: WatcherSettings::default(),
        }
    }

    /// Load devices from YAML: either a list of devices or a `devices:` key
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let document: ConfigDocument = serde_yaml::from_str(yaml)?;
        Ok(document.into())
    }

    /// Load devices from JSON, with the same shapes as [`Self::from_yaml_str`]
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let document: ConfigDocument = serde_json::from_str(json)?;
        Ok(document.into())
    }

    pub fn with_settings(mut self, settings: WatcherSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_device(mut self, device: DeviceConfig) -> Self {
        self.devices.push(device);
        self
    }

    /// Validate settings and make sure every device URL can be built
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.settings.validate()?;
        for device in &self.devices {
            device.event_url()?;
        }
        Ok(())
    }
}
