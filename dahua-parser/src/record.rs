//! Parsed event records

use std::collections::{BTreeMap, HashMap};

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Payload key carrying the originating device's name
pub const NAME_KEY: &str = "name";

/// Payload key carrying the resolved channel label
pub const CHANNEL_KEY: &str = "channel";

/// One event line from a device, with device and channel context
///
/// Serializes to the flat mapping produced by [`EventRecord::payload`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    /// Name of the device the line came from
    pub device_name: String,

    /// Label of the channel named by the `index` field, when known
    pub channel_label: Option<String>,

    /// Protocol fields in the line (`Code`, `action`, `index`, `data`, ...)
    pub fields: HashMap<String, String>,
}

impl EventRecord {
    pub fn new(device_name: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            channel_label: None,
            fields: HashMap::new(),
        }
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// The event code, e.g. `VideoMotion`
    pub fn code(&self) -> Option<&str> {
        self.field("Code")
    }

    /// The event action, usually `Start`, `Stop` or `Pulse`
    pub fn action(&self) -> Option<&str> {
        self.field("action")
    }

    /// The raw channel index of the event
    pub fn index(&self) -> Option<&str> {
        self.field("index")
    }

    /// Flatten into the mapping handed to the event bus.
    ///
    /// `name` is seeded first so a protocol field with the same key wins,
    /// then `channel` is added last.
    pub fn payload(&self) -> BTreeMap<String, String> {
        let mut payload = BTreeMap::new();
        payload.insert(NAME_KEY.to_string(), self.device_name.clone());
        for (key, value) in &self.fields {
            payload.insert(key.clone(), value.clone());
        }
        if let Some(label) = &self.channel_label {
            payload.insert(CHANNEL_KEY.to_string(), label.clone());
        }
        payload
    }
}

impl Serialize for EventRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let payload = self.payload();
        let mut map = serializer.serialize_map(Some(payload.len()))?;
        for (key, value) in &payload {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
