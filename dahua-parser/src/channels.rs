//! Channel number to label mapping

use std::collections::BTreeMap;

/// Human readable labels for a device's video inputs, keyed by channel number
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelMap(BTreeMap<u32, String>);

impl ChannelMap {
    /// Create an empty channel map
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the label for a channel, returning the previous label if any
    pub fn insert(&mut self, number: u32, label: impl Into<String>) -> Option<String> {
        self.0.insert(number, label.into())
    }

    /// Look up a label by channel number
    pub fn get(&self, number: u32) -> Option<&str> {
        self.0.get(&number).map(String::as_str)
    }

    /// Resolve the raw `index` field of an event line.
    ///
    /// The field is text on the wire; anything that is not a channel number
    /// simply does not resolve.
    pub fn resolve(&self, index: &str) -> Option<&str> {
        index.trim().parse::<u32>().ok().and_then(|n| self.get(n))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.0.iter().map(|(n, label)| (*n, label.as_str()))
    }
}

impl<S: Into<String>> FromIterator<(u32, S)> for ChannelMap {
    fn from_iter<I: IntoIterator<Item = (u32, S)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(n, label)| (n, label.into())).collect())
    }
}
