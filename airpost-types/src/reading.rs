//! The reading set: the latest value for every configured channel.

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::String;

use crate::STOCK_CHANNELS;

/// Value recorded for a channel whose sensor failed to produce a reading.
///
/// Collectors filter on this instead of coping with missing fields, so a
/// failed sensor must write the sentinel rather than drop its channels.
pub const SENTINEL: f64 = -1.0;

/// The complete channel-to-value map carried from sampling to delivery.
///
/// The key set is sealed at construction and never changes afterwards:
/// [`set`](ReadingSet::set) overwrites values for known channels and
/// rejects everything else. Every channel always holds a value (0.0
/// before the first sampling cycle, [`SENTINEL`] after a failed read),
/// and channels iterate in a deterministic order, so consumers can rely
/// on a fixed, fully-populated schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingSet {
    values: BTreeMap<String, f64>,
}

impl ReadingSet {
    /// Create a reading set for the given channels, all starting at 0.0.
    ///
    /// Duplicate channel names collapse to a single entry.
    pub fn for_channels<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = channels.into_iter().map(|c| (c.into(), 0.0)).collect();
        Self { values }
    }

    /// Create a reading set for the stock channel complement.
    pub fn stock() -> Self {
        Self::for_channels(STOCK_CHANNELS)
    }

    /// Overwrite the value of an existing channel.
    ///
    /// Returns `false` (leaving the set untouched) if the channel is not
    /// part of the schema. New channels cannot be introduced after
    /// construction.
    pub fn set(&mut self, channel: &str, value: f64) -> bool {
        match self.values.get_mut(channel) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Record a failed read for a channel by writing [`SENTINEL`].
    pub fn mark_failed(&mut self, channel: &str) -> bool {
        self.set(channel, SENTINEL)
    }

    /// Latest value for a channel, if the channel exists.
    pub fn get(&self, channel: &str) -> Option<f64> {
        self.values.get(channel).copied()
    }

    /// Whether a channel is part of the schema.
    pub fn contains(&self, channel: &str) -> bool {
        self.values.contains_key(channel)
    }

    /// Number of channels in the schema.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the schema has no channels at all.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Channel names in iteration order.
    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Channel/value pairs in iteration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(c, v)| (c.as_str(), *v))
    }
}

/// Format a channel value the way it travels on the wire: decimal text
/// with exactly two places.
///
/// Both delivery flavours and the status display use this, so a reading
/// renders identically everywhere it appears.
pub fn format_value(value: f64) -> String {
    format!("{value:.2}")
}
